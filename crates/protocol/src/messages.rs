//! Payload types for every channel message.

use serde::{Deserialize, Serialize};

use crate::types::{DiskUsage, StoredItem};

// ---------------------------------------------------------------------------
// Overseer → Echo commands
// ---------------------------------------------------------------------------

/// Tells the node to accept one upload for this identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectUploadRequest {
    pub id: String,
}

/// Tells the node to remove a stored item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteRequest {
    pub id: String,
}

// ---------------------------------------------------------------------------
// Echo → Overseer notifications
// ---------------------------------------------------------------------------

/// An upload finished; `size` is the stat'd on-disk byte count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedEvent {
    pub id: String,
    pub size: u64,
}

/// A download was authorized and the file is being served.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadedEvent {
    pub id: String,
}

/// Resynchronizes the Overseer's view of this node.
///
/// Sent on every (re)connect and after deletions. `disk_usage` is omitted
/// when the probe failed; the listing is still sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disk_usage: Option<DiskUsage>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<StoredItem>,
}

// ---------------------------------------------------------------------------
// Echo → Overseer requests
// ---------------------------------------------------------------------------

/// Asks the Overseer whether a download token grants access to an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyDownloadTokenRequest {
    pub token: String,
    pub id: String,
}

/// The Overseer's verdict, correlated to the request id.
///
/// `name` is the human-readable item name used for the download filename,
/// so users don't receive files named after a bare UUID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyDownloadTokenResponse {
    pub allowed: bool,
    #[serde(default)]
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    #[test]
    fn refresh_event_disk_usage_key_is_camel_case() {
        let evt = RefreshEvent {
            disk_usage: Some(DiskUsage {
                total: 100,
                used: 40,
                free: 60,
            }),
            items: vec![],
        };
        let json = serde_json::to_string(&evt).unwrap();
        assert!(json.contains("\"diskUsage\""));
        assert!(!json.contains("\"items\""));
    }

    #[test]
    fn refresh_event_omits_failed_probe() {
        let evt = RefreshEvent {
            disk_usage: None,
            items: vec![StoredItem {
                id: "3fa85f64-5717-4562-b3fc-2c963f66afa6".into(),
                size: 42,
                modified: DateTime::from_timestamp(0, 0).unwrap(),
            }],
        };
        let json = serde_json::to_string(&evt).unwrap();
        assert!(!json.contains("diskUsage"));
        assert!(json.contains("\"items\""));
    }

    #[test]
    fn refresh_event_parses_bare_object() {
        let evt: RefreshEvent = serde_json::from_str("{}").unwrap();
        assert!(evt.disk_usage.is_none());
        assert!(evt.items.is_empty());
    }

    #[test]
    fn uploaded_event_roundtrip() {
        let evt = UploadedEvent {
            id: "3fa85f64-5717-4562-b3fc-2c963f66afa6".into(),
            size: 1_073_741_824,
        };
        let json = serde_json::to_string(&evt).unwrap();
        assert!(json.contains("\"size\":1073741824"));
        let parsed: UploadedEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, evt);
    }

    #[test]
    fn verify_response_defaults_missing_name() {
        // A denying Overseer may not bother with a name.
        let parsed: VerifyDownloadTokenResponse =
            serde_json::from_str(r#"{"allowed":false}"#).unwrap();
        assert!(!parsed.allowed);
        assert!(parsed.name.is_empty());
    }

    #[test]
    fn verify_request_shape() {
        let req = VerifyDownloadTokenRequest {
            token: "jwt-ish-token".into(),
            id: "3fa85f64-5717-4562-b3fc-2c963f66afa6".into(),
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("\"token\":\"jwt-ish-token\""));
        assert!(json.contains("\"id\":"));
    }
}
