//! Envelope for all channel communication.

use serde::{Deserialize, Serialize};

use crate::constants::MessageType;

/// A single channel message.
///
/// `id` correlates requests with their replies: an `ack` or a
/// `verify-download-token` response carries the id of the message it
/// answers. The `payload` field uses [`serde_json::value::RawValue`] so the
/// envelope can be routed before the payload is decoded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    #[serde(rename = "type")]
    pub msg_type: MessageType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Box<serde_json::value::RawValue>>,
}

impl Message {
    /// Creates a new message with the given type and payload.
    pub fn new<T: Serialize>(
        id: impl Into<String>,
        msg_type: MessageType,
        payload: Option<&T>,
    ) -> Result<Self, serde_json::Error> {
        let raw = match payload {
            Some(p) => {
                let json = serde_json::to_string(p)?;
                Some(serde_json::value::RawValue::from_string(json)?)
            }
            None => None,
        };
        Ok(Self {
            id: id.into(),
            msg_type,
            payload: raw,
        })
    }

    /// Deserializes the payload into the given type.
    pub fn parse_payload<T: for<'de> Deserialize<'de>>(
        &self,
    ) -> Result<Option<T>, serde_json::Error> {
        match &self.payload {
            Some(raw) => Ok(Some(serde_json::from_str(raw.get())?)),
            None => Ok(None),
        }
    }

    /// Creates a reply to this message, reusing its correlation id.
    pub fn reply<T: Serialize>(
        &self,
        msg_type: MessageType,
        payload: Option<&T>,
    ) -> Result<Self, serde_json::Error> {
        Message::new(&self.id, msg_type, payload)
    }

    /// Creates an `ack` reply for an inbound command.
    pub fn ack(&self) -> Self {
        Self {
            id: self.id.clone(),
            msg_type: MessageType::Ack,
            payload: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{ExpectUploadRequest, VerifyDownloadTokenResponse};

    #[test]
    fn message_new_with_payload() {
        let payload = ExpectUploadRequest {
            id: "3fa85f64-5717-4562-b3fc-2c963f66afa6".into(),
        };
        let msg = Message::new("msg-1", MessageType::ExpectUpload, Some(&payload)).unwrap();
        assert_eq!(msg.id, "msg-1");
        assert_eq!(msg.msg_type, MessageType::ExpectUpload);
        assert!(msg.payload.is_some());
    }

    #[test]
    fn message_new_without_payload() {
        let msg = Message::new::<()>("msg-2", MessageType::Ack, None).unwrap();
        assert!(msg.payload.is_none());
    }

    #[test]
    fn message_parse_payload() {
        let resp = VerifyDownloadTokenResponse {
            allowed: true,
            name: "Vacation Photos".into(),
        };
        let msg = Message::new("m1", MessageType::VerifyDownloadToken, Some(&resp)).unwrap();
        let parsed: Option<VerifyDownloadTokenResponse> = msg.parse_payload().unwrap();
        let parsed = parsed.unwrap();
        assert!(parsed.allowed);
        assert_eq!(parsed.name, "Vacation Photos");
    }

    #[test]
    fn message_json_roundtrip() {
        let msg = Message::new::<()>("e1", MessageType::Downloaded, None).unwrap();
        let json = serde_json::to_string(&msg).unwrap();
        let parsed: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.id, "e1");
        assert_eq!(parsed.msg_type, MessageType::Downloaded);
        assert!(parsed.payload.is_none());
    }

    #[test]
    fn message_omits_null_payload() {
        let msg = Message::new::<()>("m1", MessageType::Ack, None).unwrap();
        let json = serde_json::to_string(&msg).unwrap();
        assert!(!json.contains("payload"));
    }

    #[test]
    fn ack_preserves_id() {
        let original = Message::new::<()>("req-42", MessageType::Delete, None).unwrap();
        let reply = original.ack();
        assert_eq!(reply.id, "req-42");
        assert_eq!(reply.msg_type, MessageType::Ack);
        assert!(reply.payload.is_none());
    }

    #[test]
    fn reply_preserves_id() {
        let original = Message::new::<()>("req-99", MessageType::VerifyDownloadToken, None).unwrap();
        let resp = VerifyDownloadTokenResponse {
            allowed: false,
            name: String::new(),
        };
        let reply = original
            .reply(MessageType::VerifyDownloadToken, Some(&resp))
            .unwrap();
        assert_eq!(reply.id, "req-99");
    }
}
