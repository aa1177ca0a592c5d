//! Message types and protocol constants for the Overseer channel.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// All message types carried over the channel, with their wire names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MessageType {
    /// Overseer → Echo: accept an upcoming upload for an id.
    ExpectUpload,
    /// Overseer → Echo: remove a stored item.
    Delete,
    /// Echo → Overseer: reply to an inbound command, same correlation id.
    Ack,
    /// Echo → Overseer: an upload finished and is on disk.
    Uploaded,
    /// Echo → Overseer: a download was authorized and is being served.
    Downloaded,
    /// Echo → Overseer: disk usage + inventory resync.
    Refresh,
    /// Echo → Overseer: verify a download token, expects a correlated reply.
    VerifyDownloadToken,
}

/// Largest channel message accepted or produced.
///
/// Refresh messages carry the full inventory listing, so this is sized
/// well above any realistic item count.
pub const WS_MAX_MESSAGE_SIZE: usize = 4 * 1024 * 1024;

/// Interval between keepalive pings.
///
/// Reverse proxies in front of the Overseer close idle connections, so the
/// node pings even when no transfers are active.
pub const WS_PING_PERIOD: Duration = Duration::from_secs(15);

/// How long the connection may stay silent before it is considered dead.
pub const WS_PONG_WAIT: Duration = Duration::from_secs(60);

/// How long to wait for the Overseer to answer a correlated request.
pub const WS_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
