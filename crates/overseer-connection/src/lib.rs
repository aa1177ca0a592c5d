//! Persistent Overseer channel for the Echo node.
//!
//! Maintains a single long-lived, bearer-authenticated WebSocket connection
//! to the Overseer, dispatches inbound commands to a [`Handler`], correlates
//! the node's own requests to their replies, and reconnects with backoff
//! when the connection drops.

mod client;
mod handle;
mod handler;
mod pumps;
mod reconnection;
mod sender;

pub use client::OverseerClient;
pub use handle::OverseerHandle;
pub use handler::{Handler, HandlerFuture};
pub use reconnection::{run_channel, ChannelConfig, ReconnectConfig};
pub use sender::Sender;

use std::future::Future;
use std::pin::Pin;

use echo_protocol::messages::VerifyDownloadTokenResponse;

/// Outbound write queue capacity.
///
/// Channel messages are small; a burst of per-upload notifications is well
/// under this.
pub(crate) const SEND_BUFFER_SIZE: usize = 256;

/// Errors produced by the Overseer channel.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("WebSocket error: {0}")]
    Ws(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid connection header: {0}")]
    Header(String),

    #[error("overseer did not reply in time")]
    Timeout,

    #[error("connection closed")]
    Closed,

    #[error("not connected to the overseer")]
    NotConnected,

    #[error("protocol error: {0}")]
    Protocol(String),
}

/// A boxed future returned by [`ControlChannel`] methods.
pub type ChannelFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// What the HTTP handlers need from the Overseer link.
///
/// [`OverseerHandle`] is the production implementation; tests substitute a
/// recording fake.
pub trait ControlChannel: Send + Sync + 'static {
    /// Reports a completed upload with its stat'd on-disk size.
    fn notify_uploaded(&self, id: String, size: u64) -> ChannelFuture<'_, Result<(), ChannelError>>;

    /// Reports an authorized download about to be served.
    fn notify_downloaded(&self, id: String) -> ChannelFuture<'_, Result<(), ChannelError>>;

    /// Round-trips a download token to the Overseer for a verdict.
    fn verify_download_token(
        &self,
        token: String,
        id: String,
    ) -> ChannelFuture<'_, Result<VerifyDownloadTokenResponse, ChannelError>>;
}
