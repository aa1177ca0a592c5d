//! Shared handle to whichever connection is currently live.

use std::sync::{Arc, RwLock};

use echo_protocol::constants::MessageType;
use echo_protocol::messages::{
    DownloadedEvent, UploadedEvent, VerifyDownloadTokenRequest, VerifyDownloadTokenResponse,
};

use crate::sender::Sender;
use crate::{ChannelError, ChannelFuture, ControlChannel};

/// Process-wide handle to the Overseer connection.
///
/// The reconnect loop installs a fresh [`Sender`] after each successful
/// connect and clears it on disconnect; HTTP handlers hold a clone of this
/// handle and see whatever connection is current. Operations while
/// disconnected fail with [`ChannelError::NotConnected`].
#[derive(Clone, Default)]
pub struct OverseerHandle {
    sender: Arc<RwLock<Option<Sender>>>,
}

impl OverseerHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs (or clears) the current connection's sender.
    pub(crate) fn set(&self, sender: Option<Sender>) {
        *self.sender.write().unwrap() = sender;
    }

    /// The current sender, if connected.
    pub fn current(&self) -> Option<Sender> {
        self.sender.read().unwrap().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.current().is_some_and(|s| s.is_connected())
    }

    fn require(&self) -> Result<Sender, ChannelError> {
        self.current().ok_or(ChannelError::NotConnected)
    }
}

impl ControlChannel for OverseerHandle {
    fn notify_uploaded(&self, id: String, size: u64) -> ChannelFuture<'_, Result<(), ChannelError>> {
        Box::pin(async move {
            let sender = self.require()?;
            sender
                .send_event(MessageType::Uploaded, Some(&UploadedEvent { id, size }))
                .await
        })
    }

    fn notify_downloaded(&self, id: String) -> ChannelFuture<'_, Result<(), ChannelError>> {
        Box::pin(async move {
            let sender = self.require()?;
            sender
                .send_event(MessageType::Downloaded, Some(&DownloadedEvent { id }))
                .await
        })
    }

    fn verify_download_token(
        &self,
        token: String,
        id: String,
    ) -> ChannelFuture<'_, Result<VerifyDownloadTokenResponse, ChannelError>> {
        Box::pin(async move {
            let sender = self.require()?;
            let reply = sender
                .request(
                    MessageType::VerifyDownloadToken,
                    Some(&VerifyDownloadTokenRequest { token, id }),
                )
                .await?;
            reply
                .parse_payload::<VerifyDownloadTokenResponse>()?
                .ok_or_else(|| ChannelError::Protocol("verify reply had no payload".into()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disconnected_handle_refuses_operations() {
        let handle = OverseerHandle::new();
        assert!(!handle.is_connected());

        let result = handle.notify_uploaded("some-id".into(), 1).await;
        assert!(matches!(result, Err(ChannelError::NotConnected)));

        let result = handle
            .verify_download_token("token".into(), "some-id".into())
            .await;
        assert!(matches!(result, Err(ChannelError::NotConnected)));
    }

    #[tokio::test]
    async fn cleared_handle_goes_back_to_not_connected() {
        use crate::sender::PendingMap;
        use std::collections::HashMap;
        use tokio::sync::{mpsc, Mutex};

        let handle = OverseerHandle::new();
        let (write_tx, _write_rx) = mpsc::channel(4);
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        handle.set(Some(Sender::new(write_tx, pending)));
        assert!(handle.is_connected());

        handle.set(None);
        assert!(!handle.is_connected());
    }
}
