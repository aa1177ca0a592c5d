//! A single authenticated connection to the Overseer.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::tungstenite;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{header, HeaderValue};
use tokio_util::sync::CancellationToken;

use echo_protocol::constants::WS_MAX_MESSAGE_SIZE;

use crate::handler::Handler;
use crate::pumps;
use crate::sender::{PendingMap, Sender};
use crate::{ChannelError, SEND_BUFFER_SIZE};

/// One live WebSocket connection to the Overseer.
///
/// Owns the read/write/ping pumps; dropping the client aborts them. The
/// reconnect loop in [`run_channel`](crate::run_channel) creates a fresh
/// client per attempt.
pub struct OverseerClient {
    sender: Sender,
    cancel: CancellationToken,
    closed: CancellationToken,
    _read_handle: tokio::task::JoinHandle<()>,
    _write_handle: tokio::task::JoinHandle<()>,
    _ping_handle: tokio::task::JoinHandle<()>,
}

impl OverseerClient {
    /// Connects and authenticates to the Overseer.
    ///
    /// The shared secret is presented as a bearer token on the WebSocket
    /// upgrade request; the Overseer rejects the upgrade outright if it
    /// doesn't match.
    pub async fn connect<H: Handler>(
        url: &str,
        token: &str,
        handler: Arc<H>,
    ) -> Result<Self, ChannelError> {
        let mut request = url.into_client_request()?;
        let bearer = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| ChannelError::Header(e.to_string()))?;
        request.headers_mut().insert(header::AUTHORIZATION, bearer);
        request.headers_mut().insert(
            header::USER_AGENT,
            HeaderValue::from_static("Overseer Echo"),
        );

        let mut ws_config = tungstenite::protocol::WebSocketConfig::default();
        ws_config.max_message_size = Some(WS_MAX_MESSAGE_SIZE);
        ws_config.max_frame_size = Some(WS_MAX_MESSAGE_SIZE);
        let (ws_stream, _) =
            tokio_tungstenite::connect_async_with_config(request, Some(ws_config), false).await?;
        let (write, read) = ws_stream.split();

        let (write_tx, write_rx) = mpsc::channel::<tungstenite::Message>(SEND_BUFFER_SIZE);
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let sender = Sender::new(write_tx.clone(), pending.clone());
        let cancel = CancellationToken::new();
        let closed = CancellationToken::new();

        let ping_tx = write_tx.clone();

        let write_handle = {
            let cancel = cancel.clone();
            tokio::spawn(pumps::write::write_pump(write, write_rx, cancel))
        };

        let read_handle = {
            let sender = sender.clone();
            let cancel = cancel.clone();
            let closed = closed.clone();
            tokio::spawn(pumps::read::read_pump(
                read, pending, handler, sender, write_tx, cancel, closed,
            ))
        };

        let ping_handle = {
            let cancel = cancel.clone();
            tokio::spawn(pumps::ping::ping_pump(ping_tx, cancel))
        };

        Ok(Self {
            sender,
            cancel,
            closed,
            _read_handle: read_handle,
            _write_handle: write_handle,
            _ping_handle: ping_handle,
        })
    }

    /// Handle for sending over this connection.
    pub fn sender(&self) -> Sender {
        self.sender.clone()
    }

    /// Token cancelled when the connection dies for any reason.
    pub fn closed(&self) -> CancellationToken {
        self.closed.clone()
    }

    /// Gracefully closes the connection.
    pub async fn close(&self) {
        self.cancel.cancel();
    }
}

impl Drop for OverseerClient {
    fn drop(&mut self) {
        self.cancel.cancel();
        self._read_handle.abort();
        self._write_handle.abort();
        self._ping_handle.abort();
    }
}
