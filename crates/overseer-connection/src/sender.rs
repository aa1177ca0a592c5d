//! Outbound side of the channel: events, correlated requests, replies.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_tungstenite::tungstenite;

use echo_protocol::constants::{MessageType, WS_REQUEST_TIMEOUT};
use echo_protocol::envelope::Message;

use crate::ChannelError;

/// Map of outstanding request ids to their reply slots.
pub(crate) type PendingMap = Arc<Mutex<HashMap<String, oneshot::Sender<Message>>>>;

/// Cloneable handle for sending over the current connection.
///
/// All sends go through the write pump, so concurrent emits from HTTP
/// handlers and the event handler are safe.
#[derive(Clone)]
pub struct Sender {
    write_tx: mpsc::Sender<tungstenite::Message>,
    pending: PendingMap,
}

impl Sender {
    pub(crate) fn new(write_tx: mpsc::Sender<tungstenite::Message>, pending: PendingMap) -> Self {
        Self { write_tx, pending }
    }

    /// Creates a sender not backed by a live connection, returning the raw
    /// frame receiver. For tests that drive a handler directly.
    pub fn detached() -> (Self, mpsc::Receiver<tungstenite::Message>) {
        let (write_tx, write_rx) = mpsc::channel(crate::SEND_BUFFER_SIZE);
        (
            Self::new(write_tx, Arc::new(Mutex::new(HashMap::new()))),
            write_rx,
        )
    }

    /// Returns `true` while the connection's write pump is alive.
    pub fn is_connected(&self) -> bool {
        !self.write_tx.is_closed()
    }

    /// Queues a raw message.
    pub async fn send_msg(&self, msg: Message) -> Result<(), ChannelError> {
        let json = serde_json::to_string(&msg)?;
        self.write_tx
            .send(tungstenite::Message::Text(json.into()))
            .await
            .map_err(|_| ChannelError::Closed)
    }

    /// Sends a fire-and-forget event with a fresh correlation id.
    pub async fn send_event<T: serde::Serialize>(
        &self,
        msg_type: MessageType,
        payload: Option<&T>,
    ) -> Result<(), ChannelError> {
        let id = uuid::Uuid::new_v4().to_string();
        self.send_msg(Message::new(id, msg_type, payload)?).await
    }

    /// Sends a request and waits for the correlated reply.
    pub async fn request<T: serde::Serialize>(
        &self,
        msg_type: MessageType,
        payload: Option<&T>,
    ) -> Result<Message, ChannelError> {
        let id = uuid::Uuid::new_v4().to_string();
        let msg = Message::new(&id, msg_type, payload)?;

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id.clone(), tx);

        if let Err(e) = self.send_msg(msg).await {
            self.pending.lock().await.remove(&id);
            return Err(e);
        }

        let result = tokio::time::timeout(WS_REQUEST_TIMEOUT, rx).await;

        // Clean up the pending entry on any exit path.
        self.pending.lock().await.remove(&id);

        match result {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => Err(ChannelError::Closed),
            Err(_) => Err(ChannelError::Timeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_sender() -> (Sender, mpsc::Receiver<tungstenite::Message>, PendingMap) {
        let (write_tx, write_rx) = mpsc::channel(16);
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        (Sender::new(write_tx, pending.clone()), write_rx, pending)
    }

    #[tokio::test]
    async fn send_event_generates_unique_ids() {
        let (sender, mut write_rx, _) = test_sender();
        sender
            .send_event::<()>(MessageType::Downloaded, None)
            .await
            .unwrap();
        sender
            .send_event::<()>(MessageType::Downloaded, None)
            .await
            .unwrap();

        let first = parse_frame(write_rx.recv().await.unwrap());
        let second = parse_frame(write_rx.recv().await.unwrap());
        assert_ne!(first.id, second.id);
        assert_eq!(first.msg_type, MessageType::Downloaded);
    }

    #[tokio::test]
    async fn request_resolves_when_reply_arrives() {
        let (sender, mut write_rx, pending) = test_sender();

        let request = tokio::spawn({
            let sender = sender.clone();
            async move {
                sender
                    .request::<()>(MessageType::VerifyDownloadToken, None)
                    .await
            }
        });

        // Pull the outbound frame and answer it the way the read pump would.
        let sent = parse_frame(write_rx.recv().await.unwrap());
        let reply = sent.ack();
        let tx = pending.lock().await.remove(&sent.id).unwrap();
        tx.send(reply).unwrap();

        let got = request.await.unwrap().unwrap();
        assert_eq!(got.id, sent.id);
        assert_eq!(got.msg_type, MessageType::Ack);
        assert!(pending.lock().await.is_empty());
    }

    #[tokio::test]
    async fn request_fails_closed_when_reply_slot_drops() {
        let (sender, mut write_rx, pending) = test_sender();

        let request = tokio::spawn({
            let sender = sender.clone();
            async move {
                sender
                    .request::<()>(MessageType::VerifyDownloadToken, None)
                    .await
            }
        });

        let sent = parse_frame(write_rx.recv().await.unwrap());
        // Dropping the oneshot simulates the connection dying mid-request.
        pending.lock().await.remove(&sent.id);

        let result = request.await.unwrap();
        assert!(matches!(result, Err(ChannelError::Closed)));
    }

    #[tokio::test]
    async fn send_fails_when_write_pump_gone() {
        let (sender, write_rx, _) = test_sender();
        drop(write_rx);
        let result = sender.send_event::<()>(MessageType::Downloaded, None).await;
        assert!(matches!(result, Err(ChannelError::Closed)));
    }

    fn parse_frame(frame: tungstenite::Message) -> Message {
        match frame {
            tungstenite::Message::Text(text) => serde_json::from_str(&text).unwrap(),
            other => panic!("expected text frame, got {other:?}"),
        }
    }
}
