//! WebSocket read pump — correlates replies and dispatches commands.

use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use echo_protocol::constants::{MessageType, WS_MAX_MESSAGE_SIZE, WS_PONG_WAIT};
use echo_protocol::envelope::Message;

use crate::handler::Handler;
use crate::sender::{PendingMap, Sender};

/// Reads messages from the WebSocket and dispatches them.
///
/// A pong deadline detects dead connections: if nothing at all arrives
/// within [`WS_PONG_WAIT`], the connection is considered dead and the pump
/// exits, which cancels `closed` and triggers the reconnect loop.
pub(crate) async fn read_pump<S, H>(
    mut read: S,
    pending: PendingMap,
    handler: Arc<H>,
    sender: Sender,
    write_tx: mpsc::Sender<tungstenite::Message>,
    cancel: CancellationToken,
    closed: CancellationToken,
) where
    S: StreamExt<Item = Result<tungstenite::Message, tungstenite::Error>> + Unpin,
    H: Handler,
{
    // Any incoming message resets the deadline, not just pongs.
    let pong_deadline = tokio::time::sleep(WS_PONG_WAIT);
    tokio::pin!(pong_deadline);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,

            () = &mut pong_deadline => {
                warn!("pong timeout, connection dead");
                break;
            }

            msg = read.next() => {
                match msg {
                    Some(Ok(msg)) => {
                        pong_deadline.as_mut().reset(tokio::time::Instant::now() + WS_PONG_WAIT);

                        match msg {
                            tungstenite::Message::Text(text) => {
                                handle_text_message(&text, &pending, &handler, &sender).await;
                            }
                            tungstenite::Message::Ping(data) => {
                                trace!("received ping, sending pong");
                                let _ = write_tx.send(tungstenite::Message::Pong(data)).await;
                            }
                            tungstenite::Message::Pong(_) => {
                                trace!("received pong");
                            }
                            tungstenite::Message::Close(_) => {
                                debug!("received close frame");
                                break;
                            }
                            _ => {} // Binary — the channel is JSON only.
                        }
                    }
                    Some(Err(e)) => {
                        warn!("WebSocket read error: {e}");
                        break;
                    }
                    None => {
                        debug!("WebSocket stream ended");
                        break;
                    }
                }
            }
        }
    }

    closed.cancel();
}

/// Routes one text message: pending reply first, then command dispatch.
async fn handle_text_message<H: Handler>(
    text: &str,
    pending: &PendingMap,
    handler: &Arc<H>,
    sender: &Sender,
) {
    if text.len() > WS_MAX_MESSAGE_SIZE {
        warn!("message too large ({} bytes), dropping", text.len());
        return;
    }

    let msg: Message = match serde_json::from_str(text) {
        Ok(m) => m,
        Err(e) => {
            warn!("failed to parse message: {e}");
            return;
        }
    };

    trace!(msg_type = ?msg.msg_type, id = %msg.id, "received message");

    // Replies to our own outstanding requests win over command dispatch.
    let mut map = pending.lock().await;
    if let Some(tx) = map.remove(&msg.id) {
        let _ = tx.send(msg);
        return;
    }
    drop(map);

    match msg.msg_type {
        MessageType::ExpectUpload => handler.on_expect_upload(sender.clone(), msg).await,
        MessageType::Delete => handler.on_delete(sender.clone(), msg).await,
        other => {
            warn!(msg_type = ?other, id = %msg.id, "unexpected message from overseer");
        }
    }
}
