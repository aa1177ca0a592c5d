//! The node's handler for inbound Overseer commands.

use std::sync::Arc;

use tracing::{info, warn};

use echo_inventory::Inventory;
use echo_overseer_connection::{Handler, HandlerFuture, Sender};
use echo_protocol::constants::MessageType;
use echo_protocol::envelope::Message;
use echo_protocol::messages::{DeleteRequest, ExpectUploadRequest, RefreshEvent};

/// Wires Overseer commands to the inventory and storage directory.
pub struct EchoHandler {
    inventory: Arc<Inventory>,
}

impl EchoHandler {
    pub fn new(inventory: Arc<Inventory>) -> Self {
        Self { inventory }
    }
}

impl Handler for EchoHandler {
    fn on_connected(&self, sender: Sender) -> HandlerFuture<'_> {
        Box::pin(async move {
            info!("connected to Overseer, resyncing");
            send_refresh(&self.inventory, &sender).await;
        })
    }

    fn on_expect_upload(&self, sender: Sender, msg: Message) -> HandlerFuture<'_> {
        Box::pin(async move {
            let Some(req) = parse::<ExpectUploadRequest>(&msg) else {
                return;
            };

            info!(id = %req.id, "told to expect an upload");
            if self.inventory.mark_expected(&req.id) {
                // The Overseer holds the uploader back until this ack.
                if let Err(e) = sender.send_msg(msg.ack()).await {
                    warn!(id = %req.id, error = %e, "failed to ack expect-upload");
                }
            }
            // Invalid ids are never acked; the Overseer should not have
            // produced one in the first place.
        })
    }

    fn on_delete(&self, sender: Sender, msg: Message) -> HandlerFuture<'_> {
        Box::pin(async move {
            let Some(req) = parse::<DeleteRequest>(&msg) else {
                return;
            };
            let id = req.id;

            // Deleting something we never had still succeeds.
            if !self.inventory.is_stored(&id) {
                if let Err(e) = sender.send_msg(msg.ack()).await {
                    warn!(%id, error = %e, "failed to ack delete");
                }
                return;
            }

            let path = match self.inventory.item_path(&id) {
                Ok(path) => path,
                Err(e) => {
                    warn!(%id, error = %e, "refusing delete with bad identifier");
                    return;
                }
            };

            info!(%id, "deleting item");
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    self.inventory.unmark_stored(&id);
                    send_refresh(&self.inventory, &sender).await;
                    if let Err(e) = sender.send_msg(msg.ack()).await {
                        warn!(%id, error = %e, "failed to ack delete");
                    }
                }
                Err(e) => {
                    // No ack — the Overseer treats the delete as incomplete
                    // and may retry.
                    warn!(%id, error = %e, "failed to delete item");
                }
            }
        })
    }
}

/// Sends a `refresh` with current disk usage and the full item listing.
///
/// A failed probe is logged and the refresh goes out without usage data.
pub(crate) async fn send_refresh(inventory: &Inventory, sender: &Sender) {
    let disk_usage = match echo_diskusage::usage(inventory.root()).await {
        Ok(usage) => Some(usage),
        Err(e) => {
            warn!(error = %e, "disk usage probe failed, omitting from refresh");
            None
        }
    };

    let refresh = RefreshEvent {
        disk_usage,
        items: inventory.list_items(),
    };
    if let Err(e) = sender.send_event(MessageType::Refresh, Some(&refresh)).await {
        warn!(error = %e, "failed to send refresh");
    }
}

/// Parses a command payload, logging and dropping the command if absent or
/// malformed.
fn parse<T: for<'de> serde::Deserialize<'de>>(msg: &Message) -> Option<T> {
    match msg.parse_payload::<T>() {
        Ok(Some(payload)) => Some(payload),
        Ok(None) => {
            warn!(id = %msg.id, msg_type = ?msg.msg_type, "command without payload");
            None
        }
        Err(e) => {
            warn!(id = %msg.id, msg_type = ?msg.msg_type, error = %e, "malformed command payload");
            None
        }
    }
}
