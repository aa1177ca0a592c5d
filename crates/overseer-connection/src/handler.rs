//! Handler trait for inbound Overseer commands.
//!
//! The node implements this with its inventory and storage logic; the
//! connection machinery handles parsing, correlation and the socket
//! lifecycle.

use std::future::Future;
use std::pin::Pin;

use echo_protocol::envelope::Message;

use crate::sender::Sender;

/// A boxed future returned by handler methods.
pub type HandlerFuture<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

/// Handles channel lifecycle events and inbound Overseer commands.
///
/// Each command method receives a [`Sender`] for acking and the parsed
/// envelope. Commands are dispatched in arrival order; a handler that never
/// acks leaves the Overseer free to retry.
pub trait Handler: Send + Sync + 'static {
    /// Called once per (re)connection, before any command is dispatched.
    /// The node resyncs the Overseer here with a `refresh` event.
    fn on_connected(&self, sender: Sender) -> HandlerFuture<'_>;

    /// Called for `expect-upload`. Validate the id, record it, then ack —
    /// the Overseer holds the client back until the ack arrives.
    fn on_expect_upload(&self, sender: Sender, msg: Message) -> HandlerFuture<'_>;

    /// Called for `delete`. Ack only once the item is gone (or was never
    /// stored); an unacked delete is the Overseer's cue to retry.
    fn on_delete(&self, sender: Sender, msg: Message) -> HandlerFuture<'_>;

    /// Called when the connection is lost (cleanup hook).
    fn on_disconnected(&self) -> HandlerFuture<'_> {
        Box::pin(async {})
    }
}
