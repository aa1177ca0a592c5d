//! Wire protocol types for Echo-Overseer communication.
//!
//! The Overseer channel carries JSON envelopes in both directions. Inbound
//! commands (`expect-upload`, `delete`) are acknowledged by an outbound
//! `ack` carrying the same correlation id; the node's own
//! `verify-download-token` requests are answered the same way by the
//! Overseer.

pub mod constants;
pub mod envelope;
pub mod messages;
pub mod types;

pub use constants::MessageType;
pub use envelope::Message;
