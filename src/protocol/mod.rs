// ABOUTME: Protocol implementation for the remote-speaker wire protocol
// ABOUTME: Message types, frame codec, and the transport session

/// Frame codec for binary audio frames and JSON control envelopes
pub mod frame;
/// Protocol message type definitions and serialization
pub mod messages;
/// Transport session: handshake, dispatch, heartbeat, reconnection
pub mod session;

pub use frame::{BinaryFrame, Decoded};
pub use messages::Message;
pub use session::Session;
