// ABOUTME: Main library entry point for wavelink
// ABOUTME: Exports the transport session and playback engine public API

//! # wavelink
//!
//! Real-time audio delivery path of a remote-speaker client: a persistent
//! WebSocket session that receives JSON control messages and binary PCM audio
//! from a media server, and a playback engine that turns the chunk stream into
//! gap-free, low-latency sound while staying instantly pausable.
//!
//! The native audio backend is not part of this crate; it is injected behind
//! the [`audio::AudioSink`] trait.

#![warn(missing_docs)]

/// Audio types, PCM decoding, buffer pool, and the native sink seam
pub mod audio;
/// Playback engine and state machine
pub mod player;
/// Protocol implementation: messages, frame codec, and the transport session
pub mod protocol;
/// Clock synchronization utilities for the heartbeat
pub mod sync;

pub use audio::{AudioChunk, AudioFormat, AudioSink, Sample, SinkError, VolumeState};
pub use player::{PlaybackState, PlayerEngine, PlayerHandle};
pub use protocol::messages::{ClientHello, Message, ServerHello};
pub use protocol::session::{ConnectionState, Session, SessionConfig, SessionIdentity};

/// Result type for wavelink operations
pub type Result<T> = std::result::Result<T, error::Error>;

/// Error types for wavelink
pub mod error {
    use thiserror::Error;

    /// Error types for wavelink operations
    #[derive(Error, Debug)]
    pub enum Error {
        /// WebSocket-related error
        #[error("WebSocket error: {0}")]
        WebSocket(String),

        /// Protocol violation or parsing error
        #[error("Protocol error: {0}")]
        Protocol(String),

        /// Invalid message format received
        #[error("Invalid message format")]
        InvalidMessage,

        /// Connection-related error (handshake timeout, socket failure)
        #[error("Connection error: {0}")]
        Connection(String),

        /// Native sink setup or release failure
        #[error("Sink error: {0}")]
        Sink(String),

        /// A feed operation failed after recovery was exhausted
        #[error("Feed error: {0}")]
        Feed(String),

        /// Operation rejected by the playback state machine
        #[error("Invalid state for {op}: {state}")]
        InvalidState {
            /// The rejected operation
            op: &'static str,
            /// The state that rejected it
            state: &'static str,
        },

        /// A bounded wait elapsed
        #[error("Timed out waiting for {0}")]
        Timeout(&'static str),

        /// The engine or session has been disposed
        #[error("Already disposed")]
        Closed,
    }
}
