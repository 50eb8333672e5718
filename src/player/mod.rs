// ABOUTME: Playback engine for the remote-speaker audio path
// ABOUTME: State machine, bounded feed loop, and elapsed-time accounting

/// Engine actor, handle, and configuration
pub mod engine;
/// Playback state machine
pub mod state;

pub use engine::{EngineConfig, EngineEvent, PlayerEngine, PlayerHandle};
pub use state::PlaybackState;
