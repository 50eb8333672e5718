// ABOUTME: Playback state machine definition
// ABOUTME: Single enum with guarded transitions instead of scattered flags

use serde::{Deserialize, Serialize};

/// Playback engine state.
///
/// Exactly one instance per engine, mutated only by the engine itself.
/// Transitional states (`Initializing`, `Pausing`, `Resuming`, `Stopping`)
/// cover the bounded waits around native sink calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    /// Not initialized
    Idle,
    /// Sink setup in progress
    Initializing,
    /// Initialized, not playing
    Ready,
    /// Actively feeding the sink
    Playing,
    /// Pause requested, waiting out the in-flight feed
    Pausing,
    /// Paused, sink released
    Paused,
    /// Re-arming the sink for playback
    Resuming,
    /// Stop requested, waiting out the in-flight feed
    Stopping,
    /// Unrecoverable sink failure
    Error,
}

impl PlaybackState {
    /// Lowercase state name
    pub fn as_str(self) -> &'static str {
        match self {
            PlaybackState::Idle => "idle",
            PlaybackState::Initializing => "initializing",
            PlaybackState::Ready => "ready",
            PlaybackState::Playing => "playing",
            PlaybackState::Pausing => "pausing",
            PlaybackState::Paused => "paused",
            PlaybackState::Resuming => "resuming",
            PlaybackState::Stopping => "stopping",
            PlaybackState::Error => "error",
        }
    }
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
