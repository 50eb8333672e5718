// ABOUTME: Shared volume state (user-facing percent + mute)
// ABOUTME: Written by the session's volume commands, read by the feed path

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

/// Volume percent and mute flag shared between the transport session and the
/// playback engine's feed path. Clones share the same state.
#[derive(Debug, Clone)]
pub struct VolumeState {
    value: Arc<AtomicU8>,
    muted: Arc<AtomicBool>,
}

impl VolumeState {
    /// Create with an initial percent (clamped to 100) and mute flag
    pub fn new(value: u8, muted: bool) -> Self {
        Self {
            value: Arc::new(AtomicU8::new(value.min(100))),
            muted: Arc::new(AtomicBool::new(muted)),
        }
    }

    /// Current (percent, muted) pair
    pub fn snapshot(&self) -> (u8, bool) {
        (
            self.value.load(Ordering::Relaxed),
            self.muted.load(Ordering::Relaxed),
        )
    }

    /// Set the volume percent (clamped to 100)
    pub fn set_value(&self, value: u8) {
        self.value.store(value.min(100), Ordering::Relaxed);
    }

    /// Set the mute flag
    pub fn set_muted(&self, muted: bool) {
        self.muted.store(muted, Ordering::Relaxed);
    }
}

impl Default for VolumeState {
    fn default() -> Self {
        Self::new(100, false)
    }
}
