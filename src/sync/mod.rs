// ABOUTME: Clock synchronization for the control channel heartbeat
// ABOUTME: NTP-style round-trip time calculation and server timestamp conversion

pub mod clock;

pub use clock::{ClockSync, SyncQuality};
