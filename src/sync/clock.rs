// ABOUTME: Clock synchronization implementation
// ABOUTME: Calculates RTT from server/time replies and grades sync quality

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Current device clock in Unix microseconds, as sent in `client/time`
pub fn now_micros() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as i64)
        .unwrap_or(0)
}

/// Clock synchronization quality
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncQuality {
    /// Good synchronization (RTT < 50ms)
    Good,
    /// Degraded synchronization (RTT 50-100ms)
    Degraded,
    /// Lost synchronization (RTT > 100ms or no sync)
    Lost,
}

/// Clock synchronization state, updated from `server/time` heartbeat replies.
///
/// Informational only: the connection does not depend on it, and audio feeding
/// ignores it entirely.
#[derive(Debug)]
pub struct ClockSync {
    /// Last known RTT in microseconds
    rtt_micros: Option<i64>,

    /// Estimated server clock offset relative to the device clock (µs)
    offset_micros: Option<i64>,

    /// When we computed this (for staleness detection)
    last_update: Option<Instant>,
}

impl ClockSync {
    /// Create a new clock synchronization instance
    pub fn new() -> Self {
        Self {
            rtt_micros: None,
            offset_micros: None,
            last_update: None,
        }
    }

    /// Update from one request/reply exchange.
    /// t1 = client_transmitted, t2 = server_received,
    /// t3 = server_transmitted, t4 = client_received (all µs)
    pub fn update(&mut self, t1: i64, t2: i64, t3: i64, t4: i64) {
        // RTT = (t4 - t1) - (t3 - t2)
        self.rtt_micros = Some((t4 - t1) - (t3 - t2));

        // NTP offset estimate: ((t2 - t1) + (t3 - t4)) / 2
        self.offset_micros = Some(((t2 - t1) + (t3 - t4)) / 2);

        self.last_update = Some(Instant::now());
    }

    /// Get current RTT in microseconds
    pub fn rtt_micros(&self) -> Option<i64> {
        self.rtt_micros
    }

    /// Estimated server clock offset in microseconds
    pub fn offset_micros(&self) -> Option<i64> {
        self.offset_micros
    }

    /// Convert a server timestamp (µs) to the device clock (µs)
    pub fn server_to_local_micros(&self, server_micros: i64) -> Option<i64> {
        Some(server_micros - self.offset_micros?)
    }

    /// Get sync quality based on RTT
    pub fn quality(&self) -> SyncQuality {
        match self.rtt_micros {
            Some(rtt) if rtt < 50_000 => SyncQuality::Good,
            Some(rtt) if rtt < 100_000 => SyncQuality::Degraded,
            _ => SyncQuality::Lost,
        }
    }

    /// Check if sync is stale (more than two heartbeat intervals old)
    pub fn is_stale(&self, heartbeat_interval: Duration) -> bool {
        match self.last_update {
            Some(last) => last.elapsed() > heartbeat_interval * 2,
            None => true,
        }
    }
}

impl Default for ClockSync {
    fn default() -> Self {
        Self::new()
    }
}
