// ABOUTME: Core audio type definitions
// ABOUTME: Sample (24-bit), AudioFormat, AudioChunk for the playback path

use std::time::Duration;

/// 24-bit audio sample stored in i32
/// Range: -8388608 to 8388607 (±2^23)
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(transparent)]
pub struct Sample(pub i32);

impl Sample {
    /// Largest representable 24-bit sample (2^23 - 1)
    pub const MAX: Self = Self(8_388_607);
    /// Smallest representable 24-bit sample (-2^23)
    pub const MIN: Self = Self(-8_388_608);
    /// Digital silence
    pub const ZERO: Self = Self(0);

    /// Convert from 16-bit sample (shift left 8 bits)
    #[inline]
    pub fn from_i16(s: i16) -> Self {
        Self((s as i32) << 8)
    }

    /// Convert from 24-bit little-endian bytes
    #[inline]
    pub fn from_i24_le(bytes: [u8; 3]) -> Self {
        let val = (bytes[0] as i32) | ((bytes[1] as i32) << 8) | ((bytes[2] as i32) << 16);
        // Sign-extend from 24-bit to 32-bit
        let extended = if val & 0x0080_0000 != 0 {
            val | 0xFF00_0000u32 as i32
        } else {
            val
        };
        Self(extended)
    }

    /// Convert to 16-bit sample (shift right 8 bits)
    #[inline]
    pub fn to_i16(self) -> i16 {
        (self.0 >> 8) as i16
    }

    /// Clamp to valid 24-bit range
    #[inline]
    pub fn clamp(self) -> Self {
        Self(self.0.clamp(Self::MIN.0, Self::MAX.0))
    }

    /// Scale by a gain in 1/100 units (volume percent). 100 is unity.
    #[inline]
    pub fn with_gain_percent(self, percent: u8) -> Self {
        if percent >= 100 {
            return self;
        }
        Self(((self.0 as i64 * percent as i64) / 100) as i32)
    }
}

/// Audio codec type
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Codec {
    /// Uncompressed little-endian PCM
    Pcm,
}

/// Audio format, fixed for the lifetime of a session
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AudioFormat {
    /// Codec of the incoming audio payloads
    pub codec: Codec,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Interleaved channel count
    pub channels: u8,
    /// Bits per sample (16 or 24)
    pub bit_depth: u8,
}

impl AudioFormat {
    /// Bytes per interleaved frame (all channels of one sample instant)
    pub fn bytes_per_frame(&self) -> u32 {
        self.channels as u32 * (self.bit_depth as u32 / 8)
    }

    /// Bytes of PCM per second of audio
    pub fn bytes_per_second(&self) -> u32 {
        self.bytes_per_frame() * self.sample_rate
    }

    /// Elapsed playback time represented by a count of fed PCM bytes
    pub fn duration_for_bytes(&self, bytes: u64) -> Duration {
        let per_second = self.bytes_per_second() as u64;
        if per_second == 0 {
            return Duration::ZERO;
        }
        Duration::from_micros(bytes.saturating_mul(1_000_000) / per_second)
    }
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self {
            codec: Codec::Pcm,
            sample_rate: 48_000,
            channels: 2,
            bit_depth: 16,
        }
    }
}

/// One chunk of interleaved PCM bytes extracted from a wire frame.
///
/// Owned exclusively by the playback engine from intake until it is handed to
/// the sink or discarded. Chunks are FIFO ordered end-to-end.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AudioChunk {
    /// Source timestamp from the wire frame, microseconds
    pub timestamp_micros: i64,
    /// Interleaved little-endian PCM bytes
    pub pcm: Vec<u8>,
}

impl AudioChunk {
    /// Create a chunk from a wire timestamp and PCM payload
    pub fn new(timestamp_micros: i64, pcm: Vec<u8>) -> Self {
        Self {
            timestamp_micros,
            pcm,
        }
    }

    /// Payload length in bytes
    pub fn len(&self) -> usize {
        self.pcm.len()
    }

    /// True when the payload is empty
    pub fn is_empty(&self) -> bool {
        self.pcm.is_empty()
    }
}
