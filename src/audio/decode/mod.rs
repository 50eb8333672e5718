// ABOUTME: Audio decoder implementations
// ABOUTME: PCM only; the wire format carries uncompressed samples

/// PCM decoder implementation
pub mod pcm;

pub use pcm::PcmDecoder;

use crate::audio::Sample;
use crate::error::Error;

/// Decoder trait for audio payloads
pub trait Decoder {
    /// Decode raw audio bytes into `out`, reusing its capacity.
    ///
    /// `out` is cleared first; on success it holds the decoded samples.
    fn decode_into(&self, data: &[u8], out: &mut Vec<Sample>) -> Result<(), Error>;
}
