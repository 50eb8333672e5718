// ABOUTME: PCM decoder implementation
// ABOUTME: Supports 16-bit and 24-bit little-endian PCM into pooled buffers

use crate::audio::decode::Decoder;
use crate::audio::Sample;
use crate::error::Error;

/// Decoder for interleaved little-endian PCM
pub struct PcmDecoder {
    bit_depth: u8,
}

impl PcmDecoder {
    /// Create a decoder for the given bit depth (16 or 24)
    pub fn new(bit_depth: u8) -> Self {
        Self { bit_depth }
    }
}

impl Decoder for PcmDecoder {
    fn decode_into(&self, data: &[u8], out: &mut Vec<Sample>) -> Result<(), Error> {
        out.clear();
        match self.bit_depth {
            16 => {
                out.reserve(data.len() / 2);
                for c in data.chunks_exact(2) {
                    out.push(Sample::from_i16(i16::from_le_bytes([c[0], c[1]])));
                }
                Ok(())
            }
            24 => {
                out.reserve(data.len() / 3);
                for c in data.chunks_exact(3) {
                    out.push(Sample::from_i24_le([c[0], c[1], c[2]]));
                }
                Ok(())
            }
            other => Err(Error::Protocol(format!("Unsupported bit depth: {}", other))),
        }
    }
}
