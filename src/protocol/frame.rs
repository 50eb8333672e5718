// ABOUTME: Frame codec for the wire protocol
// ABOUTME: Binary audio-frame header decode and JSON control-message envelope

use crate::error::Error;
use crate::protocol::messages::Message;
use crate::Result;
use serde::Deserialize;

/// Binary frame type value carrying PCM audio
pub const AUDIO_FRAME_TYPE: u8 = 4;

/// Minimum length of a valid binary frame: type byte + 8-byte timestamp +
/// at least one 16-bit sample
pub const MIN_BINARY_FRAME_LEN: usize = 11;

/// A decoded binary wire frame. Never retained; the payload is moved into an
/// [`crate::audio::AudioChunk`] immediately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryFrame {
    /// Frame type byte; only [`AUDIO_FRAME_TYPE`] carries audio
    pub frame_type: u8,
    /// Source timestamp in microseconds, little-endian on the wire
    pub timestamp_micros: i64,
    /// Interleaved PCM payload bytes
    pub payload: Vec<u8>,
}

/// Outcome of decoding a text frame
#[derive(Debug)]
pub enum Decoded {
    /// A control message this client understands
    Control(Box<Message>),
    /// A well-formed envelope with an unrecognized `type`; the protocol is
    /// forward-compatible, so the caller logs and ignores it
    Unknown {
        /// The unrecognized type string
        message_type: String,
    },
}

#[derive(Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type")]
    message_type: String,
    #[serde(default)]
    payload: serde_json::Value,
}

/// Decode a binary transport frame.
///
/// Fails on frames shorter than [`MIN_BINARY_FRAME_LEN`]. Non-audio type
/// values decode successfully; the caller decides to drop them.
pub fn decode_binary(data: &[u8]) -> Result<BinaryFrame> {
    if data.len() < MIN_BINARY_FRAME_LEN {
        return Err(Error::Protocol(format!(
            "binary frame too short: {} bytes",
            data.len()
        )));
    }

    let frame_type = data[0];
    let mut ts = [0u8; 8];
    ts.copy_from_slice(&data[1..9]);
    let timestamp_micros = i64::from_le_bytes(ts);

    Ok(BinaryFrame {
        frame_type,
        timestamp_micros,
        payload: data[9..].to_vec(),
    })
}

/// Decode a text transport frame into a control message.
///
/// The envelope must be JSON with a string `type` field; anything else is a
/// protocol error and the single message is discarded by the caller. A known
/// envelope whose payload fails typed decoding is also a protocol error.
pub fn decode_text(text: &str) -> Result<Decoded> {
    let raw: RawEnvelope = serde_json::from_str(text)
        .map_err(|e| Error::Protocol(format!("bad control envelope: {}", e)))?;

    let mut value = serde_json::Map::new();
    value.insert(
        "type".to_string(),
        serde_json::Value::String(raw.message_type.clone()),
    );
    // Tolerate absent payloads on empty-bodied messages like `ping`
    let payload = if raw.payload.is_null() {
        serde_json::json!({})
    } else {
        raw.payload
    };
    value.insert("payload".to_string(), payload);

    match serde_json::from_value::<Message>(serde_json::Value::Object(value)) {
        Ok(msg) => Ok(Decoded::Control(Box::new(msg))),
        Err(e) => {
            if is_known_type(&raw.message_type) {
                Err(Error::Protocol(format!(
                    "bad {} payload: {}",
                    raw.message_type, e
                )))
            } else {
                Ok(Decoded::Unknown {
                    message_type: raw.message_type,
                })
            }
        }
    }
}

/// Serialize a control message to compact JSON.
///
/// There is no binary encoder: the client never emits audio.
pub fn encode(message: &Message) -> Result<String> {
    serde_json::to_string(message).map_err(|e| Error::Protocol(format!("encode failed: {}", e)))
}

fn is_known_type(message_type: &str) -> bool {
    matches!(
        message_type,
        "client/hello"
            | "server/hello"
            | "client/state"
            | "client/time"
            | "server/time"
            | "stream/start"
            | "stream/end"
            | "group/update"
            | "play"
            | "pause"
            | "stop"
            | "seek"
            | "volume"
            | "ping"
            | "pong"
            | "client/goodbye"
            | "auth"
            | "auth_ok"
    )
}
