// ABOUTME: Protocol message type definitions and serialization
// ABOUTME: Supports client/hello, server/hello, stream/start, playback commands, etc.

use serde::{Deserialize, Serialize};

/// Top-level protocol message envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Message {
    /// Client side of the handshake
    #[serde(rename = "client/hello")]
    ClientHello(ClientHello),

    /// Server handshake ack
    #[serde(rename = "server/hello")]
    ServerHello(ServerHello),

    /// Player state report
    #[serde(rename = "client/state")]
    ClientState(ClientState),

    /// Client clock sample
    #[serde(rename = "client/time")]
    ClientTime(ClientTime),

    /// Server clock reply
    #[serde(rename = "server/time")]
    ServerTime(ServerTime),

    /// A new audio stream begins
    #[serde(rename = "stream/start")]
    StreamStart(StreamStart),

    /// No more audio is coming for the current stream
    #[serde(rename = "stream/end")]
    StreamEnd(StreamEnd),

    /// Group membership update, informational
    #[serde(rename = "group/update")]
    GroupUpdate(serde_json::Value),

    /// Begin or resume playback
    #[serde(rename = "play")]
    Play(Play),

    /// Pause playback
    #[serde(rename = "pause")]
    Pause(Pause),

    /// Stop playback
    #[serde(rename = "stop")]
    Stop(Stop),

    /// Jump the playback position
    #[serde(rename = "seek")]
    Seek(Seek),

    /// Set the player volume
    #[serde(rename = "volume")]
    Volume(Volume),

    /// Liveness probe
    #[serde(rename = "ping")]
    Ping(Ping),

    /// Liveness reply
    #[serde(rename = "pong")]
    Pong(Pong),

    /// Graceful disconnect notice
    #[serde(rename = "client/goodbye")]
    ClientGoodbye(ClientGoodbye),

    /// Proxy/session authentication, sent before the hello
    #[serde(rename = "auth")]
    Auth(Auth),

    /// Authentication accepted
    #[serde(rename = "auth_ok")]
    AuthOk(AuthOk),
}

/// Client hello message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientHello {
    /// Persistent player id, stable across reconnects and restarts
    pub client_id: String,
    /// Human-readable player name
    pub name: String,
    /// Protocol version
    pub version: u32,
    /// Roles this client implements
    pub supported_roles: Vec<String>,
    /// Player capabilities
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player_support: Option<PlayerSupport>,
}

/// Declared player capabilities inside `client/hello`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerSupport {
    /// Audio formats the player can consume
    pub supported_formats: Vec<AudioFormatSpec>,
    /// Maximum chunks the player is willing to buffer
    pub buffer_capacity: u32,
    /// Playback commands the player accepts
    pub supported_commands: Vec<String>,
}

/// One audio format declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioFormatSpec {
    /// Codec name, e.g. "pcm"
    pub codec: String,
    /// Channel count
    pub channels: u8,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Bits per sample
    pub bit_depth: u8,
}

/// Server hello message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerHello {
    /// Server name
    pub name: String,
    /// Protocol version
    pub version: u32,
    /// Roles the server granted
    #[serde(default)]
    pub active_roles: Vec<String>,
}

/// Player state report sent to the server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientState {
    /// Player sub-object
    pub player: PlayerStateInfo,
}

/// The player portion of a `client/state` report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerStateInfo {
    /// Coarse player condition
    pub state: PlayerSyncState,
    /// Volume percent, 0-100
    pub volume: u8,
    /// Mute flag
    pub muted: bool,
}

/// Coarse player condition as reported upstream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerSyncState {
    /// Following the server's stream normally
    Synchronized,
    /// The playback engine is in an error state
    Error,
    /// Audio is being produced by another source
    ExternalSource,
}

/// Client clock sample
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientTime {
    /// Device clock at transmission, Unix microseconds
    pub client_transmitted: i64,
}

/// Server clock reply
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerTime {
    /// Echo of the client's transmission timestamp
    pub client_transmitted: i64,
    /// Server clock when the sample arrived
    pub server_received: i64,
    /// Server clock when the reply left
    pub server_transmitted: i64,
}

/// Track metadata attached to streams and play commands
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Track {
    /// Track title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Artist name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    /// Album name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    /// Duration in milliseconds, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

/// Stream start notice
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamStart {
    /// Metadata for the starting track, when the server has it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track: Option<Track>,
}

/// Stream end notice
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamEnd {}

/// Play command
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Play {
    /// Source URL, informational for a remote speaker
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Track metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track: Option<Track>,
}

/// Pause command
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Pause {}

/// Stop command
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Stop {}

/// Seek command
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Seek {
    /// Target position in milliseconds
    pub position: u64,
}

/// Volume command
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Volume {
    /// Volume percent, 0-100
    pub level: u8,
}

/// Liveness probe
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Ping {}

/// Liveness reply
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Pong {}

/// Graceful disconnect notice
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientGoodbye {
    /// Why the client is leaving
    pub reason: String,
}

/// Proxy/session authentication
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Auth {
    /// Opaque session token
    pub token: String,
}

/// Authentication accepted
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthOk {}
