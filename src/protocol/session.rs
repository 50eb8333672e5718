// ABOUTME: Transport session for the remote-speaker connection
// ABOUTME: Handshake, control dispatch, heartbeat, and reconnection

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::audio::{AudioChunk, AudioFormat, VolumeState};
use crate::error::Error;
use crate::player::{PlaybackState, PlayerHandle};
use crate::protocol::frame::{self, Decoded, AUDIO_FRAME_TYPE};
use crate::protocol::messages::{
    Auth, AudioFormatSpec, ClientGoodbye, ClientHello, ClientState, ClientTime, Message,
    PlayerStateInfo, PlayerSupport, PlayerSyncState, Pong,
};
use crate::sync::clock::{now_micros, ClockSync};
use crate::sync::SyncQuality;
use crate::Result;

/// Protocol version spoken by this client
pub const PROTOCOL_VERSION: u32 = 1;

type WsWrite = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, WsMessage>;
type WsRead = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Connection state of a transport session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection, none in progress
    Disconnected,
    /// A connection attempt is in flight
    Connecting,
    /// Handshake complete, audio and control flowing
    Connected,
    /// The last connection attempt or connection failed
    Error,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Error => "error",
        };
        f.write_str(s)
    }
}

/// Stable player identity, created once per installation
#[derive(Debug, Clone)]
pub struct SessionIdentity {
    /// Persistent player id, stable across reconnects and restarts
    pub player_id: String,
    /// Human-readable player name
    pub player_name: String,
}

impl SessionIdentity {
    /// Generate a fresh identity with a random player id
    pub fn generate(player_name: impl Into<String>) -> Self {
        Self {
            player_id: uuid::Uuid::new_v4().to_string(),
            player_name: player_name.into(),
        }
    }
}

/// Session configuration, injected at construction
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Player identity announced in `client/hello`
    pub identity: SessionIdentity,
    /// Optional proxy/session token; triggers the `auth` exchange when set
    pub auth_token: Option<String>,
    /// The one audio format this player accepts
    pub format: AudioFormat,
    /// Buffer capacity declared in `client/hello`, in chunks
    pub buffer_capacity: u32,
    /// Bounded wait for `server/hello` and `auth_ok`
    pub hello_timeout: Duration,
    /// Heartbeat (`client/time`) interval
    pub heartbeat_interval: Duration,
    /// Fixed delay before a scheduled reconnect attempt
    pub reconnect_delay: Duration,
}

impl SessionConfig {
    /// Config with protocol-default timings for the given identity
    pub fn new(identity: SessionIdentity) -> Self {
        Self {
            identity,
            auth_token: None,
            format: AudioFormat::default(),
            buffer_capacity: 64,
            hello_timeout: Duration::from_secs(5),
            heartbeat_interval: Duration::from_secs(30),
            reconnect_delay: Duration::from_secs(5),
        }
    }
}

/// One full-duplex connection to the audio server.
///
/// Owns the socket and keeps the playback engine fed with ordered audio
/// chunks and lifecycle events. Cloning shares the same session.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    config: SessionConfig,
    player: PlayerHandle,
    volume: VolumeState,
    conn_tx: watch::Sender<ConnectionState>,
    clock: Mutex<ClockSync>,
    outbound: Mutex<Option<mpsc::Sender<Message>>>,
    last_url: Mutex<Option<String>>,
    reconnect_pending: AtomicBool,
    graceful_close: AtomicBool,
    disposed: AtomicBool,
}

impl Session {
    /// Create a session around an engine handle and shared volume state
    pub fn new(config: SessionConfig, player: PlayerHandle, volume: VolumeState) -> Self {
        let (conn_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            inner: Arc::new(SessionInner {
                config,
                player,
                volume,
                conn_tx,
                clock: Mutex::new(ClockSync::new()),
                outbound: Mutex::new(None),
                last_url: Mutex::new(None),
                reconnect_pending: AtomicBool::new(false),
                graceful_close: AtomicBool::new(false),
                disposed: AtomicBool::new(false),
            }),
        }
    }

    /// Current connection state
    pub fn connection_state(&self) -> ConnectionState {
        *self.inner.conn_tx.borrow()
    }

    /// Watch feed of connection state changes
    pub fn connection_states(&self) -> watch::Receiver<ConnectionState> {
        self.inner.conn_tx.subscribe()
    }

    /// Current clock synchronization quality
    pub fn clock_quality(&self) -> SyncQuality {
        self.inner.clock.lock().quality()
    }

    /// Connect to the audio server and complete the handshake.
    ///
    /// Concurrent calls are deduplicated: exactly one attempt is in flight at
    /// a time, and callers joining a pending attempt receive its eventual
    /// outcome. A no-op when already connected or disposed.
    pub async fn connect(&self, url: &str) -> Result<()> {
        if self.inner.disposed.load(Ordering::Relaxed) {
            return Err(Error::Closed);
        }

        let became_connector = self.inner.conn_tx.send_if_modified(|s| match *s {
            ConnectionState::Connecting | ConnectionState::Connected => false,
            _ => {
                *s = ConnectionState::Connecting;
                true
            }
        });
        if !became_connector {
            return match self.connection_state() {
                ConnectionState::Connected => Ok(()),
                _ => self.join_pending_attempt().await,
            };
        }

        match self.do_connect(url).await {
            Ok(()) => Ok(()),
            Err(e) => {
                log::warn!("connection attempt to {} failed: {}", url, e);
                self.inner.conn_tx.send_replace(ConnectionState::Error);
                // Retries only make sense once a URL has worked before
                self.schedule_reconnect();
                Err(e)
            }
        }
    }

    /// Gracefully close the connection. Sends a best-effort goodbye and never
    /// fails, even when the socket is already gone.
    pub async fn disconnect(&self) {
        self.inner.graceful_close.store(true, Ordering::Relaxed);
        let outbound = self.inner.outbound.lock().take();
        if let Some(tx) = outbound {
            let goodbye = Message::ClientGoodbye(ClientGoodbye {
                reason: "client disconnect".to_string(),
            });
            let _ = tx.send(goodbye).await;
        }
        self.inner
            .conn_tx
            .send_replace(ConnectionState::Disconnected);
    }

    /// Tear the session down: disconnect and dispose the playback engine.
    /// Idempotent; scheduled reconnects are abandoned.
    pub async fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::Relaxed) {
            return;
        }
        self.disconnect().await;
        self.inner.player.dispose().await;
    }

    async fn join_pending_attempt(&self) -> Result<()> {
        let mut rx = self.inner.conn_tx.subscribe();
        loop {
            match *rx.borrow_and_update() {
                ConnectionState::Connected => return Ok(()),
                ConnectionState::Disconnected | ConnectionState::Error => {
                    return Err(Error::Connection("connection attempt failed".to_string()))
                }
                ConnectionState::Connecting => {}
            }
            if rx.changed().await.is_err() {
                return Err(Error::Closed);
            }
        }
    }

    async fn do_connect(&self, url: &str) -> Result<()> {
        let cfg = &self.inner.config;

        let (ws, _) = timeout(cfg.hello_timeout, connect_async(url))
            .await
            .map_err(|_| Error::Connection(format!("timed out connecting to {}", url)))?
            .map_err(|e| Error::Connection(e.to_string()))?;
        let (mut write, mut read) = ws.split();

        // Optional proxy auth precedes the hello
        if let Some(token) = &cfg.auth_token {
            send_text(
                &mut write,
                &Message::Auth(Auth {
                    token: token.clone(),
                }),
            )
            .await?;
            timeout(cfg.hello_timeout, await_auth_ok(&mut read))
                .await
                .map_err(|_| Error::Connection("timed out waiting for auth_ok".to_string()))??;
        }

        send_text(&mut write, &Message::ClientHello(self.client_hello())).await?;

        let server_hello = timeout(cfg.hello_timeout, await_server_hello(&mut read))
            .await
            .map_err(|_| Error::Connection("timed out waiting for server/hello".to_string()))??;
        log::info!(
            "connected to server: {} (v{})",
            server_hello.name,
            server_hello.version
        );

        // Exactly one state report and one clock sample before going public
        send_text(&mut write, &Message::ClientState(self.state_report())).await?;
        send_text(
            &mut write,
            &Message::ClientTime(ClientTime {
                client_transmitted: now_micros(),
            }),
        )
        .await?;

        *self.inner.last_url.lock() = Some(url.to_string());
        self.inner.graceful_close.store(false, Ordering::Relaxed);

        let (out_tx, out_rx) = mpsc::channel(32);
        let heartbeat_tx = out_tx.downgrade();
        *self.inner.outbound.lock() = Some(out_tx);
        self.inner.conn_tx.send_replace(ConnectionState::Connected);

        tokio::spawn(write_loop(write, out_rx));
        tokio::spawn(self.clone().heartbeat_loop(heartbeat_tx));
        tokio::spawn(self.clone().read_loop(read));
        Ok(())
    }

    fn client_hello(&self) -> ClientHello {
        let cfg = &self.inner.config;
        ClientHello {
            client_id: cfg.identity.player_id.clone(),
            name: cfg.identity.player_name.clone(),
            version: PROTOCOL_VERSION,
            supported_roles: vec!["player".to_string()],
            player_support: Some(PlayerSupport {
                supported_formats: vec![AudioFormatSpec {
                    codec: "pcm".to_string(),
                    channels: cfg.format.channels,
                    sample_rate: cfg.format.sample_rate,
                    bit_depth: cfg.format.bit_depth,
                }],
                buffer_capacity: cfg.buffer_capacity,
                supported_commands: vec![
                    "play".to_string(),
                    "pause".to_string(),
                    "stop".to_string(),
                    "seek".to_string(),
                    "volume".to_string(),
                ],
            }),
        }
    }

    fn state_report(&self) -> ClientState {
        let (volume, muted) = self.inner.volume.snapshot();
        let state = match self.inner.player.state() {
            PlaybackState::Error => PlayerSyncState::Error,
            _ => PlayerSyncState::Synchronized,
        };
        ClientState {
            player: PlayerStateInfo {
                state,
                volume,
                muted,
            },
        }
    }

    /// Queue a message for the write loop; a no-op when disconnected
    async fn send(&self, message: Message) {
        let outbound = self.inner.outbound.lock().clone();
        match outbound {
            Some(tx) => {
                if tx.send(message).await.is_err() {
                    log::debug!("outbound channel closed, message dropped");
                }
            }
            None => log::debug!("not connected, message dropped"),
        }
    }

    /// Periodic `client/time` for the connection owning `out_tx`. The weak
    /// sender pins the loop to that one connection: once its channel is gone
    /// the loop exits, so a reconnect never accumulates heartbeat tasks.
    async fn heartbeat_loop(self, out_tx: mpsc::WeakSender<Message>) {
        let mut interval = tokio::time::interval(self.inner.config.heartbeat_interval);
        interval.tick().await; // immediate first tick; one was sent at handshake
        loop {
            interval.tick().await;
            let Some(tx) = out_tx.upgrade() else {
                break;
            };
            let sample = Message::ClientTime(ClientTime {
                client_transmitted: now_micros(),
            });
            if tx.send(sample).await.is_err() {
                break;
            }
        }
    }

    async fn read_loop(self, mut read: WsRead) {
        while let Some(item) = read.next().await {
            match item {
                Ok(WsMessage::Text(text)) => self.handle_text(&text).await,
                Ok(WsMessage::Binary(data)) => self.handle_binary(&data).await,
                Ok(WsMessage::Close(_)) => {
                    log::info!("server closed the connection");
                    break;
                }
                Ok(_) => {} // transport-level ping/pong, handled by tungstenite
                Err(e) => {
                    log::warn!("socket error: {}", e);
                    break;
                }
            }
        }
        self.on_connection_lost().await;
    }

    async fn handle_text(&self, text: &str) {
        let decoded = match frame::decode_text(text) {
            Ok(decoded) => decoded,
            Err(e) => {
                // Single message discarded; the connection continues
                log::warn!("discarding malformed control message: {}", e);
                return;
            }
        };
        let message = match decoded {
            Decoded::Control(message) => *message,
            Decoded::Unknown { message_type } => {
                log::debug!("ignoring unknown control message type {:?}", message_type);
                return;
            }
        };
        self.dispatch(message).await;
    }

    async fn dispatch(&self, message: Message) {
        let player = &self.inner.player;
        match message {
            Message::ServerTime(st) => {
                let received = now_micros();
                self.inner.clock.lock().update(
                    st.client_transmitted,
                    st.server_received,
                    st.server_transmitted,
                    received,
                );
            }
            Message::StreamStart(s) => player.stream_start(s.track).await,
            Message::StreamEnd(_) => player.stream_end().await,
            Message::Play(_) => {
                if let Err(e) = player.play().await {
                    log::warn!("play command rejected: {}", e);
                }
            }
            Message::Pause(_) => {
                if let Err(e) = player.pause().await {
                    log::warn!("pause command rejected: {}", e);
                }
            }
            Message::Stop(_) => {
                if let Err(e) = player.stop().await {
                    log::warn!("stop command rejected: {}", e);
                }
            }
            Message::Seek(s) => {
                if let Err(e) = player.set_position(Duration::from_millis(s.position)).await {
                    log::warn!("seek command rejected: {}", e);
                }
            }
            Message::Volume(v) => {
                self.inner.volume.set_value(v.level);
                self.send(Message::ClientState(self.state_report())).await;
            }
            Message::Ping(_) => self.send(Message::Pong(Pong {})).await,
            Message::GroupUpdate(value) => {
                log::debug!("group update: {}", value);
            }
            other => {
                log::debug!("ignoring unexpected server message: {:?}", other);
            }
        }
    }

    async fn handle_binary(&self, data: &[u8]) {
        let frame = match frame::decode_binary(data) {
            Ok(frame) => frame,
            Err(e) => {
                log::warn!("dropping malformed binary frame: {}", e);
                return;
            }
        };
        if frame.frame_type != AUDIO_FRAME_TYPE {
            log::debug!("dropping binary frame of type {}", frame.frame_type);
            return;
        }
        let chunk = AudioChunk::new(frame.timestamp_micros, frame.payload);
        if self.inner.player.push_chunk(chunk).await.is_err() {
            log::debug!("player engine gone, audio chunk dropped");
        }
    }

    async fn on_connection_lost(&self) {
        *self.inner.outbound.lock() = None;
        if self.inner.graceful_close.swap(false, Ordering::Relaxed) {
            return;
        }
        self.inner
            .conn_tx
            .send_replace(ConnectionState::Disconnected);
        self.schedule_reconnect();
    }

    /// Schedule exactly one reconnect attempt after the configured delay,
    /// targeting the last successfully connected URL
    fn schedule_reconnect(&self) {
        if self.inner.disposed.load(Ordering::Relaxed) {
            return;
        }
        let Some(url) = self.inner.last_url.lock().clone() else {
            return;
        };
        if self.inner.reconnect_pending.swap(true, Ordering::Relaxed) {
            return;
        }
        let session = self.clone();
        let delay = self.inner.config.reconnect_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            session.inner.reconnect_pending.store(false, Ordering::Relaxed);
            if session.inner.disposed.load(Ordering::Relaxed) {
                return;
            }
            match session.connection_state() {
                ConnectionState::Connected | ConnectionState::Connecting => return,
                _ => {}
            }
            log::info!("reconnecting to {}", url);
            if let Err(e) = session.connect(&url).await {
                log::warn!("reconnect failed: {}", e);
            }
        });
    }
}

async fn send_text(write: &mut WsWrite, message: &Message) -> Result<()> {
    let json = frame::encode(message)?;
    write
        .send(WsMessage::Text(json))
        .await
        .map_err(|e| Error::WebSocket(e.to_string()))
}

async fn await_server_hello(
    read: &mut WsRead,
) -> Result<crate::protocol::messages::ServerHello> {
    loop {
        match read.next().await {
            Some(Ok(WsMessage::Text(text))) => match frame::decode_text(&text) {
                Ok(Decoded::Control(message)) => {
                    if let Message::ServerHello(hello) = *message {
                        return Ok(hello);
                    }
                    log::debug!("ignoring pre-hello message");
                }
                Ok(Decoded::Unknown { message_type }) => {
                    log::debug!("ignoring unknown pre-hello message {:?}", message_type);
                }
                Err(e) => log::warn!("discarding malformed pre-hello message: {}", e),
            },
            Some(Ok(WsMessage::Close(_))) | None => {
                return Err(Error::Connection(
                    "socket closed during handshake".to_string(),
                ))
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => return Err(Error::Connection(e.to_string())),
        }
    }
}

async fn await_auth_ok(read: &mut WsRead) -> Result<()> {
    loop {
        match read.next().await {
            Some(Ok(WsMessage::Text(text))) => match frame::decode_text(&text) {
                Ok(Decoded::Control(message)) => {
                    if matches!(*message, Message::AuthOk(_)) {
                        return Ok(());
                    }
                    log::debug!("ignoring pre-auth message");
                }
                Ok(Decoded::Unknown { message_type }) => {
                    log::debug!("ignoring unknown pre-auth message {:?}", message_type);
                }
                Err(e) => log::warn!("discarding malformed pre-auth message: {}", e),
            },
            Some(Ok(WsMessage::Close(_))) | None => {
                return Err(Error::Connection("socket closed during auth".to_string()))
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => return Err(Error::Connection(e.to_string())),
        }
    }
}

async fn write_loop(mut write: WsWrite, mut out_rx: mpsc::Receiver<Message>) {
    while let Some(message) = out_rx.recv().await {
        let json = match frame::encode(&message) {
            Ok(json) => json,
            Err(e) => {
                log::warn!("failed to encode outbound message: {}", e);
                continue;
            }
        };
        if let Err(e) = write.send(WsMessage::Text(json)).await {
            log::warn!("outbound send failed: {}", e);
            break;
        }
    }
    let _ = write.close().await;
}
