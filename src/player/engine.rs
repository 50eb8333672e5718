// ABOUTME: Playback engine: buffering, bounded feed loop, pause/resume state machine
// ABOUTME: Actor task owning the chunk buffer, driven through a cloneable handle

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::Either;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::timeout;

use crate::audio::decode::{Decoder, PcmDecoder};
use crate::audio::{
    AudioChunk, AudioFormat, AudioSink, BufferPool, FeedRequest, Sample, SinkError, VolumeState,
};
use crate::error::Error;
use crate::player::state::PlaybackState;
use crate::protocol::messages::Track;
use crate::Result;

/// Tunables for the playback engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum chunks drained per feed invocation; this bound, not wall-clock
    /// time, is what keeps pause latency capped
    pub max_chunks_per_feed: usize,
    /// Bounded wait for an in-flight feed during pause/stop/dispose
    pub feed_wait: Duration,
    /// Bounded wait for the sink to release
    pub release_wait: Duration,
    /// Buffered-frames threshold below which the sink requests more audio
    pub feed_threshold_frames: u32,
    /// Interval for republishing the computed elapsed position while playing
    pub position_interval: Duration,
    /// Capacity of the chunk intake channel
    pub intake_capacity: usize,
    /// Number of pre-allocated sample buffers in the pool
    pub pool_size: usize,
    /// Capacity of each pooled buffer, in samples
    pub pool_buffer_samples: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_chunks_per_feed: 8,
            feed_wait: Duration::from_millis(250),
            release_wait: Duration::from_millis(500),
            feed_threshold_frames: 4_800,
            position_interval: Duration::from_millis(500),
            intake_capacity: 64,
            pool_size: 16,
            pool_buffer_samples: 9_600,
        }
    }
}

/// Events surfaced by the engine outside the state/position feeds
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// A feed operation failed after recovery was exhausted
    FeedError(String),
    /// The buffer emptied after a `stream/end`
    Drained,
}

enum Command {
    Initialize {
        format: AudioFormat,
        reply: oneshot::Sender<Result<()>>,
    },
    Play {
        reply: oneshot::Sender<Result<()>>,
    },
    Pause {
        reply: oneshot::Sender<Result<()>>,
    },
    Stop {
        reply: oneshot::Sender<Result<()>>,
    },
    SetPosition {
        position: Duration,
        reply: oneshot::Sender<Result<()>>,
    },
    ResetPosition {
        reply: oneshot::Sender<Result<()>>,
    },
    StreamStart {
        track: Option<Track>,
    },
    StreamEnd,
    Dispose {
        reply: oneshot::Sender<()>,
    },
}

/// Cloneable handle to a running [`PlayerEngine`] task.
///
/// The transport pushes decoded chunks through [`push_chunk`](Self::push_chunk)
/// and lifecycle notices through the `stream_*` methods; the UI/command layer
/// uses the playback operations and the state/position feeds.
#[derive(Clone)]
pub struct PlayerHandle {
    cmd_tx: mpsc::Sender<Command>,
    intake_tx: mpsc::Sender<AudioChunk>,
    state_rx: watch::Receiver<PlaybackState>,
    position_rx: watch::Receiver<Duration>,
    events_tx: broadcast::Sender<EngineEvent>,
}

impl PlayerHandle {
    /// Configure the sink for a fixed format and move to `ready`
    pub async fn initialize(&self, format: AudioFormat) -> Result<()> {
        self.request(|reply| Command::Initialize { format, reply })
            .await
    }

    /// Start or resume playback
    pub async fn play(&self) -> Result<()> {
        self.request(|reply| Command::Play { reply }).await
    }

    /// Pause playback. Returns with state `paused` within the configured
    /// bounded wait even if a feed operation was in flight.
    pub async fn pause(&self) -> Result<()> {
        self.request(|reply| Command::Pause { reply }).await
    }

    /// Stop playback, reset counters, and return to `ready`
    pub async fn stop(&self) -> Result<()> {
        self.request(|reply| Command::Stop { reply }).await
    }

    /// Jump the elapsed-position counters to `position`
    pub async fn set_position(&self, position: Duration) -> Result<()> {
        self.request(|reply| Command::SetPosition { position, reply })
            .await
    }

    /// Zero the elapsed-position counters without touching buffer or state
    pub async fn reset_position(&self) -> Result<()> {
        self.request(|reply| Command::ResetPosition { reply }).await
    }

    /// Transport notice: a new stream begins; start accepting audio
    pub async fn stream_start(&self, track: Option<Track>) {
        let _ = self.cmd_tx.send(Command::StreamStart { track }).await;
    }

    /// Transport notice: no more audio is coming; let the buffer drain
    pub async fn stream_end(&self) {
        let _ = self.cmd_tx.send(Command::StreamEnd).await;
    }

    /// Push one decoded chunk into the engine's intake, in arrival order
    pub async fn push_chunk(&self, chunk: AudioChunk) -> Result<()> {
        self.intake_tx.send(chunk).await.map_err(|_| Error::Closed)
    }

    /// Current playback state
    pub fn state(&self) -> PlaybackState {
        *self.state_rx.borrow()
    }

    /// Watch feed of playback state changes
    pub fn state_stream(&self) -> watch::Receiver<PlaybackState> {
        self.state_rx.clone()
    }

    /// Current computed elapsed position
    pub fn position(&self) -> Duration {
        *self.position_rx.borrow()
    }

    /// Watch feed of the elapsed position, republished while playing
    pub fn position_stream(&self) -> watch::Receiver<Duration> {
        self.position_rx.clone()
    }

    /// Subscribe to engine events (feed errors, drain notices)
    pub fn events(&self) -> broadcast::Receiver<EngineEvent> {
        self.events_tx.subscribe()
    }

    /// Tear the engine down. Idempotent and never fails; safe to call from
    /// any state, including after an error.
    pub async fn dispose(&self) {
        let (reply, rx) = oneshot::channel();
        if self.cmd_tx.send(Command::Dispose { reply }).await.is_ok() {
            let _ = rx.await;
        }
    }

    async fn request(&self, make: impl FnOnce(oneshot::Sender<Result<()>>) -> Command) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(make(reply))
            .await
            .map_err(|_| Error::Closed)?;
        rx.await.map_err(|_| Error::Closed)?
    }
}

/// The playback engine. Spawns an actor task that owns the chunk buffer and
/// the state machine; all interaction goes through the returned
/// [`PlayerHandle`].
pub struct PlayerEngine;

impl PlayerEngine {
    /// Spawn the engine task around an injected native sink
    pub fn spawn(
        sink: Arc<dyn AudioSink>,
        volume: VolumeState,
        config: EngineConfig,
    ) -> PlayerHandle {
        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        let (intake_tx, intake_rx) = mpsc::channel(config.intake_capacity);
        let (state_tx, state_rx) = watch::channel(PlaybackState::Idle);
        let (position_tx, position_rx) = watch::channel(Duration::ZERO);
        let (events_tx, _) = broadcast::channel(16);
        let (feed_req_tx, feed_req_rx) = mpsc::channel(16);

        let pool = BufferPool::new(config.pool_size, config.pool_buffer_samples);
        let engine = Engine {
            cfg: config,
            sink,
            volume,
            pool,
            format: AudioFormat::default(),
            state_tx,
            position_tx,
            events_tx: events_tx.clone(),
            feed_req_tx,
            chunks: VecDeque::new(),
            bytes_fed: Arc::new(AtomicU64::new(0)),
            feed: None,
            sink_armed: false,
            pending_stream_start: false,
            draining: false,
        };

        tokio::spawn(engine.run(cmd_rx, intake_rx, feed_req_rx));

        PlayerHandle {
            cmd_tx,
            intake_tx,
            state_rx,
            position_rx,
            events_tx,
        }
    }
}

struct FeedTask {
    cancel: Arc<AtomicBool>,
    handle: JoinHandle<FeedOutcome>,
}

struct FeedOutcome {
    cancelled: bool,
    error: Option<Error>,
    /// Chunks the invocation drained but never fed; re-buffered by the engine
    rest: Vec<AudioChunk>,
}

/// Everything a spawned feed invocation needs, detached from the engine
struct FeedContext {
    sink: Arc<dyn AudioSink>,
    format: AudioFormat,
    pool: BufferPool,
    volume: VolumeState,
    bytes_fed: Arc<AtomicU64>,
    cancel: Arc<AtomicBool>,
    feed_req_tx: mpsc::Sender<FeedRequest>,
}

struct Engine {
    cfg: EngineConfig,
    sink: Arc<dyn AudioSink>,
    volume: VolumeState,
    pool: BufferPool,
    format: AudioFormat,
    state_tx: watch::Sender<PlaybackState>,
    position_tx: watch::Sender<Duration>,
    events_tx: broadcast::Sender<EngineEvent>,
    feed_req_tx: mpsc::Sender<FeedRequest>,
    chunks: VecDeque<AudioChunk>,
    bytes_fed: Arc<AtomicU64>,
    feed: Option<FeedTask>,
    sink_armed: bool,
    pending_stream_start: bool,
    draining: bool,
}

enum Step {
    Cmd(Option<Command>),
    Chunk(Option<AudioChunk>),
    FeedDone(std::result::Result<FeedOutcome, JoinError>),
    FeedRequest,
    Tick,
}

impl Engine {
    async fn run(
        mut self,
        mut cmd_rx: mpsc::Receiver<Command>,
        mut intake_rx: mpsc::Receiver<AudioChunk>,
        mut feed_req_rx: mpsc::Receiver<FeedRequest>,
    ) {
        let mut ticker = tokio::time::interval(self.cfg.position_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            let step = {
                let feed_done = match self.feed.as_mut() {
                    Some(task) => Either::Left(&mut task.handle),
                    None => {
                        Either::Right(std::future::pending::<std::result::Result<FeedOutcome, JoinError>>())
                    }
                };
                tokio::select! {
                    biased;
                    cmd = cmd_rx.recv() => Step::Cmd(cmd),
                    res = feed_done => Step::FeedDone(res),
                    req = feed_req_rx.recv() => match req {
                        Some(_) => Step::FeedRequest,
                        None => continue,
                    },
                    chunk = intake_rx.recv() => Step::Chunk(chunk),
                    _ = ticker.tick() => Step::Tick,
                }
            };

            match step {
                Step::Cmd(Some(cmd)) => {
                    if self.handle_command(cmd).await {
                        break;
                    }
                }
                Step::Cmd(None) => {
                    // All handles dropped; tear down like a dispose
                    self.teardown().await;
                    break;
                }
                Step::Chunk(Some(chunk)) => self.handle_chunk(chunk).await,
                Step::Chunk(None) => {}
                Step::FeedDone(res) => self.on_feed_done(res),
                Step::FeedRequest => self.kick_feed(),
                Step::Tick => {
                    if self.state() == PlaybackState::Playing {
                        self.publish_position();
                    }
                }
            }
        }
    }

    fn state(&self) -> PlaybackState {
        *self.state_tx.borrow()
    }

    fn set_state(&self, state: PlaybackState) {
        let prev = self.state_tx.send_replace(state);
        if prev != state {
            log::debug!("playback state {} -> {}", prev, state);
        }
    }

    fn publish_position(&self) {
        let elapsed = self
            .format
            .duration_for_bytes(self.bytes_fed.load(Ordering::Relaxed));
        self.position_tx.send_replace(elapsed);
    }

    /// Returns true when the task should exit
    async fn handle_command(&mut self, cmd: Command) -> bool {
        match cmd {
            Command::Initialize { format, reply } => {
                let _ = reply.send(self.initialize(format).await);
            }
            Command::Play { reply } => {
                let _ = reply.send(self.play().await);
            }
            Command::Pause { reply } => {
                let _ = reply.send(self.pause().await);
            }
            Command::Stop { reply } => {
                let _ = reply.send(self.stop().await);
            }
            Command::SetPosition { position, reply } => {
                let _ = reply.send(self.set_position(position));
            }
            Command::ResetPosition { reply } => {
                self.bytes_fed.store(0, Ordering::Relaxed);
                self.position_tx.send_replace(Duration::ZERO);
                let _ = reply.send(Ok(()));
            }
            Command::StreamStart { track } => self.on_stream_start(track).await,
            Command::StreamEnd => {
                log::debug!("stream end, letting buffer drain");
                self.draining = true;
                if self.chunks.is_empty() && self.feed.is_none() {
                    self.draining = false;
                    let _ = self.events_tx.send(EngineEvent::Drained);
                }
            }
            Command::Dispose { reply } => {
                self.teardown().await;
                let _ = reply.send(());
                return true;
            }
        }
        false
    }

    async fn initialize(&mut self, format: AudioFormat) -> Result<()> {
        match self.state() {
            PlaybackState::Idle => {}
            other => {
                return Err(Error::InvalidState {
                    op: "initialize",
                    state: other.as_str(),
                })
            }
        }
        self.set_state(PlaybackState::Initializing);
        self.format = format;
        match self.arm_sink().await {
            Ok(()) => {
                self.set_state(PlaybackState::Ready);
                Ok(())
            }
            Err(e) => {
                self.set_state(PlaybackState::Error);
                Err(e)
            }
        }
    }

    async fn play(&mut self) -> Result<()> {
        match self.state() {
            PlaybackState::Playing => Ok(()),
            PlaybackState::Ready | PlaybackState::Paused => {
                self.set_state(PlaybackState::Resuming);
                match self.resume_sink().await {
                    Ok(()) => {
                        self.pending_stream_start = false;
                        self.set_state(PlaybackState::Playing);
                        self.kick_feed();
                        Ok(())
                    }
                    Err(e) => {
                        self.set_state(PlaybackState::Error);
                        Err(e)
                    }
                }
            }
            other => Err(Error::InvalidState {
                op: "play",
                state: other.as_str(),
            }),
        }
    }

    async fn pause(&mut self) -> Result<()> {
        match self.state() {
            PlaybackState::Paused => Ok(()),
            PlaybackState::Playing => {
                self.set_state(PlaybackState::Pausing);
                // Incoming chunks stop accumulating the moment pause begins
                self.chunks.clear();
                self.await_inflight_feed().await;
                self.release_sink().await;
                self.set_state(PlaybackState::Paused);
                Ok(())
            }
            other => Err(Error::InvalidState {
                op: "pause",
                state: other.as_str(),
            }),
        }
    }

    async fn stop(&mut self) -> Result<()> {
        match self.state() {
            PlaybackState::Ready => Ok(()),
            PlaybackState::Playing | PlaybackState::Paused => {
                self.set_state(PlaybackState::Stopping);
                self.chunks.clear();
                self.draining = false;
                self.pending_stream_start = false;
                self.await_inflight_feed().await;
                self.release_sink().await;
                self.bytes_fed.store(0, Ordering::Relaxed);
                self.position_tx.send_replace(Duration::ZERO);
                match self.arm_sink().await {
                    Ok(()) => {
                        self.set_state(PlaybackState::Ready);
                        Ok(())
                    }
                    Err(e) => {
                        self.set_state(PlaybackState::Error);
                        Err(e)
                    }
                }
            }
            other => Err(Error::InvalidState {
                op: "stop",
                state: other.as_str(),
            }),
        }
    }

    fn set_position(&mut self, position: Duration) -> Result<()> {
        let per_second = self.format.bytes_per_second() as u64;
        let bytes = position.as_micros() as u64 * per_second / 1_000_000;
        // Snap to a frame boundary so elapsed math stays exact
        let frame = self.format.bytes_per_frame() as u64;
        let bytes = if frame > 0 { bytes / frame * frame } else { bytes };
        self.bytes_fed.store(bytes, Ordering::Relaxed);
        self.publish_position();
        Ok(())
    }

    async fn on_stream_start(&mut self, track: Option<Track>) {
        if let Some(track) = &track {
            log::info!(
                "stream start: {} - {}",
                track.artist.as_deref().unwrap_or("?"),
                track.title.as_deref().unwrap_or("?")
            );
        } else {
            log::info!("stream start");
        }
        self.draining = false;
        match self.state() {
            PlaybackState::Ready => {
                self.bytes_fed.store(0, Ordering::Relaxed);
                self.position_tx.send_replace(Duration::ZERO);
                if let Err(e) = self.play().await {
                    log::warn!("stream start could not begin playback: {}", e);
                }
            }
            PlaybackState::Playing => {
                // New track on a running stream: position restarts
                self.bytes_fed.store(0, Ordering::Relaxed);
                self.position_tx.send_replace(Duration::ZERO);
            }
            PlaybackState::Paused | PlaybackState::Pausing => {
                // The server started a new stream before our pause fully
                // propagated. Arm the auto-recovery path: the next chunk
                // triggers an implicit resume. Heuristic, not a protocol
                // guarantee.
                self.pending_stream_start = true;
            }
            other => {
                log::debug!("ignoring stream start in state {}", other);
            }
        }
    }

    async fn handle_chunk(&mut self, chunk: AudioChunk) {
        match self.state() {
            PlaybackState::Playing => {
                self.chunks.push_back(chunk);
                self.kick_feed();
            }
            PlaybackState::Paused if self.pending_stream_start => {
                // Implicit resume: buffer the chunk, re-arm the sink, and
                // transition to playing
                self.chunks.push_back(chunk);
                self.set_state(PlaybackState::Resuming);
                match self.resume_sink().await {
                    Ok(()) => {
                        self.pending_stream_start = false;
                        self.bytes_fed.store(0, Ordering::Relaxed);
                        self.position_tx.send_replace(Duration::ZERO);
                        self.set_state(PlaybackState::Playing);
                        self.kick_feed();
                    }
                    Err(e) => {
                        log::error!("auto-recovery from pause failed: {}", e);
                        self.chunks.clear();
                        self.set_state(PlaybackState::Error);
                    }
                }
            }
            other => {
                log::trace!(
                    "dropping {} byte chunk in state {}",
                    chunk.len(),
                    other
                );
            }
        }
    }

    /// Start one feed invocation if playing, idle, and data is buffered.
    /// Exactly one feed operation may be outstanding at a time.
    fn kick_feed(&mut self) {
        if self.state() != PlaybackState::Playing
            || self.feed.is_some()
            || self.chunks.is_empty()
        {
            return;
        }
        let n = self.cfg.max_chunks_per_feed.min(self.chunks.len());
        let batch: Vec<AudioChunk> = self.chunks.drain(..n).collect();
        let cancel = Arc::new(AtomicBool::new(false));
        let ctx = FeedContext {
            sink: Arc::clone(&self.sink),
            format: self.format.clone(),
            pool: self.pool.clone(),
            volume: self.volume.clone(),
            bytes_fed: Arc::clone(&self.bytes_fed),
            cancel: Arc::clone(&cancel),
            feed_req_tx: self.feed_req_tx.clone(),
        };
        let handle = tokio::spawn(run_feed(ctx, batch));
        self.feed = Some(FeedTask { cancel, handle });
    }

    fn on_feed_done(&mut self, res: std::result::Result<FeedOutcome, JoinError>) {
        self.feed = None;
        match res {
            Ok(FeedOutcome {
                cancelled,
                error,
                rest,
            }) => {
                // The failed chunk is gone; its undelivered tail goes back to
                // the buffer head so playback continues where it left off
                for chunk in rest.into_iter().rev() {
                    self.chunks.push_front(chunk);
                }
                if let Some(err) = error {
                    log::warn!("feed failed: {}", err);
                    let _ = self.events_tx.send(EngineEvent::FeedError(err.to_string()));
                } else if cancelled {
                    log::debug!("feed cancelled mid-flight");
                }
            }
            Err(e) => {
                log::error!("feed task panicked: {}", e);
            }
        }
        self.publish_position();
        if self.state() == PlaybackState::Playing {
            if !self.chunks.is_empty() {
                self.kick_feed();
            } else if self.draining {
                self.draining = false;
                let _ = self.events_tx.send(EngineEvent::Drained);
            }
        }
    }

    /// Bounded wait for the in-flight feed; proceeds on timeout so pause,
    /// stop, and dispose are never unboundedly blocking
    async fn await_inflight_feed(&mut self) {
        if let Some(task) = self.feed.take() {
            task.cancel.store(true, Ordering::Relaxed);
            match timeout(self.cfg.feed_wait, task.handle).await {
                Ok(_) => {}
                Err(_) => log::warn!(
                    "in-flight feed did not finish within {:?}",
                    self.cfg.feed_wait
                ),
            }
            // The cancelled invocation may have fed more audio since the
            // last publish
            self.publish_position();
        }
    }

    async fn release_sink(&mut self) {
        match timeout(self.cfg.release_wait, self.sink.release()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => log::warn!("sink release failed: {}", e),
            // Audio has likely already stopped acoustically
            Err(_) => log::warn!("sink release timed out after {:?}", self.cfg.release_wait),
        }
        self.sink_armed = false;
    }

    async fn arm_sink(&mut self) -> Result<()> {
        self.sink
            .setup(&self.format, self.feed_req_tx.clone())
            .await
            .map_err(|e| Error::Sink(e.to_string()))?;
        self.sink.set_feed_threshold(self.cfg.feed_threshold_frames);
        self.sink_armed = true;
        Ok(())
    }

    async fn resume_sink(&mut self) -> Result<()> {
        if !self.sink_armed {
            self.arm_sink().await?;
        }
        self.sink
            .start()
            .await
            .map_err(|e| Error::Sink(e.to_string()))
    }

    async fn teardown(&mut self) {
        self.chunks.clear();
        self.await_inflight_feed().await;
        if self.sink_armed {
            self.release_sink().await;
        }
        self.set_state(PlaybackState::Idle);
    }
}

/// Feed one batch of chunks. A failure consumes only the failing chunk: the
/// undelivered tail comes back in `FeedOutcome::rest` so the engine can
/// continue with it. Cancellation drops the tail; the buffer is being
/// cleared anyway.
async fn run_feed(ctx: FeedContext, batch: Vec<AudioChunk>) -> FeedOutcome {
    let decoder = PcmDecoder::new(ctx.format.bit_depth);
    let mut batch = batch.into_iter();
    while let Some(chunk) = batch.next() {
        if ctx.cancel.load(Ordering::Relaxed) {
            return FeedOutcome {
                cancelled: true,
                error: None,
                rest: Vec::new(),
            };
        }
        let mut samples = ctx.pool.get();
        if let Err(e) = decoder.decode_into(&chunk.pcm, &mut samples) {
            ctx.pool.put(samples);
            return FeedOutcome {
                cancelled: false,
                error: Some(e),
                rest: batch.collect(),
            };
        }
        apply_volume(&mut samples, &ctx.volume);

        match ctx.sink.feed(&samples).await {
            Ok(()) => {
                ctx.bytes_fed
                    .fetch_add(chunk.pcm.len() as u64, Ordering::Relaxed);
            }
            Err(SinkError::NotReady) if !ctx.cancel.load(Ordering::Relaxed) => {
                // Race between release-on-pause and a stray feed trigger:
                // one re-setup + retry of the same chunk, never recursive
                match rearm_and_retry(&ctx, &samples).await {
                    Ok(()) => {
                        ctx.bytes_fed
                            .fetch_add(chunk.pcm.len() as u64, Ordering::Relaxed);
                    }
                    Err(e) => {
                        ctx.pool.put(samples);
                        return FeedOutcome {
                            cancelled: false,
                            error: Some(e),
                            rest: batch.collect(),
                        };
                    }
                }
            }
            Err(SinkError::NotReady) => {
                ctx.pool.put(samples);
                return FeedOutcome {
                    cancelled: true,
                    error: None,
                    rest: Vec::new(),
                };
            }
            Err(e) => {
                ctx.pool.put(samples);
                return FeedOutcome {
                    cancelled: false,
                    error: Some(Error::Feed(e.to_string())),
                    rest: batch.collect(),
                };
            }
        }
        ctx.pool.put(samples);
        if ctx.cancel.load(Ordering::Relaxed) {
            return FeedOutcome {
                cancelled: true,
                error: None,
                rest: Vec::new(),
            };
        }
    }
    FeedOutcome {
        cancelled: false,
        error: None,
        rest: Vec::new(),
    }
}

async fn rearm_and_retry(ctx: &FeedContext, samples: &[Sample]) -> Result<()> {
    log::warn!("sink not set up during feed, re-arming once");
    ctx.sink
        .setup(&ctx.format, ctx.feed_req_tx.clone())
        .await
        .map_err(|e| Error::Sink(e.to_string()))?;
    ctx.sink
        .start()
        .await
        .map_err(|e| Error::Sink(e.to_string()))?;
    ctx.sink
        .feed(samples)
        .await
        .map_err(|e| Error::Feed(e.to_string()))
}

fn apply_volume(samples: &mut [Sample], volume: &VolumeState) {
    let (percent, muted) = volume.snapshot();
    if muted {
        samples.fill(Sample::ZERO);
    } else if percent < 100 {
        for s in samples.iter_mut() {
            *s = s.with_gain_percent(percent);
        }
    }
}
