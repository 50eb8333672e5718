// ABOUTME: Shared test fixtures
// ABOUTME: Mock native sink with controllable failure and pacing

// Not every test binary uses every helper
#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use wavelink::audio::{AudioFormat, AudioSink, FeedRequest, Sample, SinkError};

/// Mock native sink recording every call, with knobs for pacing and failures.
pub struct MockSink {
    armed: AtomicBool,
    started: AtomicBool,
    setup_calls: AtomicUsize,
    start_calls: AtomicUsize,
    release_calls: AtomicUsize,
    feeds: Mutex<Vec<Vec<Sample>>>,
    feed_delay: Mutex<Duration>,
    fail_next_feed_not_ready: AtomicBool,
    feed_attempts: AtomicUsize,
    fail_attempt_backend: Mutex<Option<usize>>,
    feed_tx: Mutex<Option<mpsc::Sender<FeedRequest>>>,
}

impl MockSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            armed: AtomicBool::new(false),
            started: AtomicBool::new(false),
            setup_calls: AtomicUsize::new(0),
            start_calls: AtomicUsize::new(0),
            release_calls: AtomicUsize::new(0),
            feeds: Mutex::new(Vec::new()),
            feed_delay: Mutex::new(Duration::ZERO),
            fail_next_feed_not_ready: AtomicBool::new(false),
            feed_attempts: AtomicUsize::new(0),
            fail_attempt_backend: Mutex::new(None),
            feed_tx: Mutex::new(None),
        })
    }

    /// Delay applied inside every feed call, to simulate a slow backend
    pub fn set_feed_delay(&self, delay: Duration) {
        *self.feed_delay.lock() = delay;
    }

    /// Make the next feed call fail with `SinkError::NotReady`
    pub fn fail_next_feed(&self) {
        self.fail_next_feed_not_ready.store(true, Ordering::SeqCst);
    }

    /// Make the `attempt`-th feed call (1-based, failures included) fail
    /// with a backend error
    pub fn fail_feed_attempt(&self, attempt: usize) {
        *self.fail_attempt_backend.lock() = Some(attempt);
    }

    /// Simulate a stray release racing the engine: further feeds fail with
    /// `NotReady` until the engine re-arms the sink
    pub fn force_released(&self) {
        self.armed.store(false, Ordering::SeqCst);
    }

    pub fn setup_calls(&self) -> usize {
        self.setup_calls.load(Ordering::SeqCst)
    }

    pub fn release_calls(&self) -> usize {
        self.release_calls.load(Ordering::SeqCst)
    }

    pub fn feed_count(&self) -> usize {
        self.feeds.lock().len()
    }

    /// Every fed sample, in feed order
    pub fn fed_samples(&self) -> Vec<Sample> {
        self.feeds.lock().iter().flatten().copied().collect()
    }

    /// Total PCM bytes represented by the fed samples, assuming 16-bit source
    pub fn fed_bytes_16bit(&self) -> u64 {
        self.fed_samples().len() as u64 * 2
    }

    /// Emit a buffer-low notification like a real backend would
    pub async fn request_feed(&self, remaining_frames: u32) {
        let tx = self.feed_tx.lock().clone();
        if let Some(tx) = tx {
            let _ = tx.send(FeedRequest { remaining_frames }).await;
        }
    }
}

#[async_trait]
impl AudioSink for MockSink {
    async fn setup(
        &self,
        _format: &AudioFormat,
        feed_requests: mpsc::Sender<FeedRequest>,
    ) -> Result<(), SinkError> {
        self.setup_calls.fetch_add(1, Ordering::SeqCst);
        *self.feed_tx.lock() = Some(feed_requests);
        self.armed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn set_feed_threshold(&self, _frames: u32) {}

    async fn start(&self) -> Result<(), SinkError> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        self.started.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn feed(&self, samples: &[Sample]) -> Result<(), SinkError> {
        let attempt = self.feed_attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if *self.fail_attempt_backend.lock() == Some(attempt) {
            return Err(SinkError::Backend("stream died".to_string()));
        }
        if self.fail_next_feed_not_ready.swap(false, Ordering::SeqCst) {
            return Err(SinkError::NotReady);
        }
        if !self.armed.load(Ordering::SeqCst) {
            return Err(SinkError::NotReady);
        }
        let delay = *self.feed_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.feeds.lock().push(samples.to_vec());
        Ok(())
    }

    async fn release(&self) -> Result<(), SinkError> {
        self.release_calls.fetch_add(1, Ordering::SeqCst);
        self.armed.store(false, Ordering::SeqCst);
        self.started.store(false, Ordering::SeqCst);
        Ok(())
    }
}

/// Poll until `cond` holds or the deadline passes; panics on timeout.
pub async fn wait_until(what: &str, deadline: Duration, mut cond: impl FnMut() -> bool) {
    let start = tokio::time::Instant::now();
    while !cond() {
        if start.elapsed() > deadline {
            panic!("timed out waiting for {}", what);
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
