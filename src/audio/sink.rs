// ABOUTME: Native audio sink seam
// ABOUTME: Async trait over the opaque platform audio backend

use crate::audio::{AudioFormat, Sample};
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors reported by a native sink
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    /// The sink has not been set up (or was released); the engine may
    /// re-arm it once and retry
    #[error("sink not set up")]
    NotReady,

    /// Unrecoverable backend failure
    #[error("sink backend error: {0}")]
    Backend(String),
}

/// Low-buffer notification emitted by the sink when its internal buffer
/// drops below the configured feed threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedRequest {
    /// Frames of audio still buffered inside the sink
    pub remaining_frames: u32,
}

/// The native audio backend the playback engine drives.
///
/// The backend may block or run on its own execution context; every call is
/// awaitable and the engine never issues a second call before the previous
/// one resolves. Buffer-low notifications are delivered on the channel
/// registered at [`setup`](AudioSink::setup) rather than through a mutable
/// callback field.
#[async_trait]
pub trait AudioSink: Send + Sync + 'static {
    /// Configure the backend for a fixed format and register the feed-request
    /// channel. Must be callable again after [`release`](AudioSink::release).
    async fn setup(
        &self,
        format: &AudioFormat,
        feed_requests: mpsc::Sender<FeedRequest>,
    ) -> Result<(), SinkError>;

    /// Set the buffered-frames threshold below which the sink emits a
    /// [`FeedRequest`]
    fn set_feed_threshold(&self, frames: u32);

    /// Begin consuming buffered audio
    async fn start(&self) -> Result<(), SinkError>;

    /// Append interleaved samples to the sink's internal buffer.
    ///
    /// Returns [`SinkError::NotReady`] when called between a release and the
    /// next setup.
    async fn feed(&self, samples: &[Sample]) -> Result<(), SinkError>;

    /// Stop consuming and drop any buffered audio. Safe to call when already
    /// released.
    async fn release(&self) -> Result<(), SinkError>;
}
