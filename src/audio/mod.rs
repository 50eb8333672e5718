// ABOUTME: Audio types and processing for wavelink
// ABOUTME: Contains Sample type, AudioFormat, chunk/pool types, and the sink seam

/// Audio decoder implementations (PCM)
pub mod decode;
/// Buffer pool for reusing audio sample buffers
pub mod pool;
/// Native audio sink trait and error types
pub mod sink;
/// Core audio type definitions (Sample, AudioFormat, AudioChunk)
pub mod types;
/// Shared volume/mute state
pub mod volume;

pub use pool::BufferPool;
pub use sink::{AudioSink, FeedRequest, SinkError};
pub use types::{AudioChunk, AudioFormat, Codec, Sample};
pub use volume::VolumeState;
