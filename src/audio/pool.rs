// ABOUTME: Buffer pool for reusing audio sample buffers
// ABOUTME: Eliminates allocations in the feed hot path

use crate::audio::Sample;
use crossbeam::queue::ArrayQueue;
use std::sync::Arc;

/// Buffer pool for reusing decoded sample buffers.
///
/// The feed loop takes a buffer per chunk, decodes into it, feeds the sink,
/// and returns it. Cloning shares the underlying pool.
#[derive(Clone)]
pub struct BufferPool {
    pool: Arc<ArrayQueue<Vec<Sample>>>,
    capacity: usize,
}

impl BufferPool {
    /// Create a new buffer pool
    ///
    /// # Arguments
    /// * `pool_size` - Number of buffers to pre-allocate
    /// * `buffer_capacity` - Capacity of each buffer in samples
    pub fn new(pool_size: usize, buffer_capacity: usize) -> Self {
        let pool = Arc::new(ArrayQueue::new(pool_size));

        for _ in 0..pool_size {
            let _ = pool.push(Vec::with_capacity(buffer_capacity));
        }

        Self {
            pool,
            capacity: buffer_capacity,
        }
    }

    /// Get a buffer from the pool (or allocate if pool is empty)
    pub fn get(&self) -> Vec<Sample> {
        self.pool
            .pop()
            .unwrap_or_else(|| Vec::with_capacity(self.capacity))
    }

    /// Return a buffer to the pool
    pub fn put(&self, mut buf: Vec<Sample>) {
        buf.clear();
        let _ = self.pool.push(buf); // Ignore if pool is full
    }

    /// Get the buffer capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
