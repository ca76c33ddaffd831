//! Pool of reusable output buffers.

use bytes::BytesMut;
use parking_lot::Mutex;

/// Buffers whose capacity grew beyond this multiple of the initial capacity
/// are dropped instead of being returned to the pool.
const MAX_GROWTH_FACTOR: usize = 8;

/// A small pool of output buffers shared by all encode operations of a
/// service.
///
/// Each operation takes a buffer exclusively and gives it back (cleared) when
/// its [`ObjectDataOutput`](super::ObjectDataOutput) is dropped.
#[derive(Debug)]
pub struct BufferPool {
    buffers: Mutex<Vec<BytesMut>>,
    initial_capacity: usize,
    max_pooled: usize,
}

impl BufferPool {
    /// Creates a pool handing out buffers of `initial_capacity`, keeping at
    /// most `max_pooled` idle buffers.
    pub fn new(initial_capacity: usize, max_pooled: usize) -> Self {
        Self {
            buffers: Mutex::new(Vec::with_capacity(max_pooled)),
            initial_capacity,
            max_pooled,
        }
    }

    /// Takes an empty buffer, allocating one if the pool is empty.
    pub fn take(&self) -> BytesMut {
        self.buffers
            .lock()
            .pop()
            .unwrap_or_else(|| BytesMut::with_capacity(self.initial_capacity))
    }

    /// Clears `buffer` and returns it to the pool if there is room.
    pub fn give_back(&self, mut buffer: BytesMut) {
        if buffer.capacity() > self.initial_capacity * MAX_GROWTH_FACTOR {
            return;
        }
        buffer.clear();
        let mut buffers = self.buffers.lock();
        if buffers.len() < self.max_pooled {
            buffers.push(buffer);
        }
    }

    /// Returns the number of idle buffers.
    pub fn idle(&self) -> usize {
        self.buffers.lock().len()
    }

    /// Drops every idle buffer.
    pub fn clear(&self) {
        self.buffers.lock().clear();
    }
}
