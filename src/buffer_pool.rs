use std::sync::Mutex;

use bytes::BytesMut;
use tracing::{debug, trace};

/// Pool of fixed-size copy buffers for the userspace proxy path.
///
/// Buffers are handed out empty and returned cleared; buffers in excess of
/// the pool bound, or buffers whose capacity no longer matches (e.g. after a
/// split), are discarded on return rather than pooled.
pub struct BufferPool {
    buf_size: usize,
    buffers: Mutex<Vec<BytesMut>>,
}

impl BufferPool {
    pub fn new(buf_size: usize, max_pooled: usize) -> BufferPool {
        BufferPool {
            buf_size,
            buffers: Mutex::new(Vec::with_capacity(max_pooled)),
        }
    }

    pub fn get(&self) -> BytesMut {
        {
            let mut buffers = self.buffers.lock().unwrap();
            if let Some(buffer) = buffers.pop() {
                trace!("reusing pooled buffer");
                return buffer;
            }
        }

        debug!("pool empty: allocating new {} byte buffer", self.buf_size);
        BytesMut::with_capacity(self.buf_size)
    }

    pub fn put(&self, mut buffer: BytesMut) {
        if buffer.capacity() != self.buf_size {
            debug!("discarding returned buffer with capacity {}", buffer.capacity());
            return;
        }
        buffer.clear();

        let mut buffers = self.buffers.lock().unwrap();
        if buffers.len() < buffers.capacity() {
            buffers.push(buffer);
        } else {
            trace!("pool full: discarding returned buffer");
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::BufMut;

    use super::*;

    #[test]
    fn test_returned_buffer_is_cleared() {
        let pool = BufferPool::new(16, 4);

        let mut buf = pool.get();
        buf.put_slice(b"leftover");
        pool.put(buf);

        assert!(pool.get().is_empty());
    }

    #[test]
    fn test_pool_is_bounded() {
        let pool = BufferPool::new(16, 1);

        pool.put(BytesMut::with_capacity(16));
        pool.put(BytesMut::with_capacity(16));

        assert_eq!(pool.buffers.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_odd_sized_buffer_is_discarded() {
        let pool = BufferPool::new(16, 4);

        pool.put(BytesMut::with_capacity(99));

        assert!(pool.buffers.lock().unwrap().is_empty());
    }
}
