//! Reusable message buffers.
//!
//! A [`Buffer`] is either *pooled*, going back to its [`BufferPool`] when
//! dropped, or *cloned*, owning a private copy with no pool attached.
//! Release is tied to ownership, so a buffer can be returned at most once
//! and never read afterwards.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, PoisonError};

use bytes::BytesMut;

/// Largest control message or frame the session reads in one call.
pub const MAX_BUFFER_SIZE: usize = 64 * 1024;

/// Default number of idle buffers kept for reuse.
pub const DEFAULT_MAX_FREE: usize = 64;

#[derive(Debug)]
struct PoolInner {
    free: Mutex<Vec<BytesMut>>,
    max_free: usize,
}

/// Free list of byte regions shared by the codec and the transport.
#[derive(Debug, Clone)]
pub struct BufferPool {
    inner: Arc<PoolInner>,
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FREE)
    }
}

impl BufferPool {
    /// Create a pool keeping at most `max_free` idle buffers.
    pub fn new(max_free: usize) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                free: Mutex::new(Vec::new()),
                max_free,
            }),
        }
    }

    /// Get a zeroed buffer of exactly `size` bytes.
    pub fn acquire(&self, size: usize) -> Buffer {
        let reused = {
            let mut free = self
                .inner
                .free
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            free.iter()
                .position(|b| b.capacity() >= size)
                .map(|i| free.swap_remove(i))
        };
        let mut bytes = reused.unwrap_or_else(|| BytesMut::with_capacity(size));
        bytes.clear();
        bytes.resize(size, 0);
        Buffer {
            bytes,
            pool: Some(self.inner.clone()),
        }
    }

    /// Copy `src` into a buffer that is not tied to any pool.
    pub fn clone_from_slice(src: &[u8]) -> Buffer {
        Buffer {
            bytes: BytesMut::from(src),
            pool: None,
        }
    }

    /// Number of idle buffers currently held.
    pub fn idle(&self) -> usize {
        self.inner
            .free
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn put(inner: &PoolInner, bytes: BytesMut) {
        let mut free = inner.free.lock().unwrap_or_else(PoisonError::into_inner);
        if free.len() < inner.max_free {
            free.push(bytes);
        }
    }
}

/// An owned byte region holding one control message or frame.
pub struct Buffer {
    bytes: BytesMut,
    pool: Option<Arc<PoolInner>>,
}

impl Buffer {
    /// True when dropping this buffer returns it to a pool.
    pub fn is_pooled(&self) -> bool {
        self.pool.is_some()
    }

    /// Return the buffer to its pool now.
    pub fn release(self) {
        drop(self)
    }

    /// Shorten the buffer to `len` bytes.
    pub fn truncate(&mut self, len: usize) {
        self.bytes.truncate(len);
    }

    /// Consume the buffer, keeping its contents outside any pool.
    pub fn into_bytes(mut self) -> BytesMut {
        self.pool = None;
        std::mem::take(&mut self.bytes)
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.take() {
            BufferPool::put(&pool, std::mem::take(&mut self.bytes));
        }
    }
}

impl Deref for Buffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.bytes
    }
}

impl DerefMut for Buffer {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }
}

impl AsRef<[u8]> for Buffer {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("len", &self.bytes.len())
            .field("pooled", &self.is_pooled())
            .finish()
    }
}
