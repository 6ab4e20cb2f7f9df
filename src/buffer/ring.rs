//! Fixed-Capacity Ring Buffer
//!
//! The buffer keeps a read cursor, a write cursor and a count of unread
//! bytes. Cursors are always kept modulo the capacity, so `len` is the only
//! way to tell a full buffer from an empty one.
//!
//! ## Access Modes
//!
//! - `fill` pulls bytes from an external reader into the free region, as at
//!   most two contiguous writes when the free region wraps.
//! - `writable` / `commit` expose the first contiguous free segment directly,
//!   which is what the async transport reads into.
//! - `take_until` drains through the first delimiter, or drains everything
//!   when there is no delimiter yet.
//! - `take_exactly` drains up to `n` bytes without waiting for more.

use bytes::{Bytes, BytesMut};
use std::io;

/// A fixed-capacity circular byte store.
#[derive(Debug)]
pub struct RingBuffer {
    /// Backing storage, allocated once
    storage: Box<[u8]>,
    /// Index of the first unread byte
    read_pos: usize,
    /// Index of the first free byte
    write_pos: usize,
    /// Number of unread bytes
    len: usize,
}

impl RingBuffer {
    /// Creates an empty buffer holding at most `capacity` bytes.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ring buffer capacity must be at least 1");

        Self {
            storage: vec![0u8; capacity].into_boxed_slice(),
            read_pos: 0,
            write_pos: 0,
            len: 0,
        }
    }

    /// Total number of bytes the buffer can hold.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Number of unread bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.len == self.capacity()
    }

    /// Number of free bytes.
    #[inline]
    pub fn free(&self) -> usize {
        self.capacity() - self.len
    }

    /// Returns the unread region as two slices.
    ///
    /// The second slice is empty unless the unread region wraps past the end
    /// of the storage.
    pub fn as_slices(&self) -> (&[u8], &[u8]) {
        let capacity = self.capacity();
        let end = self.read_pos + self.len;

        if end <= capacity {
            (&self.storage[self.read_pos..end], &[])
        } else {
            (
                &self.storage[self.read_pos..],
                &self.storage[..end - capacity],
            )
        }
    }

    /// Returns the first contiguous free segment, at most `max` bytes long.
    ///
    /// The slice is empty when the buffer is full. Bytes written into it only
    /// become readable after [`commit`](Self::commit).
    pub fn writable(&mut self, max: usize) -> &mut [u8] {
        let want = max.min(self.free());
        let end = (self.write_pos + want).min(self.capacity());
        &mut self.storage[self.write_pos..end]
    }

    /// Marks `n` bytes at the write cursor as written.
    ///
    /// # Panics
    ///
    /// Panics if `n` exceeds the free space.
    pub fn commit(&mut self, n: usize) {
        assert!(
            n <= self.free(),
            "commit of {} bytes exceeds free space of {}",
            n,
            self.free()
        );

        self.write_pos = (self.write_pos + n) % self.capacity();
        self.len += n;
    }

    /// Pulls up to `max_bytes` from `reader` into the free region.
    ///
    /// `reader` behaves like a single blocking `read` call: it receives a
    /// contiguous destination and returns how many bytes it wrote, which may
    /// be fewer than asked. When the free region wraps, the tail segment is
    /// offered first and the head segment only if the tail was filled
    /// completely.
    ///
    /// Returns the number of bytes written. A full buffer is a no-op that
    /// returns 0; the caller must drain before refilling.
    ///
    /// Async transports go through [`writable`](Self::writable) and
    /// [`commit`](Self::commit) instead, one segment per read.
    pub fn fill<F>(&mut self, max_bytes: usize, mut reader: F) -> io::Result<usize>
    where
        F: FnMut(&mut [u8]) -> io::Result<usize>,
    {
        let mut remaining = max_bytes.min(self.free());
        let mut written = 0;

        // Tail segment, then head segment after wraparound
        for _ in 0..2 {
            if remaining == 0 {
                break;
            }

            let segment = self.writable(remaining);
            let segment_len = segment.len();
            let n = reader(segment)?.min(segment_len);

            self.commit(n);
            written += n;
            remaining -= n;

            if n < segment_len {
                break;
            }
        }

        Ok(written)
    }

    /// Drains bytes up to and including the first `delimiter`.
    ///
    /// Returns `(bytes, true)` when the delimiter was found; anything after it
    /// stays buffered. Otherwise drains every buffered byte and returns
    /// `(bytes, false)`, so the caller never rescans bytes it has seen.
    pub fn take_until(&mut self, delimiter: u8) -> (Bytes, bool) {
        let (head, tail) = self.as_slices();

        let position = head
            .iter()
            .position(|&b| b == delimiter)
            .or_else(|| {
                tail.iter()
                    .position(|&b| b == delimiter)
                    .map(|pos| head.len() + pos)
            });

        match position {
            Some(pos) => (self.consume(pos + 1), true),
            None => (self.consume(self.len), false),
        }
    }

    /// Drains up to `n` buffered bytes without waiting for more.
    pub fn take_exactly(&mut self, n: usize) -> Bytes {
        self.consume(n.min(self.len))
    }

    /// Copies `n` unread bytes out and advances the read cursor.
    fn consume(&mut self, n: usize) -> Bytes {
        debug_assert!(n <= self.len);

        let (head, tail) = self.as_slices();
        let from_head = n.min(head.len());

        let mut out = BytesMut::with_capacity(n);
        out.extend_from_slice(&head[..from_head]);
        out.extend_from_slice(&tail[..n - from_head]);

        self.read_pos = (self.read_pos + n) % self.capacity();
        self.len -= n;

        out.freeze()
    }
}
