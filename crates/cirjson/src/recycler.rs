//! Reusable scratch buffers. Each reader or writer borrows one
//! [`BufferRecycler`] for its lifetime; the recycler keeps one slot per
//! logical buffer kind and is returned to a shared lock-free pool on close.

use crossbeam_queue::SegQueue;
use std::sync::Arc;

/// Logical kinds of byte scratch buffers, with their initial sizes.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ByteBufferKind {
    /// Input buffer for reading raw bytes from a source.
    ReadIo,
    /// Staging buffer for bytes written to a target.
    WriteIo,
    /// Working buffer for Base64 encoding and decoding.
    Base64,
}

impl ByteBufferKind {
    const fn slot(self) -> usize {
        match self {
            ByteBufferKind::ReadIo => 0,
            ByteBufferKind::WriteIo => 1,
            ByteBufferKind::Base64 => 2,
        }
    }

    const fn initial_capacity(self) -> usize {
        match self {
            ByteBufferKind::ReadIo => 8000,
            ByteBufferKind::WriteIo => 8000,
            ByteBufferKind::Base64 => 2000,
        }
    }
}

/// Logical kinds of text scratch buffers.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TextBufferKind {
    /// Accumulates the text of the current token.
    Token,
    /// Concatenation buffer for multi-segment values.
    Concat,
    /// Short-lived copies of property names.
    NameCopy,
}

impl TextBufferKind {
    const fn slot(self) -> usize {
        match self {
            TextBufferKind::Token => 0,
            TextBufferKind::Concat => 1,
            TextBufferKind::NameCopy => 2,
        }
    }

    const fn initial_capacity(self) -> usize {
        match self {
            TextBufferKind::Token => 2000,
            TextBufferKind::Concat => 4000,
            TextBufferKind::NameCopy => 200,
        }
    }
}

/// Holds one reusable buffer per logical kind. Not safe to share across
/// threads; a recycler belongs to exactly one reader or writer at a time.
#[derive(Debug, Default)]
pub struct BufferRecycler {
    byte_slots: [Option<Vec<u8>>; 3],
    text_slots: [Option<String>; 3],
}

impl BufferRecycler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the buffer for `kind`, allocating one of the standard size if
    /// the slot is empty. The returned buffer is cleared.
    pub fn acquire_bytes(&mut self, kind: ByteBufferKind) -> Vec<u8> {
        match self.byte_slots[kind.slot()].take() {
            Some(mut buf) => {
                buf.clear();
                buf
            }
            None => Vec::with_capacity(kind.initial_capacity()),
        }
    }

    /// Returns a buffer to its slot, keeping the larger of the stored and
    /// returned buffers.
    pub fn release_bytes(&mut self, kind: ByteBufferKind, buf: Vec<u8>) {
        let slot = &mut self.byte_slots[kind.slot()];
        match slot {
            Some(existing) if existing.capacity() >= buf.capacity() => {}
            _ => *slot = Some(buf),
        }
    }

    pub fn acquire_text(&mut self, kind: TextBufferKind) -> String {
        match self.text_slots[kind.slot()].take() {
            Some(mut buf) => {
                buf.clear();
                buf
            }
            None => String::with_capacity(kind.initial_capacity()),
        }
    }

    pub fn release_text(&mut self, kind: TextBufferKind, buf: String) {
        let slot = &mut self.text_slots[kind.slot()];
        match slot {
            Some(existing) if existing.capacity() >= buf.capacity() => {}
            _ => *slot = Some(buf),
        }
    }
}

/// A shared, unbounded pool of recyclers backed by a lock-free queue.
/// `acquire` pops an idle recycler or allocates a fresh one; `release`
/// pushes it back. The pool is cheap to clone and safe to share.
#[derive(Debug, Clone, Default)]
pub struct RecyclerPool {
    queue: Arc<SegQueue<BufferRecycler>>,
}

impl RecyclerPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&self) -> BufferRecycler {
        self.queue.pop().unwrap_or_default()
    }

    pub fn release(&self, recycler: BufferRecycler) {
        self.queue.push(recycler);
    }

    pub fn idle_count(&self) -> usize {
        self.queue.len()
    }
}

/// A recycler bound to one reader or writer, remembering whether it came
/// from a pool. Externally supplied recyclers are not released on close;
/// their lifecycle belongs to the caller.
#[derive(Debug)]
pub struct BoundRecycler {
    recycler: BufferRecycler,
    pool: Option<RecyclerPool>,
}

impl BoundRecycler {
    pub fn pooled(pool: &RecyclerPool) -> Self {
        Self {
            recycler: pool.acquire(),
            pool: Some(pool.clone()),
        }
    }

    pub fn external(recycler: BufferRecycler) -> Self {
        Self {
            recycler,
            pool: None,
        }
    }

    pub fn is_externally_owned(&self) -> bool {
        self.pool.is_none()
    }

    pub fn get_mut(&mut self) -> &mut BufferRecycler {
        &mut self.recycler
    }

    /// Returns the recycler to its pool, if it came from one.
    pub fn release(self) {
        if let Some(pool) = self.pool {
            pool.release(self.recycler);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_acquire_allocates_standard_sizes() {
        let mut r = BufferRecycler::new();
        let buf = r.acquire_bytes(ByteBufferKind::ReadIo);
        assert!(buf.capacity() >= 8000);
        let buf = r.acquire_bytes(ByteBufferKind::Base64);
        assert!(buf.capacity() >= 2000);
        let text = r.acquire_text(TextBufferKind::NameCopy);
        assert!(text.capacity() >= 200);
    }

    #[test]
    fn test_release_keeps_largest() {
        let mut r = BufferRecycler::new();
        r.release_bytes(ByteBufferKind::ReadIo, Vec::with_capacity(100));
        r.release_bytes(ByteBufferKind::ReadIo, Vec::with_capacity(50_000));
        r.release_bytes(ByteBufferKind::ReadIo, Vec::with_capacity(10));
        let buf = r.acquire_bytes(ByteBufferKind::ReadIo);
        assert!(buf.capacity() >= 50_000);
    }

    #[test]
    fn test_acquired_buffers_are_cleared() {
        let mut r = BufferRecycler::new();
        let mut buf = r.acquire_bytes(ByteBufferKind::WriteIo);
        buf.extend_from_slice(b"leftover");
        r.release_bytes(ByteBufferKind::WriteIo, buf);
        assert!(r.acquire_bytes(ByteBufferKind::WriteIo).is_empty());
    }

    #[test]
    fn test_pool_recycles() {
        let pool = RecyclerPool::new();
        assert_eq!(pool.idle_count(), 0);

        let bound = BoundRecycler::pooled(&pool);
        assert!(!bound.is_externally_owned());
        bound.release();
        assert_eq!(pool.idle_count(), 1);

        let bound = BoundRecycler::pooled(&pool);
        assert_eq!(pool.idle_count(), 0);
        bound.release();
    }

    #[test]
    fn test_external_recycler_not_released() {
        let bound = BoundRecycler::external(BufferRecycler::new());
        assert!(bound.is_externally_owned());
        bound.release(); // no pool to return to; recycler is dropped
    }

    #[test]
    fn test_pool_is_shareable() {
        let pool = RecyclerPool::new();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let pool = pool.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        let r = pool.acquire();
                        pool.release(r);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert!(pool.idle_count() >= 1);
    }
}
