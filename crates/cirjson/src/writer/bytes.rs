//! UTF-8 byte output target, either in-memory or staged in front of an
//! `io::Write` sink.

use super::OutputTarget;
use crate::error::{Error, Result};
use crate::location::Location;
use std::io;

/// How many staged bytes accumulate before spilling to the sink.
const SPILL_THRESHOLD: usize = 8000;

pub struct ByteTarget<'a> {
    buf: Vec<u8>,
    sink: Option<Box<dyn io::Write + 'a>>,
    threshold: usize,
}

impl<'a> ByteTarget<'a> {
    /// In-memory target; the encoded document is taken with
    /// [`into_vec`](Self::into_vec).
    pub(crate) fn in_memory() -> Self {
        Self {
            buf: Vec::new(),
            sink: None,
            threshold: usize::MAX,
        }
    }

    /// Staged target in front of a sink. `buf` is the staging buffer,
    /// typically from the writer's recycler.
    pub(crate) fn to_sink(sink: Box<dyn io::Write + 'a>, buf: Vec<u8>) -> Self {
        Self {
            buf,
            sink: Some(sink),
            threshold: SPILL_THRESHOLD,
        }
    }

    /// The accumulated output of an in-memory target.
    pub fn into_vec(self) -> Vec<u8> {
        self.buf
    }

    fn spill(&mut self) -> Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        if let Some(sink) = self.sink.as_mut() {
            sink.write_all(&self.buf)
                .map_err(|e| Error::io(e, Location::NA))?;
            self.buf.clear();
        }
        Ok(())
    }
}

impl<'a> OutputTarget for ByteTarget<'a> {
    fn write_str(&mut self, s: &str) -> Result<()> {
        self.buf.extend_from_slice(s.as_bytes());
        if self.sink.is_some() && self.buf.len() >= self.threshold {
            self.spill()?;
        }
        Ok(())
    }

    fn buffered(&self) -> usize {
        self.buf.len()
    }

    fn flush(&mut self, flush_target: bool) -> Result<()> {
        self.spill()?;
        if flush_target {
            if let Some(sink) = self.sink.as_mut() {
                sink.flush().map_err(|e| Error::io(e, Location::NA))?;
            }
        }
        Ok(())
    }

    fn finish(&mut self, auto_close_target: bool) -> Result<()> {
        self.spill()?;
        if let Some(sink) = self.sink.as_mut() {
            sink.flush().map_err(|e| Error::io(e, Location::NA))?;
        }
        if auto_close_target {
            self.sink = None;
        }
        Ok(())
    }

    fn reclaim_bytes(&mut self) -> Option<Vec<u8>> {
        // Only sink-backed targets give up their staging buffer; for an
        // in-memory target the buffer is the output itself.
        self.sink.is_some().then(|| std::mem::take(&mut self.buf))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_in_memory_accumulates() {
        let mut t = ByteTarget::in_memory();
        t.write_str("hello ").unwrap();
        t.write_str("world").unwrap();
        assert_eq!(t.buffered(), 11);
        assert_eq!(t.into_vec(), b"hello world");
    }

    #[test]
    fn test_sink_spill_and_flush() {
        let mut out = Vec::new();
        {
            let mut t = ByteTarget::to_sink(Box::new(&mut out), Vec::new());
            t.write_str("abc").unwrap();
            assert_eq!(t.buffered(), 3);
            t.flush(true).unwrap();
            assert_eq!(t.buffered(), 0);
        }
        assert_eq!(out, b"abc");
    }

    #[test]
    fn test_reclaim_only_for_sink_targets() {
        let mut out = Vec::new();
        let mut t = ByteTarget::to_sink(Box::new(&mut out), Vec::with_capacity(64));
        t.finish(true).unwrap();
        assert!(t.reclaim_bytes().is_some());

        let mut t = ByteTarget::in_memory();
        t.write_str("keep").unwrap();
        assert!(t.reclaim_bytes().is_none());
        assert_eq!(t.into_vec(), b"keep");
    }
}
