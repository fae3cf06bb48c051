//! Character output target, either an in-memory String or staged in front
//! of a `fmt::Write` sink. Buffering is accounted in chars, not bytes.

use super::OutputTarget;
use crate::error::{Error, Result};
use std::fmt;

pub struct CharTarget<'a> {
    buf: String,
    sink: Option<Box<dyn fmt::Write + 'a>>,
}

impl<'a> CharTarget<'a> {
    pub(crate) fn in_memory() -> Self {
        Self {
            buf: String::new(),
            sink: None,
        }
    }

    pub(crate) fn to_sink(sink: Box<dyn fmt::Write + 'a>) -> Self {
        Self {
            buf: String::new(),
            sink: Some(sink),
        }
    }

    /// The accumulated output of an in-memory target.
    pub fn into_string(self) -> String {
        self.buf
    }

    fn spill(&mut self) -> Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        if let Some(sink) = self.sink.as_mut() {
            sink.write_str(&self.buf)
                .map_err(|_| Error::stream_write("error writing to character target", crate::location::Location::NA))?;
            self.buf.clear();
        }
        Ok(())
    }
}

impl<'a> OutputTarget for CharTarget<'a> {
    fn write_str(&mut self, s: &str) -> Result<()> {
        self.buf.push_str(s);
        Ok(())
    }

    fn buffered(&self) -> usize {
        self.buf.chars().count()
    }

    fn flush(&mut self, flush_target: bool) -> Result<()> {
        // fmt::Write has no flush of its own; spilling is the flush.
        let _ = flush_target;
        self.spill()
    }

    fn finish(&mut self, auto_close_target: bool) -> Result<()> {
        self.spill()?;
        if auto_close_target {
            self.sink = None;
        }
        Ok(())
    }

    fn reclaim_bytes(&mut self) -> Option<Vec<u8>> {
        None
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_buffered_counts_chars() {
        let mut t = CharTarget::in_memory();
        t.write_str("caf\u{E9}").unwrap();
        // 4 chars, 5 bytes.
        assert_eq!(t.buffered(), 4);
        assert_eq!(t.into_string(), "caf\u{E9}");
    }

    #[test]
    fn test_sink_spill() {
        let mut out = String::new();
        {
            let mut t = CharTarget::to_sink(Box::new(&mut out));
            t.write_str("text").unwrap();
            t.flush(false).unwrap();
            assert_eq!(t.buffered(), 0);
        }
        assert_eq!(out, "text");
    }
}
