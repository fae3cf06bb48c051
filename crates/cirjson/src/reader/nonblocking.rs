//! The non-blocking reader: input is fed in discrete slices; when a token
//! cannot be completed from what has been fed, `next_token` returns
//! [`TokenKind::NotAvailable`] and the caller feeds more and retries.
//! There is no internal blocking, no threads, and no callbacks.

use super::{Feed, Step, TokenRead, Tokenizer};
use crate::base64::Base64Variant;
use crate::error::{Error, Result};
use crate::location::Location;
use crate::num::NumberValue;
use crate::ptr::Pointer;
use crate::token::{NumberKind, TokenKind};
use bigdecimal::BigDecimal;
use num_bigint::BigInt;

/// Feed-driven CirJSON reader over UTF-8 input.
pub struct NonBlockingCirJsonReader {
    tokenizer: Tokenizer,
    buf: Vec<u8>,
    consumed: usize,
    end_signalled: bool,
    closed: bool,
}

impl NonBlockingCirJsonReader {
    pub(crate) fn new(tokenizer: Tokenizer) -> Self {
        Self {
            tokenizer,
            buf: Vec::new(),
            consumed: 0,
            end_signalled: false,
            closed: false,
        }
    }

    /// Whether all fed input has been consumed, so the caller should
    /// either feed more or signal the end of input.
    pub fn needs_more_input(&self) -> bool {
        !self.end_signalled && self.consumed == self.buf.len()
    }

    /// Feeds the next slice of input.
    pub fn feed_input(&mut self, data: &[u8]) -> Result<()> {
        if self.closed {
            return Err(Error::misuse("can not feed input: reader is closed"));
        }
        if self.end_signalled {
            return Err(Error::misuse(
                "can not feed input after end_of_input has been signalled",
            ));
        }
        // Reclaim the consumed prefix before appending.
        if self.consumed > 0 && self.consumed == self.buf.len() {
            self.buf.clear();
            self.consumed = 0;
        }
        self.buf.extend_from_slice(data);
        Ok(())
    }

    /// Signals that no further input will be fed. Remaining buffered
    /// tokens are drained by subsequent `next_token` calls, after which
    /// `next_token` returns None.
    pub fn end_of_input(&mut self) {
        self.end_signalled = true;
        self.tokenizer.signal_end_of_input();
    }
}

impl TokenRead for NonBlockingCirJsonReader {
    fn next_token(&mut self) -> Result<Option<TokenKind>> {
        if self.closed {
            return Ok(None);
        }
        let mut feed = Feed::new(&self.buf[self.consumed..]);
        let step = self.tokenizer.next(&mut feed);
        self.consumed += feed.pos;
        match step? {
            Step::Token(token) => Ok(Some(token)),
            Step::End => Ok(None),
            Step::NeedMore => Ok(Some(TokenKind::NotAvailable)),
        }
    }

    fn current_token(&self) -> Option<TokenKind> {
        self.tokenizer.current_token()
    }

    fn text(&self) -> Option<&str> {
        self.tokenizer.text()
    }

    fn text_characters(&self) -> Option<&str> {
        self.tokenizer.text()
    }

    fn current_name(&self) -> Option<&str> {
        self.tokenizer.current_name()
    }

    fn number_kind(&self) -> Option<NumberKind> {
        super::number_kind(&self.tokenizer)
    }

    fn number_value(&self) -> Result<NumberValue> {
        super::number_value(&self.tokenizer)
    }

    fn number_value_exact(&self) -> Result<NumberValue> {
        super::number_value_exact(&self.tokenizer)
    }

    fn int_value(&self) -> Result<i32> {
        super::int_value(&self.tokenizer)
    }

    fn long_value(&self) -> Result<i64> {
        super::long_value(&self.tokenizer)
    }

    fn float_value(&self) -> Result<f32> {
        super::float_value(&self.tokenizer)
    }

    fn double_value(&self) -> Result<f64> {
        super::double_value(&self.tokenizer)
    }

    fn big_integer_value(&self) -> Result<BigInt> {
        super::big_integer_value(&self.tokenizer)
    }

    fn decimal_value(&self) -> Result<BigDecimal> {
        super::decimal_value(&self.tokenizer)
    }

    fn boolean_value(&self) -> Result<bool> {
        super::boolean_value(&self.tokenizer)
    }

    fn binary_value(&self, variant: &Base64Variant) -> Result<Vec<u8>> {
        super::binary_value(&self.tokenizer, variant)
    }

    fn path_as_pointer(&self, include_root: bool) -> Pointer {
        self.tokenizer.pointer(include_root)
    }

    fn depth(&self) -> usize {
        self.tokenizer.depth()
    }

    fn current_location(&self) -> Location {
        self.tokenizer.current_location()
    }

    fn token_location(&self) -> Location {
        self.tokenizer.token_location()
    }

    fn release_buffered(&self) -> usize {
        self.buf.len() - self.consumed
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.tokenizer.close();
        self.buf = Vec::new();
        self.consumed = 0;
        Ok(())
    }
}

impl Drop for NonBlockingCirJsonReader {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
