//! The blocking reader: pulls tokens from input that is either fully
//! present in memory or read (and transcoded) on demand.

use super::{DecodingSource, Feed, Step, TokenRead, Tokenizer};
use crate::base64::Base64Variant;
use crate::error::{Error, Result};
use crate::location::Location;
use crate::num::NumberValue;
use crate::ptr::Pointer;
use crate::recycler::{BoundRecycler, ByteBufferKind};
use crate::token::{NumberKind, TokenKind};
use bigdecimal::BigDecimal;
use num_bigint::BigInt;

pub(crate) enum Input<'a> {
    /// The whole document is in memory.
    Direct { data: &'a [u8], consumed: usize },
    /// Input arrives through a decoding source into a refillable buffer.
    Streamed {
        src: DecodingSource<'a>,
        buf: Vec<u8>,
        consumed: usize,
    },
    /// The source has been released.
    Done,
}

/// Blocking CirJSON reader. Produced by the factory; drive it with
/// [`TokenRead::next_token`].
pub struct CirJsonReader<'a> {
    tokenizer: Tokenizer,
    input: Input<'a>,
    recycler: Option<BoundRecycler>,
    /// True when the factory opened the underlying resource itself, in
    /// which case it is always released on close.
    owned_source: bool,
    closed: bool,
}

impl<'a> CirJsonReader<'a> {
    pub(crate) fn new(
        tokenizer: Tokenizer,
        input: Input<'a>,
        recycler: Option<BoundRecycler>,
        owned_source: bool,
    ) -> Self {
        Self {
            tokenizer,
            input,
            recycler,
            owned_source,
            closed: false,
        }
    }

    fn refill(&mut self) -> Result<()> {
        match &mut self.input {
            Input::Direct { .. } | Input::Done => {
                self.tokenizer.signal_end_of_input();
                Ok(())
            }
            Input::Streamed { src, buf, consumed } => {
                buf.clear();
                *consumed = 0;
                let location = self.tokenizer.current_location();
                let n = src.fill(buf).map_err(|e| relocate(e, location))?;
                if n == 0 {
                    self.tokenizer.signal_end_of_input();
                }
                Ok(())
            }
        }
    }
}

/// Decoding errors are created before a location is known; attach the
/// reader's current position.
fn relocate(err: Error, location: Location) -> Error {
    match err {
        Error::StreamRead {
            message,
            location: loc,
        } if loc == Location::NA => Error::StreamRead { message, location },
        Error::Io {
            source,
            location: loc,
        } if loc == Location::NA => Error::Io { source, location },
        other => other,
    }
}

impl<'a> TokenRead for CirJsonReader<'a> {
    fn next_token(&mut self) -> Result<Option<TokenKind>> {
        if self.closed {
            return Ok(None);
        }
        loop {
            let step = match &mut self.input {
                Input::Direct { data, consumed } => {
                    let mut feed = Feed::new(&data[*consumed..]);
                    let step = self.tokenizer.next(&mut feed);
                    *consumed += feed.pos;
                    step?
                }
                Input::Streamed { buf, consumed, .. } => {
                    let mut feed = Feed::new(&buf[*consumed..]);
                    let step = self.tokenizer.next(&mut feed);
                    *consumed += feed.pos;
                    step?
                }
                Input::Done => Step::End,
            };
            match step {
                Step::Token(token) => return Ok(Some(token)),
                Step::End => return Ok(None),
                Step::NeedMore => self.refill()?,
            }
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
        match &self.input {
            Input::Direct { data, consumed } => data.len() - consumed,
            Input::Streamed { buf, consumed, .. } => buf.len() - consumed,
            Input::Done => 0,
        }
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let auto_close = self.tokenizer.auto_close_source();
        self.tokenizer.close();

        if let Some(mut bound) = self.recycler.take() {
            if let Input::Streamed { buf, .. } = &mut self.input {
                bound
                    .get_mut()
                    .release_bytes(ByteBufferKind::ReadIo, std::mem::take(buf));
            }
            bound.release();
        }

        if auto_close || self.owned_source {
            self.input = Input::Done;
        }
        Ok(())
    }
}

impl<'a> Drop for CirJsonReader<'a> {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
