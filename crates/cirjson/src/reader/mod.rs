//! Streaming readers: the blocking pull variant over complete or
//! incrementally read input, and the non-blocking feed-driven variant.

mod blocking;
mod core;
mod decode;
mod nonblocking;

pub use blocking::CirJsonReader;
pub use decode::Encoding;
pub use nonblocking::NonBlockingCirJsonReader;

pub(crate) use self::core::{Feed, ReaderConfig, Step, Tokenizer};
pub(crate) use decode::{detect_encoding, DecodingSource, RawSource};

use crate::base64::Base64Variant;
use crate::error::{Error, Result};
use crate::location::Location;
use crate::num::{self, NumberValue};
use crate::ptr::Pointer;
use crate::token::{Capabilities, NumberKind, TokenKind, CIRJSON_READ_CAPABILITIES};
use bigdecimal::BigDecimal;
use num_bigint::BigInt;

/// Builds the blocking reader's input over a complete in-memory buffer.
pub(crate) fn blocking_input_direct(data: &[u8]) -> blocking::Input<'_> {
    blocking::Input::Direct { data, consumed: 0 }
}

/// Builds the blocking reader's input over a decoding source and its
/// refill buffer.
pub(crate) fn blocking_input_streamed<'a>(
    src: DecodingSource<'a>,
    buf: Vec<u8>,
) -> blocking::Input<'a> {
    blocking::Input::Streamed {
        src,
        buf,
        consumed: 0,
    }
}

/// The pull-based token API shared by both reader variants.
///
/// `next_token` returns `Ok(None)` once all input is consumed; the
/// non-blocking reader may additionally return
/// [`TokenKind::NotAvailable`] when it needs more input fed.
pub trait TokenRead {
    fn next_token(&mut self) -> Result<Option<TokenKind>>;

    fn current_token(&self) -> Option<TokenKind>;

    /// Text of the current token: the decoded value for strings and
    /// names, raw text for numbers, the canonical form for literals.
    fn text(&self) -> Option<&str>;

    /// Whether [`text_characters`](Self::text_characters) can expose the
    /// token text without copying.
    fn has_text_characters(&self) -> bool {
        self.text_characters().is_some()
    }

    /// Zero-copy view of the current token text within the reader's
    /// token buffer, with [`text_offset`](Self::text_offset) and
    /// [`text_length`](Self::text_length) describing the slice.
    fn text_characters(&self) -> Option<&str>;

    fn text_offset(&self) -> usize {
        0
    }

    fn text_length(&self) -> usize {
        self.text().map_or(0, str::len)
    }

    /// The current property name, or the name of the enclosing entry.
    fn current_name(&self) -> Option<&str>;

    fn number_kind(&self) -> Option<NumberKind>;
    fn number_value(&self) -> Result<NumberValue>;

    /// Like [`number_value`](Self::number_value), but textual floating
    /// point resolves to BigDecimal, since the wire format does not
    /// preserve exact binary floating point.
    fn number_value_exact(&self) -> Result<NumberValue>;

    fn int_value(&self) -> Result<i32>;
    fn long_value(&self) -> Result<i64>;
    fn float_value(&self) -> Result<f32>;
    fn double_value(&self) -> Result<f64>;
    fn big_integer_value(&self) -> Result<BigInt>;
    fn decimal_value(&self) -> Result<BigDecimal>;
    fn boolean_value(&self) -> Result<bool>;

    /// Decodes the current string token as Base64 under `variant`.
    fn binary_value(&self, variant: &Base64Variant) -> Result<Vec<u8>>;

    /// CirJSON-Pointer to the current position, without the root index.
    fn pointer(&self) -> Pointer {
        self.path_as_pointer(false)
    }

    fn path_as_pointer(&self, include_root: bool) -> Pointer;

    /// Current nesting depth: `start-*` tokens minus `end-*` tokens.
    fn depth(&self) -> usize;

    fn capabilities(&self) -> Capabilities {
        CIRJSON_READ_CAPABILITIES
    }

    fn current_location(&self) -> Location;
    fn token_location(&self) -> Location;

    /// Count of fed or buffered input units not yet consumed.
    fn release_buffered(&self) -> usize;

    fn close(&mut self) -> Result<()>;

    /// Skips the children of the current structure-start token, leaving
    /// the reader positioned at the matching end token. A no-op when the
    /// current token is not a structure start.
    fn skip_children(&mut self) -> Result<()> {
        let Some(current) = self.current_token() else {
            return Ok(());
        };
        if !current.is_structure_start() {
            return Ok(());
        }
        let mut open = 1u32;
        while open > 0 {
            match self.next_token()? {
                Some(TokenKind::NotAvailable) => {
                    return Err(Error::misuse(
                        "skip_children requires complete input: reader returned NotAvailable",
                    ));
                }
                Some(t) if t.is_structure_start() => open += 1,
                Some(t) if t.is_structure_end() => open -= 1,
                Some(_) => {}
                None => {
                    return Err(Error::stream_read(
                        "Unexpected end-of-input while skipping children",
                        self.current_location(),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Advances and returns the next property name, or None when the
    /// next token is not a property name.
    fn next_name(&mut self) -> Result<Option<&str>> {
        match self.next_token()? {
            Some(TokenKind::PropertyName) => Ok(self.text()),
            _ => Ok(None),
        }
    }

    /// Advances and returns the next string value, or None when the next
    /// token is not a string.
    fn next_text_value(&mut self) -> Result<Option<&str>> {
        match self.next_token()? {
            Some(TokenKind::ValueString) => Ok(self.text()),
            _ => Ok(None),
        }
    }
}

// Typed-accessor logic shared by both reader variants, operating over the
// common tokenizer.

fn not_numeric(tok: &Tokenizer) -> Error {
    let kind = tok
        .current_token()
        .map(|t| format!("{t:?}"))
        .unwrap_or_else(|| "none".to_string());
    Error::coercion(
        format!("Current token ({kind}) is not numeric: can not use numeric value accessors"),
        None,
        tok.current_location(),
    )
}

pub(crate) fn number_value(tok: &Tokenizer) -> Result<NumberValue> {
    match tok.current_token() {
        Some(TokenKind::ValueNumberInt) => Ok(tok
            .number_value()
            .cloned()
            .expect("integral token retains its parsed value")),
        Some(TokenKind::ValueNumberFloat) => {
            let v = num::parse_f64(tok.number_raw(), tok.fast_double_parser())
                .map_err(|e| Error::stream_read(e.to_string(), tok.current_location()))?;
            Ok(NumberValue::Double(v))
        }
        _ => Err(not_numeric(tok)),
    }
}

pub(crate) fn number_value_exact(tok: &Tokenizer) -> Result<NumberValue> {
    match tok.current_token() {
        Some(TokenKind::ValueNumberFloat) => {
            let dec = num::parse_big_decimal(tok.number_raw())
                .map_err(|e| Error::stream_read(e.to_string(), tok.current_location()))?;
            Ok(NumberValue::BigDecimal(dec))
        }
        _ => number_value(tok),
    }
}

pub(crate) fn number_kind(tok: &Tokenizer) -> Option<NumberKind> {
    match tok.current_token()? {
        TokenKind::ValueNumberInt => tok.number_value().map(NumberValue::kind),
        TokenKind::ValueNumberFloat => Some(NumberKind::Double),
        _ => None,
    }
}

pub(crate) fn int_value(tok: &Tokenizer) -> Result<i32> {
    let value = number_value(tok)?;
    value.as_i32().ok_or_else(|| {
        Error::coercion(
            format!(
                "Numeric value ({}) out of range of int (-2147483648 - 2147483647)",
                tok.number_raw()
            ),
            Some(NumberKind::Int),
            tok.current_location(),
        )
    })
}

pub(crate) fn long_value(tok: &Tokenizer) -> Result<i64> {
    let value = number_value(tok)?;
    value.as_i64().ok_or_else(|| {
        Error::coercion(
            format!(
                "Numeric value ({}) out of range of long (-9223372036854775808 - 9223372036854775807)",
                tok.number_raw()
            ),
            Some(NumberKind::Long),
            tok.current_location(),
        )
    })
}

pub(crate) fn double_value(tok: &Tokenizer) -> Result<f64> {
    Ok(number_value(tok)?.as_f64())
}

pub(crate) fn float_value(tok: &Tokenizer) -> Result<f32> {
    match tok.current_token() {
        Some(TokenKind::ValueNumberFloat) => num::parse_f32(tok.number_raw())
            .map_err(|e| Error::stream_read(e.to_string(), tok.current_location())),
        _ => Ok(number_value(tok)?.as_f64() as f32),
    }
}

pub(crate) fn big_integer_value(tok: &Tokenizer) -> Result<BigInt> {
    let value = number_value_exact(tok)?;
    value.as_big_int().ok_or_else(|| {
        Error::coercion(
            format!(
                "Numeric value ({}) can not be represented as BigInteger",
                tok.number_raw()
            ),
            Some(NumberKind::BigInteger),
            tok.current_location(),
        )
    })
}

pub(crate) fn decimal_value(tok: &Tokenizer) -> Result<BigDecimal> {
    let value = number_value_exact(tok)?;
    value.as_big_decimal().ok_or_else(|| {
        Error::coercion(
            format!(
                "Numeric value ({}) can not be represented as BigDecimal",
                tok.number_raw()
            ),
            Some(NumberKind::BigDecimal),
            tok.current_location(),
        )
    })
}

pub(crate) fn boolean_value(tok: &Tokenizer) -> Result<bool> {
    match tok.current_token() {
        Some(TokenKind::ValueTrue) => Ok(true),
        Some(TokenKind::ValueFalse) => Ok(false),
        other => {
            let kind = other
                .map(|t| format!("{t:?}"))
                .unwrap_or_else(|| "none".to_string());
            Err(Error::coercion(
                format!("Current token ({kind}) is not a boolean value"),
                None,
                tok.current_location(),
            ))
        }
    }
}

pub(crate) fn binary_value(tok: &Tokenizer, variant: &Base64Variant) -> Result<Vec<u8>> {
    match tok.current_token() {
        Some(TokenKind::ValueString) => {
            let text = tok.text().unwrap_or_default();
            variant
                .decode_to_vec(text)
                .map_err(|e| Error::stream_read(e.to_string(), tok.current_location()))
        }
        other => {
            let kind = other
                .map(|t| format!("{t:?}"))
                .unwrap_or_else(|| "none".to_string());
            Err(Error::coercion(
                format!(
                    "Current token ({kind}) is not a String value: can not access as binary"
                ),
                None,
                tok.current_location(),
            ))
        }
    }
}
