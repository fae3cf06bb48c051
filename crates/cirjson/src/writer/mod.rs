//! Streaming writer: validates structural and scalar calls against its
//! own context stack, emits the mandatory identity elements when
//! structures open, and escapes or encodes values on the way out.

mod bytes;
mod text;

pub use bytes::ByteTarget;
pub use text::CharTarget;

use crate::base64::Base64Variant;
use crate::constraints::StreamWriteConstraints;
use crate::context::ContextStack;
use crate::error::{Error, Result};
use crate::escape::{append_escaped, EscapeOptions, SerializedString};
use crate::features::{CirJsonWriteFeature, FeatureSet, WriteFeature};
use crate::io::{PrettyPrinter, RawEmitter};
use crate::location::Location;
use crate::num;
use crate::token::{Capabilities, CIRJSON_WRITE_CAPABILITIES};
use crate::ID_PROPERTY_NAME;
use bigdecimal::BigDecimal;
use num_bigint::BigInt;
use std::any::Any;
use std::io;

/// Output surface of a writer: a byte or char staging buffer, optionally
/// in front of a sink.
pub trait OutputTarget {
    fn write_str(&mut self, s: &str) -> Result<()>;

    /// Unflushed unit count: bytes for byte targets, chars for char
    /// targets.
    fn buffered(&self) -> usize;

    /// Moves staged content to the sink; `flush_target` additionally
    /// flushes the sink itself.
    fn flush(&mut self, flush_target: bool) -> Result<()>;

    /// Final flush on close; `auto_close_target` releases the sink.
    fn finish(&mut self, auto_close_target: bool) -> Result<()>;

    /// Gives up the staging buffer for recycling, when it has one that is
    /// not the output itself.
    fn reclaim_bytes(&mut self) -> Option<Vec<u8>>;
}

impl<T: OutputTarget> RawEmitter for T {
    fn emit_raw(&mut self, text: &str) -> Result<()> {
        self.write_str(text)
    }
}

/// Supplies the identity strings the writer must emit when opening an
/// object or array. Invoked with the application's current-value payload
/// when one was provided.
pub trait IdProvider {
    fn object_id(&mut self, current_value: Option<&dyn Any>) -> String;
    fn array_id(&mut self, current_value: Option<&dyn Any>) -> String;
}

/// Default provider: sequential numeric identities, unique per document.
#[derive(Debug, Default)]
pub struct SequentialIdProvider {
    next: u64,
}

impl IdProvider for SequentialIdProvider {
    fn object_id(&mut self, _current_value: Option<&dyn Any>) -> String {
        let id = self.next;
        self.next += 1;
        num::format_i64(id as i64)
    }

    fn array_id(&mut self, current_value: Option<&dyn Any>) -> String {
        self.object_id(current_value)
    }
}

pub(crate) struct WriterParts {
    pub features: FeatureSet<WriteFeature>,
    pub format_features: FeatureSet<CirJsonWriteFeature>,
    pub constraints: StreamWriteConstraints,
    pub escapes: EscapeOptions,
    pub pretty: Option<Box<dyn PrettyPrinter>>,
    pub root_separator: Option<String>,
    pub recycler: Option<crate::recycler::BoundRecycler>,
}

/// Streaming CirJSON writer over an [`OutputTarget`].
pub struct CirJsonWriter<T: OutputTarget> {
    out: T,
    context: ContextStack,
    features: FeatureSet<WriteFeature>,
    format_features: FeatureSet<CirJsonWriteFeature>,
    constraints: StreamWriteConstraints,
    escapes: EscapeOptions,
    pretty: Option<Box<dyn PrettyPrinter>>,
    id_provider: Box<dyn IdProvider>,
    root_separator: Option<String>,
    recycler: Option<crate::recycler::BoundRecycler>,
    scratch: String,
    closed: bool,
}

impl<T: OutputTarget> CirJsonWriter<T> {
    pub(crate) fn from_parts(out: T, parts: WriterParts) -> Self {
        let detect_dups = parts
            .features
            .is_enabled(WriteFeature::StrictDuplicateDetection);
        Self {
            out,
            context: ContextStack::new(detect_dups),
            features: parts.features,
            format_features: parts.format_features,
            constraints: parts.constraints,
            escapes: parts.escapes,
            pretty: parts.pretty,
            id_provider: Box::new(SequentialIdProvider::default()),
            root_separator: parts.root_separator,
            recycler: parts.recycler,
            scratch: String::new(),
            closed: false,
        }
    }

    /// Replaces the identity provider. Must be called before any
    /// structure is opened.
    pub fn set_id_provider(&mut self, provider: Box<dyn IdProvider>) {
        self.id_provider = provider;
    }

    /// Replaces the live character-escape policy.
    pub fn set_character_escapes(
        &mut self,
        escapes: Option<std::sync::Arc<dyn crate::escape::CharacterEscapes>>,
    ) {
        self.escapes.custom = escapes;
    }

    pub fn capabilities(&self) -> Capabilities {
        CIRJSON_WRITE_CAPABILITIES
    }

    pub fn depth(&self) -> usize {
        self.context.depth()
    }

    pub fn current_name(&self) -> Option<&str> {
        self.context.current_name()
    }

    /// Unflushed output units: bytes for byte targets, chars for char
    /// targets.
    pub fn output_buffered(&self) -> usize {
        self.out.buffered()
    }

    /// Attaches an application payload to the current context frame.
    pub fn set_current_value(&mut self, value: Box<dyn Any>) {
        self.context.current_mut().set_current_value(Some(value));
    }

    pub fn current_value(&self) -> Option<&dyn Any> {
        self.context.current().current_value()
    }

    fn check_open(&self) -> Result<()> {
        if self.closed {
            return Err(Error::misuse("writer is closed"));
        }
        Ok(())
    }

    fn fail_write(&self, message: impl Into<String>) -> Error {
        Error::stream_write(message, Location::NA)
    }

    // Separator and structural-char emission, routed through the pretty
    // printer when one is installed.

    fn emit_root_separator(&mut self) -> Result<()> {
        if let Some(pp) = self.pretty.as_mut() {
            return pp.write_root_value_separator(&mut self.out);
        }
        if let Some(sep) = &self.root_separator {
            return self.out.write_str(sep);
        }
        Ok(())
    }

    fn emit_array_separator(&mut self) -> Result<()> {
        match self.pretty.as_mut() {
            Some(pp) => pp.write_array_value_separator(&mut self.out),
            None => self.out.write_str(","),
        }
    }

    fn emit_entry_separator(&mut self) -> Result<()> {
        match self.pretty.as_mut() {
            Some(pp) => pp.write_object_entry_separator(&mut self.out),
            None => self.out.write_str(","),
        }
    }

    fn emit_name_value_separator(&mut self) -> Result<()> {
        match self.pretty.as_mut() {
            Some(pp) => pp.write_object_name_value_separator(&mut self.out),
            None => self.out.write_str(":"),
        }
    }

    /// Validation and separator emission preceding any value write.
    fn before_value(&mut self) -> Result<()> {
        self.check_open()?;
        match self.context.kind() {
            crate::context::ContextKind::Root => {
                if self.context.entry_index() >= 0 {
                    self.emit_root_separator()?;
                }
                self.context.advance();
            }
            crate::context::ContextKind::Array => {
                // The identity string is always element zero, so every
                // application value is preceded by a separator.
                self.emit_array_separator()?;
                self.context.advance();
            }
            crate::context::ContextKind::Object => {
                if self.context.current_name().is_none() {
                    return Err(Error::misuse(
                        "can not write a value in an Object context: expecting a property name",
                    ));
                }
                self.emit_name_value_separator()?;
            }
        }
        Ok(())
    }

    fn after_value(&mut self) {
        if self.context.in_object() {
            self.context.clear_current_name();
        }
    }

    fn emit_quoted(&mut self, s: &str) -> Result<()> {
        self.scratch.clear();
        self.scratch.push('"');
        append_escaped(&mut self.scratch, s, &self.escapes);
        self.scratch.push('"');
        self.out.write_str(&self.scratch)
    }

    // Structural writes.

    pub fn write_start_object(&mut self) -> Result<()> {
        self.start_object_internal(None)
    }

    /// Opens an object carrying the application's current value, which is
    /// passed to the identity provider and stored in the context frame.
    pub fn write_start_object_for(&mut self, value: Box<dyn Any>) -> Result<()> {
        self.start_object_internal(Some(value))
    }

    fn start_object_internal(&mut self, value: Option<Box<dyn Any>>) -> Result<()> {
        self.before_value()?;
        self.constraints
            .check_nesting_depth(self.context.depth() + 1, &Location::NA)?;
        self.context.push_object(None);
        self.context.current_mut().set_current_value(value);

        let id = self
            .id_provider
            .object_id(self.context.current().current_value());
        if id.is_empty() {
            return Err(self.fail_write(format!(
                "the identity of an Object (property '{ID_PROPERTY_NAME}') must be a non-empty String"
            )));
        }

        match self.pretty.as_mut() {
            Some(pp) => {
                pp.write_start_object(&mut self.out)?;
                pp.before_object_entries(&mut self.out)?;
            }
            None => self.out.write_str("{")?,
        }
        self.out.write_str("\"")?;
        self.out.write_str(ID_PROPERTY_NAME)?;
        self.out.write_str("\"")?;
        self.emit_name_value_separator()?;
        self.emit_quoted(&id)
    }

    pub fn write_start_array(&mut self) -> Result<()> {
        self.start_array_internal(None, None)
    }

    pub fn write_start_array_for(&mut self, value: Box<dyn Any>) -> Result<()> {
        self.start_array_internal(Some(value), None)
    }

    /// Opens an array with a known element count, for formats that can
    /// exploit it; the text format ignores the hint.
    pub fn write_start_array_sized(&mut self, size: usize) -> Result<()> {
        self.start_array_internal(None, Some(size))
    }

    fn start_array_internal(
        &mut self,
        value: Option<Box<dyn Any>>,
        _size_hint: Option<usize>,
    ) -> Result<()> {
        self.before_value()?;
        self.constraints
            .check_nesting_depth(self.context.depth() + 1, &Location::NA)?;
        self.context.push_array(None);
        self.context.current_mut().set_current_value(value);

        let id = self
            .id_provider
            .array_id(self.context.current().current_value());
        if id.is_empty() {
            return Err(
                self.fail_write("the identity of an Array must be a non-empty String")
            );
        }

        match self.pretty.as_mut() {
            Some(pp) => {
                pp.write_start_array(&mut self.out)?;
                pp.before_array_values(&mut self.out)?;
            }
            None => self.out.write_str("[")?,
        }
        self.emit_quoted(&id)
    }

    pub fn write_end_object(&mut self) -> Result<()> {
        self.check_open()?;
        if !self.context.in_object() {
            return Err(Error::misuse(format!(
                "current context is not an Object but {}",
                self.context.kind().type_desc()
            )));
        }
        if self.context.current_name().is_some() {
            return Err(Error::misuse(
                "can not end an Object: a property name awaits its value",
            ));
        }
        let entries = self.context.entry_index() + 1;
        self.context.pop();
        match self.pretty.as_mut() {
            Some(pp) => pp.write_end_object(&mut self.out, entries)?,
            None => self.out.write_str("}")?,
        }
        self.after_value();
        Ok(())
    }

    pub fn write_end_array(&mut self) -> Result<()> {
        self.check_open()?;
        if !self.context.in_array() {
            return Err(Error::misuse(format!(
                "current context is not an Array but {}",
                self.context.kind().type_desc()
            )));
        }
        let values = self.context.entry_index() + 1;
        self.context.pop();
        match self.pretty.as_mut() {
            Some(pp) => pp.write_end_array(&mut self.out, values)?,
            None => self.out.write_str("]")?,
        }
        self.after_value();
        Ok(())
    }

    // Property names.

    pub fn write_name(&mut self, name: &str) -> Result<()> {
        self.begin_name(name)?;
        self.emit_quoted(name)
    }

    /// Emits a pre-encoded property name, skipping escaping work.
    pub fn write_name_serialized(&mut self, name: &SerializedString) -> Result<()> {
        self.begin_name(name.value())?;
        self.out.write_str("\"")?;
        self.out.write_str(name.as_quoted())?;
        self.out.write_str("\"")
    }

    /// Emits a numeric property id as its quoted decimal form.
    pub fn write_property_id(&mut self, id: i64) -> Result<()> {
        let text = num::format_i64(id);
        self.begin_name(&text)?;
        self.out.write_str("\"")?;
        self.out.write_str(&text)?;
        self.out.write_str("\"")
    }

    fn begin_name(&mut self, name: &str) -> Result<()> {
        self.check_open()?;
        if !self.context.in_object() {
            return Err(Error::misuse(format!(
                "can not write a property name: current context is {}",
                self.context.kind().type_desc()
            )));
        }
        if self.context.current_name().is_some() {
            return Err(Error::misuse(
                "can not write a property name: expecting a value",
            ));
        }
        self.context
            .set_current_name(name)
            .map_err(|dup| self.fail_write(format!("Duplicate Object property \"{}\"", dup.0)))?;
        self.context.advance();
        // The identity property always precedes, so a separator is
        // unconditionally due.
        self.emit_entry_separator()
    }

    // Scalar writes.

    pub fn write_string(&mut self, value: &str) -> Result<()> {
        self.before_value()?;
        self.emit_quoted(value)?;
        self.after_value();
        Ok(())
    }

    pub fn write_string_serialized(&mut self, value: &SerializedString) -> Result<()> {
        self.before_value()?;
        self.out.write_str("\"")?;
        self.out.write_str(value.as_quoted())?;
        self.out.write_str("\"")?;
        self.after_value();
        Ok(())
    }

    /// Writes a string supplied as UTF-8 bytes, escaping as needed.
    pub fn write_utf8_string(&mut self, value: &[u8]) -> Result<()> {
        let s = std::str::from_utf8(value)
            .map_err(|e| self.fail_write(format!("invalid UTF-8 content in string: {e}")))?;
        self.write_string(s)
    }

    /// Writes a string whose content is already escaped UTF-8, adding
    /// only the surrounding quotes.
    pub fn write_raw_utf8_string(&mut self, value: &[u8]) -> Result<()> {
        let s = std::str::from_utf8(value)
            .map_err(|e| self.fail_write(format!("invalid UTF-8 content in string: {e}")))?;
        self.before_value()?;
        self.out.write_str("\"")?;
        self.out.write_str(s)?;
        self.out.write_str("\"")?;
        self.after_value();
        Ok(())
    }

    /// Reads `len` bytes (or to end-of-stream when None) of UTF-8 from
    /// `source` and writes them as a string value. A stream shorter than
    /// the declared length is an error.
    pub fn write_string_from_read(
        &mut self,
        source: &mut dyn io::Read,
        len: Option<usize>,
    ) -> Result<()> {
        let data = self.read_exactly(source, len)?;
        self.write_utf8_string(&data)
    }

    pub fn write_boolean(&mut self, value: bool) -> Result<()> {
        self.before_value()?;
        self.out.write_str(if value { "true" } else { "false" })?;
        self.after_value();
        Ok(())
    }

    pub fn write_null(&mut self) -> Result<()> {
        self.before_value()?;
        self.out.write_str("null")?;
        self.after_value();
        Ok(())
    }

    pub fn write_number_i16(&mut self, value: i16) -> Result<()> {
        self.write_integral(value as i64)
    }

    pub fn write_number_i32(&mut self, value: i32) -> Result<()> {
        self.write_integral(value as i64)
    }

    pub fn write_number_i64(&mut self, value: i64) -> Result<()> {
        self.write_integral(value)
    }

    fn write_integral(&mut self, value: i64) -> Result<()> {
        self.before_value()?;
        let mut buf = itoa::Buffer::new();
        self.out.write_str(buf.format(value))?;
        self.after_value();
        Ok(())
    }

    pub fn write_number_big_int(&mut self, value: &BigInt) -> Result<()> {
        self.before_value()?;
        self.out.write_str(&value.to_string())?;
        self.after_value();
        Ok(())
    }

    pub fn write_number_f32(&mut self, value: f32) -> Result<()> {
        if !value.is_finite() {
            return self.write_non_finite(f64::from(value));
        }
        let fast = self.features.is_enabled(WriteFeature::UseFastDoubleWriter);
        self.before_value()?;
        let text = num::format_f32(value, fast);
        self.out.write_str(&text)?;
        self.after_value();
        Ok(())
    }

    pub fn write_number_f64(&mut self, value: f64) -> Result<()> {
        if !value.is_finite() {
            return self.write_non_finite(value);
        }
        let fast = self.features.is_enabled(WriteFeature::UseFastDoubleWriter);
        self.before_value()?;
        let text = num::format_f64(value, fast);
        self.out.write_str(&text)?;
        self.after_value();
        Ok(())
    }

    fn write_non_finite(&mut self, value: f64) -> Result<()> {
        if !self
            .format_features
            .is_enabled(CirJsonWriteFeature::WriteNanAsStrings)
        {
            return Err(self.fail_write(format!(
                "can not write number {value}: non-finite numbers require WriteNanAsStrings"
            )));
        }
        let text = if value.is_nan() {
            "NaN"
        } else if value > 0.0 {
            "Infinity"
        } else {
            "-Infinity"
        };
        self.write_string(text)
    }

    pub fn write_number_decimal(&mut self, value: &BigDecimal) -> Result<()> {
        let plain = self
            .features
            .is_enabled(WriteFeature::WriteBigDecimalAsPlain);
        self.before_value()?;
        let text = num::format_big_decimal(value, plain);
        self.out.write_str(&text)?;
        self.after_value();
        Ok(())
    }

    /// Writes pre-formatted number text verbatim, with normal separator
    /// handling.
    pub fn write_number_text(&mut self, encoded: &str) -> Result<()> {
        if encoded.is_empty() {
            return Err(self.fail_write("can not write an empty number"));
        }
        self.before_value()?;
        self.out.write_str(encoded)?;
        self.after_value();
        Ok(())
    }

    // Binary.

    /// Writes `data` as a Base64 string under `variant`. Linefeeds the
    /// variant prescribes are emitted as escaped `\n` sequences.
    pub fn write_binary(&mut self, variant: &Base64Variant, data: &[u8]) -> Result<()> {
        self.before_value()?;
        let encoded = variant.encode_with_options(data, true, "\\n");
        self.out.write_str(&encoded)?;
        self.after_value();
        Ok(())
    }

    /// Reads `len` bytes (or to end-of-stream when None) from `source`
    /// and writes them as Base64. A stream shorter than the declared
    /// length is an error.
    pub fn write_binary_from_read(
        &mut self,
        variant: &Base64Variant,
        source: &mut dyn io::Read,
        len: Option<usize>,
    ) -> Result<()> {
        let data = self.read_exactly(source, len)?;
        self.write_binary(variant, &data)
    }

    fn read_exactly(&self, source: &mut dyn io::Read, len: Option<usize>) -> Result<Vec<u8>> {
        match len {
            None => {
                let mut data = Vec::new();
                source
                    .read_to_end(&mut data)
                    .map_err(|e| Error::io(e, Location::NA))?;
                Ok(data)
            }
            Some(len) => {
                let mut data = vec![0u8; len];
                let mut filled = 0;
                while filled < len {
                    let n = source
                        .read(&mut data[filled..])
                        .map_err(|e| Error::io(e, Location::NA))?;
                    if n == 0 {
                        return Err(self.fail_write(format!(
                            "too few bytes available: missing {} bytes (out of {len})",
                            len - filled
                        )));
                    }
                    filled += n;
                }
                Ok(data)
            }
        }
    }

    // Raw output.

    /// Appends text verbatim: no escaping, no separators, no context
    /// update. The caller is responsible for output validity.
    pub fn write_raw(&mut self, text: &str) -> Result<()> {
        self.check_open()?;
        self.out.write_str(text)
    }

    /// Appends text verbatim as a value: escaping is bypassed but
    /// separators are inserted and the context advances.
    pub fn write_raw_value(&mut self, text: &str) -> Result<()> {
        self.before_value()?;
        self.out.write_str(text)?;
        self.after_value();
        Ok(())
    }

    // Lifecycle.

    /// Moves staged output toward the target. Whether the underlying
    /// sink's own flush is invoked is governed by `FlushPassedToStream`.
    pub fn flush(&mut self) -> Result<()> {
        self.check_open()?;
        self.out
            .flush(self.features.is_enabled(WriteFeature::FlushPassedToStream))
    }

    /// Closes the writer. With `AutoCloseContent` enabled, unmatched open
    /// structures are closed in order first. Idempotent.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        if self.features.is_enabled(WriteFeature::AutoCloseContent) {
            while self.context.depth() > 0 {
                if self.context.in_object() {
                    // A dangling property name can not be completed
                    // meaningfully; drop it and close the object.
                    self.context.clear_current_name();
                    self.write_end_object()?;
                } else {
                    self.write_end_array()?;
                }
            }
        }
        self.closed = true;
        self.out
            .finish(self.features.is_enabled(WriteFeature::AutoCloseTarget))?;
        if let Some(mut bound) = self.recycler.take() {
            if let Some(buf) = self.out.reclaim_bytes() {
                bound
                    .get_mut()
                    .release_bytes(crate::recycler::ByteBufferKind::WriteIo, buf);
            }
            bound.release();
        }
        Ok(())
    }

    /// Closes the writer and returns the output target, for in-memory
    /// targets whose buffer is the document.
    pub fn into_target(mut self) -> Result<T> {
        self.close()?;
        Ok(self.out)
    }
}
