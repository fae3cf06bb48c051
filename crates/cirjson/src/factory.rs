//! The immutable factory: carries all constraints, feature bitsets, the
//! recycler pool and the symbol table, and constructs reader and writer
//! instances over the supported input and output shapes.
//!
//! Resource ownership follows the "who supplied it" rule: streams the
//! caller passed in are released on close only under `AutoCloseSource` /
//! `AutoCloseTarget`, while resources the factory opened itself (files)
//! are always owned and released.

use crate::constraints::{ErrorReportConfiguration, StreamReadConstraints, StreamWriteConstraints};
use crate::error::{Error, Result};
use crate::escape::EscapeOptions;
use crate::features::{
    CirJsonReadFeature, CirJsonWriteFeature, FactoryFeature, FeatureSet, ReadFeature, WriteFeature,
};
use crate::io::{FormatSchema, ObjectReadContext, ObjectWriteContext};
use crate::location::ContentReference;
use crate::reader::{
    detect_encoding, CirJsonReader, DecodingSource, Encoding, NonBlockingCirJsonReader,
    RawSource, ReaderConfig, Tokenizer,
};
use crate::recycler::{BoundRecycler, BufferRecycler, ByteBufferKind, RecyclerPool};
use crate::symbols::SymbolPool;
use crate::writer::{ByteTarget, CharTarget, CirJsonWriter, WriterParts};
use std::fmt;
use std::io;
use std::io::Read as _;
use std::path::Path;
use std::sync::Arc;

/// The format name reported to schema negotiation.
pub const FORMAT_NAME: &str = "CirJSON";

/// Immutable, freely shareable factory for CirJSON readers and writers.
#[derive(Clone)]
pub struct CirJsonFactory {
    read_features: FeatureSet<ReadFeature>,
    write_features: FeatureSet<WriteFeature>,
    factory_features: FeatureSet<FactoryFeature>,
    format_read_features: FeatureSet<CirJsonReadFeature>,
    format_write_features: FeatureSet<CirJsonWriteFeature>,
    read_constraints: StreamReadConstraints,
    write_constraints: StreamWriteConstraints,
    error_config: ErrorReportConfiguration,
    recycler_pool: RecyclerPool,
    symbols: Arc<SymbolPool>,
}

impl fmt::Debug for CirJsonFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CirJsonFactory")
            .field("read_features", &self.read_features)
            .field("write_features", &self.write_features)
            .field("factory_features", &self.factory_features)
            .finish_non_exhaustive()
    }
}

impl Default for CirJsonFactory {
    fn default() -> Self {
        CirJsonFactoryBuilder::default()
            .build()
            .expect("default configuration is valid")
    }
}

impl CirJsonFactory {
    pub fn builder() -> CirJsonFactoryBuilder {
        CirJsonFactoryBuilder::default()
    }

    /// Build-time embedded version of this library.
    pub fn version() -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    /// Whether the given schema can drive this factory's format. CirJSON
    /// itself uses no schema, so only the format tag is accepted.
    pub fn can_use_schema(&self, schema: &dyn FormatSchema) -> bool {
        schema.schema_type() == FORMAT_NAME
    }

    pub fn is_read_enabled(&self, feature: ReadFeature) -> bool {
        self.read_features.is_enabled(feature)
    }

    pub fn is_write_enabled(&self, feature: WriteFeature) -> bool {
        self.write_features.is_enabled(feature)
    }

    pub fn is_factory_enabled(&self, feature: FactoryFeature) -> bool {
        self.factory_features.is_enabled(feature)
    }

    pub fn read_constraints(&self) -> &StreamReadConstraints {
        &self.read_constraints
    }

    pub fn write_constraints(&self) -> &StreamWriteConstraints {
        &self.write_constraints
    }

    pub fn recycler_pool(&self) -> &RecyclerPool {
        &self.recycler_pool
    }

    fn reader_config(&self, ctx: &dyn ObjectReadContext) -> ReaderConfig {
        ReaderConfig {
            read_features: ctx.read_features(self.read_features),
            format_features: ctx.format_read_features(self.format_read_features),
            constraints: ctx.read_constraints(self.read_constraints),
            error_config: ctx.error_report_configuration(self.error_config),
        }
    }

    fn tokenizer(
        &self,
        ctx: &dyn ObjectReadContext,
        content: ContentReference,
        char_source: bool,
    ) -> Tokenizer {
        Tokenizer::new(
            self.reader_config(ctx),
            content,
            char_source,
            self.symbols.scope(),
        )
    }

    // Readers.

    /// Reader over a complete byte buffer. UTF-16/32 content is detected
    /// (unless `CharsetDetection` is disabled) and transcoded; plain
    /// UTF-8 is consumed in place without copying.
    pub fn reader_for_slice<'a>(
        &self,
        ctx: &dyn ObjectReadContext,
        data: &'a [u8],
    ) -> Result<CirJsonReader<'a>> {
        let (encoding, bom) = if self.factory_features.is_enabled(FactoryFeature::CharsetDetection)
        {
            detect_encoding(data)
        } else if data.starts_with(&[0xEF, 0xBB, 0xBF]) {
            (Encoding::Utf8, 3)
        } else {
            (Encoding::Utf8, 0)
        };
        let data = &data[bom..];
        let content = ContentReference::binary("(bytes)");
        let tokenizer = self.tokenizer(ctx, content, false);

        if encoding == Encoding::Utf8 {
            let input = crate::reader::blocking_input_direct(data);
            Ok(CirJsonReader::new(tokenizer, input, None, false))
        } else {
            let src = DecodingSource::new(RawSource::Slice { data, pos: 0 }, encoding);
            let mut bound = BoundRecycler::pooled(&self.recycler_pool);
            let buf = bound.get_mut().acquire_bytes(ByteBufferKind::ReadIo);
            let input = crate::reader::blocking_input_streamed(src, buf);
            Ok(CirJsonReader::new(tokenizer, input, Some(bound), false))
        }
    }

    /// Reader over a sub-range of a byte buffer.
    pub fn reader_for_slice_range<'a>(
        &self,
        ctx: &dyn ObjectReadContext,
        data: &'a [u8],
        offset: usize,
        len: usize,
    ) -> Result<CirJsonReader<'a>> {
        let end = offset.checked_add(len).filter(|end| *end <= data.len());
        let Some(end) = end else {
            return Err(Error::misuse(format!(
                "invalid buffer range: offset {offset} + length {len} exceeds buffer size {}",
                data.len()
            )));
        };
        self.reader_for_slice(ctx, &data[offset..end])
    }

    /// Reader over string content.
    pub fn reader_for_str<'a>(
        &self,
        ctx: &dyn ObjectReadContext,
        text: &'a str,
    ) -> Result<CirJsonReader<'a>> {
        let content = ContentReference::text("(String)");
        let tokenizer = self.tokenizer(ctx, content, true);
        let input = crate::reader::blocking_input_direct(text.as_bytes());
        Ok(CirJsonReader::new(tokenizer, input, None, false))
    }

    /// Reader over an input stream supplied by the caller. The stream is
    /// released on close only under `AutoCloseSource`.
    pub fn reader_for_read<'a>(
        &self,
        ctx: &dyn ObjectReadContext,
        input: impl io::Read + 'a,
    ) -> Result<CirJsonReader<'a>> {
        self.streamed_reader(ctx, Box::new(input), ContentReference::binary("(Read)"), false)
    }

    /// Reader over an input stream, using a caller-supplied recycler.
    /// The recycler is externally owned and will not be returned to the
    /// factory pool on close.
    pub fn reader_for_read_with_recycler<'a>(
        &self,
        ctx: &dyn ObjectReadContext,
        input: impl io::Read + 'a,
        recycler: BufferRecycler,
    ) -> Result<CirJsonReader<'a>> {
        let mut bound = BoundRecycler::external(recycler);
        let buf = bound.get_mut().acquire_bytes(ByteBufferKind::ReadIo);
        self.streamed_reader_with(
            ctx,
            Box::new(input),
            ContentReference::binary("(Read)"),
            false,
            bound,
            buf,
        )
    }

    /// Reader over a file the factory opens itself; the file is always
    /// owned and released on close.
    pub fn reader_for_file(
        &self,
        ctx: &dyn ObjectReadContext,
        path: &Path,
    ) -> Result<CirJsonReader<'static>> {
        let file = std::fs::File::open(path)
            .map_err(|e| Error::io(e, crate::location::Location::NA))?;
        let content = ContentReference::binary(format!("(file {})", path.display()));
        self.streamed_reader(ctx, Box::new(file), content, true)
    }

    fn streamed_reader<'a>(
        &self,
        ctx: &dyn ObjectReadContext,
        input: Box<dyn io::Read + 'a>,
        content: ContentReference,
        owned_source: bool,
    ) -> Result<CirJsonReader<'a>> {
        let mut bound = BoundRecycler::pooled(&self.recycler_pool);
        let buf = bound.get_mut().acquire_bytes(ByteBufferKind::ReadIo);
        self.streamed_reader_with(ctx, input, content, owned_source, bound, buf)
    }

    fn streamed_reader_with<'a>(
        &self,
        ctx: &dyn ObjectReadContext,
        mut input: Box<dyn io::Read + 'a>,
        content: ContentReference,
        owned_source: bool,
        bound: BoundRecycler,
        buf: Vec<u8>,
    ) -> Result<CirJsonReader<'a>> {
        // Pull up to 4 bytes to classify the encoding, then replay them
        // in front of the stream.
        let mut prefix = Vec::with_capacity(4);
        while prefix.len() < 4 {
            let mut byte = [0u8; 1];
            let n = input
                .read(&mut byte)
                .map_err(|e| Error::io(e, crate::location::Location::NA))?;
            if n == 0 {
                break;
            }
            prefix.push(byte[0]);
        }
        let (encoding, bom) = if self.factory_features.is_enabled(FactoryFeature::CharsetDetection)
        {
            detect_encoding(&prefix)
        } else if prefix.starts_with(&[0xEF, 0xBB, 0xBF]) {
            (Encoding::Utf8, 3)
        } else {
            (Encoding::Utf8, 0)
        };
        let replay = prefix.split_off(bom);
        let chained: Box<dyn io::Read + 'a> = Box::new(io::Cursor::new(replay).chain(input));

        let tokenizer = self.tokenizer(ctx, content, false);
        let src = DecodingSource::new(RawSource::Read(chained), encoding);
        let input = crate::reader::blocking_input_streamed(src, buf);
        Ok(CirJsonReader::new(tokenizer, input, Some(bound), owned_source))
    }

    /// Non-blocking, feed-driven reader over UTF-8 input.
    pub fn non_blocking_reader(
        &self,
        ctx: &dyn ObjectReadContext,
    ) -> Result<NonBlockingCirJsonReader> {
        let content = ContentReference::binary("(feeder)");
        Ok(NonBlockingCirJsonReader::new(
            self.tokenizer(ctx, content, false),
        ))
    }

    // Writers.

    fn writer_parts(&self, ctx: &dyn ObjectWriteContext, recycler: Option<BoundRecycler>) -> WriterParts {
        let format_features = ctx.format_write_features(self.format_write_features);
        WriterParts {
            features: ctx.write_features(self.write_features),
            constraints: ctx.write_constraints(self.write_constraints),
            escapes: EscapeOptions {
                escape_non_ascii: format_features
                    .is_enabled(CirJsonWriteFeature::EscapeNonAscii),
                escape_forward_slashes: format_features
                    .is_enabled(CirJsonWriteFeature::EscapeForwardSlashes),
                custom: ctx.character_escapes(),
            },
            format_features,
            pretty: ctx.pretty_printer().map(|pp| pp.fresh()),
            root_separator: ctx.root_value_separator(),
            recycler,
        }
    }

    /// Writer producing an in-memory byte buffer, retrieved with
    /// [`CirJsonWriter::into_target`] and [`ByteTarget::into_vec`].
    pub fn writer_for_vec(
        &self,
        ctx: &dyn ObjectWriteContext,
    ) -> Result<CirJsonWriter<ByteTarget<'static>>> {
        let parts = self.writer_parts(ctx, None);
        Ok(CirJsonWriter::from_parts(ByteTarget::in_memory(), parts))
    }

    /// Writer over an output stream supplied by the caller.
    pub fn writer_for_write<'a>(
        &self,
        ctx: &dyn ObjectWriteContext,
        out: impl io::Write + 'a,
    ) -> Result<CirJsonWriter<ByteTarget<'a>>> {
        let mut bound = BoundRecycler::pooled(&self.recycler_pool);
        let buf = bound.get_mut().acquire_bytes(ByteBufferKind::WriteIo);
        let parts = self.writer_parts(ctx, Some(bound));
        Ok(CirJsonWriter::from_parts(
            ByteTarget::to_sink(Box::new(out), buf),
            parts,
        ))
    }

    /// Writer over a file the factory creates itself; always owned.
    pub fn writer_for_file(
        &self,
        ctx: &dyn ObjectWriteContext,
        path: &Path,
    ) -> Result<CirJsonWriter<ByteTarget<'static>>> {
        let file = std::fs::File::create(path)
            .map_err(|e| Error::io(e, crate::location::Location::NA))?;
        let mut bound = BoundRecycler::pooled(&self.recycler_pool);
        let buf = bound.get_mut().acquire_bytes(ByteBufferKind::WriteIo);
        let parts = self.writer_parts(ctx, Some(bound));
        Ok(CirJsonWriter::from_parts(
            ByteTarget::to_sink(Box::new(file), buf),
            parts,
        ))
    }

    /// Writer producing an in-memory String, retrieved with
    /// [`CirJsonWriter::into_target`] and [`CharTarget::into_string`].
    pub fn writer_for_string(
        &self,
        ctx: &dyn ObjectWriteContext,
    ) -> Result<CirJsonWriter<CharTarget<'static>>> {
        let parts = self.writer_parts(ctx, None);
        Ok(CirJsonWriter::from_parts(CharTarget::in_memory(), parts))
    }

    /// Writer over a character sink supplied by the caller.
    pub fn writer_for_fmt<'a>(
        &self,
        ctx: &dyn ObjectWriteContext,
        out: impl fmt::Write + 'a,
    ) -> Result<CirJsonWriter<CharTarget<'a>>> {
        let parts = self.writer_parts(ctx, None);
        Ok(CirJsonWriter::from_parts(
            CharTarget::to_sink(Box::new(out)),
            parts,
        ))
    }
}

/// Mutable companion of [`CirJsonFactory`]; `build` produces the
/// immutable factory.
#[derive(Debug, Clone)]
pub struct CirJsonFactoryBuilder {
    read_features: FeatureSet<ReadFeature>,
    write_features: FeatureSet<WriteFeature>,
    factory_features: FeatureSet<FactoryFeature>,
    format_read_features: FeatureSet<CirJsonReadFeature>,
    format_write_features: FeatureSet<CirJsonWriteFeature>,
    read_constraints: StreamReadConstraints,
    write_constraints: StreamWriteConstraints,
    error_config: ErrorReportConfiguration,
    recycler_pool: Option<RecyclerPool>,
}

impl Default for CirJsonFactoryBuilder {
    fn default() -> Self {
        Self {
            read_features: FeatureSet::defaults(),
            write_features: FeatureSet::defaults(),
            factory_features: FeatureSet::defaults(),
            format_read_features: FeatureSet::defaults(),
            format_write_features: FeatureSet::defaults(),
            read_constraints: StreamReadConstraints::default(),
            write_constraints: StreamWriteConstraints::default(),
            error_config: ErrorReportConfiguration::default(),
            recycler_pool: None,
        }
    }
}

impl CirJsonFactoryBuilder {
    pub fn enable_read(self, feature: ReadFeature) -> Self {
        self.configure_read(feature, true)
    }

    pub fn disable_read(self, feature: ReadFeature) -> Self {
        self.configure_read(feature, false)
    }

    pub fn configure_read(mut self, feature: ReadFeature, enabled: bool) -> Self {
        self.read_features = self.read_features.configured(feature, enabled);
        self
    }

    pub fn enable_write(self, feature: WriteFeature) -> Self {
        self.configure_write(feature, true)
    }

    pub fn disable_write(self, feature: WriteFeature) -> Self {
        self.configure_write(feature, false)
    }

    pub fn configure_write(mut self, feature: WriteFeature, enabled: bool) -> Self {
        self.write_features = self.write_features.configured(feature, enabled);
        self
    }

    pub fn enable_factory(self, feature: FactoryFeature) -> Self {
        self.configure_factory(feature, true)
    }

    pub fn disable_factory(self, feature: FactoryFeature) -> Self {
        self.configure_factory(feature, false)
    }

    pub fn configure_factory(mut self, feature: FactoryFeature, enabled: bool) -> Self {
        self.factory_features = self.factory_features.configured(feature, enabled);
        self
    }

    pub fn enable_format_read(self, feature: CirJsonReadFeature) -> Self {
        self.configure_format_read(feature, true)
    }

    pub fn disable_format_read(self, feature: CirJsonReadFeature) -> Self {
        self.configure_format_read(feature, false)
    }

    pub fn configure_format_read(mut self, feature: CirJsonReadFeature, enabled: bool) -> Self {
        self.format_read_features = self.format_read_features.configured(feature, enabled);
        self
    }

    pub fn enable_format_write(self, feature: CirJsonWriteFeature) -> Self {
        self.configure_format_write(feature, true)
    }

    pub fn disable_format_write(self, feature: CirJsonWriteFeature) -> Self {
        self.configure_format_write(feature, false)
    }

    pub fn configure_format_write(mut self, feature: CirJsonWriteFeature, enabled: bool) -> Self {
        self.format_write_features = self.format_write_features.configured(feature, enabled);
        self
    }

    pub fn stream_read_constraints(mut self, constraints: StreamReadConstraints) -> Self {
        self.read_constraints = constraints;
        self
    }

    pub fn stream_write_constraints(mut self, constraints: StreamWriteConstraints) -> Self {
        self.write_constraints = constraints;
        self
    }

    pub fn error_report_configuration(mut self, config: ErrorReportConfiguration) -> Self {
        self.error_config = config;
        self
    }

    /// Shares an existing recycler pool instead of allocating a fresh
    /// one, so several factories can draw from the same buffers.
    pub fn recycler_pool(mut self, pool: RecyclerPool) -> Self {
        self.recycler_pool = Some(pool);
        self
    }

    pub fn build(self) -> Result<CirJsonFactory> {
        self.read_constraints.validate()?;
        self.write_constraints.validate()?;
        let symbols = SymbolPool::new(
            self.factory_features
                .is_enabled(FactoryFeature::CanonicalizePropertyNames),
            self.factory_features
                .is_enabled(FactoryFeature::InternPropertyNames),
            self.factory_features
                .is_enabled(FactoryFeature::FailOnSymbolHashOverflow),
        );
        tracing::debug!(
            version = CirJsonFactory::version(),
            read_features = self.read_features.bits(),
            write_features = self.write_features.bits(),
            factory_features = self.factory_features.bits(),
            "constructed CirJSON factory"
        );
        Ok(CirJsonFactory {
            read_features: self.read_features,
            write_features: self.write_features,
            factory_features: self.factory_features,
            format_read_features: self.format_read_features,
            format_write_features: self.format_write_features,
            read_constraints: self.read_constraints,
            write_constraints: self.write_constraints,
            error_config: self.error_config,
            recycler_pool: self.recycler_pool.unwrap_or_default(),
            symbols,
        })
    }
}
