//! Narrow contracts between the streaming core and the higher layers that
//! drive it: read/write contexts supplying configuration, the
//! pretty-printer hook surface, and the opaque format-schema tag.

use crate::constraints::{ErrorReportConfiguration, StreamReadConstraints, StreamWriteConstraints};
use crate::error::Result;
use crate::escape::CharacterEscapes;
use crate::features::{
    CirJsonReadFeature, CirJsonWriteFeature, FeatureSet, ReadFeature, WriteFeature,
};
use std::sync::Arc;

/// Opaque schema tag. The factory accepts or rejects schemas by type;
/// the CirJSON core itself uses no schema.
pub trait FormatSchema {
    fn schema_type(&self) -> &'static str;
}

/// Configuration supplied by the data-binding layer when constructing a
/// reader. The core consults it only for features and constraints; the
/// richer callbacks (tree construction, typed reads) live above the core.
///
/// Every method defaults to passing the factory defaults through, so an
/// empty context is a unit struct.
pub trait ObjectReadContext {
    fn read_features(&self, defaults: FeatureSet<ReadFeature>) -> FeatureSet<ReadFeature> {
        defaults
    }

    fn format_read_features(
        &self,
        defaults: FeatureSet<CirJsonReadFeature>,
    ) -> FeatureSet<CirJsonReadFeature> {
        defaults
    }

    fn read_constraints(&self, defaults: StreamReadConstraints) -> StreamReadConstraints {
        defaults
    }

    fn error_report_configuration(
        &self,
        defaults: ErrorReportConfiguration,
    ) -> ErrorReportConfiguration {
        defaults
    }
}

/// The no-customization read context.
#[derive(Debug, Default, Copy, Clone)]
pub struct EmptyReadContext;

impl ObjectReadContext for EmptyReadContext {}

/// Configuration supplied by the data-binding layer when constructing a
/// writer.
pub trait ObjectWriteContext {
    fn write_features(&self, defaults: FeatureSet<WriteFeature>) -> FeatureSet<WriteFeature> {
        defaults
    }

    fn format_write_features(
        &self,
        defaults: FeatureSet<CirJsonWriteFeature>,
    ) -> FeatureSet<CirJsonWriteFeature> {
        defaults
    }

    fn write_constraints(&self, defaults: StreamWriteConstraints) -> StreamWriteConstraints {
        defaults
    }

    /// Pretty printer for the writer, or None for compact output. A fresh
    /// instance is taken per writer via [`PrettyPrinter::fresh`].
    fn pretty_printer(&self) -> Option<Box<dyn PrettyPrinter>> {
        None
    }

    /// Custom character-escape policy, or None for the standard table.
    fn character_escapes(&self) -> Option<Arc<dyn CharacterEscapes>> {
        None
    }

    /// Separator written between root-level values. None suppresses it.
    fn root_value_separator(&self) -> Option<String> {
        Some(" ".to_string())
    }
}

/// The no-customization write context.
#[derive(Debug, Default, Copy, Clone)]
pub struct EmptyWriteContext;

impl ObjectWriteContext for EmptyWriteContext {}

/// Raw output surface handed to pretty-printer hooks. Both writer targets
/// implement it; emitted text bypasses escaping but is accounted in
/// buffering.
pub trait RawEmitter {
    fn emit_raw(&mut self, text: &str) -> Result<()>;
}

/// Formatting hooks invoked by writers around structural output. When a
/// pretty printer is installed it owns emission of the structural
/// characters themselves, so policies can place whitespace on either side.
pub trait PrettyPrinter {
    /// Returns a fresh instance for a new writer, so stateful printers
    /// (indentation depth) are never shared between writers.
    fn fresh(&self) -> Box<dyn PrettyPrinter>;

    fn write_root_value_separator(&mut self, out: &mut dyn RawEmitter) -> Result<()>;
    fn write_start_object(&mut self, out: &mut dyn RawEmitter) -> Result<()>;
    fn write_end_object(&mut self, out: &mut dyn RawEmitter, entry_count: i32) -> Result<()>;
    fn write_start_array(&mut self, out: &mut dyn RawEmitter) -> Result<()>;
    fn write_end_array(&mut self, out: &mut dyn RawEmitter, value_count: i32) -> Result<()>;
    fn write_object_entry_separator(&mut self, out: &mut dyn RawEmitter) -> Result<()>;
    fn write_object_name_value_separator(&mut self, out: &mut dyn RawEmitter) -> Result<()>;
    fn write_array_value_separator(&mut self, out: &mut dyn RawEmitter) -> Result<()>;
    fn before_array_values(&mut self, out: &mut dyn RawEmitter) -> Result<()>;
    fn before_object_entries(&mut self, out: &mut dyn RawEmitter) -> Result<()>;
}

/// Stateless printer producing the same compact output as no printer at
/// all, except for a configurable root-value separator. Useful as a base
/// for policies that only adjust separators.
#[derive(Debug, Clone)]
pub struct MinimalPrettyPrinter {
    root_separator: String,
}

impl MinimalPrettyPrinter {
    pub fn new(root_separator: impl Into<String>) -> Self {
        Self {
            root_separator: root_separator.into(),
        }
    }
}

impl Default for MinimalPrettyPrinter {
    fn default() -> Self {
        Self::new(" ")
    }
}

impl PrettyPrinter for MinimalPrettyPrinter {
    fn fresh(&self) -> Box<dyn PrettyPrinter> {
        Box::new(self.clone())
    }

    fn write_root_value_separator(&mut self, out: &mut dyn RawEmitter) -> Result<()> {
        out.emit_raw(&self.root_separator)
    }

    fn write_start_object(&mut self, out: &mut dyn RawEmitter) -> Result<()> {
        out.emit_raw("{")
    }

    fn write_end_object(&mut self, out: &mut dyn RawEmitter, _entry_count: i32) -> Result<()> {
        out.emit_raw("}")
    }

    fn write_start_array(&mut self, out: &mut dyn RawEmitter) -> Result<()> {
        out.emit_raw("[")
    }

    fn write_end_array(&mut self, out: &mut dyn RawEmitter, _value_count: i32) -> Result<()> {
        out.emit_raw("]")
    }

    fn write_object_entry_separator(&mut self, out: &mut dyn RawEmitter) -> Result<()> {
        out.emit_raw(",")
    }

    fn write_object_name_value_separator(&mut self, out: &mut dyn RawEmitter) -> Result<()> {
        out.emit_raw(":")
    }

    fn write_array_value_separator(&mut self, out: &mut dyn RawEmitter) -> Result<()> {
        out.emit_raw(",")
    }

    fn before_array_values(&mut self, _out: &mut dyn RawEmitter) -> Result<()> {
        Ok(())
    }

    fn before_object_entries(&mut self, _out: &mut dyn RawEmitter) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_empty_contexts_pass_defaults_through() {
        let defaults = FeatureSet::<ReadFeature>::defaults();
        assert_eq!(EmptyReadContext.read_features(defaults), defaults);

        let constraints = StreamReadConstraints::default();
        assert_eq!(EmptyReadContext.read_constraints(constraints), constraints);

        assert!(EmptyWriteContext.pretty_printer().is_none());
        assert_eq!(
            EmptyWriteContext.root_value_separator(),
            Some(" ".to_string())
        );
    }

    struct Collect(String);

    impl RawEmitter for Collect {
        fn emit_raw(&mut self, text: &str) -> Result<()> {
            self.0.push_str(text);
            Ok(())
        }
    }

    #[test]
    fn test_minimal_printer_output() {
        let mut pp = MinimalPrettyPrinter::default();
        let mut out = Collect(String::new());
        pp.write_start_object(&mut out).unwrap();
        pp.write_object_name_value_separator(&mut out).unwrap();
        pp.write_object_entry_separator(&mut out).unwrap();
        pp.write_end_object(&mut out, 2).unwrap();
        pp.write_root_value_separator(&mut out).unwrap();
        pp.write_start_array(&mut out).unwrap();
        pp.write_end_array(&mut out, 0).unwrap();
        assert_eq!(out.0, "{:,} []");
    }

    #[test]
    fn test_fresh_clones_state() {
        let pp = MinimalPrettyPrinter::new(";");
        let mut fresh = pp.fresh();
        let mut out = Collect(String::new());
        fresh.write_root_value_separator(&mut out).unwrap();
        assert_eq!(out.0, ";");
    }
}
