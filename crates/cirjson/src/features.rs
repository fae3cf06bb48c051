//! Boolean configuration bits for readers, writers, and factories. Each
//! family is a closed enum; a configuration is a packed bitset and every
//! check reduces to a single bitwise-and.

use std::marker::PhantomData;

/// Common shape of every feature family: a stable ordinal, a default
/// on/off bit, and the derived single-bit mask.
pub trait Feature: Copy + std::fmt::Debug + 'static {
    fn ordinal(self) -> u32;
    fn enabled_by_default(self) -> bool;

    fn mask(self) -> u32 {
        1 << self.ordinal()
    }

    /// All members of the family, for default-mask computation.
    fn members() -> &'static [Self];

    /// Bitset of features which are enabled by default.
    fn default_mask() -> u32 {
        Self::members()
            .iter()
            .filter(|f| f.enabled_by_default())
            .fold(0, |acc, f| acc | f.mask())
    }
}

/// Stream-level read features, independent of the data format.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ReadFeature {
    /// Close the underlying input source when the reader is closed, if the
    /// source was supplied by the caller. Sources the core opened itself
    /// are always closed.
    AutoCloseSource,
    /// Detect duplicate property names within an object and fail.
    StrictDuplicateDetection,
    /// Include a description of the input source in reported locations.
    /// Off by default so error messages do not leak source contents.
    IncludeSourceInLocation,
    /// Use the optimized double parser. Both paths are correctly rounded;
    /// this selects the faster implementation.
    UseFastDoubleParser,
}

impl Feature for ReadFeature {
    fn ordinal(self) -> u32 {
        match self {
            ReadFeature::AutoCloseSource => 0,
            ReadFeature::StrictDuplicateDetection => 1,
            ReadFeature::IncludeSourceInLocation => 2,
            ReadFeature::UseFastDoubleParser => 3,
        }
    }

    fn enabled_by_default(self) -> bool {
        matches!(self, ReadFeature::AutoCloseSource)
    }

    fn members() -> &'static [Self] {
        &[
            ReadFeature::AutoCloseSource,
            ReadFeature::StrictDuplicateDetection,
            ReadFeature::IncludeSourceInLocation,
            ReadFeature::UseFastDoubleParser,
        ]
    }
}

/// Stream-level write features.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum WriteFeature {
    /// Close the underlying output target when the writer is closed, if
    /// the target was supplied by the caller.
    AutoCloseTarget,
    /// On close with unmatched open structures, emit the missing end
    /// markers in order before closing.
    AutoCloseContent,
    /// Propagate `flush` calls to the underlying target.
    FlushPassedToStream,
    /// Detect duplicate property names within an object and fail.
    StrictDuplicateDetection,
    /// Output `BigDecimal` values in plain (non-scientific) form.
    WriteBigDecimalAsPlain,
    /// Use the shortest-round-trip double formatter.
    UseFastDoubleWriter,
}

impl Feature for WriteFeature {
    fn ordinal(self) -> u32 {
        match self {
            WriteFeature::AutoCloseTarget => 0,
            WriteFeature::AutoCloseContent => 1,
            WriteFeature::FlushPassedToStream => 2,
            WriteFeature::StrictDuplicateDetection => 3,
            WriteFeature::WriteBigDecimalAsPlain => 4,
            WriteFeature::UseFastDoubleWriter => 5,
        }
    }

    fn enabled_by_default(self) -> bool {
        matches!(
            self,
            WriteFeature::AutoCloseTarget
                | WriteFeature::AutoCloseContent
                | WriteFeature::FlushPassedToStream
        )
    }

    fn members() -> &'static [Self] {
        &[
            WriteFeature::AutoCloseTarget,
            WriteFeature::AutoCloseContent,
            WriteFeature::FlushPassedToStream,
            WriteFeature::StrictDuplicateDetection,
            WriteFeature::WriteBigDecimalAsPlain,
            WriteFeature::UseFastDoubleWriter,
        ]
    }
}

/// Features of the factory itself, fixed per factory instance.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FactoryFeature {
    /// Canonicalize property names through the factory-wide symbol table,
    /// so repeated names share one allocation across a document.
    CanonicalizePropertyNames,
    /// Additionally cache canonicalized names across documents.
    InternPropertyNames,
    /// Fail with a stream error when the symbol table sees too many hash
    /// collisions; otherwise canonicalization silently degrades to
    /// per-name allocation for the remainder of the document.
    FailOnSymbolHashOverflow,
    /// Attempt UTF-16/UTF-32 detection on byte input. When disabled, byte
    /// input is assumed to be UTF-8.
    CharsetDetection,
}

impl Feature for FactoryFeature {
    fn ordinal(self) -> u32 {
        match self {
            FactoryFeature::CanonicalizePropertyNames => 0,
            FactoryFeature::InternPropertyNames => 1,
            FactoryFeature::FailOnSymbolHashOverflow => 2,
            FactoryFeature::CharsetDetection => 3,
        }
    }

    fn enabled_by_default(self) -> bool {
        matches!(
            self,
            FactoryFeature::CanonicalizePropertyNames
                | FactoryFeature::FailOnSymbolHashOverflow
                | FactoryFeature::CharsetDetection
        )
    }

    fn members() -> &'static [Self] {
        &[
            FactoryFeature::CanonicalizePropertyNames,
            FactoryFeature::InternPropertyNames,
            FactoryFeature::FailOnSymbolHashOverflow,
            FactoryFeature::CharsetDetection,
        ]
    }
}

/// CirJSON-specific read features (format opt-ins).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CirJsonReadFeature {
    /// Accept a trailing comma before a closing `]` or `}`.
    AllowTrailingComma,
    /// Accept integer numbers with leading zeroes.
    AllowLeadingZeros,
}

impl Feature for CirJsonReadFeature {
    fn ordinal(self) -> u32 {
        match self {
            CirJsonReadFeature::AllowTrailingComma => 0,
            CirJsonReadFeature::AllowLeadingZeros => 1,
        }
    }

    fn enabled_by_default(self) -> bool {
        false
    }

    fn members() -> &'static [Self] {
        &[
            CirJsonReadFeature::AllowTrailingComma,
            CirJsonReadFeature::AllowLeadingZeros,
        ]
    }
}

/// CirJSON-specific write features.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CirJsonWriteFeature {
    /// Write NaN and infinities as quoted strings rather than failing.
    WriteNanAsStrings,
    /// Escape `/` as `\/`.
    EscapeForwardSlashes,
    /// Escape all characters above 127 as `\uXXXX` sequences.
    EscapeNonAscii,
}

impl Feature for CirJsonWriteFeature {
    fn ordinal(self) -> u32 {
        match self {
            CirJsonWriteFeature::WriteNanAsStrings => 0,
            CirJsonWriteFeature::EscapeForwardSlashes => 1,
            CirJsonWriteFeature::EscapeNonAscii => 2,
        }
    }

    fn enabled_by_default(self) -> bool {
        matches!(self, CirJsonWriteFeature::WriteNanAsStrings)
    }

    fn members() -> &'static [Self] {
        &[
            CirJsonWriteFeature::WriteNanAsStrings,
            CirJsonWriteFeature::EscapeForwardSlashes,
            CirJsonWriteFeature::EscapeNonAscii,
        ]
    }
}

/// A packed per-instance feature configuration.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FeatureSet<F: Feature> {
    bits: u32,
    _family: PhantomData<F>,
}

impl<F: Feature> FeatureSet<F> {
    /// The family defaults.
    pub fn defaults() -> Self {
        Self {
            bits: F::default_mask(),
            _family: PhantomData,
        }
    }

    pub fn from_bits(bits: u32) -> Self {
        Self {
            bits,
            _family: PhantomData,
        }
    }

    pub fn bits(self) -> u32 {
        self.bits
    }

    pub fn is_enabled(self, feature: F) -> bool {
        self.bits & feature.mask() != 0
    }

    #[must_use]
    pub fn with(self, feature: F) -> Self {
        Self::from_bits(self.bits | feature.mask())
    }

    #[must_use]
    pub fn without(self, feature: F) -> Self {
        Self::from_bits(self.bits & !feature.mask())
    }

    #[must_use]
    pub fn configured(self, feature: F, enabled: bool) -> Self {
        if enabled {
            self.with(feature)
        } else {
            self.without(feature)
        }
    }
}

impl<F: Feature> Default for FeatureSet<F> {
    fn default() -> Self {
        Self::defaults()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_default_masks() {
        let reads = FeatureSet::<ReadFeature>::defaults();
        assert!(reads.is_enabled(ReadFeature::AutoCloseSource));
        assert!(!reads.is_enabled(ReadFeature::StrictDuplicateDetection));
        assert!(!reads.is_enabled(ReadFeature::IncludeSourceInLocation));

        let writes = FeatureSet::<WriteFeature>::defaults();
        assert!(writes.is_enabled(WriteFeature::AutoCloseTarget));
        assert!(writes.is_enabled(WriteFeature::AutoCloseContent));
        assert!(writes.is_enabled(WriteFeature::FlushPassedToStream));
        assert!(!writes.is_enabled(WriteFeature::WriteBigDecimalAsPlain));

        let factory = FeatureSet::<FactoryFeature>::defaults();
        assert!(factory.is_enabled(FactoryFeature::CanonicalizePropertyNames));
        assert!(factory.is_enabled(FactoryFeature::CharsetDetection));
        assert!(!factory.is_enabled(FactoryFeature::InternPropertyNames));
    }

    #[test]
    fn test_configure_roundtrip() {
        let set = FeatureSet::<ReadFeature>::defaults()
            .with(ReadFeature::StrictDuplicateDetection)
            .without(ReadFeature::AutoCloseSource);
        assert!(set.is_enabled(ReadFeature::StrictDuplicateDetection));
        assert!(!set.is_enabled(ReadFeature::AutoCloseSource));

        let set = set.configured(ReadFeature::AutoCloseSource, true);
        assert!(set.is_enabled(ReadFeature::AutoCloseSource));
    }

    #[test]
    fn test_masks_are_distinct() {
        fn all_distinct<F: Feature>() {
            let mut seen = 0u32;
            for f in F::members() {
                assert_eq!(seen & f.mask(), 0, "mask overlap in {:?}", f);
                seen |= f.mask();
            }
        }
        all_distinct::<ReadFeature>();
        all_distinct::<WriteFeature>();
        all_distinct::<FactoryFeature>();
        all_distinct::<CirJsonReadFeature>();
        all_distinct::<CirJsonWriteFeature>();
    }
}
