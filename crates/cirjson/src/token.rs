use std::fmt;

/// A single lexical or structural event produced by a reader, or validated
/// by a writer. Kinds carry an ordinal id used for dispatch and, where one
/// exists, a canonical textual form.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// Returned by non-blocking readers when a token cannot be completed
    /// with the input fed so far.
    NotAvailable,
    StartObject,
    EndObject,
    StartArray,
    EndArray,
    /// The distinguished `__cirJsonId__` property name which must open
    /// every object.
    IdPropertyName,
    PropertyName,
    /// Placeholder used by tree-traversal bridges for values which have no
    /// textual representation.
    EmbeddedObject,
    ValueString,
    ValueNumberInt,
    ValueNumberFloat,
    ValueTrue,
    ValueFalse,
    ValueNull,
}

impl TokenKind {
    /// Ordinal id of this kind. `NotAvailable` is `-1`; all others are
    /// stable non-negative ordinals.
    pub const fn id(self) -> i32 {
        match self {
            TokenKind::NotAvailable => -1,
            TokenKind::StartObject => 1,
            TokenKind::EndObject => 2,
            TokenKind::StartArray => 3,
            TokenKind::EndArray => 4,
            TokenKind::IdPropertyName => 5,
            TokenKind::PropertyName => 6,
            TokenKind::EmbeddedObject => 7,
            TokenKind::ValueString => 8,
            TokenKind::ValueNumberInt => 9,
            TokenKind::ValueNumberFloat => 10,
            TokenKind::ValueTrue => 11,
            TokenKind::ValueFalse => 12,
            TokenKind::ValueNull => 13,
        }
    }

    /// Canonical textual form, for kinds that have one.
    pub const fn as_str(self) -> Option<&'static str> {
        match self {
            TokenKind::StartObject => Some("{"),
            TokenKind::EndObject => Some("}"),
            TokenKind::StartArray => Some("["),
            TokenKind::EndArray => Some("]"),
            TokenKind::ValueTrue => Some("true"),
            TokenKind::ValueFalse => Some("false"),
            TokenKind::ValueNull => Some("null"),
            _ => None,
        }
    }

    /// Canonical form as ASCII bytes, precomputed for raw emission paths.
    pub const fn as_bytes(self) -> Option<&'static [u8]> {
        match self {
            TokenKind::StartObject => Some(b"{"),
            TokenKind::EndObject => Some(b"}"),
            TokenKind::StartArray => Some(b"["),
            TokenKind::EndArray => Some(b"]"),
            TokenKind::ValueTrue => Some(b"true"),
            TokenKind::ValueFalse => Some(b"false"),
            TokenKind::ValueNull => Some(b"null"),
            _ => None,
        }
    }

    pub const fn is_scalar(self) -> bool {
        matches!(
            self,
            TokenKind::ValueString
                | TokenKind::ValueNumberInt
                | TokenKind::ValueNumberFloat
                | TokenKind::ValueTrue
                | TokenKind::ValueFalse
                | TokenKind::ValueNull
                | TokenKind::EmbeddedObject
        )
    }

    pub const fn is_structure_start(self) -> bool {
        matches!(self, TokenKind::StartObject | TokenKind::StartArray)
    }

    pub const fn is_structure_end(self) -> bool {
        matches!(self, TokenKind::EndObject | TokenKind::EndArray)
    }

    pub const fn is_numeric(self) -> bool {
        matches!(
            self,
            TokenKind::ValueNumberInt | TokenKind::ValueNumberFloat
        )
    }

    pub const fn is_boolean(self) -> bool {
        matches!(self, TokenKind::ValueTrue | TokenKind::ValueFalse)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Classification of the numeric type a number token resolves to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum NumberKind {
    Int,
    Long,
    BigInteger,
    Float,
    Double,
    BigDecimal,
}

impl NumberKind {
    pub const fn is_integral(self) -> bool {
        matches!(
            self,
            NumberKind::Int | NumberKind::Long | NumberKind::BigInteger
        )
    }
}

impl fmt::Display for NumberKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NumberKind::Int => "int",
            NumberKind::Long => "long",
            NumberKind::BigInteger => "BigInteger",
            NumberKind::Float => "float",
            NumberKind::Double => "double",
            NumberKind::BigDecimal => "BigDecimal",
        };
        f.write_str(s)
    }
}

/// Capabilities a reader instance advertises, for callers to branch on.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ReadCapability {
    /// Whether the format can contain duplicate property names.
    DuplicateProperties,
    /// Whether scalars may be reported as objects. XML-only; always false
    /// for CirJSON.
    ScalarsAsObjects,
    /// Whether scalar values are untyped text. XML-only; always false for
    /// CirJSON.
    UntypedScalars,
    /// Whether the wire format preserves exact binary floating point.
    ExactFloats,
}

impl ReadCapability {
    const fn ordinal(self) -> u32 {
        match self {
            ReadCapability::DuplicateProperties => 0,
            ReadCapability::ScalarsAsObjects => 1,
            ReadCapability::UntypedScalars => 2,
            ReadCapability::ExactFloats => 3,
        }
    }

    pub const fn mask(self) -> u32 {
        1 << self.ordinal()
    }
}

/// Capabilities a writer instance advertises.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum WriteCapability {
    /// Whether the format has native type identifiers.
    NativeTypeIds,
    /// Whether binary data can be written without Base64 encoding.
    BinaryNatively,
    /// Whether pre-formatted number text can be written as-is.
    FormattedNumbers,
}

impl WriteCapability {
    const fn ordinal(self) -> u32 {
        match self {
            WriteCapability::NativeTypeIds => 0,
            WriteCapability::BinaryNatively => 1,
            WriteCapability::FormattedNumbers => 2,
        }
    }

    pub const fn mask(self) -> u32 {
        1 << self.ordinal()
    }
}

/// A packed set of boolean capabilities.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct Capabilities(u32);

impl Capabilities {
    pub const fn empty() -> Self {
        Capabilities(0)
    }

    pub const fn with(self, mask: u32) -> Self {
        Capabilities(self.0 | mask)
    }

    pub const fn has(self, mask: u32) -> bool {
        self.0 & mask != 0
    }
}

/// Capabilities of CirJSON readers: duplicates are possible, scalars are
/// typed, and textual floats do not preserve exact binary FP.
pub const CIRJSON_READ_CAPABILITIES: Capabilities =
    Capabilities::empty().with(ReadCapability::DuplicateProperties.mask());

/// Capabilities of CirJSON writers: pre-formatted numbers may be written
/// verbatim via the encoded-text path.
pub const CIRJSON_WRITE_CAPABILITIES: Capabilities =
    Capabilities::empty().with(WriteCapability::FormattedNumbers.mask());
