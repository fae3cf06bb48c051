use std::borrow::Cow;
use std::fmt;

/// `ContentReference` names the content being read or written, for use in
/// error messages and [`Location`] rendering. A reference is either textual
/// (chars, strings, readers) or binary (byte slices, streams, files), which
/// determines whether offsets are rendered as line/column or byte positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentReference {
    desc: Cow<'static, str>,
    textual: bool,
}

impl ContentReference {
    /// Placeholder used when no source is known, or when
    /// `INCLUDE_SOURCE_IN_LOCATION` is disabled.
    pub const UNKNOWN: ContentReference = ContentReference {
        desc: Cow::Borrowed("UNKNOWN"),
        textual: true,
    };

    pub fn text(desc: impl Into<Cow<'static, str>>) -> Self {
        Self {
            desc: desc.into(),
            textual: true,
        }
    }

    pub fn binary(desc: impl Into<Cow<'static, str>>) -> Self {
        Self {
            desc: desc.into(),
            textual: false,
        }
    }

    /// The redacted form substituted when source inclusion is disabled:
    /// same textuality, `"UNKNOWN"` description.
    pub fn redacted(&self) -> Self {
        Self {
            desc: Cow::Borrowed("UNKNOWN"),
            textual: self.textual,
        }
    }

    pub fn description(&self) -> &str {
        &self.desc
    }

    pub fn is_textual(&self) -> bool {
        self.textual
    }
}

/// `Location` of a token or error within the content being processed.
/// Any of the numeric fields may be `-1` when unavailable; for example a
/// char-source reader has no byte offset, and a byte-source reader that has
/// not yet decoded its input has no line or column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub content: ContentReference,
    pub byte_offset: i64,
    pub char_offset: i64,
    pub line: i32,
    pub column: i32,
}

impl Location {
    /// Sentinel for "no location information", rendered distinctly.
    pub const NA: Location = Location {
        content: ContentReference::UNKNOWN,
        byte_offset: -1,
        char_offset: -1,
        line: -1,
        column: -1,
    };

    pub fn new(
        content: ContentReference,
        byte_offset: i64,
        char_offset: i64,
        line: i32,
        column: i32,
    ) -> Self {
        Self {
            content,
            byte_offset,
            char_offset,
            line,
            column,
        }
    }

    /// Renders the offset portion of the location: `line: N, column: M` for
    /// textual content, `byte offset: #N` for binary content. `UNKNOWN` is
    /// substituted for any field that is `-1`.
    pub fn offset_description(&self) -> String {
        let mut out = String::new();
        self.append_offset_description(&mut out);
        out
    }

    fn append_offset_description(&self, out: &mut String) {
        use fmt::Write;

        if self.content.is_textual() {
            out.push_str("line: ");
            if self.line >= 0 {
                write!(out, "{}", self.line).unwrap();
            } else {
                out.push_str("UNKNOWN");
            }
            out.push_str(", column: ");
            if self.column >= 0 {
                write!(out, "{}", self.column).unwrap();
            } else {
                out.push_str("UNKNOWN");
            }
        } else {
            out.push_str("byte offset: #");
            if self.byte_offset >= 0 {
                write!(out, "{}", self.byte_offset).unwrap();
            } else {
                out.push_str("UNKNOWN");
            }
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Location::NA {
            return f.write_str("[No location information]");
        }
        let mut offset = String::new();
        self.append_offset_description(&mut offset);
        write!(
            f,
            "[Source: {}; {}]",
            self.content.description(),
            offset
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_na_rendering() {
        assert_eq!(Location::NA.to_string(), "[No location information]");
    }

    #[test]
    fn test_textual_rendering() {
        let loc = Location::new(ContentReference::text("(String)"), 12, 10, 2, 5);
        assert_eq!(loc.to_string(), "[Source: (String); line: 2, column: 5]");

        let loc = Location::new(ContentReference::text("(String)"), -1, -1, -1, 3);
        assert_eq!(
            loc.to_string(),
            "[Source: (String); line: UNKNOWN, column: 3]"
        );
    }

    #[test]
    fn test_binary_rendering() {
        let loc = Location::new(ContentReference::binary("(bytes)"), 42, -1, -1, -1);
        assert_eq!(loc.to_string(), "[Source: (bytes); byte offset: #42]");

        let loc = Location::new(ContentReference::binary("(bytes)"), -1, -1, -1, -1);
        assert_eq!(loc.to_string(), "[Source: (bytes); byte offset: #UNKNOWN]");
    }

    #[test]
    fn test_redaction() {
        let content = ContentReference::binary("secret.bin");
        let redacted = content.redacted();
        assert_eq!(redacted.description(), "UNKNOWN");
        assert!(!redacted.is_textual());
    }
}
