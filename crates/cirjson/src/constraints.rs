use crate::error::{Error, Result};
use crate::location::Location;
use serde::{Deserialize, Serialize};

/// Bounds on resource consumption while reading. Violations produce
/// constraint errors, never panics.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamReadConstraints {
    /// Maximum nesting depth of objects and arrays.
    pub max_nesting_depth: usize,
    /// Maximum length, in characters, of a single number token.
    pub max_number_length: usize,
    /// Maximum length, in input characters, of a single string value.
    pub max_string_length: usize,
}

impl Default for StreamReadConstraints {
    fn default() -> Self {
        Self {
            max_nesting_depth: 1000,
            max_number_length: 1000,
            max_string_length: 20_000_000,
        }
    }
}

impl StreamReadConstraints {
    #[must_use]
    pub fn with_max_nesting_depth(mut self, depth: usize) -> Self {
        self.max_nesting_depth = depth;
        self
    }

    #[must_use]
    pub fn with_max_number_length(mut self, len: usize) -> Self {
        self.max_number_length = len;
        self
    }

    #[must_use]
    pub fn with_max_string_length(mut self, len: usize) -> Self {
        self.max_string_length = len;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_nesting_depth == 0 || self.max_number_length == 0 || self.max_string_length == 0
        {
            return Err(Error::misuse(
                "stream read constraints must all be positive",
            ));
        }
        Ok(())
    }

    pub fn check_nesting_depth(&self, depth: usize, location: &Location) -> Result<()> {
        if depth > self.max_nesting_depth {
            return Err(Error::constraint(
                format!(
                    "Document nesting depth ({depth}) exceeds the maximum allowed ({})",
                    self.max_nesting_depth
                ),
                location.clone(),
            ));
        }
        Ok(())
    }

    pub fn check_number_length(&self, len: usize, location: &Location) -> Result<()> {
        if len > self.max_number_length {
            return Err(Error::constraint(
                format!(
                    "Number value length ({len}) exceeds the maximum allowed ({})",
                    self.max_number_length
                ),
                location.clone(),
            ));
        }
        Ok(())
    }

    pub fn check_string_length(&self, len: usize, location: &Location) -> Result<()> {
        if len > self.max_string_length {
            return Err(Error::constraint(
                format!(
                    "String value length ({len}) exceeds the maximum allowed ({})",
                    self.max_string_length
                ),
                location.clone(),
            ));
        }
        Ok(())
    }
}

/// Bounds on resource consumption while writing.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamWriteConstraints {
    /// Maximum nesting depth of objects and arrays.
    pub max_nesting_depth: usize,
}

impl Default for StreamWriteConstraints {
    fn default() -> Self {
        Self {
            max_nesting_depth: 1000,
        }
    }
}

impl StreamWriteConstraints {
    #[must_use]
    pub fn with_max_nesting_depth(mut self, depth: usize) -> Self {
        self.max_nesting_depth = depth;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_nesting_depth == 0 {
            return Err(Error::misuse("stream write constraints must be positive"));
        }
        Ok(())
    }

    pub fn check_nesting_depth(&self, depth: usize, location: &Location) -> Result<()> {
        if depth > self.max_nesting_depth {
            return Err(Error::constraint(
                format!(
                    "Document nesting depth ({depth}) exceeds the maximum allowed ({})",
                    self.max_nesting_depth
                ),
                location.clone(),
            ));
        }
        Ok(())
    }
}

/// Bounds on how much content error messages may quote, so that
/// security-sensitive input is not leaked through diagnostics.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorReportConfiguration {
    /// Maximum length of a token excerpt included in an error message.
    pub max_error_token_length: usize,
    /// Maximum length of raw content included in an error message.
    pub max_raw_content_length: usize,
}

impl Default for ErrorReportConfiguration {
    fn default() -> Self {
        Self {
            max_error_token_length: 256,
            max_raw_content_length: 500,
        }
    }
}

impl ErrorReportConfiguration {
    #[must_use]
    pub fn with_max_error_token_length(mut self, len: usize) -> Self {
        self.max_error_token_length = len;
        self
    }

    #[must_use]
    pub fn with_max_raw_content_length(mut self, len: usize) -> Self {
        self.max_raw_content_length = len;
        self
    }

    /// Truncates `token` for inclusion in an error message, appending a
    /// truncation marker when content was elided.
    pub fn excerpt<'a>(&self, token: &'a str) -> std::borrow::Cow<'a, str> {
        if token.len() <= self.max_error_token_length {
            return token.into();
        }
        let mut cut = self.max_error_token_length;
        while !token.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}]...[truncated {} chars", &token[..cut], token.len() - cut).into()
    }
}
