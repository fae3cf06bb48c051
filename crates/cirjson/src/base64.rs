//! Variant-parameterized Base64 codec used for binary embedding. A variant
//! fixes the 64-character alphabet, the padding character (if any), the
//! maximum line length before a linefeed is injected, and how padding is
//! treated when reading.

use std::fmt;

const STD_ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
const URL_ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

/// Sentinel in the decode table for an invalid character.
const INVALID: i8 = -1;
/// Sentinel in the decode table for the padding character.
const PADDING: i8 = -2;

/// How a variant treats padding characters when decoding a trailing,
/// partial 4-character unit.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PaddingReadBehaviour {
    /// Missing padding is an error.
    Required,
    /// Padding may be present or absent.
    Allowed,
    /// Presence of a padding character is an error.
    Forbidden,
}

/// Errors produced by [`Base64Variant::decode`]. Messages identify the
/// character position within the 4-character unit and whether the offender
/// was padding, whitespace, or another character.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct Base64Error(pub(crate) String);

const fn build_decode_table(alphabet: &[u8; 64], padding: Option<u8>) -> [i8; 128] {
    let mut table = [INVALID; 128];
    let mut i = 0;
    while i < 64 {
        table[alphabet[i] as usize] = i as i8;
        i += 1;
    }
    if let Some(pad) = padding {
        table[pad as usize] = PADDING;
    }
    table
}

/// One parameterization of the Base64 encoding.
#[derive(Clone)]
pub struct Base64Variant {
    name: &'static str,
    encode_table: &'static [u8; 64],
    decode_table: [i8; 128],
    padding: Option<u8>,
    max_line_length: usize,
    padding_read: PaddingReadBehaviour,
}

/// MIME variant: `=` padding, linefeed every 76 characters.
pub const MIME: Base64Variant = Base64Variant {
    name: "MIME",
    encode_table: STD_ALPHABET,
    decode_table: build_decode_table(STD_ALPHABET, Some(b'=')),
    padding: Some(b'='),
    max_line_length: 76,
    padding_read: PaddingReadBehaviour::Required,
};

/// MIME variant without linefeeds. The default variant.
pub const MIME_NO_LINEFEEDS: Base64Variant = Base64Variant {
    name: "MIME-NO-LINEFEEDS",
    encode_table: STD_ALPHABET,
    decode_table: build_decode_table(STD_ALPHABET, Some(b'=')),
    padding: Some(b'='),
    max_line_length: usize::MAX,
    padding_read: PaddingReadBehaviour::Required,
};

/// PEM variant: standard alphabet, 76-character lines, `=` padding.
pub const PEM: Base64Variant = Base64Variant {
    name: "PEM",
    encode_table: STD_ALPHABET,
    decode_table: build_decode_table(STD_ALPHABET, Some(b'=')),
    padding: Some(b'='),
    max_line_length: 76,
    padding_read: PaddingReadBehaviour::Required,
};

/// URL-safe variant: `-` and `_` replace `+` and `/`; no padding, and
/// padding characters are rejected on read.
pub const MODIFIED_FOR_URL: Base64Variant = Base64Variant {
    name: "MODIFIED-FOR-URL",
    encode_table: URL_ALPHABET,
    decode_table: build_decode_table(URL_ALPHABET, None),
    padding: None,
    max_line_length: usize::MAX,
    padding_read: PaddingReadBehaviour::Forbidden,
};

impl Base64Variant {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn uses_padding(&self) -> bool {
        self.padding.is_some()
    }

    pub fn padding_char(&self) -> Option<char> {
        self.padding.map(char::from)
    }

    pub fn max_line_length(&self) -> usize {
        self.max_line_length
    }

    pub fn padding_read_behaviour(&self) -> PaddingReadBehaviour {
        self.padding_read
    }

    /// A copy of this variant with a different padding-read behaviour,
    /// sharing the alphabet tables.
    #[must_use]
    pub fn with_padding_read_behaviour(&self, behaviour: PaddingReadBehaviour) -> Base64Variant {
        let mut v = self.clone();
        v.padding_read = behaviour;
        v
    }

    /// A copy that accepts decoding input with or without padding.
    #[must_use]
    pub fn with_padding_allowed(&self) -> Base64Variant {
        self.with_padding_read_behaviour(PaddingReadBehaviour::Allowed)
    }

    /// A copy that rejects padding characters when decoding.
    #[must_use]
    pub fn with_padding_forbidden(&self) -> Base64Variant {
        self.with_padding_read_behaviour(PaddingReadBehaviour::Forbidden)
    }

    /// A copy that requires padding when decoding.
    #[must_use]
    pub fn with_padding_required(&self) -> Base64Variant {
        self.with_padding_read_behaviour(PaddingReadBehaviour::Required)
    }

    fn decode_char(&self, c: char) -> i8 {
        let code = c as u32;
        if code < 128 {
            self.decode_table[code as usize]
        } else {
            INVALID
        }
    }

    /// Encodes `input`, emitting a linefeed after every
    /// `max_line_length >> 2` encoded chunks and padding the final partial
    /// chunk when the variant uses padding.
    pub fn encode(&self, input: &[u8]) -> String {
        self.encode_with_options(input, false, "\n")
    }

    /// Encode with explicit options: `add_quotes` surrounds the output
    /// with double quotes; `linefeed` is the text injected at line breaks.
    pub fn encode_with_options(&self, input: &[u8], add_quotes: bool, linefeed: &str) -> String {
        // 4 output chars per 3 input bytes, plus slack for linefeeds.
        let mut out = String::with_capacity((input.len() / 3 + 1) * 4 + 8);
        if add_quotes {
            out.push('"');
        }

        let chunks_per_line = self.max_line_length >> 2;
        let mut chunks_before_lf = chunks_per_line;

        let mut chunks = input.chunks_exact(3);
        for chunk in &mut chunks {
            let bits =
                (chunk[0] as u32) << 16 | (chunk[1] as u32) << 8 | chunk[2] as u32;
            out.push(self.encode_table[(bits >> 18) as usize & 0x3F] as char);
            out.push(self.encode_table[(bits >> 12) as usize & 0x3F] as char);
            out.push(self.encode_table[(bits >> 6) as usize & 0x3F] as char);
            out.push(self.encode_table[bits as usize & 0x3F] as char);

            chunks_before_lf -= 1;
            if chunks_before_lf == 0 {
                out.push_str(linefeed);
                chunks_before_lf = chunks_per_line;
            }
        }

        let rest = chunks.remainder();
        match rest.len() {
            1 => {
                let bits = (rest[0] as u32) << 16;
                out.push(self.encode_table[(bits >> 18) as usize & 0x3F] as char);
                out.push(self.encode_table[(bits >> 12) as usize & 0x3F] as char);
                if let Some(pad) = self.padding {
                    out.push(pad as char);
                    out.push(pad as char);
                }
            }
            2 => {
                let bits = (rest[0] as u32) << 16 | (rest[1] as u32) << 8;
                out.push(self.encode_table[(bits >> 18) as usize & 0x3F] as char);
                out.push(self.encode_table[(bits >> 12) as usize & 0x3F] as char);
                out.push(self.encode_table[(bits >> 6) as usize & 0x3F] as char);
                if let Some(pad) = self.padding {
                    out.push(pad as char);
                }
            }
            _ => {}
        }

        if add_quotes {
            out.push('"');
        }
        out
    }

    /// Decodes `input` into `out`. Characters with codes at or below 0x20
    /// are skipped between 4-character units only; within a unit they are
    /// an error. Trailing partial units are resolved according to the
    /// variant's padding-read behaviour.
    pub fn decode(&self, input: &str, out: &mut Vec<u8>) -> Result<(), Base64Error> {
        let mut chars = input.chars();

        loop {
            // First char of the unit; whitespace is allowed here.
            let first = loop {
                match chars.next() {
                    None => return Ok(()),
                    Some(c) if (c as u32) <= 0x20 => continue,
                    Some(c) => break c,
                }
            };
            let bits = self.decode_char(first);
            if bits < 0 {
                return Err(self.illegal_char(first, 0));
            }
            let mut decoded = bits as u32;

            // Second char: mandatory, no whitespace.
            let c = chars
                .next()
                .ok_or_else(|| self.truncated_unit(1))?;
            let bits = self.decode_char(c);
            if bits < 0 {
                return Err(self.illegal_char(c, 1));
            }
            decoded = decoded << 6 | bits as u32;

            // Third char, or padding, or end-of-input for 1 output byte.
            let c = match chars.next() {
                Some(c) => c,
                None => {
                    if self.padding_read == PaddingReadBehaviour::Required {
                        return Err(self.missing_padding(2));
                    }
                    out.push((decoded >> 4) as u8);
                    return Ok(());
                }
            };
            let bits = self.decode_char(c);
            if bits < 0 {
                if bits != PADDING {
                    return Err(self.illegal_char(c, 2));
                }
                if self.padding_read == PaddingReadBehaviour::Forbidden {
                    return Err(self.unexpected_padding(c));
                }
                // One data byte; a second padding char must follow.
                let c = chars
                    .next()
                    .ok_or_else(|| self.truncated_unit(3))?;
                if self.decode_char(c) != PADDING {
                    return Err(Base64Error(format!(
                        "Illegal character '{c}' (code 0x{:x}) as character #4 of 4-char base64 unit: expected padding character '{}'",
                        c as u32,
                        self.padding_char().unwrap_or('='),
                    )));
                }
                out.push((decoded >> 4) as u8);
                continue;
            }
            decoded = decoded << 6 | bits as u32;

            // Fourth char, or padding, or end-of-input for 2 output bytes.
            let c = match chars.next() {
                Some(c) => c,
                None => {
                    if self.padding_read == PaddingReadBehaviour::Required {
                        return Err(self.missing_padding(3));
                    }
                    out.push((decoded >> 10) as u8);
                    out.push((decoded >> 2) as u8);
                    return Ok(());
                }
            };
            let bits = self.decode_char(c);
            if bits < 0 {
                if bits != PADDING {
                    return Err(self.illegal_char(c, 3));
                }
                if self.padding_read == PaddingReadBehaviour::Forbidden {
                    return Err(self.unexpected_padding(c));
                }
                out.push((decoded >> 10) as u8);
                out.push((decoded >> 2) as u8);
                continue;
            }
            decoded = decoded << 6 | bits as u32;

            out.push((decoded >> 16) as u8);
            out.push((decoded >> 8) as u8);
            out.push(decoded as u8);
        }
    }

    /// Convenience form of [`decode`](Self::decode) returning a fresh
    /// buffer.
    pub fn decode_to_vec(&self, input: &str) -> Result<Vec<u8>, Base64Error> {
        let mut out = Vec::with_capacity(input.len() / 4 * 3 + 2);
        self.decode(input, &mut out)?;
        Ok(out)
    }

    fn illegal_char(&self, c: char, unit_index: usize) -> Base64Error {
        let code = c as u32;
        if code <= 0x20 {
            Base64Error(format!(
                "Illegal white space character (code 0x{code:x}) as character #{} of 4-char base64 unit: can only be used between units",
                unit_index + 1,
            ))
        } else if self.decode_char(c) == PADDING {
            // Padding in a position where data was required.
            Base64Error(format!(
                "Unexpected padding character ('{c}') as character #{} of 4-char base64 unit",
                unit_index + 1,
            ))
        } else if code < 0x20 || code == 0x7F {
            Base64Error(format!(
                "Illegal control character (code 0x{code:x}) in base64 content"
            ))
        } else {
            Base64Error(format!(
                "Illegal character '{c}' (code 0x{code:x}) in base64 content"
            ))
        }
    }

    fn unexpected_padding(&self, c: char) -> Base64Error {
        Base64Error(format!(
            "Unexpected padding character ('{c}') in base64 content: variant '{}' does not accept padding on read",
            self.name,
        ))
    }

    fn missing_padding(&self, unit_index: usize) -> Base64Error {
        Base64Error(format!(
            "Unexpected end of base64-encoded content: variant '{}' expects padding (4-char base64 units) but unit was truncated after {unit_index} characters",
            self.name,
        ))
    }

    fn truncated_unit(&self, unit_index: usize) -> Base64Error {
        Base64Error(format!(
            "Unexpected end of base64-encoded content: 4-char base64 unit truncated after {unit_index} character(s)"
        ))
    }
}

impl fmt::Debug for Base64Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Base64Variant")
            .field("name", &self.name)
            .field("padding", &self.padding_char())
            .field("max_line_length", &self.max_line_length)
            .field("padding_read", &self.padding_read)
            .finish()
    }
}

impl fmt::Display for Base64Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl PartialEq for Base64Variant {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.padding_read == other.padding_read
    }
}

impl Default for Base64Variant {
    fn default() -> Self {
        MIME_NO_LINEFEEDS
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_encode_hello_world() {
        assert_eq!(
            MIME_NO_LINEFEEDS.encode(b"Hello World"),
            "SGVsbG8gV29ybGQ="
        );
        assert_eq!(MIME_NO_LINEFEEDS.encode(b""), "");
        assert_eq!(MIME_NO_LINEFEEDS.encode(b"f"), "Zg==");
        assert_eq!(MIME_NO_LINEFEEDS.encode(b"fo"), "Zm8=");
        assert_eq!(MIME_NO_LINEFEEDS.encode(b"foo"), "Zm9v");
    }

    #[test]
    fn test_encode_quotes() {
        assert_eq!(
            MIME_NO_LINEFEEDS.encode_with_options(b"foo", true, "\n"),
            "\"Zm9v\""
        );
    }

    #[test]
    fn test_encode_url_variant_no_padding() {
        // 0xFB 0xEF encodes to chars that differ between alphabets.
        assert_eq!(MODIFIED_FOR_URL.encode(&[0xFB, 0xEF]), "--8");
        assert_eq!(MIME_NO_LINEFEEDS.encode(&[0xFB, 0xEF]), "++8=");
    }

    #[test]
    fn test_encode_mime_linefeeds() {
        // 60 input bytes -> 80 output chars -> one linefeed after char 76.
        let input = vec![0u8; 60];
        let encoded = MIME.encode(&input);
        let lines: Vec<&str> = encoded.split('\n').collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].len(), 76);
        assert_eq!(lines[1].len(), 4);
    }

    #[test]
    fn test_decode_with_whitespace_between_units() {
        let decoded = MIME.decode_to_vec("SGVsbG8g\nV29ybGQ=").unwrap();
        assert_eq!(decoded, b"Hello World");
    }

    #[test]
    fn test_decode_whitespace_within_unit_rejected() {
        let err = MIME.decode_to_vec("SGV sbG8gV29ybGQ=").unwrap_err();
        assert!(err.to_string().contains("white space"), "{err}");
        assert!(err.to_string().contains("#4"), "{err}");
    }

    #[test]
    fn test_decode_padding_forbidden() {
        let variant = MIME.with_padding_forbidden();
        let err = variant.decode_to_vec("SGVsbG8gV29ybGQ=").unwrap_err();
        assert!(
            err.to_string().contains("Unexpected padding character"),
            "{err}"
        );

        // Without the padding character, the same data decodes fine.
        let decoded = variant.decode_to_vec("SGVsbG8gV29ybGQ").unwrap();
        assert_eq!(decoded, b"Hello World");
    }

    #[test]
    fn test_decode_padding_required() {
        let err = MIME.decode_to_vec("Zm8").unwrap_err();
        assert!(err.to_string().contains("expects padding"), "{err}");

        let relaxed = MIME.with_padding_allowed();
        assert_eq!(relaxed.decode_to_vec("Zm8").unwrap(), b"fo");
        assert_eq!(relaxed.decode_to_vec("Zm8=").unwrap(), b"fo");
    }

    #[test]
    fn test_decode_illegal_character() {
        let err = MIME.decode_to_vec("Zm9*").unwrap_err();
        assert!(err.to_string().contains("Illegal character '*'"), "{err}");
    }

    #[test]
    fn test_mutators_share_alphabet() {
        let v = MODIFIED_FOR_URL.with_padding_allowed();
        assert_eq!(v.name(), "MODIFIED-FOR-URL");
        assert_eq!(v.padding_read_behaviour(), PaddingReadBehaviour::Allowed);
        assert_eq!(v.encode(&[0xFB, 0xEF]), "--8");
    }

    #[test]
    fn test_roundtrip_all_variants() {
        let data: Vec<u8> = (0u8..=255).collect();
        for variant in [&MIME, &MIME_NO_LINEFEEDS, &PEM, &MODIFIED_FOR_URL] {
            let encoded = variant.encode(&data);
            let decoded = variant.decode_to_vec(&encoded).unwrap();
            assert_eq!(decoded, data, "variant {}", variant.name());
        }
    }

    #[test]
    fn test_matches_base64_crate() {
        let data = b"arbitrary test content \x00\xff\x80";
        assert_eq!(
            MIME_NO_LINEFEEDS.encode(&data[..]),
            base64::encode_config(&data[..], base64::STANDARD)
        );
        assert_eq!(
            MODIFIED_FOR_URL.encode(&data[..]),
            base64::encode_config(&data[..], base64::URL_SAFE_NO_PAD)
        );
    }
}
