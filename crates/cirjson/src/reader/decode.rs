//! Byte-input front-end: RFC 4627 charset detection over the leading
//! bytes, and incremental transcoding of UTF-16/UTF-32 content into the
//! UTF-8 the tokenizer consumes.

use crate::error::{Error, Result};
use crate::location::Location;
use std::io;
use std::io::Read as _;

const RAW_CHUNK: usize = 4000;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Encoding {
    Utf8,
    Utf16Be,
    Utf16Le,
    Utf32Be,
    Utf32Le,
}

impl Encoding {
    pub fn name(self) -> &'static str {
        match self {
            Encoding::Utf8 => "UTF-8",
            Encoding::Utf16Be => "UTF-16BE",
            Encoding::Utf16Le => "UTF-16LE",
            Encoding::Utf32Be => "UTF-32BE",
            Encoding::Utf32Le => "UTF-32LE",
        }
    }

    fn unit_size(self) -> usize {
        match self {
            Encoding::Utf8 => 1,
            Encoding::Utf16Be | Encoding::Utf16Le => 2,
            Encoding::Utf32Be | Encoding::Utf32Le => 4,
        }
    }
}

/// Classifies up to 4 leading bytes by BOM and zero-byte pattern, per the
/// RFC 4627 recommended mechanism. Returns the encoding and the number of
/// BOM bytes to skip.
pub(crate) fn detect_encoding(p: &[u8]) -> (Encoding, usize) {
    if p.len() >= 4 && p[..4] == [0x00, 0x00, 0xFE, 0xFF] {
        return (Encoding::Utf32Be, 4);
    }
    if p.len() >= 4 && p[..4] == [0xFF, 0xFE, 0x00, 0x00] {
        return (Encoding::Utf32Le, 4);
    }
    if p.len() >= 3 && p[..3] == [0xEF, 0xBB, 0xBF] {
        return (Encoding::Utf8, 3);
    }
    if p.len() >= 2 && p[..2] == [0xFE, 0xFF] {
        return (Encoding::Utf16Be, 2);
    }
    if p.len() >= 2 && p[..2] == [0xFF, 0xFE] {
        return (Encoding::Utf16Le, 2);
    }
    // No BOM: infer from zero-byte placement of the first characters,
    // which for valid content are ASCII.
    if p.len() >= 4 {
        if p[0] == 0 && p[1] == 0 && p[2] == 0 {
            return (Encoding::Utf32Be, 0);
        }
        if p[0] != 0 && p[1] == 0 && p[2] == 0 && p[3] == 0 {
            return (Encoding::Utf32Le, 0);
        }
    }
    if p.len() >= 2 {
        if p[0] == 0 {
            return (Encoding::Utf16Be, 0);
        }
        if p[1] == 0 {
            return (Encoding::Utf16Le, 0);
        }
    }
    (Encoding::Utf8, 0)
}

/// The raw byte supply behind a decoding source.
pub(crate) enum RawSource<'a> {
    Slice { data: &'a [u8], pos: usize },
    Read(Box<dyn io::Read + 'a>),
}

impl<'a> RawSource<'a> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            RawSource::Slice { data, pos } => {
                let n = buf.len().min(data.len() - *pos);
                buf[..n].copy_from_slice(&data[*pos..*pos + n]);
                *pos += n;
                Ok(n)
            }
            RawSource::Read(inner) => inner.read(buf),
        }
    }
}

/// Streams raw bytes through charset decoding, producing UTF-8. Decoding
/// errors are deferred behind any bytes already produced, so the lexer
/// observes content strictly in input order.
pub(crate) struct DecodingSource<'a> {
    raw: RawSource<'a>,
    encoding: Encoding,
    /// Raw bytes of an incomplete unit (or unpaired high surrogate)
    /// carried to the next fill.
    carry: Vec<u8>,
    pending_err: Option<Error>,
    raw_done: bool,
}

impl<'a> DecodingSource<'a> {
    /// Wraps a source whose BOM (if any) has already been consumed.
    pub fn new(raw: RawSource<'a>, encoding: Encoding) -> Self {
        Self {
            raw,
            encoding,
            carry: Vec::new(),
            pending_err: None,
            raw_done: false,
        }
    }

    /// Appends decoded UTF-8 bytes to `out`, returning how many were
    /// produced. Ok(0) signals clean end of input.
    pub fn fill(&mut self, out: &mut Vec<u8>) -> Result<usize> {
        if let Some(err) = self.pending_err.take() {
            return Err(err);
        }
        if self.encoding == Encoding::Utf8 {
            let start = out.len();
            out.resize(start + RAW_CHUNK, 0);
            let n = self
                .raw
                .read(&mut out[start..])
                .map_err(|e| Error::io(e, Location::NA))?;
            out.truncate(start + n);
            return Ok(n);
        }
        self.fill_transcoding(out)
    }

    /// Reads and decodes until at least one character is produced, the
    /// raw source is exhausted, or decoding fails. A raw source that
    /// trickles fewer bytes than one code unit per read never surfaces
    /// as a spurious end of input.
    fn fill_transcoding(&mut self, out: &mut Vec<u8>) -> Result<usize> {
        let produced_start = out.len();
        let unit = self.encoding.unit_size();

        loop {
            if !self.raw_done {
                let mut raw_chunk = [0u8; RAW_CHUNK];
                let n = self
                    .raw
                    .read(&mut raw_chunk)
                    .map_err(|e| Error::io(e, Location::NA))?;
                if n == 0 {
                    self.raw_done = true;
                } else {
                    self.carry.extend_from_slice(&raw_chunk[..n]);
                }
            }

            let mut pos = 0;
            let mut err = None;
            while self.carry.len() - pos >= unit {
                match self.decode_unit(&self.carry[pos..]) {
                    Ok(Some((c, consumed))) => {
                        let mut buf = [0u8; 4];
                        out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
                        pos += consumed;
                    }
                    // A surrogate pair is split across the chunk boundary.
                    Ok(None) => {
                        if self.raw_done {
                            err = Some(self.dangling_error());
                        }
                        break;
                    }
                    Err(e) => {
                        err = Some(e);
                        break;
                    }
                }
            }
            self.carry.drain(..pos);

            if err.is_none() && self.raw_done && !self.carry.is_empty() && self.carry.len() < unit
            {
                err = Some(self.dangling_error());
            }

            let produced = out.len() - produced_start;
            if let Some(e) = err {
                // Let the lexer see any decoded bytes first.
                return if produced > 0 {
                    self.pending_err = Some(e);
                    Ok(produced)
                } else {
                    Err(e)
                };
            }
            if produced > 0 || self.raw_done {
                return Ok(produced);
            }
        }
    }

    /// Decodes one character from the head of `bytes` (at least one full
    /// unit). Ok(None) means a UTF-16 surrogate pair needs bytes that
    /// have not arrived yet.
    fn decode_unit(&self, bytes: &[u8]) -> Result<Option<(char, usize)>> {
        match self.encoding {
            Encoding::Utf8 => unreachable!("UTF-8 is not transcoded"),
            Encoding::Utf16Be | Encoding::Utf16Le => {
                let be = self.encoding == Encoding::Utf16Be;
                let u = read_u16(bytes, be);
                if (0xDC00..=0xDFFF).contains(&u) {
                    return Err(self.invalid_utf16(u));
                }
                if (0xD800..=0xDBFF).contains(&u) {
                    if bytes.len() < 4 {
                        return Ok(None);
                    }
                    let low = read_u16(&bytes[2..], be);
                    if !(0xDC00..=0xDFFF).contains(&low) {
                        return Err(self.invalid_utf16(low));
                    }
                    let c = crate::escape::combine_surrogates(u, low);
                    return Ok(Some((c, 4)));
                }
                let c = char::from_u32(u as u32)
                    .expect("non-surrogate BMP code unit is a valid char");
                Ok(Some((c, 2)))
            }
            Encoding::Utf32Be | Encoding::Utf32Le => {
                let be = self.encoding == Encoding::Utf32Be;
                let u = read_u32(bytes, be);
                match char::from_u32(u) {
                    Some(c) => Ok(Some((c, 4))),
                    None => Err(Error::stream_read(
                        format!("Invalid UTF-32 character 0x{u:08x}"),
                        Location::NA,
                    )),
                }
            }
        }
    }

    fn invalid_utf16(&self, unit: u16) -> Error {
        Error::stream_read(
            format!("Invalid UTF-16 character 0x{unit:04x}: broken surrogate pair"),
            Location::NA,
        )
    }

    fn dangling_error(&self) -> Error {
        let what = match self.encoding {
            Encoding::Utf16Be | Encoding::Utf16Le => {
                "Unexpected EOF in the middle of a 2-byte UTF-16 char"
            }
            _ => "Unexpected EOF in the middle of a 4-byte UTF-32 char",
        };
        Error::stream_read(what, Location::NA)
    }
}

fn read_u16(bytes: &[u8], be: bool) -> u16 {
    if be {
        u16::from_be_bytes([bytes[0], bytes[1]])
    } else {
        u16::from_le_bytes([bytes[0], bytes[1]])
    }
}

fn read_u32(bytes: &[u8], be: bool) -> u32 {
    if be {
        u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    } else {
        u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_bom_detection() {
        assert_eq!(
            detect_encoding(&[0x00, 0x00, 0xFE, 0xFF]),
            (Encoding::Utf32Be, 4)
        );
        assert_eq!(
            detect_encoding(&[0xFF, 0xFE, 0x00, 0x00]),
            (Encoding::Utf32Le, 4)
        );
        assert_eq!(
            detect_encoding(&[0xEF, 0xBB, 0xBF, b'{']),
            (Encoding::Utf8, 3)
        );
        assert_eq!(detect_encoding(&[0xFE, 0xFF, 0, b'{']), (Encoding::Utf16Be, 2));
        assert_eq!(
            detect_encoding(&[0xFF, 0xFE, b'{', 0]),
            (Encoding::Utf16Le, 2)
        );
    }

    #[test]
    fn test_zero_pattern_detection() {
        assert_eq!(
            detect_encoding(&[0, 0, 0, b'{']),
            (Encoding::Utf32Be, 0)
        );
        assert_eq!(
            detect_encoding(&[b'{', 0, 0, 0]),
            (Encoding::Utf32Le, 0)
        );
        assert_eq!(detect_encoding(&[0, b'{', 0, b'}']), (Encoding::Utf16Be, 0));
        assert_eq!(detect_encoding(&[b'{', 0, b'}', 0]), (Encoding::Utf16Le, 0));
        assert_eq!(detect_encoding(b"{\"a\""), (Encoding::Utf8, 0));
        // All zeroes classify as UTF-32BE.
        assert_eq!(detect_encoding(&[0, 0, 0, 0]), (Encoding::Utf32Be, 0));
    }

    fn decode_all(encoding: Encoding, data: &[u8]) -> Result<String> {
        let mut src = DecodingSource::new(
            RawSource::Slice { data, pos: 0 },
            encoding,
        );
        let mut out = Vec::new();
        loop {
            let n = src.fill(&mut out)?;
            if n == 0 && src.raw_done {
                break;
            }
        }
        Ok(String::from_utf8(out).expect("decoded content is UTF-8"))
    }

    #[test]
    fn test_utf16_decoding() {
        let text = "{\"a\": \u{1F600}}";
        let be: Vec<u8> = text.encode_utf16().flat_map(|u| u.to_be_bytes()).collect();
        assert_eq!(decode_all(Encoding::Utf16Be, &be).unwrap(), text);
        let le: Vec<u8> = text.encode_utf16().flat_map(|u| u.to_le_bytes()).collect();
        assert_eq!(decode_all(Encoding::Utf16Le, &le).unwrap(), text);
    }

    #[test]
    fn test_utf16_broken_surrogate() {
        // High surrogate followed by a regular char.
        let bytes = [0xD8, 0x00, 0x00, 0x20];
        let err = decode_all(Encoding::Utf16Be, &bytes).unwrap_err();
        assert!(
            err.to_string().contains("Invalid UTF-16 character 0x0020"),
            "{err}"
        );
    }

    #[test]
    fn test_utf32_decoding() {
        let text = "[\"r\", 1]";
        let be: Vec<u8> = text.chars().flat_map(|c| (c as u32).to_be_bytes()).collect();
        assert_eq!(decode_all(Encoding::Utf32Be, &be).unwrap(), text);
        let le: Vec<u8> = text.chars().flat_map(|c| (c as u32).to_le_bytes()).collect();
        assert_eq!(decode_all(Encoding::Utf32Le, &le).unwrap(), text);
    }

    #[test]
    fn test_utf32_invalid_code_point() {
        let bytes = [0x00, 0x00, 0x00, 0x20, 0xFE, 0xFF, 0x00, 0x01];
        let err = decode_all(Encoding::Utf32Be, &bytes).unwrap_err();
        assert!(
            err.to_string().contains("Invalid UTF-32 character 0xfeff0001"),
            "{err}"
        );
    }

    #[test]
    fn test_utf32_truncated_unit() {
        for len in [5, 6, 7] {
            let bytes = &[0x00, 0x00, 0x00, 0x20, 0x00, 0x00, 0x00][..len];
            let err = decode_all(Encoding::Utf32Be, bytes).unwrap_err();
            let msg = err.to_string();
            assert!(msg.contains("Unexpected EOF"), "{msg}");
            assert!(msg.contains("4-byte UTF-32 char"), "{msg}");
        }
    }
}
