//! The resumable tokenizer shared by the blocking and non-blocking
//! readers. The tokenizer consumes input from a [`Feed`] window and either
//! produces a token, asks for more input, or reports end of content; all
//! partial-token state lives on the tokenizer itself, so a token may be
//! split across any number of feeds without changing the token sequence.

use crate::constraints::{ErrorReportConfiguration, StreamReadConstraints};
use crate::context::ContextStack;
use crate::error::{Error, Result};
use crate::features::{CirJsonReadFeature, FeatureSet, ReadFeature};
use crate::location::{ContentReference, Location};
use crate::num::{self, NumberValue};
use crate::ptr::Pointer;
use crate::symbols::SymbolScope;
use crate::token::TokenKind;
use crate::{escape, ID_PROPERTY_NAME};

/// One window of input bytes. The tokenizer consumes from `pos`; unread
/// bytes stay in the window for the next call.
pub(crate) struct Feed<'a> {
    pub data: &'a [u8],
    pub pos: usize,
}

impl<'a> Feed<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }
}

/// Outcome of one tokenizer step.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Step {
    Token(TokenKind),
    /// The window is exhausted mid-token or between tokens and end of
    /// input has not been signalled.
    NeedMore,
    /// All content has been consumed.
    End,
}

/// Structural parser state.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum State {
    /// Expecting a root-level value, or clean end of input.
    RootValue,
    /// After `{`: expecting the quoted identity property name.
    ObjectIdName,
    /// After the identity name: expecting `:`.
    ObjectIdColon,
    /// After the identity colon: expecting the quoted identity string.
    ObjectIdValue,
    /// After an entry value (or the identity value): `,` or `}`.
    ObjectEntryOrEnd,
    /// After `,` in an object: expecting a quoted property name.
    ObjectName,
    /// After a property name: expecting `:`.
    ObjectColon,
    /// After `:`: expecting a value.
    ObjectValue,
    /// After `[`: expecting the quoted identity string.
    ArrayId,
    /// After an element (or the identity string): `,` or `]`.
    ArrayEntryOrEnd,
    /// After `,` in an array: expecting a value.
    ArrayValue,
    Closed,
}

/// In-progress escape sequence within a string.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum EscapeState {
    None,
    /// A backslash has been read.
    Backslash,
    /// Inside `\uXXXX`.
    Hex { digits: u8, acc: u16 },
    /// A high surrogate was decoded; a `\` must follow.
    PairBackslash { high: u16 },
    /// High surrogate and `\` seen; a `u` must follow.
    PairU { high: u16 },
    /// Inside the `\uXXXX` of the low surrogate.
    PairHex { high: u16, digits: u8, acc: u16 },
}

/// Number-scan phase.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum NumPhase {
    Start,
    Minus,
    IntZero,
    Int,
    FracDot,
    Frac,
    ExpLetter,
    ExpSign,
    Exp,
}

/// In-progress scalar scan.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Scan {
    None,
    Str(EscapeState),
    Num(NumPhase),
    Lit { kind: TokenKind, matched: usize },
}

/// Reader configuration shared by both variants.
#[derive(Debug, Clone)]
pub(crate) struct ReaderConfig {
    pub read_features: FeatureSet<ReadFeature>,
    pub format_features: FeatureSet<CirJsonReadFeature>,
    pub constraints: StreamReadConstraints,
    pub error_config: ErrorReportConfiguration,
}

pub(crate) struct Tokenizer {
    cfg: ReaderConfig,
    content: ContentReference,
    /// True for char sources, which have no byte offsets.
    char_source: bool,

    state: State,
    scan: Scan,
    /// The structural state at the moment the active scan began, which
    /// determines what happens when the scalar completes.
    scan_site: State,
    pub(crate) context: ContextStack,
    symbols: SymbolScope,

    current: Option<TokenKind>,
    /// Decoded text of the current string, name, or number token.
    text: String,
    /// Raw UTF-8 accumulation for the string being scanned.
    str_bytes: Vec<u8>,
    str_chars: usize,
    /// Raw text of the number being scanned; retained for deferred
    /// floating-point conversion.
    num_raw: String,
    num_is_float: bool,
    /// Resolved integral value; floats are converted lazily.
    number: Option<NumberValue>,

    end_of_input: bool,

    // Live position, 1-based line and column.
    line: i32,
    col: i32,
    byte_offset: i64,
    char_offset: i64,
    last_cr: bool,

    // Position of the first character of the current token.
    token_line: i32,
    token_col: i32,
    token_byte: i64,
    token_char: i64,
}

impl Tokenizer {
    pub fn new(
        cfg: ReaderConfig,
        content: ContentReference,
        char_source: bool,
        symbols: SymbolScope,
    ) -> Self {
        let content = if cfg.read_features.is_enabled(ReadFeature::IncludeSourceInLocation) {
            content
        } else {
            content.redacted()
        };
        let detect_dups = cfg
            .read_features
            .is_enabled(ReadFeature::StrictDuplicateDetection);
        Self {
            cfg,
            content,
            char_source,
            state: State::RootValue,
            scan: Scan::None,
            scan_site: State::RootValue,
            context: ContextStack::new(detect_dups),
            symbols,
            current: None,
            text: String::new(),
            str_bytes: Vec::new(),
            str_chars: 0,
            num_raw: String::new(),
            num_is_float: false,
            number: None,
            end_of_input: false,
            line: 1,
            col: 1,
            byte_offset: 0,
            char_offset: 0,
            last_cr: false,
            token_line: 1,
            token_col: 1,
            token_byte: 0,
            token_char: 0,
        }
    }

    pub fn signal_end_of_input(&mut self) {
        self.end_of_input = true;
    }

    pub fn close(&mut self) {
        self.state = State::Closed;
        self.current = None;
        self.symbols.finish();
    }

    pub fn current_token(&self) -> Option<TokenKind> {
        self.current
    }

    pub fn text(&self) -> Option<&str> {
        match self.current? {
            TokenKind::ValueString | TokenKind::PropertyName | TokenKind::IdPropertyName => {
                Some(&self.text)
            }
            TokenKind::ValueNumberInt | TokenKind::ValueNumberFloat => Some(&self.num_raw),
            kind => kind.as_str(),
        }
    }

    pub fn number_raw(&self) -> &str {
        &self.num_raw
    }

    pub fn number_value(&self) -> Option<&NumberValue> {
        self.number.as_ref()
    }

    pub fn fast_double_parser(&self) -> bool {
        self.cfg
            .read_features
            .is_enabled(ReadFeature::UseFastDoubleParser)
    }

    pub fn auto_close_source(&self) -> bool {
        self.cfg
            .read_features
            .is_enabled(ReadFeature::AutoCloseSource)
    }

    pub fn pointer(&self, include_root: bool) -> Pointer {
        self.context.pointer(include_root)
    }

    pub fn current_name(&self) -> Option<&str> {
        self.context.current_name()
    }

    pub fn depth(&self) -> usize {
        self.context.depth()
    }

    pub fn current_location(&self) -> Location {
        Location {
            content: self.content.clone(),
            byte_offset: if self.char_source { -1 } else { self.byte_offset },
            char_offset: self.char_offset,
            line: self.line,
            column: self.col,
        }
    }

    pub fn token_location(&self) -> Location {
        Location {
            content: self.content.clone(),
            byte_offset: if self.char_source { -1 } else { self.token_byte },
            char_offset: self.token_char,
            line: self.token_line,
            column: self.token_col,
        }
    }

    fn err(&self, message: impl Into<String>) -> Error {
        Error::stream_read(message, self.current_location())
    }

    fn err_with_pointer(&self, message: impl std::fmt::Display) -> Error {
        Error::stream_read(
            format!("{message} (path: '{}')", self.context.pointer(false).as_str()),
            self.current_location(),
        )
    }

    // Input consumption, tracking line, column, byte and char offsets.

    fn peek(&self, feed: &Feed) -> Option<u8> {
        feed.data.get(feed.pos).copied()
    }

    fn take(&mut self, feed: &mut Feed) -> Option<u8> {
        let b = *feed.data.get(feed.pos)?;
        feed.pos += 1;
        self.note_byte(b);
        Some(b)
    }

    fn note_byte(&mut self, b: u8) {
        self.byte_offset += 1;
        if b & 0xC0 == 0x80 {
            return; // UTF-8 continuation byte
        }
        self.char_offset += 1;
        match b {
            b'\r' => {
                self.line += 1;
                self.col = 1;
                self.last_cr = true;
            }
            b'\n' => {
                if !self.last_cr {
                    self.line += 1;
                }
                self.col = 1;
                self.last_cr = false;
            }
            _ => {
                self.col += 1;
                self.last_cr = false;
            }
        }
    }

    /// Accounts a chunk of string-interior bytes, which contain no line
    /// terminators (raw control characters are rejected before this).
    fn note_chunk(&mut self, chunk: &[u8]) {
        if chunk.is_empty() {
            return;
        }
        self.byte_offset += chunk.len() as i64;
        let chars = chunk.iter().filter(|b| (**b & 0xC0) != 0x80).count();
        self.char_offset += chars as i64;
        self.col += chars as i32;
        self.last_cr = false;
    }

    fn mark_token_start(&mut self) {
        self.token_line = self.line;
        self.token_col = self.col;
        self.token_byte = self.byte_offset;
        self.token_char = self.char_offset;
    }

    /// Produces the next token from the window.
    pub fn next(&mut self, feed: &mut Feed) -> Result<Step> {
        if self.state == State::Closed {
            return Ok(Step::End);
        }
        if self.scan != Scan::None {
            match self.drive_scan(feed)? {
                Some(step) => return Ok(step),
                None => return Ok(Step::NeedMore),
            }
        }

        loop {
            // Skip insignificant whitespace.
            let b = loop {
                match self.peek(feed) {
                    None => {
                        if self.end_of_input {
                            return self.at_end_of_input();
                        }
                        return Ok(Step::NeedMore);
                    }
                    Some(b' ' | b'\t' | b'\r' | b'\n') => {
                        self.take(feed);
                    }
                    Some(b) => break b,
                }
            };

            self.mark_token_start();
            match self.state {
                State::RootValue | State::ObjectValue | State::ArrayValue => {
                    return self.dispatch_value(feed, b);
                }
                State::ObjectIdName => return self.dispatch_object_id_name(feed, b),
                State::ObjectIdColon => {
                    self.expect_colon(feed, b, "identity property name")?;
                    self.state = State::ObjectIdValue;
                }
                State::ObjectIdValue => return self.dispatch_object_id_value(feed, b),
                State::ObjectEntryOrEnd => match b {
                    b',' => {
                        self.take(feed);
                        self.state = State::ObjectName;
                    }
                    b'}' => {
                        self.take(feed);
                        return Ok(Step::Token(self.end_object()));
                    }
                    _ => {
                        self.take(feed);
                        return Err(self.err_with_pointer(format_args!(
                            "Unexpected character {}: was expecting ',' to separate Object entries or '}}' to end Object",
                            display_byte(b),
                        )));
                    }
                },
                State::ObjectName => match b {
                    b'"' => {
                        self.take(feed);
                        self.begin_string(State::ObjectName);
                        match self.drive_scan(feed)? {
                            Some(step) => return Ok(step),
                            None => return Ok(Step::NeedMore),
                        }
                    }
                    b'}' if self
                        .cfg
                        .format_features
                        .is_enabled(CirJsonReadFeature::AllowTrailingComma) =>
                    {
                        self.take(feed);
                        return Ok(Step::Token(self.end_object()));
                    }
                    _ => {
                        self.take(feed);
                        return Err(self.err_with_pointer(format_args!(
                            "Unexpected character {}: was expecting double-quote to start a property name",
                            display_byte(b),
                        )));
                    }
                },
                State::ObjectColon => {
                    self.expect_colon(feed, b, "property name")?;
                    self.state = State::ObjectValue;
                }
                State::ArrayId => return self.dispatch_array_id(feed, b),
                State::ArrayEntryOrEnd => match b {
                    b',' => {
                        self.take(feed);
                        self.state = State::ArrayValue;
                    }
                    b']' => {
                        self.take(feed);
                        return Ok(Step::Token(self.end_array()));
                    }
                    _ => {
                        self.take(feed);
                        return Err(self.err_with_pointer(format_args!(
                            "Unexpected character {}: was expecting ',' to separate Array elements or ']' to end Array",
                            display_byte(b),
                        )));
                    }
                },
                State::Closed => return Ok(Step::End),
            }
        }
    }

    fn expect_colon(&mut self, feed: &mut Feed, b: u8, after: &str) -> Result<()> {
        self.take(feed);
        if b == b':' {
            return Ok(());
        }
        Err(self.err_with_pointer(format_args!(
            "Unexpected character {}: was expecting ':' after the {after}",
            display_byte(b),
        )))
    }

    fn at_end_of_input(&mut self) -> Result<Step> {
        match self.state {
            State::RootValue => {
                self.current = None;
                Ok(Step::End)
            }
            State::ObjectIdName
            | State::ObjectIdColon
            | State::ObjectIdValue
            | State::ObjectEntryOrEnd
            | State::ObjectName
            | State::ObjectColon
            | State::ObjectValue => Err(self.unexpected_eof_in("Object")),
            State::ArrayId | State::ArrayEntryOrEnd | State::ArrayValue => {
                Err(self.unexpected_eof_in("Array"))
            }
            State::Closed => Ok(Step::End),
        }
    }

    fn unexpected_eof_in(&self, what: &str) -> Error {
        let start = self
            .context
            .current()
            .start_location
            .as_ref()
            .map(|loc| format!(" (start marker at {loc})"))
            .unwrap_or_default();
        self.err_with_pointer(format_args!(
            "Unexpected end-of-input: expected close marker for {what}{start}"
        ))
    }

    // Value dispatch for states that admit a general value.

    fn dispatch_value(&mut self, feed: &mut Feed, b: u8) -> Result<Step> {
        match b {
            b'{' => {
                self.take(feed);
                self.start_object()
            }
            b'[' => {
                self.take(feed);
                self.start_array()
            }
            b'"' => {
                self.take(feed);
                self.advance_for_value();
                self.begin_string(self.state);
                match self.drive_scan(feed)? {
                    Some(step) => Ok(step),
                    None => Ok(Step::NeedMore),
                }
            }
            b'-' | b'0'..=b'9' => {
                self.advance_for_value();
                self.begin_number();
                match self.drive_scan(feed)? {
                    Some(step) => Ok(step),
                    None => Ok(Step::NeedMore),
                }
            }
            b't' => self.begin_literal(feed, TokenKind::ValueTrue),
            b'f' => self.begin_literal(feed, TokenKind::ValueFalse),
            b'n' => self.begin_literal(feed, TokenKind::ValueNull),
            b']' if self.state == State::ArrayValue
                && self
                    .cfg
                    .format_features
                    .is_enabled(CirJsonReadFeature::AllowTrailingComma) =>
            {
                self.take(feed);
                Ok(Step::Token(self.end_array()))
            }
            _ => {
                self.take(feed);
                if b < 0x20 {
                    return Err(self.err(format!(
                        "Illegal character (CTRL-CHAR, code {b}): only regular white space (\\r, \\n, \\t) is allowed between tokens"
                    )));
                }
                Err(self.err_with_pointer(format_args!(
                    "Unexpected character {}: expected a valid value (number, String, Array, Object, 'true', 'false' or 'null')",
                    display_byte(b),
                )))
            }
        }
    }

    fn dispatch_object_id_name(&mut self, feed: &mut Feed, b: u8) -> Result<Step> {
        match b {
            b'"' => {
                self.take(feed);
                self.begin_string(State::ObjectIdName);
                match self.drive_scan(feed)? {
                    Some(step) => Ok(step),
                    None => Ok(Step::NeedMore),
                }
            }
            b'}' => {
                self.take(feed);
                Err(self.err_with_pointer(format_args!(
                    "Expected the identity property name ('{ID_PROPERTY_NAME}') as the first Object property, but Object ends without one"
                )))
            }
            _ => {
                self.take(feed);
                if b < 0x20 {
                    return Err(self.err(format!(
                        "Illegal character (CTRL-CHAR, code {b}) inside Object"
                    )));
                }
                Err(self.err_with_pointer(format_args!(
                    "Unexpected character {}: was expecting the identity property name ('{ID_PROPERTY_NAME}')",
                    display_byte(b),
                )))
            }
        }
    }

    fn dispatch_object_id_value(&mut self, feed: &mut Feed, b: u8) -> Result<Step> {
        match b {
            b'"' => {
                self.take(feed);
                self.begin_string(State::ObjectIdValue);
                match self.drive_scan(feed)? {
                    Some(step) => Ok(step),
                    None => Ok(Step::NeedMore),
                }
            }
            _ => {
                self.take(feed);
                Err(self.err_with_pointer(format_args!(
                    "Unexpected character {}: the value of the identity property '{ID_PROPERTY_NAME}' must be a String",
                    display_byte(b),
                )))
            }
        }
    }

    fn dispatch_array_id(&mut self, feed: &mut Feed, b: u8) -> Result<Step> {
        match b {
            b'"' => {
                self.take(feed);
                self.begin_string(State::ArrayId);
                match self.drive_scan(feed)? {
                    Some(step) => Ok(step),
                    None => Ok(Step::NeedMore),
                }
            }
            b']' => {
                self.take(feed);
                Err(self.err_with_pointer(format_args!(
                    "Expected a String identity as the first Array element, but Array ends without one"
                )))
            }
            _ => {
                self.take(feed);
                Err(self.err_with_pointer(format_args!(
                    "Unexpected character {}: was expecting the String identity of the Array",
                    display_byte(b),
                )))
            }
        }
    }

    // Structure tokens.

    /// Advances the enclosing entry index when a value begins. Object
    /// entries advance on the property name instead, and identity
    /// elements never advance.
    fn advance_for_value(&mut self) {
        match self.state {
            State::RootValue => self.context.advance(),
            State::ArrayValue => self.context.advance(),
            _ => {}
        }
    }

    fn start_object(&mut self) -> Result<Step> {
        self.advance_for_value();
        let location = self.token_location();
        self.cfg
            .constraints
            .check_nesting_depth(self.context.depth() + 1, &location)?;
        self.context.push_object(Some(location));
        self.state = State::ObjectIdName;
        self.current = Some(TokenKind::StartObject);
        Ok(Step::Token(TokenKind::StartObject))
    }

    fn start_array(&mut self) -> Result<Step> {
        self.advance_for_value();
        let location = self.token_location();
        self.cfg
            .constraints
            .check_nesting_depth(self.context.depth() + 1, &location)?;
        self.context.push_array(Some(location));
        self.state = State::ArrayId;
        self.current = Some(TokenKind::StartArray);
        Ok(Step::Token(TokenKind::StartArray))
    }

    fn end_object(&mut self) -> TokenKind {
        self.context.pop();
        self.after_pop();
        self.current = Some(TokenKind::EndObject);
        TokenKind::EndObject
    }

    fn end_array(&mut self) -> TokenKind {
        self.context.pop();
        self.after_pop();
        self.current = Some(TokenKind::EndArray);
        TokenKind::EndArray
    }

    fn after_pop(&mut self) {
        match self.context.kind() {
            crate::context::ContextKind::Root => self.state = State::RootValue,
            crate::context::ContextKind::Array => self.state = State::ArrayEntryOrEnd,
            crate::context::ContextKind::Object => self.state = State::ObjectEntryOrEnd,
        }
    }

    // Scalar scans.

    fn begin_string(&mut self, site: State) {
        self.scan = Scan::Str(EscapeState::None);
        self.scan_site = site;
        self.str_bytes.clear();
        self.str_chars = 0;
    }

    fn begin_number(&mut self) {
        self.scan = Scan::Num(NumPhase::Start);
        self.scan_site = self.state;
        self.num_raw.clear();
        self.num_is_float = false;
        self.number = None;
    }

    fn begin_literal(&mut self, feed: &mut Feed, kind: TokenKind) -> Result<Step> {
        self.advance_for_value();
        self.scan = Scan::Lit { kind, matched: 0 };
        self.scan_site = self.state;
        match self.drive_scan(feed)? {
            Some(step) => Ok(step),
            None => Ok(Step::NeedMore),
        }
    }

    /// Continues the active scalar scan. Returns None when the window is
    /// exhausted and more input may arrive.
    fn drive_scan(&mut self, feed: &mut Feed) -> Result<Option<Step>> {
        match self.scan {
            Scan::None => unreachable!("drive_scan called without an active scan"),
            Scan::Str(_) => self.drive_string(feed),
            Scan::Num(_) => self.drive_number(feed),
            Scan::Lit { .. } => self.drive_literal(feed),
        }
    }

    fn drive_string(&mut self, feed: &mut Feed) -> Result<Option<Step>> {
        loop {
            let escape = match self.scan {
                Scan::Str(escape) => escape,
                _ => unreachable!(),
            };
            if escape == EscapeState::None {
                // Fast path: bulk-copy until a quote, backslash, or
                // control character.
                let rest = &feed.data[feed.pos..];
                let stop = memchr::memchr2(b'"', b'\\', rest).unwrap_or(rest.len());
                let chunk = &rest[..stop];
                if let Some(ctl) = chunk.iter().position(|b| *b < 0x20) {
                    let code = chunk[ctl];
                    self.note_chunk(&chunk[..ctl]);
                    feed.pos += ctl + 1;
                    self.note_byte(code);
                    return Err(self.err(format!(
                        "Illegal unquoted character (CTRL-CHAR, code {code}): has to be escaped using a backslash"
                    )));
                }
                self.append_str_chunk(chunk)?;
                self.note_chunk(chunk);
                feed.pos += stop;

                match self.peek(feed) {
                    None => {
                        if self.end_of_input {
                            return Err(self.err(
                                "Unexpected end-of-input: was expecting closing quote for a String value",
                            ));
                        }
                        return Ok(None);
                    }
                    Some(b'"') => {
                        self.take(feed);
                        return self.finish_string().map(Some);
                    }
                    Some(_) => {
                        // Backslash.
                        self.take(feed);
                        self.scan = Scan::Str(EscapeState::Backslash);
                    }
                }
                continue;
            }

            // Escape resolution, one byte at a time.
            let Some(b) = self.take(feed) else {
                if self.end_of_input {
                    return Err(self.err(
                        "Unexpected end-of-input in a character escape sequence of a String value",
                    ));
                }
                return Ok(None);
            };
            let next = match escape {
                EscapeState::Backslash => {
                    if b == b'u' {
                        EscapeState::Hex { digits: 0, acc: 0 }
                    } else if let Some(c) = escape::simple_escape(b) {
                        self.append_str_char(c)?;
                        EscapeState::None
                    } else {
                        return Err(self.err(format!(
                            "Unrecognized character escape {}",
                            display_byte(b),
                        )));
                    }
                }
                EscapeState::Hex { digits, acc } => {
                    let Some(d) = escape::hex_digit(b) else {
                        return Err(self.err(format!(
                            "Unexpected character {} in a \\uXXXX escape: expected a hex digit",
                            display_byte(b),
                        )));
                    };
                    let acc = acc << 4 | d;
                    if digits + 1 < 4 {
                        EscapeState::Hex {
                            digits: digits + 1,
                            acc,
                        }
                    } else if escape::is_high_surrogate(acc) {
                        EscapeState::PairBackslash { high: acc }
                    } else if escape::is_low_surrogate(acc) {
                        return Err(self.err(format!(
                            "Unmatched second part of a surrogate pair (0x{acc:04X})"
                        )));
                    } else {
                        let c = char::from_u32(acc as u32)
                            .expect("non-surrogate BMP code point is a valid char");
                        self.append_str_char(c)?;
                        EscapeState::None
                    }
                }
                EscapeState::PairBackslash { high } => {
                    if b != b'\\' {
                        return Err(self.split_surrogate(high, b));
                    }
                    EscapeState::PairU { high }
                }
                EscapeState::PairU { high } => {
                    if b != b'u' {
                        return Err(self.split_surrogate(high, b));
                    }
                    EscapeState::PairHex {
                        high,
                        digits: 0,
                        acc: 0,
                    }
                }
                EscapeState::PairHex { high, digits, acc } => {
                    let Some(d) = escape::hex_digit(b) else {
                        return Err(self.err(format!(
                            "Unexpected character {} in a \\uXXXX escape: expected a hex digit",
                            display_byte(b),
                        )));
                    };
                    let acc = acc << 4 | d;
                    if digits + 1 < 4 {
                        EscapeState::PairHex {
                            high,
                            digits: digits + 1,
                            acc,
                        }
                    } else if escape::is_low_surrogate(acc) {
                        self.append_str_char(escape::combine_surrogates(high, acc))?;
                        EscapeState::None
                    } else {
                        return Err(self.err(format!(
                            "Incompatible surrogate pair: first part 0x{high:04X}, second part 0x{acc:04X}"
                        )));
                    }
                }
                EscapeState::None => unreachable!(),
            };
            self.scan = Scan::Str(next);
        }
    }

    fn split_surrogate(&self, high: u16, got: u8) -> Error {
        self.err(format!(
            "Split surrogate on decode: first part (0x{high:04X}) not followed by a low-surrogate escape, but {}",
            display_byte(got),
        ))
    }

    fn append_str_chunk(&mut self, chunk: &[u8]) -> Result<()> {
        let chars = chunk.iter().filter(|b| (**b & 0xC0) != 0x80).count();
        self.bump_str_chars(chars)?;
        self.str_bytes.extend_from_slice(chunk);
        Ok(())
    }

    fn append_str_char(&mut self, c: char) -> Result<()> {
        self.bump_str_chars(1)?;
        let mut buf = [0u8; 4];
        self.str_bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
        Ok(())
    }

    fn bump_str_chars(&mut self, n: usize) -> Result<()> {
        self.str_chars += n;
        self.cfg
            .constraints
            .check_string_length(self.str_chars, &self.current_location())
    }

    fn finish_string(&mut self) -> Result<Step> {
        let bytes = std::mem::take(&mut self.str_bytes);
        let text = String::from_utf8(bytes).map_err(|e| {
            self.err(format!(
                "Invalid UTF-8 content in a String value: {}",
                e.utf8_error()
            ))
        })?;
        self.text = text;
        self.scan = Scan::None;
        self.complete_string()
    }

    fn complete_string(&mut self) -> Result<Step> {
        match self.scan_site {
            State::ObjectIdName => {
                if self.text != ID_PROPERTY_NAME {
                    let shown = self.cfg.error_config.excerpt(&self.text).into_owned();
                    return Err(self.err_with_pointer(format_args!(
                        "Expected the identity property name ('{ID_PROPERTY_NAME}') as the first Object property: got \"{shown}\""
                    )));
                }
                self.set_name(ID_PROPERTY_NAME)?;
                self.state = State::ObjectIdColon;
                self.current = Some(TokenKind::IdPropertyName);
                Ok(Step::Token(TokenKind::IdPropertyName))
            }
            State::ObjectName => {
                let canonical = match self.symbols.resolve(&self.text) {
                    Ok(name) => name,
                    Err(overflow) => {
                        return Err(Error::constraint(
                            format!(
                                "Too many property-name hash collisions ({}) in the symbol table: possible denial-of-service attack",
                                overflow.chain_length
                            ),
                            self.current_location(),
                        ));
                    }
                };
                self.set_name(&canonical)?;
                self.context.advance();
                self.state = State::ObjectColon;
                self.current = Some(TokenKind::PropertyName);
                Ok(Step::Token(TokenKind::PropertyName))
            }
            State::ObjectIdValue => {
                if self.text.is_empty() {
                    return Err(self.err_with_pointer(format_args!(
                        "The value of the identity property '{ID_PROPERTY_NAME}' must be a non-empty String"
                    )));
                }
                self.state = State::ObjectEntryOrEnd;
                self.current = Some(TokenKind::ValueString);
                Ok(Step::Token(TokenKind::ValueString))
            }
            State::ArrayId => {
                self.state = State::ArrayEntryOrEnd;
                self.current = Some(TokenKind::ValueString);
                Ok(Step::Token(TokenKind::ValueString))
            }
            site => {
                self.finish_value_site(site);
                self.current = Some(TokenKind::ValueString);
                Ok(Step::Token(TokenKind::ValueString))
            }
        }
    }

    fn set_name(&mut self, name: &str) -> Result<()> {
        self.context.set_current_name(name).map_err(|dup| {
            self.err_with_pointer(format_args!("Duplicate Object property \"{}\"", dup.0))
        })
    }

    /// State transition after a plain scalar value completes. The current
    /// property name is left in place so the pointer at the value token
    /// still names the entry; the next property name overwrites it.
    fn finish_value_site(&mut self, site: State) {
        match site {
            State::RootValue => self.state = State::RootValue,
            State::ObjectValue => self.state = State::ObjectEntryOrEnd,
            State::ArrayValue => self.state = State::ArrayEntryOrEnd,
            _ => unreachable!("scalar completed in non-value state"),
        }
    }

    fn drive_number(&mut self, feed: &mut Feed) -> Result<Option<Step>> {
        loop {
            let phase = match self.scan {
                Scan::Num(phase) => phase,
                _ => unreachable!(),
            };
            let b = match self.peek(feed) {
                Some(b) => b,
                None => {
                    if self.end_of_input {
                        return self.finish_number_if_terminal(phase).map(Some);
                    }
                    return Ok(None);
                }
            };

            let next = match phase {
                NumPhase::Start => match b {
                    b'-' => NumPhase::Minus,
                    b'0' => NumPhase::IntZero,
                    b'1'..=b'9' => NumPhase::Int,
                    _ => unreachable!("number scan begun on a non-number byte"),
                },
                NumPhase::Minus => match b {
                    b'0' => NumPhase::IntZero,
                    b'1'..=b'9' => NumPhase::Int,
                    _ => {
                        self.take(feed);
                        return Err(self.err(format!(
                            "Invalid numeric value: expected a digit after the minus sign, got {}",
                            display_byte(b),
                        )));
                    }
                },
                NumPhase::IntZero => match b {
                    b'0'..=b'9' => {
                        if !self
                            .cfg
                            .format_features
                            .is_enabled(CirJsonReadFeature::AllowLeadingZeros)
                        {
                            self.take(feed);
                            return Err(self.err(
                                "Invalid numeric value: leading zeroes not allowed",
                            ));
                        }
                        if b == b'0' {
                            NumPhase::IntZero
                        } else {
                            NumPhase::Int
                        }
                    }
                    b'.' => NumPhase::FracDot,
                    b'e' | b'E' => NumPhase::ExpLetter,
                    _ => return self.finish_number().map(Some),
                },
                NumPhase::Int => match b {
                    b'0'..=b'9' => NumPhase::Int,
                    b'.' => NumPhase::FracDot,
                    b'e' | b'E' => NumPhase::ExpLetter,
                    _ => return self.finish_number().map(Some),
                },
                NumPhase::FracDot => match b {
                    b'0'..=b'9' => NumPhase::Frac,
                    _ => {
                        self.take(feed);
                        return Err(self.err(format!(
                            "Invalid numeric value: expected a digit in the fraction, got {}",
                            display_byte(b),
                        )));
                    }
                },
                NumPhase::Frac => match b {
                    b'0'..=b'9' => NumPhase::Frac,
                    b'e' | b'E' => NumPhase::ExpLetter,
                    _ => return self.finish_number().map(Some),
                },
                NumPhase::ExpLetter => match b {
                    b'+' | b'-' => NumPhase::ExpSign,
                    b'0'..=b'9' => NumPhase::Exp,
                    _ => {
                        self.take(feed);
                        return Err(self.err(format!(
                            "Invalid numeric value: expected a digit or sign in the exponent, got {}",
                            display_byte(b),
                        )));
                    }
                },
                NumPhase::ExpSign => match b {
                    b'0'..=b'9' => NumPhase::Exp,
                    _ => {
                        self.take(feed);
                        return Err(self.err(format!(
                            "Invalid numeric value: expected a digit in the exponent, got {}",
                            display_byte(b),
                        )));
                    }
                },
                NumPhase::Exp => match b {
                    b'0'..=b'9' => NumPhase::Exp,
                    _ => return self.finish_number().map(Some),
                },
            };

            self.take(feed);
            if matches!(b, b'.' | b'e' | b'E') {
                self.num_is_float = true;
            }
            self.num_raw.push(b as char);
            self.cfg
                .constraints
                .check_number_length(self.num_raw.len(), &self.current_location())?;
            self.scan = Scan::Num(next);
        }
    }

    fn finish_number_if_terminal(&mut self, phase: NumPhase) -> Result<Step> {
        match phase {
            NumPhase::IntZero | NumPhase::Int | NumPhase::Frac | NumPhase::Exp => {
                self.finish_number()
            }
            _ => Err(self.err("Unexpected end-of-input in a numeric value")),
        }
    }

    fn finish_number(&mut self) -> Result<Step> {
        self.scan = Scan::None;
        let site = self.scan_site;
        let kind = if self.num_is_float {
            // Conversion is deferred until a typed accessor asks for it.
            TokenKind::ValueNumberFloat
        } else {
            let value = num::parse_integral(&self.num_raw)
                .map_err(|e| self.err(format!("Invalid numeric value: {e}")))?;
            self.number = Some(value);
            TokenKind::ValueNumberInt
        };
        self.finish_value_site(site);
        self.current = Some(kind);
        Ok(Step::Token(kind))
    }

    fn drive_literal(&mut self, feed: &mut Feed) -> Result<Option<Step>> {
        loop {
            let (kind, matched) = match self.scan {
                Scan::Lit { kind, matched } => (kind, matched),
                _ => unreachable!(),
            };
            let expect = kind.as_bytes().expect("literal kinds have canonical bytes");
            if matched == expect.len() {
                self.scan = Scan::None;
                let site = self.scan_site;
                self.finish_value_site(site);
                self.current = Some(kind);
                return Ok(Some(Step::Token(kind)));
            }
            let Some(b) = self.peek(feed) else {
                if self.end_of_input {
                    return Err(self.unrecognized_token(expect, matched));
                }
                return Ok(None);
            };
            if b != expect[matched] {
                self.take(feed);
                return Err(self.unrecognized_token(expect, matched));
            }
            self.take(feed);
            self.scan = Scan::Lit {
                kind,
                matched: matched + 1,
            };
        }
    }

    fn unrecognized_token(&self, expect: &[u8], matched: usize) -> Error {
        let prefix = std::str::from_utf8(&expect[..matched]).unwrap_or_default();
        self.err(format!(
            "Unrecognized token starting with '{prefix}': was expecting 'true', 'false' or 'null'"
        ))
    }
}

fn display_byte(b: u8) -> String {
    if (0x20..0x7F).contains(&b) {
        format!("('{}' (code {b}))", b as char)
    } else {
        format!("(code {b})")
    }
}
