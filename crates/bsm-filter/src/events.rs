//! An event-based, single-pass JSON reader.
//!
//! The reader walks the input once and hands each structural token to an
//! [`EventSink`] as it is recognized. Strings are delivered as the raw slice
//! between the quotes (escapes validated but not decoded) and numbers as the
//! raw slice of the literal, so a sink can reproduce the input byte for byte.
//!
//! Every callback returns a `bool`; returning `false` asks the reader to
//! stop immediately. The reader reports that as [`ReadOutcome::Aborted`],
//! leaving the rest of the input unconsumed. Syntax problems surface as
//! [`ParseError`] with the byte offset where they were found.

use thiserror::Error;

/// Recursion guard: objects/arrays deeper than this fail the parse.
const MAX_DEPTH: usize = 128;

/// Receiver for the reader's token stream.
pub trait EventSink {
    fn start_object(&mut self) -> bool;
    /// `members` is the number of key/value pairs the object held.
    fn end_object(&mut self, members: usize) -> bool;
    fn start_array(&mut self) -> bool;
    /// `items` is the number of elements the array held.
    fn end_array(&mut self, items: usize) -> bool;
    fn key(&mut self, key: &str) -> bool;
    fn string_value(&mut self, raw: &str) -> bool;
    fn number_value(&mut self, raw: &str) -> bool;
    fn bool_value(&mut self, value: bool) -> bool;
    fn null_value(&mut self) -> bool;
}

/// How a read finished when no syntax error was hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// The document parsed to the end.
    Complete,
    /// A sink callback returned false and the reader stopped early.
    Aborted,
}

/// A syntax error, positioned by byte offset into the input.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("unexpected end of input at byte {0}")]
    UnexpectedEnd(usize),

    #[error("unexpected character {found:?} at byte {at}")]
    UnexpectedChar { found: char, at: usize },

    #[error("invalid escape sequence at byte {0}")]
    InvalidEscape(usize),

    #[error("unescaped control character in string at byte {0}")]
    ControlCharacter(usize),

    #[error("invalid number at byte {0}")]
    InvalidNumber(usize),

    #[error("invalid literal at byte {0}")]
    InvalidLiteral(usize),

    #[error("trailing characters after document at byte {0}")]
    TrailingCharacters(usize),

    #[error("nesting deeper than {MAX_DEPTH} at byte {0}")]
    TooDeep(usize),
}

/// The reader itself; one instance per document.
pub struct JsonReader<'a> {
    input: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> JsonReader<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            bytes: input.as_bytes(),
            pos: 0,
        }
    }

    /// Byte offset of the next unread input byte.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Parse one complete JSON value covering the whole input.
    pub fn read_document(&mut self, sink: &mut dyn EventSink) -> Result<ReadOutcome, ParseError> {
        self.skip_ws();
        if !self.read_value(sink, 0)? {
            return Ok(ReadOutcome::Aborted);
        }
        self.skip_ws();
        if self.pos != self.bytes.len() {
            return Err(ParseError::TrailingCharacters(self.pos));
        }
        Ok(ReadOutcome::Complete)
    }

    fn skip_ws(&mut self) {
        while let Some(&b) = self.bytes.get(self.pos) {
            match b {
                b' ' | b'\t' | b'\n' | b'\r' => self.pos += 1,
                _ => break,
            }
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn unexpected(&self) -> ParseError {
        match self.input[self.pos..].chars().next() {
            Some(c) => ParseError::UnexpectedChar {
                found: c,
                at: self.pos,
            },
            None => ParseError::UnexpectedEnd(self.pos),
        }
    }

    /// Returns false when the sink asked to stop.
    fn read_value(&mut self, sink: &mut dyn EventSink, depth: usize) -> Result<bool, ParseError> {
        if depth > MAX_DEPTH {
            return Err(ParseError::TooDeep(self.pos));
        }
        match self.peek() {
            Some(b'{') => self.read_object(sink, depth),
            Some(b'[') => self.read_array(sink, depth),
            Some(b'"') => {
                let raw = self.read_string()?;
                Ok(sink.string_value(raw))
            }
            Some(b't') => {
                self.expect_literal("true")?;
                Ok(sink.bool_value(true))
            }
            Some(b'f') => {
                self.expect_literal("false")?;
                Ok(sink.bool_value(false))
            }
            Some(b'n') => {
                self.expect_literal("null")?;
                Ok(sink.null_value())
            }
            Some(b'-') | Some(b'0'..=b'9') => {
                let raw = self.read_number()?;
                Ok(sink.number_value(raw))
            }
            _ => Err(self.unexpected()),
        }
    }

    fn read_object(&mut self, sink: &mut dyn EventSink, depth: usize) -> Result<bool, ParseError> {
        self.pos += 1; // consume '{'
        if !sink.start_object() {
            return Ok(false);
        }
        self.skip_ws();
        if self.peek() == Some(b'}') {
            self.pos += 1;
            return Ok(sink.end_object(0));
        }

        let mut members = 0;
        loop {
            self.skip_ws();
            if self.peek() != Some(b'"') {
                return Err(self.unexpected());
            }
            let key = self.read_string()?;
            if !sink.key(key) {
                return Ok(false);
            }
            self.skip_ws();
            if self.peek() != Some(b':') {
                return Err(self.unexpected());
            }
            self.pos += 1;
            self.skip_ws();
            if !self.read_value(sink, depth + 1)? {
                return Ok(false);
            }
            members += 1;
            self.skip_ws();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b'}') => {
                    self.pos += 1;
                    return Ok(sink.end_object(members));
                }
                _ => return Err(self.unexpected()),
            }
        }
    }

    fn read_array(&mut self, sink: &mut dyn EventSink, depth: usize) -> Result<bool, ParseError> {
        self.pos += 1; // consume '['
        if !sink.start_array() {
            return Ok(false);
        }
        self.skip_ws();
        if self.peek() == Some(b']') {
            self.pos += 1;
            return Ok(sink.end_array(0));
        }

        let mut items = 0;
        loop {
            self.skip_ws();
            if !self.read_value(sink, depth + 1)? {
                return Ok(false);
            }
            items += 1;
            self.skip_ws();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b']') => {
                    self.pos += 1;
                    return Ok(sink.end_array(items));
                }
                _ => return Err(self.unexpected()),
            }
        }
    }

    /// Scan a string literal; returns the raw contents without the quotes.
    fn read_string(&mut self) -> Result<&'a str, ParseError> {
        self.pos += 1; // consume '"'
        let start = self.pos;
        loop {
            match self.peek() {
                None => return Err(ParseError::UnexpectedEnd(self.pos)),
                Some(b'"') => {
                    let raw = &self.input[start..self.pos];
                    self.pos += 1;
                    return Ok(raw);
                }
                Some(b'\\') => {
                    self.pos += 1;
                    match self.peek() {
                        Some(b'"') | Some(b'\\') | Some(b'/') | Some(b'b') | Some(b'f')
                        | Some(b'n') | Some(b'r') | Some(b't') => self.pos += 1,
                        Some(b'u') => {
                            self.pos += 1;
                            for _ in 0..4 {
                                match self.peek() {
                                    Some(b) if b.is_ascii_hexdigit() => self.pos += 1,
                                    _ => return Err(ParseError::InvalidEscape(self.pos)),
                                }
                            }
                        }
                        _ => return Err(ParseError::InvalidEscape(self.pos)),
                    }
                }
                Some(b) if b < 0x20 => return Err(ParseError::ControlCharacter(self.pos)),
                Some(_) => self.pos += 1,
            }
        }
    }

    /// Scan a number literal; returns the raw slice.
    fn read_number(&mut self) -> Result<&'a str, ParseError> {
        let start = self.pos;
        if self.peek() == Some(b'-') {
            self.pos += 1;
        }
        match self.peek() {
            Some(b'0') => self.pos += 1,
            Some(b'1'..=b'9') => self.eat_digits(),
            _ => return Err(ParseError::InvalidNumber(self.pos)),
        }
        if self.peek() == Some(b'.') {
            self.pos += 1;
            match self.peek() {
                Some(b'0'..=b'9') => self.eat_digits(),
                _ => return Err(ParseError::InvalidNumber(self.pos)),
            }
        }
        if matches!(self.peek(), Some(b'e') | Some(b'E')) {
            self.pos += 1;
            if matches!(self.peek(), Some(b'+') | Some(b'-')) {
                self.pos += 1;
            }
            match self.peek() {
                Some(b'0'..=b'9') => self.eat_digits(),
                _ => return Err(ParseError::InvalidNumber(self.pos)),
            }
        }
        Ok(&self.input[start..self.pos])
    }

    fn eat_digits(&mut self) {
        while matches!(self.peek(), Some(b'0'..=b'9')) {
            self.pos += 1;
        }
    }

    fn expect_literal(&mut self, literal: &str) -> Result<(), ParseError> {
        if self.input[self.pos..].starts_with(literal) {
            self.pos += literal.len();
            Ok(())
        } else {
            Err(ParseError::InvalidLiteral(self.pos))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Records the event stream as readable strings; optionally stops after
    /// a fixed number of events.
    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
        stop_after: Option<usize>,
    }

    impl Recorder {
        fn push(&mut self, event: String) -> bool {
            self.events.push(event);
            match self.stop_after {
                Some(n) => self.events.len() < n,
                None => true,
            }
        }
    }

    impl EventSink for Recorder {
        fn start_object(&mut self) -> bool {
            self.push("{".into())
        }
        fn end_object(&mut self, members: usize) -> bool {
            self.push(format!("}}{members}"))
        }
        fn start_array(&mut self) -> bool {
            self.push("[".into())
        }
        fn end_array(&mut self, items: usize) -> bool {
            self.push(format!("]{items}"))
        }
        fn key(&mut self, key: &str) -> bool {
            self.push(format!("k:{key}"))
        }
        fn string_value(&mut self, raw: &str) -> bool {
            self.push(format!("s:{raw}"))
        }
        fn number_value(&mut self, raw: &str) -> bool {
            self.push(format!("n:{raw}"))
        }
        fn bool_value(&mut self, value: bool) -> bool {
            self.push(format!("b:{value}"))
        }
        fn null_value(&mut self) -> bool {
            self.push("null".into())
        }
    }

    fn events_of(input: &str) -> Vec<String> {
        let mut sink = Recorder::default();
        let outcome = JsonReader::new(input).read_document(&mut sink).unwrap();
        assert_eq!(outcome, ReadOutcome::Complete);
        sink.events
    }

    #[test]
    fn test_scalar_documents() {
        assert_eq!(events_of("42"), ["n:42"]);
        assert_eq!(events_of("\"hi\""), ["s:hi"]);
        assert_eq!(events_of("true"), ["b:true"]);
        assert_eq!(events_of("null"), ["null"]);
        assert_eq!(events_of("-1.5e-3"), ["n:-1.5e-3"]);
    }

    #[test]
    fn test_object_event_stream() {
        let events = events_of(r#"{"a":1,"b":{"c":"x"},"d":[true,null]}"#);
        assert_eq!(
            events,
            [
                "{", "k:a", "n:1", "k:b", "{", "k:c", "s:x", "}1", "k:d", "[", "b:true", "null",
                "]2", "}3"
            ]
        );
    }

    #[test]
    fn test_member_counts() {
        assert_eq!(events_of("{}"), ["{", "}0"]);
        assert_eq!(events_of("[]"), ["[", "]0"]);
        assert_eq!(
            events_of(r#"[{},{},{}]"#),
            ["[", "{", "}0", "{", "}0", "{", "}0", "]3"]
        );
    }

    #[test]
    fn test_whitespace_tolerated() {
        let events = events_of(" { \"a\" :\t1 ,\n\"b\" : [ 2 , 3 ] } ");
        assert_eq!(events, ["{", "k:a", "n:1", "k:b", "[", "n:2", "n:3", "]2", "}2"]);
    }

    #[test]
    fn test_raw_slices_preserved() {
        // Trailing zeros and escapes come through untouched.
        let events = events_of(r#"{"speed":22.00,"note":"a\nbé"}"#);
        assert_eq!(events, ["{", "k:speed", "n:22.00", "k:note", r"s:a\nbé", "}2"]);
    }

    #[test]
    fn test_malformed_documents() {
        for bad in [
            "",
            "kasjdflajsl\":dfjsl",
            "{:{},{:},{{},:}}",
            "{\u{0}\u{1}\u{3}}",
            "{\"a\":}",
            "{\"a\":1",
            "[1,]",
            "{\"a\" 1}",
            "01",
            "1.",
            "1e",
            "\"unterminated",
            "\"bad\\escape\"? no",
        ] {
            let mut sink = Recorder::default();
            let result = JsonReader::new(bad).read_document(&mut sink);
            assert!(result.is_err(), "{bad:?} parsed as {result:?}");
        }
    }

    #[test]
    fn test_trailing_garbage_rejected() {
        let mut sink = Recorder::default();
        let err = JsonReader::new("{} {}").read_document(&mut sink).unwrap_err();
        assert_eq!(err, ParseError::TrailingCharacters(3));
    }

    #[test]
    fn test_abort_stops_reader() {
        let mut sink = Recorder {
            stop_after: Some(3),
            ..Default::default()
        };
        let mut reader = JsonReader::new(r#"{"a":1,"b":2}"#);
        let outcome = reader.read_document(&mut sink).unwrap();
        assert_eq!(outcome, ReadOutcome::Aborted);
        assert_eq!(sink.events, ["{", "k:a", "n:1"]);
        // The reader stopped right after the aborting token.
        assert!(reader.position() < r#"{"a":1,"b":2}"#.len());
    }

    #[test]
    fn test_depth_guard() {
        let deep = "[".repeat(200) + &"]".repeat(200);
        let mut sink = Recorder::default();
        let err = JsonReader::new(&deep).read_document(&mut sink).unwrap_err();
        assert!(matches!(err, ParseError::TooDeep(_)));
    }
}
