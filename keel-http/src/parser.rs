use crate::constants;
use bytes::Bytes;
use std::fmt;

/// Callbacks emitted by [`Http1Parser::execute`].
///
/// Slices are shared views into the fed buffer. A url, header field or
/// header value that spans multiple feeds is delivered as multiple calls;
/// the caller merges them.
pub trait ParseEvents {
    fn on_message_begin(&mut self);
    fn on_url(&mut self, data: Bytes);
    fn on_header_field(&mut self, data: Bytes);
    fn on_header_value(&mut self, data: Bytes);
    fn on_headers_complete(&mut self);
    fn on_body(&mut self, data: Bytes);
    fn on_message_complete(&mut self);
}

/// How much of the fed buffer a call to `execute` consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Consumed {
    /// The whole buffer was consumed.
    All,
    /// A message completed mid-buffer; the remainder starting at the given
    /// offset belongs to the next pipelined request and was not consumed.
    Pipelined(usize),
}

/// Invalid HTTP framing, distinct from "not enough bytes yet".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    InvalidMethod,
    InvalidRequestLine,
    InvalidVersion,
    InvalidHeader,
    InvalidContentLength,
    InvalidChunkSize,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ParseError::InvalidMethod => "invalid request method",
            ParseError::InvalidRequestLine => "invalid request line",
            ParseError::InvalidVersion => "invalid http version",
            ParseError::InvalidHeader => "invalid header line",
            ParseError::InvalidContentLength => "invalid content-length value",
            ParseError::InvalidChunkSize => "invalid chunk size",
        };
        f.write_str(text)
    }
}

impl std::error::Error for ParseError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Method,
    BeforeUrl,
    Url,
    VersionLiteral(u8),
    VersionMajor,
    VersionDot,
    VersionMinor,
    RequestLineEnd,
    RequestLineAlmostDone,
    HeaderStart,
    HeaderField,
    HeaderValueStart,
    HeaderValue,
    HeaderAlmostDone,
    HeadersAlmostDone,
    Body,
    ChunkSize,
    ChunkExtension,
    ChunkSizeAlmostDone,
    ChunkData,
    ChunkDataAlmostDone,
    ChunkDataDone,
    TrailerStart,
    TrailerLine,
    TrailerAlmostDone,
    FinalAlmostDone,
    MessageComplete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Probe {
    Pending,
    ContentLength,
    TransferEncoding,
    NotInteresting,
}

const MAX_METHOD_LEN: usize = 32;
const MAX_PROBE_LEN: usize = 256;

fn is_method_byte(b: u8) -> bool {
    b.is_ascii_uppercase() || b == b'-'
}

fn is_field_byte(b: u8) -> bool {
    b > 32 && b != 127 && b != b':'
}

fn hex_digit(b: u8) -> Option<u64> {
    match b {
        b'0'..=b'9' => Some((b - b'0') as u64),
        b'a'..=b'f' => Some((b - b'a' + 10) as u64),
        b'A'..=b'F' => Some((b - b'A' + 10) as u64),
        _ => None,
    }
}

/// Byte-fed incremental HTTP/1.x request parser.
///
/// Feed buffers with [`execute`](Http1Parser::execute); the parser emits
/// [`ParseEvents`] callbacks as it advances. Body framing follows HTTP/1.1
/// rules: `Content-Length` when present, else `Transfer-Encoding: chunked`
/// (chunks are decoded and surfaced via `on_body`), else no body.
///
/// After a message completes the parser must be [`reset`](Http1Parser::reset)
/// before the next request.
pub struct Http1Parser {
    state: State,
    http_major: u8,
    http_minor: u8,
    method: Vec<u8>,
    content_length: Option<u64>,
    chunked: bool,
    body_remaining: u64,
    chunk_size: u64,
    chunk_size_seen: bool,
    probe: Probe,
    field_probe: Vec<u8>,
    value_probe: Vec<u8>,
}

impl Http1Parser {
    pub fn new() -> Self {
        Self {
            state: State::Idle,
            http_major: 0,
            http_minor: 0,
            method: Vec::with_capacity(8),
            content_length: None,
            chunked: false,
            body_remaining: 0,
            chunk_size: 0,
            chunk_size_seen: false,
            probe: Probe::NotInteresting,
            field_probe: Vec::with_capacity(24),
            value_probe: Vec::with_capacity(24),
        }
    }

    /// Reset for the next request, keeping allocations.
    pub fn reset(&mut self) {
        self.state = State::Idle;
        self.http_major = 0;
        self.http_minor = 0;
        self.method.clear();
        self.content_length = None;
        self.chunked = false;
        self.body_remaining = 0;
        self.chunk_size = 0;
        self.chunk_size_seen = false;
        self.probe = Probe::NotInteresting;
        self.field_probe.clear();
        self.value_probe.clear();
    }

    /// The request method, available once the request line was parsed.
    pub fn method(&self) -> Bytes {
        Bytes::copy_from_slice(&self.method)
    }

    /// The version string for supported versions, empty otherwise.
    pub fn version(&self) -> Bytes {
        if self.http_major == 1 {
            let text = match self.http_minor {
                0 => constants::HTTP_10,
                1 => constants::HTTP_11,
                2 => constants::HTTP_12,
                _ => return Bytes::new(),
            };
            return Bytes::from_static(text.as_bytes());
        }
        Bytes::new()
    }

    pub fn http_major(&self) -> u8 {
        self.http_major
    }

    pub fn http_minor(&self) -> u8 {
        self.http_minor
    }

    /// Declared `Content-Length`, when one was seen.
    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    /// Whether the current message uses chunked transfer encoding.
    pub fn is_chunked(&self) -> bool {
        self.chunked
    }

    pub fn is_message_complete(&self) -> bool {
        self.state == State::MessageComplete
    }

    fn finish_field_probe(&mut self) {
        self.probe = if self.field_probe == b"content-length" {
            Probe::ContentLength
        } else if self.field_probe == b"transfer-encoding" {
            Probe::TransferEncoding
        } else {
            Probe::NotInteresting
        };
        self.value_probe.clear();
    }

    fn commit_value_probe(&mut self) -> Result<(), ParseError> {
        match self.probe {
            Probe::ContentLength => {
                let text = self.value_probe.as_slice();
                let start = text
                    .iter()
                    .position(|b| !b.is_ascii_whitespace())
                    .unwrap_or(text.len());
                let end = text
                    .iter()
                    .rposition(|b| !b.is_ascii_whitespace())
                    .map_or(start, |last| last + 1);
                let trimmed = &text[start..end];
                if trimmed.is_empty() || !trimmed.iter().all(u8::is_ascii_digit) {
                    return Err(ParseError::InvalidContentLength);
                }
                let mut value: u64 = 0;
                for &b in trimmed {
                    value = value
                        .checked_mul(10)
                        .and_then(|v| v.checked_add((b - b'0') as u64))
                        .ok_or(ParseError::InvalidContentLength)?;
                }
                self.content_length = Some(value);
            }
            Probe::TransferEncoding => {
                let lowered: Vec<u8> = self
                    .value_probe
                    .iter()
                    .map(u8::to_ascii_lowercase)
                    .collect();
                if lowered
                    .windows(constants::CHUNKED.len())
                    .any(|w| w == constants::CHUNKED.as_bytes())
                {
                    self.chunked = true;
                }
            }
            _ => {}
        }
        self.probe = Probe::NotInteresting;
        Ok(())
    }

    /// Feed bytes into the parser.
    ///
    /// Returns [`Consumed::Pipelined`] when a message completed and more
    /// bytes (the next pipelined request) remain unconsumed.
    pub fn execute(
        &mut self,
        events: &mut impl ParseEvents,
        buf: &Bytes,
    ) -> Result<Consumed, ParseError> {
        let bytes = buf.as_ref();
        let len = bytes.len();
        let mut i = 0usize;
        let mut mark: Option<usize> = match self.state {
            State::Url | State::HeaderField | State::HeaderValue => Some(0),
            _ => None,
        };
        while i < len {
            let b = bytes[i];
            match self.state {
                State::Idle => {
                    if b == b'\r' || b == b'\n' {
                        // tolerate blank lines before the request line
                        i += 1;
                        continue;
                    }
                    if !is_method_byte(b) {
                        return Err(ParseError::InvalidMethod);
                    }
                    events.on_message_begin();
                    self.state = State::Method;
                }
                State::Method => {
                    if b == b' ' {
                        if self.method.is_empty() {
                            return Err(ParseError::InvalidMethod);
                        }
                        self.state = State::BeforeUrl;
                    } else if is_method_byte(b) {
                        if self.method.len() >= MAX_METHOD_LEN {
                            return Err(ParseError::InvalidMethod);
                        }
                        self.method.push(b);
                    } else {
                        return Err(ParseError::InvalidMethod);
                    }
                    i += 1;
                }
                State::BeforeUrl => {
                    if b == b' ' {
                        i += 1;
                    } else if b == b'\r' || b == b'\n' {
                        return Err(ParseError::InvalidRequestLine);
                    } else {
                        self.state = State::Url;
                        mark = Some(i);
                    }
                }
                State::Url => {
                    if b == b' ' {
                        let start = mark.take().unwrap_or(i);
                        events.on_url(buf.slice(start..i));
                        self.state = State::VersionLiteral(0);
                        i += 1;
                    } else if b == b'\r' || b == b'\n' {
                        return Err(ParseError::InvalidRequestLine);
                    } else {
                        i += 1;
                    }
                }
                State::VersionLiteral(progress) => {
                    const LITERAL: &[u8; 5] = b"HTTP/";
                    if b != LITERAL[progress as usize] {
                        return Err(ParseError::InvalidVersion);
                    }
                    self.state = if progress == 4 {
                        State::VersionMajor
                    } else {
                        State::VersionLiteral(progress + 1)
                    };
                    i += 1;
                }
                State::VersionMajor => {
                    if !b.is_ascii_digit() {
                        return Err(ParseError::InvalidVersion);
                    }
                    self.http_major = b - b'0';
                    self.state = State::VersionDot;
                    i += 1;
                }
                State::VersionDot => {
                    if b != b'.' {
                        return Err(ParseError::InvalidVersion);
                    }
                    self.state = State::VersionMinor;
                    i += 1;
                }
                State::VersionMinor => {
                    if !b.is_ascii_digit() {
                        return Err(ParseError::InvalidVersion);
                    }
                    self.http_minor = b - b'0';
                    self.state = State::RequestLineEnd;
                    i += 1;
                }
                State::RequestLineEnd => {
                    if b != b'\r' {
                        return Err(ParseError::InvalidRequestLine);
                    }
                    self.state = State::RequestLineAlmostDone;
                    i += 1;
                }
                State::RequestLineAlmostDone => {
                    if b != b'\n' {
                        return Err(ParseError::InvalidRequestLine);
                    }
                    self.state = State::HeaderStart;
                    i += 1;
                }
                State::HeaderStart => {
                    if b == b'\r' {
                        self.state = State::HeadersAlmostDone;
                        i += 1;
                    } else if is_field_byte(b) {
                        self.state = State::HeaderField;
                        self.field_probe.clear();
                        mark = Some(i);
                    } else {
                        return Err(ParseError::InvalidHeader);
                    }
                }
                State::HeaderField => {
                    if b == b':' {
                        let start = mark.take().unwrap_or(i);
                        events.on_header_field(buf.slice(start..i));
                        self.finish_field_probe();
                        self.state = State::HeaderValueStart;
                        i += 1;
                    } else if is_field_byte(b) {
                        if self.field_probe.len() < MAX_PROBE_LEN {
                            self.field_probe.push(b.to_ascii_lowercase());
                        }
                        i += 1;
                    } else {
                        return Err(ParseError::InvalidHeader);
                    }
                }
                State::HeaderValueStart => {
                    if b == b' ' || b == b'\t' {
                        i += 1;
                    } else if b == b'\r' {
                        events.on_header_value(Bytes::new());
                        self.commit_value_probe()?;
                        self.state = State::HeaderAlmostDone;
                        i += 1;
                    } else if b == b'\n' {
                        return Err(ParseError::InvalidHeader);
                    } else {
                        self.state = State::HeaderValue;
                        mark = Some(i);
                    }
                }
                State::HeaderValue => {
                    if b == b'\r' {
                        let start = mark.take().unwrap_or(i);
                        events.on_header_value(buf.slice(start..i));
                        self.commit_value_probe()?;
                        self.state = State::HeaderAlmostDone;
                        i += 1;
                    } else if b == b'\n' {
                        return Err(ParseError::InvalidHeader);
                    } else {
                        if self.probe != Probe::NotInteresting
                            && self.value_probe.len() < MAX_PROBE_LEN
                        {
                            self.value_probe.push(b);
                        }
                        i += 1;
                    }
                }
                State::HeaderAlmostDone => {
                    if b != b'\n' {
                        return Err(ParseError::InvalidHeader);
                    }
                    self.state = State::HeaderStart;
                    i += 1;
                }
                State::HeadersAlmostDone => {
                    if b != b'\n' {
                        return Err(ParseError::InvalidHeader);
                    }
                    i += 1;
                    events.on_headers_complete();
                    if self.chunked {
                        self.chunk_size = 0;
                        self.chunk_size_seen = false;
                        self.state = State::ChunkSize;
                    } else if let Some(remaining) =
                        self.content_length.filter(|&n| n > 0)
                    {
                        self.body_remaining = remaining;
                        self.state = State::Body;
                    } else {
                        events.on_message_complete();
                        self.state = State::MessageComplete;
                        if i < len {
                            return Ok(Consumed::Pipelined(i));
                        }
                    }
                }
                State::Body => {
                    let take = self.body_remaining.min((len - i) as u64) as usize;
                    events.on_body(buf.slice(i..i + take));
                    i += take;
                    self.body_remaining -= take as u64;
                    if self.body_remaining == 0 {
                        events.on_message_complete();
                        self.state = State::MessageComplete;
                        if i < len {
                            return Ok(Consumed::Pipelined(i));
                        }
                    }
                }
                State::ChunkSize => {
                    if let Some(digit) = hex_digit(b) {
                        self.chunk_size = self
                            .chunk_size
                            .checked_mul(16)
                            .and_then(|v| v.checked_add(digit))
                            .ok_or(ParseError::InvalidChunkSize)?;
                        self.chunk_size_seen = true;
                        i += 1;
                    } else if b == b';' && self.chunk_size_seen {
                        self.state = State::ChunkExtension;
                        i += 1;
                    } else if b == b'\r' && self.chunk_size_seen {
                        self.state = State::ChunkSizeAlmostDone;
                        i += 1;
                    } else {
                        return Err(ParseError::InvalidChunkSize);
                    }
                }
                State::ChunkExtension => {
                    // chunk extensions are ignored
                    if b == b'\r' {
                        self.state = State::ChunkSizeAlmostDone;
                    } else if b == b'\n' {
                        return Err(ParseError::InvalidChunkSize);
                    }
                    i += 1;
                }
                State::ChunkSizeAlmostDone => {
                    if b != b'\n' {
                        return Err(ParseError::InvalidChunkSize);
                    }
                    if self.chunk_size == 0 {
                        self.state = State::TrailerStart;
                    } else {
                        self.body_remaining = self.chunk_size;
                        self.state = State::ChunkData;
                    }
                    i += 1;
                }
                State::ChunkData => {
                    let take = self.body_remaining.min((len - i) as u64) as usize;
                    events.on_body(buf.slice(i..i + take));
                    i += take;
                    self.body_remaining -= take as u64;
                    if self.body_remaining == 0 {
                        self.state = State::ChunkDataAlmostDone;
                    }
                }
                State::ChunkDataAlmostDone => {
                    if b != b'\r' {
                        return Err(ParseError::InvalidChunkSize);
                    }
                    self.state = State::ChunkDataDone;
                    i += 1;
                }
                State::ChunkDataDone => {
                    if b != b'\n' {
                        return Err(ParseError::InvalidChunkSize);
                    }
                    self.chunk_size = 0;
                    self.chunk_size_seen = false;
                    self.state = State::ChunkSize;
                    i += 1;
                }
                State::TrailerStart => {
                    if b == b'\r' {
                        self.state = State::FinalAlmostDone;
                    } else if b == b'\n' {
                        return Err(ParseError::InvalidHeader);
                    } else {
                        // trailer headers are skipped
                        self.state = State::TrailerLine;
                    }
                    i += 1;
                }
                State::TrailerLine => {
                    if b == b'\r' {
                        self.state = State::TrailerAlmostDone;
                    }
                    i += 1;
                }
                State::TrailerAlmostDone => {
                    if b != b'\n' {
                        return Err(ParseError::InvalidHeader);
                    }
                    self.state = State::TrailerStart;
                    i += 1;
                }
                State::FinalAlmostDone => {
                    if b != b'\n' {
                        return Err(ParseError::InvalidHeader);
                    }
                    i += 1;
                    events.on_message_complete();
                    self.state = State::MessageComplete;
                    if i < len {
                        return Ok(Consumed::Pipelined(i));
                    }
                }
                State::MessageComplete => {
                    // caller fed more data without resetting; everything from
                    // here on belongs to the next message
                    return Ok(Consumed::Pipelined(i));
                }
            }
        }
        // a token cut off by the end of the buffer is emitted partially;
        // the caller merges consecutive slices
        if let Some(start) = mark {
            if start < len {
                match self.state {
                    State::Url => events.on_url(buf.slice(start..len)),
                    State::HeaderField => events.on_header_field(buf.slice(start..len)),
                    State::HeaderValue => events.on_header_value(buf.slice(start..len)),
                    _ => {}
                }
            }
        }
        Ok(Consumed::All)
    }
}

impl Default for Http1Parser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        message_begin: usize,
        url: Vec<u8>,
        headers: Vec<(Vec<u8>, Vec<u8>)>,
        in_value: bool,
        headers_complete: usize,
        body: Vec<u8>,
        message_complete: usize,
    }

    impl ParseEvents for Recorder {
        fn on_message_begin(&mut self) {
            self.message_begin += 1;
        }
        fn on_url(&mut self, data: Bytes) {
            self.url.extend_from_slice(&data);
        }
        fn on_header_field(&mut self, data: Bytes) {
            if self.in_value || self.headers.is_empty() {
                self.headers.push((Vec::new(), Vec::new()));
                self.in_value = false;
            }
            self.headers.last_mut().unwrap().0.extend_from_slice(&data);
        }
        fn on_header_value(&mut self, data: Bytes) {
            self.in_value = true;
            self.headers.last_mut().unwrap().1.extend_from_slice(&data);
        }
        fn on_headers_complete(&mut self) {
            self.headers_complete += 1;
        }
        fn on_body(&mut self, data: Bytes) {
            self.body.extend_from_slice(&data);
        }
        fn on_message_complete(&mut self) {
            self.message_complete += 1;
        }
    }

    fn feed(parser: &mut Http1Parser, recorder: &mut Recorder, data: &[u8]) -> Consumed {
        parser
            .execute(recorder, &Bytes::copy_from_slice(data))
            .unwrap()
    }

    #[test]
    fn simple_request_without_body() {
        let mut parser = Http1Parser::new();
        let mut recorder = Recorder::default();
        let consumed = feed(
            &mut parser,
            &mut recorder,
            b"GET /index.html HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
        );
        assert_eq!(consumed, Consumed::All);
        assert_eq!(recorder.message_begin, 1);
        assert_eq!(parser.method(), "GET");
        assert_eq!(recorder.url, b"/index.html");
        assert_eq!(parser.version(), "HTTP/1.1");
        assert_eq!(recorder.headers.len(), 2);
        assert_eq!(recorder.headers[0].0, b"Host");
        assert_eq!(recorder.headers[0].1, b"localhost");
        assert_eq!(recorder.headers[1].0, b"Connection");
        assert_eq!(recorder.headers[1].1, b"close");
        assert_eq!(recorder.headers_complete, 1);
        assert_eq!(recorder.message_complete, 1);
        assert!(parser.is_message_complete());
    }

    #[test]
    fn request_without_headers() {
        let mut parser = Http1Parser::new();
        let mut recorder = Recorder::default();
        feed(&mut parser, &mut recorder, b"GET / HTTP/1.0\r\n\r\n");
        assert_eq!(recorder.url, b"/");
        assert_eq!(parser.version(), "HTTP/1.0");
        assert!(recorder.headers.is_empty());
        assert_eq!(recorder.message_complete, 1);
    }

    #[test]
    fn content_length_body() {
        let mut parser = Http1Parser::new();
        let mut recorder = Recorder::default();
        feed(
            &mut parser,
            &mut recorder,
            b"POST /submit HTTP/1.1\r\nContent-Length: 11\r\n\r\nhello world",
        );
        assert_eq!(parser.content_length(), Some(11));
        assert_eq!(recorder.body, b"hello world");
        assert_eq!(recorder.message_complete, 1);
    }

    #[test]
    fn body_split_across_feeds() {
        let mut parser = Http1Parser::new();
        let mut recorder = Recorder::default();
        feed(
            &mut parser,
            &mut recorder,
            b"POST / HTTP/1.1\r\nContent-Length: 10\r\n\r\n12345",
        );
        assert_eq!(recorder.message_complete, 0);
        feed(&mut parser, &mut recorder, b"67890");
        assert_eq!(recorder.body, b"1234567890");
        assert_eq!(recorder.message_complete, 1);
    }

    #[test]
    fn url_and_header_split_across_feeds() {
        let mut parser = Http1Parser::new();
        let mut recorder = Recorder::default();
        feed(&mut parser, &mut recorder, b"GET /a/very/lo");
        feed(&mut parser, &mut recorder, b"ng/path HTTP/1.1\r\nUser-Ag");
        feed(&mut parser, &mut recorder, b"ent: Test");
        feed(&mut parser, &mut recorder, b"Client\r\n\r\n");
        assert_eq!(recorder.url, b"/a/very/long/path");
        assert_eq!(recorder.headers.len(), 1);
        assert_eq!(recorder.headers[0].0, b"User-Agent");
        assert_eq!(recorder.headers[0].1, b"TestClient");
        assert_eq!(recorder.message_complete, 1);
    }

    #[test]
    fn chunked_body_is_decoded() {
        let mut parser = Http1Parser::new();
        let mut recorder = Recorder::default();
        feed(
            &mut parser,
            &mut recorder,
            b"POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n\
              c\r\nHello World \r\n7\r\nChunked\r\n0\r\n\r\n",
        );
        assert!(parser.is_chunked());
        assert_eq!(recorder.body, b"Hello World Chunked");
        assert_eq!(recorder.message_complete, 1);
    }

    #[test]
    fn chunked_with_extension_and_trailer() {
        let mut parser = Http1Parser::new();
        let mut recorder = Recorder::default();
        feed(
            &mut parser,
            &mut recorder,
            b"POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n\
              5;ext=1\r\nhello\r\n0\r\nX-Trailer: skip\r\n\r\n",
        );
        assert_eq!(recorder.body, b"hello");
        assert_eq!(recorder.message_complete, 1);
    }

    #[test]
    fn pipelined_requests_pause_at_second_message() {
        let mut parser = Http1Parser::new();
        let mut recorder = Recorder::default();
        let input = b"GET /a HTTP/1.1\r\n\r\nGET /b HTTP/1.1\r\n\r\n";
        let consumed = feed(&mut parser, &mut recorder, input);
        let Consumed::Pipelined(offset) = consumed else {
            panic!("expected pipelined pause, got {consumed:?}");
        };
        assert_eq!(&input[offset..], b"GET /b HTTP/1.1\r\n\r\n");
        assert_eq!(recorder.message_begin, 1);
        assert_eq!(recorder.url, b"/a");

        parser.reset();
        let mut second = Recorder::default();
        let consumed = parser
            .execute(&mut second, &Bytes::copy_from_slice(&input[offset..]))
            .unwrap();
        assert_eq!(consumed, Consumed::All);
        assert_eq!(second.url, b"/b");
    }

    #[test]
    fn invalid_method_is_an_error() {
        let mut parser = Http1Parser::new();
        let mut recorder = Recorder::default();
        let err = parser
            .execute(&mut recorder, &Bytes::from_static(b"get / HTTP/1.1\r\n\r\n"))
            .unwrap_err();
        assert_eq!(err, ParseError::InvalidMethod);
    }

    #[test]
    fn invalid_content_length_is_an_error() {
        let mut parser = Http1Parser::new();
        let mut recorder = Recorder::default();
        let err = parser
            .execute(
                &mut recorder,
                &Bytes::from_static(b"POST / HTTP/1.1\r\nContent-Length: abc\r\n\r\n"),
            )
            .unwrap_err();
        assert_eq!(err, ParseError::InvalidContentLength);
    }

    #[test]
    fn invalid_chunk_size_is_an_error() {
        let mut parser = Http1Parser::new();
        let mut recorder = Recorder::default();
        let err = parser
            .execute(
                &mut recorder,
                &Bytes::from_static(
                    b"POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\nzz\r\n",
                ),
            )
            .unwrap_err();
        assert_eq!(err, ParseError::InvalidChunkSize);
    }

    #[test]
    fn header_value_leading_whitespace_is_skipped() {
        let mut parser = Http1Parser::new();
        let mut recorder = Recorder::default();
        feed(
            &mut parser,
            &mut recorder,
            b"GET / HTTP/1.1\r\nHost:    spaced.example\r\n\r\n",
        );
        assert_eq!(recorder.headers[0].1, b"spaced.example");
    }

    #[test]
    fn empty_header_value() {
        let mut parser = Http1Parser::new();
        let mut recorder = Recorder::default();
        feed(&mut parser, &mut recorder, b"GET / HTTP/1.1\r\nX-Empty:\r\n\r\n");
        assert_eq!(recorder.headers[0].0, b"X-Empty");
        assert!(recorder.headers[0].1.is_empty());
    }

    // Reconstructing the request line and headers from the callbacks yields
    // the original bytes modulo whitespace normalization.
    #[test]
    fn parse_write_round_trip() {
        let input = b"GET /test?x=1 HTTP/1.1\r\nHost: localhost\r\nUser-Agent: RoundTrip\r\n\r\n";
        let mut parser = Http1Parser::new();
        let mut recorder = Recorder::default();
        feed(&mut parser, &mut recorder, input);

        let mut rebuilt = Vec::new();
        rebuilt.extend_from_slice(&parser.method());
        rebuilt.push(b' ');
        rebuilt.extend_from_slice(&recorder.url);
        rebuilt.push(b' ');
        rebuilt.extend_from_slice(&parser.version());
        rebuilt.extend_from_slice(b"\r\n");
        for (key, value) in &recorder.headers {
            rebuilt.extend_from_slice(key);
            rebuilt.extend_from_slice(b": ");
            rebuilt.extend_from_slice(value);
            rebuilt.extend_from_slice(b"\r\n");
        }
        rebuilt.extend_from_slice(b"\r\n");
        assert_eq!(rebuilt, input);
    }
}
