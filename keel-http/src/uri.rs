use crate::packet::Packet;
use bytes::Bytes;
use std::collections::HashMap;

/// Decode percent escapes and `+` as space.
///
/// Returns the input slice unchanged (no copy) when nothing needs decoding.
pub(crate) fn url_decode(data: Bytes) -> Bytes {
    if !data.iter().any(|&b| b == b'%' || b == b'+') {
        return data;
    }
    let mut decoded = Vec::with_capacity(data.len());
    let mut i = 0;
    while i < data.len() {
        match data[i] {
            b'+' => decoded.push(b' '),
            b'%' => {
                let hex = |b: u8| -> Option<u8> {
                    match b {
                        b'0'..=b'9' => Some(b - b'0'),
                        b'a'..=b'f' => Some(b - b'a' + 10),
                        b'A'..=b'F' => Some(b - b'A' + 10),
                        _ => None,
                    }
                };
                if i + 2 < data.len() {
                    if let (Some(hi), Some(lo)) = (hex(data[i + 1]), hex(data[i + 2])) {
                        decoded.push(hi * 16 + lo);
                        i += 3;
                        continue;
                    }
                }
                // malformed escape is kept verbatim
                decoded.push(b'%');
            }
            other => decoded.push(other),
        }
        i += 1;
    }
    Bytes::from(decoded)
}

/// Percent-encode bytes outside the unreserved set.
pub(crate) fn url_encode(data: &[u8]) -> Bytes {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";
    let needs_escape = |b: u8| {
        !(b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'~' | b'/'))
    };
    if !data.iter().any(|&b| needs_escape(b)) {
        return Bytes::copy_from_slice(data);
    }
    let mut encoded = Vec::with_capacity(data.len() + 8);
    for &b in data {
        if needs_escape(b) {
            encoded.push(b'%');
            encoded.push(HEX[(b >> 4) as usize]);
            encoded.push(HEX[(b & 0xf) as usize]);
        } else {
            encoded.push(b);
        }
    }
    Bytes::from(encoded)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum ParserState {
    Protocol,
    Hostname,
    HostnameV6,
    Port,
    Path,
    Query,
}

/// Lazily parsed URI.
///
/// Single pass over the raw bytes; every produced piece is a shared slice of
/// the input unless percent-decoding forced a copy. The fragment part
/// (`#...`) is not handled; callers must not include it.
#[derive(Debug, Default)]
pub struct Uri {
    protocol: Bytes,
    hostname: Bytes,
    port: Bytes,
    path: Bytes,
    path_fragments: Vec<Bytes>,
    query_parameters: HashMap<Bytes, Bytes>,
}

impl Uri {
    /// Parse a URI. Accepts absolute (`http://host:port/path?query`) and
    /// origin (`/path?query`) forms.
    pub fn parse(uri: &Bytes) -> Self {
        let mut result = Uri::default();
        result.parse_into(uri);
        result
    }

    fn parse_into(&mut self, uri: &Bytes) {
        let bytes = uri.as_ref();
        let len = bytes.len();
        let mut state = ParserState::Protocol;
        let mut mark = 0usize;
        let mut path_mark = 0usize;
        let mut query_key = Bytes::new();
        let mut i = 0usize;
        while i < len {
            let c = bytes[i];
            match c {
                b'/' => match state {
                    ParserState::Protocol => {
                        if i != mark {
                            // path only without leading slash, e.g. articles/today
                            self.path_fragments.push(url_decode(uri.slice(mark..i)));
                        }
                        mark = i + 1;
                        state = ParserState::Path;
                    }
                    ParserState::Path => {
                        self.path_fragments.push(url_decode(uri.slice(mark..i)));
                        mark = i + 1;
                    }
                    ParserState::Hostname => {
                        self.hostname = url_decode(uri.slice(mark..i));
                        mark = i + 1;
                        path_mark = i;
                        state = ParserState::Path;
                    }
                    ParserState::Port => {
                        // port is numeric, no decode needed
                        self.port = uri.slice(mark..i);
                        mark = i + 1;
                        path_mark = i;
                        state = ParserState::Path;
                    }
                    _ => {}
                },
                b'?' => match state {
                    ParserState::Path => {
                        if i > mark {
                            // `/path/?k=v` should not add an empty fragment
                            self.path_fragments.push(url_decode(uri.slice(mark..i)));
                        }
                        self.path = url_decode(uri.slice(path_mark..i));
                        mark = i + 1;
                        state = ParserState::Query;
                    }
                    ParserState::Protocol => {
                        // leading `?`, e.g. ?sort=comments
                        mark = i + 1;
                        state = ParserState::Query;
                    }
                    _ => {}
                },
                b'=' => {
                    if state == ParserState::Query {
                        query_key = url_decode(uri.slice(mark..i));
                        mark = i + 1;
                    }
                }
                b'&' => {
                    if state == ParserState::Query {
                        self.query_parameters.insert(
                            std::mem::take(&mut query_key),
                            url_decode(uri.slice(mark..i)),
                        );
                        mark = i + 1;
                    }
                }
                b':' => match state {
                    ParserState::Protocol => {
                        // `://` ends the protocol
                        self.protocol = url_decode(uri.slice(mark..i));
                        i += 2;
                        mark = i + 1;
                        state = ParserState::Hostname;
                    }
                    ParserState::Hostname => {
                        self.hostname = url_decode(uri.slice(mark..i));
                        mark = i + 1;
                        state = ParserState::Port;
                    }
                    _ => {}
                },
                b'[' => {
                    if state == ParserState::Hostname {
                        state = ParserState::HostnameV6;
                    }
                }
                b']' => {
                    if state == ParserState::HostnameV6 {
                        // hostname keeps the brackets
                        self.hostname = url_decode(uri.slice(mark..i + 1));
                        mark = i + 1;
                        if mark < len && bytes[mark] == b':' {
                            i += 1;
                            mark += 1;
                            state = ParserState::Port;
                        } else {
                            path_mark = mark;
                            state = ParserState::Path;
                        }
                    }
                }
                _ => {}
            }
            i += 1;
        }
        // final piece
        let end = len;
        if end > mark {
            match state {
                ParserState::Path => {
                    self.path_fragments.push(url_decode(uri.slice(mark..end)));
                }
                ParserState::Hostname => {
                    self.hostname = url_decode(uri.slice(mark..end));
                }
                ParserState::Port => {
                    self.port = uri.slice(mark..end);
                }
                ParserState::Query => {
                    self.query_parameters
                        .insert(query_key, url_decode(uri.slice(mark..end)));
                }
                _ => {}
            }
        }
        if state == ParserState::Path {
            // path may be just "/", which leaves end == mark
            self.path = url_decode(uri.slice(path_mark..end));
        }
    }

    pub fn protocol(&self) -> &Bytes {
        &self.protocol
    }

    pub fn hostname(&self) -> &Bytes {
        &self.hostname
    }

    pub fn port(&self) -> &Bytes {
        &self.port
    }

    /// The decoded path, including the leading slash.
    pub fn path(&self) -> &Bytes {
        &self.path
    }

    /// Decoded path segments in order, without slashes.
    pub fn path_fragments(&self) -> &[Bytes] {
        &self.path_fragments
    }

    /// Zero-indexed path segment access.
    pub fn path_fragment(&self, index: usize) -> Option<&Bytes> {
        self.path_fragments.get(index)
    }

    /// Look up a query parameter; duplicate keys keep the last value.
    pub fn query(&self, name: &[u8]) -> Option<&Bytes> {
        self.query_parameters.get(name)
    }

    pub fn query_parameters(&self) -> &HashMap<Bytes, Bytes> {
        &self.query_parameters
    }

    /// Append the encoded form of this uri to a packet.
    pub fn build(&self, packet: &mut Packet) {
        if !self.protocol.is_empty() {
            packet.append_bytes(url_encode(&self.protocol));
            packet.append_static("://");
            packet.append_bytes(url_encode(&self.hostname));
            if !self.port.is_empty() {
                packet.append_static(":");
                packet.append_bytes(self.port.clone());
            }
        }
        if !self.path_fragments.is_empty() {
            // prefer fragments in case a caller modified one after parsing
            for fragment in &self.path_fragments {
                packet.append_static("/");
                packet.append_bytes(url_encode(fragment));
            }
        } else if !self.path.is_empty() {
            packet.append_bytes(url_encode(&self.path));
        }
        if !self.query_parameters.is_empty() {
            packet.append_static("?");
            let mut first = true;
            for (key, value) in &self.query_parameters {
                if !first {
                    packet.append_static("&");
                }
                first = false;
                packet.append_bytes(url_encode(key));
                packet.append_static("=");
                packet.append_bytes(url_encode(value));
            }
        }
    }

    /// Reset to the empty state.
    pub fn clear(&mut self) {
        *self = Uri::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &'static str) -> Uri {
        Uri::parse(&Bytes::from_static(s.as_bytes()))
    }

    #[test]
    fn full_uri_with_port() {
        let uri = parse("http://www.example.com:8000/articles/today?sort=comments");
        assert_eq!(uri.protocol(), "http");
        assert_eq!(uri.hostname(), "www.example.com");
        assert_eq!(uri.port(), "8000");
        assert_eq!(uri.path(), "/articles/today");
        assert_eq!(uri.path_fragments(), &["articles", "today"]);
        assert_eq!(uri.query(b"sort").unwrap(), "comments");
    }

    #[test]
    fn full_uri_without_port() {
        let uri = parse("http://www.example.com/articles/today");
        assert_eq!(uri.hostname(), "www.example.com");
        assert!(uri.port().is_empty());
        assert_eq!(uri.path(), "/articles/today");
    }

    #[test]
    fn ipv6_host_with_port() {
        let uri = parse("http://[::1]:8000/articles");
        assert_eq!(uri.hostname(), "[::1]");
        assert_eq!(uri.port(), "8000");
        assert_eq!(uri.path(), "/articles");
    }

    #[test]
    fn ipv6_host_without_port() {
        let uri = parse("http://[::1]/articles");
        assert_eq!(uri.hostname(), "[::1]");
        assert!(uri.port().is_empty());
        assert_eq!(uri.path(), "/articles");
    }

    #[test]
    fn origin_form() {
        let uri = parse("/articles/today?sort=comments&page=2");
        assert!(uri.protocol().is_empty());
        assert_eq!(uri.path(), "/articles/today");
        assert_eq!(uri.query(b"sort").unwrap(), "comments");
        assert_eq!(uri.query(b"page").unwrap(), "2");
    }

    #[test]
    fn root_path() {
        let uri = parse("/");
        assert_eq!(uri.path(), "/");
        assert!(uri.path_fragments().is_empty());
    }

    #[test]
    fn trailing_slash_adds_no_empty_fragment() {
        let uri = parse("/a/b/?k=v");
        assert_eq!(uri.path_fragments(), &["a", "b"]);
        assert_eq!(uri.path(), "/a/b/");
    }

    #[test]
    fn relative_path_without_leading_slash() {
        let uri = parse("articles/today");
        assert_eq!(uri.path_fragments(), &["articles", "today"]);
        assert_eq!(uri.path(), "articles/today");
    }

    #[test]
    fn query_only() {
        let uri = parse("?sort=comments");
        assert!(uri.path().is_empty());
        assert_eq!(uri.query(b"sort").unwrap(), "comments");
    }

    #[test]
    fn duplicate_query_keys_keep_last() {
        let uri = parse("/p?a=1&a=2");
        assert_eq!(uri.query(b"a").unwrap(), "2");
    }

    #[test]
    fn percent_decoding_and_plus() {
        let uri = parse("/search%20page?q=a+b%21");
        assert_eq!(uri.path(), "/search page");
        assert_eq!(uri.query(b"q").unwrap(), "a b!");
    }

    #[test]
    fn port_is_not_decoded() {
        let uri = parse("http://h:8080/");
        assert_eq!(uri.port(), "8080");
    }

    #[test]
    fn build_round_trips_simple_uri() {
        let uri = parse("http://example.com:81/a/b");
        let mut packet = Packet::new();
        uri.build(&mut packet);
        assert_eq!(packet.to_bytes(), "http://example.com:81/a/b");
    }
}
