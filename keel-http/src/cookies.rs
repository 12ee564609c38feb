use bytes::Bytes;
use std::collections::HashMap;

fn trim(data: &Bytes, mut start: usize, mut end: usize) -> Bytes {
    let bytes = data.as_ref();
    while start < end && (bytes[start] == b' ' || bytes[start] == b'\t') {
        start += 1;
    }
    while end > start && (bytes[end - 1] == b' ' || bytes[end - 1] == b'\t') {
        end -= 1;
    }
    data.slice(start..end)
}

/// Cookies parsed on demand from the request `Cookie` header.
///
/// Pairs split on `=`, whitespace around keys and values stripped,
/// duplicate names keep the last value. A pair without `=` is stored with
/// an empty value.
#[derive(Debug, Default)]
pub struct HttpRequestCookies {
    cookies: HashMap<Bytes, Bytes>,
}

impl HttpRequestCookies {
    /// Parse from the raw `Cookie` header value.
    pub fn parse(header: &Bytes) -> Self {
        let mut cookies = HashMap::new();
        let bytes = header.as_ref();
        let mut start = 0usize;
        for end in (0..=bytes.len()).filter(|&i| i == bytes.len() || bytes[i] == b';') {
            if end > start {
                let eq = bytes[start..end].iter().position(|&b| b == b'=');
                let (key, value) = match eq {
                    Some(offset) => (
                        trim(header, start, start + offset),
                        trim(header, start + offset + 1, end),
                    ),
                    None => (trim(header, start, end), Bytes::new()),
                };
                if !key.is_empty() {
                    cookies.insert(key, value);
                }
            }
            start = end.saturating_add(1);
        }
        Self { cookies }
    }

    /// Look up a cookie value by name.
    pub fn get(&self, name: &[u8]) -> Option<&Bytes> {
        self.cookies.get(name)
    }

    /// All cookies, unordered.
    pub fn all(&self) -> &HashMap<Bytes, Bytes> {
        &self.cookies
    }
}
