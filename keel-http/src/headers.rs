use bytes::Bytes;

fn name(s: &'static str) -> Bytes {
    Bytes::from_static(s.as_bytes())
}

/// Request header map with hot fields split out as named slots.
///
/// The named slots avoid hashing on the critical path; everything else goes
/// into a small insertion-ordered overflow list. Slot routing matches the
/// canonical header name case-sensitively: `Host` hits the slot,
/// `host` lands in the overflow list.
#[derive(Debug, Default)]
pub struct HttpRequestHeaders {
    host: Bytes,
    content_type: Bytes,
    content_length: Bytes,
    connection: Bytes,
    pragma: Bytes,
    cache_control: Bytes,
    upgrade_insecure_requests: Bytes,
    dnt: Bytes,
    user_agent: Bytes,
    accept: Bytes,
    accept_encoding: Bytes,
    accept_language: Bytes,
    cookie: Bytes,
    x_requested_with: Bytes,
    remaining: Vec<(Bytes, Bytes)>,
}

impl HttpRequestHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a header, routing to the named slot when the key matches a
    /// canonical name, else to the overflow list (replacing an existing key).
    pub fn set_header(&mut self, key: Bytes, value: Bytes) {
        match key.as_ref() {
            b"Host" => self.host = value,
            b"Content-Type" => self.content_type = value,
            b"Content-Length" => self.content_length = value,
            b"Connection" => self.connection = value,
            b"Pragma" => self.pragma = value,
            b"Cache-Control" => self.cache_control = value,
            b"Upgrade-Insecure-Requests" => self.upgrade_insecure_requests = value,
            b"DNT" => self.dnt = value,
            b"User-Agent" => self.user_agent = value,
            b"Accept" => self.accept = value,
            b"Accept-Encoding" => self.accept_encoding = value,
            b"Accept-Language" => self.accept_language = value,
            b"Cookie" => self.cookie = value,
            b"X-Requested-With" => self.x_requested_with = value,
            _ => {
                if let Some(slot) = self.remaining.iter_mut().find(|(k, _)| *k == key) {
                    slot.1 = value;
                } else {
                    self.remaining.push((key, value));
                }
            }
        }
    }

    /// Get a header by canonical name; empty `Bytes` means absent.
    pub fn get_header(&self, key: &[u8]) -> Bytes {
        match key {
            b"Host" => self.host.clone(),
            b"Content-Type" => self.content_type.clone(),
            b"Content-Length" => self.content_length.clone(),
            b"Connection" => self.connection.clone(),
            b"Pragma" => self.pragma.clone(),
            b"Cache-Control" => self.cache_control.clone(),
            b"Upgrade-Insecure-Requests" => self.upgrade_insecure_requests.clone(),
            b"DNT" => self.dnt.clone(),
            b"User-Agent" => self.user_agent.clone(),
            b"Accept" => self.accept.clone(),
            b"Accept-Encoding" => self.accept_encoding.clone(),
            b"Accept-Language" => self.accept_language.clone(),
            b"Cookie" => self.cookie.clone(),
            b"X-Requested-With" => self.x_requested_with.clone(),
            _ => self
                .remaining
                .iter()
                .find(|(k, _)| k.as_ref() == key)
                .map(|(_, v)| v.clone())
                .unwrap_or_default(),
        }
    }

    /// Remove a header from the overflow list (named slots are cleared by
    /// setting an empty value).
    pub fn remove_header(&mut self, key: &[u8]) {
        self.remaining.retain(|(k, _)| k.as_ref() != key);
    }

    /// Visit every non-empty header: named slots in declaration order, then
    /// the overflow list in insertion order.
    pub fn foreach(&self, mut f: impl FnMut(&Bytes, &Bytes)) {
        let slots: [(&'static str, &Bytes); 14] = [
            ("Host", &self.host),
            ("Content-Type", &self.content_type),
            ("Content-Length", &self.content_length),
            ("Connection", &self.connection),
            ("Pragma", &self.pragma),
            ("Cache-Control", &self.cache_control),
            ("Upgrade-Insecure-Requests", &self.upgrade_insecure_requests),
            ("DNT", &self.dnt),
            ("User-Agent", &self.user_agent),
            ("Accept", &self.accept),
            ("Accept-Encoding", &self.accept_encoding),
            ("Accept-Language", &self.accept_language),
            ("Cookie", &self.cookie),
            ("X-Requested-With", &self.x_requested_with),
        ];
        for (key, value) in slots {
            if !value.is_empty() {
                f(&name(key), value);
            }
        }
        for (key, value) in &self.remaining {
            f(key, value);
        }
    }

    pub fn host(&self) -> &Bytes {
        &self.host
    }
    pub fn content_type(&self) -> &Bytes {
        &self.content_type
    }
    pub fn content_length(&self) -> &Bytes {
        &self.content_length
    }
    pub fn connection(&self) -> &Bytes {
        &self.connection
    }
    pub fn user_agent(&self) -> &Bytes {
        &self.user_agent
    }
    pub fn accept(&self) -> &Bytes {
        &self.accept
    }
    pub fn accept_encoding(&self) -> &Bytes {
        &self.accept_encoding
    }
    pub fn cookie(&self) -> &Bytes {
        &self.cookie
    }

    pub fn set_host(&mut self, value: Bytes) {
        self.host = value;
    }
    pub fn set_content_type(&mut self, value: Bytes) {
        self.content_type = value;
    }
    pub fn set_content_length(&mut self, value: Bytes) {
        self.content_length = value;
    }
    pub fn set_connection(&mut self, value: Bytes) {
        self.connection = value;
    }
    pub fn set_cookie(&mut self, value: Bytes) {
        self.cookie = value;
    }
    pub fn set_accept_encoding(&mut self, value: Bytes) {
        self.accept_encoding = value;
    }
}

/// Response header map; same hot-slot layout as the request side plus an
/// addition list for repeatable keys like `Set-Cookie`.
#[derive(Debug, Default)]
pub struct HttpResponseHeaders {
    date: Bytes,
    content_type: Bytes,
    content_length: Bytes,
    content_encoding: Bytes,
    transfer_encoding: Bytes,
    connection: Bytes,
    server: Bytes,
    vary: Bytes,
    etag: Bytes,
    cache_control: Bytes,
    expires: Bytes,
    last_modified: Bytes,
    remaining: Vec<(Bytes, Bytes)>,
    additions: Vec<(Bytes, Bytes)>,
}

impl HttpResponseHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_header(&mut self, key: Bytes, value: Bytes) {
        match key.as_ref() {
            b"Date" => self.date = value,
            b"Content-Type" => self.content_type = value,
            b"Content-Length" => self.content_length = value,
            b"Content-Encoding" => self.content_encoding = value,
            b"Transfer-Encoding" => self.transfer_encoding = value,
            b"Connection" => self.connection = value,
            b"Server" => self.server = value,
            b"Vary" => self.vary = value,
            b"ETag" => self.etag = value,
            b"Cache-Control" => self.cache_control = value,
            b"Expires" => self.expires = value,
            b"Last-Modified" => self.last_modified = value,
            _ => {
                if let Some(slot) = self.remaining.iter_mut().find(|(k, _)| *k == key) {
                    slot.1 = value;
                } else {
                    self.remaining.push((key, value));
                }
            }
        }
    }

    pub fn get_header(&self, key: &[u8]) -> Bytes {
        match key {
            b"Date" => self.date.clone(),
            b"Content-Type" => self.content_type.clone(),
            b"Content-Length" => self.content_length.clone(),
            b"Content-Encoding" => self.content_encoding.clone(),
            b"Transfer-Encoding" => self.transfer_encoding.clone(),
            b"Connection" => self.connection.clone(),
            b"Server" => self.server.clone(),
            b"Vary" => self.vary.clone(),
            b"ETag" => self.etag.clone(),
            b"Cache-Control" => self.cache_control.clone(),
            b"Expires" => self.expires.clone(),
            b"Last-Modified" => self.last_modified.clone(),
            _ => self
                .remaining
                .iter()
                .find(|(k, _)| k.as_ref() == key)
                .map(|(_, v)| v.clone())
                .unwrap_or_default(),
        }
    }

    /// Append a repeatable header (e.g. `Set-Cookie`); never replaces.
    pub fn add_additional_header(&mut self, key: Bytes, value: Bytes) {
        self.additions.push((key, value));
    }

    /// Visit every non-empty header: named slots in declaration order, then
    /// the overflow list, then the addition list.
    pub fn foreach(&self, mut f: impl FnMut(&Bytes, &Bytes)) {
        let slots: [(&'static str, &Bytes); 12] = [
            ("Date", &self.date),
            ("Content-Type", &self.content_type),
            ("Content-Length", &self.content_length),
            ("Content-Encoding", &self.content_encoding),
            ("Transfer-Encoding", &self.transfer_encoding),
            ("Connection", &self.connection),
            ("Server", &self.server),
            ("Vary", &self.vary),
            ("ETag", &self.etag),
            ("Cache-Control", &self.cache_control),
            ("Expires", &self.expires),
            ("Last-Modified", &self.last_modified),
        ];
        for (key, value) in slots {
            if !value.is_empty() {
                f(&name(key), value);
            }
        }
        for (key, value) in &self.remaining {
            f(key, value);
        }
        for (key, value) in &self.additions {
            f(key, value);
        }
    }

    pub fn date(&self) -> &Bytes {
        &self.date
    }
    pub fn content_type(&self) -> &Bytes {
        &self.content_type
    }
    pub fn content_length(&self) -> &Bytes {
        &self.content_length
    }
    pub fn content_encoding(&self) -> &Bytes {
        &self.content_encoding
    }
    pub fn transfer_encoding(&self) -> &Bytes {
        &self.transfer_encoding
    }
    pub fn connection(&self) -> &Bytes {
        &self.connection
    }
    pub fn server(&self) -> &Bytes {
        &self.server
    }
    pub fn cache_control(&self) -> &Bytes {
        &self.cache_control
    }
    pub fn last_modified(&self) -> &Bytes {
        &self.last_modified
    }

    pub fn set_date(&mut self, value: Bytes) {
        self.date = value;
    }
    pub fn set_content_type(&mut self, value: Bytes) {
        self.content_type = value;
    }
    pub fn set_content_length(&mut self, value: Bytes) {
        self.content_length = value;
    }
    pub fn set_content_encoding(&mut self, value: Bytes) {
        self.content_encoding = value;
    }
    pub fn set_transfer_encoding(&mut self, value: Bytes) {
        self.transfer_encoding = value;
    }
    pub fn set_connection(&mut self, value: Bytes) {
        self.connection = value;
    }
    pub fn set_server(&mut self, value: Bytes) {
        self.server = value;
    }
    pub fn set_etag(&mut self, value: Bytes) {
        self.etag = value;
    }
    pub fn set_cache_control(&mut self, value: Bytes) {
        self.cache_control = value;
    }
    pub fn set_last_modified(&mut self, value: Bytes) {
        self.last_modified = value;
    }
}
