use crate::constants;
use crate::date::http_date_now;
use crate::headers::HttpResponseHeaders;
use crate::packet::Packet;
use crate::stream::{OutputStream, StreamError};
use bytes::Bytes;

/// An outgoing HTTP response.
///
/// Created per request; ownership of the serialization order belongs to the
/// connection reply loop. The first body write flushes the status line and
/// headers atomically ahead of the data; a handler that writes no body
/// leaves the flush to the reply loop.
#[derive(Default)]
pub struct HttpResponse {
    version: Bytes,
    status_code: Bytes,
    status_message: Bytes,
    headers: HttpResponseHeaders,
    body: Option<Box<dyn OutputStream>>,
    underlying: Vec<Bytes>,
    default_connection: Bytes,
    headers_flushed: bool,
    body_written: u64,
}

impl HttpResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn version(&self) -> &Bytes {
        &self.version
    }

    pub fn set_version(&mut self, version: Bytes) {
        self.version = version;
    }

    pub fn status_code(&self) -> &Bytes {
        &self.status_code
    }

    pub fn status_message(&self) -> &Bytes {
        &self.status_message
    }

    pub fn set_status(&mut self, code: impl Into<Bytes>, message: impl Into<Bytes>) {
        self.status_code = code.into();
        self.status_message = message.into();
    }

    pub fn headers(&self) -> &HttpResponseHeaders {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HttpResponseHeaders {
        &mut self.headers
    }

    pub fn set_body_stream(&mut self, stream: Box<dyn OutputStream>) {
        self.body = Some(stream);
    }

    pub fn take_body_stream(&mut self) -> Option<Box<dyn OutputStream>> {
        self.body.take()
    }

    /// The `Connection` value applied at flush time when the handler did not
    /// set one; provided by the reply loop from its keep-alive decision.
    pub fn set_default_connection(&mut self, value: Bytes) {
        self.default_connection = value;
    }

    pub fn headers_flushed(&self) -> bool {
        self.headers_flushed
    }

    /// Body bytes written through [`write_body`](HttpResponse::write_body).
    pub fn body_written(&self) -> u64 {
        self.body_written
    }

    pub fn add_underlying_buffer(&mut self, buffer: Bytes) {
        self.underlying.push(buffer);
    }

    /// Serialize and write the status line and headers, once.
    ///
    /// Applies the defaults: version copied in by the reply loop (falling
    /// back to HTTP/1.0), placeholder status for handlers that set none,
    /// `Date`, `Server` and `Connection` when absent.
    pub async fn flush_headers(&mut self) -> Result<(), StreamError> {
        if self.headers_flushed {
            return Ok(());
        }
        self.headers_flushed = true;
        let head = self.build_head();
        match self.body.as_deref_mut() {
            Some(stream) => stream.write(head).await,
            None => Ok(()),
        }
    }

    /// Write one packet of body data, flushing headers first when needed.
    pub async fn write_body(
        &mut self,
        data: impl Into<Packet>,
    ) -> Result<(), StreamError> {
        let data = data.into();
        if data.is_empty() {
            return Ok(());
        }
        self.flush_headers().await?;
        self.body_written += data.size() as u64;
        match self.body.as_deref_mut() {
            Some(stream) => stream.write(data).await,
            None => Ok(()),
        }
    }

    /// Set status and headers, then write the whole body in one call.
    pub async fn reply_with_status(
        &mut self,
        code: impl Into<Bytes>,
        message: impl Into<Bytes>,
        content: impl Into<Packet>,
        mime: impl Into<Bytes>,
    ) -> Result<(), StreamError> {
        let content = content.into();
        self.set_status(code, message);
        self.headers.set_content_type(mime.into());
        self.headers
            .set_content_length(Bytes::from(content.size().to_string()));
        self.write_body(content).await
    }

    /// Reply 200 OK with the given content.
    pub async fn reply(
        &mut self,
        content: impl Into<Packet>,
        mime: impl Into<Bytes>,
    ) -> Result<(), StreamError> {
        self.reply_with_status(constants::STATUS_200, constants::OK, content, mime)
            .await
    }

    /// Reply 404 Not Found with the canned body.
    pub async fn reply_404(&mut self) -> Result<(), StreamError> {
        self.reply_with_status(
            constants::STATUS_404,
            constants::NOT_FOUND,
            "Not Found",
            constants::MIME_TEXT_PLAIN,
        )
        .await
    }

    /// Reply 500 Internal Server Error with the canned body.
    pub async fn reply_500(&mut self) -> Result<(), StreamError> {
        self.reply_with_status(
            constants::STATUS_500,
            constants::INTERNAL_SERVER_ERROR,
            "Internal Server Error",
            constants::MIME_TEXT_PLAIN,
        )
        .await
    }

    fn build_head(&mut self) -> Packet {
        if self.version.is_empty() {
            // unsupported or missing request version
            self.version = Bytes::from_static(constants::HTTP_10.as_bytes());
        }
        if self.status_code.is_empty() || self.status_message.is_empty() {
            self.status_code = Bytes::from_static(b"0");
            self.status_message = Bytes::from_static(b"Status code or status message not set");
        }
        if self.headers.date().is_empty() {
            self.headers.set_date(http_date_now());
        }
        if self.headers.server().is_empty() {
            self.headers
                .set_server(Bytes::from_static(constants::SERVER_NAME.as_bytes()));
        }
        if self.headers.connection().is_empty() && !self.default_connection.is_empty() {
            self.headers.set_connection(self.default_connection.clone());
        }
        let mut head = Packet::with_capacity(8 + 4 * 8);
        head.append_bytes(self.version.clone());
        head.append_static(constants::SPACE);
        head.append_bytes(self.status_code.clone());
        head.append_static(constants::SPACE);
        head.append_bytes(self.status_message.clone());
        head.append_static(constants::CRLF);
        self.headers.foreach(|key, value| {
            head.append_bytes(key.clone());
            head.append_static(constants::COLON_SPACE);
            head.append_bytes(value.clone());
            head.append_static(constants::CRLF);
        });
        head.append_static(constants::CRLF);
        head
    }
}

impl std::fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpResponse")
            .field("version", &self.version)
            .field("status_code", &self.status_code)
            .field("headers_flushed", &self.headers_flushed)
            .field("body_written", &self.body_written)
            .finish()
    }
}
