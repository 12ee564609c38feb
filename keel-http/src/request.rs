use crate::cookies::HttpRequestCookies;
use crate::headers::HttpRequestHeaders;
use crate::stream::{read_to_end, InputStream, StreamError};
use crate::uri::Uri;
use bytes::Bytes;

/// An incoming HTTP request.
///
/// Created per request by the connection receive loop and destroyed once the
/// handler chain completed and the response was flushed. Every slice in the
/// headers, uri and cookies points into either a static region or one of the
/// underlying buffers pinned by this request.
#[derive(Default)]
pub struct HttpRequest {
    method: Bytes,
    url: Bytes,
    version: Bytes,
    headers: HttpRequestHeaders,
    uri: Option<Uri>,
    cookies: Option<HttpRequestCookies>,
    body: Option<Box<dyn InputStream>>,
    underlying: Vec<Bytes>,
}

impl HttpRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(&self) -> &Bytes {
        &self.method
    }

    pub fn set_method(&mut self, method: Bytes) {
        self.method = method;
    }

    /// The raw request target as received, including any query string.
    pub fn url(&self) -> &Bytes {
        &self.url
    }

    pub fn set_url(&mut self, url: Bytes) {
        self.url = url;
        self.uri = None;
    }

    /// The version string (`HTTP/1.1`), empty for unsupported versions.
    pub fn version(&self) -> &Bytes {
        &self.version
    }

    pub fn set_version(&mut self, version: Bytes) {
        self.version = version;
    }

    pub fn headers(&self) -> &HttpRequestHeaders {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HttpRequestHeaders {
        &mut self.headers
    }

    /// The parsed uri; parsed from the raw url on first access.
    pub fn uri(&mut self) -> &Uri {
        if self.uri.is_none() {
            self.uri = Some(Uri::parse(&self.url));
        }
        self.uri.as_ref().expect("uri just parsed")
    }

    /// Cookies parsed from the `Cookie` header on first access.
    pub fn cookies(&mut self) -> &HttpRequestCookies {
        if self.cookies.is_none() {
            self.cookies = Some(HttpRequestCookies::parse(self.headers.cookie()));
        }
        self.cookies.as_ref().expect("cookies just parsed")
    }

    pub fn set_body_stream(&mut self, stream: Box<dyn InputStream>) {
        self.body = Some(stream);
    }

    pub fn body_stream(&mut self) -> Option<&mut (dyn InputStream + 'static)> {
        self.body.as_deref_mut()
    }

    pub fn take_body_stream(&mut self) -> Option<Box<dyn InputStream>> {
        self.body.take()
    }

    /// Drain the body stream into a single buffer.
    ///
    /// Returns an empty buffer when the request has no body stream.
    pub async fn read_body(&mut self) -> Result<Bytes, StreamError> {
        match self.body.as_deref_mut() {
            Some(stream) => read_to_end(stream).await,
            None => Ok(Bytes::new()),
        }
    }

    /// Pin a buffer so borrowed header/uri slices stay valid for the
    /// lifetime of the request.
    pub fn add_underlying_buffer(&mut self, buffer: Bytes) {
        self.underlying.push(buffer);
    }

    pub fn underlying_buffers(&self) -> &[Bytes] {
        &self.underlying
    }
}

impl std::fmt::Debug for HttpRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpRequest")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("version", &self.version)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::BytesInputStream;

    #[test]
    fn uri_is_parsed_lazily_from_url() {
        let mut request = HttpRequest::new();
        request.set_url(Bytes::from_static(b"/articles/today?sort=comments"));
        assert_eq!(request.uri().path(), "/articles/today");
        assert_eq!(request.uri().query(b"sort").unwrap(), "comments");
    }

    #[test]
    fn cookies_are_parsed_from_header() {
        let mut request = HttpRequest::new();
        request
            .headers_mut()
            .set_cookie(Bytes::from_static(b"session=abc; theme=dark"));
        assert_eq!(request.cookies().get(b"session").unwrap(), "abc");
        assert_eq!(request.cookies().get(b"theme").unwrap(), "dark");
    }

    #[tokio::test]
    async fn read_body_drains_the_stream() {
        let mut request = HttpRequest::new();
        request.set_body_stream(Box::new(BytesInputStream::new(Bytes::from_static(
            b"payload",
        ))));
        assert_eq!(request.read_body().await.unwrap(), "payload");
    }

    #[tokio::test]
    async fn read_body_without_stream_is_empty() {
        let mut request = HttpRequest::new();
        assert_eq!(request.read_body().await.unwrap(), "");
    }
}
