//! Byte-string constants shared across the http layer.
//!
//! Keeping these as `&'static str` lets message code build `Bytes` views
//! without allocating.

pub const CRLF: &str = "\r\n";
pub const COLON_SPACE: &str = ": ";
pub const SPACE: &str = " ";

pub const HTTP_10: &str = "HTTP/1.0";
pub const HTTP_11: &str = "HTTP/1.1";
pub const HTTP_12: &str = "HTTP/1.2";

/// Server header value, deliberately without a version number.
pub const SERVER_NAME: &str = "keel";

pub const KEEP_ALIVE: &str = "keep-alive";
pub const CLOSE: &str = "close";
pub const CHUNKED: &str = "chunked";
pub const GZIP: &str = "gzip";

pub const STATUS_200: &str = "200";
pub const STATUS_206: &str = "206";
pub const STATUS_304: &str = "304";
pub const STATUS_404: &str = "404";
pub const STATUS_500: &str = "500";

pub const OK: &str = "OK";
pub const PARTIAL_CONTENT: &str = "Partial Content";
pub const NOT_MODIFIED: &str = "Not Modified";
pub const NOT_FOUND: &str = "Not Found";
pub const INTERNAL_SERVER_ERROR: &str = "Internal Server Error";

pub const MIME_TEXT_PLAIN: &str = "text/plain;charset=utf-8";
pub const MIME_OCTET_STREAM: &str = "application/octet-stream";
