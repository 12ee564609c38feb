//! HTTP/1.x plumbing for the Keel framework.
//!
//! This crate owns the pieces that never touch a socket: refcounted byte
//! buffers and write packets, the async stream traits connecting message
//! bodies to their transport, the request/response model with hot-slot
//! header maps, the lazy URI/cookie parsers, and the incremental HTTP/1.1
//! request parser. Everything here is shard-local; nothing is `Send`.

pub mod constants;
pub mod cookies;
pub mod date;
pub mod headers;
pub mod packet;
pub mod parser;
pub mod request;
pub mod response;
pub mod stream;
pub mod uri;

pub use cookies::HttpRequestCookies;
pub use headers::{HttpRequestHeaders, HttpResponseHeaders};
pub use packet::Packet;
pub use parser::{Consumed, Http1Parser, ParseError, ParseEvents};
pub use request::HttpRequest;
pub use response::HttpResponse;
pub use stream::{InputStream, LocalBoxFuture, OutputStream, ReadResult, StreamError};
pub use uri::Uri;
