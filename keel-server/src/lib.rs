//! The Keel HTTP/1.x server core.
//!
//! A shard-local, pipelined request/reply engine: each accepted socket gets
//! a connection running two cooperating tasks (a receive loop feeding the
//! incremental parser, a reply loop driving the handler chain) joined by
//! bounded queues that carry back-pressure from slow handlers to the TCP
//! window. The server owns the accept loops, the live-connection set and
//! the request-timeout watchdog for one shard.

pub mod config;
pub mod connection;
pub mod context;
pub mod error;
pub mod handler;
pub mod handlers;
pub mod metrics;
pub mod queue;
pub mod server;
pub mod shard;

pub use config::ServerConfig;
pub use connection::{ConnectionState, Http11Connection};
pub use context::HttpContext;
pub use error::{HandlerError, HandlerResult};
pub use handler::{HttpHandler, Next};
pub use handlers::{FunctionHandler, InternalErrorHandler, NotFoundHandler, RealLastHandler};
pub use metrics::{MetricsSnapshot, ServerMetrics};
pub use server::HttpServer;
pub use shard::{spawn_shards, Shard};
