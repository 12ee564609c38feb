//! Keel is a modular, shard-per-core asynchronous HTTP/1.x application
//! framework.
//!
//! Each CPU core runs an independent shard owning its own container,
//! router, server and caches; connections within a shard are handled by a
//! pipelined two-loop engine with bounded-memory body streaming. This
//! crate re-exports the public surface of the member crates.
//!
//! ```ignore
//! use keel::prelude::*;
//!
//! let shard = Shard::spawn(0)?;
//! shard.submit(|| {
//!     tokio::task::spawn_local(async {
//!         let container = Rc::new(Container::new());
//!         let mut router = RoutingHandler::new();
//!         router.route("GET", "/", Rc::new(HomeHandler));
//!         let handlers: Vec<Rc<dyn HttpHandler>> = vec![
//!             Rc::new(InternalErrorHandler),
//!             Rc::new(router),
//!             Rc::new(NotFoundHandler),
//!         ];
//!         let server = HttpServer::new(container, ServerConfig::default(), handlers);
//!         server.start().await.unwrap();
//!     });
//! })?;
//! ```

pub use keel_core as core;
pub use keel_http as http;
pub use keel_router as router;
pub use keel_server as server;
pub use keel_static as static_files;

pub mod prelude {
    //! The names almost every Keel application touches.
    pub use keel_core::{
        init_tracing, Container, ContainerError, Injectable, KeelConfig, Lifetime,
        ServiceDescriptor, ServiceStorage,
    };
    pub use keel_http::{
        HttpRequest, HttpResponse, InputStream, OutputStream, Packet, ReadResult, StreamError,
    };
    pub use keel_router::{PathFragment, Query, RoutingHandler};
    pub use keel_server::{
        HandlerError, HandlerResult, HttpContext, HttpHandler, HttpServer, InternalErrorHandler,
        Next, NotFoundHandler, ServerConfig, Shard,
    };
    pub use keel_static::StaticFileHandler;
}
