use crate::context::HttpContext;
use crate::error::HandlerResult;
use crate::handler::{HttpHandler, Next};
use keel_http::LocalBoxFuture;

/// Sentinel appended at the tail of every chain.
///
/// Reaching it means no handler completed the response; user chains are
/// expected to terminate with a [`NotFoundHandler`](crate::NotFoundHandler)
/// before it.
pub struct RealLastHandler;

impl HttpHandler for RealLastHandler {
    fn handle<'a>(
        &'a self,
        _context: &'a mut HttpContext,
        _next: Next<'a>,
    ) -> LocalBoxFuture<'a, HandlerResult> {
        Box::pin(async { Err("request reached the last handler without a response".into()) })
    }
}
