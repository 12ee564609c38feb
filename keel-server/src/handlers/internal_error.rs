use crate::context::HttpContext;
use crate::error::HandlerResult;
use crate::handler::{HttpHandler, Next};
use keel_http::LocalBoxFuture;

/// Wraps the rest of the chain and converts handler failures into a 500
/// response, as long as the response head has not been flushed yet.
pub struct InternalErrorHandler;

impl HttpHandler for InternalErrorHandler {
    fn handle<'a>(
        &'a self,
        context: &'a mut HttpContext,
        next: Next<'a>,
    ) -> LocalBoxFuture<'a, HandlerResult> {
        Box::pin(async move {
            match next.invoke(&mut *context).await {
                Ok(()) => Ok(()),
                Err(err) => {
                    tracing::error!(
                        client = %context.peer_address,
                        error = %err,
                        "request handler failed"
                    );
                    if context.response.headers_flushed() {
                        // the head is already on the wire, the connection
                        // must close instead
                        return Err(err);
                    }
                    context.response.reply_500().await?;
                    Ok(())
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_core::Container;
    use keel_http::stream::VecOutputStream;
    use keel_http::{HttpRequest, HttpResponse};
    use std::rc::Rc;

    struct Failing;

    impl HttpHandler for Failing {
        fn handle<'a>(
            &'a self,
            _context: &'a mut HttpContext,
            _next: Next<'a>,
        ) -> LocalBoxFuture<'a, HandlerResult> {
            Box::pin(async { Err("boom".into()) })
        }
    }

    struct FailAfterFlush;

    impl HttpHandler for FailAfterFlush {
        fn handle<'a>(
            &'a self,
            context: &'a mut HttpContext,
            _next: Next<'a>,
        ) -> LocalBoxFuture<'a, HandlerResult> {
            Box::pin(async move {
                context.response.write_body("partial").await?;
                Err("boom".into())
            })
        }
    }

    fn context_with_sink() -> (HttpContext, VecOutputStream) {
        let sink = VecOutputStream::new();
        let mut response = HttpResponse::new();
        response.set_body_stream(Box::new(sink.clone()));
        let ctx = HttpContext::new(
            HttpRequest::new(),
            response,
            "127.0.0.1:0".parse().unwrap(),
            Rc::new(Container::new()),
        );
        (ctx, sink)
    }

    #[tokio::test]
    async fn converts_failure_into_500() {
        let chain: Vec<Rc<dyn HttpHandler>> = vec![Rc::new(Failing)];
        let (mut ctx, sink) = context_with_sink();
        InternalErrorHandler
            .handle(&mut ctx, Next::new(&chain))
            .await
            .unwrap();
        let text = String::from_utf8(sink.collected().to_vec()).unwrap();
        assert!(text.contains(" 500 Internal Server Error\r\n"));
    }

    #[tokio::test]
    async fn propagates_failure_after_headers_flushed() {
        let chain: Vec<Rc<dyn HttpHandler>> = vec![Rc::new(FailAfterFlush)];
        let (mut ctx, _sink) = context_with_sink();
        let err = InternalErrorHandler
            .handle(&mut ctx, Next::new(&chain))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }
}
