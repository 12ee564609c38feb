use crate::context::HttpContext;
use crate::error::HandlerResult;
use keel_http::LocalBoxFuture;
use std::rc::Rc;

/// One link of the request handler chain.
///
/// A handler either completes the response or delegates by invoking `next`.
/// Handlers run strictly sequentially for one request.
pub trait HttpHandler {
    fn handle<'a>(
        &'a self,
        context: &'a mut HttpContext,
        next: Next<'a>,
    ) -> LocalBoxFuture<'a, HandlerResult>;
}

/// The remainder of the handler chain after the current handler.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    handlers: &'a [Rc<dyn HttpHandler>],
}

impl<'a> Next<'a> {
    pub fn new(handlers: &'a [Rc<dyn HttpHandler>]) -> Self {
        Self { handlers }
    }

    /// Invoke the next handler in the chain.
    ///
    /// An exhausted chain resolves to an error; servers append a sentinel
    /// last handler so user chains should terminate with a 404 handler
    /// before it.
    pub fn invoke<'b>(self, context: &'b mut HttpContext) -> LocalBoxFuture<'b, HandlerResult>
    where
        'a: 'b,
    {
        match self.handlers.split_first() {
            Some((head, rest)) => head.handle(context, Next { handlers: rest }),
            None => Box::pin(async { Err("handler chain exhausted".into()) }),
        }
    }

    /// Number of handlers remaining.
    pub fn remaining(&self) -> usize {
        self.handlers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_core::Container;
    use keel_http::{HttpRequest, HttpResponse};

    struct Tag(&'static str);

    impl HttpHandler for Tag {
        fn handle<'a>(
            &'a self,
            context: &'a mut HttpContext,
            next: Next<'a>,
        ) -> LocalBoxFuture<'a, HandlerResult> {
            Box::pin(async move {
                context
                    .response
                    .headers_mut()
                    .add_additional_header("X-Trace".into(), self.0.into());
                next.invoke(context).await
            })
        }
    }

    struct Stop;

    impl HttpHandler for Stop {
        fn handle<'a>(
            &'a self,
            _context: &'a mut HttpContext,
            _next: Next<'a>,
        ) -> LocalBoxFuture<'a, HandlerResult> {
            Box::pin(async { Ok(()) })
        }
    }

    fn context() -> HttpContext {
        HttpContext::new(
            HttpRequest::new(),
            HttpResponse::new(),
            "127.0.0.1:0".parse().unwrap(),
            Rc::new(Container::new()),
        )
    }

    #[tokio::test]
    async fn handlers_run_in_order() {
        let chain: Vec<Rc<dyn HttpHandler>> =
            vec![Rc::new(Tag("first")), Rc::new(Tag("second")), Rc::new(Stop)];
        let mut ctx = context();
        Next::new(&chain).invoke(&mut ctx).await.unwrap();
        let mut traces = Vec::new();
        ctx.response.headers().foreach(|key, value| {
            if key.as_ref() == b"X-Trace" {
                traces.push(String::from_utf8_lossy(value).into_owned());
            }
        });
        assert_eq!(traces, ["first", "second"]);
    }

    #[tokio::test]
    async fn exhausted_chain_is_an_error() {
        let chain: Vec<Rc<dyn HttpHandler>> = vec![Rc::new(Tag("only"))];
        let mut ctx = context();
        let err = Next::new(&chain).invoke(&mut ctx).await.unwrap_err();
        assert!(err.to_string().contains("exhausted"));
    }
}
