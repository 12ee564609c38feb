use crate::context::HttpContext;
use crate::error::HandlerResult;
use crate::handler::{HttpHandler, Next};
use keel_http::LocalBoxFuture;

/// Terminal handler backed by a plain function or closure.
pub struct FunctionHandler<F> {
    func: F,
}

impl<F> FunctionHandler<F>
where
    F: for<'a> Fn(&'a mut HttpContext) -> LocalBoxFuture<'a, HandlerResult>,
{
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> HttpHandler for FunctionHandler<F>
where
    F: for<'a> Fn(&'a mut HttpContext) -> LocalBoxFuture<'a, HandlerResult>,
{
    fn handle<'a>(
        &'a self,
        context: &'a mut HttpContext,
        _next: Next<'a>,
    ) -> LocalBoxFuture<'a, HandlerResult> {
        (self.func)(context)
    }
}

/// Helper pinning the function type for [`FunctionHandler::new`].
///
/// Plain `fn` items satisfy the bound directly; closures usually cannot
/// tie their output lifetime to the context argument.
pub fn handler_fn<F>(func: F) -> FunctionHandler<F>
where
    F: for<'a> Fn(&'a mut HttpContext) -> LocalBoxFuture<'a, HandlerResult>,
{
    FunctionHandler::new(func)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::Next;
    use keel_core::Container;
    use keel_http::stream::VecOutputStream;
    use keel_http::{HttpRequest, HttpResponse};
    use std::rc::Rc;

    fn hello<'a>(context: &'a mut HttpContext) -> LocalBoxFuture<'a, HandlerResult> {
        Box::pin(async move {
            context.response.reply("hello", "text/plain").await?;
            Ok(())
        })
    }

    #[tokio::test]
    async fn function_handler_invokes_the_function() {
        let sink = VecOutputStream::new();
        let mut response = HttpResponse::new();
        response.set_body_stream(Box::new(sink.clone()));
        let mut ctx = HttpContext::new(
            HttpRequest::new(),
            response,
            "127.0.0.1:0".parse().unwrap(),
            Rc::new(Container::new()),
        );
        let handler = handler_fn(hello);
        handler.handle(&mut ctx, Next::new(&[])).await.unwrap();
        let text = String::from_utf8(sink.collected().to_vec()).unwrap();
        assert!(text.ends_with("\r\n\r\nhello"));
    }
}
