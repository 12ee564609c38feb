use crate::context::HttpContext;
use crate::error::HandlerResult;
use crate::handler::{HttpHandler, Next};
use keel_http::LocalBoxFuture;

/// Terminal handler replying 404 Not Found to everything.
pub struct NotFoundHandler;

impl HttpHandler for NotFoundHandler {
    fn handle<'a>(
        &'a self,
        context: &'a mut HttpContext,
        _next: Next<'a>,
    ) -> LocalBoxFuture<'a, HandlerResult> {
        Box::pin(async move {
            context.response.reply_404().await?;
            Ok(())
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

    #[tokio::test]
    async fn replies_404_with_canned_body() {
        let sink = VecOutputStream::new();
        let mut response = HttpResponse::new();
        response.set_body_stream(Box::new(sink.clone()));
        let mut ctx = HttpContext::new(
            HttpRequest::new(),
            response,
            "127.0.0.1:0".parse().unwrap(),
            Rc::new(Container::new()),
        );
        NotFoundHandler
            .handle(&mut ctx, Next::new(&[]))
            .await
            .unwrap();
        let text = String::from_utf8(sink.collected().to_vec()).unwrap();
        assert!(text.contains(" 404 Not Found\r\n"));
        assert!(text.ends_with("\r\n\r\nNot Found"));
    }
}
