//! Request routing for the Keel server.
//!
//! Two tiers: an exact `(method, path)` map for routes without wildcard
//! segments, and a prefix tree keyed by path segment for routes using the
//! reserved `*` (exactly one segment) and `**` (all remaining segments)
//! placeholders. Lookup precedence at every tree level is literal, then
//! `*`, then `**`.

mod extractors;
mod tree;

pub use extractors::{Extractor, ExtractorSet, ParamsFunctionHandler, PathFragment, Query};

use bytes::Bytes;
use keel_http::{LocalBoxFuture, Uri};
use keel_server::{HandlerResult, HttpContext, HttpHandler, Next};
use std::collections::HashMap;
use std::rc::Rc;
use tree::RoutingNode;

fn is_wildcard_route(fragments: &[Bytes]) -> bool {
    fragments
        .iter()
        .any(|f| f.as_ref() == b"*" || f.as_ref() == b"**")
}

/// Routing middleware dispatching to registered sub-handlers.
///
/// Unmatched requests delegate to `next` (typically a 404 handler), so a
/// missing route is not an error.
#[derive(Default)]
pub struct RoutingHandler {
    full_path: HashMap<(Bytes, Bytes), Rc<dyn HttpHandler>>,
    tree: RoutingNode,
}

impl RoutingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Associate a handler with a method and path.
    ///
    /// A path is a wildcard route iff it contains a whole segment equal to
    /// `*` or `**`; a `*` embedded in a segment (e.g. `/abc/*123`) is a
    /// literal and goes to the full-path map. `**` is legal only as the
    /// last segment.
    ///
    /// # Panics
    ///
    /// Panics when `**` is followed by further segments.
    pub fn route(
        &mut self,
        method: impl Into<Bytes>,
        path: impl Into<Bytes>,
        handler: Rc<dyn HttpHandler>,
    ) {
        let method = method.into();
        let path = path.into();
        if !path.contains(&b'*') {
            self.full_path.insert((method, path), handler);
            return;
        }
        let uri = Uri::parse(&path);
        if !is_wildcard_route(uri.path_fragments()) {
            // `*` present but never as a whole segment: a literal path
            self.full_path.insert((method, path), handler);
            return;
        }
        if let Some(position) = uri
            .path_fragments()
            .iter()
            .position(|f| f.as_ref() == b"**")
        {
            assert_eq!(
                position + 1,
                uri.path_fragments().len(),
                "`**` must be the last segment of a route"
            );
        }
        self.tree
            .find_or_create(uri.path_fragments())
            .set_handler(method, handler);
    }

    /// Remove the handler associated with a method and path.
    pub fn remove_route(&mut self, method: &[u8], path: &[u8]) {
        self.full_path
            .retain(|(m, p), _| !(m.as_ref() == method && p.as_ref() == path));
        let uri = Uri::parse(&Bytes::copy_from_slice(path));
        if let Some(node) = self.tree.find_exact(uri.path_fragments()) {
            node.remove_handler(method);
        }
    }

    /// Look up the handler for a method and path, if any.
    pub fn get_route(&self, method: &[u8], path: &[u8]) -> Option<Rc<dyn HttpHandler>> {
        let contains_query = path.contains(&b'?');
        if !contains_query {
            if let Some(handler) = self
                .full_path
                .get(&(Bytes::copy_from_slice(method), Bytes::copy_from_slice(path)))
            {
                return Some(handler.clone());
            }
        }
        let uri = Uri::parse(&Bytes::copy_from_slice(path));
        if contains_query {
            if let Some(handler) = self.full_path.get(&(
                Bytes::copy_from_slice(method),
                uri.path().clone(),
            )) {
                return Some(handler.clone());
            }
        }
        self.tree
            .find(uri.path_fragments())
            .and_then(|node| node.handler(method))
    }

    /// Sugar for function-typed routes with named extractors.
    ///
    /// The extractors resolve against the context before the function is
    /// invoked:
    ///
    /// ```ignore
    /// router.route_fn("GET", "/api/v1/user/*/info", (PathFragment(4),), |ctx, (id,)| {
    ///     Box::pin(async move { ctx.response.reply(format!("user {id:?}"), "text/plain").await?; Ok(()) })
    /// });
    /// ```
    pub fn route_fn<E, F>(
        &mut self,
        method: impl Into<Bytes>,
        path: impl Into<Bytes>,
        extractors: E,
        func: F,
    ) where
        E: ExtractorSet + 'static,
        F: for<'a> Fn(&'a mut HttpContext, E::Output) -> LocalBoxFuture<'a, HandlerResult>
            + 'static,
    {
        self.route(
            method,
            path,
            Rc::new(ParamsFunctionHandler::new(extractors, func)),
        );
    }
}

impl HttpHandler for RoutingHandler {
    fn handle<'a>(
        &'a self,
        context: &'a mut HttpContext,
        next: Next<'a>,
    ) -> LocalBoxFuture<'a, HandlerResult> {
        // resolve before boxing: the chosen handler future borrows context
        let method = context.request.method().clone();
        let url = context.request.url().clone();
        let contains_query = url.contains(&b'?');
        let mut chosen: Option<Rc<dyn HttpHandler>> = None;
        if !contains_query {
            chosen = self.full_path.get(&(method.clone(), url.clone())).cloned();
        }
        if chosen.is_none() {
            // parse via the request so later code reuses the result
            let uri = context.request.uri();
            if contains_query {
                chosen = self
                    .full_path
                    .get(&(method.clone(), uri.path().clone()))
                    .cloned();
            }
            if chosen.is_none() {
                chosen = self
                    .tree
                    .find(uri.path_fragments())
                    .and_then(|node| node.handler(&method));
            }
        }
        match chosen {
            Some(handler) => Box::pin(async move { handler.handle(context, next).await }),
            None => next.invoke(context),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_core::Container;
    use keel_http::stream::VecOutputStream;
    use keel_http::{HttpRequest, HttpResponse};
    use keel_server::NotFoundHandler;

    /// Handler recording its tag into the response body.
    struct Tag(&'static str);

    impl HttpHandler for Tag {
        fn handle<'a>(
            &'a self,
            context: &'a mut HttpContext,
            _next: Next<'a>,
        ) -> LocalBoxFuture<'a, HandlerResult> {
            Box::pin(async move {
                context.response.reply(self.0, "text/plain").await?;
                Ok(())
            })
        }
    }

    fn context_for(method: &'static str, url: &'static str) -> (HttpContext, VecOutputStream) {
        let sink = VecOutputStream::new();
        let mut request = HttpRequest::new();
        request.set_method(Bytes::from_static(method.as_bytes()));
        request.set_url(Bytes::from_static(url.as_bytes()));
        request.set_version(Bytes::from_static(b"HTTP/1.1"));
        let mut response = HttpResponse::new();
        response.set_body_stream(Box::new(sink.clone()));
        response.set_version(Bytes::from_static(b"HTTP/1.1"));
        (
            HttpContext::new(
                request,
                response,
                "127.0.0.1:0".parse().unwrap(),
                Rc::new(Container::new()),
            ),
            sink,
        )
    }

    async fn dispatch(router: &RoutingHandler, method: &'static str, url: &'static str) -> String {
        let tail: Vec<Rc<dyn HttpHandler>> = vec![Rc::new(NotFoundHandler)];
        let (mut ctx, sink) = context_for(method, url);
        router
            .handle(&mut ctx, Next::new(&tail))
            .await
            .unwrap();
        let text = String::from_utf8(sink.collected().to_vec()).unwrap();
        text.split("\r\n\r\n").nth(1).unwrap_or("").to_string()
    }

    fn sample_router() -> RoutingHandler {
        let mut router = RoutingHandler::new();
        router.route("GET", "/", Rc::new(Tag("root")));
        router.route("GET", "/a/b", Rc::new(Tag("literal")));
        router.route("GET", "/a/*", Rc::new(Tag("single")));
        router.route("GET", "/a/**", Rc::new(Tag("rest")));
        router.route("GET", "/api/v1/user/*/info", Rc::new(Tag("user-info")));
        router.route("GET", "/static/**", Rc::new(Tag("static")));
        router.route("GET", "/abc/*123", Rc::new(Tag("partial-literal")));
        router
    }

    #[tokio::test]
    async fn full_path_beats_wildcards() {
        let router = sample_router();
        assert_eq!(dispatch(&router, "GET", "/a/b").await, "literal");
    }

    #[tokio::test]
    async fn single_star_beats_double_star() {
        let router = sample_router();
        assert_eq!(dispatch(&router, "GET", "/a/c").await, "single");
    }

    #[tokio::test]
    async fn double_star_consumes_the_rest() {
        let router = sample_router();
        assert_eq!(dispatch(&router, "GET", "/a/c/d").await, "rest");
        assert_eq!(dispatch(&router, "GET", "/static/js/1.js").await, "static");
    }

    #[tokio::test]
    async fn nested_single_star_route() {
        let router = sample_router();
        assert_eq!(
            dispatch(&router, "GET", "/api/v1/user/42/info").await,
            "user-info"
        );
    }

    #[tokio::test]
    async fn unmatched_path_delegates_to_next() {
        let router = sample_router();
        assert_eq!(
            dispatch(&router, "GET", "/api/v1/user/list").await,
            "Not Found"
        );
    }

    #[tokio::test]
    async fn unmatched_method_delegates_to_next() {
        let router = sample_router();
        assert_eq!(dispatch(&router, "POST", "/a/c").await, "Not Found");
    }

    #[tokio::test]
    async fn partial_wildcard_segment_is_a_literal() {
        let router = sample_router();
        assert_eq!(dispatch(&router, "GET", "/abc/*123").await, "partial-literal");
        assert_eq!(dispatch(&router, "GET", "/abc/x123").await, "Not Found");
    }

    #[tokio::test]
    async fn query_string_is_stripped_for_matching() {
        let router = sample_router();
        assert_eq!(dispatch(&router, "GET", "/a/b?x=1").await, "literal");
        assert_eq!(dispatch(&router, "GET", "/").await, "root");
    }

    #[test]
    fn get_route_and_remove_route() {
        let mut router = sample_router();
        assert!(router.get_route(b"GET", b"/a/b").is_some());
        assert!(router.get_route(b"GET", b"/a/anything").is_some());
        assert!(router.get_route(b"POST", b"/a/b").is_none());
        router.remove_route(b"GET", b"/a/b");
        assert!(
            router.get_route(b"GET", b"/a/b").is_some(),
            "falls back to /a/*"
        );
        router.remove_route(b"GET", b"/a/*");
        // the `*` node still matches structurally, so the method lookup
        // fails there instead of falling through to `**`
        assert!(router.get_route(b"GET", b"/a/anything").is_none());
        assert!(router.get_route(b"GET", b"/a/x/y").is_some(), "`**` still routes");
    }

    #[test]
    #[should_panic(expected = "`**` must be the last segment")]
    fn nested_double_star_is_rejected() {
        let mut router = RoutingHandler::new();
        router.route("GET", "/a/**/b", Rc::new(Tag("bad")));
    }

    fn show_user<'a>(
        ctx: &'a mut HttpContext,
        (id, verbose): (Bytes, Bytes),
    ) -> LocalBoxFuture<'a, HandlerResult> {
        Box::pin(async move {
            let body = format!(
                "{}/{}",
                String::from_utf8_lossy(&id),
                String::from_utf8_lossy(&verbose)
            );
            ctx.response.reply(body, "text/plain").await?;
            Ok(())
        })
    }

    #[tokio::test]
    async fn extractors_resolve_before_invocation() {
        let mut router = RoutingHandler::new();
        router.route_fn(
            "GET",
            "/api/v1/user/*/info",
            (PathFragment(4), Query("verbose")),
            show_user,
        );
        let body = dispatch(&router, "GET", "/api/v1/user/42/info?verbose=yes").await;
        assert_eq!(body, "42/yes");
    }
}
