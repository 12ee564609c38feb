//! End-to-end HTTP/1.x server tests over real loopback sockets.

use bytes::Bytes;
use keel_http::LocalBoxFuture;
use keel_server::{
    HandlerResult, HttpContext, HttpHandler, InternalErrorHandler, Next, ServerConfig,
};
use keel_test::{RawClient, TestServer};
use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

/// Echoes method, url, version and the sorted request headers.
struct HeaderEcho;

impl HttpHandler for HeaderEcho {
    fn handle<'a>(
        &'a self,
        context: &'a mut HttpContext,
        _next: Next<'a>,
    ) -> LocalBoxFuture<'a, HandlerResult> {
        Box::pin(async move {
            let mut text = format!(
                "{} {} {}\n",
                String::from_utf8_lossy(context.request.method()),
                String::from_utf8_lossy(context.request.url()),
                String::from_utf8_lossy(context.request.version()),
            );
            let mut headers = Vec::new();
            context.request.headers().foreach(|key, value| {
                headers.push(format!(
                    "{}: {}",
                    String::from_utf8_lossy(key),
                    String::from_utf8_lossy(value)
                ));
            });
            headers.sort();
            text.push_str(&headers.join("\n"));
            context.response.reply(text, "text/plain").await?;
            Ok(())
        })
    }
}

/// Echoes the request body back.
struct BodyEcho;

impl HttpHandler for BodyEcho {
    fn handle<'a>(
        &'a self,
        context: &'a mut HttpContext,
        _next: Next<'a>,
    ) -> LocalBoxFuture<'a, HandlerResult> {
        Box::pin(async move {
            let body = context.request.read_body().await?;
            context.response.reply(body, "text/plain").await?;
            Ok(())
        })
    }
}

/// Waits for a semaphore permit, then replies with an increasing serial.
struct Gated {
    gate: Rc<tokio::sync::Semaphore>,
    serial: Cell<u32>,
}

impl HttpHandler for Gated {
    fn handle<'a>(
        &'a self,
        context: &'a mut HttpContext,
        _next: Next<'a>,
    ) -> LocalBoxFuture<'a, HandlerResult> {
        Box::pin(async move {
            let permit = self.gate.acquire().await.map_err(|e| e.to_string())?;
            permit.forget();
            let serial = self.serial.get();
            self.serial.set(serial + 1);
            context
                .response
                .reply(serial.to_string(), "text/plain")
                .await?;
            Ok(())
        })
    }
}

/// Declares a Content-Length that does not match the written body.
struct MismatchedLength;

impl HttpHandler for MismatchedLength {
    fn handle<'a>(
        &'a self,
        context: &'a mut HttpContext,
        _next: Next<'a>,
    ) -> LocalBoxFuture<'a, HandlerResult> {
        Box::pin(async move {
            context
                .response
                .set_status("200", "OK");
            context
                .response
                .headers_mut()
                .set_content_length(Bytes::from_static(b"999"));
            context.response.write_body("hi").await?;
            Ok(())
        })
    }
}

/// Writes a chunked-framed body by hand.
struct ChunkedReply;

impl HttpHandler for ChunkedReply {
    fn handle<'a>(
        &'a self,
        context: &'a mut HttpContext,
        _next: Next<'a>,
    ) -> LocalBoxFuture<'a, HandlerResult> {
        Box::pin(async move {
            context.response.set_status("200", "OK");
            context
                .response
                .headers_mut()
                .set_transfer_encoding(Bytes::from_static(b"chunked"));
            context.response.write_body("2\r\nhi\r\n0\r\n\r\n").await?;
            Ok(())
        })
    }
}

/// Always fails.
struct Failing;

impl HttpHandler for Failing {
    fn handle<'a>(
        &'a self,
        _context: &'a mut HttpContext,
        _next: Next<'a>,
    ) -> LocalBoxFuture<'a, HandlerResult> {
        Box::pin(async { Err("handler blew up".into()) })
    }
}

fn single(handler: impl HttpHandler + 'static) -> Vec<Rc<dyn HttpHandler>> {
    vec![Rc::new(handler)]
}

#[tokio::test]
async fn header_echo_with_connection_close() {
    tokio::task::LocalSet::new()
        .run_until(async {
            let ts = TestServer::start(single(HeaderEcho)).await;
            let mut client = RawClient::connect(ts.address).await.unwrap();
            client
                .send(
                    b"GET /test_headers HTTP/1.1\r\nHost: localhost\r\n\
                      Connection: close\r\nUser-Agent: TestClient\r\n\r\n",
                )
                .await
                .unwrap();
            let response = client.read_response().await.unwrap();
            assert_eq!(response.status_line, "HTTP/1.1 200 OK");
            assert_eq!(response.header("Server"), Some("keel"));
            assert!(response.header("Date").unwrap().ends_with("GMT"));
            assert_eq!(response.header("Connection"), Some("close"));
            let expected = "GET /test_headers HTTP/1.1\n\
                            Connection: close\n\
                            Host: localhost\n\
                            User-Agent: TestClient";
            assert_eq!(response.body_text(), expected);
            assert_eq!(
                response.header("Content-Length"),
                Some(expected.len().to_string().as_str())
            );
            assert!(client.at_eof().await.unwrap());
            ts.stop().await;
        })
        .await;
}

#[tokio::test]
async fn chunked_request_body_is_decoded() {
    tokio::task::LocalSet::new()
        .run_until(async {
            let ts = TestServer::start(single(BodyEcho)).await;
            let mut client = RawClient::connect(ts.address).await.unwrap();
            client
                .send(
                    b"POST /echo HTTP/1.1\r\nHost: localhost\r\n\
                      Connection: close\r\nTransfer-Encoding: chunked\r\n\r\n\
                      c\r\nHello World \r\n7\r\nChunked\r\n0\r\n\r\n",
                )
                .await
                .unwrap();
            let response = client.read_response().await.unwrap();
            assert_eq!(response.status_code(), 200);
            assert_eq!(response.header("Content-Length"), Some("19"));
            assert_eq!(response.body_text(), "Hello World Chunked");
            ts.stop().await;
        })
        .await;
}

#[tokio::test]
async fn pipelined_requests_are_answered_in_order() {
    tokio::task::LocalSet::new()
        .run_until(async {
            let ts = TestServer::start(single(BodyEcho)).await;
            let mut client = RawClient::connect(ts.address).await.unwrap();
            // both requests in one write; first keep-alive, second close
            client
                .send(
                    b"POST /a HTTP/1.1\r\nHost: localhost\r\nConnection: keep-alive\r\n\
                      Content-Length: 5\r\n\r\nfirst\
                      POST /b HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\
                      Content-Length: 6\r\n\r\nsecond",
                )
                .await
                .unwrap();
            let first = client.read_response().await.unwrap();
            assert_eq!(first.body_text(), "first");
            assert_eq!(first.header("Connection"), Some("keep-alive"));
            let second = client.read_response().await.unwrap();
            assert_eq!(second.body_text(), "second");
            assert_eq!(second.header("Connection"), Some("close"));
            assert!(client.at_eof().await.unwrap());
            ts.stop().await;
        })
        .await;
}

#[tokio::test]
async fn pipelined_bodies_map_to_their_requests() {
    tokio::task::LocalSet::new()
        .run_until(async {
            let ts = TestServer::start(single(BodyEcho)).await;
            let mut client = RawClient::connect(ts.address).await.unwrap();
            let mut payload = Vec::new();
            for body in ["alpha", "beta!", "gamma"] {
                payload.extend_from_slice(
                    format!(
                        "POST /echo HTTP/1.1\r\nHost: localhost\r\nContent-Length: {}\r\n\r\n{}",
                        body.len(),
                        body
                    )
                    .as_bytes(),
                );
            }
            client.send(&payload).await.unwrap();
            for body in ["alpha", "beta!", "gamma"] {
                let response = client.read_response().await.unwrap();
                assert_eq!(response.body_text(), body);
            }
            ts.stop().await;
        })
        .await;
}

#[tokio::test]
async fn http11_keeps_alive_by_default() {
    tokio::task::LocalSet::new()
        .run_until(async {
            let ts = TestServer::start(single(BodyEcho)).await;
            let mut client = RawClient::connect(ts.address).await.unwrap();
            for _ in 0..2 {
                client
                    .send(b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n")
                    .await
                    .unwrap();
                let response = client.read_response().await.unwrap();
                assert_eq!(response.header("Connection"), Some("keep-alive"));
            }
            ts.stop().await;
        })
        .await;
}

#[tokio::test]
async fn http10_closes_by_default() {
    tokio::task::LocalSet::new()
        .run_until(async {
            let ts = TestServer::start(single(BodyEcho)).await;
            let mut client = RawClient::connect(ts.address).await.unwrap();
            client
                .send(b"GET / HTTP/1.0\r\nHost: localhost\r\n\r\n")
                .await
                .unwrap();
            let response = client.read_response().await.unwrap();
            assert_eq!(response.header("Connection"), Some("close"));
            assert!(client.at_eof().await.unwrap());
            ts.stop().await;
        })
        .await;
}

#[tokio::test]
async fn content_length_mismatch_closes_the_connection() {
    tokio::task::LocalSet::new()
        .run_until(async {
            let ts = TestServer::start(single(MismatchedLength)).await;
            let mut client = RawClient::connect(ts.address).await.unwrap();
            client
                .send(b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n")
                .await
                .unwrap();
            // declared length never arrives; the server closes instead
            let all = client.read_to_end().await.unwrap();
            let text = String::from_utf8_lossy(&all);
            assert!(text.contains("Content-Length: 999"));
            assert!(text.ends_with("hi"));
            ts.stop().await;
        })
        .await;
}

#[tokio::test]
async fn chunked_response_keeps_the_connection() {
    tokio::task::LocalSet::new()
        .run_until(async {
            let ts = TestServer::start(single(ChunkedReply)).await;
            let mut client = RawClient::connect(ts.address).await.unwrap();
            client
                .send(b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n")
                .await
                .unwrap();
            let response = client.read_response().await.unwrap();
            assert_eq!(response.header("Transfer-Encoding"), Some("chunked"));
            assert_eq!(response.header("Connection"), Some("keep-alive"));
            let chunks = client.read_exact_raw("2\r\nhi\r\n0\r\n\r\n".len()).await.unwrap();
            assert_eq!(chunks, b"2\r\nhi\r\n0\r\n\r\n");
            // still open: a second request round-trips
            client
                .send(b"GET / HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
                .await
                .unwrap();
            let second = client.read_response().await.unwrap();
            assert_eq!(second.status_code(), 200);
            ts.stop().await;
        })
        .await;
}

#[tokio::test]
async fn bounded_request_queue_applies_back_pressure() {
    tokio::task::LocalSet::new()
        .run_until(async {
            let gate = Rc::new(tokio::sync::Semaphore::new(0));
            let handler = Gated {
                gate: gate.clone(),
                serial: Cell::new(0),
            };
            let config = ServerConfig {
                request_queue_size: 2,
                ..ServerConfig::default()
            };
            let ts = TestServer::start_with_config(config, single(handler)).await;
            let mut client = RawClient::connect(ts.address).await.unwrap();
            let mut payload = Vec::new();
            for _ in 0..6 {
                payload.extend_from_slice(b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n");
            }
            client.send(&payload).await.unwrap();
            tokio::time::sleep(Duration::from_millis(200)).await;
            // one processing + two queued + one blocked mid-push; the rest
            // stay unread in the socket
            let received = ts.server.metrics().requests_received;
            assert!(
                received <= 4,
                "reading should stop once the queue is full, got {received}"
            );
            gate.add_permits(100);
            for expected in 0..6 {
                let response = client.read_response().await.unwrap();
                assert_eq!(response.body_text(), expected.to_string());
            }
            ts.stop().await;
        })
        .await;
}

#[tokio::test]
async fn invalid_request_format_gets_canned_400() {
    tokio::task::LocalSet::new()
        .run_until(async {
            let ts = TestServer::start(single(HeaderEcho)).await;
            let mut client = RawClient::connect(ts.address).await.unwrap();
            client.send(b"not an http request\r\n\r\n").await.unwrap();
            let all = client.read_to_end().await.unwrap();
            let text = String::from_utf8_lossy(&all);
            assert!(text.starts_with("HTTP/1.0 400 Bad Request\r\n"));
            assert!(text.contains("Error: invalid http request format."));
            assert_eq!(ts.server.metrics().request_invalid_format_errors, 1);
            ts.stop().await;
        })
        .await;
}

#[tokio::test]
async fn initial_request_bytes_limit_gets_canned_400() {
    tokio::task::LocalSet::new()
        .run_until(async {
            let config = ServerConfig {
                max_initial_request_bytes: 32,
                ..ServerConfig::default()
            };
            let ts = TestServer::start_with_config(config, single(HeaderEcho)).await;
            let mut client = RawClient::connect(ts.address).await.unwrap();
            client
                .send(b"GET /a-very-long-path-exceeding-the-limit HTTP/1.1\r\n")
                .await
                .unwrap();
            let all = client.read_to_end().await.unwrap();
            let text = String::from_utf8_lossy(&all);
            assert!(text.contains("Error: reached bytes limitation of initial request data."));
            assert_eq!(ts.server.metrics().request_initial_size_errors, 1);
            ts.stop().await;
        })
        .await;
}

#[tokio::test]
async fn initial_request_packets_limit_gets_canned_400() {
    tokio::task::LocalSet::new()
        .run_until(async {
            let config = ServerConfig {
                max_initial_request_packets: 2,
                ..ServerConfig::default()
            };
            let ts = TestServer::start_with_config(config, single(HeaderEcho)).await;
            let mut client = RawClient::connect(ts.address).await.unwrap();
            for part in [&b"GET "[..], b"/slow ", b"HTTP/1.1\r\n"] {
                client.send(part).await.unwrap();
                tokio::time::sleep(Duration::from_millis(40)).await;
            }
            let all = client.read_to_end().await.unwrap();
            let text = String::from_utf8_lossy(&all);
            assert!(
                text.contains("Error: reached packets limitation of initial request data."),
                "got: {text}"
            );
            ts.stop().await;
        })
        .await;
}

#[tokio::test]
async fn idle_connection_times_out_without_a_response() {
    tokio::task::LocalSet::new()
        .run_until(async {
            let config = ServerConfig {
                request_timeout: Duration::from_millis(200),
                ..ServerConfig::default()
            };
            let ts = TestServer::start_with_config(config, single(HeaderEcho)).await;
            let mut client = RawClient::connect(ts.address).await.unwrap();
            let all = tokio::time::timeout(Duration::from_secs(5), client.read_to_end())
                .await
                .expect("connection should close after the timeout")
                .unwrap();
            assert!(all.is_empty(), "no headers were seen, no response is written");
            assert!(ts.server.metrics().request_timeout_errors >= 1);
            ts.stop().await;
        })
        .await;
}

#[tokio::test]
async fn internal_error_handler_converts_failures_to_500() {
    tokio::task::LocalSet::new()
        .run_until(async {
            let handlers: Vec<Rc<dyn HttpHandler>> =
                vec![Rc::new(InternalErrorHandler), Rc::new(Failing)];
            let ts = TestServer::start(handlers).await;
            let mut client = RawClient::connect(ts.address).await.unwrap();
            client
                .send(b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n")
                .await
                .unwrap();
            let response = client.read_response().await.unwrap();
            assert_eq!(response.status_code(), 500);
            assert_eq!(response.body_text(), "Internal Server Error");
            // the 500 response is well-framed, so the connection survives
            client
                .send(b"GET / HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
                .await
                .unwrap();
            assert_eq!(client.read_response().await.unwrap().status_code(), 500);
            ts.stop().await;
        })
        .await;
}

#[tokio::test]
async fn unhandled_failure_closes_without_a_response() {
    tokio::task::LocalSet::new()
        .run_until(async {
            let ts = TestServer::start(single(Failing)).await;
            let mut client = RawClient::connect(ts.address).await.unwrap();
            client
                .send(b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n")
                .await
                .unwrap();
            let all = client.read_to_end().await.unwrap();
            assert!(all.is_empty());
            ts.stop().await;
        })
        .await;
}

#[tokio::test]
async fn metrics_track_connections_and_requests() {
    tokio::task::LocalSet::new()
        .run_until(async {
            let ts = TestServer::start(single(HeaderEcho)).await;
            let mut client = RawClient::connect(ts.address).await.unwrap();
            client
                .send(b"GET / HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
                .await
                .unwrap();
            client.read_response().await.unwrap();
            assert!(client.at_eof().await.unwrap());
            // the connection unregisters itself shortly after the close
            for _ in 0..50 {
                if ts.server.connection_count() == 0 {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            let metrics = ts.server.metrics();
            assert_eq!(metrics.total_connections, 1);
            assert_eq!(metrics.requests_received, 1);
            assert_eq!(ts.server.connection_count(), 0);
            ts.stop().await;
        })
        .await;
}
