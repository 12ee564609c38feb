//! End-to-end static file serving behind a live server.

use keel_server::{HttpHandler, NotFoundHandler};
use keel_static::StaticFileHandler;
use keel_test::{RawClient, TestServer};
use std::rc::Rc;

#[tokio::test]
async fn serves_files_then_304_on_revalidation() {
    tokio::task::LocalSet::new()
        .run_until(async {
            let dir = tempfile::tempdir().unwrap();
            std::fs::write(dir.path().join("hello.txt"), b"world").unwrap();
            let handlers: Vec<Rc<dyn HttpHandler>> = vec![
                Rc::new(StaticFileHandler::new(
                    "/static",
                    dir.path().to_str().unwrap(),
                )),
                Rc::new(NotFoundHandler),
            ];
            let ts = TestServer::start(handlers).await;
            let mut client = RawClient::connect(ts.address).await.unwrap();

            client
                .send(b"GET /static/hello.txt HTTP/1.1\r\nHost: localhost\r\n\r\n")
                .await
                .unwrap();
            let first = client.read_response().await.unwrap();
            assert_eq!(first.status_code(), 200);
            assert_eq!(first.header("Content-Type"), Some("text/plain"));
            assert_eq!(first.body_text(), "world");
            let last_modified = first.header("Last-Modified").unwrap().to_string();
            assert!(last_modified.ends_with("GMT"));

            client
                .send(
                    format!(
                        "GET /static/hello.txt HTTP/1.1\r\nHost: localhost\r\n\
                         If-Modified-Since: {last_modified}\r\nConnection: close\r\n\r\n"
                    )
                    .as_bytes(),
                )
                .await
                .unwrap();
            let second = client.read_response().await.unwrap();
            assert_eq!(second.status_code(), 304);
            assert!(second.body.is_empty());
            ts.stop().await;
        })
        .await;
}

#[tokio::test]
async fn missing_files_fall_through_to_404() {
    tokio::task::LocalSet::new()
        .run_until(async {
            let dir = tempfile::tempdir().unwrap();
            let handlers: Vec<Rc<dyn HttpHandler>> = vec![
                Rc::new(StaticFileHandler::new(
                    "/static",
                    dir.path().to_str().unwrap(),
                )),
                Rc::new(NotFoundHandler),
            ];
            let ts = TestServer::start(handlers).await;
            let mut client = RawClient::connect(ts.address).await.unwrap();
            client
                .send(b"GET /static/missing.txt HTTP/1.1\r\nHost: localhost\r\n\r\n")
                .await
                .unwrap();
            let response = client.read_response().await.unwrap();
            assert_eq!(response.status_code(), 404);
            ts.stop().await;
        })
        .await;
}
