//! Test harness for Keel integration tests.
//!
//! [`TestServer`] binds a real server on a loopback port inside the
//! current `LocalSet`; [`RawClient`] speaks HTTP/1.x over a plain socket
//! so tests control framing byte by byte (pipelining, partial writes,
//! invalid requests).

use keel_core::Container;
use keel_server::{HttpHandler, HttpServer, ServerConfig};
use std::net::SocketAddr;
use std::rc::Rc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// A started server plus the address it actually bound.
pub struct TestServer {
    pub server: HttpServer,
    pub address: SocketAddr,
}

impl TestServer {
    /// Start a server on an ephemeral loopback port with default limits.
    ///
    /// Must run inside a `LocalSet`.
    pub async fn start(handlers: Vec<Rc<dyn HttpHandler>>) -> Self {
        let config = ServerConfig {
            listen_addresses: vec!["127.0.0.1:0".to_string()],
            ..ServerConfig::default()
        };
        Self::start_with_config(config, handlers).await
    }

    /// Start with custom limits; the listen address is forced to an
    /// ephemeral loopback port.
    pub async fn start_with_config(
        mut config: ServerConfig,
        handlers: Vec<Rc<dyn HttpHandler>>,
    ) -> Self {
        config.listen_addresses = vec!["127.0.0.1:0".to_string()];
        Self::start_with_container(config, Rc::new(Container::new()), handlers).await
    }

    /// Start with a prepared container.
    pub async fn start_with_container(
        config: ServerConfig,
        container: Rc<Container>,
        handlers: Vec<Rc<dyn HttpHandler>>,
    ) -> Self {
        let server = HttpServer::new(container, config, handlers);
        server.start().await.expect("failed to start test server");
        let address = server.local_addresses()[0];
        Self { server, address }
    }

    /// Stop the server and wait for every connection to close.
    pub async fn stop(&self) {
        self.server.stop().await;
    }
}

/// A parsed response head plus its body.
#[derive(Debug)]
pub struct RawResponse {
    pub status_line: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RawResponse {
    /// The numeric status code from the status line.
    pub fn status_code(&self) -> u16 {
        self.status_line
            .split(' ')
            .nth(1)
            .and_then(|code| code.parse().ok())
            .unwrap_or(0)
    }

    /// First header with the given name (case-sensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Plain TCP client for driving the server with raw bytes.
pub struct RawClient {
    stream: TcpStream,
    buffer: Vec<u8>,
}

impl RawClient {
    pub async fn connect(address: SocketAddr) -> std::io::Result<Self> {
        let stream = TcpStream::connect(address).await?;
        stream.set_nodelay(true)?;
        Ok(Self {
            stream,
            buffer: Vec::new(),
        })
    }

    /// Write raw bytes to the socket.
    pub async fn send(&mut self, data: &[u8]) -> std::io::Result<()> {
        self.stream.write_all(data).await?;
        self.stream.flush().await
    }

    /// Read one response: head up to the blank line, then a
    /// `Content-Length` body. Bytes beyond the response stay buffered for
    /// the next call, so pipelined responses read back one by one.
    pub async fn read_response(&mut self) -> std::io::Result<RawResponse> {
        let head_end = loop {
            if let Some(position) = find_blank_line(&self.buffer) {
                break position;
            }
            self.fill_buffer().await?;
        };
        let head = String::from_utf8_lossy(&self.buffer[..head_end]).into_owned();
        let mut lines = head.split("\r\n");
        let status_line = lines.next().unwrap_or_default().to_string();
        let headers: Vec<(String, String)> = lines
            .filter_map(|line| {
                line.split_once(": ")
                    .map(|(key, value)| (key.to_string(), value.to_string()))
            })
            .collect();
        let content_length: usize = headers
            .iter()
            .find(|(key, _)| key == "Content-Length")
            .and_then(|(_, value)| value.parse().ok())
            .unwrap_or(0);
        let total = head_end + 4 + content_length;
        while self.buffer.len() < total {
            self.fill_buffer().await?;
        }
        let body = self.buffer[head_end + 4..total].to_vec();
        self.buffer.drain(..total);
        Ok(RawResponse {
            status_line,
            headers,
            body,
        })
    }

    /// Read exactly `count` raw bytes past the responses parsed so far;
    /// used for response framings `read_response` does not understand
    /// (e.g. chunked bodies).
    pub async fn read_exact_raw(&mut self, count: usize) -> std::io::Result<Vec<u8>> {
        while self.buffer.len() < count {
            self.fill_buffer().await?;
        }
        Ok(self.buffer.drain(..count).collect())
    }

    /// Read until the server closes the connection; returns everything,
    /// including previously buffered bytes.
    pub async fn read_to_end(&mut self) -> std::io::Result<Vec<u8>> {
        let mut all = std::mem::take(&mut self.buffer);
        self.stream.read_to_end(&mut all).await?;
        Ok(all)
    }

    /// True when the server closed and no buffered bytes remain.
    pub async fn at_eof(&mut self) -> std::io::Result<bool> {
        if !self.buffer.is_empty() {
            return Ok(false);
        }
        let mut probe = [0u8; 64];
        let read = self.stream.read(&mut probe).await?;
        if read > 0 {
            self.buffer.extend_from_slice(&probe[..read]);
        }
        Ok(read == 0)
    }

    async fn fill_buffer(&mut self) -> std::io::Result<()> {
        let mut chunk = [0u8; 4096];
        let read = self.stream.read(&mut chunk).await?;
        if read == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "connection closed mid-response",
            ));
        }
        self.buffer.extend_from_slice(&chunk[..read]);
        Ok(())
    }
}

fn find_blank_line(buffer: &[u8]) -> Option<usize> {
    buffer.windows(4).position(|window| window == b"\r\n\r\n")
}
