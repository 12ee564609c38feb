mod request_stream;
mod response_stream;

pub(crate) use request_stream::RequestBodyStream;
pub(crate) use response_stream::ResponseBodyStream;

use crate::context::HttpContext;
use crate::error::HandlerError;
use crate::handler::Next;
use crate::queue::BoundedQueue;
use crate::server::ServerShared;
use bytes::{Buf, Bytes, BytesMut};
use keel_http::parser::{Consumed, Http1Parser, ParseEvents};
use keel_http::{HttpRequest, HttpResponse, Packet, StreamError};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::io::IoSlice;
use std::net::SocketAddr;
use std::rc::{Rc, Weak};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

// Canned error responses, written best-effort by the reply loop after the
// receive loop recorded the failure and shut the connection down.
const REACHED_BYTES_LIMITATION_RESPONSE: &str = "HTTP/1.0 400 Bad Request\r\n\
    Content-Type: text/plain;charset=utf-8\r\n\
    Content-Length: 58\r\n\
    Connection: close\r\n\r\n\
    Error: reached bytes limitation of initial request data.\r\n";

const REACHED_PACKETS_LIMITATION_RESPONSE: &str = "HTTP/1.0 400 Bad Request\r\n\
    Content-Type: text/plain;charset=utf-8\r\n\
    Content-Length: 60\r\n\
    Connection: close\r\n\r\n\
    Error: reached packets limitation of initial request data.\r\n";

const INVALID_FORMAT_RESPONSE: &str = "HTTP/1.0 400 Bad Request\r\n\
    Content-Type: text/plain;charset=utf-8\r\n\
    Content-Length: 37\r\n\
    Connection: close\r\n\r\n\
    Error: invalid http request format.\r\n";

/// Observable connection states, for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Initial,
    Started,
    ReceiveRequestMessageBegin,
    ReceiveRequestUrl,
    ReceiveRequestHeaderField,
    ReceiveRequestHeaderValue,
    ReceiveRequestHeadersComplete,
    ReceiveRequestBody,
    ReceiveRequestMessageComplete,
    Closing,
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A request whose headers completed, waiting for the reply loop.
pub(crate) struct RequestEntry {
    request: HttpRequest,
    id: u64,
    has_body: bool,
    content_length: Option<u64>,
}

/// One request body chunk, tagged with its request id.
pub(crate) struct BodyEntry {
    pub(crate) data: Bytes,
    pub(crate) id: u64,
    pub(crate) is_end: bool,
}

/// A url, header field or header value possibly split across reads.
///
/// The first slice is kept as a zero-copy view; a second slice forces a
/// merge into an owned buffer.
#[derive(Default)]
struct MergeSlot {
    view: Bytes,
    merged: Option<BytesMut>,
}

impl MergeSlot {
    fn push(&mut self, data: Bytes) {
        if let Some(merged) = &mut self.merged {
            merged.extend_from_slice(&data);
        } else if self.view.is_empty() {
            self.view = data;
        } else {
            let mut merged = BytesMut::with_capacity(self.view.len() + data.len());
            merged.extend_from_slice(&self.view);
            merged.extend_from_slice(&data);
            self.view = Bytes::new();
            self.merged = Some(merged);
        }
    }

    fn take(&mut self) -> Bytes {
        match self.merged.take() {
            Some(merged) => merged.freeze(),
            None => std::mem::take(&mut self.view),
        }
    }
}

/// Receive-loop state for the request currently being assembled.
struct MessageAssembly {
    request_id: u64,
    request: HttpRequest,
    url: MergeSlot,
    field: MergeSlot,
    value: MergeSlot,
    body_buffers: Vec<Bytes>,
    request_enqueued: bool,
    received_bytes: usize,
    received_packets: usize,
}

impl MessageAssembly {
    fn new(request_id: u64) -> Self {
        Self {
            request_id,
            request: HttpRequest::new(),
            url: MergeSlot::default(),
            field: MergeSlot::default(),
            value: MergeSlot::default(),
            body_buffers: Vec::new(),
            request_enqueued: false,
            received_bytes: 0,
            received_packets: 0,
        }
    }

    fn commit_header(&mut self) {
        let field = self.field.take();
        let value = self.value.take();
        if !field.is_empty() {
            self.request.headers_mut().set_header(field, value);
        }
    }
}

/// Parser callbacks for the receive loop.
///
/// Only pushes data into the assembly and advances the observable state;
/// never writes to the socket.
struct ReceiveEvents<'a> {
    connection: &'a Http11Connection,
    msg: &'a mut MessageAssembly,
}

impl ParseEvents for ReceiveEvents<'_> {
    fn on_message_begin(&mut self) {
        if self.connection.state.get() == ConnectionState::Started {
            self.connection
                .state
                .set(ConnectionState::ReceiveRequestMessageBegin);
        }
    }

    fn on_url(&mut self, data: Bytes) {
        if self.connection.state.get() == ConnectionState::ReceiveRequestMessageBegin {
            self.connection.state.set(ConnectionState::ReceiveRequestUrl);
        }
        self.msg.url.push(data);
    }

    fn on_header_field(&mut self, data: Bytes) {
        match self.connection.state.get() {
            ConnectionState::ReceiveRequestHeaderValue => {
                // a new field ends the previous pair
                self.msg.commit_header();
                self.connection
                    .state
                    .set(ConnectionState::ReceiveRequestHeaderField);
            }
            ConnectionState::ReceiveRequestUrl => {
                self.connection
                    .state
                    .set(ConnectionState::ReceiveRequestHeaderField);
            }
            _ => {}
        }
        self.msg.field.push(data);
    }

    fn on_header_value(&mut self, data: Bytes) {
        if self.connection.state.get() == ConnectionState::ReceiveRequestHeaderField {
            self.connection
                .state
                .set(ConnectionState::ReceiveRequestHeaderValue);
        }
        self.msg.value.push(data);
    }

    fn on_headers_complete(&mut self) {
        if self.connection.state.get() == ConnectionState::ReceiveRequestHeaderValue {
            self.msg.commit_header();
        }
        self.connection
            .state
            .set(ConnectionState::ReceiveRequestHeadersComplete);
        let url = self.msg.url.take();
        self.msg.request.set_url(url);
    }

    fn on_body(&mut self, data: Bytes) {
        if self.connection.state.get() == ConnectionState::ReceiveRequestHeadersComplete {
            self.connection.state.set(ConnectionState::ReceiveRequestBody);
        }
        self.msg.body_buffers.push(data);
    }

    fn on_message_complete(&mut self) {
        if self.msg.request_enqueued && self.msg.body_buffers.is_empty() {
            // the request was enqueued before it completed but this round
            // carried no body bytes; an empty tail lets the body stream end
            self.msg.body_buffers.push(Bytes::new());
        }
        self.connection
            .state
            .set(ConnectionState::ReceiveRequestMessageComplete);
    }
}

enum ReplyError {
    Handler(HandlerError),
    Stream(StreamError),
}

impl fmt::Display for ReplyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplyError::Handler(err) => write!(f, "handler failure: {err}"),
            ReplyError::Stream(err) => write!(f, "stream failure: {err}"),
        }
    }
}

/// One accepted socket.
///
/// Two cooperating tasks run per connection: the receive loop pulls bytes,
/// feeds the parser and pushes requests and body chunks into the bounded
/// queues; the reply loop pops requests, runs the handler chain and owns
/// all socket writes. Responses leave in exact request order because only
/// the reply loop writes and it pops FIFO.
pub struct Http11Connection {
    id: u64,
    shared: Rc<ServerShared>,
    connections: Weak<RefCell<HashMap<u64, Rc<Http11Connection>>>>,
    peer_address: SocketAddr,
    state: Cell<ConnectionState>,
    shutdown_reason: Cell<&'static str>,
    request_queue: BoundedQueue<RequestEntry>,
    body_queue: BoundedQueue<BodyEntry>,
    last_error_response: Cell<Option<&'static str>>,
    abort_token: CancellationToken,
    closed_token: CancellationToken,
    pub(crate) watchdog_flag: Cell<bool>,
    writer: RefCell<Option<OwnedWriteHalf>>,
    // per-request state lent to the body streams for the duration of one
    // request; owned by the reply loop
    pub(crate) processing_request_id: Cell<u64>,
    pub(crate) request_body_consumed: Cell<bool>,
    pub(crate) processing_content_length: Cell<Option<u64>>,
}

impl Http11Connection {
    pub(crate) fn new(
        id: u64,
        shared: Rc<ServerShared>,
        connections: Weak<RefCell<HashMap<u64, Rc<Http11Connection>>>>,
        peer_address: SocketAddr,
    ) -> Rc<Self> {
        let abort_token = CancellationToken::new();
        Rc::new(Self {
            id,
            peer_address,
            state: Cell::new(ConnectionState::Initial),
            shutdown_reason: Cell::new("not set"),
            request_queue: BoundedQueue::new(shared.config.request_queue_size, abort_token.clone()),
            body_queue: BoundedQueue::new(
                shared.config.request_body_queue_size,
                abort_token.clone(),
            ),
            last_error_response: Cell::new(None),
            abort_token,
            closed_token: CancellationToken::new(),
            watchdog_flag: Cell::new(false),
            writer: RefCell::new(None),
            processing_request_id: Cell::new(0),
            request_body_consumed: Cell::new(true),
            processing_content_length: Cell::new(None),
            shared,
            connections,
        })
    }

    pub fn state(&self) -> ConnectionState {
        self.state.get()
    }

    pub fn peer_address(&self) -> SocketAddr {
        self.peer_address
    }

    pub fn shutdown_reason(&self) -> &'static str {
        self.shutdown_reason.get()
    }

    /// Kick the receive and reply loops. Must be called exactly once.
    pub(crate) fn spawn(self: Rc<Self>, stream: TcpStream) {
        assert_eq!(
            self.state.get(),
            ConnectionState::Initial,
            "can't start http connection not at initial state"
        );
        self.state.set(ConnectionState::Started);
        let (read_half, write_half) = stream.into_split();
        *self.writer.borrow_mut() = Some(write_half);
        let connection = self.clone();
        tokio::task::spawn_local(async move {
            let receive = connection.clone().receive_loop_entry(read_half);
            let reply = connection.clone().reply_loop_entry();
            tokio::join!(receive, reply);
            connection.finish_close();
        });
    }

    /// Shut down, idempotently: abort both queues (breaks the reply loop)
    /// and the receive read, record the reason. The reply loop writes any
    /// recorded error response best-effort before exiting.
    pub fn shutdown(&self, reason: &'static str) {
        if matches!(
            self.state.get(),
            ConnectionState::Closing | ConnectionState::Closed
        ) {
            return;
        }
        self.shutdown_reason.set(reason);
        self.state.set(ConnectionState::Closing);
        self.abort_token.cancel();
    }

    /// Shut down and wait until both loops finished.
    pub async fn stop(&self) {
        self.shutdown("stop function called");
        self.closed_token.cancelled().await;
    }

    pub(crate) fn on_watchdog_timeout(&self) {
        self.shared.metrics.request_timeout_errors.add(1);
        self.shutdown("request timeout");
    }

    fn record_error_response(&self, response: &'static str) {
        self.last_error_response.set(Some(response));
    }

    fn finish_close(&self) {
        // defer output closure so in-flight writes are not torn down
        let writer = self.writer.borrow_mut().take();
        tokio::task::spawn_local(async move {
            if let Some(mut writer) = writer {
                let _ = writer.shutdown().await;
            }
        });
        let remaining = match self.connections.upgrade() {
            Some(connections) => {
                connections.borrow_mut().remove(&self.id);
                let remaining = connections.borrow().len();
                self.shared.metrics.current_connections.set(remaining as u64);
                remaining
            }
            None => 0,
        };
        tracing::info!(
            client = %self.peer_address,
            reason = self.shutdown_reason.get(),
            remaining_connections = remaining,
            "closed http connection"
        );
        self.state.set(ConnectionState::Closed);
        self.closed_token.cancel();
    }

    // ── Receive loop ────────────────────────────────────────────────────

    async fn receive_loop_entry(self: Rc<Self>, read_half: OwnedReadHalf) {
        if let Err(err) = self.receive_loop(read_half).await {
            if self.state.get() == ConnectionState::Closing {
                return;
            }
            self.shared.metrics.request_errors.add(1);
            tracing::info!(
                client = %self.peer_address,
                error = %err,
                "exception occurs when receive http request"
            );
            self.shutdown("exception occurs when receive request");
        }
    }

    /// Pull bytes, feed the parser, push requests and body chunks.
    ///
    /// Never writes to the socket; failures are recorded for the reply
    /// loop to report.
    async fn receive_loop(
        self: &Rc<Self>,
        mut read_half: OwnedReadHalf,
    ) -> Result<(), std::io::Error> {
        let config = &self.shared.config;
        let mut parser = Http1Parser::new();
        let mut msg = MessageAssembly::new(1);
        let mut next_request_buffer = Bytes::new();
        loop {
            if self.state.get() == ConnectionState::Closing {
                return Ok(());
            }
            // previous request completed: reset for the next one
            if self.state.get() == ConnectionState::ReceiveRequestMessageComplete {
                let next_id = msg.request_id + 1;
                msg = MessageAssembly::new(next_id);
                parser.reset();
                self.state.set(ConnectionState::Started);
            }
            // read from the socket, or continue with stashed pipeline bytes
            let buffer = if !next_request_buffer.is_empty() {
                std::mem::take(&mut next_request_buffer)
            } else {
                let mut buf = BytesMut::with_capacity(8192);
                // the abort token doubles as input shutdown: cancelling it
                // unblocks the in-flight read
                let outcome = tokio::select! {
                    biased;
                    _ = self.abort_token.cancelled() => None,
                    result = tokio::time::timeout(
                        config.request_timeout,
                        read_half.read_buf(&mut buf),
                    ) => Some(result),
                };
                match outcome {
                    None => return Ok(()),
                    Some(Err(_elapsed)) => {
                        self.shared.metrics.request_timeout_errors.add(1);
                        self.shutdown("request timeout");
                        return Ok(());
                    }
                    Some(Ok(Ok(_))) => buf.freeze(),
                    Some(Ok(Err(err))) => return Err(err),
                }
            };
            self.watchdog_flag.set(false);
            if buffer.is_empty() {
                self.shutdown("closed from remote");
                return Ok(());
            }
            // guardrails until the request headers complete
            if self.state.get() != ConnectionState::ReceiveRequestBody {
                msg.received_bytes += buffer.len();
                if msg.received_bytes > config.max_initial_request_bytes {
                    self.shared.metrics.request_initial_size_errors.add(1);
                    self.record_error_response(REACHED_BYTES_LIMITATION_RESPONSE);
                    self.shutdown("reached bytes limitation of initial request data");
                    return Ok(());
                }
                msg.received_packets += 1;
                if msg.received_packets > config.max_initial_request_packets {
                    self.shared.metrics.request_initial_size_errors.add(1);
                    self.record_error_response(REACHED_PACKETS_LIMITATION_RESPONSE);
                    self.shutdown("reached packets limitation of initial request data");
                    return Ok(());
                }
            }
            // feed the parser
            let consumed = {
                let mut events = ReceiveEvents {
                    connection: self,
                    msg: &mut msg,
                };
                parser.execute(&mut events, &buffer)
            };
            let consumed = match consumed {
                Ok(consumed) => consumed,
                Err(err) => {
                    self.shared.metrics.request_invalid_format_errors.add(1);
                    self.record_error_response(INVALID_FORMAT_RESPONSE);
                    tracing::info!(
                        client = %self.peer_address,
                        error = %err,
                        state = %self.state.get(),
                        "http request format error"
                    );
                    self.shutdown("invalid request format");
                    return Ok(());
                }
            };
            if let Consumed::Pipelined(offset) = consumed {
                // the next pipelined request starts mid-buffer
                next_request_buffer = buffer.slice(offset..);
            }
            // pin the raw buffer while the request still borrows from it
            if !msg.request_enqueued {
                msg.request.add_underlying_buffer(buffer.clone());
            }
            // fill in request line data once the headers completed
            if !msg.request_enqueued && self.headers_are_complete() && msg.request.method().is_empty()
            {
                msg.request.set_method(parser.method());
                msg.request.set_version(parser.version());
            }
            // enqueue body chunks, then the request itself
            if msg.body_buffers.is_empty() {
                if self.enqueue_request(&mut msg, false, &parser).await.is_err() {
                    return Ok(());
                }
            } else {
                let chunks = std::mem::take(&mut msg.body_buffers);
                let message_complete =
                    self.state.get() == ConnectionState::ReceiveRequestMessageComplete;
                let count = chunks.len();
                for (index, data) in chunks.into_iter().enumerate() {
                    let entry = BodyEntry {
                        data,
                        id: msg.request_id,
                        is_end: index + 1 == count && message_complete,
                    };
                    if self.body_queue.push(entry).await.is_err() {
                        return Ok(());
                    }
                }
                if self.enqueue_request(&mut msg, true, &parser).await.is_err() {
                    return Ok(());
                }
            }
        }
    }

    fn headers_are_complete(&self) -> bool {
        matches!(
            self.state.get(),
            ConnectionState::ReceiveRequestHeadersComplete
                | ConnectionState::ReceiveRequestBody
                | ConnectionState::ReceiveRequestMessageComplete
        )
    }

    async fn enqueue_request(
        &self,
        msg: &mut MessageAssembly,
        has_body: bool,
        parser: &Http1Parser,
    ) -> Result<(), crate::queue::QueueAborted> {
        if msg.request_enqueued || !self.headers_are_complete() {
            return Ok(());
        }
        self.shared.metrics.requests_received.add(1);
        msg.request_enqueued = true;
        let entry = RequestEntry {
            request: std::mem::take(&mut msg.request),
            id: msg.request_id,
            has_body: has_body
                || self.state.get() != ConnectionState::ReceiveRequestMessageComplete,
            content_length: parser.content_length(),
        };
        self.request_queue.push(entry).await
    }

    // ── Reply loop ──────────────────────────────────────────────────────

    async fn reply_loop_entry(self: Rc<Self>) {
        loop {
            match self.reply_loop().await {
                Ok(()) => return,
                Err(err) => {
                    if self.state.get() != ConnectionState::Closing {
                        self.shared.metrics.request_errors.add(1);
                        tracing::info!(
                            client = %self.peer_address,
                            error = %err,
                            "exception occurs when reply http response"
                        );
                        self.shutdown("exception occurs when reply response");
                    }
                    // loop once more to write the recorded error response
                }
            }
        }
    }

    /// Pop requests FIFO, run the handler chain, flush, decide keep-alive.
    ///
    /// Never reads from the socket.
    async fn reply_loop(self: &Rc<Self>) -> Result<(), ReplyError> {
        loop {
            if self.state.get() == ConnectionState::Closing {
                self.write_last_error_response().await;
                return Ok(());
            }
            let entry = match self.request_queue.pop().await {
                Ok(entry) => entry,
                // aborted: the loop top writes the error response and exits
                Err(_) => continue,
            };
            // per-request state lent to the body streams
            self.processing_request_id.set(entry.id);
            self.request_body_consumed.set(!entry.has_body);
            self.processing_content_length.set(entry.content_length);

            let mut request = entry.request;
            request.set_body_stream(Box::new(RequestBodyStream::new(self.clone())));
            let keep_preliminary = keepalive_by_connection_header(&request);

            let mut response = HttpResponse::new();
            response.set_version(request.version().clone());
            response.set_default_connection(if keep_preliminary {
                Bytes::from_static(b"keep-alive")
            } else {
                Bytes::from_static(b"close")
            });
            response.set_body_stream(Box::new(ResponseBodyStream::new(self.clone())));

            let mut context = HttpContext::new(
                request,
                response,
                self.peer_address,
                self.shared.container.clone(),
            );
            let handlers = self.shared.handlers.clone();
            Next::new(&handlers)
                .invoke(&mut context)
                .await
                .map_err(ReplyError::Handler)?;
            self.watchdog_flag.set(false);

            let mut response = context.response;
            if !response.headers_flushed() {
                response
                    .flush_headers()
                    .await
                    .map_err(ReplyError::Stream)?;
            }
            self.flush_output().await.map_err(ReplyError::Stream)?;

            let keep = keep_preliminary
                && response.headers().connection().as_ref() == b"keep-alive"
                && self.check_keepalive_by_content_length(&response)
                && self.request_body_consumed.get();
            if !keep {
                self.shutdown("keepalive not enabled");
            }
        }
    }

    /// Framing of the finished response is determinate: `Content-Length`
    /// matches the bytes the handler wrote, or chunked encoding is on.
    fn check_keepalive_by_content_length(&self, response: &HttpResponse) -> bool {
        let content_length = response.headers().content_length();
        if content_length.is_empty() {
            return response.headers().transfer_encoding().as_ref() == b"chunked";
        }
        let declared = match std::str::from_utf8(content_length)
            .ok()
            .and_then(|text| text.trim().parse::<u64>().ok())
        {
            Some(value) => value,
            None => {
                tracing::warn!(
                    client = %self.peer_address,
                    "closing inconsistent connection: content length of response isn't an integer"
                );
                return false;
            }
        };
        if declared != response.body_written() {
            tracing::warn!(
                client = %self.peer_address,
                declared,
                written = response.body_written(),
                "closing inconsistent connection: content length doesn't match written size"
            );
            return false;
        }
        true
    }

    async fn write_last_error_response(&self) {
        if let Some(response) = self.last_error_response.get() {
            let _ = self.write_packet(Packet::from(response)).await;
            let _ = self.flush_output().await;
        }
    }

    /// Vectored write of all packet fragments; used by the response body
    /// stream and the error path. Writes are serialized by the reply loop.
    pub(crate) async fn write_packet(&self, mut packet: Packet) -> Result<(), StreamError> {
        let mut fragments: std::collections::VecDeque<Bytes> =
            packet.release().into_iter().collect();
        let mut writer = self.writer.borrow_mut();
        let writer = writer.as_mut().ok_or(StreamError::Closed)?;
        while !fragments.is_empty() {
            let slices: Vec<IoSlice<'_>> = fragments.iter().map(|b| IoSlice::new(b)).collect();
            let written = writer.write_vectored(&slices).await?;
            if written == 0 {
                return Err(StreamError::Io(std::io::Error::new(
                    std::io::ErrorKind::WriteZero,
                    "socket write returned zero",
                )));
            }
            advance_fragments(&mut fragments, written);
        }
        Ok(())
    }

    pub(crate) async fn flush_output(&self) -> Result<(), StreamError> {
        let mut writer = self.writer.borrow_mut();
        let writer = writer.as_mut().ok_or(StreamError::Closed)?;
        writer.flush().await?;
        Ok(())
    }

    pub(crate) fn body_queue(&self) -> &BoundedQueue<BodyEntry> {
        &self.body_queue
    }
}

fn advance_fragments(fragments: &mut std::collections::VecDeque<Bytes>, mut written: usize) {
    while written > 0 {
        let front = fragments
            .front_mut()
            .expect("wrote more bytes than were queued");
        if front.len() <= written {
            written -= front.len();
            fragments.pop_front();
        } else {
            front.advance(written);
            written = 0;
        }
    }
}

/// First half of the keep-alive decision, from the request alone: explicit
/// `keep-alive` keeps, any other explicit value closes, absence keeps for
/// HTTP/1.1 and HTTP/1.2 and closes for HTTP/1.0 or unsupported versions.
fn keepalive_by_connection_header(request: &HttpRequest) -> bool {
    let connection = request.headers().connection();
    if connection.as_ref() == b"keep-alive" {
        true
    } else if !connection.is_empty() {
        false
    } else {
        !(request.version().is_empty() || request.version().as_ref() == b"HTTP/1.0")
    }
}
