use super::Http11Connection;
use keel_http::{LocalBoxFuture, OutputStream, Packet, StreamError};
use std::rc::Rc;

/// Response body output stream writing through the connection socket.
///
/// Header serialization order is the response's concern
/// ([`HttpResponse::write_body`](keel_http::HttpResponse::write_body)
/// flushes the head ahead of the first body packet); this sink only moves
/// bytes.
pub(crate) struct ResponseBodyStream {
    connection: Rc<Http11Connection>,
}

impl ResponseBodyStream {
    pub(crate) fn new(connection: Rc<Http11Connection>) -> Self {
        Self { connection }
    }
}

impl OutputStream for ResponseBodyStream {
    fn write(&mut self, packet: Packet) -> LocalBoxFuture<'_, Result<(), StreamError>> {
        let connection = self.connection.clone();
        Box::pin(async move {
            if packet.is_empty() {
                return Ok(());
            }
            connection.write_packet(packet).await
        })
    }
}
