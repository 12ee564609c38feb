use super::Http11Connection;
use keel_http::{InputStream, LocalBoxFuture, ReadResult, StreamError};
use std::rc::Rc;

/// Request body input stream reading from the connection's body queue.
///
/// Lent to one request at a time by the reply loop; entries are tagged
/// with their request id and consumed until the end marker.
pub(crate) struct RequestBodyStream {
    connection: Rc<Http11Connection>,
}

impl RequestBodyStream {
    pub(crate) fn new(connection: Rc<Http11Connection>) -> Self {
        Self { connection }
    }
}

impl InputStream for RequestBodyStream {
    fn read(&mut self) -> LocalBoxFuture<'_, Result<ReadResult, StreamError>> {
        let connection = self.connection.clone();
        Box::pin(async move {
            if connection.request_body_consumed.get() {
                return Ok(ReadResult::end());
            }
            let entry = connection
                .body_queue()
                .pop()
                .await
                .map_err(|_| StreamError::Aborted)?;
            let processing = connection.processing_request_id.get();
            // in-order enqueue by the receive loop guarantees this
            assert_eq!(
                entry.id, processing,
                "body queue entry belongs to request {} but processing request is {}",
                entry.id, processing
            );
            if entry.is_end {
                connection.request_body_consumed.set(true);
            }
            Ok(ReadResult::new(entry.data, entry.is_end))
        })
    }

    fn size_hint(&self) -> Option<usize> {
        self.connection
            .processing_content_length
            .get()
            .map(|length| length as usize)
    }
}
