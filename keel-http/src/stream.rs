use crate::packet::Packet;
use bytes::{Bytes, BytesMut};
use std::fmt;
use std::future::Future;
use std::pin::Pin;

/// Boxed future without a `Send` bound; all stream plumbing is shard-local.
pub type LocalBoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// One step of an input stream: a byte slice and whether the stream ended.
#[derive(Debug, Clone, Default)]
pub struct ReadResult {
    pub data: Bytes,
    pub is_end: bool,
}

impl ReadResult {
    /// A result carrying data.
    pub fn new(data: Bytes, is_end: bool) -> Self {
        Self { data, is_end }
    }

    /// An empty end-of-stream marker.
    pub fn end() -> Self {
        Self {
            data: Bytes::new(),
            is_end: true,
        }
    }
}

/// Errors surfaced by stream reads and writes.
#[derive(Debug)]
pub enum StreamError {
    /// The owning connection aborted the underlying channel.
    Aborted,
    /// The stream is closed for further operations.
    Closed,
    /// Transport failure.
    Io(std::io::Error),
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamError::Aborted => write!(f, "stream aborted by connection shutdown"),
            StreamError::Closed => write!(f, "stream is closed"),
            StreamError::Io(err) => write!(f, "stream io error: {err}"),
        }
    }
}

impl std::error::Error for StreamError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StreamError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StreamError {
    fn from(err: std::io::Error) -> Self {
        StreamError::Io(err)
    }
}

/// A lazy, finite sequence of byte slices.
///
/// Not restartable: once a read returns `is_end`, further reads keep
/// returning empty end markers.
pub trait InputStream {
    /// Read the next slice.
    fn read(&mut self) -> LocalBoxFuture<'_, Result<ReadResult, StreamError>>;

    /// Total remaining size, when known up front.
    fn size_hint(&self) -> Option<usize> {
        None
    }
}

/// An ordered sink of packets. Writes are serialized per stream; closing is
/// implicit when the stream is dropped.
pub trait OutputStream {
    /// Write one packet.
    fn write(&mut self, packet: Packet) -> LocalBoxFuture<'_, Result<(), StreamError>>;
}

/// Drain an input stream into a single buffer.
///
/// Copies only when the stream yields more than one non-empty slice.
pub async fn read_to_end(stream: &mut dyn InputStream) -> Result<Bytes, StreamError> {
    let first = stream.read().await?;
    if first.is_end {
        return Ok(first.data);
    }
    let mut merged = BytesMut::from(&first.data[..]);
    loop {
        let next = stream.read().await?;
        merged.extend_from_slice(&next.data);
        if next.is_end {
            return Ok(merged.freeze());
        }
    }
}

/// Input stream over a single buffer.
pub struct BytesInputStream {
    data: Option<Bytes>,
}

impl BytesInputStream {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: Some(data.into()),
        }
    }
}

impl InputStream for BytesInputStream {
    fn read(&mut self) -> LocalBoxFuture<'_, Result<ReadResult, StreamError>> {
        let data = self.data.take().unwrap_or_default();
        Box::pin(async move { Ok(ReadResult::new(data, true)) })
    }

    fn size_hint(&self) -> Option<usize> {
        self.data.as_ref().map(Bytes::len)
    }
}

/// Output stream collecting written fragments.
///
/// Clones share the same storage, so a test can hand one clone to a response
/// and inspect the other after the write.
#[derive(Default, Clone)]
pub struct VecOutputStream {
    parts: std::rc::Rc<std::cell::RefCell<Vec<Bytes>>>,
}

impl VecOutputStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, concatenated.
    pub fn collected(&self) -> Bytes {
        let mut packet = Packet::new();
        for part in self.parts.borrow().iter() {
            packet.append_bytes(part.clone());
        }
        packet.to_bytes()
    }

    /// Number of fragments written so far.
    pub fn fragment_count(&self) -> usize {
        self.parts.borrow().len()
    }
}

impl OutputStream for VecOutputStream {
    fn write(&mut self, mut packet: Packet) -> LocalBoxFuture<'_, Result<(), StreamError>> {
        self.parts.borrow_mut().extend(packet.release());
        Box::pin(async move { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bytes_input_stream_yields_once() {
        let mut stream = BytesInputStream::new(Bytes::from_static(b"abc"));
        assert_eq!(stream.size_hint(), Some(3));
        let first = stream.read().await.unwrap();
        assert_eq!(first.data, "abc");
        assert!(first.is_end);
        let second = stream.read().await.unwrap();
        assert!(second.is_end);
        assert!(second.data.is_empty());
    }

    #[tokio::test]
    async fn read_to_end_single_slice_is_zero_copy() {
        let data = Bytes::from_static(b"payload");
        let mut stream = BytesInputStream::new(data.clone());
        let merged = read_to_end(&mut stream).await.unwrap();
        assert_eq!(merged.as_ptr(), data.as_ptr());
    }

    #[tokio::test]
    async fn vec_output_stream_collects_fragments() {
        let mut sink = VecOutputStream::new();
        let inspector = sink.clone();
        let mut packet = Packet::new();
        packet.append_static("a").append_static("b");
        sink.write(packet).await.unwrap();
        sink.write(Packet::from("c")).await.unwrap();
        assert_eq!(inspector.collected(), "abc");
        assert_eq!(inspector.fragment_count(), 3);
    }
}
