use bytes::{Bytes, BytesMut};
use std::io::IoSlice;

/// A write-side buffer list.
///
/// A packet is either a *single* fragment (the common case: one status line,
/// one body chunk) or a *multiple* fragment sequence used to serialize a
/// response head and body with vectored writes instead of coalescing.
///
/// Appending to an empty single packet replaces the fragment in place;
/// appending anything else promotes the packet to the multiple shape and
/// moves the previous fragment in. The packet exclusively owns its
/// fragments until [`release`](Packet::release) hands them onward.
#[derive(Debug, Clone, Default)]
pub enum Packet {
    /// No fragments yet.
    #[default]
    Empty,
    /// One contiguous fragment.
    Single(Bytes),
    /// An ordered fragment sequence.
    Multiple(Vec<Bytes>),
}

impl Packet {
    /// Create an empty packet.
    pub fn new() -> Self {
        Packet::Empty
    }

    /// Create a multiple-fragment packet with room for `capacity` fragments.
    pub fn with_capacity(capacity: usize) -> Self {
        Packet::Multiple(Vec::with_capacity(capacity))
    }

    /// Total byte length over all fragments.
    pub fn size(&self) -> usize {
        match self {
            Packet::Empty => 0,
            Packet::Single(b) => b.len(),
            Packet::Multiple(list) => list.iter().map(Bytes::len).sum(),
        }
    }

    /// Whether the packet carries no bytes at all.
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Number of fragments currently held.
    pub fn fragment_count(&self) -> usize {
        match self {
            Packet::Empty => 0,
            Packet::Single(_) => 1,
            Packet::Multiple(list) => list.len(),
        }
    }

    /// Append a static string without copying.
    pub fn append_static(&mut self, s: &'static str) -> &mut Self {
        self.append_bytes(Bytes::from_static(s.as_bytes()))
    }

    /// Append a shared buffer slice.
    ///
    /// An empty single packet is replaced in place; otherwise the packet is
    /// promoted to the multiple shape.
    pub fn append_bytes(&mut self, data: Bytes) -> &mut Self {
        if data.is_empty() {
            return self;
        }
        match self {
            Packet::Empty => *self = Packet::Single(data),
            Packet::Single(_) => {
                let prev = std::mem::take(self);
                let Packet::Single(prev) = prev else {
                    unreachable!()
                };
                *self = Packet::Multiple(vec![prev, data]);
            }
            Packet::Multiple(list) => list.push(data),
        }
        self
    }

    /// Append every fragment of another packet, preserving order.
    pub fn append_packet(&mut self, other: Packet) -> &mut Self {
        match other {
            Packet::Empty => {}
            Packet::Single(b) => {
                self.append_bytes(b);
            }
            Packet::Multiple(list) => {
                for b in list {
                    self.append_bytes(b);
                }
            }
        }
        self
    }

    /// Collapse the packet into one shared buffer.
    ///
    /// Copies only when the packet holds more than one fragment.
    pub fn to_bytes(&self) -> Bytes {
        match self {
            Packet::Empty => Bytes::new(),
            Packet::Single(b) => b.clone(),
            Packet::Multiple(list) => {
                if list.len() == 1 {
                    return list[0].clone();
                }
                let mut merged = BytesMut::with_capacity(self.size());
                for b in list {
                    merged.extend_from_slice(b);
                }
                merged.freeze()
            }
        }
    }

    /// Release the fragments, leaving the packet empty.
    ///
    /// The returned list is suitable for building a scatter-gather write
    /// vector; see [`io_slices`](Packet::io_slices).
    pub fn release(&mut self) -> Vec<Bytes> {
        match std::mem::take(self) {
            Packet::Empty => Vec::new(),
            Packet::Single(b) => vec![b],
            Packet::Multiple(list) => list,
        }
    }

    /// Borrow the fragments as an `IoSlice` vector for `writev`.
    pub fn io_slices(&self) -> Vec<IoSlice<'_>> {
        match self {
            Packet::Empty => Vec::new(),
            Packet::Single(b) => vec![IoSlice::new(b)],
            Packet::Multiple(list) => list.iter().map(|b| IoSlice::new(b)).collect(),
        }
    }
}

impl From<Bytes> for Packet {
    fn from(data: Bytes) -> Self {
        if data.is_empty() {
            Packet::Empty
        } else {
            Packet::Single(data)
        }
    }
}

impl From<&'static str> for Packet {
    fn from(s: &'static str) -> Self {
        Bytes::from_static(s.as_bytes()).into()
    }
}

impl From<String> for Packet {
    fn from(s: String) -> Self {
        Bytes::from(s).into()
    }
}

impl From<Vec<u8>> for Packet {
    fn from(v: Vec<u8>) -> Self {
        Bytes::from(v).into()
    }
}
