use std::cell::RefCell;
use std::fmt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// The queue was aborted by connection shutdown; pending awaiters unwind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueAborted;

impl fmt::Display for QueueAborted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("queue aborted by connection shutdown")
    }
}

impl std::error::Error for QueueAborted {}

/// Bounded single-consumer queue with cooperative abort.
///
/// A full queue suspends the pusher (back-pressure), an empty queue
/// suspends the popper. Cancelling the shared token unblocks both sides
/// with [`QueueAborted`]. Only one task may pop at a time.
pub struct BoundedQueue<T> {
    tx: mpsc::Sender<T>,
    rx: RefCell<mpsc::Receiver<T>>,
    token: CancellationToken,
}

impl<T> BoundedQueue<T> {
    pub fn new(capacity: usize, token: CancellationToken) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self {
            tx,
            rx: RefCell::new(rx),
            token,
        }
    }

    /// Push an item, waiting while the queue is full.
    pub async fn push(&self, item: T) -> Result<(), QueueAborted> {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(QueueAborted),
            sent = self.tx.send(item) => sent.map_err(|_| QueueAborted),
        }
    }

    /// Pop the next item, waiting while the queue is empty.
    pub async fn pop(&self) -> Result<T, QueueAborted> {
        let mut rx = self.rx.borrow_mut();
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(QueueAborted),
            item = rx.recv() => item.ok_or(QueueAborted),
        }
    }

    /// Abort both sides.
    pub fn abort(&self) {
        self.token.cancel();
    }
}
