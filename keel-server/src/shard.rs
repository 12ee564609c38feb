use std::fmt;
use std::thread::JoinHandle;
use tokio::sync::mpsc;

type ShardTask = Box<dyn FnOnce() + Send>;

/// The shard thread is gone; the task was not run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardStopped;

impl fmt::Display for ShardStopped {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("shard is stopped")
    }
}

impl std::error::Error for ShardStopped {}

/// One CPU core's execution domain.
///
/// A dedicated thread running a current-thread tokio runtime inside a
/// `LocalSet`. Submitted closures run on the shard and may `spawn_local`;
/// all state they create stays on the shard. [`submit`](Shard::submit) is
/// the only cross-shard primitive; no data is shared mutably across shards.
pub struct Shard {
    index: usize,
    sender: mpsc::UnboundedSender<ShardTask>,
    handle: Option<JoinHandle<()>>,
}

impl Shard {
    /// Spawn a shard thread.
    pub fn spawn(index: usize) -> std::io::Result<Self> {
        let (sender, mut receiver) = mpsc::unbounded_channel::<ShardTask>();
        let handle = std::thread::Builder::new()
            .name(format!("keel-shard-{index}"))
            .spawn(move || {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .expect("failed to build shard runtime");
                let local = tokio::task::LocalSet::new();
                local.block_on(&runtime, async move {
                    while let Some(task) = receiver.recv().await {
                        task();
                    }
                });
            })?;
        Ok(Self {
            index,
            sender,
            handle: Some(handle),
        })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Run a closure on the shard thread, inside its `LocalSet`.
    pub fn submit(&self, task: impl FnOnce() + Send + 'static) -> Result<(), ShardStopped> {
        self.sender
            .send(Box::new(task))
            .map_err(|_| ShardStopped)
    }

    /// Stop accepting tasks and wait for the shard thread to finish its
    /// local tasks and exit.
    pub fn join(mut self) {
        drop(self.sender);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Spawn one shard per requested core.
pub fn spawn_shards(count: usize) -> std::io::Result<Vec<Shard>> {
    (0..count.max(1)).map(Shard::spawn).collect()
}
