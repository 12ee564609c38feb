use std::cell::Cell;

/// A shard-local counter; no atomics, never shared across shards.
#[derive(Default)]
pub struct Counter(Cell<u64>);

impl Counter {
    pub fn add(&self, n: u64) {
        self.0.set(self.0.get() + n);
    }

    pub fn set(&self, value: u64) {
        self.0.set(value);
    }

    pub fn get(&self) -> u64 {
        self.0.get()
    }
}

/// Per-shard connection and request counters, readable by the server owner.
#[derive(Default)]
pub struct ServerMetrics {
    pub total_connections: Counter,
    pub current_connections: Counter,
    pub requests_received: Counter,
    pub request_errors: Counter,
    pub request_invalid_format_errors: Counter,
    pub request_initial_size_errors: Counter,
    pub request_timeout_errors: Counter,
}

/// Point-in-time copy of [`ServerMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub total_connections: u64,
    pub current_connections: u64,
    pub requests_received: u64,
    pub request_errors: u64,
    pub request_invalid_format_errors: u64,
    pub request_initial_size_errors: u64,
    pub request_timeout_errors: u64,
}

impl ServerMetrics {
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_connections: self.total_connections.get(),
            current_connections: self.current_connections.get(),
            requests_received: self.requests_received.get(),
            request_errors: self.request_errors.get(),
            request_invalid_format_errors: self.request_invalid_format_errors.get(),
            request_initial_size_errors: self.request_initial_size_errors.get(),
            request_timeout_errors: self.request_timeout_errors.get(),
        }
    }
}
