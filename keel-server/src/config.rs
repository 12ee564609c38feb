use keel_core::KeelConfig;
use std::time::Duration;

/// Tunables for one server shard, read from the `server.*` config section.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// `host:port` listen addresses; every shard binds all of them.
    pub listen_addresses: Vec<String>,
    /// Cap on bytes received before the request headers complete.
    pub max_initial_request_bytes: usize,
    /// Cap on packets received before the request headers complete,
    /// against small-packet floods.
    pub max_initial_request_packets: usize,
    /// Per-read timeout and watchdog scan interval.
    pub request_timeout: Duration,
    /// Capacity of the received-request queue.
    pub request_queue_size: usize,
    /// Capacity of the received-body-chunk queue.
    pub request_body_queue_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addresses: vec!["127.0.0.1:8000".to_string()],
            max_initial_request_bytes: 524288,
            max_initial_request_packets: 512,
            request_timeout: Duration::from_secs(30),
            request_queue_size: 100,
            request_body_queue_size: 50,
        }
    }
}

impl ServerConfig {
    /// Read the `server.*` section, falling back to defaults per key.
    pub fn from_config(config: &KeelConfig) -> Self {
        let defaults = Self::default();
        Self {
            listen_addresses: config.get_or("server.listen_addresses", defaults.listen_addresses),
            max_initial_request_bytes: config.get_or(
                "server.max_initial_request_bytes",
                defaults.max_initial_request_bytes,
            ),
            max_initial_request_packets: config.get_or(
                "server.max_initial_request_packets",
                defaults.max_initial_request_packets,
            ),
            request_timeout: Duration::from_secs(
                config.get_or("server.request_timeout_seconds", 30u64),
            ),
            request_queue_size: config
                .get_or("server.request_queue_size", defaults.request_queue_size),
            request_body_queue_size: config.get_or(
                "server.request_body_queue_size",
                defaults.request_body_queue_size,
            ),
        }
    }
}
