use crate::config::ServerConfig;
use crate::connection::Http11Connection;
use crate::handler::HttpHandler;
use crate::handlers::RealLastHandler;
use crate::metrics::{MetricsSnapshot, ServerMetrics};
use keel_core::Container;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::rc::{Rc, Weak};
use tokio::net::{TcpListener, TcpSocket};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

// avoids ECONNREFUSED when many connections arrive in a short period
const LISTEN_BACKLOG: u32 = 65535;

/// State shared between the server and its connections.
pub(crate) struct ServerShared {
    pub config: ServerConfig,
    pub handlers: Rc<Vec<Rc<dyn HttpHandler>>>,
    pub container: Rc<Container>,
    pub metrics: Rc<ServerMetrics>,
}

/// Accept loop and connection fleet for one shard.
///
/// Binds every configured listen address with SO_REUSEADDR and (on unix)
/// SO_REUSEPORT, so each shard runs its own accept loop on the same
/// addresses. A periodic watchdog shuts down connections whose refresh
/// flag went stale for a whole interval.
pub struct HttpServer {
    shared: Rc<ServerShared>,
    connections: Rc<RefCell<HashMap<u64, Rc<Http11Connection>>>>,
    listeners: RefCell<Vec<JoinHandle<()>>>,
    watchdog: RefCell<Option<JoinHandle<()>>>,
    bound_addresses: RefCell<Vec<SocketAddr>>,
    accept_token: CancellationToken,
    next_connection_id: Rc<Cell<u64>>,
    stopping: Cell<bool>,
}

impl HttpServer {
    /// Create a server for this shard. The sentinel last handler is
    /// appended automatically; user chains should end with a 404 handler.
    pub fn new(
        container: Rc<Container>,
        config: ServerConfig,
        mut handlers: Vec<Rc<dyn HttpHandler>>,
    ) -> Self {
        handlers.push(Rc::new(RealLastHandler));
        Self {
            shared: Rc::new(ServerShared {
                config,
                handlers: Rc::new(handlers),
                container,
                metrics: Rc::new(ServerMetrics::default()),
            }),
            connections: Rc::new(RefCell::new(HashMap::new())),
            listeners: RefCell::new(Vec::new()),
            watchdog: RefCell::new(None),
            bound_addresses: RefCell::new(Vec::new()),
            accept_token: CancellationToken::new(),
            next_connection_id: Rc::new(Cell::new(1)),
            stopping: Cell::new(false),
        }
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.shared.metrics.snapshot()
    }

    /// Addresses actually bound; useful when listening on port 0.
    pub fn local_addresses(&self) -> Vec<SocketAddr> {
        self.bound_addresses.borrow().clone()
    }

    /// Number of currently live connections.
    pub fn connection_count(&self) -> usize {
        self.connections.borrow().len()
    }

    /// Bind all listen addresses and start accepting.
    ///
    /// Must run inside a `LocalSet`; connections are spawned locally.
    pub async fn start(&self) -> std::io::Result<()> {
        if self.stopping.get() {
            return Err(std::io::Error::other(
                "can't start http server while stopping",
            ));
        }
        tracing::info!("starting http server");
        for address in &self.shared.config.listen_addresses {
            let address: SocketAddr = address.parse().map_err(|err| {
                std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("invalid listen address {address}: {err}"),
                )
            })?;
            let socket = if address.is_ipv4() {
                TcpSocket::new_v4()?
            } else {
                TcpSocket::new_v6()?
            };
            socket.set_reuseaddr(true)?;
            #[cfg(unix)]
            socket.set_reuseport(true)?;
            socket.bind(address)?;
            let listener = socket.listen(LISTEN_BACKLOG)?;
            let bound = listener.local_addr()?;
            self.bound_addresses.borrow_mut().push(bound);
            tracing::info!(address = %bound, "start listen http connections");
            let handle = tokio::task::spawn_local(accept_loop(
                listener,
                self.shared.clone(),
                self.connections.clone(),
                self.next_connection_id.clone(),
                self.accept_token.clone(),
            ));
            self.listeners.borrow_mut().push(handle);
        }
        // one timer scanning all connections beats a timer per connection
        *self.watchdog.borrow_mut() = Some(tokio::task::spawn_local(watchdog_loop(
            Rc::downgrade(&self.connections),
            self.shared.config.request_timeout,
            self.accept_token.clone(),
        )));
        tracing::info!("http server started");
        Ok(())
    }

    /// Abort the listeners, then stop every live connection and wait for
    /// all of them to close.
    pub async fn stop(&self) {
        tracing::info!("stopping http server");
        self.stopping.set(true);
        self.accept_token.cancel();
        for handle in self.listeners.borrow_mut().drain(..) {
            let _ = handle.await;
        }
        if let Some(handle) = self.watchdog.borrow_mut().take() {
            let _ = handle.await;
        }
        // connections remove themselves while we iterate, so take a copy
        let connections: Vec<Rc<Http11Connection>> =
            self.connections.borrow().values().cloned().collect();
        for connection in connections {
            connection.stop().await;
        }
        self.connections.borrow_mut().clear();
        self.shared.metrics.current_connections.set(0);
        tracing::info!("http server stopped");
    }
}

async fn accept_loop(
    listener: TcpListener,
    shared: Rc<ServerShared>,
    connections: Rc<RefCell<HashMap<u64, Rc<Http11Connection>>>>,
    next_connection_id: Rc<Cell<u64>>,
    token: CancellationToken,
) {
    loop {
        let accepted = tokio::select! {
            biased;
            _ = token.cancelled() => return,
            accepted = listener.accept() => accepted,
        };
        match accepted {
            Ok((stream, peer)) => {
                let id = next_connection_id.get();
                next_connection_id.set(id + 1);
                let connection = Http11Connection::new(
                    id,
                    shared.clone(),
                    Rc::downgrade(&connections),
                    peer,
                );
                connections.borrow_mut().insert(id, connection.clone());
                shared.metrics.total_connections.add(1);
                shared
                    .metrics
                    .current_connections
                    .set(connections.borrow().len() as u64);
                tracing::info!(
                    client = %peer,
                    connections = connections.borrow().len(),
                    "accepted http connection"
                );
                connection.spawn(stream);
            }
            Err(err) => {
                tracing::info!(error = %err, "accept failed");
            }
        }
    }
}

/// Two-phase scan: a connection whose flag survived a whole interval
/// untouched gets a timeout-driven shutdown; otherwise the flag is armed
/// and any connection activity clears it.
async fn watchdog_loop(
    connections: Weak<RefCell<HashMap<u64, Rc<Http11Connection>>>>,
    interval: std::time::Duration,
    token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    ticker.tick().await; // first tick fires immediately
    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => return,
            _ = ticker.tick() => {}
        }
        let Some(connections) = connections.upgrade() else {
            return;
        };
        let mut timed_out = Vec::new();
        for connection in connections.borrow().values() {
            if connection.watchdog_flag.get() {
                timed_out.push(connection.clone());
            } else {
                connection.watchdog_flag.set(true);
            }
        }
        for connection in timed_out {
            connection.on_watchdog_timeout();
        }
    }
}
