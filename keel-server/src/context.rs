use keel_core::{Container, ContainerError, ServiceStorage};
use keel_http::{HttpRequest, HttpResponse};
use std::net::SocketAddr;
use std::rc::Rc;

/// Everything a handler sees for one request.
///
/// Owns the request/response pair, the client address, a reference to the
/// shard's container and the per-request service storage used for
/// `StoragePersistent` resolutions.
pub struct HttpContext {
    pub request: HttpRequest,
    pub response: HttpResponse,
    pub peer_address: SocketAddr,
    pub container: Rc<Container>,
    pub storage: ServiceStorage,
}

impl HttpContext {
    pub fn new(
        request: HttpRequest,
        response: HttpResponse,
        peer_address: SocketAddr,
        container: Rc<Container>,
    ) -> Self {
        Self {
            request,
            response,
            peer_address,
            container,
            storage: ServiceStorage::new(),
        }
    }

    /// Resolve a service against the request's storage.
    pub fn get_service<T: 'static>(&self) -> Result<T, ContainerError> {
        self.container.get_with(&self.storage)
    }

    /// Resolve all registrations of a service against the request's storage.
    pub fn get_services<T: 'static>(&self) -> Result<Vec<T>, ContainerError> {
        self.container.get_many_with(&self.storage)
    }
}
