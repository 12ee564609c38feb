use super::descriptor::{BoxAny, CloneFn};
use std::cell::RefCell;
use std::collections::HashMap;

/// Cache for `StoragePersistent` services, keyed by descriptor identity.
///
/// One storage is owned per request context; the container owns another for
/// resolutions that do not supply their own. Distinct storages yield
/// distinct instances.
#[derive(Default)]
pub struct ServiceStorage {
    values: RefCell<HashMap<u64, BoxAny>>,
}

impl ServiceStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached values.
    pub fn len(&self) -> usize {
        self.values.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.borrow().is_empty()
    }

    /// Drop every cached value.
    pub fn clear(&self) {
        self.values.borrow_mut().clear();
    }

    pub(crate) fn clone_value(&self, descriptor_id: u64, clone_fn: &CloneFn) -> Option<BoxAny> {
        self.values
            .borrow()
            .get(&descriptor_id)
            .map(|value| clone_fn(value.as_ref()))
    }

    pub(crate) fn insert(&self, descriptor_id: u64, value: BoxAny) {
        self.values.borrow_mut().insert(descriptor_id, value);
    }
}

impl std::fmt::Debug for ServiceStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceStorage")
            .field("cached", &self.len())
            .finish()
    }
}
