mod collection;
mod descriptor;
mod factory;
mod storage;

pub use collection::ServiceCollection;
pub use descriptor::{Lifetime, ServiceDescriptor};
pub use factory::{
    DependencySet, Injectable, NoArgs, ServiceFactory, ServicePatch, WithContainer,
    WithContainerAndStorage,
};
pub use storage::ServiceStorage;

use descriptor::FactoryFn;
use std::any::{type_name, TypeId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Errors raised by service resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerError {
    /// No registration exists for the requested type.
    NoEntry { type_name: &'static str },
    /// `get` requires exactly one registration.
    MultipleEntries {
        type_name: &'static str,
        count: usize,
    },
    /// A cached lifetime was requested for a type without clone support.
    NotCloneable { type_name: &'static str },
}

impl fmt::Display for ContainerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerError::NoEntry { type_name } => {
                write!(f, "no service entry found for type {type_name}")
            }
            ContainerError::MultipleEntries { type_name, count } => {
                write!(
                    f,
                    "more than 1 service entry found for type {type_name} ({count} entries)"
                )
            }
            ContainerError::NotCloneable { type_name } => {
                write!(
                    f,
                    "service type {type_name} uses a cached lifetime but is not clonable"
                )
            }
        }
    }
}

impl std::error::Error for ContainerError {}

/// Shard-local dependency injection container.
///
/// A type-indexed registry of [`ServiceDescriptor`]s. A service may have
/// multiple registrations; `get` demands exactly one while `get_many`
/// visits all in registration order. Never share a container across shards;
/// create one per core.
#[derive(Default)]
pub struct Container {
    entries: RefCell<HashMap<TypeId, Vec<Rc<ServiceDescriptor>>>>,
    built_in_storage: ServiceStorage,
}

impl Container {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a registration for the descriptor's service type.
    ///
    /// Also installs the descriptor's collection resolvers (`Vec<T>`,
    /// `Option<T>`) unless one is already present.
    pub fn add(&self, descriptor: Rc<ServiceDescriptor>) {
        let mut entries = self.entries.borrow_mut();
        for companion in &descriptor.companions {
            let list = entries.entry(companion.type_id()).or_default();
            if !list.iter().any(|d| d.is_auto) {
                list.push(companion.clone());
            }
        }
        entries.entry(descriptor.type_id()).or_default().push(descriptor);
    }

    /// Remove every registration of a type, returning the removed entries.
    pub fn remove<T: 'static>(&self) -> Vec<Rc<ServiceDescriptor>> {
        self.entries
            .borrow_mut()
            .remove(&TypeId::of::<T>())
            .unwrap_or_default()
    }

    /// Resolve the single registration of `T` using the container's own
    /// storage for `StoragePersistent` services.
    pub fn get<T: 'static>(&self) -> Result<T, ContainerError> {
        self.get_with(&self.built_in_storage)
    }

    /// Resolve the single registration of `T` with a caller-supplied storage.
    pub fn get_with<T: 'static>(&self, storage: &ServiceStorage) -> Result<T, ContainerError> {
        self.single_entry::<T>()?.get_instance::<T>(self, storage)
    }

    /// Resolve every registration of `T`, in registration order.
    pub fn get_many<T: 'static>(&self) -> Result<Vec<T>, ContainerError> {
        self.get_many_with(&self.built_in_storage)
    }

    /// `get_many` with a caller-supplied storage.
    pub fn get_many_with<T: 'static>(
        &self,
        storage: &ServiceStorage,
    ) -> Result<Vec<T>, ContainerError> {
        let mut out = Vec::new();
        for entry in self.user_entries(TypeId::of::<T>()) {
            out.push(entry.get_instance::<T>(self, storage)?);
        }
        Ok(out)
    }

    /// Append an instance per registration into a collection
    /// (vector keeps all, option keeps the last).
    pub fn get_many_into<C: ServiceCollection>(
        &self,
        out: &mut C,
    ) -> Result<(), ContainerError> {
        self.get_many_into_with(out, &self.built_in_storage)
    }

    /// `get_many_into` with a caller-supplied storage.
    pub fn get_many_into_with<C: ServiceCollection>(
        &self,
        out: &mut C,
        storage: &ServiceStorage,
    ) -> Result<(), ContainerError> {
        for entry in self.user_entries(TypeId::of::<C::Element>()) {
            out.add(entry.get_instance::<C::Element>(self, storage)?);
        }
        Ok(())
    }

    /// Replace every registration's factory of `T` with one that invokes
    /// the original and wraps its result. The lifetime is preserved. The
    /// wrap function may take `(T)`, `(&Container, T)`, or
    /// `(&Container, &ServiceStorage, T)`. Returns the number of patched
    /// registrations.
    pub fn patch<T, M, F>(&self, wrap: F) -> usize
    where
        T: 'static,
        M: 'static,
        F: ServicePatch<T, M> + 'static,
    {
        let mut entries = self.entries.borrow_mut();
        let Some(list) = entries.get_mut(&TypeId::of::<T>()) else {
            return 0;
        };
        let wrap = Rc::new(wrap);
        for slot in list.iter_mut() {
            let original = slot.clone();
            let wrap = wrap.clone();
            let factory: FactoryFn = Rc::new(move |container, storage| {
                let value = original.get_instance::<T>(container, storage)?;
                Ok(Box::new(wrap.wrap(container, storage, value)) as Box<dyn std::any::Any>)
            });
            *slot = ServiceDescriptor::patched(slot, factory);
        }
        list.len()
    }

    /// Whether any registration (user or collection resolver) exists.
    pub fn contains(&self, type_id: TypeId) -> bool {
        self.entries
            .borrow()
            .get(&type_id)
            .is_some_and(|list| !list.is_empty())
    }

    fn single_entry<T: 'static>(&self) -> Result<Rc<ServiceDescriptor>, ContainerError> {
        let entries = self.entries.borrow();
        let list = entries.get(&TypeId::of::<T>());
        let mut users = list
            .into_iter()
            .flatten()
            .filter(|d| !d.is_auto);
        match (users.next(), users.next()) {
            (Some(single), None) => Ok(single.clone()),
            (Some(_), Some(_)) => {
                let count = list
                    .into_iter()
                    .flatten()
                    .filter(|d| !d.is_auto)
                    .count();
                Err(ContainerError::MultipleEntries {
                    type_name: type_name::<T>(),
                    count,
                })
            }
            (None, _) => {
                // fall back to the auto-installed collection resolver
                list.into_iter()
                    .flatten()
                    .find(|d| d.is_auto)
                    .cloned()
                    .ok_or(ContainerError::NoEntry {
                        type_name: type_name::<T>(),
                    })
            }
        }
    }

    /// User registrations of a type, in registration order.
    pub(crate) fn user_entries(&self, type_id: TypeId) -> Vec<Rc<ServiceDescriptor>> {
        self.entries
            .borrow()
            .get(&type_id)
            .map(|list| {
                list.iter()
                    .filter(|d| !d.is_auto)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("types", &self.entries.borrow().len())
            .finish()
    }
}
