use super::factory::{DependencySet, Injectable, ServiceFactory};
use super::storage::ServiceStorage;
use super::{Container, ContainerError};
use std::any::{type_name, Any, TypeId};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Service lifetimes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifetime {
    /// The factory runs on every resolution.
    Transient,
    /// The first resolution caches the value in the descriptor; later
    /// resolutions return clones. Requires a clonable service type.
    Persistent,
    /// Like `Persistent`, but the cache lives in a caller-supplied
    /// [`ServiceStorage`] keyed by descriptor identity; distinct storages
    /// yield distinct instances.
    StoragePersistent,
}

pub(crate) type BoxAny = Box<dyn Any>;
pub(crate) type FactoryFn = Rc<dyn Fn(&Container, &ServiceStorage) -> Result<BoxAny, ContainerError>>;
pub(crate) type CloneFn = Rc<dyn Fn(&dyn Any) -> BoxAny>;

thread_local! {
    static NEXT_DESCRIPTOR_ID: Cell<u64> = const { Cell::new(1) };
}

fn next_descriptor_id() -> u64 {
    NEXT_DESCRIPTOR_ID.with(|cell| {
        let id = cell.get();
        cell.set(id + 1);
        id
    })
}

/// One registration of a service: factory, lifetime, optional cached value.
///
/// Descriptors are type-erased; the typed constructors record a clone
/// function when the service type is clonable, which the cached lifetimes
/// need at resolution time.
pub struct ServiceDescriptor {
    id: u64,
    type_id: TypeId,
    type_name: &'static str,
    lifetime: Lifetime,
    pub(crate) factory: FactoryFn,
    pub(crate) clone_fn: Option<CloneFn>,
    cached: RefCell<Option<BoxAny>>,
    pub(crate) is_auto: bool,
    /// Auto-installed collection resolvers (`Vec<T>`, `Option<T>`).
    pub(crate) companions: Vec<Rc<ServiceDescriptor>>,
}

impl ServiceDescriptor {
    /// Descriptor for a clonable service built by a factory.
    ///
    /// The factory may take `()`, `(&Container)`, or
    /// `(&Container, &ServiceStorage)`.
    pub fn factory<T, M, F>(factory: F, lifetime: Lifetime) -> Rc<Self>
    where
        T: Clone + 'static,
        F: ServiceFactory<T, M> + 'static,
        M: 'static,
    {
        Self::build::<T>(
            Rc::new(move |c, s| Ok(Box::new(factory.invoke(c, s)) as BoxAny)),
            Some(Self::cloner::<T>()),
            lifetime,
        )
    }

    /// Descriptor for a non-clonable service. Resolution fails with
    /// [`ContainerError::NotCloneable`] under the cached lifetimes.
    pub fn factory_unclonable<T, M, F>(factory: F, lifetime: Lifetime) -> Rc<Self>
    where
        T: 'static,
        F: ServiceFactory<T, M> + 'static,
        M: 'static,
    {
        Self::build::<T>(
            Rc::new(move |c, s| Ok(Box::new(factory.invoke(c, s)) as BoxAny)),
            None,
            lifetime,
        )
    }

    /// Persistent descriptor seeded with an existing instance.
    pub fn instance<T: Clone + 'static>(value: T) -> Rc<Self> {
        let seed = value.clone();
        let descriptor = Self::build::<T>(
            Rc::new(move |_, _| Ok(Box::new(seed.clone()) as BoxAny)),
            Some(Self::cloner::<T>()),
            Lifetime::Persistent,
        );
        *descriptor.cached.borrow_mut() = Some(Box::new(value) as BoxAny);
        descriptor
    }

    /// Descriptor that constructs the service from its declared dependency
    /// tuple, resolved recursively with the same storage.
    pub fn injectable<T: Injectable + Clone>(lifetime: Lifetime) -> Rc<Self> {
        Self::build::<T>(
            Rc::new(move |c, s| {
                let deps = T::Dependencies::resolve_all(c, s)?;
                Ok(Box::new(T::construct(deps)) as BoxAny)
            }),
            Some(Self::cloner::<T>()),
            lifetime,
        )
    }

    /// Non-clonable variant of [`injectable`](Self::injectable).
    pub fn injectable_unclonable<T: Injectable>(lifetime: Lifetime) -> Rc<Self> {
        Self::build::<T>(
            Rc::new(move |c, s| {
                let deps = T::Dependencies::resolve_all(c, s)?;
                Ok(Box::new(T::construct(deps)) as BoxAny)
            }),
            None,
            lifetime,
        )
    }

    fn cloner<T: Clone + 'static>() -> CloneFn {
        Rc::new(|any| {
            let value = any
                .downcast_ref::<T>()
                .expect("cached service value has unexpected type");
            Box::new(value.clone()) as BoxAny
        })
    }

    fn build<T: 'static>(
        factory: FactoryFn,
        clone_fn: Option<CloneFn>,
        lifetime: Lifetime,
    ) -> Rc<Self> {
        Rc::new(Self {
            id: next_descriptor_id(),
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            lifetime,
            factory,
            clone_fn,
            cached: RefCell::new(None),
            is_auto: false,
            companions: vec![Self::vec_companion::<T>(), Self::option_companion::<T>()],
        })
    }

    /// Collection resolver for `Vec<T>`: all element registrations in order.
    fn vec_companion<T: 'static>() -> Rc<Self> {
        Self::raw_auto::<Vec<T>>(Rc::new(|c, s| {
            let mut out: Vec<T> = Vec::new();
            for entry in c.user_entries(TypeId::of::<T>()) {
                out.push(entry.get_instance::<T>(c, s)?);
            }
            Ok(Box::new(out) as BoxAny)
        }))
    }

    /// Collection resolver for `Option<T>`: the last registration wins.
    fn option_companion<T: 'static>() -> Rc<Self> {
        Self::raw_auto::<Option<T>>(Rc::new(|c, s| {
            let mut out: Option<T> = None;
            for entry in c.user_entries(TypeId::of::<T>()) {
                out = Some(entry.get_instance::<T>(c, s)?);
            }
            Ok(Box::new(out) as BoxAny)
        }))
    }

    fn raw_auto<T: 'static>(factory: FactoryFn) -> Rc<Self> {
        Rc::new(Self {
            id: next_descriptor_id(),
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            lifetime: Lifetime::Transient,
            factory,
            clone_fn: None,
            cached: RefCell::new(None),
            is_auto: true,
            companions: Vec::new(),
        })
    }

    /// Replacement descriptor used by patching; keeps the original lifetime
    /// and clone capability.
    pub(crate) fn patched(
        original: &Rc<ServiceDescriptor>,
        factory: FactoryFn,
    ) -> Rc<Self> {
        Rc::new(Self {
            id: next_descriptor_id(),
            type_id: original.type_id,
            type_name: original.type_name,
            lifetime: original.lifetime,
            factory,
            clone_fn: original.clone_fn.clone(),
            cached: RefCell::new(None),
            is_auto: original.is_auto,
            companions: Vec::new(),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn lifetime(&self) -> Lifetime {
        self.lifetime
    }

    /// Resolve an instance according to the lifetime.
    pub fn get_instance<T: 'static>(
        &self,
        container: &Container,
        storage: &ServiceStorage,
    ) -> Result<T, ContainerError> {
        let any = self.get_any(container, storage)?;
        match any.downcast::<T>() {
            Ok(boxed) => Ok(*boxed),
            Err(_) => panic!(
                "service descriptor for {} produced a value of unexpected type",
                self.type_name
            ),
        }
    }

    fn get_any(
        &self,
        container: &Container,
        storage: &ServiceStorage,
    ) -> Result<BoxAny, ContainerError> {
        match self.lifetime {
            Lifetime::Transient => (self.factory)(container, storage),
            Lifetime::Persistent => {
                let clone_fn = self.clone_fn.as_ref().ok_or(ContainerError::NotCloneable {
                    type_name: self.type_name,
                })?;
                if self.cached.borrow().is_none() {
                    let value = (self.factory)(container, storage)?;
                    *self.cached.borrow_mut() = Some(value);
                }
                let cached = self.cached.borrow();
                Ok(clone_fn(
                    cached.as_ref().expect("persistent cache just filled").as_ref(),
                ))
            }
            Lifetime::StoragePersistent => {
                let clone_fn = self.clone_fn.as_ref().ok_or(ContainerError::NotCloneable {
                    type_name: self.type_name,
                })?;
                if let Some(cloned) = storage.clone_value(self.id, clone_fn) {
                    return Ok(cloned);
                }
                let value = (self.factory)(container, storage)?;
                let result = clone_fn(value.as_ref());
                storage.insert(self.id, value);
                Ok(result)
            }
        }
    }
}

impl std::fmt::Debug for ServiceDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceDescriptor")
            .field("id", &self.id)
            .field("type_name", &self.type_name)
            .field("lifetime", &self.lifetime)
            .field("is_auto", &self.is_auto)
            .finish()
    }
}
