use super::storage::ServiceStorage;
use super::{Container, ContainerError};

/// Marker for factories and patch functions taking no context.
pub struct NoArgs(());
/// Marker for factories and patch functions taking the container.
pub struct WithContainer(());
/// Marker for factories and patch functions taking container and storage.
pub struct WithContainerAndStorage(());

/// A service factory of one of the accepted arities:
/// `fn()`, `fn(&Container)`, or `fn(&Container, &ServiceStorage)`.
pub trait ServiceFactory<T, M> {
    fn invoke(&self, container: &Container, storage: &ServiceStorage) -> T;
}

impl<T, F> ServiceFactory<T, NoArgs> for F
where
    F: Fn() -> T,
{
    fn invoke(&self, _container: &Container, _storage: &ServiceStorage) -> T {
        self()
    }
}

impl<T, F> ServiceFactory<T, WithContainer> for F
where
    F: Fn(&Container) -> T,
{
    fn invoke(&self, container: &Container, _storage: &ServiceStorage) -> T {
        self(container)
    }
}

impl<T, F> ServiceFactory<T, WithContainerAndStorage> for F
where
    F: Fn(&Container, &ServiceStorage) -> T,
{
    fn invoke(&self, container: &Container, storage: &ServiceStorage) -> T {
        self(container, storage)
    }
}

/// A patch wrapper of one of the accepted arities: `fn(T)`,
/// `fn(&Container, T)`, or `fn(&Container, &ServiceStorage, T)`.
pub trait ServicePatch<T, M> {
    fn wrap(&self, container: &Container, storage: &ServiceStorage, value: T) -> T;
}

impl<T, F> ServicePatch<T, NoArgs> for F
where
    F: Fn(T) -> T,
{
    fn wrap(&self, _container: &Container, _storage: &ServiceStorage, value: T) -> T {
        self(value)
    }
}

impl<T, F> ServicePatch<T, WithContainer> for F
where
    F: Fn(&Container, T) -> T,
{
    fn wrap(&self, container: &Container, _storage: &ServiceStorage, value: T) -> T {
        self(container, value)
    }
}

impl<T, F> ServicePatch<T, WithContainerAndStorage> for F
where
    F: Fn(&Container, &ServiceStorage, T) -> T,
{
    fn wrap(&self, container: &Container, storage: &ServiceStorage, value: T) -> T {
        self(container, storage, value)
    }
}

/// A type constructible from its declared dependency tuple.
///
/// The dependencies are resolved recursively from the container with the
/// same storage, enabling constructor injection:
///
/// ```ignore
/// impl Injectable for ReportService {
///     type Dependencies = (Database, Mailer, Vec<ReportSink>);
///     fn construct((db, mailer, sinks): Self::Dependencies) -> Self {
///         Self { db, mailer, sinks }
///     }
/// }
/// ```
pub trait Injectable: Sized + 'static {
    type Dependencies: DependencySet;
    fn construct(deps: Self::Dependencies) -> Self;
}

/// A tuple of dependency types resolvable from a container.
pub trait DependencySet: Sized {
    fn resolve_all(container: &Container, storage: &ServiceStorage)
        -> Result<Self, ContainerError>;
}

impl DependencySet for () {
    fn resolve_all(_: &Container, _: &ServiceStorage) -> Result<Self, ContainerError> {
        Ok(())
    }
}

macro_rules! impl_dependency_set {
    ( $( $name:ident ),+ ) => {
        impl<$( $name: 'static ),+> DependencySet for ( $( $name, )+ ) {
            fn resolve_all(
                container: &Container,
                storage: &ServiceStorage,
            ) -> Result<Self, ContainerError> {
                Ok(( $( container.get_with::<$name>(storage)?, )+ ))
            }
        }
    };
}

impl_dependency_set!(A);
impl_dependency_set!(A, B);
impl_dependency_set!(A, B, C);
impl_dependency_set!(A, B, C, D);
impl_dependency_set!(A, B, C, D, E);
impl_dependency_set!(A, B, C, D, E, F);
impl_dependency_set!(A, B, C, D, E, F, G);
impl_dependency_set!(A, B, C, D, E, F, G, H);
