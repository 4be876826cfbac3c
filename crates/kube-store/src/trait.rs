//! ObjectStore trait for mocking
//!
//! This trait abstracts the remote object store so the operator can run
//! against the real API server ([`KubeStore`](crate::KubeStore)) or an
//! in-memory mock in unit tests.

use crate::error::StoreError;
use crate::models::NamespaceScope;
use crate::registry::{ManagedKind, TypeRegistry};
use futures::stream::BoxStream;
use kube::core::DynamicObject;
use kube_runtime::watcher::Event;

/// List+watch stream for one kind.
///
/// Starts with `Init`, one `InitApply` per existing object and `InitDone`,
/// then carries `Apply`/`Delete` for live changes. A relist repeats the
/// `Init..InitDone` sequence.
pub type WatchStream = BoxStream<'static, Result<Event<DynamicObject>, StoreError>>;

/// Trait for remote object store operations
///
/// Every call names a registered [`ManagedKind`]; an unregistered kind fails
/// with [`RegistryError::UnknownKind`](crate::RegistryError::UnknownKind).
/// No call retries internally. Implementations must be safe to call
/// concurrently from many tasks.
#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    /// Registry the store was built from
    fn registry(&self) -> &TypeRegistry;

    async fn get(&self, kind: &ManagedKind, namespace: Option<&str>, name: &str) -> Result<DynamicObject, StoreError>;
    async fn list(&self, kind: &ManagedKind, scope: &NamespaceScope) -> Result<Vec<DynamicObject>, StoreError>;

    /// Creates `object`; an existing object with the same key yields
    /// [`StoreError::AlreadyExists`] and is left untouched.
    async fn create(&self, kind: &ManagedKind, object: &DynamicObject) -> Result<DynamicObject, StoreError>;
    async fn update(&self, kind: &ManagedKind, object: &DynamicObject) -> Result<DynamicObject, StoreError>;
    async fn delete(&self, kind: &ManagedKind, namespace: Option<&str>, name: &str) -> Result<(), StoreError>;

    /// Opens a list+watch stream for `kind` within `scope`.
    fn watch(&self, kind: &ManagedKind, scope: &NamespaceScope) -> WatchStream;
}
