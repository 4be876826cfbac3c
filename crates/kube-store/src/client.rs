//! Kubernetes-backed object store.

use crate::error::{StoreError, classify};
use crate::models::{NamespaceScope, ObjectKey};
use crate::registry::{ManagedKind, TypeRegistry};
use crate::store_trait::{ObjectStore, WatchStream};
use futures::{StreamExt, TryStreamExt, future, stream};
use kube::api::{Api, DeleteParams, ListParams, PostParams};
use kube::core::{ApiResource, DynamicObject};
use kube::discovery::{self, Scope};
use kube::Client;
use kube_runtime::{WatchStreamExt, watcher};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// REST mapping resolved for one kind.
#[derive(Debug, Clone)]
struct Mapping {
    resource: ApiResource,
    namespaced: bool,
}

/// Object store over a live API server.
pub struct KubeStore {
    client: Client,
    registry: Arc<TypeRegistry>,
    mappings: HashMap<ManagedKind, Mapping>,
}

impl std::fmt::Debug for KubeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeStore")
            .field("kinds", &self.mappings.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl KubeStore {
    /// Creates a store, resolving every registered kind through discovery.
    ///
    /// Fails with [`StoreError::Discovery`] if any kind is not served.
    pub async fn new(client: Client, registry: Arc<TypeRegistry>) -> Result<Self, StoreError> {
        let mut mappings = HashMap::new();
        for kind in registry.kinds() {
            let codec = registry.lookup(kind)?;
            let (resource, capabilities) = discovery::pinned_kind(&client, &kind.to_gvk())
                .await
                .map_err(|e| StoreError::Discovery {
                    kind: kind.to_string(),
                    reason: e.to_string(),
                })?;
            let namespaced = matches!(capabilities.scope, Scope::Namespaced);

            if resource.plural != codec.plural || namespaced != codec.namespaced {
                warn!(
                    kind = %kind,
                    registered_plural = %codec.plural,
                    discovered_plural = %resource.plural,
                    registered_namespaced = codec.namespaced,
                    discovered_namespaced = namespaced,
                    "Discovered mapping differs from registered codec, using discovered mapping"
                );
            }
            debug!(kind = %kind, plural = %resource.plural, namespaced, "Resolved resource mapping");
            mappings.insert(kind.clone(), Mapping { resource, namespaced });
        }
        info!(kinds = mappings.len(), "Resolved resource mappings for all registered kinds");

        Ok(Self {
            client,
            registry,
            mappings,
        })
    }

    fn mapping(&self, kind: &ManagedKind) -> Result<&Mapping, StoreError> {
        self.registry.lookup(kind)?;
        self.mappings.get(kind).ok_or_else(|| StoreError::Discovery {
            kind: kind.to_string(),
            reason: "kind was registered after the store was built".to_string(),
        })
    }

    /// Api handle for a single object.
    fn object_api(&self, kind: &ManagedKind, namespace: Option<&str>) -> Result<Api<DynamicObject>, StoreError> {
        let mapping = self.mapping(kind)?;
        match (mapping.namespaced, namespace) {
            (true, Some(namespace)) => Ok(Api::namespaced_with(self.client.clone(), namespace, &mapping.resource)),
            (true, None) => Err(StoreError::InvalidObject(format!("{kind} is namespaced but no namespace was given"))),
            (false, _) => Ok(Api::all_with(self.client.clone(), &mapping.resource)),
        }
    }

    /// Api handle for a list or watch over a scope.
    fn scoped_api(&self, kind: &ManagedKind, scope: &NamespaceScope) -> Result<Api<DynamicObject>, StoreError> {
        let mapping = self.mapping(kind)?;
        Ok(match (mapping.namespaced, scope.as_namespace()) {
            (true, Some(namespace)) => Api::namespaced_with(self.client.clone(), namespace, &mapping.resource),
            _ => Api::all_with(self.client.clone(), &mapping.resource),
        })
    }
}

fn object_name<'a>(kind: &ManagedKind, object: &'a DynamicObject) -> Result<&'a str, StoreError> {
    object
        .metadata
        .name
        .as_deref()
        .ok_or_else(|| StoreError::InvalidObject(format!("{kind} object has no metadata.name")))
}

#[async_trait::async_trait]
impl ObjectStore for KubeStore {
    fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    async fn get(&self, kind: &ManagedKind, namespace: Option<&str>, name: &str) -> Result<DynamicObject, StoreError> {
        let target = ObjectKey::new(kind.clone(), namespace, name).to_string();
        self.object_api(kind, namespace)?
            .get(name)
            .await
            .map_err(|e| classify(e, &target))
    }

    async fn list(&self, kind: &ManagedKind, scope: &NamespaceScope) -> Result<Vec<DynamicObject>, StoreError> {
        let list = self
            .scoped_api(kind, scope)?
            .list(&ListParams::default())
            .await
            .map_err(|e| classify(e, &format!("{kind} in {scope}")))?;
        Ok(list.items)
    }

    async fn create(&self, kind: &ManagedKind, object: &DynamicObject) -> Result<DynamicObject, StoreError> {
        let name = object_name(kind, object)?;
        let namespace = object.metadata.namespace.as_deref();
        let target = ObjectKey::new(kind.clone(), namespace, name).to_string();
        self.object_api(kind, namespace)?
            .create(&PostParams::default(), object)
            .await
            .map_err(|e| classify(e, &target))
    }

    async fn update(&self, kind: &ManagedKind, object: &DynamicObject) -> Result<DynamicObject, StoreError> {
        let name = object_name(kind, object)?;
        let namespace = object.metadata.namespace.as_deref();
        let target = ObjectKey::new(kind.clone(), namespace, name).to_string();
        self.object_api(kind, namespace)?
            .replace(name, &PostParams::default(), object)
            .await
            .map_err(|e| classify(e, &target))
    }

    async fn delete(&self, kind: &ManagedKind, namespace: Option<&str>, name: &str) -> Result<(), StoreError> {
        let target = ObjectKey::new(kind.clone(), namespace, name).to_string();
        self.object_api(kind, namespace)?
            .delete(name, &DeleteParams::default())
            .await
            .map(|_| ())
            .map_err(|e| classify(e, &target))
    }

    fn watch(&self, kind: &ManagedKind, scope: &NamespaceScope) -> WatchStream {
        match self.scoped_api(kind, scope) {
            Ok(api) => watcher(api, watcher::Config::default())
                .default_backoff()
                .map_err(StoreError::from)
                .boxed(),
            Err(e) => stream::once(future::ready(Err(e))).boxed(),
        }
    }
}
