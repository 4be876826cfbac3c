//! Mock ObjectStore for unit testing
//!
//! This module provides an in-memory implementation of [`ObjectStore`] that
//! behaves like the API server for create/get/update/delete and serves
//! list+watch streams, without requiring a running cluster. Faults can be
//! injected per kind to exercise failure paths.

use crate::error::StoreError;
use crate::models::{NamespaceScope, ObjectKey};
use crate::registry::{ManagedKind, TypeRegistry};
use crate::store_trait::{ObjectStore, WatchStream};
use futures::{StreamExt, future, stream};
use kube::core::{DynamicObject, ErrorResponse};
use kube_runtime::watcher::{self, Event};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;

type Change = (ManagedKind, Event<DynamicObject>);

/// Injected watch behaviour for one kind
#[derive(Debug, Clone)]
enum WatchFault {
    /// Stream yields an unrecoverable error before listing anything
    Fail(String),
    /// Stream yields this many transient errors, then behaves normally
    Flaky(usize),
    /// Stream lists existing objects but never reports `InitDone`
    Stall,
}

/// Mock ObjectStore for testing
///
/// Clones share the same underlying state, so a test can keep one handle
/// for setup and assertions while the code under test holds another.
#[derive(Clone)]
pub struct MockStore {
    registry: Arc<TypeRegistry>,
    objects: Arc<Mutex<BTreeMap<ObjectKey, DynamicObject>>>,
    changes: broadcast::Sender<Change>,
    watch_faults: Arc<Mutex<HashMap<ManagedKind, WatchFault>>>,
    create_faults: Arc<Mutex<HashMap<ManagedKind, String>>>,
    calls: Arc<Mutex<HashMap<&'static str, usize>>>,
    next_resource_version: Arc<Mutex<u64>>,
}

impl std::fmt::Debug for MockStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockStore").finish_non_exhaustive()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockStore {
    /// Create a new mock store serving the kinds in `registry`
    pub fn new(registry: Arc<TypeRegistry>) -> Self {
        let (changes, _) = broadcast::channel(1024);
        Self {
            registry,
            objects: Arc::new(Mutex::new(BTreeMap::new())),
            changes,
            watch_faults: Arc::new(Mutex::new(HashMap::new())),
            create_faults: Arc::new(Mutex::new(HashMap::new())),
            calls: Arc::new(Mutex::new(HashMap::new())),
            next_resource_version: Arc::new(Mutex::new(1)),
        }
    }

    /// Seed an object without counting a call (for test setup)
    pub fn insert(&self, object: DynamicObject) {
        let Some(kind) = ManagedKind::from_object(&object) else {
            return;
        };
        let Some(key) = ObjectKey::for_object(&kind, &object) else {
            return;
        };
        let stored = self.stamp(&kind, object);
        let mut objects = lock(&self.objects);
        objects.insert(key, stored.clone());
        let _ = self.changes.send((kind, Event::Apply(stored)));
    }

    /// Make every watch of `kind` fail with an unrecoverable error
    pub fn fail_watch(&self, kind: &ManagedKind, message: impl Into<String>) {
        lock(&self.watch_faults).insert(kind.clone(), WatchFault::Fail(message.into()));
    }

    /// Make the next watch of `kind` yield `errors` transient errors first
    pub fn flaky_watch(&self, kind: &ManagedKind, errors: usize) {
        lock(&self.watch_faults).insert(kind.clone(), WatchFault::Flaky(errors));
    }

    /// Make every watch of `kind` list objects but never finish syncing
    pub fn stall_watch(&self, kind: &ManagedKind) {
        lock(&self.watch_faults).insert(kind.clone(), WatchFault::Stall);
    }

    /// Make every create of `kind` fail as if the API server were unreachable
    pub fn fail_create(&self, kind: &ManagedKind, message: impl Into<String>) {
        lock(&self.create_faults).insert(kind.clone(), message.into());
    }

    /// Number of times `operation` (`get`, `list`, `create`, ...) was called
    pub fn calls(&self, operation: &str) -> usize {
        lock(&self.calls).get(operation).copied().unwrap_or(0)
    }

    /// Number of stored objects of `kind`
    pub fn count(&self, kind: &ManagedKind) -> usize {
        lock(&self.objects).keys().filter(|key| key.kind == *kind).count()
    }

    fn record(&self, operation: &'static str) {
        *lock(&self.calls).entry(operation).or_insert(0) += 1;
    }

    /// Assign type metadata and a fresh resourceVersion
    fn stamp(&self, kind: &ManagedKind, mut object: DynamicObject) -> DynamicObject {
        let mut next = lock(&self.next_resource_version);
        object.types = Some(kind.type_meta());
        object.metadata.resource_version = Some(next.to_string());
        if object.metadata.uid.is_none() {
            object.metadata.uid = Some(format!("mock-uid-{next}"));
        }
        *next += 1;
        object
    }

    fn key(kind: &ManagedKind, object: &DynamicObject) -> Result<ObjectKey, StoreError> {
        ObjectKey::for_object(kind, object)
            .ok_or_else(|| StoreError::InvalidObject(format!("{kind} object has no metadata.name")))
    }
}

/// Status body the API server attaches to a failed request
fn status(code: u16, reason: &str, message: String) -> ErrorResponse {
    ErrorResponse {
        status: "Failure".to_string(),
        message,
        reason: reason.to_string(),
        code,
    }
}

fn in_scope(event: &Event<DynamicObject>, scope: &NamespaceScope) -> bool {
    match event {
        Event::Apply(object) | Event::Delete(object) | Event::InitApply(object) => {
            scope.contains(object.metadata.namespace.as_deref())
        }
        Event::Init | Event::InitDone => true,
    }
}

#[async_trait::async_trait]
impl ObjectStore for MockStore {
    fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    async fn get(&self, kind: &ManagedKind, namespace: Option<&str>, name: &str) -> Result<DynamicObject, StoreError> {
        self.record("get");
        self.registry.lookup(kind)?;
        let key = ObjectKey::new(kind.clone(), namespace, name);
        lock(&self.objects)
            .get(&key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn list(&self, kind: &ManagedKind, scope: &NamespaceScope) -> Result<Vec<DynamicObject>, StoreError> {
        self.record("list");
        self.registry.lookup(kind)?;
        Ok(lock(&self.objects)
            .iter()
            .filter(|(key, _)| key.kind == *kind && scope.contains(key.namespace.as_deref()))
            .map(|(_, object)| object.clone())
            .collect())
    }

    async fn create(&self, kind: &ManagedKind, object: &DynamicObject) -> Result<DynamicObject, StoreError> {
        self.record("create");
        self.registry.lookup(kind)?;
        if let Some(message) = lock(&self.create_faults).get(kind) {
            return Err(StoreError::Remote(message.clone()));
        }
        let key = Self::key(kind, object)?;

        let mut objects = lock(&self.objects);
        if objects.contains_key(&key) {
            return Err(StoreError::AlreadyExists(key.to_string()));
        }
        let stored = self.stamp(kind, object.clone());
        objects.insert(key, stored.clone());
        let _ = self.changes.send((kind.clone(), Event::Apply(stored.clone())));
        Ok(stored)
    }

    async fn update(&self, kind: &ManagedKind, object: &DynamicObject) -> Result<DynamicObject, StoreError> {
        self.record("update");
        self.registry.lookup(kind)?;
        let key = Self::key(kind, object)?;

        let mut objects = lock(&self.objects);
        let current = objects
            .get(&key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
        if let Some(expected) = object.metadata.resource_version.as_deref() {
            if current.metadata.resource_version.as_deref() != Some(expected) {
                return Err(StoreError::Conflict(format!(
                    "{key}: resourceVersion {expected} is stale"
                )));
            }
        }
        let mut stored = self.stamp(kind, object.clone());
        stored.metadata.uid.clone_from(&current.metadata.uid);
        objects.insert(key, stored.clone());
        let _ = self.changes.send((kind.clone(), Event::Apply(stored.clone())));
        Ok(stored)
    }

    async fn delete(&self, kind: &ManagedKind, namespace: Option<&str>, name: &str) -> Result<(), StoreError> {
        self.record("delete");
        self.registry.lookup(kind)?;
        let key = ObjectKey::new(kind.clone(), namespace, name);

        let mut objects = lock(&self.objects);
        let removed = objects
            .remove(&key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
        let _ = self.changes.send((kind.clone(), Event::Delete(removed)));
        Ok(())
    }

    fn watch(&self, kind: &ManagedKind, scope: &NamespaceScope) -> WatchStream {
        self.record("watch");
        if let Err(e) = self.registry.lookup(kind) {
            return stream::once(future::ready(Err(e.into()))).boxed();
        }

        let fault = {
            let mut faults = lock(&self.watch_faults);
            match faults.get(kind).cloned() {
                // Flaky faults only affect the first watch.
                Some(WatchFault::Flaky(errors)) => {
                    faults.remove(kind);
                    Some(WatchFault::Flaky(errors))
                }
                other => other,
            }
        };

        let mut initial: Vec<Result<Event<DynamicObject>, StoreError>> = Vec::new();
        match fault {
            Some(WatchFault::Fail(message)) => {
                let denied = kube::Error::Api(status(403, "Forbidden", message));
                return stream::once(future::ready(Err(StoreError::from(watcher::Error::InitialListFailed(denied)))))
                    .chain(stream::pending())
                    .boxed();
            }
            Some(WatchFault::Flaky(errors)) => {
                initial.extend(
                    (1..=errors).map(|attempt| {
                        let failure = status(500, "InternalError", format!("transient watch failure #{attempt}"));
                        Err(StoreError::from(watcher::Error::WatchError(failure)))
                    }),
                );
            }
            Some(WatchFault::Stall) | None => {}
        }

        // Subscribe before the snapshot so no change falls between the two.
        let changes = {
            let objects = lock(&self.objects);
            initial.push(Ok(Event::Init));
            initial.extend(
                objects
                    .iter()
                    .filter(|(key, _)| key.kind == *kind && scope.contains(key.namespace.as_deref()))
                    .map(|(_, object)| Ok(Event::InitApply(object.clone()))),
            );
            self.changes.subscribe()
        };

        if matches!(fault, Some(WatchFault::Stall)) {
            return stream::iter(initial).chain(stream::pending()).boxed();
        }
        initial.push(Ok(Event::InitDone));

        let kind = kind.clone();
        let scope = scope.clone();
        let live = stream::unfold(changes, move |mut changes| {
            let kind = kind.clone();
            let scope = scope.clone();
            async move {
                loop {
                    match changes.recv().await {
                        Ok((changed, event)) if changed == kind && in_scope(&event, &scope) => {
                            return Some((Ok(event), changes));
                        }
                        Ok(_) => {}
                        Err(broadcast::error::RecvError::Lagged(missed)) => {
                            let expired = status(410, "Expired", format!("watch fell behind by {missed} events"));
                            return Some((Err(StoreError::from(watcher::Error::WatchError(expired))), changes));
                        }
                        Err(broadcast::error::RecvError::Closed) => return None,
                    }
                }
            }
        });

        stream::iter(initial).chain(live).boxed()
    }
}
