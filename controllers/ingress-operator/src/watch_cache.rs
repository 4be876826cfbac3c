//! Namespace-scoped watch caches.
//!
//! A [`WatchCache`] runs one informer per kind. Each informer lists and then
//! watches its kind through the [`ObjectStore`], mirrors it into a
//! `kube_runtime` reflector store and fans changes out to registered
//! [`EventHandler`]s.
//! [`WatchCache::wait_for_sync`] blocks until every informer has delivered
//! its initial list.

use crate::error::CacheError;
use futures::StreamExt;
use kube::core::{ApiResource, DynamicObject};
use kube_runtime::reflector::ObjectRef;
use kube_runtime::reflector::store::{Store, Writer};
use kube_runtime::watcher::Event;
use kube_store::{ManagedKind, NamespaceScope, ObjectStore};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// A change observed by an informer.
#[derive(Debug, Clone)]
pub enum CacheEvent {
    Added(Arc<DynamicObject>),
    Updated {
        old: Arc<DynamicObject>,
        new: Arc<DynamicObject>,
    },
    /// Carries the last known state of the object.
    Deleted(Arc<DynamicObject>),
}

impl CacheEvent {
    /// The current object, or the final state for deletions.
    pub fn object(&self) -> &DynamicObject {
        match self {
            Self::Added(object) | Self::Deleted(object) => object,
            Self::Updated { new, .. } => new,
        }
    }
}

/// Receives cache events.
///
/// Handlers run on the informer task and must not block.
pub trait EventHandler: Send + Sync {
    fn handle(&self, kind: &ManagedKind, event: &CacheEvent);
}

/// Initial sync state of one informer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncState {
    Pending,
    Synced,
    /// The informer gave up before its first complete list.
    Failed(String),
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn object_ref(resource: &ApiResource, object: &DynamicObject) -> ObjectRef<DynamicObject> {
    ObjectRef::from_obj_with(object, resource.clone())
}

/// Reflector state ordered by namespace and name.
fn sorted_state(store: &Store<DynamicObject>) -> Vec<Arc<DynamicObject>> {
    let mut objects = store.state();
    objects.sort_by(|a, b| {
        (&a.metadata.namespace, &a.metadata.name).cmp(&(&b.metadata.namespace, &b.metadata.name))
    });
    objects
}

#[derive(Clone)]
struct KindStore {
    resource: ApiResource,
    store: Store<DynamicObject>,
}

/// Read-only view of a cache's reflector stores.
#[derive(Clone)]
pub struct CacheReader {
    stores: HashMap<ManagedKind, KindStore>,
}

impl CacheReader {
    pub fn get(&self, kind: &ManagedKind, namespace: Option<&str>, name: &str) -> Option<Arc<DynamicObject>> {
        let mirror = self.stores.get(kind)?;
        let mut key = ObjectRef::new_with(name, mirror.resource.clone());
        if let Some(namespace) = namespace {
            key = key.within(namespace);
        }
        mirror.store.get(&key)
    }

    /// All mirrored objects of `kind`, ordered by namespace and name.
    pub fn list(&self, kind: &ManagedKind) -> Vec<Arc<DynamicObject>> {
        self.stores
            .get(kind)
            .map(|mirror| sorted_state(&mirror.store))
            .unwrap_or_default()
    }

    /// The reflector store backing `kind`.
    pub fn store(&self, kind: &ManagedKind) -> Option<&Store<DynamicObject>> {
        self.stores.get(kind).map(|mirror| &mirror.store)
    }

    pub fn len(&self) -> usize {
        self.stores.values().map(|mirror| mirror.store.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct Informer {
    kind: ManagedKind,
    mirror: KindStore,
    state: watch::Receiver<SyncState>,
    // Handed to the informer task on start
    signal: Mutex<Option<watch::Sender<SyncState>>>,
    writer: Mutex<Option<Writer<DynamicObject>>>,
}

#[derive(Default)]
struct Listeners {
    started: bool,
    by_kind: HashMap<ManagedKind, Vec<Arc<dyn EventHandler>>>,
}

/// A set of informers sharing one namespace scope.
pub struct WatchCache {
    name: String,
    scope: NamespaceScope,
    store: Arc<dyn ObjectStore>,
    informers: Vec<Informer>,
    listeners: Mutex<Listeners>,
    tasks: Mutex<Vec<JoinHandle<Result<(), CacheError>>>>,
}

impl WatchCache {
    /// Creates a cache for `kinds` within `scope`. Every kind must be
    /// registered with the store's registry.
    pub fn new(
        name: impl Into<String>,
        scope: NamespaceScope,
        kinds: impl IntoIterator<Item = ManagedKind>,
        store: Arc<dyn ObjectStore>,
    ) -> Result<Self, CacheError> {
        let mut informers: Vec<Informer> = Vec::new();
        for kind in kinds {
            let resource = store.registry().api_resource(&kind)?;
            if informers.iter().any(|informer| informer.kind == kind) {
                continue;
            }
            let writer = Writer::new(resource.clone());
            let (signal, state) = watch::channel(SyncState::Pending);
            informers.push(Informer {
                kind,
                mirror: KindStore {
                    resource,
                    store: writer.as_reader(),
                },
                state,
                signal: Mutex::new(Some(signal)),
                writer: Mutex::new(Some(writer)),
            });
        }

        Ok(Self {
            name: name.into(),
            scope,
            store,
            informers,
            listeners: Mutex::default(),
            tasks: Mutex::default(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn scope(&self) -> &NamespaceScope {
        &self.scope
    }

    pub fn kinds(&self) -> impl Iterator<Item = &ManagedKind> {
        self.informers.iter().map(|informer| &informer.kind)
    }

    pub fn watches(&self, kind: &ManagedKind) -> bool {
        self.informers.iter().any(|informer| informer.kind == *kind)
    }

    pub fn reader(&self) -> CacheReader {
        CacheReader {
            stores: self
                .informers
                .iter()
                .map(|informer| (informer.kind.clone(), informer.mirror.clone()))
                .collect(),
        }
    }

    /// Registers `handler` for events on `kind`. Only allowed before `start`.
    pub fn register_listener(&self, kind: &ManagedKind, handler: Arc<dyn EventHandler>) -> Result<(), CacheError> {
        if !self.watches(kind) {
            return Err(CacheError::KindNotWatched {
                cache: self.name.clone(),
                kind: kind.to_string(),
            });
        }

        let mut listeners = lock(&self.listeners);
        if listeners.started {
            return Err(CacheError::AlreadyStarted(self.name.clone()));
        }
        listeners.by_kind.entry(kind.clone()).or_default().push(handler);
        Ok(())
    }

    /// Spawns one informer task per kind. Tasks stop when `cancel` fires.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self, cancel: CancellationToken) -> Result<(), CacheError> {
        let mut by_kind = {
            let mut listeners = lock(&self.listeners);
            if listeners.started {
                return Err(CacheError::AlreadyStarted(self.name.clone()));
            }
            listeners.started = true;
            std::mem::take(&mut listeners.by_kind)
        };

        let mut tasks = lock(&self.tasks);
        for informer in &self.informers {
            let (Some(signal), Some(writer)) = (lock(&informer.signal).take(), lock(&informer.writer).take()) else {
                continue;
            };
            let task = InformerTask {
                cache: self.name.clone(),
                kind: informer.kind.clone(),
                scope: self.scope.clone(),
                store: Arc::clone(&self.store),
                writer,
                mirror: informer.mirror.clone(),
                listeners: by_kind.remove(&informer.kind).unwrap_or_default(),
                signal,
            };
            tasks.push(tokio::spawn(task.run(cancel.clone())));
        }

        info!(
            cache = %self.name,
            scope = %self.scope,
            kinds = self.informers.len(),
            "Started watch cache"
        );
        Ok(())
    }

    pub fn is_started(&self) -> bool {
        lock(&self.listeners).started
    }

    /// True once every informer has completed its initial list.
    pub fn is_synced(&self) -> bool {
        self.informers
            .iter()
            .all(|informer| *informer.state.borrow() == SyncState::Synced)
    }

    pub fn sync_state(&self, kind: &ManagedKind) -> Option<SyncState> {
        self.informers
            .iter()
            .find(|informer| informer.kind == *kind)
            .map(|informer| informer.state.borrow().clone())
    }

    /// Waits until every informer has synced.
    ///
    /// Returns `false` if the cache was never started, an informer failed
    /// before syncing, or `cancel` fired first.
    pub async fn wait_for_sync(&self, cancel: &CancellationToken) -> bool {
        if !self.is_started() {
            warn!(cache = %self.name, "wait_for_sync called on a cache that was never started");
            return false;
        }

        for informer in &self.informers {
            let mut state = informer.state.clone();
            let settled = async {
                state
                    .wait_for(|state| *state != SyncState::Pending)
                    .await
                    .map(|state| (*state).clone())
            };

            let outcome = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    debug!(cache = %self.name, kind = %informer.kind, "Cancelled while waiting for sync");
                    return false;
                }
                outcome = settled => outcome,
            };

            match outcome {
                Ok(SyncState::Synced) => {}
                Ok(SyncState::Failed(reason)) => {
                    warn!(cache = %self.name, kind = %informer.kind, reason = %reason, "Informer failed to sync");
                    return false;
                }
                Ok(SyncState::Pending) | Err(_) => {
                    warn!(cache = %self.name, kind = %informer.kind, "Informer stopped before syncing");
                    return false;
                }
            }
        }
        true
    }

    /// Waits up to `grace` for informer tasks to stop, aborting stragglers.
    pub async fn join(&self, grace: Duration) {
        let tasks = std::mem::take(&mut *lock(&self.tasks));
        let deadline = tokio::time::Instant::now() + grace;

        for mut task in tasks {
            match tokio::time::timeout_at(deadline, &mut task).await {
                Ok(Ok(Ok(()))) => {}
                Ok(Ok(Err(e))) => debug!(cache = %self.name, error = %e, "Informer exited with error"),
                Ok(Err(e)) => error!(cache = %self.name, error = %e, "Informer task panicked"),
                Err(_) => {
                    warn!(cache = %self.name, "Informer did not stop within grace period, aborting");
                    task.abort();
                }
            }
        }
    }
}

struct InformerTask {
    cache: String,
    kind: ManagedKind,
    scope: NamespaceScope,
    store: Arc<dyn ObjectStore>,
    writer: Writer<DynamicObject>,
    mirror: KindStore,
    listeners: Vec<Arc<dyn EventHandler>>,
    signal: watch::Sender<SyncState>,
}

impl InformerTask {
    async fn run(mut self, cancel: CancellationToken) -> Result<(), CacheError> {
        debug!(cache = %self.cache, kind = %self.kind, scope = %self.scope, "Starting informer");
        let mut events = self.store.watch(&self.kind, &self.scope);

        loop {
            let next = tokio::select! {
                () = cancel.cancelled() => {
                    debug!(cache = %self.cache, kind = %self.kind, "Informer stopping");
                    self.fail_pending("cancelled");
                    return Ok(());
                }
                next = events.next() => next,
            };

            match next {
                Some(Ok(event)) => self.apply(&event),
                Some(Err(e)) if !self.is_synced() && e.is_unrecoverable() => {
                    let reason = e.to_string();
                    error!(cache = %self.cache, kind = %self.kind, error = %reason, "Initial list failed");
                    self.fail_pending(&reason);
                    return Err(CacheError::Sync {
                        cache: self.cache.clone(),
                        kind: self.kind.to_string(),
                        reason,
                    });
                }
                Some(Err(e)) => {
                    warn!(cache = %self.cache, kind = %self.kind, error = %e, "Watch error, waiting for the stream to recover");
                }
                None => {
                    warn!(cache = %self.cache, kind = %self.kind, "Watch stream ended");
                    self.fail_pending("watch stream ended");
                    return Err(CacheError::StreamEnded {
                        cache: self.cache.clone(),
                        kind: self.kind.to_string(),
                    });
                }
            }
        }
    }

    fn is_synced(&self) -> bool {
        *self.signal.borrow() == SyncState::Synced
    }

    fn fail_pending(&self, reason: &str) {
        self.signal.send_if_modified(|state| {
            if *state == SyncState::Pending {
                *state = SyncState::Failed(reason.to_string());
                true
            } else {
                false
            }
        });
    }

    fn apply(&mut self, event: &Event<DynamicObject>) {
        if let Event::Apply(object) | Event::Delete(object) | Event::InitApply(object) = event {
            // The reflector keys objects by name
            if object.metadata.name.is_none() {
                warn!(cache = %self.cache, kind = %self.kind, "Ignoring object without a name");
                return;
            }
        }

        match event {
            Event::Init => {
                debug!(cache = %self.cache, kind = %self.kind, "Listing");
                self.writer.apply_watcher_event(event);
            }
            Event::InitApply(_) => self.writer.apply_watcher_event(event),
            Event::InitDone => self.finish_list(event),
            Event::Apply(object) => {
                let key = object_ref(&self.mirror.resource, object);
                let old = self.mirror.store.get(&key);
                self.writer.apply_watcher_event(event);
                if let Some(new) = self.mirror.store.get(&key) {
                    self.notify_change(old, new);
                }
            }
            Event::Delete(object) => {
                self.writer.apply_watcher_event(event);
                self.notify(&CacheEvent::Deleted(Arc::new(object.clone())));
            }
        }
    }

    /// Swaps the listed objects into the store and reports what the
    /// (re)list changed, including objects that vanished while the watch
    /// was down.
    fn finish_list(&mut self, event: &Event<DynamicObject>) {
        let resource = &self.mirror.resource;
        let mut before: HashMap<ObjectRef<DynamicObject>, Arc<DynamicObject>> = self
            .mirror
            .store
            .state()
            .into_iter()
            .map(|object| (object_ref(resource, &object), object))
            .collect();

        self.writer.apply_watcher_event(event);
        let listed = sorted_state(&self.mirror.store);
        let objects = listed.len();

        for new in listed {
            let old = before.remove(&object_ref(&self.mirror.resource, &new));
            self.notify_change(old, new);
        }

        let mut stale: Vec<Arc<DynamicObject>> = before.into_values().collect();
        stale.sort_by(|a, b| (&a.metadata.namespace, &a.metadata.name).cmp(&(&b.metadata.namespace, &b.metadata.name)));
        for object in stale {
            debug!(cache = %self.cache, kind = %self.kind, name = ?object.metadata.name, "Pruned object missing from relist");
            self.notify(&CacheEvent::Deleted(object));
        }

        let synced = self.signal.send_if_modified(|state| {
            if *state == SyncState::Pending {
                *state = SyncState::Synced;
                true
            } else {
                false
            }
        });
        if synced {
            info!(cache = %self.cache, kind = %self.kind, objects, "Informer synced");
        } else {
            debug!(cache = %self.cache, kind = %self.kind, objects, "Relist complete");
        }
    }

    /// Reports `new` as added or updated; an unchanged resourceVersion is
    /// not a change.
    fn notify_change(&self, old: Option<Arc<DynamicObject>>, new: Arc<DynamicObject>) {
        let event = match old {
            Some(old)
                if old.metadata.resource_version.is_some()
                    && old.metadata.resource_version == new.metadata.resource_version =>
            {
                return;
            }
            Some(old) => CacheEvent::Updated { old, new },
            None => CacheEvent::Added(new),
        };
        self.notify(&event);
    }

    fn notify(&self, event: &CacheEvent) {
        for listener in &self.listeners {
            listener.handle(&self.kind, event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{self, RecordingHandler};
    use kube_store::MockStore;

    fn cache(store: &MockStore, kinds: Vec<ManagedKind>) -> WatchCache {
        WatchCache::new(
            "test",
            NamespaceScope::namespace("openshift-ingress"),
            kinds,
            Arc::new(store.clone()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_syncs_initial_list_and_delivers_added() {
        let store = test_utils::mock_store();
        store.insert(test_utils::deployment("openshift-ingress", "router-default", Some("default")));
        store.insert(test_utils::deployment("other", "elsewhere", Some("default")));

        let cache = cache(&store, vec![test_utils::deployment_kind()]);
        let handler = Arc::new(RecordingHandler::default());
        cache
            .register_listener(&test_utils::deployment_kind(), handler.clone())
            .unwrap();

        let cancel = CancellationToken::new();
        cache.start(cancel.clone()).unwrap();
        assert!(cache.wait_for_sync(&cancel).await);
        assert!(cache.is_synced());

        assert_eq!(handler.events(), vec!["added openshift-ingress/router-default".to_string()]);
        let reader = cache.reader();
        assert_eq!(reader.len(), 1);
        assert!(reader
            .get(&test_utils::deployment_kind(), Some("openshift-ingress"), "router-default")
            .is_some());

        cancel.cancel();
        cache.join(Duration::from_secs(1)).await;
    }

    #[tokio::test]
    async fn test_delivers_live_changes_after_sync() {
        let store = test_utils::mock_store();
        let cache = cache(&store, vec![test_utils::deployment_kind()]);
        let handler = Arc::new(RecordingHandler::default());
        cache
            .register_listener(&test_utils::deployment_kind(), handler.clone())
            .unwrap();

        let cancel = CancellationToken::new();
        cache.start(cancel.clone()).unwrap();
        assert!(cache.wait_for_sync(&cancel).await);

        let kind = test_utils::deployment_kind();
        let created = store
            .create(&kind, &test_utils::deployment("openshift-ingress", "router", Some("default")))
            .await
            .unwrap();
        let mut changed = created.clone();
        changed.metadata.labels = None;
        store.update(&kind, &changed).await.unwrap();
        store.delete(&kind, Some("openshift-ingress"), "router").await.unwrap();

        test_utils::eventually(|| handler.events().len() == 3).await;
        assert_eq!(
            handler.events(),
            vec![
                "added openshift-ingress/router".to_string(),
                "updated openshift-ingress/router".to_string(),
                "deleted openshift-ingress/router".to_string(),
            ]
        );
        assert!(cache.reader().is_empty());

        cancel.cancel();
        cache.join(Duration::from_secs(1)).await;
    }

    #[tokio::test]
    async fn test_register_after_start_fails() {
        let store = test_utils::mock_store();
        let cache = cache(&store, vec![test_utils::deployment_kind()]);
        let cancel = CancellationToken::new();
        cache.start(cancel.clone()).unwrap();

        let err = cache
            .register_listener(&test_utils::deployment_kind(), Arc::new(RecordingHandler::default()))
            .unwrap_err();
        assert!(matches!(err, CacheError::AlreadyStarted(_)));
        assert!(matches!(cache.start(cancel.clone()), Err(CacheError::AlreadyStarted(_))));

        cancel.cancel();
        cache.join(Duration::from_secs(1)).await;
    }

    #[test]
    fn test_register_for_unwatched_kind_fails() {
        let store = test_utils::mock_store();
        let cache = cache(&store, vec![test_utils::deployment_kind()]);
        let err = cache
            .register_listener(&test_utils::service_kind(), Arc::new(RecordingHandler::default()))
            .unwrap_err();
        assert!(matches!(err, CacheError::KindNotWatched { .. }));
    }

    #[test]
    fn test_unregistered_kind_is_rejected() {
        let store = test_utils::mock_store();
        let result = WatchCache::new(
            "test",
            NamespaceScope::All,
            vec![ManagedKind::new("", "v1", "ConfigMap")],
            Arc::new(store),
        );
        assert!(matches!(result, Err(CacheError::Registry(_))));
    }

    #[tokio::test]
    async fn test_wait_for_sync_without_start_is_false() {
        let store = test_utils::mock_store();
        let cache = cache(&store, vec![test_utils::deployment_kind()]);
        assert!(!cache.wait_for_sync(&CancellationToken::new()).await);
    }

    #[tokio::test]
    async fn test_wait_for_sync_returns_false_on_cancel() {
        let store = test_utils::mock_store();
        store.stall_watch(&test_utils::service_kind());
        let cache = cache(&store, vec![test_utils::deployment_kind(), test_utils::service_kind()]);

        let cancel = CancellationToken::new();
        cache.start(cancel.child_token()).unwrap();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let synced = tokio::time::timeout(Duration::from_secs(2), cache.wait_for_sync(&cancel))
            .await
            .unwrap();
        assert!(!synced);
        assert_eq!(
            cache.sync_state(&test_utils::deployment_kind()),
            Some(SyncState::Synced)
        );
        cache.join(Duration::from_secs(1)).await;
    }

    #[tokio::test]
    async fn test_unrecoverable_error_fails_sync() {
        let store = test_utils::mock_store();
        store.fail_watch(&test_utils::deployment_kind(), "deployments is forbidden");
        let cache = cache(&store, vec![test_utils::deployment_kind()]);

        let cancel = CancellationToken::new();
        cache.start(cancel.clone()).unwrap();
        assert!(!cache.wait_for_sync(&cancel).await);
        assert!(matches!(
            cache.sync_state(&test_utils::deployment_kind()),
            Some(SyncState::Failed(_))
        ));
        cache.join(Duration::from_secs(1)).await;
    }

    #[tokio::test]
    async fn test_transient_errors_still_sync() {
        let store = test_utils::mock_store();
        store.flaky_watch(&test_utils::deployment_kind(), 3);
        let cache = cache(&store, vec![test_utils::deployment_kind()]);

        let cancel = CancellationToken::new();
        cache.start(cancel.clone()).unwrap();
        assert!(cache.wait_for_sync(&cancel).await);

        cancel.cancel();
        cache.join(Duration::from_secs(1)).await;
    }

    fn informer(store: &MockStore, handler: &Arc<RecordingHandler>) -> (InformerTask, Store<DynamicObject>) {
        let kind = test_utils::deployment_kind();
        let resource = store.registry().api_resource(&kind).unwrap();
        let writer = Writer::new(resource.clone());
        let reader = writer.as_reader();
        let (signal, _state) = watch::channel(SyncState::Synced);
        let task = InformerTask {
            cache: "test".to_string(),
            kind,
            scope: NamespaceScope::All,
            store: Arc::new(store.clone()),
            mirror: KindStore {
                resource,
                store: reader.clone(),
            },
            writer,
            listeners: vec![handler.clone() as Arc<dyn EventHandler>],
            signal,
        };
        (task, reader)
    }

    #[test]
    fn test_relist_prunes_missing_objects() {
        let store = test_utils::mock_store();
        let handler = Arc::new(RecordingHandler::default());
        let (mut task, reader) = informer(&store, &handler);

        let kept = test_utils::deployment("openshift-ingress", "kept", None);
        let gone = test_utils::deployment("openshift-ingress", "gone", None);
        task.apply(&Event::Apply(kept.clone()));
        task.apply(&Event::Apply(gone));

        task.apply(&Event::Init);
        task.apply(&Event::InitApply(kept));
        // Listed objects are only visible once the list completes
        assert_eq!(reader.len(), 2);
        task.apply(&Event::InitDone);

        assert_eq!(
            handler.events(),
            vec![
                "added openshift-ingress/kept".to_string(),
                "added openshift-ingress/gone".to_string(),
                "updated openshift-ingress/kept".to_string(),
                "deleted openshift-ingress/gone".to_string(),
            ]
        );
        assert_eq!(reader.len(), 1);
    }

    #[test]
    fn test_same_resource_version_is_not_an_update() {
        let store = test_utils::mock_store();
        let handler = Arc::new(RecordingHandler::default());
        let (mut task, reader) = informer(&store, &handler);

        let mut router = test_utils::deployment("openshift-ingress", "router", None);
        router.metadata.resource_version = Some("7".to_string());
        task.apply(&Event::Apply(router.clone()));
        task.apply(&Event::Apply(router.clone()));
        router.metadata.resource_version = Some("8".to_string());
        task.apply(&Event::Apply(router));

        assert_eq!(
            handler.events(),
            vec![
                "added openshift-ingress/router".to_string(),
                "updated openshift-ingress/router".to_string(),
            ]
        );
        let stored = reader
            .get(&ObjectRef::new_with("router", task.mirror.resource.clone()).within("openshift-ingress"))
            .unwrap();
        assert_eq!(stored.metadata.resource_version.as_deref(), Some("8"));
    }

    #[test]
    fn test_nameless_objects_are_ignored() {
        let store = test_utils::mock_store();
        let handler = Arc::new(RecordingHandler::default());
        let (mut task, reader) = informer(&store, &handler);

        let mut nameless = test_utils::deployment("openshift-ingress", "router", None);
        nameless.metadata.name = None;
        task.apply(&Event::Apply(nameless));

        assert!(handler.events().is_empty());
        assert!(reader.is_empty());
    }

    #[tokio::test]
    async fn test_reader_exposes_reflector_store() {
        let store = test_utils::mock_store();
        store.insert(test_utils::deployment("openshift-ingress", "router-b", None));
        store.insert(test_utils::deployment("openshift-ingress", "router-a", None));
        let cache = cache(&store, vec![test_utils::deployment_kind()]);

        let cancel = CancellationToken::new();
        cache.start(cancel.clone()).unwrap();
        assert!(cache.wait_for_sync(&cancel).await);

        let reader = cache.reader();
        let reflector = reader.store(&test_utils::deployment_kind()).unwrap();
        assert_eq!(reflector.len(), 2);
        let names: Vec<_> = reader
            .list(&test_utils::deployment_kind())
            .iter()
            .filter_map(|object| object.metadata.name.clone())
            .collect();
        assert_eq!(names, vec!["router-a", "router-b"]);
        assert!(reader.store(&test_utils::service_kind()).is_none());
        assert!(reader.list(&test_utils::service_kind()).is_empty());

        cancel.cancel();
        cache.join(Duration::from_secs(1)).await;
    }
}
