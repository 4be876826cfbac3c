//! Shared fixtures for unit tests.

use crate::config::OperatorConfig;
use crate::controller::{Dispatcher, Reconciler};
use crate::error::OperatorError;
use crate::manifests::ManifestFactory;
use crate::queue::ReconcileRequest;
use crate::scheme;
use crate::watch_cache::{CacheEvent, EventHandler};
use async_trait::async_trait;
use crds::{CLUSTER_INGRESS_LABEL, ClusterIngress, ClusterIngressSpec};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::core::DynamicObject;
use kube_store::{ManagedKind, MockStore, NamespaceScope, ObjectStore, StoreError, TypeRegistry, WatchStream};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub fn config() -> OperatorConfig {
    let vars = HashMap::from([("BASE_DOMAIN", "example.com")]);
    OperatorConfig::from_lookup(|key| vars.get(key).map(|value| value.to_string())).unwrap()
}

pub fn registry() -> Arc<TypeRegistry> {
    Arc::new(scheme::operator_registry().unwrap())
}

pub fn mock_store() -> MockStore {
    MockStore::new(registry())
}

pub fn ingress_kind() -> ManagedKind {
    ManagedKind::of::<ClusterIngress>()
}

pub fn deployment_kind() -> ManagedKind {
    ManagedKind::of::<Deployment>()
}

pub fn service_kind() -> ManagedKind {
    ManagedKind::of::<Service>()
}

fn metadata(namespace: &str, name: &str, owner: Option<&str>) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(namespace.to_string()),
        labels: owner.map(|owner| BTreeMap::from([(CLUSTER_INGRESS_LABEL.to_string(), owner.to_string())])),
        ..ObjectMeta::default()
    }
}

pub fn cluster_ingress(namespace: &str, name: &str) -> DynamicObject {
    let mut ingress = ClusterIngress::new(
        name,
        ClusterIngressSpec {
            ingress_domain: Some("apps.example.com".to_string()),
            replicas: Some(2),
            ..ClusterIngressSpec::default()
        },
    );
    ingress.metadata.namespace = Some(namespace.to_string());
    registry().encode(&ingress).unwrap()
}

/// A Deployment, optionally labelled as belonging to the ClusterIngress `owner`.
pub fn deployment(namespace: &str, name: &str, owner: Option<&str>) -> DynamicObject {
    let deployment = Deployment {
        metadata: metadata(namespace, name, owner),
        ..Deployment::default()
    };
    registry().encode(&deployment).unwrap()
}

pub fn service(namespace: &str, name: &str, owner: Option<&str>) -> DynamicObject {
    let service = Service {
        metadata: metadata(namespace, name, owner),
        ..Service::default()
    };
    registry().encode(&service).unwrap()
}

/// Polls `condition` until it holds, failing the test after two seconds.
pub async fn eventually(condition: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not met within 2s");
}

/// Records cache events as `"<added|updated|deleted> <namespace>/<name>"`.
#[derive(Default)]
pub struct RecordingHandler {
    events: Mutex<Vec<String>>,
}

impl RecordingHandler {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl EventHandler for RecordingHandler {
    fn handle(&self, _kind: &ManagedKind, event: &CacheEvent) {
        let verb = match event {
            CacheEvent::Added(_) => "added",
            CacheEvent::Updated { .. } => "updated",
            CacheEvent::Deleted(_) => "deleted",
        };
        let object = event.object();
        self.events.lock().unwrap().push(format!(
            "{verb} {}/{}",
            object.metadata.namespace.as_deref().unwrap_or_default(),
            object.metadata.name.as_deref().unwrap_or_default()
        ));
    }
}

#[derive(Default)]
pub struct RecordingReconciler {
    requests: Mutex<Vec<String>>,
}

impl RecordingReconciler {
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Reconciler for RecordingReconciler {
    async fn reconcile(&self, request: &ReconcileRequest) -> Result<(), OperatorError> {
        self.requests.lock().unwrap().push(request.name.clone());
        Ok(())
    }
}

/// Dispatcher that records whether it was entered, then waits for cancellation.
#[derive(Default)]
pub struct RecordingDispatcher {
    entered: AtomicBool,
}

impl RecordingDispatcher {
    pub fn entered(&self) -> bool {
        self.entered.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Dispatcher for RecordingDispatcher {
    async fn run(&self, cancel: CancellationToken) -> Result<(), OperatorError> {
        self.entered.store(true, Ordering::SeqCst);
        cancel.cancelled().await;
        Ok(())
    }
}

pub struct FailingManifests;

impl ManifestFactory for FailingManifests {
    fn default_resource(&self) -> Result<DynamicObject, OperatorError> {
        Err(OperatorError::Manifest("no default resource".to_string()))
    }
}

/// Store whose creates never complete; everything else goes to the mock.
pub struct PendingCreateStore {
    inner: MockStore,
}

impl PendingCreateStore {
    pub fn new(inner: MockStore) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl ObjectStore for PendingCreateStore {
    fn registry(&self) -> &TypeRegistry {
        self.inner.registry()
    }

    async fn get(&self, kind: &ManagedKind, namespace: Option<&str>, name: &str) -> Result<DynamicObject, StoreError> {
        self.inner.get(kind, namespace, name).await
    }

    async fn list(&self, kind: &ManagedKind, scope: &NamespaceScope) -> Result<Vec<DynamicObject>, StoreError> {
        self.inner.list(kind, scope).await
    }

    async fn create(&self, _kind: &ManagedKind, _object: &DynamicObject) -> Result<DynamicObject, StoreError> {
        std::future::pending().await
    }

    async fn update(&self, kind: &ManagedKind, object: &DynamicObject) -> Result<DynamicObject, StoreError> {
        self.inner.update(kind, object).await
    }

    async fn delete(&self, kind: &ManagedKind, namespace: Option<&str>, name: &str) -> Result<(), StoreError> {
        self.inner.delete(kind, namespace, name).await
    }

    fn watch(&self, kind: &ManagedKind, scope: &NamespaceScope) -> WatchStream {
        self.inner.watch(kind, scope)
    }
}
