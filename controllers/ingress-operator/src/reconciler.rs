//! ClusterIngress reconciler.
//!
//! Reads the ClusterIngress and its router objects from the watch caches
//! and reports what it sees. It never writes to the cluster.

use crate::controller::Reconciler;
use crate::error::OperatorError;
use crate::queue::ReconcileRequest;
use crate::watch_cache::CacheReader;
use async_trait::async_trait;
use crds::{CLUSTER_INGRESS_LABEL, ClusterIngress};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use kube_store::{ManagedKind, TypeRegistry};
use std::sync::Arc;
use tracing::info;

/// Snapshot of one ClusterIngress and its dependents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngressObservation {
    pub ingress_domain: Option<String>,
    pub replicas: Option<i32>,
    pub deployments: usize,
    pub services: usize,
}

pub struct IngressReconciler {
    registry: Arc<TypeRegistry>,
    ingresses: CacheReader,
    dependents: CacheReader,
}

impl IngressReconciler {
    pub fn new(registry: Arc<TypeRegistry>, ingresses: CacheReader, dependents: CacheReader) -> Self {
        Self {
            registry,
            ingresses,
            dependents,
        }
    }

    /// Returns `None` if the ClusterIngress is gone from the cache.
    pub fn observe(&self, request: &ReconcileRequest) -> Result<Option<IngressObservation>, OperatorError> {
        let Some(object) = self.ingresses.get(
            &ManagedKind::of::<ClusterIngress>(),
            request.namespace.as_deref(),
            &request.name,
        ) else {
            return Ok(None);
        };
        let ingress: ClusterIngress = self.registry.decode(&object)?;

        Ok(Some(IngressObservation {
            ingress_domain: ingress.spec.ingress_domain,
            replicas: ingress.spec.replicas,
            deployments: self.dependents_of(&ManagedKind::of::<Deployment>(), &request.name),
            services: self.dependents_of(&ManagedKind::of::<Service>(), &request.name),
        }))
    }

    fn dependents_of(&self, kind: &ManagedKind, owner: &str) -> usize {
        self.dependents
            .list(kind)
            .iter()
            .filter(|object| {
                object
                    .metadata
                    .labels
                    .as_ref()
                    .and_then(|labels| labels.get(CLUSTER_INGRESS_LABEL))
                    .is_some_and(|value| value == owner)
            })
            .count()
    }
}

#[async_trait]
impl Reconciler for IngressReconciler {
    async fn reconcile(&self, request: &ReconcileRequest) -> Result<(), OperatorError> {
        match self.observe(request)? {
            Some(observed) => info!(
                clusteringress = %request,
                domain = observed.ingress_domain.as_deref().unwrap_or("<unset>"),
                replicas = ?observed.replicas,
                deployments = observed.deployments,
                services = observed.services,
                "Observed ClusterIngress"
            ),
            None => info!(clusteringress = %request, "ClusterIngress no longer exists"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils;
    use crate::watch_cache::WatchCache;
    use kube_store::NamespaceScope;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    #[tokio::test]
    async fn test_observe_counts_labelled_dependents() {
        let store = test_utils::mock_store();
        store.insert(test_utils::cluster_ingress("openshift-ingress-operator", "default"));
        store.insert(test_utils::deployment("openshift-ingress", "router-default", Some("default")));
        store.insert(test_utils::deployment("openshift-ingress", "router-internal", Some("internal")));
        store.insert(test_utils::service("openshift-ingress", "router-default", Some("default")));

        let store: Arc<dyn kube_store::ObjectStore> = Arc::new(store);
        let ingresses = WatchCache::new(
            "operator",
            NamespaceScope::namespace("openshift-ingress-operator"),
            vec![test_utils::ingress_kind()],
            Arc::clone(&store),
        )
        .unwrap();
        let dependents = WatchCache::new(
            "managed",
            NamespaceScope::namespace("openshift-ingress"),
            vec![test_utils::deployment_kind(), test_utils::service_kind()],
            store,
        )
        .unwrap();

        let cancel = CancellationToken::new();
        ingresses.start(cancel.clone()).unwrap();
        dependents.start(cancel.clone()).unwrap();
        assert!(ingresses.wait_for_sync(&cancel).await);
        assert!(dependents.wait_for_sync(&cancel).await);

        let reconciler = IngressReconciler::new(test_utils::registry(), ingresses.reader(), dependents.reader());
        let request = ReconcileRequest::new(Some("openshift-ingress-operator".to_string()), "default");
        let observed = reconciler.observe(&request).unwrap().unwrap();
        assert_eq!(observed.ingress_domain.as_deref(), Some("apps.example.com"));
        assert_eq!(observed.deployments, 1);
        assert_eq!(observed.services, 1);

        let missing = ReconcileRequest::new(Some("openshift-ingress-operator".to_string()), "internal");
        assert_eq!(reconciler.observe(&missing).unwrap(), None);
        assert!(reconciler.reconcile(&missing).await.is_ok());

        cancel.cancel();
        ingresses.join(Duration::from_secs(1)).await;
        dependents.join(Duration::from_secs(1)).await;
    }
}
