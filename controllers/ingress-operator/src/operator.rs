//! Operator startup orchestration.
//!
//! Startup is strictly ordered:
//!
//! 1. ensure the default ClusterIngress exists (create, tolerating "already exists")
//! 2. start every watch cache
//! 3. wait for every cache to report its initial sync, in registration order
//! 4. hand control to the dispatcher until cancelled
//!
//! Any failure before step 4 aborts startup; the dispatcher is never entered
//! with an unsynced cache.

use crate::config::OperatorConfig;
use crate::controller::{Controller, Dispatcher};
use crate::error::OperatorError;
use crate::event_router::EnqueueStrategy;
use crate::health::Metrics;
use crate::manifests::{Factory, ManifestFactory};
use crate::reconciler::IngressReconciler;
use crate::watch_cache::WatchCache;
use crds::{CLUSTER_INGRESS_LABEL, ClusterIngress};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use kube_store::{ManagedKind, NamespaceScope, ObjectKey, ObjectStore, TypeRegistry};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Lifecycle phase of the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Init,
    DefaultEnsured,
    CachesStarting,
    CachesSynced,
    Dispatching,
    Stopped,
    Failed,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::DefaultEnsured => "default-ensured",
            Self::CachesStarting => "caches-starting",
            Self::CachesSynced => "caches-synced",
            Self::Dispatching => "dispatching",
            Self::Stopped => "stopped",
            Self::Failed => "failed",
        }
    }

    /// Numeric value exported as the phase gauge.
    pub fn code(self) -> i64 {
        match self {
            Self::Init => 0,
            Self::DefaultEnsured => 1,
            Self::CachesStarting => 2,
            Self::CachesSynced => 3,
            Self::Dispatching => 4,
            Self::Stopped => 5,
            Self::Failed => 6,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of [`Operator::ensure_default`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnsureOutcome {
    Created,
    AlreadyPresent,
}

impl EnsureOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::AlreadyPresent => "already_present",
        }
    }
}

pub struct Operator {
    store: Arc<dyn ObjectStore>,
    manifests: Arc<dyn ManifestFactory>,
    caches: Vec<WatchCache>,
    dispatcher: Arc<dyn Dispatcher>,
    phase: watch::Sender<Phase>,
    metrics: Option<Arc<Metrics>>,
    shutdown_grace: Duration,
}

/// Assembles an [`Operator`] from explicit parts.
pub struct OperatorBuilder {
    store: Arc<dyn ObjectStore>,
    manifests: Option<Arc<dyn ManifestFactory>>,
    caches: Vec<WatchCache>,
    dispatcher: Option<Arc<dyn Dispatcher>>,
    metrics: Option<Arc<Metrics>>,
    shutdown_grace: Duration,
}

impl OperatorBuilder {
    pub fn manifests(mut self, manifests: Arc<dyn ManifestFactory>) -> Self {
        self.manifests = Some(manifests);
        self
    }

    /// Adds a cache. Caches are synced in the order they are added.
    pub fn cache(mut self, cache: WatchCache) -> Self {
        self.caches.push(cache);
        self
    }

    pub fn dispatcher(mut self, dispatcher: Arc<dyn Dispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    pub fn metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    pub fn build(self) -> Result<Operator, OperatorError> {
        let manifests = self
            .manifests
            .ok_or_else(|| OperatorError::InvalidConfig("operator requires a manifest factory".to_string()))?;
        let dispatcher = self
            .dispatcher
            .ok_or_else(|| OperatorError::InvalidConfig("operator requires a dispatcher".to_string()))?;

        let (phase, _) = watch::channel(Phase::Init);
        let operator = Operator {
            store: self.store,
            manifests,
            caches: self.caches,
            dispatcher,
            phase,
            metrics: self.metrics,
            shutdown_grace: self.shutdown_grace,
        };
        if let Some(metrics) = &operator.metrics {
            metrics.set_phase(Phase::Init);
        }
        Ok(operator)
    }
}

impl Operator {
    pub fn builder(store: Arc<dyn ObjectStore>) -> OperatorBuilder {
        OperatorBuilder {
            store,
            manifests: None,
            caches: Vec::new(),
            dispatcher: None,
            metrics: None,
            shutdown_grace: Duration::from_secs(10),
        }
    }

    /// Wires the production operator: one cache over the operator namespace
    /// watching ClusterIngresses, one over the managed namespace watching
    /// router Deployments and Services, and the ClusterIngress controller.
    pub fn from_config(
        config: &OperatorConfig,
        store: Arc<dyn ObjectStore>,
        registry: Arc<TypeRegistry>,
        metrics: Option<Arc<Metrics>>,
    ) -> Result<Self, OperatorError> {
        let ingress_kind = ManagedKind::of::<ClusterIngress>();
        let dependent_kinds = [ManagedKind::of::<Deployment>(), ManagedKind::of::<Service>()];

        let operator_cache = WatchCache::new(
            config.operator_namespace.clone(),
            NamespaceScope::namespace(&config.operator_namespace),
            [ingress_kind.clone()],
            Arc::clone(&store),
        )?;
        let managed_cache = WatchCache::new(
            config.managed_namespace.clone(),
            NamespaceScope::namespace(&config.managed_namespace),
            dependent_kinds.clone(),
            Arc::clone(&store),
        )?;

        let reconciler = Arc::new(IngressReconciler::new(
            Arc::clone(&registry),
            operator_cache.reader(),
            managed_cache.reader(),
        ));
        let controller = Controller::new("clusteringress", reconciler);
        controller.watch(&operator_cache, &ingress_kind, EnqueueStrategy::ForObject)?;
        for kind in &dependent_kinds {
            controller.watch(
                &managed_cache,
                kind,
                EnqueueStrategy::ForLabel {
                    label: CLUSTER_INGRESS_LABEL.to_string(),
                    namespace: Some(config.operator_namespace.clone()),
                },
            )?;
        }

        let mut builder = Operator::builder(store)
            .manifests(Arc::new(Factory::new(config, registry)))
            .cache(operator_cache)
            .cache(managed_cache)
            .dispatcher(Arc::new(controller))
            .shutdown_grace(config.shutdown_grace);
        if let Some(metrics) = metrics {
            builder = builder.metrics(metrics);
        }
        builder.build()
    }

    /// Subscribes to phase transitions.
    pub fn phase(&self) -> watch::Receiver<Phase> {
        self.phase.subscribe()
    }

    pub fn caches(&self) -> &[WatchCache] {
        &self.caches
    }

    fn set_phase(&self, phase: Phase) {
        let previous = self.phase.send_replace(phase);
        if previous != phase {
            info!(from = %previous, to = %phase, "Operator phase changed");
        }
        if let Some(metrics) = &self.metrics {
            metrics.set_phase(phase);
        }
    }

    /// Creates the default resource unless it already exists.
    ///
    /// Safe to call repeatedly; only the first successful call creates.
    pub async fn ensure_default(&self) -> Result<EnsureOutcome, OperatorError> {
        let object = self.manifests.default_resource()?;
        let kind = ManagedKind::from_object(&object)
            .ok_or_else(|| OperatorError::Manifest("default resource has no apiVersion/kind".to_string()))?;
        let target = ObjectKey::for_object(&kind, &object)
            .ok_or_else(|| OperatorError::Manifest("default resource has no name".to_string()))?;

        let outcome = match self.store.create(&kind, &object).await {
            Ok(created) => {
                info!(resource = %target, uid = ?created.metadata.uid, "Created default cluster ingress");
                EnsureOutcome::Created
            }
            Err(e) if e.is_already_exists() => {
                info!(resource = %target, "Default cluster ingress already exists");
                EnsureOutcome::AlreadyPresent
            }
            Err(e) => return Err(OperatorError::EnsureDefault(e)),
        };

        if let Some(metrics) = &self.metrics {
            metrics.record_ensure(outcome);
        }
        Ok(outcome)
    }

    /// Runs the operator until `cancel` fires or startup fails.
    ///
    /// Informer tasks run under a child of `cancel` and are stopped (with a
    /// grace period) before this returns, on every path.
    pub async fn start(&self, cancel: CancellationToken) -> Result<(), OperatorError> {
        let background = cancel.child_token();
        let result = self.run(&cancel, &background).await;

        background.cancel();
        for cache in &self.caches {
            cache.join(self.shutdown_grace).await;
        }

        match &result {
            Ok(()) => {
                self.set_phase(Phase::Stopped);
                info!("Operator stopped");
            }
            Err(e) => {
                self.set_phase(Phase::Failed);
                error!(error = %e, "Operator failed");
            }
        }
        result
    }

    async fn run(&self, cancel: &CancellationToken, background: &CancellationToken) -> Result<(), OperatorError> {
        self.set_phase(Phase::Init);
        if cancel.is_cancelled() {
            info!("Cancelled before startup");
            return Ok(());
        }

        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                info!("Cancelled while ensuring the default cluster ingress");
                return Ok(());
            }
            ensured = self.ensure_default() => {
                ensured?;
            }
        }
        self.set_phase(Phase::DefaultEnsured);

        self.set_phase(Phase::CachesStarting);
        for cache in &self.caches {
            cache.start(background.clone())?;
        }

        for cache in &self.caches {
            info!(cache = cache.name(), "Waiting for cache to sync");
            if !cache.wait_for_sync(cancel).await {
                return Err(OperatorError::CacheSync(cache.name().to_string()));
            }
            info!(cache = cache.name(), "Cache synced");
            if let Some(metrics) = &self.metrics {
                metrics.set_cache_synced(cache.name(), true);
            }
        }
        self.set_phase(Phase::CachesSynced);

        self.set_phase(Phase::Dispatching);
        self.dispatcher.run(cancel.clone()).await
    }
}
