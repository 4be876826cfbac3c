//! Controller dispatch loop.
//!
//! A [`Controller`] subscribes event routers to watch caches and feeds the
//! requests they produce through a `kube_runtime` scheduler into its
//! [`Reconciler`]. Requests still pending when a duplicate arrives are
//! reconciled once.

use crate::error::{CacheError, OperatorError};
use crate::event_router::{EnqueueStrategy, EventRouter};
use crate::queue::{ReconcileRequest, RequestReceiver, RequestSender, request_channel};
use crate::watch_cache::WatchCache;
use async_trait::async_trait;
use futures::StreamExt;
use kube_runtime::scheduler;
use kube_store::ManagedKind;
use std::sync::{Arc, Mutex, PoisonError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Business logic invoked for each scheduled request.
#[async_trait]
pub trait Reconciler: Send + Sync {
    async fn reconcile(&self, request: &ReconcileRequest) -> Result<(), OperatorError>;
}

/// Long-running event dispatch, entered once caches are synced.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    /// Runs until `cancel` fires.
    async fn run(&self, cancel: CancellationToken) -> Result<(), OperatorError>;
}

pub struct Controller<R> {
    name: String,
    requests: RequestSender,
    receiver: Mutex<Option<RequestReceiver>>,
    reconciler: Arc<R>,
}

impl<R: Reconciler + 'static> Controller<R> {
    pub fn new(name: impl Into<String>, reconciler: Arc<R>) -> Self {
        let (requests, receiver) = request_channel();
        Self {
            name: name.into(),
            requests,
            receiver: Mutex::new(Some(receiver)),
            reconciler,
        }
    }

    /// Routes `kind` events from `cache` into this controller.
    pub fn watch(&self, cache: &WatchCache, kind: &ManagedKind, strategy: EnqueueStrategy) -> Result<(), CacheError> {
        debug!(controller = %self.name, cache = cache.name(), kind = %kind, ?strategy, "Registering watch");
        cache.register_listener(kind, Arc::new(EventRouter::new(strategy, self.requests.clone())))
    }

    /// Schedules `request` for an immediate reconcile.
    pub fn enqueue(&self, request: ReconcileRequest) {
        // The receiver lives as long as `self`, so this only fails after `run` returned.
        let _ = self.requests.unbounded_send(request.now());
    }
}

#[async_trait]
impl<R: Reconciler + 'static> Dispatcher for Controller<R> {
    async fn run(&self, cancel: CancellationToken) -> Result<(), OperatorError> {
        let receiver = self
            .receiver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or_else(|| OperatorError::AlreadyRunning(self.name.clone()))?;

        info!(controller = %self.name, "Starting controller");
        let mut scheduled = std::pin::pin!(scheduler(receiver));

        loop {
            let request = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                next = scheduled.next() => match next {
                    Some(request) => request,
                    None => break,
                },
            };

            debug!(controller = %self.name, request = %request, "Reconciling");
            if let Err(e) = self.reconciler.reconcile(&request).await {
                error!(controller = %self.name, request = %request, error = %e, "Reconciliation failed");
            }
        }

        info!(controller = %self.name, "Controller stopped");
        Ok(())
    }
}
