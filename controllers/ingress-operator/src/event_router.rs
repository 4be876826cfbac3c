//! Maps cache events onto reconcile requests.

use crate::queue::{ReconcileRequest, RequestSender};
use crate::watch_cache::{CacheEvent, EventHandler};
use kube::core::DynamicObject;
use kube_store::ManagedKind;
use tracing::debug;

/// How an object is turned into a request for its primary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnqueueStrategy {
    /// The object is the primary.
    ForObject,
    /// The object names its primary through `label`; the primary lives in
    /// `namespace`, or is cluster scoped when `None`.
    ForLabel {
        label: String,
        namespace: Option<String>,
    },
}

/// Event handler that schedules requests on a controller.
pub struct EventRouter {
    strategy: EnqueueStrategy,
    requests: RequestSender,
}

impl EventRouter {
    pub fn new(strategy: EnqueueStrategy, requests: RequestSender) -> Self {
        Self { strategy, requests }
    }

    pub fn request_for(&self, object: &DynamicObject) -> Option<ReconcileRequest> {
        match &self.strategy {
            EnqueueStrategy::ForObject => {
                let name = object.metadata.name.as_deref()?;
                Some(ReconcileRequest::new(object.metadata.namespace.clone(), name))
            }
            EnqueueStrategy::ForLabel { label, namespace } => object
                .metadata
                .labels
                .as_ref()?
                .get(label)
                .filter(|owner| !owner.is_empty())
                .map(|owner| ReconcileRequest::new(namespace.clone(), owner.as_str())),
        }
    }
}

impl EventHandler for EventRouter {
    fn handle(&self, kind: &ManagedKind, event: &CacheEvent) {
        let requests = match event {
            CacheEvent::Added(object) | CacheEvent::Deleted(object) => vec![self.request_for(object)],
            // A relabelled object may have moved between primaries
            CacheEvent::Updated { old, new } => vec![self.request_for(old), self.request_for(new)],
        };

        for request in requests.into_iter().flatten() {
            debug!(kind = %kind, request = %request, "Scheduling reconcile request");
            if self.requests.unbounded_send(request.now()).is_err() {
                debug!(kind = %kind, "Controller is gone, dropping request");
                return;
            }
        }
    }
}
