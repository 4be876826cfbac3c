//! Reconcile requests and the channel that feeds them to a controller's
//! scheduler.

use futures::channel::mpsc;
use kube_runtime::scheduler::ScheduleRequest;
use std::fmt;
use tokio::time::Instant;

/// Identifies the primary object a reconcile pass should look at.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReconcileRequest {
    pub namespace: Option<String>,
    pub name: String,
}

impl ReconcileRequest {
    pub fn new(namespace: Option<String>, name: impl Into<String>) -> Self {
        Self {
            namespace,
            name: name.into(),
        }
    }

    /// Wraps the request for immediate scheduling.
    pub fn now(self) -> ScheduleRequest<Self> {
        ScheduleRequest {
            message: self,
            run_at: Instant::now(),
        }
    }
}

impl fmt::Display for ReconcileRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(namespace) => write!(f, "{}/{}", namespace, self.name),
            None => f.write_str(&self.name),
        }
    }
}

pub type RequestSender = mpsc::UnboundedSender<ScheduleRequest<ReconcileRequest>>;
pub type RequestReceiver = mpsc::UnboundedReceiver<ScheduleRequest<ReconcileRequest>>;

pub fn request_channel() -> (RequestSender, RequestReceiver) {
    mpsc::unbounded()
}
