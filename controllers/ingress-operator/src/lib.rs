//! Ingress Operator
//!
//! Ensures the default ClusterIngress exists, brings up watch caches over
//! the operator and managed namespaces, and only starts reconciling once
//! every cache has synced. See [`operator::Operator`] for the startup
//! sequence.

pub mod config;
pub mod controller;
pub mod error;
pub mod event_router;
pub mod health;
pub mod manifests;
pub mod operator;
pub mod queue;
pub mod reconciler;
pub mod scheme;
pub mod watch_cache;

#[cfg(test)]
mod test_utils;

pub use config::OperatorConfig;
pub use error::{CacheError, OperatorError};
pub use operator::{EnsureOutcome, Operator, OperatorBuilder, Phase};
