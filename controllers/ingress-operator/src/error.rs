//! Operator error types.
//!
//! This module defines the errors raised while bootstrapping the operator
//! that are not covered by the object store's own taxonomy.

use kube_store::{RegistryError, StoreError};
use thiserror::Error;

/// Errors raised by a [`WatchCache`](crate::watch_cache::WatchCache).
#[derive(Debug, Error)]
pub enum CacheError {
    /// `start` or `register_listener` called on a running cache
    #[error("cache {0} has already been started")]
    AlreadyStarted(String),

    /// Listener registered for a kind the cache does not mirror
    #[error("cache {cache} does not watch {kind}")]
    KindNotWatched { cache: String, kind: String },

    /// Informer hit an unrecoverable error before its initial sync
    #[error("cache {cache} failed to sync {kind}: {reason}")]
    Sync {
        cache: String,
        kind: String,
        reason: String,
    },

    /// Watch stream closed underneath the informer
    #[error("watch stream for {kind} in cache {cache} ended")]
    StreamEnded { cache: String, kind: String },

    /// Cache built with an unregistered kind
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
}

/// Errors that can occur in the Ingress Operator.
#[derive(Debug, Error)]
pub enum OperatorError {
    /// Kind registration or codec error
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Watch cache error
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Default manifest could not be produced
    #[error("Manifest error: {0}")]
    Manifest(String),

    /// Creating the default ClusterIngress failed for a reason other than
    /// it already existing
    #[error("failed to ensure default cluster ingress: {0}")]
    EnsureDefault(#[source] StoreError),

    /// A watch cache never reported a completed initial sync
    #[error("failed to sync cache {0}")]
    CacheSync(String),

    /// Dispatcher entered twice
    #[error("controller {0} is already running")]
    AlreadyRunning(String),

    /// Health server I/O error
    #[error("Health server error: {0}")]
    Health(#[from] std::io::Error),

    /// Metrics registry error
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}
