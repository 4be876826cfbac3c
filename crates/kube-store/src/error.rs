//! Object store errors

use kube_runtime::watcher;
use thiserror::Error;

/// Errors raised while registering or resolving kinds
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Kind registered twice with different codecs
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Kind was never registered
    #[error("Unknown kind: {0}")]
    UnknownKind(String),

    /// Object carries a different apiVersion/kind than requested
    #[error("Kind mismatch: expected {expected}, got {actual}")]
    KindMismatch { expected: String, actual: String },

    /// Typed object could not be converted to or from its dynamic form
    #[error("Codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Errors that can occur when talking to the object store
#[derive(Debug, Error)]
pub enum StoreError {
    /// Kubernetes API error with no more specific variant
    #[error("Kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// Watch stream error
    #[error("Watch error: {0}")]
    Watch(#[from] watcher::Error),

    /// Kind not registered, or codec failure
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Kind could not be resolved to a served resource
    #[error("Discovery failed for {kind}: {reason}")]
    Discovery { kind: String, reason: String },

    /// Create hit an existing object
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Object does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Optimistic concurrency check failed
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Credentials rejected or access denied
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Object is missing required fields (name, namespace)
    #[error("Invalid object: {0}")]
    InvalidObject(String),

    /// Transport or client-side failure talking to the API server
    #[error("Remote error: {0}")]
    Remote(String),
}

impl StoreError {
    /// Returns true if the error is an `AlreadyExists` response.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists(_))
    }

    /// Returns true if the error is a `NotFound` response.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Returns true if retrying the same call cannot succeed.
    ///
    /// Missing registrations, unresolved kinds, denied access and kinds the
    /// server does not serve are unrecoverable. Transport hiccups and
    /// server-side throttling are not.
    pub fn is_unrecoverable(&self) -> bool {
        match self {
            Self::Registry(_)
            | Self::Discovery { .. }
            | Self::Forbidden(_)
            | Self::NotFound(_)
            | Self::InvalidObject(_) => true,
            Self::Kube(kube::Error::Api(status)) => is_unrecoverable_code(status.code),
            Self::Watch(
                watcher::Error::InitialListFailed(kube::Error::Api(status))
                | watcher::Error::WatchStartFailed(kube::Error::Api(status)),
            ) => is_unrecoverable_code(status.code),
            _ => false,
        }
    }
}

fn is_unrecoverable_code(code: u16) -> bool {
    matches!(code, 401 | 403 | 404 | 405)
}

/// Maps a kube client error onto the store taxonomy.
pub(crate) fn classify(err: kube::Error, target: &str) -> StoreError {
    match &err {
        kube::Error::Api(status) => match status.code {
            401 | 403 => StoreError::Forbidden(format!("{target}: {}", status.message)),
            404 => StoreError::NotFound(target.to_string()),
            409 if status.reason == "AlreadyExists" => StoreError::AlreadyExists(target.to_string()),
            409 => StoreError::Conflict(format!("{target}: {}", status.message)),
            _ => StoreError::Kube(err),
        },
        _ => StoreError::Remote(format!("{target}: {err}")),
    }
}
