//! Kubernetes Object Store
//!
//! A typed interface over the Kubernetes API used by the ingress operator.
//! Every kind the operator touches is registered once in a [`TypeRegistry`];
//! the [`KubeStore`] resolves those kinds against the API server at
//! construction time and then serves get/list/create/update/delete and
//! list+watch streams for them as [`DynamicObject`]s.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use k8s_openapi::api::core::v1::ConfigMap;
//! use kube_store::{KubeStore, ManagedKind, ObjectStore, TypeRegistry};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut registry = TypeRegistry::new();
//! registry.register_namespaced::<ConfigMap>()?;
//! let registry = Arc::new(registry);
//!
//! let client = kube::Client::try_default().await?;
//! let store = KubeStore::new(client, registry).await?;
//!
//! let kind = ManagedKind::of::<ConfigMap>();
//! let config = store.get(&kind, Some("kube-system"), "kube-root-ca.crt").await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - **Discovery**: kinds are resolved to REST resources before first use
//! - **Error taxonomy**: API status codes mapped to [`StoreError`] variants
//! - **Watch streams**: `kube_runtime::watcher` events with backoff
//! - **Mocking**: an in-memory [`MockStore`] behind the `test-util` feature
//!
//! [`DynamicObject`]: kube::core::DynamicObject

pub mod client;
pub mod error;
pub mod models;
pub mod registry;
#[path = "trait.rs"]
pub mod store_trait;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;

pub use client::KubeStore;
pub use error::{RegistryError, StoreError};
pub use models::{NamespaceScope, ObjectKey};
pub use registry::{KindCodec, ManagedKind, TypeRegistry};
pub use store_trait::{ObjectStore, WatchStream};
#[cfg(any(test, feature = "test-util"))]
pub use mock::MockStore;
