//! Ingress Operator CRD Definitions
//!
//! Kubernetes Custom Resource Definitions managed by the ingress operator.

pub mod cluster_ingress;

pub use cluster_ingress::*;
