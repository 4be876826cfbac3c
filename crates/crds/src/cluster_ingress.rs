//! ClusterIngress CRD
//!
//! Describes a cluster ingress controller. The operator guarantees that a
//! `default` instance exists in its own namespace; the dependent Deployment
//! and Service live in the managed ingress namespace and carry
//! [`CLUSTER_INGRESS_LABEL`] pointing back at their owner.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Label placed on dependent objects naming the owning ClusterIngress.
///
/// Owner references cannot cross namespaces, so dependents in the managed
/// namespace are linked by this label instead.
pub const CLUSTER_INGRESS_LABEL: &str = "ingress.openshift.io/clusteringress";

#[derive(CustomResource, Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "ingress.openshift.io",
    version = "v1alpha1",
    kind = "ClusterIngress",
    plural = "clusteringresses",
    namespaced,
    status = "ClusterIngressStatus",
    shortname = "ci"
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterIngressSpec {
    /// DNS domain served by this ingress (e.g. `apps.example.com`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingress_domain: Option<String>,

    /// Desired number of router replicas
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,

    /// How the router is exposed outside the cluster
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high_availability: Option<ClusterIngressHighAvailability>,

    /// Secret holding the default serving certificate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_certificate_secret: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClusterIngressHighAvailability {
    #[serde(rename = "type")]
    pub type_: HighAvailabilityType,
}

/// Router exposure strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
pub enum HighAvailabilityType {
    /// Exposed through a cloud load balancer Service
    Cloud,

    /// Exposure left to the administrator
    #[default]
    UserDefined,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClusterIngressStatus {
    /// Number of router replicas observed
    #[serde(default)]
    pub replicas: i32,

    /// Label selector for the router pods
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,

    /// Last reconciliation timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_reconciled: Option<chrono::DateTime<chrono::Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::{CustomResourceExt, Resource};

    #[test]
    fn test_cluster_ingress_type_meta() {
        assert_eq!(ClusterIngress::group(&()), "ingress.openshift.io");
        assert_eq!(ClusterIngress::version(&()), "v1alpha1");
        assert_eq!(ClusterIngress::plural(&()), "clusteringresses");
        assert_eq!(ClusterIngress::crd_name(), "clusteringresses.ingress.openshift.io");
    }

    #[test]
    fn test_spec_serializes_camel_case() {
        let spec = ClusterIngressSpec {
            ingress_domain: Some("apps.example.com".to_string()),
            replicas: Some(2),
            high_availability: Some(ClusterIngressHighAvailability {
                type_: HighAvailabilityType::Cloud,
            }),
            default_certificate_secret: None,
        };
        let value = serde_json::to_value(&spec).unwrap();
        assert_eq!(value["ingressDomain"], "apps.example.com");
        assert_eq!(value["highAvailability"]["type"], "Cloud");
        assert!(value.get("defaultCertificateSecret").is_none());
    }
}
