//! Manifests for resources the operator creates.

use crate::config::OperatorConfig;
use crate::error::OperatorError;
use crds::{ClusterIngress, ClusterIngressHighAvailability, ClusterIngressSpec, HighAvailabilityType};
use kube::core::DynamicObject;
use kube_store::TypeRegistry;
use std::sync::Arc;

/// Source of the default managed resource.
pub trait ManifestFactory: Send + Sync {
    /// The object that must exist once the operator has started.
    fn default_resource(&self) -> Result<DynamicObject, OperatorError>;
}

/// Builds manifests from operator configuration.
#[derive(Debug, Clone)]
pub struct Factory {
    registry: Arc<TypeRegistry>,
    namespace: String,
    name: String,
    ingress_domain: String,
    replicas: i32,
    platform: Option<String>,
}

impl Factory {
    pub fn new(config: &OperatorConfig, registry: Arc<TypeRegistry>) -> Self {
        Self {
            registry,
            namespace: config.operator_namespace.clone(),
            name: config.default_ingress_name.clone(),
            ingress_domain: config.ingress_domain(),
            replicas: config.default_replicas,
            platform: config.platform.clone(),
        }
    }

    /// The default ClusterIngress.
    ///
    /// On AWS the router is exposed through a cloud load balancer; other
    /// platforms leave exposure to the administrator.
    pub fn default_cluster_ingress(&self) -> Result<ClusterIngress, OperatorError> {
        if self.ingress_domain.is_empty() {
            return Err(OperatorError::Manifest("ingress domain is empty".to_string()));
        }

        let high_availability = self
            .platform
            .as_deref()
            .filter(|platform| platform.eq_ignore_ascii_case("aws"))
            .map(|_| ClusterIngressHighAvailability {
                type_: HighAvailabilityType::Cloud,
            });

        let mut ingress = ClusterIngress::new(
            &self.name,
            ClusterIngressSpec {
                ingress_domain: Some(self.ingress_domain.clone()),
                replicas: Some(self.replicas),
                high_availability,
                default_certificate_secret: None,
            },
        );
        ingress.metadata.namespace = Some(self.namespace.clone());
        Ok(ingress)
    }
}

impl ManifestFactory for Factory {
    fn default_resource(&self) -> Result<DynamicObject, OperatorError> {
        Ok(self.registry.encode(&self.default_cluster_ingress()?)?)
    }
}
