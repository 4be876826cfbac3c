//! Kinds known to the operator.
//!
//! Any new kind the operator reads, writes or watches must be registered
//! here; the store refuses to touch anything else.

use crds::ClusterIngress;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use kube_store::{RegistryError, TypeRegistry};

/// Builds the operator's type registry.
pub fn operator_registry() -> Result<TypeRegistry, RegistryError> {
    let mut registry = TypeRegistry::new();
    registry.register_namespaced::<ClusterIngress>()?;
    registry.register_namespaced::<Deployment>()?;
    registry.register_namespaced::<Service>()?;
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube_store::ManagedKind;

    #[test]
    fn test_operator_registry_kinds() {
        let registry = operator_registry().unwrap();
        assert!(registry.contains(&ManagedKind::of::<ClusterIngress>()));
        assert!(registry.contains(&ManagedKind::of::<Deployment>()));
        assert!(registry.contains(&ManagedKind::of::<Service>()));
        assert_eq!(registry.kinds().count(), 3);
    }
}
