//! Kind registry.
//!
//! Maps every object kind the operator works with to the codec needed to
//! address and (de)serialize it. Built once in the process entry point and
//! then shared read-only behind an `Arc`.

use crate::error::RegistryError;
use k8s_openapi::{ClusterResourceScope, NamespaceResourceScope};
use kube::Resource;
use kube::core::{ApiResource, DynamicObject, GroupVersionKind, TypeMeta};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::fmt;

/// Identifies an object kind by group, version and kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ManagedKind {
    /// API group, empty for the core group
    pub group: String,
    pub version: String,
    pub kind: String,
}

impl ManagedKind {
    pub fn new(group: impl Into<String>, version: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            kind: kind.into(),
        }
    }

    /// Kind of a statically typed resource.
    pub fn of<K: Resource<DynamicType = ()>>() -> Self {
        Self::new(K::group(&()), K::version(&()), K::kind(&()))
    }

    /// Parses an `apiVersion` (`apps/v1` or `v1`) plus kind.
    pub fn from_api_version(api_version: &str, kind: &str) -> Self {
        match api_version.split_once('/') {
            Some((group, version)) => Self::new(group, version, kind),
            None => Self::new("", api_version, kind),
        }
    }

    /// Kind recorded in an object's type metadata, if any.
    pub fn from_object(object: &DynamicObject) -> Option<Self> {
        object
            .types
            .as_ref()
            .map(|types| Self::from_api_version(&types.api_version, &types.kind))
    }

    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }

    pub fn type_meta(&self) -> TypeMeta {
        TypeMeta {
            api_version: self.api_version(),
            kind: self.kind.clone(),
        }
    }

    pub fn to_gvk(&self) -> GroupVersionKind {
        GroupVersionKind::gvk(&self.group, &self.version, &self.kind)
    }
}

impl fmt::Display for ManagedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.api_version(), self.kind)
    }
}

/// How a kind is addressed on the API server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KindCodec {
    /// Lowercase plural resource name (`deployments`)
    pub plural: String,
    /// Whether objects of this kind live inside a namespace
    pub namespaced: bool,
}

impl KindCodec {
    pub fn new(plural: impl Into<String>, namespaced: bool) -> Self {
        Self {
            plural: plural.into(),
            namespaced,
        }
    }

    /// Codec for a namespaced typed resource.
    pub fn namespaced<K>() -> Self
    where
        K: Resource<DynamicType = (), Scope = NamespaceResourceScope>,
    {
        Self::new(K::plural(&()), true)
    }

    /// Codec for a cluster-scoped typed resource.
    pub fn cluster<K>() -> Self
    where
        K: Resource<DynamicType = (), Scope = ClusterResourceScope>,
    {
        Self::new(K::plural(&()), false)
    }
}

/// Table of known kinds and their codecs.
///
/// Registration takes `&mut self`, so once the registry is wrapped in an
/// `Arc` and handed to other components it can only be read.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    kinds: BTreeMap<ManagedKind, KindCodec>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a kind.
    ///
    /// Registering the same kind with an identical codec is a no-op; a
    /// different codec is a configuration error.
    pub fn register(&mut self, kind: ManagedKind, codec: KindCodec) -> Result<(), RegistryError> {
        match self.kinds.get(&kind) {
            Some(existing) if *existing == codec => Ok(()),
            Some(existing) => Err(RegistryError::Configuration(format!(
                "kind {kind} already registered as {existing:?}, refusing {codec:?}"
            ))),
            None => {
                self.kinds.insert(kind, codec);
                Ok(())
            }
        }
    }

    pub fn register_namespaced<K>(&mut self) -> Result<(), RegistryError>
    where
        K: Resource<DynamicType = (), Scope = NamespaceResourceScope>,
    {
        self.register(ManagedKind::of::<K>(), KindCodec::namespaced::<K>())
    }

    pub fn register_cluster<K>(&mut self) -> Result<(), RegistryError>
    where
        K: Resource<DynamicType = (), Scope = ClusterResourceScope>,
    {
        self.register(ManagedKind::of::<K>(), KindCodec::cluster::<K>())
    }

    pub fn lookup(&self, kind: &ManagedKind) -> Result<&KindCodec, RegistryError> {
        self.kinds
            .get(kind)
            .ok_or_else(|| RegistryError::UnknownKind(kind.to_string()))
    }

    pub fn contains(&self, kind: &ManagedKind) -> bool {
        self.kinds.contains_key(kind)
    }

    /// Registered kinds in a stable order.
    pub fn kinds(&self) -> impl Iterator<Item = &ManagedKind> {
        self.kinds.keys()
    }

    /// REST resource description for a registered kind.
    pub fn api_resource(&self, kind: &ManagedKind) -> Result<ApiResource, RegistryError> {
        let codec = self.lookup(kind)?;
        Ok(ApiResource {
            group: kind.group.clone(),
            version: kind.version.clone(),
            api_version: kind.api_version(),
            kind: kind.kind.clone(),
            plural: codec.plural.clone(),
        })
    }

    /// Converts a typed object into its dynamic form.
    pub fn encode<K>(&self, object: &K) -> Result<DynamicObject, RegistryError>
    where
        K: Resource<DynamicType = ()> + Serialize,
    {
        let kind = ManagedKind::of::<K>();
        self.lookup(&kind)?;
        let mut dynamic: DynamicObject = serde_json::from_value(serde_json::to_value(object)?)?;
        dynamic.types = Some(kind.type_meta());
        Ok(dynamic)
    }

    /// Converts a dynamic object back into a typed one.
    ///
    /// Objects without type metadata are assumed to be of kind `K`; objects
    /// that name a different kind are rejected.
    pub fn decode<K>(&self, object: &DynamicObject) -> Result<K, RegistryError>
    where
        K: Resource<DynamicType = ()> + DeserializeOwned,
    {
        let kind = ManagedKind::of::<K>();
        self.lookup(&kind)?;
        if let Some(actual) = ManagedKind::from_object(object) {
            if actual != kind {
                return Err(RegistryError::KindMismatch {
                    expected: kind.to_string(),
                    actual: actual.to_string(),
                });
            }
        }

        let mut value = serde_json::to_value(object)?;
        if let Some(fields) = value.as_object_mut() {
            fields.insert("apiVersion".to_string(), kind.api_version().into());
            fields.insert("kind".to_string(), kind.kind.clone().into());
        }
        Ok(serde_json::from_value(value)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crds::{ClusterIngress, ClusterIngressSpec};
    use k8s_openapi::api::apps::v1::Deployment;
    use k8s_openapi::api::core::v1::{Namespace, Service};

    fn registry() -> TypeRegistry {
        let mut registry = TypeRegistry::new();
        registry.register_namespaced::<ClusterIngress>().unwrap();
        registry.register_namespaced::<Deployment>().unwrap();
        registry
    }

    #[test]
    fn test_managed_kind_display() {
        assert_eq!(ManagedKind::of::<Deployment>().to_string(), "apps/v1/Deployment");
        assert_eq!(ManagedKind::of::<Service>().to_string(), "v1/Service");
        assert_eq!(
            ManagedKind::from_api_version("v1", "Service"),
            ManagedKind::of::<Service>()
        );
    }

    #[test]
    fn test_register_identical_codec_is_idempotent() {
        let mut registry = registry();
        registry.register_namespaced::<Deployment>().unwrap();
        assert_eq!(registry.kinds().count(), 2);
    }

    #[test]
    fn test_register_conflicting_codec_fails() {
        let mut registry = registry();
        let err = registry
            .register(ManagedKind::of::<Deployment>(), KindCodec::new("deploys", true))
            .unwrap_err();
        assert!(matches!(err, RegistryError::Configuration(_)));
        assert_eq!(registry.lookup(&ManagedKind::of::<Deployment>()).unwrap().plural, "deployments");
    }

    #[test]
    fn test_lookup_unknown_kind_fails() {
        let registry = registry();
        let err = registry.lookup(&ManagedKind::of::<Service>()).unwrap_err();
        assert!(matches!(err, RegistryError::UnknownKind(ref kind) if kind == "v1/Service"));
    }

    #[test]
    fn test_cluster_codec() {
        let mut registry = TypeRegistry::new();
        registry.register_cluster::<Namespace>().unwrap();
        let codec = registry.lookup(&ManagedKind::of::<Namespace>()).unwrap();
        assert!(!codec.namespaced);
        assert_eq!(codec.plural, "namespaces");
    }

    #[test]
    fn test_encode_and_decode_cluster_ingress() {
        let registry = registry();
        let mut ingress = ClusterIngress::new(
            "default",
            ClusterIngressSpec {
                ingress_domain: Some("apps.example.com".to_string()),
                ..Default::default()
            },
        );
        ingress.metadata.namespace = Some("openshift-ingress-operator".to_string());

        let dynamic = registry.encode(&ingress).unwrap();
        assert_eq!(ManagedKind::from_object(&dynamic), Some(ManagedKind::of::<ClusterIngress>()));
        assert_eq!(dynamic.data["spec"]["ingressDomain"], "apps.example.com");

        let decoded: ClusterIngress = registry.decode(&dynamic).unwrap();
        assert_eq!(decoded.spec, ingress.spec);
        assert_eq!(decoded.metadata.namespace.as_deref(), Some("openshift-ingress-operator"));
    }

    #[test]
    fn test_encode_unregistered_kind_fails() {
        let registry = TypeRegistry::new();
        let ingress = ClusterIngress::new("default", ClusterIngressSpec::default());
        assert!(matches!(registry.encode(&ingress), Err(RegistryError::UnknownKind(_))));
    }

    #[test]
    fn test_decode_rejects_other_kind() {
        let registry = registry();
        let ingress = registry
            .encode(&ClusterIngress::new("default", ClusterIngressSpec::default()))
            .unwrap();
        let err = registry.decode::<Deployment>(&ingress).unwrap_err();
        assert!(matches!(err, RegistryError::KindMismatch { .. }));
    }

    #[test]
    fn test_api_resource() {
        let registry = registry();
        let resource = registry.api_resource(&ManagedKind::of::<ClusterIngress>()).unwrap();
        assert_eq!(resource.api_version, "ingress.openshift.io/v1alpha1");
        assert_eq!(resource.plural, "clusteringresses");
    }
}
