//! Addressing types shared by the store and its callers.

use crate::registry::ManagedKind;
use kube::core::DynamicObject;
use std::fmt;

/// Namespace a watch or list is restricted to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NamespaceScope {
    /// Every namespace, plus cluster-scoped objects
    All,
    /// A single namespace
    Namespace(String),
}

impl NamespaceScope {
    /// Builds a scope from a namespace string; empty or `*` means all.
    pub fn namespace(namespace: impl Into<String>) -> Self {
        let namespace = namespace.into();
        if namespace.is_empty() || namespace == "*" {
            Self::All
        } else {
            Self::Namespace(namespace)
        }
    }

    pub fn as_namespace(&self) -> Option<&str> {
        match self {
            Self::All => None,
            Self::Namespace(namespace) => Some(namespace),
        }
    }

    /// Whether an object in `namespace` falls inside this scope.
    pub fn contains(&self, namespace: Option<&str>) -> bool {
        match self {
            Self::All => true,
            Self::Namespace(scope) => namespace == Some(scope.as_str()),
        }
    }
}

impl From<&str> for NamespaceScope {
    fn from(namespace: &str) -> Self {
        Self::namespace(namespace)
    }
}

impl fmt::Display for NamespaceScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("*"),
            Self::Namespace(namespace) => f.write_str(namespace),
        }
    }
}

/// Unique address of one object in the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub kind: ManagedKind,
    pub namespace: Option<String>,
    pub name: String,
}

impl ObjectKey {
    pub fn new(kind: ManagedKind, namespace: Option<&str>, name: &str) -> Self {
        Self {
            kind,
            namespace: namespace.map(str::to_string),
            name: name.to_string(),
        }
    }

    /// Key of `object`, which must carry a name.
    pub fn for_object(kind: &ManagedKind, object: &DynamicObject) -> Option<Self> {
        let name = object.metadata.name.as_deref()?;
        Some(Self::new(kind.clone(), object.metadata.namespace.as_deref(), name))
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(namespace) => write!(f, "{} {}/{}", self.kind, namespace, self.name),
            None => write!(f, "{} {}", self.kind, self.name),
        }
    }
}
