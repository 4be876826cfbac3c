//! Operator configuration.
//!
//! All settings come from environment variables; see [`OperatorConfig::from_env`].

use crate::error::OperatorError;
use std::env;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::info;

/// Runtime configuration for the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorConfig {
    /// Namespace the operator runs in and where ClusterIngresses live
    pub operator_namespace: String,
    /// Namespace holding router Deployments and Services
    pub managed_namespace: String,
    /// Name of the default ClusterIngress
    pub default_ingress_name: String,
    /// Cluster base domain
    pub base_domain: String,
    /// Explicit ingress domain, overriding `apps.<base_domain>`
    pub ingress_domain: Option<String>,
    /// Infrastructure platform (`aws`, `libvirt`, ...)
    pub platform: Option<String>,
    pub default_replicas: i32,
    pub health_addr: SocketAddr,
    /// How long background loops get to stop after cancellation
    pub shutdown_grace: Duration,
}

impl OperatorConfig {
    /// Loads configuration from the process environment.
    ///
    /// | Variable | Default |
    /// |---|---|
    /// | `OPERATOR_NAMESPACE` | `openshift-ingress-operator` |
    /// | `MANAGED_NAMESPACE` | `openshift-ingress` |
    /// | `DEFAULT_INGRESS_NAME` | `default` |
    /// | `BASE_DOMAIN` | required |
    /// | `INGRESS_DOMAIN` | `apps.<BASE_DOMAIN>` |
    /// | `PLATFORM` | unset |
    /// | `DEFAULT_REPLICAS` | `2` |
    /// | `HEALTH_BIND_ADDR` | `0.0.0.0:8080` |
    /// | `SHUTDOWN_GRACE_SECONDS` | `10` |
    pub fn from_env() -> Result<Self, OperatorError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Loads configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, OperatorError> {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let base_domain = var("BASE_DOMAIN").ok_or_else(|| {
            OperatorError::InvalidConfig("BASE_DOMAIN environment variable is required".to_string())
        })?;

        let default_replicas = match var("DEFAULT_REPLICAS") {
            Some(raw) => raw
                .parse::<i32>()
                .ok()
                .filter(|replicas| *replicas >= 0)
                .ok_or_else(|| OperatorError::InvalidConfig(format!("DEFAULT_REPLICAS must be a non-negative integer, got {raw:?}")))?,
            None => 2,
        };

        let health_addr = var("HEALTH_BIND_ADDR")
            .unwrap_or_else(|| "0.0.0.0:8080".to_string());
        let health_addr = health_addr
            .parse::<SocketAddr>()
            .map_err(|e| OperatorError::InvalidConfig(format!("HEALTH_BIND_ADDR {health_addr:?}: {e}")))?;

        let shutdown_grace = match var("SHUTDOWN_GRACE_SECONDS") {
            Some(raw) => raw
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|e| OperatorError::InvalidConfig(format!("SHUTDOWN_GRACE_SECONDS {raw:?}: {e}")))?,
            None => Duration::from_secs(10),
        };

        Ok(Self {
            operator_namespace: var("OPERATOR_NAMESPACE")
                .unwrap_or_else(|| "openshift-ingress-operator".to_string()),
            managed_namespace: var("MANAGED_NAMESPACE").unwrap_or_else(|| "openshift-ingress".to_string()),
            default_ingress_name: var("DEFAULT_INGRESS_NAME").unwrap_or_else(|| "default".to_string()),
            base_domain,
            ingress_domain: var("INGRESS_DOMAIN"),
            platform: var("PLATFORM"),
            default_replicas,
            health_addr,
            shutdown_grace,
        })
    }

    /// Domain served by the default ClusterIngress.
    pub fn ingress_domain(&self) -> String {
        self.ingress_domain
            .clone()
            .unwrap_or_else(|| format!("apps.{}", self.base_domain))
    }

    pub fn log(&self) {
        info!("Configuration:");
        info!("  Operator namespace: {}", self.operator_namespace);
        info!("  Managed namespace: {}", self.managed_namespace);
        info!("  Default ClusterIngress: {}", self.default_ingress_name);
        info!("  Ingress domain: {}", self.ingress_domain());
        info!("  Platform: {}", self.platform.as_deref().unwrap_or("unspecified"));
        info!("  Health endpoint: {}", self.health_addr);
    }
}
