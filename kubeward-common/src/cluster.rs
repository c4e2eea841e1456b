//! Cluster registry and access-control types

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;

/// Registered Kubernetes cluster
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cluster {
    /// Unique cluster identifier (UUID)
    pub id: String,
    /// User-friendly cluster name, unique across the registry
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// API server endpoint taken from the kubeconfig
    pub api_server: String,
    /// Kubeconfig blob. Never serialized back to callers.
    #[serde(default, skip_serializing)]
    pub credential: String,
    /// Server version reported by the last successful probe
    #[serde(default)]
    pub version: String,
    pub import_state: ImportState,
    pub health_state: HealthState,
    pub enabled: bool,
    /// Owning tenant, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub remark: String,
    /// Unix timestamp of registration
    pub created_at: i64,
    /// Unix timestamp of last update
    pub updated_at: i64,
}

impl Cluster {
    /// Copy of the record with the credential blanked
    pub fn redacted(&self) -> Self {
        Self {
            credential: String::new(),
            ..self.clone()
        }
    }
}

/// Import pipeline state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ImportState {
    #[default]
    Importing,
    Success,
    Failed,
}

impl std::fmt::Display for ImportState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Importing => write!(f, "importing"),
            Self::Success => write!(f, "success"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for ImportState {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s {
            "importing" => Ok(Self::Importing),
            "success" => Ok(Self::Success),
            "failed" => Ok(Self::Failed),
            other => Err(crate::Error::Validation(format!(
                "unknown import state '{}'",
                other
            ))),
        }
    }
}

/// Health as observed by the last explicit probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    #[default]
    Unknown,
    Healthy,
    Unhealthy,
}

impl std::fmt::Display for HealthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::Healthy => write!(f, "healthy"),
            Self::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

impl FromStr for HealthState {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s {
            "unknown" => Ok(Self::Unknown),
            "healthy" => Ok(Self::Healthy),
            "unhealthy" => Ok(Self::Unhealthy),
            other => Err(crate::Error::Validation(format!(
                "unknown health state '{}'",
                other
            ))),
        }
    }
}

/// Access level carried by a grant or a resolved decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    ReadOnly,
    Admin,
}

impl std::fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ReadOnly => write!(f, "readonly"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for AccessLevel {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s {
            "readonly" => Ok(Self::ReadOnly),
            "admin" => Ok(Self::Admin),
            other => Err(crate::Error::Validation(format!(
                "access level must be 'readonly' or 'admin', got '{}'",
                other
            ))),
        }
    }
}

/// Grant of a role onto a cluster
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterAccessGrant {
    pub id: String,
    pub cluster_id: String,
    pub role_id: String,
    pub level: AccessLevel,
    /// Namespaces this grant is confined to. Empty means unrestricted.
    #[serde(default)]
    pub namespaces: Vec<String>,
    pub created_at: i64,
}

/// Namespaces an operation is confined to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", content = "namespaces", rename_all = "lowercase")]
pub enum NamespaceScope {
    Unrestricted,
    Only(BTreeSet<String>),
}

impl NamespaceScope {
    pub fn allows(&self, namespace: &str) -> bool {
        match self {
            Self::Unrestricted => true,
            Self::Only(names) => names.contains(namespace),
        }
    }

    pub fn is_unrestricted(&self) -> bool {
        matches!(self, Self::Unrestricted)
    }
}

/// Result of a successful permission resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionDecision {
    pub level: AccessLevel,
    pub namespaces: NamespaceScope,
}

impl PermissionDecision {
    pub fn admin() -> Self {
        Self {
            level: AccessLevel::Admin,
            namespaces: NamespaceScope::Unrestricted,
        }
    }
}

/// Operation requested against a cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Get,
    List,
    Watch,
    Logs,
    Create,
    Update,
    Delete,
    Patch,
    Scale,
    Restart,
}

/// Operations that mutate cluster state
pub const WRITE_OPERATIONS: [Operation; 6] = [
    Operation::Create,
    Operation::Update,
    Operation::Delete,
    Operation::Patch,
    Operation::Scale,
    Operation::Restart,
];

impl Operation {
    pub fn is_write(self) -> bool {
        WRITE_OPERATIONS.contains(&self)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::List => "list",
            Self::Watch => "watch",
            Self::Logs => "logs",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Patch => "patch",
            Self::Scale => "scale",
            Self::Restart => "restart",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s {
            "get" => Ok(Self::Get),
            "list" => Ok(Self::List),
            "watch" => Ok(Self::Watch),
            "logs" => Ok(Self::Logs),
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            "patch" => Ok(Self::Patch),
            "scale" => Ok(Self::Scale),
            "restart" => Ok(Self::Restart),
            other => Err(crate::Error::Validation(format!(
                "unknown operation '{}'",
                other
            ))),
        }
    }
}

/// Namespace metadata as returned by a live cluster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamespaceInfo {
    pub name: String,
    /// Phase (Active, Terminating)
    pub status: String,
    #[serde(default)]
    pub labels: std::collections::BTreeMap<String, String>,
    /// Creation timestamp (RFC 3339), when the server reports one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_set() {
        for op in WRITE_OPERATIONS {
            assert!(op.is_write(), "{} should be a write", op);
        }
        for op in [Operation::Get, Operation::List, Operation::Watch, Operation::Logs] {
            assert!(!op.is_write(), "{} should be a read", op);
        }
    }

    #[test]
    fn test_operation_parse() {
        assert_eq!("scale".parse::<Operation>().unwrap(), Operation::Scale);
        assert_eq!(Operation::Restart.to_string(), "restart");
        assert!("exec".parse::<Operation>().is_err());
    }

    #[test]
    fn test_namespace_scope() {
        let scope = NamespaceScope::Only(["prod".to_string()].into_iter().collect());
        assert!(scope.allows("prod"));
        assert!(!scope.allows("dev"));
        assert!(NamespaceScope::Unrestricted.allows("anything"));
    }

    #[test]
    fn test_credential_not_serialized() {
        let cluster = Cluster {
            id: "c1".to_string(),
            name: "prod".to_string(),
            description: String::new(),
            api_server: "https://10.0.0.1:6443".to_string(),
            credential: "apiVersion: v1".to_string(),
            version: "v1.28.5".to_string(),
            import_state: ImportState::Success,
            health_state: HealthState::Healthy,
            enabled: true,
            tenant_id: None,
            remark: String::new(),
            created_at: 0,
            updated_at: 0,
        };

        let json = serde_json::to_string(&cluster).unwrap();
        assert!(!json.contains("credential"));
        assert!(cluster.redacted().credential.is_empty());
    }

    #[test]
    fn test_access_level_parse() {
        assert_eq!("admin".parse::<AccessLevel>().unwrap(), AccessLevel::Admin);
        assert_eq!("readonly".parse::<AccessLevel>().unwrap(), AccessLevel::ReadOnly);
        assert!("owner".parse::<AccessLevel>().is_err());
    }
}
