//! Request and response shapes for the cluster API

use kubeward_common::cluster::{AccessLevel, Cluster};
use serde::{Deserialize, Serialize};

/// Request to import a new cluster
#[derive(Debug, Clone, Deserialize)]
pub struct CreateClusterRequest {
    /// User-friendly name for the cluster
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Kubeconfig content (YAML)
    pub kubeconfig: String,
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub remark: String,
}

/// Partial update of a cluster record. A new kubeconfig re-runs the import.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateClusterRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub kubeconfig: Option<String>,
    pub enabled: Option<bool>,
    pub remark: Option<String>,
}

/// Re-import with a replacement kubeconfig
#[derive(Debug, Clone, Deserialize)]
pub struct ReimportRequest {
    pub kubeconfig: String,
}

/// Cluster listing filters
#[derive(Debug, Clone, Deserialize)]
pub struct ClusterQuery {
    /// Substring match on cluster name
    pub name: Option<String>,
    pub tenant_id: Option<String>,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_page() -> u32 {
    1
}

fn default_page_size() -> u32 {
    20
}

impl Default for ClusterQuery {
    fn default() -> Self {
        Self {
            name: None,
            tenant_id: None,
            page: default_page(),
            page_size: default_page_size(),
        }
    }
}

impl ClusterQuery {
    pub fn limit(&self) -> i64 {
        self.page_size.clamp(1, 500) as i64
    }

    pub fn offset(&self) -> i64 {
        (self.page.max(1) as i64 - 1) * self.limit()
    }
}

/// Page of clusters
#[derive(Debug, Clone, Serialize)]
pub struct ClusterList {
    pub items: Vec<Cluster>,
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
}

/// Request to grant a role access to a cluster
#[derive(Debug, Clone, Deserialize)]
pub struct CreateGrantRequest {
    pub role_id: String,
    pub level: AccessLevel,
    #[serde(default)]
    pub namespaces: Vec<String>,
}

/// Outcome of an explicit health probe
#[derive(Debug, Clone, Serialize)]
pub struct ClusterHealth {
    pub cluster_id: String,
    pub healthy: bool,
    pub version: String,
    pub checked_at: i64,
}

/// Namespace listing options
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NamespaceQuery {
    /// Serve the last mirrored list instead of querying the cluster
    #[serde(default)]
    pub mirrored: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OperationLogQuery {
    #[serde(default = "default_log_limit")]
    pub limit: i64,
}

fn default_log_limit() -> i64 {
    100
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_paging() {
        let query = ClusterQuery::default();
        assert_eq!(query.limit(), 20);
        assert_eq!(query.offset(), 0);

        let query = ClusterQuery {
            page: 3,
            page_size: 10,
            ..Default::default()
        };
        assert_eq!(query.offset(), 20);

        let query = ClusterQuery {
            page: 0,
            page_size: 0,
            ..Default::default()
        };
        assert_eq!(query.limit(), 1);
        assert_eq!(query.offset(), 0);
    }

    #[test]
    fn test_grant_request_defaults() {
        let req: CreateGrantRequest =
            serde_json::from_str(r#"{"role_id": "r1", "level": "readonly"}"#).unwrap();
        assert_eq!(req.level, AccessLevel::ReadOnly);
        assert!(req.namespaces.is_empty());
    }
}
