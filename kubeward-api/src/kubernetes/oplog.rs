//! Cluster operation log
//!
//! Records who did what to which cluster. Writes are best-effort: a failed
//! insert is logged and never fails the operation being recorded.

use kubeward_common::cluster::Operation;
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use tracing::warn;

use super::error::{K8sError, K8sResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationResult {
    Success,
    Failed,
}

impl std::fmt::Display for OperationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// One recorded operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationLog {
    pub id: i64,
    pub cluster_id: String,
    pub user_id: String,
    pub operation: String,
    /// Resource kind, e.g. `cluster`, `access`, `namespace`
    pub resource: String,
    pub namespace: String,
    pub name: String,
    pub result: String,
    pub message: String,
    pub created_at: i64,
}

/// Entry to record
#[derive(Debug, Clone)]
pub struct OperationEntry<'a> {
    pub cluster_id: &'a str,
    pub user_id: &'a str,
    pub operation: Operation,
    pub resource: &'a str,
    pub name: &'a str,
    pub result: OperationResult,
    pub message: String,
}

impl<'a> OperationEntry<'a> {
    /// Entry for the outcome of a fallible operation
    pub fn from_outcome<T>(
        cluster_id: &'a str,
        user_id: &'a str,
        operation: Operation,
        resource: &'a str,
        name: &'a str,
        outcome: &K8sResult<T>,
    ) -> Self {
        let (result, message) = match outcome {
            Ok(_) => (OperationResult::Success, String::new()),
            Err(e) => (OperationResult::Failed, e.to_string()),
        };
        Self {
            cluster_id,
            user_id,
            operation,
            resource,
            name,
            result,
            message,
        }
    }
}

/// Record an operation, logging rather than returning any failure
pub async fn record(pool: &SqlitePool, entry: OperationEntry<'_>) {
    let inserted = sqlx::query(
        r#"
        INSERT INTO k8s_operation_logs
            (cluster_id, user_id, operation, resource, namespace, name, result, message, created_at)
        VALUES (?, ?, ?, ?, '', ?, ?, ?, ?)
        "#,
    )
    .bind(entry.cluster_id)
    .bind(entry.user_id)
    .bind(entry.operation.as_str())
    .bind(entry.resource)
    .bind(entry.name)
    .bind(entry.result.to_string())
    .bind(&entry.message)
    .bind(chrono::Utc::now().timestamp())
    .execute(pool)
    .await;

    if let Err(e) = inserted {
        warn!(
            "Failed to record {} {} on cluster {}: {}",
            entry.operation, entry.resource, entry.cluster_id, e
        );
    }
}

/// Most recent operations on a cluster, newest first
pub async fn list(pool: &SqlitePool, cluster_id: &str, limit: i64) -> K8sResult<Vec<OperationLog>> {
    let rows = sqlx::query(
        "SELECT * FROM k8s_operation_logs WHERE cluster_id = ? ORDER BY created_at DESC, id DESC LIMIT ?",
    )
    .bind(cluster_id)
    .bind(limit.clamp(1, 1000))
    .fetch_all(pool)
    .await
    .map_err(|e| K8sError::Internal(format!("Database query failed: {}", e)))?;

    Ok(rows
        .iter()
        .map(|row| OperationLog {
            id: row.get("id"),
            cluster_id: row.get("cluster_id"),
            user_id: row.get("user_id"),
            operation: row.get("operation"),
            resource: row.get("resource"),
            namespace: row.get("namespace"),
            name: row.get("name"),
            result: row.get("result"),
            message: row.get("message"),
            created_at: row.get("created_at"),
        })
        .collect())
}
