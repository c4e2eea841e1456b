//! Per-request access resolution for clusters
//!
//! Resolution order: user, superadmin bypass, roles, grants on the cluster
//! for those roles, merge, then the read-only write gate. Denials are
//! errors. A decision is only returned when the operation is allowed.

use kubeward_common::cluster::{
    AccessLevel, ClusterAccessGrant, NamespaceScope, Operation, PermissionDecision,
};
use sqlx::SqlitePool;
use std::collections::BTreeSet;
use tracing::{debug, info};

use super::error::{K8sError, K8sResult};
use super::store;
use super::types::CreateGrantRequest;
use crate::db::users;
use crate::validation;

/// Resolves whether a user may perform an operation against a cluster
#[derive(Clone)]
pub struct PermissionResolver {
    pool: SqlitePool,
}

impl PermissionResolver {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn resolve(
        &self,
        user_id: &str,
        cluster_id: &str,
        operation: Operation,
    ) -> K8sResult<PermissionDecision> {
        let user = users::get_user(&self.pool, user_id).await?;
        if user.superadmin {
            return Ok(PermissionDecision::admin());
        }

        let role_ids: Vec<String> = users::roles_of(&self.pool, user_id)
            .await?
            .into_iter()
            .map(|r| r.id)
            .collect();
        if role_ids.is_empty() {
            return Err(K8sError::NoRoleAssigned);
        }

        let grants = store::grants_for_roles(&self.pool, cluster_id, &role_ids).await?;
        let decision = merge_grants(&grants)
            .ok_or_else(|| K8sError::AccessDenied(cluster_id.to_string()))?;

        if decision.level == AccessLevel::ReadOnly && operation.is_write() {
            debug!(
                "User {} denied '{}' on cluster {}: read-only",
                user_id, operation, cluster_id
            );
            return Err(K8sError::ReadOnlyViolation(operation.to_string()));
        }

        Ok(decision)
    }

    /// Grant a role access to a cluster
    pub async fn create_grant(
        &self,
        cluster_id: &str,
        request: CreateGrantRequest,
    ) -> K8sResult<ClusterAccessGrant> {
        validation::validate_id("Role id", &request.role_id)?;
        validation::validate_namespace_list(&request.namespaces)?;
        // Cluster must exist
        store::get_cluster(&self.pool, cluster_id).await?;

        let grant = ClusterAccessGrant {
            id: uuid::Uuid::new_v4().to_string(),
            cluster_id: cluster_id.to_string(),
            role_id: request.role_id,
            level: request.level,
            namespaces: request.namespaces,
            created_at: chrono::Utc::now().timestamp(),
        };
        store::insert_grant(&self.pool, &grant).await?;

        info!(
            "Granted role {} {} access to cluster {}",
            grant.role_id, grant.level, cluster_id
        );
        Ok(grant)
    }

    pub async fn list_grants(&self, cluster_id: &str) -> K8sResult<Vec<ClusterAccessGrant>> {
        store::get_cluster(&self.pool, cluster_id).await?;
        store::list_grants(&self.pool, cluster_id).await
    }

    pub async fn delete_grant(&self, grant_id: &str) -> K8sResult<()> {
        store::delete_grant(&self.pool, grant_id).await?;
        info!("Deleted access grant {}", grant_id);
        Ok(())
    }
}

/// Merge a user's grants on one cluster.
///
/// Any admin grant wins outright with no namespace restriction. Otherwise the
/// result is read-only over the union of the non-empty namespace lists; if
/// every grant is unrestricted, so is the result. `None` when there are no
/// grants.
///
/// A read-only grant with an empty list does not widen a sibling grant that
/// names namespaces: `{readonly, []}` + `{readonly, [prod]}` is `{prod}`.
pub fn merge_grants(grants: &[ClusterAccessGrant]) -> Option<PermissionDecision> {
    if grants.is_empty() {
        return None;
    }

    if grants.iter().any(|g| g.level == AccessLevel::Admin) {
        return Some(PermissionDecision::admin());
    }

    let names: BTreeSet<String> = grants
        .iter()
        .flat_map(|g| g.namespaces.iter().cloned())
        .collect();

    let namespaces = if names.is_empty() {
        NamespaceScope::Unrestricted
    } else {
        NamespaceScope::Only(names)
    };

    Some(PermissionDecision {
        level: AccessLevel::ReadOnly,
        namespaces,
    })
}
