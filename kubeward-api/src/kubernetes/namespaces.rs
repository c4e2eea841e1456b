//! Namespace listing with a background local mirror

use std::sync::Arc;

use kubeward_common::cluster::{NamespaceInfo, PermissionDecision};

use super::error::{K8sError, K8sResult};
use super::registry::ClusterRegistry;
use super::store;
use super::sync::{SyncPool, SyncTicket};

pub struct NamespaceService {
    registry: Arc<ClusterRegistry>,
    sync: Arc<SyncPool>,
}

impl NamespaceService {
    pub fn new(registry: Arc<ClusterRegistry>, sync: Arc<SyncPool>) -> Self {
        Self { registry, sync }
    }

    /// List live namespaces visible under `decision` and queue a mirror refresh.
    ///
    /// The mirror always receives the full list. The returned ticket is `None`
    /// when the sync queue is full.
    pub async fn list(
        &self,
        cluster_id: &str,
        decision: &PermissionDecision,
    ) -> K8sResult<(Vec<NamespaceInfo>, Option<SyncTicket>)> {
        let client = self.registry.get_client(cluster_id).await?;
        let timeout = self.registry.remote_timeout();
        let namespaces = tokio::time::timeout(timeout, client.list_namespaces())
            .await
            .map_err(|_| {
                K8sError::ClusterUnreachable(format!(
                    "namespace listing timed out after {}s",
                    timeout.as_secs_f64()
                ))
            })??;

        let pool = self.registry.pool().clone();
        let id = cluster_id.to_string();
        let snapshot = namespaces.clone();
        let ticket = self.sync.submit(format!("namespace-sync:{}", cluster_id), async move {
            store::upsert_namespaces(&pool, &id, &snapshot).await
        });

        let visible = namespaces
            .into_iter()
            .filter(|ns| decision.namespaces.allows(&ns.name))
            .collect();

        Ok((visible, ticket))
    }

    /// Last mirrored namespaces, filtered the same way as a live listing
    pub async fn mirrored(
        &self,
        cluster_id: &str,
        decision: &PermissionDecision,
    ) -> K8sResult<Vec<NamespaceInfo>> {
        self.registry.get_by_id(cluster_id).await?;
        let namespaces = store::list_mirrored_namespaces(self.registry.pool(), cluster_id).await?;

        Ok(namespaces
            .into_iter()
            .filter(|ns| decision.namespaces.allows(&ns.name))
            .collect())
    }
}
