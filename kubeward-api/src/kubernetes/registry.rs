//! Cluster registry
//!
//! Owns the import pipeline (validate, connect, version-gate, persist), the
//! explicit health probe and `get_client`, which serves live clients out of
//! the `ClientCache` and rebuilds them when the stored credential changes
//! or the entry expires.
//!
//! Import outcomes are asymmetric: an unreachable cluster is
//! persisted as `failed`/`unhealthy` so it can be retried, while a cluster
//! reporting an unsupported version is rejected without persisting the new
//! credential.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use kubeward_common::cluster::{Cluster, HealthState, ImportState};
use sqlx::SqlitePool;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::cache::ClientCache;
use super::client::{ClientHandle, ClusterConnector};
use super::credential::{credential_hash, validate_credential, ValidatedCredential};
use super::error::{K8sError, K8sResult};
use super::store;
use super::types::{ClusterHealth, ClusterList, ClusterQuery, CreateClusterRequest, UpdateClusterRequest};
use super::version::is_version_supported;
use crate::db::users;
use crate::validation;

/// Cluster registry and client provider
pub struct ClusterRegistry {
    pool: SqlitePool,
    connector: Arc<dyn ClusterConnector>,
    cache: Arc<dyn ClientCache>,
    connect_timeout: Duration,
    /// Per-cluster rebuild locks so concurrent misses build one client
    rebuild_locks: std::sync::Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ClusterRegistry {
    pub fn new(
        pool: SqlitePool,
        connector: Arc<dyn ClusterConnector>,
        cache: Arc<dyn ClientCache>,
        connect_timeout: Duration,
    ) -> Self {
        Self {
            pool,
            connector,
            cache,
            connect_timeout,
            rebuild_locks: std::sync::Mutex::new(HashMap::new()),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Upper bound for any single call against a remote cluster
    pub fn remote_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Import a new cluster
    pub async fn create(&self, request: CreateClusterRequest) -> K8sResult<Cluster> {
        validation::validate_cluster_name(&request.name)?;
        validation::validate_description(&request.description)?;
        validation::validate_credential_size(&request.kubeconfig)?;

        let validated = validate_credential(&request.kubeconfig).await?;

        if store::cluster_name_exists(&self.pool, &request.name, None).await? {
            return Err(K8sError::Conflict(format!(
                "Cluster with name '{}' already exists",
                request.name
            )));
        }

        let now = chrono::Utc::now().timestamp();
        let mut cluster = Cluster {
            id: uuid::Uuid::new_v4().to_string(),
            name: request.name,
            description: request.description,
            api_server: validated.api_server.clone(),
            credential: request.kubeconfig,
            version: String::new(),
            import_state: ImportState::Importing,
            health_state: HealthState::Unknown,
            enabled: true,
            tenant_id: request.tenant_id,
            remark: request.remark,
            created_at: now,
            updated_at: now,
        };

        info!("Importing cluster '{}' ({})", cluster.name, cluster.api_server);

        let (client, version) = match self.probe(&cluster.credential).await {
            Ok(probed) => probed,
            Err(K8sError::ClusterUnreachable(reason)) => {
                cluster.import_state = ImportState::Failed;
                cluster.health_state = HealthState::Unhealthy;
                store::insert_cluster(&self.pool, &cluster).await?;
                warn!(
                    "Cluster '{}' ({}) unreachable, stored as failed: {}",
                    cluster.name, cluster.id, reason
                );
                return Err(K8sError::ClusterUnreachable(reason));
            }
            Err(e) => return Err(e),
        };

        if !is_version_supported(&version) {
            warn!("Rejecting cluster '{}': unsupported version {}", cluster.name, version);
            return Err(K8sError::VersionUnsupported(version));
        }

        cluster.version = version;
        cluster.health_state = HealthState::Healthy;
        cluster.import_state = ImportState::Success;
        store::insert_cluster(&self.pool, &cluster).await?;
        self.cache
            .put(&cluster.id, credential_hash(&cluster.credential), client);

        info!(
            "Imported cluster '{}' ({}) running {}",
            cluster.name, cluster.id, cluster.version
        );

        Ok(cluster.redacted())
    }

    /// Update descriptive fields; a changed kubeconfig re-runs the import
    pub async fn update(&self, id: &str, request: UpdateClusterRequest) -> K8sResult<Cluster> {
        let mut cluster = store::get_cluster(&self.pool, id).await?;

        if let Some(name) = request.name {
            validation::validate_cluster_name(&name)?;
            if name != cluster.name && store::cluster_name_exists(&self.pool, &name, Some(id)).await? {
                return Err(K8sError::Conflict(format!(
                    "Cluster with name '{}' already exists",
                    name
                )));
            }
            cluster.name = name;
        }
        if let Some(description) = request.description {
            validation::validate_description(&description)?;
            cluster.description = description;
        }
        if let Some(remark) = request.remark {
            cluster.remark = remark;
        }
        if let Some(enabled) = request.enabled {
            cluster.enabled = enabled;
        }

        if let Some(kubeconfig) = request.kubeconfig {
            if kubeconfig != cluster.credential {
                return self.import_existing(cluster, kubeconfig).await;
            }
        }

        cluster.updated_at = chrono::Utc::now().timestamp();
        store::update_cluster(&self.pool, &cluster).await?;
        if !cluster.enabled {
            self.cache.invalidate(&cluster.id);
        }

        info!("Updated cluster '{}' ({})", cluster.name, cluster.id);
        Ok(cluster.redacted())
    }

    /// Replace the credential of an existing cluster and re-run the import
    pub async fn reimport(&self, id: &str, kubeconfig: String) -> K8sResult<Cluster> {
        let cluster = store::get_cluster(&self.pool, id).await?;
        self.import_existing(cluster, kubeconfig).await
    }

    async fn import_existing(&self, mut cluster: Cluster, credential: String) -> K8sResult<Cluster> {
        validation::validate_credential_size(&credential)?;
        let ValidatedCredential { api_server, .. } = validate_credential(&credential).await?;

        let previous_state = cluster.import_state;
        store::set_import_state(&self.pool, &cluster.id, ImportState::Importing).await?;
        info!("Re-importing cluster '{}' ({})", cluster.name, cluster.id);

        let probed = self.probe(&credential).await;

        let (client, version) = match probed {
            Ok(probed) => probed,
            Err(K8sError::ClusterUnreachable(reason)) => {
                cluster.credential = credential;
                cluster.api_server = api_server;
                cluster.import_state = ImportState::Failed;
                cluster.health_state = HealthState::Unhealthy;
                cluster.updated_at = chrono::Utc::now().timestamp();
                store::update_cluster(&self.pool, &cluster).await?;
                self.cache.invalidate(&cluster.id);
                warn!(
                    "Cluster '{}' ({}) unreachable on re-import: {}",
                    cluster.name, cluster.id, reason
                );
                return Err(K8sError::ClusterUnreachable(reason));
            }
            Err(e) => {
                store::set_import_state(&self.pool, &cluster.id, previous_state).await?;
                return Err(e);
            }
        };

        if !is_version_supported(&version) {
            store::set_import_state(&self.pool, &cluster.id, previous_state).await?;
            warn!(
                "Rejecting re-import of '{}': unsupported version {}",
                cluster.name, version
            );
            return Err(K8sError::VersionUnsupported(version));
        }

        cluster.credential = credential;
        cluster.api_server = api_server;
        cluster.version = version;
        cluster.import_state = ImportState::Success;
        cluster.health_state = HealthState::Healthy;
        cluster.updated_at = chrono::Utc::now().timestamp();
        store::update_cluster(&self.pool, &cluster).await?;

        if cluster.enabled {
            self.cache
                .put(&cluster.id, credential_hash(&cluster.credential), client);
        } else {
            self.cache.invalidate(&cluster.id);
        }

        info!(
            "Re-imported cluster '{}' ({}) running {}",
            cluster.name, cluster.id, cluster.version
        );
        Ok(cluster.redacted())
    }

    /// Remove a cluster, its grants and its namespace mirror
    pub async fn delete(&self, id: &str) -> K8sResult<()> {
        store::delete_cluster(&self.pool, id).await?;
        self.cache.invalidate(id);
        self.rebuild_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(id);

        info!("Deleted cluster {}", id);
        Ok(())
    }

    /// Cluster record without its credential
    pub async fn get_by_id(&self, id: &str) -> K8sResult<Cluster> {
        Ok(store::get_cluster(&self.pool, id).await?.redacted())
    }

    /// Every cluster matching the query, credentials stripped
    pub async fn list(&self, query: &ClusterQuery) -> K8sResult<ClusterList> {
        let (clusters, total) = store::list_clusters(&self.pool, query, None).await?;
        Ok(page(clusters, total, query))
    }

    /// Clusters visible to a user: all of them for a superadmin, otherwise
    /// those granted to one of the user's roles
    pub async fn list_for_user(&self, user_id: &str, query: &ClusterQuery) -> K8sResult<ClusterList> {
        let user = users::get_user(&self.pool, user_id).await?;
        if user.superadmin {
            return self.list(query).await;
        }

        let role_ids: Vec<String> = users::roles_of(&self.pool, user_id)
            .await?
            .into_iter()
            .map(|r| r.id)
            .collect();

        let (clusters, total) = store::list_clusters(&self.pool, query, Some(&role_ids)).await?;
        Ok(page(clusters, total, query))
    }

    /// Probe the cluster's version endpoint and record the outcome
    pub async fn health_check(&self, id: &str) -> K8sResult<ClusterHealth> {
        let client = match self.get_client(id).await {
            Ok(client) => client,
            Err(e @ (K8sError::ClusterNotFound(_) | K8sError::ClusterDisabled(_))) => {
                return Err(e)
            }
            Err(e) => {
                store::set_health(&self.pool, id, HealthState::Unhealthy, None).await?;
                return Err(e);
            }
        };

        match self.fetch_version(&client).await {
            Ok(version) => {
                store::set_health(&self.pool, id, HealthState::Healthy, Some(&version)).await?;
                debug!("Cluster {} healthy ({})", id, version);
                Ok(ClusterHealth {
                    cluster_id: id.to_string(),
                    healthy: true,
                    version,
                    checked_at: chrono::Utc::now().timestamp(),
                })
            }
            Err(e) => {
                warn!("Health check failed for cluster {}: {}", id, e);
                store::set_health(&self.pool, id, HealthState::Unhealthy, None).await?;
                self.cache.invalidate(id);
                Err(e)
            }
        }
    }

    /// Live client for a cluster, rebuilt whenever the cached one is stale
    pub async fn get_client(&self, id: &str) -> K8sResult<ClientHandle> {
        let cluster = store::get_cluster(&self.pool, id).await?;
        if !cluster.enabled {
            return Err(K8sError::ClusterDisabled(id.to_string()));
        }

        let hash = credential_hash(&cluster.credential);
        if let Some(client) = self.cache.get(id, &hash) {
            return Ok(client);
        }

        let lock = self.rebuild_lock(id);
        let _guard = lock.lock().await;

        // A concurrent caller may have rebuilt it while we waited
        if let Some(client) = self.cache.get(id, &hash) {
            return Ok(client);
        }

        debug!("Building client for cluster {}", id);
        let client = self.connect(&cluster.credential).await?;
        self.cache.put(id, hash, client.clone());
        Ok(client)
    }

    fn rebuild_lock(&self, id: &str) -> Arc<Mutex<()>> {
        self.rebuild_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .entry(id.to_string())
            .or_default()
            .clone()
    }

    /// Connect and read the server version
    async fn probe(&self, credential: &str) -> K8sResult<(ClientHandle, String)> {
        let client = self.connect(credential).await?;
        let version = self.fetch_version(&client).await?;
        Ok((client, version))
    }

    async fn connect(&self, credential: &str) -> K8sResult<ClientHandle> {
        match tokio::time::timeout(self.connect_timeout, self.connector.connect(credential)).await {
            Ok(Ok(client)) => Ok(client),
            Ok(Err(e @ (K8sError::CredentialInvalid(_) | K8sError::ClusterUnreachable(_)))) => {
                Err(e)
            }
            Ok(Err(e)) => Err(K8sError::ClusterUnreachable(e.to_string())),
            Err(_) => Err(K8sError::ClusterUnreachable(format!(
                "connect timed out after {}s",
                self.connect_timeout.as_secs_f64()
            ))),
        }
    }

    async fn fetch_version(&self, client: &ClientHandle) -> K8sResult<String> {
        match tokio::time::timeout(self.connect_timeout, client.server_version()).await {
            Ok(Ok(version)) => Ok(version),
            Ok(Err(e @ K8sError::ClusterUnreachable(_))) => Err(e),
            Ok(Err(e)) => Err(K8sError::ClusterUnreachable(e.to_string())),
            Err(_) => Err(K8sError::ClusterUnreachable(format!(
                "version probe timed out after {}s",
                self.connect_timeout.as_secs_f64()
            ))),
        }
    }
}

fn page(clusters: Vec<Cluster>, total: i64, query: &ClusterQuery) -> ClusterList {
    ClusterList {
        items: clusters.iter().map(Cluster::redacted).collect(),
        total,
        page: query.page.max(1),
        page_size: query.limit() as u32,
    }
}
