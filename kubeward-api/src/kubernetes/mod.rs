//! Kubernetes cluster credentials and access control
//!
//! - Credential validation and version gating at import time
//! - Cluster registry with import state and explicit health probes
//! - Live client cache invalidated by TTL and credential fingerprint
//! - Per-request permission resolution with namespace scoping
//! - Bounded background namespace mirroring

pub mod cache;
pub mod client;
pub mod credential;
pub mod error;
pub mod namespaces;
pub mod oplog;
pub mod permission;
pub mod registry;
pub mod store;
pub mod sync;
pub mod types;
pub mod version;

use std::sync::Arc;
use std::time::Duration;

use kubeward_common::cluster::{Operation, PermissionDecision};
use sqlx::SqlitePool;

use crate::config::KubernetesConfig;
use cache::{ClientCache, TtlClientCache};
use client::ClusterConnector;
use error::K8sResult;
use namespaces::NamespaceService;
use permission::PermissionResolver;
use registry::ClusterRegistry;
use sync::SyncPool;

/// Main Kubernetes manager
///
/// Wires the registry, resolver and namespace service around one pool,
/// one connector and one client cache.
pub struct KubernetesManager {
    pub registry: Arc<ClusterRegistry>,
    pub permissions: PermissionResolver,
    pub namespaces: NamespaceService,
    sync: Arc<SyncPool>,
}

impl KubernetesManager {
    /// Build with a TTL cache sized from configuration.
    /// Must be called from within a Tokio runtime.
    pub fn new(
        pool: SqlitePool,
        connector: Arc<dyn ClusterConnector>,
        config: &KubernetesConfig,
    ) -> Self {
        let cache = Arc::new(TtlClientCache::new(Duration::from_secs(
            config.client_cache_ttl_secs,
        )));
        Self::with_cache(pool, connector, cache, config)
    }

    /// Build with a caller-supplied cache
    pub fn with_cache(
        pool: SqlitePool,
        connector: Arc<dyn ClusterConnector>,
        cache: Arc<dyn ClientCache>,
        config: &KubernetesConfig,
    ) -> Self {
        let registry = Arc::new(ClusterRegistry::new(
            pool.clone(),
            connector,
            cache,
            Duration::from_secs(config.connect_timeout_secs),
        ));
        let sync = Arc::new(SyncPool::new(
            config.sync_workers,
            config.sync_queue_capacity,
        ));

        tracing::info!(
            "Kubernetes manager ready (client ttl {}s, connect timeout {}s, {} sync workers)",
            config.client_cache_ttl_secs,
            config.connect_timeout_secs,
            config.sync_workers
        );

        Self {
            namespaces: NamespaceService::new(registry.clone(), sync.clone()),
            permissions: PermissionResolver::new(pool),
            registry,
            sync,
        }
    }

    /// Resolve access for a user on a cluster
    pub async fn authorize(
        &self,
        user_id: &str,
        cluster_id: &str,
        operation: Operation,
    ) -> K8sResult<PermissionDecision> {
        self.permissions.resolve(user_id, cluster_id, operation).await
    }

    /// Drain background sync work
    pub async fn shutdown(&self) {
        self.sync.shutdown().await;
        tracing::info!("Kubernetes manager stopped");
    }
}
