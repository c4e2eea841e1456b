//! Common test utilities and helpers
//!
//! A scripted connector stands in for live clusters; each test gets its own
//! SQLite file under a temporary directory.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use kubeward_api::config::{KubernetesConfig, KubewardConfig};
use kubeward_api::db::{users, Database};
use kubeward_api::kubernetes::cache::TtlClientCache;
use kubeward_api::kubernetes::client::{ClientHandle, ClusterClient, ClusterConnector};
use kubeward_api::kubernetes::error::{K8sError, K8sResult};
use kubeward_api::kubernetes::types::{CreateClusterRequest, CreateGrantRequest};
use kubeward_api::kubernetes::KubernetesManager;
use kubeward_api::middleware::auth::generate_jwt_token;
use kubeward_api::AppState;
use kubeward_common::auth::{Role, User};
use kubeward_common::cluster::{AccessLevel, Cluster, NamespaceInfo};
use tempfile::TempDir;

/// Behaviour shared by a connector and every client it hands out
pub struct FakeCluster {
    pub connects: AtomicUsize,
    pub unreachable: AtomicBool,
    pub version_fails: AtomicBool,
    pub hangs: AtomicBool,
    pub version: Mutex<String>,
    pub namespaces: Mutex<Vec<String>>,
}

impl FakeCluster {
    pub fn new(version: &str) -> Arc<Self> {
        Arc::new(Self {
            connects: AtomicUsize::new(0),
            unreachable: AtomicBool::new(false),
            version_fails: AtomicBool::new(false),
            hangs: AtomicBool::new(false),
            version: Mutex::new(version.to_string()),
            namespaces: Mutex::new(vec![
                "default".to_string(),
                "kube-system".to_string(),
                "prod".to_string(),
            ]),
        })
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    pub fn set_version(&self, version: &str) {
        *self.version.lock().unwrap() = version.to_string();
    }

    pub fn set_version_fails(&self, fails: bool) {
        self.version_fails.store(fails, Ordering::SeqCst);
    }

    /// Make every remote call wait forever
    pub fn set_hangs(&self, hangs: bool) {
        self.hangs.store(hangs, Ordering::SeqCst);
    }

    async fn stall_if_hung(&self) {
        if self.hangs.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
    }
}

pub struct FakeClient {
    cluster: Arc<FakeCluster>,
}

#[async_trait]
impl ClusterClient for FakeClient {
    async fn server_version(&self) -> K8sResult<String> {
        self.cluster.stall_if_hung().await;
        if self.cluster.version_fails.load(Ordering::SeqCst) {
            return Err(K8sError::ClusterUnreachable("connection refused".to_string()));
        }
        Ok(self.cluster.version.lock().unwrap().clone())
    }

    async fn list_namespaces(&self) -> K8sResult<Vec<NamespaceInfo>> {
        self.cluster.stall_if_hung().await;
        Ok(self
            .cluster
            .namespaces
            .lock()
            .unwrap()
            .iter()
            .map(|name| NamespaceInfo {
                name: name.clone(),
                status: "Active".to_string(),
                labels: BTreeMap::new(),
                created_at: None,
            })
            .collect())
    }
}

pub struct FakeConnector {
    pub cluster: Arc<FakeCluster>,
}

#[async_trait]
impl ClusterConnector for FakeConnector {
    async fn connect(&self, _credential: &str) -> K8sResult<ClientHandle> {
        self.cluster.connects.fetch_add(1, Ordering::SeqCst);
        self.cluster.stall_if_hung().await;
        if self.cluster.unreachable.load(Ordering::SeqCst) {
            return Err(K8sError::ClusterUnreachable("dial tcp: i/o timeout".to_string()));
        }
        Ok(Arc::new(FakeClient {
            cluster: self.cluster.clone(),
        }))
    }
}

/// Test environment: database, manager and the scripted cluster behind it
pub struct TestEnv {
    pub database: Database,
    pub manager: KubernetesManager,
    pub cluster: Arc<FakeCluster>,
    _dir: TempDir,
}

impl TestEnv {
    pub async fn new() -> Self {
        Self::with_ttl(Duration::from_secs(600)).await
    }

    pub async fn with_ttl(ttl: Duration) -> Self {
        Self::with_timeouts(ttl, 5).await
    }

    pub async fn with_timeouts(ttl: Duration, connect_timeout_secs: u64) -> Self {
        let dir = TempDir::new().unwrap();
        let url = format!("sqlite://{}", dir.path().join("kubeward.db").display());
        let database = Database::new(&url, 5).await.unwrap();
        database.migrate().await.unwrap();

        let cluster = FakeCluster::new("v1.28.5");
        let config = KubernetesConfig {
            client_cache_ttl_secs: ttl.as_secs().max(1),
            connect_timeout_secs,
            sync_workers: 2,
            sync_queue_capacity: 16,
        };
        let manager = KubernetesManager::with_cache(
            database.pool().clone(),
            Arc::new(FakeConnector {
                cluster: cluster.clone(),
            }),
            Arc::new(TtlClientCache::new(ttl)),
            &config,
        );

        Self {
            database,
            manager,
            cluster,
            _dir: dir,
        }
    }

    /// Import a cluster that the fake reports as reachable
    pub async fn import(&self, name: &str) -> Cluster {
        self.manager
            .registry
            .create(create_request(name, "https://10.0.0.1:6443"))
            .await
            .unwrap()
    }

    pub async fn add_user(&self, id: &str, superadmin: bool) {
        let user = User {
            id: id.to_string(),
            username: id.to_string(),
            superadmin,
            enabled: true,
            created_at: chrono::Utc::now().timestamp(),
        };
        users::create_user(self.database.pool(), &user).await.unwrap();
    }

    pub async fn add_role(&self, role_id: &str, user_id: &str) {
        let role = Role {
            id: role_id.to_string(),
            name: role_id.to_string(),
            description: String::new(),
        };
        users::create_role(self.database.pool(), &role).await.unwrap();
        users::assign_role(self.database.pool(), user_id, role_id)
            .await
            .unwrap();
    }

    pub async fn grant(&self, cluster_id: &str, role_id: &str, level: AccessLevel, namespaces: &[&str]) {
        self.manager
            .permissions
            .create_grant(
                cluster_id,
                CreateGrantRequest {
                    role_id: role_id.to_string(),
                    level,
                    namespaces: namespaces.iter().map(|ns| ns.to_string()).collect(),
                },
            )
            .await
            .unwrap();
    }
}

pub const JWT_SECRET: &str = "kubeward-test-secret-0123456789abcdef";

/// Application state over a fresh environment, for router tests
pub struct TestApp {
    pub state: Arc<AppState>,
    pub cluster: Arc<FakeCluster>,
    _dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        let env = TestEnv::new().await;
        let mut config = KubewardConfig::default();
        config.auth.jwt_secret = JWT_SECRET.to_string();

        Self {
            state: Arc::new(AppState::new(config, env.database, env.manager)),
            cluster: env.cluster,
            _dir: env._dir,
        }
    }

    pub fn token(&self, user_id: &str) -> String {
        generate_jwt_token(user_id, user_id, JWT_SECRET, 3600).unwrap()
    }

    pub async fn add_user(&self, id: &str, superadmin: bool) {
        let user = User {
            id: id.to_string(),
            username: id.to_string(),
            superadmin,
            enabled: true,
            created_at: chrono::Utc::now().timestamp(),
        };
        users::create_user(self.state.database.pool(), &user).await.unwrap();
    }
}

pub fn kubeconfig(server: &str) -> String {
    format!(
        r#"apiVersion: v1
kind: Config
current-context: test
clusters:
- name: test-cluster
  cluster:
    server: {}
contexts:
- name: test
  context:
    cluster: test-cluster
    user: tester
users:
- name: tester
  user:
    token: t0ken
"#,
        server
    )
}

pub fn create_request(name: &str, server: &str) -> CreateClusterRequest {
    CreateClusterRequest {
        name: name.to_string(),
        description: String::new(),
        kubeconfig: kubeconfig(server),
        tenant_id: None,
        remark: String::new(),
    }
}
