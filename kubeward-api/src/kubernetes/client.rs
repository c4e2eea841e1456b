//! Cluster connection capability
//!
//! The registry only sees the `ClusterConnector` / `ClusterClient` seam.
//! `KubeConnector` is the kube-rs backed implementation used in production.

use async_trait::async_trait;
use std::sync::Arc;

#[cfg(feature = "kubernetes")]
use kube::{Client, Config};

use super::error::{K8sError, K8sResult};
use kubeward_common::cluster::NamespaceInfo;

/// A connected cluster client
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Server git version, e.g. `v1.28.5+k3s1`
    async fn server_version(&self) -> K8sResult<String>;

    async fn list_namespaces(&self) -> K8sResult<Vec<NamespaceInfo>>;
}

/// Shared handle to a live client
pub type ClientHandle = Arc<dyn ClusterClient>;

/// Builds a live client from a credential blob
#[async_trait]
pub trait ClusterConnector: Send + Sync {
    async fn connect(&self, credential: &str) -> K8sResult<ClientHandle>;
}

/// Connector backed by kube-rs
#[derive(Debug, Default, Clone)]
pub struct KubeConnector;

impl KubeConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ClusterConnector for KubeConnector {
    #[cfg(feature = "kubernetes")]
    async fn connect(&self, credential: &str) -> K8sResult<ClientHandle> {
        let client = K8sClient::from_kubeconfig(credential).await?;
        Ok(Arc::new(client))
    }

    #[cfg(not(feature = "kubernetes"))]
    async fn connect(&self, _credential: &str) -> K8sResult<ClientHandle> {
        Err(K8sError::Internal(
            "Kubernetes feature not enabled".to_string(),
        ))
    }
}

/// Wrapper around kube-rs Client
#[cfg(feature = "kubernetes")]
#[derive(Clone)]
pub struct K8sClient {
    inner: Client,
    api_server: String,
}

#[cfg(feature = "kubernetes")]
impl K8sClient {
    /// Create client from kubeconfig YAML using its current context
    pub async fn from_kubeconfig(kubeconfig_yaml: &str) -> K8sResult<Self> {
        use kube::config::{KubeConfigOptions, Kubeconfig};

        let kubeconfig = Kubeconfig::from_yaml(kubeconfig_yaml).map_err(|e| {
            K8sError::CredentialInvalid(format!("Failed to parse kubeconfig: {}", e))
        })?;

        let config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
            .await
            .map_err(|e| {
                K8sError::CredentialInvalid(format!("Failed to create config: {}", e))
            })?;

        let api_server = config.cluster_url.to_string();

        let client = Client::try_from(config).map_err(|e| {
            K8sError::CredentialInvalid(format!("Failed to create client: {}", e))
        })?;

        Ok(Self {
            inner: client,
            api_server,
        })
    }

    /// Get the inner kube-rs Client
    pub fn inner(&self) -> &Client {
        &self.inner
    }

    pub fn api_server(&self) -> &str {
        &self.api_server
    }
}

#[cfg(feature = "kubernetes")]
#[async_trait]
impl ClusterClient for K8sClient {
    async fn server_version(&self) -> K8sResult<String> {
        let info = self
            .inner
            .apiserver_version()
            .await
            .map_err(|e| K8sError::ClusterUnreachable(e.to_string()))?;

        Ok(info.git_version)
    }

    async fn list_namespaces(&self) -> K8sResult<Vec<NamespaceInfo>> {
        use k8s_openapi::api::core::v1::Namespace;
        use kube::api::{Api, ListParams};

        let namespaces: Api<Namespace> = Api::all(self.inner.clone());
        let list = namespaces.list(&ListParams::default()).await?;

        Ok(list.items.into_iter().map(namespace_to_info).collect())
    }
}

#[cfg(feature = "kubernetes")]
fn namespace_to_info(ns: k8s_openapi::api::core::v1::Namespace) -> NamespaceInfo {
    let metadata = ns.metadata;
    let status = ns.status.and_then(|s| s.phase).unwrap_or_default();

    NamespaceInfo {
        name: metadata.name.unwrap_or_default(),
        status,
        labels: metadata.labels.unwrap_or_default(),
        created_at: metadata.creation_timestamp.map(|t| t.0.to_rfc3339()),
    }
}

#[cfg(feature = "kubernetes")]
impl std::fmt::Debug for K8sClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("K8sClient")
            .field("api_server", &self.api_server)
            .finish()
    }
}
