//! Kubeconfig credential validation and fingerprinting
//!
//! A credential is accepted when kube-rs can parse it and build a connection
//! config from its current context, and that context resolves to an absolute
//! http(s) server URL. Nothing here touches the network.

use sha2::{Digest, Sha256};

use super::error::{K8sError, K8sResult};

/// Outcome of a successful validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedCredential {
    /// Context the credential resolves through
    pub context: String,
    /// Cluster entry name inside the kubeconfig
    pub cluster_name: String,
    /// API server endpoint
    pub api_server: String,
}

/// Validate a kubeconfig blob and resolve its API server endpoint
#[cfg(feature = "kubernetes")]
pub async fn validate_credential(credential: &str) -> K8sResult<ValidatedCredential> {
    use kube::config::{KubeConfigOptions, Kubeconfig};
    use kube::Config;

    if credential.trim().is_empty() {
        return Err(K8sError::CredentialInvalid("credential is empty".into()));
    }

    let kubeconfig = Kubeconfig::from_yaml(credential)
        .map_err(|e| K8sError::CredentialInvalid(format!("Failed to parse kubeconfig: {}", e)))?;

    let validated = resolve_server(&kubeconfig)?;

    // Certificates, keys and auth entries are loaded here
    Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
        .await
        .map_err(|e| K8sError::CredentialInvalid(format!("Failed to create config: {}", e)))?;

    Ok(validated)
}

#[cfg(not(feature = "kubernetes"))]
pub async fn validate_credential(_credential: &str) -> K8sResult<ValidatedCredential> {
    Err(K8sError::Internal(
        "Kubernetes feature not enabled".to_string(),
    ))
}

/// Follow current-context to its cluster entry and check the server URL
#[cfg(feature = "kubernetes")]
fn resolve_server(kubeconfig: &kube::config::Kubeconfig) -> K8sResult<ValidatedCredential> {
    let context_name = kubeconfig
        .current_context
        .as_deref()
        .filter(|name| !name.is_empty())
        .ok_or_else(|| K8sError::CredentialInvalid("No current-context set".into()))?;

    let context = kubeconfig
        .contexts
        .iter()
        .find(|c| c.name == context_name)
        .ok_or_else(|| {
            K8sError::CredentialInvalid(format!("Context '{}' not found", context_name))
        })?;

    let cluster_name = context
        .context
        .as_ref()
        .map(|c| c.cluster.as_str())
        .filter(|name| !name.is_empty())
        .ok_or_else(|| K8sError::CredentialInvalid("Context has no cluster reference".into()))?;

    let server = kubeconfig
        .clusters
        .iter()
        .find(|c| c.name == cluster_name)
        .ok_or_else(|| {
            K8sError::CredentialInvalid(format!("Cluster '{}' not found", cluster_name))
        })?
        .cluster
        .as_ref()
        .and_then(|c| c.server.as_deref())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| K8sError::CredentialInvalid("Cluster has no server URL".into()))?;

    let url = url::Url::parse(server).map_err(|e| {
        K8sError::CredentialInvalid(format!("Invalid server URL '{}': {}", server, e))
    })?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(K8sError::CredentialInvalid(format!(
            "Server URL '{}' must be an absolute http(s) URL",
            server
        )));
    }

    Ok(ValidatedCredential {
        context: context_name.to_string(),
        cluster_name: cluster_name.to_string(),
        api_server: server.to_string(),
    })
}

/// SHA-256 hex digest of a credential blob
pub fn credential_hash(credential: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(credential.as_bytes());
    hex::encode(hasher.finalize())
}
