//! Cluster subsystem error types and ApiError mapping

use crate::error::ApiError;
use thiserror::Error;

/// Errors raised by the registry, client cache and permission resolver
#[derive(Debug, Error)]
pub enum K8sError {
    /// Credential blob failed to parse or lacks a usable endpoint
    #[error("Invalid credential: {0}")]
    CredentialInvalid(String),

    /// Connect or version probe failed or timed out
    #[error("Cluster unreachable: {0}")]
    ClusterUnreachable(String),

    /// Server reported a version below the supported floor
    #[error("Unsupported Kubernetes version: {0}")]
    VersionUnsupported(String),

    #[error("Cluster not found: {0}")]
    ClusterNotFound(String),

    #[error("Cluster is disabled: {0}")]
    ClusterDisabled(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("User has no role assigned")]
    NoRoleAssigned,

    #[error("Access denied to cluster {0}")]
    AccessDenied(String),

    #[error("Read-only access does not permit '{0}'")]
    ReadOnlyViolation(String),

    #[error("Access grant not found: {0}")]
    GrantNotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// Error from kube-rs client
    #[cfg(feature = "kubernetes")]
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<K8sError> for ApiError {
    fn from(err: K8sError) -> Self {
        match err {
            K8sError::CredentialInvalid(msg) => {
                ApiError::ValidationError(format!("Invalid credential: {}", msg))
            }
            K8sError::ClusterUnreachable(msg) => {
                ApiError::ServiceUnavailable(format!("Cluster unreachable: {}", msg))
            }
            K8sError::VersionUnsupported(version) => ApiError::ValidationError(format!(
                "Kubernetes version '{}' is not supported, 1.17 or newer is required",
                version
            )),
            K8sError::ClusterNotFound(id) => {
                ApiError::NotFound(format!("Kubernetes cluster '{}' not found", id))
            }
            K8sError::ClusterDisabled(id) => {
                ApiError::Conflict(format!("Kubernetes cluster '{}' is disabled", id))
            }
            K8sError::UserNotFound(id) => ApiError::NotFound(format!("User '{}' not found", id)),
            K8sError::NoRoleAssigned => {
                ApiError::Forbidden("User has no role assigned".to_string())
            }
            K8sError::AccessDenied(id) => {
                ApiError::Forbidden(format!("No access to cluster '{}'", id))
            }
            K8sError::ReadOnlyViolation(op) => ApiError::Forbidden(format!(
                "Read-only access does not permit '{}'",
                op
            )),
            K8sError::GrantNotFound(id) => {
                ApiError::NotFound(format!("Access grant '{}' not found", id))
            }
            K8sError::Conflict(msg) => ApiError::Conflict(msg),
            K8sError::Validation(msg) => ApiError::ValidationError(msg),
            #[cfg(feature = "kubernetes")]
            K8sError::KubeError(e) => {
                let err_str = e.to_string();
                if err_str.contains("403") || err_str.contains("Forbidden") {
                    ApiError::Forbidden(err_str)
                } else if err_str.contains("404") || err_str.contains("NotFound") {
                    ApiError::NotFound(err_str)
                } else {
                    ApiError::ServiceUnavailable(format!("Kubernetes error: {}", e))
                }
            }
            K8sError::Internal(msg) => ApiError::Internal(msg),
        }
    }
}

impl From<kubeward_common::Error> for K8sError {
    fn from(err: kubeward_common::Error) -> Self {
        match err {
            kubeward_common::Error::Validation(msg) => K8sError::Validation(msg),
            kubeward_common::Error::UserNotFound(id) => K8sError::UserNotFound(id),
            kubeward_common::Error::RoleNotFound(id) => {
                K8sError::Validation(format!("Role '{}' does not exist", id))
            }
            other => K8sError::Internal(other.to_string()),
        }
    }
}

/// Result type alias for cluster operations
pub type K8sResult<T> = std::result::Result<T, K8sError>;
