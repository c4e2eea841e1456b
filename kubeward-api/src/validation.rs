///! Input validation for cluster and access-grant requests

use kubeward_common::Error;
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

/// Maximum allowed lengths for various fields
pub const MAX_CLUSTER_NAME_LENGTH: usize = 100;
pub const MAX_DESCRIPTION_LENGTH: usize = 1000;
pub const MAX_NAMESPACE_LENGTH: usize = 63;
pub const MAX_CREDENTIAL_BYTES: usize = 1024 * 1024;

static CLUSTER_NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9_.-]*$").unwrap()
});

/// RFC 1123 label, the shape Kubernetes requires of namespace names
static NAMESPACE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$").unwrap()
});

/// Validation result type
pub type ValidationResult<T> = Result<T, Error>;

pub fn validate_cluster_name(name: &str) -> ValidationResult<()> {
    if name.is_empty() {
        return Err(Error::Validation("Cluster name cannot be empty".to_string()));
    }

    if name.len() > MAX_CLUSTER_NAME_LENGTH {
        return Err(Error::Validation(format!(
            "Cluster name too long (max {} characters)",
            MAX_CLUSTER_NAME_LENGTH
        )));
    }

    if !CLUSTER_NAME_REGEX.is_match(name) {
        return Err(Error::Validation(
            "Cluster name must start with a letter or digit and contain only letters, digits, '.', '_' and '-'".to_string()
        ));
    }

    Ok(())
}

pub fn validate_description(description: &str) -> ValidationResult<()> {
    if description.len() > MAX_DESCRIPTION_LENGTH {
        return Err(Error::Validation(format!(
            "Description too long (max {} characters)",
            MAX_DESCRIPTION_LENGTH
        )));
    }

    Ok(())
}

/// Size guard applied before any credential parsing
pub fn validate_credential_size(credential: &str) -> ValidationResult<()> {
    if credential.len() > MAX_CREDENTIAL_BYTES {
        return Err(Error::Validation(format!(
            "Kubeconfig too large (max {} bytes)",
            MAX_CREDENTIAL_BYTES
        )));
    }

    Ok(())
}

pub fn validate_namespace(namespace: &str) -> ValidationResult<()> {
    if namespace.is_empty() || namespace.len() > MAX_NAMESPACE_LENGTH {
        return Err(Error::Validation(format!(
            "Namespace '{}' must be 1-{} characters",
            namespace, MAX_NAMESPACE_LENGTH
        )));
    }

    if !NAMESPACE_REGEX.is_match(namespace) {
        return Err(Error::Validation(format!(
            "Namespace '{}' must consist of lowercase alphanumerics and '-', starting and ending with an alphanumeric",
            namespace
        )));
    }

    Ok(())
}

/// Validate a grant's namespace list: each entry well-formed, no repeats
pub fn validate_namespace_list(namespaces: &[String]) -> ValidationResult<()> {
    let mut seen = HashSet::new();
    for ns in namespaces {
        validate_namespace(ns)?;
        if !seen.insert(ns.as_str()) {
            return Err(Error::Validation(format!("Namespace '{}' listed twice", ns)));
        }
    }

    Ok(())
}

pub fn validate_id(kind: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(Error::Validation(format!("{} cannot be empty", kind)));
    }

    Ok(())
}
