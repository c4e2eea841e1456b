//! Common types shared between the kubeward crates

pub mod auth;
pub mod cluster;

/// Shared error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Role not found: {0}")]
    RoleNotFound(String),

    #[error("System error: {0}")]
    System(String),
}

pub type Result<T> = std::result::Result<T, Error>;
