///! Identity types consumed by the access-control layer

use serde::{Deserialize, Serialize};

/// User account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    /// Bypasses grant resolution entirely
    #[serde(default)]
    pub superadmin: bool,
    pub enabled: bool,
    pub created_at: i64,
}

/// Role definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
}
