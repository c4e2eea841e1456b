//! Application State
//!
//! Shared state for the Kubeward API server

use std::sync::Arc;

use crate::config::KubewardConfig;
use crate::db::Database;
use crate::kubernetes::KubernetesManager;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<KubewardConfig>,
    pub database: Database,
    pub kubernetes: Arc<KubernetesManager>,
}

impl AppState {
    pub fn new(config: KubewardConfig, database: Database, kubernetes: KubernetesManager) -> Self {
        Self {
            config: Arc::new(config),
            database,
            kubernetes: Arc::new(kubernetes),
        }
    }
}
