//! Kubeward API Library
//!
//! Cluster credential registry and access control for multi-cluster
//! Kubernetes management, exposed for the server binary and for tests.

// Core modules
pub mod config;
pub mod error;
pub mod validation;

// Application state
pub mod state;
pub use state::AppState;

// Authentication
pub mod middleware;

// Kubernetes clusters, clients and access control
pub mod kubernetes;

// Database
pub mod db;

// HTTP routes
pub mod routes;

// Logging configuration
pub mod logging;

// Graceful shutdown handling
pub mod shutdown;
