///! Database layer using SQLite
///!
///! Holds the cluster registry, access grants, the namespace mirror and the
///! minimal user/role tables the permission resolver reads.

pub mod migrations;

use kubeward_common::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

/// Database connection pool
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Create a new database connection
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        // Create parent directory if needed
        if let Some(path) = database_url.strip_prefix("sqlite://") {
            if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    kubeward_common::Error::System(format!("Failed to create DB directory: {}", e))
                })?;
            }
        }

        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| kubeward_common::Error::InvalidConfig(format!("Invalid database URL: {}", e)))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| kubeward_common::Error::System(format!("Database connection failed: {}", e)))?;

        tracing::info!("Database connection established");

        Ok(Self { pool })
    }

    /// Run database migrations
    pub async fn migrate(&self) -> Result<()> {
        migrations::run_migrations(&self.pool).await?;
        tracing::info!("Database migrations completed");
        Ok(())
    }

    /// Get the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the database connection
    pub async fn close(self) {
        self.pool.close().await;
        tracing::info!("Database connection closed");
    }
}

/// User and role database operations
pub mod users {
    use super::*;
    use kubeward_common::auth::{Role, User};
    use sqlx::Row;

    pub async fn create_user(pool: &SqlitePool, user: &User) -> Result<()> {
        sqlx::query(
            "INSERT INTO users (id, username, superadmin, enabled, created_at)
             VALUES (?, ?, ?, ?, ?)"
        )
        .bind(&user.id)
        .bind(&user.username)
        .bind(user.superadmin)
        .bind(user.enabled)
        .bind(user.created_at)
        .execute(pool)
        .await
        .map_err(|e| kubeward_common::Error::System(format!("Failed to create user: {}", e)))?;

        Ok(())
    }

    /// Look up an enabled user by id
    pub async fn get_user(pool: &SqlitePool, id: &str) -> Result<User> {
        let row = sqlx::query("SELECT * FROM users WHERE id = ? AND enabled = 1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(|e| kubeward_common::Error::System(format!("Failed to load user: {}", e)))?
            .ok_or_else(|| kubeward_common::Error::UserNotFound(id.to_string()))?;

        Ok(row_to_user(&row))
    }

    pub async fn create_role(pool: &SqlitePool, role: &Role) -> Result<()> {
        sqlx::query("INSERT INTO roles (id, name, description) VALUES (?, ?, ?)")
            .bind(&role.id)
            .bind(&role.name)
            .bind(&role.description)
            .execute(pool)
            .await
            .map_err(|e| kubeward_common::Error::System(format!("Failed to create role: {}", e)))?;

        Ok(())
    }

    /// Give a user a role; both must already exist
    pub async fn assign_role(pool: &SqlitePool, user_id: &str, role_id: &str) -> Result<()> {
        let role = sqlx::query("SELECT id FROM roles WHERE id = ?")
            .bind(role_id)
            .fetch_optional(pool)
            .await
            .map_err(|e| kubeward_common::Error::System(format!("Failed to load role: {}", e)))?;
        if role.is_none() {
            return Err(kubeward_common::Error::RoleNotFound(role_id.to_string()));
        }
        get_user(pool, user_id).await?;

        sqlx::query("INSERT OR IGNORE INTO user_roles (user_id, role_id) VALUES (?, ?)")
            .bind(user_id)
            .bind(role_id)
            .execute(pool)
            .await
            .map_err(|e| kubeward_common::Error::System(format!("Failed to assign role: {}", e)))?;

        Ok(())
    }

    /// Roles held by a user
    pub async fn roles_of(pool: &SqlitePool, user_id: &str) -> Result<Vec<Role>> {
        let rows = sqlx::query(
            "SELECT r.id, r.name, r.description FROM roles r
             JOIN user_roles ur ON ur.role_id = r.id
             WHERE ur.user_id = ?
             ORDER BY r.name"
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
        .map_err(|e| kubeward_common::Error::System(format!("Failed to load roles: {}", e)))?;

        Ok(rows
            .iter()
            .map(|row| Role {
                id: row.get("id"),
                name: row.get("name"),
                description: row.get("description"),
            })
            .collect())
    }

    fn row_to_user(row: &sqlx::sqlite::SqliteRow) -> User {
        User {
            id: row.get("id"),
            username: row.get("username"),
            superadmin: row.get("superadmin"),
            enabled: row.get("enabled"),
            created_at: row.get("created_at"),
        }
    }
}
