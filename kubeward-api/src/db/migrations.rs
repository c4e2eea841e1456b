///! Database migrations

use kubeward_common::Result;
use sqlx::SqlitePool;

pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    // Create migrations table
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS migrations (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            executed_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        )"
    )
    .execute(pool)
    .await
    .map_err(|e| kubeward_common::Error::System(format!("Failed to create migrations table: {}", e)))?;

    // Run migrations in order
    run_migration(pool, "001_create_users_tables", MIGRATION_001_CREATE_USERS).await?;
    run_migration(pool, "002_create_k8s_clusters_table", MIGRATION_002_CREATE_K8S_CLUSTERS).await?;
    run_migration(pool, "003_create_k8s_cluster_accesses_table", MIGRATION_003_CREATE_K8S_ACCESSES).await?;
    run_migration(pool, "004_create_k8s_namespaces_table", MIGRATION_004_CREATE_K8S_NAMESPACES).await?;
    run_migration(pool, "005_create_k8s_operation_logs_table", MIGRATION_005_CREATE_K8S_OPERATION_LOGS).await?;

    Ok(())
}

async fn run_migration(pool: &SqlitePool, name: &str, sql: &str) -> Result<()> {
    use sqlx::Row;

    // Check if migration already ran
    let row = sqlx::query("SELECT COUNT(*) as count FROM migrations WHERE name = ?")
        .bind(name)
        .fetch_one(pool)
        .await
        .map_err(|e| kubeward_common::Error::System(format!("Migration check failed: {}", e)))?;

    let count: i64 = row.get("count");
    if count > 0 {
        tracing::debug!("Migration {} already applied", name);
        return Ok(());
    }

    tracing::info!("Running migration: {}", name);

    // Migrations hold several statements each
    sqlx::raw_sql(sql)
        .execute(pool)
        .await
        .map_err(|e| kubeward_common::Error::System(format!("Migration {} failed: {}", name, e)))?;

    sqlx::query("INSERT INTO migrations (name) VALUES (?)")
        .bind(name)
        .execute(pool)
        .await
        .map_err(|e| kubeward_common::Error::System(format!("Failed to record migration: {}", e)))?;

    tracing::info!("Migration {} completed", name);

    Ok(())
}

const MIGRATION_001_CREATE_USERS: &str = "
CREATE TABLE users (
    id TEXT PRIMARY KEY,
    username TEXT NOT NULL UNIQUE,
    superadmin BOOLEAN NOT NULL DEFAULT 0,
    enabled BOOLEAN NOT NULL DEFAULT 1,
    created_at INTEGER NOT NULL
);

CREATE TABLE roles (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    description TEXT NOT NULL DEFAULT ''
);

CREATE TABLE user_roles (
    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    role_id TEXT NOT NULL REFERENCES roles(id) ON DELETE CASCADE,
    PRIMARY KEY (user_id, role_id)
);
";

const MIGRATION_002_CREATE_K8S_CLUSTERS: &str = "
CREATE TABLE k8s_clusters (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    description TEXT NOT NULL DEFAULT '',
    api_server TEXT NOT NULL,
    credential TEXT NOT NULL,
    version TEXT NOT NULL DEFAULT '',
    import_state TEXT NOT NULL DEFAULT 'importing',
    health_state TEXT NOT NULL DEFAULT 'unknown',
    enabled BOOLEAN NOT NULL DEFAULT 1,
    tenant_id TEXT,
    remark TEXT NOT NULL DEFAULT '',
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE INDEX idx_k8s_clusters_tenant ON k8s_clusters(tenant_id);
";

const MIGRATION_003_CREATE_K8S_ACCESSES: &str = "
CREATE TABLE k8s_cluster_accesses (
    id TEXT PRIMARY KEY,
    cluster_id TEXT NOT NULL REFERENCES k8s_clusters(id) ON DELETE CASCADE,
    role_id TEXT NOT NULL,
    level TEXT NOT NULL,
    namespaces TEXT NOT NULL DEFAULT '[]',
    created_at INTEGER NOT NULL
);

CREATE INDEX idx_k8s_cluster_accesses_cluster ON k8s_cluster_accesses(cluster_id);
CREATE INDEX idx_k8s_cluster_accesses_role ON k8s_cluster_accesses(role_id);
";

const MIGRATION_004_CREATE_K8S_NAMESPACES: &str = "
CREATE TABLE k8s_namespaces (
    cluster_id TEXT NOT NULL REFERENCES k8s_clusters(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT '',
    labels TEXT NOT NULL DEFAULT '{}',
    synced_at INTEGER NOT NULL,
    PRIMARY KEY (cluster_id, name)
);
";

const MIGRATION_005_CREATE_K8S_OPERATION_LOGS: &str = "
CREATE TABLE k8s_operation_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    cluster_id TEXT NOT NULL,
    user_id TEXT NOT NULL,
    operation TEXT NOT NULL,
    resource TEXT NOT NULL,
    namespace TEXT NOT NULL DEFAULT '',
    name TEXT NOT NULL DEFAULT '',
    result TEXT NOT NULL,
    message TEXT NOT NULL DEFAULT '',
    created_at INTEGER NOT NULL
);

CREATE INDEX idx_k8s_operation_logs_cluster ON k8s_operation_logs(cluster_id, created_at);
";
