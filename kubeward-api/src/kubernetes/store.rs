//! Persistence for clusters, access grants and the namespace mirror

use kubeward_common::cluster::{
    AccessLevel, Cluster, ClusterAccessGrant, HealthState, ImportState, NamespaceInfo,
};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use super::error::{K8sError, K8sResult};
use super::types::ClusterQuery;

const CLUSTER_COLUMNS: &str = "id, name, description, api_server, credential, version, \
    import_state, health_state, enabled, tenant_id, remark, created_at, updated_at";

/// Insert a new cluster record
pub async fn insert_cluster(pool: &SqlitePool, cluster: &Cluster) -> K8sResult<()> {
    sqlx::query(
        r#"
        INSERT INTO k8s_clusters (id, name, description, api_server, credential, version,
            import_state, health_state, enabled, tenant_id, remark, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&cluster.id)
    .bind(&cluster.name)
    .bind(&cluster.description)
    .bind(&cluster.api_server)
    .bind(&cluster.credential)
    .bind(&cluster.version)
    .bind(cluster.import_state.to_string())
    .bind(cluster.health_state.to_string())
    .bind(cluster.enabled)
    .bind(&cluster.tenant_id)
    .bind(&cluster.remark)
    .bind(cluster.created_at)
    .bind(cluster.updated_at)
    .execute(pool)
    .await
    .map_err(|e| K8sError::Internal(format!("Failed to create cluster: {}", e)))?;

    Ok(())
}

/// Overwrite every mutable column of a cluster record
pub async fn update_cluster(pool: &SqlitePool, cluster: &Cluster) -> K8sResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE k8s_clusters SET name = ?, description = ?, api_server = ?, credential = ?,
            version = ?, import_state = ?, health_state = ?, enabled = ?, tenant_id = ?,
            remark = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&cluster.name)
    .bind(&cluster.description)
    .bind(&cluster.api_server)
    .bind(&cluster.credential)
    .bind(&cluster.version)
    .bind(cluster.import_state.to_string())
    .bind(cluster.health_state.to_string())
    .bind(cluster.enabled)
    .bind(&cluster.tenant_id)
    .bind(&cluster.remark)
    .bind(cluster.updated_at)
    .bind(&cluster.id)
    .execute(pool)
    .await
    .map_err(|e| K8sError::Internal(format!("Failed to update cluster: {}", e)))?;

    if result.rows_affected() == 0 {
        return Err(K8sError::ClusterNotFound(cluster.id.clone()));
    }

    Ok(())
}

/// Get a cluster by ID, credential included
pub async fn get_cluster(pool: &SqlitePool, id: &str) -> K8sResult<Cluster> {
    let query = format!("SELECT {} FROM k8s_clusters WHERE id = ?", CLUSTER_COLUMNS);
    let row = sqlx::query(&query)
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|e| K8sError::Internal(format!("Database query failed: {}", e)))?
        .ok_or_else(|| K8sError::ClusterNotFound(id.to_string()))?;

    row_to_cluster(&row)
}

/// Set only the import state
pub async fn set_import_state(pool: &SqlitePool, id: &str, state: ImportState) -> K8sResult<()> {
    sqlx::query("UPDATE k8s_clusters SET import_state = ?, updated_at = ? WHERE id = ?")
        .bind(state.to_string())
        .bind(chrono::Utc::now().timestamp())
        .bind(id)
        .execute(pool)
        .await
        .map_err(|e| K8sError::Internal(format!("Failed to update cluster: {}", e)))?;

    Ok(())
}

/// Record the outcome of a health probe
pub async fn set_health(
    pool: &SqlitePool,
    id: &str,
    health: HealthState,
    version: Option<&str>,
) -> K8sResult<()> {
    let mut query = String::from("UPDATE k8s_clusters SET health_state = ?, updated_at = ?");
    if version.is_some() {
        query.push_str(", version = ?");
    }
    query.push_str(" WHERE id = ?");

    let mut q = sqlx::query(&query)
        .bind(health.to_string())
        .bind(chrono::Utc::now().timestamp());
    if let Some(v) = version {
        q = q.bind(v);
    }
    q = q.bind(id);

    q.execute(pool)
        .await
        .map_err(|e| K8sError::Internal(format!("Failed to update cluster: {}", e)))?;

    Ok(())
}

/// Delete a cluster and everything hanging off it
pub async fn delete_cluster(pool: &SqlitePool, id: &str) -> K8sResult<()> {
    let mut tx = pool
        .begin()
        .await
        .map_err(|e| K8sError::Internal(format!("Failed to begin transaction: {}", e)))?;

    for statement in [
        "DELETE FROM k8s_cluster_accesses WHERE cluster_id = ?",
        "DELETE FROM k8s_namespaces WHERE cluster_id = ?",
    ] {
        sqlx::query(statement)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| K8sError::Internal(format!("Failed to delete cluster data: {}", e)))?;
    }

    let result = sqlx::query("DELETE FROM k8s_clusters WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(|e| K8sError::Internal(format!("Failed to delete cluster: {}", e)))?;

    if result.rows_affected() == 0 {
        return Err(K8sError::ClusterNotFound(id.to_string()));
    }

    tx.commit()
        .await
        .map_err(|e| K8sError::Internal(format!("Failed to commit delete: {}", e)))?;

    Ok(())
}

/// Check if a cluster name is taken, optionally ignoring one cluster
pub async fn cluster_name_exists(
    pool: &SqlitePool,
    name: &str,
    exclude_id: Option<&str>,
) -> K8sResult<bool> {
    let count: (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM k8s_clusters WHERE name = ? AND id != ?")
            .bind(name)
            .bind(exclude_id.unwrap_or(""))
            .fetch_one(pool)
            .await
            .map_err(|e| K8sError::Internal(format!("Database query failed: {}", e)))?;

    Ok(count.0 > 0)
}

/// List clusters matching a query. `role_ids` restricts the result to clusters
/// granted to at least one of those roles.
pub async fn list_clusters(
    pool: &SqlitePool,
    query: &ClusterQuery,
    role_ids: Option<&[String]>,
) -> K8sResult<(Vec<Cluster>, i64)> {
    let mut filter = String::from(" WHERE 1 = 1");
    if query.name.is_some() {
        filter.push_str(" AND name LIKE ?");
    }
    if query.tenant_id.is_some() {
        filter.push_str(" AND tenant_id = ?");
    }
    if let Some(roles) = role_ids {
        if roles.is_empty() {
            return Ok((Vec::new(), 0));
        }
        filter.push_str(&format!(
            " AND id IN (SELECT cluster_id FROM k8s_cluster_accesses WHERE role_id IN ({}))",
            placeholders(roles.len())
        ));
    }

    let name_pattern = query.name.as_ref().map(|n| format!("%{}%", n));

    let count_sql = format!("SELECT COUNT(*) FROM k8s_clusters{}", filter);
    let mut count_q = sqlx::query_as::<_, (i64,)>(&count_sql);
    if let Some(pattern) = &name_pattern {
        count_q = count_q.bind(pattern);
    }
    if let Some(tenant) = &query.tenant_id {
        count_q = count_q.bind(tenant);
    }
    for role in role_ids.unwrap_or_default() {
        count_q = count_q.bind(role);
    }
    let (total,) = count_q
        .fetch_one(pool)
        .await
        .map_err(|e| K8sError::Internal(format!("Database query failed: {}", e)))?;

    let list_sql = format!(
        "SELECT {} FROM k8s_clusters{} ORDER BY created_at DESC, name LIMIT ? OFFSET ?",
        CLUSTER_COLUMNS, filter
    );
    let mut list_q = sqlx::query(&list_sql);
    if let Some(pattern) = &name_pattern {
        list_q = list_q.bind(pattern);
    }
    if let Some(tenant) = &query.tenant_id {
        list_q = list_q.bind(tenant);
    }
    for role in role_ids.unwrap_or_default() {
        list_q = list_q.bind(role);
    }
    let rows = list_q
        .bind(query.limit())
        .bind(query.offset())
        .fetch_all(pool)
        .await
        .map_err(|e| K8sError::Internal(format!("Database query failed: {}", e)))?;

    let clusters = rows.iter().map(row_to_cluster).collect::<K8sResult<Vec<_>>>()?;
    Ok((clusters, total))
}

fn row_to_cluster(row: &SqliteRow) -> K8sResult<Cluster> {
    let import_state: String = row.get("import_state");
    let health_state: String = row.get("health_state");

    Ok(Cluster {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        api_server: row.get("api_server"),
        credential: row.get("credential"),
        version: row.get("version"),
        import_state: import_state.parse()?,
        health_state: health_state.parse()?,
        enabled: row.get("enabled"),
        tenant_id: row.get("tenant_id"),
        remark: row.get("remark"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

// Access grants

pub async fn insert_grant(pool: &SqlitePool, grant: &ClusterAccessGrant) -> K8sResult<()> {
    let namespaces = serde_json::to_string(&grant.namespaces)
        .map_err(|e| K8sError::Internal(format!("Failed to encode namespaces: {}", e)))?;

    sqlx::query(
        r#"
        INSERT INTO k8s_cluster_accesses (id, cluster_id, role_id, level, namespaces, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&grant.id)
    .bind(&grant.cluster_id)
    .bind(&grant.role_id)
    .bind(grant.level.to_string())
    .bind(namespaces)
    .bind(grant.created_at)
    .execute(pool)
    .await
    .map_err(|e| K8sError::Internal(format!("Failed to create access grant: {}", e)))?;

    Ok(())
}

/// All grants on a cluster
pub async fn list_grants(pool: &SqlitePool, cluster_id: &str) -> K8sResult<Vec<ClusterAccessGrant>> {
    let rows = sqlx::query(
        "SELECT id, cluster_id, role_id, level, namespaces, created_at
         FROM k8s_cluster_accesses WHERE cluster_id = ? ORDER BY created_at, id",
    )
    .bind(cluster_id)
    .fetch_all(pool)
    .await
    .map_err(|e| K8sError::Internal(format!("Database query failed: {}", e)))?;

    rows.iter().map(row_to_grant).collect()
}

/// Grants on a cluster held by any of the given roles
pub async fn grants_for_roles(
    pool: &SqlitePool,
    cluster_id: &str,
    role_ids: &[String],
) -> K8sResult<Vec<ClusterAccessGrant>> {
    if role_ids.is_empty() {
        return Ok(Vec::new());
    }

    let sql = format!(
        "SELECT id, cluster_id, role_id, level, namespaces, created_at
         FROM k8s_cluster_accesses WHERE cluster_id = ? AND role_id IN ({})
         ORDER BY created_at, id",
        placeholders(role_ids.len())
    );
    let mut q = sqlx::query(&sql).bind(cluster_id);
    for role in role_ids {
        q = q.bind(role);
    }
    let rows = q
        .fetch_all(pool)
        .await
        .map_err(|e| K8sError::Internal(format!("Database query failed: {}", e)))?;

    rows.iter().map(row_to_grant).collect()
}

pub async fn delete_grant(pool: &SqlitePool, id: &str) -> K8sResult<()> {
    let result = sqlx::query("DELETE FROM k8s_cluster_accesses WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .map_err(|e| K8sError::Internal(format!("Failed to delete access grant: {}", e)))?;

    if result.rows_affected() == 0 {
        return Err(K8sError::GrantNotFound(id.to_string()));
    }

    Ok(())
}

fn row_to_grant(row: &SqliteRow) -> K8sResult<ClusterAccessGrant> {
    let level: String = row.get("level");
    let namespaces: String = row.get("namespaces");

    Ok(ClusterAccessGrant {
        id: row.get("id"),
        cluster_id: row.get("cluster_id"),
        role_id: row.get("role_id"),
        level: level.parse::<AccessLevel>()?,
        namespaces: serde_json::from_str(&namespaces)
            .map_err(|e| K8sError::Internal(format!("Corrupt namespace list: {}", e)))?,
        created_at: row.get("created_at"),
    })
}

// Namespace mirror

/// Upsert mirrored namespace rows by (cluster_id, name)
pub async fn upsert_namespaces(
    pool: &SqlitePool,
    cluster_id: &str,
    namespaces: &[NamespaceInfo],
) -> K8sResult<()> {
    let now = chrono::Utc::now().timestamp();
    let mut tx = pool
        .begin()
        .await
        .map_err(|e| K8sError::Internal(format!("Failed to begin transaction: {}", e)))?;

    for ns in namespaces {
        let labels = serde_json::to_string(&ns.labels)
            .map_err(|e| K8sError::Internal(format!("Failed to encode labels: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO k8s_namespaces (cluster_id, name, status, labels, synced_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(cluster_id, name) DO UPDATE SET
                status = excluded.status,
                labels = excluded.labels,
                synced_at = excluded.synced_at
            "#,
        )
        .bind(cluster_id)
        .bind(&ns.name)
        .bind(&ns.status)
        .bind(labels)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| K8sError::Internal(format!("Failed to upsert namespace: {}", e)))?;
    }

    tx.commit()
        .await
        .map_err(|e| K8sError::Internal(format!("Failed to commit namespace sync: {}", e)))?;

    Ok(())
}

/// Mirrored namespaces for a cluster
pub async fn list_mirrored_namespaces(
    pool: &SqlitePool,
    cluster_id: &str,
) -> K8sResult<Vec<NamespaceInfo>> {
    let rows = sqlx::query(
        "SELECT name, status, labels FROM k8s_namespaces WHERE cluster_id = ? ORDER BY name",
    )
    .bind(cluster_id)
    .fetch_all(pool)
    .await
    .map_err(|e| K8sError::Internal(format!("Database query failed: {}", e)))?;

    rows.iter()
        .map(|row| {
            let labels: String = row.get("labels");
            Ok(NamespaceInfo {
                name: row.get("name"),
                status: row.get("status"),
                labels: serde_json::from_str(&labels)
                    .map_err(|e| K8sError::Internal(format!("Corrupt labels: {}", e)))?,
                created_at: None,
            })
        })
        .collect()
}
