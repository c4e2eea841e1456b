///! HTTP routes
///!
///! Every `/api/k8s` route sits behind bearer authentication. Cluster-scoped
///! routes resolve the caller's permission first; cluster import and access
///! grant management are reserved for superadmins.

use std::sync::Arc;

use axum::{
    middleware as axum_middleware,
    routing::{delete, get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::middleware;
use crate::AppState;

/// Build the application router
pub fn build_router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route(
            "/api/k8s/clusters",
            get(k8s_handlers::list_clusters).post(k8s_handlers::create_cluster),
        )
        .route(
            "/api/k8s/clusters/:cluster_id",
            get(k8s_handlers::get_cluster)
                .put(k8s_handlers::update_cluster)
                .delete(k8s_handlers::delete_cluster),
        )
        .route("/api/k8s/clusters/:cluster_id/reimport", post(k8s_handlers::reimport_cluster))
        .route("/api/k8s/clusters/:cluster_id/health", get(k8s_handlers::cluster_health))
        .route("/api/k8s/clusters/:cluster_id/namespaces", get(k8s_handlers::list_namespaces))
        .route(
            "/api/k8s/clusters/:cluster_id/access",
            get(k8s_handlers::list_grants).post(k8s_handlers::create_grant),
        )
        .route("/api/k8s/clusters/:cluster_id/operations", get(k8s_handlers::list_operations))
        .route("/api/k8s/access/:grant_id", delete(k8s_handlers::delete_grant))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::auth_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .merge(protected)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                ),
        )
        .with_state(state)
}

/// Simple liveness check
async fn health_check() -> &'static str {
    "OK"
}

mod k8s_handlers {
    use std::sync::Arc;

    use axum::{
        extract::{Path, Query, State},
        http::StatusCode,
        Extension, Json,
    };
    use kubeward_common::cluster::{ClusterAccessGrant, Cluster, NamespaceInfo, Operation};

    use crate::db::users;
    use crate::error::ApiError;
    use crate::kubernetes::oplog::{self, OperationEntry, OperationLog, OperationResult};
    use crate::kubernetes::types::*;
    use crate::middleware::auth::AuthUser;
    use crate::AppState;

    async fn require_superadmin(state: &AppState, user: &AuthUser) -> Result<(), ApiError> {
        let account = users::get_user(state.database.pool(), &user.user_id).await?;
        if !account.superadmin {
            return Err(ApiError::superadmin_required());
        }
        Ok(())
    }

    // Cluster management handlers

    pub async fn list_clusters(
        State(state): State<Arc<AppState>>,
        Extension(user): Extension<AuthUser>,
        Query(query): Query<ClusterQuery>,
    ) -> Result<Json<ClusterList>, ApiError> {
        let clusters = state
            .kubernetes
            .registry
            .list_for_user(&user.user_id, &query)
            .await?;
        Ok(Json(clusters))
    }

    pub async fn create_cluster(
        State(state): State<Arc<AppState>>,
        Extension(user): Extension<AuthUser>,
        Json(payload): Json<CreateClusterRequest>,
    ) -> Result<(StatusCode, Json<Cluster>), ApiError> {
        require_superadmin(&state, &user).await?;

        let cluster = state.kubernetes.registry.create(payload).await?;
        oplog::record(
            state.database.pool(),
            OperationEntry {
                cluster_id: &cluster.id,
                user_id: &user.user_id,
                operation: Operation::Create,
                resource: "cluster",
                name: &cluster.name,
                result: OperationResult::Success,
                message: String::new(),
            },
        )
        .await;

        Ok((StatusCode::CREATED, Json(cluster)))
    }

    pub async fn get_cluster(
        State(state): State<Arc<AppState>>,
        Extension(user): Extension<AuthUser>,
        Path(cluster_id): Path<String>,
    ) -> Result<Json<Cluster>, ApiError> {
        state
            .kubernetes
            .authorize(&user.user_id, &cluster_id, Operation::Get)
            .await?;
        let cluster = state.kubernetes.registry.get_by_id(&cluster_id).await?;
        Ok(Json(cluster))
    }

    pub async fn update_cluster(
        State(state): State<Arc<AppState>>,
        Extension(user): Extension<AuthUser>,
        Path(cluster_id): Path<String>,
        Json(payload): Json<UpdateClusterRequest>,
    ) -> Result<Json<Cluster>, ApiError> {
        state
            .kubernetes
            .authorize(&user.user_id, &cluster_id, Operation::Update)
            .await?;

        let result = state.kubernetes.registry.update(&cluster_id, payload).await;
        oplog::record(
            state.database.pool(),
            OperationEntry::from_outcome(
                &cluster_id,
                &user.user_id,
                Operation::Update,
                "cluster",
                &cluster_id,
                &result,
            ),
        )
        .await;

        Ok(Json(result?))
    }

    pub async fn delete_cluster(
        State(state): State<Arc<AppState>>,
        Extension(user): Extension<AuthUser>,
        Path(cluster_id): Path<String>,
    ) -> Result<StatusCode, ApiError> {
        state
            .kubernetes
            .authorize(&user.user_id, &cluster_id, Operation::Delete)
            .await?;

        let result = state.kubernetes.registry.delete(&cluster_id).await;
        oplog::record(
            state.database.pool(),
            OperationEntry::from_outcome(
                &cluster_id,
                &user.user_id,
                Operation::Delete,
                "cluster",
                &cluster_id,
                &result,
            ),
        )
        .await;

        result?;
        Ok(StatusCode::NO_CONTENT)
    }

    pub async fn reimport_cluster(
        State(state): State<Arc<AppState>>,
        Extension(user): Extension<AuthUser>,
        Path(cluster_id): Path<String>,
        Json(payload): Json<ReimportRequest>,
    ) -> Result<Json<Cluster>, ApiError> {
        state
            .kubernetes
            .authorize(&user.user_id, &cluster_id, Operation::Update)
            .await?;

        let result = state
            .kubernetes
            .registry
            .reimport(&cluster_id, payload.kubeconfig)
            .await;
        oplog::record(
            state.database.pool(),
            OperationEntry::from_outcome(
                &cluster_id,
                &user.user_id,
                Operation::Update,
                "credential",
                &cluster_id,
                &result,
            ),
        )
        .await;

        Ok(Json(result?))
    }

    pub async fn cluster_health(
        State(state): State<Arc<AppState>>,
        Extension(user): Extension<AuthUser>,
        Path(cluster_id): Path<String>,
    ) -> Result<Json<ClusterHealth>, ApiError> {
        state
            .kubernetes
            .authorize(&user.user_id, &cluster_id, Operation::Get)
            .await?;
        let health = state.kubernetes.registry.health_check(&cluster_id).await?;
        Ok(Json(health))
    }

    // Namespace handlers

    pub async fn list_namespaces(
        State(state): State<Arc<AppState>>,
        Extension(user): Extension<AuthUser>,
        Path(cluster_id): Path<String>,
        Query(query): Query<NamespaceQuery>,
    ) -> Result<Json<Vec<NamespaceInfo>>, ApiError> {
        let decision = state
            .kubernetes
            .authorize(&user.user_id, &cluster_id, Operation::List)
            .await?;

        if query.mirrored {
            let namespaces = state
                .kubernetes
                .namespaces
                .mirrored(&cluster_id, &decision)
                .await?;
            return Ok(Json(namespaces));
        }

        // The mirror refresh completes in the background
        let (namespaces, _ticket) = state
            .kubernetes
            .namespaces
            .list(&cluster_id, &decision)
            .await?;
        Ok(Json(namespaces))
    }

    // Access grant handlers

    pub async fn list_grants(
        State(state): State<Arc<AppState>>,
        Extension(user): Extension<AuthUser>,
        Path(cluster_id): Path<String>,
    ) -> Result<Json<Vec<ClusterAccessGrant>>, ApiError> {
        require_superadmin(&state, &user).await?;
        let grants = state.kubernetes.permissions.list_grants(&cluster_id).await?;
        Ok(Json(grants))
    }

    pub async fn create_grant(
        State(state): State<Arc<AppState>>,
        Extension(user): Extension<AuthUser>,
        Path(cluster_id): Path<String>,
        Json(payload): Json<CreateGrantRequest>,
    ) -> Result<(StatusCode, Json<ClusterAccessGrant>), ApiError> {
        require_superadmin(&state, &user).await?;

        let role_id = payload.role_id.clone();
        let result = state
            .kubernetes
            .permissions
            .create_grant(&cluster_id, payload)
            .await;
        oplog::record(
            state.database.pool(),
            OperationEntry::from_outcome(
                &cluster_id,
                &user.user_id,
                Operation::Create,
                "access",
                &role_id,
                &result,
            ),
        )
        .await;

        Ok((StatusCode::CREATED, Json(result?)))
    }

    pub async fn delete_grant(
        State(state): State<Arc<AppState>>,
        Extension(user): Extension<AuthUser>,
        Path(grant_id): Path<String>,
    ) -> Result<StatusCode, ApiError> {
        require_superadmin(&state, &user).await?;
        state.kubernetes.permissions.delete_grant(&grant_id).await?;
        Ok(StatusCode::NO_CONTENT)
    }

    pub async fn list_operations(
        State(state): State<Arc<AppState>>,
        Extension(user): Extension<AuthUser>,
        Path(cluster_id): Path<String>,
        Query(query): Query<OperationLogQuery>,
    ) -> Result<Json<Vec<OperationLog>>, ApiError> {
        state
            .kubernetes
            .authorize(&user.user_id, &cluster_id, Operation::Get)
            .await?;
        let entries = oplog::list(state.database.pool(), &cluster_id, query.limit).await?;
        Ok(Json(entries))
    }
}
