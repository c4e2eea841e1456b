//! Namespace Listing Tests
//! Scope filtering and the background mirror

mod common;

use common::TestEnv;
use kubeward_api::kubernetes::error::K8sError;
use kubeward_api::kubernetes::sync::SyncOutcome;
use kubeward_common::cluster::{AccessLevel, Operation, PermissionDecision};

fn names(namespaces: &[kubeward_common::cluster::NamespaceInfo]) -> Vec<&str> {
    namespaces.iter().map(|ns| ns.name.as_str()).collect()
}

#[tokio::test]
async fn test_admin_sees_every_namespace() {
    let env = TestEnv::new().await;
    let cluster = env.import("prod").await;

    let (namespaces, ticket) = env
        .manager
        .namespaces
        .list(&cluster.id, &PermissionDecision::admin())
        .await
        .unwrap();

    assert_eq!(names(&namespaces), vec!["default", "kube-system", "prod"]);
    assert!(ticket.is_some());
}

#[tokio::test]
async fn test_scoped_listing_filters_but_mirror_is_complete() {
    let env = TestEnv::new().await;
    let cluster = env.import("prod").await;
    env.add_user("dev", false).await;
    env.add_role("prod-readers", "dev").await;
    env.grant(&cluster.id, "prod-readers", AccessLevel::ReadOnly, &["prod", "absent"]).await;

    let decision = env
        .manager
        .authorize("dev", &cluster.id, Operation::List)
        .await
        .unwrap();
    let (namespaces, ticket) = env
        .manager
        .namespaces
        .list(&cluster.id, &decision)
        .await
        .unwrap();
    assert_eq!(names(&namespaces), vec!["prod"]);

    assert_eq!(ticket.unwrap().wait().await, SyncOutcome::Completed);

    let mirrored = env
        .manager
        .namespaces
        .mirrored(&cluster.id, &PermissionDecision::admin())
        .await
        .unwrap();
    assert_eq!(names(&mirrored), vec!["default", "kube-system", "prod"]);

    let scoped = env
        .manager
        .namespaces
        .mirrored(&cluster.id, &decision)
        .await
        .unwrap();
    assert_eq!(names(&scoped), vec!["prod"]);
}

#[tokio::test]
async fn test_mirror_refreshes_on_later_listing() {
    let env = TestEnv::new().await;
    let cluster = env.import("prod").await;
    let admin = PermissionDecision::admin();

    let (_, ticket) = env.manager.namespaces.list(&cluster.id, &admin).await.unwrap();
    ticket.unwrap().wait().await;

    env.cluster.namespaces.lock().unwrap().push("batch".to_string());
    let (_, ticket) = env.manager.namespaces.list(&cluster.id, &admin).await.unwrap();
    ticket.unwrap().wait().await;

    let mirrored = env.manager.namespaces.mirrored(&cluster.id, &admin).await.unwrap();
    assert_eq!(names(&mirrored), vec!["batch", "default", "kube-system", "prod"]);
}

#[tokio::test]
async fn test_listing_unreachable_cluster_fails() {
    let env = TestEnv::with_ttl(std::time::Duration::from_millis(100)).await;
    let cluster = env.import("prod").await;
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    env.cluster.set_unreachable(true);

    let err = env
        .manager
        .namespaces
        .list(&cluster.id, &PermissionDecision::admin())
        .await
        .unwrap_err();
    assert!(matches!(err, K8sError::ClusterUnreachable(_)));
}

#[tokio::test]
async fn test_mirror_of_unknown_cluster() {
    let env = TestEnv::new().await;

    let err = env
        .manager
        .namespaces
        .mirrored("missing", &PermissionDecision::admin())
        .await
        .unwrap_err();
    assert!(matches!(err, K8sError::ClusterNotFound(_)));
}

#[tokio::test]
async fn test_shutdown_drains_pending_sync() {
    let env = TestEnv::new().await;
    let cluster = env.import("prod").await;

    let (_, ticket) = env
        .manager
        .namespaces
        .list(&cluster.id, &PermissionDecision::admin())
        .await
        .unwrap();
    env.manager.shutdown().await;

    assert_eq!(ticket.unwrap().wait().await, SyncOutcome::Completed);

    // No workers remain to accept new jobs
    let (_, ticket) = env
        .manager
        .namespaces
        .list(&cluster.id, &PermissionDecision::admin())
        .await
        .unwrap();
    assert!(ticket.is_none());
}

#[tokio::test]
async fn test_hung_listing_is_bounded() {
    let env = TestEnv::with_timeouts(std::time::Duration::from_secs(600), 1).await;
    let cluster = env.import("prod").await;
    env.cluster.set_hangs(true);

    let started = std::time::Instant::now();
    let err = env
        .manager
        .namespaces
        .list(&cluster.id, &PermissionDecision::admin())
        .await
        .unwrap_err();

    assert!(matches!(err, K8sError::ClusterUnreachable(_)));
    assert!(started.elapsed() < std::time::Duration::from_secs(5));
}
