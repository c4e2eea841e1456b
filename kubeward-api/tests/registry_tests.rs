//! Cluster Registry Tests
//! Import pipeline, client cache behaviour and health probes

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{create_request, kubeconfig, TestEnv};
use kubeward_api::kubernetes::error::K8sError;
use kubeward_api::kubernetes::types::{ClusterQuery, UpdateClusterRequest};
use kubeward_common::cluster::{AccessLevel, HealthState, ImportState};

// ============== Import Pipeline ==============

#[tokio::test]
async fn test_import_success() {
    let env = TestEnv::new().await;

    let cluster = env.import("prod").await;
    assert_eq!(cluster.import_state, ImportState::Success);
    assert_eq!(cluster.health_state, HealthState::Healthy);
    assert_eq!(cluster.version, "v1.28.5");
    assert_eq!(cluster.api_server, "https://10.0.0.1:6443");
    assert!(cluster.credential.is_empty(), "credential must not be returned");
}

#[tokio::test]
async fn test_import_invalid_credential_not_persisted() {
    let env = TestEnv::new().await;

    let mut request = create_request("broken", "https://10.0.0.1:6443");
    request.kubeconfig = "apiVersion: v1\nkind: Config\n".to_string();

    let err = env.manager.registry.create(request).await.unwrap_err();
    assert!(matches!(err, K8sError::CredentialInvalid(_)));
    assert_eq!(env.cluster.connects(), 0);

    let list = env.manager.registry.list(&ClusterQuery::default()).await.unwrap();
    assert_eq!(list.total, 0);
}

#[tokio::test]
async fn test_import_garbage_credential_rejected() {
    let env = TestEnv::new().await;

    let mut request = create_request("garbage", "https://10.0.0.1:6443");
    request.kubeconfig = "not-valid".to_string();

    let err = env.manager.registry.create(request).await.unwrap_err();
    assert!(matches!(err, K8sError::CredentialInvalid(_)));
    assert_eq!(env.cluster.connects(), 0);

    let list = env.manager.registry.list(&ClusterQuery::default()).await.unwrap();
    assert_eq!(list.total, 0);
}

#[tokio::test]
async fn test_import_unloadable_certificate_not_persisted() {
    let env = TestEnv::new().await;

    let mut request = create_request("bad-ca", "https://10.0.0.1:6443");
    request.kubeconfig = request.kubeconfig.replace(
        "    server: https://10.0.0.1:6443\n",
        "    server: https://10.0.0.1:6443\n    certificate-authority-data: \"%%not-base64%%\"\n",
    );

    let err = env.manager.registry.create(request).await.unwrap_err();
    assert!(matches!(err, K8sError::CredentialInvalid(_)));
    assert_eq!(env.cluster.connects(), 0);

    let list = env.manager.registry.list(&ClusterQuery::default()).await.unwrap();
    assert_eq!(list.total, 0);
}

#[tokio::test]
async fn test_import_unreachable_persisted_as_failed() {
    let env = TestEnv::new().await;
    env.cluster.set_unreachable(true);

    let err = env
        .manager
        .registry
        .create(create_request("offline", "https://10.0.0.9:6443"))
        .await
        .unwrap_err();
    assert!(matches!(err, K8sError::ClusterUnreachable(_)));

    let list = env.manager.registry.list(&ClusterQuery::default()).await.unwrap();
    assert_eq!(list.total, 1);

    let stored = env.manager.registry.get_by_id(&list.items[0].id).await.unwrap();
    assert_eq!(stored.name, "offline");
    assert_eq!(stored.api_server, "https://10.0.0.9:6443");
    assert_eq!(stored.import_state, ImportState::Failed);
    assert_eq!(stored.health_state, HealthState::Unhealthy);
}

#[tokio::test]
async fn test_import_hung_cluster_bounded_by_connect_timeout() {
    let env = TestEnv::with_timeouts(Duration::from_secs(600), 1).await;
    env.cluster.set_hangs(true);

    let started = std::time::Instant::now();
    let err = env
        .manager
        .registry
        .create(create_request("stuck", "https://10.0.0.7:6443"))
        .await
        .unwrap_err();
    let elapsed = started.elapsed();

    assert!(matches!(err, K8sError::ClusterUnreachable(_)));
    assert!(elapsed >= Duration::from_millis(900), "returned after {:?}", elapsed);
    assert!(elapsed < Duration::from_secs(5), "returned after {:?}", elapsed);

    let list = env.manager.registry.list(&ClusterQuery::default()).await.unwrap();
    assert_eq!(list.total, 1);
    let stored = env.manager.registry.get_by_id(&list.items[0].id).await.unwrap();
    assert_eq!(stored.import_state, ImportState::Failed);
    assert_eq!(stored.health_state, HealthState::Unhealthy);
}

#[tokio::test]
async fn test_import_unsupported_version_not_persisted() {
    let env = TestEnv::new().await;
    env.cluster.set_version("v1.16.0");

    let err = env
        .manager
        .registry
        .create(create_request("legacy", "https://10.0.0.1:6443"))
        .await
        .unwrap_err();
    assert!(matches!(err, K8sError::VersionUnsupported(ref v) if v == "v1.16.0"));

    let list = env.manager.registry.list(&ClusterQuery::default()).await.unwrap();
    assert_eq!(list.total, 0);
}

#[tokio::test]
async fn test_duplicate_name_conflicts() {
    let env = TestEnv::new().await;
    env.import("prod").await;

    let err = env
        .manager
        .registry
        .create(create_request("prod", "https://10.0.0.2:6443"))
        .await
        .unwrap_err();
    assert!(matches!(err, K8sError::Conflict(_)));
}

#[tokio::test]
async fn test_reimport_unsupported_version_keeps_previous_state() {
    let env = TestEnv::new().await;
    let cluster = env.import("prod").await;

    env.cluster.set_version("v1.15.3");
    let err = env
        .manager
        .registry
        .reimport(&cluster.id, kubeconfig("https://10.0.0.5:6443"))
        .await
        .unwrap_err();
    assert!(matches!(err, K8sError::VersionUnsupported(_)));

    let stored = env.manager.registry.get_by_id(&cluster.id).await.unwrap();
    assert_eq!(stored.import_state, ImportState::Success);
    assert_eq!(stored.api_server, "https://10.0.0.1:6443");
    assert_eq!(stored.version, "v1.28.5");
}

#[tokio::test]
async fn test_reimport_unreachable_marks_failed() {
    let env = TestEnv::new().await;
    let cluster = env.import("prod").await;

    env.cluster.set_unreachable(true);
    let err = env
        .manager
        .registry
        .reimport(&cluster.id, kubeconfig("https://10.0.0.5:6443"))
        .await
        .unwrap_err();
    assert!(matches!(err, K8sError::ClusterUnreachable(_)));

    let stored = env.manager.registry.get_by_id(&cluster.id).await.unwrap();
    assert_eq!(stored.import_state, ImportState::Failed);
    assert_eq!(stored.health_state, HealthState::Unhealthy);
    assert_eq!(stored.api_server, "https://10.0.0.5:6443");
}

// ============== Client Cache ==============

#[tokio::test]
async fn test_get_client_reuses_cached_client() {
    let env = TestEnv::new().await;
    let cluster = env.import("prod").await;
    let connects_after_import = env.cluster.connects();

    let first = env.manager.registry.get_client(&cluster.id).await.unwrap();
    let second = env.manager.registry.get_client(&cluster.id).await.unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(env.cluster.connects(), connects_after_import);
}

#[tokio::test]
async fn test_credential_change_rebuilds_client() {
    let env = TestEnv::new().await;
    let cluster = env.import("prod").await;
    let before = env.manager.registry.get_client(&cluster.id).await.unwrap();

    env.manager
        .registry
        .update(
            &cluster.id,
            UpdateClusterRequest {
                kubeconfig: Some(kubeconfig("https://10.0.0.7:6443")),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let after = env.manager.registry.get_client(&cluster.id).await.unwrap();
    assert!(!Arc::ptr_eq(&before, &after));
}

#[tokio::test]
async fn test_expired_client_rebuilt() {
    let env = TestEnv::with_ttl(Duration::from_millis(200)).await;
    let cluster = env.import("prod").await;

    let before = env.manager.registry.get_client(&cluster.id).await.unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    let connects = env.cluster.connects();

    let after = env.manager.registry.get_client(&cluster.id).await.unwrap();
    assert!(!Arc::ptr_eq(&before, &after));
    assert_eq!(env.cluster.connects(), connects + 1);
}

#[tokio::test]
async fn test_concurrent_misses_build_once() {
    let env = Arc::new(TestEnv::with_ttl(Duration::from_millis(500)).await);
    let cluster = env.import("prod").await;
    tokio::time::sleep(Duration::from_millis(600)).await;
    let connects = env.cluster.connects();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let env = env.clone();
        let id = cluster.id.clone();
        handles.push(tokio::spawn(async move {
            env.manager.registry.get_client(&id).await.unwrap()
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(env.cluster.connects(), connects + 1);
}

#[tokio::test]
async fn test_disabled_cluster_has_no_client() {
    let env = TestEnv::new().await;
    let cluster = env.import("prod").await;

    env.manager
        .registry
        .update(
            &cluster.id,
            UpdateClusterRequest {
                enabled: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let Err(err) = env.manager.registry.get_client(&cluster.id).await else {
        panic!("client handed out for cluster {}", cluster.id);
    };
    assert!(matches!(err, K8sError::ClusterDisabled(_)));
}

#[tokio::test]
async fn test_delete_removes_cluster() {
    let env = TestEnv::new().await;
    let cluster = env.import("prod").await;
    env.manager.registry.get_client(&cluster.id).await.unwrap();

    env.manager.registry.delete(&cluster.id).await.unwrap();

    let Err(err) = env.manager.registry.get_client(&cluster.id).await else {
        panic!("client handed out for cluster {}", cluster.id);
    };
    assert!(matches!(err, K8sError::ClusterNotFound(_)));
    let err = env.manager.registry.delete(&cluster.id).await.unwrap_err();
    assert!(matches!(err, K8sError::ClusterNotFound(_)));
}

// ============== Health and Listing ==============

#[tokio::test]
async fn test_health_check_records_outcome() {
    let env = TestEnv::new().await;
    let cluster = env.import("prod").await;

    env.cluster.set_version("v1.29.1");
    let health = env.manager.registry.health_check(&cluster.id).await.unwrap();
    assert!(health.healthy);
    assert_eq!(health.version, "v1.29.1");
    let stored = env.manager.registry.get_by_id(&cluster.id).await.unwrap();
    assert_eq!(stored.version, "v1.29.1");

    env.cluster.set_version_fails(true);
    let err = env.manager.registry.health_check(&cluster.id).await.unwrap_err();
    assert!(matches!(err, K8sError::ClusterUnreachable(_)));
    let stored = env.manager.registry.get_by_id(&cluster.id).await.unwrap();
    assert_eq!(stored.health_state, HealthState::Unhealthy);
}

#[tokio::test]
async fn test_list_for_user_filters_by_grant() {
    let env = TestEnv::new().await;
    let prod = env.import("prod").await;
    env.import("staging").await;

    env.add_user("root", true).await;
    env.add_user("dev", false).await;
    env.add_user("nobody", false).await;
    env.add_role("developers", "dev").await;
    env.grant(&prod.id, "developers", AccessLevel::ReadOnly, &[]).await;

    let query = ClusterQuery::default();
    let all = env.manager.registry.list_for_user("root", &query).await.unwrap();
    assert_eq!(all.total, 2);

    let granted = env.manager.registry.list_for_user("dev", &query).await.unwrap();
    assert_eq!(granted.total, 1);
    assert_eq!(granted.items[0].id, prod.id);

    let none = env.manager.registry.list_for_user("nobody", &query).await.unwrap();
    assert_eq!(none.total, 0);
}

#[tokio::test]
async fn test_list_name_filter_and_paging() {
    let env = TestEnv::new().await;
    for name in ["prod-eu", "prod-us", "staging"] {
        env.import(name).await;
    }

    let query = ClusterQuery {
        name: Some("prod".to_string()),
        page_size: 1,
        ..Default::default()
    };
    let page = env.manager.registry.list(&query).await.unwrap();
    assert_eq!(page.total, 2);
    assert_eq!(page.items.len(), 1);
}
