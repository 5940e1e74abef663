//! Integration tests for MergeRequest record operations
//!
//! These tests drive the store client against a real API server, so the
//! conflict, not-found and finalizer rules are the API server's own.

use kube::api::{Api, DeleteParams};
use kube::Client;

use review_env::client::{KubeClient, KubeClientImpl};
use review_env::crd::{MergeRequest, MERGE_REQUEST_FINALIZER};
use review_env::resources::{build_merge_request, ObjectRef, RecordTemplate, ResourceKind};

use super::helpers::{ensure_test_cluster, wait_for_record_deleted, TEST_RECORD_NAMESPACE};

fn template() -> RecordTemplate {
    RecordTemplate {
        namespace: TEST_RECORD_NAMESPACE.to_string(),
        ..Default::default()
    }
}

fn record_ref(name: &str) -> ObjectRef {
    ObjectRef::namespaced(ResourceKind::MergeRequest, TEST_RECORD_NAMESPACE, name)
}

/// Helper to cleanup a record, releasing any finalizer first
async fn cleanup_record(client: &Client, name: &str) {
    let store = KubeClientImpl::new(client.clone());
    let _ = store
        .remove_finalizer(&record_ref(name), MERGE_REQUEST_FINALIZER)
        .await;
    let api: Api<MergeRequest> = Api::namespaced(client.clone(), TEST_RECORD_NAMESPACE);
    let _ = api.delete(name, &DeleteParams::default()).await;
}

/// Story: a record created through the store is readable as a typed MergeRequest
#[tokio::test]
#[ignore = "requires kind cluster - run with: cargo test --test kind -- --ignored"]
async fn story_record_round_trips_through_api_server() {
    let client = ensure_test_cluster()
        .await
        .expect("failed to setup cluster");
    let store = KubeClientImpl::new(client.clone());
    let name = "team1-app1-crd-create";
    cleanup_record(&client, name).await;

    let record = build_merge_request("team1", "app1", "crd/create", &template()).unwrap();
    store
        .create(ResourceKind::MergeRequest, &record)
        .await
        .expect("create should succeed");

    let api: Api<MergeRequest> = Api::namespaced(client.clone(), TEST_RECORD_NAMESPACE);
    let fetched = api.get(name).await.expect("record should exist");
    assert_eq!(fetched.spec.group(), "team1");
    assert_eq!(fetched.spec.project(), "app1");
    assert_eq!(fetched.spec.target_revision(), "crd/create");
    assert_eq!(fetched.spec.resource_name(), name);

    cleanup_record(&client, name).await;
}

/// Story: creating the same record twice reports a conflict, not a failure
#[tokio::test]
#[ignore = "requires kind cluster - run with: cargo test --test kind -- --ignored"]
async fn story_duplicate_create_is_already_exists() {
    let client = ensure_test_cluster()
        .await
        .expect("failed to setup cluster");
    let store = KubeClientImpl::new(client.clone());
    let name = "team1-app1-crd-duplicate";
    cleanup_record(&client, name).await;

    let record = build_merge_request("team1", "app1", "crd/duplicate", &template()).unwrap();
    store
        .create(ResourceKind::MergeRequest, &record)
        .await
        .expect("first create should succeed");
    let err = store
        .create(ResourceKind::MergeRequest, &record)
        .await
        .expect_err("second create should conflict");
    assert!(err.is_already_exists(), "unexpected error: {err}");

    cleanup_record(&client, name).await;
}

/// Story: get and delete treat a missing record as a normal outcome
#[tokio::test]
#[ignore = "requires kind cluster - run with: cargo test --test kind -- --ignored"]
async fn story_missing_record_is_not_an_error() {
    let client = ensure_test_cluster()
        .await
        .expect("failed to setup cluster");
    let store = KubeClientImpl::new(client.clone());
    let reference = record_ref("team1-app1-never-created");

    assert!(store.get(&reference).await.unwrap().is_none());
    store
        .delete(&reference)
        .await
        .expect("deleting an absent record should succeed");
}

/// Story: the finalizer holds a deleted record until it is released
#[tokio::test]
#[ignore = "requires kind cluster - run with: cargo test --test kind -- --ignored"]
async fn story_finalizer_holds_deleted_record() {
    let client = ensure_test_cluster()
        .await
        .expect("failed to setup cluster");
    let store = KubeClientImpl::new(client.clone());
    let name = "team1-app1-crd-finalizer";
    let reference = record_ref(name);
    cleanup_record(&client, name).await;

    let record = build_merge_request("team1", "app1", "crd/finalizer", &template()).unwrap();
    store
        .create(ResourceKind::MergeRequest, &record)
        .await
        .unwrap();
    store
        .add_finalizer(&reference, MERGE_REQUEST_FINALIZER)
        .await
        .unwrap();
    // Adding twice leaves a single entry
    store
        .add_finalizer(&reference, MERGE_REQUEST_FINALIZER)
        .await
        .unwrap();

    store.delete(&reference).await.unwrap();

    let api: Api<MergeRequest> = Api::namespaced(client.clone(), TEST_RECORD_NAMESPACE);
    let held = api.get(name).await.expect("finalizer should hold the record");
    assert!(held.is_terminating());
    assert_eq!(
        held.metadata.finalizers,
        Some(vec![MERGE_REQUEST_FINALIZER.to_string()])
    );

    store
        .remove_finalizer(&reference, MERGE_REQUEST_FINALIZER)
        .await
        .unwrap();
    assert!(
        wait_for_record_deleted(&client, name).await,
        "record should be gone once the finalizer is released"
    );
}
