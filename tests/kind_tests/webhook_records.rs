//! Integration tests for the webhook event translator
//!
//! GitLab events are fed straight into the translator with the real store
//! client, and the resulting records are checked through the API server.

use std::sync::Arc;

use kube::api::Api;

use review_env::client::KubeClientImpl;
use review_env::crd::MergeRequest;
use review_env::resources::RecordTemplate;
use review_env::webhook::{
    handle_event, EventOutcome, EventProject, MergeRequestEvent, ObjectAttributes,
};

use super::helpers::{ensure_test_cluster, wait_for_record_deleted, TEST_RECORD_NAMESPACE};

fn event(state: &str, action: &str, branch: &str) -> MergeRequestEvent {
    MergeRequestEvent {
        project: EventProject {
            name: "app1".to_string(),
            namespace: "team1".to_string(),
        },
        object_attributes: ObjectAttributes {
            state: state.to_string(),
            action: action.to_string(),
            source_branch: branch.to_string(),
        },
    }
}

fn template() -> RecordTemplate {
    RecordTemplate {
        namespace: TEST_RECORD_NAMESPACE.to_string(),
        base_url: "http://gitlab.example.com".to_string(),
        manifest_path: Some("manifests".to_string()),
    }
}

/// Story: a merge request is opened, redelivered, then merged
///
/// The record appears with the template's settings, the redelivery is a
/// no-op, and the merge removes the record again.
#[tokio::test]
#[ignore = "requires kind cluster - run with: cargo test --test kind -- --ignored"]
async fn story_merge_request_lifecycle_drives_record() {
    let client = ensure_test_cluster()
        .await
        .expect("failed to setup cluster");
    let store = Arc::new(KubeClientImpl::new(client.clone()));
    let api: Api<MergeRequest> = Api::namespaced(client.clone(), TEST_RECORD_NAMESPACE);
    let name = "team1-app1-feature-webhook";

    let opened = event("opened", "open", "feature/webhook");
    let outcome = handle_event(store.as_ref(), &template(), &opened)
        .await
        .expect("open should succeed");
    assert_eq!(outcome, EventOutcome::Created(name.to_string()));

    let record = api.get(name).await.expect("record should exist");
    assert_eq!(record.spec.base_url, "http://gitlab.example.com");
    assert_eq!(record.spec.manifest_path(), "manifests");
    assert_eq!(record.spec.target_revision(), "feature/webhook");

    let redelivered = handle_event(store.as_ref(), &template(), &opened)
        .await
        .expect("redelivery should succeed");
    assert_eq!(redelivered, EventOutcome::AlreadyPresent(name.to_string()));

    let merged = handle_event(
        store.as_ref(),
        &template(),
        &event("merged", "merge", "feature/webhook"),
    )
    .await
    .expect("merge should succeed");
    assert_eq!(merged, EventOutcome::Deleted(name.to_string()));
    assert!(wait_for_record_deleted(&client, name).await);
}

/// Story: closing a merge request whose record never existed is acknowledged
#[tokio::test]
#[ignore = "requires kind cluster - run with: cargo test --test kind -- --ignored"]
async fn story_close_without_record_is_acknowledged() {
    let client = ensure_test_cluster()
        .await
        .expect("failed to setup cluster");
    let store = KubeClientImpl::new(client);

    let outcome = handle_event(&store, &template(), &event("closed", "close", "never/opened"))
        .await
        .expect("close should succeed");
    assert_eq!(
        outcome,
        EventOutcome::Deleted("team1-app1-never-opened".to_string())
    );
}
