//! Integration tests for the review environment operator
//!
//! These tests require a Kubernetes cluster (kind) to run and tell the story
//! of how merge request records move through a real API server.
//!
//! # Test Organization
//!
//! - `crd_operations`: Stories about creating, reading and deleting
//!   MergeRequest records, including finalizer handling, through the store client
//!
//! - `webhook_records`: Stories about GitLab events turning into records
//!
//! # Running These Tests
//!
//! These tests are ignored by default because they require a kind cluster:
//!
//! ```bash
//! cargo test --test kind -- --ignored
//! ```
//!
//! Argo CD and Istio are not installed in the test cluster, so dependents are
//! covered by the unit tests rather than here.

mod crd_operations;
mod helpers;
mod webhook_records;
