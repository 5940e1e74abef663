//! Review environments for GitLab merge requests
//!
//! Every open merge request gets its own review environment: an Argo CD
//! Application deploying the source branch into the group's namespace, and an
//! Istio VirtualService that routes `?branch=<source branch>` to it.
//!
//! # Architecture
//!
//! Two halves share one declarative store:
//! - The webhook turns GitLab merge request events into `MergeRequest`
//!   records (created on open, deleted on merge or close)
//! - The controller reconciles each record into its Namespace, Application
//!   and VirtualService, and tears the latter two down behind a finalizer
//!
//! # Modules
//!
//! - [`crd`] - The `MergeRequest` custom resource
//! - [`controller`] - Reconciliation of `MergeRequest` records
//! - [`webhook`] - GitLab event translator (axum)
//! - [`resources`] - Builders for the records and dependents
//! - [`client`] - Store access trait and its kube implementation
//! - [`naming`] - Shared name derivation
//! - [`telemetry`] - Logging setup
//! - [`error`] - Error types for the operator

#![deny(missing_docs)]

pub mod client;
pub mod controller;
pub mod crd;
pub mod error;
pub mod naming;
pub mod resources;
pub mod telemetry;
pub mod webhook;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Default listen address of the webhook server
pub const DEFAULT_WEBHOOK_LISTEN: &str = "0.0.0.0:8080";

/// Field manager used when installing the CRD
pub const CRD_FIELD_MANAGER: &str = "review-env-controller";
