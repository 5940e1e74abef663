//! Controller for MergeRequest records
//!
//! Reconciliation is level-triggered: every pass compares the record with the
//! store and ensures or tears down the review environment accordingly.

mod merge_request;

pub use merge_request::{error_policy, reconcile, Context, LifecyclePhase, ERROR_REQUEUE};
