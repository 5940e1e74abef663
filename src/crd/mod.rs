//! Custom Resource Definitions for the review environment operator

mod merge_request;

pub use merge_request::{
    MergeRequest, MergeRequestSpec, DEFAULT_MANIFEST_PATH, DEFAULT_TARGET_REVISION,
    MERGE_REQUEST_FINALIZER,
};
