//! Namespace hosting a group's review environments

use k8s_openapi::api::core::v1::Namespace;
use kube::api::{DynamicObject, ObjectMeta};

use super::{managed_labels, to_dynamic};
use crate::Result;

/// Build the Namespace named after a GitLab group
///
/// The namespace is shared by every revision of every project in the group,
/// so it is created on demand and never deleted by the controller.
pub fn build_namespace(group: &str) -> Result<DynamicObject> {
    let namespace = Namespace {
        metadata: ObjectMeta {
            name: Some(group.to_string()),
            labels: Some(managed_labels()),
            ..Default::default()
        },
        ..Default::default()
    };
    to_dynamic(&namespace)
}
