//! MergeRequest records created by the webhook

use kube::api::DynamicObject;

use super::to_dynamic;
use crate::crd::{MergeRequest, MergeRequestSpec};
use crate::naming::resource_name;
use crate::Result;

/// Namespace records are written to when nothing else is configured
pub const DEFAULT_RECORD_NAMESPACE: &str = "operator-system";

/// In-cluster GitLab address used when nothing else is configured
pub const DEFAULT_GITLAB_BASE_URL: &str =
    "http://gitlab-webservice-default.gitlab.svc.cluster.local:8181";

/// Manifest path stamped on webhook-created records by default
pub const DEFAULT_RECORD_MANIFEST_PATH: &str = "manifests";

/// Webhook-side settings copied onto every record it creates
#[derive(Clone, Debug, PartialEq)]
pub struct RecordTemplate {
    /// Namespace the records live in
    pub namespace: String,
    /// GitLab base URL written to `spec.baseUrl`
    pub base_url: String,
    /// Manifest path written to `spec.manifestPath`; `None` leaves it to the controller default
    pub manifest_path: Option<String>,
}

impl Default for RecordTemplate {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_RECORD_NAMESPACE.to_string(),
            base_url: DEFAULT_GITLAB_BASE_URL.to_string(),
            manifest_path: Some(DEFAULT_RECORD_MANIFEST_PATH.to_string()),
        }
    }
}

/// Build the MergeRequest record for a review target
///
/// Group and project must be non-empty and the revision must already be
/// present; the webhook checks all three before calling.
pub fn build_merge_request(
    group: &str,
    project: &str,
    revision: &str,
    template: &RecordTemplate,
) -> Result<DynamicObject> {
    let spec = MergeRequestSpec {
        name: group.to_string(),
        application: project.to_string(),
        base_url: template.base_url.clone(),
        manifest_path: template.manifest_path.clone(),
        target_revision: Some(revision.to_string()),
    };
    spec.validate()?;

    let mut record = MergeRequest::new(&resource_name(group, project, revision), spec);
    record.metadata.namespace = Some(template.namespace.clone());
    to_dynamic(&record)
}
