//! MergeRequest Custom Resource Definition
//!
//! A MergeRequest is the desired state of one review environment: the
//! GitLab group and project of an open merge request plus the revision to
//! deploy. The webhook creates and deletes these records; the controller
//! turns them into a Namespace, an Argo CD Application and an Istio
//! VirtualService.

use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::naming::resource_name;
use crate::{Error, Result};

/// Finalizer guarding MergeRequest removal until dependents are torn down
pub const MERGE_REQUEST_FINALIZER: &str = "mergerequest.review.nautible.com";

/// Manifest path used when a record does not name one
pub const DEFAULT_MANIFEST_PATH: &str = "/manifests/overlays/dev/";

/// Revision deployed when a record does not name one
pub const DEFAULT_TARGET_REVISION: &str = "HEAD";

/// Specification for a MergeRequest
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "review.nautible.com",
    version = "v1alpha1",
    kind = "MergeRequest",
    plural = "mergerequests",
    shortname = "mr",
    namespaced,
    printcolumn = r#"{"name":"Group","type":"string","jsonPath":".spec.name"}"#,
    printcolumn = r#"{"name":"Application","type":"string","jsonPath":".spec.application"}"#,
    printcolumn = r#"{"name":"Revision","type":"string","jsonPath":".spec.targetRevision"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct MergeRequestSpec {
    /// GitLab group; also the namespace the environment is deployed into
    pub name: String,

    /// GitLab project within the group
    pub application: String,

    /// GitLab base URL the repository is cloned from
    pub base_url: String,

    /// Path of the manifests inside the repository
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest_path: Option<String>,

    /// Revision (branch) to deploy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_revision: Option<String>,
}

impl MergeRequestSpec {
    /// GitLab group owning the project
    pub fn group(&self) -> &str {
        &self.name
    }

    /// GitLab project name
    pub fn project(&self) -> &str {
        &self.application
    }

    /// Manifest path, falling back to [`DEFAULT_MANIFEST_PATH`] when unset or empty
    pub fn manifest_path(&self) -> &str {
        non_empty(self.manifest_path.as_deref()).unwrap_or(DEFAULT_MANIFEST_PATH)
    }

    /// Target revision, falling back to [`DEFAULT_TARGET_REVISION`] when unset or empty
    pub fn target_revision(&self) -> &str {
        non_empty(self.target_revision.as_deref()).unwrap_or(DEFAULT_TARGET_REVISION)
    }

    /// Name shared by this record's Application and VirtualService
    pub fn resource_name(&self) -> String {
        resource_name(self.group(), self.project(), self.target_revision())
    }

    /// Git repository URL of the project
    pub fn repo_url(&self) -> String {
        format!(
            "{}/{}/{}.git",
            self.base_url.trim_end_matches('/'),
            self.group(),
            self.project()
        )
    }

    /// Validate the record specification
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::validation("spec.name (group) must not be empty"));
        }
        if self.application.is_empty() {
            return Err(Error::validation(
                "spec.application (project) must not be empty",
            ));
        }
        if self.base_url.is_empty() {
            return Err(Error::validation("spec.baseUrl must not be empty"));
        }
        Ok(())
    }
}

impl MergeRequest {
    /// Returns true if the lifecycle finalizer is attached
    pub fn has_finalizer(&self) -> bool {
        self.finalizers()
            .iter()
            .any(|f| f == MERGE_REQUEST_FINALIZER)
    }

    /// Returns true if deletion has been requested
    pub fn is_terminating(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}
