//! Argo CD Application deploying one review revision

use kube::api::{DynamicObject, ObjectMeta};
use serde::{Deserialize, Serialize};

use super::{managed_labels, to_dynamic, EnvironmentConfig};
use crate::crd::MergeRequest;
use crate::Result;

/// Argo CD finalizer that cascades Application deletion to deployed resources
pub const ARGOCD_RESOURCES_FINALIZER: &str = "resources-finalizer.argocd.argoproj.io";

/// Argo CD Application (`argoproj.io/v1alpha1`)
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    /// API version
    pub api_version: String,
    /// Kind
    pub kind: String,
    /// Metadata
    pub metadata: ObjectMeta,
    /// Spec
    pub spec: ApplicationSpec,
}

/// Application spec
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSpec {
    /// Git source of the manifests
    pub source: ApplicationSource,
    /// Where the manifests are applied
    pub destination: ApplicationDestination,
    /// Argo CD project
    pub project: String,
    /// Sync behaviour
    pub sync_policy: SyncPolicy,
}

/// Git source of an Application
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSource {
    /// Repository URL
    #[serde(rename = "repoURL")]
    pub repo_url: String,
    /// Path inside the repository
    pub path: String,
    /// Branch, tag or commit
    pub target_revision: String,
}

/// Deployment target of an Application
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ApplicationDestination {
    /// API server URL
    pub server: String,
    /// Namespace the manifests land in
    pub namespace: String,
}

/// Sync policy of an Application
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SyncPolicy {
    /// Automated sync settings
    pub automated: AutomatedSync,
}

/// Automated sync settings
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AutomatedSync {
    /// Revert manual drift in the cluster
    pub self_heal: bool,
    /// Delete resources no longer in git
    pub prune: bool,
    /// Allow syncing to an empty manifest set
    pub allow_empty: bool,
}

impl Application {
    /// Build the Application for a MergeRequest
    pub fn for_merge_request(mr: &MergeRequest, name: &str, config: &EnvironmentConfig) -> Self {
        let spec = &mr.spec;
        Self {
            api_version: "argoproj.io/v1alpha1".to_string(),
            kind: "Application".to_string(),
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(config.control_namespace.clone()),
                labels: Some(managed_labels()),
                finalizers: Some(vec![ARGOCD_RESOURCES_FINALIZER.to_string()]),
                ..Default::default()
            },
            spec: ApplicationSpec {
                source: ApplicationSource {
                    repo_url: spec.repo_url(),
                    path: spec.manifest_path().to_string(),
                    target_revision: spec.target_revision().to_string(),
                },
                destination: ApplicationDestination {
                    server: config.destination_server.clone(),
                    namespace: spec.group().to_string(),
                },
                project: config.argocd_project.clone(),
                sync_policy: SyncPolicy {
                    automated: AutomatedSync {
                        self_heal: true,
                        prune: true,
                        allow_empty: false,
                    },
                },
            },
        }
    }
}

/// Build the Application document for a MergeRequest
pub fn build_application(
    mr: &MergeRequest,
    name: &str,
    config: &EnvironmentConfig,
) -> Result<DynamicObject> {
    to_dynamic(&Application::for_merge_request(mr, name, config))
}
