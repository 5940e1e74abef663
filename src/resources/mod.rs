//! Resources derived from a MergeRequest
//!
//! Builders here are pure: they turn a MergeRequest plus its derived name into
//! the document that the controller creates. Everything is handed to the
//! store as a [`DynamicObject`] so one client covers core, Argo CD and Istio
//! kinds alike.

mod application;
mod namespace;
mod record;
mod virtual_service;

use std::collections::BTreeMap;
use std::fmt;

use k8s_openapi::api::core::v1::Namespace;
use kube::api::{ApiResource, DynamicObject, GroupVersionKind};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::{Error, Result};

pub use application::{
    build_application, Application, ApplicationDestination, ApplicationSource, ApplicationSpec,
    AutomatedSync, SyncPolicy, ARGOCD_RESOURCES_FINALIZER,
};
pub use namespace::build_namespace;
pub use record::{
    build_merge_request, RecordTemplate, DEFAULT_GITLAB_BASE_URL, DEFAULT_RECORD_MANIFEST_PATH,
    DEFAULT_RECORD_NAMESPACE,
};
pub use virtual_service::{
    build_virtual_service, HttpMatchRequest, HttpRoute, HttpRouteDestination, PortSelector,
    RouteDestination, StringMatch, VirtualService, VirtualServiceSpec,
};

/// Label key marking objects created by this operator
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";

/// Value of [`MANAGED_BY_LABEL`]
pub const MANAGED_BY: &str = "review-env";

/// Kinds of object the operator reads and writes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// The desired-state record
    MergeRequest,
    /// Namespace shared by every review environment of a group
    Namespace,
    /// Argo CD Application deploying the revision
    Application,
    /// Istio VirtualService routing to the revision
    VirtualService,
}

impl ResourceKind {
    /// API resource used to build a dynamic client for this kind
    pub fn api_resource(&self) -> ApiResource {
        match self {
            Self::MergeRequest => ApiResource::erase::<crate::crd::MergeRequest>(&()),
            Self::Namespace => ApiResource::erase::<Namespace>(&()),
            Self::Application => ApiResource::from_gvk_with_plural(
                &GroupVersionKind::gvk("argoproj.io", "v1alpha1", "Application"),
                "applications",
            ),
            Self::VirtualService => ApiResource::from_gvk_with_plural(
                &GroupVersionKind::gvk("networking.istio.io", "v1beta1", "VirtualService"),
                "virtualservices",
            ),
        }
    }

    /// Whether objects of this kind live inside a namespace
    pub fn is_namespaced(&self) -> bool {
        !matches!(self, Self::Namespace)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Self::MergeRequest => "MergeRequest",
            Self::Namespace => "Namespace",
            Self::Application => "Application",
            Self::VirtualService => "VirtualService",
        };
        f.write_str(kind)
    }
}

/// Location of one object in the store
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ObjectRef {
    /// Kind of the object
    pub kind: ResourceKind,
    /// Namespace, `None` for cluster-scoped kinds
    pub namespace: Option<String>,
    /// Object name
    pub name: String,
}

impl ObjectRef {
    /// Reference a namespaced object
    pub fn namespaced(
        kind: ResourceKind,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            namespace: Some(namespace.into()),
            name: name.into(),
        }
    }

    /// Reference a cluster-scoped object
    pub fn cluster(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            namespace: None,
            name: name.into(),
        }
    }

    /// Reference the object a builder produced
    pub fn from_object(kind: ResourceKind, object: &DynamicObject) -> Result<Self> {
        let name = object
            .metadata
            .name
            .clone()
            .ok_or_else(|| Error::validation(format!("{kind} has no metadata.name")))?;
        Ok(Self {
            kind,
            namespace: object.metadata.namespace.clone(),
            name,
        })
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{} {}/{}", self.kind, ns, self.name),
            None => write!(f, "{} {}", self.kind, self.name),
        }
    }
}

/// Standard labels applied to every created object
pub fn managed_labels() -> BTreeMap<String, String> {
    BTreeMap::from([(MANAGED_BY_LABEL.to_string(), MANAGED_BY.to_string())])
}

/// Settings shared by the Application and VirtualService builders
#[derive(Clone, Debug, PartialEq)]
pub struct EnvironmentConfig {
    /// Namespace Argo CD watches for Applications
    pub control_namespace: String,
    /// Cluster the Applications deploy to
    pub destination_server: String,
    /// Argo CD project owning the Applications
    pub argocd_project: String,
    /// Istio gateway the VirtualServices bind to
    pub gateway: String,
    /// Port of the review Service the route targets
    pub service_port: u16,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            control_namespace: "argocd".to_string(),
            destination_server: "https://kubernetes.default.svc".to_string(),
            argocd_project: "default".to_string(),
            gateway: "application-gateway".to_string(),
            service_port: 8080,
        }
    }
}

/// Convert a typed resource into a [`DynamicObject`]
pub fn to_dynamic<T: Serialize>(resource: &T) -> Result<DynamicObject> {
    let value = serde_json::to_value(resource).map_err(|e| Error::serialization(e.to_string()))?;
    serde_json::from_value(value).map_err(|e| Error::serialization(e.to_string()))
}

/// Convert a [`DynamicObject`] back into a typed resource
pub fn from_dynamic<T: DeserializeOwned>(object: DynamicObject) -> Result<T> {
    let value = serde_json::to_value(object).map_err(|e| Error::serialization(e.to_string()))?;
    serde_json::from_value(value).map_err(|e| Error::serialization(e.to_string()))
}
