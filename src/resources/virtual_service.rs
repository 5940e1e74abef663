//! Istio VirtualService routing review traffic to one revision
//!
//! Requests reach a review environment through the shared gateway with a
//! `?branch=<revision>` query parameter; the route forwards them to the
//! `<project>-<revision>` Service deployed by the Application.

use std::collections::BTreeMap;

use kube::api::{DynamicObject, ObjectMeta};
use serde::{Deserialize, Serialize};

use super::{managed_labels, to_dynamic, EnvironmentConfig};
use crate::crd::MergeRequest;
use crate::naming::{flatten_revision, NAME_SEPARATOR};
use crate::Result;

/// Query parameter selecting the review revision
pub const BRANCH_QUERY_PARAM: &str = "branch";

/// Istio VirtualService (`networking.istio.io/v1beta1`)
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VirtualService {
    /// API version
    pub api_version: String,
    /// Kind
    pub kind: String,
    /// Metadata
    pub metadata: ObjectMeta,
    /// Spec
    pub spec: VirtualServiceSpec,
}

/// VirtualService spec
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct VirtualServiceSpec {
    /// Gateways the routes bind to
    pub gateways: Vec<String>,
    /// Hosts the routes apply to
    pub hosts: Vec<String>,
    /// HTTP routes
    pub http: Vec<HttpRoute>,
}

/// One HTTP route
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct HttpRoute {
    /// Route name
    pub name: String,
    /// Match conditions
    #[serde(rename = "match")]
    pub match_: Vec<HttpMatchRequest>,
    /// Destinations
    pub route: Vec<HttpRouteDestination>,
}

/// HTTP match conditions
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HttpMatchRequest {
    /// Query parameter matches
    pub query_params: BTreeMap<String, StringMatch>,
}

/// Exact string match
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct StringMatch {
    /// Value that must match exactly
    pub exact: String,
}

/// Weighted destination of a route
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct HttpRouteDestination {
    /// Destination service
    pub destination: RouteDestination,
}

/// Destination service and port
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RouteDestination {
    /// Service host
    pub host: String,
    /// Service port
    pub port: PortSelector,
}

/// Port selector
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PortSelector {
    /// Port number
    pub number: u16,
}

impl VirtualService {
    /// Build the VirtualService for a MergeRequest
    pub fn for_merge_request(mr: &MergeRequest, name: &str, config: &EnvironmentConfig) -> Self {
        let spec = &mr.spec;
        let revision = spec.target_revision();
        let flat_revision = flatten_revision(revision);

        Self {
            api_version: "networking.istio.io/v1beta1".to_string(),
            kind: "VirtualService".to_string(),
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(spec.group().to_string()),
                labels: Some(managed_labels()),
                ..Default::default()
            },
            spec: VirtualServiceSpec {
                gateways: vec![config.gateway.clone()],
                hosts: vec!["*".to_string()],
                http: vec![HttpRoute {
                    name: flat_revision.clone(),
                    match_: vec![HttpMatchRequest {
                        query_params: BTreeMap::from([(
                            BRANCH_QUERY_PARAM.to_string(),
                            StringMatch {
                                exact: revision.to_string(),
                            },
                        )]),
                    }],
                    route: vec![HttpRouteDestination {
                        destination: RouteDestination {
                            host: format!("{}{}{}", spec.project(), NAME_SEPARATOR, flat_revision),
                            port: PortSelector {
                                number: config.service_port,
                            },
                        },
                    }],
                }],
            },
        }
    }
}

/// Build the VirtualService document for a MergeRequest
pub fn build_virtual_service(
    mr: &MergeRequest,
    name: &str,
    config: &EnvironmentConfig,
) -> Result<DynamicObject> {
    to_dynamic(&VirtualService::for_merge_request(mr, name, config))
}
