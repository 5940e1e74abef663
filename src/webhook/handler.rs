//! Merge request event handling

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use tracing::{debug, info, instrument, warn};

use super::event::{EventAction, MergeRequestEvent};
use super::{WebhookError, WebhookState};
use crate::client::KubeClient;
use crate::resources::{build_merge_request, ObjectRef, RecordTemplate, ResourceKind};

/// Header carrying the shared secret configured in GitLab
pub const GITLAB_TOKEN_HEADER: &str = "x-gitlab-token";

/// Body returned after a record was created or deleted
pub const COMPLETE_MESSAGE: &str = "SendMessage Complete";

/// Body returned for events that need no action
pub const IGNORED_MESSAGE: &str = "No Target Status.\n";

/// Result of translating one event
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventOutcome {
    /// A record was created
    Created(String),
    /// The record was already present
    AlreadyPresent(String),
    /// The record was deleted, or was already gone
    Deleted(String),
    /// The event did not match a handled `(state, action)` pair
    Ignored,
}

impl EventOutcome {
    /// Response body for the outcome
    pub fn message(&self) -> &'static str {
        match self {
            Self::Ignored => IGNORED_MESSAGE,
            _ => COMPLETE_MESSAGE,
        }
    }
}

/// Check the `X-Gitlab-Token` header against the configured secret
///
/// Without a configured secret every request is refused.
pub fn authorize(headers: &HeaderMap, secret: Option<&str>) -> Result<(), WebhookError> {
    let secret = secret
        .filter(|s| !s.is_empty())
        .ok_or(WebhookError::Unauthorized)?;

    let presented = headers
        .get(GITLAB_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(WebhookError::Unauthorized)?;

    if presented != secret {
        return Err(WebhookError::Unauthorized);
    }
    Ok(())
}

/// Translate a parsed event into at most one record mutation
pub async fn handle_event(
    kube: &dyn KubeClient,
    template: &RecordTemplate,
    event: &MergeRequestEvent,
) -> Result<EventOutcome, WebhookError> {
    let action = event.action();
    if action == EventAction::Ignore {
        debug!(
            state = %event.object_attributes.state,
            action = %event.object_attributes.action,
            "ignoring merge request event"
        );
        return Ok(EventOutcome::Ignored);
    }

    let target = event.target().map_err(WebhookError::Rejected)?;
    let name = target.record_name();

    match action {
        EventAction::Create => {
            let record = build_merge_request(
                &target.group,
                &target.project,
                &target.revision,
                template,
            )
            .map_err(WebhookError::Rejected)?;

            match kube.create(ResourceKind::MergeRequest, &record).await {
                Ok(()) => {
                    info!(
                        record = %name,
                        revision = %target.revision,
                        "created merge request record"
                    );
                    Ok(EventOutcome::Created(name))
                }
                Err(e) if e.is_already_exists() => {
                    debug!(record = %name, "merge request record already exists");
                    Ok(EventOutcome::AlreadyPresent(name))
                }
                Err(e) => Err(WebhookError::Store(e)),
            }
        }
        EventAction::Delete => {
            let reference =
                ObjectRef::namespaced(ResourceKind::MergeRequest, &template.namespace, &name);
            kube.delete(&reference).await.map_err(WebhookError::Store)?;
            info!(record = %name, "deleted merge request record");
            Ok(EventOutcome::Deleted(name))
        }
        EventAction::Ignore => Ok(EventOutcome::Ignored),
    }
}

/// `POST /webhook` handler
///
/// The body is parsed by hand so that a malformed payload maps to the same
/// error response as every other rejected event.
#[instrument(skip(state, headers, body))]
pub async fn merge_request_handler(
    State(state): State<Arc<WebhookState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<&'static str, WebhookError> {
    if let Err(e) = authorize(&headers, state.token.as_deref()) {
        warn!("rejected webhook with missing or invalid token");
        return Err(e);
    }

    let event: MergeRequestEvent =
        serde_json::from_slice(&body).map_err(|e| WebhookError::Payload(e.to_string()))?;

    let outcome = handle_event(state.kube.as_ref(), &state.template, &event).await?;
    Ok(outcome.message())
}

/// `GET /healthz` handler
pub async fn healthz() -> &'static str {
    "Health Check OK"
}
