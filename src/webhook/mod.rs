//! GitLab merge request webhook
//!
//! Translates merge request events into MergeRequest records:
//! - `(opened, open)` creates the record for the source branch
//! - `(merged, merge)` and `(closed, close)` delete it
//! - every other event is acknowledged and ignored
//!
//! The controller picks the records up from there; the webhook never touches
//! the review environment itself.

mod event;
mod handler;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use thiserror::Error;
use tracing::error;

use crate::client::KubeClient;
use crate::resources::RecordTemplate;

pub use event::{EventAction, EventProject, MergeRequestEvent, ObjectAttributes, ReviewTarget};
pub use handler::{
    authorize, handle_event, healthz, merge_request_handler, EventOutcome, COMPLETE_MESSAGE,
    GITLAB_TOKEN_HEADER, IGNORED_MESSAGE,
};

/// Webhook endpoint errors
#[derive(Debug, Error)]
pub enum WebhookError {
    /// Missing, wrong or unconfigured token
    #[error("Authorized Error")]
    Unauthorized,

    /// Body is not a merge request event
    #[error("invalid merge request event: {0}")]
    Payload(String),

    /// Event parsed but cannot be turned into a record
    #[error("{0}")]
    Rejected(crate::Error),

    /// Store call failed
    #[error("store error: {0}")]
    Store(crate::Error),
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            WebhookError::Unauthorized => (StatusCode::FORBIDDEN, self.to_string()),
            WebhookError::Payload(_) | WebhookError::Rejected(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
            WebhookError::Store(e) => {
                error!(error = %e, "webhook store call failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
        };

        (status, message).into_response()
    }
}

/// Shared state for webhook handlers
pub struct WebhookState {
    /// Store client used to create and delete records
    pub kube: Arc<dyn KubeClient>,
    /// Secret expected in `X-Gitlab-Token`; requests are refused while unset
    pub token: Option<String>,
    /// Settings copied onto created records
    pub template: RecordTemplate,
}

impl WebhookState {
    /// Create webhook state from a store client, secret and record template
    pub fn new(kube: Arc<dyn KubeClient>, token: Option<String>, template: RecordTemplate) -> Self {
        Self {
            kube,
            token,
            template,
        }
    }
}

/// Create the webhook router
///
/// Routes:
/// - `POST /webhook` - GitLab merge request events
/// - `GET /healthz` - liveness probe
pub fn webhook_router(state: Arc<WebhookState>) -> Router {
    Router::new()
        .route("/webhook", post(merge_request_handler))
        .route("/healthz", get(healthz))
        .with_state(state)
}
