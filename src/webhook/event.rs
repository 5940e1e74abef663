//! GitLab merge request event payload

use serde::{Deserialize, Deserializer};

use crate::naming::resource_name;
use crate::{Error, Result};

/// Merge request webhook event
///
/// Only the fields the translator reads are modelled. Everything is
/// defaulted, and an explicit `null` reads as the default, so that a sparse
/// payload parses and is then rejected or ignored by the filtering rules
/// rather than by the JSON parser.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct MergeRequestEvent {
    /// Project the merge request belongs to
    #[serde(default, deserialize_with = "null_as_default")]
    pub project: EventProject,
    /// Merge request attributes
    #[serde(default, deserialize_with = "null_as_default")]
    pub object_attributes: ObjectAttributes,
}

/// Project section of the event
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct EventProject {
    /// Project name
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    /// Group (namespace) the project lives in
    #[serde(default, deserialize_with = "null_as_default")]
    pub namespace: String,
}

/// Merge request attributes of the event
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct ObjectAttributes {
    /// State after the event (`opened`, `merged`, `closed`, ...)
    #[serde(default, deserialize_with = "null_as_default")]
    pub state: String,
    /// Action that triggered the event (`open`, `merge`, `close`, `update`, ...)
    #[serde(default, deserialize_with = "null_as_default")]
    pub action: String,
    /// Branch the merge request deploys
    #[serde(default, deserialize_with = "null_as_default")]
    pub source_branch: String,
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// What the translator does with an event
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventAction {
    /// Create the review environment record
    Create,
    /// Delete the review environment record
    Delete,
    /// Nothing to do
    Ignore,
}

impl MergeRequestEvent {
    /// Classify the event by its `(state, action)` pair
    pub fn action(&self) -> EventAction {
        let attrs = &self.object_attributes;
        match (attrs.state.as_str(), attrs.action.as_str()) {
            ("opened", "open") => EventAction::Create,
            ("merged", "merge") | ("closed", "close") => EventAction::Delete,
            _ => EventAction::Ignore,
        }
    }

    /// Extract the review target
    ///
    /// A missing source branch is reported before missing group or project.
    pub fn target(&self) -> Result<ReviewTarget> {
        let revision = &self.object_attributes.source_branch;
        if revision.is_empty() {
            return Err(Error::MissingRevision);
        }
        if self.project.namespace.is_empty() {
            return Err(Error::validation("project.namespace (group) is empty"));
        }
        if self.project.name.is_empty() {
            return Err(Error::validation("project.name is empty"));
        }
        Ok(ReviewTarget {
            group: self.project.namespace.clone(),
            project: self.project.name.clone(),
            revision: revision.clone(),
        })
    }
}

/// Validated `(group, project, revision)` triple of an event
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReviewTarget {
    /// GitLab group
    pub group: String,
    /// GitLab project
    pub project: String,
    /// Source branch
    pub revision: String,
}

impl ReviewTarget {
    /// Name of the MergeRequest record for this target
    pub fn record_name(&self) -> String {
        resource_name(&self.group, &self.project, &self.revision)
    }
}
