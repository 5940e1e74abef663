//! Review environment naming
//!
//! The webhook and the controller never exchange names directly: each side
//! recomputes the name of a MergeRequest (and of its Application and
//! VirtualService) from the same `(group, project, revision)` triple. Both
//! call sites go through [`resource_name`].

/// Separator placed between group, project and revision
pub const NAME_SEPARATOR: char = '-';

/// Path separator that may appear in branch names (`feature/login`)
pub const REVISION_PATH_SEPARATOR: char = '/';

/// Derive the resource name for a review environment
///
/// Joins the three inputs with [`NAME_SEPARATOR`] and flattens every
/// [`REVISION_PATH_SEPARATOR`] in the revision. Case and length are left
/// untouched; callers keep inputs within Kubernetes name limits.
///
/// The revision must already be defaulted by the caller.
pub fn resource_name(group: &str, project: &str, revision: &str) -> String {
    format!(
        "{group}{sep}{project}{sep}{revision}",
        sep = NAME_SEPARATOR,
        revision = flatten_revision(revision)
    )
}

/// Replace path separators in a revision so it can be used inside a name
pub fn flatten_revision(revision: &str) -> String {
    revision.replace(REVISION_PATH_SEPARATOR, &NAME_SEPARATOR.to_string())
}
