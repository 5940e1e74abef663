//! MergeRequest controller implementation
//!
//! Each pass re-reads the record, then either ensures the review environment
//! (namespace, Argo CD Application, Istio VirtualService) or tears it down
//! behind the record's finalizer. Ensure never updates: an existing dependent
//! is left exactly as it is.

use std::sync::Arc;
use std::time::Duration;

use kube::api::DynamicObject;
use kube::runtime::controller::Action;
use kube::ResourceExt;
use tracing::{debug, error, info, instrument, warn};

use crate::client::KubeClient;
use crate::crd::{MergeRequest, MERGE_REQUEST_FINALIZER};
use crate::resources::{
    build_application, build_namespace, build_virtual_service, from_dynamic, EnvironmentConfig,
    ObjectRef, ResourceKind,
};
use crate::{Error, Result};

/// Delay before a failed pass is retried
pub const ERROR_REQUEUE: Duration = Duration::from_secs(5);

/// Controller context shared by every reconciliation pass
pub struct Context {
    /// Store client (trait object for testability)
    pub kube: Arc<dyn KubeClient>,
    /// Settings for the dependents the controller creates
    pub environment: EnvironmentConfig,
}

impl Context {
    /// Create a context from a store client and environment settings
    pub fn new(kube: Arc<dyn KubeClient>, environment: EnvironmentConfig) -> Self {
        Self { kube, environment }
    }
}

/// Where a record is in its lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecyclePhase {
    /// Present and not being deleted; dependents are ensured
    Active,
    /// Deletion requested; dependents are torn down
    Terminating,
    /// No longer in the store
    Gone,
}

impl LifecyclePhase {
    /// Classify the current state of a record
    pub fn of(record: Option<&MergeRequest>) -> Self {
        match record {
            None => Self::Gone,
            Some(mr) if mr.is_terminating() => Self::Terminating,
            Some(_) => Self::Active,
        }
    }
}

/// Reconcile a MergeRequest
///
/// The object handed in by the watcher may be stale, so the pass starts from
/// a fresh read of the record.
#[instrument(skip(record, ctx), fields(record = %record.name_any()))]
pub async fn reconcile(record: Arc<MergeRequest>, ctx: Arc<Context>) -> Result<Action> {
    let reference = record_ref(&record)?;
    let current = match ctx.kube.get(&reference).await? {
        Some(object) => Some(from_dynamic::<MergeRequest>(object)?),
        None => None,
    };

    match (LifecyclePhase::of(current.as_ref()), current) {
        (LifecyclePhase::Active, Some(mr)) => reconcile_active(&mr, &reference, &ctx).await,
        (LifecyclePhase::Terminating, Some(mr)) => {
            reconcile_terminating(&mr, &reference, &ctx).await
        }
        _ => {
            debug!("record no longer exists");
            Ok(Action::await_change())
        }
    }
}

/// Error policy for the controller
///
/// Every failure is retried after [`ERROR_REQUEUE`]; each step of a pass is
/// idempotent, so a retry resumes where the failed pass stopped.
pub fn error_policy(record: Arc<MergeRequest>, error: &Error, _ctx: Arc<Context>) -> Action {
    error!(
        ?error,
        record = %record.name_any(),
        "reconciliation failed"
    );
    Action::requeue(ERROR_REQUEUE)
}

async fn reconcile_active(
    mr: &MergeRequest,
    reference: &ObjectRef,
    ctx: &Context,
) -> Result<Action> {
    if !mr.has_finalizer() {
        ctx.kube
            .add_finalizer(reference, MERGE_REQUEST_FINALIZER)
            .await?;
        debug!("added finalizer");
    }

    if let Err(e) = mr.spec.validate() {
        // Retrying cannot fix a bad spec; wait for the record to change
        warn!(error = %e, "record validation failed");
        return Ok(Action::await_change());
    }

    let spec = &mr.spec;
    let name = spec.resource_name();

    ensure(ctx.kube.as_ref(), ResourceKind::Namespace, build_namespace(spec.group())?).await?;
    ensure(
        ctx.kube.as_ref(),
        ResourceKind::Application,
        build_application(mr, &name, &ctx.environment)?,
    )
    .await?;
    ensure(
        ctx.kube.as_ref(),
        ResourceKind::VirtualService,
        build_virtual_service(mr, &name, &ctx.environment)?,
    )
    .await?;

    info!(environment = %name, revision = %spec.target_revision(), "review environment ready");
    Ok(Action::await_change())
}

async fn reconcile_terminating(
    mr: &MergeRequest,
    reference: &ObjectRef,
    ctx: &Context,
) -> Result<Action> {
    if !mr.has_finalizer() {
        debug!("terminating without finalizer, nothing to clean up");
        return Ok(Action::await_change());
    }

    let name = mr.spec.resource_name();
    info!(environment = %name, "tearing down review environment");

    // The group namespace is shared with other revisions and stays behind
    let dependents = [
        ObjectRef::namespaced(
            ResourceKind::Application,
            &ctx.environment.control_namespace,
            &name,
        ),
        ObjectRef::namespaced(ResourceKind::VirtualService, mr.spec.group(), &name),
    ];
    for dependent in &dependents {
        if let Err(e) = ctx.kube.delete(dependent).await {
            warn!(object = %dependent, error = %e, "failed to delete dependent, continuing");
        }
    }

    ctx.kube
        .remove_finalizer(reference, MERGE_REQUEST_FINALIZER)
        .await?;
    info!(environment = %name, "review environment removed");
    Ok(Action::await_change())
}

/// Create an object unless one with the same name already exists
async fn ensure(
    kube: &dyn KubeClient,
    kind: ResourceKind,
    object: DynamicObject,
) -> Result<()> {
    let reference = ObjectRef::from_object(kind, &object)?;

    if kube.get(&reference).await?.is_some() {
        debug!(object = %reference, "already present");
        return Ok(());
    }

    match kube.create(kind, &object).await {
        Ok(()) => {
            info!(object = %reference, "created");
            Ok(())
        }
        Err(e) if e.is_already_exists() => {
            debug!(object = %reference, "created concurrently");
            Ok(())
        }
        Err(e) => Err(e),
    }
}

fn record_ref(record: &MergeRequest) -> Result<ObjectRef> {
    let namespace = record
        .namespace()
        .ok_or_else(|| Error::validation("MergeRequest has no namespace"))?;
    Ok(ObjectRef::namespaced(
        ResourceKind::MergeRequest,
        namespace,
        record.name_any(),
    ))
}
