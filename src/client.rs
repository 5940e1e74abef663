//! Declarative store access
//!
//! Every read and write the operator performs goes through [`KubeClient`].
//! The controller and the webhook both hold it as `Arc<dyn KubeClient>`, so
//! tests swap in a mock or the in-memory store without touching a cluster.

use async_trait::async_trait;
use kube::api::{Api, DeleteParams, DynamicObject, Patch, PatchParams, PostParams};
use kube::Client;
use tracing::debug;

#[cfg(test)]
use mockall::automock;

use crate::resources::{ObjectRef, ResourceKind};
use crate::{Error, Result};

/// Field manager recorded on every write
pub const FIELD_MANAGER: &str = "review-env";

/// Trait abstracting Kubernetes object storage for the operator
///
/// All kinds are handled as [`DynamicObject`]s addressed by [`ObjectRef`].
#[cfg_attr(test, automock)]
#[async_trait]
pub trait KubeClient: Send + Sync {
    /// Fetch an object, `None` if it does not exist
    async fn get(&self, reference: &ObjectRef) -> Result<Option<DynamicObject>>;

    /// Create an object
    ///
    /// Returns [`Error::AlreadyExists`] if an object with the same name is present.
    async fn create(&self, kind: ResourceKind, object: &DynamicObject) -> Result<()>;

    /// Delete an object; deleting an absent object succeeds
    async fn delete(&self, reference: &ObjectRef) -> Result<()>;

    /// Add a finalizer if it is not already present
    async fn add_finalizer(&self, reference: &ObjectRef, finalizer: &str) -> Result<()>;

    /// Remove a finalizer if present
    async fn remove_finalizer(&self, reference: &ObjectRef, finalizer: &str) -> Result<()>;
}

/// Real Kubernetes client implementation
pub struct KubeClientImpl {
    client: Client,
}

impl KubeClientImpl {
    /// Create a new KubeClientImpl wrapping the given kube Client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, kind: ResourceKind, namespace: Option<&str>) -> Api<DynamicObject> {
        let resource = kind.api_resource();
        match namespace {
            Some(ns) if kind.is_namespaced() => {
                Api::namespaced_with(self.client.clone(), ns, &resource)
            }
            _ => Api::all_with(self.client.clone(), &resource),
        }
    }

    fn api_for(&self, reference: &ObjectRef) -> Api<DynamicObject> {
        self.api(reference.kind, reference.namespace.as_deref())
    }

    async fn patch_finalizers(
        &self,
        reference: &ObjectRef,
        finalizers: Vec<String>,
    ) -> Result<()> {
        let patch = serde_json::json!({
            "metadata": {
                "finalizers": finalizers
            }
        });

        self.api_for(reference)
            .patch(
                &reference.name,
                &PatchParams::apply(FIELD_MANAGER),
                &Patch::Merge(&patch),
            )
            .await?;

        Ok(())
    }
}

#[async_trait]
impl KubeClient for KubeClientImpl {
    async fn get(&self, reference: &ObjectRef) -> Result<Option<DynamicObject>> {
        Ok(self.api_for(reference).get_opt(&reference.name).await?)
    }

    async fn create(&self, kind: ResourceKind, object: &DynamicObject) -> Result<()> {
        let reference = ObjectRef::from_object(kind, object)?;
        let params = PostParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..Default::default()
        };

        match self.api_for(&reference).create(&params, object).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(ae)) if ae.code == 409 => {
                Err(Error::already_exists(kind.to_string(), reference.name))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, reference: &ObjectRef) -> Result<()> {
        match self
            .api_for(reference)
            .delete(&reference.name, &DeleteParams::default())
            .await
        {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(ae)) if ae.code == 404 => {
                debug!(object = %reference, "object not found (already deleted)");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn add_finalizer(&self, reference: &ObjectRef, finalizer: &str) -> Result<()> {
        let object = self.api_for(reference).get(&reference.name).await?;
        let mut finalizers = object.metadata.finalizers.unwrap_or_default();

        if finalizers.iter().any(|f| f == finalizer) {
            return Ok(());
        }

        finalizers.push(finalizer.to_string());
        self.patch_finalizers(reference, finalizers).await
    }

    async fn remove_finalizer(
        &self,
        reference: &ObjectRef,
        finalizer: &str,
    ) -> Result<()> {
        let object = self.api_for(reference).get(&reference.name).await?;
        let finalizers = object.metadata.finalizers.unwrap_or_default();

        if !finalizers.iter().any(|f| f == finalizer) {
            return Ok(());
        }

        let remaining = finalizers.into_iter().filter(|f| f != finalizer).collect();
        self.patch_finalizers(reference, remaining).await
    }
}
