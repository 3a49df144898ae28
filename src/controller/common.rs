//! Shared controller helpers.

use kube::{Api, Resource, ResourceExt, api::PatchParams};
use serde::de::DeserializeOwned;

use crate::controller::error::Error;

/// Field manager name for API writes
pub const FIELD_MANAGER: &str = "stateful-workload-operator";

/// Finalizer guarding workload teardown
pub const FINALIZER: &str = "apps.statefulworkload.io/finalizer";

/// Check whether a resource carries `finalizer`.
pub fn has_finalizer<T: Resource>(resource: &T, finalizer: &str) -> bool {
    resource.finalizers().iter().any(|f| f == finalizer)
}

/// Add a finalizer to a resource.
pub async fn add_finalizer<T>(api: &Api<T>, name: &str, finalizer: &str) -> Result<(), Error>
where
    T: Resource + Clone + DeserializeOwned + std::fmt::Debug,
    <T as Resource>::DynamicType: Default,
{
    let resource = api.get(name).await?;
    if has_finalizer(&resource, finalizer) {
        return Ok(());
    }

    let mut finalizers = resource.finalizers().to_vec();
    finalizers.push(finalizer.to_string());
    let patch = finalizer_patch(&finalizers, resource.resource_version().as_deref());
    patch_finalizers(api, name, &patch).await
}

/// Remove a specific finalizer from a resource.
pub async fn remove_finalizer<T>(api: &Api<T>, name: &str, finalizer: &str) -> Result<(), Error>
where
    T: Resource + Clone + DeserializeOwned + std::fmt::Debug,
    <T as Resource>::DynamicType: Default,
{
    let resource = match api.get(name).await {
        Ok(r) => r,
        Err(kube::Error::Api(e)) if e.code == 404 => {
            // Resource already deleted, nothing to do
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    let mut finalizers = resource.finalizers().to_vec();
    let before = finalizers.len();
    finalizers.retain(|f| f != finalizer);
    if finalizers.len() == before {
        return Ok(());
    }

    let patch = finalizer_patch(&finalizers, resource.resource_version().as_deref());
    match patch_finalizers(api, name, &patch).await {
        Err(e) if e.is_not_found() => Ok(()),
        other => other,
    }
}

/// Merge patch replacing the finalizer list.
///
/// Carrying the observed `resourceVersion` turns a concurrent finalizer edit
/// into a 409 conflict instead of a lost update.
pub fn finalizer_patch(finalizers: &[String], resource_version: Option<&str>) -> serde_json::Value {
    let mut metadata = serde_json::json!({ "finalizers": finalizers });
    if let Some(rv) = resource_version {
        metadata["resourceVersion"] = serde_json::Value::from(rv);
    }
    serde_json::json!({ "metadata": metadata })
}

async fn patch_finalizers<T>(api: &Api<T>, name: &str, patch: &serde_json::Value) -> Result<(), Error>
where
    T: Resource + Clone + DeserializeOwned + std::fmt::Debug,
    <T as Resource>::DynamicType: Default,
{
    api.patch(
        name,
        &PatchParams::apply(FIELD_MANAGER),
        &kube::api::Patch::Merge(patch),
    )
    .await?;
    Ok(())
}
