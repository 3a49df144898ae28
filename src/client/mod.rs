//! Cluster API access for the reconciler.
//!
//! Every read and write the controller performs goes through the
//! [`WorkloadClient`] trait, so reconciliation can run against the real API
//! server ([`KubeWorkloadClient`]) or an in-memory cluster in tests.
//!
//! Conventions shared by all implementations:
//! - lookups return `Ok(None)` when the object does not exist
//! - deletes of an object that is already gone succeed
//! - creates of an object that already exists fail with `Error::AlreadyExists`

mod kube_client;

pub use kube_client::KubeWorkloadClient;

use std::collections::BTreeMap;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Pod};

use crate::controller::error::Result;
use crate::crd::{StatefulWorkload, StatefulWorkloadStatus};

/// Cluster operations needed to converge a StatefulWorkload.
#[async_trait]
pub trait WorkloadClient: Send + Sync {
    /// Fetch a workload by name.
    async fn get_workload(&self, namespace: &str, name: &str)
    -> Result<Option<StatefulWorkload>>;

    /// Add `finalizer` to the workload if it is not present yet.
    async fn add_finalizer(&self, namespace: &str, name: &str, finalizer: &str) -> Result<()>;

    /// Remove `finalizer` from the workload. A missing workload is not an error.
    async fn remove_finalizer(&self, namespace: &str, name: &str, finalizer: &str) -> Result<()>;

    /// Replace the workload's status subresource.
    async fn patch_status(
        &self,
        namespace: &str,
        name: &str,
        status: &StatefulWorkloadStatus,
    ) -> Result<()>;

    /// Whether the governing service exists.
    async fn service_exists(&self, namespace: &str, name: &str) -> Result<bool>;

    /// List pods carrying every label in `labels`.
    async fn list_pods(&self, namespace: &str, labels: &BTreeMap<String, String>)
    -> Result<Vec<Pod>>;

    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Option<Pod>>;

    async fn create_pod(&self, namespace: &str, pod: &Pod) -> Result<()>;

    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<()>;

    async fn get_claim(&self, namespace: &str, name: &str)
    -> Result<Option<PersistentVolumeClaim>>;

    async fn create_claim(&self, namespace: &str, claim: &PersistentVolumeClaim) -> Result<()>;

    /// List claims carrying every label in `labels`.
    async fn list_claims(
        &self,
        namespace: &str,
        labels: &BTreeMap<String, String>,
    ) -> Result<Vec<PersistentVolumeClaim>>;

    async fn delete_claim(&self, namespace: &str, name: &str) -> Result<()>;
}
