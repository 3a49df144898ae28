//! [`WorkloadClient`] backed by the Kubernetes API server.

use std::collections::BTreeMap;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Pod, Service};
use kube::api::{DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::{Api, Client};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::client::WorkloadClient;
use crate::controller::common::{FIELD_MANAGER, add_finalizer, remove_finalizer};
use crate::controller::error::{Error, Result};
use crate::crd::{StatefulWorkload, StatefulWorkloadStatus};
use crate::resources::common::label_selector_string;

/// Real Kubernetes client implementation
#[derive(Clone)]
pub struct KubeWorkloadClient {
    client: Client,
}

impl KubeWorkloadClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api<K>(&self, namespace: &str) -> Api<K>
    where
        K: kube::Resource<Scope = k8s_openapi::NamespaceResourceScope>,
        <K as kube::Resource>::DynamicType: Default,
    {
        Api::namespaced(self.client.clone(), namespace)
    }
}

async fn get_opt<K>(api: &Api<K>, name: &str) -> Result<Option<K>>
where
    K: Clone + DeserializeOwned + std::fmt::Debug,
{
    match api.get(name).await {
        Ok(obj) => Ok(Some(obj)),
        Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn create<K>(api: &Api<K>, kind: &'static str, obj: &K) -> Result<()>
where
    K: kube::Resource + Clone + DeserializeOwned + Serialize + std::fmt::Debug,
{
    let name = obj.meta().name.clone().unwrap_or_default();
    match api.create(&PostParams::default(), obj).await {
        Ok(_) => Ok(()),
        Err(kube::Error::Api(ae)) if ae.code == 409 && ae.reason == "AlreadyExists" => {
            Err(Error::AlreadyExists { kind, name })
        }
        Err(e) => Err(e.into()),
    }
}

async fn delete<K>(api: &Api<K>, name: &str) -> Result<()>
where
    K: Clone + DeserializeOwned + std::fmt::Debug,
{
    match api.delete(name, &DeleteParams::default()).await {
        Ok(_) => Ok(()),
        Err(kube::Error::Api(ae)) if ae.code == 404 => {
            debug!(name = %name, "Object already deleted");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

fn list_params(labels: &BTreeMap<String, String>) -> ListParams {
    ListParams::default().labels(&label_selector_string(labels))
}

#[async_trait]
impl WorkloadClient for KubeWorkloadClient {
    async fn get_workload(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<StatefulWorkload>> {
        get_opt(&self.api::<StatefulWorkload>(namespace), name).await
    }

    async fn add_finalizer(&self, namespace: &str, name: &str, finalizer: &str) -> Result<()> {
        add_finalizer(&self.api::<StatefulWorkload>(namespace), name, finalizer).await
    }

    async fn remove_finalizer(&self, namespace: &str, name: &str, finalizer: &str) -> Result<()> {
        remove_finalizer(&self.api::<StatefulWorkload>(namespace), name, finalizer).await
    }

    async fn patch_status(
        &self,
        namespace: &str,
        name: &str,
        status: &StatefulWorkloadStatus,
    ) -> Result<()> {
        let api = self.api::<StatefulWorkload>(namespace);
        let patch = serde_json::json!({ "status": status });
        api.patch_status(name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }

    async fn service_exists(&self, namespace: &str, name: &str) -> Result<bool> {
        Ok(get_opt(&self.api::<Service>(namespace), name).await?.is_some())
    }

    async fn list_pods(
        &self,
        namespace: &str,
        labels: &BTreeMap<String, String>,
    ) -> Result<Vec<Pod>> {
        let list = self.api::<Pod>(namespace).list(&list_params(labels)).await?;
        Ok(list.items)
    }

    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Option<Pod>> {
        get_opt(&self.api::<Pod>(namespace), name).await
    }

    async fn create_pod(&self, namespace: &str, pod: &Pod) -> Result<()> {
        create(&self.api::<Pod>(namespace), "Pod", pod).await
    }

    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<()> {
        delete(&self.api::<Pod>(namespace), name).await
    }

    async fn get_claim(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<PersistentVolumeClaim>> {
        get_opt(&self.api::<PersistentVolumeClaim>(namespace), name).await
    }

    async fn create_claim(&self, namespace: &str, claim: &PersistentVolumeClaim) -> Result<()> {
        create(
            &self.api::<PersistentVolumeClaim>(namespace),
            "PersistentVolumeClaim",
            claim,
        )
        .await
    }

    async fn list_claims(
        &self,
        namespace: &str,
        labels: &BTreeMap<String, String>,
    ) -> Result<Vec<PersistentVolumeClaim>> {
        let list = self
            .api::<PersistentVolumeClaim>(namespace)
            .list(&list_params(labels))
            .await?;
        Ok(list.items)
    }

    async fn delete_claim(&self, namespace: &str, name: &str) -> Result<()> {
        delete(&self.api::<PersistentVolumeClaim>(namespace), name).await
    }
}
