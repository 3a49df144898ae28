//! stateful-workload-operator library crate
//!
//! This module exports the controller, CRD definitions, resource generators
//! and the cluster/event seams the reconciler runs against.

pub mod client;
pub mod config;
pub mod controller;
pub mod crd;
pub mod events;
pub mod health;
pub mod resources;

pub use config::{OperatorConfig, ReconcileTimings};
pub use health::HealthState;

use std::sync::Arc;

use futures::{Stream, StreamExt};
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Pod};
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::{Controller, WatchStreamExt, metadata_watcher, predicates, reflector, watcher};
use kube::{Api, Client, Resource};
use serde::de::DeserializeOwned;
use tracing::{debug, error, info};

use controller::{context::Context, reconciler::reconcile};
use crd::StatefulWorkload;

/// Create namespaced or cluster-wide API based on scope
pub fn scoped_api<T>(client: Client, namespace: Option<&str>) -> Api<T>
where
    T: Resource<Scope = k8s_openapi::NamespaceResourceScope>,
    <T as Resource>::DynamicType: Default,
    T: Clone + DeserializeOwned + std::fmt::Debug,
{
    match namespace {
        Some(ns) => Api::namespaced(client, ns),
        None => Api::all(client),
    }
}

fn default_watcher_config() -> WatcherConfig {
    WatcherConfig::default().any_semantic()
}

/// Create a filtered stream for a resource type.
///
/// The stream is reflector-backed, retries with exponential backoff, yields
/// applied objects only and drops status-only updates via the generation
/// predicate. Returns the reflector store and the stream.
fn create_filtered_stream<K>(
    api: Api<K>,
    watcher_config: WatcherConfig,
) -> (
    reflector::Store<K>,
    impl Stream<Item = Result<K, watcher::Error>>,
)
where
    K: Resource + Clone + DeserializeOwned + std::fmt::Debug + Send + 'static,
    K::DynamicType: Default + Eq + std::hash::Hash + Clone,
{
    let (reader, writer) = reflector::store();
    let stream = reflector(writer, watcher(api, watcher_config))
        .default_backoff()
        .applied_objects()
        .predicate_filter(predicates::generation, Default::default());
    (reader, stream)
}

/// Run the StatefulWorkload controller.
///
/// Watches StatefulWorkloads plus the pods and claims they own, in
/// `config.watch_namespace` or cluster-wide. Can be called from main.rs or
/// spawned as a background task.
pub async fn run_controller(
    client: Client,
    health_state: Option<Arc<HealthState>>,
    config: &OperatorConfig,
) {
    let namespace = config.watch_namespace.as_deref();
    info!(
        "Starting controller for StatefulWorkload resources (scope: {})",
        namespace.unwrap_or("cluster-wide")
    );

    if let Some(ref state) = health_state {
        state.set_ready(true).await;
    }

    let ctx = Arc::new(Context::from_client(
        client.clone(),
        health_state,
        config.timings(),
        config.pod_name.clone(),
    ));

    let workloads: Api<StatefulWorkload> = scoped_api(client.clone(), namespace);
    let pods: Api<Pod> = scoped_api(client.clone(), namespace);
    let claims: Api<PersistentVolumeClaim> = scoped_api(client, namespace);

    let watcher_config = default_watcher_config();
    let (reader, workload_stream) = create_filtered_stream(workloads, watcher_config.clone());

    // Owned objects only need to trigger a pass; the reconciler lists them
    // itself, so metadata is enough.
    Controller::for_stream(workload_stream, reader)
        .owns_stream(metadata_watcher(pods, watcher_config.clone()).touched_objects())
        .owns_stream(metadata_watcher(claims, watcher_config).touched_objects())
        .run(reconcile, controller::reconciler::error_policy, ctx)
        .for_each(|result| async move {
            match result {
                Ok((obj, _action)) => {
                    debug!("Reconciled: {}", obj.name);
                }
                Err(e) => {
                    // Watch events for owned objects can outlive the workload
                    let is_not_found = match &e {
                        kube::runtime::controller::Error::ObjectNotFound(_) => true,
                        kube::runtime::controller::Error::ReconcilerFailed(err, _) => {
                            err.is_not_found()
                        }
                        _ => false,
                    };
                    if is_not_found {
                        debug!("Object no longer exists (likely deleted): {:?}", e);
                    } else {
                        error!("Reconciliation error: {:?}", e);
                    }
                }
            }
        })
        .await;

    error!("Controller stream ended unexpectedly");
}
