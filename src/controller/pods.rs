//! Ordinal pod management.
//!
//! Fill creates a pod for every missing ordinal in `[0, replicas)`; drain
//! deletes every pod at or above `replicas`. Both work on the pods carrying
//! the ownership label, whatever the current selector. When the strategy is
//! RollingUpdate and the update engine replaced a pod, fill and drain wait
//! for the next pass.

use std::collections::BTreeSet;

use k8s_openapi::api::core::v1::Pod;
use kube::ResourceExt;
use tracing::{debug, info};

use crate::controller::context::Context;
use crate::controller::error::Result;
use crate::controller::rolling_update::rolling_update;
use crate::crd::StatefulWorkload;
use crate::events::{actions, reasons};
use crate::resources::common::workload_label;
use crate::resources::pod::{generate_pod, pod_name, pod_ordinal};

/// Ordinals to create and delete for a given replica count.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OrdinalPlan {
    /// Missing ordinals below `replicas`, ascending.
    pub create: Vec<u32>,
    /// Existing ordinals at or above `replicas`, descending.
    pub delete: Vec<u32>,
}

/// Plan fill and drain from the observed ordinals.
pub fn plan_ordinals(replicas: u32, existing: impl IntoIterator<Item = u32>) -> OrdinalPlan {
    let existing: BTreeSet<u32> = existing.into_iter().collect();
    OrdinalPlan {
        create: (0..replicas).filter(|o| !existing.contains(o)).collect(),
        delete: existing.range(replicas..).rev().copied().collect(),
    }
}

/// What one pass of pod reconciliation did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PodSyncOutcome {
    pub replaced: Option<u32>,
    pub created: Vec<u32>,
    pub deleted: Vec<u32>,
}

/// Converge the pod set for one pass.
pub async fn reconcile_pods(workload: &StatefulWorkload, ctx: &Context) -> Result<PodSyncOutcome> {
    let namespace = workload.namespace().unwrap_or_default();
    let name = workload.name_any();

    // Owned pods, not selector matches: a selector edit must not hide
    // existing ordinals from fill, drain or the update engine.
    let pods: Vec<Pod> = ctx
        .kube
        .list_pods(&namespace, &workload_label(workload))
        .await?
        .into_iter()
        .filter(|p| pod_ordinal(&name, p).is_some())
        .collect();

    if let Some(partition) = workload.spec.update_strategy.rolling_partition() {
        if let Some(ordinal) = rolling_update(workload, &pods, partition, ctx).await? {
            return Ok(PodSyncOutcome {
                replaced: Some(ordinal),
                ..Default::default()
            });
        }
    }

    let plan = plan_ordinals(
        workload.desired_replicas(),
        pods.iter().filter_map(|p| pod_ordinal(&name, p)),
    );
    debug!(name = %name, create = ?plan.create, delete = ?plan.delete, "Pod plan");

    let mut outcome = PodSyncOutcome::default();
    for ordinal in plan.create {
        create_pod(workload, ordinal, ctx).await?;
        outcome.created.push(ordinal);
    }

    for ordinal in plan.delete {
        let terminating = pods
            .iter()
            .find(|p| pod_ordinal(&name, p) == Some(ordinal))
            .is_some_and(|p| p.metadata.deletion_timestamp.is_some());
        if terminating {
            debug!(name = %name, ordinal, "Excess pod already terminating");
            continue;
        }
        delete_pod(workload, ordinal, ctx).await?;
        outcome.deleted.push(ordinal);
    }

    Ok(outcome)
}

/// Create the pod for `ordinal`. An existing pod is reported as an error.
pub async fn create_pod(workload: &StatefulWorkload, ordinal: u32, ctx: &Context) -> Result<()> {
    let namespace = workload.namespace().unwrap_or_default();
    let pod = generate_pod(workload, ordinal);
    let pod_name = pod.name_any();

    ctx.kube.create_pod(&namespace, &pod).await?;
    ctx.record_pod_mutation("create");

    info!(name = %workload.name_any(), pod = %pod_name, ordinal, "Created pod");
    ctx.publish_normal_event(
        workload,
        reasons::SUCCESSFUL_CREATE,
        actions::CREATE,
        Some(format!("Created pod {pod_name}")),
    )
    .await;
    Ok(())
}

/// Delete the pod for `ordinal`.
pub async fn delete_pod(workload: &StatefulWorkload, ordinal: u32, ctx: &Context) -> Result<()> {
    let namespace = workload.namespace().unwrap_or_default();
    let workload_name = workload.name_any();
    let name = pod_name(&workload_name, ordinal);

    ctx.kube.delete_pod(&namespace, &name).await?;
    ctx.record_pod_mutation("delete");

    info!(name = %workload_name, pod = %name, ordinal, "Deleted pod");
    ctx.publish_normal_event(
        workload,
        reasons::SUCCESSFUL_DELETE,
        actions::DELETE,
        Some(format!("Deleted pod {name}")),
    )
    .await;
    Ok(())
}
