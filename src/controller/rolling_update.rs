//! Partitioned rolling update.
//!
//! At most one pod is replaced per pass: the highest ordinal in
//! `[partition, replicas)` whose spec drifted from the template. Replacement
//! is delete, wait for removal, recreate at the same ordinal.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{Pod, ResourceRequirements};
use kube::ResourceExt;
use tracing::info;

use crate::controller::context::Context;
use crate::controller::error::Result;
use crate::controller::wait::wait_for_pod_removal;
use crate::crd::StatefulWorkload;
use crate::events::{actions, reasons};
use crate::resources::common::pod_labels;
use crate::resources::pod::{generate_pod, pod_ordinal};

/// Resource requirements compared with absent and empty treated alike.
pub fn resources_equal(a: Option<&ResourceRequirements>, b: Option<&ResourceRequirements>) -> bool {
    fn map_eq<V: PartialEq>(a: Option<&BTreeMap<String, V>>, b: Option<&BTreeMap<String, V>>) -> bool {
        match (a, b) {
            (Some(a), Some(b)) => a == b,
            (Some(m), None) | (None, Some(m)) => m.is_empty(),
            (None, None) => true,
        }
    }

    let a_limits = a.and_then(|r| r.limits.as_ref());
    let b_limits = b.and_then(|r| r.limits.as_ref());
    let a_requests = a.and_then(|r| r.requests.as_ref());
    let b_requests = b.and_then(|r| r.requests.as_ref());
    let a_claims = a.and_then(|r| r.claims.as_deref()).unwrap_or_default();
    let b_claims = b.and_then(|r| r.claims.as_deref()).unwrap_or_default();

    map_eq(a_limits, b_limits) && map_eq(a_requests, b_requests) && a_claims == b_claims
}

/// Whether an observed pod differs from the template in labels, container
/// count, per-container image or per-container resources.
pub fn needs_update(pod: &Pod, workload: &StatefulWorkload) -> bool {
    if pod.labels() != &pod_labels(workload) {
        return true;
    }

    let desired = workload
        .spec
        .template
        .spec
        .as_ref()
        .map(|s| s.containers.as_slice())
        .unwrap_or_default();
    let observed = pod
        .spec
        .as_ref()
        .map(|s| s.containers.as_slice())
        .unwrap_or_default();
    if desired.len() != observed.len() {
        return true;
    }

    desired.iter().zip(observed).any(|(d, o)| {
        d.image != o.image || !resources_equal(d.resources.as_ref(), o.resources.as_ref())
    })
}

/// Pick the ordinal to replace from `(ordinal, outdated)` pairs.
///
/// Only ordinals in `[partition, replicas)` are eligible; the highest
/// outdated one wins.
pub fn select_update_ordinal(
    partition: u32,
    replicas: u32,
    pods: impl IntoIterator<Item = (u32, bool)>,
) -> Option<u32> {
    pods.into_iter()
        .filter(|(ordinal, outdated)| *outdated && *ordinal >= partition && *ordinal < replicas)
        .map(|(ordinal, _)| ordinal)
        .max()
}

/// The pod the rolling update should replace this pass, if any.
pub fn select_update_candidate<'a>(
    workload: &StatefulWorkload,
    pods: &'a [Pod],
    partition: u32,
) -> Option<(u32, &'a Pod)> {
    let name = workload.name_any();
    let ordinal = select_update_ordinal(
        partition,
        workload.desired_replicas(),
        pods.iter()
            .filter_map(|p| pod_ordinal(&name, p).map(|o| (o, needs_update(p, workload)))),
    )?;
    pods.iter()
        .find(|p| pod_ordinal(&name, p) == Some(ordinal))
        .map(|p| (ordinal, p))
}

/// Replace at most one outdated pod.
///
/// Returns the replaced ordinal, or `None` when every eligible pod is current.
pub async fn rolling_update(
    workload: &StatefulWorkload,
    pods: &[Pod],
    partition: u32,
    ctx: &Context,
) -> Result<Option<u32>> {
    let Some((ordinal, pod)) = select_update_candidate(workload, pods, partition) else {
        return Ok(None);
    };

    let namespace = workload.namespace().unwrap_or_default();
    let workload_name = workload.name_any();
    let pod_name = pod.name_any();

    info!(name = %workload_name, pod = %pod_name, ordinal, partition, "Replacing outdated pod");
    ctx.kube.delete_pod(&namespace, &pod_name).await?;
    wait_for_pod_removal(
        ctx.kube.as_ref(),
        &namespace,
        &pod_name,
        ctx.timings.pod_deletion_poll,
        ctx.timings.pod_deletion_timeout,
    )
    .await?;

    ctx.kube
        .create_pod(&namespace, &generate_pod(workload, ordinal))
        .await?;
    ctx.record_pod_mutation("replace");

    info!(name = %workload_name, pod = %pod_name, ordinal, "Recreated pod from current template");
    ctx.publish_normal_event(
        workload,
        reasons::ROLLING_UPDATE,
        actions::REPLACE,
        Some(format!("Replaced pod {pod_name} with the current template")),
    )
    .await;

    Ok(Some(ordinal))
}
