//! Status aggregation.
//!
//! Status is a pure function of the pods matching the selector and is fully
//! recomputed every pass. It is written only when a field changed.

use jiff::Timestamp;
use k8s_openapi::api::core::v1::{Pod, PodCondition};
use kube::ResourceExt;
use tracing::{debug, info};

use crate::controller::context::Context;
use crate::controller::error::Result;
use crate::crd::{StatefulWorkload, StatefulWorkloadStatus};

const PHASE_RUNNING: &str = "Running";
const CONDITION_READY: &str = "Ready";

fn is_running(pod: &Pod) -> bool {
    pod.status
        .as_ref()
        .and_then(|s| s.phase.as_deref())
        .is_some_and(|phase| phase == PHASE_RUNNING)
}

fn ready_condition(pod: &Pod) -> Option<&PodCondition> {
    pod.status
        .as_ref()
        .and_then(|s| s.conditions.as_ref())
        .and_then(|conditions| conditions.iter().find(|c| c.type_ == CONDITION_READY))
}

/// Running with a True Ready condition.
pub fn is_pod_ready(pod: &Pod) -> bool {
    is_running(pod) && ready_condition(pod).is_some_and(|c| c.status == "True")
}

/// Running, same container count and per-index images as the template, and
/// carrying every template label with the same value.
pub fn is_pod_updated(pod: &Pod, workload: &StatefulWorkload) -> bool {
    if !is_running(pod) {
        return false;
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
        return false;
    }
    if desired.iter().zip(observed).any(|(d, o)| d.image != o.image) {
        return false;
    }

    let pod_labels = pod.labels();
    workload
        .template_labels()
        .map(|labels| labels.iter().all(|(k, v)| pod_labels.get(k) == Some(v)))
        .unwrap_or(true)
}

/// Ready, and Ready for at least `min_ready_seconds` as of `now`.
pub fn is_pod_available(pod: &Pod, min_ready_seconds: i32, now: Timestamp) -> bool {
    if !is_pod_ready(pod) {
        return false;
    }
    if min_ready_seconds <= 0 {
        return true;
    }
    ready_condition(pod)
        .and_then(|c| c.last_transition_time.as_ref())
        .is_some_and(|since| {
            now.as_second() - since.0.as_second() >= i64::from(min_ready_seconds)
        })
}

/// Recompute the status from the observed pod set.
pub fn compute_status(
    workload: &StatefulWorkload,
    pods: &[Pod],
    now: Timestamp,
) -> StatefulWorkloadStatus {
    let mut status = StatefulWorkloadStatus {
        observed_generation: workload.metadata.generation,
        ..Default::default()
    };

    for pod in pods {
        status.current_replicas += 1;
        if is_pod_ready(pod) {
            status.ready_replicas += 1;
        }
        if is_pod_updated(pod, workload) {
            status.updated_replicas += 1;
        }
        if is_pod_available(pod, workload.spec.min_ready_seconds, now) {
            status.available_replicas += 1;
        }
    }
    status.replicas = status.current_replicas;
    status
}

/// Field-by-field comparison of a persisted status against a recomputed one.
pub fn status_differs(current: Option<&StatefulWorkloadStatus>, desired: &StatefulWorkloadStatus) -> bool {
    let Some(current) = current else {
        return true;
    };
    current.observed_generation != desired.observed_generation
        || current.replicas != desired.replicas
        || current.ready_replicas != desired.ready_replicas
        || current.current_replicas != desired.current_replicas
        || current.updated_replicas != desired.updated_replicas
        || current.available_replicas != desired.available_replicas
}

/// List the selector's pods, recompute status and persist it if it changed.
///
/// Returns the recomputed status.
pub async fn update_status(
    workload: &StatefulWorkload,
    ctx: &Context,
) -> Result<StatefulWorkloadStatus> {
    let namespace = workload.namespace().unwrap_or_default();
    let name = workload.name_any();
    let selector = workload.selector_labels().cloned().unwrap_or_default();

    let pods = ctx.kube.list_pods(&namespace, &selector).await?;
    let status = compute_status(workload, &pods, Timestamp::now());

    if status_differs(workload.status.as_ref(), &status) {
        ctx.kube.patch_status(&namespace, &name, &status).await?;
        info!(
            name = %name,
            replicas = status.replicas,
            ready = status.ready_replicas,
            updated = status.updated_replicas,
            available = status.available_replicas,
            "Updated status"
        );
    } else {
        debug!(name = %name, "Status unchanged");
    }

    Ok(status)
}
