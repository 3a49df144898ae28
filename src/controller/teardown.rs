//! Finalizer-guarded teardown of a StatefulWorkload.
//!
//! Teardown is an explicit state machine driven one step per pass:
//!
//! ```text
//! PodsRemaining -> ClaimsRemaining -> FinalizerPresent -> Gone
//! ```
//!
//! - `PodsRemaining`: delete the highest-ordinal pod, or wait if it is
//!   already terminating. Pods therefore go strictly from the top down.
//! - `ClaimsRemaining`: delete one claim.
//! - `FinalizerPresent`: release the finalizer so the API server can finish.
//! - `Gone`: nothing left to do.
//!
//! Every step is recomputed from freshly listed state, so teardown resumes
//! correctly after a crash at any point.

use std::cmp::Reverse;
use std::fmt;

use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Pod};
use kube::ResourceExt;
use kube::runtime::controller::Action;
use tracing::{debug, info};

use crate::controller::common::{FINALIZER, has_finalizer};
use crate::controller::context::Context;
use crate::controller::error::Result;
use crate::crd::StatefulWorkload;
use crate::events::{actions, reasons};
use crate::resources::common::workload_label;
use crate::resources::pod::pod_ordinal;

/// Teardown states, in the order they are passed through.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TeardownPhase {
    PodsRemaining,
    ClaimsRemaining,
    FinalizerPresent,
    Gone,
}

impl fmt::Display for TeardownPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TeardownPhase::PodsRemaining => write!(f, "PodsRemaining"),
            TeardownPhase::ClaimsRemaining => write!(f, "ClaimsRemaining"),
            TeardownPhase::FinalizerPresent => write!(f, "FinalizerPresent"),
            TeardownPhase::Gone => write!(f, "Gone"),
        }
    }
}

impl TeardownPhase {
    /// Derive the phase from what is still observed.
    pub fn observe(pods: usize, claims: usize, finalizer_present: bool) -> Self {
        if pods > 0 {
            TeardownPhase::PodsRemaining
        } else if claims > 0 {
            TeardownPhase::ClaimsRemaining
        } else if finalizer_present {
            TeardownPhase::FinalizerPresent
        } else {
            TeardownPhase::Gone
        }
    }
}

/// The single action a teardown pass takes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TeardownStep {
    DeletePod { name: String },
    DeleteClaim { name: String },
    /// The highest-ordinal pod is already terminating.
    AwaitPodTermination { name: String },
    /// Every remaining claim is already terminating.
    AwaitClaimTermination { name: String },
    RemoveFinalizer,
    Done,
}

impl TeardownStep {
    pub fn phase(&self) -> TeardownPhase {
        match self {
            TeardownStep::DeletePod { .. } => TeardownPhase::PodsRemaining,
            TeardownStep::DeleteClaim { .. } => TeardownPhase::ClaimsRemaining,
            TeardownStep::AwaitPodTermination { .. } => TeardownPhase::PodsRemaining,
            TeardownStep::AwaitClaimTermination { .. } => TeardownPhase::ClaimsRemaining,
            TeardownStep::RemoveFinalizer => TeardownPhase::FinalizerPresent,
            TeardownStep::Done => TeardownPhase::Gone,
        }
    }
}

/// Decide the next teardown step.
///
/// Pods are ordered by descending ordinal; pods without a parseable ordinal
/// come last. Claims are taken in name order.
pub fn plan_step(
    workload_name: &str,
    pods: &[Pod],
    claims: &[PersistentVolumeClaim],
    finalizer_present: bool,
) -> TeardownStep {
    let highest = pods.iter().min_by_key(|p| {
        let ordinal = pod_ordinal(workload_name, p).map(i64::from).unwrap_or(-1);
        (Reverse(ordinal), p.name_any())
    });
    if let Some(pod) = highest {
        let name = pod.name_any();
        return if pod.metadata.deletion_timestamp.is_some() {
            TeardownStep::AwaitPodTermination { name }
        } else {
            TeardownStep::DeletePod { name }
        };
    }

    let mut pending: Vec<&PersistentVolumeClaim> = claims.iter().collect();
    pending.sort_by_key(|c| c.name_any());
    if let Some(claim) = pending
        .iter()
        .find(|c| c.metadata.deletion_timestamp.is_none())
    {
        return TeardownStep::DeleteClaim {
            name: claim.name_any(),
        };
    }
    if let Some(claim) = pending.first() {
        return TeardownStep::AwaitClaimTermination {
            name: claim.name_any(),
        };
    }

    if finalizer_present {
        TeardownStep::RemoveFinalizer
    } else {
        TeardownStep::Done
    }
}

/// Run one teardown step for a workload marked for deletion.
pub async fn handle_deletion(workload: &StatefulWorkload, ctx: &Context) -> Result<Action> {
    let namespace = workload.namespace().unwrap_or_default();
    let name = workload.name_any();
    let owned = workload_label(workload);

    let pods = ctx.kube.list_pods(&namespace, &owned).await?;
    let claims = if pods.is_empty() {
        ctx.kube.list_claims(&namespace, &owned).await?
    } else {
        Vec::new()
    };

    let step = plan_step(&name, &pods, &claims, has_finalizer(workload, FINALIZER));
    debug!(name = %name, phase = %step.phase(), step = ?step, "Teardown step");

    match step {
        TeardownStep::DeletePod { name: pod } => {
            ctx.kube.delete_pod(&namespace, &pod).await?;
            ctx.record_pod_mutation("delete");
            info!(name = %name, pod = %pod, remaining = pods.len().saturating_sub(1), "Deleted pod during teardown");
            ctx.publish_normal_event(
                workload,
                reasons::SUCCESSFUL_DELETE,
                actions::TEARDOWN,
                Some(format!("Deleted pod {pod}")),
            )
            .await;
            Ok(Action::requeue(ctx.timings.teardown_requeue))
        }
        TeardownStep::AwaitPodTermination { name: object }
        | TeardownStep::AwaitClaimTermination { name: object } => {
            debug!(name = %name, object = %object, "Waiting for termination");
            Ok(Action::requeue(ctx.timings.teardown_requeue))
        }
        TeardownStep::DeleteClaim { name: claim } => {
            ctx.kube.delete_claim(&namespace, &claim).await?;
            info!(name = %name, claim = %claim, "Deleted volume claim during teardown");
            ctx.publish_normal_event(
                workload,
                reasons::SUCCESSFUL_DELETE,
                actions::TEARDOWN,
                Some(format!("Deleted claim {claim}")),
            )
            .await;
            Ok(Action::requeue(ctx.timings.teardown_requeue))
        }
        TeardownStep::RemoveFinalizer => {
            ctx.kube.remove_finalizer(&namespace, &name, FINALIZER).await?;
            info!(name = %name, "Removed finalizer");
            ctx.publish_normal_event(
                workload,
                reasons::FINALIZER_REMOVED,
                actions::TEARDOWN,
                Some("All pods and claims removed".to_string()),
            )
            .await;
            Ok(Action::await_change())
        }
        TeardownStep::Done => Ok(Action::await_change()),
    }
}
