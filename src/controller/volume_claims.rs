//! Volume claim management.
//!
//! Ensures one claim per (claim template, ordinal) for every ordinal in
//! `[0, replicas)`. Claims are create-only here: existing claims are never
//! diffed, updated or deleted, so storage survives scale-down.

use kube::ResourceExt;
use tracing::{debug, info};

use crate::controller::context::Context;
use crate::controller::error::Result;
use crate::crd::StatefulWorkload;
use crate::events::{actions, reasons};
use crate::resources::claim::{claim_name, claim_volume_name, generate_claim};

/// Create any missing claims for the desired ordinals.
///
/// Returns the number of claims created.
pub async fn reconcile_volume_claims(workload: &StatefulWorkload, ctx: &Context) -> Result<usize> {
    let namespace = workload.namespace().unwrap_or_default();
    let workload_name = workload.name_any();
    let mut created = 0;

    for template in &workload.spec.volume_claim_templates {
        let volume_name = claim_volume_name(template);
        for ordinal in 0..workload.desired_replicas() {
            let name = claim_name(&volume_name, &workload_name, ordinal);
            if ctx.kube.get_claim(&namespace, &name).await?.is_some() {
                continue;
            }

            let claim = generate_claim(workload, template, ordinal);
            match ctx.kube.create_claim(&namespace, &claim).await {
                Ok(()) => {}
                Err(e) if e.is_already_exists() => {
                    debug!(claim = %name, "Claim appeared concurrently");
                    continue;
                }
                Err(e) => return Err(e),
            }

            info!(name = %workload_name, claim = %name, ordinal, "Created volume claim");
            ctx.publish_normal_event(
                workload,
                reasons::SUCCESSFUL_CREATE,
                actions::CREATE,
                Some(format!("Created claim {name}")),
            )
            .await;
            created += 1;
        }
    }

    Ok(created)
}
