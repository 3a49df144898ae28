//! Reconciliation loop for StatefulWorkload.
//!
//! A pass fetches the workload by key and either hands it to teardown or
//! runs the convergence sequence:
//!
//! 1. validate the spec (warning event and error on failure)
//! 2. ensure the finalizer
//! 3. confirm the governing service exists
//! 4. create missing volume claims
//! 5. rolling update, or fill and drain
//! 6. recompute and persist status
//!
//! Each step is idempotent, so a pass can be rerun from scratch at any time.

use std::sync::Arc;
use std::time::Instant;

use kube::{ResourceExt, runtime::controller::Action};
use tracing::{debug, error, info, warn};

use crate::controller::{
    common::{FINALIZER, has_finalizer},
    context::Context,
    error::Error,
    pods::reconcile_pods,
    status::update_status,
    teardown::handle_deletion,
    validation::validate_spec,
    volume_claims::reconcile_volume_claims,
};
use crate::crd::StatefulWorkload;
use crate::events::{actions, reasons};

/// Reconcile a StatefulWorkload
///
/// Entry point for the kube-runtime controller. The pass is bounded by the
/// configured deadline; expiry aborts any in-flight wait.
pub async fn reconcile(obj: Arc<StatefulWorkload>, ctx: Arc<Context>) -> Result<Action, Error> {
    let start_time = Instant::now();
    let name = obj.name_any();
    let namespace = obj.namespace().unwrap_or_else(|| "default".to_string());
    let deadline = ctx.timings.reconcile_deadline;

    debug!(name = %name, namespace = %namespace, "Reconciling StatefulWorkload");

    let action = tokio::time::timeout(deadline, reconcile_key(&namespace, &name, &ctx))
        .await
        .map_err(|_| Error::DeadlineExceeded(deadline))??;

    if let Some(ref health_state) = ctx.health_state {
        let duration = start_time.elapsed().as_secs_f64();
        health_state.metrics.record_reconcile(
            &namespace,
            &name,
            duration,
            jiff::Timestamp::now().as_second(),
        );
    }

    Ok(action)
}

/// Run one convergence pass for the workload identified by `namespace/name`.
pub async fn reconcile_key(namespace: &str, name: &str, ctx: &Context) -> Result<Action, Error> {
    let Some(workload) = ctx.kube.get_workload(namespace, name).await? else {
        debug!(name = %name, namespace = %namespace, "StatefulWorkload not found, nothing to do");
        return Ok(Action::await_change());
    };

    if workload.metadata.deletion_timestamp.is_some() {
        info!(name = %name, namespace = %namespace, "Handling deletion");
        return handle_deletion(&workload, ctx).await;
    }

    converge(&workload, ctx).await
}

async fn converge(workload: &StatefulWorkload, ctx: &Context) -> Result<Action, Error> {
    let name = workload.name_any();
    let namespace = workload.namespace().unwrap_or_default();

    if let Err(e) = validate_spec(workload) {
        warn!(name = %name, error = %e, "Validation failed");
        ctx.publish_warning_event(
            workload,
            reasons::VALIDATION_FAILED,
            actions::VALIDATE,
            Some(e.to_string()),
        )
        .await;
        return Err(e);
    }

    if !has_finalizer(workload, FINALIZER) {
        ctx.kube.add_finalizer(&namespace, &name, FINALIZER).await?;
        info!(name = %name, "Added finalizer");
    }

    let service_name = &workload.spec.service_name;
    if !ctx.kube.service_exists(&namespace, service_name).await? {
        warn!(name = %name, service = %service_name, "Governing service not found");
        ctx.publish_warning_event(
            workload,
            reasons::SERVICE_NOT_FOUND,
            actions::RECONCILE,
            Some(format!("Governing service {service_name} does not exist")),
        )
        .await;
        return Err(Error::ServiceNotFound(service_name.clone()));
    }

    let claims_created = reconcile_volume_claims(workload, ctx).await?;
    let pods = reconcile_pods(workload, ctx).await?;
    if claims_created > 0 || pods.replaced.is_some() || !pods.created.is_empty() || !pods.deleted.is_empty()
    {
        info!(
            name = %name,
            claims_created,
            replaced = ?pods.replaced,
            created = ?pods.created,
            deleted = ?pods.deleted,
            "Applied changes"
        );
    }

    let status = update_status(workload, ctx).await?;
    if let Some(ref health_state) = ctx.health_state {
        health_state.metrics.set_replicas(
            &namespace,
            &name,
            i64::from(workload.spec.replicas),
            i64::from(status.ready_replicas),
        );
    }

    Ok(Action::requeue(ctx.timings.resync_interval))
}

/// Error policy for the controller
pub fn error_policy(obj: Arc<StatefulWorkload>, error: &Error, ctx: Arc<Context>) -> Action {
    let name = obj.name_any();
    let namespace = obj.namespace().unwrap_or_else(|| "default".to_string());

    // Record error metric
    if let Some(ref health_state) = ctx.health_state {
        health_state.metrics.record_error(&namespace, &name);
    }

    if error.is_not_found() {
        debug!(name = %name, "Resource not found (likely deleted)");
        return Action::await_change();
    }

    if error.is_retryable() {
        warn!(name = %name, error = %error, "Retryable error, will retry");
    } else {
        error!(name = %name, error = %error, "Non-retryable error");
    }
    Action::requeue(error.requeue_after())
}
