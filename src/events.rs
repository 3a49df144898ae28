//! Kubernetes event publishing.
//!
//! Events are fire-and-forget: a failed publish is logged and never fails a
//! reconciliation.

use async_trait::async_trait;
use kube::Client;
use kube::Resource;
use kube::runtime::events::{Event, EventType, Recorder, Reporter};

use crate::crd::StatefulWorkload;

/// Event reasons emitted by the controller.
pub mod reasons {
    pub const VALIDATION_FAILED: &str = "ValidationFailed";
    pub const SERVICE_NOT_FOUND: &str = "ServiceNotFound";
    pub const SUCCESSFUL_CREATE: &str = "SuccessfulCreate";
    pub const SUCCESSFUL_DELETE: &str = "SuccessfulDelete";
    pub const ROLLING_UPDATE: &str = "RollingUpdate";
    pub const FINALIZER_REMOVED: &str = "FinalizerRemoved";
}

/// Event actions emitted by the controller.
pub mod actions {
    pub const VALIDATE: &str = "Validate";
    pub const RECONCILE: &str = "Reconcile";
    pub const CREATE: &str = "Create";
    pub const DELETE: &str = "Delete";
    pub const REPLACE: &str = "Replace";
    pub const TEARDOWN: &str = "Teardown";
}

/// Sink for events about a StatefulWorkload.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(
        &self,
        workload: &StatefulWorkload,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    );
}

/// Publishes events through the kube-runtime [`Recorder`].
pub struct KubeEventPublisher {
    recorder: Recorder,
}

impl KubeEventPublisher {
    pub fn new(client: Client, controller: &str, instance: Option<String>) -> Self {
        let reporter = Reporter {
            controller: controller.into(),
            instance,
        };
        Self {
            recorder: Recorder::new(client, reporter),
        }
    }
}

#[async_trait]
impl EventPublisher for KubeEventPublisher {
    async fn publish(
        &self,
        workload: &StatefulWorkload,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    ) {
        let object_ref = workload.object_ref(&());
        if let Err(e) = self
            .recorder
            .publish(
                &Event {
                    type_,
                    reason: reason.into(),
                    note,
                    action: action.into(),
                    secondary: None,
                },
                &object_ref,
            )
            .await
        {
            tracing::warn!(reason = %reason, error = %e, "Failed to publish event");
        }
    }
}

/// Discards every event.
pub struct NoopEventPublisher;

#[async_trait]
impl EventPublisher for NoopEventPublisher {
    async fn publish(
        &self,
        _workload: &StatefulWorkload,
        _type_: EventType,
        _reason: &str,
        _action: &str,
        _note: Option<String>,
    ) {
    }
}
