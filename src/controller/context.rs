//! Shared context for the controller.
//!
//! The Context struct holds shared state that is passed to the reconciler:
//! the cluster client, the event publisher, timing configuration and the
//! optional health state used for metrics.

use std::sync::Arc;

use kube::Client;
use kube::runtime::events::EventType;

use crate::client::{KubeWorkloadClient, WorkloadClient};
use crate::config::ReconcileTimings;
use crate::controller::common::FIELD_MANAGER;
use crate::crd::StatefulWorkload;
use crate::events::{EventPublisher, KubeEventPublisher, NoopEventPublisher};
use crate::health::HealthState;

/// Shared context for the controller
#[derive(Clone)]
pub struct Context {
    /// Cluster API access
    pub kube: Arc<dyn WorkloadClient>,
    /// Event sink
    pub events: Arc<dyn EventPublisher>,
    /// Optional health state for metrics and readiness
    pub health_state: Option<Arc<HealthState>>,
    pub timings: ReconcileTimings,
}

impl Context {
    /// Create a context from its collaborators
    pub fn new(
        kube: Arc<dyn WorkloadClient>,
        events: Arc<dyn EventPublisher>,
        health_state: Option<Arc<HealthState>>,
        timings: ReconcileTimings,
    ) -> Self {
        Self {
            kube,
            events,
            health_state,
            timings,
        }
    }

    /// Create a context backed by a live Kubernetes client
    pub fn from_client(
        client: Client,
        health_state: Option<Arc<HealthState>>,
        timings: ReconcileTimings,
        instance: Option<String>,
    ) -> Self {
        let events = Arc::new(KubeEventPublisher::new(
            client.clone(),
            FIELD_MANAGER,
            instance,
        ));
        Self::new(
            Arc::new(KubeWorkloadClient::new(client)),
            events,
            health_state,
            timings,
        )
    }

    /// Create a context that drops events and records no metrics
    pub fn for_client(kube: Arc<dyn WorkloadClient>, timings: ReconcileTimings) -> Self {
        Self::new(kube, Arc::new(NoopEventPublisher), None, timings)
    }

    /// Publish a normal event for a workload
    pub async fn publish_normal_event(
        &self,
        workload: &StatefulWorkload,
        reason: &str,
        action: &str,
        note: Option<String>,
    ) {
        self.events
            .publish(workload, EventType::Normal, reason, action, note)
            .await;
    }

    /// Publish a warning event for a workload
    pub async fn publish_warning_event(
        &self,
        workload: &StatefulWorkload,
        reason: &str,
        action: &str,
        note: Option<String>,
    ) {
        self.events
            .publish(workload, EventType::Warning, reason, action, note)
            .await;
    }

    /// Count a pod mutation (`create`, `delete` or `replace`)
    pub fn record_pod_mutation(&self, action: &str) {
        if let Some(state) = &self.health_state {
            state.metrics.record_pod_mutation(action);
        }
    }
}
