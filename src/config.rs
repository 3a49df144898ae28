//! Operator configuration loaded from environment variables.

use std::time::Duration;

use envconfig::Envconfig;

/// Process-level configuration.
#[derive(Envconfig, Clone, Debug)]
pub struct OperatorConfig {
    /// Restrict watches to a single namespace. Cluster-wide when unset.
    #[envconfig(from = "WATCH_NAMESPACE")]
    pub watch_namespace: Option<String>,

    #[envconfig(from = "HEALTH_PORT", default = "8080")]
    pub health_port: u16,

    /// Fallback re-check interval after a successful pass.
    #[envconfig(from = "RESYNC_INTERVAL_SECS", default = "30")]
    pub resync_interval_secs: u64,

    /// Re-check interval between teardown steps.
    #[envconfig(from = "TEARDOWN_REQUEUE_SECS", default = "5")]
    pub teardown_requeue_secs: u64,

    #[envconfig(from = "POD_DELETION_POLL_SECS", default = "1")]
    pub pod_deletion_poll_secs: u64,

    #[envconfig(from = "POD_DELETION_TIMEOUT_SECS", default = "30")]
    pub pod_deletion_timeout_secs: u64,

    /// Upper bound on a single reconciliation pass.
    #[envconfig(from = "RECONCILE_DEADLINE_SECS", default = "120")]
    pub reconcile_deadline_secs: u64,

    /// Instance identity reported on emitted events.
    #[envconfig(from = "POD_NAME")]
    pub pod_name: Option<String>,
}

impl OperatorConfig {
    /// Timing knobs consumed by the reconciler.
    pub fn timings(&self) -> ReconcileTimings {
        ReconcileTimings {
            resync_interval: Duration::from_secs(self.resync_interval_secs),
            teardown_requeue: Duration::from_secs(self.teardown_requeue_secs),
            pod_deletion_poll: Duration::from_secs(self.pod_deletion_poll_secs),
            pod_deletion_timeout: Duration::from_secs(self.pod_deletion_timeout_secs),
            reconcile_deadline: Duration::from_secs(self.reconcile_deadline_secs),
        }
    }
}

/// Durations that shape a reconciliation pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReconcileTimings {
    pub resync_interval: Duration,
    pub teardown_requeue: Duration,
    pub pod_deletion_poll: Duration,
    pub pod_deletion_timeout: Duration,
    pub reconcile_deadline: Duration,
}

impl Default for ReconcileTimings {
    fn default() -> Self {
        Self {
            resync_interval: Duration::from_secs(30),
            teardown_requeue: Duration::from_secs(5),
            pod_deletion_poll: Duration::from_secs(1),
            pod_deletion_timeout: Duration::from_secs(30),
            reconcile_deadline: Duration::from_secs(120),
        }
    }
}
