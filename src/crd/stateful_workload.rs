//! StatefulWorkload Custom Resource Definition.
//!
//! A StatefulWorkload runs `replicas` pods with stable ordinal identities
//! (`<name>-0`, `<name>-1`, ...), one persistent volume claim per claim
//! template and ordinal, and a partitioned rolling-update policy.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{PersistentVolumeClaim, PodTemplateSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use kube::CustomResource;
use serde::{Deserialize, Serialize};

/// API group of the StatefulWorkload resource.
pub const API_GROUP: &str = "apps.statefulworkload.io";

/// API version of the StatefulWorkload resource.
pub const API_VERSION: &str = "apps.statefulworkload.io/v1";

/// Kind of the StatefulWorkload resource.
pub const KIND: &str = "StatefulWorkload";

/// StatefulWorkload is a custom resource for ordered, stateful replica sets.
///
/// Example:
/// ```yaml
/// apiVersion: apps.statefulworkload.io/v1
/// kind: StatefulWorkload
/// metadata:
///   name: web
/// spec:
///   replicas: 3
///   serviceName: web-headless
///   selector:
///     matchLabels:
///       app: web
///   template:
///     metadata:
///       labels:
///         app: web
///     spec:
///       containers:
///         - name: nginx
///           image: nginx:1.27
///           volumeMounts:
///             - name: data
///               mountPath: /usr/share/nginx/html
///   volumeClaimTemplates:
///     - metadata:
///         name: data
///       spec:
///         accessModes: ["ReadWriteOnce"]
///         resources:
///           requests:
///             storage: 1Gi
///   updateStrategy:
///     type: RollingUpdate
///     rollingUpdate:
///       partition: 0
/// ```
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize)]
#[kube(
    group = "apps.statefulworkload.io",
    version = "v1",
    kind = "StatefulWorkload",
    plural = "statefulworkloads",
    shortname = "swl",
    status = "StatefulWorkloadStatus",
    namespaced,
    // Schema registration is owned by the CRD manifests, not the controller
    schema = "disabled",
    printcolumn = r#"{"name":"Desired", "type":"integer", "jsonPath":".spec.replicas"}"#,
    printcolumn = r#"{"name":"Current", "type":"integer", "jsonPath":".status.currentReplicas"}"#,
    printcolumn = r#"{"name":"Ready", "type":"integer", "jsonPath":".status.readyReplicas"}"#,
    printcolumn = r#"{"name":"Updated", "type":"integer", "jsonPath":".status.updatedReplicas"}"#,
    printcolumn = r#"{"name":"Available", "type":"integer", "jsonPath":".status.availableReplicas"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct StatefulWorkloadSpec {
    /// Desired number of replicas (>= 0).
    #[serde(default)]
    pub replicas: i32,

    /// Name of the pre-existing headless service that governs per-replica
    /// network identity. The controller never creates it.
    #[serde(default)]
    pub service_name: String,

    /// Label query over pods. Must be a subset of the template labels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<LabelSelector>,

    /// Pod template stamped out for every ordinal.
    #[serde(default)]
    pub template: PodTemplateSpec,

    /// Claim templates; each ordinal gets one claim per template.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volume_claim_templates: Vec<PersistentVolumeClaim>,

    /// How pods are replaced when the template changes.
    #[serde(default)]
    pub update_strategy: UpdateStrategy,

    /// Seconds a pod must stay Ready before it counts as available.
    #[serde(default)]
    pub min_ready_seconds: i32,
}

/// Update strategy for template changes.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStrategy {
    /// Strategy type (default: RollingUpdate).
    #[serde(default, rename = "type")]
    pub type_: UpdateStrategyType,

    /// Parameters for the RollingUpdate strategy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rolling_update: Option<RollingUpdateStrategy>,
}

/// Strategy types understood by the controller.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Deserialize, Serialize)]
pub enum UpdateStrategyType {
    /// Replace outdated pods automatically, highest ordinal first, one per pass.
    #[default]
    RollingUpdate,
    /// Never replace pods proactively; users delete pods to pick up changes.
    OnDelete,
}

impl std::fmt::Display for UpdateStrategyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpdateStrategyType::RollingUpdate => write!(f, "RollingUpdate"),
            UpdateStrategyType::OnDelete => write!(f, "OnDelete"),
        }
    }
}

/// RollingUpdate parameters.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RollingUpdateStrategy {
    /// Ordinals below the partition are never replaced (default: 0).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition: Option<i32>,
}

impl UpdateStrategy {
    /// Partition to apply when the strategy is RollingUpdate, `None` for OnDelete.
    pub fn rolling_partition(&self) -> Option<u32> {
        match self.type_ {
            UpdateStrategyType::OnDelete => None,
            UpdateStrategyType::RollingUpdate => {
                let partition = self
                    .rolling_update
                    .as_ref()
                    .and_then(|r| r.partition)
                    .unwrap_or(0);
                Some(u32::try_from(partition).unwrap_or(0))
            }
        }
    }
}

/// Observed state of a StatefulWorkload, recomputed from the live pod set.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatefulWorkloadStatus {
    /// The generation most recently observed by the controller.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    /// Number of pods matching the selector.
    #[serde(default)]
    pub replicas: i32,

    /// Pods Running with a True Ready condition.
    #[serde(default)]
    pub ready_replicas: i32,

    /// Pods matching the selector.
    #[serde(default)]
    pub current_replicas: i32,

    /// Running pods whose images and labels match the template.
    #[serde(default)]
    pub updated_replicas: i32,

    /// Ready pods that have been Ready for at least minReadySeconds.
    #[serde(default)]
    pub available_replicas: i32,
}

impl StatefulWorkload {
    /// Desired replica count, clamped at zero.
    pub fn desired_replicas(&self) -> u32 {
        u32::try_from(self.spec.replicas).unwrap_or(0)
    }

    /// The selector's matchLabels, if any were given.
    pub fn selector_labels(&self) -> Option<&BTreeMap<String, String>> {
        self.spec
            .selector
            .as_ref()
            .and_then(|s| s.match_labels.as_ref())
            .filter(|labels| !labels.is_empty())
    }

    /// Labels declared on the pod template.
    pub fn template_labels(&self) -> Option<&BTreeMap<String, String>> {
        self.spec
            .template
            .metadata
            .as_ref()
            .and_then(|m| m.labels.as_ref())
    }
}
