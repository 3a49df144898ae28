//! Common resource generation utilities.
//!
//! Labels and owner references shared by every object the controller stamps out.

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::ResourceExt;

use crate::crd::{API_VERSION, KIND, StatefulWorkload};

/// Label carrying the owning workload's name on pods and claims.
pub const WORKLOAD_LABEL: &str = "apps.statefulworkload.io/workload";

/// Ownership label selecting everything a workload created.
pub fn workload_label(workload: &StatefulWorkload) -> BTreeMap<String, String> {
    BTreeMap::from([(WORKLOAD_LABEL.to_string(), workload.name_any())])
}

/// Labels for a replica pod: the template labels plus the ownership label.
pub fn pod_labels(workload: &StatefulWorkload) -> BTreeMap<String, String> {
    let mut labels = workload.template_labels().cloned().unwrap_or_default();
    labels.extend(workload_label(workload));
    labels
}

/// Create owner reference for a StatefulWorkload
pub fn owner_reference(workload: &StatefulWorkload) -> OwnerReference {
    OwnerReference {
        api_version: API_VERSION.to_string(),
        kind: KIND.to_string(),
        name: workload.name_any(),
        uid: workload.uid().unwrap_or_default(),
        controller: Some(true),
        block_owner_deletion: Some(true),
    }
}

/// Render a label map as a `k=v,k=v` selector string.
pub fn label_selector_string(labels: &BTreeMap<String, String>) -> String {
    labels
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// True when every `selector` entry is present with the same value in `labels`.
pub fn labels_match(selector: &BTreeMap<String, String>, labels: &BTreeMap<String, String>) -> bool {
    selector.iter().all(|(k, v)| labels.get(k) == Some(v))
}
