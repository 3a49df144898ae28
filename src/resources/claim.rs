//! Per-replica persistent volume claims.

use k8s_openapi::api::core::v1::PersistentVolumeClaim;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::ResourceExt;

use crate::crd::StatefulWorkload;
use crate::resources::common::{owner_reference, workload_label};

/// Volume name used when a claim template carries no name.
pub const DEFAULT_CLAIM_VOLUME_NAME: &str = "www";

/// Volume name a claim template is mounted under.
pub fn claim_volume_name(template: &PersistentVolumeClaim) -> String {
    template
        .metadata
        .name
        .clone()
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| DEFAULT_CLAIM_VOLUME_NAME.to_string())
}

/// Claim name for one (template, ordinal) pair: `<volume>-<workload>-<ordinal>`.
pub fn claim_name(volume_name: &str, workload_name: &str, ordinal: u32) -> String {
    format!("{volume_name}-{workload_name}-{ordinal}")
}

/// Build the claim for `template` at `ordinal`.
pub fn generate_claim(
    workload: &StatefulWorkload,
    template: &PersistentVolumeClaim,
    ordinal: u32,
) -> PersistentVolumeClaim {
    let volume_name = claim_volume_name(template);
    let mut labels = template.metadata.labels.clone().unwrap_or_default();
    labels.extend(workload_label(workload));

    PersistentVolumeClaim {
        metadata: ObjectMeta {
            name: Some(claim_name(&volume_name, &workload.name_any(), ordinal)),
            namespace: workload.namespace(),
            labels: Some(labels),
            annotations: template.metadata.annotations.clone(),
            owner_references: Some(vec![owner_reference(workload)]),
            ..Default::default()
        },
        spec: template.spec.clone(),
        status: None,
    }
}
