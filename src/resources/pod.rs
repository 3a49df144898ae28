//! Replica pod naming and generation.
//!
//! Every replica is named `<workload>-<ordinal>` and is rebuilt from the
//! workload template with a stable hostname under the governing service.

use k8s_openapi::api::core::v1::{
    PersistentVolumeClaimVolumeSource, Pod, PodSpec, Volume,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::ResourceExt;

use crate::crd::StatefulWorkload;
use crate::resources::claim::{claim_name, claim_volume_name};
use crate::resources::common::{owner_reference, pod_labels};

/// Name of the pod holding `ordinal` for `workload_name`.
pub fn pod_name(workload_name: &str, ordinal: u32) -> String {
    format!("{workload_name}-{ordinal}")
}

/// Parse the ordinal of a pod named `<workload_name>-<n>`.
///
/// The suffix must be a canonical unsigned integer: `web-10` yields 10,
/// while `web-01`, `web-` and `web-1a` yield `None`.
pub fn parse_ordinal(workload_name: &str, pod_name: &str) -> Option<u32> {
    let suffix = pod_name
        .strip_prefix(workload_name)?
        .strip_prefix('-')?;
    if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if suffix.len() > 1 && suffix.starts_with('0') {
        return None;
    }
    suffix.parse().ok()
}

/// Ordinal of an observed pod, if it belongs to `workload_name`'s naming scheme.
pub fn pod_ordinal(workload_name: &str, pod: &Pod) -> Option<u32> {
    pod.metadata
        .name
        .as_deref()
        .and_then(|name| parse_ordinal(workload_name, name))
}

/// Build the desired pod for `ordinal` from the workload template.
pub fn generate_pod(workload: &StatefulWorkload, ordinal: u32) -> Pod {
    let workload_name = workload.name_any();
    let name = pod_name(&workload_name, ordinal);
    let template_meta = workload.spec.template.metadata.clone().unwrap_or_default();

    let mut spec: PodSpec = workload.spec.template.spec.clone().unwrap_or_default();
    spec.hostname = Some(name.clone());
    if !workload.spec.service_name.is_empty() {
        spec.subdomain = Some(workload.spec.service_name.clone());
    }

    let mut volumes = spec.volumes.take().unwrap_or_default();
    for template in &workload.spec.volume_claim_templates {
        let volume_name = claim_volume_name(template);
        volumes.retain(|v| v.name != volume_name);
        volumes.push(Volume {
            name: volume_name.clone(),
            persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                claim_name: claim_name(&volume_name, &workload_name, ordinal),
                read_only: None,
            }),
            ..Default::default()
        });
    }
    if !volumes.is_empty() {
        spec.volumes = Some(volumes);
    }

    Pod {
        metadata: ObjectMeta {
            name: Some(name),
            namespace: workload.namespace(),
            labels: Some(pod_labels(workload)),
            annotations: template_meta.annotations,
            owner_references: Some(vec![owner_reference(workload)]),
            ..Default::default()
        },
        spec: Some(spec),
        status: None,
    }
}
