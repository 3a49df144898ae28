//! Validation logic for StatefulWorkload specs.
//!
//! A workload that fails validation is rejected before the controller
//! mutates anything on its behalf. Checks cover:
//! - Selector presence and shape (`matchLabels` only)
//! - Selector/template label consistency
//! - Container list, replica count and service reference
//! - Claim template name uniqueness

use std::collections::HashSet;

use crate::controller::error::{Error, Result};
use crate::crd::StatefulWorkload;
use crate::resources::claim::claim_volume_name;
use crate::resources::common::labels_match;

/// Validate the workload spec
pub fn validate_spec(workload: &StatefulWorkload) -> Result<()> {
    validate_replicas(workload)?;
    validate_service_name(workload)?;
    validate_selector(workload)?;
    validate_containers(workload)?;
    validate_claim_templates(workload)?;
    Ok(())
}

fn validate_replicas(workload: &StatefulWorkload) -> Result<()> {
    if workload.spec.replicas < 0 {
        return Err(Error::Validation(format!(
            "replica count {} must not be negative",
            workload.spec.replicas
        )));
    }
    Ok(())
}

fn validate_service_name(workload: &StatefulWorkload) -> Result<()> {
    if workload.spec.service_name.trim().is_empty() {
        return Err(Error::Validation("serviceName is required".to_string()));
    }
    Ok(())
}

/// The selector must be non-empty `matchLabels` and every entry must appear
/// with the same value on the pod template.
fn validate_selector(workload: &StatefulWorkload) -> Result<()> {
    let selector = workload
        .spec
        .selector
        .as_ref()
        .ok_or_else(|| Error::Validation("selector is required".to_string()))?;

    if selector
        .match_expressions
        .as_ref()
        .is_some_and(|e| !e.is_empty())
    {
        return Err(Error::Validation(
            "selector.matchExpressions is not supported, use matchLabels".to_string(),
        ));
    }

    let match_labels = workload
        .selector_labels()
        .ok_or_else(|| Error::Validation("selector.matchLabels must not be empty".to_string()))?;

    let template_labels = workload
        .template_labels()
        .filter(|l| !l.is_empty())
        .ok_or_else(|| Error::Validation("template.metadata.labels is required".to_string()))?;

    if !labels_match(match_labels, template_labels) {
        let missing: Vec<_> = match_labels
            .iter()
            .filter(|(k, v)| template_labels.get(*k) != Some(*v))
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        return Err(Error::Validation(format!(
            "selector does not match template labels: {}",
            missing.join(",")
        )));
    }
    Ok(())
}

fn validate_containers(workload: &StatefulWorkload) -> Result<()> {
    let empty = workload
        .spec
        .template
        .spec
        .as_ref()
        .is_none_or(|s| s.containers.is_empty());
    if empty {
        return Err(Error::Validation(
            "template.spec.containers must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_claim_templates(workload: &StatefulWorkload) -> Result<()> {
    let mut seen = HashSet::new();
    for template in &workload.spec.volume_claim_templates {
        let name = claim_volume_name(template);
        if !seen.insert(name.clone()) {
            return Err(Error::Validation(format!(
                "duplicate volumeClaimTemplate name {name}"
            )));
        }
    }
    Ok(())
}
