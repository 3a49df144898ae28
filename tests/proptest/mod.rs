// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]

//! Property-based tests for stateful-workload-operator.
//!
//! Uses proptest to generate random inputs and verify invariants of the
//! ordinal, update and teardown planners.

use std::collections::BTreeSet;

use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Pod};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};
use proptest::prelude::*;

use stateful_workload_operator::controller::pods::plan_ordinals;
use stateful_workload_operator::controller::rolling_update::select_update_ordinal;
use stateful_workload_operator::controller::status::compute_status;
use stateful_workload_operator::controller::teardown::{TeardownStep, plan_step};
use stateful_workload_operator::crd::{StatefulWorkload, StatefulWorkloadSpec};
use stateful_workload_operator::resources::pod::{parse_ordinal, pod_name};

/// Strategy for DNS-label-like workload names.
fn workload_name() -> impl Strategy<Value = String> {
    "[a-z]([a-z0-9-]{0,20}[a-z0-9])?"
}

/// Strategy for a set of observed ordinals.
fn ordinal_set() -> impl Strategy<Value = BTreeSet<u32>> {
    prop::collection::btree_set(0u32..50, 0..20)
}

fn named_pod(name: String, terminating: bool) -> Pod {
    Pod {
        metadata: ObjectMeta {
            name: Some(name),
            deletion_timestamp: terminating.then(|| Time(jiff::Timestamp::UNIX_EPOCH)),
            ..Default::default()
        },
        ..Default::default()
    }
}

fn named_claim(name: String) -> PersistentVolumeClaim {
    PersistentVolumeClaim {
        metadata: ObjectMeta {
            name: Some(name),
            ..Default::default()
        },
        ..Default::default()
    }
}

proptest! {
    #[test]
    fn ordinal_round_trips(name in workload_name(), ordinal in any::<u32>()) {
        prop_assert_eq!(parse_ordinal(&name, &pod_name(&name, ordinal)), Some(ordinal));
    }

    #[test]
    fn leading_zeros_are_rejected(name in workload_name(), ordinal in 0u32..10_000, zeros in 1usize..4) {
        let padded = format!("{name}-{}{ordinal}", "0".repeat(zeros));
        prop_assert_eq!(parse_ordinal(&name, &padded), None);
    }

    #[test]
    fn non_digit_suffixes_are_rejected(name in workload_name(), suffix in "[0-9]{0,3}[a-z_.][0-9a-z]{0,3}") {
        prop_assert_eq!(parse_ordinal(&name, &format!("{name}-{suffix}")), None);
    }

    #[test]
    fn plan_reaches_exactly_the_desired_ordinals(replicas in 0u32..40, existing in ordinal_set()) {
        let plan = plan_ordinals(replicas, existing.iter().copied());

        let mut after = existing.clone();
        after.extend(plan.create.iter().copied());
        for ordinal in &plan.delete {
            after.remove(ordinal);
        }
        prop_assert_eq!(after, (0..replicas).collect::<BTreeSet<_>>());

        prop_assert!(plan.create.windows(2).all(|w| w[0] < w[1]));
        prop_assert!(plan.delete.windows(2).all(|w| w[0] > w[1]));
        prop_assert!(plan.create.iter().all(|o| !existing.contains(o)));
        prop_assert!(plan.delete.iter().all(|o| existing.contains(o)));
    }

    #[test]
    fn update_ordinal_respects_partition(
        partition in 0u32..20,
        replicas in 0u32..20,
        pods in prop::collection::vec((0u32..25, any::<bool>()), 0..25),
    ) {
        let chosen = select_update_ordinal(partition, replicas, pods.iter().copied());
        let eligible = pods
            .iter()
            .filter(|(o, outdated)| *outdated && *o >= partition && *o < replicas)
            .map(|(o, _)| *o)
            .max();
        prop_assert_eq!(chosen, eligible);
        if let Some(ordinal) = chosen {
            prop_assert!(ordinal >= partition);
            prop_assert!(ordinal < replicas);
        }
    }

    #[test]
    fn teardown_takes_highest_pod_before_claims(
        existing in prop::collection::btree_set(0u32..30, 1..10),
        terminating_top in any::<bool>(),
        claims in 0usize..5,
    ) {
        let top = *existing.iter().next_back().unwrap();
        let pods: Vec<Pod> = existing
            .iter()
            .map(|o| named_pod(pod_name("web", *o), *o == top && terminating_top))
            .collect();
        let claims: Vec<PersistentVolumeClaim> =
            (0..claims).map(|i| named_claim(format!("data-web-{i}"))).collect();

        let expected_name = pod_name("web", top);
        let step = plan_step("web", &pods, &claims, true);
        if terminating_top {
            prop_assert_eq!(step, TeardownStep::AwaitPodTermination { name: expected_name });
        } else {
            prop_assert_eq!(step, TeardownStep::DeletePod { name: expected_name });
        }
    }

    #[test]
    fn status_counts_are_bounded_by_current(replicas in 0i32..10, count in 0u32..10) {
        let workload = StatefulWorkload::new(
            "web",
            StatefulWorkloadSpec {
                replicas,
                ..Default::default()
            },
        );
        let pods: Vec<Pod> = (0..count).map(|o| named_pod(pod_name("web", o), false)).collect();

        let status = compute_status(&workload, &pods, jiff::Timestamp::now());

        prop_assert_eq!(status.current_replicas, i32::try_from(count).unwrap());
        prop_assert_eq!(status.replicas, status.current_replicas);
        prop_assert!(status.ready_replicas <= status.current_replicas);
        prop_assert!(status.updated_replicas <= status.current_replicas);
        prop_assert!(status.available_replicas <= status.ready_replicas);
    }
}
