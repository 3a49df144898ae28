//! Multi-pass scenarios driven through `reconcile_key` against the fake cluster.
//!
//! Each test seeds a cluster, runs one or more passes and asserts on the
//! recorded mutations, the resulting objects and the emitted events.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use kube::runtime::controller::Action;

use stateful_workload_operator::config::ReconcileTimings;
use stateful_workload_operator::controller::error::Error;
use stateful_workload_operator::controller::reconciler::{reconcile, reconcile_key};
use stateful_workload_operator::crd::{RollingUpdateStrategy, UpdateStrategy, UpdateStrategyType};
use stateful_workload_operator::resources::claim::generate_claim;

use crate::fake_cluster::{FakeCluster, Harness, Mutation, NAMESPACE, claim_template, workload};

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

async fn pass(h: &Harness) -> Result<Action, Error> {
    reconcile_key(NAMESPACE, "web", &h.ctx).await
}

/// Converge a fresh workload with all pods ready, then clear the mutation log.
async fn converged(replicas: i32) -> Harness {
    let h = Harness::new(FakeCluster::with_workload(workload(replicas)));
    pass(&h).await.unwrap();
    h.cluster.mark_all_ready();
    pass(&h).await.unwrap();
    h.cluster.take_mutations();
    h
}

// ============================================================================
// Scale from zero
// ============================================================================

#[tokio::test]
async fn test_first_pass_creates_claims_then_pods_in_order() {
    let h = Harness::new(FakeCluster::with_workload(workload(3)));

    let action = pass(&h).await.unwrap();
    assert_eq!(action, Action::requeue(Duration::from_secs(30)));

    assert_eq!(
        h.cluster.take_mutations(),
        vec![
            Mutation::AddFinalizer("web".to_string()),
            Mutation::CreateClaim("data-web-0".to_string()),
            Mutation::CreateClaim("data-web-1".to_string()),
            Mutation::CreateClaim("data-web-2".to_string()),
            Mutation::CreatePod("web-0".to_string()),
            Mutation::CreatePod("web-1".to_string()),
            Mutation::CreatePod("web-2".to_string()),
            Mutation::PatchStatus("web".to_string()),
        ]
    );
    assert_eq!(h.cluster.pod_names(), names(&["web-0", "web-1", "web-2"]));
    assert_eq!(
        h.cluster.claim_names(),
        names(&["data-web-0", "data-web-1", "data-web-2"])
    );

    let status = h.cluster.workload("web").unwrap().status.unwrap();
    assert_eq!(status.replicas, 3);
    assert_eq!(status.current_replicas, 3);
    assert_eq!(status.ready_replicas, 0);
    assert_eq!(status.observed_generation, Some(1));
}

#[tokio::test]
async fn test_created_pods_carry_identity_and_claims() {
    let h = Harness::new(FakeCluster::with_workload(workload(2)));
    pass(&h).await.unwrap();

    let pod = h.cluster.pod("web-1").unwrap();
    let spec = pod.spec.unwrap();
    assert_eq!(spec.hostname.as_deref(), Some("web-1"));
    assert_eq!(spec.subdomain.as_deref(), Some("web-headless"));

    let volumes = spec.volumes.unwrap();
    let data = volumes.iter().find(|v| v.name == "data").unwrap();
    assert_eq!(
        data.persistent_volume_claim.as_ref().unwrap().claim_name,
        "data-web-1"
    );

    let owner = &pod.metadata.owner_references.unwrap()[0];
    assert_eq!(owner.uid, "uid-web");
    assert_eq!(owner.controller, Some(true));
}

#[tokio::test]
async fn test_status_tracks_ready_pods() {
    let h = Harness::new(FakeCluster::with_workload(workload(3)));
    pass(&h).await.unwrap();
    h.cluster.mark_all_ready();
    pass(&h).await.unwrap();

    let status = h.cluster.workload("web").unwrap().status.unwrap();
    assert_eq!(status.ready_replicas, 3);
    assert_eq!(status.updated_replicas, 3);
    assert_eq!(status.available_replicas, 3);
}

#[tokio::test]
async fn test_converged_pass_is_a_no_op() {
    let h = converged(3).await;

    pass(&h).await.unwrap();

    assert!(h.cluster.take_mutations().is_empty());
}

#[tokio::test]
async fn test_existing_claim_is_kept() {
    let cluster = FakeCluster::with_workload(workload(2));
    cluster.put_claim(generate_claim(&workload(2), &claim_template("data"), 0));
    let h = Harness::new(cluster);

    pass(&h).await.unwrap();

    let created: Vec<_> = h
        .cluster
        .take_mutations()
        .into_iter()
        .filter(|m| matches!(m, Mutation::CreateClaim(_)))
        .collect();
    assert_eq!(created, vec![Mutation::CreateClaim("data-web-1".to_string())]);
}

#[tokio::test]
async fn test_pod_mutations_are_counted() {
    let h = Harness::new(FakeCluster::with_workload(workload(3)));
    pass(&h).await.unwrap();

    let metrics = h.health.metrics.encode();
    assert!(metrics.contains(r#"statefulworkload_pod_mutations_total{action="create"} 3"#));
}

#[tokio::test]
async fn test_successful_pass_stamps_last_reconcile() {
    let h = Harness::new(FakeCluster::with_workload(workload(1)));
    let gauge = "statefulworkload_last_reconcile_timestamp_seconds";
    assert!(h.health.metrics.encode().contains(&format!("{gauge} 0\n")));

    let obj = Arc::new(h.cluster.workload("web").unwrap());
    reconcile(obj, Arc::new(h.ctx.clone())).await.unwrap();

    let encoded = h.health.metrics.encode();
    assert!(!encoded.contains(&format!("{gauge} 0\n")));
    assert!(encoded.contains(r#"statefulworkload_replicas_desired{namespace="default",name="web"} 1"#));
}

// ============================================================================
// Scale down
// ============================================================================

#[tokio::test]
async fn test_scale_down_removes_highest_ordinals_and_keeps_claims() {
    let h = converged(3).await;
    h.cluster.update_spec("web", |spec| spec.replicas = 1);

    pass(&h).await.unwrap();

    let deleted: Vec<_> = h
        .cluster
        .take_mutations()
        .into_iter()
        .filter(|m| matches!(m, Mutation::DeletePod(_)))
        .collect();
    assert_eq!(
        deleted,
        vec![
            Mutation::DeletePod("web-2".to_string()),
            Mutation::DeletePod("web-1".to_string()),
        ]
    );
    assert_eq!(h.cluster.pod_names(), names(&["web-0"]));
    assert_eq!(
        h.cluster.claim_names(),
        names(&["data-web-0", "data-web-1", "data-web-2"])
    );
}

#[tokio::test]
async fn test_scale_down_skips_terminating_pods() {
    let h = converged(3).await;
    h.cluster.set_graceful_pod_deletion(true);
    h.cluster.update_spec("web", |spec| spec.replicas = 2);

    pass(&h).await.unwrap();
    assert_eq!(
        h.cluster.take_mutations(),
        vec![
            Mutation::DeletePod("web-2".to_string()),
            Mutation::PatchStatus("web".to_string()),
        ]
    );

    // web-2 is still terminating; no second delete is issued
    pass(&h).await.unwrap();
    assert!(
        !h.cluster
            .take_mutations()
            .iter()
            .any(|m| matches!(m, Mutation::DeletePod(_)))
    );
}

// ============================================================================
// Rolling update
// ============================================================================

fn set_image(h: &Harness, image: &str) {
    let image = image.to_string();
    h.cluster.update_spec("web", move |spec| {
        spec.template.spec.as_mut().unwrap().containers[0].image = Some(image);
    });
}

#[tokio::test]
async fn test_rolling_update_replaces_one_pod_per_pass_from_the_top() {
    let h = converged(3).await;
    set_image(&h, "nginx:1.28");

    for expected in ["web-2", "web-1", "web-0"] {
        pass(&h).await.unwrap();
        let pod_mutations: Vec<_> = h
            .cluster
            .take_mutations()
            .into_iter()
            .filter(|m| matches!(m, Mutation::DeletePod(_) | Mutation::CreatePod(_)))
            .collect();
        assert_eq!(
            pod_mutations,
            vec![
                Mutation::DeletePod(expected.to_string()),
                Mutation::CreatePod(expected.to_string()),
            ]
        );
        assert_eq!(h.cluster.pod_image(expected).as_deref(), Some("nginx:1.28"));
    }

    pass(&h).await.unwrap();
    assert!(
        !h.cluster
            .take_mutations()
            .iter()
            .any(|m| matches!(m, Mutation::DeletePod(_)))
    );
    let replaced = h
        .events
        .reasons()
        .into_iter()
        .filter(|r| r == "RollingUpdate")
        .count();
    assert_eq!(replaced, 3);
}

#[tokio::test]
async fn test_selector_change_relabels_existing_pods() {
    let h = converged(3).await;
    h.cluster.update_spec("web", |spec| {
        let labels = BTreeMap::from([
            ("app".to_string(), "web".to_string()),
            ("tier".to_string(), "front".to_string()),
        ]);
        spec.selector.as_mut().unwrap().match_labels = Some(labels.clone());
        spec.template.metadata.as_mut().unwrap().labels = Some(labels);
    });

    for expected in ["web-2", "web-1", "web-0"] {
        pass(&h).await.unwrap();
        let pod_mutations: Vec<_> = h
            .cluster
            .take_mutations()
            .into_iter()
            .filter(|m| matches!(m, Mutation::DeletePod(_) | Mutation::CreatePod(_)))
            .collect();
        assert_eq!(
            pod_mutations,
            vec![
                Mutation::DeletePod(expected.to_string()),
                Mutation::CreatePod(expected.to_string()),
            ]
        );
    }

    for pod in ["web-0", "web-1", "web-2"] {
        let labels = h.cluster.pod(pod).unwrap().metadata.labels.unwrap();
        assert_eq!(labels.get("tier").map(String::as_str), Some("front"));
    }
    let status = h.cluster.workload("web").unwrap().status.unwrap();
    assert_eq!(status.observed_generation, Some(2));
    assert_eq!(status.current_replicas, 3);

    pass(&h).await.unwrap();
    assert!(
        !h.cluster
            .take_mutations()
            .iter()
            .any(|m| matches!(m, Mutation::DeletePod(_) | Mutation::CreatePod(_)))
    );
}

#[tokio::test]
async fn test_partition_protects_lower_ordinals() {
    let h = converged(3).await;
    h.cluster.update_spec("web", |spec| {
        spec.update_strategy = UpdateStrategy {
            type_: UpdateStrategyType::RollingUpdate,
            rolling_update: Some(RollingUpdateStrategy { partition: Some(2) }),
        };
    });
    set_image(&h, "nginx:1.28");

    pass(&h).await.unwrap();
    pass(&h).await.unwrap();

    assert_eq!(h.cluster.pod_image("web-2").as_deref(), Some("nginx:1.28"));
    assert_eq!(h.cluster.pod_image("web-1").as_deref(), Some("nginx:1.27"));
    assert_eq!(h.cluster.pod_image("web-0").as_deref(), Some("nginx:1.27"));
}

#[tokio::test]
async fn test_on_delete_never_replaces() {
    let h = converged(2).await;
    h.cluster.update_spec("web", |spec| {
        spec.update_strategy.type_ = UpdateStrategyType::OnDelete;
    });
    set_image(&h, "nginx:1.28");

    pass(&h).await.unwrap();

    assert!(
        !h.cluster
            .take_mutations()
            .iter()
            .any(|m| matches!(m, Mutation::DeletePod(_) | Mutation::CreatePod(_)))
    );
    assert_eq!(h.cluster.pod_image("web-1").as_deref(), Some("nginx:1.27"));
}

#[tokio::test(start_paused = true)]
async fn test_replacement_times_out_when_pod_never_leaves() {
    let h = converged(2).await;
    h.cluster.set_graceful_pod_deletion(true);
    set_image(&h, "nginx:1.28");

    let err = pass(&h).await.unwrap_err();

    assert!(matches!(err, Error::Timeout(_)), "unexpected error: {err}");
    assert!(err.is_retryable());
    // The old pod is terminating and was never recreated
    assert!(h.cluster.pod("web-1").unwrap().metadata.deletion_timestamp.is_some());
    assert_eq!(h.cluster.pod_image("web-1").as_deref(), Some("nginx:1.27"));
}

#[tokio::test(start_paused = true)]
async fn test_pass_deadline_aborts_wait() {
    let timings = ReconcileTimings {
        reconcile_deadline: Duration::from_secs(10),
        ..Default::default()
    };
    let h = Harness::with_timings(FakeCluster::with_workload(workload(1)), timings);
    pass(&h).await.unwrap();
    h.cluster.mark_all_ready();
    h.cluster.set_graceful_pod_deletion(true);
    set_image(&h, "nginx:1.28");

    let obj = Arc::new(h.cluster.workload("web").unwrap());
    let err = reconcile(obj, Arc::new(h.ctx.clone())).await.unwrap_err();

    assert!(matches!(err, Error::DeadlineExceeded(d) if d == Duration::from_secs(10)));
}

// ============================================================================
// Preconditions
// ============================================================================

#[tokio::test]
async fn test_invalid_spec_emits_warning_and_mutates_nothing() {
    let h = Harness::new(FakeCluster::with_workload(workload(-1)));

    let err = pass(&h).await.unwrap_err();

    assert!(matches!(err, Error::Validation(_)));
    assert!(!err.is_retryable());
    assert!(h.cluster.take_mutations().is_empty());
    let events = h.events.events();
    assert_eq!(events.len(), 1);
    assert!(events[0].warning);
    assert_eq!(events[0].reason, "ValidationFailed");
}

#[tokio::test]
async fn test_missing_service_stops_after_finalizer() {
    let cluster = FakeCluster::new();
    cluster.put_workload(workload(2));
    let h = Harness::new(cluster);

    let err = pass(&h).await.unwrap_err();

    assert!(matches!(err, Error::ServiceNotFound(ref s) if s == "web-headless"));
    assert_eq!(
        h.cluster.take_mutations(),
        vec![Mutation::AddFinalizer("web".to_string())]
    );
    assert!(h.cluster.pod_names().is_empty());
    let event = h
        .events
        .events()
        .into_iter()
        .find(|e| e.reason == "ServiceNotFound")
        .unwrap();
    assert!(event.warning);
    assert_eq!(event.action, "Reconcile");
    assert!(event.note.unwrap().contains("web-headless"));
}

#[tokio::test]
async fn test_missing_workload_waits_for_change() {
    let h = Harness::new(FakeCluster::new());

    assert_eq!(pass(&h).await.unwrap(), Action::await_change());
    assert!(h.cluster.take_mutations().is_empty());
}

#[tokio::test]
async fn test_finalizer_is_added_once() {
    let h = Harness::new(FakeCluster::with_workload(workload(1)));
    pass(&h).await.unwrap();
    pass(&h).await.unwrap();

    let added = h
        .cluster
        .take_mutations()
        .into_iter()
        .filter(|m| matches!(m, Mutation::AddFinalizer(_)))
        .count();
    assert_eq!(added, 1);
    assert_eq!(
        h.cluster.workload("web").unwrap().metadata.finalizers,
        Some(vec!["apps.statefulworkload.io/finalizer".to_string()])
    );
}

// ============================================================================
// Teardown
// ============================================================================

#[tokio::test]
async fn test_teardown_removes_pods_top_down_then_claims_then_finalizer() {
    let h = converged(2).await;
    h.cluster.request_deletion("web");

    let requeue = Action::requeue(Duration::from_secs(5));
    let mut steps = Vec::new();
    for _ in 0..4 {
        assert_eq!(pass(&h).await.unwrap(), requeue);
        steps.extend(h.cluster.take_mutations());
    }
    assert_eq!(
        steps,
        vec![
            Mutation::DeletePod("web-1".to_string()),
            Mutation::DeletePod("web-0".to_string()),
            Mutation::DeleteClaim("data-web-0".to_string()),
            Mutation::DeleteClaim("data-web-1".to_string()),
        ]
    );

    assert_eq!(pass(&h).await.unwrap(), Action::await_change());
    assert_eq!(
        h.cluster.take_mutations(),
        vec![Mutation::RemoveFinalizer("web".to_string())]
    );
    assert!(h.cluster.workload("web").is_none());

    assert_eq!(pass(&h).await.unwrap(), Action::await_change());
    assert!(h.events.reasons().contains(&"FinalizerRemoved".to_string()));
}

#[tokio::test]
async fn test_teardown_waits_for_terminating_pod() {
    let h = converged(2).await;
    h.cluster.set_graceful_pod_deletion(true);
    h.cluster.request_deletion("web");

    pass(&h).await.unwrap();
    assert_eq!(
        h.cluster.take_mutations(),
        vec![Mutation::DeletePod("web-1".to_string())]
    );

    // web-1 is still terminating, so web-0 is left alone
    pass(&h).await.unwrap();
    assert!(h.cluster.take_mutations().is_empty());
    assert_eq!(h.cluster.pod_names(), names(&["web-0", "web-1"]));
}
