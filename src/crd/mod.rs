//! Custom Resource Definitions (CRDs) for stateful-workload-operator.
//!
//! - `StatefulWorkload`: ordered, identity-preserving replicas with per-replica storage

mod stateful_workload;

pub use stateful_workload::*;
