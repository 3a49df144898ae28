//! Controller module for stateful-workload-operator.
//!
//! Contains the reconciliation loop and its components: validation, volume
//! claims, ordinal pod management, rolling updates, status aggregation and
//! finalizer-guarded teardown.

pub mod common;
pub mod context;
pub mod error;
pub mod pods;
pub mod reconciler;
pub mod rolling_update;
pub mod status;
pub mod teardown;
pub mod validation;
pub mod volume_claims;
pub mod wait;
