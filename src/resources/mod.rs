//! Resource generation module.
//!
//! Pure builders for the Kubernetes objects owned by a StatefulWorkload.
//!
//! ## Resources Generated
//!
//! | Resource | Name | Purpose |
//! |----------|------|---------|
//! | Pod | `<workload>-<ordinal>` | One replica per ordinal with a stable hostname |
//! | PersistentVolumeClaim | `<volume>-<workload>-<ordinal>` | Per-replica storage, retained across scale-down |

pub mod claim;
pub mod common;
pub mod pod;

// Re-export commonly used items
pub use claim::{claim_name, claim_volume_name, generate_claim};
pub use common::{WORKLOAD_LABEL, owner_reference, workload_label};
pub use pod::{generate_pod, parse_ordinal, pod_name, pod_ordinal};
