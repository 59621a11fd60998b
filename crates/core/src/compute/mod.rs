//! Compute control plane (spec.md §4.2): VM instances backed by containers,
//! the machine-type catalogue, and the background reconciler.

pub mod instance;
pub mod machine_type;
pub mod reconciler;
