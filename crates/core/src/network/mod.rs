//! Networking control plane (spec.md §4.3): per-project IP allocation,
//! firewall rule metadata, and networks/subnets/routes/routers/addresses.

pub mod allocator;
pub mod firewall;
pub mod records;
