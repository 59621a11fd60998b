//! The `DockerOps` trait and its live/fake implementations.

pub mod docker;
pub mod error;
pub mod fake;
pub mod live;
