//! Container runtime client.
//!
//! Every domain module in `core` that needs to create, start, stop, or
//! inspect a VM's backing container goes through the [`client::docker::DockerOps`]
//! trait. `client::live` implements it against a real Docker daemon via
//! `docker::client::DockerClient` (Bollard); `client::fake` implements it
//! in-memory so the emulator runs end to end with no daemon available.

pub mod client;
pub mod docker;

pub use client::docker::DockerOps;
pub use client::fake::FakeDocker;
pub use docker::client::{DockerClient, DockerError};
pub use docker::inventory::ContainerInfo;
