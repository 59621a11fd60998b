//! Bollard-backed Docker domain: client, containers, images, networks.

pub mod client;
pub mod container;
pub mod image;
pub mod inventory;
pub mod network;
