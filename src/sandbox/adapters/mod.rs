//! Adapter implementations for the container engine port.

pub mod memory;

mod docker_cli;

pub use docker_cli::DockerCliEngine;
