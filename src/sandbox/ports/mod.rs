//! Port contracts for sandbox provisioning.

mod engine;

pub use engine::{
    ContainerEngine, ContainerEngineError, ContainerEngineResult, ContainerInspection,
    ContainerSpec, LogStream, NetworkSpec,
};
