//! One-shot tool containers.

use super::{ContainerLaunch, ServerName};

/// A tool answered by running a container once per call.
///
/// Volumes and the command may hold templates, which are evaluated against
/// the call arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolContainer {
    name: ServerName,
    launch: ContainerLaunch,
}

impl ToolContainer {
    /// Creates a tool backed by `launch`.
    #[must_use]
    pub const fn new(name: ServerName, launch: ContainerLaunch) -> Self {
        Self { name, launch }
    }

    /// Returns the tool name.
    #[must_use]
    pub const fn name(&self) -> &ServerName {
        &self.name
    }

    /// Returns the container to run.
    #[must_use]
    pub const fn launch(&self) -> &ContainerLaunch {
        &self.launch
    }
}

/// Result of one tool container run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// Captured standard output.
    pub text: String,
    /// Whether the container exited unsuccessfully.
    pub is_error: bool,
}
