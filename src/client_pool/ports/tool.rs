//! Execution of one-shot tool containers.

use super::ClientResult;
use crate::client_pool::domain::{ProcessLaunch, ToolOutput};
use async_trait::async_trait;

/// Runs a container engine command to completion and captures its output.
#[async_trait]
pub trait ToolRunner: Send + Sync {
    /// Runs `launch` and returns its standard output.
    ///
    /// A non-zero exit is reported through [`ToolOutput::is_error`]; only a
    /// command that cannot be run at all is an error.
    async fn run(&self, launch: &ProcessLaunch) -> ClientResult<ToolOutput>;
}
