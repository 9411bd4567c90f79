//! Tool runner double that records launches.

use crate::client_pool::{
    domain::{ProcessLaunch, ToolOutput},
    ports::{ClientError, ClientResult, ToolRunner},
};
use async_trait::async_trait;
use std::sync::{Arc, RwLock};

#[derive(Debug, Default)]
struct RunnerState {
    launches: Vec<ProcessLaunch>,
    output: Option<ToolOutput>,
}

/// Records every tool launch and answers with a configured output.
///
/// Without a configured output each run succeeds with empty text.
#[derive(Debug, Clone, Default)]
pub struct InMemoryToolRunner {
    state: Arc<RwLock<RunnerState>>,
}

fn poisoned(err: impl std::fmt::Display) -> ClientError {
    ClientError::protocol(std::io::Error::other(err.to_string()))
}

impl InMemoryToolRunner {
    /// Creates a runner with no recorded launches.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers every later run with `output`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Protocol`] when lock acquisition fails.
    pub fn respond(&self, output: ToolOutput) -> ClientResult<()> {
        self.state.write().map_err(poisoned)?.output = Some(output);
        Ok(())
    }

    /// Returns the launches seen so far, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Protocol`] when lock acquisition fails.
    pub fn launches(&self) -> ClientResult<Vec<ProcessLaunch>> {
        Ok(self.state.read().map_err(poisoned)?.launches.clone())
    }
}

#[async_trait]
impl ToolRunner for InMemoryToolRunner {
    async fn run(&self, launch: &ProcessLaunch) -> ClientResult<ToolOutput> {
        let mut state = self.state.write().map_err(poisoned)?;
        state.launches.push(launch.clone());
        Ok(state.output.clone().unwrap_or_default())
    }
}
