//! Tool runner that executes the container engine CLI.

use crate::client_pool::{
    domain::{ProcessLaunch, ToolOutput},
    ports::{ClientError, ClientResult, ToolRunner},
};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Runs tool containers as child processes and waits for them to exit.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessToolRunner;

#[async_trait]
impl ToolRunner for ProcessToolRunner {
    async fn run(&self, launch: &ProcessLaunch) -> ClientResult<ToolOutput> {
        debug!(program = %launch.program, args = ?launch.args, "running tool container");
        let output = Command::new(&launch.program)
            .args(&launch.args)
            .envs(launch.env.iter().filter_map(|entry| entry.split_once('=')))
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(ClientError::protocol)?;
        Ok(ToolOutput {
            text: String::from_utf8_lossy(&output.stdout).into_owned(),
            is_error: !output.status.success(),
        })
    }
}
