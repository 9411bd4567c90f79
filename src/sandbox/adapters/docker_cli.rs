//! Container engine adapter driving the `docker` command-line client.

use crate::sandbox::ports::{
    ContainerEngine, ContainerEngineError, ContainerEngineResult, ContainerInspection,
    ContainerSpec, LogStream, NetworkSpec,
};
use async_trait::async_trait;
use futures::StreamExt;
use futures::stream;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::debug;

const DEFAULT_BINARY: &str = "docker";

/// Container engine backed by the `docker` CLI.
///
/// Each port call runs one or more CLI invocations. Failures are classified
/// from stderr: "No such ..." becomes [`ContainerEngineError::NotFound`] and
/// "already exists"/"already in use" becomes
/// [`ContainerEngineError::Conflict`].
#[derive(Debug, Clone)]
pub struct DockerCliEngine {
    binary: String,
}

impl Default for DockerCliEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl DockerCliEngine {
    /// Creates an engine invoking `docker` from `PATH`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            binary: DEFAULT_BINARY.to_owned(),
        }
    }

    /// Uses a different CLI binary, such as `podman`.
    #[must_use]
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    async fn run(&self, args: &[String]) -> ContainerEngineResult<String> {
        debug!(binary = %self.binary, args = ?args, "running container engine command");
        let output = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(ContainerEngineError::runtime)?;
        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
        }
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_owned();
        Err(classify_failure(&stderr))
    }
}

fn classify_failure(stderr: &str) -> ContainerEngineError {
    let lowered = stderr.to_ascii_lowercase();
    if names_missing_object(&lowered) {
        ContainerEngineError::NotFound(stderr.to_owned())
    } else if lowered.contains("already exists") || lowered.contains("already in use") {
        ContainerEngineError::Conflict(stderr.to_owned())
    } else {
        ContainerEngineError::runtime(std::io::Error::other(stderr.to_owned()))
    }
}

/// Matches docker's "No such container/network/image" replies and the
/// daemon's "network <name> not found".
fn names_missing_object(lowered: &str) -> bool {
    ["no such container", "no such network", "no such image", "no such object"]
        .iter()
        .any(|phrase| lowered.contains(phrase))
        || lowered
            .split_once("error response from daemon: network ")
            .is_some_and(|(_, rest)| rest.ends_with(" not found"))
}

fn label_args(labels: &BTreeMap<String, String>) -> impl Iterator<Item = String> + '_ {
    labels
        .iter()
        .flat_map(|(key, value)| ["--label".to_owned(), format!("{key}={value}")])
}

fn owned(args: &[&str]) -> Vec<String> {
    args.iter().map(|arg| (*arg).to_owned()).collect()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectRecord {
    state: InspectState,
    network_settings: InspectNetworkSettings,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectState {
    running: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectNetworkSettings {
    #[serde(default)]
    networks: BTreeMap<String, InspectEndpoint>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectEndpoint {
    #[serde(rename = "IPAddress", default)]
    ip_address: String,
}

fn parse_inspection(name: &str, json: &str) -> ContainerEngineResult<ContainerInspection> {
    let records: Vec<InspectRecord> =
        serde_json::from_str(json).map_err(ContainerEngineError::runtime)?;
    let record = records
        .into_iter()
        .next()
        .ok_or_else(|| ContainerEngineError::NotFound(name.to_owned()))?;
    let addresses = record
        .network_settings
        .networks
        .into_iter()
        .filter_map(|(network, endpoint)| {
            endpoint
                .ip_address
                .parse::<IpAddr>()
                .ok()
                .map(|address| (network, address))
        })
        .collect();
    Ok(ContainerInspection {
        running: record.state.running,
        addresses,
    })
}

#[async_trait]
impl ContainerEngine for DockerCliEngine {
    async fn create_network(&self, spec: &NetworkSpec) -> ContainerEngineResult<()> {
        let mut args = owned(&["network", "create"]);
        if spec.internal {
            args.push("--internal".to_owned());
        }
        args.extend(label_args(&spec.labels));
        args.push(spec.name.clone());
        self.run(&args).await.map(drop)
    }

    async fn remove_network(&self, name: &str) -> ContainerEngineResult<()> {
        self.run(&owned(&["network", "rm", name])).await.map(drop)
    }

    async fn pull_image(&self, image: &str) -> ContainerEngineResult<()> {
        match self.run(&owned(&["image", "inspect", image])).await {
            Ok(_) => Ok(()),
            Err(err) if err.is_not_found() => {
                self.run(&owned(&["pull", "--quiet", image])).await.map(drop)
            }
            Err(err) => Err(err),
        }
    }

    async fn start_container(&self, spec: &ContainerSpec) -> ContainerEngineResult<()> {
        let mut networks = spec.networks.iter();
        let mut args = owned(&["create", "--name", spec.name.as_str()]);
        if spec.auto_remove {
            args.push("--rm".to_owned());
        }
        if let Some(primary) = networks.next() {
            args.extend(["--network".to_owned(), primary.clone()]);
        }
        for entry in &spec.env {
            args.extend(["-e".to_owned(), entry.clone()]);
        }
        args.extend(label_args(&spec.labels));
        args.push(spec.image.clone());
        self.run(&args).await?;

        for network in networks {
            self.run(&owned(&["network", "connect", network.as_str(), spec.name.as_str()]))
                .await?;
        }
        self.run(&owned(&["start", spec.name.as_str()])).await.map(drop)
    }

    async fn stop_container(&self, name: &str, timeout: Duration) -> ContainerEngineResult<()> {
        let seconds = timeout.as_secs().to_string();
        self.run(&owned(&["stop", "--time", seconds.as_str(), name]))
            .await
            .map(drop)
    }

    async fn remove_container(&self, name: &str, force: bool) -> ContainerEngineResult<()> {
        let mut args = owned(&["rm"]);
        if force {
            args.push("--force".to_owned());
        }
        args.push(name.to_owned());
        self.run(&args).await.map(drop)
    }

    async fn inspect_container(&self, name: &str) -> ContainerEngineResult<ContainerInspection> {
        let json = self
            .run(&owned(&["container", "inspect", name]))
            .await?;
        parse_inspection(name, &json)
    }

    async fn container_exists(
        &self,
        name: &str,
    ) -> ContainerEngineResult<Option<ContainerInspection>> {
        match self.inspect_container(name).await {
            Ok(inspection) => Ok(Some(inspection)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn read_logs(&self, name: &str, follow: bool) -> ContainerEngineResult<LogStream> {
        let mut command = Command::new(&self.binary);
        command.arg("logs");
        if follow {
            command.arg("--follow");
        }
        let mut child = command
            .arg(name)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(ContainerEngineError::runtime)?;
        let stdout = child.stdout.take().ok_or_else(|| {
            ContainerEngineError::runtime(std::io::Error::other("missing stdout pipe"))
        })?;

        // The child rides along in the stream state so dropping the stream
        // kills the `logs` process.
        let lines = BufReader::new(stdout).lines();
        let stream = stream::unfold((child, lines), |(process, mut reader)| async move {
            match reader.next_line().await {
                Ok(Some(line)) => Some((Ok(line), (process, reader))),
                Ok(None) => None,
                Err(err) => Some((Err(ContainerEngineError::runtime(err)), (process, reader))),
            }
        });
        Ok(stream.boxed())
    }
}
