//! Container engine double that keeps networks and containers in memory.

use crate::sandbox::ports::{
    ContainerEngine, ContainerEngineError, ContainerEngineResult, ContainerInspection,
    ContainerSpec, LogStream, NetworkSpec,
};
use async_trait::async_trait;
use futures::StreamExt;
use futures::stream;
use std::collections::{BTreeMap, BTreeSet};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

/// A state change observed by the in-memory engine, in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// A network was created.
    NetworkCreated(String),
    /// A network was removed.
    NetworkRemoved(String),
    /// An image was pulled.
    ImagePulled(String),
    /// A container was created and started.
    ContainerStarted(String),
    /// A container was stopped.
    ContainerStopped(String),
    /// A container was removed, explicitly or by auto-removal.
    ContainerRemoved(String),
}

/// In-memory container engine adapter.
///
/// Containers are "running" as soon as they start unless their name
/// matches a prefix registered with [`Self::never_run`]. Addresses are
/// handed out sequentially from `172.30.0.2`. Failures can be injected per
/// start attempt or per network name.
#[derive(Debug, Clone, Default)]
pub struct InMemoryContainerEngine {
    state: Arc<RwLock<EngineState>>,
}

#[derive(Debug, Default)]
struct EngineState {
    networks: BTreeMap<String, NetworkSpec>,
    containers: BTreeMap<String, ContainerRecord>,
    events: Vec<EngineEvent>,
    next_host: u8,
    start_attempts: usize,
    failing_starts: BTreeSet<usize>,
    half_created_starts: BTreeSet<usize>,
    failing_networks: Vec<String>,
    idle_prefixes: Vec<String>,
    seeded_logs: Vec<(String, Vec<String>)>,
}

#[derive(Debug, Clone)]
struct ContainerRecord {
    spec: ContainerSpec,
    running: bool,
    addresses: BTreeMap<String, IpAddr>,
}

impl EngineState {
    fn allocate_address(&mut self) -> IpAddr {
        self.next_host = self.next_host.saturating_add(1).max(2);
        IpAddr::V4(Ipv4Addr::new(172, 30, 0, self.next_host))
    }

    fn record(&mut self, event: EngineEvent) {
        self.events.push(event);
    }
}

impl InMemoryContainerEngine {
    /// Creates an empty engine.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read_state(&self) -> ContainerEngineResult<RwLockReadGuard<'_, EngineState>> {
        self.state
            .read()
            .map_err(|err| ContainerEngineError::runtime(std::io::Error::other(err.to_string())))
    }

    fn write_state(&self) -> ContainerEngineResult<RwLockWriteGuard<'_, EngineState>> {
        self.state
            .write()
            .map_err(|err| ContainerEngineError::runtime(std::io::Error::other(err.to_string())))
    }

    /// Makes the `attempt`-th container start (counting from one) fail.
    ///
    /// # Errors
    ///
    /// Returns engine runtime errors when lock acquisition fails.
    pub fn fail_container_start(&self, attempt: usize) -> ContainerEngineResult<()> {
        self.write_state()?.failing_starts.insert(attempt);
        Ok(())
    }

    /// Makes the `attempt`-th container start fail after the container was
    /// created, leaving it behind in the created state.
    ///
    /// # Errors
    ///
    /// Returns engine runtime errors when lock acquisition fails.
    pub fn fail_container_start_after_create(&self, attempt: usize) -> ContainerEngineResult<()> {
        self.write_state()?.half_created_starts.insert(attempt);
        Ok(())
    }

    /// Makes network creation fail for names containing `fragment`.
    ///
    /// # Errors
    ///
    /// Returns engine runtime errors when lock acquisition fails.
    pub fn fail_network_create(&self, fragment: impl Into<String>) -> ContainerEngineResult<()> {
        self.write_state()?.failing_networks.push(fragment.into());
        Ok(())
    }

    /// Keeps containers whose names start with `prefix` in the created
    /// state forever.
    ///
    /// # Errors
    ///
    /// Returns engine runtime errors when lock acquisition fails.
    pub fn never_run(&self, prefix: impl Into<String>) -> ContainerEngineResult<()> {
        self.write_state()?.idle_prefixes.push(prefix.into());
        Ok(())
    }

    /// Serves `lines` as the log of containers whose names start with
    /// `prefix`.
    ///
    /// # Errors
    ///
    /// Returns engine runtime errors when lock acquisition fails.
    pub fn seed_logs(
        &self,
        prefix: impl Into<String>,
        lines: Vec<String>,
    ) -> ContainerEngineResult<()> {
        self.write_state()?.seeded_logs.push((prefix.into(), lines));
        Ok(())
    }

    /// Creates a network directly, bypassing the event log.
    ///
    /// # Errors
    ///
    /// Returns engine runtime errors when lock acquisition fails.
    pub fn preexisting_network(&self, spec: NetworkSpec) -> ContainerEngineResult<()> {
        self.write_state()?.networks.insert(spec.name.clone(), spec);
        Ok(())
    }

    /// Returns the existing networks.
    ///
    /// # Errors
    ///
    /// Returns engine runtime errors when lock acquisition fails.
    pub fn networks(&self) -> ContainerEngineResult<Vec<NetworkSpec>> {
        Ok(self.read_state()?.networks.values().cloned().collect())
    }

    /// Returns the specs of existing containers, running or not.
    ///
    /// # Errors
    ///
    /// Returns engine runtime errors when lock acquisition fails.
    pub fn containers(&self) -> ContainerEngineResult<Vec<ContainerSpec>> {
        Ok(self
            .read_state()?
            .containers
            .values()
            .map(|record| record.spec.clone())
            .collect())
    }

    /// Returns whether the named container exists and runs.
    ///
    /// # Errors
    ///
    /// Returns engine runtime errors when lock acquisition fails.
    pub fn is_running(&self, name: &str) -> ContainerEngineResult<bool> {
        Ok(self
            .read_state()?
            .containers
            .get(name)
            .is_some_and(|record| record.running))
    }

    /// Returns every state change so far.
    ///
    /// # Errors
    ///
    /// Returns engine runtime errors when lock acquisition fails.
    pub fn events(&self) -> ContainerEngineResult<Vec<EngineEvent>> {
        Ok(self.read_state()?.events.clone())
    }
}

#[async_trait]
impl ContainerEngine for InMemoryContainerEngine {
    async fn create_network(&self, spec: &NetworkSpec) -> ContainerEngineResult<()> {
        let mut state = self.write_state()?;
        if state
            .failing_networks
            .iter()
            .any(|fragment| spec.name.contains(fragment.as_str()))
        {
            return Err(ContainerEngineError::runtime(std::io::Error::other(
                format!("injected failure creating network {}", spec.name),
            )));
        }
        if state.networks.contains_key(&spec.name) {
            return Err(ContainerEngineError::Conflict(spec.name.clone()));
        }
        state.networks.insert(spec.name.clone(), spec.clone());
        state.record(EngineEvent::NetworkCreated(spec.name.clone()));
        Ok(())
    }

    async fn remove_network(&self, name: &str) -> ContainerEngineResult<()> {
        let mut state = self.write_state()?;
        if !state.networks.contains_key(name) {
            return Err(ContainerEngineError::NotFound(name.to_owned()));
        }
        if state
            .containers
            .values()
            .any(|record| record.addresses.contains_key(name))
        {
            return Err(ContainerEngineError::runtime(std::io::Error::other(
                format!("network {name} has active endpoints"),
            )));
        }
        state.networks.remove(name);
        state.record(EngineEvent::NetworkRemoved(name.to_owned()));
        Ok(())
    }

    async fn pull_image(&self, image: &str) -> ContainerEngineResult<()> {
        self.write_state()?
            .record(EngineEvent::ImagePulled(image.to_owned()));
        Ok(())
    }

    async fn start_container(&self, spec: &ContainerSpec) -> ContainerEngineResult<()> {
        let mut state = self.write_state()?;
        state.start_attempts = state.start_attempts.saturating_add(1);
        let attempt = state.start_attempts;
        if state.failing_starts.contains(&attempt) {
            return Err(ContainerEngineError::runtime(std::io::Error::other(
                format!("injected failure starting container {}", spec.name),
            )));
        }
        if state.containers.contains_key(&spec.name) {
            return Err(ContainerEngineError::Conflict(spec.name.clone()));
        }
        if let Some(missing) = spec
            .networks
            .iter()
            .find(|network| !state.networks.contains_key(network.as_str()))
        {
            return Err(ContainerEngineError::NotFound(missing.clone()));
        }

        let mut addresses = BTreeMap::new();
        for network in &spec.networks {
            let address = state.allocate_address();
            addresses.insert(network.clone(), address);
        }
        if state.half_created_starts.contains(&attempt) {
            state.containers.insert(
                spec.name.clone(),
                ContainerRecord {
                    spec: spec.clone(),
                    running: false,
                    addresses,
                },
            );
            return Err(ContainerEngineError::runtime(std::io::Error::other(
                format!("injected failure starting created container {}", spec.name),
            )));
        }
        let running = !state
            .idle_prefixes
            .iter()
            .any(|prefix| spec.name.starts_with(prefix.as_str()));
        state.containers.insert(
            spec.name.clone(),
            ContainerRecord {
                spec: spec.clone(),
                running,
                addresses,
            },
        );
        state.record(EngineEvent::ContainerStarted(spec.name.clone()));
        Ok(())
    }

    async fn stop_container(&self, name: &str, _timeout: Duration) -> ContainerEngineResult<()> {
        let mut state = self.write_state()?;
        let auto_remove = {
            let record = state
                .containers
                .get_mut(name)
                .ok_or_else(|| ContainerEngineError::NotFound(name.to_owned()))?;
            record.running = false;
            record.spec.auto_remove
        };
        state.record(EngineEvent::ContainerStopped(name.to_owned()));
        if auto_remove {
            state.containers.remove(name);
            state.record(EngineEvent::ContainerRemoved(name.to_owned()));
        }
        Ok(())
    }

    async fn remove_container(&self, name: &str, force: bool) -> ContainerEngineResult<()> {
        let mut state = self.write_state()?;
        let running = state
            .containers
            .get(name)
            .ok_or_else(|| ContainerEngineError::NotFound(name.to_owned()))?
            .running;
        if running && !force {
            return Err(ContainerEngineError::Conflict(format!(
                "container {name} is running"
            )));
        }
        state.containers.remove(name);
        state.record(EngineEvent::ContainerRemoved(name.to_owned()));
        Ok(())
    }

    async fn inspect_container(&self, name: &str) -> ContainerEngineResult<ContainerInspection> {
        self.container_exists(name)
            .await?
            .ok_or_else(|| ContainerEngineError::NotFound(name.to_owned()))
    }

    async fn container_exists(
        &self,
        name: &str,
    ) -> ContainerEngineResult<Option<ContainerInspection>> {
        let state = self.read_state()?;
        Ok(state.containers.get(name).map(|record| ContainerInspection {
            running: record.running,
            addresses: record.addresses.clone(),
        }))
    }

    async fn read_logs(&self, name: &str, _follow: bool) -> ContainerEngineResult<LogStream> {
        let state = self.read_state()?;
        if !state.containers.contains_key(name) {
            return Err(ContainerEngineError::NotFound(name.to_owned()));
        }
        let lines = state
            .seeded_logs
            .iter()
            .find(|(prefix, _)| name.starts_with(prefix.as_str()))
            .map(|(_, lines)| lines.clone())
            .unwrap_or_default();
        Ok(stream::iter(lines.into_iter().map(Ok)).boxed())
    }
}
