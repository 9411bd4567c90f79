//! Shared builders for client pool tests.

use std::sync::Arc;
use std::time::Duration;

use crate::client_pool::{
    adapters::memory::InMemoryProtocolConnector,
    domain::{ContainerLaunch, PoolOptions, ServerDescriptor, ServerName},
    services::ClientPool,
};
use crate::sandbox::{
    adapters::memory::InMemoryContainerEngine,
    services::{ReadinessPolicy, SandboxOrchestrator},
};
use chrono::{DateTime, Local, TimeZone, Utc};
use mockable::Clock;

pub(super) type TestPool = ClientPool<InMemoryContainerEngine, FixedClock>;

/// Clock pinned to one instant.
pub(super) struct FixedClock(pub(super) DateTime<Utc>);

impl Clock for FixedClock {
    fn local(&self) -> DateTime<Local> {
        self.0.with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        self.0
    }
}

pub(super) fn fixed_instant() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn server_name(value: &str) -> ServerName {
    ServerName::new(value).expect("valid server name")
}

pub(super) fn container_server(name: &str) -> ServerDescriptor {
    ServerDescriptor::container(
        server_name(name),
        ContainerLaunch::new(format!("mcp/{name}")).expect("valid image"),
    )
}

pub(super) struct PoolHarness {
    pub(super) pool: TestPool,
    pub(super) engine: Arc<InMemoryContainerEngine>,
    pub(super) connector: Arc<InMemoryProtocolConnector>,
}

pub(super) fn harness(options: PoolOptions) -> PoolHarness {
    let engine = Arc::new(InMemoryContainerEngine::new());
    let connector = Arc::new(InMemoryProtocolConnector::new());
    let orchestrator = SandboxOrchestrator::new(Arc::clone(&engine), options.sandbox.clone())
        .with_readiness(ReadinessPolicy::new(5, Duration::from_millis(1)));
    let pool = ClientPool::with_orchestrator(
        options,
        orchestrator,
        Arc::clone(&connector) as _,
        Arc::new(FixedClock(fixed_instant())),
    );
    PoolHarness {
        pool,
        engine,
        connector,
    }
}
