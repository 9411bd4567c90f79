//! Shared builders for in-memory integration tests.

use std::sync::Arc;
use std::time::Duration;

use mockable::DefaultClock;
use toolgate::client_pool::{
    adapters::memory::InMemoryProtocolConnector,
    domain::{BackendTransport, ContainerLaunch, PoolOptions, ServerDescriptor, ServerName},
    services::ClientPool,
};
use toolgate::sandbox::{
    adapters::memory::InMemoryContainerEngine,
    domain::SandboxOptions,
    services::{ReadinessPolicy, SandboxOrchestrator},
};

/// Pool type used by the in-memory integration tests.
pub type TestPool = ClientPool<InMemoryContainerEngine, DefaultClock>;

/// A pool together with the doubles it drives.
pub struct Gateway {
    pub pool: TestPool,
    pub engine: Arc<InMemoryContainerEngine>,
    pub connector: Arc<InMemoryProtocolConnector>,
}

/// Short readiness budget so failing scenarios finish quickly.
#[must_use]
pub fn fast_readiness() -> ReadinessPolicy {
    ReadinessPolicy::new(5, Duration::from_millis(1))
}

/// Builds a gateway pool over fresh in-memory doubles.
#[must_use]
pub fn gateway(options: PoolOptions) -> Gateway {
    let engine = Arc::new(InMemoryContainerEngine::new());
    let connector = Arc::new(InMemoryProtocolConnector::new());
    let orchestrator = SandboxOrchestrator::new(Arc::clone(&engine), options.sandbox.clone())
        .with_readiness(fast_readiness());
    let pool = ClientPool::with_orchestrator(
        options,
        orchestrator,
        Arc::clone(&connector) as _,
        Arc::new(DefaultClock),
    );
    Gateway {
        pool,
        engine,
        connector,
    }
}

/// Builds a sandbox orchestrator over `engine`.
#[must_use]
pub fn orchestrator(
    engine: &Arc<InMemoryContainerEngine>,
    options: SandboxOptions,
) -> SandboxOrchestrator<InMemoryContainerEngine> {
    SandboxOrchestrator::new(Arc::clone(engine), options).with_readiness(fast_readiness())
}

/// Describes a container-backed server running `mcp/<name>`.
#[must_use]
pub fn container_server(name: &str) -> ServerDescriptor {
    ServerDescriptor::container(
        ServerName::new(name).expect("valid server name"),
        ContainerLaunch::new(format!("mcp/{name}")).expect("valid image"),
    )
}

/// Returns the `docker run` arguments of the first connection to `name`.
#[must_use]
pub fn launch_args(connector: &InMemoryProtocolConnector, name: &str) -> Vec<String> {
    let server = ServerName::new(name).expect("valid server name");
    let connections = connector.connections().expect("connector state");
    let record = connections
        .iter()
        .find(|record| record.server == server)
        .expect("server should have connected");
    match &record.transport {
        BackendTransport::ChildProcess(launch) => launch.args.clone(),
        other => panic!("expected a container launch, got {other:?}"),
    }
}

/// Returns the value following `flag` for each of its occurrences.
#[must_use]
pub fn flag_values<'a>(args: &'a [String], flag: &str) -> Vec<&'a str> {
    args.windows(2)
        .filter_map(|pair| match pair {
            [name, value] if name == flag => Some(value.as_str()),
            _ => None,
        })
        .collect()
}
