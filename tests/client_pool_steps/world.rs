//! Shared world state for client pool BDD scenarios.

use std::sync::Arc;
use std::time::Duration;

use mockable::DefaultClock;
use rstest::fixture;
use toolgate::client_pool::{
    adapters::memory::InMemoryProtocolConnector,
    domain::{PoolOptions, ServerDescriptor, SessionConfig},
    ports::BackendClient,
    services::{ClientPool, ClientPoolError},
};
use toolgate::sandbox::{
    adapters::memory::InMemoryContainerEngine,
    services::{ReadinessPolicy, SandboxOrchestrator},
};

/// Pool type used by the BDD world.
pub type TestPool = ClientPool<InMemoryContainerEngine, DefaultClock>;

/// Scenario world for client pool behaviour tests.
pub struct PoolWorld {
    pub pool: TestPool,
    pub engine: Arc<InMemoryContainerEngine>,
    pub connector: Arc<InMemoryProtocolConnector>,
    pub descriptor: Option<ServerDescriptor>,
    pub session: SessionConfig,
    pub acquired: Vec<Arc<dyn BackendClient>>,
    pub last_outcome: Option<Result<Arc<dyn BackendClient>, ClientPoolError>>,
}

impl PoolWorld {
    /// Creates a world around an empty pool.
    #[must_use]
    pub fn new() -> Self {
        let options = PoolOptions::default();
        let engine = Arc::new(InMemoryContainerEngine::new());
        let connector = Arc::new(InMemoryProtocolConnector::new());
        let orchestrator = SandboxOrchestrator::new(Arc::clone(&engine), options.sandbox.clone())
            .with_readiness(ReadinessPolicy::new(5, Duration::from_millis(1)));
        let pool = ClientPool::with_orchestrator(
            options,
            orchestrator,
            Arc::clone(&connector) as _,
            Arc::new(DefaultClock),
        );

        Self {
            pool,
            engine,
            connector,
            descriptor: None,
            session: SessionConfig::anonymous(),
            acquired: Vec::new(),
            last_outcome: None,
        }
    }

    /// Returns the server under test.
    pub fn descriptor(&self) -> Result<&ServerDescriptor, eyre::Report> {
        self.descriptor
            .as_ref()
            .ok_or_else(|| eyre::eyre!("missing server descriptor in scenario world"))
    }
}

impl Default for PoolWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixture that creates a new scenario world.
#[fixture]
pub fn world() -> PoolWorld {
    PoolWorld::default()
}

/// Runs an async operation within sync step definitions.
pub fn run_async<T>(future: impl std::future::Future<Output = T>) -> T {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}
