//! Pool-wide options.

use crate::sandbox::domain::SandboxOptions;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_INIT_TIMEOUT_MS: u64 = 20_000;

const ENV_IN_DIND: &str = "TOOLGATE_IN_DIND";
const ENV_KEEP_CONTAINERS: &str = "TOOLGATE_KEEP_CONTAINERS";
const ENV_DEBUG_DNS: &str = "TOOLGATE_DEBUG_DNS";
const ENV_LONG_LIVED: &str = "TOOLGATE_LONG_LIVED";

/// Options shared by every connection the pool creates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolOptions {
    /// Keep every session-scoped connection, not only long-lived servers.
    pub long_lived: bool,
    /// Reach container-backed servers through their always-on companion.
    pub static_mode: bool,
    /// CPU limit for backend containers; zero means unlimited.
    pub cpus: u32,
    /// Memory limit for backend containers.
    pub memory: Option<String>,
    /// Networks the gateway shares with backend containers.
    pub networks: Vec<String>,
    /// Run backend containers privileged, for docker-in-docker.
    pub in_dind: bool,
    /// Forward backend stderr.
    pub verbose: bool,
    /// Handshake deadline in milliseconds.
    pub init_timeout_ms: u64,
    /// Sandbox debug switches and images.
    pub sandbox: SandboxOptions,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            long_lived: false,
            static_mode: false,
            cpus: 0,
            memory: None,
            networks: Vec::new(),
            in_dind: false,
            verbose: false,
            init_timeout_ms: DEFAULT_INIT_TIMEOUT_MS,
            sandbox: SandboxOptions::default(),
        }
    }
}

impl PoolOptions {
    /// Returns the handshake deadline.
    #[must_use]
    pub const fn init_timeout(&self) -> Duration {
        Duration::from_millis(self.init_timeout_ms)
    }

    /// Builds options from the process environment on top of the defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().apply_env(|key| std::env::var(key).ok())
    }

    /// Applies `TOOLGATE_*` switches read through `lookup`.
    ///
    /// A switch is on when its value is exactly `1`.
    #[must_use]
    pub fn apply_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let enabled = |key: &str| lookup(key).is_some_and(|value| value == "1");
        if enabled(ENV_IN_DIND) {
            self.in_dind = true;
        }
        if enabled(ENV_KEEP_CONTAINERS) {
            self.sandbox.keep_containers = true;
        }
        if enabled(ENV_DEBUG_DNS) {
            self.sandbox.debug_dns = true;
        }
        if enabled(ENV_LONG_LIVED) {
            self.long_lived = true;
        }
        self
    }
}
