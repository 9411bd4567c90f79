//! Polling sidecars until the engine reports them running.

use super::SandboxError;
use crate::sandbox::ports::ContainerEngine;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

const DEFAULT_ATTEMPTS: u32 = 100;
const DEFAULT_INTERVAL: Duration = Duration::from_millis(10);

/// Retry budget for the readiness poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessPolicy {
    attempts: u32,
    interval: Duration,
}

impl ReadinessPolicy {
    /// Creates a policy polling `attempts` times, `interval` apart.
    #[must_use]
    pub const fn new(attempts: u32, interval: Duration) -> Self {
        Self { attempts, interval }
    }

    /// Returns the number of polls before giving up.
    #[must_use]
    pub const fn attempts(self) -> u32 {
        self.attempts
    }

    /// Returns the pause between polls.
    #[must_use]
    pub const fn interval(self) -> Duration {
        self.interval
    }
}

impl Default for ReadinessPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_ATTEMPTS, DEFAULT_INTERVAL)
    }
}

/// Polls one container until it runs or the budget is spent.
pub(super) async fn wait_for_running<E>(
    engine: &E,
    name: &str,
    policy: ReadinessPolicy,
) -> Result<(), SandboxError>
where
    E: ContainerEngine + ?Sized,
{
    let mut last_error = SandboxError::NotRunning(name.to_owned());
    for _ in 0..policy.attempts {
        match engine.container_exists(name).await {
            Ok(Some(inspection)) if inspection.running => return Ok(()),
            Ok(_) => last_error = SandboxError::NotRunning(name.to_owned()),
            Err(source) => {
                last_error = SandboxError::Readiness {
                    name: name.to_owned(),
                    source,
                };
            }
        }
        tokio::time::sleep(policy.interval).await;
    }
    Err(last_error)
}

/// Polls every container concurrently, one task each, failing fast.
pub(super) async fn wait_all_running<E>(
    engine: &Arc<E>,
    names: &[String],
    policy: ReadinessPolicy,
) -> Result<(), SandboxError>
where
    E: ContainerEngine + 'static,
{
    let mut polls = JoinSet::new();
    for name in names {
        let task_engine = Arc::clone(engine);
        let task_name = name.clone();
        polls.spawn(async move { wait_for_running(&*task_engine, &task_name, policy).await });
    }

    while let Some(joined) = polls.join_next().await {
        let outcome = joined.map_err(|err| SandboxError::ReadinessAborted(err.to_string()));
        if let Err(err) = outcome.and_then(|polled| polled) {
            polls.abort_all();
            return Err(err);
        }
    }
    Ok(())
}
