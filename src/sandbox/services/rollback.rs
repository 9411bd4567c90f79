//! Ordered undo log for partially provisioned sandboxes.

use crate::sandbox::ports::{ContainerEngine, ContainerEngineError};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A resource created by the current provisioning attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum Provisioned {
    Network(String),
    Container(String),
}

/// Records what a provisioning attempt created so that a failure can undo
/// it in reverse order.
///
/// Dropping a rollback that was neither committed nor unwound (the
/// provisioning future was cancelled) schedules the undo on the current
/// runtime.
pub(super) struct Rollback<E: ContainerEngine + 'static> {
    engine: Arc<E>,
    provisioned: Vec<Provisioned>,
    keep_containers: bool,
}

impl<E: ContainerEngine + 'static> Rollback<E> {
    pub(super) fn new(engine: Arc<E>, keep_containers: bool) -> Self {
        Self {
            engine,
            provisioned: Vec::new(),
            keep_containers,
        }
    }

    pub(super) fn track_network(&mut self, name: &str) {
        self.provisioned.push(Provisioned::Network(name.to_owned()));
    }

    pub(super) fn track_container(&mut self, name: &str) {
        self.provisioned
            .push(Provisioned::Container(name.to_owned()));
    }

    /// Hands the recorded resources over to their long-term owner.
    pub(super) fn commit(mut self) -> Vec<Provisioned> {
        std::mem::take(&mut self.provisioned)
    }

    /// Removes everything recorded so far, newest first.
    pub(super) async fn unwind(mut self) {
        let provisioned = std::mem::take(&mut self.provisioned);
        if self.keep_containers {
            info!(
                resources = provisioned.len(),
                "keeping partially provisioned sandbox for inspection"
            );
            return;
        }
        undo(&*self.engine, provisioned).await;
    }
}

impl<E: ContainerEngine + 'static> Drop for Rollback<E> {
    fn drop(&mut self) {
        if self.provisioned.is_empty() || self.keep_containers {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(
                resources = self.provisioned.len(),
                "sandbox provisioning abandoned outside a runtime; resources leaked"
            );
            return;
        };
        let engine = Arc::clone(&self.engine);
        let provisioned = std::mem::take(&mut self.provisioned);
        runtime.spawn(async move { undo(&*engine, provisioned).await });
    }
}

async fn undo<E: ContainerEngine + ?Sized>(engine: &E, provisioned: Vec<Provisioned>) {
    for resource in provisioned.into_iter().rev() {
        match resource {
            Provisioned::Container(name) => {
                match engine.remove_container(&name, true).await {
                    Ok(()) => {}
                    Err(ContainerEngineError::NotFound(_)) => {
                        debug!(container = %name, "proxy container was never created");
                    }
                    Err(err) => {
                        warn!(container = %name, error = %err, "failed to remove proxy container");
                    }
                }
            }
            Provisioned::Network(name) => {
                if let Err(err) = engine.remove_network(&name).await {
                    warn!(network = %name, error = %err, "failed to remove network");
                }
            }
        }
    }
}
