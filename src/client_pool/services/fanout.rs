//! Bounded fan-out of one request across many backends.

use super::ClientPool;
use crate::client_pool::domain::{ServerDescriptor, ServerName, SessionConfig};
use crate::sandbox::ports::ContainerEngine;
use futures::stream::{self, StreamExt};
use mockable::Clock;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::warn;

/// One backend's answer.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendResponse {
    /// Backend that answered.
    pub server: ServerName,
    /// Response payload.
    pub result: serde_json::Value,
}

/// Sends a request to every enabled backend through the pool.
///
/// At most `parallelism` backends are contacted at once, by default the
/// host's CPU count. A backend that cannot be acquired or that fails the
/// request is logged and left out of the result.
pub struct CapabilityFanout<E, C>
where
    E: ContainerEngine + 'static,
    C: Clock + Send + Sync,
{
    pool: Arc<ClientPool<E, C>>,
    parallelism: usize,
}

impl<E, C> CapabilityFanout<E, C>
where
    E: ContainerEngine + 'static,
    C: Clock + Send + Sync,
{
    /// Creates a fan-out bounded by the available parallelism.
    #[must_use]
    pub fn new(pool: Arc<ClientPool<E, C>>) -> Self {
        let parallelism = std::thread::available_parallelism().map_or(1, NonZeroUsize::get);
        Self { pool, parallelism }
    }

    /// Overrides the concurrency bound; zero is treated as one.
    #[must_use]
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism.max(1);
        self
    }

    /// Returns the concurrency bound.
    #[must_use]
    pub const fn parallelism(&self) -> usize {
        self.parallelism
    }

    /// Sends `method` with `params` to each server in `servers`.
    ///
    /// Responses arrive in completion order.
    pub async fn request_all(
        &self,
        servers: &[ServerDescriptor],
        session: SessionConfig,
        method: &str,
        params: &serde_json::Value,
    ) -> Vec<BackendResponse> {
        stream::iter(servers)
            .map(|descriptor| self.request_one(descriptor, session, method, params))
            .buffer_unordered(self.parallelism)
            .filter_map(|response| async move { response })
            .collect()
            .await
    }

    async fn request_one(
        &self,
        descriptor: &ServerDescriptor,
        session: SessionConfig,
        method: &str,
        params: &serde_json::Value,
    ) -> Option<BackendResponse> {
        let client = match self.pool.acquire(descriptor, session).await {
            Ok(client) => client,
            Err(err) => {
                warn!(server = %descriptor.name(), error = %err, "skipping unavailable backend");
                return None;
            }
        };

        let outcome = match client.session() {
            Ok(live) => live.request(method, params.clone()).await,
            Err(err) => Err(err),
        };
        if let Err(err) = self.pool.release(&client).await {
            warn!(server = %descriptor.name(), error = %err, "releasing backend failed");
        }

        match outcome {
            Ok(result) => Some(BackendResponse {
                server: descriptor.name().clone(),
                result,
            }),
            Err(err) => {
                warn!(server = %descriptor.name(), method, error = %err, "backend request failed");
                None
            }
        }
    }
}
