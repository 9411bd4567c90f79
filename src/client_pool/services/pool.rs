//! The backend client pool.

use super::factory::ClientFactory;
use super::getter::ClientGetter;
use super::{ClientPoolError, ContainerLaunchPlan};
use crate::client_pool::{
    domain::{
        ClientKey, PoolOptions, Root, ServerDescriptor, SessionConfig, SessionId, ToolContainer,
        ToolOutput,
    },
    ports::{BackendClient, ProtocolConnector, TokenSource, ToolRunner},
};
use crate::sandbox::{ports::ContainerEngine, services::SandboxOrchestrator};
use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use mockable::Clock;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

type EntryMap<E> = HashMap<ClientKey, PoolEntry<E>>;

type SharedCreation = Shared<BoxFuture<'static, Result<Arc<dyn BackendClient>, ClientPoolError>>>;

struct PoolEntry<E: ContainerEngine + 'static> {
    getter: Arc<ClientGetter<E>>,
    creation: SharedCreation,
    created_at: DateTime<Utc>,
}

/// Diagnostics snapshot of one kept connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeptEntry {
    /// Pool slot.
    pub key: ClientKey,
    /// When the entry was registered.
    pub created_at: DateTime<Utc>,
    /// Whether the client finished initializing successfully.
    pub ready: bool,
}

/// Caches backend connections per `(server, session)` and manages their
/// lifetime.
///
/// Connections to long-lived servers, or to every server when the pool
/// keeps everything, are shared between the calls of one session. All
/// other acquisitions create a fresh client that [`ClientPool::release`]
/// closes again.
pub struct ClientPool<E, C>
where
    E: ContainerEngine + 'static,
    C: Clock + Send + Sync,
{
    entries: Arc<RwLock<EntryMap<E>>>,
    factory: Arc<ClientFactory<E>>,
    clock: Arc<C>,
}

impl<E, C> ClientPool<E, C>
where
    E: ContainerEngine + 'static,
    C: Clock + Send + Sync,
{
    /// Creates a pool whose sandboxes run on `engine`.
    #[must_use]
    pub fn new(
        options: PoolOptions,
        engine: Arc<E>,
        connector: Arc<dyn ProtocolConnector>,
        clock: Arc<C>,
    ) -> Self {
        let orchestrator = SandboxOrchestrator::new(engine, options.sandbox.clone());
        Self::with_orchestrator(options, orchestrator, connector, clock)
    }

    /// Creates a pool using a preconfigured sandbox orchestrator.
    #[must_use]
    pub fn with_orchestrator(
        options: PoolOptions,
        orchestrator: SandboxOrchestrator<E>,
        connector: Arc<dyn ProtocolConnector>,
        clock: Arc<C>,
    ) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            factory: Arc::new(ClientFactory::new(options, orchestrator, connector)),
            clock,
        }
    }

    /// Returns the pool options.
    #[must_use]
    pub fn options(&self) -> &PoolOptions {
        self.factory.options()
    }

    /// Replaces the networks shared between the gateway and its backends.
    ///
    /// Applies to clients created afterwards.
    pub fn set_networks(&self, networks: Vec<String>) {
        self.factory.set_networks(networks);
    }

    /// Returns the networks shared between the gateway and its backends.
    #[must_use]
    pub fn networks(&self) -> Vec<String> {
        self.factory.networks()
    }

    /// Replaces how one-shot tool containers are run.
    pub fn set_tool_runner(&self, tool_runner: Arc<dyn ToolRunner>) {
        self.factory.set_tool_runner(tool_runner);
    }

    /// Runs `tool` once for a call with `arguments` and returns its output.
    ///
    /// The container is not pooled: it joins the gateway networks, runs to
    /// completion and is removed by the engine. A non-zero exit comes back
    /// as an error output carrying whatever the tool printed.
    ///
    /// # Errors
    ///
    /// Returns [`ClientPoolError::Template`] when a volume or command
    /// template fails, and [`ClientPoolError::ToolRun`] when the container
    /// cannot be run at all.
    pub async fn run_tool_container(
        &self,
        tool: &ToolContainer,
        arguments: &serde_json::Value,
    ) -> Result<ToolOutput, ClientPoolError> {
        let plan = ContainerLaunchPlan::compose_tool(
            tool,
            self.options(),
            &self.networks(),
            arguments,
            self.factory.renderer(),
        )?;
        info!(tool = %tool.name(), image = tool.launch().image(), "running tool container");
        let output = self
            .factory
            .tool_runner()
            .run(&plan.into_process())
            .await
            .map_err(|source| ClientPoolError::ToolRun {
                tool: tool.name().clone(),
                source,
            })?;
        if output.is_error {
            warn!(tool = %tool.name(), "tool container exited unsuccessfully");
        }
        Ok(output)
    }

    /// Sets where remote clients obtain OAuth bearer tokens.
    pub fn set_token_source(&self, token_source: Arc<dyn TokenSource>) {
        self.factory.set_token_source(token_source);
    }

    fn keeps(&self, descriptor: &ServerDescriptor, session: &SessionConfig) -> bool {
        session.session().is_some() && (descriptor.long_lived() || self.options().long_lived)
    }

    /// Returns a client for `descriptor` on behalf of `session`.
    ///
    /// A kept connection is reused when one exists. Otherwise a new client
    /// is created; kept ones are registered before initialization so
    /// concurrent callers share one creation, which then runs detached from
    /// the caller. A failed kept creation is removed again so the next call
    /// retries.
    ///
    /// # Errors
    ///
    /// Returns [`ClientPoolError`] when sandboxing, launching or the
    /// handshake fails.
    pub async fn acquire(
        &self,
        descriptor: &ServerDescriptor,
        session: SessionConfig,
    ) -> Result<Arc<dyn BackendClient>, ClientPoolError> {
        let key = ClientKey::new(descriptor.name().clone(), session.session());
        let existing = self
            .entries
            .read()
            .await
            .get(&key)
            .map(|entry| entry.creation.clone());
        if let Some(creation) = existing {
            return creation.await;
        }

        let getter = Arc::new(ClientGetter::new(
            Arc::new(descriptor.clone()),
            session,
            Arc::clone(&self.factory),
        ));
        if !self.keeps(descriptor, &session) {
            return getter.client().await;
        }

        let creation = {
            let mut entries = self.entries.write().await;
            match entries.entry(key.clone()) {
                Entry::Occupied(occupied) => occupied.get().creation.clone(),
                Entry::Vacant(vacant) => {
                    let spawned = self.spawn_creation(&key, &getter);
                    vacant.insert(PoolEntry {
                        getter,
                        creation: spawned.clone(),
                        created_at: self.clock.utc(),
                    });
                    debug!(key = %key, "registered kept client");
                    spawned
                }
            }
        };
        creation.await
    }

    /// Starts creating a kept client on its own task.
    ///
    /// The task is the only caller that drives the getter, so cancelling
    /// any waiter leaves creation running. A failed creation removes its
    /// entry.
    fn spawn_creation(&self, key: &ClientKey, getter: &Arc<ClientGetter<E>>) -> SharedCreation {
        let entries = Arc::clone(&self.entries);
        let creator = Arc::clone(getter);
        let failed_key = key.clone();
        let task = tokio::spawn(async move {
            let outcome = creator.client().await;
            if outcome.is_err() {
                remove_if_current(&entries, &failed_key, &creator).await;
            }
            outcome
        });

        let aborted_entries = Arc::clone(&self.entries);
        let aborted_getter = Arc::clone(getter);
        let aborted_key = key.clone();
        task.then(move |joined| async move {
            match joined {
                Ok(outcome) => outcome,
                Err(err) => {
                    warn!(key = %aborted_key, error = %err, "client creation task ended abnormally");
                    remove_if_current(&aborted_entries, &aborted_key, &aborted_getter).await;
                    Err(ClientPoolError::CreationAborted(aborted_key.server().clone()))
                }
            }
        })
        .boxed()
        .shared()
    }

    /// Hands a client back to the pool.
    ///
    /// Kept clients stay open. Any other client is closed; releasing it
    /// again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`ClientPoolError::Close`] when closing the client fails.
    pub async fn release(&self, client: &Arc<dyn BackendClient>) -> Result<(), ClientPoolError> {
        if self.is_kept(client).await {
            return Ok(());
        }
        client
            .close()
            .await
            .map_err(|source| ClientPoolError::Close {
                server: client.server_name().clone(),
                source,
            })
    }

    /// Returns whether `client` belongs to a kept entry.
    pub async fn is_kept(&self, client: &Arc<dyn BackendClient>) -> bool {
        self.entries
            .read()
            .await
            .values()
            .any(|entry| entry.getter.is_client(client))
    }

    /// Empties the pool and closes every kept client.
    ///
    /// Clients still initializing are awaited first. Every client is closed
    /// even when an earlier one fails.
    ///
    /// # Errors
    ///
    /// Returns the first [`ClientPoolError::Close`] encountered.
    pub async fn close(&self) -> Result<(), ClientPoolError> {
        let drained = std::mem::take(&mut *self.entries.write().await);
        info!(entries = drained.len(), "closing client pool");

        let mut first_failure = None;
        for (key, entry) in drained {
            let Ok(client) = entry.creation.await else {
                continue;
            };
            if let Err(source) = client.close().await {
                warn!(key = %key, error = %source, "closing kept client failed");
                first_failure.get_or_insert(ClientPoolError::Close {
                    server: key.server().clone(),
                    source,
                });
            }
        }
        first_failure.map_or(Ok(()), Err)
    }

    /// Closes and forgets the kept OAuth connections of `provider`, so the
    /// next acquisition reconnects with a fresh token.
    ///
    /// Returns how many entries were invalidated.
    pub async fn invalidate_for_provider(&self, provider: &str) -> usize {
        info!(provider, "invalidating oauth clients");
        let removed: Vec<(ClientKey, PoolEntry<E>)> = {
            let mut entries = self.entries.write().await;
            let matching: Vec<ClientKey> = entries
                .iter()
                .filter(|(_, entry)| {
                    let descriptor = entry.getter.descriptor();
                    descriptor.uses_oauth() && descriptor.name().as_str() == provider
                })
                .map(|(key, _)| key.clone())
                .collect();
            matching
                .into_iter()
                .filter_map(|key| entries.remove(&key).map(|entry| (key, entry)))
                .collect()
        };

        let invalidated = removed.len();
        for (key, entry) in removed {
            match entry.creation.await {
                Ok(client) => match client.close().await {
                    Ok(()) => info!(key = %key, "closed oauth connection"),
                    Err(err) => warn!(key = %key, error = %err, "closing oauth connection failed"),
                },
                Err(err) => {
                    warn!(key = %key, error = %err, "oauth client unavailable during invalidation");
                }
            }
        }

        if invalidated == 0 {
            info!(provider, "no active oauth connections");
        } else {
            info!(provider, invalidated, "invalidated oauth connections");
        }
        invalidated
    }

    /// Forwards root hints to every kept client of `session`.
    ///
    /// Clients still initializing receive them once connected. Failures
    /// are logged and skipped.
    pub async fn update_roots(&self, session: SessionId, roots: Vec<Root>) {
        let getters: Vec<Arc<ClientGetter<E>>> = self
            .entries
            .read()
            .await
            .iter()
            .filter(|(key, _)| key.session() == Some(session))
            .map(|(_, entry)| Arc::clone(&entry.getter))
            .collect();

        for getter in getters {
            if let Err(err) = getter.add_roots(roots.clone()).await {
                debug!(
                    server = %getter.descriptor().name(),
                    error = %err,
                    "root update rejected"
                );
            }
        }
    }

    /// Returns a snapshot of the kept entries, ordered by key.
    pub async fn kept_entries(&self) -> Vec<KeptEntry> {
        let mut snapshot: Vec<KeptEntry> = self
            .entries
            .read()
            .await
            .iter()
            .map(|(key, entry)| KeptEntry {
                key: key.clone(),
                created_at: entry.created_at,
                ready: entry.getter.ready_client().is_some(),
            })
            .collect();
        snapshot.sort_by(|left, right| left.key.cmp(&right.key));
        snapshot
    }
}

async fn remove_if_current<E: ContainerEngine + 'static>(
    entries: &RwLock<EntryMap<E>>,
    key: &ClientKey,
    getter: &Arc<ClientGetter<E>>,
) {
    let mut map = entries.write().await;
    if map
        .get(key)
        .is_some_and(|entry| Arc::ptr_eq(&entry.getter, getter))
    {
        map.remove(key);
        debug!(key = %key, "removed failed kept client");
    }
}

impl<E, C> fmt::Debug for ClientPool<E, C>
where
    E: ContainerEngine + 'static,
    C: Clock + Send + Sync,
{
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ClientPool")
            .field("options", self.options())
            .finish_non_exhaustive()
    }
}
