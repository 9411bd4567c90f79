//! One-shot, shared client creation.

use super::ClientPoolError;
use super::factory::ClientFactory;
use crate::client_pool::{
    domain::{Handshake, Root, ServerDescriptor, SessionConfig},
    ports::{BackendClient, ClientResult},
};
use crate::sandbox::ports::ContainerEngine;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

type CreationResult = Result<Arc<dyn BackendClient>, ClientPoolError>;

enum RootsState {
    Pending(Option<Vec<Root>>),
    Attached(Arc<dyn BackendClient>),
}

/// Creates one backend client on first demand and shares the outcome.
///
/// The first caller of [`ClientGetter::client`] builds, sandboxes and
/// initializes the client; concurrent callers wait for it and every caller
/// receives the same client or the same error. A failure is terminal for
/// the getter: it is never retried here.
pub struct ClientGetter<E: ContainerEngine + 'static> {
    descriptor: Arc<ServerDescriptor>,
    session: SessionConfig,
    factory: Arc<ClientFactory<E>>,
    outcome: OnceCell<CreationResult>,
    roots: Mutex<RootsState>,
}

impl<E: ContainerEngine + 'static> ClientGetter<E> {
    pub(super) fn new(
        descriptor: Arc<ServerDescriptor>,
        session: SessionConfig,
        factory: Arc<ClientFactory<E>>,
    ) -> Self {
        Self {
            descriptor,
            session,
            factory,
            outcome: OnceCell::new(),
            roots: Mutex::new(RootsState::Pending(None)),
        }
    }

    /// Returns the descriptor the client is built from.
    #[must_use]
    pub fn descriptor(&self) -> &ServerDescriptor {
        &self.descriptor
    }

    /// Returns the session settings the client is built for.
    #[must_use]
    pub const fn session(&self) -> &SessionConfig {
        &self.session
    }

    /// Returns the client, creating it on the first call.
    ///
    /// # Errors
    ///
    /// Returns the creation failure, the same one for every caller.
    pub async fn client(&self) -> CreationResult {
        self.outcome.get_or_init(|| self.create()).await.clone()
    }

    /// Returns the client if creation already succeeded.
    #[must_use]
    pub fn ready_client(&self) -> Option<Arc<dyn BackendClient>> {
        self.outcome
            .get()
            .and_then(|outcome| outcome.as_ref().ok())
            .map(Arc::clone)
    }

    /// Returns whether creation has finished, successfully or not.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.outcome.initialized()
    }

    /// Returns whether `client` is the one this getter created.
    #[must_use]
    pub fn is_client(&self, client: &Arc<dyn BackendClient>) -> bool {
        self.ready_client()
            .is_some_and(|own| std::ptr::addr_eq(Arc::as_ptr(&own), Arc::as_ptr(client)))
    }

    /// Forwards root hints to the client, or keeps them until it exists.
    ///
    /// # Errors
    ///
    /// Returns the client's error when a live session rejects the update.
    pub async fn add_roots(&self, roots: Vec<Root>) -> ClientResult<()> {
        let attached = {
            let mut state = self.roots.lock().unwrap_or_else(PoisonError::into_inner);
            match &mut *state {
                RootsState::Attached(client) => Some(Arc::clone(client)),
                RootsState::Pending(pending) => {
                    *pending = Some(roots.clone());
                    None
                }
            }
        };
        match attached {
            Some(client) => client.add_roots(roots).await,
            None => Ok(()),
        }
    }

    async fn attach_roots(&self, client: &Arc<dyn BackendClient>) -> ClientResult<()> {
        let pending = {
            let mut state = self.roots.lock().unwrap_or_else(PoisonError::into_inner);
            match std::mem::replace(&mut *state, RootsState::Attached(Arc::clone(client))) {
                RootsState::Pending(pending) => pending,
                RootsState::Attached(_) => None,
            }
        };
        match pending {
            Some(roots) => client.add_roots(roots).await,
            None => Ok(()),
        }
    }

    async fn create(&self) -> CreationResult {
        let server = self.descriptor.name().clone();
        debug!(server = %server, session = ?self.session.session(), "creating backend client");
        let client = self.factory.build(&self.descriptor, &self.session).await?;

        let timeout = self.factory.options().init_timeout();
        let initialized = async {
            self.attach_roots(&client).await?;
            client.initialize(&Handshake::default()).await
        };
        let failure = match tokio::time::timeout(timeout, initialized).await {
            Ok(Ok(())) => None,
            Ok(Err(source)) => Some(ClientPoolError::Handshake {
                server: server.clone(),
                source,
            }),
            Err(_elapsed) => Some(ClientPoolError::HandshakeTimeout {
                server: server.clone(),
                timeout,
            }),
        };

        if let Some(err) = failure {
            // Also tears down the sandbox, if one was provisioned.
            if let Err(cleanup) = client.close().await {
                warn!(server = %server, error = %cleanup, "closing failed client");
            }
            return Err(err);
        }
        info!(server = %server, "backend client initialized");
        Ok(client)
    }
}

impl<E: ContainerEngine + 'static> fmt::Debug for ClientGetter<E> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ClientGetter")
            .field("server", self.descriptor.name())
            .field("session", &self.session)
            .field("settled", &self.is_settled())
            .finish_non_exhaustive()
    }
}
