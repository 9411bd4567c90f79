//! Connection state shared by the client implementations.

use crate::client_pool::{
    domain::{BackendTransport, Handshake, Root, ServerName},
    ports::{ClientError, ClientResult, ProtocolConnector, ProtocolSession},
};
use std::sync::{Arc, Mutex, MutexGuard};

enum Phase {
    Idle,
    Connecting,
    Ready(Arc<dyn ProtocolSession>),
    Closed,
}

struct SlotState {
    phase: Phase,
    roots: Vec<Root>,
    roots_generation: u64,
}

/// One-shot session holder.
///
/// Roots set while the slot is idle or connecting are handed to the
/// connector, or pushed right after connecting when they changed mid-way.
pub(super) struct SessionSlot {
    server: ServerName,
    state: Mutex<SlotState>,
}

impl SessionSlot {
    pub(super) const fn new(server: ServerName) -> Self {
        Self {
            server,
            state: Mutex::new(SlotState {
                phase: Phase::Idle,
                roots: Vec::new(),
                roots_generation: 0,
            }),
        }
    }

    pub(super) const fn server(&self) -> &ServerName {
        &self.server
    }

    fn lock(&self) -> ClientResult<MutexGuard<'_, SlotState>> {
        self.state
            .lock()
            .map_err(|err| ClientError::protocol(std::io::Error::other(err.to_string())))
    }

    pub(super) async fn connect(
        &self,
        connector: &dyn ProtocolConnector,
        transport: &BackendTransport,
        handshake: &Handshake,
    ) -> ClientResult<()> {
        let (roots, generation) = {
            let mut state = self.lock()?;
            match state.phase {
                Phase::Idle => {}
                Phase::Closed => return Err(ClientError::Closed(self.server.clone())),
                Phase::Connecting | Phase::Ready(_) => {
                    return Err(ClientError::AlreadyInitialized(self.server.clone()));
                }
            }
            state.phase = Phase::Connecting;
            (state.roots.clone(), state.roots_generation)
        };

        let session = match connector
            .connect(&self.server, transport, handshake, &roots)
            .await
        {
            Ok(session) => session,
            Err(err) => {
                if let Ok(mut state) = self.lock()
                    && matches!(state.phase, Phase::Connecting)
                {
                    state.phase = Phase::Idle;
                }
                return Err(err);
            }
        };

        let settled = {
            let mut state = self.lock()?;
            if matches!(state.phase, Phase::Closed) {
                None
            } else {
                state.phase = Phase::Ready(Arc::clone(&session));
                Some((state.roots_generation != generation).then(|| state.roots.clone()))
            }
        };
        match settled {
            // Closed while the handshake was in flight.
            None => {
                session.close().await?;
                Err(ClientError::Closed(self.server.clone()))
            }
            Some(Some(changed)) => session.set_roots(&changed).await,
            Some(None) => Ok(()),
        }
    }

    pub(super) fn session(&self) -> ClientResult<Arc<dyn ProtocolSession>> {
        let state = self.lock()?;
        match &state.phase {
            Phase::Ready(session) => Ok(Arc::clone(session)),
            Phase::Idle | Phase::Connecting => Err(ClientError::NotInitialized(self.server.clone())),
            Phase::Closed => Err(ClientError::Closed(self.server.clone())),
        }
    }

    pub(super) async fn set_roots(&self, roots: Vec<Root>) -> ClientResult<()> {
        let live = {
            let mut state = self.lock()?;
            state.roots_generation = state.roots_generation.wrapping_add(1);
            let live = match &state.phase {
                Phase::Ready(session) => Some(Arc::clone(session)),
                Phase::Idle | Phase::Connecting | Phase::Closed => None,
            };
            state.roots.clone_from(&roots);
            live
        };
        match live {
            Some(session) => session.set_roots(&roots).await,
            None => Ok(()),
        }
    }

    pub(super) async fn close(&self) -> ClientResult<()> {
        let previous = {
            let mut state = self.lock()?;
            std::mem::replace(&mut state.phase, Phase::Closed)
        };
        match previous {
            Phase::Ready(session) => session.close().await,
            Phase::Idle | Phase::Connecting | Phase::Closed => Ok(()),
        }
    }
}
