//! Recording protocol connector that never touches a real backend.

use crate::client_pool::{
    domain::{BackendTransport, Handshake, Root, ServerName},
    ports::{ClientError, ClientResult, ProtocolConnector, ProtocolSession},
};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

/// One successful `connect` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionRecord {
    /// Backend connected to.
    pub server: ServerName,
    /// Transport the client resolved.
    pub transport: BackendTransport,
    /// Handshake parameters offered.
    pub handshake: Handshake,
    /// Roots announced during the handshake.
    pub roots: Vec<Root>,
}

/// In-memory protocol connector.
///
/// Every call is counted per server. Failures can be queued per server and
/// a fixed delay can be added before each handshake completes, which lets
/// tests widen race windows or trip the initialization timeout.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProtocolConnector {
    state: Arc<RwLock<ConnectorState>>,
}

#[derive(Debug, Default)]
struct ConnectorState {
    attempts: BTreeMap<ServerName, usize>,
    pending_failures: BTreeMap<ServerName, usize>,
    delay: Option<Duration>,
    responses: BTreeMap<ServerName, BTreeMap<String, Value>>,
    connections: Vec<ConnectionRecord>,
    sessions: Vec<(ServerName, Arc<InMemoryProtocolSession>)>,
}

fn poisoned(err: impl ToString) -> ClientError {
    ClientError::protocol(std::io::Error::other(err.to_string()))
}

impl InMemoryProtocolConnector {
    /// Creates a connector with no recorded calls.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read_state(&self) -> ClientResult<RwLockReadGuard<'_, ConnectorState>> {
        self.state.read().map_err(poisoned)
    }

    fn write_state(&self) -> ClientResult<RwLockWriteGuard<'_, ConnectorState>> {
        self.state.write().map_err(poisoned)
    }

    /// Makes the next `times` handshakes with `server` fail.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Protocol`] when lock acquisition fails.
    pub fn fail_next(&self, server: &ServerName, times: usize) -> ClientResult<()> {
        self.write_state()?
            .pending_failures
            .insert(server.clone(), times);
        Ok(())
    }

    /// Delays every handshake by `delay`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Protocol`] when lock acquisition fails.
    pub fn delay_handshakes(&self, delay: Duration) -> ClientResult<()> {
        self.write_state()?.delay = Some(delay);
        Ok(())
    }

    /// Answers `method` requests to `server` with `response`.
    ///
    /// Applies to sessions opened afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Protocol`] when lock acquisition fails.
    pub fn respond(
        &self,
        server: &ServerName,
        method: impl Into<String>,
        response: Value,
    ) -> ClientResult<()> {
        self.write_state()?
            .responses
            .entry(server.clone())
            .or_default()
            .insert(method.into(), response);
        Ok(())
    }

    /// Returns every successful connection, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Protocol`] when lock acquisition fails.
    pub fn connections(&self) -> ClientResult<Vec<ConnectionRecord>> {
        Ok(self.read_state()?.connections.clone())
    }

    /// Returns how many handshakes with `server` were attempted.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Protocol`] when lock acquisition fails.
    pub fn attempts(&self, server: &ServerName) -> ClientResult<usize> {
        Ok(self
            .read_state()?
            .attempts
            .get(server)
            .copied()
            .unwrap_or_default())
    }

    /// Returns the sessions opened with `server`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Protocol`] when lock acquisition fails.
    pub fn sessions(&self, server: &ServerName) -> ClientResult<Vec<Arc<InMemoryProtocolSession>>> {
        Ok(self
            .read_state()?
            .sessions
            .iter()
            .filter(|(name, _)| name == server)
            .map(|(_, session)| Arc::clone(session))
            .collect())
    }
}

#[async_trait]
impl ProtocolConnector for InMemoryProtocolConnector {
    async fn connect(
        &self,
        server: &ServerName,
        transport: &BackendTransport,
        handshake: &Handshake,
        roots: &[Root],
    ) -> ClientResult<Arc<dyn ProtocolSession>> {
        let delay = {
            let mut state = self.write_state()?;
            let attempts = state.attempts.entry(server.clone()).or_default();
            *attempts = attempts.saturating_add(1);
            state.delay
        };
        if let Some(pause) = delay {
            tokio::time::sleep(pause).await;
        }

        let mut state = self.write_state()?;
        if let Some(remaining) = state.pending_failures.get_mut(server)
            && *remaining > 0
        {
            *remaining = remaining.saturating_sub(1);
            return Err(ClientError::connect(
                server,
                std::io::Error::other("injected handshake failure"),
            ));
        }

        let responses = state.responses.get(server).cloned().unwrap_or_default();
        let session = Arc::new(InMemoryProtocolSession::new(
            server.clone(),
            roots.to_vec(),
            responses,
        ));
        state.connections.push(ConnectionRecord {
            server: server.clone(),
            transport: transport.clone(),
            handshake: handshake.clone(),
            roots: roots.to_vec(),
        });
        state.sessions.push((server.clone(), Arc::clone(&session)));
        Ok(session)
    }
}

/// Session handed out by [`InMemoryProtocolConnector`].
#[derive(Debug)]
pub struct InMemoryProtocolSession {
    server: ServerName,
    state: RwLock<SessionState>,
}

#[derive(Debug)]
struct SessionState {
    closed: bool,
    close_count: usize,
    roots: Vec<Root>,
    requests: Vec<(String, Value)>,
    responses: BTreeMap<String, Value>,
}

impl InMemoryProtocolSession {
    fn new(server: ServerName, roots: Vec<Root>, responses: BTreeMap<String, Value>) -> Self {
        Self {
            server,
            state: RwLock::new(SessionState {
                closed: false,
                close_count: 0,
                roots,
                requests: Vec::new(),
                responses,
            }),
        }
    }

    fn read_state(&self) -> ClientResult<RwLockReadGuard<'_, SessionState>> {
        self.state.read().map_err(poisoned)
    }

    fn write_state(&self) -> ClientResult<RwLockWriteGuard<'_, SessionState>> {
        self.state.write().map_err(poisoned)
    }

    /// Returns how many times the session was closed.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Protocol`] when lock acquisition fails.
    pub fn close_count(&self) -> ClientResult<usize> {
        Ok(self.read_state()?.close_count)
    }

    /// Returns whether the session was closed.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Protocol`] when lock acquisition fails.
    pub fn is_closed(&self) -> ClientResult<bool> {
        Ok(self.read_state()?.closed)
    }

    /// Returns the roots most recently announced.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Protocol`] when lock acquisition fails.
    pub fn roots(&self) -> ClientResult<Vec<Root>> {
        Ok(self.read_state()?.roots.clone())
    }

    /// Returns the methods requested so far, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Protocol`] when lock acquisition fails.
    pub fn requested_methods(&self) -> ClientResult<Vec<String>> {
        Ok(self
            .read_state()?
            .requests
            .iter()
            .map(|(method, _)| method.clone())
            .collect())
    }
}

#[async_trait]
impl ProtocolSession for InMemoryProtocolSession {
    async fn request(&self, method: &str, params: Value) -> ClientResult<Value> {
        let mut state = self.write_state()?;
        if state.closed {
            return Err(ClientError::Closed(self.server.clone()));
        }
        state.requests.push((method.to_owned(), params));
        Ok(state.responses.get(method).cloned().unwrap_or(Value::Null))
    }

    async fn set_roots(&self, roots: &[Root]) -> ClientResult<()> {
        let mut state = self.write_state()?;
        if state.closed {
            return Err(ClientError::Closed(self.server.clone()));
        }
        state.roots = roots.to_vec();
        Ok(())
    }

    async fn close(&self) -> ClientResult<()> {
        let mut state = self.write_state()?;
        state.closed = true;
        state.close_count = state.close_count.saturating_add(1);
        Ok(())
    }
}
