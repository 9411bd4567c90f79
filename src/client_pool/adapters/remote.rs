//! Backend client for remote SSE and streamable-HTTP servers.

use super::slot::SessionSlot;
use crate::client_pool::{
    domain::{
        BackendTransport, Handshake, HttpEndpoint, RemoteEndpoint, RemoteTransport, Root,
        ServerDescriptor, ServerName, expand_vars,
    },
    ports::{BackendClient, ClientResult, ProtocolConnector, ProtocolSession, TokenSource},
};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

const AUTHORIZATION_HEADER: &str = "Authorization";

/// Client connecting to a remote server over HTTP.
///
/// Header values may reference the server's secrets by their environment
/// variable names (`$API_KEY`). Servers with OAuth providers additionally
/// send the bearer token supplied by the configured [`TokenSource`].
pub struct RemoteClient {
    slot: SessionSlot,
    connector: Arc<dyn ProtocolConnector>,
    endpoint: RemoteEndpoint,
    secret_env: BTreeMap<String, String>,
    uses_oauth: bool,
    token_source: Option<Arc<dyn TokenSource>>,
}

impl RemoteClient {
    /// Creates a client for `descriptor`, reached at `endpoint`.
    #[must_use]
    pub fn new(
        descriptor: &ServerDescriptor,
        endpoint: RemoteEndpoint,
        connector: Arc<dyn ProtocolConnector>,
    ) -> Self {
        let secret_env = descriptor
            .secrets()
            .iter()
            .map(|binding| {
                let value = descriptor.secret_value(&binding.name).unwrap_or_default();
                (binding.env.clone(), value.to_owned())
            })
            .collect();
        Self {
            slot: SessionSlot::new(descriptor.name().clone()),
            connector,
            endpoint,
            secret_env,
            uses_oauth: descriptor.uses_oauth(),
            token_source: None,
        }
    }

    /// Sets where OAuth bearer tokens come from.
    #[must_use]
    pub fn with_token_source(mut self, token_source: Arc<dyn TokenSource>) -> Self {
        self.token_source = Some(token_source);
        self
    }

    async fn headers(&self) -> BTreeMap<String, String> {
        let mut headers: BTreeMap<String, String> = self
            .endpoint
            .headers()
            .iter()
            .map(|(name, value)| {
                let expanded =
                    expand_vars(value, |key| self.secret_env.get(key).map(String::as_str));
                (name.clone(), expanded)
            })
            .collect();

        if let Some(token) = self.bearer_token().await {
            headers.insert(AUTHORIZATION_HEADER.to_owned(), format!("Bearer {token}"));
        }
        headers
    }

    async fn bearer_token(&self) -> Option<String> {
        if !self.uses_oauth {
            return None;
        }
        let source = self.token_source.as_ref()?;
        match source.bearer_token(self.slot.server()).await {
            Ok(token) => token.filter(|value| !value.is_empty()),
            Err(err) => {
                // Not authorized yet; connect anonymously.
                warn!(server = %self.slot.server(), error = %err, "oauth token unavailable");
                None
            }
        }
    }
}

#[async_trait]
impl BackendClient for RemoteClient {
    fn server_name(&self) -> &ServerName {
        self.slot.server()
    }

    async fn initialize(&self, handshake: &Handshake) -> ClientResult<()> {
        let endpoint = HttpEndpoint {
            url: self.endpoint.url().to_owned(),
            headers: self.headers().await,
        };
        debug!(
            server = %self.slot.server(),
            url = %endpoint.url,
            transport = %self.endpoint.transport(),
            "connecting to remote backend"
        );
        let transport = match self.endpoint.transport() {
            RemoteTransport::Sse => BackendTransport::Sse(endpoint),
            RemoteTransport::StreamableHttp => BackendTransport::StreamableHttp(endpoint),
        };
        self.slot
            .connect(&*self.connector, &transport, handshake)
            .await
    }

    fn session(&self) -> ClientResult<Arc<dyn ProtocolSession>> {
        self.slot.session()
    }

    async fn add_roots(&self, roots: Vec<Root>) -> ClientResult<()> {
        self.slot.set_roots(roots).await
    }

    async fn close(&self) -> ClientResult<()> {
        self.slot.close().await
    }
}

impl fmt::Debug for RemoteClient {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("RemoteClient")
            .field("server", self.slot.server())
            .field("url", &self.endpoint.url())
            .field("transport", &self.endpoint.transport())
            .field("uses_oauth", &self.uses_oauth)
            .finish_non_exhaustive()
    }
}
