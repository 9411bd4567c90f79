//! Transport value objects for establishing backend sessions.

use super::ClientPoolDomainError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Protocol version offered during the handshake.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

const CLIENT_NAME: &str = "toolgate";

/// Wire transport of a remote server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum RemoteTransport {
    /// HTTP with server-sent events.
    Sse,
    /// Streamable HTTP.
    StreamableHttp,
}

impl RemoteTransport {
    /// Returns the canonical token.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sse => "sse",
            Self::StreamableHttp => "streamable-http",
        }
    }
}

impl fmt::Display for RemoteTransport {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl TryFrom<&str> for RemoteTransport {
    type Error = ClientPoolDomainError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "sse" => Ok(Self::Sse),
            "http" | "streamable" | "streaming" | "streamable-http" => Ok(Self::StreamableHttp),
            _ => Err(ClientPoolDomainError::UnsupportedTransport(value.to_owned())),
        }
    }
}

impl TryFrom<String> for RemoteTransport {
    type Error = ClientPoolDomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_from(value.as_str())
    }
}

impl From<RemoteTransport> for String {
    fn from(value: RemoteTransport) -> Self {
        value.as_str().to_owned()
    }
}

/// A child process speaking the protocol over stdio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessLaunch {
    /// Executable.
    pub program: String,
    /// Arguments.
    pub args: Vec<String>,
    /// `NAME=value` entries forming the complete process environment.
    pub env: Vec<String>,
}

/// An HTTP endpoint with the headers sent on every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpEndpoint {
    /// Endpoint URL.
    pub url: String,
    /// Headers, already expanded.
    pub headers: BTreeMap<String, String>,
}

/// Resolved transport handed to the protocol connector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendTransport {
    /// Spawn a process and talk over its stdin/stdout.
    ChildProcess(ProcessLaunch),
    /// Connect over HTTP with server-sent events.
    Sse(HttpEndpoint),
    /// Connect over streamable HTTP.
    StreamableHttp(HttpEndpoint),
}

/// Parameters of the protocol `initialize` exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    /// Offered protocol version.
    pub protocol_version: String,
    /// Client implementation name.
    pub client_name: String,
    /// Client implementation version.
    pub client_version: String,
}

impl Default for Handshake {
    fn default() -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION.to_owned(),
            client_name: CLIENT_NAME.to_owned(),
            client_version: env!("CARGO_PKG_VERSION").to_owned(),
        }
    }
}
