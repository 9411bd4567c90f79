//! Domain model for backend connections.
//!
//! Server descriptors are read-only inputs owned by configuration. Keys,
//! session settings and transports describe how one connection to a backend
//! is identified and established. Nothing here performs I/O.

mod error;
mod expand;
mod ids;
mod options;
mod server;
mod session;
mod tool;
mod transport;

pub use error::ClientPoolDomainError;
pub use expand::{expand_vars, lookup_entry};
pub use ids::{ClientKey, ServerName, SessionId};
pub use options::PoolOptions;
pub use server::{
    ContainerLaunch, EnvBinding, OAuthSettings, RemoteEndpoint, SecretBinding, ServerDescriptor,
    ServerKind,
};
pub use session::{Root, SessionConfig};
pub use tool::{ToolContainer, ToolOutput};
pub use transport::{
    BackendTransport, Handshake, HttpEndpoint, PROTOCOL_VERSION, ProcessLaunch, RemoteTransport,
};
