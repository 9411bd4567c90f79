//! Port contracts for backend connections.

mod client;
mod protocol;
mod token;
mod tool;

pub use client::{BackendClient, ClientError, ClientResult};
pub use protocol::{ProtocolConnector, ProtocolSession};
pub use token::TokenSource;
pub use tool::ToolRunner;
