//! In-memory protocol adapters for tests and local development.

mod connector;
mod token;
mod tool;

pub use connector::{ConnectionRecord, InMemoryProtocolConnector, InMemoryProtocolSession};
pub use token::InMemoryTokenSource;
pub use tool::InMemoryToolRunner;
