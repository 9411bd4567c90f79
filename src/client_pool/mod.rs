//! Pooled connections to backend MCP servers.
//!
//! A [`services::ClientPool`] hands out [`ports::BackendClient`]s keyed by
//! server and calling session. Each client is built once by a
//! [`services::ClientGetter`], which sandboxes container-backed servers
//! with an egress allow-list before launching them. The module follows
//! hexagonal architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Orchestration services in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
