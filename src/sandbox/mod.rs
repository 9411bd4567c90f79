//! Egress sandboxing for container-backed MCP servers.
//!
//! A sandboxed backend container joins an internal network only. Every host
//! it is allowed to reach is served by a proxy container that straddles the
//! internal network and an external one, so the backend can talk to exactly
//! the hosts named in its allow-list and nothing else. The module follows
//! hexagonal architecture:
//!
//! - Domain types in [`domain`] (proxy specs, target configuration)
//! - Port contracts in [`ports`] (the container engine)
//! - Adapter implementations in [`adapters`]
//! - Orchestration services in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
