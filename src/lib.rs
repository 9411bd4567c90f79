//! Toolgate: backend connection management for an MCP gateway.
//!
//! This crate manages the connections a gateway holds to its backend tool
//! servers. Backends may be child processes, containers or remote HTTP
//! endpoints; container-backed ones can be confined to an egress
//! allow-list by a dynamically provisioned proxy topology.
//!
//! # Architecture
//!
//! Toolgate follows hexagonal architecture principles:
//!
//! - **Domain**: Value types and validation with no infrastructure
//!   dependencies
//! - **Ports**: Trait interfaces for the container engine and the protocol
//!   implementation
//! - **Adapters**: Concrete clients, a `docker` CLI engine and in-memory
//!   doubles
//! - **Services**: The client pool, client getters and the sandbox
//!   orchestrator
//!
//! # Modules
//!
//! - [`client_pool`]: Acquiring, sharing and releasing backend clients
//! - [`sandbox`]: Proxy spec parsing and egress sandbox provisioning

pub mod client_pool;
pub mod sandbox;
