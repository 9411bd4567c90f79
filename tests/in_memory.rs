//! End-to-end tests against the in-memory container engine and protocol
//! connector.
//!
//! Tests are organized into modules by functionality:
//! - `client_pool_tests`: Acquisition, reuse and shutdown through the pool
//! - `sandbox_tests`: Topology lifecycle seen from the container engine

mod in_memory {
    pub mod helpers;

    mod client_pool_tests;
    mod sandbox_tests;
}
