//! Domain model for sandbox egress rules.
//!
//! Proxy specs are parsed once into immutable [`Proxy`] values. The
//! [`TargetConfig`] accumulates the network attachment instructions a
//! sandboxed container needs while the proxies it depends on are started.

mod error;
mod options;
mod proxy;
mod target;

pub use error::{ProxySpecError, ProxySpecReason};
pub use options::{ProxyImages, SandboxOptions};
pub use proxy::{Proxy, ProxyProtocol};
pub use target::{ContainerLink, TargetConfig};
