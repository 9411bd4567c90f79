//! Network attachment instructions for a sandboxed container.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;

/// A `container:alias` link letting the sandboxed container resolve a proxy
/// by the real hostname it stands in for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContainerLink {
    container: String,
    alias: String,
}

impl ContainerLink {
    /// Creates a link from a proxy container name to a hostname alias.
    #[must_use]
    pub fn new(container: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            alias: alias.into(),
        }
    }

    /// Returns the proxy container name.
    #[must_use]
    pub fn container(&self) -> &str {
        &self.container
    }

    /// Returns the hostname the proxy answers for.
    #[must_use]
    pub fn alias(&self) -> &str {
        &self.alias
    }
}

impl fmt::Display for ContainerLink {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}:{}", self.container, self.alias)
    }
}

/// Configuration applied to a target container so that all of its traffic
/// flows through the sandbox proxies.
///
/// Links accumulate while proxies start. Once a DNS forwarder is routed in,
/// the links are dropped and name resolution goes through [`Self::dns`]
/// alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetConfig {
    network_name: Option<String>,
    links: Vec<ContainerLink>,
    env: Vec<String>,
    dns: Option<IpAddr>,
}

impl TargetConfig {
    /// Creates a configuration attaching the target to `network_name`.
    #[must_use]
    pub fn for_network(network_name: impl Into<String>) -> Self {
        Self {
            network_name: Some(network_name.into()),
            ..Self::default()
        }
    }

    /// Adds a container link.
    pub fn add_link(&mut self, link: ContainerLink) {
        self.links.push(link);
    }

    /// Adds a `NAME=value` environment entry.
    pub fn add_env(&mut self, entry: impl Into<String>) {
        self.env.push(entry.into());
    }

    /// Routes name resolution through the forwarder at `address`,
    /// superseding every link added so far.
    pub fn route_dns_through(&mut self, address: IpAddr) {
        self.dns = Some(address);
        self.links.clear();
    }

    /// Returns whether the target must be attached to a sandbox network.
    #[must_use]
    pub const fn is_sandboxed(&self) -> bool {
        self.network_name.is_some()
    }

    /// Returns the internal network the target joins.
    #[must_use]
    pub fn network_name(&self) -> Option<&str> {
        self.network_name.as_deref()
    }

    /// Returns the container links.
    #[must_use]
    pub fn links(&self) -> &[ContainerLink] {
        &self.links
    }

    /// Returns the environment entries.
    #[must_use]
    pub fn env(&self) -> &[String] {
        &self.env
    }

    /// Returns the DNS forwarder address, if one is active.
    #[must_use]
    pub const fn dns(&self) -> Option<IpAddr> {
        self.dns
    }
}
