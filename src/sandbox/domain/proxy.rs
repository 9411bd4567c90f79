//! Parsed egress targets.

use super::{ProxySpecError, ProxySpecReason};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv6Addr};
use std::str::FromStr;

/// Proxy family used to reach an allowed host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProxyProtocol {
    /// HTTP or HTTPS traffic, served by the shared L7 proxy.
    Http,
    /// Raw TCP traffic, served by a per-hostname L4 proxy.
    Tcp,
}

impl ProxyProtocol {
    /// Returns the canonical spec token.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Tcp => "tcp",
        }
    }
}

impl fmt::Display for ProxyProtocol {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// One allowed egress target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Proxy {
    protocol: ProxyProtocol,
    hostname: String,
    port: u16,
}

impl Proxy {
    /// Creates a proxy target without going through the spec syntax.
    #[must_use]
    pub fn new(protocol: ProxyProtocol, hostname: impl Into<String>, port: u16) -> Self {
        Self {
            protocol,
            hostname: hostname.into(),
            port,
        }
    }

    /// Parses a `hostname:port[/protocol]` spec.
    ///
    /// The protocol defaults to `http`; `https` is folded into the HTTP
    /// family. Hostnames may be DNS names or IP literals, with IPv6 literals
    /// written in brackets.
    ///
    /// # Errors
    ///
    /// Returns [`ProxySpecError`] when the spec has more than one `/`, lacks
    /// a port, names a loopback or multicast IP, carries a port outside
    /// `1..=65535`, or uses an unknown protocol.
    pub fn parse(spec: &str) -> Result<Self, ProxySpecError> {
        let reject = |reason| ProxySpecError::new(spec, reason);

        let mut segments = spec.split('/');
        let address = segments.next().unwrap_or_default();
        let protocol_token = segments.next();
        if segments.next().is_some() {
            return Err(reject(ProxySpecReason::TooManySegments));
        }

        let (hostname, port_text) = split_host_port(address).map_err(reject)?;
        if port_text.is_empty() {
            return Err(reject(ProxySpecReason::MissingPort));
        }

        if literal_ip(hostname).is_some_and(|ip| ip.is_loopback() || ip.is_multicast()) {
            return Err(reject(ProxySpecReason::InvalidHostname));
        }

        let port = parse_port(port_text).ok_or_else(|| reject(ProxySpecReason::InvalidPort))?;

        let protocol = match protocol_token {
            None | Some("http" | "https") => ProxyProtocol::Http,
            Some("tcp") => ProxyProtocol::Tcp,
            Some(_) => return Err(reject(ProxySpecReason::InvalidProtocol)),
        };

        Ok(Self {
            protocol,
            hostname: hostname.to_owned(),
            port,
        })
    }

    /// Returns the proxy family.
    #[must_use]
    pub const fn protocol(&self) -> ProxyProtocol {
        self.protocol
    }

    /// Returns the target hostname.
    #[must_use]
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Returns the target port.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Returns `host:port`, bracketing IPv6 literals.
    #[must_use]
    pub fn host_port(&self) -> String {
        if self.hostname.contains(':') {
            format!("[{}]:{}", self.hostname, self.port)
        } else {
            format!("{}:{}", self.hostname, self.port)
        }
    }
}

impl fmt::Display for Proxy {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}/{}", self.host_port(), self.protocol)
    }
}

impl FromStr for Proxy {
    type Err = ProxySpecError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

fn split_host_port(address: &str) -> Result<(&str, &str), ProxySpecReason> {
    let missing_port = || ProxySpecReason::MissingPortInAddress(address.to_owned());

    if let Some(bracketed) = address.strip_prefix('[') {
        let (host, remainder) = bracketed.split_once(']').ok_or_else(missing_port)?;
        let port = remainder.strip_prefix(':').ok_or_else(missing_port)?;
        if port.contains(':') {
            return Err(ProxySpecReason::TooManyColons(address.to_owned()));
        }
        return Ok((host, port));
    }

    let (host, port) = address.rsplit_once(':').ok_or_else(missing_port)?;
    if host.contains(':') {
        return Err(ProxySpecReason::TooManyColons(address.to_owned()));
    }
    Ok((host, port))
}

/// Parses `hostname` as an IP literal, dropping an IPv6 zone and unmapping
/// IPv4-mapped IPv6 addresses.
fn literal_ip(hostname: &str) -> Option<IpAddr> {
    if let Some((address, _zone)) = hostname.split_once('%') {
        return address.parse::<Ipv6Addr>().ok().map(unmap);
    }
    match hostname.parse::<IpAddr>().ok()? {
        IpAddr::V6(v6) => Some(unmap(v6)),
        v4 @ IpAddr::V4(_) => Some(v4),
    }
}

fn unmap(address: Ipv6Addr) -> IpAddr {
    address
        .to_ipv4_mapped()
        .map_or(IpAddr::V6(address), IpAddr::V4)
}

fn parse_port(text: &str) -> Option<u16> {
    if !text.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    text.parse::<u16>().ok().filter(|port| *port != 0)
}
