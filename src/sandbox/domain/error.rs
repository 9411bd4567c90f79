//! Error types for proxy spec parsing.

use thiserror::Error;

/// Error returned when a `hostname:port[/protocol]` spec is rejected.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid proxy spec {spec:?}: {reason}")]
pub struct ProxySpecError {
    spec: String,
    reason: ProxySpecReason,
}

impl ProxySpecError {
    pub(crate) fn new(spec: &str, reason: ProxySpecReason) -> Self {
        Self {
            spec: spec.to_owned(),
            reason,
        }
    }

    /// Returns the rejected spec as written.
    #[must_use]
    pub fn spec(&self) -> &str {
        &self.spec
    }

    /// Returns why the spec was rejected.
    #[must_use]
    pub const fn reason(&self) -> &ProxySpecReason {
        &self.reason
    }
}

/// Reasons a proxy spec is rejected.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProxySpecReason {
    /// More than one `/` separated the address from the protocol.
    #[error("expected hostname:port[/protocol]")]
    TooManySegments,

    /// The address has no `:port` part at all.
    #[error("address {0}: missing port in address")]
    MissingPortInAddress(String),

    /// An unbracketed address contains more than one colon.
    #[error("address {0}: too many colons in address")]
    TooManyColons(String),

    /// The port after the colon is empty.
    #[error("missing port")]
    MissingPort,

    /// The hostname is a loopback or multicast IP literal.
    #[error("invalid hostname")]
    InvalidHostname,

    /// The port is not a decimal number in `1..=65535`.
    #[error("invalid port")]
    InvalidPort,

    /// The protocol is not one of `http`, `https` or `tcp`.
    #[error("invalid protocol")]
    InvalidProtocol,
}
