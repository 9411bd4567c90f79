//! Names for sandbox networks and sidecars.

use rand::Rng;
use rand::distributions::Alphanumeric;

const SUFFIX_LENGTH: usize = 11;

pub(super) const NETWORK_PREFIX: &str = "toolgate-proxies";
pub(super) const L4_PROXY_PREFIX: &str = "toolgate-l4proxy";
pub(super) const L7_PROXY_PREFIX: &str = "toolgate-l7proxy";
pub(super) const DNS_FORWARDER_PREFIX: &str = "toolgate-dns-forwarder";

/// The pair of networks owned by one sandbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct SandboxNetworks {
    pub(super) internal: String,
    pub(super) external: String,
}

impl SandboxNetworks {
    pub(super) fn generate() -> Self {
        let suffix = random_suffix();
        Self {
            internal: format!("{NETWORK_PREFIX}-int-{suffix}"),
            external: format!("{NETWORK_PREFIX}-ext-{suffix}"),
        }
    }

    /// Networks a sidecar joins, internal first.
    pub(super) fn both(&self) -> Vec<String> {
        vec![self.internal.clone(), self.external.clone()]
    }
}

pub(super) fn sidecar_name(prefix: &str) -> String {
    format!("{prefix}-{}", random_suffix())
}

fn random_suffix() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SUFFIX_LENGTH)
        .map(char::from)
        .collect()
}
