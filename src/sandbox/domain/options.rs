//! Sandbox provisioning options.

use serde::{Deserialize, Serialize};

const DEFAULT_L4_IMAGE: &str =
    "docker/mcp-l4proxy:v1@sha256:121b87decc25cda901dbd4ffbd20b116fffbd0fbeecc827c228fa45094a9934c";
const DEFAULT_L7_IMAGE: &str =
    "docker/mcp-l7proxy:v1@sha256:ef8fd775fdf8ad060af897018c0db3c52229c493cfde437e86c754f3fcd59233";
const DEFAULT_DNS_IMAGE: &str = "docker/mcp-dns-forwarder:v1@sha256:a47b7362fdc78dd2cf8779c52ff782312a3758537e635b91529fddabaadbd4dd";

/// Images used for the sandbox sidecars.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyImages {
    /// TCP passthrough proxy image.
    pub l4: String,
    /// HTTP allow-list proxy image.
    pub l7: String,
    /// DNS forwarder image.
    pub dns: String,
}

impl Default for ProxyImages {
    fn default() -> Self {
        Self {
            l4: DEFAULT_L4_IMAGE.to_owned(),
            l7: DEFAULT_L7_IMAGE.to_owned(),
            dns: DEFAULT_DNS_IMAGE.to_owned(),
        }
    }
}

/// Debug switches and images for sandbox provisioning.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxOptions {
    /// Leave proxies and networks in place for post-mortem inspection.
    ///
    /// Failed provisioning skips its rollback, and teardown stops the
    /// proxies instead of removing them.
    pub keep_containers: bool,
    /// Start a DNS forwarder that logs every lookup the backend makes.
    pub debug_dns: bool,
    /// Sidecar images.
    pub images: ProxyImages,
}
