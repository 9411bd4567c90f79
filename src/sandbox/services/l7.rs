//! The shared HTTP allow-list proxy.

use super::l4::proxy_labels;
use super::naming::{L7_PROXY_PREFIX, SandboxNetworks, sidecar_name};
use super::rollback::Rollback;
use super::{SandboxError, SidecarKind};
use crate::sandbox::{
    domain::{ContainerLink, Proxy, SandboxOptions, TargetConfig},
    ports::{ContainerEngine, ContainerSpec},
};
use std::collections::BTreeSet;
use tracing::info;

const L7_PROXY_PORT: u16 = 8080;

/// Starts a single L7 proxy allowing every HTTP target, links it into
/// `target` under each distinct hostname and points the target's
/// `http_proxy`/`https_proxy` at it.
///
/// Returns the container name, or `None` when there are no HTTP targets.
pub(super) async fn start_l7_proxy<E: ContainerEngine + 'static>(
    engine: &E,
    rollback: &mut Rollback<E>,
    target: &mut TargetConfig,
    networks: &SandboxNetworks,
    proxies: &[&Proxy],
    options: &SandboxOptions,
) -> Result<Option<String>, SandboxError> {
    if proxies.is_empty() {
        return Ok(None);
    }

    let image = &options.images.l7;
    engine
        .pull_image(image)
        .await
        .map_err(|source| SandboxError::PullImage {
            image: image.clone(),
            source,
        })?;

    let name = sidecar_name(L7_PROXY_PREFIX);
    let allowed_hosts = proxies
        .iter()
        .map(|proxy| proxy.host_port())
        .collect::<Vec<_>>()
        .join(",");
    info!(container = %name, allowed_hosts = %allowed_hosts, "starting l7 proxy");

    let spec = ContainerSpec {
        name: name.clone(),
        image: image.clone(),
        env: vec![format!("ALLOWED_HOSTS={allowed_hosts}")],
        labels: proxy_labels("l7"),
        networks: networks.both(),
        auto_remove: !options.keep_containers,
    };
    rollback.track_container(&name);
    engine
        .start_container(&spec)
        .await
        .map_err(|source| SandboxError::StartContainer {
            kind: SidecarKind::L7Proxy,
            name: name.clone(),
            source,
        })?;

    let hostnames: BTreeSet<&str> = proxies.iter().map(|proxy| proxy.hostname()).collect();
    for hostname in hostnames {
        target.add_link(ContainerLink::new(name.clone(), hostname));
    }
    target.add_env(format!("http_proxy={name}:{L7_PROXY_PORT}"));
    target.add_env(format!("https_proxy={name}:{L7_PROXY_PORT}"));

    Ok(Some(name))
}
