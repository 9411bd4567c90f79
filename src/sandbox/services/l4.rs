//! TCP passthrough proxies, one per hostname.

use super::naming::{L4_PROXY_PREFIX, SandboxNetworks, sidecar_name};
use super::rollback::Rollback;
use super::{SandboxError, SidecarKind};
use crate::sandbox::{
    domain::{ContainerLink, Proxy, SandboxOptions, TargetConfig},
    ports::{ContainerEngine, ContainerSpec},
};
use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

/// Starts one L4 proxy per distinct hostname, covering all of that host's
/// ports, and links each proxy into `target` under the hostname.
///
/// Returns the started container names.
pub(super) async fn start_l4_proxies<E: ContainerEngine + 'static>(
    engine: &E,
    rollback: &mut Rollback<E>,
    target: &mut TargetConfig,
    networks: &SandboxNetworks,
    proxies: &[&Proxy],
    options: &SandboxOptions,
) -> Result<Vec<String>, SandboxError> {
    if proxies.is_empty() {
        return Ok(Vec::new());
    }

    let image = &options.images.l4;
    engine
        .pull_image(image)
        .await
        .map_err(|source| SandboxError::PullImage {
            image: image.clone(),
            source,
        })?;

    let mut ports_by_host: BTreeMap<&str, BTreeSet<u16>> = BTreeMap::new();
    for proxy in proxies {
        ports_by_host
            .entry(proxy.hostname())
            .or_default()
            .insert(proxy.port());
    }

    let mut started = Vec::with_capacity(ports_by_host.len());
    for (hostname, ports) in ports_by_host {
        let name = sidecar_name(L4_PROXY_PREFIX);
        let ports_list = ports
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        info!(container = %name, hostname, ports = %ports_list, "starting l4 proxy");

        let spec = ContainerSpec {
            name: name.clone(),
            image: image.clone(),
            env: vec![
                format!("PROXY_HOSTNAME={hostname}"),
                format!("PROXY_PORTS={ports_list}"),
            ],
            labels: proxy_labels("l4"),
            networks: networks.both(),
            auto_remove: !options.keep_containers,
        };
        // Tracked first: a failed start can still leave a created container.
        rollback.track_container(&name);
        engine
            .start_container(&spec)
            .await
            .map_err(|source| SandboxError::StartContainer {
                kind: SidecarKind::L4Proxy,
                name: name.clone(),
                source,
            })?;

        target.add_link(ContainerLink::new(name.clone(), hostname));
        started.push(name);
    }

    Ok(started)
}

pub(super) fn proxy_labels(proxy_type: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("toolgate".to_owned(), "true".to_owned()),
        ("toolgate-proxy".to_owned(), "true".to_owned()),
        ("toolgate-proxy-type".to_owned(), proxy_type.to_owned()),
    ])
}
