//! DNS forwarder used to observe a sandboxed backend's lookups.

use super::naming::{DNS_FORWARDER_PREFIX, SandboxNetworks, sidecar_name};
use super::readiness::{ReadinessPolicy, wait_for_running};
use super::rollback::Rollback;
use super::{SandboxError, SidecarKind};
use crate::sandbox::{
    domain::{SandboxOptions, TargetConfig},
    ports::{ContainerEngine, ContainerSpec, LogStream},
};
use futures::StreamExt;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

const QUERY_LOG_PREFIX: &str = "[INFO] REQ:";

/// Starts the forwarder, seeded with the proxies' addresses as static host
/// entries, and makes it the target's only resolver.
///
/// Returns the task relaying the forwarder's query log.
pub(super) async fn start_dns_forwarder<E: ContainerEngine + 'static>(
    engine: &Arc<E>,
    rollback: &mut Rollback<E>,
    target: &mut TargetConfig,
    networks: &SandboxNetworks,
    options: &SandboxOptions,
    readiness: ReadinessPolicy,
) -> Result<JoinHandle<()>, SandboxError> {
    info!("starting dns forwarder");

    let image = &options.images.dns;
    engine
        .pull_image(image)
        .await
        .map_err(|source| SandboxError::PullImage {
            image: image.clone(),
            source,
        })?;

    let name = sidecar_name(DNS_FORWARDER_PREFIX);
    let hosts_entries = resolve_hosts_entries(&**engine, target, &networks.internal).await?;

    // A container that fails to start may linger in the "created" state.
    rollback.track_container(&name);
    let spec = ContainerSpec {
        name: name.clone(),
        image: image.clone(),
        env: vec![format!("HOSTS_ENTRIES={}", hosts_entries.join("\n"))],
        labels: BTreeMap::new(),
        networks: networks.both(),
        auto_remove: false,
    };
    engine
        .start_container(&spec)
        .await
        .map_err(|source| SandboxError::StartContainer {
            kind: SidecarKind::DnsForwarder,
            name: name.clone(),
            source,
        })?;

    wait_for_running(&**engine, &name, readiness).await?;
    let address = address_on(&**engine, &name, &networks.internal).await?;
    target.route_dns_through(address);

    let logs = engine
        .read_logs(&name, true)
        .await
        .map_err(|source| SandboxError::ReadLogs {
            name: name.clone(),
            source,
        })?;
    Ok(tokio::spawn(relay_queries(name, logs)))
}

/// Builds one `address host...` line per proxy container from the links
/// added so far.
async fn resolve_hosts_entries<E: ContainerEngine + ?Sized>(
    engine: &E,
    target: &TargetConfig,
    network: &str,
) -> Result<Vec<String>, SandboxError> {
    let mut entries: BTreeMap<&str, String> = BTreeMap::new();
    for link in target.links() {
        if let Some(entry) = entries.get_mut(link.container()) {
            entry.push(' ');
            entry.push_str(link.alias());
            continue;
        }
        let address = address_on(engine, link.container(), network).await?;
        entries.insert(link.container(), format!("{address} {}", link.alias()));
    }
    Ok(entries.into_values().collect())
}

async fn address_on<E: ContainerEngine + ?Sized>(
    engine: &E,
    container: &str,
    network: &str,
) -> Result<std::net::IpAddr, SandboxError> {
    let inspection =
        engine
            .inspect_container(container)
            .await
            .map_err(|source| SandboxError::Inspect {
                name: container.to_owned(),
                source,
            })?;
    inspection
        .address_on(network)
        .ok_or_else(|| SandboxError::MissingAddress {
            container: container.to_owned(),
            network: network.to_owned(),
        })
}

async fn relay_queries(forwarder: String, mut logs: LogStream) {
    while let Some(line) = logs.next().await {
        match line {
            Ok(text) => {
                if let Some(query) = text.strip_prefix(QUERY_LOG_PREFIX) {
                    info!(forwarder = %forwarder, query = query.trim(), "dns lookup");
                }
            }
            Err(err) => {
                debug!(forwarder = %forwarder, error = %err, "dns forwarder log ended");
                break;
            }
        }
    }
}
