//! In-memory integration tests for sandbox topologies.

use std::sync::Arc;

use rstest::{fixture, rstest};
use toolgate::sandbox::{
    adapters::memory::{EngineEvent, InMemoryContainerEngine},
    domain::{Proxy, ProxyProtocol, SandboxOptions},
    services::SandboxOrchestrator,
};

use super::helpers::orchestrator;

#[fixture]
fn engine() -> Arc<InMemoryContainerEngine> {
    Arc::new(InMemoryContainerEngine::new())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn sandboxes_are_isolated_from_each_other(engine: Arc<InMemoryContainerEngine>) {
    let provisioner = orchestrator(&engine, SandboxOptions::default());
    let (first_outcome, second_outcome) = tokio::join!(
        provisioner.provision_allow_list(&["a.com:443"]),
        provisioner.provision_allow_list(&["b.com:443", "cache:6379/tcp"]),
    );
    let first = first_outcome.expect("first sandbox should provision");
    let second = second_outcome.expect("second sandbox should provision");

    assert_ne!(first.target().network_name(), second.target().network_name());
    assert_eq!(engine.networks().expect("state").len(), 4);

    let (_, teardown) = first.into_parts();
    teardown.run().await.expect("teardown should succeed");

    let remaining: Vec<String> = engine
        .networks()
        .expect("state")
        .into_iter()
        .map(|spec| spec.name)
        .collect();
    let mut expected: Vec<String> = second
        .teardown()
        .networks()
        .into_iter()
        .map(str::to_owned)
        .collect();
    expected.sort_unstable();
    assert_eq!(remaining, expected);
    assert_eq!(engine.containers().expect("state").len(), 2);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn teardown_removes_proxies_before_networks(engine: Arc<InMemoryContainerEngine>) {
    let sandbox = orchestrator(&engine, SandboxOptions::default())
        .provision_allow_list(&["a.com:443", "db:5432/tcp"])
        .await
        .expect("provisioning should succeed");
    let (_, teardown) = sandbox.into_parts();

    teardown.run().await.expect("teardown should succeed");

    let events = engine.events().expect("state");
    let last_container = events
        .iter()
        .rposition(|event| matches!(event, EngineEvent::ContainerRemoved(_)))
        .expect("proxies should be removed");
    let first_network = events
        .iter()
        .position(|event| matches!(event, EngineEvent::NetworkRemoved(_)))
        .expect("networks should be removed");
    assert!(last_container < first_network);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn dns_forwarder_logs_are_followed_until_teardown(engine: Arc<InMemoryContainerEngine>) {
    engine
        .seed_logs(
            "toolgate-dns-forwarder-",
            vec![
                "[INFO] REQ: a.com. A".to_owned(),
                "[INFO] plugin/reload: Running".to_owned(),
            ],
        )
        .expect("log seeding should succeed");
    let options = SandboxOptions {
        debug_dns: true,
        ..SandboxOptions::default()
    };

    let sandbox = orchestrator(&engine, options)
        .provision_allow_list(&["a.com:443"])
        .await
        .expect("provisioning should succeed");
    let dns = sandbox.target().dns().expect("forwarder should resolve");
    assert!(
        engine
            .containers()
            .expect("state")
            .iter()
            .any(|spec| spec.name.starts_with("toolgate-dns-forwarder-"))
    );
    assert!(!dns.is_loopback());

    let (_, teardown) = sandbox.into_parts();
    teardown.run().await.expect("teardown should succeed");
    assert!(engine.containers().expect("state").is_empty());
}

#[rstest]
#[case("github.com:443", ProxyProtocol::Http, "github.com:443/http")]
#[case("db.internal:5432/tcp", ProxyProtocol::Tcp, "db.internal:5432/tcp")]
#[case("[2001:db8::1]:443/https", ProxyProtocol::Http, "[2001:db8::1]:443/http")]
fn allow_list_entries_parse_through_public_api(
    #[case] spec: &str,
    #[case] protocol: ProxyProtocol,
    #[case] display: &str,
) {
    let proxy = Proxy::parse(spec).expect("spec should parse");

    assert_eq!(proxy.protocol(), protocol);
    assert_eq!(proxy.to_string(), display);
}

#[rstest]
fn malformed_allow_lists_are_rejected_whole() {
    let parsed =
        SandboxOrchestrator::<InMemoryContainerEngine>::parse_allow_list(&["a.com:443", "nope"]);

    assert!(parsed.is_err());
}
