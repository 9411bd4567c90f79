//! Tests for pooled client acquisition, release and invalidation.

use std::sync::Arc;
use std::time::Duration;

use crate::client_pool::{
    adapters::memory::{InMemoryProtocolConnector, InMemoryToolRunner},
    domain::{
        BackendTransport, ClientKey, ContainerLaunch, OAuthSettings, PoolOptions, RemoteEndpoint,
        RemoteTransport, Root, ServerDescriptor, SessionConfig, SessionId, ToolContainer,
        ToolOutput,
    },
    ports::BackendClient,
    services::{CapabilityFanout, ClientPoolError},
};
use futures::future::join_all;
use rstest::rstest;
use serde_json::json;

use super::fixtures::{PoolHarness, container_server, fixed_instant, harness, server_name};

fn kept_options() -> PoolOptions {
    PoolOptions {
        long_lived: true,
        ..PoolOptions::default()
    }
}

fn session() -> SessionConfig {
    SessionConfig::for_session(SessionId::new())
}

fn same_client(left: &Arc<dyn BackendClient>, right: &Arc<dyn BackendClient>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(left), Arc::as_ptr(right))
}

fn oauth_server(name: &str) -> ServerDescriptor {
    let endpoint = RemoteEndpoint::new("https://mcp.example.com/mcp", RemoteTransport::StreamableHttp)
        .expect("valid endpoint");
    ServerDescriptor::remote(server_name(name), endpoint)
        .with_long_lived(true)
        .with_oauth(OAuthSettings {
            providers: vec![name.to_owned()],
        })
}

fn closed_counts(connector: &InMemoryProtocolConnector, name: &str) -> Vec<usize> {
    connector
        .sessions(&server_name(name))
        .expect("connector state")
        .iter()
        .map(|live| live.close_count().expect("session state"))
        .collect()
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn concurrent_acquires_share_one_creation() {
    let harness = harness(kept_options());
    harness
        .connector
        .delay_handshakes(Duration::from_millis(20))
        .expect("connector state");
    let descriptor = container_server("github");
    let caller = session();

    let outcomes = join_all((0..8).map(|_| harness.pool.acquire(&descriptor, caller))).await;

    let clients: Vec<Arc<dyn BackendClient>> = outcomes
        .into_iter()
        .map(|outcome| outcome.expect("acquire should succeed"))
        .collect();
    let first = clients.first().expect("eight clients");
    assert!(clients.iter().all(|client| same_client(first, client)));
    assert_eq!(
        harness.connector.attempts(&server_name("github")).expect("state"),
        1
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn kept_creation_outlives_a_cancelled_acquire() {
    let harness = harness(kept_options());
    harness
        .connector
        .delay_handshakes(Duration::from_millis(50))
        .expect("connector state");
    let descriptor = container_server("github");
    let caller = session();

    let cancelled = tokio::time::timeout(
        Duration::from_millis(5),
        harness.pool.acquire(&descriptor, caller),
    )
    .await;
    assert!(cancelled.is_err(), "acquire should still be connecting");

    harness
        .pool
        .acquire(&descriptor, caller)
        .await
        .expect("creation should finish without its first caller");
    assert_eq!(harness.connector.attempts(descriptor.name()).expect("state"), 1);
    let kept = harness.pool.kept_entries().await;
    assert_eq!(kept.len(), 1);
    assert!(kept.iter().all(|entry| entry.ready));
}

#[rstest]
#[tokio::test]
async fn cancelled_waiter_does_not_restart_creation() {
    let harness = harness(kept_options());
    harness
        .connector
        .delay_handshakes(Duration::from_millis(50))
        .expect("connector state");
    let descriptor = container_server("github");
    let caller = session();

    let (creator, waiter) = tokio::join!(
        harness.pool.acquire(&descriptor, caller),
        tokio::time::timeout(
            Duration::from_millis(5),
            harness.pool.acquire(&descriptor, caller),
        ),
    );

    creator.expect("creator should receive the client");
    assert!(waiter.is_err(), "waiter should time out mid-handshake");
    assert_eq!(harness.connector.attempts(descriptor.name()).expect("state"), 1);
    assert_eq!(
        harness
            .connector
            .sessions(descriptor.name())
            .expect("connector state")
            .len(),
        1
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn failed_kept_creation_is_retried() {
    let harness = harness(kept_options());
    let descriptor = container_server("github");
    let caller = session();
    harness
        .connector
        .fail_next(descriptor.name(), 1)
        .expect("failure injection should succeed");

    let first = harness.pool.acquire(&descriptor, caller).await;
    assert!(matches!(first, Err(ClientPoolError::Handshake { .. })));
    assert!(harness.pool.kept_entries().await.is_empty());

    harness
        .pool
        .acquire(&descriptor, caller)
        .await
        .expect("second acquire should succeed");
    assert_eq!(harness.connector.attempts(descriptor.name()).expect("state"), 2);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn released_short_lived_client_is_closed_once() {
    let harness = harness(PoolOptions::default());
    let descriptor = container_server("fetch");

    let client = harness
        .pool
        .acquire(&descriptor, session())
        .await
        .expect("acquire should succeed");
    assert!(!harness.pool.is_kept(&client).await);

    harness.pool.release(&client).await.expect("release should succeed");
    harness.pool.release(&client).await.expect("second release is a no-op");

    assert_eq!(closed_counts(&harness.connector, "fetch"), [1]);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn released_kept_client_stays_open_and_is_reused() {
    let harness = harness(PoolOptions::default());
    let descriptor = container_server("memory").with_long_lived(true);
    let caller = session();

    let first = harness
        .pool
        .acquire(&descriptor, caller)
        .await
        .expect("acquire should succeed");
    harness.pool.release(&first).await.expect("release should succeed");
    let second = harness
        .pool
        .acquire(&descriptor, caller)
        .await
        .expect("acquire should succeed");

    assert!(same_client(&first, &second));
    assert!(harness.pool.is_kept(&second).await);
    assert_eq!(closed_counts(&harness.connector, "memory"), [0]);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn separate_sessions_get_separate_clients() {
    let harness = harness(kept_options());
    let descriptor = container_server("memory");

    let first = harness
        .pool
        .acquire(&descriptor, session())
        .await
        .expect("acquire should succeed");
    let second = harness
        .pool
        .acquire(&descriptor, session())
        .await
        .expect("acquire should succeed");

    assert!(!same_client(&first, &second));
    assert_eq!(harness.pool.kept_entries().await.len(), 2);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn anonymous_callers_are_never_kept() {
    let harness = harness(kept_options());
    let descriptor = container_server("memory").with_long_lived(true);

    let first = harness
        .pool
        .acquire(&descriptor, SessionConfig::anonymous())
        .await
        .expect("acquire should succeed");
    let second = harness
        .pool
        .acquire(&descriptor, SessionConfig::anonymous())
        .await
        .expect("acquire should succeed");

    assert!(!same_client(&first, &second));
    assert!(harness.pool.kept_entries().await.is_empty());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn kept_entries_report_registration_time() {
    let harness = harness(kept_options());
    let caller = SessionId::new();
    for name in ["zeta", "alpha"] {
        harness
            .pool
            .acquire(&container_server(name), SessionConfig::for_session(caller))
            .await
            .expect("acquire should succeed");
    }

    let entries = harness.pool.kept_entries().await;

    let keys: Vec<ClientKey> = entries.iter().map(|entry| entry.key.clone()).collect();
    assert_eq!(
        keys,
        [
            ClientKey::new(server_name("alpha"), Some(caller)),
            ClientKey::new(server_name("zeta"), Some(caller)),
        ]
    );
    assert!(entries.iter().all(|entry| entry.ready));
    assert!(entries.iter().all(|entry| entry.created_at == fixed_instant()));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn invalidation_closes_oauth_clients_and_reconnects() {
    let harness = harness(PoolOptions::default());
    let descriptor = oauth_server("notion");
    let caller = session();
    let first = harness
        .pool
        .acquire(&descriptor, caller)
        .await
        .expect("acquire should succeed");
    harness
        .pool
        .acquire(&container_server("memory").with_long_lived(true), caller)
        .await
        .expect("acquire should succeed");

    assert_eq!(harness.pool.invalidate_for_provider("notion").await, 1);
    assert_eq!(harness.pool.invalidate_for_provider("notion").await, 0);
    assert_eq!(harness.pool.invalidate_for_provider("memory").await, 0);

    let second = harness
        .pool
        .acquire(&descriptor, caller)
        .await
        .expect("acquire should succeed");
    assert!(!same_client(&first, &second));
    assert_eq!(closed_counts(&harness.connector, "notion"), [1, 0]);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn closing_the_pool_closes_every_kept_client() {
    let harness = harness(kept_options());
    let caller = session();
    for name in ["memory", "github"] {
        harness
            .pool
            .acquire(&container_server(name), caller)
            .await
            .expect("acquire should succeed");
    }

    harness.pool.close().await.expect("close should succeed");

    assert!(harness.pool.kept_entries().await.is_empty());
    assert_eq!(closed_counts(&harness.connector, "memory"), [1]);
    assert_eq!(closed_counts(&harness.connector, "github"), [1]);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn root_updates_reach_only_the_session_clients() {
    let harness = harness(kept_options());
    let caller = SessionId::new();
    harness
        .pool
        .acquire(&container_server("fs"), SessionConfig::for_session(caller))
        .await
        .expect("acquire should succeed");
    harness
        .pool
        .acquire(&container_server("other"), session())
        .await
        .expect("acquire should succeed");

    harness
        .pool
        .update_roots(caller, vec![Root::new("file:///repo")])
        .await;

    let fs = harness.connector.sessions(&server_name("fs")).expect("state");
    let other = harness.connector.sessions(&server_name("other")).expect("state");
    assert_eq!(
        fs.first().expect("fs session").roots().expect("state"),
        [Root::new("file:///repo")]
    );
    assert!(other.first().expect("other session").roots().expect("state").is_empty());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn sandboxed_client_release_removes_topology() {
    let harness = harness(PoolOptions::default());
    let descriptor =
        container_server("fetch").with_allow_hosts(["api.example.com:443".to_owned()]);

    let client = harness
        .pool
        .acquire(&descriptor, session())
        .await
        .expect("acquire should succeed");
    assert_eq!(harness.engine.networks().expect("state").len(), 2);
    let connections = harness.connector.connections().expect("state");
    let record = connections.first().expect("one connection");
    let BackendTransport::ChildProcess(launch) = &record.transport else {
        panic!("expected a container launch, got {:?}", record.transport);
    };
    assert!(launch.args.iter().any(|arg| arg.starts_with("toolgate-proxies-int-")));

    harness.pool.release(&client).await.expect("release should succeed");

    assert!(harness.engine.containers().expect("state").is_empty());
    assert!(harness.engine.networks().expect("state").is_empty());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn failed_handshake_tears_sandbox_down() {
    let harness = harness(PoolOptions::default());
    let descriptor =
        container_server("fetch").with_allow_hosts(["api.example.com:443".to_owned()]);
    harness
        .connector
        .fail_next(descriptor.name(), 1)
        .expect("failure injection should succeed");

    let outcome = harness.pool.acquire(&descriptor, session()).await;

    assert!(matches!(outcome, Err(ClientPoolError::Handshake { .. })));
    assert!(harness.engine.containers().expect("state").is_empty());
    assert!(harness.engine.networks().expect("state").is_empty());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn invalid_allow_list_fails_before_connecting() {
    let harness = harness(PoolOptions::default());
    let descriptor = container_server("fetch").with_allow_hosts(["api.example.com".to_owned()]);

    let outcome = harness.pool.acquire(&descriptor, session()).await;

    assert!(matches!(outcome, Err(ClientPoolError::Sandbox { .. })));
    assert_eq!(harness.connector.attempts(descriptor.name()).expect("state"), 0);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn slow_handshake_times_out() {
    let harness = harness(PoolOptions {
        init_timeout_ms: 5,
        ..PoolOptions::default()
    });
    harness
        .connector
        .delay_handshakes(Duration::from_millis(200))
        .expect("connector state");

    let outcome = harness
        .pool
        .acquire(&container_server("slow"), session())
        .await;

    assert!(matches!(
        outcome,
        Err(ClientPoolError::HandshakeTimeout { timeout, .. }) if timeout == Duration::from_millis(5)
    ));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn static_mode_bridges_container_servers() {
    let harness = harness(PoolOptions {
        static_mode: true,
        ..PoolOptions::default()
    });

    harness
        .pool
        .acquire(&container_server("github"), session())
        .await
        .expect("acquire should succeed");

    let connections = harness.connector.connections().expect("state");
    let record = connections.first().expect("one connection");
    assert!(matches!(
        &record.transport,
        BackendTransport::ChildProcess(launch)
            if launch.program == "socat" && launch.args == ["STDIO", "TCP:mcp-github:4444"]
    ));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn shared_networks_apply_to_later_clients() {
    let harness = harness(PoolOptions::default());
    harness.pool.set_networks(vec!["gateway-net".to_owned()]);
    assert_eq!(harness.pool.networks(), ["gateway-net"]);

    harness
        .pool
        .acquire(&container_server("fetch"), session())
        .await
        .expect("acquire should succeed");

    let connections = harness.connector.connections().expect("state");
    let record = connections.first().expect("one connection");
    let BackendTransport::ChildProcess(launch) = &record.transport else {
        panic!("expected a container launch, got {:?}", record.transport);
    };
    assert!(
        launch
            .args
            .windows(2)
            .any(|pair| pair == ["--network", "gateway-net"])
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn fanout_skips_failing_backends() {
    let PoolHarness {
        pool, connector, ..
    } = harness(PoolOptions::default());
    connector
        .respond(&server_name("alpha"), "tools/list", json!({"tools": ["a"]}))
        .expect("connector state");
    connector
        .fail_next(&server_name("broken"), 1)
        .expect("failure injection should succeed");
    let servers = [
        container_server("alpha"),
        container_server("broken"),
        container_server("beta"),
    ];
    let fanout = CapabilityFanout::new(Arc::new(pool)).with_parallelism(2);

    let mut responses = fanout
        .request_all(&servers, session(), "tools/list", &json!({}))
        .await;
    responses.sort_by(|left, right| left.server.cmp(&right.server));

    let answered: Vec<&str> = responses.iter().map(|response| response.server.as_str()).collect();
    assert_eq!(answered, ["alpha", "beta"]);
    assert_eq!(
        responses.first().map(|response| &response.result),
        Some(&json!({"tools": ["a"]}))
    );
    assert_eq!(closed_counts(&connector, "alpha"), [1]);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn tool_container_runs_once_on_the_gateway_networks() {
    let harness = harness(PoolOptions::default());
    harness.pool.set_networks(vec!["gateway-net".to_owned()]);
    let runner = Arc::new(InMemoryToolRunner::new());
    runner
        .respond(ToolOutput {
            text: "no such file".to_owned(),
            is_error: true,
        })
        .expect("runner state");
    harness.pool.set_tool_runner(Arc::clone(&runner) as _);
    let tool = ToolContainer::new(
        server_name("cat"),
        ContainerLaunch::new("mcp/cat")
            .expect("valid image")
            .with_command(["cat".to_owned(), "{{ path }}".to_owned()]),
    );

    let output = harness
        .pool
        .run_tool_container(&tool, &json!({"path": "/missing"}))
        .await
        .expect("tool should run");

    assert!(output.is_error);
    assert_eq!(output.text, "no such file");
    let launches = runner.launches().expect("runner state");
    let [launch] = launches.as_slice() else {
        panic!("expected one launch, got {launches:?}");
    };
    assert_eq!(launch.program, "docker");
    assert!(launch.args.ends_with(&[
        "gateway-net".to_owned(),
        "mcp/cat".to_owned(),
        "cat".to_owned(),
        "/missing".to_owned(),
    ]));
    assert!(harness.pool.kept_entries().await.is_empty());
    assert!(harness.engine.containers().expect("state").is_empty());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn malformed_tool_template_is_reported() {
    let harness = harness(PoolOptions::default());
    let runner = Arc::new(InMemoryToolRunner::new());
    harness.pool.set_tool_runner(Arc::clone(&runner) as _);
    let tool = ToolContainer::new(
        server_name("echo"),
        ContainerLaunch::new("mcp/echo")
            .expect("valid image")
            .with_command(["echo".to_owned(), "{{ }}".to_owned()]),
    );

    let result = harness.pool.run_tool_container(&tool, &json!({})).await;

    assert!(matches!(result, Err(ClientPoolError::Template { .. })));
    assert!(runner.launches().expect("runner state").is_empty());
}
