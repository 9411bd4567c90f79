//! In-memory integration tests for the backend client pool.

use std::sync::Arc;

use futures::future::join_all;
use rstest::rstest;
use toolgate::client_pool::{
    domain::{BackendTransport, EnvBinding, PoolOptions, SecretBinding, SessionConfig, SessionId},
    ports::BackendClient,
    services::ClientPoolError,
};
use toolgate::sandbox::domain::SandboxOptions;

use super::helpers::{container_server, flag_values, gateway, launch_args};

fn keep_everything() -> PoolOptions {
    PoolOptions {
        long_lived: true,
        ..PoolOptions::default()
    }
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn kept_sandboxed_client_lives_until_pool_close() {
    let gateway = gateway(keep_everything());
    let descriptor = container_server("github")
        .with_allow_hosts(["api.github.com:443".to_owned(), "db:5432/tcp".to_owned()])
        .with_secret(SecretBinding::new("github.token", "GITHUB_TOKEN"))
        .with_secret_value("github.token", "ghp_x");
    let session = SessionConfig::for_session(SessionId::new());

    let client = gateway
        .pool
        .acquire(&descriptor, session)
        .await
        .expect("acquire should succeed");
    gateway.pool.release(&client).await.expect("release should succeed");

    let args = launch_args(&gateway.connector, "github");
    let networks = flag_values(&args, "--network");
    let [internal] = networks.as_slice() else {
        panic!("expected only the sandbox network, got {networks:?}");
    };
    assert!(internal.starts_with("toolgate-proxies-int-"));
    let links = flag_values(&args, "--link");
    assert_eq!(links.len(), 2);
    assert!(links.iter().any(|link| link.ends_with(":api.github.com")));
    assert!(links.iter().any(|link| link.ends_with(":db")));
    assert!(flag_values(&args, "-e").contains(&"GITHUB_TOKEN"));
    assert_eq!(gateway.engine.containers().expect("state").len(), 2);

    gateway.pool.close().await.expect("close should succeed");

    assert!(gateway.engine.containers().expect("state").is_empty());
    assert!(gateway.engine.networks().expect("state").is_empty());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn dns_debugging_routes_backend_through_forwarder() {
    let gateway = gateway(PoolOptions {
        sandbox: SandboxOptions {
            debug_dns: true,
            ..SandboxOptions::default()
        },
        ..PoolOptions::default()
    });
    let descriptor = container_server("fetch").with_allow_hosts(["example.com:443".to_owned()]);

    let client = gateway
        .pool
        .acquire(&descriptor, SessionConfig::anonymous())
        .await
        .expect("acquire should succeed");

    let args = launch_args(&gateway.connector, "fetch");
    assert_eq!(flag_values(&args, "--dns").len(), 1);
    assert!(flag_values(&args, "--link").is_empty());

    gateway.pool.release(&client).await.expect("release should succeed");
    assert!(gateway.engine.containers().expect("state").is_empty());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn kept_debug_containers_outlive_release() {
    let gateway = gateway(PoolOptions {
        sandbox: SandboxOptions {
            keep_containers: true,
            ..SandboxOptions::default()
        },
        ..PoolOptions::default()
    });
    let descriptor = container_server("fetch").with_allow_hosts(["example.com:443".to_owned()]);

    let client = gateway
        .pool
        .acquire(&descriptor, SessionConfig::anonymous())
        .await
        .expect("acquire should succeed");
    gateway.pool.release(&client).await.expect("release should succeed");

    let containers = gateway.engine.containers().expect("state");
    assert_eq!(containers.len(), 1);
    assert!(
        containers
            .iter()
            .all(|spec| !gateway.engine.is_running(&spec.name).expect("state"))
    );
    assert_eq!(gateway.engine.networks().expect("state").len(), 2);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn templated_configuration_reaches_the_container() {
    let gateway = gateway(PoolOptions::default());
    let descriptor = container_server("filesystem")
        .with_env(EnvBinding::new("LOG_LEVEL", "{{ filesystem.log_level }}"))
        .with_config(serde_json::json!({
            "filesystem": {"log_level": "debug", "paths": ["/srv/data"]}
        }));

    gateway
        .pool
        .acquire(&descriptor, SessionConfig::anonymous())
        .await
        .expect("acquire should succeed");

    let connections = gateway.connector.connections().expect("state");
    let record = connections.first().expect("one connection");
    let BackendTransport::ChildProcess(launch) = &record.transport else {
        panic!("expected a container launch");
    };
    assert!(launch.env.contains(&"LOG_LEVEL=debug".to_owned()));
    assert!(flag_values(&launch.args, "-e").contains(&"LOG_LEVEL"));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn many_sessions_acquire_concurrently() {
    let gateway = Arc::new(gateway(keep_everything()));
    let descriptor = container_server("memory");
    let sessions: Vec<SessionId> = (0..6).map(|_| SessionId::new()).collect();

    let acquisitions = sessions.iter().map(|id| {
        let shared = Arc::clone(&gateway);
        let server = descriptor.clone();
        let caller = SessionConfig::for_session(*id);
        async move { shared.pool.acquire(&server, caller).await }
    });
    let clients: Vec<Arc<dyn BackendClient>> = join_all(acquisitions)
        .await
        .into_iter()
        .collect::<Result<_, ClientPoolError>>()
        .expect("every acquire should succeed");

    assert_eq!(clients.len(), 6);
    assert_eq!(gateway.pool.kept_entries().await.len(), 6);
    assert_eq!(
        gateway
            .connector
            .attempts(descriptor.name())
            .expect("state"),
        6
    );
}
