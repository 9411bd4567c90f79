//! Given steps for client pool BDD scenarios.

use super::world::PoolWorld;
use eyre::WrapErr;
use rstest_bdd_macros::given;
use toolgate::client_pool::domain::{
    ContainerLaunch, ServerDescriptor, ServerName, SessionConfig, SessionId,
};

fn container_server(name: &str) -> Result<ServerDescriptor, eyre::Report> {
    let server = ServerName::new(name).wrap_err("server name in scenario")?;
    let launch = ContainerLaunch::new(format!("mcp/{name}")).wrap_err("image in scenario")?;
    Ok(ServerDescriptor::container(server, launch))
}

#[given(r#"a long-lived container server "{name}""#)]
fn long_lived_server(world: &mut PoolWorld, name: String) -> Result<(), eyre::Report> {
    world.descriptor = Some(container_server(&name)?.with_long_lived(true));
    Ok(())
}

#[given(r#"a short-lived container server "{name}""#)]
fn short_lived_server(world: &mut PoolWorld, name: String) -> Result<(), eyre::Report> {
    world.descriptor = Some(container_server(&name)?);
    Ok(())
}

#[given(r#"a sandboxed container server "{name}" allowed to reach "{host}""#)]
fn sandboxed_server(
    world: &mut PoolWorld,
    name: String,
    host: String,
) -> Result<(), eyre::Report> {
    world.descriptor = Some(container_server(&name)?.with_allow_hosts([host]));
    Ok(())
}

#[given("a client session")]
fn client_session(world: &mut PoolWorld) {
    world.session = SessionConfig::for_session(SessionId::new());
}

#[given("the next handshake with the server fails")]
fn next_handshake_fails(world: &mut PoolWorld) -> Result<(), eyre::Report> {
    let server = world.descriptor()?.name().clone();
    world
        .connector
        .fail_next(&server, 1)
        .wrap_err("inject handshake failure")?;
    Ok(())
}
