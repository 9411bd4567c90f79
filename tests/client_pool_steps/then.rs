//! Then steps for client pool BDD scenarios.

use super::world::PoolWorld;
use eyre::{WrapErr, eyre};
use rstest_bdd_macros::then;
use std::sync::Arc;
use toolgate::client_pool::services::ClientPoolError;

#[then("both acquisitions return the same client")]
fn same_client(world: &PoolWorld) -> Result<(), eyre::Report> {
    let [first, second] = world.acquired.as_slice() else {
        return Err(eyre!("expected two acquisitions, got {}", world.acquired.len()));
    };
    if !std::ptr::addr_eq(Arc::as_ptr(first), Arc::as_ptr(second)) {
        return Err(eyre!("acquisitions returned different clients"));
    }
    Ok(())
}

#[then("the server was initialized {count:usize} times")]
fn initialized_times(world: &PoolWorld, count: usize) -> Result<(), eyre::Report> {
    let attempts = world
        .connector
        .attempts(world.descriptor()?.name())
        .wrap_err("read connector state")?;
    if attempts != count {
        return Err(eyre!("expected {count} handshakes, found {attempts}"));
    }
    Ok(())
}

#[then("the client has been closed")]
fn client_closed(world: &PoolWorld) -> Result<(), eyre::Report> {
    let sessions = world
        .connector
        .sessions(world.descriptor()?.name())
        .wrap_err("read connector state")?;
    let session = sessions
        .first()
        .ok_or_else(|| eyre!("server never connected"))?;
    if !session.is_closed().wrap_err("read session state")? {
        return Err(eyre!("released client is still open"));
    }
    Ok(())
}

#[then("no sandbox containers or networks remain")]
fn sandbox_removed(world: &PoolWorld) -> Result<(), eyre::Report> {
    let containers = world.engine.containers().wrap_err("read engine state")?;
    let networks = world.engine.networks().wrap_err("read engine state")?;
    if !containers.is_empty() || !networks.is_empty() {
        return Err(eyre!(
            "sandbox left behind {} containers and {} networks",
            containers.len(),
            networks.len()
        ));
    }
    Ok(())
}

#[then("the acquisition fails with a handshake error")]
fn acquisition_fails(world: &PoolWorld) -> Result<(), eyre::Report> {
    let outcome = world
        .last_outcome
        .as_ref()
        .ok_or_else(|| eyre!("missing acquisition outcome"))?;
    match outcome {
        Err(ClientPoolError::Handshake { .. }) => Ok(()),
        Err(other) => Err(eyre!("expected a handshake error, got {other}")),
        Ok(_) => Err(eyre!("expected a handshake error, got a client")),
    }
}

#[then("the acquisition succeeds")]
fn acquisition_succeeds(world: &PoolWorld) -> Result<(), eyre::Report> {
    let outcome = world
        .last_outcome
        .as_ref()
        .ok_or_else(|| eyre!("missing acquisition outcome"))?;
    if let Err(err) = outcome {
        return Err(eyre!("expected success, got {err}"));
    }
    Ok(())
}
