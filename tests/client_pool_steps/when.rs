//! When steps for client pool BDD scenarios.

use super::world::{PoolWorld, run_async};
use eyre::WrapErr;
use rstest_bdd_macros::when;

#[when("the server is acquired")]
fn acquire_server(world: &mut PoolWorld) -> Result<(), eyre::Report> {
    let descriptor = world.descriptor()?.clone();
    let outcome = run_async(world.pool.acquire(&descriptor, world.session));
    if let Ok(ref client) = outcome {
        world.acquired.push(std::sync::Arc::clone(client));
    }
    world.last_outcome = Some(outcome);
    Ok(())
}

#[when("the server is acquired twice in the session")]
fn acquire_server_twice(world: &mut PoolWorld) -> Result<(), eyre::Report> {
    let descriptor = world.descriptor()?.clone();
    for _ in 0..2 {
        let client = run_async(world.pool.acquire(&descriptor, world.session))
            .wrap_err("acquire server in scenario")?;
        world.acquired.push(client);
    }
    Ok(())
}

#[when("the server is acquired and released")]
fn acquire_and_release(world: &mut PoolWorld) -> Result<(), eyre::Report> {
    let descriptor = world.descriptor()?.clone();
    let client = run_async(world.pool.acquire(&descriptor, world.session))
        .wrap_err("acquire server in scenario")?;
    run_async(world.pool.release(&client)).wrap_err("release server in scenario")?;
    world.acquired.push(client);
    Ok(())
}
