use std::sync::Arc;

use eris::command::{Command, CommandRegistry, Invocation};
use eris::error::{Error, Result};
use eris::reply::Reply;
use eris::route::HttpRoute;

use eris_gpio::chip::Chip;

use crate::state::ApiState;
use crate::watchdog::Watchdog;

type WatchdogInvocation<C> = Invocation<ApiState<C>>;

fn watchdog<C: Chip>(invocation: &WatchdogInvocation<C>) -> Result<Arc<Watchdog>> {
    invocation
        .state
        .watchdog
        .clone()
        .ok_or_else(|| Error::io_failure("No watchdog available"))
}

/// Registers the watchdog commands of the TCP line protocol.
///
/// # Errors
///
/// Fails when a command collides with an already registered one.
pub fn register_line_protocol<C: Chip>(
    registry: &mut CommandRegistry<ApiState<C>>,
) -> Result<()> {
    registry.register(
        Command::new("keep-wdog-alive", keep_alive::<C>)
            .abbreviation("kwda")
            .help("Keep the watchdog alive."),
    )?;
    registry.register(
        Command::new("disable-wdog", disable::<C>)
            .abbreviation("dswd")
            .help("Disable the watchdog."),
    )
}

/// Registers the watchdog routes of the HTTP interface.
///
/// The feeder can only be driven from here.
///
/// # Errors
///
/// Fails when a route collides with an already registered one.
pub fn register_rest<C: Chip>(registry: &mut CommandRegistry<ApiState<C>>) -> Result<()> {
    registry.register(
        Command::new("keep-wdog-alive", keep_alive::<C>)
            .help("Keep the watchdog alive.")
            .route(HttpRoute::post("/api/watchdog")),
    )?;
    registry.register(
        Command::new("disable-wdog", disable::<C>)
            .help("Stop the feeder and disable the watchdog.")
            .route(HttpRoute::delete("/api/watchdog")),
    )?;
    registry.register(
        Command::new("get-wdog-feeder-status", feeder_status::<C>)
            .help("Tell whether the watchdog feeder is running.")
            .route(HttpRoute::get("/api/watchdog/feeder")),
    )?;
    registry.register(
        Command::new("start-wdog-feeder", start_feeder::<C>)
            .help("Start feeding the watchdog every second.")
            .route(HttpRoute::post("/api/watchdog/feeder")),
    )?;
    registry.register(
        Command::new("stop-wdog-feeder", stop_feeder::<C>)
            .help("Stop feeding the watchdog.")
            .route(HttpRoute::delete("/api/watchdog/feeder")),
    )
}

async fn keep_alive<C: Chip>(invocation: WatchdogInvocation<C>) -> Result<Reply> {
    invocation.expect_arguments(0)?;
    watchdog(&invocation)?.keep_alive().await?;
    Ok(Reply::ok())
}

async fn disable<C: Chip>(invocation: WatchdogInvocation<C>) -> Result<Reply> {
    invocation.expect_arguments(0)?;
    watchdog(&invocation)?.disable().await?;
    Ok(Reply::ok())
}

async fn feeder_status<C: Chip>(invocation: WatchdogInvocation<C>) -> Result<Reply> {
    let running = watchdog(&invocation)?.is_feeding();
    Ok(Reply::text(if running { "running" } else { "stopped" }))
}

async fn start_feeder<C: Chip>(invocation: WatchdogInvocation<C>) -> Result<Reply> {
    watchdog(&invocation)?.start_feeder()?;
    Ok(Reply::ok())
}

async fn stop_feeder<C: Chip>(invocation: WatchdogInvocation<C>) -> Result<Reply> {
    watchdog(&invocation)?.stop_feeder()?;
    Ok(Reply::ok())
}
