//! The commands exposed by the servers.
//!
//! Each module registers its commands twice: once for the TCP line
//! protocol, keyed by name and abbreviation, and once for the HTTP
//! interface, keyed by method and path.

/// GPIO commands.
pub mod gpio;
/// Help, echo and catalog commands.
pub mod system;
/// Update commands.
pub mod update;
/// Watchdog commands.
pub mod watchdog;

use eris::command::{CommandRegistry, Invocation};
use eris::dispatch::Dispatcher;
use eris::error::{Error, Result as ApiResult};

use eris_gpio::chip::Chip;

use crate::error::Result;
use crate::state::ApiState;

/// Builds the dispatcher of the TCP line protocol.
///
/// # Errors
///
/// Fails when two commands collide.
pub fn line_protocol<C: Chip>() -> Result<Dispatcher<ApiState<C>>> {
    let mut registry = CommandRegistry::new();
    system::register_line_protocol(&mut registry)?;
    gpio::register_line_protocol(&mut registry)?;
    watchdog::register_line_protocol(&mut registry)?;
    update::register_line_protocol(&mut registry)?;
    Ok(registry.freeze())
}

/// Builds the dispatcher of the HTTP interface.
///
/// # Errors
///
/// Fails when two routes collide.
pub fn rest<C: Chip>() -> Result<Dispatcher<ApiState<C>>> {
    let mut registry = CommandRegistry::new();
    system::register_rest(&mut registry)?;
    gpio::register_rest(&mut registry)?;
    watchdog::register_rest(&mut registry)?;
    update::register_rest(&mut registry)?;
    Ok(registry.freeze())
}

// Returns the argument bound to a declared query parameter.
fn required<'a, S>(
    invocation: &'a Invocation<S>,
    index: usize,
    missing: &'static str,
) -> ApiResult<&'a str> {
    if index >= invocation.arguments.len() {
        return Err(Error::invalid_argument(missing));
    }
    invocation.arguments.text(index)
}
