use eris::command::{Command, CommandRegistry, Invocation};
use eris::error::{Error, Result};
use eris::reply::Reply;
use eris::route::HttpRoute;

use tracing::error;

/// Registers the help and echo commands of the TCP line protocol.
///
/// # Errors
///
/// Fails when a command collides with an already registered one.
pub fn register_line_protocol<S: Send + 'static>(registry: &mut CommandRegistry<S>) -> Result<()> {
    registry.register(
        Command::new("help", help::<S>)
            .abbreviation("?")
            .help("List all available commands."),
    )?;
    registry.register(Command::new("echo", echo::<S>).help("Reply with the arguments."))
}

/// Registers the index and catalog routes of the HTTP interface.
///
/// # Errors
///
/// Fails when a route collides with an already registered one.
pub fn register_rest<S: Send + 'static>(registry: &mut CommandRegistry<S>) -> Result<()> {
    registry.register(
        Command::new("api-index", index::<S>)
            .help("List all available endpoints.")
            .route(HttpRoute::get("/api")),
    )?;
    registry.register(
        Command::new("list-commands", commands::<S>)
            .help("Describe all available commands.")
            .route(HttpRoute::get("/api/commands")),
    )
}

async fn help<S>(invocation: Invocation<S>) -> Result<Reply> {
    Ok(Reply::text(invocation.catalog.help()))
}

async fn echo<S>(invocation: Invocation<S>) -> Result<Reply> {
    let size = invocation
        .arguments
        .iter()
        .map(|argument| argument.len() + 1)
        .sum::<usize>();

    let mut reply = Vec::new();
    reply.try_reserve_exact(size)?;
    for (index, argument) in invocation.arguments.iter().enumerate() {
        if index > 0 {
            reply.push(b' ');
        }
        reply.extend_from_slice(argument);
    }

    Ok(Reply::bytes(reply))
}

// One `METHOD path?parameters - help` line per route.
async fn index<S>(invocation: Invocation<S>) -> Result<Reply> {
    let mut index = String::new();
    for info in invocation.catalog.iter() {
        let Some(route) = &info.route else {
            continue;
        };

        index.push_str(&format!("{} {}", route.rest_kind, route.path));
        if !route.parameters.is_empty() {
            index.push('?');
            index.push_str(&route.parameters.join("&"));
        }
        if !info.help.is_empty() {
            index.push_str(" - ");
            index.push_str(info.help);
        }
        index.push('\n');
    }

    Ok(Reply::text(index))
}

async fn commands<S>(invocation: Invocation<S>) -> Result<Reply> {
    serde_json::to_vec(invocation.catalog.as_ref())
        .map(Reply::bytes)
        .map_err(|e| {
            error!("Unable to serialize the command catalog: {e}");
            Error::io_failure("Unable to describe the commands.")
        })
}
