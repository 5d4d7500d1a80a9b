use eris::command::{Command, CommandRegistry, Invocation};
use eris::error::{Error, Result};
use eris::reply::Reply;
use eris::route::HttpRoute;

const NOT_IMPLEMENTED: &str = "Not implemented.";

/// Registers the update commands of the TCP line protocol.
///
/// # Errors
///
/// Fails when a command collides with an already registered one.
pub fn register_line_protocol<S: Send + 'static>(registry: &mut CommandRegistry<S>) -> Result<()> {
    registry.register(
        Command::new("restore-factory-preset", unsupported::<S>)
            .abbreviation("rfac")
            .help("Erase all data and setup and restore factory presets."),
    )
}

/// Registers the update routes of the HTTP interface.
///
/// # Errors
///
/// Fails when a route collides with an already registered one.
pub fn register_rest<S: Send + 'static>(registry: &mut CommandRegistry<S>) -> Result<()> {
    registry.register(
        Command::new("rollback-update", unsupported::<S>)
            .help("Roll the last update back.")
            .route(HttpRoute::post("/api/update/rollback")),
    )?;
    registry.register(
        Command::new("restore-factory-preset", unsupported::<S>)
            .help("Erase all data and setup and restore factory presets.")
            .route(HttpRoute::post("/api/update/factory")),
    )
}

async fn unsupported<S>(_: Invocation<S>) -> Result<Reply> {
    Err(Error::unsupported(NOT_IMPLEMENTED))
}

#[cfg(test)]
mod tests {
    use eris::command::CommandRegistry;
    use eris::error::ErrorKind;
    use eris::frame::{Arguments, Frame};

    use super::register_line_protocol;

    #[tokio::test]
    async fn factory_preset_is_unsupported() {
        let mut registry = CommandRegistry::new();
        register_line_protocol(&mut registry).unwrap();
        let dispatcher = registry.freeze();

        let error = dispatcher
            .dispatch((), Frame::new("rfac", Arguments::new()))
            .await
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Unsupported);
        assert_eq!(error.kind().code(), 38);
    }
}
