use std::sync::Arc;

use hashbrown::{DefaultHashBuilder, HashMap};

use indexmap::map::IndexMap;

use log::{debug, warn};

use crate::command::{Catalog, Command, Invocation};
use crate::error::{Error, Result};
use crate::frame::{Arguments, Frame};
use crate::reply::Reply;
use crate::route::{HttpRoute, RestKind};

/// Description of the error returned for an unknown command.
pub const UNKNOWN_COMMAND: &str = "Unknown command.";

/// A read-only command table.
///
/// A [`Dispatcher`] is obtained by freezing a
/// [`crate::command::CommandRegistry`], so no command can be added once the
/// servers are running. It is usually shared behind an [`Arc`].
pub struct Dispatcher<S> {
    // Commands in registration order.
    commands: Vec<Command<S>>,
    // Lowercase full names.
    names: HashMap<String, usize>,
    // Lowercase abbreviations.
    abbreviations: HashMap<String, usize>,
    // HTTP routes.
    routes: IndexMap<(RestKind, String), usize, DefaultHashBuilder>,
    // Serializable description of the commands.
    catalog: Arc<Catalog>,
}

impl<S> std::fmt::Debug for Dispatcher<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("catalog", &self.catalog)
            .finish_non_exhaustive()
    }
}

impl<S> Dispatcher<S> {
    pub(crate) fn new(
        commands: Vec<Command<S>>,
        names: HashMap<String, usize>,
        abbreviations: HashMap<String, usize>,
        routes: IndexMap<(RestKind, String), usize, DefaultHashBuilder>,
        catalog: Arc<Catalog>,
    ) -> Self {
        Self {
            commands,
            names,
            abbreviations,
            routes,
            catalog,
        }
    }

    /// Looks a command up by full name first, then by abbreviation.
    ///
    /// The lookup ignores the ASCII case.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<&Command<S>> {
        let name = name.to_ascii_lowercase();
        self.names
            .get(&name)
            .or_else(|| self.abbreviations.get(&name))
            .and_then(|index| self.commands.get(*index))
    }

    /// Looks a command up by HTTP method and path.
    ///
    /// The path is matched ignoring the ASCII case.
    #[must_use]
    pub fn lookup_route(&self, rest_kind: RestKind, path: &str) -> Option<&Command<S>> {
        self.routes
            .get(&(rest_kind, path.to_ascii_lowercase()))
            .and_then(|index| self.commands.get(*index))
    }

    /// Returns an iterator over the HTTP routes, in registration order.
    pub fn routes(&self) -> impl Iterator<Item = &HttpRoute> {
        self.routes
            .values()
            .filter_map(|index| self.commands.get(*index))
            .filter_map(Command::http_route)
    }

    /// Returns the catalog of the registered commands.
    #[must_use]
    pub const fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Returns the number of commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Checks whether the dispatcher has no commands.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Runs `command` with the given state and arguments.
    ///
    /// # Errors
    ///
    /// Returns the error produced by the handler.
    pub async fn run(&self, command: &Command<S>, state: S, arguments: Arguments) -> Result<Reply> {
        debug!(
            "Running `{}` with {} argument(s)",
            command.name(),
            arguments.len()
        );

        let outcome = command
            .run(Invocation {
                command: command.name(),
                state,
                arguments,
                catalog: Arc::clone(&self.catalog),
            })
            .await;

        if let Err(error) = &outcome {
            if error.kind().is_transient() {
                warn!("`{}` failed, a retry may succeed: {error}", command.name());
            } else {
                debug!("`{}` failed: {error}", command.name());
            }
        }

        outcome
    }

    /// Looks a parsed TCP frame up and runs its command.
    ///
    /// # Errors
    ///
    /// Fails with an [`crate::error::ErrorKind::Unsupported`] error when no
    /// command matches, otherwise returns the error produced by the handler.
    pub async fn dispatch(&self, state: S, frame: Frame) -> Result<Reply> {
        let (name, arguments) = frame.into_parts();
        let Some(command) = self.lookup(&name) else {
            warn!("Unknown command `{name}`");
            return Err(Error::unsupported(UNKNOWN_COMMAND));
        };

        self.run(command, state, arguments).await
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use crate::command::{Command, CommandRegistry, Invocation};
    use crate::error::{Error, ErrorKind, Result};
    use crate::frame::{Arguments, Frame, Request, decode};
    use crate::reply::Reply;
    use crate::route::{HttpRoute, RestKind};

    use super::{Dispatcher, UNKNOWN_COMMAND};

    async fn echo(invocation: Invocation<u32>) -> Result<Reply> {
        let mut arguments = Vec::new();
        for argument in &invocation.arguments {
            arguments.push(argument.as_ref());
        }
        Ok(Reply::bytes(Bytes::from(arguments.join(&b' '))))
    }

    async fn state(invocation: Invocation<u32>) -> Result<Reply> {
        invocation.expect_arguments(0)?;
        Ok(Reply::text(invocation.state.to_string()))
    }

    async fn fail(_: Invocation<u32>) -> Result<Reply> {
        Err(Error::wrong_mode("GPIO line not reserved for input."))
    }

    async fn busy(_: Invocation<u32>) -> Result<Reply> {
        Err(Error::already_reserved("The GPIO line is already reserved."))
    }

    fn dispatcher() -> Dispatcher<u32> {
        let mut registry = CommandRegistry::new();
        registry
            .register(
                Command::new("echo", echo)
                    .abbreviation("ec")
                    .help("Reply with the arguments"),
            )
            .unwrap();
        registry
            .register(
                Command::new("get-state", state)
                    .abbreviation("gst")
                    .route(HttpRoute::get("/api/state")),
            )
            .unwrap();
        registry
            .register(
                Command::new("read-gpio-value", fail)
                    .route(HttpRoute::get("/api/gpio/value").with_parameters(&["name"])),
            )
            .unwrap();
        registry.freeze()
    }

    fn frame(input: &[u8]) -> Frame {
        match decode(input).unwrap() {
            Request::Frame(frame) => frame,
            Request::Close => panic!("Unexpected close request"),
        }
    }

    #[tokio::test]
    async fn dispatch_by_name_and_abbreviation() {
        let dispatcher = dispatcher();

        let reply = dispatcher
            .dispatch(0, frame(b"REQ echo -1 hello world\n"))
            .await
            .unwrap();
        assert_eq!(reply.payload(), b"hello world");

        let reply = dispatcher.dispatch(7, frame(b"REQ GST\n")).await.unwrap();
        assert_eq!(reply.payload(), b"7");

        let reply = dispatcher.dispatch(7, frame(b"REQ Get-State\n")).await.unwrap();
        assert_eq!(reply.payload(), b"7");
    }

    #[tokio::test]
    async fn unknown_command() {
        let error = dispatcher()
            .dispatch(0, Frame::new("reboot", Arguments::new()))
            .await
            .unwrap_err();

        assert_eq!(error.kind(), ErrorKind::Unsupported);
        assert_eq!(error.description(), UNKNOWN_COMMAND);
    }

    #[tokio::test]
    async fn handler_errors_are_returned() {
        let dispatcher = dispatcher();

        let error = dispatcher
            .dispatch(0, frame(b"REQ get-state -1 extra\n"))
            .await
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::InvalidArgument);
        assert_eq!(error.description(), "get-state doesn't take any argument.");

        let error = dispatcher
            .dispatch(0, frame(b"REQ read-gpio-value -1 LED\n"))
            .await
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::WrongMode);
    }

    #[tokio::test]
    async fn route_lookup() {
        let dispatcher = dispatcher();

        let command = dispatcher
            .lookup_route(RestKind::Get, "/API/State")
            .unwrap();
        assert_eq!(command.name(), "get-state");

        let reply = dispatcher
            .run(command, 3, Arguments::new())
            .await
            .unwrap();
        assert_eq!(reply.payload(), b"3");

        assert!(dispatcher.lookup_route(RestKind::Post, "/api/state").is_none());
        assert_eq!(dispatcher.routes().count(), 2);
    }

    #[tokio::test]
    async fn transient_failures_are_returned() {
        let mut registry = CommandRegistry::new();
        registry
            .register(Command::new("busy", busy))
            .unwrap();
        let dispatcher = registry.freeze();

        let error = dispatcher.dispatch(0, frame(b"REQ busy\n")).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::AlreadyReserved);
        assert!(error.kind().is_transient());
    }

    #[test]
    fn command_count() {
        let dispatcher = dispatcher();
        assert_eq!(dispatcher.len(), 3);
        assert!(!dispatcher.is_empty());

        assert!(CommandRegistry::<u32>::new().freeze().is_empty());
    }

    #[test]
    fn catalog_serialization() {
        let dispatcher = dispatcher();
        let catalog = serde_json::to_value(dispatcher.catalog().as_ref()).unwrap();

        assert_eq!(
            catalog[0],
            serde_json::json!({
                "name": "echo",
                "abbreviation": "ec",
                "help": "Reply with the arguments",
            })
        );
        assert_eq!(
            catalog[2]["route"],
            serde_json::json!({
                "method": "Get",
                "path": "/api/gpio/value",
                "parameters": ["name"],
            })
        );
    }
}
