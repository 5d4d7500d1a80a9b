use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use hashbrown::{DefaultHashBuilder, HashMap};

use indexmap::map::IndexMap;

use log::error;

use serde::Serialize;

use crate::dispatch::Dispatcher;
use crate::error::{Error, Result};
use crate::frame::Arguments;
use crate::reply::Reply;
use crate::route::{HttpRoute, RestKind};

/// The future returned by a command handler.
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<Reply>> + Send>>;

pub(crate) type Handler<S> = Arc<dyn Fn(Invocation<S>) -> HandlerFuture + Send + Sync>;

/// Everything a handler receives for a single request.
#[derive(Debug)]
pub struct Invocation<S> {
    /// The full name of the invoked command.
    pub command: &'static str,
    /// The binding state.
    pub state: S,
    /// The request arguments.
    pub arguments: Arguments,
    /// The read-only description of every registered command.
    pub catalog: Arc<Catalog>,
}

impl<S> Invocation<S> {
    /// Checks that the command received exactly `count` arguments.
    ///
    /// # Errors
    ///
    /// Fails with an [`crate::error::ErrorKind::InvalidArgument`] error on a
    /// count mismatch.
    #[inline]
    pub fn expect_arguments(&self, count: usize) -> Result<()> {
        self.arguments.expect(self.command, count)
    }
}

/// A named operation.
///
/// A command has a full name, an optional abbreviation, a help text and
/// an optional HTTP route, and runs a handler turning an [`Invocation`]
/// into a [`Reply`] or an [`Error`].
pub struct Command<S> {
    // Full name.
    name: &'static str,
    // Short alias.
    abbreviation: Option<&'static str>,
    // Help text.
    help: &'static str,
    // HTTP binding.
    route: Option<HttpRoute>,
    // Handler.
    handler: Handler<S>,
}

impl<S> Clone for Command<S> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            abbreviation: self.abbreviation,
            help: self.help,
            route: self.route.clone(),
            handler: Arc::clone(&self.handler),
        }
    }
}

impl<S> std::fmt::Debug for Command<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("abbreviation", &self.abbreviation)
            .field("route", &self.route)
            .finish_non_exhaustive()
    }
}

impl<S: 'static> Command<S> {
    /// Creates a [`Command`] from its full name and its handler.
    #[must_use]
    pub fn new<F, Fut>(name: &'static str, handler: F) -> Self
    where
        F: Fn(Invocation<S>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Reply>> + Send + 'static,
    {
        Self {
            name,
            abbreviation: None,
            help: "",
            route: None,
            handler: Arc::new(move |invocation: Invocation<S>| -> HandlerFuture {
                Box::pin(handler(invocation))
            }),
        }
    }

    /// Sets the abbreviation.
    #[must_use]
    #[inline]
    pub const fn abbreviation(mut self, abbreviation: &'static str) -> Self {
        self.abbreviation = Some(abbreviation);
        self
    }

    /// Sets the help text.
    #[must_use]
    #[inline]
    pub const fn help(mut self, help: &'static str) -> Self {
        self.help = help;
        self
    }

    /// Binds the command to an HTTP route.
    #[must_use]
    #[inline]
    pub fn route(mut self, route: HttpRoute) -> Self {
        self.route = Some(route);
        self
    }
}

impl<S> Command<S> {
    /// Returns the full name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the abbreviation, if any.
    #[must_use]
    pub const fn short_name(&self) -> Option<&'static str> {
        self.abbreviation
    }

    /// Returns the help text.
    #[must_use]
    pub const fn help_text(&self) -> &'static str {
        self.help
    }

    /// Returns the HTTP route, if any.
    #[must_use]
    pub const fn http_route(&self) -> Option<&HttpRoute> {
        self.route.as_ref()
    }

    pub(crate) fn run(&self, invocation: Invocation<S>) -> HandlerFuture {
        (self.handler)(invocation)
    }

    fn info(&self) -> CommandInfo {
        CommandInfo {
            name: self.name,
            abbreviation: self.abbreviation,
            help: self.help,
            route: self.route.clone(),
        }
    }
}

/// Serializable description of a registered command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandInfo {
    /// Full name.
    pub name: &'static str,
    /// Abbreviation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abbreviation: Option<&'static str>,
    /// Help text.
    pub help: &'static str,
    /// HTTP route.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route: Option<HttpRoute>,
}

/// The description of every registered command, in registration order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct Catalog(Vec<CommandInfo>);

impl Catalog {
    /// Returns an iterator over the command descriptions.
    pub fn iter(&self) -> std::slice::Iter<'_, CommandInfo> {
        self.0.iter()
    }

    /// Formats one `name (abbreviation) - help` line per command.
    #[must_use]
    pub fn help(&self) -> String {
        let mut help = String::new();
        for info in &self.0 {
            help.push_str(info.name);
            if let Some(abbreviation) = info.abbreviation {
                help.push_str(" (");
                help.push_str(abbreviation);
                help.push(')');
            }
            if !info.help.is_empty() {
                help.push_str(" - ");
                help.push_str(info.help);
            }
            help.push('\n');
        }
        help
    }
}

impl<'a> IntoIterator for &'a Catalog {
    type Item = &'a CommandInfo;
    type IntoIter = std::slice::Iter<'a, CommandInfo>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// The boot-time command table.
///
/// Every API module appends its commands here. Once all modules are
/// registered, [`CommandRegistry::freeze`] turns the registry into a
/// read-only [`Dispatcher`].
pub struct CommandRegistry<S> {
    // Commands in registration order.
    commands: Vec<Command<S>>,
    // Lowercase full names.
    names: HashMap<String, usize>,
    // Lowercase abbreviations.
    abbreviations: HashMap<String, usize>,
    // HTTP routes.
    routes: IndexMap<(RestKind, String), usize, DefaultHashBuilder>,
}

impl<S> Default for CommandRegistry<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> std::fmt::Debug for CommandRegistry<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.commands.iter()).finish()
    }
}

impl<S> CommandRegistry<S> {
    /// Creates an empty [`CommandRegistry`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            commands: Vec::new(),
            names: HashMap::new(),
            abbreviations: HashMap::new(),
            routes: IndexMap::with_hasher(DefaultHashBuilder::default()),
        }
    }

    /// Registers a command.
    ///
    /// # Errors
    ///
    /// The command is rejected when its full name or its abbreviation
    /// collides with the name or abbreviation of an already registered
    /// command, or when its HTTP route is already bound.
    pub fn register(&mut self, command: Command<S>) -> Result<()> {
        let name = command.name.to_ascii_lowercase();
        if name.is_empty() {
            return Err(Self::reject("A command name cannot be empty.".into()));
        }

        if self.is_taken(&name) {
            return Err(Self::reject(format!(
                "Command `{}` is already registered.",
                command.name
            )));
        }

        let abbreviation = command.abbreviation.map(str::to_ascii_lowercase);
        if let Some(abbreviation) = &abbreviation
            && (abbreviation.is_empty() || abbreviation == &name || self.is_taken(abbreviation))
        {
            return Err(Self::reject(format!(
                "Abbreviation `{abbreviation}` of command `{}` is already registered.",
                command.name
            )));
        }

        let route = command.route.as_ref().map(HttpRoute::key);
        if let Some(route) = &route
            && self.routes.contains_key(route)
        {
            return Err(Self::reject(format!(
                "Route `{} {}` of command `{}` is already registered.",
                route.0, route.1, command.name
            )));
        }

        let index = self.commands.len();
        self.names.insert(name, index);
        if let Some(abbreviation) = abbreviation {
            self.abbreviations.insert(abbreviation, index);
        }
        if let Some(route) = route {
            self.routes.insert(route, index);
        }
        self.commands.push(command);

        Ok(())
    }

    /// Freezes the registry into a read-only [`Dispatcher`].
    #[must_use]
    pub fn freeze(self) -> Dispatcher<S> {
        let catalog = Catalog(self.commands.iter().map(Command::info).collect());
        Dispatcher::new(
            self.commands,
            self.names,
            self.abbreviations,
            self.routes,
            Arc::new(catalog),
        )
    }

    fn is_taken(&self, key: &str) -> bool {
        self.names.contains_key(key) || self.abbreviations.contains_key(key)
    }

    fn reject(description: String) -> Error {
        error!("{description}");
        Error::invalid_argument(description)
    }
}
