//! `eris` is the transport-independent core of the Eris device API.
//!
//! A management client talks to a board through one of two bindings: a
//! persistent line-oriented TCP session or an HTTP/REST interface. Both
//! bindings share the same engine, defined in this crate:
//!
//! - a frame codec which turns raw TCP input into a command name and an
//!   ordered list of byte-string arguments, and turns results back into
//!   `REP`/`ERR` lines
//! - a command registry, populated once at boot by every API module
//! - a dispatcher, obtained by freezing the registry, which looks a request up
//!   and runs its handler
//!
//! Every handler produces exactly one terminal outcome per request, either a
//! [`reply::Reply`] or an [`error::Error`]. Errors carry a kind from a fixed
//! taxonomy, which each binding maps to its own representation: a numeric
//! code on the TCP wire, an HTTP status on the REST interface.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

/// Command definitions and the boot-time registry.
pub mod command;
/// The read-only dispatcher built from a registry.
pub mod dispatch;
/// Error management.
pub mod error;
/// The TCP line-protocol codec.
pub mod frame;
/// Replies produced by command handlers.
pub mod reply;
/// `REST` method kinds and routes for the HTTP binding.
pub mod route;
