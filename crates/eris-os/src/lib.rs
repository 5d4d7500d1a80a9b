//! `eris-os` exposes the Eris device API of an embedded Linux board through
//! two alternative servers.
//!
//! The TCP server speaks a persistent, line-oriented protocol: a client
//! opens a session, sends `REQ` lines and receives one `REP` or `ERR` line
//! for each of them. Every session owns its GPIO reservations, which are
//! released when the session ends.
//!
//! The HTTP server selects a command from the request method and path, and
//! takes its arguments from the query parameters. All requests share the
//! same GPIO reservations, which last as long as the process.
//!
//! Both servers run the commands defined in [`commands`] against an
//! [`state::ApiState`], through a read-only [`eris::dispatch::Dispatcher`].
//! They do not share any state: two servers running on the same board only
//! collide in the kernel.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod commands;
/// Error management.
pub mod error;
/// The HTTP server.
pub mod http;
/// State handed to command handlers.
pub mod state;
/// The TCP line-protocol server.
pub mod tcp;
/// Hardware watchdog.
pub mod watchdog;
