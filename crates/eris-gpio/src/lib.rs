//! GPIO resource manager for the Eris device API.
//!
//! At startup, every line of every GPIO chip is registered in a table. The
//! [`manager::GpioManager`] then reserves lines exclusively for input or for
//! output, reads and drives their levels, and waits for signal edges.
//!
//! Exclusivity is guarded twice: a local reservation slot per line, and the
//! kernel, which refuses a line already requested by anyone else. Both
//! refusals are reported the same way.
//!
//! The kernel device is abstracted by the [`chip::Chip`] trait. On Linux,
//! [`cdev::CdevChip`] reaches the GPIO character devices. With the `sim`
//! feature, [`sim::SimChip`] provides an in-memory chip.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

/// Linux GPIO character devices.
#[cfg(target_os = "linux")]
pub mod cdev;
/// GPIO chip abstraction.
pub mod chip;
/// Line table and reservations.
pub mod manager;
#[cfg(any(test, feature = "sim"))]
pub mod sim;

pub use chip::{Direction, Edge};
pub use manager::GpioManager;
