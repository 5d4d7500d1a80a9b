use std::future::Future;
use std::io;
use std::str::FromStr;

use eris::error::Error;

/// Direction of a GPIO line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// The line is read.
    Input,
    /// The line is driven.
    Output,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Input => "Input",
            Self::Output => "Output",
        }
        .fmt(f)
    }
}

/// A signal edge on an input line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Edge {
    /// Low to high transition.
    Rising,
    /// High to low transition.
    Falling,
}

impl std::fmt::Display for Edge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rising => "rising",
            Self::Falling => "falling",
        }
        .fmt(f)
    }
}

impl FromStr for Edge {
    type Err = Error;

    // Any case, and the `ris`/`fal` prefixes are enough.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let prefix = s.as_bytes().get(..3);
        if prefix.is_some_and(|prefix| prefix.eq_ignore_ascii_case(b"ris")) {
            Ok(Self::Rising)
        } else if prefix.is_some_and(|prefix| prefix.eq_ignore_ascii_case(b"fal")) {
            Ok(Self::Falling)
        } else {
            Err(Error::invalid_argument("This event type is invalid."))
        }
    }
}

/// A line as reported by its chip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineDescriptor {
    /// Offset of the line within its chip.
    pub offset: u32,
    /// Kernel name, possibly empty.
    pub name: String,
}

/// A GPIO chip.
///
/// A chip is opened once and kept for the whole process lifetime. Requests
/// are exclusive: requesting a line already requested by anyone, in this
/// process or another one, fails with [`io::ErrorKind::ResourceBusy`].
pub trait Chip: Send + Sync + 'static {
    /// A line requested for input.
    type Input: InputLine;
    /// A line requested for output.
    type Output: OutputLine;

    /// Chip label, used in logs.
    fn label(&self) -> &str;

    /// Enumerates the lines of the chip.
    fn lines(&self) -> impl Future<Output = io::Result<Vec<LineDescriptor>>> + Send;

    /// Returns the current direction of a line, as seen by the kernel.
    fn direction(&self, offset: u32) -> impl Future<Output = io::Result<Direction>> + Send;

    /// Requests a line for input with both edges detected.
    fn request_input(
        &self,
        offset: u32,
        consumer: &str,
    ) -> impl Future<Output = io::Result<Self::Input>> + Send;

    /// Requests a line for output with an initial value.
    fn request_output(
        &self,
        offset: u32,
        consumer: &str,
        value: bool,
    ) -> impl Future<Output = io::Result<Self::Output>> + Send;
}

/// A line requested for input.
///
/// Dropping it releases the kernel request.
pub trait InputLine: Send + Sync + 'static {
    /// Reads the line level.
    fn value(&self) -> impl Future<Output = io::Result<bool>> + Send;

    /// Waits until at least one edge event is queued, then drains up to `max`
    /// queued events.
    ///
    /// An empty batch means the wait gave up.
    ///
    /// The returned future must be cancel safe: dropping it before it
    /// completes must not lose a queued event.
    fn read_edges(&mut self, max: usize) -> impl Future<Output = io::Result<Vec<Edge>>> + Send;
}

/// A line requested for output.
///
/// Dropping it releases the kernel request.
pub trait OutputLine: Send + Sync + 'static {
    /// Drives the line level.
    fn set_value(&self, value: bool) -> impl Future<Output = io::Result<()>> + Send;
}

#[cfg(test)]
mod tests {
    use eris::error::ErrorKind;

    use super::{Direction, Edge};

    #[test]
    fn edge_names() {
        assert_eq!("rising".parse::<Edge>().unwrap(), Edge::Rising);
        assert_eq!("Rising".parse::<Edge>().unwrap(), Edge::Rising);
        assert_eq!("FALL".parse::<Edge>().unwrap(), Edge::Falling);
        assert_eq!("falling-edge".parse::<Edge>().unwrap(), Edge::Falling);

        for invalid in ["", "ri", "both", "up"] {
            assert_eq!(
                invalid.parse::<Edge>().unwrap_err().kind(),
                ErrorKind::InvalidArgument
            );
        }
    }

    #[test]
    fn direction_names() {
        assert_eq!(Direction::Input.to_string(), "Input");
        assert_eq!(Direction::Output.to_string(), "Output");
    }
}
