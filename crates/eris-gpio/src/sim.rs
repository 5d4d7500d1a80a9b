//! An in-memory GPIO chip.
//!
//! [`SimChip`] behaves like a kernel GPIO chip: line requests are exclusive
//! across every clone of the chip, input levels can be set from outside, and
//! level changes on a requested input produce edge events.

use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

use crate::chip::{Chip, Direction, Edge, InputLine, LineDescriptor, OutputLine};

// An event delivered to a requested input. `None` wakes the waiter up with
// an empty batch.
type SimEvent = Option<Edge>;

#[derive(Debug)]
struct SimLine {
    name: String,
    direction: Direction,
    level: bool,
    // Consumer currently holding the line.
    consumer: Option<String>,
    // Event queue of the current input request.
    events: Option<UnboundedSender<SimEvent>>,
}

#[derive(Debug)]
struct SimState {
    lines: Vec<SimLine>,
}

/// An in-memory GPIO chip.
///
/// Clones share the same lines.
#[derive(Debug, Clone)]
pub struct SimChip {
    // Chip label.
    label: Arc<str>,
    // Lines, shared by every clone.
    state: Arc<Mutex<SimState>>,
}

impl SimChip {
    /// Creates a [`SimChip`] whose lines have the given names, at offsets
    /// `0..n`.
    ///
    /// An empty name denotes an unnamed line.
    #[must_use]
    pub fn new<I, S>(label: impl Into<String>, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let lines = names
            .into_iter()
            .map(|name| SimLine {
                name: name.into(),
                direction: Direction::Input,
                level: false,
                consumer: None,
                events: None,
            })
            .collect();

        Self {
            label: label.into().into(),
            state: Arc::new(Mutex::new(SimState { lines })),
        }
    }

    /// Sets the level of an input line, producing an edge event when it
    /// changes while the line is requested.
    ///
    /// Returns `false` when no line has this name.
    pub fn set_level(&self, name: &str, level: bool) -> bool {
        self.with_line(name, |line| {
            if line.level != level {
                line.level = level;
                if let Some(events) = &line.events {
                    let edge = if level { Edge::Rising } else { Edge::Falling };
                    let _ = events.send(Some(edge));
                }
            }
        })
    }

    /// Returns the level of a line.
    #[must_use]
    pub fn level(&self, name: &str) -> Option<bool> {
        self.find(name).map(|(state, index)| state.lines[index].level)
    }

    /// Queues an edge event on a requested input line.
    ///
    /// Returns `false` when the line is not requested for input.
    pub fn inject_edge(&self, name: &str, edge: Edge) -> bool {
        self.send(name, Some(edge))
    }

    /// Wakes up the waiter of a requested input line with an empty batch.
    ///
    /// Returns `false` when the line is not requested for input.
    pub fn inject_wakeup(&self, name: &str) -> bool {
        self.send(name, None)
    }

    /// Returns the consumer holding a line, if any.
    #[must_use]
    pub fn consumer(&self, name: &str) -> Option<String> {
        self.find(name)
            .and_then(|(state, index)| state.lines[index].consumer.clone())
    }

    /// Holds a line on behalf of another process.
    ///
    /// Returns `false` when the line is unknown or already held.
    pub fn hold(&self, name: &str, consumer: &str) -> bool {
        let mut held = false;
        self.with_line(name, |line| {
            if line.consumer.is_none() {
                line.consumer = Some(consumer.into());
                held = true;
            }
        });
        held
    }

    /// Releases a line held with [`SimChip::hold`].
    pub fn unhold(&self, name: &str) {
        self.with_line(name, |line| line.consumer = None);
    }

    fn send(&self, name: &str, event: SimEvent) -> bool {
        let mut sent = false;
        self.with_line(name, |line| {
            if let Some(events) = &line.events {
                sent = events.send(event).is_ok();
            }
        });
        sent
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn find(&self, name: &str) -> Option<(MutexGuard<'_, SimState>, usize)> {
        let state = self.state();
        let index = state.lines.iter().position(|line| line.name == name)?;
        Some((state, index))
    }

    fn with_line(&self, name: &str, f: impl FnOnce(&mut SimLine)) -> bool {
        let Some((mut state, index)) = self.find(name) else {
            return false;
        };
        f(&mut state.lines[index]);
        true
    }

    fn claim(&self, offset: u32, consumer: &str, direction: Direction) -> io::Result<()> {
        let mut state = self.state();
        let line = state
            .lines
            .get_mut(offset as usize)
            .ok_or_else(|| io::Error::from(io::ErrorKind::InvalidInput))?;

        if line.consumer.is_some() {
            return Err(io::Error::from(io::ErrorKind::ResourceBusy));
        }

        line.consumer = Some(consumer.into());
        line.direction = direction;
        Ok(())
    }

    fn free(&self, offset: u32) {
        if let Some(line) = self.state().lines.get_mut(offset as usize) {
            line.consumer = None;
            line.events = None;
        }
    }
}

impl Chip for SimChip {
    type Input = SimInput;
    type Output = SimOutput;

    fn label(&self) -> &str {
        &self.label
    }

    async fn lines(&self) -> io::Result<Vec<LineDescriptor>> {
        Ok(self
            .state()
            .lines
            .iter()
            .zip(0..)
            .map(|(line, offset)| LineDescriptor {
                offset,
                name: line.name.clone(),
            })
            .collect())
    }

    async fn direction(&self, offset: u32) -> io::Result<Direction> {
        self.state()
            .lines
            .get(offset as usize)
            .map(|line| line.direction)
            .ok_or_else(|| io::Error::from(io::ErrorKind::InvalidInput))
    }

    async fn request_input(&self, offset: u32, consumer: &str) -> io::Result<Self::Input> {
        self.claim(offset, consumer, Direction::Input)?;

        let (sender, receiver) = unbounded_channel();
        if let Some(line) = self.state().lines.get_mut(offset as usize) {
            line.events = Some(sender);
        }

        Ok(SimInput {
            chip: self.clone(),
            offset,
            events: receiver,
        })
    }

    async fn request_output(
        &self,
        offset: u32,
        consumer: &str,
        value: bool,
    ) -> io::Result<Self::Output> {
        self.claim(offset, consumer, Direction::Output)?;

        if let Some(line) = self.state().lines.get_mut(offset as usize) {
            line.level = value;
        }

        Ok(SimOutput {
            chip: self.clone(),
            offset,
        })
    }
}

/// A simulated line requested for input.
#[derive(Debug)]
pub struct SimInput {
    chip: SimChip,
    offset: u32,
    events: UnboundedReceiver<SimEvent>,
}

impl InputLine for SimInput {
    async fn value(&self) -> io::Result<bool> {
        self.chip
            .state()
            .lines
            .get(self.offset as usize)
            .map(|line| line.level)
            .ok_or_else(|| io::Error::from(io::ErrorKind::InvalidInput))
    }

    async fn read_edges(&mut self, max: usize) -> io::Result<Vec<Edge>> {
        let Some(first) = self.events.recv().await else {
            return Err(io::Error::from(io::ErrorKind::BrokenPipe));
        };

        let mut edges = Vec::with_capacity(max);
        let Some(first) = first else {
            return Ok(edges);
        };
        edges.push(first);

        while edges.len() < max {
            match self.events.try_recv() {
                Ok(Some(edge)) => edges.push(edge),
                Ok(None) | Err(_) => break,
            }
        }

        Ok(edges)
    }
}

impl Drop for SimInput {
    fn drop(&mut self) {
        self.chip.free(self.offset);
    }
}

/// A simulated line requested for output.
#[derive(Debug)]
pub struct SimOutput {
    chip: SimChip,
    offset: u32,
}

impl OutputLine for SimOutput {
    async fn set_value(&self, value: bool) -> io::Result<()> {
        if let Some(line) = self.chip.state().lines.get_mut(self.offset as usize) {
            line.level = value;
        }
        Ok(())
    }
}

impl Drop for SimOutput {
    fn drop(&mut self) {
        self.chip.free(self.offset);
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use crate::chip::{Chip, Direction, Edge, InputLine, OutputLine};

    use super::SimChip;

    #[tokio::test]
    async fn requests_are_exclusive() {
        let chip = SimChip::new("sim0", ["LED", "BUTTON"]);
        let other = chip.clone();

        let output = chip.request_output(0, "test", true).await.unwrap();
        assert_eq!(chip.level("LED"), Some(true));
        assert_eq!(chip.direction(0).await.unwrap(), Direction::Output);

        let error = other.request_input(0, "test").await.unwrap_err();
        assert_eq!(error.kind(), io::ErrorKind::ResourceBusy);

        output.set_value(false).await.unwrap();
        assert_eq!(chip.level("LED"), Some(false));

        drop(output);
        assert!(other.request_input(0, "test").await.is_ok());
    }

    #[tokio::test]
    async fn level_changes_produce_edges() {
        let chip = SimChip::new("sim0", ["BUTTON"]);
        let mut input = chip.request_input(0, "test").await.unwrap();

        assert!(chip.set_level("BUTTON", true));
        assert!(chip.set_level("BUTTON", false));
        assert!(input.value().await.is_ok_and(|value| !value));

        let edges = input.read_edges(64).await.unwrap();
        assert_eq!(edges, vec![Edge::Rising, Edge::Falling]);

        assert!(chip.inject_wakeup("BUTTON"));
        assert!(input.read_edges(64).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn held_lines_are_busy() {
        let chip = SimChip::new("sim0", ["LED"]);

        assert!(chip.hold("LED", "other process"));
        assert_eq!(
            chip.request_output(0, "test", false).await.unwrap_err().kind(),
            io::ErrorKind::ResourceBusy
        );

        chip.unhold("LED");
        assert!(chip.request_output(0, "test", false).await.is_ok());
        assert_eq!(chip.consumer("LED").as_deref(), Some("test"));
    }
}
