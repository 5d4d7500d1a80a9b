use std::io;
use std::sync::Arc;
use std::time::Duration;

use eris::error::{Error, Result};

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{Mutex, broadcast, mpsc, oneshot};

use tokio_util::sync::CancellationToken;
use tokio_util::task::AbortOnDropHandle;

use tracing::{debug, info, warn};

use crate::chip::{Chip, Direction, Edge, InputLine, OutputLine};

/// Consumer name attached to every kernel line request.
pub const CONSUMER: &str = "Eris API";

/// Maximum number of edge events drained in a single batch.
pub const EDGE_BATCH: usize = 64;

const NO_GPIO: &str = "No GPIO available.";
const UNKNOWN_NAME: &str = "The GPIO name does not exist.";
const ALREADY_RESERVED: &str = "The GPIO line is already reserved.";
const ALREADY_FREE: &str = "The GPIO line is already free.";
const NOT_RESERVED: &str = "This GPIO line is not reserved.";
const NOT_READABLE: &str = "This GPIO line is not readable.";
const NOT_WRITABLE: &str = "This GPIO line is not writable.";
const INVALID_VALUE: &str = "The value is invalid.";
const RELEASED: &str = "The GPIO line has been released.";
const TIMEOUT: &str = "Timeout";

// Edge batches kept for waiters that fall behind.
const EDGE_BACKLOG: usize = 16;

/// Parses a line value, which must be `0` or `1`.
///
/// # Errors
///
/// Fails with an [`eris::error::ErrorKind::InvalidArgument`] error for any
/// other text.
pub fn parse_value(value: &str) -> Result<bool> {
    match value.trim().parse::<i64>() {
        Ok(0) => Ok(false),
        Ok(1) => Ok(true),
        _ => Err(Error::invalid_argument(INVALID_VALUE)),
    }
}

/// A hardware line discovered at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GpioLine {
    /// Line name, with spaces replaced by `_`. Empty for unnamed lines.
    pub name: String,
    /// Index of the owning chip.
    pub chip: usize,
    /// Offset of the line within its chip.
    pub offset: u32,
}

// The immutable part of the manager, shared by every fork.
struct LineTable<C: Chip> {
    chips: Vec<C>,
    lines: Vec<GpioLine>,
}

// Requests served by the task owning an input line.
enum LineRequest {
    Value(oneshot::Sender<io::Result<bool>>),
    Subscribe(oneshot::Sender<broadcast::Receiver<EdgeBatch>>),
}

// Edges read in one go by the owning task, shared with every waiter.
#[derive(Debug, Clone)]
enum EdgeBatch {
    Edges(Arc<[Edge]>),
    Failed,
}

// An input request. The kernel handle lives in its own task, so level reads
// and any number of edge waits proceed side by side.
struct InputReservation {
    requests: mpsc::UnboundedSender<LineRequest>,
    cancel: CancellationToken,
    task: AbortOnDropHandle<()>,
}

impl InputReservation {
    fn spawn<I: InputLine>(input: I) -> Self {
        let (requests, receiver) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let task = AbortOnDropHandle::new(tokio::spawn(own_input(
            input,
            receiver,
            cancel.clone(),
        )));

        Self {
            requests,
            cancel,
            task,
        }
    }

    // Stops the owning task and waits until the kernel handle is dropped.
    async fn close(mut self) {
        self.cancel.cancel();
        if let Err(e) = (&mut self.task).await {
            warn!("GPIO input task ended abnormally: {e}");
        }
    }
}

impl Drop for InputReservation {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

enum Reservation<C: Chip> {
    Input(InputReservation),
    Output(C::Output),
}

type Slot<C> = Mutex<Option<Reservation<C>>>;

/// The GPIO resource manager.
///
/// The manager owns the table of every line found at startup, and one
/// reservation slot per line, guarded by its own lock.
///
/// Clones share both the table and the reservations. A [`GpioManager::fork`]
/// shares the table only and starts with no reservation: lines reserved by
/// a fork are invisible to the others, and conflicts are detected by the
/// kernel. Dropping the last handle to a set of reservations releases them.
pub struct GpioManager<C: Chip> {
    // Chips and lines.
    table: Arc<LineTable<C>>,
    // Reservations.
    slots: Arc<[Slot<C>]>,
    // Maximum time spent waiting for an edge.
    edge_timeout: Option<Duration>,
}

impl<C: Chip> Clone for GpioManager<C> {
    fn clone(&self) -> Self {
        Self {
            table: Arc::clone(&self.table),
            slots: Arc::clone(&self.slots),
            edge_timeout: self.edge_timeout,
        }
    }
}

impl<C: Chip> std::fmt::Debug for GpioManager<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpioManager")
            .field("lines", &self.table.lines)
            .field("edge_timeout", &self.edge_timeout)
            .finish_non_exhaustive()
    }
}

impl<C: Chip> GpioManager<C> {
    /// Builds the line table from every line of the given chips.
    ///
    /// A chip whose lines cannot be enumerated is skipped.
    pub async fn discover(chips: Vec<C>) -> Self {
        let mut kept = Vec::with_capacity(chips.len());
        let mut lines = Vec::new();

        for chip in chips {
            let descriptors = match chip.lines().await {
                Ok(descriptors) => descriptors,
                Err(e) => {
                    warn!("Skipping GPIO chip `{}`: {e}", chip.label());
                    continue;
                }
            };

            let index = kept.len();
            debug!(
                "GPIO chip `{}` has {} line(s)",
                chip.label(),
                descriptors.len()
            );
            lines.extend(descriptors.into_iter().map(|descriptor| GpioLine {
                name: descriptor.name.replace(' ', "_"),
                chip: index,
                offset: descriptor.offset,
            }));
            kept.push(chip);
        }

        info!("{} GPIO line(s) discovered", lines.len());

        let slots = Self::empty_slots(lines.len());
        Self {
            table: Arc::new(LineTable { chips: kept, lines }),
            slots,
            edge_timeout: None,
        }
    }

    /// Sets the maximum time spent waiting for an edge.
    ///
    /// With no timeout, a wait lasts until the edge occurs or the line is
    /// released.
    #[must_use]
    #[inline]
    pub const fn edge_timeout(mut self, edge_timeout: Option<Duration>) -> Self {
        self.edge_timeout = edge_timeout;
        self
    }

    /// Creates a manager sharing the line table, with no reservation.
    #[must_use]
    pub fn fork(&self) -> Self {
        Self {
            table: Arc::clone(&self.table),
            slots: Self::empty_slots(self.table.lines.len()),
            edge_timeout: self.edge_timeout,
        }
    }

    /// Returns every discovered line, named or not.
    #[must_use]
    pub fn lines(&self) -> &[GpioLine] {
        &self.table.lines
    }

    /// Returns the space-separated names of every named line.
    ///
    /// # Errors
    ///
    /// Fails with an [`eris::error::ErrorKind::UnknownResource`] error when
    /// there is no named line.
    pub fn names(&self) -> Result<String> {
        let names = self
            .table
            .lines
            .iter()
            .filter(|line| !line.name.is_empty())
            .map(|line| line.name.as_str())
            .collect::<Vec<_>>();

        if names.is_empty() {
            return Err(Error::unknown_resource(NO_GPIO));
        }

        Ok(names.join(" "))
    }

    /// Finds a line by name.
    ///
    /// An exact match wins over a case-insensitive one. Unnamed lines never
    /// match.
    ///
    /// # Errors
    ///
    /// Fails with an [`eris::error::ErrorKind::UnknownResource`] error when
    /// no line matches.
    pub fn find(&self, name: &str) -> Result<usize> {
        let lines = &self.table.lines;
        if name.is_empty() {
            return Err(Error::unknown_resource(UNKNOWN_NAME));
        }

        lines
            .iter()
            .position(|line| line.name == name)
            .or_else(|| {
                lines
                    .iter()
                    .position(|line| line.name.eq_ignore_ascii_case(name))
            })
            .ok_or_else(|| Error::unknown_resource(UNKNOWN_NAME))
    }

    /// Returns the direction of a line as seen by the kernel, whoever holds
    /// it.
    ///
    /// # Errors
    ///
    /// Fails when the line is unknown or the kernel query fails.
    pub async fn direction(&self, name: &str) -> Result<Direction> {
        let index = self.find(name)?;
        let line = &self.table.lines[index];

        self.chip(line)
            .direction(line.offset)
            .await
            .map_err(|e| io_failure("Unable to read the GPIO line direction", &e))
    }

    /// Reserves a line for input, with both edges detected.
    ///
    /// # Errors
    ///
    /// Fails when the line is unknown or already reserved, here or by
    /// another process, or when the kernel request fails.
    pub async fn request_input(&self, name: &str) -> Result<()> {
        let index = self.find(name)?;
        let mut slot = self.slots[index].lock().await;
        if slot.is_some() {
            return Err(Error::already_reserved(ALREADY_RESERVED));
        }

        let line = &self.table.lines[index];
        let input = self
            .chip(line)
            .request_input(line.offset, CONSUMER)
            .await
            .map_err(|e| request_error(&e))?;

        *slot = Some(Reservation::Input(InputReservation::spawn(input)));
        info!(line = %line.name, "GPIO line reserved for input");

        Ok(())
    }

    /// Reserves a line for output, driving it to `value`.
    ///
    /// # Errors
    ///
    /// Fails when the line is unknown or already reserved, here or by
    /// another process, or when the kernel request fails.
    pub async fn request_output(&self, name: &str, value: bool) -> Result<()> {
        let index = self.find(name)?;
        let mut slot = self.slots[index].lock().await;
        if slot.is_some() {
            return Err(Error::already_reserved(ALREADY_RESERVED));
        }

        let line = &self.table.lines[index];
        let output = self
            .chip(line)
            .request_output(line.offset, CONSUMER, value)
            .await
            .map_err(|e| request_error(&e))?;

        *slot = Some(Reservation::Output(output));
        info!(line = %line.name, value, "GPIO line reserved for output");

        Ok(())
    }

    /// Releases a reserved line.
    ///
    /// Pending edge waits on the line end with an error.
    ///
    /// # Errors
    ///
    /// Fails with an [`eris::error::ErrorKind::UnknownResource`] error when
    /// the line is unknown or not reserved.
    pub async fn release(&self, name: &str) -> Result<()> {
        let index = self.find(name)?;
        let reservation = self.slots[index]
            .lock()
            .await
            .take()
            .ok_or_else(|| Error::unknown_resource(ALREADY_FREE))?;

        if let Reservation::Input(input) = reservation {
            input.close().await;
        }

        info!(line = %self.table.lines[index].name, "GPIO line released");

        Ok(())
    }

    /// Reads the level of a line reserved for input.
    ///
    /// # Errors
    ///
    /// Fails with an [`eris::error::ErrorKind::WrongMode`] error when the
    /// line is not reserved for input.
    pub async fn read_value(&self, name: &str) -> Result<bool> {
        let (requests, _) = self.input(name).await?;
        let (reply, value) = oneshot::channel();
        requests
            .send(LineRequest::Value(reply))
            .map_err(|_| Error::io_failure(RELEASED))?;

        value
            .await
            .map_err(|_| Error::io_failure(RELEASED))?
            .map_err(|e| io_failure("Unable to read this GPIO line", &e))
    }

    /// Drives the level of a line reserved for output.
    ///
    /// # Errors
    ///
    /// Fails with an [`eris::error::ErrorKind::WrongMode`] error when the
    /// line is not reserved for output.
    pub async fn write_value(&self, name: &str, value: bool) -> Result<()> {
        let index = self.find(name)?;
        let slot = self.slots[index].lock().await;

        match slot.as_ref() {
            Some(Reservation::Output(output)) => output
                .set_value(value)
                .await
                .map_err(|e| io_failure("Unable to write this GPIO line", &e)),
            Some(Reservation::Input(_)) => Err(Error::wrong_mode(NOT_WRITABLE)),
            None => Err(Error::wrong_mode(NOT_RESERVED)),
        }
    }

    /// Waits for an edge on a line reserved for input.
    ///
    /// Edges are read by the task owning the line and shared by every
    /// pending wait. A wait ends when a matching edge is seen, when the
    /// configured timeout elapses, or when the line is released.
    ///
    /// # Errors
    ///
    /// Fails with an [`eris::error::ErrorKind::WrongMode`] error when the
    /// line is not reserved for input, an
    /// [`eris::error::ErrorKind::Timeout`] error when the wait gives up and
    /// an [`eris::error::ErrorKind::IoFailure`] error when the line is
    /// released meanwhile or the kernel fails.
    pub async fn wait_edge(&self, name: &str, edge: Edge) -> Result<()> {
        let (requests, cancel) = self.input(name).await?;

        debug!(name, %edge, "Waiting for GPIO edge");

        let wait = async {
            let (reply, subscribed) = oneshot::channel();
            requests
                .send(LineRequest::Subscribe(reply))
                .map_err(|_| Error::io_failure(RELEASED))?;
            let edges = subscribed.await.map_err(|_| Error::io_failure(RELEASED))?;

            match self.edge_timeout {
                Some(timeout) => tokio::time::timeout(timeout, watch(edges, edge))
                    .await
                    .unwrap_or_else(|_| Err(Error::timeout(TIMEOUT))),
                None => watch(edges, edge).await,
            }
        };

        tokio::select! {
            () = cancel.cancelled() => Err(Error::io_failure(RELEASED)),
            outcome = wait => outcome,
        }
    }

    async fn input(
        &self,
        name: &str,
    ) -> Result<(mpsc::UnboundedSender<LineRequest>, CancellationToken)> {
        let index = self.find(name)?;
        let slot = self.slots[index].lock().await;

        match slot.as_ref() {
            Some(Reservation::Input(input)) => {
                Ok((input.requests.clone(), input.cancel.child_token()))
            }
            Some(Reservation::Output(_)) => Err(Error::wrong_mode(NOT_READABLE)),
            None => Err(Error::wrong_mode(NOT_RESERVED)),
        }
    }

    fn chip(&self, line: &GpioLine) -> &C {
        &self.table.chips[line.chip]
    }

    fn empty_slots(count: usize) -> Arc<[Slot<C>]> {
        (0..count).map(|_| Mutex::new(None)).collect()
    }
}

// Owns an input line until its reservation ends.
//
// Edges are only read while someone waits for them, so edges seen between
// the request and the first wait stay queued in the kernel.
async fn own_input<I: InputLine>(
    mut input: I,
    mut requests: mpsc::UnboundedReceiver<LineRequest>,
    cancel: CancellationToken,
) {
    let (edges, _) = broadcast::channel(EDGE_BACKLOG);

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            request = requests.recv() => match request {
                Some(LineRequest::Value(reply)) => {
                    let _ = reply.send(input.value().await);
                }
                Some(LineRequest::Subscribe(reply)) => {
                    let _ = reply.send(edges.subscribe());
                }
                None => break,
            },
            batch = input.read_edges(EDGE_BATCH), if edges.receiver_count() > 0 => {
                let batch = match batch {
                    Ok(batch) => EdgeBatch::Edges(batch.into()),
                    Err(e) => {
                        warn!("Unable to read events on this GPIO line: {e}");
                        EdgeBatch::Failed
                    }
                };
                let _ = edges.send(batch);
            }
        }
    }
}

// Reads edge batches until the expected edge shows up.
async fn watch(mut edges: broadcast::Receiver<EdgeBatch>, edge: Edge) -> Result<()> {
    loop {
        match edges.recv().await {
            Ok(EdgeBatch::Edges(batch)) if batch.is_empty() => {
                return Err(Error::timeout(TIMEOUT));
            }
            Ok(EdgeBatch::Edges(batch)) if batch.contains(&edge) => return Ok(()),
            Ok(EdgeBatch::Edges(_)) => {}
            Ok(EdgeBatch::Failed) => {
                return Err(Error::io_failure(
                    "Unable to read events on this GPIO line.",
                ));
            }
            Err(RecvError::Lagged(skipped)) => {
                debug!("Edge waiter skipped {skipped} batch(es)");
            }
            Err(RecvError::Closed) => return Err(Error::io_failure(RELEASED)),
        }
    }
}

fn io_failure(context: &str, error: &io::Error) -> Error {
    warn!("{context}: {error}");
    Error::io_failure(format!("{context}."))
}

// The kernel reports a line requested by anyone else as busy.
fn request_error(error: &io::Error) -> Error {
    if error.kind() == io::ErrorKind::ResourceBusy || error.raw_os_error() == Some(16) {
        Error::already_reserved(ALREADY_RESERVED)
    } else {
        io_failure("Unable to obtain this GPIO line", error)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use eris::error::ErrorKind;

    use crate::chip::{Direction, Edge};
    use crate::sim::SimChip;

    use super::{CONSUMER, GpioManager, parse_value};

    async fn manager() -> (SimChip, GpioManager<SimChip>) {
        let chip = SimChip::new("sim0", ["LED", "BUTTON", "", "User Key"]);
        let manager = GpioManager::discover(vec![chip.clone()]).await;
        (chip, manager)
    }

    // Yields until the spawned edge waiter is parked.
    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn discovery() {
        let (_, manager) = manager().await;

        assert_eq!(manager.lines().len(), 4);
        assert_eq!(manager.names().unwrap(), "LED BUTTON User_Key");
        assert_eq!(manager.find("user_key").unwrap(), 3);
        assert_eq!(manager.find("").unwrap_err().kind(), ErrorKind::UnknownResource);

        let empty = GpioManager::<SimChip>::discover(Vec::new()).await;
        let error = empty.names().unwrap_err();
        assert_eq!(error.kind(), ErrorKind::UnknownResource);
        assert_eq!(error.description(), "No GPIO available.");
    }

    #[tokio::test]
    async fn exact_name_wins() {
        let chip = SimChip::new("sim0", ["led", "LED"]);
        let manager = GpioManager::discover(vec![chip]).await;

        assert_eq!(manager.find("LED").unwrap(), 1);
        assert_eq!(manager.find("led").unwrap(), 0);
        assert_eq!(manager.find("Led").unwrap(), 0);
    }

    #[tokio::test]
    async fn input_release_input() {
        let (chip, manager) = manager().await;

        manager.request_input("BUTTON").await.unwrap();
        assert_eq!(chip.consumer("BUTTON").as_deref(), Some(CONSUMER));
        assert_eq!(
            manager.request_input("button").await.unwrap_err().kind(),
            ErrorKind::AlreadyReserved
        );

        manager.release("BUTTON").await.unwrap();
        assert_eq!(chip.consumer("BUTTON"), None);

        manager.request_input("BUTTON").await.unwrap();
    }

    #[tokio::test]
    async fn wrong_modes() {
        let (chip, manager) = manager().await;

        manager.request_output("LED", true).await.unwrap();
        assert_eq!(chip.level("LED"), Some(true));
        assert_eq!(manager.direction("LED").await.unwrap(), Direction::Output);
        assert_eq!(
            manager.read_value("LED").await.unwrap_err().kind(),
            ErrorKind::WrongMode
        );
        assert_eq!(
            manager.wait_edge("LED", Edge::Rising).await.unwrap_err().kind(),
            ErrorKind::WrongMode
        );

        manager.request_input("BUTTON").await.unwrap();
        assert_eq!(
            manager.write_value("BUTTON", true).await.unwrap_err().kind(),
            ErrorKind::WrongMode
        );

        // Not reserved at all.
        assert_eq!(
            manager.read_value("User_Key").await.unwrap_err().kind(),
            ErrorKind::WrongMode
        );
        assert_eq!(
            manager.write_value("User_Key", false).await.unwrap_err().kind(),
            ErrorKind::WrongMode
        );
    }

    #[tokio::test]
    async fn read_and_write() {
        let (chip, manager) = manager().await;

        manager.request_input("BUTTON").await.unwrap();
        assert!(!manager.read_value("BUTTON").await.unwrap());
        chip.set_level("BUTTON", true);
        assert!(manager.read_value("BUTTON").await.unwrap());

        manager.request_output("LED", false).await.unwrap();
        manager.write_value("LED", true).await.unwrap();
        assert_eq!(chip.level("LED"), Some(true));
    }

    #[tokio::test]
    async fn unknown_names() {
        let (_, manager) = manager().await;

        for outcome in [
            manager.request_input("GPIO99").await,
            manager.request_output("GPIO99", true).await,
            manager.release("GPIO99").await,
            manager.write_value("GPIO99", true).await,
            manager.wait_edge("GPIO99", Edge::Falling).await,
            manager.direction("GPIO99").await.map(|_| ()),
            manager.read_value("GPIO99").await.map(|_| ()),
        ] {
            assert_eq!(outcome.unwrap_err().kind(), ErrorKind::UnknownResource);
        }
    }

    #[tokio::test]
    async fn release_unreserved_line() {
        let (_, manager) = manager().await;

        let error = manager.release("LED").await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::UnknownResource);
        assert_eq!(error.description(), "The GPIO line is already free.");
    }

    #[tokio::test]
    async fn forks_collide_in_the_kernel() {
        let (_, manager) = manager().await;
        let first = manager.fork();
        let second = manager.fork();

        let (a, b) = tokio::join!(first.request_input("LED"), second.request_input("LED"));
        let errors: Vec<_> = [a, b].into_iter().filter_map(Result::err).collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind(), ErrorKind::AlreadyReserved);

        // Each fork only sees its own reservations.
        assert!(first.release("LED").await.is_ok() ^ second.release("LED").await.is_ok());
    }

    #[tokio::test]
    async fn dropping_a_fork_releases_its_lines() {
        let (chip, manager) = manager().await;

        let session = manager.fork();
        session.request_output("LED", true).await.unwrap();
        session.request_input("BUTTON").await.unwrap();
        drop(session);
        settle().await;

        assert_eq!(chip.consumer("LED"), None);
        assert_eq!(chip.consumer("BUTTON"), None);
        manager.request_output("LED", false).await.unwrap();
    }

    #[tokio::test]
    async fn busy_in_another_process() {
        let (chip, manager) = manager().await;

        chip.hold("LED", "another process");
        assert_eq!(
            manager.request_output("LED", true).await.unwrap_err().kind(),
            ErrorKind::AlreadyReserved
        );
    }

    #[tokio::test]
    async fn wait_for_edge() {
        let (chip, manager) = manager().await;
        manager.request_input("BUTTON").await.unwrap();

        let waiter = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.wait_edge("BUTTON", Edge::Falling).await })
        };
        settle().await;

        // A rising edge does not end the wait.
        chip.set_level("BUTTON", true);
        settle().await;
        assert!(!waiter.is_finished());

        chip.set_level("BUTTON", false);
        waiter.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn reads_proceed_during_a_wait() {
        let (chip, manager) = manager().await;
        manager.request_input("BUTTON").await.unwrap();

        let waiter = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.wait_edge("BUTTON", Edge::Rising).await })
        };
        settle().await;

        let level = tokio::time::timeout(Duration::from_secs(1), manager.read_value("BUTTON"))
            .await
            .expect("read blocked by the pending wait");
        assert!(!level.unwrap());
        assert!(!waiter.is_finished());

        chip.set_level("BUTTON", true);
        waiter.await.unwrap().unwrap();
        assert!(manager.read_value("BUTTON").await.unwrap());
    }

    #[tokio::test]
    async fn one_edge_ends_every_wait() {
        let (chip, manager) = manager().await;
        manager.request_input("BUTTON").await.unwrap();

        let waiters = (0..2)
            .map(|_| {
                let manager = manager.clone();
                tokio::spawn(async move { manager.wait_edge("BUTTON", Edge::Rising).await })
            })
            .collect::<Vec<_>>();
        settle().await;

        chip.set_level("BUTTON", true);
        for waiter in waiters {
            tokio::time::timeout(Duration::from_secs(1), waiter)
                .await
                .expect("wait not woken by the shared edge")
                .unwrap()
                .unwrap();
        }
    }

    #[tokio::test]
    async fn empty_batch_is_a_timeout() {
        let (chip, manager) = manager().await;
        manager.request_input("BUTTON").await.unwrap();

        let waiter = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.wait_edge("BUTTON", Edge::Rising).await })
        };
        settle().await;

        assert!(chip.inject_wakeup("BUTTON"));
        assert_eq!(
            waiter.await.unwrap().unwrap_err().kind(),
            ErrorKind::Timeout
        );
    }

    #[tokio::test(start_paused = true)]
    async fn configured_timeout() {
        let (_, manager) = manager().await;
        let manager = manager.edge_timeout(Some(Duration::from_secs(5)));
        manager.request_input("BUTTON").await.unwrap();

        let error = manager.wait_edge("BUTTON", Edge::Rising).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Timeout);
    }

    #[tokio::test]
    async fn release_cancels_waits() {
        let (chip, manager) = manager().await;
        manager.request_input("BUTTON").await.unwrap();

        let waiter = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.wait_edge("BUTTON", Edge::Rising).await })
        };
        settle().await;

        manager.release("BUTTON").await.unwrap();
        assert_eq!(
            waiter.await.unwrap().unwrap_err().kind(),
            ErrorKind::IoFailure
        );
        assert_eq!(chip.consumer("BUTTON"), None);

        manager.request_output("BUTTON", true).await.unwrap();
    }

    #[test]
    fn values() {
        assert!(!parse_value("0").unwrap());
        assert!(parse_value("1").unwrap());
        for invalid in ["2", "-1", "on", ""] {
            assert_eq!(
                parse_value(invalid).unwrap_err().kind(),
                ErrorKind::InvalidArgument
            );
        }
    }
}
