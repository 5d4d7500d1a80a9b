use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use eris::error::{Error, Result};

use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

use tokio_util::sync::CancellationToken;

use tracing::{info, warn};

/// Default watchdog device.
pub const DEFAULT_WATCHDOG: &str = "/dev/watchdog0";

/// Period of the feeder task.
pub const FEEDER_PERIOD: Duration = Duration::from_secs(1);

// Any byte refreshes the watchdog.
const KEEPALIVE: &[u8] = b"\0";

// Writing this byte right before closing the device disables the watchdog.
const MAGIC_CLOSE: &[u8] = b"V";

const NO_WATCHDOG: &str = "No watchdog available";

/// A hardware watchdog, driven through its device file.
///
/// Each operation opens the device, writes to it and closes it. The feeder
/// is a background task refreshing the watchdog every [`FEEDER_PERIOD`].
#[derive(Debug)]
pub struct Watchdog {
    // Device path.
    path: PathBuf,
    // Feeder task, when running.
    feeder: Mutex<Option<CancellationToken>>,
}

impl Watchdog {
    /// Creates a [`Watchdog`] for the given device.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            feeder: Mutex::new(None),
        }
    }

    /// Returns the device path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Refreshes the watchdog.
    ///
    /// # Errors
    ///
    /// Fails with an [`eris::error::ErrorKind::IoFailure`] error when the
    /// device cannot be written.
    pub async fn keep_alive(&self) -> Result<()> {
        write(&self.path, KEEPALIVE).await
    }

    /// Stops the feeder and disables the watchdog.
    ///
    /// # Errors
    ///
    /// Fails with an [`eris::error::ErrorKind::IoFailure`] error when the
    /// device cannot be written.
    pub async fn disable(&self) -> Result<()> {
        // Ignore an already stopped feeder.
        let _ = self.stop_feeder();
        write(&self.path, MAGIC_CLOSE).await?;
        info!("Watchdog `{}` disabled", self.path.display());
        Ok(())
    }

    /// Starts the feeder task.
    ///
    /// # Errors
    ///
    /// Fails with an [`eris::error::ErrorKind::InvalidArgument`] error when
    /// the feeder is already running.
    pub fn start_feeder(&self) -> Result<()> {
        let mut feeder = self.feeder.lock().unwrap_or_else(PoisonError::into_inner);
        if feeder.is_some() {
            return Err(Error::invalid_argument("Already running"));
        }

        let cancel = CancellationToken::new();
        let path = self.path.clone();
        tokio::spawn(feed(path, cancel.clone()));
        *feeder = Some(cancel);

        info!("Watchdog feeder started");
        Ok(())
    }

    /// Stops the feeder task.
    ///
    /// # Errors
    ///
    /// Fails with an [`eris::error::ErrorKind::InvalidArgument`] error when
    /// the feeder is not running.
    pub fn stop_feeder(&self) -> Result<()> {
        let cancel = self
            .feeder
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or_else(|| Error::invalid_argument("Already stopped"))?;

        cancel.cancel();
        info!("Watchdog feeder stopped");
        Ok(())
    }

    /// Checks whether the feeder task is running.
    #[must_use]
    pub fn is_feeding(&self) -> bool {
        self.feeder
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        if let Some(cancel) = self
            .feeder
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            cancel.cancel();
        }
    }
}

async fn feed(path: PathBuf, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(FEEDER_PERIOD);
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                if let Err(e) = write(&path, KEEPALIVE).await {
                    warn!("Watchdog feeder: {e}");
                }
            }
        }
    }
}

async fn write(path: &Path, bytes: &[u8]) -> Result<()> {
    let outcome = async {
        let mut file = OpenOptions::new().write(true).open(path).await?;
        file.write_all(bytes).await?;
        file.flush().await
    }
    .await;

    outcome.map_err(|e| {
        warn!("Watchdog `{}`: {e}", path.display());
        Error::io_failure(NO_WATCHDOG)
    })
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::Duration;

    use eris::error::ErrorKind;

    use super::{FEEDER_PERIOD, Watchdog};

    fn device(name: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("eris-watchdog-{name}-{}", std::process::id()));
        std::fs::write(&path, b"").unwrap();
        path
    }

    #[tokio::test]
    async fn keep_alive_and_disable() {
        let path = device("keep-alive");
        let watchdog = Watchdog::new(&path);

        watchdog.keep_alive().await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"\0");

        watchdog.disable().await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"V");

        std::fs::remove_file(path).unwrap();
    }

    #[tokio::test]
    async fn missing_device() {
        let watchdog = Watchdog::new("/nonexistent/watchdog");

        let error = watchdog.keep_alive().await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::IoFailure);
        assert_eq!(error.description(), "No watchdog available");
    }

    #[tokio::test(start_paused = true)]
    async fn feeder() {
        let path = device("feeder");
        let watchdog = Watchdog::new(&path);

        assert!(!watchdog.is_feeding());
        assert_eq!(
            watchdog.stop_feeder().unwrap_err().description(),
            "Already stopped"
        );

        watchdog.start_feeder().unwrap();
        assert!(watchdog.is_feeding());
        assert_eq!(
            watchdog.start_feeder().unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );

        tokio::time::sleep(FEEDER_PERIOD + Duration::from_millis(10)).await;

        watchdog.stop_feeder().unwrap();
        assert!(!watchdog.is_feeding());

        std::fs::remove_file(path).unwrap();
    }
}
