use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio_gpiod::{EdgeDetect, Input, Lines, Options, Output};

use tracing::{debug, warn};

use crate::chip::{Chip, Direction, Edge, InputLine, LineDescriptor, OutputLine};

// Prefix of GPIO character devices.
const CHIP_PREFIX: &str = "gpiochip";

/// A GPIO chip reached through the Linux character-device interface.
pub struct CdevChip {
    // Kernel chip.
    chip: tokio_gpiod::Chip,
    // Device path, used as label.
    label: String,
}

impl CdevChip {
    /// Opens a GPIO character device.
    ///
    /// # Errors
    ///
    /// Fails when the device cannot be opened or is not a GPIO chip.
    pub async fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let chip = tokio_gpiod::Chip::new(path).await?;

        Ok(Self {
            chip,
            label: path.display().to_string(),
        })
    }

    /// Opens every GPIO character device found in `dev_dir`.
    ///
    /// Devices are opened in name order. A device which cannot be opened is
    /// skipped.
    ///
    /// # Errors
    ///
    /// Fails when `dev_dir` cannot be read.
    pub async fn discover(dev_dir: impl AsRef<Path>) -> io::Result<Vec<Self>> {
        let mut entries = tokio::fs::read_dir(dev_dir.as_ref()).await?;

        let mut paths: Vec<PathBuf> = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with(CHIP_PREFIX))
            {
                paths.push(entry.path());
            }
        }
        paths.sort();

        let mut chips = Vec::with_capacity(paths.len());
        for path in paths {
            match Self::open(&path).await {
                Ok(chip) => {
                    debug!("Opened GPIO chip `{}`", path.display());
                    chips.push(chip);
                }
                Err(e) => warn!("Skipping GPIO chip `{}`: {e}", path.display()),
            }
        }

        Ok(chips)
    }
}

impl Chip for CdevChip {
    type Input = CdevInput;
    type Output = CdevOutput;

    fn label(&self) -> &str {
        &self.label
    }

    async fn lines(&self) -> io::Result<Vec<LineDescriptor>> {
        let count = self.chip.num_lines();
        let mut lines = Vec::with_capacity(count as usize);
        for offset in 0..count {
            let info = self.chip.line_info(offset).await?;
            lines.push(LineDescriptor {
                offset,
                name: info.name,
            });
        }
        Ok(lines)
    }

    async fn direction(&self, offset: u32) -> io::Result<Direction> {
        let info = self.chip.line_info(offset).await?;
        Ok(match info.direction {
            tokio_gpiod::Direction::Input => Direction::Input,
            tokio_gpiod::Direction::Output => Direction::Output,
        })
    }

    async fn request_input(&self, offset: u32, consumer: &str) -> io::Result<Self::Input> {
        let options = Options::input([offset])
            .edge(EdgeDetect::Both)
            .consumer(consumer);
        let lines = self.chip.request_lines(options).await?;

        Ok(CdevInput { lines })
    }

    async fn request_output(
        &self,
        offset: u32,
        consumer: &str,
        value: bool,
    ) -> io::Result<Self::Output> {
        let options = Options::output([offset]).values([value]).consumer(consumer);
        let lines = self.chip.request_lines(options).await?;

        Ok(CdevOutput { lines })
    }
}

/// A character-device line requested for input.
pub struct CdevInput {
    lines: Lines<Input>,
}

impl InputLine for CdevInput {
    async fn value(&self) -> io::Result<bool> {
        let [value] = self.lines.get_values([false]).await?;
        Ok(value)
    }

    async fn read_edges(&mut self, max: usize) -> io::Result<Vec<Edge>> {
        let mut edges = Vec::with_capacity(max);

        let event = self.lines.read_event().await?;
        edges.push(edge(event.edge));

        // Drain what is already queued without waiting again.
        while edges.len() < max {
            match tokio::time::timeout(Duration::ZERO, self.lines.read_event()).await {
                Ok(event) => edges.push(edge(event?.edge)),
                Err(_) => break,
            }
        }

        Ok(edges)
    }
}

/// A character-device line requested for output.
pub struct CdevOutput {
    lines: Lines<Output>,
}

impl OutputLine for CdevOutput {
    async fn set_value(&self, value: bool) -> io::Result<()> {
        self.lines.set_values([value]).await
    }
}

const fn edge(edge: tokio_gpiod::Edge) -> Edge {
    match edge {
        tokio_gpiod::Edge::Rising => Edge::Rising,
        tokio_gpiod::Edge::Falling => Edge::Falling,
    }
}
