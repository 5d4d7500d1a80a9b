//! Configuration and startup shared by the Eris daemons.
//!
//! `eris-api-server` serves the TCP line protocol and `eris-rest-api`
//! serves the HTTP interface. Both take the same options, discover the GPIO
//! chips of the board (or simulate one) and run until `Ctrl-C` or
//! `SIGTERM`.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Args;

use eris_gpio::GpioManager;
use eris_gpio::chip::Chip;
use eris_gpio::sim::SimChip;

use eris_os::commands;
use eris_os::error::Result;
use eris_os::state::{ApiState, TestGpios};
use eris_os::watchdog::{DEFAULT_WATCHDOG, Watchdog};
use eris_os::{http, tcp};

use tracing::{Level, error, info};

// Label of the simulated chip.
const SIM_LABEL: &str = "eris-sim";

/// The interface served by a daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interface {
    /// The TCP line protocol.
    LineProtocol,
    /// The HTTP interface.
    Rest,
}

impl Interface {
    /// Returns the port listened to when none is configured.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::LineProtocol => tcp::DEFAULT_PORT,
            Self::Rest => http::DEFAULT_PORT,
        }
    }
}

/// Command line options of both daemons.
#[derive(Debug, Clone, Args)]
pub struct Options {
    /// Listening IPv4 address.
    #[arg(long, default_value_t = Ipv4Addr::UNSPECIFIED)]
    pub address: Ipv4Addr,

    /// Listening port [default: 31215 for the line protocol, 8080 for HTTP].
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Directory scanned for `gpiochip*` devices.
    #[arg(long, default_value = "/dev", value_name = "DIR")]
    pub dev_dir: PathBuf,

    /// Simulate a GPIO chip with these comma-separated line names instead
    /// of using the hardware.
    #[arg(long, value_delimiter = ',', value_name = "NAMES")]
    pub simulate: Vec<String>,

    /// Give up waiting for a GPIO edge after this many seconds.
    #[arg(long, value_name = "SECONDS")]
    pub edge_timeout_secs: Option<u64>,

    /// Hardware watchdog device.
    #[arg(long, default_value = DEFAULT_WATCHDOG, value_name = "PATH")]
    pub watchdog: PathBuf,

    /// GPIO line wired for input tests.
    #[arg(long, value_name = "NAME")]
    pub test_input_gpio: Option<String>,

    /// GPIO line wired for output tests.
    #[arg(long, value_name = "NAME")]
    pub test_output_gpio: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value_t = Level::INFO)]
    pub log_level: Level,
}

impl Options {
    /// Returns the configured port, or the default one of the interface.
    #[must_use]
    pub fn port_for(&self, interface: Interface) -> u16 {
        self.port.unwrap_or(interface.default_port())
    }

    fn edge_timeout(&self) -> Option<Duration> {
        self.edge_timeout_secs.map(Duration::from_secs)
    }

    fn test_gpios(&self) -> TestGpios {
        TestGpios {
            input: self.test_input_gpio.clone(),
            output: self.test_output_gpio.clone(),
        }
    }
}

/// Installs the logger.
///
/// Records emitted through the `log` facade are forwarded too.
pub fn init_logging(level: Level) {
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();
}

/// Runs a daemon until a shutdown signal is received.
///
/// # Errors
///
/// Fails when the GPIO chips cannot be discovered, when the commands
/// cannot be registered or when the server cannot start.
pub async fn run(interface: Interface, options: Options) -> Result<()> {
    if options.simulate.is_empty() {
        let chips = hardware::discover(&options).await?;
        serve(interface, &options, chips).await
    } else {
        info!(lines = %options.simulate.join(","), "Simulating a GPIO chip");
        let chip = SimChip::new(SIM_LABEL, options.simulate.iter().map(String::as_str));
        serve(interface, &options, vec![chip]).await
    }
}

/// Builds the state handed to the commands.
pub async fn state<C: Chip>(options: &Options, chips: Vec<C>) -> ApiState<C> {
    let gpio = GpioManager::discover(chips)
        .await
        .edge_timeout(options.edge_timeout());
    info!(lines = gpio.lines().len(), "GPIO lines discovered");

    ApiState::new(gpio)
        .watchdog(Watchdog::new(options.watchdog.clone()))
        .test_gpios(options.test_gpios())
}

async fn serve<C: Chip>(interface: Interface, options: &Options, chips: Vec<C>) -> Result<()> {
    let state = state(options, chips).await;
    let port = options.port_for(interface);

    match interface {
        Interface::LineProtocol => {
            tcp::Server::new(commands::line_protocol()?, state)
                .address(options.address)
                .port(port)
                .with_graceful_shutdown(shutdown_signal())
                .run()
                .await
        }
        Interface::Rest => {
            http::Server::new(commands::rest()?, state)
                .address(options.address)
                .port(port)
                .with_graceful_shutdown(shutdown_signal())
                .run()
                .await
        }
    }
}

#[cfg(target_os = "linux")]
mod hardware {
    use eris_gpio::cdev::CdevChip;

    use eris_os::error::{Error, ErrorKind, Result};

    use tracing::warn;

    use super::Options;

    pub(super) async fn discover(options: &Options) -> Result<Vec<CdevChip>> {
        let chips = CdevChip::discover(&options.dev_dir).await.map_err(|e| {
            Error::new(
                ErrorKind::Discovery,
                format!("Unable to scan `{}`: {e}", options.dev_dir.display()),
            )
        })?;

        if chips.is_empty() {
            warn!("No GPIO chip found in `{}`", options.dev_dir.display());
        }

        Ok(chips)
    }
}

#[cfg(not(target_os = "linux"))]
mod hardware {
    use eris_gpio::sim::SimChip;

    use eris_os::error::{Error, ErrorKind, Result};

    use super::Options;

    pub(super) async fn discover(_options: &Options) -> Result<Vec<SimChip>> {
        Err(Error::new(
            ErrorKind::Discovery,
            "GPIO character devices are only available on Linux, use `--simulate`.",
        ))
    }
}

// Completes on `Ctrl-C` or, on Unix, on `SIGTERM`.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Unable to listen for `Ctrl-C`: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
            }
            Err(e) => {
                error!("Unable to listen for `SIGTERM`: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received");
}
