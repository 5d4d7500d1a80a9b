//! Serves the Eris device API over the TCP line protocol.

use std::process::ExitCode;

use clap::Parser;

use eris_daemon::{Interface, Options, init_logging, run};

use tracing::error;

#[derive(Debug, Parser)]
#[command(name = "eris-api-server", version)]
#[command(about = "Serve the Eris device API over a TCP line protocol.")]
struct Cli {
    #[command(flatten)]
    options: Options,
}

#[tokio::main]
async fn main() -> ExitCode {
    let Cli { options } = Cli::parse();
    init_logging(options.log_level);

    match run(Interface::LineProtocol, options).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
