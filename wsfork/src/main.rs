use std::sync::OnceLock;
use uuid::Uuid;

use clap::Parser;
use tracing::{error, info_span, Instrument};

mod cli;
mod commands;

use cli::Args;
use commands::execute_command;

/// Request ID for this execution, attached to every log line
static REQUEST_ID: OnceLock<String> = OnceLock::new();

fn get_request_id() -> &'static str {
    REQUEST_ID.get_or_init(|| Uuid::new_v4().to_string())
}

#[tokio::main]
async fn main() {
    let log_guard = match wsfork_logging::init_subscriber() {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            None
        }
    };

    let args = Args::parse();
    let span = info_span!("wsfork", request_id = get_request_id());

    if let Err(e) = execute_command(args).instrument(span).await {
        error!("{:#}", e);
        eprintln!("Error: {e:#}");
        // exit() skips destructors; flush the log file first.
        drop(log_guard);
        std::process::exit(1);
    }
}
