// Command handlers

use crate::cli::{Args, Command};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::debug;
use wsfork_gateway::{Gateway, GatewayConfig, HttpGateway};

pub mod exec;
pub mod health;
pub mod run;

fn connect(args: &Args) -> Result<Arc<dyn Gateway>> {
    let mut config = GatewayConfig::from_env();
    if let Some(url) = &args.gateway {
        config = config.with_base_url(url.clone());
    }
    debug!(base_url = %config.base_url, "Connecting to gateway");

    let gateway = HttpGateway::new(&config).context("Failed to build gateway client")?;
    Ok(Arc::new(gateway))
}

/// Main command dispatcher
pub async fn execute_command(args: Args) -> Result<()> {
    let gateway = connect(&args)?;

    match args.command {
        Command::Health => health::handle_health(gateway.as_ref()).await,
        Command::Exec { command } => exec::handle_exec(gateway, &command).await,
        Command::Run {
            tasks,
            setup,
            fork_timeout,
            task_timeout,
        } => {
            let options = run::RunOptions {
                tasks,
                setup,
                fork_timeout,
                task_timeout,
            };
            run::handle_run(gateway, options).await
        }
    }
}
