// CLI argument parsing and definitions

use clap::{Parser, Subcommand};

#[derive(Debug, Clone, Parser)]
#[command(name = "wsfork")]
#[command(about = "Fork a remote workspace and run tasks across the copies")]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Gateway base URL (overrides WSFORK_GATEWAY_URL)
    #[arg(long, global = true)]
    pub gateway: Option<String>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Check that the gateway is reachable
    Health,

    /// Run one command in a fresh, temporary workspace
    Exec {
        /// Shell command to execute
        command: String,
    },

    /// Fork a source workspace once per task and run the tasks in parallel
    Run {
        /// Command to run, one fork per occurrence
        #[arg(short, long = "task", required = true)]
        tasks: Vec<String>,

        /// Commands executed in the source workspace before forking
        #[arg(long)]
        setup: Vec<String>,

        /// Seconds to wait for the snapshot (overrides WSFORK_FORK_TIMEOUT_SECS)
        #[arg(long)]
        fork_timeout: Option<u64>,

        /// Per-task deadline in seconds
        #[arg(long)]
        task_timeout: Option<u64>,
    },
}
