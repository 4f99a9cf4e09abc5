//! Workspace forking and fan-out orchestration
//!
//! This crate turns one live workspace into N copies through the gateway's
//! snapshot/restore handshake ([`ForkEngine`]) and runs one unit of work per copy
//! concurrently, always tearing the copies down afterwards ([`TaskOrchestrator`]).

pub mod cleanup;
pub mod config;
pub mod error;
pub mod fork;
pub mod orchestrator;
pub mod task;

pub use cleanup::CleanupWarning;
pub use config::OrchestratorConfig;
pub use error::{ForkError, OrchestratorError, Result};
pub use fork::{ForkEngine, ForkOptions, MIN_POLL_INTERVAL};
pub use orchestrator::TaskOrchestrator;
pub use task::{
    BatchReport, BoundWorkspace, CommandTask, TaskDescriptor, TaskFailure, TaskOutcome,
    TaskResult, TaskUnit,
};
