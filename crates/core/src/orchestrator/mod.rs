//! Download orchestrator.
//!
//! The orchestrator is what the HTTP layer talks to:
//! - **Resolution**: query, track URL or raw song object into a `WorkItem`
//! - **Execution**: submit to the current download pool and await the result
//! - **Reconfiguration**: install new settings, replacing the pool when the
//!   concurrency limit or output directory changes

mod runner;
mod types;

pub use runner::DownloadOrchestrator;
pub use types::{DownloadOutcome, OrchestratorError, OrchestratorStatus};
