//! Release orchestrator.
//!
//! Drives every live release through the state machine:
//! - **Intake**: one consumer deduplicating and persisting new releases
//! - **Tick**: allocation, submission and download tracking for all releases
//! - **Meta files**: per agent, fetched as the agent finishes them
//! - **Upload**: once downloaded and every meta file has settled

mod config;
mod metafiles;
mod runner;
mod tick;
mod types;
mod working_set;

pub use config::OrchestratorConfig;
pub use runner::{Orchestrator, OrchestratorParts};
pub use types::{AgentUpdate, OrchestratorError, OrchestratorSettings, OrchestratorStatus};
pub use working_set::{TrackedRelease, WorkingSet};
