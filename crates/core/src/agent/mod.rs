//! Remote download agents.
//!
//! An agent is an independently operated endpoint that downloads content on
//! our behalf. This module holds the wire protocol client, the live registry
//! with cached statistics and download lists, and the allocation policy that
//! picks an agent for a new release.

mod allocation;
mod client;
mod config;
mod http;
mod registry;
mod types;

pub use allocation::{allocate, eligible, select, AllocationCandidate, AllocationPolicy};
pub use client::{AgentClient, AgentConnector};
pub use config::{AgentDefaults, AgentSeed};
pub use http::{HttpAgentClient, HttpAgentConnector};
pub use registry::{AgentRegistry, LiveAgent};
pub use types::{
    AddResult, Agent, AgentError, AgentSnapshot, AgentStatistics, DownloadEntry, DownloadState,
    FileStatus,
};
