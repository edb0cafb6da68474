use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::time::Duration;

use crate::agent::{AgentDefaults, AgentSeed};
use crate::intake::{FiltersConfig, SourceSeed};
use crate::orchestrator::{OrchestratorConfig, OrchestratorSettings};
use crate::samples::SamplesConfig;
use crate::upload::UploadConfig;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub agent_defaults: AgentDefaults,
    /// Agents created on startup unless one with the same name is stored.
    #[serde(default)]
    pub agents: Vec<AgentSeed>,
    /// Sources created on startup unless one with the same name is stored.
    #[serde(default)]
    pub sources: Vec<SourceSeed>,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub lookup: LookupConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub samples: SamplesConfig,
    #[serde(default)]
    pub filters: FiltersConfig,
}

impl Config {
    /// The part of the configuration the orchestrator reads.
    pub fn orchestrator_settings(&self) -> OrchestratorSettings {
        OrchestratorSettings {
            orchestrator: self.orchestrator.clone(),
            agent_defaults: self.agent_defaults.clone(),
            upload: self.upload.clone(),
            samples: self.samples.clone(),
            max_age_minutes: self.filters.max_age_minutes,
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    8080
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("atus.db")
}

/// Artifact storage: `<data_dir>/<release_id>/<file_name>`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("atus_data")
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

/// HTTP settings shared by every discovery source.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DiscoveryConfig {
    /// Timeout for listing a source and fetching its files (seconds).
    #[serde(default = "default_discovery_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_discovery_timeout(),
        }
    }
}

fn default_discovery_timeout() -> u64 {
    30
}

impl DiscoveryConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Release name lookup service. Without a URL every release stays
/// uncategorized.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LookupConfig {
    #[serde(default)]
    pub url: Option<String>,
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
    pub orchestrator: OrchestratorConfig,
    pub agent_defaults: AgentDefaults,
    pub agents: Vec<AgentSeed>,
    pub sources: Vec<SourceSeed>,
    pub discovery: DiscoveryConfig,
    pub lookup: LookupConfig,
    pub upload: SanitizedUploadConfig,
    pub samples: SamplesConfig,
    pub filters: FiltersConfig,
}

/// Sanitized upload config (auth token hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedUploadConfig {
    pub api_url: String,
    pub auth_token_configured: bool,
    pub tracker_announce_url: String,
    pub user_announce_url: String,
    pub user_id: String,
    pub comment: String,
    pub created_by: String,
    pub bot: String,
    pub timeout_secs: u64,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        let upload = &config.upload;
        Self {
            server: config.server.clone(),
            database: config.database.clone(),
            storage: config.storage.clone(),
            logging: config.logging.clone(),
            orchestrator: config.orchestrator.clone(),
            agent_defaults: config.agent_defaults.clone(),
            agents: config.agents.clone(),
            sources: config.sources.clone(),
            discovery: config.discovery.clone(),
            lookup: config.lookup.clone(),
            upload: SanitizedUploadConfig {
                api_url: upload.api_url.clone(),
                auth_token_configured: !upload.auth_token.is_empty(),
                tracker_announce_url: upload.tracker_announce_url.clone(),
                user_announce_url: upload.user_announce_url.clone(),
                user_id: upload.user_id.clone(),
                comment: upload.comment.clone(),
                created_by: upload.created_by.clone(),
                bot: upload.bot.clone(),
                timeout_secs: upload.timeout_secs,
            },
            samples: config.samples.clone(),
            filters: config.filters.clone(),
        }
    }
}
