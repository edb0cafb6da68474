use std::collections::HashSet;

use super::{types::Config, ConfigError};

fn invalid(message: impl Into<String>) -> Result<(), ConfigError> {
    Err(ConfigError::ValidationError(message.into()))
}

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Scheduler intervals and queue capacities are positive
/// - Sample size bounds are ordered
/// - Agent and source names are unique and non-empty
/// - Uploads have a tracker announce URL when enabled
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return invalid("server.port cannot be 0");
    }

    let orchestrator = &config.orchestrator;
    if orchestrator.tick_interval_ms == 0 {
        return invalid("orchestrator.tick_interval_ms cannot be 0");
    }
    if orchestrator.meta_files_interval_ms == 0 {
        return invalid("orchestrator.meta_files_interval_ms cannot be 0");
    }
    if orchestrator.intake_buffer == 0 {
        return invalid("orchestrator.intake_buffer cannot be 0");
    }
    if orchestrator.sample_queue_capacity == 0 {
        return invalid("orchestrator.sample_queue_capacity cannot be 0");
    }

    let defaults = &config.agent_defaults;
    if defaults.statistics_interval_secs == 0 || defaults.list_interval_secs == 0 {
        return invalid("agent_defaults intervals cannot be 0");
    }

    if config.samples.min_size >= config.samples.max_size {
        return invalid("samples.min_size must be below samples.max_size");
    }

    let mut names = HashSet::new();
    for agent in &config.agents {
        if agent.name.trim().is_empty() {
            return invalid("agent name cannot be empty");
        }
        if !names.insert(agent.name.as_str()) {
            return invalid(format!("duplicate agent name: {}", agent.name));
        }
        if agent.statistics_interval_secs == Some(0) || agent.list_interval_secs == Some(0) {
            return invalid(format!("agent {} intervals cannot be 0", agent.name));
        }
    }

    let mut names = HashSet::new();
    for source in &config.sources {
        if source.name.trim().is_empty() {
            return invalid("source name cannot be empty");
        }
        if !names.insert(source.name.as_str()) {
            return invalid(format!("duplicate source name: {}", source.name));
        }
        if source.interval_secs == 0 {
            return invalid(format!("source {} interval cannot be 0", source.name));
        }
    }

    if config.upload.is_configured() && config.upload.tracker_announce_url.is_empty() {
        return invalid("upload.tracker_announce_url is required when upload.api_url is set");
    }

    Ok(())
}
