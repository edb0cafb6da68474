use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

/// Environment variable holding the config file path. It shares the
/// override prefix but is not a config key.
pub const CONFIG_PATH_ENV: &str = "ATUS_CONFIG";

/// `ATUS_SERVER_PORT=9000` sets `server.port`. Keys with an underscore in
/// their own name cannot be reached this way.
fn env_overrides() -> Env {
    Env::prefixed("ATUS_").ignore(&["CONFIG"]).split("_")
}

/// Load configuration from file with environment variable overrides.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    Figment::new()
        .merge(Toml::file(path))
        .merge(env_overrides())
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}
