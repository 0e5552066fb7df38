//! Configuration loading.
//!
//! Settings are layered: the TOML file first, then `BOOKJOURNEY_*`
//! environment variables. Nested keys use a double underscore so that
//! snake_case field names survive, e.g. `BOOKJOURNEY_PREFETCH__MAX_CONCURRENT=8`.

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

/// Prefix shared by every environment override.
const ENV_PREFIX: &str = "BOOKJOURNEY_";

/// Separator between section and key in environment overrides.
const ENV_SPLIT: &str = "__";

/// Load `path` and apply environment overrides.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.is_file() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    layered(Toml::file(path))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Parse a TOML document without environment overrides.
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}

fn layered(file: impl figment::Provider) -> Figment {
    Figment::from(file).merge(Env::prefixed(ENV_PREFIX).split(ENV_SPLIT))
}
