use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Catalog base URL is set
/// - Timeouts, page size, cache capacities and worker count are not 0
/// - A prefetch outlasts the catalog request it wraps
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.catalog.base_url.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "catalog.base_url cannot be empty".to_string(),
        ));
    }

    if config.catalog.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "catalog.timeout_secs cannot be 0".to_string(),
        ));
    }

    if config.catalog.default_page_size == 0 {
        return Err(ConfigError::ValidationError(
            "catalog.default_page_size cannot be 0".to_string(),
        ));
    }

    if config.cache.max_pages == 0 || config.cache.max_details == 0 {
        return Err(ConfigError::ValidationError(
            "cache capacities cannot be 0".to_string(),
        ));
    }

    if config.prefetch.enabled {
        if config.prefetch.max_concurrent == 0 {
            return Err(ConfigError::ValidationError(
                "prefetch.max_concurrent cannot be 0".to_string(),
            ));
        }
        if config.prefetch.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "prefetch.timeout_secs cannot be 0".to_string(),
            ));
        }
        if config.prefetch.timeout_secs < config.catalog.timeout_secs {
            return Err(ConfigError::ValidationError(format!(
                "prefetch.timeout_secs ({}) cannot be shorter than catalog.timeout_secs ({})",
                config.prefetch.timeout_secs, config.catalog.timeout_secs
            )));
        }
    }

    Ok(())
}
