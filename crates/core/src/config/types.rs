use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub prefetch: PrefetchConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
}

/// External book catalog configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CatalogConfig {
    /// Search endpoint (e.g., "https://catalog.example.com/api/search")
    pub base_url: String,
    /// API key, sent as the `ttbkey` query parameter when present
    #[serde(default)]
    pub api_key: Option<String>,
    /// Request timeout in seconds (default: 10)
    #[serde(default = "default_catalog_timeout")]
    pub timeout_secs: u64,
    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Page size used when a caller doesn't pick one (default: 10)
    #[serde(default = "default_page_size")]
    pub default_page_size: u32,
}

fn default_catalog_timeout() -> u64 {
    10
}

fn default_user_agent() -> String {
    format!("BookJourney/{}", env!("CARGO_PKG_VERSION"))
}

fn default_page_size() -> u32 {
    10
}

/// Cache eviction policy
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    /// Lifetime of a cached search page in seconds (default: 10 minutes)
    #[serde(default = "default_page_ttl")]
    pub page_ttl_secs: u64,
    /// Lifetime of a cached book detail in seconds (default: 1 day)
    #[serde(default = "default_detail_ttl")]
    pub detail_ttl_secs: u64,
    /// Maximum number of cached pages
    #[serde(default = "default_max_pages")]
    pub max_pages: u64,
    /// Maximum number of cached book details
    #[serde(default = "default_max_details")]
    pub max_details: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            page_ttl_secs: default_page_ttl(),
            detail_ttl_secs: default_detail_ttl(),
            max_pages: default_max_pages(),
            max_details: default_max_details(),
        }
    }
}

fn default_page_ttl() -> u64 {
    600
}

fn default_detail_ttl() -> u64 {
    86_400
}

fn default_max_pages() -> u64 {
    1_000
}

fn default_max_details() -> u64 {
    10_000
}

/// Next-page prefetch worker pool
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PrefetchConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Prefetches running at the same time
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    /// Prefetches waiting for a worker; further ones are dropped
    #[serde(default = "default_max_queued")]
    pub max_queued: usize,
    /// Upper bound for a single prefetch in seconds
    #[serde(default = "default_prefetch_timeout")]
    pub timeout_secs: u64,
}

impl Default for PrefetchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_concurrent: default_max_concurrent(),
            max_queued: default_max_queued(),
            timeout_secs: default_prefetch_timeout(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_concurrent() -> usize {
    4
}

fn default_max_queued() -> usize {
    64
}

fn default_prefetch_timeout() -> u64 {
    30
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
    PathBuf::from("bookjourney.db")
}

/// Sanitized config for logs and diagnostics (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub catalog: SanitizedCatalogConfig,
    pub cache: CacheConfig,
    pub prefetch: PrefetchConfig,
    pub database: DatabaseConfig,
}

/// Sanitized catalog config (API key hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedCatalogConfig {
    pub base_url: String,
    pub api_key_configured: bool,
    pub timeout_secs: u64,
    pub default_page_size: u32,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            catalog: SanitizedCatalogConfig {
                base_url: config.catalog.base_url.clone(),
                api_key_configured: config
                    .catalog
                    .api_key
                    .as_ref()
                    .is_some_and(|k| !k.is_empty()),
                timeout_secs: config.catalog.timeout_secs,
                default_page_size: config.catalog.default_page_size,
            },
            cache: config.cache.clone(),
            prefetch: config.prefetch.clone(),
            database: config.database.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_minimal_config() {
        let toml = r#"
[catalog]
base_url = "http://localhost:9000/search"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.catalog.base_url, "http://localhost:9000/search");
        assert_eq!(config.catalog.timeout_secs, 10);
        assert_eq!(config.catalog.default_page_size, 10);
        assert!(config.catalog.api_key.is_none());
        assert!(config.catalog.user_agent.starts_with("BookJourney/"));
    }

    #[test]
    fn test_default_eviction_policy() {
        let toml = r#"
[catalog]
base_url = "http://localhost:9000/search"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.cache.page_ttl_secs, 600);
        assert_eq!(config.cache.detail_ttl_secs, 86_400);
        assert_eq!(config.cache.max_pages, 1_000);
        assert_eq!(config.cache.max_details, 10_000);
    }

    #[test]
    fn test_default_prefetch_and_database() {
        let toml = r#"
[catalog]
base_url = "http://localhost:9000/search"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert!(config.prefetch.enabled);
        assert_eq!(config.prefetch.max_concurrent, 4);
        assert_eq!(config.prefetch.max_queued, 64);
        assert_eq!(config.prefetch.timeout_secs, 30);
        assert_eq!(config.database.path.to_str().unwrap(), "bookjourney.db");
    }

    #[test]
    fn test_deserialize_missing_catalog_fails() {
        let toml = r#"
[cache]
page_ttl_secs = 60
"#;
        let result: Result<Config, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn test_deserialize_full_config() {
        let toml = r#"
[catalog]
base_url = "https://catalog.example.com/search"
api_key = "ttb-secret"
timeout_secs = 5
default_page_size = 20

[cache]
page_ttl_secs = 120
detail_ttl_secs = 3600

[prefetch]
enabled = false
max_concurrent = 2

[database]
path = "/data/books.sqlite"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.catalog.api_key.as_deref(), Some("ttb-secret"));
        assert_eq!(config.catalog.timeout_secs, 5);
        assert_eq!(config.catalog.default_page_size, 20);
        assert_eq!(config.cache.page_ttl_secs, 120);
        assert_eq!(config.cache.detail_ttl_secs, 3600);
        assert_eq!(config.cache.max_pages, 1_000);
        assert!(!config.prefetch.enabled);
        assert_eq!(config.prefetch.max_concurrent, 2);
        assert_eq!(config.prefetch.max_queued, 64);
        assert_eq!(config.database.path.to_str().unwrap(), "/data/books.sqlite");
    }

    #[test]
    fn test_sanitized_config_hides_api_key() {
        let toml = r#"
[catalog]
base_url = "https://catalog.example.com/search"
api_key = "ttb-secret"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let sanitized = SanitizedConfig::from(&config);
        assert!(sanitized.catalog.api_key_configured);

        let json = serde_json::to_string(&sanitized).unwrap();
        assert!(!json.contains("ttb-secret"));
    }

    #[test]
    fn test_sanitized_config_without_api_key() {
        let toml = r#"
[catalog]
base_url = "https://catalog.example.com/search"
api_key = ""
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let sanitized = SanitizedConfig::from(&config);
        assert!(!sanitized.catalog.api_key_configured);
        assert_eq!(sanitized.cache.page_ttl_secs, 600);
    }
}
