pub mod cache;
pub mod catalog;
pub mod config;
pub mod library;
pub mod metrics;
pub mod prefetch;
pub mod service;
pub mod testing;

pub use cache::{BookCache, CacheError};
pub use catalog::{
    classify, decode, BookDetail, BookSummary, CatalogClient, CatalogError, Genre,
    HttpCatalogClient, SearchRequest,
};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use library::{BookRepository, RepositoryError, SqliteBookRepository, StoredBook};
pub use prefetch::{PoolStatus, Prefetcher};
pub use service::{BookService, BookServiceError, PopularBook};
