mod metrics;
mod shell;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bookjourney_core::{
    load_config, validate_config, BookCache, BookRepository, BookService, CatalogClient, Config,
    HttpCatalogClient, Prefetcher, SanitizedConfig, SearchRequest, SqliteBookRepository,
};

#[derive(Parser)]
#[command(name = "bookjourney", version, about = "Book catalog search with read-through caching")]
struct Cli {
    /// Configuration file (default: $BOOKJOURNEY_CONFIG, then config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON.
    #[arg(long, global = true)]
    json_logs: bool,

    /// Print Prometheus metrics to stderr before exiting.
    #[arg(long, global = true)]
    metrics: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search the catalog for one page of books.
    Search {
        query: String,

        #[arg(long, default_value = "1")]
        page: u32,

        /// Page size (default: catalog.default_page_size).
        #[arg(long)]
        size: Option<u32>,
    },

    /// Show a book's detail with the user's favorite flag.
    Detail {
        isbn: String,

        #[arg(long)]
        user_id: i64,

        /// Search this query first; details are only known after a search.
        #[arg(long)]
        query: Option<String>,
    },

    /// Show the book with the most reading rooms.
    Popular,

    /// Read commands from stdin, sharing one cache across them.
    Shell,

    /// Print the effective configuration with secrets redacted.
    Config,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.json_logs);

    if let Err(e) = run(cli).await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());

    // Stdout carries command output; logs go to stderr.
    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn run(cli: Cli) -> Result<()> {
    // Determine config path
    let config_path = cli
        .config
        .clone()
        .or_else(|| std::env::var("BOOKJOURNEY_CONFIG").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Catalog endpoint: {}", config.catalog.base_url);
    info!("Database path: {:?}", config.database.path);

    if let Commands::Config = cli.command {
        return print_json(&SanitizedConfig::from(&config));
    }

    let service = build_service(&config)?;
    let page_size = config.catalog.default_page_size;

    match cli.command {
        Commands::Search { query, page, size } => {
            let request = SearchRequest::new(query, page, size.unwrap_or(page_size));
            let books = service.search(&request).await?;
            print_json(&books)?;
        }
        Commands::Detail {
            isbn,
            user_id,
            query,
        } => {
            if let Some(query) = query {
                service
                    .search(&SearchRequest::new(query, 1, page_size))
                    .await?;
            }
            print_json(&service.book_detail(&isbn, user_id)?)?;
        }
        Commands::Popular => print_json(&service.popular_book()?)?,
        Commands::Shell => shell::run(&service, page_size)
            .await
            .context("Failed to read commands")?,
        Commands::Config => {}
    }

    if cli.metrics {
        metrics::collect_pool_metrics(&service.prefetch_status());
        eprintln!("{}", metrics::encode_metrics().context("Failed to encode metrics")?);
    }

    Ok(())
}

/// Construct the process-wide cache, prefetcher and service.
fn build_service(config: &Config) -> Result<BookService> {
    let client: Arc<dyn CatalogClient> = Arc::new(
        HttpCatalogClient::new(&config.catalog).context("Failed to create catalog client")?,
    );
    info!("Catalog client initialized");

    let cache = Arc::new(BookCache::new(client, &config.cache));
    info!(
        "Book cache initialized (page ttl {}s, detail ttl {}s)",
        config.cache.page_ttl_secs, config.cache.detail_ttl_secs
    );

    let prefetcher = Prefetcher::new(Arc::clone(&cache), &config.prefetch);
    if config.prefetch.enabled {
        info!(
            "Prefetcher started with {} workers",
            config.prefetch.max_concurrent
        );
    } else {
        info!("Prefetching disabled");
    }

    let repository: Arc<dyn BookRepository> = Arc::new(
        SqliteBookRepository::new(&config.database.path)
            .context("Failed to open book database")?,
    );
    info!("Book repository initialized");

    Ok(BookService::new(cache, prefetcher, repository))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let output = serde_json::to_string_pretty(value).context("Failed to encode output")?;
    println!("{}", output);
    Ok(())
}
