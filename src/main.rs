use std::process::ExitCode;
use std::sync::Arc;

use tracing::{error, info, warn};

use rss_poller::shutdown::wait_for_os_signal;
use rss_poller::{
    Config, Coordinator, Database, HttpFeedFetcher, PollerOptions, Shutdown, SqliteFeedRepository,
};

#[tokio::main]
async fn main() -> ExitCode {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    // Load configuration
    let (config, load_error) = match Config::load_with_env(&path) {
        Ok(config) => (config, None),
        Err(e) => {
            let mut config = Config::default();
            config.apply_env_overrides();
            (config, Some(e))
        }
    };

    // Initialize logging
    if let Err(e) = rss_poller::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        // Fall back to console-only logging
        rss_poller::logging::init_console_only(&config.logging.level);
    }

    if let Some(e) = load_error {
        warn!("Failed to load {}: {}; using default configuration", path, e);
    }

    if let Err(e) = config.validate() {
        error!("{}", e);
        return ExitCode::FAILURE;
    }

    info!("rss-poller {}", env!("CARGO_PKG_VERSION"));

    let db = match Database::open(&config.database).await {
        Ok(db) => db,
        Err(e) => {
            error!("Failed to open database {}: {}", config.database.url, e);
            return ExitCode::FAILURE;
        }
    };

    let repo = Arc::new(SqliteFeedRepository::new(db.pool().clone()));
    for seed in &config.feeds {
        match repo.ensure_feed(&seed.name, &seed.url).await {
            Ok(feed) => info!("Feed {} registered: {}", feed.id, feed.url),
            Err(e) => warn!("Failed to register feed {}: {}", seed.url, e),
        }
    }

    let fetcher = match HttpFeedFetcher::new(&config.fetcher) {
        Ok(fetcher) => Arc::new(fetcher),
        Err(e) => {
            error!("Failed to build HTTP client: {}", e);
            db.close().await;
            return ExitCode::FAILURE;
        }
    };

    let shutdown = Shutdown::new();
    let coordinator = Coordinator::new(
        PollerOptions::from(&config.poller),
        repo,
        fetcher,
        shutdown.signal(),
    );
    let poller = tokio::spawn(coordinator.run());

    wait_for_os_signal().await;
    info!("Shutdown requested");
    shutdown.trigger();

    let code = match poller.await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Poller task failed: {}", e);
            ExitCode::FAILURE
        }
    };

    db.close().await;
    info!("Bye");
    code
}
