//! Footfall Service - visitor records and analytics over HTTP.
//!
//! Run with: `cargo run -p footfall-service`

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use clap::{Parser, Subcommand};
use rand::SeedableRng;
use rand::rngs::StdRng;
use time::OffsetDateTime;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use footfall_service::{AppState, CacheBackend, Config, api};
use footfall_store::Store;
use footfall_store::seed::{MAX_SEED_DAYS, SeedOptions, seed_demo_data};

/// Footfall Service - visitor records and cached analytics over HTTP.
#[derive(Parser, Debug)]
#[command(name = "footfall-service")]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Bind address (overrides config).
    #[arg(short, long, global = true)]
    bind: Option<String>,

    /// Database path (overrides config).
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server in the foreground (default behavior).
    Run,

    /// Fill the database with demo locations, sensors and visitor counts.
    Seed {
        /// Number of days of history to generate, ending today.
        #[arg(
            long,
            default_value_t = 30,
            value_parser = clap::value_parser!(u32).range(0..=i64::from(MAX_SEED_DAYS))
        )]
        days: u32,

        /// Fixed RNG seed for reproducible data.
        #[arg(long)]
        seed: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("footfall_service=info".parse()?)
                .add_directive("footfall_analytics=info".parse()?)
                .add_directive("tower_http=debug".parse()?),
        )
        .init();

    let config = load_config(&args)?;

    match args.command {
        Some(Command::Seed { days, seed }) => seed_database(&config, days, seed),
        Some(Command::Run) | None => run_server(config).await,
    }
}

fn load_config(args: &Args) -> anyhow::Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default().unwrap_or_default(),
    };

    if let Some(bind) = &args.bind {
        config.server.bind = bind.clone();
    }
    if let Some(db_path) = &args.database {
        config.storage.path = db_path.clone();
    }

    config.validate()?;
    Ok(config)
}

fn seed_database(config: &Config, days: u32, seed: Option<u64>) -> anyhow::Result<()> {
    info!("Opening database at {:?}", config.storage.path);
    let store = Store::open(&config.storage.path)?;

    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let options = SeedOptions {
        today: OffsetDateTime::now_utc().date(),
        days,
    };

    let summary = seed_demo_data(&store, &options, &mut rng)?;
    println!(
        "Seeded {} locations, {} sensors and {} visitor records ({} visitors)",
        summary.locations, summary.sensors, summary.observations, summary.total_visitors
    );
    Ok(())
}

async fn run_server(config: Config) -> anyhow::Result<()> {
    info!("Opening database at {:?}", config.storage.path);
    let store = Store::open(&config.storage.path)?;

    let state = build_state(store, config.clone()).await?;

    let app = Router::new()
        .merge(api::router())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    let addr: SocketAddr = config.server.bind.parse()?;

    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn build_state(store: Store, config: Config) -> anyhow::Result<Arc<AppState>> {
    match config.cache.backend {
        CacheBackend::Memory => {
            info!(
                "Using in-process analytics cache (ttl {}s)",
                config.cache.ttl_secs
            );
            Ok(AppState::with_memory_cache(store, config))
        }
        #[cfg(feature = "redis")]
        CacheBackend::Redis => {
            let url = config.cache.redis_url.clone().unwrap_or_default();
            match footfall_analytics::cache::RedisCache::connect(&url).await {
                Ok(redis) => {
                    let redis = Arc::new(redis);
                    info!("Using Redis analytics cache (ttl {}s)", config.cache.ttl_secs);
                    Ok(AppState::new(store, config, redis.clone(), redis))
                }
                Err(e) => {
                    tracing::warn!(
                        "Redis unavailable ({}), falling back to in-process analytics cache",
                        e
                    );
                    Ok(AppState::with_memory_cache(store, config))
                }
            }
        }
        #[cfg(not(feature = "redis"))]
        CacheBackend::Redis => {
            anyhow::bail!("cache.backend = \"redis\" requires building with the `redis` feature")
        }
    }
}
