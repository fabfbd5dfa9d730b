use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use proxima_common::{logger, AppConfig};
use proxima_vector::{CancellationToken, FilterParams, Location, RankingEngine, SearchOptions};
use std::path::PathBuf;

/// Find project root by looking for .git directory
fn find_project_root() -> Option<PathBuf> {
    let mut current_dir = std::env::current_dir().ok()?;

    loop {
        if current_dir.join(".git").exists() {
            return Some(current_dir);
        }

        if !current_dir.pop() {
            break;
        }
    }

    None
}

/// Load .env file from project root
fn load_dotenv_from_project_root() {
    if let Some(root) = find_project_root() {
        let env_path = root.join(".env");
        if env_path.exists() {
            dotenv::from_path(&env_path).ok();
        }
    } else {
        // Fallback to default dotenv behavior
        dotenv::dotenv().ok();
    }
}

#[derive(Parser)]
#[command(name = "proxima")]
#[command(about = "Proxima - semantic search with location-aware ranking", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Host to bind to (overrides SERVER_HOST)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (overrides SERVER_PORT)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Run a single search and print the results as JSON
    Search {
        /// Query text
        query: String,

        /// Number of results
        #[arg(long)]
        limit: Option<usize>,

        /// Ranked results to skip
        #[arg(long, default_value_t = 0)]
        offset: usize,

        /// Caller latitude
        #[arg(long, requires = "lon", allow_negative_numbers = true)]
        lat: Option<f64>,

        /// Caller longitude
        #[arg(long, requires = "lat", allow_negative_numbers = true)]
        lon: Option<f64>,

        /// Drop results farther than this many kilometres
        #[arg(long, requires = "lat")]
        radius_km: Option<f64>,

        /// Filter parameters as a JSON object, e.g. '{"category":"mechanics","maxPrice":100}'
        #[arg(long)]
        filters: Option<String>,

        /// Similarity threshold override
        #[arg(long, allow_negative_numbers = true)]
        threshold: Option<f32>,

        /// Include similarity and distance in the output
        #[arg(long)]
        scores: bool,
    },

    /// Find items similar to a stored item
    Similar {
        /// Source item ID
        id: String,

        /// Number of results
        #[arg(long)]
        limit: Option<usize>,

        /// Ranked results to skip
        #[arg(long, default_value_t = 0)]
        offset: usize,

        /// Filter parameters as a JSON object
        #[arg(long)]
        filters: Option<String>,

        /// Include similarity in the output
        #[arg(long)]
        scores: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    load_dotenv_from_project_root();

    match cli.command {
        Some(Commands::Serve { host, port }) => {
            // Override with CLI arguments
            if let Some(host) = &host {
                std::env::set_var("SERVER_HOST", host);
            }
            if let Some(port) = port {
                std::env::set_var("SERVER_PORT", port.to_string());
            }

            serve(AppConfig::from_env()?).await?;
        }
        Some(Commands::Search {
            query,
            limit,
            offset,
            lat,
            lon,
            radius_km,
            filters,
            threshold,
            scores,
        }) => {
            let config = AppConfig::from_env()?;
            logger::setup_console_logging(&config.log_level)?;

            let mut options = SearchOptions::new()
                .with_filters(parse_filters(filters.as_deref())?)
                .with_scores(scores);
            options.limit = limit;
            options.offset = offset;
            options.score_threshold = threshold;
            options.radius_km = radius_km;
            if let (Some(lat), Some(lon)) = (lat, lon) {
                options.location = Some(Location::new(lat, lon)?);
            }

            let engine = RankingEngine::from_config(&config)?;
            let cancel = interrupt_token();
            let results = engine.execute(&query, options, &cancel).await?;
            println!("{}", serde_json::to_string_pretty(&results)?);
        }
        Some(Commands::Similar {
            id,
            limit,
            offset,
            filters,
            scores,
        }) => {
            let config = AppConfig::from_env()?;
            logger::setup_console_logging(&config.log_level)?;

            let mut options = SearchOptions::new()
                .with_filters(parse_filters(filters.as_deref())?)
                .with_scores(scores);
            options.limit = limit;
            options.offset = offset;

            let engine = RankingEngine::from_config(&config)?;
            let cancel = interrupt_token();
            let results = engine.similar_to(&id, options, &cancel).await?;
            println!("{}", serde_json::to_string_pretty(&results)?);
        }
        None => {
            // Default: start server with default config
            serve(AppConfig::from_env()?).await?;
        }
    }

    Ok(())
}

async fn serve(config: AppConfig) -> Result<()> {
    logger::setup_logging(&config.log_dir, &config.log_level)?;

    tracing::info!("Proxima starting...");
    tracing::info!("Configuration loaded:");
    tracing::info!("  Bind: {}", config.server_bind_address());
    tracing::info!("  Index: {} ({})", config.index_url, config.index_collection);
    tracing::info!(
        "  Embedding: {:?} {} (dim {})",
        config.embedding_provider,
        config.embedding_model,
        config.vector_dim
    );

    println!("Server listening on http://{}", config.server_bind_address());

    proxima_server::start_server(config).await?;
    Ok(())
}

/// Token cancelled on Ctrl-C
fn interrupt_token() -> CancellationToken {
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });
    cancel
}

fn parse_filters(raw: Option<&str>) -> Result<FilterParams> {
    match raw {
        Some(raw) => serde_json::from_str(raw).context("--filters must be a JSON object"),
        None => Ok(FilterParams::new()),
    }
}
