//! # Plenum CLI (`plenum`)
//!
//! The `plenum` binary drives the indexing pipeline. It provides
//! commands for database initialization, running indexing passes,
//! inspecting progress, and starting the trigger/status HTTP server.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `plenum init` | Create the SQLite database and run schema migrations |
//! | `plenum pass` | Run one indexing pass over the configured scope |
//! | `plenum status` | Show index size and per-pair watermark summary |
//! | `plenum watermarks` | List all watermark rows |
//! | `plenum bootstrap` | Seed watermarks from an existing index |
//! | `plenum reset-watermarks` | Delete all watermarks (next pass is full) |
//! | `plenum serve` | Start the trigger/status HTTP server |
//!
//! ## Examples
//!
//! ```bash
//! # Initialize the watermark database
//! plenum init --config ./config/plenum.toml
//!
//! # One-off full pass (no watermarks yet)
//! plenum pass --config ./config/plenum.toml
//!
//! # Adopt an index built before watermarks existed
//! plenum bootstrap --config ./config/plenum.toml
//!
//! # Serve POST /pass and GET /status for a scheduler
//! plenum serve --config ./config/plenum.toml
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use plenum::config::{self, Config};
use plenum::db;
use plenum::embedding::OpenAiEmbedder;
use plenum::indexer::Indexer;
use plenum::migrate;
use plenum::segment::BuiltinSegmenter;
use plenum::server;
use plenum::source::DipClient;
use plenum::vector::{QdrantStore, VectorStore};
use plenum::watermark::WatermarkStore;

/// Plenum — incremental semantic indexing for parliamentary documents.
///
/// All commands accept a `--config` flag pointing to a TOML
/// configuration file. See `config/plenum.example.toml` for a full
/// example.
#[derive(Parser)]
#[command(
    name = "plenum",
    about = "Plenum — incremental semantic indexing for parliamentary documents",
    version,
    long_about = "Plenum crawls a DIP-style parliamentary document API, segments transcripts \
    and printed documents into semantic chunks, embeds them, and upserts them into a Qdrant \
    collection under deterministic point keys. Watermarks make repeat passes incremental; \
    the existence check makes them idempotent."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/plenum.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the watermark database schema.
    ///
    /// Creates the SQLite database file and the watermarks table.
    /// Idempotent — running it multiple times is safe.
    Init,

    /// Run one indexing pass over the configured terms and categories.
    ///
    /// Full or incremental is decided per (term, category) pair from
    /// watermark presence; `reset-watermarks` forces the next pass to
    /// run full.
    Pass,

    /// Show index size and watermark summary.
    Status,

    /// List all watermark rows.
    Watermarks,

    /// Seed watermarks from an existing index.
    ///
    /// Scans point payloads in the vector store and records the
    /// maximum content date per (term, category). Runs only when the
    /// watermark table is empty; never overwrites existing rows.
    Bootstrap,

    /// Delete all watermarks so the next pass runs full.
    ResetWatermarks,

    /// Start the trigger/status HTTP server.
    ///
    /// Binds to `[server].bind` and serves `POST /pass`, `GET /status`
    /// and `GET /health`.
    Serve,
}

async fn build_indexer(cfg: &Config) -> anyhow::Result<Arc<Indexer>> {
    let pool = db::connect(cfg).await?;
    migrate::apply(&pool).await?;

    let source = Arc::new(DipClient::new(&cfg.api, &cfg.resilience)?);
    let embedder = Arc::new(OpenAiEmbedder::new(&cfg.embedding)?);
    let store = Arc::new(QdrantStore::new(&cfg.qdrant)?);
    let watermarks = Arc::new(WatermarkStore::new(pool));
    let segmenter = Arc::new(BuiltinSegmenter::new(cfg.chunking.clone()));

    store.ensure_collection(cfg.embedding.dims).await?;

    let indexer = Arc::new(Indexer::new(
        cfg,
        source,
        embedder,
        store as Arc<dyn VectorStore>,
        watermarks,
        segmenter,
    ));
    Ok(indexer)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("plenum=info")),
        )
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Pass => {
            let indexer = build_indexer(&cfg).await?;
            let report = indexer
                .run_pass()
                .await
                .map_err(|e| anyhow::anyhow!("{}", e))?;
            let mode = report
                .mode
                .map(|m| format!("{:?}", m).to_lowercase())
                .unwrap_or_else(|| "-".to_string());
            println!(
                "Pass finished ({} mode): {} indexed, {} skipped, {} errors in {}s",
                mode,
                report.indexed,
                report.skipped,
                report.errors,
                report.duration_secs.unwrap_or(0)
            );
        }
        Commands::Status => {
            let pool = db::connect(&cfg).await?;
            migrate::apply(&pool).await?;
            let watermarks = WatermarkStore::new(pool);
            let store = QdrantStore::new(&cfg.qdrant)?;

            match store.count().await {
                Ok(count) => println!("Index points: {}", count),
                Err(e) => println!("Index points: unavailable ({})", e),
            }
            let rows = watermarks.all().await?;
            if rows.is_empty() {
                println!("No watermarks — the next pass runs full.");
            } else {
                println!("Watermarked pairs: {}", rows.len());
            }
        }
        Commands::Watermarks => {
            let pool = db::connect(&cfg).await?;
            migrate::apply(&pool).await?;
            let watermarks = WatermarkStore::new(pool);
            let rows = watermarks.all().await?;
            if rows.is_empty() {
                println!("No watermarks.");
            }
            for wm in rows {
                println!(
                    "  term {:>3}  {:<12} last indexed {}  ({} documents)",
                    wm.term,
                    wm.category.label(),
                    wm.last_indexed_at.format("%Y-%m-%d %H:%M:%S"),
                    wm.indexed_count
                );
            }
        }
        Commands::Bootstrap => {
            let pool = db::connect(&cfg).await?;
            migrate::apply(&pool).await?;
            let watermarks = WatermarkStore::new(pool);
            let store = QdrantStore::new(&cfg.qdrant)?;
            let seeded = watermarks.bootstrap(&store).await?;
            if seeded == 0 {
                println!("Nothing to bootstrap (watermarks present or index empty).");
            } else {
                println!("Seeded {} watermark pair(s) from the index.", seeded);
            }
        }
        Commands::ResetWatermarks => {
            let pool = db::connect(&cfg).await?;
            migrate::apply(&pool).await?;
            let watermarks = WatermarkStore::new(pool);
            let removed = watermarks.clear().await?;
            println!("Removed {} watermark row(s); the next pass runs full.", removed);
        }
        Commands::Serve => {
            let indexer = build_indexer(&cfg).await?;
            server::run_server(&cfg.server.bind, indexer).await?;
        }
    }

    Ok(())
}
