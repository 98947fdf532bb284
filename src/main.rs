//! # Info Harvest CLI (`harvest`)
//!
//! ## Usage
//!
//! ```bash
//! harvest --config ./config/harvest.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `harvest init` | Create the SQLite database and run schema migrations |
//! | `harvest scrape` | Run one incremental scrape |
//! | `harvest watch` | Scrape every `scrape.interval_secs` until Ctrl-C |
//! | `harvest cursor` | Show, set or clear the scrape cursor |
//! | `harvest get <id>` | Print one stored article |
//! | `harvest list` | List recent articles |
//! | `harvest stats` | Store summary |
//! | `harvest extract <url>` | Fetch one page and show what the extractors make of it |
//!
//! Logs go to stderr through `tracing` (`RUST_LOG`, default `info`);
//! command output goes to stdout.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt as tfmt, EnvFilter};

use info_harvest::config::{self, Config};
use info_harvest::traits::ArticleSource;
use info_harvest::{db, get, ingest, migrate, portal, scrape, stats};

/// Info Harvest: incremental scraper for a university information portal.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/harvest.example.toml` for a full example.
#[derive(Parser)]
#[command(name = "harvest", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/harvest.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite file and the `articles` and `scrape_metadata`
    /// tables. Safe to run repeatedly.
    Init,

    /// Run one scrape.
    ///
    /// Skipped when the previous run is more recent than
    /// `scrape.min_interval_secs`, unless `--force` is given.
    Scrape {
        /// Ignore the minimum-interval guard.
        #[arg(long)]
        force: bool,

        /// Store listing metadata only; do not fetch detail pages.
        #[arg(long)]
        listing_only: bool,

        /// Ignore the cursor and scan from the newest item down to the page limit.
        #[arg(long)]
        full: bool,

        #[arg(long)]
        max_pages: Option<u32>,

        #[arg(long)]
        page_size: Option<u32>,

        /// Emit progress as JSON lines on stderr.
        #[arg(long)]
        json: bool,
    },

    /// Scrape periodically until interrupted.
    Watch {
        #[arg(long)]
        json: bool,
    },

    /// Inspect or override the scrape cursor.
    Cursor {
        #[command(subcommand)]
        action: Option<CursorAction>,
    },

    /// Print one article by its portal id.
    Get { unique_id: String },

    /// List stored articles, newest first.
    List {
        #[arg(long, default_value_t = 20)]
        limit: i64,

        /// Only articles published on or after this date (YYYY-MM-DD).
        #[arg(long)]
        since: Option<String>,
    },

    /// Show store statistics.
    Stats,

    /// Fetch a detail URL and show which extractor handles it and what it
    /// extracts. Does not write to the database.
    Extract {
        url: String,

        /// Visit the portal first to capture cookies and a CSRF token.
        #[arg(long)]
        with_session: bool,
    },
}

#[derive(Subcommand)]
enum CursorAction {
    /// Print the cursor (default).
    Show,
    /// Set the cursor to an epoch-millisecond value.
    Set { timestamp_ms: i64 },
    /// Remove the cursor; the next run scans from the beginning.
    Clear,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    // Commands that don't require config
    if let Commands::Extract { url, with_session } = &cli.command {
        let cfg = config::load_config(&cli.config).unwrap_or_else(|_| Config::minimal());
        return run_extract(&cfg, url, *with_session).await;
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Scrape {
            force,
            listing_only,
            full,
            max_pages,
            page_size,
            json,
        } => {
            let args = scrape::ScrapeArgs {
                force,
                full,
                listing_only,
                max_pages,
                page_size,
                json,
            };
            scrape::run_scrape(&cfg, &args).await?;
        }
        Commands::Watch { json } => {
            scrape::run_watch(&cfg, json).await?;
        }
        Commands::Cursor { action } => {
            run_cursor(&cfg, action.unwrap_or(CursorAction::Show)).await?;
        }
        Commands::Get { unique_id } => {
            get::run_get(&cfg, &unique_id).await?;
        }
        Commands::List { limit, since } => {
            get::run_list(&cfg, limit, since.as_deref()).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
        Commands::Extract { .. } => {
            // Handled above (before config loading)
            unreachable!()
        }
    }

    Ok(())
}

async fn run_cursor(cfg: &Config, action: CursorAction) -> Result<()> {
    let pool = db::connect(cfg).await?;
    match action {
        CursorAction::Show => match ingest::get_last_scrape_time(&pool).await? {
            Some(ms) => println!("{} ({})", ms, get::format_ms_iso(ms)),
            None => println!("never"),
        },
        CursorAction::Set { timestamp_ms } => {
            ingest::set_last_scrape_time(&pool, timestamp_ms).await?;
            println!("cursor set to {}", timestamp_ms);
        }
        CursorAction::Clear => {
            ingest::clear_last_scrape_time(&pool).await?;
            println!("cursor cleared");
        }
    }
    pool.close().await;
    Ok(())
}

async fn run_extract(cfg: &Config, url: &str, with_session: bool) -> Result<()> {
    let mut client = portal::PortalClient::new(cfg)?;
    if with_session {
        client
            .prepare()
            .await
            .context("failed to initialize portal session")?;
    }
    let resolved = client
        .resolve_url(url)
        .await
        .with_context(|| format!("failed to fetch {}", url))?;

    println!("url:          {}", url);
    if resolved.final_url != url {
        println!("final url:    {}", resolved.final_url);
    }
    if resolved.degraded {
        println!("extractor:    {} (site extractor failed, see log)", resolved.extractor);
    } else {
        println!("extractor:    {}", resolved.extractor);
    }
    println!("title:        {}", resolved.content.title);
    println!("department:   {}", resolved.content.department);
    println!("publish time: {}", resolved.content.publish_time);
    println!("content:      {} chars", resolved.content.html_content.chars().count());
    println!();
    println!("--- Plain text ---");
    println!("{}", resolved.content.plain_text);
    Ok(())
}
