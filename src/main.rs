//! # credence CLI
//!
//! ```bash
//! credence --config ./config/credence.toml <command>
//! ```
//!
//! | Command | Description |
//! |---------|-------------|
//! | `credence init [--seed]` | Create the SQLite schema, optionally seeding reference domains |
//! | `credence verify <url>` | Run one verification and print the result |
//! | `credence trust get <domain>` | Show a trust-store row |
//! | `credence trust set <domain> <score>` | Insert or update a trust override |
//! | `credence cache get <url>` | Show a cached record without counting a hit |
//! | `credence cache sweep` | Mark expired cache rows stale or expired |
//! | `credence serve http` | Start the HTTP API |

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use credence::traits::Credentials;
use credence::{cache_cmd, config, migrate, server, trust_cmd, verify_cmd};

/// URL credibility verification.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/credence.example.toml` for every setting.
#[derive(Parser)]
#[command(
    name = "credence",
    about = "credence: URL credibility verification with cached, scored results",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/credence.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Idempotent.
    Init {
        /// Insert reference domain trust rows that are not already present.
        #[arg(long)]
        seed: bool,
    },

    /// Verify the credibility of a URL.
    Verify {
        url: String,

        /// OpenAI API key; overrides the configured environment variable.
        #[arg(long)]
        openai_key: Option<String>,

        /// Perplexity API key; overrides the configured environment variable.
        #[arg(long)]
        perplexity_key: Option<String>,

        /// Print the full result as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Inspect or edit domain trust overrides.
    Trust {
        #[command(subcommand)]
        action: TrustAction,
    },

    /// Inspect or maintain the result cache.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Start a server.
    Serve {
        #[command(subcommand)]
        service: ServeService,
    },
}

#[derive(Subcommand)]
enum TrustAction {
    /// Show the trust row for a domain.
    Get { domain: String },

    /// Insert or update a trust override.
    Set {
        domain: String,

        /// Trust score in [0.0, 1.0].
        score: f64,

        #[arg(long)]
        category: Option<String>,

        /// low, medium, high, or unknown.
        #[arg(long)]
        bias: Option<String>,

        /// very_high, high, medium, low, very_low, or unknown.
        #[arg(long)]
        reliability: Option<String>,

        #[arg(long)]
        notes: Option<String>,

        /// Store the row but exclude it from shortcut lookups.
        #[arg(long)]
        inactive: bool,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Show the cached record for an exact URL.
    Get { url: String },

    /// Transition rows past their expiry to stale or expired.
    Sweep,
}

#[derive(Subcommand)]
enum ServeService {
    /// HTTP API on `[server].bind`.
    Http,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init { seed } => {
            let seeded = migrate::run_migrations(&cfg, seed).await?;
            println!("Database initialized successfully.");
            if seed {
                println!("Seeded {} reference domains.", seeded);
            }
        }
        Commands::Verify {
            url,
            openai_key,
            perplexity_key,
            json,
        } => {
            let credentials = Credentials::new(openai_key, perplexity_key);
            verify_cmd::run_verify(&cfg, &url, credentials, json).await?;
        }
        Commands::Trust { action } => match action {
            TrustAction::Get { domain } => {
                trust_cmd::run_trust_get(&cfg, &domain).await?;
            }
            TrustAction::Set {
                domain,
                score,
                category,
                bias,
                reliability,
                notes,
                inactive,
            } => {
                trust_cmd::run_trust_set(
                    &cfg,
                    &domain,
                    score,
                    category,
                    bias,
                    reliability,
                    notes,
                    inactive,
                )
                .await?;
            }
        },
        Commands::Cache { action } => match action {
            CacheAction::Get { url } => {
                cache_cmd::run_cache_get(&cfg, &url).await?;
            }
            CacheAction::Sweep => {
                cache_cmd::run_cache_sweep(&cfg).await?;
            }
        },
        Commands::Serve { service } => match service {
            ServeService::Http => {
                server::run_server(&cfg).await?;
            }
        },
    }

    Ok(())
}
