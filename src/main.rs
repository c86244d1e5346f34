use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use linkharvest::HarvestConfig;
use linkharvest::commands::{self, FetchOptions};
use linkharvest::dedup::{FirstOccurrence, RichestSummary, SelectionPolicy};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "linkharvest")]
#[command(about = "Extract, deduplicate and fetch links from research notes")]
#[command(version)]
struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build link tables for every `*/original sources.txt`
    Extract {
        /// Directory whose subfolders hold the source documents
        #[arg(long, default_value = ".")]
        data_dir: PathBuf,

        /// How to pick one link per duplicate group
        #[arg(long, value_enum, default_value_t = Policy::Richest)]
        policy: Policy,
    },

    /// Download everything listed in a deduplicated link table
    Fetch {
        /// Directory containing deduplicated.json
        #[arg(long, default_value = ".")]
        base_dir: PathBuf,

        /// Actually issue network requests (otherwise a dry run)
        #[arg(long)]
        run: bool,

        /// Skip the headless browser fallback
        #[arg(long)]
        no_render: bool,

        /// Skip the connectivity check
        #[arg(long)]
        no_preflight: bool,

        /// Direct-fetch pool size
        #[arg(long)]
        http_workers: Option<usize>,

        /// Render pool size
        #[arg(long)]
        render_workers: Option<usize>,

        /// Per-request timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Policy {
    /// Earliest occurrence in the document
    First,
    /// Longest accompanying summary
    Richest,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let mut config = HarvestConfig::default();

    match cli.command {
        Commands::Extract { data_dir, policy } => {
            let policy: &dyn SelectionPolicy = match policy {
                Policy::First => &FirstOccurrence,
                Policy::Richest => &RichestSummary,
            };
            commands::run_extract(&data_dir, policy, &config)?;
        }
        Commands::Fetch {
            base_dir,
            run,
            no_render,
            no_preflight,
            http_workers,
            render_workers,
            timeout,
        } => {
            if let Some(n) = http_workers {
                config.http_workers = n;
            }
            if let Some(n) = render_workers {
                config.render_workers = n;
            }
            if let Some(secs) = timeout {
                config.timeout = Duration::from_secs(secs);
            }
            if no_preflight {
                config.preflight_url = None;
            }
            let options = FetchOptions {
                run,
                render: !no_render,
            };
            commands::run_fetch(&base_dir, config, options).await?;
        }
    }

    Ok(())
}
