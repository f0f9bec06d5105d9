use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use verso::config::{load_config, LogFormat, LoggingConfig};
use verso::diff::{self, patch::DEFAULT_CONTEXT};
use verso::server::run_http_server;

/// Verso: content versioning with publishing, tags, diffs and revert
#[derive(Parser)]
#[command(name = "verso")]
#[command(
    about = "Content versioning engine. Immutable snapshots, a single publish slot per stream, tags, line diffs and revert."
)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP/JSON server
    Serve {
        /// Path to a configuration file
        #[arg(short, long, env = "VERSO_CONFIG")]
        config: Option<PathBuf>,
        /// Override server.host
        #[arg(long)]
        host: Option<String>,
        /// Override server.port
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Print a line diff of two files
    Diff {
        /// Original file
        from: PathBuf,
        /// Changed file
        to: PathBuf,
        /// Unchanged lines shown around each hunk
        #[arg(short = 'U', long, default_value_t = DEFAULT_CONTEXT)]
        context: usize,
        /// Print only the addition and deletion counts
        #[arg(long, conflicts_with = "json")]
        stat: bool,
        /// Print the change set as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config, host, port } => {
            let mut config =
                load_config(config.as_deref()).context("failed to load configuration")?;
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }

            init_tracing(&config.logging);
            tracing::info!(
                host = %config.server.host,
                port = config.server.port,
                backend = ?config.storage.backend,
                "Starting verso"
            );
            run_http_server(config).await.context("server failed")?;
        }
        Commands::Diff {
            from,
            to,
            context,
            stat,
            json,
        } => {
            let old = std::fs::read_to_string(&from)
                .with_context(|| format!("failed to read {}", from.display()))?;
            let new = std::fs::read_to_string(&to)
                .with_context(|| format!("failed to read {}", to.display()))?;

            let (changes, summary) = diff::diff_with_summary(&old, &new);
            if stat {
                println!("+{} -{}", summary.additions, summary.deletions);
            } else if json {
                let rendered = serde_json::to_string_pretty(&serde_json::json!({
                    "changes": changes,
                    "additions": summary.additions,
                    "deletions": summary.deletions,
                }))
                .context("failed to encode diff")?;
                println!("{}", rendered);
            } else {
                print!(
                    "{}",
                    diff::render_unified(
                        &changes,
                        &from.display().to_string(),
                        &to.display().to_string(),
                        context,
                    )
                );
            }
        }
    }

    Ok(())
}

/// `RUST_LOG` wins over the configured filter.
fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.filter.as_str()));

    let registry = tracing_subscriber::registry().with(filter);
    match logging.format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}
