use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use standboard::client::BoardClient;
use standboard::config::Config;
use standboard::engine::Engine;

mod commands;

#[derive(Parser)]
#[command(
    name = "standboard",
    version,
    about = "Hunting club stand board with a daily turn-order drawing",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (TOML); environment variables are used when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json); overrides the config file
    #[arg(long, global = true)]
    log_format: Option<String>,

    /// Board service URL for request commands; overrides the config file
    #[arg(long, global = true)]
    server: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the service: serve requests and start the drawing every day
    Run,

    /// Show who is signed in where
    Board {
        /// Print JSON instead of a table
        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// Sign in at a stand, or out if already there
    Check {
        /// Stand identifier (e.g. 7B)
        location: String,

        /// Member name
        user: String,

        /// Guest accompanying the member
        #[arg(short, long)]
        guest: Option<String>,
    },

    /// Enter or leave the next drawing
    Enter {
        /// Member name
        user: String,
    },

    /// Give up your turn in a running drawing
    Skip {
        /// Member name
        user: String,
    },

    /// Show drawing status for a member
    Status {
        /// Member name
        user: String,
    },

    /// Record that two stands border each other
    Border {
        /// First stand
        a: String,

        /// Second stand
        b: String,
    },

    /// Create or update a member record
    Member {
        /// Member name
        user: String,

        /// Phone number or address for turn notices
        #[arg(long)]
        contact: Option<String>,

        /// Holder of a priority pass
        #[arg(long, default_value = "false")]
        priority: bool,
    },

    /// Start a drawing on the service now and follow it to completion
    Draw,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;

    let log_format = cli
        .log_format
        .clone()
        .unwrap_or_else(|| config.logging.format.clone());
    setup_tracing(&log_format, &config.logging.level, cli.verbose)?;

    if let Err(e) = standboard::metrics::init_metrics() {
        tracing::warn!(error = %e, "Metrics initialization failed");
    }

    let server_url = cli.server.unwrap_or_else(|| config.server.base_url());
    let timeout = Duration::from_secs(config.server.timeout_secs);
    let client = || -> Result<BoardClient> {
        let client = BoardClient::new(&server_url, timeout).context("Invalid board service URL")?;
        tracing::debug!(url = %client.base_url(), "Using board service");
        Ok(client)
    };

    match cli.command {
        Commands::Run => {
            let engine = Engine::from_config(&config).context("Failed to open the stand board")?;
            tracing::info!(
                start_time = %config.drawing.start_time,
                bind = %config.server.bind,
                "Starting service"
            );
            commands::run(engine, &config.server).await?;
        }

        Commands::Board { json } => {
            commands::board(&client()?, json).await?;
        }

        Commands::Check {
            location,
            user,
            guest,
        } => {
            tracing::debug!(location = %location, user = %user, guest = ?guest, "Check command");
            commands::check(&client()?, &location, &user, guest.as_deref()).await?;
        }

        Commands::Enter { user } => {
            commands::enter(&client()?, &user).await?;
        }

        Commands::Skip { user } => {
            commands::skip(&client()?, &user).await?;
        }

        Commands::Status { user } => {
            commands::status(&client()?, &user).await?;
        }

        Commands::Border { a, b } => {
            commands::border(&client()?, &a, &b).await?;
        }

        Commands::Member {
            user,
            contact,
            priority,
        } => {
            commands::member(&client()?, &user, contact.as_deref(), priority).await?;
        }

        Commands::Draw => {
            commands::draw(&client()?).await?;
        }
    }

    Ok(())
}

fn load_config(path: Option<&std::path::Path>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn setup_tracing(format: &str, level: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("standboard=debug,info")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("standboard={level},warn")))
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }

    Ok(())
}
