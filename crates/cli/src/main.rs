//! ThreadClaw CLI: the main entry point.
//!
//! Commands:
//! - `chat`    Talk to the agent in a terminal thread (interactive or single message)
//! - `config`  Show the effective or default configuration

use clap::{Parser, Subcommand};
use threadclaw_config::{AppConfig, LoggingConfig};

mod commands;

#[derive(Parser)]
#[command(
    name = "threadclaw",
    about = "ThreadClaw: a tool-calling conversation runtime",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with the agent in a terminal thread
    Chat {
        /// Thread id to converse in
        #[arg(short, long, default_value = threadclaw_channels::cli::DEFAULT_THREAD)]
        thread: String,

        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Show configuration
    Config {
        /// Print the built-in defaults instead of the effective configuration
        #[arg(long)]
        default: bool,

        /// Print the config file path
        #[arg(long, conflicts_with = "default")]
        path: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = AppConfig::load();
    init_tracing(
        cli.verbose,
        config.as_ref().map(|c| &c.logging).unwrap_or(&LoggingConfig::default()),
    );

    match cli.command {
        Commands::Chat { thread, message } => commands::chat::run(config?, thread, message).await?,
        Commands::Config { default, path } => commands::config_cmd::run(config, default, path)?,
    }

    Ok(())
}

/// `RUST_LOG` wins, then `--verbose`, then the configured level.
fn init_tracing(verbose: bool, logging: &LoggingConfig) {
    let fallback = if verbose { "debug" } else { logging.level.as_str() };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(fallback));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}
