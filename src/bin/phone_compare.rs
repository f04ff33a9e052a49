//! Terminal chat host for phone comparisons.
//!
//! Each message (`"iPhone 13 vs Samsung S21"`) is answered with a streamed
//! markdown table on stdout. Logs go to stderr.

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::error;
use tracing_subscriber::EnvFilter;

use phone_compare::handler::DEFAULT_SAVE_PATH;
use phone_compare::{
    comparator_for, AppConfig, ComparisonMode, MessageHandler, Result, TerminalSink,
};

/// Compare two phones' specifications
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// How the comparison is driven
    #[arg(long, value_enum, default_value_t = ComparisonMode::Agents)]
    mode: ComparisonMode,

    /// Also write each table to a file
    #[arg(long, num_args = 0..=1, default_missing_value = DEFAULT_SAVE_PATH)]
    save: Option<PathBuf>,

    /// TOML file overriding the tunables
    #[arg(long)]
    config: Option<PathBuf>,

    /// Delay between streamed lines, in milliseconds
    #[arg(long)]
    stream_delay_ms: Option<u64>,

    /// One message to answer, e.g. `iPhone 13 vs Samsung S21`. Reads stdin
    /// line by line when omitted.
    message: Vec<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let handler = match build_handler(&cli) {
        Ok(handler) => handler,
        Err(e) => {
            error!(error = %e, "Startup failed");
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    if !cli.message.is_empty() {
        let text = cli.message.join(" ");
        return if answer(&handler, &text).await {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        };
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) if line.trim().is_empty() => continue,
            Ok(Some(line)) => {
                answer(&handler, line.trim()).await;
            }
            Ok(None) => break,
            Err(e) => {
                error!(error = %e, "Failed to read stdin");
                return ExitCode::FAILURE;
            }
        }
    }
    ExitCode::SUCCESS
}

fn build_handler(cli: &Cli) -> Result<MessageHandler> {
    let mut config = AppConfig::from_env()?;
    if let Some(path) = &cli.config {
        config = config.with_file(path)?;
    }
    if let Some(ms) = cli.stream_delay_ms {
        config.stream_delay = Duration::from_millis(ms);
    }

    let comparator = comparator_for(cli.mode, &config)?;
    let handler = MessageHandler::new(comparator, Arc::new(TerminalSink), config.stream_delay);
    Ok(match &cli.save {
        Some(path) => handler.with_save_path(path),
        None => handler,
    })
}

/// Returns `false` when the comparison failed.
async fn answer(handler: &MessageHandler, text: &str) -> bool {
    match handler.handle(text).await {
        Ok(_) => true,
        Err(e) => {
            error!(error = %e, input = text, "Comparison failed");
            println!("⚠️ Comparison failed: {}", e);
            false
        }
    }
}
