//! Scan History - persistence and live history for media analysis results.
//!
//! Results are stored in a hosted document database when one is configured,
//! and in a private local SQLite file otherwise. The choice is made once at
//! startup; every command works the same way in both modes.
//!
//!   scan-history submit -n clip.mp4 -r manipulated -c 96.4 -i "Lip Sync mismatch"
//!   scan-history history                # newest first
//!   scan-history history --watch        # follow changes (remote mode)
//!   scan-history mode                   # which store is active

mod application;
mod cli;
mod domain;
mod infrastructure;

use clap::Parser;
use colored::Colorize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use application::{
    format_history_json, format_history_table, format_mode, ModeSelector, OutputFormat,
    RecordService,
};
use cli::{Cli, Commands, ConfigAction};
use domain::{AnalysisRecord, AppConfig, AppError, Mode, NewRecord};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

/// Main application logic.
async fn run(cli: Cli) -> domain::Result<()> {
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Submit {
            file_name,
            result,
            confidence,
            issues,
        } => {
            let service = open_service(config_path)?;
            let record = NewRecord {
                file_name,
                result,
                confidence,
                issues,
            };
            cmd_submit(&service, record).await?;
        }
        Commands::History { watch, format } => {
            let service = open_service(config_path)?;
            cmd_history(&service, watch, format).await?;
        }
        Commands::Mode => {
            let service = open_service(config_path)?;
            println!("{}", format_mode(service.mode()));
        }
        Commands::Config { action } => {
            cmd_config(action, config_path)?;
        }
    }

    Ok(())
}

/// Load configuration and build the service around the selected store.
fn open_service(explicit_path: Option<&std::path::Path>) -> domain::Result<RecordService> {
    let config = load_config(explicit_path)?;
    Ok(RecordService::new(ModeSelector::select(&config)?))
}

/// Submit a record command.
async fn cmd_submit(service: &RecordService, record: NewRecord) -> domain::Result<()> {
    let name = record.file_name.clone();
    service.submit(record).await?;

    println!(
        "{} Saved {} to the {} store",
        "✓".green().bold(),
        if name.is_empty() { "result" } else { name.as_str() },
        service.mode()
    );

    Ok(())
}

/// Show history command.
async fn cmd_history(
    service: &RecordService,
    watch: bool,
    format: OutputFormat,
) -> domain::Result<()> {
    let mut feed = service.watch_history().await;

    if watch && service.mode() == Mode::Local {
        eprintln!(
            "{} local history is a snapshot; showing it once",
            "note:".yellow().bold()
        );
    }

    if !watch || service.mode() == Mode::Local {
        if let Some(records) = feed.next().await {
            print_history(&records, format)?;
        }
        return Ok(());
    }

    loop {
        tokio::select! {
            delivery = feed.next() => match delivery {
                Some(records) => print_history(&records, format)?,
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    Ok(())
}

fn load_config(explicit_path: Option<&std::path::Path>) -> domain::Result<AppConfig> {
    match explicit_path {
        Some(path) => infrastructure::load_config_from_file(path),
        None => infrastructure::load_config(),
    }
}

fn print_history(records: &[AnalysisRecord], format: OutputFormat) -> domain::Result<()> {
    let output = match format {
        OutputFormat::Table => format_history_table(records),
        OutputFormat::Json => format_history_json(records).map_err(AppError::json_parse)?,
    };
    println!("{output}");
    Ok(())
}

/// Configuration management command.
fn cmd_config(action: ConfigAction, explicit_path: Option<&std::path::Path>) -> domain::Result<()> {
    let path = explicit_path.map_or_else(
        infrastructure::config_file_path,
        std::path::Path::to_path_buf,
    );

    match action {
        ConfigAction::Init => {
            if infrastructure::ensure_config_exists(&path)? {
                println!("{} Created {}", "✓".green().bold(), path.display());
            } else {
                println!("Configuration already exists at {}", path.display());
            }
        }
        ConfigAction::Show => {
            let config = load_config(explicit_path)?.redacted();
            let content = toml::to_string_pretty(&config).map_err(|e| AppError::Config {
                message: format!("Failed to serialize config: {e}"),
            })?;
            println!("{content}");
        }
        ConfigAction::Path => {
            println!("{}", path.display());
        }
    }

    Ok(())
}

/// Setup tracing/logging based on verbosity level.
fn setup_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).without_time())
        .with(filter)
        .init();
}
