//! mysql-dump CLI - snapshot-consistent MySQL dumps.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use mysql_dump::drivers::mysql::health_check;
use mysql_dump::{Config, DumpError, DumpSummary, Dumper, MysqlSource, OutputMode, Sink};
use tracing::{info, warn, Level};

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

#[derive(Parser)]
#[command(name = "mysql-dump")]
#[command(about = "Snapshot-consistent MySQL dumps")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Dump the configured database
    Dump {
        /// Destination file (overrides dump.output / dump.directory)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write a gzip-compressed dump
        #[arg(long, conflicts_with = "zip")]
        gzip: bool,

        /// Write a zip archive with one member per table
        #[arg(long)]
        zip: bool,

        /// Start the dump with DROP DATABASE / CREATE DATABASE
        #[arg(long)]
        drop_database: bool,

        /// Dump only these tables, in this order (comma-separated)
        #[arg(long, value_delimiter = ',')]
        tables: Option<Vec<String>>,
    },

    /// Test the source database connection
    HealthCheck,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), DumpError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format);

    let mut config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    match cli.command {
        Commands::Dump {
            output,
            gzip,
            zip,
            drop_database,
            tables,
        } => {
            // Apply overrides
            if let Some(path) = output {
                config.dump.output = Some(path);
            }
            if gzip {
                config.dump.mode = OutputMode::Gzip;
            }
            if zip {
                config.dump.mode = OutputMode::Zip;
            }
            if drop_database {
                config.dump.drop_database = true;
            }
            if let Some(tables) = tables {
                config.dump.tables = tables;
            }
            config.validate()?;

            // Claim the destination before connecting so a collision costs
            // nothing on the server.
            let destination = config.dump.destination(chrono::Local::now())?;
            let sink = Sink::create(&destination, config.dump.mode)?;

            let mut source = match MysqlSource::connect(&config.source).await {
                Ok(source) => source,
                Err(e) => {
                    sink.abort();
                    return Err(e);
                }
            };

            let dumper = Dumper::new(config.dump.options());
            let result = tokio::select! {
                result = dumper.dump(&mut source, sink) => result,
                _ = shutdown_signal() => {
                    remove_partial(&destination);
                    Err(DumpError::Io(std::io::Error::new(
                        std::io::ErrorKind::Interrupted,
                        "dump interrupted by signal",
                    )))
                }
            };

            if let Err(e) = source.close().await {
                warn!("{}", e);
            }
            let summary = result?;

            if cli.output_json {
                println!("{}", summary.to_json()?);
            } else {
                print_summary(&summary);
            }
        }

        Commands::HealthCheck => {
            let result = health_check(&config.source).await;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("Health Check Results:");
                println!(
                    "  Source (MySQL): {} ({}ms)",
                    if result.connected { "OK" } else { "FAILED" },
                    result.latency_ms
                );
                if let Some(ref version) = result.server_version {
                    println!("    Server version: {}", version);
                }
                if let Some(ref err) = result.error {
                    println!("    Error: {}", err);
                }
            }

            if !result.connected {
                return Err(DumpError::Config("Health check failed".to_string()));
            }
        }
    }

    Ok(())
}

fn print_summary(summary: &DumpSummary) {
    println!("\nDump completed!");
    if let Some(ref path) = summary.destination {
        println!("  File: {}", path.display());
    }
    println!("  Database: {}", summary.database);
    println!("  Server version: {}", summary.server_version);
    println!("  Tables: {}", summary.tables.len());
    println!("  Rows: {}", summary.total_rows());
    println!("  Completed on: {}", summary.completed_at);
    if let Some(ref warning) = summary.rollback_warning {
        println!("  Warning: {}", warning);
    }
}

/// Remove the file left by a dump that was cancelled mid-flight.
fn remove_partial(path: &std::path::Path) {
    match std::fs::remove_file(path) {
        Ok(()) => warn!("Removed incomplete dump {}", path.display()),
        Err(e) => warn!("Could not remove incomplete dump {}: {}", path.display(), e),
    }
}

fn setup_logging(verbosity: &str, format: &str) {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Logs go to stderr so stdout stays clean for --output-json
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

/// Resolves on SIGINT or SIGTERM.
#[cfg(unix)]
async fn shutdown_signal() {
    let (mut sigint, mut sigterm) = match (
        signal(SignalKind::interrupt()),
        signal(SignalKind::terminate()),
    ) {
        (Ok(sigint), Ok(sigterm)) => (sigint, sigterm),
        _ => {
            warn!("Failed to install signal handlers");
            return std::future::pending().await;
        }
    };

    tokio::select! {
        _ = sigint.recv() => eprintln!("\nReceived SIGINT. Abandoning dump..."),
        _ = sigterm.recv() => eprintln!("\nReceived SIGTERM. Abandoning dump..."),
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        eprintln!("\nReceived Ctrl-C. Abandoning dump...");
    } else {
        std::future::pending::<()>().await;
    }
}
