//! legacy-migrate CLI - replay a legacy MySQL dump into the new Postgres schema
//!
//! Runs the migration once from the command line, or inspects the dump and the
//! destination without writing anything.

use clap::{Parser, Subcommand};
use legacy_migrate::serialization::{to_pretty_json, write_log_file};
use legacy_migrate::{
    DestinationStore, MemoryStore, Migration, MigrationConfig, MigrationSummary, PgStore,
    Severity,
};
use std::error::Error;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "legacy-migrate")]
#[command(version, about = "Replay a legacy MySQL dump into the new content schema", long_about = None)]
struct Cli {
    /// YAML configuration file (overrides environment defaults)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Path to the legacy dump
    #[arg(long, global = true)]
    dump: Option<PathBuf>,

    /// Destination database URL (defaults to DATABASE_URL)
    #[arg(long, global = true)]
    database_url: Option<String>,

    /// YAML mapping set (defaults to the built-in mappings)
    #[arg(long, global = true)]
    mappings: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse the dump and load every mapped table
    Run {
        /// Load into an in-memory store instead of the database
        #[arg(long)]
        dry_run: bool,

        /// Write the run log as NDJSON to this file
        #[arg(long)]
        log_file: Option<PathBuf>,

        /// Print the full summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show destination tables and their row counts
    Status,

    /// Show the first rows of a legacy table as parsed from the dump
    Preview {
        /// Legacy table name
        table: String,

        /// Number of rows to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// List tables found in the dump with their row counts
    Inspect,

    /// Print the effective mapping set as YAML
    Mappings,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let config = load_config(&cli)?;
    let migration = Migration::from_config(&config)?;

    match cli.command {
        Commands::Run {
            dry_run,
            log_file,
            json,
        } => {
            let summary = if dry_run {
                println!("Dry run: loading into memory, the database is not touched");
                let mut store = MemoryStore::new();
                migration.run(&mut store)?
            } else {
                let mut store = PgStore::connect(config.require_database_url()?, &config.database)?;
                migration.run(&mut store)?
            };

            if let Some(path) = log_file {
                let written = write_log_file(&path, &summary)?;
                println!("Wrote {} log entries to {}", written, path.display());
            }
            if json {
                println!("{}", to_pretty_json(&summary)?);
            } else {
                print_summary(&summary);
            }
        }
        Commands::Status => {
            let mut store = PgStore::connect(config.require_database_url()?, &config.database)?;
            print_status(&migration, &mut store)?;
        }
        Commands::Preview { table, limit } => {
            let preview = migration.preview(&table, limit)?;
            println!("{}", to_pretty_json(&preview)?);
        }
        Commands::Inspect => {
            let dump = migration.parse()?;
            println!(
                "{}: {} statements, {} tables",
                migration.dump_path().display(),
                dump.statement_count(),
                dump.table_names().len()
            );
            for table in dump.tables() {
                let mapped = if migration.mappings().table_for(&table.name).is_some() {
                    "mapped"
                } else {
                    "unmapped"
                };
                println!(
                    "  {:<24} {:>8} rows  {:>3} columns  {}",
                    table.name,
                    table.row_count(),
                    table.columns.len(),
                    mapped
                );
            }
            for warning in dump.warnings() {
                println!("  warning: {}", warning);
            }
        }
        Commands::Mappings => {
            print!("{}", migration.mappings().to_yaml()?);
        }
    }
    Ok(())
}

/// Environment first, then the config file, then CLI flags.
fn load_config(cli: &Cli) -> Result<MigrationConfig, Box<dyn Error>> {
    let mut config = match &cli.config {
        Some(path) => {
            dotenv::dotenv().ok();
            MigrationConfig::load_from_file(path)?
        }
        None => MigrationConfig::from_env(),
    };
    if let Some(dump) = &cli.dump {
        config.dump_path = dump.clone();
    }
    if let Some(url) = &cli.database_url {
        config.database_url = Some(url.clone());
    }
    if let Some(mappings) = &cli.mappings {
        config.mappings_path = Some(mappings.clone());
    }
    Ok(config)
}

fn print_summary(summary: &MigrationSummary) {
    println!("Migration {}", summary.run_id);
    for table in &summary.tables {
        println!(
            "  {} -> {}: {} inserted, {} skipped, {} failed",
            table.legacy_table, table.target_table, table.inserted, table.skipped, table.failed
        );
    }
    for entry in &summary.log {
        if entry.severity != Severity::Info {
            println!("  {}", entry);
        }
    }
    println!(
        "Total: {} operations, {} inserted, {} skipped, {} warnings, {} errors ({} ms)",
        summary.total_operations,
        summary.success_count,
        summary.skipped_count,
        summary.warning_count,
        summary.error_count,
        (summary.finished_at - summary.started_at).num_milliseconds()
    );
}

fn print_status<S: DestinationStore + ?Sized>(
    migration: &Migration,
    store: &mut S,
) -> Result<(), Box<dyn Error>> {
    let status = migration.status(store)?;
    println!("Tables with prefix '{}':", status.table_prefix);
    if status.tables.is_empty() {
        println!("  (none)");
    }
    for table in &status.tables {
        println!("  {:<28} {:>8} rows", table.name, table.row_count);
    }
    for missing in &status.missing_tables {
        println!("  {:<28}  missing", missing);
    }
    Ok(())
}
