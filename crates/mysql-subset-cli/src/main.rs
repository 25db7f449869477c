//! mysql-subset CLI - referentially-consistent MySQL subsetting.

use clap::{Parser, Subcommand};
use mysql_subset::{Config, Orchestrator, SubsetError, SubsetResult};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mysql-subset")]
#[command(about = "Copy a referentially-consistent subset of a MySQL database")]
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

    /// Write the JSON run report to this file
    #[arg(long)]
    report_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract the subset and load it into the target
    Run {
        /// Override the root table
        #[arg(long)]
        root_table: Option<String>,

        /// Override the seed filter; repeat for several values
        #[arg(long = "city", value_name = "VALUE")]
        cities: Vec<String>,

        /// Dry run: build the closure and report it without touching the target
        #[arg(long)]
        dry_run: bool,

        /// Keep existing target rows instead of truncating first
        #[arg(long)]
        no_clear: bool,
    },

    /// Print discovered foreign keys and the table load order
    Graph,

    /// Test database connections
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

async fn run() -> Result<(), SubsetError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format).map_err(SubsetError::Config)?;

    let mut config = Config::read(&cli.config)?;

    // Apply overrides before validating, so they can fill in missing values
    if let Commands::Run {
        root_table,
        cities,
        no_clear,
        ..
    } = &cli.command
    {
        if let Some(table) = root_table {
            config.root_table = table.clone();
        }
        if !cities.is_empty() {
            config.city_filter = cities.clone().into();
        }
        if *no_clear {
            config.subset.clear_target = false;
        }
    }
    config.validate()?;
    info!("Loaded configuration from {:?}", cli.config);

    match cli.command {
        Commands::Run { dry_run, .. } => {
            let orchestrator = Orchestrator::new(config).await?;
            let result = orchestrator.run(dry_run).await?;

            if let Some(ref path) = cli.report_file {
                write_report(path, &result)?;
            }

            if cli.output_json {
                println!("{}", result.to_json()?);
            } else {
                print_summary(&result);
            }
        }

        Commands::Graph => {
            let insert_order = config.subset.insert_order;
            let orchestrator = Orchestrator::new(config).await?;
            let graph = orchestrator.relationship_graph().await?;
            let plan = graph.insert_plan(&graph.tables(), insert_order);

            if cli.output_json {
                let json = serde_json::json!({
                    "foreign_keys": graph.edges(),
                    "insert_plan": plan,
                });
                println!("{}", serde_json::to_string_pretty(&json)?);
            } else {
                println!("Foreign keys ({}):", graph.edge_count());
                for edge in graph.edges() {
                    println!("  {}", edge);
                }
                println!("\nLoad order ({:?}):", insert_order);
                for (i, step) in plan.iter().enumerate() {
                    let note = if step.relax_constraints {
                        "  [foreign key checks disabled]"
                    } else {
                        ""
                    };
                    println!("  {:>3}. {}{}", i + 1, step.table, note);
                }
            }
        }

        Commands::HealthCheck => {
            let orchestrator = Orchestrator::new(config).await?;
            let result = orchestrator.health_check().await?;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("Health Check Results:");
                println!(
                    "  Source (MySQL): {} ({}ms)",
                    if result.source_connected { "OK" } else { "FAILED" },
                    result.source_latency_ms
                );
                if let Some(ref err) = result.source_error {
                    println!("    Error: {}", err);
                }
                println!(
                    "  Target (MySQL): {} ({}ms)",
                    if result.target_connected { "OK" } else { "FAILED" },
                    result.target_latency_ms
                );
                if let Some(ref err) = result.target_error {
                    println!("    Error: {}", err);
                }
                println!(
                    "\n  Overall: {}",
                    if result.healthy { "HEALTHY" } else { "UNHEALTHY" }
                );
            }

            if !result.healthy {
                return Err(SubsetError::pool("health check failed", "pinging source and target"));
            }
        }
    }

    Ok(())
}

fn print_summary(result: &SubsetResult) {
    let status_msg = match result.status.as_str() {
        "dry_run" => "Dry run completed!",
        "no_seed_rows" => "No seed rows matched; nothing copied.",
        "completed_with_skips" => "Subset completed with skipped rows.",
        _ => "Subset completed!",
    };
    println!("\n{}", status_msg);
    println!("  Run ID: {}", result.run_id);
    println!("  Duration: {:.2}s", result.duration_seconds);
    println!("  Seed rows: {}", result.seed_rows);
    println!("  Rows collected: {}", result.rows_collected);
    if !result.dry_run {
        println!("  Rows inserted: {}", result.rows_inserted);
        println!("  Rows skipped: {}", result.rows_skipped);
    }
    println!("  Dangling references: {}", result.dangling_references.len());

    if !result.tables.is_empty() {
        println!("\n  {:<32} {:>10} {:>10} {:>10}", "Table", "Collected", "Inserted", "Skipped");
        for t in &result.tables {
            println!(
                "  {:<32} {:>10} {:>10} {:>10}",
                t.table, t.collected, t.inserted, t.skipped
            );
        }
    }

    for skipped in &result.skipped_rows {
        println!("  skipped {} {}: {}", skipped.table, skipped.key, skipped.reason);
    }
}

fn write_report(path: &Path, result: &SubsetResult) -> Result<(), SubsetError> {
    std::fs::write(path, result.to_json()?)?;
    info!("Wrote run report to {:?}", path);
    Ok(())
}

fn setup_logging(verbosity: &str, format: &str) -> Result<(), String> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // RUST_LOG takes precedence over --verbosity
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string().to_lowercase()));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr);

    let installed = if format == "json" {
        subscriber.json().try_init()
    } else {
        subscriber.try_init()
    };
    installed.map_err(|e| format!("failed to install logger: {}", e))
}
