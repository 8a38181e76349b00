mod commands;
mod logging;
mod progress;

use std::io::{self, Write};
use std::process;
use std::time::Duration;

use clap::{CommandFactory, Parser};
use colored::*;
use commands::{Cli, Commands, Overrides};
use dotenv::dotenv;
use page_duper_core::ocr::{OcrMyPdf, OcrOrchestrator};
use page_duper_core::storage::Database;
use page_duper_core::{AppConfig, DedupeEngine, HashSummary};
use progress::CliReporter;
use tracing::{error, info};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    let _guard = logging::init_logger();

    let mut config = match page_duper_core::config::load_configuration() {
        Ok(config) => config,
        Err(err) => {
            error!("Error loading configuration: {}", err);
            process::exit(1);
        }
    };

    let args = Cli::parse();
    apply_overrides(&mut config, args.overrides);

    match args.command {
        Some(Commands::Process) => {
            if let Err(err) = run_process(&config) {
                error!("Error: {}", err);
            }
        }
        Some(Commands::Hash) => {
            if let Err(err) = run_hash(&config) {
                error!("Error: {}", err);
            }
        }
        Some(Commands::Cluster) => {
            if let Err(err) = run_cluster(&config) {
                error!("Error: {}", err);
            }
        }
        Some(Commands::Ocr { retry_failed }) => {
            config.retry_failed |= retry_failed;
            if let Err(err) = run_ocr(&config) {
                error!("Error: {}", err);
            }
        }
        Some(Commands::PrintConfig) => {
            println!("Configuration: {:?}", config);
        }
        Some(Commands::TruncateDb) => {
            match prompt_confirm(
                "Are you SURE you want to COMPLETELY DELETE the Database?",
                Some(false),
            ) {
                Ok(true) => match Database::open(&config.db_path) {
                    Ok(db) => {
                        if let Err(e) = db.truncate_all() {
                            error!("Error truncating database: {}", e);
                        } else {
                            println!("All tables truncated");
                        }
                    }
                    Err(e) => error!("Error opening database: {}", e),
                },
                _ => {
                    process::exit(0);
                }
            }
        }
        None => {
            let _ = Cli::command().print_long_help();
        }
    }

    Ok(())
}

fn apply_overrides(config: &mut AppConfig, overrides: Overrides) {
    if let Some(input) = overrides.input {
        config.input_dir = input;
    }
    if let Some(output) = overrides.output {
        config.output_dir = output;
    }
    if let Some(db) = overrides.db {
        config.db_path = db;
    }
    if let Some(threshold) = overrides.threshold {
        config.threshold = threshold;
    }
    if let Some(jobs) = overrides.jobs {
        config.jobs = jobs;
    }
    if let Some(mode) = overrides.mode {
        config.concurrency = mode;
    }
    if let Some(cluster_mode) = overrides.cluster_mode {
        config.cluster_mode = cluster_mode;
    }
}

fn run_process(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let engine = DedupeEngine::new(config.clone());
    let reporter = CliReporter::new();
    let result = engine.run(&reporter)?;

    println!();
    print_hash_summary(&result.hashing);
    if result.hashing.documents_found == 0 {
        return Ok(());
    }
    let clustering = &result.clustering;
    info!(
        "Cluster: {}, Export: {}",
        format!("{:.2}s", clustering.cluster_duration.as_secs_f64()).green(),
        format!("{:.2}s", clustering.export_duration.as_secs_f64()).green(),
    );
    info!(
        "{} distinct hashes, {} clusters, {} files written to {}",
        format!("{}", clustering.distinct_hashes).cyan(),
        format!("{}", clustering.clusters).red(),
        format!("{}", clustering.export.files_written).red(),
        config.output_dir,
    );

    Ok(())
}

fn run_hash(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let engine = DedupeEngine::new(config.clone());
    let reporter = CliReporter::new();
    let summary = engine.hash_documents(&reporter)?;

    println!();
    print_hash_summary(&summary);
    Ok(())
}

fn run_cluster(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let engine = DedupeEngine::new(config.clone());
    let reporter = CliReporter::new();
    let summary = engine.cluster_and_export(&reporter)?;

    println!();
    info!(
        "{} clusters, {} files with {} pages written in {}",
        format!("{}", summary.clusters).red(),
        format!("{}", summary.export.files_written).red(),
        format!("{}", summary.export.pages_written).cyan(),
        format!(
            "{:.2}s",
            (summary.cluster_duration + summary.export_duration).as_secs_f64()
        )
        .green(),
    );
    Ok(())
}

fn run_ocr(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    config.validate()?;

    let tool = OcrMyPdf::new(
        &config.ocr_languages,
        config.jobs,
        Duration::from_secs(config.ocr_timeout_secs),
    );
    let orchestrator = OcrOrchestrator::new(config, Box::new(tool));
    let reporter = CliReporter::new();
    let summary = orchestrator.process(&reporter)?;

    println!();
    info!(
        "{} completed, {} awaiting retry, {} failed, {} skipped",
        format!("{}", summary.completed).green(),
        format!("{}", summary.pending_retry).yellow(),
        format!("{}", summary.failed).red(),
        format!("{}", summary.skipped).cyan(),
    );
    Ok(())
}

fn print_hash_summary(summary: &HashSummary) {
    info!(
        "Scan: {}, Hash: {}",
        format!("{:.2}s", summary.scan_duration.as_secs_f64()).green(),
        format!("{:.2}s", summary.hash_duration.as_secs_f64()).green(),
    );
    info!(
        "{} documents hashed, {} unchanged, {} failed, {} pages stored",
        format!("{}", summary.documents_hashed).cyan(),
        format!("{}", summary.documents_skipped).cyan(),
        format!("{}", summary.documents_failed).red(),
        format!("{}", summary.pages_stored).cyan(),
    );
}

fn prompt_confirm(prompt: &str, default: Option<bool>) -> io::Result<bool> {
    let mut input = String::new();

    loop {
        input.clear();

        match default {
            Some(true) => print!("{} (Y/n): ", prompt),
            Some(false) | None => print!("{} (y/N): ", prompt),
        }
        io::stdout().flush()?;

        io::stdin().read_line(&mut input)?;

        match input.trim().to_uppercase().as_str() {
            "Y" => return Ok(true),
            "N" => return Ok(false),
            "" => match default {
                Some(default) => return Ok(default),
                None => continue,
            },
            _ => continue,
        }
    }
}
