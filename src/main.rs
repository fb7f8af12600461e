use anyhow::Result;
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use backupcheck::cli::{Cli, Commands};
use backupcheck::config::{self, AppConfig};
use backupcheck::domain_utils::normalize_domain;
use backupcheck::logger::{RunLogger, VerbosityLevel};
use backupcheck::pipeline;

fn init_tracing(verbosity: VerbosityLevel) {
    // RUST_LOG wins over -v so library internals can be traced selectively
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(verbosity.tracing_directive()));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_config(path: &Path) -> AppConfig {
    match AppConfig::load_from_path(path) {
        Ok(cfg) => cfg,
        Err(config::ConfigError::FileNotFound(path)) => match AppConfig::prompt_create_config(&path) {
            Ok(Some(created_path)) => {
                println!("✅ Created default configuration file at: {}", created_path.display());
                println!("   Edit this file to set your spreadsheet and Drive folder, then run backupcheck again.");
                std::process::exit(0);
            }
            Ok(None) => {
                eprintln!("❌ Configuration file not found at: {}", path.display());
                eprintln!("   Run with --init to create a default configuration file.");
                std::process::exit(1);
            }
            Err(e) => {
                eprintln!("❌ Failed to create configuration file: {}", e);
                std::process::exit(1);
            }
        },
        Err(e) => {
            eprintln!("❌ Configuration error: {}", e);
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(Commands::Normalize { domains }) = &cli.command {
        for raw in domains {
            println!("{}", normalize_domain(raw));
        }
        return Ok(());
    }

    let config_path = cli.config.clone().unwrap_or_else(|| PathBuf::from(config::CONFIG_PATH));

    // Handle --init flag first (before any other processing)
    if cli.init {
        match AppConfig::create_default_config_at(&config_path) {
            Ok(path) => {
                println!("✅ Created default configuration file at: {}", path.display());
                println!("   Edit this file to set your spreadsheet and Drive folder, then run backupcheck again.");
                std::process::exit(0);
            }
            Err(e) => {
                eprintln!("❌ Failed to create configuration file: {}", e);
                std::process::exit(1);
            }
        }
    }

    let app_config = load_config(&config_path);

    let verbosity = VerbosityLevel::from_flags(cli.quiet, cli.verbose);
    init_tracing(verbosity);
    let logger = match &cli.log_file {
        Some(path) => RunLogger::with_log_file(verbosity, path.clone()),
        None => RunLogger::new(verbosity),
    };

    if let Err(e) = cli.validate() {
        logger.error(&format!("Invalid arguments: {}", e));
        std::process::exit(1);
    }

    let options = cli.run_options();
    let exit_code = match pipeline::run(&app_config, &options, &logger).await {
        Ok(outcome) => {
            logger.print_report_details(&outcome.report);
            logger.print_final_summary(&outcome.report);
            0
        }
        Err(e) => {
            logger.error(&format!("Run failed: {:#}", e));
            1
        }
    };

    if let Err(e) = logger.export_logs() {
        eprintln!("❌ Failed to write log file: {}", e);
    }

    if exit_code != 0 {
        std::process::exit(exit_code);
    }
    Ok(())
}
