use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::export::{CsvLayout, ExportFormat};
use crate::pipeline::RunOptions;

#[derive(Parser, Debug)]
#[command(name = "backupcheck")]
#[command(about = "Reconcile the site list in a spreadsheet against backup files in a Drive folder")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Create default configuration file at ./config/backupcheck.toml
    #[arg(long, global = true)]
    pub init: bool,

    /// Configuration file to use instead of ./config/backupcheck.toml
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Verbose logging (use -v to list every entry, -vv for DEBUG)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only print errors and the final summary
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Output directory for the report (defaults to Downloads)
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Output format: 'csv' (default) or 'json'
    #[arg(short = 'f', long, default_value = "csv")]
    pub format: String,

    /// CSV layout: 'rows' (one entry per row) or 'columns' (one category per column)
    #[arg(long, default_value = "rows")]
    pub layout: String,

    /// Drive folder URL (overrides [browser].folder_url)
    #[arg(long)]
    pub folder_url: Option<String>,

    /// Scan a saved copy of the folder page instead of opening a browser
    #[arg(long, value_name = "FILE")]
    pub html_snapshot: Option<PathBuf>,

    /// Read the rows currently rendered once, without scrolling
    #[arg(long)]
    pub no_scroll: bool,

    /// Skip the spreadsheet and use the fallback domain list
    #[arg(long)]
    pub offline: bool,

    /// Write all log messages to this file when the run ends
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the normalized form of each argument, one per line
    Normalize {
        /// Raw domains or URLs
        #[arg(required = true)]
        domains: Vec<String>,
    },
}

impl Cli {
    pub fn validate(&self) -> Result<(), String> {
        if ExportFormat::parse(&self.format).is_none() {
            return Err(format!("Invalid output format '{}'. Supported formats: csv, json", self.format));
        }
        if CsvLayout::parse(&self.layout).is_none() {
            return Err(format!("Invalid layout '{}'. Supported layouts: rows, columns", self.layout));
        }
        if self.html_snapshot.is_some() && self.folder_url.is_some() {
            return Err("--html-snapshot and --folder-url cannot be used together".to_string());
        }
        if let Some(path) = &self.html_snapshot {
            if !path.is_file() {
                return Err(format!("HTML snapshot not found: {}", path.display()));
            }
        }
        Ok(())
    }

    /// Run options for the pipeline. Call after [`Cli::validate`].
    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            offline: self.offline,
            html_snapshot: self.html_snapshot.clone(),
            no_scroll: self.no_scroll,
            folder_url: self.folder_url.clone(),
            output_dir: self.output_dir.clone(),
            format: ExportFormat::parse(&self.format).unwrap_or(ExportFormat::Csv),
            layout: CsvLayout::parse(&self.layout).unwrap_or(CsvLayout::Rows),
        }
    }
}
