use csv::Writer;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::reconcile::ReconciliationReport;

pub const CATEGORY_LATEST: &str = "Latest Backup";
pub const CATEGORY_MISSING: &str = "Missing";
pub const CATEGORY_INACTIVE: &str = "Inactive Backup";

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Failed to serialize report: {0}")]
    Serialize(String),

    #[error("Failed to write {path}: {error}")]
    Write { path: PathBuf, error: String },

    #[error("Report could not be saved to any location: {0}")]
    AllTargetsFailed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "csv" => Some(ExportFormat::Csv),
            "json" => Some(ExportFormat::Json),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }
}

/// Row arrangement for CSV output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CsvLayout {
    /// `Category,Domain,Backup Date`, one row per entry
    Rows,
    /// One column per category, side by side
    Columns,
}

impl CsvLayout {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "rows" => Some(CsvLayout::Rows),
            "columns" => Some(CsvLayout::Columns),
            _ => None,
        }
    }
}

/// Somewhere a finished report file can be delivered.
pub trait FileExporter {
    fn save(&self, filename: &str, contents: &[u8]) -> Result<PathBuf, ExportError>;

    fn describe(&self) -> String;
}

/// Writes report files into a directory, creating it if needed.
#[derive(Debug, Clone)]
pub struct DirectoryExporter {
    dir: PathBuf,
}

impl DirectoryExporter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The current working directory, used when the configured directory fails.
    pub fn current_dir() -> Self {
        Self::new(".")
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl FileExporter for DirectoryExporter {
    fn save(&self, filename: &str, contents: &[u8]) -> Result<PathBuf, ExportError> {
        let write_err = |path: &Path, e: std::io::Error| ExportError::Write {
            path: path.to_path_buf(),
            error: e.to_string(),
        };

        if !self.dir.as_os_str().is_empty() {
            fs::create_dir_all(&self.dir).map_err(|e| write_err(&self.dir, e))?;
        }
        let path = self.dir.join(filename);
        fs::write(&path, contents).map_err(|e| write_err(&path, e))?;
        Ok(path)
    }

    fn describe(&self) -> String {
        self.dir.display().to_string()
    }
}

/// `{prefix}_{YYYY-MM-DD}.{ext}` for the report's run date.
pub fn report_filename(prefix: &str, report: &ReconciliationReport, format: ExportFormat) -> String {
    format!(
        "{}_{}.{}",
        prefix,
        report.generated_on.format("%Y-%m-%d"),
        format.extension()
    )
}

fn csv_bytes(wtr: Writer<Vec<u8>>) -> Result<Vec<u8>, ExportError> {
    wtr.into_inner().map_err(|e| ExportError::Serialize(e.to_string()))
}

fn csv_err(e: csv::Error) -> ExportError {
    ExportError::Serialize(e.to_string())
}

/// Serialize arbitrary rows as CSV with a header row.
pub fn csv_from_rows(header: &[&str], rows: &[Vec<String>]) -> Result<Vec<u8>, ExportError> {
    let mut wtr = Writer::from_writer(Vec::new());
    wtr.write_record(header).map_err(csv_err)?;
    for row in rows {
        wtr.write_record(row).map_err(csv_err)?;
    }
    wtr.flush().map_err(|e| ExportError::Serialize(e.to_string()))?;
    csv_bytes(wtr)
}

pub fn report_to_csv(report: &ReconciliationReport, layout: CsvLayout) -> Result<Vec<u8>, ExportError> {
    match layout {
        CsvLayout::Rows => {
            let mut rows = Vec::with_capacity(report.total_entries());
            for record in &report.matched {
                rows.push(vec![CATEGORY_LATEST.to_string(), record.domain.to_string(), record.observed.to_string()]);
            }
            for domain in &report.missing_from_observed {
                rows.push(vec![CATEGORY_MISSING.to_string(), domain.to_string(), String::new()]);
            }
            for record in &report.unexpected_observed {
                rows.push(vec![CATEGORY_INACTIVE.to_string(), record.domain.to_string(), record.observed.to_string()]);
            }
            csv_from_rows(&["Category", "Domain", "Backup Date"], &rows)
        }
        CsvLayout::Columns => {
            let height = report
                .matched
                .len()
                .max(report.missing_from_observed.len())
                .max(report.unexpected_observed.len());
            let rows: Vec<Vec<String>> = (0..height)
                .map(|i| {
                    vec![
                        report.matched.get(i).map(|r| r.domain.to_string()).unwrap_or_default(),
                        report.missing_from_observed.get(i).map(|d| d.to_string()).unwrap_or_default(),
                        report.unexpected_observed.get(i).map(|r| r.domain.to_string()).unwrap_or_default(),
                    ]
                })
                .collect();
            csv_from_rows(&["Latest Backups", "Missing Items", "Inactive Backups"], &rows)
        }
    }
}

#[derive(Serialize)]
struct JsonExport<'a> {
    summary: ExportSummary,
    #[serde(flatten)]
    report: &'a ReconciliationReport,
}

#[derive(Serialize)]
struct ExportSummary {
    latest_backups: usize,
    missing_items: usize,
    inactive_backups: usize,
}

pub fn report_to_json(report: &ReconciliationReport) -> Result<Vec<u8>, ExportError> {
    let export = JsonExport {
        summary: ExportSummary {
            latest_backups: report.matched.len(),
            missing_items: report.missing_from_observed.len(),
            inactive_backups: report.unexpected_observed.len(),
        },
        report,
    };
    serde_json::to_vec_pretty(&export).map_err(|e| ExportError::Serialize(e.to_string()))
}

pub fn render_report(
    report: &ReconciliationReport,
    format: ExportFormat,
    layout: CsvLayout,
) -> Result<Vec<u8>, ExportError> {
    match format {
        ExportFormat::Csv => report_to_csv(report, layout),
        ExportFormat::Json => report_to_json(report),
    }
}

/// Save through `primary`, or through `fallback` if that fails.
pub fn deliver<P: FileExporter, F: FileExporter>(
    filename: &str,
    contents: &[u8],
    primary: &P,
    fallback: &F,
) -> Result<PathBuf, ExportError> {
    debug!("Saving {} ({} bytes) to {}", filename, contents.len(), primary.describe());
    match primary.save(filename, contents) {
        Ok(path) => {
            info!("Report saved to {}", path.display());
            Ok(path)
        }
        Err(primary_err) => {
            warn!("Saving to {} failed: {}; trying {}", primary.describe(), primary_err, fallback.describe());
            fallback.save(filename, contents).map_err(|fallback_err| {
                ExportError::AllTargetsFailed(format!("{}; {}", primary_err, fallback_err))
            })
        }
    }
}
