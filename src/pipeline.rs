//! One end-to-end run: reference list, Drive scan, reconciliation, export.

use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use tracing::info;

use crate::browser::{open_browser, ChromeDomReader};
use crate::config::AppConfig;
use crate::export::{self, CsvLayout, DirectoryExporter, ExportFormat};
use crate::logger::RunLogger;
use crate::reconcile::{self, ReconcileError, ReconciliationReport};
use crate::reference::{ReferenceList, ReferenceProvider};
use crate::scanner::{ScanMode, ScanPolicy, ScanResult, Scanner};
use crate::snapshot::HtmlSnapshotReader;

/// Marker left in the default config until the user sets their folder.
const FOLDER_URL_PLACEHOLDER: &str = "REPLACE_ME";

/// Per-run choices made on the command line.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Skip the spreadsheet and use the fallback list
    pub offline: bool,
    /// Scan a saved page instead of a live browser tab
    pub html_snapshot: Option<PathBuf>,
    /// Read the live page once, without scrolling
    pub no_scroll: bool,
    pub folder_url: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub format: ExportFormat,
    pub layout: CsvLayout,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            offline: false,
            html_snapshot: None,
            no_scroll: false,
            folder_url: None,
            output_dir: None,
            format: ExportFormat::Csv,
            layout: CsvLayout::Rows,
        }
    }
}

#[derive(Debug)]
pub struct RunOutcome {
    pub reference: ReferenceList,
    pub scan: ScanResult,
    pub report: ReconciliationReport,
    pub output_path: PathBuf,
}

/// Directory the report goes to: `--output-dir`, then `[export].output_dir`,
/// then the user's Downloads folder, then the current directory.
pub fn resolve_output_dir(config: &AppConfig, options: &RunOptions) -> PathBuf {
    if let Some(dir) = &options.output_dir {
        return dir.clone();
    }
    if !config.export.output_dir.trim().is_empty() {
        return PathBuf::from(&config.export.output_dir);
    }
    dirs::download_dir().unwrap_or_else(|| PathBuf::from("."))
}

pub async fn load_reference(config: &AppConfig, options: &RunOptions, logger: &RunLogger) -> Result<ReferenceList> {
    let provider = ReferenceProvider::from_config(config).context("Failed to set up spreadsheet client")?;
    let reference = if options.offline {
        provider.fallback_list(Some("offline run".to_string()))
    } else {
        logger.info("Fetching domain list from spreadsheet...");
        provider.fetch_reference_list().await
    };
    logger.log_reference(reference.len(), reference.used_fallback, reference.fallback_reason.as_deref());
    Ok(reference)
}

pub async fn scan_backups(config: &AppConfig, options: &RunOptions, logger: &RunLogger) -> Result<ScanResult> {
    if let Some(path) = &options.html_snapshot {
        logger.info(&format!("Reading saved page {}", path.display()));
        let mut reader = HtmlSnapshotReader::from_file(path, &config.dom)?;
        logger.debug(&format!("Snapshot contains {} rows", reader.row_count()));
        let scanner = Scanner::new(ScanPolicy::from_config(&config.scanner, ScanMode::Snapshot));
        return Ok(scanner.run(&mut reader)?);
    }

    let mut browser_config = config.browser.clone();
    if let Some(url) = &options.folder_url {
        browser_config.folder_url = url.clone();
    }
    let folder_url = browser_config.folder_url.trim();
    if folder_url.is_empty() || folder_url.contains(FOLDER_URL_PLACEHOLDER) {
        bail!("No Drive folder URL configured; set [browser].folder_url or pass --folder-url");
    }

    let mode = if options.no_scroll { ScanMode::Snapshot } else { ScanMode::Scroll };
    let policy = ScanPolicy::from_config(&config.scanner, mode);
    let dom = config.dom.clone();
    let spinner_logger = logger.clone();

    logger.start_scan_spinner();
    let result = tokio::task::spawn_blocking(move || {
        let browser = open_browser(&browser_config)?;
        let mut reader = ChromeDomReader::open(browser, &browser_config, &dom)?;
        let mut found = 0;
        Scanner::new(policy).run_with_progress(&mut reader, |outcome, stats| {
            found += outcome.new_records;
            spinner_logger.update_scan(stats.passes, stats.rows_processed, found);
        })
    })
    .await;
    logger.finish_scan_spinner();

    let scan = result.context("Scan task panicked")??;
    Ok(scan)
}

/// Execute one run and write the report.
pub async fn run(config: &AppConfig, options: &RunOptions, logger: &RunLogger) -> Result<RunOutcome> {
    logger.start_run();

    let reference = load_reference(config, options, logger).await?;
    if reference.is_empty() {
        return Err(ReconcileError::EmptyReference.into());
    }
    let scan = scan_backups(config, options, logger).await?;
    logger.log_scan_complete(
        scan.stats.passes,
        scan.stats.rows_processed,
        scan.records.len(),
        &scan.stop_reason.to_string(),
    );

    let report = reconcile::reconcile_run(&reference, &scan)?;

    let contents = export::render_report(&report, options.format, options.layout)?;
    let filename = export::report_filename(&config.export.filename_prefix, &report, options.format);
    let primary = DirectoryExporter::new(resolve_output_dir(config, options));
    logger.debug(&format!("Writing {} to {}", filename, primary.dir().display()));
    let output_path = export::deliver(&filename, &contents, &primary, &DirectoryExporter::current_dir())?;
    logger.log_export_success(&output_path.display().to_string());
    info!("Run complete: {} entries written to {}", report.total_entries(), output_path.display());

    Ok(RunOutcome {
        reference,
        scan,
        report,
        output_path,
    })
}
