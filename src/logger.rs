use indicatif::{ProgressBar, ProgressStyle};
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::reconcile::ReconciliationReport;

#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub enum VerbosityLevel {
    Silent = 0,   // Only the final summary
    Summary = 1,  // High-level run progress (default)
    Detailed = 2, // Per-entry listings and warnings
    Debug = 3,    // Everything
}

impl VerbosityLevel {
    pub fn from_verbose_count(count: u8) -> Self {
        match count {
            0 => VerbosityLevel::Summary,
            1 => VerbosityLevel::Detailed,
            2.. => VerbosityLevel::Debug,
        }
    }

    /// `--quiet` wins over any `-v`.
    pub fn from_flags(quiet: bool, verbose: u8) -> Self {
        if quiet {
            VerbosityLevel::Silent
        } else {
            Self::from_verbose_count(verbose)
        }
    }

    /// `tracing` filter directive matching this level.
    pub fn tracing_directive(&self) -> &'static str {
        match self {
            VerbosityLevel::Silent => "error",
            VerbosityLevel::Summary => "warn",
            VerbosityLevel::Detailed => "backupcheck=info",
            VerbosityLevel::Debug => "backupcheck=debug",
        }
    }
}

#[derive(Default, Clone)]
struct RunMetadata {
    start_time: Option<SystemTime>,
    end_time: Option<SystemTime>,
    reference_domains: usize,
    used_fallback: bool,
    fallback_reason: Option<String>,
    scan_passes: usize,
    rows_processed: usize,
    observed_domains: usize,
    stop_reason: String,
    output_file: String,
}

/// User-facing run log: levelled messages, the scan spinner and the final summary.
#[derive(Clone)]
pub struct RunLogger {
    verbosity: VerbosityLevel,
    spinner: Arc<Mutex<Option<ProgressBar>>>,
    metadata: Arc<Mutex<RunMetadata>>,
    log_buffer: Arc<Mutex<Vec<String>>>,
    log_file_path: Option<String>,
}

impl RunLogger {
    pub fn new(verbosity: VerbosityLevel) -> Self {
        Self {
            verbosity,
            spinner: Arc::new(Mutex::new(None)),
            metadata: Arc::new(Mutex::new(RunMetadata::default())),
            log_buffer: Arc::new(Mutex::new(Vec::new())),
            log_file_path: None,
        }
    }

    pub fn with_log_file(verbosity: VerbosityLevel, log_file_path: String) -> Self {
        Self {
            log_file_path: Some(log_file_path),
            ..Self::new(verbosity)
        }
    }

    pub fn info(&self, message: &str) {
        if self.verbosity >= VerbosityLevel::Summary {
            self.print_message("INFO", message);
        }
    }

    pub fn warn(&self, message: &str) {
        if self.verbosity >= VerbosityLevel::Summary {
            self.print_message("WARN", message);
        }
    }

    pub fn error(&self, message: &str) {
        self.print_message("ERROR", message);
    }

    pub fn debug(&self, message: &str) {
        if self.verbosity >= VerbosityLevel::Debug {
            self.print_message("DEBUG", message);
        }
    }

    fn print_message(&self, level: &str, message: &str) {
        let msg = format!("[{}] {}: {}", timestamp(), level, message);

        if self.log_file_path.is_some() {
            if let Ok(mut buffer) = self.log_buffer.lock() {
                buffer.push(msg.clone());
            }
        }

        if let Ok(guard) = self.spinner.lock() {
            if let Some(pb) = guard.as_ref() {
                pb.println(msg);
                return;
            }
        }

        eprintln!("{}", msg);
    }

    pub fn start_run(&self) {
        if let Ok(mut metadata) = self.metadata.lock() {
            metadata.start_time = Some(SystemTime::now());
        }
    }

    pub fn start_scan_spinner(&self) {
        if self.verbosity == VerbosityLevel::Silent {
            return;
        }
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("[{elapsed_precise}] {spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.enable_steady_tick(Duration::from_millis(120));
        pb.set_message("Scanning Drive folder...");
        if let Ok(mut guard) = self.spinner.lock() {
            *guard = Some(pb);
        }
    }

    pub fn update_scan(&self, passes: usize, rows: usize, found: usize) {
        if let Ok(guard) = self.spinner.lock() {
            if let Some(pb) = guard.as_ref() {
                pb.set_message(format!("Pass {}: {} rows checked, {} backups found", passes, rows, found));
            }
        }
    }

    pub fn finish_scan_spinner(&self) {
        if let Ok(mut guard) = self.spinner.lock() {
            if let Some(pb) = guard.take() {
                pb.finish_and_clear();
            }
        }
    }

    pub fn log_reference(&self, count: usize, used_fallback: bool, reason: Option<&str>) {
        if let Ok(mut metadata) = self.metadata.lock() {
            metadata.reference_domains = count;
            metadata.used_fallback = used_fallback;
            metadata.fallback_reason = reason.map(str::to_string);
        }
        if used_fallback {
            self.warn(&format!(
                "Using fallback domain list ({} domains): {}",
                count,
                reason.unwrap_or("spreadsheet not used")
            ));
        } else {
            self.info(&format!("Loaded {} domains from spreadsheet", count));
        }
    }

    pub fn log_scan_complete(&self, passes: usize, rows: usize, observed: usize, stop_reason: &str) {
        if let Ok(mut metadata) = self.metadata.lock() {
            metadata.scan_passes = passes;
            metadata.rows_processed = rows;
            metadata.observed_domains = observed;
            metadata.stop_reason = stop_reason.to_string();
        }
        self.info(&format!(
            "Scan complete: {} unique domains from {} rows in {} passes ({})",
            observed, rows, passes, stop_reason
        ));
    }

    pub fn log_export_success(&self, path: &str) {
        if let Ok(mut metadata) = self.metadata.lock() {
            metadata.output_file = path.to_string();
            metadata.end_time = Some(SystemTime::now());
        }
        self.info(&format!("Export completed: {}", path));
    }

    /// Every entry of every category, shown at `-v` and above.
    pub fn print_report_details(&self, report: &ReconciliationReport) {
        if self.verbosity < VerbosityLevel::Detailed {
            return;
        }
        if !report.matched.is_empty() {
            println!("\n=== LATEST BACKUPS ===");
            for (i, record) in report.matched.iter().enumerate() {
                println!("{}. ✅ {} - {}", i + 1, record.domain, record.observed);
            }
        }
        if !report.missing_from_observed.is_empty() {
            println!("\n=== MISSING ITEMS ===");
            for (i, domain) in report.missing_from_observed.iter().enumerate() {
                println!("{}. ❌ {}", i + 1, domain);
            }
        }
        if !report.unexpected_observed.is_empty() {
            println!("\n=== INACTIVE BACKUPS ===");
            for (i, record) in report.unexpected_observed.iter().enumerate() {
                println!("{}. ⚠️  {} - {}", i + 1, record.domain, record.observed);
            }
        }
    }

    pub fn print_final_summary(&self, report: &ReconciliationReport) {
        let metadata = match self.metadata.lock() {
            Ok(m) => m.clone(),
            Err(_) => return,
        };

        print!("\x1b[2K\r");
        let _ = io::stdout().flush();

        println!("\n=== BACKUP REPORT ===");
        if let (Some(start), Some(end)) = (metadata.start_time, metadata.end_time) {
            let duration = end.duration_since(start).unwrap_or_default();
            println!("Run Duration: {:.2}s", duration.as_secs_f64());
        }
        if metadata.used_fallback {
            println!("Reference Domains: {} (fallback list)", metadata.reference_domains);
        } else {
            println!("Reference Domains: {}", metadata.reference_domains);
        }
        println!("Domains On Drive: {}", metadata.observed_domains);
        if metadata.scan_passes > 0 {
            println!(
                "Scan: {} passes, {} rows ({})",
                metadata.scan_passes, metadata.rows_processed, metadata.stop_reason
            );
        }
        println!();
        println!("✅ Latest Backups: {}", report.matched.len());
        println!("❌ Missing Items: {}", report.missing_from_observed.len());
        println!("⚠️  Inactive Backups: {}", report.unexpected_observed.len());
        if !metadata.output_file.is_empty() {
            println!("\nReport Exported: {}", metadata.output_file);
        }
        println!("=====================\n");
    }

    /// Export all collected logs to the configured file
    pub fn export_logs(&self) -> io::Result<()> {
        let Some(ref log_file_path) = self.log_file_path else {
            return Ok(());
        };
        let buffer = match self.log_buffer.lock() {
            Ok(buffer) => buffer.clone(),
            Err(_) => return Ok(()),
        };

        if let Some(parent) = Path::new(log_file_path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(log_file_path)?;
        for entry in &buffer {
            writeln!(file, "{}", entry)?;
        }
        file.flush()
    }

    pub fn get_log_count(&self) -> usize {
        self.log_buffer.lock().map(|b| b.len()).unwrap_or(0)
    }
}

fn timestamp() -> String {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    let secs = now.as_secs();
    let millis = now.subsec_millis();

    let hours = (secs / 3600) % 24;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;

    format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, seconds, millis)
}
