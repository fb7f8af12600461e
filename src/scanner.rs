//! Virtualized list scanner.
//!
//! The Drive file list only renders the rows inside the visible window and
//! swaps rows in and out as the list scrolls. There is no "end of list" signal
//! besides the scroll offset no longer moving, and rows that stay in view are
//! rendered again on the next pass, so the scan is a loop of
//! read-visible-rows / scroll / settle over a [`DomReader`], with every pass
//! folded into a [`ScanSession`] that deduplicates by domain.
//!
//! `ScanSession::apply_pass` is pure with respect to time and the DOM, so the
//! stop rules can be exercised with plain row vectors.

use chrono::{Datelike, Duration as ChronoDuration, Local, NaiveDate, NaiveTime};
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::ScannerConfig;
use crate::domain_utils::DomainKey;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Failed to read rows from page: {0}")]
    Evaluation(String),

    #[error("Failed to read HTML snapshot: {0}")]
    Snapshot(String),
}

/// Text pulled out of one rendered list row.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize)]
pub struct RawRow {
    pub name: Option<String>,
    pub date: Option<String>,
}

impl RawRow {
    pub fn new(name: &str, date: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            date: Some(date.to_string()),
        }
    }
}

/// Scroll position of the list container around one scroll command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
pub struct ScrollOffsets {
    pub before: i64,
    pub after: i64,
}

impl ScrollOffsets {
    pub fn moved(&self) -> bool {
        self.before != self.after
    }
}

/// Read access to the rendered file list.
pub trait DomReader {
    /// Whether the list's scroll container exists on the page.
    fn has_scroll_container(&self) -> Result<bool, ScanError>;

    /// Rows currently rendered, in display order.
    fn visible_rows(&self) -> Result<Vec<RawRow>, ScanError>;

    /// Scroll the list container forward by `px` pixels.
    fn scroll_by(&mut self, px: u32) -> Result<ScrollOffsets, ScanError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObservedDate {
    Date(NaiveDate),
    Unknown,
}

impl ObservedDate {
    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            ObservedDate::Date(d) => Some(*d),
            ObservedDate::Unknown => None,
        }
    }
}

impl fmt::Display for ObservedDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObservedDate::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            ObservedDate::Unknown => f.write_str("unknown"),
        }
    }
}

impl Serialize for ObservedDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupRecord {
    pub domain: DomainKey,
    pub observed: ObservedDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    MissingName,
    MissingDate,
    /// No backup marker in the name: folders and unrelated files
    NoMarker,
    EmptyDomain,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowKind {
    Backup {
        domain: DomainKey,
        /// `None` when the date text did not parse
        date: Option<NaiveDate>,
    },
    Skip(SkipReason),
}

/// Turns raw row text into a [`RowKind`].
#[derive(Debug, Clone)]
pub struct RowParser {
    marker: String,
    date_artifact: String,
    today: NaiveDate,
}

impl RowParser {
    pub fn new(marker: &str, date_artifact: &str, today: NaiveDate) -> Self {
        Self {
            marker: marker.to_string(),
            date_artifact: date_artifact.to_string(),
            today,
        }
    }

    /// `require_date` makes a row without a date field skippable instead of undated.
    pub fn classify(&self, row: &RawRow, require_date: bool) -> RowKind {
        let name = match row.name.as_deref().map(str::trim) {
            Some(n) if !n.is_empty() => n,
            _ => return RowKind::Skip(SkipReason::MissingName),
        };
        let date_text = match row.date.as_deref() {
            Some(d) => Some(d),
            None if require_date => return RowKind::Skip(SkipReason::MissingDate),
            None => None,
        };

        let Some((prefix, _)) = name.split_once(self.marker.as_str()) else {
            return RowKind::Skip(SkipReason::NoMarker);
        };
        let domain = DomainKey::normalize(prefix);
        if domain.is_empty() {
            return RowKind::Skip(SkipReason::EmptyDomain);
        }

        let date = date_text.and_then(|text| self.parse_date(text));
        RowKind::Backup { domain, date }
    }

    fn parse_date(&self, text: &str) -> Option<NaiveDate> {
        let cleaned = if self.date_artifact.is_empty() {
            text.to_string()
        } else {
            text.replacen(self.date_artifact.as_str(), "", 1)
        };
        parse_display_date(&cleaned, self.today)
    }
}

const FULL_DATE_FORMATS: &[&str] = &["%b %d, %Y", "%B %d, %Y", "%d %b %Y", "%d %B %Y", "%Y-%m-%d", "%m/%d/%Y"];
const SHORT_DATE_FORMATS: &[&str] = &["%b %d %Y", "%B %d %Y", "%d %b %Y", "%d %B %Y"];
const TIME_FORMATS: &[&str] = &["%I:%M %p", "%H:%M"];

/// Parse a date as the file browser displays it.
///
/// Dates in the current year appear without a year ("Jan 5") and files
/// modified today show only a time ("10:42 AM").
pub fn parse_display_date(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    match text.to_lowercase().as_str() {
        "today" => return Some(today),
        "yesterday" => return today.checked_sub_signed(ChronoDuration::days(1)),
        _ => {}
    }

    for format in FULL_DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return Some(date);
        }
    }

    let with_year = format!("{} {}", text.trim_end_matches(','), today.year());
    for format in SHORT_DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(&with_year, format) {
            if date > today {
                return date.with_year(today.year() - 1);
            }
            return Some(date);
        }
    }

    for format in TIME_FORMATS {
        if NaiveTime::parse_from_str(text, format).is_ok() {
            return Some(today);
        }
    }

    None
}

/// First day of the calendar month before `today`.
pub fn previous_month_cutoff(today: NaiveDate) -> NaiveDate {
    let (year, month) = if today.month() == 1 {
        (today.year() - 1, 12)
    } else {
        (today.year(), today.month() - 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(today)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// Scroll through the list, keeping only backups on or after the cutoff.
    Scroll,
    /// One pass over whatever is rendered; no cutoff, undated rows kept as unknown.
    Snapshot,
}

#[derive(Debug, Clone)]
pub struct ScanPolicy {
    pub mode: ScanMode,
    pub backup_marker: String,
    pub date_artifact: String,
    pub scroll_step_px: u32,
    pub settle_delay: Duration,
    pub max_rows: usize,
    pub stale_ratio: f64,
    pub stale_floor: usize,
}

impl ScanPolicy {
    pub fn from_config(config: &ScannerConfig, mode: ScanMode) -> Self {
        Self {
            mode,
            backup_marker: config.backup_marker.clone(),
            date_artifact: config.date_artifact.clone(),
            scroll_step_px: config.scroll_step_px,
            settle_delay: Duration::from_millis(config.settle_delay_ms),
            max_rows: config.max_rows,
            stale_ratio: config.stale_ratio,
            stale_floor: config.stale_floor,
        }
    }
}

impl Default for ScanPolicy {
    fn default() -> Self {
        Self::from_config(&ScannerConfig::default(), ScanMode::Scroll)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StopReason {
    ContainerMissing,
    /// Mostly old rows in the last pass: the window has moved past the cutoff
    PastCutoff,
    EndOfList,
    SafetyCap,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            StopReason::ContainerMissing => "scroll container not found",
            StopReason::PastCutoff => "reached backups older than the cutoff",
            StopReason::EndOfList => "end of list",
            StopReason::SafetyCap => "row safety cap reached",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Scanning,
    Done(StopReason),
}

/// What one pass over the visible rows contributed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PassOutcome {
    pub new_records: usize,
    pub stale_rows: usize,
    pub duplicate_rows: usize,
    pub skipped_rows: usize,
    pub revisited_rows: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ScanStats {
    pub passes: usize,
    /// Distinct fully rendered rows examined
    pub rows_processed: usize,
    pub stale_rows: usize,
    pub duplicate_rows: usize,
    pub skipped_rows: usize,
}

pub struct ScanSession {
    policy: ScanPolicy,
    parser: RowParser,
    cutoff: Option<NaiveDate>,
    records: BTreeMap<DomainKey, ObservedDate>,
    seen_rows: HashSet<String>,
    stats: ScanStats,
    state: ScanState,
}

impl ScanSession {
    pub fn new(policy: ScanPolicy, today: NaiveDate) -> Self {
        let parser = RowParser::new(&policy.backup_marker, &policy.date_artifact, today);
        let cutoff = match policy.mode {
            ScanMode::Scroll => Some(previous_month_cutoff(today)),
            ScanMode::Snapshot => None,
        };
        Self {
            policy,
            parser,
            cutoff,
            records: BTreeMap::new(),
            seen_rows: HashSet::new(),
            stats: ScanStats::default(),
            state: ScanState::Scanning,
        }
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    pub fn stats(&self) -> ScanStats {
        self.stats
    }

    pub fn cutoff(&self) -> Option<NaiveDate> {
        self.cutoff
    }

    pub fn records(&self) -> &BTreeMap<DomainKey, ObservedDate> {
        &self.records
    }

    /// Fold one pass of visible rows into the session and decide whether to keep going.
    pub fn apply_pass(&mut self, rows: &[RawRow]) -> (PassOutcome, ScanState) {
        let mut outcome = PassOutcome::default();
        if self.state != ScanState::Scanning {
            return (outcome, self.state);
        }
        self.stats.passes += 1;
        let require_date = self.policy.mode == ScanMode::Scroll;

        for row in rows {
            let kind = self.parser.classify(row, require_date);
            // A half-rendered row is re-read on later passes until its fields appear
            let complete = !matches!(kind, RowKind::Skip(SkipReason::MissingName | SkipReason::MissingDate));

            if let Some(name) = row.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
                if self.seen_rows.contains(name) {
                    outcome.revisited_rows += 1;
                    continue;
                }
                if complete {
                    if self.stats.rows_processed >= self.policy.max_rows {
                        self.state = ScanState::Done(StopReason::SafetyCap);
                        break;
                    }
                    self.seen_rows.insert(name.to_string());
                    self.stats.rows_processed += 1;
                }
            }

            match kind {
                RowKind::Skip(reason) => {
                    debug!("Skipping row {:?}: {:?}", row.name, reason);
                    outcome.skipped_rows += 1;
                }
                RowKind::Backup { domain, date } => self.accept(domain, date, &mut outcome),
            }
        }

        self.stats.stale_rows += outcome.stale_rows;
        self.stats.duplicate_rows += outcome.duplicate_rows;
        self.stats.skipped_rows += outcome.skipped_rows;

        if self.state == ScanState::Scanning {
            self.state = self.after_pass(&outcome);
        }
        (outcome, self.state)
    }

    fn accept(&mut self, domain: DomainKey, date: Option<NaiveDate>, outcome: &mut PassOutcome) {
        let observed = match (self.cutoff, date) {
            (Some(cutoff), Some(d)) if d >= cutoff => ObservedDate::Date(d),
            (Some(_), _) => {
                outcome.stale_rows += 1;
                return;
            }
            (None, Some(d)) => ObservedDate::Date(d),
            (None, None) => ObservedDate::Unknown,
        };

        if self.records.contains_key(&domain) {
            outcome.duplicate_rows += 1;
            return;
        }
        debug!("Backup file #{}: {} ({})", self.records.len() + 1, domain, observed);
        self.records.insert(domain, observed);
        outcome.new_records += 1;
    }

    fn after_pass(&self, outcome: &PassOutcome) -> ScanState {
        if self.policy.mode == ScanMode::Snapshot {
            return ScanState::Done(StopReason::EndOfList);
        }
        let stale = outcome.stale_rows as f64;
        let threshold = self.policy.stale_ratio * outcome.new_records as f64;
        if stale > threshold && outcome.stale_rows > self.policy.stale_floor {
            return ScanState::Done(StopReason::PastCutoff);
        }
        if self.stats.rows_processed >= self.policy.max_rows {
            return ScanState::Done(StopReason::SafetyCap);
        }
        ScanState::Scanning
    }

    /// Record the result of the scroll issued after a pass.
    pub fn apply_scroll(&mut self, offsets: ScrollOffsets) -> ScanState {
        if self.state == ScanState::Scanning && !offsets.moved() {
            self.state = ScanState::Done(StopReason::EndOfList);
        }
        self.state
    }

    pub fn stop(&mut self, reason: StopReason) {
        self.state = ScanState::Done(reason);
    }

    pub fn finish(self) -> ScanResult {
        let stop_reason = match self.state {
            ScanState::Done(reason) => reason,
            ScanState::Scanning => StopReason::EndOfList,
        };
        ScanResult {
            records: self.records,
            stop_reason,
            stats: self.stats,
            cutoff: self.cutoff,
        }
    }
}

/// Everything a finished scan observed, keyed by domain.
#[derive(Debug, Clone)]
pub struct ScanResult {
    pub records: BTreeMap<DomainKey, ObservedDate>,
    pub stop_reason: StopReason,
    pub stats: ScanStats,
    pub cutoff: Option<NaiveDate>,
}

pub struct Scanner {
    policy: ScanPolicy,
    today: NaiveDate,
}

impl Scanner {
    pub fn new(policy: ScanPolicy) -> Self {
        Self::with_today(policy, Local::now().date_naive())
    }

    pub fn with_today(policy: ScanPolicy, today: NaiveDate) -> Self {
        Self { policy, today }
    }

    pub fn run<R: DomReader>(&self, reader: &mut R) -> Result<ScanResult, ScanError> {
        self.run_with_progress(reader, |_, _| {})
    }

    /// Drive a scan to completion. Blocks for the settle delay between passes.
    pub fn run_with_progress<R, F>(&self, reader: &mut R, mut on_pass: F) -> Result<ScanResult, ScanError>
    where
        R: DomReader,
        F: FnMut(&PassOutcome, &ScanStats),
    {
        let mut session = ScanSession::new(self.policy.clone(), self.today);
        if let Some(cutoff) = session.cutoff() {
            info!("Scanning for backups dated on or after {}", cutoff);
        }

        if self.policy.mode == ScanMode::Scroll && !reader.has_scroll_container()? {
            info!("Scroll container not found, nothing to scan");
            session.stop(StopReason::ContainerMissing);
            return Ok(session.finish());
        }

        loop {
            let rows = reader.visible_rows()?;
            let (outcome, state) = session.apply_pass(&rows);
            debug!(
                "Pass {}: {} rows, {} new, {} stale, {} duplicate, {} skipped",
                session.stats().passes,
                rows.len(),
                outcome.new_records,
                outcome.stale_rows,
                outcome.duplicate_rows,
                outcome.skipped_rows
            );
            on_pass(&outcome, &session.stats());
            if state != ScanState::Scanning {
                break;
            }

            let offsets = reader.scroll_by(self.policy.scroll_step_px)?;
            if session.apply_scroll(offsets) != ScanState::Scanning {
                break;
            }
            if !self.policy.settle_delay.is_zero() {
                std::thread::sleep(self.policy.settle_delay);
            }
        }

        let result = session.finish();
        info!(
            "Scan finished ({}): {} unique domains after {} passes",
            result.stop_reason,
            result.records.len(),
            result.stats.passes
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn policy(mode: ScanMode) -> ScanPolicy {
        ScanPolicy {
            mode,
            settle_delay: Duration::ZERO,
            ..ScanPolicy::default()
        }
    }

    #[test]
    fn test_cutoff_is_first_of_previous_month() {
        assert_eq!(previous_month_cutoff(day(2025, 3, 17)), day(2025, 2, 1));
        assert_eq!(previous_month_cutoff(day(2025, 1, 1)), day(2024, 12, 1));
        assert_eq!(previous_month_cutoff(day(2024, 12, 31)), day(2024, 11, 1));
    }

    #[test]
    fn test_parse_display_date_formats() {
        let today = day(2025, 3, 17);
        assert_eq!(parse_display_date("Jan 5, 2025", today), Some(day(2025, 1, 5)));
        assert_eq!(parse_display_date("January 5, 2025", today), Some(day(2025, 1, 5)));
        assert_eq!(parse_display_date("5 Jan 2025", today), Some(day(2025, 1, 5)));
        assert_eq!(parse_display_date("2025-01-05", today), Some(day(2025, 1, 5)));
        assert_eq!(parse_display_date("1/5/2025", today), Some(day(2025, 1, 5)));
        assert_eq!(parse_display_date("Mar 2", today), Some(day(2025, 3, 2)));
        assert_eq!(parse_display_date("10:42 AM", today), Some(today));
        assert_eq!(parse_display_date("Yesterday", today), Some(day(2025, 3, 16)));
    }

    #[test]
    fn test_short_date_after_today_belongs_to_last_year() {
        let today = day(2025, 3, 17);
        assert_eq!(parse_display_date("Dec 30", today), Some(day(2024, 12, 30)));
    }

    #[test]
    fn test_parse_display_date_rejects_garbage() {
        let today = day(2025, 3, 17);
        assert_eq!(parse_display_date("", today), None);
        assert_eq!(parse_display_date("—", today), None);
        assert_eq!(parse_display_date("not a date", today), None);
    }

    #[test]
    fn test_classify_strips_date_artifact() {
        let parser = RowParser::new("_wpvivid", "me", day(2025, 3, 17));
        let row = RawRow::new("https://site.com/my_wpvivid-backup_2025.zip", "Feb 3, 2025 me");
        assert_eq!(
            parser.classify(&row, true),
            RowKind::Backup {
                domain: DomainKey::normalize("site.com_my"),
                date: Some(day(2025, 2, 3)),
            }
        );
    }

    #[test]
    fn test_classify_skips_folders_and_incomplete_rows() {
        let parser = RowParser::new("_wpvivid", "me", day(2025, 3, 17));
        assert_eq!(
            parser.classify(&RawRow::new("Archive", "Feb 3, 2025"), true),
            RowKind::Skip(SkipReason::NoMarker)
        );
        assert_eq!(
            parser.classify(&RawRow::new("_wpvivid-orphan.zip", "Feb 3, 2025"), true),
            RowKind::Skip(SkipReason::EmptyDomain)
        );
        let no_date = RawRow {
            name: Some("a.com_wpvivid.zip".to_string()),
            date: None,
        };
        assert_eq!(parser.classify(&no_date, true), RowKind::Skip(SkipReason::MissingDate));
        assert_eq!(
            parser.classify(&no_date, false),
            RowKind::Backup {
                domain: DomainKey::normalize("a.com"),
                date: None
            }
        );
        assert_eq!(
            parser.classify(&RawRow::default(), false),
            RowKind::Skip(SkipReason::MissingName)
        );
    }

    #[test]
    fn test_pass_keeps_first_seen_date() {
        let mut session = ScanSession::new(policy(ScanMode::Scroll), day(2025, 3, 17));
        let rows = vec![
            RawRow::new("a.com_wpvivid_new.zip", "Mar 10, 2025"),
            RawRow::new("a.com_wpvivid_old.zip", "Mar 1, 2025"),
        ];
        let (outcome, state) = session.apply_pass(&rows);
        assert_eq!(outcome.new_records, 1);
        assert_eq!(outcome.duplicate_rows, 1);
        assert_eq!(state, ScanState::Scanning);
        assert_eq!(
            session.records().get(&DomainKey::normalize("a.com")),
            Some(&ObservedDate::Date(day(2025, 3, 10)))
        );
    }

    #[test]
    fn test_pass_rejects_stale_and_unparseable_dates() {
        let mut session = ScanSession::new(policy(ScanMode::Scroll), day(2025, 3, 17));
        let rows = vec![
            RawRow::new("old.com_wpvivid.zip", "Jan 31, 2025"),
            RawRow::new("bad.com_wpvivid.zip", "sometime"),
            RawRow::new("ok.com_wpvivid.zip", "Feb 1, 2025"),
        ];
        let (outcome, _) = session.apply_pass(&rows);
        assert_eq!(outcome.stale_rows, 2);
        assert_eq!(outcome.new_records, 1);
        assert_eq!(session.records().len(), 1);
    }

    #[test]
    fn test_revisited_rows_are_not_recounted() {
        let mut session = ScanSession::new(policy(ScanMode::Scroll), day(2025, 3, 17));
        let rows = vec![RawRow::new("a.com_wpvivid.zip", "Mar 1, 2025")];
        session.apply_pass(&rows);
        let (outcome, _) = session.apply_pass(&rows);
        assert_eq!(outcome.revisited_rows, 1);
        assert_eq!(outcome.duplicate_rows, 0);
        assert_eq!(session.stats().rows_processed, 1);
    }

    #[test]
    fn test_row_missing_its_date_is_read_again_later() {
        let mut session = ScanSession::new(policy(ScanMode::Scroll), day(2025, 3, 17));
        let pending = RawRow {
            name: Some("a.com_wpvivid-1.zip".to_string()),
            date: None,
        };
        let (outcome, _) = session.apply_pass(&[pending]);
        assert_eq!(outcome.skipped_rows, 1);
        assert_eq!(session.stats().rows_processed, 0);

        let (outcome, _) = session.apply_pass(&[RawRow::new("a.com_wpvivid-1.zip", "Mar 10, 2025")]);
        assert_eq!(outcome.revisited_rows, 0);
        assert_eq!(outcome.new_records, 1);
        assert_eq!(
            session.records().get(&DomainKey::normalize("a.com")),
            Some(&ObservedDate::Date(day(2025, 3, 10)))
        );
        assert_eq!(session.stats().rows_processed, 1);
    }

    #[test]
    fn test_mostly_stale_pass_stops_scan() {
        let mut session = ScanSession::new(policy(ScanMode::Scroll), day(2025, 3, 17));
        let rows: Vec<RawRow> = (0..12)
            .map(|i| RawRow::new(&format!("old{}.com_wpvivid.zip", i), "Jan 2, 2024"))
            .collect();
        let (_, state) = session.apply_pass(&rows);
        assert_eq!(state, ScanState::Done(StopReason::PastCutoff));
    }

    #[test]
    fn test_stale_rows_below_floor_keep_scanning() {
        let mut session = ScanSession::new(policy(ScanMode::Scroll), day(2025, 3, 17));
        let rows: Vec<RawRow> = (0..10)
            .map(|i| RawRow::new(&format!("old{}.com_wpvivid.zip", i), "Jan 2, 2024"))
            .collect();
        let (_, state) = session.apply_pass(&rows);
        assert_eq!(state, ScanState::Scanning);
    }

    #[test]
    fn test_stale_rows_balanced_by_new_rows_keep_scanning() {
        let mut session = ScanSession::new(policy(ScanMode::Scroll), day(2025, 3, 17));
        let mut rows: Vec<RawRow> = (0..12)
            .map(|i| RawRow::new(&format!("old{}.com_wpvivid.zip", i), "Jan 2, 2024"))
            .collect();
        rows.extend((0..4).map(|i| RawRow::new(&format!("new{}.com_wpvivid.zip", i), "Mar 2, 2025")));
        let (_, state) = session.apply_pass(&rows);
        // 12 stale is not more than 3 x 4 new
        assert_eq!(state, ScanState::Scanning);
    }

    #[test]
    fn test_safety_cap_stops_mid_pass() {
        let mut p = policy(ScanMode::Scroll);
        p.max_rows = 5;
        let mut session = ScanSession::new(p, day(2025, 3, 17));
        let rows: Vec<RawRow> = (0..8)
            .map(|i| RawRow::new(&format!("s{}.com_wpvivid.zip", i), "Mar 2, 2025"))
            .collect();
        let (outcome, state) = session.apply_pass(&rows);
        assert_eq!(state, ScanState::Done(StopReason::SafetyCap));
        assert_eq!(outcome.new_records, 5);
        assert_eq!(session.stats().rows_processed, 5);
    }

    #[test]
    fn test_snapshot_mode_keeps_undated_rows() {
        let mut session = ScanSession::new(policy(ScanMode::Snapshot), day(2025, 3, 17));
        let rows = vec![
            RawRow {
                name: Some("a.com_wpvivid.zip".to_string()),
                date: None,
            },
            RawRow::new("b.com_wpvivid.zip", "Jan 2, 2019"),
        ];
        let (_, state) = session.apply_pass(&rows);
        assert_eq!(state, ScanState::Done(StopReason::EndOfList));
        let result = session.finish();
        assert_eq!(result.records[&DomainKey::normalize("a.com")], ObservedDate::Unknown);
        assert_eq!(result.records[&DomainKey::normalize("b.com")], ObservedDate::Date(day(2019, 1, 2)));
        assert_eq!(result.cutoff, None);
    }

    #[test]
    fn test_unmoved_scroll_ends_scan() {
        let mut session = ScanSession::new(policy(ScanMode::Scroll), day(2025, 3, 17));
        session.apply_pass(&[]);
        assert_eq!(session.apply_scroll(ScrollOffsets { before: 0, after: 800 }), ScanState::Scanning);
        assert_eq!(
            session.apply_scroll(ScrollOffsets { before: 800, after: 800 }),
            ScanState::Done(StopReason::EndOfList)
        );
    }

    #[test]
    fn test_observed_date_display() {
        assert_eq!(ObservedDate::Date(day(2025, 1, 2)).to_string(), "2025-01-02");
        assert_eq!(ObservedDate::Unknown.to_string(), "unknown");
    }
}
