use chrono::{Local, NaiveDate};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;
use tracing::info;

use crate::domain_utils::DomainKey;
use crate::reference::ReferenceList;
use crate::scanner::{BackupRecord, ObservedDate, ScanResult};

/// Inputs that almost certainly mean a failed fetch or scan rather than a real result.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ReconcileError {
    #[error("Reference domain list is empty; check the spreadsheet range or the fallback list")]
    EmptyReference,

    #[error(
        "No backups were observed while using the fallback domain list; \
         open the Drive folder with the backup files before running"
    )]
    NothingObservedWithFallback,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationReport {
    /// In the reference list and observed
    pub matched: Vec<BackupRecord>,
    /// In the reference list, not observed
    pub missing_from_observed: Vec<DomainKey>,
    /// Observed, not in the reference list
    pub unexpected_observed: Vec<BackupRecord>,
    pub used_fallback: bool,
    pub generated_on: NaiveDate,
}

impl ReconciliationReport {
    pub fn total_entries(&self) -> usize {
        self.matched.len() + self.missing_from_observed.len() + self.unexpected_observed.len()
    }
}

/// Classify reference domains against observed backups.
///
/// Each list comes out sorted by domain. Duplicate reference entries collapse.
pub fn reconcile(
    reference: &[DomainKey],
    observed: &BTreeMap<DomainKey, ObservedDate>,
) -> Result<ReconciliationReport, ReconcileError> {
    if reference.is_empty() {
        return Err(ReconcileError::EmptyReference);
    }

    let reference_set: BTreeSet<&DomainKey> = reference.iter().collect();

    let matched: Vec<BackupRecord> = reference_set
        .iter()
        .filter_map(|domain| {
            observed.get(*domain).map(|date| BackupRecord {
                domain: (*domain).clone(),
                observed: *date,
            })
        })
        .collect();

    let missing_from_observed: Vec<DomainKey> = reference_set
        .iter()
        .filter(|domain| !observed.contains_key(**domain))
        .map(|domain| (*domain).clone())
        .collect();

    let unexpected_observed: Vec<BackupRecord> = observed
        .iter()
        .filter(|(domain, _)| !reference_set.contains(domain))
        .map(|(domain, date)| BackupRecord {
            domain: domain.clone(),
            observed: *date,
        })
        .collect();

    Ok(ReconciliationReport {
        matched,
        missing_from_observed,
        unexpected_observed,
        used_fallback: false,
        generated_on: Local::now().date_naive(),
    })
}

/// [`reconcile`] plus the run-level guard against a fallback list meeting an empty scan.
pub fn reconcile_run(reference: &ReferenceList, scan: &ScanResult) -> Result<ReconciliationReport, ReconcileError> {
    if reference.is_empty() {
        return Err(ReconcileError::EmptyReference);
    }
    if reference.used_fallback && scan.records.is_empty() {
        return Err(ReconcileError::NothingObservedWithFallback);
    }

    let mut report = reconcile(&reference.domains, &scan.records)?;
    report.used_fallback = reference.used_fallback;

    info!(
        "Reconciled {} reference domains against {} observed: {} latest, {} missing, {} inactive",
        reference.len(),
        scan.records.len(),
        report.matched.len(),
        report.missing_from_observed.len(),
        report.unexpected_observed.len()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::{ScanStats, StopReason};

    fn keys(raw: &[&str]) -> Vec<DomainKey> {
        raw.iter().map(|d| DomainKey::normalize(d)).collect()
    }

    fn date(y: i32, m: u32, d: u32) -> ObservedDate {
        ObservedDate::Date(NaiveDate::from_ymd_opt(y, m, d).unwrap())
    }

    fn scan(records: BTreeMap<DomainKey, ObservedDate>) -> ScanResult {
        ScanResult {
            records,
            stop_reason: StopReason::EndOfList,
            stats: ScanStats::default(),
            cutoff: None,
        }
    }

    #[test]
    fn test_duplicate_reference_entries_collapse() {
        let reference = keys(&["a.com", "https://a.com/", "b.com"]);
        let report = reconcile(&reference, &BTreeMap::new()).unwrap();
        assert_eq!(report.missing_from_observed, keys(&["a.com", "b.com"]));
    }

    #[test]
    fn test_lists_are_sorted() {
        let reference = keys(&["z.com", "m.com", "a.com"]);
        let observed: BTreeMap<_, _> = [
            (DomainKey::normalize("m.com"), date(2025, 1, 1)),
            (DomainKey::normalize("y.com"), date(2025, 1, 1)),
            (DomainKey::normalize("b.com"), date(2025, 1, 1)),
        ]
        .into_iter()
        .collect();
        let report = reconcile(&reference, &observed).unwrap();
        assert_eq!(report.missing_from_observed, keys(&["a.com", "z.com"]));
        let unexpected: Vec<&str> = report.unexpected_observed.iter().map(|r| r.domain.as_str()).collect();
        assert_eq!(unexpected, vec!["b.com", "y.com"]);
    }

    #[test]
    fn test_reconcile_run_marks_fallback() {
        let reference = ReferenceList {
            domains: keys(&["a.com"]),
            used_fallback: true,
            fallback_reason: None,
        };
        let observed: BTreeMap<_, _> = [(DomainKey::normalize("a.com"), date(2025, 2, 2))].into_iter().collect();
        let report = reconcile_run(&reference, &scan(observed)).unwrap();
        assert!(report.used_fallback);
        assert_eq!(report.matched.len(), 1);
    }

    #[test]
    fn test_fallback_with_empty_scan_is_rejected() {
        let reference = ReferenceList {
            domains: keys(&["a.com"]),
            used_fallback: true,
            fallback_reason: Some("offline".to_string()),
        };
        assert_eq!(
            reconcile_run(&reference, &scan(BTreeMap::new())).unwrap_err(),
            ReconcileError::NothingObservedWithFallback
        );
    }

    #[test]
    fn test_sheet_list_with_empty_scan_reports_everything_missing() {
        let reference = ReferenceList {
            domains: keys(&["a.com", "b.com"]),
            used_fallback: false,
            fallback_reason: None,
        };
        let report = reconcile_run(&reference, &scan(BTreeMap::new())).unwrap();
        assert_eq!(report.missing_from_observed.len(), 2);
        assert_eq!(report.total_entries(), 2);
    }
}
