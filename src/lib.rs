//! Reconcile the domains listed in a spreadsheet against the backup files
//! present in a Drive folder, and report what is current, missing or extra.

pub mod browser;
pub mod cli;
pub mod config;
pub mod domain_utils;
pub mod export;
pub mod logger;
pub mod pipeline;
pub mod reconcile;
pub mod reference;
pub mod scanner;
pub mod snapshot;

pub use domain_utils::DomainKey;
pub use reconcile::{reconcile, ReconciliationReport};
pub use scanner::{BackupRecord, ObservedDate};
