//! Configuration management for backupcheck
//!
//! All configuration is loaded from `./config/backupcheck.toml` (or `--config`).
//! The defaults live in the config template, which is embedded in the binary.

use serde::Deserialize;
use std::fs;
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration file path relative to working directory
pub const CONFIG_PATH: &str = "./config/backupcheck.toml";

/// Default configuration file content
pub const DEFAULT_CONFIG: &str = include_str!("../config/backupcheck.toml");

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found at {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] io::Error),

    #[error("Failed to parse configuration file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid URL in '{field}': {url}")]
    InvalidUrl { field: String, url: String },

    #[error("Configuration field '{field}' cannot be empty")]
    EmptyRequired { field: String },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub sheets: SheetsConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub reference: ReferenceConfig,
    pub browser: BrowserConfig,
    #[serde(default)]
    pub dom: DomConfig,
    #[serde(default)]
    pub scanner: ScannerConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

/// HTTP client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub user_agent: String,
    pub request_timeout_secs: u64,
}

/// Spreadsheet holding the expected domain list
#[derive(Debug, Clone, Deserialize)]
pub struct SheetsConfig {
    pub api_base: String,
    pub spreadsheet_id: String,
    pub range: String,
}

/// Bearer token sources for the spreadsheet API
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub token_env: Option<String>,
    #[serde(default)]
    pub token_command: Vec<String>,
    #[serde(default = "default_auth_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_auth_timeout_secs() -> u64 {
    5
}

impl AuthConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Static reference list used when the spreadsheet is unavailable
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReferenceConfig {
    /// Empty means the built-in list
    #[serde(default)]
    pub fallback_domains: Vec<String>,
}

/// Browser session used for live Drive scans
#[derive(Debug, Clone, Deserialize)]
pub struct BrowserConfig {
    pub folder_url: String,
    #[serde(default)]
    pub debug_ws_url: String,
    #[serde(default)]
    pub user_data_dir: String,
    #[serde(default)]
    pub headless: bool,
    #[serde(default = "default_navigation_timeout_secs")]
    pub navigation_timeout_secs: u64,
}

const MAX_NAVIGATION_TIMEOUT_SECS: u64 = 3600;

fn default_navigation_timeout_secs() -> u64 {
    60
}

/// Selectors describing the file browser's list markup
#[derive(Debug, Clone, Deserialize)]
pub struct DomConfig {
    pub row_selector: String,
    pub name_selector: String,
    pub date_selector: String,
    pub scroll_container_selectors: Vec<String>,
}

impl Default for DomConfig {
    fn default() -> Self {
        Self {
            row_selector: r#"div[role="row"]"#.to_string(),
            name_selector: r#"div[data-column-field="0"]"#.to_string(),
            date_selector: r#"div[data-column-field="5"] span"#.to_string(),
            scroll_container_selectors: vec![
                ".a-s-tb-sc-Ja".to_string(),
                r#"div[role="grid"]"#.to_string(),
                r#"div[role="main"]"#.to_string(),
            ],
        }
    }
}

/// Virtualized list scanning policy
#[derive(Debug, Clone, Deserialize)]
pub struct ScannerConfig {
    pub backup_marker: String,
    #[serde(default)]
    pub date_artifact: String,
    pub scroll_step_px: u32,
    pub settle_delay_ms: u64,
    pub max_rows: usize,
    pub stale_ratio: f64,
    pub stale_floor: usize,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            backup_marker: "_wpvivid".to_string(),
            date_artifact: "me".to_string(),
            scroll_step_px: 800,
            settle_delay_ms: 1500,
            max_rows: 1000,
            stale_ratio: 3.0,
            stale_floor: 10,
        }
    }
}

/// Report output settings
#[derive(Debug, Clone, Deserialize)]
pub struct ExportConfig {
    #[serde(default)]
    pub output_dir: String,
    #[serde(default = "default_filename_prefix")]
    pub filename_prefix: String,
}

fn default_filename_prefix() -> String {
    "backup_report".to_string()
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: String::new(),
            filename_prefix: default_filename_prefix(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration text
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.http.user_agent.is_empty() {
            return Err(empty("http.user_agent"));
        }
        if self.http.request_timeout_secs == 0 {
            return Err(empty("http.request_timeout_secs"));
        }

        if !self.sheets.api_base.starts_with("http://") && !self.sheets.api_base.starts_with("https://") {
            return Err(ConfigError::InvalidUrl {
                field: "sheets.api_base".to_string(),
                url: self.sheets.api_base.clone(),
            });
        }
        if self.sheets.spreadsheet_id.trim().is_empty() {
            return Err(empty("sheets.spreadsheet_id"));
        }
        if self.sheets.range.trim().is_empty() {
            return Err(empty("sheets.range"));
        }
        if self.auth.timeout_secs == 0 {
            return Err(invalid("auth.timeout_secs", "must be at least 1 second"));
        }
        if !(1..=MAX_NAVIGATION_TIMEOUT_SECS).contains(&self.browser.navigation_timeout_secs) {
            return Err(invalid(
                "browser.navigation_timeout_secs",
                &format!("must be between 1 and {} seconds", MAX_NAVIGATION_TIMEOUT_SECS),
            ));
        }

        if !self.browser.debug_ws_url.is_empty() && !self.browser.debug_ws_url.starts_with("ws://") {
            return Err(ConfigError::InvalidUrl {
                field: "browser.debug_ws_url".to_string(),
                url: self.browser.debug_ws_url.clone(),
            });
        }

        if self.dom.row_selector.trim().is_empty() {
            return Err(empty("dom.row_selector"));
        }
        if self.dom.name_selector.trim().is_empty() {
            return Err(empty("dom.name_selector"));
        }
        if self.dom.date_selector.trim().is_empty() {
            return Err(empty("dom.date_selector"));
        }
        if self.dom.scroll_container_selectors.is_empty() {
            return Err(empty("dom.scroll_container_selectors"));
        }

        if self.scanner.backup_marker.is_empty() {
            return Err(empty("scanner.backup_marker"));
        }
        if self.scanner.scroll_step_px == 0 {
            return Err(invalid("scanner.scroll_step_px", "must be greater than zero"));
        }
        if self.scanner.max_rows == 0 {
            return Err(invalid("scanner.max_rows", "must be greater than zero"));
        }
        if !(self.scanner.stale_ratio > 0.0) {
            return Err(invalid("scanner.stale_ratio", "must be a positive number"));
        }

        if self.export.filename_prefix.trim().is_empty() {
            return Err(empty("export.filename_prefix"));
        }

        Ok(())
    }

    /// Write the default configuration template to `path`
    pub fn create_default_config_at(path: &Path) -> Result<PathBuf, ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = fs::File::create(path)?;
        file.write_all(DEFAULT_CONFIG.as_bytes())?;

        Ok(path.to_path_buf())
    }

    /// Check if stdin is a TTY (interactive terminal)
    pub fn is_interactive() -> bool {
        io::stdin().is_terminal()
    }

    /// Prompt user to create default config (only in interactive mode)
    pub fn prompt_create_config(path: &Path) -> Result<Option<PathBuf>, ConfigError> {
        if !Self::is_interactive() {
            return Ok(None);
        }

        print!("Configuration file not found. Create default config? [Y/n] ");
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        let input = input.trim().to_lowercase();

        if input.is_empty() || input == "y" || input == "yes" {
            let path = Self::create_default_config_at(path)?;
            Ok(Some(path))
        } else {
            Ok(None)
        }
    }
}

fn empty(field: &str) -> ConfigError {
    ConfigError::EmptyRequired {
        field: field.to_string(),
    }
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_parses() {
        let config: Result<AppConfig, _> = toml::from_str(DEFAULT_CONFIG);
        assert!(config.is_ok(), "Default config should parse: {:?}", config.err());
    }

    #[test]
    fn test_default_config_validates() {
        let config: AppConfig = toml::from_str(DEFAULT_CONFIG).unwrap();
        assert!(config.validate().is_ok(), "Default config should validate");
    }

    #[test]
    fn test_default_config_matches_struct_defaults() {
        let config: AppConfig = toml::from_str(DEFAULT_CONFIG).unwrap();
        let defaults = ScannerConfig::default();
        assert_eq!(config.scanner.backup_marker, defaults.backup_marker);
        assert_eq!(config.scanner.max_rows, defaults.max_rows);
        assert_eq!(config.scanner.stale_floor, defaults.stale_floor);
        assert_eq!(config.auth.timeout_secs, 5);
        assert_eq!(config.dom.date_selector, DomConfig::default().date_selector);
    }

    #[test]
    fn test_minimal_config_uses_section_defaults() {
        let config_str = r#"
[http]
user_agent = "test/1.0"
request_timeout_secs = 10

[sheets]
api_base = "http://127.0.0.1:9999"
spreadsheet_id = "sheet-1"
range = "MASTER!D:D"

[auth]

[browser]
folder_url = "https://drive.google.com/drive/folders/abc"
"#;
        let config = AppConfig::from_toml(config_str).unwrap();
        assert!(config.reference.fallback_domains.is_empty());
        assert_eq!(config.scanner.settle_delay_ms, 1500);
        assert_eq!(config.export.filename_prefix, "backup_report");
        assert_eq!(config.auth.timeout(), Duration::from_secs(5));
        assert!(config.auth.token_command.is_empty());
    }

    #[test]
    fn test_rejects_bad_api_base() {
        let mut config: AppConfig = toml::from_str(DEFAULT_CONFIG).unwrap();
        config.sheets.api_base = "sheets.googleapis.com".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidUrl { .. })));
    }

    #[test]
    fn test_rejects_empty_marker() {
        let mut config: AppConfig = toml::from_str(DEFAULT_CONFIG).unwrap();
        config.scanner.backup_marker.clear();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("scanner.backup_marker"));
    }

    #[test]
    fn test_rejects_zero_stale_ratio() {
        let mut config: AppConfig = toml::from_str(DEFAULT_CONFIG).unwrap();
        config.scanner.stale_ratio = 0.0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_rejects_out_of_range_navigation_timeout() {
        let mut config: AppConfig = toml::from_str(DEFAULT_CONFIG).unwrap();
        config.browser.navigation_timeout_secs = u64::MAX;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("browser.navigation_timeout_secs"));

        config.browser.navigation_timeout_secs = 0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_create_default_config_at_writes_template() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config").join("backupcheck.toml");
        let written = AppConfig::create_default_config_at(&path).unwrap();
        assert_eq!(written, path);
        let loaded = AppConfig::load_from_path(&path).unwrap();
        assert_eq!(loaded.sheets.range, "'MASTER'!D:D");
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = AppConfig::load_from_path(Path::new("/nonexistent/backupcheck.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }
}
