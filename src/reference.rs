//! Expected-domain list provider.
//!
//! Reads one column of a Google Sheet through the Sheets v4 values endpoint.
//! Any failure on that path (token, transport, status, body) substitutes the
//! static fallback list instead of failing the run.

use serde::Deserialize;
use std::future::Future;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::{AppConfig, AuthConfig, HttpConfig, SheetsConfig};
use crate::domain_utils::{self, DomainKey};

/// Built-in reference list, used when the config does not provide one.
pub const FALLBACK_DOMAINS: &[&str] = &[
    "andamanmed.com",
    "www.bankware.asia",
    "en.bankwareglobal.com",
    "bnfindustries.com",
    "www.cardiaccarepartners.com",
    "cloudnettl.com",
    "dawsonmedical.com.sg",
    "ennovi.com",
    "ennovi.com.cn",
    "ennovi.cz",
    "www.focal-digital.com",
    "www.gynaeoncopartners.com",
    "insidersecurity.co",
    "interplex.com",
    "interplex.com.cn",
    "www.logicalisasia.digital",
    "www.lyrecodeliverswellness.com",
    "www.lyrecodeliverswellness.com_my",
    "www.lyrecodeliverswellness.com_sg",
    "www.lyrecodeliverswellness.com_th",
    "nordpacificmed.com",
    "www.powercred.io",
    "ifforeststalk.com",
    "www.impactbc.com.sg",
    "martechwise.com",
    "techinfocus.co",
    "wfhwins.com",
];

#[derive(Error, Debug)]
pub enum ReferenceError {
    #[error("Auth token request timed out after {0:?}")]
    AuthTimeout(Duration),

    #[error("Auth token request failed: {0}")]
    Auth(String),

    #[error("Network error while reading spreadsheet: {0}")]
    Network(String),

    #[error("Sheets API HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Failed to parse spreadsheet response: {0}")]
    Parse(String),
}

/// Source of an opaque bearer token for the spreadsheet API.
pub trait TokenProvider {
    fn fetch_token(&self) -> impl Future<Output = Result<String, String>> + Send;
}

/// A fixed token, mostly useful for tests and one-off runs.
#[derive(Debug, Clone)]
pub struct StaticTokenProvider(pub String);

impl TokenProvider for StaticTokenProvider {
    async fn fetch_token(&self) -> Result<String, String> {
        Ok(self.0.clone())
    }
}

/// Reads the token from an environment variable.
#[derive(Debug, Clone)]
pub struct EnvTokenProvider {
    pub var: String,
}

impl TokenProvider for EnvTokenProvider {
    async fn fetch_token(&self) -> Result<String, String> {
        match std::env::var(&self.var) {
            Ok(token) if !token.trim().is_empty() => Ok(token.trim().to_string()),
            Ok(_) => Err(format!("{} is set but empty", self.var)),
            Err(_) => Err(format!("{} is not set", self.var)),
        }
    }
}

/// Runs an external command (e.g. `gcloud auth print-access-token`) and uses its stdout.
/// The command may open a browser for consent, which is why the caller bounds the wait.
#[derive(Debug, Clone)]
pub struct CommandTokenProvider {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandTokenProvider {
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }
}

impl TokenProvider for CommandTokenProvider {
    async fn fetch_token(&self) -> Result<String, String> {
        debug!("Requesting auth token via `{}`", self.program);
        let output = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| format!("Failed to run {}: {}", self.program, e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(format!("{} exited with {}: {}", self.program, output.status, stderr.trim()));
        }

        let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if token.is_empty() {
            Err("No token received".to_string())
        } else {
            Ok(token)
        }
    }
}

/// Token sources from `[auth]`: environment variable first, then command.
#[derive(Debug, Clone)]
pub struct ConfiguredTokenProvider {
    env: Option<EnvTokenProvider>,
    command: Option<CommandTokenProvider>,
}

impl ConfiguredTokenProvider {
    pub fn from_config(auth: &AuthConfig) -> Self {
        Self {
            env: auth
                .token_env
                .as_ref()
                .filter(|var| !var.is_empty())
                .map(|var| EnvTokenProvider { var: var.clone() }),
            command: CommandTokenProvider::from_argv(&auth.token_command),
        }
    }
}

impl TokenProvider for ConfiguredTokenProvider {
    async fn fetch_token(&self) -> Result<String, String> {
        let mut failures = Vec::new();

        if let Some(env) = &self.env {
            match env.fetch_token().await {
                Ok(token) => return Ok(token),
                Err(e) => failures.push(e),
            }
        }
        if let Some(command) = &self.command {
            match command.fetch_token().await {
                Ok(token) => return Ok(token),
                Err(e) => failures.push(e),
            }
        }

        if failures.is_empty() {
            Err("No token source configured".to_string())
        } else {
            Err(failures.join("; "))
        }
    }
}

/// Body of a `spreadsheets.values.get` response; only `values` matters.
#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

/// Thin client for the Sheets values endpoint.
pub struct SheetsClient {
    client: reqwest::Client,
    api_base: String,
    spreadsheet_id: String,
    range: String,
}

impl SheetsClient {
    pub fn new(http: &HttpConfig, sheets: &SheetsConfig) -> Result<Self, ReferenceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(http.request_timeout_secs))
            .user_agent(http.user_agent.clone())
            .build()
            .map_err(|e| ReferenceError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_base: sheets.api_base.clone(),
            spreadsheet_id: sheets.spreadsheet_id.clone(),
            range: sheets.range.clone(),
        })
    }

    /// `{api_base}/v4/spreadsheets/{id}/values/{range}`, with the range encoded as one segment.
    pub fn values_url(&self) -> Result<Url, ReferenceError> {
        let mut url = Url::parse(&self.api_base)
            .map_err(|e| ReferenceError::Network(format!("Invalid Sheets API base '{}': {}", self.api_base, e)))?;
        url.path_segments_mut()
            .map_err(|_| ReferenceError::Network(format!("Sheets API base cannot hold a path: {}", self.api_base)))?
            .pop_if_empty()
            .extend(["v4", "spreadsheets", self.spreadsheet_id.as_str(), "values", self.range.as_str()]);
        Ok(url)
    }

    /// Fetch every string cell of the configured range, row by row.
    pub async fn fetch_cells(&self, token: &str) -> Result<Vec<String>, ReferenceError> {
        let url = self.values_url()?;
        debug!("Fetching reference range from {}", url);

        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| ReferenceError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ReferenceError::Network(e.to_string()))?;

        if !status.is_success() {
            return Err(ReferenceError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ValueRange =
            serde_json::from_str(&body).map_err(|e| ReferenceError::Parse(e.to_string()))?;

        Ok(parsed
            .values
            .into_iter()
            .flatten()
            .filter_map(|cell| cell.as_str().map(str::to_string))
            .collect())
    }
}

/// Expected domains for one run.
#[derive(Debug, Clone)]
pub struct ReferenceList {
    pub domains: Vec<DomainKey>,
    pub used_fallback: bool,
    /// Why the spreadsheet was not used, when it wasn't
    pub fallback_reason: Option<String>,
}

impl ReferenceList {
    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }
}

pub struct ReferenceProvider<T: TokenProvider> {
    tokens: T,
    sheets: SheetsClient,
    auth_timeout: Duration,
    fallback: Vec<String>,
}

impl ReferenceProvider<ConfiguredTokenProvider> {
    pub fn from_config(config: &AppConfig) -> Result<Self, ReferenceError> {
        let sheets = SheetsClient::new(&config.http, &config.sheets)?;
        Ok(Self::new(
            ConfiguredTokenProvider::from_config(&config.auth),
            sheets,
            config.auth.timeout(),
            config.reference.fallback_domains.clone(),
        ))
    }
}

impl<T: TokenProvider> ReferenceProvider<T> {
    /// An empty `fallback` selects [`FALLBACK_DOMAINS`].
    pub fn new(tokens: T, sheets: SheetsClient, auth_timeout: Duration, fallback: Vec<String>) -> Self {
        Self {
            tokens,
            sheets,
            auth_timeout,
            fallback,
        }
    }

    async fn token(&self) -> Result<String, ReferenceError> {
        match tokio::time::timeout(self.auth_timeout, self.tokens.fetch_token()).await {
            Ok(Ok(token)) => Ok(token),
            Ok(Err(e)) => Err(ReferenceError::Auth(e)),
            Err(_) => Err(ReferenceError::AuthTimeout(self.auth_timeout)),
        }
    }

    /// The spreadsheet path alone, without fallback.
    pub async fn fetch_primary(&self) -> Result<Vec<DomainKey>, ReferenceError> {
        let token = self.token().await?;
        debug!("Got auth token, reading spreadsheet");
        let cells = self.sheets.fetch_cells(&token).await?;
        let domains = domain_utils::domains_from_cells(cells.iter().map(String::as_str));
        info!("Fetched {} domains from spreadsheet ({} cells)", domains.len(), cells.len());
        Ok(domains)
    }

    /// Spreadsheet list, or the fallback list if anything on that path fails.
    pub async fn fetch_reference_list(&self) -> ReferenceList {
        match self.fetch_primary().await {
            Ok(domains) => ReferenceList {
                domains,
                used_fallback: false,
                fallback_reason: None,
            },
            Err(e) => {
                warn!("Failed to fetch domains from spreadsheet: {}", e);
                self.fallback_list(Some(e.to_string()))
            }
        }
    }

    pub fn fallback_list(&self, reason: Option<String>) -> ReferenceList {
        let domains: Vec<DomainKey> = if self.fallback.is_empty() {
            FALLBACK_DOMAINS.iter().map(|d| DomainKey::normalize(d)).collect()
        } else {
            self.fallback.iter().map(|d| DomainKey::normalize(d)).collect()
        };
        info!("Using fallback domain list with {} domains", domains.len());
        ReferenceList {
            domains,
            used_fallback: true,
            fallback_reason: reason,
        }
    }
}
