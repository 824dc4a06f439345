//! Runtime configuration from environment variables (`.env` is loaded by the
//! binary). Command-line flags override these values.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::chart::ChartOfAccounts;
use crate::error::ChartResult;
use crate::export::CsvTableWriter;
use crate::models::Granularity;
use crate::store::{ArtifactStore, DEFAULT_RESULTS_DIR};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Upload size limit in MiB
    pub max_upload_mb: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub results_dir: PathBuf,
    /// Chart of accounts JSON file; the built-in chart when unset
    pub chart_path: Option<PathBuf>,
    pub granularity: Granularity,
    pub export_delimiter: u8,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
                max_upload_mb: 16,
            },
            results_dir: PathBuf::from(DEFAULT_RESULTS_DIR),
            chart_path: None,
            granularity: Granularity::default(),
            export_delimiter: b';',
        }
    }
}

impl AppConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`. Unset variables keep their
    /// default; unparseable ones are reported and ignored.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let port = get("LEDGERFLOW_PORT")
            .or_else(|| get("PORT"))
            .and_then(|v| parse_or_warn("LEDGERFLOW_PORT", &v, |s| s.parse::<u16>().ok()))
            .unwrap_or(defaults.server.port);

        let max_upload_mb = get("LEDGERFLOW_MAX_UPLOAD_MB")
            .and_then(|v| {
                parse_or_warn("LEDGERFLOW_MAX_UPLOAD_MB", &v, |s| {
                    s.parse::<usize>().ok().filter(|mb| *mb > 0)
                })
            })
            .unwrap_or(defaults.server.max_upload_mb);

        let granularity = get("LEDGERFLOW_GRANULARITY")
            .and_then(|v| parse_or_warn("LEDGERFLOW_GRANULARITY", &v, |s| s.parse::<Granularity>().ok()))
            .unwrap_or(defaults.granularity);

        let export_delimiter = get("LEDGERFLOW_EXPORT_DELIMITER")
            .and_then(|v| parse_or_warn("LEDGERFLOW_EXPORT_DELIMITER", &v, parse_delimiter))
            .unwrap_or(defaults.export_delimiter);

        Self {
            server: ServerConfig {
                host: get("LEDGERFLOW_HOST").unwrap_or(defaults.server.host),
                port,
                max_upload_mb,
            },
            results_dir: get("LEDGERFLOW_RESULTS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.results_dir),
            chart_path: get("LEDGERFLOW_CHART").map(PathBuf::from),
            granularity,
            export_delimiter,
        }
    }

    /// The configured chart, or the built-in one.
    pub fn load_chart(&self) -> ChartResult<ChartOfAccounts> {
        match &self.chart_path {
            Some(path) => ChartOfAccounts::load(path),
            None => Ok(ChartOfAccounts::swiss_sme()),
        }
    }

    pub fn store(&self) -> ArtifactStore {
        ArtifactStore::with_dir(&self.results_dir)
    }

    pub fn writer(&self) -> CsvTableWriter {
        CsvTableWriter {
            delimiter: self.export_delimiter,
        }
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.server.max_upload_mb.saturating_mul(1024 * 1024)
    }
}

/// Parse an export delimiter: a single ASCII character, or `tab`.
pub fn parse_delimiter(value: &str) -> Option<u8> {
    match value {
        "tab" | "\\t" | "\t" => Some(b'\t'),
        v if v.len() == 1 && v.is_ascii() => Some(v.as_bytes()[0]),
        _ => None,
    }
}

fn parse_or_warn<T>(key: &str, value: &str, parse: impl Fn(&str) -> Option<T>) -> Option<T> {
    let parsed = parse(value);
    if parsed.is_none() {
        tracing::warn!(key, value, "ignoring invalid configuration value");
    }
    parsed
}
