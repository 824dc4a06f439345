//! Error types for the ledger pipeline.
//!
//! - [`ChartError`] - Chart of accounts loading errors
//! - [`ExportError`] - Artifact serialization errors
//! - [`StoreError`] - Artifact store errors
//! - [`PipelineError`] - Top-level errors that abort a run
//! - [`ServerError`] - HTTP layer errors
//!
//! Row-level problems are not errors: they become
//! [`RejectedRow`](crate::transform::clean::RejectedRow) values and are
//! reported alongside the output. Undefined ratios are values too.

use rust_decimal::Decimal;
use std::path::PathBuf;
use thiserror::Error;

pub use crate::parser::CsvError;

// =============================================================================
// Chart of Accounts Errors
// =============================================================================

/// Errors while loading a chart of accounts.
#[derive(Debug, Error)]
pub enum ChartError {
    /// Configured chart file does not exist.
    #[error("Chart of accounts not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Chart defines no accounts and no prefix rules.
    #[error("Chart of accounts is empty")]
    Empty,

    /// An entry of the chart is malformed.
    #[error("Invalid chart entry '{code}': {message}")]
    InvalidEntry { code: String, message: String },

    #[error("Chart IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Chart JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// Export Errors
// =============================================================================

/// Errors while serializing an artifact.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Export IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Export CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Export JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// Store Errors
// =============================================================================

/// Errors from the on-disk artifact store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Job id is not a valid identifier.
    #[error("Invalid job id: {0}")]
    InvalidJobId(String),

    /// Job directory does not exist.
    #[error("Job not found: {0}")]
    JobNotFound(String),

    /// Artifact name is unknown or was not produced for the job.
    #[error("Artifact not found: {0}")]
    ArtifactNotFound(String),

    #[error("Store export error: {0}")]
    Export(#[from] ExportError),

    #[error("Store IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Structural errors that abort a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Spreadsheet could not be read.
    #[error("Spreadsheet error: {0}")]
    Csv(#[from] CsvError),

    /// Required columns are absent; nothing was processed.
    #[error("Schema mismatch: missing required column(s) {} (found: {})", .missing.join(", "), .found.join(", "))]
    SchemaMismatch { missing: Vec<String>, found: Vec<String> },

    /// Nothing to process: no rows uploaded or none survived cleaning.
    #[error("Empty input: no ledger entries left after cleaning ({rejected} row(s) rejected)")]
    EmptyInput { rejected: usize },

    #[error("Chart of accounts error: {0}")]
    Chart(#[from] ChartError),

    /// Line items do not add up to the entries they were built from.
    #[error("Reconciliation failed for {measure}: entries total {expected}, line items total {actual}")]
    Reconciliation {
        measure: &'static str,
        expected: Decimal,
        actual: Decimal,
    },

    #[error("Export error: {0}")]
    Export(#[from] ExportError),
}

impl PipelineError {
    /// Errors caused by the uploaded data rather than by the service.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::Csv(_) | Self::SchemaMismatch { .. } | Self::EmptyInput { .. } | Self::Chart(_)
        )
    }
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Invalid request.
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Server internal error.
    #[error("Internal server error: {0}")]
    Internal(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

pub type ChartResult<T> = Result<T, ChartError>;

pub type ExportResult<T> = Result<T, ExportError>;

pub type StoreResult<T> = Result<T, StoreError>;

pub type PipelineResult<T> = Result<T, PipelineError>;

pub type ServerResult<T> = Result<T, ServerError>;
