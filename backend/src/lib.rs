//! # LedgerFlow - General-ledger exports to financial statements
//!
//! LedgerFlow reads a general-ledger export (CSV in any common encoding and
//! delimiter, or an Excel workbook), cleans and classifies its entries against a chart of
//! accounts, and produces balance sheets, income statements, financial
//! ratios and summaries per period.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────┐   ┌──────────┐   ┌───────────┐   ┌────────────┐   ┌──────────┐
//! │ Ledger CSV  │──▶│  Parser  │──▶│  Clean   │──▶│ Classify  │──▶│ Aggregate  │──▶│ Export   │
//! │ (ISO/UTF8)  │   │(auto-enc)│   │(rejects) │   │ (chart)   │   │ statements │   │ (tables) │
//! └─────────────┘   └──────────┘   └──────────┘   └───────────┘   │  ratios    │   └──────────┘
//!                                                                 └────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ledgerflow::{run_file, ChartOfAccounts, PipelineOptions};
//!
//! let report = run_file("ledger.csv", &ChartOfAccounts::swiss_sme(), &PipelineOptions::default())?;
//! println!("Net income: {:?}", report.statements.net_income());
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Domain models (entries, periods, categories, ratios)
//! - [`parser`] - CSV and workbook parsing with auto-detection and column mapping
//! - [`chart`] - Chart of accounts
//! - [`transform`] - Cleaning, classification, aggregation and the pipeline
//! - [`export`] - Tabular artifacts and dashboard data
//! - [`store`] - On-disk results store
//! - [`config`] - Environment configuration
//! - [`api`] - HTTP API server

// Core modules
pub mod error;
pub mod models;
pub mod config;

// Parsing
pub mod parser;

// Classification
pub mod chart;

// Transformation
pub mod transform;

// Output
pub mod export;
pub mod store;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ChartError,
    ExportError,
    PipelineError,
    ServerError,
    StoreError,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    Category,
    ClassifiedEntry,
    CleanEntry,
    Granularity,
    Period,
    RawEntry,
    Ratio,
    RatioValue,
    StatementLineItem,
    SummaryCategory,
    Undefined,
};

// =============================================================================
// Re-exports - CSV Parsing
// =============================================================================

pub use parser::{
    parse_str,
    parse_file_auto,
    parse_bytes_auto,
    detect_encoding,
    detect_delimiter,
    decode_content,
    ColumnMap,
    CsvError,
    ParseResult,
};

// =============================================================================
// Re-exports - Chart of accounts
// =============================================================================

pub use chart::{ChartFile, ChartOfAccounts, DEFAULT_CHART_NAME};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use transform::pipeline::{
    clean_file,
    run_bytes,
    run_entries,
    run_file,
    run_parsed,
    LedgerReport,
    PipelineOptions,
    SourceInfo,
};

// =============================================================================
// Re-exports - Export and store
// =============================================================================

pub use export::{shape, shape_all, Artifact, CsvTableWriter, Table, TableWriter};
pub use store::{ArtifactStore, JobManifest};
pub use config::AppConfig;

// =============================================================================
// Re-exports - API
// =============================================================================

pub use api::types::{
    UploadResponse,
    ResponseMetadata,
    CsvMetadata,
    error_response,
};

// Server
pub mod server {
    pub use crate::api::server::start_server;
}
