//! Transformation module.
//!
//! The ledger pipeline, one stage per module:
//! - Clean: typed, validated entries and rejected rows
//! - Classify: categories from the chart of accounts
//! - Aggregate: statement line items with reconciliation
//! - Statements: balance sheet and income statement
//! - Ratios: financial ratios per period
//! - Summary: category and account summaries
//! - Pipeline: runs every stage in order

pub mod aggregate;
pub mod classify;
pub mod clean;
pub mod pipeline;
pub mod ratios;
pub mod statements;
pub mod summary;

pub use aggregate::{aggregate, Aggregation, Reconciliation};
pub use classify::{classify, Classification};
pub use clean::{clean, CleanOutput, RejectReason, RejectedRow};
pub use pipeline::*;
pub use ratios::{compute_ratios, RATIOS};
pub use statements::{build_statements, BalanceCheck, StatementRow, Statements};
pub use summary::{AccountExtract, AccountPeriodTotal, AccountSummary};
