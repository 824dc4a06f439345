//! REST API types for frontend integration.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::store::JobManifest;
use crate::transform::{LedgerReport, RejectedRow};

/// Rejected rows included inline in the upload response.
const REJECTED_PREVIEW: usize = 20;

/// Response sent to frontend after a ledger upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    /// Unique job identifier
    pub job_id: String,

    /// Status: "ready", or "warning" when rows were rejected, accounts are
    /// unclassified or the balance sheet does not balance
    pub status: String,

    pub metadata: ResponseMetadata,

    /// First rejected rows; the full list is the `rejected_rows` artifact
    pub rejected: Vec<RejectedRowView>,

    pub artifacts: Vec<ArtifactLink>,

    /// Dashboard data endpoint
    pub charts_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetadata {
    pub csv_info: CsvMetadata,
    pub chart_name: String,
    pub granularity: String,
    pub periods: Vec<String>,
    pub entry_count: usize,
    pub rejected_count: usize,
    pub blank_rows: usize,
    pub unclassified_accounts: Vec<String>,
    pub balanced: bool,
}

/// Uploaded file metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CsvMetadata {
    pub encoding: String,
    pub delimiter: Option<String>,
    pub row_count: usize,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectedRowView {
    pub line: u64,
    pub account: String,
    pub code: String,
    pub reason: String,
}

impl From<&RejectedRow> for RejectedRowView {
    fn from(row: &RejectedRow) -> Self {
        Self {
            line: row.line,
            account: row.account.clone(),
            code: row.reason.code().to_string(),
            reason: row.reason.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactLink {
    pub name: String,
    pub title: String,
    pub rows: usize,
    pub url: String,
}

impl UploadResponse {
    pub fn new(report: &LedgerReport, manifest: &JobManifest) -> Self {
        let warning = !report.rejected.is_empty()
            || !report.unclassified_accounts.is_empty()
            || !manifest.balanced;

        Self {
            job_id: manifest.job_id.clone(),
            status: if warning { "warning" } else { "ready" }.to_string(),
            metadata: ResponseMetadata {
                csv_info: CsvMetadata {
                    encoding: report.source.encoding.clone(),
                    delimiter: report.source.delimiter.map(|d| d.to_string()),
                    row_count: report.source.row_count,
                    columns: report.source.headers.clone(),
                },
                chart_name: manifest.chart_name.clone(),
                granularity: manifest.granularity.to_string(),
                periods: manifest.periods.clone(),
                entry_count: manifest.entry_count,
                rejected_count: manifest.rejected_count,
                blank_rows: manifest.blank_rows,
                unclassified_accounts: manifest.unclassified_accounts.clone(),
                balanced: manifest.balanced,
            },
            rejected: report
                .rejected
                .iter()
                .take(REJECTED_PREVIEW)
                .map(RejectedRowView::from)
                .collect(),
            artifacts: manifest
                .artifacts
                .iter()
                .map(|a| ArtifactLink {
                    name: a.name.clone(),
                    title: a.title.clone(),
                    rows: a.rows,
                    url: format!("/api/jobs/{}/artifacts/{}", manifest.job_id, a.name),
                })
                .collect(),
            charts_url: format!("/api/jobs/{}/charts", manifest.job_id),
        }
    }
}

/// Create an error response body
pub fn error_response(kind: &str, error: &str) -> Value {
    json!({
        "status": "error",
        "kind": kind,
        "error": error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::ChartOfAccounts;
    use crate::export::CsvTableWriter;
    use crate::store::ArtifactStore;
    use crate::transform::pipeline::{run_bytes, PipelineOptions};

    #[test]
    fn test_upload_response_links_and_status() {
        let sheet = "Date;Account;Label;Debit;Credit\n\
                     2023-01-10;1020;Sale;200;\n\
                     2023-01-10;3200;Sale;;200\n\
                     2023-01-11;;No account;5;\n";
        let report =
            run_bytes(sheet.as_bytes(), &ChartOfAccounts::swiss_sme(), &PipelineOptions::default()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let manifest = ArtifactStore::with_dir(dir.path())
            .save_report(&report, &CsvTableWriter::default(), None)
            .unwrap();

        let response = UploadResponse::new(&report, &manifest);

        assert_eq!(response.status, "warning");
        assert_eq!(response.rejected.len(), 1);
        assert_eq!(response.rejected[0].code, "missing_account_code");
        assert_eq!(response.artifacts.len(), 10);
        assert!(response.artifacts[0].url.ends_with("/artifacts/cleaned_ledger"));
        assert_eq!(response.charts_url, format!("/api/jobs/{}/charts", manifest.job_id));

        let json = serde_json::to_value(&response).unwrap();
        assert!(json["metadata"]["csvInfo"]["columns"].is_array());
    }

    #[test]
    fn test_error_response_shape() {
        let body = error_response("schema_mismatch", "missing Debit");
        assert_eq!(body["status"], "error");
        assert_eq!(body["kind"], "schema_mismatch");
    }
}
