//! Artifact store - one directory per pipeline run.
//!
//! ```text
//! <results dir>/
//!   <job id>/
//!     job.json            manifest
//!     charts.json         dashboard data
//!     cleaned_ledger.csv  one file per artifact
//!     ...
//! ```
//!
//! Job ids are UUID v4 strings and are validated before touching the
//! filesystem.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::export::{chart_data, shape_all, ChartData, TableWriter};
use crate::models::Granularity;
use crate::transform::LedgerReport;

/// Default results directory (relative to current dir)
pub const DEFAULT_RESULTS_DIR: &str = ".ledgerflow/results";

const MANIFEST_FILE: &str = "job.json";
const CHARTS_FILE: &str = "charts.json";

/// One stored artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactInfo {
    /// Artifact slug, e.g. `balance_sheet`
    pub name: String,
    pub title: String,
    pub file: String,
    pub content_type: String,
    pub rows: usize,
}

/// Description of a stored run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobManifest {
    pub job_id: String,
    pub created_at: String,
    pub source_name: Option<String>,
    pub chart_name: String,
    pub granularity: Granularity,
    pub periods: Vec<String>,
    pub entry_count: usize,
    pub rejected_count: usize,
    pub blank_rows: usize,
    pub unclassified_accounts: Vec<String>,
    pub balanced: bool,
    pub artifacts: Vec<ArtifactInfo>,
}

impl JobManifest {
    pub fn artifact(&self, name: &str) -> Option<&ArtifactInfo> {
        self.artifacts.iter().find(|a| a.name == name)
    }
}

/// On-disk store of pipeline results
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Store in the default directory
    pub fn new() -> Self {
        Self::with_dir(DEFAULT_RESULTS_DIR)
    }

    pub fn with_dir(dir: impl AsRef<Path>) -> Self {
        Self {
            root: dir.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of a job, after validating its id.
    fn job_dir(&self, job_id: &str) -> StoreResult<PathBuf> {
        let id = Uuid::parse_str(job_id).map_err(|_| StoreError::InvalidJobId(job_id.to_string()))?;
        Ok(self.root.join(id.hyphenated().to_string()))
    }

    fn existing_job_dir(&self, job_id: &str) -> StoreResult<PathBuf> {
        let dir = self.job_dir(job_id)?;
        if dir.is_dir() {
            Ok(dir)
        } else {
            Err(StoreError::JobNotFound(job_id.to_string()))
        }
    }

    /// Write every artifact of `report` under a new job id.
    ///
    /// On failure the partly written job directory is removed, so a job
    /// either has all its files or does not exist.
    pub fn save_report(
        &self,
        report: &LedgerReport,
        writer: &dyn TableWriter,
        source_name: Option<&str>,
    ) -> StoreResult<JobManifest> {
        let job_id = Uuid::new_v4().to_string();
        let dir = self.job_dir(&job_id)?;
        fs::create_dir_all(&dir)?;

        let result = write_job(&dir, job_id, report, writer, source_name);
        if let Err(e) = &result {
            tracing::warn!(dir = %dir.display(), error = %e, "job not saved, removing its directory");
            if let Err(cleanup) = fs::remove_dir_all(&dir) {
                tracing::warn!(dir = %dir.display(), error = %cleanup, "could not remove job directory");
            }
        }
        result
    }

    pub fn load_manifest(&self, job_id: &str) -> StoreResult<JobManifest> {
        let dir = self.existing_job_dir(job_id)?;
        let content = fs::read_to_string(dir.join(MANIFEST_FILE))?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn load_charts(&self, job_id: &str) -> StoreResult<ChartData> {
        let dir = self.existing_job_dir(job_id)?;
        let content = fs::read_to_string(dir.join(CHARTS_FILE))?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Path and manifest entry of one artifact of a job.
    pub fn artifact_path(&self, job_id: &str, name: &str) -> StoreResult<(PathBuf, ArtifactInfo)> {
        let manifest = self.load_manifest(job_id)?;
        let stem = name.split_once('.').map_or(name, |(stem, _)| stem);
        let info = manifest
            .artifact(stem)
            .cloned()
            .ok_or_else(|| StoreError::ArtifactNotFound(name.to_string()))?;
        let path = self.job_dir(job_id)?.join(&info.file);
        Ok((path, info))
    }

    /// Every stored job, newest first. Unreadable entries are skipped.
    pub fn list(&self) -> StoreResult<Vec<JobManifest>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let mut jobs = Vec::new();
        for entry in fs::read_dir(&self.root)?.flatten() {
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if let Ok(manifest) = self.load_manifest(&name) {
                jobs.push(manifest);
            }
        }

        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(jobs)
    }

    /// Remove a job and all its artifacts
    pub fn delete(&self, job_id: &str) -> StoreResult<()> {
        let dir = self.existing_job_dir(job_id)?;
        fs::remove_dir_all(dir)?;
        Ok(())
    }
}

impl Default for ArtifactStore {
    fn default() -> Self {
        Self::new()
    }
}

fn write_job(
    dir: &Path,
    job_id: String,
    report: &LedgerReport,
    writer: &dyn TableWriter,
    source_name: Option<&str>,
) -> StoreResult<JobManifest> {
    let mut artifacts = Vec::new();
    for (artifact, table) in shape_all(report) {
        let file = format!("{}.{}", artifact.slug(), writer.extension());
        writer.write_file(&table, &dir.join(&file))?;
        artifacts.push(ArtifactInfo {
            name: artifact.slug().to_string(),
            title: artifact.title().to_string(),
            file,
            content_type: writer.content_type().to_string(),
            rows: table.rows.len(),
        });
    }

    let charts = serde_json::to_string_pretty(&chart_data(report))?;
    fs::write(dir.join(CHARTS_FILE), charts)?;

    let manifest = JobManifest {
        job_id,
        created_at: chrono::Utc::now().to_rfc3339(),
        source_name: source_name.map(str::to_string),
        chart_name: report.chart_name.clone(),
        granularity: report.granularity,
        periods: report.periods().iter().map(|p| p.to_string()).collect(),
        entry_count: report.entries.len(),
        rejected_count: report.rejected.len(),
        blank_rows: report.blank_rows,
        unclassified_accounts: report.unclassified_accounts.iter().cloned().collect(),
        balanced: report.statements.is_balanced(),
        artifacts,
    };
    fs::write(dir.join(MANIFEST_FILE), serde_json::to_string_pretty(&manifest)?)?;

    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::ChartOfAccounts;
    use crate::export::CsvTableWriter;
    use crate::transform::pipeline::{run_bytes, PipelineOptions};
    use tempfile::tempdir;

    fn report() -> LedgerReport {
        let sheet = "Date;Account;Label;Debit;Credit\n\
                     2023-01-10;1020;Sale;200;\n\
                     2023-01-10;3200;Sale;;200\n";
        run_bytes(sheet.as_bytes(), &ChartOfAccounts::swiss_sme(), &PipelineOptions::default()).unwrap()
    }

    #[test]
    fn test_save_and_load_job() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::with_dir(dir.path());

        let manifest = store
            .save_report(&report(), &CsvTableWriter::default(), Some("ledger.csv"))
            .unwrap();

        assert_eq!(manifest.artifacts.len(), 10);
        assert_eq!(manifest.periods, vec!["2023"]);
        assert_eq!(manifest.entry_count, 2);

        let loaded = store.load_manifest(&manifest.job_id).unwrap();
        assert_eq!(loaded, manifest);

        let (path, info) = store.artifact_path(&manifest.job_id, "ratios.csv").unwrap();
        assert_eq!(info.name, "ratios");
        assert!(path.exists());

        let charts = store.load_charts(&manifest.job_id).unwrap();
        assert_eq!(charts.periods, vec!["2023"]);
    }

    #[test]
    fn test_invalid_and_unknown_ids() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::with_dir(dir.path());

        assert!(matches!(
            store.load_manifest("../etc"),
            Err(StoreError::InvalidJobId(_))
        ));
        assert!(matches!(
            store.load_manifest(&Uuid::new_v4().to_string()),
            Err(StoreError::JobNotFound(_))
        ));
    }

    #[test]
    fn test_unknown_artifact() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::with_dir(dir.path());
        let manifest = store
            .save_report(&report(), &CsvTableWriter::default(), None)
            .unwrap();

        assert!(matches!(
            store.artifact_path(&manifest.job_id, "secrets"),
            Err(StoreError::ArtifactNotFound(_))
        ));
    }

    #[test]
    fn test_list_and_delete() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::with_dir(dir.path());
        assert!(store.list().unwrap().is_empty());

        let first = store.save_report(&report(), &CsvTableWriter::default(), None).unwrap();
        store.save_report(&report(), &CsvTableWriter::default(), None).unwrap();
        fs::create_dir_all(dir.path().join("not-a-job")).unwrap();

        assert_eq!(store.list().unwrap().len(), 2);

        store.delete(&first.job_id).unwrap();
        assert_eq!(store.list().unwrap().len(), 1);
        assert!(matches!(store.delete(&first.job_id), Err(StoreError::JobNotFound(_))));
    }

    /// Writes the first artifact, then fails.
    struct FailingWriter {
        written: std::cell::Cell<usize>,
    }

    impl TableWriter for FailingWriter {
        fn extension(&self) -> &'static str {
            "csv"
        }

        fn content_type(&self) -> &'static str {
            "text/csv"
        }

        fn write(&self, table: &crate::export::Table, out: &mut dyn std::io::Write) -> crate::error::ExportResult<()> {
            if self.written.get() > 0 {
                return Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full").into());
            }
            self.written.set(1);
            CsvTableWriter::default().write(table, out)
        }
    }

    #[test]
    fn test_failed_save_leaves_no_job() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::with_dir(dir.path());
        let writer = FailingWriter {
            written: std::cell::Cell::new(0),
        };

        let err = store.save_report(&report(), &writer, None).unwrap_err();
        assert!(matches!(err, StoreError::Export(_)));
        assert!(store.list().unwrap().is_empty());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
