//! File report observer

use std::io;
use std::path::{Path, PathBuf};
use tracing::info;

use super::{ObserverError, ResultObserver, RunEvent};
use crate::output::{write_summary_to_file, ReportFormat};

/// Writes each completed batch to a report file
///
/// With `per_run` set, the run number is appended to the file stem so every
/// run keeps its own report; otherwise the file is overwritten.
pub struct ReportObserver {
    path: PathBuf,
    format: ReportFormat,
    per_run: bool,
}

impl ReportObserver {
    pub fn new(path: impl Into<PathBuf>, format: ReportFormat) -> Self {
        Self {
            path: path.into(),
            format,
            per_run: false,
        }
    }

    pub fn per_run(mut self) -> Self {
        self.per_run = true;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn report_path(&self, run: u32) -> PathBuf {
        if !self.per_run {
            return self.path.clone();
        }
        let stem = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "report".to_string());
        let file_name = match self.path.extension() {
            Some(ext) => format!("{stem}-run{run}.{}", ext.to_string_lossy()),
            None => format!("{stem}-run{run}.{}", self.format.extension()),
        };
        self.path.with_file_name(file_name)
    }
}

impl ResultObserver for ReportObserver {
    fn name(&self) -> &str {
        "report"
    }

    fn notify(&self, event: &RunEvent<'_>) -> Result<(), ObserverError> {
        let RunEvent::BatchCompleted(summary) = event else {
            return Ok(());
        };

        let path = self.report_path(summary.run);
        write_summary_to_file(&path, summary, self.format).map_err(|e| {
            match e.root_cause().downcast_ref::<io::Error>() {
                Some(cause) => ObserverError::Io(io::Error::new(cause.kind(), format!("{e:#}"))),
                None => ObserverError::Serialize(format!("{e:#}")),
            }
        })?;

        info!("Report written to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RunSummary;

    #[test]
    fn test_report_written_on_batch_completed() {
        let dir = tempfile::tempdir().unwrap();
        let observer = ReportObserver::new(dir.path().join("out/report.json"), ReportFormat::Json);

        let summary = RunSummary::new(3, "local", 0, Vec::new());
        observer.notify(&RunEvent::BatchCompleted(&summary)).unwrap();

        let content = std::fs::read_to_string(observer.path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(value["run"], 3);
        assert_eq!(value["total"], 0);
    }

    #[test]
    fn test_unwritable_report_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();
        let observer = ReportObserver::new(blocker.join("report.json"), ReportFormat::Json);

        let summary = RunSummary::new(1, "local", 0, Vec::new());
        let err = observer
            .notify(&RunEvent::BatchCompleted(&summary))
            .unwrap_err();
        assert!(matches!(err, ObserverError::Io(_)));
    }

    #[test]
    fn test_per_run_report_paths() {
        let observer = ReportObserver::new("reports/results.csv", ReportFormat::Csv).per_run();
        assert_eq!(
            observer.report_path(2),
            PathBuf::from("reports/results-run2.csv")
        );

        let observer = ReportObserver::new("reports/results", ReportFormat::Json).per_run();
        assert_eq!(
            observer.report_path(1),
            PathBuf::from("reports/results-run1.json")
        );
    }

    #[test]
    fn test_unit_events_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let observer = ReportObserver::new(dir.path().join("report.txt"), ReportFormat::Table);
        let unit = crate::unit::TestUnit::new("A", || Ok(()));

        observer.notify(&RunEvent::UnitCompleted(&unit)).unwrap();
        assert!(!observer.path().exists());
    }
}
