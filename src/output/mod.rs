//! Output formatting module
//!
//! Renders unit results, run summaries and multi-run aggregates.

mod formatter;

pub use formatter::{write_summary_to_file, ReportFormat, ResultFormatter};
