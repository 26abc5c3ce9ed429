use crate::error::DownloaderError;
use crate::types::{DownloadOutcome, DownloadSummary};
use std::path::{Path, PathBuf};

pub const REPORT_FILE: &str = "download_report.csv";

/// Writes one CSV row per attempted subject into `run_dir`.
pub fn write_report_csv(summary: &DownloadSummary, run_dir: &Path) -> Result<PathBuf, DownloaderError> {
    std::fs::create_dir_all(run_dir)?;

    let report_path = run_dir.join(REPORT_FILE);
    let mut wtr = csv::WriterBuilder::new().from_path(&report_path)?;

    wtr.write_record([
        "Subject",
        "Semester",
        "Status",
        "Size (KB)",
        "Duration (s)",
        "Path",
        "Error",
    ])?;

    for report in &summary.reports {
        let (size_kb, path) = match &report.outcome {
            DownloadOutcome::Saved { path, bytes } => {
                (format!("{:.1}", *bytes as f64 / 1024.0), path.display().to_string())
            }
            _ => (String::new(), String::new()),
        };

        wtr.write_record([
            report.subject.name.clone(),
            report.subject.semester.dir_name().to_string(),
            report.outcome.label().to_string(),
            size_kb,
            format!("{:.2}", report.duration.as_secs_f64()),
            path,
            report.outcome.error().unwrap_or_default(),
        ])?;
    }

    wtr.flush()?;
    Ok(report_path)
}
