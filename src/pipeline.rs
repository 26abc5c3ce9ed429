use log::{error, info};
use scraper::Html;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::downloader::Downloader;
use crate::error::DownloaderError;
use crate::navigator::Navigator;
use crate::output::RunLayout;
use crate::parser::count_buttons;
use crate::report::write_report_csv;
use crate::subjects::extract_subjects;
use crate::types::{DownloadSummary, ProgressCallback};

/// Navigates to the configured subjects page and downloads every obligatory
/// subject into `layout`.
///
/// Configuration, navigation and empty-extraction failures abort the run;
/// per-subject failures are recorded in the returned summary.
pub async fn run(
    config: &Config,
    layout: &RunLayout,
    cancel: &CancellationToken,
    progress: Option<ProgressCallback>,
) -> Result<DownloadSummary, DownloaderError> {
    info!("Starting run for {}", config.target);
    info!("Output directory: {}", layout.root.display());

    let navigator = Navigator::new(config, Some(layout))?;
    let subjects_page = navigator.navigate().await?;

    let language = config.target.language;
    let subjects = {
        let document = Html::parse_document(&subjects_page.body);
        let subjects = extract_subjects(&document, language);
        if subjects.is_empty() {
            let buttons = count_buttons(&document, language.button_marker());
            error!("No obligatory subjects found; check the saved snapshots in {}", layout.snapshots.display());
            return Err(DownloaderError::ExtractionEmpty { buttons });
        }
        subjects
    };

    let mut downloader = Downloader::new(navigator.session(), layout, config.site.request_delay());
    if let Some(progress) = progress {
        downloader = downloader.with_progress(progress);
    }
    let summary = downloader.download_all(&subjects, &subjects_page, cancel).await?;

    match write_report_csv(&summary, &layout.root) {
        Ok(path) => info!("Report written to {}", path.display()),
        Err(e) => error!("Failed to write download report: {}", e),
    }

    info!("COMPLETED! Downloaded {}/{} PDFs", summary.successful(), summary.total);
    Ok(summary)
}
