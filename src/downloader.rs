use crate::error::{DownloaderError, NavigationError};
use crate::navigator::{Session, STEP_SUBJECTS};
use crate::output::{unique_path, RunLayout};
use crate::text::sanitize_filename;
use crate::types::{
    DownloadOutcome, DownloadReport, DownloadSummary, FormState, Page, ProgressCallback, SubjectRecord,
};
use log::{error, info, warn};
use reqwest::StatusCode;
use scraper::Html;
use std::time::{Duration, Instant};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

pub const PDF_SIGNATURE: &[u8] = b"%PDF";

pub fn is_pdf(body: &[u8]) -> bool {
    body.starts_with(PDF_SIGNATURE)
}

async fn write_and_close(file: &mut File, body: &[u8]) -> std::io::Result<()> {
    file.write_all(body).await?;
    file.flush().await?;
    file.sync_all().await
}

pub struct Downloader<'a> {
    session: &'a Session,
    layout: &'a RunLayout,
    delay: Duration,
    progress: Option<ProgressCallback>,
}

impl<'a> Downloader<'a> {
    pub fn new(session: &'a Session, layout: &'a RunLayout, delay: Duration) -> Self {
        Self {
            session,
            layout,
            delay,
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Downloads every subject in order, one postback at a time, against the
    /// form of `subjects_page`. Stops early once `cancel` fires.
    pub async fn download_all(
        &self,
        subjects: &[SubjectRecord],
        subjects_page: &Page,
        cancel: &CancellationToken,
    ) -> Result<DownloadSummary, DownloaderError> {
        let form = self
            .session
            .form_state(&Html::parse_document(&subjects_page.body))
            .ok_or(NavigationError::NoForm { step: STEP_SUBJECTS })?;

        let start_time = Instant::now();
        let total = subjects.len();
        let mut reports = Vec::with_capacity(total);
        let mut cancelled = false;

        info!("Starting download of {} PDFs", total);

        for (i, subject) in subjects.iter().enumerate() {
            if cancel.is_cancelled() {
                warn!("Download cancelled before {}/{}", i + 1, total);
                cancelled = true;
                break;
            }

            if let Some(progress) = &self.progress {
                progress(i + 1, total);
            }
            info!("Downloading {}/{}: {}", i + 1, total, subject.name);

            let started = Instant::now();
            let outcome = self.download_subject(i + 1, subject, &form).await;
            match &outcome {
                DownloadOutcome::Saved { path, bytes } => {
                    info!("  SUCCESS: saved {} ({} KB)", path.display(), bytes / 1024)
                }
                DownloadOutcome::RejectedNotPdf => {
                    warn!("  Got HTML instead of PDF for {}", subject.name)
                }
                DownloadOutcome::HttpError(status) => error!("  HTTP {} for {}", status, subject.name),
                DownloadOutcome::Exception(message) => {
                    error!("  Error downloading {}: {}", subject.name, message)
                }
            }

            reports.push(DownloadReport {
                subject: subject.clone(),
                outcome,
                duration: started.elapsed(),
            });

            self.pause(cancel).await;
        }

        let summary = DownloadSummary {
            total,
            reports,
            cancelled,
            total_duration: start_time.elapsed(),
        };
        info!(
            "Downloaded {}/{} PDFs ({} failed{})",
            summary.successful(),
            total,
            summary.failed(),
            if cancelled { ", cancelled" } else { "" }
        );
        Ok(summary)
    }

    async fn download_subject(&self, index: usize, subject: &SubjectRecord, form: &FormState) -> DownloadOutcome {
        self.try_download_subject(index, subject, form)
            .await
            .unwrap_or_else(|e| DownloadOutcome::Exception(e.to_string()))
    }

    async fn try_download_subject(
        &self,
        index: usize,
        subject: &SubjectRecord,
        form: &FormState,
    ) -> Result<DownloadOutcome, DownloaderError> {
        let response = self.session.post(&form.with_postback(&subject.postback())).await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Ok(DownloadOutcome::HttpError(status.as_u16()));
        }

        let body = response.bytes().await?;
        if !is_pdf(&body) {
            let name = format!("rejected_{}_{}", index, sanitize_filename(&subject.name));
            self.layout
                .save_snapshot(&name, &String::from_utf8_lossy(&body))
                .await;
            return Ok(DownloadOutcome::RejectedNotPdf);
        }

        let dir = self.layout.semester_dir(subject.semester);
        let path = unique_path(&dir, &sanitize_filename(&subject.name), "pdf").await?;
        // Kept as `.pdf.part` until fully written.
        let partial = path.with_extension("pdf.part");
        let mut file = File::create(&partial).await?;
        if let Err(e) = write_and_close(&mut file, &body).await {
            drop(file);
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(e.into());
        }
        tokio::fs::rename(&partial, &path).await?;

        Ok(DownloadOutcome::Saved {
            path,
            bytes: body.len() as u64,
        })
    }

    /// Fixed politeness delay between subjects; cut short by cancellation.
    async fn pause(&self, cancel: &CancellationToken) {
        if self.delay.is_zero() {
            return;
        }
        tokio::select! {
            _ = sleep(self.delay) => {}
            _ = cancel.cancelled() => {}
        }
    }
}
