mod cli;

use anyhow::{bail, Context};
use clap::Parser;
use cli::Cli;
use colored::*;
use fisa_downloader::config::{self, Config, ConfigFile, RawTarget};
use fisa_downloader::types::DownloadOutcome;
use fisa_downloader::{logging, run, DownloaderError, ProgressCallback, RunLayout};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn build_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut raw = RawTarget::default();
    if let Some(name) = &cli.preset {
        match config::preset(name) {
            Some(preset) => raw = preset,
            None => bail!("Unknown preset '{}' (try --list-presets)", name),
        }
    }

    let mut file = match &cli.config {
        Some(path) => ConfigFile::load(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?,
        None => ConfigFile::default(),
    };

    if let Some(delay) = cli.delay_ms {
        file.site.request_delay_ms = delay;
    }
    if let Some(base_url) = &cli.base_url {
        file.site.base_url = base_url.clone();
    }
    if let Some(dir) = &cli.output_dir {
        file.output.dir = dir.clone();
    }

    let target = raw.merge(file.target).merge(cli.target_overrides()).validate()?;
    Ok(Config::new(target, file.site, file.output)?)
}

fn print_presets() {
    println!("{}", "Built-in presets:".bold());
    for (name, raw) in config::presets() {
        println!(
            "  {:<32} {} {} {} [{}]",
            name.green(),
            raw.program_name.unwrap_or_default(),
            raw.study_years.unwrap_or_default(),
            raw.target_year.unwrap_or_default(),
            raw.language.unwrap_or_default()
        );
    }
}

fn progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} subjects")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.list_presets {
        print_presets();
        return Ok(());
    }

    let log_file = logging::init();
    let config = build_config(&cli).context("Configuration error")?;

    let layout = RunLayout::prepare(&config.output.dir, &config.target.run_key())
        .await
        .context("Failed to prepare output directory")?;

    if !log_file.attach(&layout.log_file()) {
        warn!("Logging to file is unavailable for this run");
    }
    info!("Run folder: {}", layout.root.display());

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Ctrl-C received, stopping after the current subject");
                cancel.cancel();
            }
        });
    }

    let pb = progress_bar();
    let progress: ProgressCallback = {
        let pb = pb.clone();
        Arc::new(move |current: usize, total: usize| {
            pb.set_length(total as u64);
            pb.set_position(current.saturating_sub(1) as u64);
        })
    };

    let result = run(&config, &layout, &cancel, Some(progress)).await;
    pb.finish_and_clear();

    match result {
        Ok(summary) => {
            println!("\n{}", "Download Summary:".bold());
            println!("Target: {}", config.target);
            println!(
                "Downloaded: {}/{} PDFs ({})",
                summary.successful().to_string().green(),
                summary.total,
                format!("{} failed", summary.failed()).red()
            );
            println!("Total data transferred: {:.2} MB", summary.bytes() as f64 / 1_048_576.0);
            println!("Total duration: {:.2?}", summary.total_duration);

            if summary.successful() > 0 {
                println!("\n{}", "Saved:".green().bold());
                for report in &summary.reports {
                    if let DownloadOutcome::Saved { path, bytes } = &report.outcome {
                        println!("✓ {} ({} KB)", path.display().to_string().green(), bytes / 1024);
                    }
                }
            }

            if summary.failed() > 0 {
                println!("\n{}", "Failed:".red().bold());
                for report in summary.reports.iter().filter(|r| !r.outcome.is_success()) {
                    println!(
                        "✗ {} - {}",
                        report.subject.name.red(),
                        report.outcome.error().unwrap_or_default()
                    );
                }
            }

            if summary.cancelled {
                println!(
                    "\n{}",
                    format!(
                        "Cancelled: {} of {} subjects were not attempted",
                        summary.total - summary.reports.len(),
                        summary.total
                    )
                    .yellow()
                );
            }

            println!("\nAll files saved to: {}", layout.root.display());

            if summary.failed() > 0 {
                error!("{} downloads failed", summary.failed());
                bail!("Some downloads failed");
            }
            Ok(())
        }
        Err(e) => {
            error!("Run failed: {}", e);
            let headline = match &e {
                DownloaderError::Navigation(_) => "Navigation failed",
                DownloaderError::ExtractionEmpty { .. } => "No obligatory subjects found",
                DownloaderError::Config { .. } => "Configuration error",
                _ => "Run failed",
            };
            eprintln!("Saved pages for inspection: {}", layout.snapshots.display());
            Err(anyhow::Error::new(e).context(headline.red().to_string()))
        }
    }
}
