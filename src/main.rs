//! Whisub - command line front end
//!
//! Runs transcription jobs through the subtitle service and renders their
//! progress, translates subtitle files, and probes media.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn, Level};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use walkdir::WalkDir;

use whisub::cli::{parse_language_list, Args, Commands};
use whisub::config::Config;
use whisub::jobs::{JobId, JobStatus};
use whisub::translate::{is_known_language, AVAILABLE_LANGUAGES};
use whisub::SubtitleService;

const MEDIA_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv", "wmv", "flv", "webm", "mp3", "wav", "m4a", "flac", "ogg"];
const POLL_INTERVAL: Duration = Duration::from_millis(500);

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            if Path::new("whisub.toml").exists() {
                Config::from_file("whisub.toml")?
            } else {
                Config::default()
            }
        }
    };
    config.apply_env()?;

    setup_logging(args.verbose, &config)?;
    info!("Starting whisub");

    match args.command {
        Commands::Languages => {
            println!("{:<8} {}", "Code", "Language");
            println!("{}", "-".repeat(30));
            for (code, name) in AVAILABLE_LANGUAGES {
                println!("{:<8} {}", code, name);
            }
        }
        Commands::Config { output } => {
            Config::default().save_to_file(&output)?;
            println!("Default configuration written to {}", output.display());
        }
        Commands::Probe { input } => {
            let service = SubtitleService::new(config)?;
            let duration = service.probe_duration(&input).await?;
            println!("{:.3}", duration);
        }
        Commands::Transcribe { input, language, output, target_langs } => {
            let service = SubtitleService::new(config)?;
            service.check_health().await.context("media tool is not available")?;

            let job_id = service.submit(&input, language.as_deref()).await?;
            watch_job(&service, job_id).await?;

            let subtitle_path = service.subtitle_path(job_id)?;
            println!("Subtitles: {}", subtitle_path.display());
            if let Some(output) = output {
                tokio::fs::copy(&subtitle_path, &output).await?;
                println!("Copied to {}", output.display());
            }

            for target in target_langs.as_deref().map(parse_language_list).unwrap_or_default() {
                if !is_known_language(&target) {
                    warn!("{} is not in the language catalog, trying anyway", target);
                }
                match service.translate_job(job_id, &target).await {
                    Ok(path) => println!("Translation ({}): {}", target, path.display()),
                    Err(e) => warn!("Translation to {} failed: {}", target, e),
                }
            }
        }
        Commands::Batch { input_dir, language } => {
            let service = SubtitleService::new(config)?;
            service.check_health().await.context("media tool is not available")?;

            let media_files: Vec<_> = WalkDir::new(&input_dir)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file() && is_media_file(e.path()))
                .map(|e| e.into_path())
                .collect();
            info!("Found {} media files to process", media_files.len());

            for media_path in media_files {
                let outcome = async {
                    let job_id = service.submit(&media_path, language.as_deref()).await?;
                    watch_job(&service, job_id).await?;
                    Ok::<_, anyhow::Error>(service.subtitle_path(job_id)?)
                }
                .await;
                match outcome {
                    Ok(path) => info!("Processed {} -> {}", media_path.display(), path.display()),
                    Err(e) => warn!("Failed to process {}: {}", media_path.display(), e),
                }
            }
        }
        Commands::Translate { input, target, source, output } => {
            let service = SubtitleService::new(config)?;
            let translated = service.translate_file(&input, source.as_deref(), &target).await?;
            println!("Translation: {}", translated.display());
            if let Some(output) = output {
                tokio::fs::copy(&translated, &output).await?;
                println!("Copied to {}", output.display());
            }
        }
    }

    Ok(())
}

/// Render a job's progress until it finishes; Ctrl+C cancels it.
async fn watch_job(service: &SubtitleService, job_id: JobId) -> Result<()> {
    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::with_template("{spinner} [{bar:40}] {pos:>3}% {msg}")?.progress_chars("=> "),
    );

    loop {
        let report = service.progress(job_id)?;
        bar.set_position(report.progress as u64);
        bar.set_message(report.message.clone());

        if report.status.is_terminal() {
            bar.finish();
            if report.status == JobStatus::Failed {
                anyhow::bail!(report.error.unwrap_or_else(|| "job failed".to_string()));
            }
            return Ok(());
        }

        tokio::select! {
            _ = tokio::time::sleep(POLL_INTERVAL) => {}
            _ = tokio::signal::ctrl_c() => service.shutdown(),
        }
    }
}

fn is_media_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| MEDIA_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Setup logging to both console and file
fn setup_logging(verbose: bool, config: &Config) -> Result<()> {
    let log_dir = config.jobs.data_dir.join("log");
    std::fs::create_dir_all(&log_dir)?;

    // Daily rotation; the guard must outlive every log call
    let file_appender = rolling::daily(&log_dir, "whisub.log");
    let (non_blocking_file, guard) = non_blocking(file_appender);
    std::mem::forget(guard);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}
