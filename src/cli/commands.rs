//! Command implementations

use std::io::Write;

use anyhow::{anyhow, Context, Result};
use tracing::{error, info, warn};

use crate::adapters::ytdlp_exec::install_hint;
use crate::adapters::ClipperConfig;
use crate::app::{AppContainer, ClipHandle};
use crate::cli::args::{ClipArgs, FormatsArgs};
use crate::cli::Cli;
use crate::domain::errors::*;
use crate::domain::model::*;
use crate::utils::Utils;

/// Load configuration and apply the global flags on top
pub fn load_config(cli: &Cli) -> Result<ClipperConfig> {
    let mut config =
        ClipperConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    if cli.log_json {
        config.log_json = true;
    }
    config.validate().context("Invalid command-line options")?;
    Ok(config)
}

/// Execute the formats command
pub async fn formats(args: FormatsArgs, config: &ClipperConfig) -> Result<()> {
    let container = AppContainer::from_config(config)?;
    let catalogs = container.format_catalog();

    let catalog = catalogs.fetch(&args.url).await.map_err(fetch_failure)?;
    let listing = catalogs.list_formats(&catalog);

    if args.json {
        let json = serde_json::json!({
            "url": catalog.source_url(),
            "title": catalog.title(),
            "duration": catalog.duration().map(|d| d.as_seconds()),
            "best_audio": catalog.best_audio(),
            "formats": listing,
        });
        let json = serde_json::to_string_pretty(&json).context("Failed to serialize formats to JSON")?;
        println!("{}", json);
    } else {
        display_listing(&catalog, &listing);
    }
    Ok(())
}

/// Execute the clip command
pub async fn clip(args: ClipArgs, mut config: ClipperConfig) -> Result<()> {
    let start = TimeSpec::parse(&args.start)
        .map_err(|e| anyhow!("Invalid start time '{}': {}", args.start, e))?;
    let end = TimeSpec::parse(&args.end)
        .map_err(|e| anyhow!("Invalid end time '{}': {}", args.end, e))?;
    // Reject bad ranges before anything is fetched
    let range = TimeRange::new(start, end)?;

    if let Some(container) = args.container {
        config.container = container;
    }
    if let Some(dir) = args.output_dir {
        config.output_dir = dir;
    }
    if args.overwrite {
        config.overwrite = true;
    }
    if args.no_keyframe_cuts {
        config.force_keyframes_at_cuts = false;
    }

    info!("Clipping {} of {} (format {})", range, args.url, args.format);

    let container = AppContainer::from_config(&config)?;
    let mut session = container.session();

    let catalog = session.fetch_formats(&args.url).await.map_err(fetch_failure)?;
    if let Some(duration) = catalog.duration() {
        if range.end() > duration {
            warn!(
                "Clip end {} is past the video duration {}; the clip will be shorter",
                range.end(),
                duration
            );
        }
    }

    let mut plan = session.plan_with_audio(
        &args.format,
        args.audio_format.as_deref(),
        range.start(),
        range.end(),
    )?;
    if let Some(output) = args.output {
        plan = plan.with_output_path(output);
    }
    if plan.needs_merge() {
        info!("Pairing video format {} with audio format {}", plan.selectors[0], plan.selectors[1]);
    }

    let handle = session.request_clip(plan)?;
    eprintln!("Clipping to {}", handle.output_path().display());
    let result = follow(handle).await;
    eprintln!();

    match result {
        Ok(output) => {
            println!(
                "Saved {} ({}, took {})",
                output.path.display(),
                Utils::format_file_size(output.size_bytes),
                Utils::format_duration(output.elapsed)
            );
            Ok(())
        }
        Err(ExecError::Cancelled) => Err(anyhow!("Clip cancelled, no file was written")),
        Err(e) => {
            if let ExecError::ExecutorNotFound { program } = &e {
                eprintln!("{}", install_hint(program));
            }
            Err(e).context("Clip failed")
        }
    }
}

/// Execute the check command
pub async fn check(config: &ClipperConfig) -> Result<()> {
    let container = AppContainer::from_config(config)?;

    match container.clip_interactor().check_dependencies().await {
        Ok(versions) => {
            for tool in versions {
                println!("{:<12} {}", tool.name, tool.version);
            }
            println!("All dependencies found.");
            Ok(())
        }
        Err(ExecError::ExecutorNotFound { program }) => {
            error!("Missing dependency: {}", program);
            eprintln!("{}", install_hint(&program));
            Err(anyhow!("'{}' is not installed or not on PATH", program))
        }
        Err(e) => Err(e).context("Dependency check failed"),
    }
}

/// Print progress until the clip ends. Ctrl-C cancels it.
async fn follow(mut handle: ClipHandle) -> ClipResult {
    let mut cancelled = false;
    loop {
        tokio::select! {
            event = handle.next_progress() => match event {
                Some(ProgressEvent::Percent(pct)) => {
                    eprint!("\r  {:5.1}%", pct);
                    let _ = std::io::stderr().flush();
                }
                Some(ProgressEvent::Stage(stage)) => eprint!("\r  {}...", stage),
                Some(ProgressEvent::Line(line)) => tracing::debug!("{}", line),
                None => break,
            },
            signal = tokio::signal::ctrl_c(), if !cancelled => {
                if let Err(e) = signal {
                    warn!("Failed to listen for Ctrl-C: {}", e);
                }
                eprintln!("\nCancelling...");
                handle.cancel();
                cancelled = true;
            }
        }
    }
    handle.wait().await
}

fn fetch_failure(e: FetchError) -> anyhow::Error {
    anyhow!("{}\n{}", e, e.suggestion())
}

fn display_listing(catalog: &Catalog, listing: &[FormatListing]) {
    println!("{}", catalog.title().unwrap_or("(untitled)"));
    if let Some(duration) = catalog.duration() {
        println!("Duration: {}", duration);
    }
    println!();
    println!("{:<8} {:<48} {:>12}", "ID", "FORMAT", "SIZE");
    for row in listing {
        let size = row
            .approx_size_bytes
            .map(Utils::format_file_size)
            .unwrap_or_else(|| "-".to_string());
        println!("{:<8} {:<48} {:>12}", row.id, row.label, size);
    }
    match catalog.best_audio() {
        Some(id) => println!(
            "\nVideo-only formats are paired with audio format {} (choose another with --audio-format).",
            id
        ),
        None => println!("\nNo audio-only stream available; video-only formats cannot be clipped."),
    }
}
