//! Command-line binary entrypoint for `segfetch`.
//!
//! Resolves the target (HEAD probe or playlist), wires a progress bar and
//! Ctrl+C handling into a download session, and runs it.
mod args;

use anyhow::{Context, Result};
use args::{Args, Commands, CommonArgs};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use segfetch::config::Settings;
use segfetch::{ConsoleObserver, DownloadSession, FetchError, FetchTarget, playlist, utils};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Everything needed to run one session, after flags and settings are merged.
struct Job {
    target: FetchTarget,
    filename: String,
    size_hint: Option<u64>,
}

fn build_client(settings: &Settings) -> Result<reqwest::Client> {
    let timeout = Duration::from_secs(settings.timeout_secs.unwrap_or(30));
    Ok(reqwest::Client::builder()
        .user_agent(concat!("segfetch/", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .build()?)
}

async fn resolve(
    command: &Commands,
    settings: &Settings,
    client: &reqwest::Client,
) -> Result<Job> {
    match command {
        Commands::File {
            url,
            output,
            fragment_size,
            ..
        } => {
            let info = utils::probe_remote(url, client)
                .await
                .with_context(|| format!("Failed to probe {}", url))?;
            if !info.accepts_ranges {
                eprintln!("⚠️  Server does not advertise byte ranges; downloading in one piece.");
            }

            let fragment_size = fragment_size.or(settings.fragment_size);
            Ok(Job {
                target: info.into_target(url, fragment_size),
                filename: output
                    .clone()
                    .unwrap_or_else(|| utils::get_filename_from_url(url)),
                size_hint: Some(info.size),
            })
        }
        Commands::Playlist { url, output, .. } => {
            let segments = playlist::fetch_playlist(url, client).await?;
            println!("Playlist has {} segments", segments.len());

            let size_hint = match playlist::total_size(&segments, client).await {
                Ok(total) => Some(total),
                Err(e) => {
                    eprintln!("⚠️  Total size unknown, showing bytes only: {:#}", e);
                    None
                }
            };

            Ok(Job {
                target: FetchTarget::segment_list(segments),
                filename: sanitize_filename::sanitize(output),
                size_hint,
            })
        }
    }
}

fn progress_bar(size_hint: Option<u64>, filename: &str) -> ProgressBar {
    let pb = match size_hint {
        Some(total) => ProgressBar::new(total),
        None => ProgressBar::no_length(),
    };
    let template = if size_hint.is_some() {
        "{msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})"
    } else {
        "{msg} [{elapsed_precise}] {spinner} {bytes} ({bytes_per_sec})"
    };
    if let Ok(style) = ProgressStyle::with_template(template) {
        pb.set_style(style.progress_chars("=>-"));
    }
    pb.set_message(filename.to_string());
    pb
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let settings = Settings::load().unwrap_or_else(|e| {
        eprintln!("⚠️  Ignoring settings: {:#}", e);
        Settings::default()
    });

    let common: &CommonArgs = match &args.command {
        Commands::File { common, .. } | Commands::Playlist { common, .. } => common,
    };
    let threads = common.threads.or(settings.threads).unwrap_or(1);
    let dir = common
        .dir
        .clone()
        .or_else(|| settings.default_dir.clone())
        .unwrap_or_else(|| ".".to_string());
    let scratch_root = common
        .scratch_dir
        .clone()
        .or_else(|| settings.scratch_dir.clone())
        .unwrap_or_else(segfetch::store::default_scratch_root);

    let client = build_client(&settings)?;
    let job = resolve(&args.command, &settings, &client).await?;

    if dir != "." {
        tokio::fs::create_dir_all(&dir).await?;
    }
    let mut output_path = PathBuf::from(&dir);
    output_path.push(&job.filename);

    let cancel_token = CancellationToken::new();
    let signal_token = cancel_token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\n🛑 Received Ctrl+C. Stopping; finished fragments are kept for resume.");
            signal_token.cancel();
        }
    });

    let pb = progress_bar(job.size_hint, &job.filename);
    let observer = Arc::new(ConsoleObserver { pb: pb.clone() });

    let session = DownloadSession::builder(job.target, &output_path)
        .workers(threads)
        .scratch_root(scratch_root)
        .client(client)
        .observer(observer)
        .cancel_token(cancel_token)
        .build()?;

    match session.run().await {
        Ok(bytes) => {
            pb.finish_with_message(format!("✅ {}", job.filename));
            println!("Saved {} ({} bytes)", output_path.display(), bytes);
            Ok(())
        }
        Err(FetchError::Cancelled) => {
            pb.abandon_with_message("Paused");
            println!("Run the same command again to resume.");
            Ok(())
        }
        Err(e) => {
            pb.abandon_with_message("Failed");
            Err(e).context("Download failed; rerun to resume from completed fragments")
        }
    }
}
