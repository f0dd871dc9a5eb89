//! Minimal reader for extended-M3U media playlists.
//!
//! Only what is needed to turn a playlist into an ordered segment list:
//! `#EXTINF` entries followed by their URI, relative URIs resolved against the
//! playlist URL, and `#EXT-X-ENDLIST` as the end marker. Other tags are skipped.
use crate::plan::Segment;
use crate::utils::get_file_size;
use anyhow::{Context, Result, anyhow, bail};
use tokio::task::JoinSet;
use url::Url;

const HEADER: &str = "#EXTM3U";
const EXTINF: &str = "#EXTINF:";
const ENDLIST: &str = "#EXT-X-ENDLIST";

/// Downloads and parses the playlist at `url`.
pub async fn fetch_playlist(url: &str, client: &reqwest::Client) -> Result<Vec<Segment>> {
    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("Failed to fetch playlist {}", url))?;

    if !response.status().is_success() {
        bail!("Playlist request failed. Status Code: {}", response.status());
    }

    let body = response.text().await?;
    parse_playlist(&body, url)
}

/// Sums the sizes of all segments with one concurrent HEAD request each.
///
/// Stops at the first failure; requests still in flight are aborted.
pub async fn total_size(segments: &[Segment], client: &reqwest::Client) -> Result<u64> {
    let mut join_set = JoinSet::new();
    for (index, segment) in segments.iter().enumerate() {
        let client = client.clone();
        let url = segment.url.clone();
        join_set.spawn(async move {
            get_file_size(&url, &client)
                .await
                .with_context(|| format!("Failed to size segment {} ({})", index, url))
        });
    }

    let mut total = 0u64;
    while let Some(result) = join_set.join_next().await {
        total += result.context("Segment size task panicked")??;
    }
    Ok(total)
}

/// Parses playlist text. `base` resolves relative segment URIs.
pub fn parse_playlist(text: &str, base: &str) -> Result<Vec<Segment>> {
    let base = Url::parse(base).with_context(|| format!("Invalid playlist URL: {}", base))?;
    let mut lines = text.lines().map(str::trim).enumerate();

    match lines.next() {
        Some((_, HEADER)) => {}
        _ => bail!("Not an m3u8 playlist: missing {} header", HEADER),
    }

    let mut segments = Vec::new();
    let mut pending: Option<f64> = None;

    for (number, line) in lines {
        if line.is_empty() {
            continue;
        }

        if let Some(rest) = line.strip_prefix(EXTINF) {
            let duration = rest.split(',').next().unwrap_or_default().trim();
            let seconds = duration.parse::<f64>().map_err(|_| {
                anyhow!("Invalid segment duration {:?} on line {}", duration, number + 1)
            })?;
            pending = Some(seconds);
        } else if line == ENDLIST {
            break;
        } else if line.starts_with('#') {
            continue;
        } else if let Some(seconds) = pending.take() {
            let url = base
                .join(line)
                .with_context(|| format!("Invalid segment URI on line {}", number + 1))?;
            segments.push(Segment {
                url: url.to_string(),
                duration: Some(seconds),
            });
        }
    }

    if segments.is_empty() {
        bail!("Playlist contains no segments");
    }
    Ok(segments)
}
