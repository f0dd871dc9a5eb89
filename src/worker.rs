use crate::error::{FetchError, Result, TransferError};
use crate::observer::ProgressObserver;
use crate::plan::{Fragment, FragmentSource};
use crate::resume::ResumePolicy;
use crate::store::{FragmentStore, ScratchFile};
use crate::utils;
use reqwest::header::RANGE;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Pre-filled queue shared by all workers of a session.
pub type JobQueue = Arc<Mutex<mpsc::Receiver<Fragment>>>;

/// Result of processing one fragment.
#[derive(Debug)]
pub enum FragmentOutcome {
    Success { scratch: ScratchFile },
    Failure { index: usize, cause: FetchError },
}

/// Everything a worker needs, shared read-only between workers.
pub struct WorkerContext {
    pub client: reqwest::Client,
    /// URL byte-range fragments are fetched from.
    pub target_url: Option<String>,
    pub store: FragmentStore,
    pub policy: Arc<dyn ResumePolicy>,
    pub observer: Arc<dyn ProgressObserver>,
    pub cancel: CancellationToken,
}

/// Drains `jobs` until it is empty, reporting one outcome per fragment.
///
/// The worker stops at its first failure, or when the token is cancelled.
pub async fn run_worker(
    id: usize,
    jobs: JobQueue,
    ctx: Arc<WorkerContext>,
    outcomes: mpsc::Sender<FragmentOutcome>,
) {
    loop {
        if ctx.cancel.is_cancelled() {
            debug!(worker = id, "cancelled between jobs");
            return;
        }

        let next = jobs.lock().await.recv().await;
        let Some(fragment) = next else {
            return;
        };
        let index = fragment.index;

        let outcome = match fetch_fragment(&ctx, &fragment).await {
            Ok(scratch) => FragmentOutcome::Success { scratch },
            Err(cause) => FragmentOutcome::Failure { index, cause },
        };
        let failed = matches!(outcome, FragmentOutcome::Failure { .. });

        // the coordinator may already have returned
        if outcomes.send(outcome).await.is_err() || failed {
            return;
        }
    }
}

/// Reuses the fragment's scratch file when it is complete, downloads it otherwise.
pub async fn fetch_fragment(ctx: &WorkerContext, fragment: &Fragment) -> Result<ScratchFile> {
    if let Some(scratch) = try_resume(ctx, fragment).await? {
        return Ok(scratch);
    }
    download_fragment(ctx, fragment).await
}

async fn try_resume(ctx: &WorkerContext, fragment: &Fragment) -> Result<Option<ScratchFile>> {
    let Some(existing) = ctx.store.probe(fragment).await? else {
        return Ok(None);
    };

    let expected = expected_size(ctx, fragment).await?;
    let path = ctx.store.path_for(fragment);
    if !ctx.policy.is_complete(&path, existing, expected) {
        debug!(
            index = fragment.index,
            existing, expected, "scratch file incomplete, refetching"
        );
        return Ok(None);
    }

    info!(index = fragment.index, bytes = existing, "reusing scratch file");
    ctx.observer.inc(existing);
    Ok(Some(ctx.store.scratch_file(fragment, existing)))
}

/// Known size, or a HEAD probe for segments whose size was not planned.
async fn expected_size(ctx: &WorkerContext, fragment: &Fragment) -> Result<u64> {
    match (&fragment.expected_size, &fragment.source) {
        (Some(size), _) => Ok(*size),
        (None, FragmentSource::Range { start, end }) => Ok(end - start + 1),
        (None, FragmentSource::Segment { url }) => utils::get_file_size(url, &ctx.client)
            .await
            .map_err(|e| FetchError::transfer(fragment.index, e)),
    }
}

async fn download_fragment(ctx: &WorkerContext, fragment: &Fragment) -> Result<ScratchFile> {
    let index = fragment.index;
    let url = match &fragment.source {
        FragmentSource::Segment { url } => url.as_str(),
        FragmentSource::Range { .. } => ctx.target_url.as_deref().ok_or_else(|| {
            FetchError::InvalidPlan("byte-range fragment without a target url".into())
        })?,
    };

    let mut request = ctx.client.get(url);
    if let Some(range) = fragment.range_header() {
        request = request.header(RANGE, range);
    }
    debug!(index, url, "fetching fragment");

    let sent = tokio::select! {
        biased;
        _ = ctx.cancel.cancelled() => return Err(FetchError::Cancelled),
        sent = request.send() => sent,
    };
    let mut response = sent.map_err(|e| FetchError::transfer(index, e))?;

    if !response.status().is_success() {
        return Err(FetchError::transfer(
            index,
            TransferError::Status {
                status: response.status(),
                url: url.to_string(),
            },
        ));
    }

    let path = ctx.store.path_for(fragment);
    let mut writer = ctx.store.create(fragment).await?;
    let mut received = 0u64;

    loop {
        let next = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => return Err(FetchError::Cancelled),
            chunk = response.chunk() => chunk,
        };
        let Some(bytes) = next.map_err(|e| FetchError::transfer(index, e))? else {
            break;
        };

        writer
            .write_all(&bytes)
            .await
            .map_err(|e| FetchError::scratch(&path, e))?;
        received += bytes.len() as u64;
        ctx.observer.inc(bytes.len() as u64);
    }

    // Ensure all bytes are on disk before the fragment is reported complete
    writer
        .flush()
        .await
        .map_err(|e| FetchError::scratch(&path, e))?;

    if let Some(expected) = fragment.expected_size
        && expected != received
    {
        return Err(FetchError::transfer(
            index,
            TransferError::UnexpectedLength { expected, received },
        ));
    }

    debug!(index, bytes = received, "fragment stored");
    Ok(ctx.store.scratch_file(fragment, received))
}
