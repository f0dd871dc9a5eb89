//! One download run: plan, fetch every fragment in parallel, then merge.
use crate::error::{FetchError, Result};
use crate::merge;
use crate::observer::{NoopObserver, ProgressObserver};
use crate::plan::{FetchTarget, Fragment, normalize_workers};
use crate::resume::{ResumePolicy, SizeMatch};
use crate::store::{FragmentStore, ScratchFile, default_scratch_root};
use crate::worker::{FragmentOutcome, WorkerContext, run_worker};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Builder for [`DownloadSession`].
pub struct SessionBuilder {
    target: FetchTarget,
    output: PathBuf,
    scratch_root: Option<PathBuf>,
    workers: usize,
    observer: Arc<dyn ProgressObserver>,
    policy: Arc<dyn ResumePolicy>,
    client: Option<reqwest::Client>,
    cancel: Option<CancellationToken>,
}

impl SessionBuilder {
    /// Requested worker count; values below 1 run one worker.
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn scratch_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.scratch_root = Some(root.into());
        self
    }

    pub fn observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn resume_policy(mut self, policy: Arc<dyn ResumePolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn client(mut self, client: reqwest::Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Token the caller can cancel to stop every worker.
    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Plans the fragments.
    ///
    /// # Errors
    ///
    /// [`FetchError::InvalidPlan`] if the target cannot be split or the output
    /// path has no file name to derive scratch names from.
    pub fn build(self) -> Result<DownloadSession> {
        let fragments = self.target.fragments()?;
        let destination = self
            .output
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                FetchError::InvalidPlan(format!(
                    "output path {} has no file name",
                    self.output.display()
                ))
            })?;
        let root = self.scratch_root.unwrap_or_else(default_scratch_root);

        Ok(DownloadSession {
            target: self.target,
            fragments,
            store: FragmentStore::new(root, destination),
            workers: normalize_workers(self.workers),
            output: self.output,
            observer: self.observer,
            policy: self.policy,
            client: self.client.unwrap_or_default(),
            cancel: self.cancel.unwrap_or_default(),
        })
    }
}

/// The root object of one download run.
///
/// On success the artifact is written and the scratch files are gone. On
/// failure the scratch files stay behind so a later session with the same
/// output name resumes from them.
pub struct DownloadSession {
    target: FetchTarget,
    fragments: Vec<Fragment>,
    store: FragmentStore,
    workers: usize,
    output: PathBuf,
    observer: Arc<dyn ProgressObserver>,
    policy: Arc<dyn ResumePolicy>,
    client: reqwest::Client,
    cancel: CancellationToken,
}

impl DownloadSession {
    pub fn builder(target: FetchTarget, output: impl Into<PathBuf>) -> SessionBuilder {
        SessionBuilder {
            target,
            output: output.into(),
            scratch_root: None,
            workers: 1,
            observer: Arc::new(NoopObserver),
            policy: Arc::new(SizeMatch),
            client: None,
            cancel: None,
        }
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    pub fn store(&self) -> &FragmentStore {
        &self.store
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Fetches all fragments and merges them. Returns the artifact's size.
    pub async fn run(self) -> Result<u64> {
        info!(
            output = %self.output.display(),
            fragments = self.fragments.len(),
            workers = self.workers,
            "starting download"
        );
        self.store.ensure_root().await?;

        let parts = self.fetch_all().await?;
        let total =
            merge::merge_fragments(&self.store, &self.output, parts, self.target.total_size())
                .await?;

        info!(output = %self.output.display(), bytes = total, "download complete");
        Ok(total)
    }

    /// Runs the worker pool and collects exactly one outcome per fragment.
    ///
    /// Returns at the first failure after cancelling the remaining workers.
    async fn fetch_all(&self) -> Result<Vec<ScratchFile>> {
        let count = self.fragments.len();

        let (job_tx, job_rx) = mpsc::channel(count);
        for fragment in &self.fragments {
            // capacity holds every job, so this never waits
            job_tx
                .send(fragment.clone())
                .await
                .map_err(|_| FetchError::PoolExhausted)?;
        }
        drop(job_tx);
        let jobs = Arc::new(Mutex::new(job_rx));

        let pool_cancel = self.cancel.child_token();
        let ctx = Arc::new(WorkerContext {
            client: self.client.clone(),
            target_url: self.target.url().map(str::to_string),
            store: self.store.clone(),
            policy: self.policy.clone(),
            observer: self.observer.clone(),
            cancel: pool_cancel.clone(),
        });

        let (outcome_tx, mut outcome_rx) = mpsc::channel(count);
        for id in 0..self.workers {
            tokio::spawn(run_worker(id, jobs.clone(), ctx.clone(), outcome_tx.clone()));
        }
        drop(outcome_tx);

        let mut slots: Vec<Option<ScratchFile>> = vec![None; count];
        let mut completed = 0;

        while completed < count {
            let outcome = tokio::select! {
                _ = self.cancel.cancelled() => return Err(FetchError::Cancelled),
                outcome = outcome_rx.recv() => outcome,
            };
            match outcome {
                Some(FragmentOutcome::Success { scratch }) => {
                    let index = scratch.index;
                    if slots[index].replace(scratch).is_none() {
                        completed += 1;
                    }
                }
                Some(FragmentOutcome::Failure { index, cause }) => {
                    warn!(index, error = %cause, "fragment failed, aborting session");
                    pool_cancel.cancel();
                    return Err(cause);
                }
                None if self.cancel.is_cancelled() => return Err(FetchError::Cancelled),
                None => return Err(FetchError::PoolExhausted),
            }
        }

        Ok(slots.into_iter().flatten().collect())
    }
}
