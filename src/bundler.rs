//! Pipeline orchestration: capture, then concurrent content processing.
//!
//! [`ContentSource`] owns the capture results and the handler registry and
//! drives processing across a pool of worker tasks:
//!
//! ```text
//! capture ──► singles conduit ──┐
//!         ──► bundles conduit ──┼──► workers (4 × parallelism) ──► page
//!                               │        │ dispatch per file      conduit
//!                               │        ▼                           │
//!                               │   publish / render            collector
//!                               │                               (sole writer,
//!                               └───────────────────────────────terminal sort)
//! ```
//!
//! ## Ordering
//!
//! No ordering holds between files on different workers. Within one bundle,
//! the owner is processed before its resources, sequentially on one worker —
//! resource handling may depend on owner state. The final collection order
//! comes solely from the collector's terminal sort.
//!
//! ## Failure
//!
//! There are no retries: one failed file fails the run, because a partial
//! page set would build an inconsistent site. The first error cancels the
//! shared token so idle workers stop pulling work; in-flight files finish
//! their current handler chain. Errors are reported with a fixed priority:
//! bundle workers, then single-file workers, then the collector.

use crate::capture::{BundleDir, CaptureError, CaptureResult, capture};
use crate::handlers::default_pipelines;
use crate::page::Page;
use crate::routing::{HandlerError, PageTx, Pipelines, WorkUnit};
use crate::site::Site;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::Mutex;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("bundle processing failed: {0}")]
    Bundle(#[source] HandlerError),
    #[error("file processing failed: {0}")]
    Single(#[source] HandlerError),
    #[error("worker task failed: {0}")]
    Worker(#[source] JoinError),
    #[error("page collector failed: {0}")]
    Collector(#[source] JoinError),
}

#[derive(Error, Debug)]
pub enum BuildError {
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error(transparent)]
    Process(#[from] ProcessError),
}

/// The content map of a site: captured files plus the machinery to turn
/// them into pages.
pub struct ContentSource {
    site: Arc<Site>,
    pipelines: Arc<Pipelines>,
    pages: Vec<Page>,
}

impl ContentSource {
    /// Content source with the standard handler registry.
    pub fn new(site: Arc<Site>) -> Self {
        let pipelines = Arc::new(default_pipelines(site.clone()));
        Self::with_pipelines(site, pipelines)
    }

    /// Content source with a caller-built registry.
    pub fn with_pipelines(site: Arc<Site>, pipelines: Arc<Pipelines>) -> Self {
        Self {
            site,
            pipelines,
            pages: Vec::new(),
        }
    }

    /// The page collection. Populated and sorted after [`process`] returns;
    /// on failure it holds whatever the collector received before
    /// cancellation.
    ///
    /// [`process`]: ContentSource::process
    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn into_pages(self) -> Vec<Page> {
        self.pages
    }

    /// Walk the content tree. Synchronous; runs before any worker starts.
    pub fn capture_files(&self) -> Result<CaptureResult, CaptureError> {
        capture(self.site.source_fs(), self.site.content_dir())
    }

    /// Capture, then process. The single entry point for the surrounding
    /// build system.
    pub async fn build(&mut self) -> Result<(), BuildError> {
        let captured = self.capture_files()?;
        self.process(captured).await?;
        Ok(())
    }

    /// Process captured files across the worker pool.
    pub async fn process(&mut self, captured: CaptureResult) -> Result<(), ProcessError> {
        let workers = worker_count();

        // The two input conduits and the output conduit.
        let (bundle_tx, bundle_rx) = mpsc::channel::<BundleDir>(workers);
        let (single_tx, single_rx) = mpsc::channel::<PathBuf>(workers);
        let (page_tx, mut page_rx) = mpsc::unbounded_channel::<Page>();

        let bundle_rx = Arc::new(Mutex::new(bundle_rx));
        let single_rx = Arc::new(Mutex::new(single_rx));

        let cancel = CancellationToken::new();
        // Cancelled on first error by the failing worker, and unconditionally
        // when this function returns.
        let _cancel_guard = cancel.clone().drop_guard();

        info!(
            singles = captured.singles.len(),
            bundles = captured.bundles.len(),
            workers,
            "processing content"
        );

        let mut pool: JoinSet<Result<(), WorkerError>> = JoinSet::new();
        for _ in 0..workers {
            let worker = Worker {
                site: self.site.clone(),
                pipelines: self.pipelines.clone(),
                bundles: bundle_rx.clone(),
                singles: single_rx.clone(),
                pages: page_tx.clone(),
                cancel: cancel.clone(),
            };
            pool.spawn(async move { worker.run().await });
        }
        // Workers hold the remaining senders; the page conduit closes by
        // itself once the last worker exits.
        drop(page_tx);
        // Only workers hold the receiver ends from here on, so a dead pool
        // closes the input conduits and unblocks the feed loop below.
        drop(bundle_rx);
        drop(single_rx);

        // There can be only one page collector.
        let collector = tokio::spawn(async move {
            let mut pages: Vec<Page> = Vec::new();
            while let Some(page) = page_rx.recv().await {
                pages.push(page);
            }
            // Arrival order is nondeterministic; the sort key is the only
            // source of final order.
            pages.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
            pages
        });

        // Feed both conduits, singles first, closing each behind its items.
        // A send error means every worker is gone, which only happens after
        // a failure — the error is already on its way, so just stop feeding.
        for filename in captured.singles {
            if single_tx.send(filename).await.is_err() {
                break;
            }
        }
        drop(single_tx);
        for bundle in captured.bundles {
            if bundle_tx.send(bundle).await.is_err() {
                break;
            }
        }
        drop(bundle_tx);

        let mut bundle_err: Option<HandlerError> = None;
        let mut single_err: Option<HandlerError> = None;
        let mut worker_err: Option<JoinError> = None;
        while let Some(joined) = pool.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(WorkerError::Bundle(e))) => {
                    bundle_err.get_or_insert(e);
                }
                Ok(Err(WorkerError::Single(e))) => {
                    single_err.get_or_insert(e);
                }
                Err(e) => {
                    cancel.cancel();
                    worker_err.get_or_insert(e);
                }
            }
        }

        // All workers are done, so the page conduit is closed and the
        // collector drains whatever arrived before cancellation.
        let collected = collector.await;
        let mut collector_err: Option<JoinError> = None;
        match collected {
            Ok(pages) => self.pages = pages,
            Err(e) => collector_err = Some(e),
        }

        // Fixed reporting priority, even if several stages failed.
        if let Some(e) = bundle_err {
            return Err(ProcessError::Bundle(e));
        }
        if let Some(e) = single_err {
            return Err(ProcessError::Single(e));
        }
        if let Some(e) = worker_err {
            return Err(ProcessError::Worker(e));
        }
        if let Some(e) = collector_err {
            return Err(ProcessError::Collector(e));
        }

        info!(pages = self.pages.len(), "content processed");
        Ok(())
    }
}

fn worker_count() -> usize {
    4 * std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(1)
}

/// A worker error, tagged by the conduit the failing item came from so the
/// orchestrator can report in priority order.
enum WorkerError {
    Bundle(HandlerError),
    Single(HandlerError),
}

enum Work {
    Bundle(BundleDir),
    Single(PathBuf),
}

struct Worker {
    site: Arc<Site>,
    pipelines: Arc<Pipelines>,
    bundles: Arc<Mutex<mpsc::Receiver<BundleDir>>>,
    singles: Arc<Mutex<mpsc::Receiver<PathBuf>>>,
    pages: PageTx,
    cancel: CancellationToken,
}

impl Worker {
    async fn run(self) -> Result<(), WorkerError> {
        loop {
            match self.next_work().await {
                Some(Work::Bundle(bundle)) => {
                    if let Err(e) = self.handle_bundle(&bundle) {
                        self.cancel.cancel();
                        return Err(WorkerError::Bundle(e));
                    }
                }
                Some(Work::Single(filename)) => {
                    if let Err(e) = self.handle_single(filename) {
                        self.cancel.cancel();
                        return Err(WorkerError::Single(e));
                    }
                }
                None => return Ok(()),
            }
        }
    }

    /// Pull the next item from either conduit.
    ///
    /// Queued bundles are taken first so a bundle's files stay together as
    /// early as possible. When both queues are momentarily empty, block on
    /// the singles conduit — it is fed and closed first, so a closed answer
    /// moves us straight on to blocking on the bundle conduit. Returns
    /// `None` once both conduits are closed and drained, or on cancellation.
    async fn next_work(&self) -> Option<Work> {
        if self.cancel.is_cancelled() {
            return None;
        }

        if let Ok(bundle) = self.bundles.lock().await.try_recv() {
            return Some(Work::Bundle(bundle));
        }
        if let Ok(filename) = self.singles.lock().await.try_recv() {
            return Some(Work::Single(filename));
        }

        let received = {
            let mut rx = self.singles.lock().await;
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return None,
                item = rx.recv() => item,
            }
        };
        if let Some(filename) = received {
            return Some(Work::Single(filename));
        }

        let received = {
            let mut rx = self.bundles.lock().await;
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return None,
                item = rx.recv() => item,
            }
        };
        received.map(Work::Bundle)
    }

    /// Owner first, then every resource, in list order, on this worker.
    fn handle_bundle(&self, bundle: &BundleDir) -> Result<(), HandlerError> {
        let mut unit = WorkUnit::bundled(bundle.owner.clone(), bundle.clone());
        self.pipelines.dispatch(&mut unit, &self.pages)?;

        for resource in &bundle.resources {
            let mut unit = WorkUnit::bundled(resource.clone(), bundle.clone());
            self.pipelines.dispatch(&mut unit, &self.pages)?;
        }
        Ok(())
    }

    fn handle_single(&self, filename: PathBuf) -> Result<(), HandlerError> {
        let mut unit = WorkUnit::single(filename);
        self.pipelines.dispatch(&mut unit, &self.pages)
    }
}
