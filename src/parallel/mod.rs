//! Batch coordination: partition, bounded dispatch, stats aggregation

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{ConvertError, Result};
use crate::filesystem::{DirectoryLister, FileClassifier, FsScanner};
use crate::processing::{ConversionOutcome, FileConverter};

pub mod progress;
pub mod scheduler;

pub use progress::*;
pub use scheduler::*;

/// How workers are scheduled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutionStrategy {
    /// Tokio blocking tasks behind a semaphore
    #[default]
    Async,
    /// Dedicated rayon pool sized to the concurrency limit
    ThreadPool,
}

impl std::fmt::Display for ExecutionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Async => f.write_str("async"),
            Self::ThreadPool => f.write_str("thread-pool"),
        }
    }
}

impl FromStr for ExecutionStrategy {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "async" => Ok(Self::Async),
            "thread-pool" | "threadpool" | "rayon" => Ok(Self::ThreadPool),
            other => Err(ConvertError::config(format!(
                "Unknown execution strategy '{}'. Use async or thread-pool",
                other
            ))),
        }
    }
}

/// Aggregate outcome counts of one batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStats {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl BatchStats {
    /// `total == success + failed + skipped`
    pub fn is_consistent(&self) -> bool {
        self.total == self.success + self.failed + self.skipped
    }

    /// Whether the batch should exit with status 0
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

/// Owns the running [`BatchStats`]; every update goes through its lock
#[derive(Debug, Default)]
pub struct StatsAggregator {
    stats: Mutex<BatchStats>,
}

impl StatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one conversion outcome
    pub fn record(&self, outcome: &ConversionOutcome) {
        let mut stats = self.lock();
        stats.total += 1;
        if outcome.is_success() {
            stats.success += 1;
        } else {
            stats.failed += 1;
        }
    }

    /// Count a file that was never handed to the converter
    pub fn record_skip(&self) {
        let mut stats = self.lock();
        stats.total += 1;
        stats.skipped += 1;
    }

    pub fn snapshot(&self) -> BatchStats {
        *self.lock()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BatchStats> {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Batch lifecycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchPhase {
    #[default]
    Idle,
    Scanning,
    Dispatching,
    Draining,
    Complete,
}

impl std::fmt::Display for BatchPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Scanning => "scanning",
            Self::Dispatching => "dispatching",
            Self::Draining => "draining",
            Self::Complete => "complete",
        };
        f.write_str(name)
    }
}

/// Runs a file list through a [`FileConverter`] with bounded concurrency.
///
/// Non-image files are counted as skipped without reaching the converter.
/// A failing file never stops the rest of the batch, and `run` only returns
/// once every dispatched file has been folded into the stats.
#[derive(Clone)]
pub struct BatchCoordinator {
    concurrency: usize,
    classifier: Arc<dyn FileClassifier>,
    cancellation: CancellationFlag,
    progress: Arc<ProgressTracker>,
    phase: Arc<Mutex<BatchPhase>>,
}

impl BatchCoordinator {
    /// Create a coordinator admitting at most `concurrency` files at once
    pub fn new(concurrency: usize) -> Self {
        let concurrency = concurrency.max(1);
        info!("Initializing batch coordinator with {} concurrent workers", concurrency);

        Self {
            concurrency,
            classifier: Arc::new(FsScanner),
            cancellation: CancellationFlag::new(),
            progress: Arc::new(ProgressTracker::new()),
            phase: Arc::new(Mutex::new(BatchPhase::Idle)),
        }
    }

    /// Replace the image/non-image predicate
    pub fn with_classifier(mut self, classifier: Arc<dyn FileClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// Share an externally owned cancellation flag
    pub fn with_cancellation(mut self, cancellation: CancellationFlag) -> Self {
        self.cancellation = cancellation;
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn progress(&self) -> &Arc<ProgressTracker> {
        &self.progress
    }

    pub fn cancellation(&self) -> &CancellationFlag {
        &self.cancellation
    }

    pub fn phase(&self) -> BatchPhase {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_phase(&self, phase: BatchPhase) {
        let changed = {
            let mut current = self.phase.lock().unwrap_or_else(PoisonError::into_inner);
            let changed = *current != phase;
            *current = phase;
            changed
        };

        if changed {
            debug!("Batch phase -> {}", phase);
            self.progress.phase_changed(phase);
        }
    }

    /// Split off non-image files, count them as skipped and report them.
    /// Returns the processable files in input order.
    fn partition(&self, files: Vec<PathBuf>, stats: &StatsAggregator) -> Vec<PathBuf> {
        self.set_phase(BatchPhase::Scanning);

        let total = files.len();
        let (processable, skipped): (Vec<_>, Vec<_>) = files
            .into_iter()
            .partition(|path| self.classifier.is_image_file(path));

        self.progress.start(total, processable.len(), self.concurrency);

        for path in &skipped {
            let index = self.progress.next_index();
            stats.record_skip();
            debug!("Skipping non-image file {:?}", path);
            self.progress.file_finished(index, path, FileStatus::Skipped);
        }

        processable
    }

    fn finish(&self, stats: &StatsAggregator, undispatched: usize, start_time: Instant) -> BatchStats {
        let stats = stats.snapshot();
        self.set_phase(BatchPhase::Complete);

        if undispatched > 0 {
            warn!("Batch cancelled: {} files were not started", undispatched);
        }
        info!(
            "Batch completed in {:.2}s: {} total, {} converted, {} failed, {} skipped",
            start_time.elapsed().as_secs_f64(),
            stats.total,
            stats.success,
            stats.failed,
            stats.skipped
        );

        self.progress.complete(stats);
        stats
    }

    /// Convert `files` into `output_dir` on tokio blocking tasks.
    ///
    /// Admission slots are taken in input order by the dispatch loop, so a
    /// concurrency of 1 processes files strictly one after another.
    pub async fn run(
        &self,
        files: Vec<PathBuf>,
        output_dir: &Path,
        converter: Arc<dyn FileConverter>,
    ) -> BatchStats {
        let start_time = Instant::now();
        let stats = Arc::new(StatsAggregator::new());
        let processable = self.partition(files, &stats);

        self.set_phase(BatchPhase::Dispatching);
        info!("Dispatching {} files", processable.len());

        let gate = AdmissionGate::new(self.concurrency);
        let output_dir = Arc::new(output_dir.to_path_buf());
        let mut tasks = Vec::with_capacity(processable.len());
        let mut undispatched = 0;

        for (position, path) in processable.iter().enumerate() {
            if self.cancellation.is_cancelled() {
                undispatched = processable.len() - position;
                break;
            }

            let permit = match gate.admit().await {
                Ok(permit) => permit,
                Err(e) => {
                    warn!("Stopping dispatch: {}", e);
                    undispatched = processable.len() - position;
                    break;
                }
            };

            // Cancellation may have arrived while waiting for the slot
            if self.cancellation.is_cancelled() {
                undispatched = processable.len() - position;
                break;
            }

            let index = self.progress.next_index();
            self.progress.file_started(index, path);

            let converter = Arc::clone(&converter);
            let stats = Arc::clone(&stats);
            let progress = Arc::clone(&self.progress);
            let output_dir = Arc::clone(&output_dir);
            let source = path.clone();

            let task = tokio::task::spawn_blocking(move || {
                let _permit = permit;
                let outcome = converter.convert(&source, &output_dir);
                fold_outcome(&stats, &progress, index, &outcome);
            });

            tasks.push((index, path.clone(), task));
        }

        self.set_phase(BatchPhase::Draining);

        let (meta, handles): (Vec<_>, Vec<_>) = tasks
            .into_iter()
            .map(|(index, path, task)| ((index, path), task))
            .unzip();
        let results = futures::future::join_all(handles).await;

        for ((index, path), result) in meta.into_iter().zip(results) {
            if let Err(e) = result {
                let message = if e.is_panic() {
                    panic_message(e.into_panic().as_ref())
                } else {
                    e.to_string()
                };
                let outcome = worker_failure(path, message);
                fold_outcome(&stats, &self.progress, index, &outcome);
            }
        }

        self.finish(&stats, undispatched, start_time)
    }

    /// Convert `files` on a dedicated rayon pool with `concurrency` threads.
    /// Blocks the calling thread until the batch is drained.
    pub fn run_blocking(
        &self,
        files: Vec<PathBuf>,
        output_dir: &Path,
        converter: Arc<dyn FileConverter>,
    ) -> Result<BatchStats> {
        let start_time = Instant::now();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.concurrency)
            .thread_name(|i| format!("imgbatch-worker-{}", i))
            .build()
            .map_err(|e| ConvertError::config(format!("Failed to build worker pool: {}", e)))?;

        let stats = StatsAggregator::new();
        let processable = self.partition(files, &stats);

        self.set_phase(BatchPhase::Dispatching);
        info!("Dispatching {} files to thread pool", processable.len());

        let undispatched = AtomicUsize::new(0);

        pool.install(|| {
            processable.par_iter().for_each(|path| {
                if self.cancellation.is_cancelled() {
                    undispatched.fetch_add(1, Ordering::Relaxed);
                    return;
                }

                let index = self.progress.next_index();
                self.progress.file_started(index, path);

                let outcome =
                    panic::catch_unwind(AssertUnwindSafe(|| converter.convert(path, output_dir)))
                        .unwrap_or_else(|payload| {
                            worker_failure(path.clone(), panic_message(payload.as_ref()))
                        });

                fold_outcome(&stats, &self.progress, index, &outcome);
            });
        });

        // The pool has joined every worker by the time install returns
        self.set_phase(BatchPhase::Draining);

        Ok(self.finish(&stats, undispatched.into_inner(), start_time))
    }

    /// Run a batch with the given strategy
    pub async fn execute(
        &self,
        strategy: ExecutionStrategy,
        files: Vec<PathBuf>,
        output_dir: &Path,
        converter: Arc<dyn FileConverter>,
    ) -> Result<BatchStats> {
        match strategy {
            ExecutionStrategy::Async => Ok(self.run(files, output_dir, converter).await),
            ExecutionStrategy::ThreadPool => {
                let coordinator = self.clone();
                let output_dir = output_dir.to_path_buf();

                tokio::task::spawn_blocking(move || {
                    coordinator.run_blocking(files, &output_dir, converter)
                })
                .await
                .map_err(|e| ConvertError::Worker {
                    message: format!("thread pool batch aborted: {}", e),
                    file: None,
                })?
            }
        }
    }

    /// Scan `input_dir` and run every file in it. A scan failure is fatal.
    pub async fn run_directory(
        &self,
        lister: &dyn DirectoryLister,
        input_dir: &Path,
        output_dir: &Path,
        strategy: ExecutionStrategy,
        converter: Arc<dyn FileConverter>,
    ) -> Result<BatchStats> {
        self.set_phase(BatchPhase::Scanning);
        let files = lister.scan(input_dir)?;
        info!("Found {} files in {:?}", files.len(), input_dir);

        self.execute(strategy, files, output_dir, converter).await
    }
}

fn fold_outcome(
    stats: &StatsAggregator,
    progress: &ProgressTracker,
    index: usize,
    outcome: &ConversionOutcome,
) {
    stats.record(outcome);

    if let ConversionOutcome::Failure { source_path, cause } = outcome {
        warn!("Failed to convert {:?}: {}", source_path, cause);
    }
    progress.file_finished(index, outcome.source_path(), FileStatus::from(outcome));
}

fn worker_failure(source_path: PathBuf, message: String) -> ConversionOutcome {
    let cause = ConvertError::Worker {
        message,
        file: Some(source_path.clone()),
    };
    ConversionOutcome::Failure { source_path, cause }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("worker panicked: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("worker panicked: {}", message)
    } else {
        "worker panicked".to_string()
    }
}
