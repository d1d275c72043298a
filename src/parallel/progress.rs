//! Ordered progress reporting for batch runs

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};

use crate::parallel::{BatchPhase, BatchStats};
use crate::processing::ConversionOutcome;

const CHANNEL_CAPACITY: usize = 1024;

/// How a single file ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileStatus {
    Ok,
    Failed(String),
    Skipped,
}

impl FileStatus {
    /// Text printed after `Converting <path>... `
    pub fn label(&self) -> String {
        match self {
            Self::Ok => "OK".to_string(),
            Self::Failed(cause) => format!("FAILED ({})", cause),
            Self::Skipped => "SKIPPED (unsupported format)".to_string(),
        }
    }
}

impl From<&ConversionOutcome> for FileStatus {
    fn from(outcome: &ConversionOutcome) -> Self {
        match outcome {
            ConversionOutcome::Success { .. } => Self::Ok,
            ConversionOutcome::Failure { cause, .. } => Self::Failed(cause.to_string()),
        }
    }
}

/// Progress update event
#[derive(Debug, Clone)]
pub enum ProgressUpdate {
    Started {
        /// Every input file, skipped ones included
        total: usize,
        /// Files that will be handed to the converter
        processable: usize,
        workers: usize,
    },
    PhaseChanged {
        phase: BatchPhase,
    },
    FileStarted {
        index: usize,
        total: usize,
        path: PathBuf,
    },
    FileFinished {
        index: usize,
        total: usize,
        path: PathBuf,
        status: FileStatus,
    },
    BatchCompleted {
        stats: BatchStats,
    },
}

#[derive(Debug, Default)]
struct Sequence {
    next: usize,
    total: usize,
}

/// Hands out progress sequence numbers and publishes progress events.
///
/// Sequence numbers start at 1 and are assigned under a lock, so no two
/// files ever share an index. Events go to two kinds of consumers:
/// [`subscribe`](Self::subscribe) receivers may lag and lose events, while
/// [`listen`](Self::listen) receivers get every event in send order.
pub struct ProgressTracker {
    sequence: Mutex<Sequence>,
    sender: broadcast::Sender<ProgressUpdate>,
    listeners: Mutex<Vec<mpsc::UnboundedSender<ProgressUpdate>>>,
}

impl ProgressTracker {
    /// Create a new progress tracker
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);

        Self {
            sequence: Mutex::new(Sequence::default()),
            sender,
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Reset the sequence for a batch of `total` input files
    pub fn start(&self, total: usize, processable: usize, workers: usize) {
        {
            let mut sequence = self.lock();
            sequence.next = 0;
            sequence.total = total;
        }

        self.send(ProgressUpdate::Started {
            total,
            processable,
            workers,
        });
    }

    /// Claim the next sequence number
    pub fn next_index(&self) -> usize {
        let mut sequence = self.lock();
        sequence.next += 1;
        sequence.next
    }

    /// Number of input files in the current batch
    pub fn total(&self) -> usize {
        self.lock().total
    }

    pub fn phase_changed(&self, phase: BatchPhase) {
        self.send(ProgressUpdate::PhaseChanged { phase });
    }

    pub fn file_started(&self, index: usize, path: &Path) {
        debug!("[{}/{}] Dispatching {}", index, self.total(), path.display());
        self.send(ProgressUpdate::FileStarted {
            index,
            total: self.total(),
            path: path.to_path_buf(),
        });
    }

    pub fn file_finished(&self, index: usize, path: &Path, status: FileStatus) {
        self.send(ProgressUpdate::FileFinished {
            index,
            total: self.total(),
            path: path.to_path_buf(),
            status,
        });
    }

    pub fn complete(&self, stats: BatchStats) {
        self.send(ProgressUpdate::BatchCompleted { stats });
    }

    /// Best-effort subscription. A slow receiver sees `Lagged` and loses the
    /// oldest events. Only events sent after subscribing are seen.
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressUpdate> {
        self.sender.subscribe()
    }

    /// Lossless subscription: every event sent after this call is queued
    /// until the receiver takes it.
    pub fn listen(&self) -> mpsc::UnboundedReceiver<ProgressUpdate> {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sender);
        receiver
    }

    fn send(&self, update: ProgressUpdate) {
        // Held while sending so every listener sees one global order
        let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        listeners.retain(|listener| listener.send(update.clone()).is_ok());

        // No subscribers is fine
        let _ = self.sender.send(update);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Sequence> {
        self.sequence.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Format one per-file progress line
pub fn format_line(index: usize, total: usize, path: &Path, status: &FileStatus) -> String {
    format!(
        "[{}/{}] Converting {}... {}",
        index,
        total,
        path.display(),
        status.label()
    )
}

/// Prints per-file progress lines to stdout as files finish.
///
/// Listens losslessly, so every file gets its line however far the
/// printer falls behind the workers.
pub struct ConsoleProgressReporter {
    receiver: mpsc::UnboundedReceiver<ProgressUpdate>,
    bar: Option<ProgressBar>,
    files_reported: usize,
}

impl ConsoleProgressReporter {
    /// Create a reporter. With `show_bar`, a progress bar is drawn under the lines.
    pub fn new(tracker: &ProgressTracker, show_bar: bool) -> Self {
        let bar = show_bar.then(|| {
            let bar = ProgressBar::new(0);
            if let Ok(style) = ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta})")
            {
                bar.set_style(style.progress_chars("#>-"));
            }
            bar
        });

        Self {
            receiver: tracker.listen(),
            bar,
            files_reported: 0,
        }
    }

    /// Print progress until the batch completes. Returns the final stats, or
    /// `None` if the tracker went away first.
    pub async fn start_reporting(mut self) -> Option<BatchStats> {
        self.report().await
    }

    /// Number of per-file lines printed so far
    pub fn files_reported(&self) -> usize {
        self.files_reported
    }

    async fn report(&mut self) -> Option<BatchStats> {
        loop {
            match self.receiver.recv().await {
                Some(ProgressUpdate::Started {
                    total,
                    processable,
                    workers,
                }) => {
                    self.print(&format!("Processing {} images...", processable));
                    self.print(&format!(
                        "Using {} workers (CPU count: {})",
                        workers,
                        num_cpus::get()
                    ));
                    if let Some(bar) = &self.bar {
                        bar.set_length(total as u64);
                    }
                }
                Some(ProgressUpdate::PhaseChanged { phase }) => {
                    debug!("Batch phase: {}", phase);
                }
                Some(ProgressUpdate::FileStarted { .. }) => {}
                Some(ProgressUpdate::FileFinished {
                    index,
                    total,
                    path,
                    status,
                }) => {
                    self.print(&format_line(index, total, &path, &status));
                    self.files_reported += 1;
                    if let Some(bar) = &self.bar {
                        bar.inc(1);
                    }
                }
                Some(ProgressUpdate::BatchCompleted { stats }) => {
                    if let Some(bar) = &self.bar {
                        bar.finish_and_clear();
                    }
                    if self.files_reported != stats.total {
                        warn!(
                            "Reported {} files but the batch counted {}",
                            self.files_reported, stats.total
                        );
                    }
                    return Some(stats);
                }
                None => return None,
            }
        }
    }

    fn print(&self, line: &str) {
        match &self.bar {
            Some(bar) => bar.println(line),
            None => println!("{}", line),
        }
    }
}
