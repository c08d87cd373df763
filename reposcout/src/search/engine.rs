use crossbeam_channel::{bounded, RecvTimeoutError};
use rayon::prelude::*;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info};

use super::processor::{FileOutcome, FileProcessor};
use crate::cancel::{CancellationToken, Checkpoint, PauseGate};
use crate::config::ScanRequest;
use crate::errors::{ScanError, ScanResult};
use crate::filters::{enumerate_files, ExtensionFilter};
use crate::metrics::{ScanMetrics, ScanStats};
use crate::progress::{NoopReporter, ProgressReporter, ProgressUpdate, ScanProgress, Throttle};
use crate::results::{ResultAggregator, ScanOutcome, ScanTimer};

// Outcomes buffered between the workers and the coordinator
const CHANNEL_CAPACITY: usize = 256;
const MIN_WORKERS: usize = 2;
const MAX_WORKERS: usize = 32;

/// Lifecycle of one scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ScanState {
    Idle = 0,
    Running = 1,
    Completed = 2,
    Cancelled = 3,
    /// Stopped by an internal error; [`ScanHandle::wait`] returns it
    Failed = 4,
}

impl ScanState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => ScanState::Running,
            2 => ScanState::Completed,
            3 => ScanState::Cancelled,
            4 => ScanState::Failed,
            _ => ScanState::Idle,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ScanState::Completed | ScanState::Cancelled | ScanState::Failed
        )
    }
}

/// Worker count used when the request does not set one
pub fn default_thread_count() -> usize {
    (num_cpus::get() * 2).clamp(MIN_WORKERS, MAX_WORKERS)
}

/// State shared between a [`ScanHandle`] and its coordinator thread
#[derive(Debug)]
struct ScanShared {
    progress: ScanProgress,
    state: AtomicU8,
    metrics: ScanMetrics,
}

impl ScanShared {
    fn set_state(&self, state: ScanState) {
        self.state.store(state as u8, Ordering::Release);
    }

    fn state(&self) -> ScanState {
        ScanState::from_u8(self.state.load(Ordering::Acquire))
    }
}

/// Configures and starts a scan
pub struct Scanner {
    request: ScanRequest,
    reporter: Arc<dyn ProgressReporter>,
    cancel: CancellationToken,
    pause: PauseGate,
}

impl Scanner {
    pub fn new(request: ScanRequest) -> Self {
        Self {
            request,
            reporter: Arc::new(NoopReporter),
            cancel: CancellationToken::new(),
            pause: PauseGate::new(),
        }
    }

    /// Sets the progress callback
    pub fn with_reporter(mut self, reporter: impl ProgressReporter + 'static) -> Self {
        self.reporter = Arc::new(reporter);
        self
    }

    /// Uses a caller-owned cancellation token instead of a fresh one
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Uses a caller-owned pause gate
    pub fn with_pause_gate(mut self, pause: PauseGate) -> Self {
        self.pause = pause;
        self
    }

    /// Starts the scan on a background coordinator thread and returns immediately.
    ///
    /// Fails only for requests that can never run (empty keyword) or when the worker pool
    /// can not be created.
    pub fn start(self) -> ScanResult<ScanHandle> {
        if self.request.keyword.trim().is_empty() {
            return Err(ScanError::EmptyKeyword);
        }

        let threads = self
            .request
            .thread_count
            .map_or_else(default_thread_count, |n| n.get());
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("reposcout-worker-{}", i))
            .build()
            .map_err(|e| ScanError::thread_pool(e.to_string()))?;

        let shared = Arc::new(ScanShared {
            progress: ScanProgress::new(),
            state: AtomicU8::new(ScanState::Idle as u8),
            metrics: ScanMetrics::new(),
        });
        let checkpoint = Checkpoint::new(self.cancel.clone(), self.pause.clone());

        shared.set_state(ScanState::Running);
        let coordinator = {
            let shared = Arc::clone(&shared);
            let request = self.request;
            let reporter = self.reporter;
            thread::Builder::new()
                .name("reposcout-coordinator".to_string())
                .spawn(move || {
                    let result = coordinate(request, pool, checkpoint, &shared, reporter.as_ref());
                    if let Err(e) = &result {
                        error!("Scan failed: {}", e);
                        shared.set_state(ScanState::Failed);
                    }
                    result
                })?
        };

        Ok(ScanHandle {
            shared,
            cancel: self.cancel,
            pause: self.pause,
            coordinator: Some(coordinator),
        })
    }

    /// Runs the scan to completion on the calling thread
    pub fn run(self) -> ScanResult<ScanOutcome> {
        self.start()?.wait()
    }
}

/// Scans with default settings and no progress callback, blocking until done
pub fn scan(request: &ScanRequest) -> ScanResult<ScanOutcome> {
    Scanner::new(request.clone()).run()
}

/// Handle to a running scan.
///
/// Dropping the handle without calling [`ScanHandle::wait`] cancels the scan.
pub struct ScanHandle {
    shared: Arc<ScanShared>,
    cancel: CancellationToken,
    pause: PauseGate,
    coordinator: Option<JoinHandle<ScanResult<ScanOutcome>>>,
}

impl ScanHandle {
    /// Requests cancellation; a no-op once the scan has finished
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn pause(&self) {
        self.pause.pause();
    }

    pub fn resume(&self) {
        self.pause.resume();
    }

    pub fn is_paused(&self) -> bool {
        self.pause.is_paused()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn pause_gate(&self) -> PauseGate {
        self.pause.clone()
    }

    /// Current, unthrottled progress
    pub fn progress(&self) -> ProgressUpdate {
        self.shared.progress.snapshot()
    }

    pub fn state(&self) -> ScanState {
        self.shared.state()
    }

    pub fn is_finished(&self) -> bool {
        self.state().is_terminal()
    }

    pub fn metrics(&self) -> ScanStats {
        self.shared.metrics.get_stats()
    }

    /// Blocks until the scan reaches a terminal state and returns its results
    pub fn wait(mut self) -> ScanResult<ScanOutcome> {
        let coordinator = self
            .coordinator
            .take()
            .ok_or_else(|| ScanError::internal("scan already joined"))?;
        coordinator
            .join()
            .map_err(|_| ScanError::internal("scan coordinator panicked"))?
    }
}

impl Drop for ScanHandle {
    fn drop(&mut self) {
        if self.coordinator.is_some() {
            self.cancel.cancel();
        }
    }
}

/// Coordinator body: enumerate, fan out to the pool, fan in through the channel.
fn coordinate(
    request: ScanRequest,
    pool: rayon::ThreadPool,
    checkpoint: Checkpoint,
    shared: &ScanShared,
    reporter: &dyn ProgressReporter,
) -> ScanResult<ScanOutcome> {
    let timer = ScanTimer::start();
    info!(
        "Starting scan for {:?} under {}",
        request.keyword,
        request.root_path.display()
    );

    let filter = ExtensionFilter::new(&request.file_extensions);
    let files = enumerate_files(&request.root_path, &filter);
    let total_files = files.len();
    shared.progress.set_total(total_files);
    debug!(
        "Found {} files to scan with {} workers",
        total_files,
        pool.current_num_threads()
    );

    let mut throttle = Throttle::new(request.progress_interval());
    if let Some(update) = throttle.offer(shared.progress.snapshot()) {
        reporter.report(&update);
    }

    let processor = FileProcessor::new(&request, shared.metrics.clone());
    let (sender, receiver) = bounded::<FileOutcome>(CHANNEL_CAPACITY);
    let dispatcher = {
        let checkpoint = checkpoint.clone();
        thread::Builder::new()
            .name("reposcout-dispatch".to_string())
            .spawn(move || dispatch(pool, files, processor, checkpoint, sender))?
    };

    let mut aggregator = ResultAggregator::new();
    let mut safeguard_reached = false;
    loop {
        let received = if throttle.has_pending() {
            receiver.recv_timeout(throttle.interval().max(Duration::from_millis(1)))
        } else {
            receiver
                .recv()
                .map_err(|_| RecvTimeoutError::Disconnected)
        };

        match received {
            Ok(outcome) => {
                // Keep draining so no worker blocks on a full channel, but commit nothing
                // once the scan is stopping.
                if checkpoint.cancel.is_cancelled() || safeguard_reached || !outcome.is_complete() {
                    continue;
                }

                shared
                    .progress
                    .record_file(&outcome.path, outcome.matches.len());
                aggregator.add_file(outcome.matches);

                if request.safeguard > 0 && aggregator.files_scanned() >= request.safeguard {
                    info!("Safeguard of {} files reached", request.safeguard);
                    safeguard_reached = true;
                    checkpoint.halt.cancel();
                }

                if let Some(update) = throttle.offer(shared.progress.snapshot()) {
                    reporter.report(&update);
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                if let Some(update) = throttle.poll() {
                    reporter.report(&update);
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    if dispatcher.join().is_err() {
        error!("A scan worker panicked");
        return Err(ScanError::internal("scan worker panicked"));
    }

    let cancelled = checkpoint.cancel.is_cancelled();
    let mut last = shared.progress.snapshot();
    if !cancelled && last.total_files > 0 {
        last.fraction = 1.0;
    }
    throttle.flush();
    reporter.report(&last);

    shared.metrics.log_stats();
    let outcome = aggregator.finish(request, total_files, timer, cancelled, safeguard_reached);
    info!(
        "Scan {}. Found {} matches in {} of {} scanned files",
        outcome.summary.status().to_lowercase(),
        outcome.summary.match_count,
        outcome.summary.files_with_matches,
        outcome.summary.files_scanned
    );

    shared.set_state(if cancelled {
        ScanState::Cancelled
    } else {
        ScanState::Completed
    });
    Ok(outcome)
}

/// Runs every file task on the pool; each worker owns a sender clone.
fn dispatch(
    pool: rayon::ThreadPool,
    files: Vec<PathBuf>,
    processor: FileProcessor,
    checkpoint: Checkpoint,
    sender: crossbeam_channel::Sender<FileOutcome>,
) {
    pool.install(|| {
        files.par_iter().for_each_with(sender, |sender, path| {
            // No new task starts after a stop
            if checkpoint.cancel.is_cancelled() || checkpoint.halt.is_cancelled() {
                return;
            }
            let outcome = processor.process_file(path, &checkpoint);
            if sender.send(outcome).is_err() {
                debug!("Coordinator gone, dropping outcome for {}", path.display());
            }
        });
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::num::NonZeroUsize;
    use tempfile::tempdir;

    #[test]
    fn test_scan_counts() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "test line\ntest line 2\n").unwrap();
        fs::write(dir.path().join("b.txt"), "nothing here\n").unwrap();

        let mut request = ScanRequest::new(dir.path(), "test");
        request.thread_count = NonZeroUsize::new(1);

        let outcome = scan(&request).unwrap();
        assert_eq!(outcome.summary.total_files, 2);
        assert_eq!(outcome.summary.files_scanned, 2);
        assert_eq!(outcome.summary.files_with_matches, 1);
        assert_eq!(outcome.summary.match_count, 2);
        assert!(!outcome.summary.cancelled);
    }

    #[test]
    fn test_empty_keyword_rejected() {
        let result = Scanner::new(ScanRequest::new(".", "  ")).start();
        assert!(matches!(result, Err(ScanError::EmptyKeyword)));
    }

    #[test]
    fn test_missing_root_is_empty_scan() {
        let dir = tempdir().unwrap();
        let outcome = scan(&ScanRequest::new(dir.path().join("nope"), "x")).unwrap();
        assert_eq!(outcome.summary.total_files, 0);
        assert_eq!(outcome.summary.files_scanned, 0);
        assert!(outcome.records.is_empty());
    }

    #[test]
    fn test_handle_reaches_terminal_state() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "x\n").unwrap();

        let handle = Scanner::new(ScanRequest::new(dir.path(), "x")).start().unwrap();
        assert!(matches!(
            handle.state(),
            ScanState::Running | ScanState::Completed
        ));
        let token = handle.cancellation_token();
        let outcome = handle.wait().unwrap();
        // Cancelling after the end is a no-op
        token.cancel();
        assert!(!outcome.is_cancelled());
        assert_eq!(outcome.records.len(), 1);
    }

    #[test]
    fn test_state_round_trips_through_u8() {
        for state in [
            ScanState::Idle,
            ScanState::Running,
            ScanState::Completed,
            ScanState::Cancelled,
            ScanState::Failed,
        ] {
            assert_eq!(ScanState::from_u8(state as u8), state);
        }
        assert!(ScanState::Failed.is_terminal());
        assert!(!ScanState::Running.is_terminal());
    }

    #[test]
    fn test_default_thread_count_bounds() {
        let n = default_thread_count();
        assert!((MIN_WORKERS..=MAX_WORKERS).contains(&n));
    }
}
