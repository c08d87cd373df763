use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Longest current-file path shown by [`ProgressUpdate::display_path`]
pub const DISPLAY_PATH_CHARS: usize = 80;

/// A point-in-time view of scan progress, handed to the presentation layer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressUpdate {
    /// Most recently completed file
    pub current_file: Option<PathBuf>,
    pub files_scanned: usize,
    pub total_files: usize,
    pub files_with_matches: usize,
    pub matches_found: usize,
    /// Scanned / total, in [0, 1]
    pub fraction: f64,
}

impl ProgressUpdate {
    /// Current file shortened to its last `max_chars` characters
    pub fn display_path(&self, max_chars: usize) -> String {
        let Some(path) = &self.current_file else {
            return String::new();
        };
        let text = path.display().to_string();
        let count = text.chars().count();
        if count <= max_chars {
            return text;
        }
        let tail: String = text.chars().skip(count - max_chars).collect();
        format!("...{}", tail)
    }
}

/// Receives throttled progress updates.
///
/// Implemented for any `Fn(&ProgressUpdate)` closure that can be shared across threads.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, update: &ProgressUpdate);
}

impl<F> ProgressReporter for F
where
    F: Fn(&ProgressUpdate) + Send + Sync,
{
    fn report(&self, update: &ProgressUpdate) {
        self(update)
    }
}

/// Reporter that drops every update
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn report(&self, _update: &ProgressUpdate) {}
}

/// Live progress counters of one scan.
///
/// Only the coordinator writes them; anyone holding the scan handle may read them.
#[derive(Debug, Default)]
pub struct ScanProgress {
    files_scanned: AtomicUsize,
    total_files: AtomicUsize,
    files_with_matches: AtomicUsize,
    matches_found: AtomicUsize,
    current_file: Mutex<Option<PathBuf>>,
}

impl ScanProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_total(&self, total: usize) {
        self.total_files.store(total, Ordering::Release);
    }

    /// Counts one fully scanned file and its matches
    pub fn record_file(&self, path: &Path, matches: usize) {
        self.files_scanned.fetch_add(1, Ordering::AcqRel);
        if matches > 0 {
            self.files_with_matches.fetch_add(1, Ordering::AcqRel);
            self.matches_found.fetch_add(matches, Ordering::AcqRel);
        }
        let mut current = self
            .current_file
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *current = Some(path.to_path_buf());
    }

    pub fn files_scanned(&self) -> usize {
        self.files_scanned.load(Ordering::Acquire)
    }

    pub fn total_files(&self) -> usize {
        self.total_files.load(Ordering::Acquire)
    }

    pub fn files_with_matches(&self) -> usize {
        self.files_with_matches.load(Ordering::Acquire)
    }

    pub fn matches_found(&self) -> usize {
        self.matches_found.load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> ProgressUpdate {
        let files_scanned = self.files_scanned();
        let total_files = self.total_files();
        let fraction = if total_files == 0 {
            0.0
        } else {
            (files_scanned as f64 / total_files as f64).min(1.0)
        };
        ProgressUpdate {
            current_file: self
                .current_file
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .clone(),
            files_scanned,
            total_files,
            files_with_matches: self.files_with_matches(),
            matches_found: self.matches_found(),
            fraction,
        }
    }
}

/// Rate limiter for progress pushes: latest value wins, at most one flush per interval.
///
/// `offer` passes a value straight through when the interval has elapsed since the last
/// flush and parks it in a single slot otherwise, replacing whatever was parked before.
/// `poll` releases the parked value once the interval has elapsed; `flush` releases it
/// unconditionally.
#[derive(Debug)]
pub struct Throttle<T> {
    interval: Duration,
    last_flush: Option<Instant>,
    pending: Option<T>,
}

impl<T> Throttle<T> {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_flush: None,
            pending: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    fn is_due(&self, now: Instant) -> bool {
        self.last_flush
            .map_or(true, |last| now.duration_since(last) >= self.interval)
    }

    pub fn offer(&mut self, value: T) -> Option<T> {
        let now = Instant::now();
        if self.is_due(now) {
            self.last_flush = Some(now);
            self.pending = None;
            Some(value)
        } else {
            self.pending = Some(value);
            None
        }
    }

    pub fn poll(&mut self) -> Option<T> {
        let now = Instant::now();
        if self.pending.is_some() && self.is_due(now) {
            self.last_flush = Some(now);
            self.pending.take()
        } else {
            None
        }
    }

    pub fn flush(&mut self) -> Option<T> {
        let value = self.pending.take();
        if value.is_some() {
            self.last_flush = Some(Instant::now());
        }
        value
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_throttle_passes_first_value() {
        let mut throttle = Throttle::new(Duration::from_secs(60));
        assert_eq!(throttle.offer(1), Some(1));
        assert_eq!(throttle.offer(2), None);
        assert_eq!(throttle.offer(3), None);
        assert!(throttle.has_pending());
        assert_eq!(throttle.poll(), None);
        // Latest value wins
        assert_eq!(throttle.flush(), Some(3));
        assert_eq!(throttle.flush(), None);
    }

    #[test]
    fn test_throttle_zero_interval_never_buffers() {
        let mut throttle = Throttle::new(Duration::ZERO);
        for i in 0..10 {
            assert_eq!(throttle.offer(i), Some(i));
        }
        assert!(!throttle.has_pending());
    }

    #[test]
    fn test_throttle_poll_after_interval() {
        let mut throttle = Throttle::new(Duration::from_millis(50));
        assert_eq!(throttle.offer("a"), Some("a"));
        assert_eq!(throttle.offer("b"), None);
        thread::sleep(Duration::from_millis(80));
        assert_eq!(throttle.poll(), Some("b"));
        assert_eq!(throttle.poll(), None);
    }

    #[test]
    fn test_progress_counters() {
        let progress = ScanProgress::new();
        progress.set_total(4);
        progress.record_file(Path::new("a.py"), 0);
        progress.record_file(Path::new("b.py"), 3);

        let update = progress.snapshot();
        assert_eq!(update.files_scanned, 2);
        assert_eq!(update.total_files, 4);
        assert_eq!(update.files_with_matches, 1);
        assert_eq!(update.matches_found, 3);
        assert_eq!(update.fraction, 0.5);
        assert_eq!(update.current_file, Some(PathBuf::from("b.py")));
    }

    #[test]
    fn test_empty_progress_fraction() {
        let update = ScanProgress::new().snapshot();
        assert_eq!(update.fraction, 0.0);
        assert_eq!(update.display_path(DISPLAY_PATH_CHARS), "");
    }

    #[test]
    fn test_display_path_truncates() {
        let long = format!("/{}/file.rs", "d".repeat(120));
        let update = ProgressUpdate {
            current_file: Some(PathBuf::from(&long)),
            files_scanned: 1,
            total_files: 1,
            files_with_matches: 0,
            matches_found: 0,
            fraction: 1.0,
        };
        let shown = update.display_path(DISPLAY_PATH_CHARS);
        assert!(shown.starts_with("..."));
        assert!(shown.ends_with("/file.rs"));
        assert_eq!(shown.chars().count(), DISPLAY_PATH_CHARS + 3);

        let short = ProgressUpdate {
            current_file: Some(PathBuf::from("src/lib.rs")),
            ..update
        };
        assert_eq!(short.display_path(DISPLAY_PATH_CHARS), "src/lib.rs");
    }

    #[test]
    fn test_closure_reporter() {
        let seen = Mutex::new(Vec::new());
        let reporter = |update: &ProgressUpdate| seen.lock().unwrap().push(update.files_scanned);
        reporter.report(&ScanProgress::new().snapshot());
        assert_eq!(*seen.lock().unwrap(), vec![0]);
    }
}
