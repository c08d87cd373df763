use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::info;

use crate::search::processor::{LARGE_FILE_THRESHOLD, SMALL_FILE_THRESHOLD};

/// Tracks I/O and throughput counters of a scan
#[derive(Debug, Clone)]
pub struct ScanMetrics {
    // Volume
    bytes_read: Arc<AtomicU64>,
    lines_examined: Arc<AtomicU64>,

    // Read strategy
    small_files_processed: Arc<AtomicU64>,
    buffered_files_processed: Arc<AtomicU64>,
    mmap_files_processed: Arc<AtomicU64>,

    // Failures
    read_failures: Arc<AtomicU64>,
    lossy_files: Arc<AtomicU64>,
}

impl ScanMetrics {
    /// Creates a new ScanMetrics instance
    pub fn new() -> Self {
        Self {
            bytes_read: Arc::new(AtomicU64::new(0)),
            lines_examined: Arc::new(AtomicU64::new(0)),
            small_files_processed: Arc::new(AtomicU64::new(0)),
            buffered_files_processed: Arc::new(AtomicU64::new(0)),
            mmap_files_processed: Arc::new(AtomicU64::new(0)),
            read_failures: Arc::new(AtomicU64::new(0)),
            lossy_files: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Records a file read and the strategy its size selects
    pub fn record_file_read(&self, size: u64) {
        self.bytes_read.fetch_add(size, Ordering::Relaxed);
        if size < SMALL_FILE_THRESHOLD {
            self.small_files_processed.fetch_add(1, Ordering::Relaxed);
        } else if size >= LARGE_FILE_THRESHOLD {
            self.mmap_files_processed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.buffered_files_processed
                .fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_lines(&self, lines: u64) {
        self.lines_examined.fetch_add(lines, Ordering::Relaxed);
    }

    pub fn record_read_failure(&self) {
        self.read_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a file whose invalid UTF-8 was replaced
    pub fn record_lossy_decode(&self) {
        self.lossy_files.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_stats(&self) -> ScanStats {
        ScanStats {
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
            lines_examined: self.lines_examined.load(Ordering::Relaxed),
            small_files: self.small_files_processed.load(Ordering::Relaxed),
            buffered_files: self.buffered_files_processed.load(Ordering::Relaxed),
            mmap_files: self.mmap_files_processed.load(Ordering::Relaxed),
            read_failures: self.read_failures.load(Ordering::Relaxed),
            lossy_files: self.lossy_files.load(Ordering::Relaxed),
        }
    }

    /// Logs current scan statistics
    pub fn log_stats(&self) {
        let stats = self.get_stats();
        info!(
            "Scan I/O stats:\n\
             Bytes read: {}\n\
             Lines examined: {}\n\
             Files read (small/buffered/mmap): {}/{}/{}\n\
             Read failures: {}\n\
             Lossy decodes: {}",
            stats.bytes_read,
            stats.lines_examined,
            stats.small_files,
            stats.buffered_files,
            stats.mmap_files,
            stats.read_failures,
            stats.lossy_files
        );
    }
}

impl Default for ScanMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of [`ScanMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub bytes_read: u64,
    pub lines_examined: u64,
    pub small_files: u64,
    pub buffered_files: u64,
    pub mmap_files: u64,
    pub read_failures: u64,
    pub lossy_files: u64,
}
