use memmap2::Mmap;
use std::borrow::Cow;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, trace, warn};

use super::context::ContextExtractor;
use super::matcher::LineMatcher;
use crate::cancel::Checkpoint;
use crate::comments::{CommentFilter, LineClass};
use crate::config::ScanRequest;
use crate::errors::{ScanError, ScanResult};
use crate::metrics::ScanMetrics;
use crate::results::MatchRecord;

// Constants for file reading
const BUFFER_CAPACITY: usize = 65536;
pub(crate) const SMALL_FILE_THRESHOLD: u64 = 32 * 1024; // 32KB
pub(crate) const LARGE_FILE_THRESHOLD: u64 = 10 * 1024 * 1024; // 10MB

/// How a file task ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    /// Every line was examined
    Scanned,
    /// The file could not be read; counts as scanned with zero matches
    Unreadable,
    /// Stopped at a checkpoint; partial matches were dropped
    Aborted,
}

/// Result of one file task, sent from a worker to the coordinator
#[derive(Debug, Clone)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub status: FileStatus,
    pub matches: Vec<MatchRecord>,
}

impl FileOutcome {
    fn new(path: &Path, status: FileStatus, matches: Vec<MatchRecord>) -> Self {
        Self {
            path: path.to_path_buf(),
            status,
            matches,
        }
    }

    /// Whether this outcome may be committed to the results
    pub fn is_complete(&self) -> bool {
        self.status != FileStatus::Aborted
    }
}

/// Decodes file bytes, replacing invalid UTF-8
fn decode_lossy(bytes: &[u8], path: &Path, metrics: &ScanMetrics) -> String {
    let cow = String::from_utf8_lossy(bytes);
    if let Cow::Owned(_) = cow {
        warn!("Invalid UTF-8 replaced in file: {}", path.display());
        metrics.record_lossy_decode();
    }
    cow.into_owned()
}

/// Runs comment filtering, matching and context extraction over single files
#[derive(Debug, Clone)]
pub struct FileProcessor {
    matcher: LineMatcher,
    context: Option<ContextExtractor>,
    context_matcher: Option<LineMatcher>,
    ignore_comments: bool,
    metrics: ScanMetrics,
}

impl FileProcessor {
    /// Creates a processor for `request`, recording I/O counters into `metrics`
    pub fn new(request: &ScanRequest, metrics: ScanMetrics) -> Self {
        let matcher = LineMatcher::from_request(request);
        let context = request.context.as_ref().map(ContextExtractor::from_config);
        let context_matcher = request
            .context
            .as_ref()
            .and_then(|c| c.context_keyword())
            .map(|kw| matcher.with_keyword(kw));

        Self {
            matcher,
            context,
            context_matcher,
            ignore_comments: request.ignore_comments,
            metrics,
        }
    }

    pub fn metrics(&self) -> &ScanMetrics {
        &self.metrics
    }

    /// Processes one file task.
    ///
    /// Read failures are swallowed: the file reports zero matches. A stop observed at a
    /// file or line checkpoint discards everything gathered for the file.
    pub fn process_file(&self, path: &Path, checkpoint: &Checkpoint) -> FileOutcome {
        if checkpoint.should_stop() {
            return FileOutcome::new(path, FileStatus::Aborted, Vec::new());
        }

        let contents = match self.read_file(path) {
            Ok(contents) => contents,
            Err(e) => {
                debug!("Skipping unreadable file {}: {}", path.display(), e);
                self.metrics.record_read_failure();
                return FileOutcome::new(path, FileStatus::Unreadable, Vec::new());
            }
        };

        match self.scan_contents(path, &contents, checkpoint) {
            Some(matches) => FileOutcome::new(path, FileStatus::Scanned, matches),
            None => FileOutcome::new(path, FileStatus::Aborted, Vec::new()),
        }
    }

    /// Scans already decoded contents. Returns None when stopped at a line checkpoint.
    pub fn scan_contents(
        &self,
        path: &Path,
        contents: &str,
        checkpoint: &Checkpoint,
    ) -> Option<Vec<MatchRecord>> {
        let lines = split_lines(contents);
        self.metrics.record_lines(lines.len() as u64);

        let classes = if self.ignore_comments {
            let mut filter = CommentFilter::for_path(path);
            let mut classes = Vec::with_capacity(lines.len());
            for line in &lines {
                if checkpoint.should_stop() {
                    return None;
                }
                classes.push(filter.classify(strip_terminator(line)));
            }
            Some(classes)
        } else {
            None
        };

        let mut matches = Vec::new();
        for (idx, raw) in lines.iter().enumerate() {
            if checkpoint.should_stop() {
                return None;
            }

            let line = strip_terminator(raw);
            let candidate = match &classes {
                Some(classes) => match &classes[idx] {
                    LineClass::Code(code) => code.as_str(),
                    LineClass::Blank | LineClass::Comment => continue,
                },
                None => line,
            };
            if !self.matcher.is_match(candidate) {
                continue;
            }

            let context = match &self.context {
                Some(extractor) => {
                    let block = extractor.extract(&lines, classes.as_deref(), idx);
                    if let Some(secondary) = &self.context_matcher {
                        if !secondary.window_matches(&block) {
                            trace!(
                                "Dropping match at {}:{}, context keyword missing",
                                path.display(),
                                idx + 1
                            );
                            continue;
                        }
                    }
                    Some(block)
                }
                None => None,
            };

            matches.push(MatchRecord {
                path: path.to_path_buf(),
                line_number: idx + 1,
                line: line.to_string(),
                context,
            });
        }

        Some(matches)
    }

    /// Reads and decodes a file, picking the strategy by size
    fn read_file(&self, path: &Path) -> ScanResult<String> {
        let size = std::fs::metadata(path)
            .map_err(|e| ScanError::from_io(path, e))?
            .len();

        let contents = if size < SMALL_FILE_THRESHOLD {
            self.read_small_file(path)?
        } else if size >= LARGE_FILE_THRESHOLD {
            self.read_mmap_file(path)?
        } else {
            self.read_buffered_file(path)?
        };

        self.metrics.record_file_read(size);
        Ok(contents)
    }

    fn read_small_file(&self, path: &Path) -> ScanResult<String> {
        trace!("Reading small file: {}", path.display());
        let bytes = std::fs::read(path).map_err(|e| ScanError::from_io(path, e))?;
        Ok(decode_lossy(&bytes, path, &self.metrics))
    }

    fn read_buffered_file(&self, path: &Path) -> ScanResult<String> {
        trace!("Reading buffered file: {}", path.display());
        let file = File::open(path).map_err(|e| ScanError::from_io(path, e))?;
        let mut reader = BufReader::with_capacity(BUFFER_CAPACITY, file);
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Ok(decode_lossy(&bytes, path, &self.metrics))
    }

    fn read_mmap_file(&self, path: &Path) -> ScanResult<String> {
        trace!("Memory mapping file: {}", path.display());
        let file = File::open(path).map_err(|e| ScanError::from_io(path, e))?;
        // The map is dropped before this function returns.
        let mmap = unsafe { Mmap::map(&file) }?;
        Ok(decode_lossy(&mmap, path, &self.metrics))
    }
}

/// Splits text into lines that keep their terminators.
///
/// `\n`, `\r\n` and a lone `\r` each end a line.
pub(crate) fn split_lines(contents: &str) -> Vec<&str> {
    let bytes = contents.as_bytes();
    let mut lines = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        let end = match bytes[i] {
            b'\n' => i,
            b'\r' if bytes.get(i + 1) == Some(&b'\n') => i + 1,
            b'\r' => i,
            _ => {
                i += 1;
                continue;
            }
        };
        lines.push(&contents[start..=end]);
        start = end + 1;
        i = end + 1;
    }
    if start < bytes.len() {
        lines.push(&contents[start..]);
    }
    lines
}

pub(crate) fn strip_terminator(line: &str) -> &str {
    line.trim_end_matches(['\n', '\r'])
}
