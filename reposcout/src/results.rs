/// This module implements scan result types and their aggregation.
///
/// # Ownership of results
///
/// Each worker owns the matches of the file it is processing. Only when a file has been
/// read to the end are its matches moved, in one piece, to the coordinator:
///
/// ```rust,ignore
/// // worker
/// let outcome: FileOutcome = processor.process_file(&path, &checkpoint);
/// sender.send(outcome)?;
///
/// // coordinator, the single merge point
/// if outcome.is_complete() {
///     aggregator.add_file(outcome.matches);
/// }
/// ```
///
/// A file abandoned half-way (cancellation) never reaches the aggregator, so partial
/// results can not leak into the final set. After the scan reaches a terminal state the
/// aggregator is consumed by `finish`, producing an immutable [`ScanOutcome`].
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::{Duration, Instant, SystemTime};

use crate::config::ScanRequest;

/// A single matching line
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MatchRecord {
    /// The file containing the match
    pub path: PathBuf,
    /// 1-based line number
    pub line_number: usize,
    /// The raw line, without its line terminator
    pub line: String,
    /// Context window around the line, when context extraction is enabled
    pub context: Option<String>,
}

/// Final counters of one scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanSummary {
    /// The request that produced this scan, kept so it can be re-run
    pub request: ScanRequest,
    #[serde(with = "rfc3339")]
    pub started_at: SystemTime,
    #[serde(with = "rfc3339")]
    pub finished_at: SystemTime,
    #[serde(with = "human_duration")]
    pub duration: Duration,
    pub files_scanned: usize,
    pub total_files: usize,
    pub files_with_matches: usize,
    pub match_count: usize,
    /// Whether the scan ended through cancellation
    pub cancelled: bool,
    /// Whether the safeguard cap stopped the scan early
    pub safeguard_reached: bool,
}

impl ScanSummary {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// "Completed" or "Cancelled"
    pub fn status(&self) -> &'static str {
        if self.cancelled {
            "Cancelled"
        } else {
            "Completed"
        }
    }
}

impl fmt::Display for ScanSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Status: {}", self.status())?;
        writeln!(f, "Keyword: {}", self.request.keyword)?;
        writeln!(f, "Root: {}", self.request.root_path.display())?;
        writeln!(
            f,
            "Started: {}",
            humantime::format_rfc3339_seconds(self.started_at)
        )?;
        writeln!(
            f,
            "Finished: {}",
            humantime::format_rfc3339_seconds(self.finished_at)
        )?;
        writeln!(
            f,
            "Duration: {}",
            humantime::format_duration(Duration::from_millis(self.duration.as_millis() as u64))
        )?;
        writeln!(
            f,
            "Files scanned: {}/{}",
            self.files_scanned, self.total_files
        )?;
        writeln!(f, "Files with matches: {}", self.files_with_matches)?;
        write!(f, "Matches: {}", self.match_count)?;
        if self.safeguard_reached {
            write!(f, "\nSafeguard limit of {} files reached", self.request.safeguard)?;
        }
        Ok(())
    }
}

/// Everything a finished scan produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanOutcome {
    /// Match records in completion order
    pub records: Vec<MatchRecord>,
    pub summary: ScanSummary,
}

impl ScanOutcome {
    pub fn is_cancelled(&self) -> bool {
        self.summary.cancelled
    }

    /// Records ordered by path, then line number
    pub fn sorted_records(&self) -> Vec<&MatchRecord> {
        let mut records: Vec<&MatchRecord> = self.records.iter().collect();
        records.sort_by(|a, b| {
            a.path
                .cmp(&b.path)
                .then(a.line_number.cmp(&b.line_number))
        });
        records
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Wall-clock start plus a monotonic clock for the duration
#[derive(Debug, Clone, Copy)]
pub struct ScanTimer {
    started_at: SystemTime,
    started: Instant,
}

impl ScanTimer {
    pub fn start() -> Self {
        Self {
            started_at: SystemTime::now(),
            started: Instant::now(),
        }
    }

    pub fn started_at(&self) -> SystemTime {
        self.started_at
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

/// Accumulates fully scanned files into the final outcome
#[derive(Debug, Default)]
pub struct ResultAggregator {
    records: Vec<MatchRecord>,
    files_scanned: usize,
    files_with_matches: usize,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the matches of one fully scanned file (possibly none)
    pub fn add_file(&mut self, matches: Vec<MatchRecord>) {
        self.files_scanned += 1;
        if !matches.is_empty() {
            self.files_with_matches += 1;
            self.records.extend(matches);
        }
    }

    pub fn files_scanned(&self) -> usize {
        self.files_scanned
    }

    pub fn files_with_matches(&self) -> usize {
        self.files_with_matches
    }

    pub fn match_count(&self) -> usize {
        self.records.len()
    }

    /// Seals the aggregate into an outcome
    pub fn finish(
        self,
        request: ScanRequest,
        total_files: usize,
        timer: ScanTimer,
        cancelled: bool,
        safeguard_reached: bool,
    ) -> ScanOutcome {
        let duration = timer.elapsed();
        let summary = ScanSummary {
            request,
            started_at: timer.started_at(),
            finished_at: timer.started_at() + duration,
            duration,
            files_scanned: self.files_scanned,
            total_files,
            files_with_matches: self.files_with_matches,
            match_count: self.records.len(),
            cancelled,
            safeguard_reached,
        };
        ScanOutcome {
            records: self.records,
            summary,
        }
    }
}

mod rfc3339 {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::SystemTime;

    pub fn serialize<S: Serializer>(time: &SystemTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&humantime::format_rfc3339_millis(*time))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SystemTime, D::Error> {
        let text = String::deserialize(deserializer)?;
        humantime::parse_rfc3339(&text).map_err(serde::de::Error::custom)
    }
}

mod human_duration {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&humantime::format_duration(*duration))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let text = String::deserialize(deserializer)?;
        humantime::parse_duration(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(path: &str, line_number: usize) -> MatchRecord {
        MatchRecord {
            path: PathBuf::from(path),
            line_number,
            line: format!("line {}", line_number),
            context: None,
        }
    }

    #[test]
    fn test_aggregator_counts() {
        let mut aggregator = ResultAggregator::new();
        aggregator.add_file(vec![record("a.py", 1), record("a.py", 7)]);
        aggregator.add_file(vec![]);
        aggregator.add_file(vec![record("c.py", 2)]);

        assert_eq!(aggregator.files_scanned(), 3);
        assert_eq!(aggregator.files_with_matches(), 2);
        assert_eq!(aggregator.match_count(), 3);

        let outcome = aggregator.finish(
            ScanRequest::new(".", "line"),
            5,
            ScanTimer::start(),
            false,
            false,
        );
        assert_eq!(outcome.summary.files_scanned, 3);
        assert_eq!(outcome.summary.total_files, 5);
        assert_eq!(outcome.summary.files_with_matches, 2);
        assert_eq!(outcome.summary.match_count, 3);
        assert!(!outcome.is_cancelled());
        assert!(outcome.summary.finished_at >= outcome.summary.started_at);
    }

    #[test]
    fn test_sorted_records() {
        let mut aggregator = ResultAggregator::new();
        aggregator.add_file(vec![record("b.py", 3)]);
        aggregator.add_file(vec![record("a.py", 9), record("a.py", 10)]);

        let outcome = aggregator.finish(
            ScanRequest::new(".", "x"),
            2,
            ScanTimer::start(),
            false,
            false,
        );
        let order: Vec<(String, usize)> = outcome
            .sorted_records()
            .iter()
            .map(|r| (r.path.display().to_string(), r.line_number))
            .collect();
        assert_eq!(
            order,
            vec![
                ("a.py".to_string(), 9),
                ("a.py".to_string(), 10),
                ("b.py".to_string(), 3)
            ]
        );
    }

    #[test]
    fn test_summary_json_and_display() {
        let outcome = ResultAggregator::new().finish(
            ScanRequest::new("/repo", "secret"),
            0,
            ScanTimer::start(),
            true,
            false,
        );
        let summary = outcome.summary;

        let json = summary.to_json().unwrap();
        assert!(json.contains("\"cancelled\":true"));
        assert!(json.contains("\"keyword\":\"secret\""));

        let parsed: ScanSummary = serde_json::from_str(&json).unwrap();
        assert!(parsed.cancelled);
        assert_eq!(parsed.request.keyword, "secret");

        let text = summary.to_string();
        assert!(text.starts_with("Status: Cancelled"));
        assert!(text.contains("Files scanned: 0/0"));
    }
}
