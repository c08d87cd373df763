/// This module implements the concurrent scanning engine.
///
/// # Work distribution
///
/// A scan runs on three kinds of threads:
///
/// 1. **Coordinator**: enumerates the files, owns the progress counters and the
///    [`ResultAggregator`](crate::results::ResultAggregator), and is the only place where
///    results are committed.
/// 2. **Dispatcher**: hands one task per file to a bounded Rayon pool and returns once the
///    pool has drained.
/// 3. **Workers**: each runs comment filtering, matching and context extraction over one
///    file at a time, then sends the file's outcome back over a bounded channel:
///
/// ```rust,ignore
/// pool.install(|| {
///     files.par_iter().for_each_with(sender, |sender, path| {
///         let outcome = processor.process_file(path, &checkpoint);
///         sender.send(outcome).ok();
///     });
/// });
///
/// // coordinator
/// while let Ok(outcome) = receiver.recv() {
///     aggregator.add_file(outcome.matches);
/// }
/// ```
///
/// There is no ordering across files: records arrive in completion order. Within a file,
/// lines are processed strictly in sequence because the comment filter carries block state
/// from one line to the next.
///
/// # Cooperative cancellation
///
/// Workers look at a [`Checkpoint`](crate::cancel::Checkpoint) before each file and before
/// each line. Once the cancellation token is set, no new file starts, in-flight files stop
/// at their next line and their partial matches are dropped. The coordinator keeps
/// draining the channel so no worker is left blocked on a full buffer.
///
/// Pausing is layered on the same checkpoints: a paused worker sleeps in short intervals
/// until it is resumed or cancelled. It is not a scan state.
///
/// # Progress
///
/// Every committed file updates the shared counters immediately. Only the callback is
/// throttled, through a latest-value-wins [`Throttle`](crate::progress::Throttle), and a
/// final update is always delivered when the scan ends.
pub mod context;
pub mod engine;
pub mod matcher;
pub mod processor;

pub use context::ContextExtractor;
pub use engine::{default_thread_count, scan, ScanHandle, ScanState, Scanner};
pub use matcher::LineMatcher;
pub use processor::{FileOutcome, FileProcessor, FileStatus};
