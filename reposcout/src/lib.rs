pub mod cancel;
pub mod comments;
pub mod config;
pub mod errors;
pub mod filters;
pub mod metrics;
pub mod progress;
pub mod results;
pub mod search;

pub use cancel::{CancellationToken, PauseGate};
pub use config::{ContextConfig, MatchMode, ScanRequest, TokenSplit};
pub use errors::{ScanError, ScanResult};
pub use progress::{ProgressReporter, ProgressUpdate};
pub use results::{MatchRecord, ScanOutcome, ScanSummary};
pub use search::{scan, ScanHandle, ScanState, Scanner};
