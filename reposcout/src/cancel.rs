use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// How long a paused worker sleeps between two looks at its flags
pub const PAUSE_POLL_INTERVAL: Duration = Duration::from_millis(80);

/// Set-once cancellation flag shared by one scan.
///
/// Cloning is cheap and every clone observes the same flag. Cancelling is idempotent and a
/// token is never reset.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signals cancellation; safe to call any number of times
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// Optional pause layer on top of cancellation.
///
/// While paused, workers block at their next checkpoint. Pausing is not a scan state: a
/// paused scan is still running and cancellation always wins over a pause.
#[derive(Debug, Clone, Default)]
pub struct PauseGate {
    paused: Arc<AtomicBool>,
}

impl PauseGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::Release);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::Release);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Blocks while the gate is paused, returning early once any of `tokens` fires.
    ///
    /// Returns true if one of the tokens was set.
    pub fn wait_while_paused(&self, tokens: &[&CancellationToken]) -> bool {
        let fired = || tokens.iter().any(|t| t.is_cancelled());
        while self.is_paused() {
            if fired() {
                return true;
            }
            thread::sleep(PAUSE_POLL_INTERVAL);
        }
        fired()
    }
}

/// The flags a worker consults at every file and line boundary
#[derive(Debug, Clone, Default)]
pub struct Checkpoint {
    /// Caller-driven cancellation
    pub cancel: CancellationToken,
    /// Coordinator-driven stop (safeguard reached); not a cancellation
    pub halt: CancellationToken,
    pub pause: PauseGate,
}

impl Checkpoint {
    pub fn new(cancel: CancellationToken, pause: PauseGate) -> Self {
        Self {
            cancel,
            halt: CancellationToken::new(),
            pause,
        }
    }

    /// Waits out a pause, then reports whether work should stop.
    ///
    /// A cancellation or a halt releases a paused worker immediately.
    pub fn should_stop(&self) -> bool {
        self.pause.wait_while_paused(&[&self.cancel, &self.halt])
    }
}
