use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use indicatif::ProgressBar;
use reposcout::{CancellationToken, PauseGate};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::warn;

const KEY_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyAction {
    TogglePause,
    RequestCancel,
    Ignore,
}

fn action_for(key: &KeyEvent) -> KeyAction {
    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            KeyAction::RequestCancel
        }
        KeyCode::Char('p') | KeyCode::Char('P') => KeyAction::TogglePause,
        KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => KeyAction::RequestCancel,
        _ => KeyAction::Ignore,
    }
}

fn confirms(key: &KeyEvent) -> bool {
    matches!(key.code, KeyCode::Char('y') | KeyCode::Char('Y'))
}

/// Keyboard pause/cancel controls for a running scan.
///
/// Puts the terminal in raw mode until dropped.
pub struct Controls {
    stop: Arc<AtomicBool>,
    listener: Option<JoinHandle<()>>,
}

impl Controls {
    pub fn spawn(cancel: CancellationToken, pause: PauseGate, bar: ProgressBar) -> io::Result<Self> {
        enable_raw_mode()?;
        bar.println("Controls: [p] pause/resume  [q/Esc] cancel");

        let stop = Arc::new(AtomicBool::new(false));
        let listener = {
            let stop = Arc::clone(&stop);
            thread::Builder::new()
                .name("reposcout-controls".to_string())
                .spawn(move || listen(&stop, &cancel, &pause, &bar))?
        };

        Ok(Self {
            stop,
            listener: Some(listener),
        })
    }
}

impl Drop for Controls {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(listener) = self.listener.take() {
            let _ = listener.join();
        }
        if let Err(e) = disable_raw_mode() {
            warn!("Failed to restore terminal mode: {}", e);
        }
    }
}

fn listen(stop: &AtomicBool, cancel: &CancellationToken, pause: &PauseGate, bar: &ProgressBar) {
    while !cancel.is_cancelled() {
        let Some(key) = next_key(stop) else {
            return;
        };

        match action_for(&key) {
            KeyAction::TogglePause => {
                if pause.is_paused() {
                    pause.resume();
                    bar.println("Resumed");
                } else {
                    pause.pause();
                    bar.println("Paused, press p to resume");
                }
            }
            KeyAction::RequestCancel => {
                let was_paused = pause.is_paused();
                pause.pause();
                bar.println("Cancel scan? [y/N]");
                match next_key(stop) {
                    Some(answer) if confirms(&answer) => {
                        cancel.cancel();
                        bar.println("Cancelling...");
                    }
                    Some(_) => {
                        if !was_paused {
                            pause.resume();
                        }
                        bar.println("Continuing");
                    }
                    None => return,
                }
            }
            KeyAction::Ignore => {}
        }
    }
}

/// Waits for the next key press; None once `stop` is set or the terminal fails
fn next_key(stop: &AtomicBool) -> Option<KeyEvent> {
    while !stop.load(Ordering::Acquire) {
        match event::poll(KEY_POLL_INTERVAL) {
            Ok(true) => match event::read() {
                Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => return Some(key),
                Ok(_) => continue,
                Err(_) => return None,
            },
            Ok(false) => continue,
            Err(_) => return None,
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    #[test]
    fn test_key_actions() {
        assert_eq!(
            action_for(&key(KeyCode::Char('p'), KeyModifiers::NONE)),
            KeyAction::TogglePause
        );
        assert_eq!(
            action_for(&key(KeyCode::Esc, KeyModifiers::NONE)),
            KeyAction::RequestCancel
        );
        assert_eq!(
            action_for(&key(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            KeyAction::RequestCancel
        );
        assert_eq!(
            action_for(&key(KeyCode::Char('c'), KeyModifiers::NONE)),
            KeyAction::Ignore
        );
    }

    #[test]
    fn test_only_y_confirms() {
        assert!(confirms(&key(KeyCode::Char('y'), KeyModifiers::NONE)));
        assert!(confirms(&key(KeyCode::Char('Y'), KeyModifiers::SHIFT)));
        assert!(!confirms(&key(KeyCode::Char('n'), KeyModifiers::NONE)));
        assert!(!confirms(&key(KeyCode::Enter, KeyModifiers::NONE)));
    }
}
