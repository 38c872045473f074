//! Wall-clock deadline for script execution.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Terminates execution on an isolate unless disarmed before the deadline.
///
/// Dropping the watchdog disarms it.
pub(crate) struct Watchdog {
    disarm: Option<mpsc::Sender<()>>,
    thread: Option<JoinHandle<bool>>,
}

impl Watchdog {
    pub(crate) fn arm(handle: v8::IsolateHandle, timeout: Duration) -> Self {
        let (tx, rx) = mpsc::channel::<()>();

        let thread = thread::Builder::new()
            .name("capsule-watchdog".to_string())
            .spawn(move || match rx.recv_timeout(timeout) {
                Err(RecvTimeoutError::Timeout) => {
                    tracing::warn!("Execution exceeded {:?}, terminating", timeout);
                    handle.terminate_execution();
                    true
                }
                _ => false,
            });

        let thread = match thread {
            Ok(thread) => Some(thread),
            Err(e) => {
                tracing::warn!("Failed to spawn watchdog thread: {}", e);
                None
            }
        };

        Self {
            disarm: Some(tx),
            thread,
        }
    }

    /// Stop the watchdog. Returns whether it already fired.
    pub(crate) fn disarm(mut self) -> bool {
        self.stop()
    }

    fn stop(&mut self) -> bool {
        // Closing the channel wakes the thread immediately.
        self.disarm.take();
        self.thread
            .take()
            .and_then(|thread| thread.join().ok())
            .unwrap_or(false)
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.stop();
    }
}
