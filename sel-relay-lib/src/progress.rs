//! Console spinner shown while a response is being read.
//!
//! The spinner is tied to a [`ProgressGuard`]: dropping the guard aborts the
//! background task, so every exit path of the read loop stops it.

use std::io::Write;
use std::time::Duration;

use tokio::task::JoinHandle;

const SPINNER_CHARS: [char; 4] = ['|', '/', '-', '\\'];
const SPINNER_INTERVAL: Duration = Duration::from_millis(100);

/// Scope guard owning the spinner task.
#[derive(Debug)]
pub struct ProgressGuard {
    task: Option<JoinHandle<()>>,
}

impl ProgressGuard {
    /// Start a spinner on stderr, or an inert guard when `enabled` is false.
    pub fn start(enabled: bool) -> Self {
        if !enabled {
            return Self { task: None };
        }
        let task = tokio::spawn(async {
            let mut idx = 0;
            loop {
                idx = (idx + 1) % SPINNER_CHARS.len();
                let mut stderr = std::io::stderr();
                let _ = write!(stderr, "{}\r", SPINNER_CHARS[idx]);
                let _ = stderr.flush();
                tokio::time::sleep(SPINNER_INTERVAL).await;
            }
        });
        Self { task: Some(task) }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for ProgressGuard {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
