//! Background progress monitoring.
//!
//! A [`ProgressMonitor`] is a tokio task bound to one log file. Every cycle
//! it reads the bytes appended since the previous cycle, folds complete
//! lines into the running [`ProgressSnapshot`] and sends the result to the
//! listener over a bounded channel. The task ends when its cancellation
//! token fires, when the listener goes away, or when the log never shows
//! up at all.

use crate::config::TransferConfig;
use crate::progress::{ProgressSnapshot, merge_log_content};
use crate::tail::LogCursor;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Upper bound on buffered text without a line break
const MAX_PENDING_BYTES: usize = 64 * 1024;

/// A snapshot for one item of the running request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    /// Position of the item in the request
    pub item_index: usize,
    /// Latest progress of that item
    pub snapshot: ProgressSnapshot,
}

/// Why a monitor task ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorExit {
    /// The stop signal was raised
    Stopped,
    /// The log produced no bytes within the idle limit
    LogNeverAppeared,
    /// The receiving side of the channel was dropped
    ListenerClosed,
}

/// Cycle timing of a monitor
#[derive(Debug, Clone, Copy)]
pub struct MonitorSettings {
    /// Sleep between cycles
    pub interval: Duration,
    /// Empty cycles tolerated before giving up on a log that never appears
    pub idle_limit: u32,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self::from(&TransferConfig::default())
    }
}

impl From<&TransferConfig> for MonitorSettings {
    fn from(config: &TransferConfig) -> Self {
        Self {
            interval: config.monitor_interval,
            idle_limit: config.monitor_idle_limit,
        }
    }
}

/// Handle to a running monitor task
#[derive(Debug)]
pub struct ProgressMonitor {
    token: CancellationToken,
    handle: JoinHandle<MonitorExit>,
}

impl ProgressMonitor {
    /// Start following `log_path` for the item at `item_index`
    ///
    /// The monitor stops when `token` is cancelled.
    #[must_use]
    pub fn spawn(
        log_path: impl Into<PathBuf>,
        item_index: usize,
        sender: mpsc::Sender<ProgressEvent>,
        settings: MonitorSettings,
        token: CancellationToken,
    ) -> Self {
        let cursor = LogCursor::new(log_path);
        let handle = tokio::spawn(run(cursor, item_index, sender, settings, token.clone()));
        Self { token, handle }
    }

    /// Check if the task has ended
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Raise the stop signal without waiting
    pub fn signal_stop(&self) {
        self.token.cancel();
    }

    /// Raise the stop signal and wait up to `timeout` for the task
    ///
    /// A task that does not end in time is aborted and abandoned, and
    /// `None` is returned.
    pub async fn stop(mut self, timeout: Duration) -> Option<MonitorExit> {
        self.token.cancel();
        match tokio::time::timeout(timeout, &mut self.handle).await {
            Ok(Ok(exit)) => Some(exit),
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "progress monitor task failed");
                None
            }
            Err(_) => {
                tracing::warn!(?timeout, "progress monitor did not stop in time, abandoning it");
                self.handle.abort();
                None
            }
        }
    }

    /// Wait for the task to end on its own
    pub async fn join(self) -> Option<MonitorExit> {
        self.handle.await.ok()
    }
}

async fn run(
    mut cursor: LogCursor,
    item_index: usize,
    sender: mpsc::Sender<ProgressEvent>,
    settings: MonitorSettings,
    token: CancellationToken,
) -> MonitorExit {
    tracing::debug!(log = %cursor.path().display(), item_index, "progress monitor started");

    let mut snapshot = ProgressSnapshot::default();
    let mut pending = String::new();
    let mut idle_cycles = 0u32;

    loop {
        if token.is_cancelled() {
            return MonitorExit::Stopped;
        }

        let text = cursor.read_new().await;
        if text.is_empty() {
            idle_cycles = idle_cycles.saturating_add(1);
            if !cursor.has_advanced() && idle_cycles >= settings.idle_limit {
                tracing::warn!(
                    log = %cursor.path().display(),
                    idle_cycles,
                    "log file never appeared, giving up on progress"
                );
                return MonitorExit::LogNeverAppeared;
            }
        } else {
            idle_cycles = 0;
            pending.push_str(&text);
            let complete = take_complete_lines(&mut pending);

            if let Some(next) = merge_log_content(snapshot.clone(), &complete) {
                snapshot = next;
                let event = ProgressEvent {
                    item_index,
                    snapshot: snapshot.clone(),
                };
                tokio::select! {
                    biased;
                    () = token.cancelled() => return MonitorExit::Stopped,
                    sent = sender.send(event) => {
                        if sent.is_err() {
                            tracing::debug!(item_index, "progress listener closed");
                            return MonitorExit::ListenerClosed;
                        }
                    }
                }
            }
        }

        tokio::select! {
            () = token.cancelled() => return MonitorExit::Stopped,
            () = tokio::time::sleep(settings.interval) => {}
        }
    }
}

/// Split off every complete line, leaving a trailing fragment in `pending`
///
/// An oversized fragment is released whole.
fn take_complete_lines(pending: &mut String) -> String {
    match pending.rfind('\n') {
        Some(idx) => {
            let rest = pending.split_off(idx + 1);
            std::mem::replace(pending, rest)
        }
        None if pending.len() > MAX_PENDING_BYTES => std::mem::take(pending),
        None => String::new(),
    }
}
