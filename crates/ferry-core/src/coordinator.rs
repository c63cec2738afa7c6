//! Transfer coordination.
//!
//! The [`Coordinator`] executes the items of a [`TransferRequest`] strictly
//! one after another. Copy and move items are started with progress
//! logging and followed by a [`ProgressMonitor`]; delete and mkdir items are
//! one-shot commands. Either way the coordinator polls the process for
//! exit while watching the caller's cancellation token, and the first
//! failure or cancellation halts the rest of the queue.
//!
//! Cancelling an in-flight transfer is ordered:
//!
//! 1. raise the monitor stop signal
//! 2. kill the process
//! 3. wait for the monitor (bounded), abandoning it on timeout
//! 4. scan the destination for partial artifacts
//!
//! Nothing completed earlier in the queue is rolled back.

use crate::cleanup::{PartialArtifact, PartialArtifactCleaner};
use crate::config::{EngineConfig, TransferConfig};
use crate::error::{Error, Result};
use crate::logs;
use crate::monitor::{MonitorSettings, ProgressEvent, ProgressMonitor};
use crate::rclone::Rclone;
use crate::remote::RemoteFs;
use crate::request::{OperationKind, TransferItem, TransferRequest};
use crate::state::OperationState;
use std::process::ExitStatus;
use std::sync::Arc;
use tokio::process::Child;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Per-run channel endpoints shared between the caller and the coordinator
///
/// Holds the cancellation token the caller fires to stop the run, and the
/// sending half of the progress channel. Created together with the
/// receiving half by [`OperationContext::new`].
#[derive(Debug, Clone)]
pub struct OperationContext {
    token: CancellationToken,
    progress: mpsc::Sender<ProgressEvent>,
}

impl OperationContext {
    /// Create a context and the receiver for its progress events
    #[must_use]
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<ProgressEvent>) {
        let (progress, rx) = mpsc::channel(capacity.max(1));
        let ctx = Self {
            token: CancellationToken::new(),
            progress,
        };
        (ctx, rx)
    }

    /// Request cancellation of the run
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Check whether cancellation was requested
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Token observed by the run
    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.token.clone()
    }
}

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Every item finished
    Completed {
        /// Items processed
        count: usize,
    },
    /// The caller cancelled the run
    Cancelled {
        /// Item that was in flight, if any
        item: Option<String>,
        /// Items finished before the cancellation
        completed: usize,
        /// Partial files found under the item's destination
        artifacts: Vec<PartialArtifact>,
    },
    /// An item exited unsuccessfully and the queue was halted
    ItemFailed {
        /// Name of the failing item
        name: String,
        /// Exit code, `None` when killed by a signal
        exit_code: Option<i32>,
        /// Items finished before the failure
        completed: usize,
        /// Partial files found under the item's destination
        artifacts: Vec<PartialArtifact>,
    },
}

impl Outcome {
    /// Check if the whole request completed
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, Outcome::Completed { .. })
    }

    /// Partial files left behind, empty on completion
    #[must_use]
    pub fn artifacts(&self) -> &[PartialArtifact] {
        match self {
            Outcome::Completed { .. } => &[],
            Outcome::Cancelled { artifacts, .. } | Outcome::ItemFailed { artifacts, .. } => {
                artifacts
            }
        }
    }
}

/// Result of processing one item
enum ItemResult {
    Done,
    Failed(Option<i32>),
    Cancelled,
}

/// Result of waiting on a process
enum Wait {
    Exited(ExitStatus),
    Cancelled,
}

/// Drives one request to an [`Outcome`]
///
/// A coordinator is single-use: its [`OperationState`] leaves `Idle` on the
/// first run and never returns to it.
#[derive(Debug)]
pub struct Coordinator {
    rclone: Rclone,
    cleaner: PartialArtifactCleaner,
    config: TransferConfig,
    state: OperationState,
}

impl Coordinator {
    /// Create a coordinator using rclone for both transfers and cleanup
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the configuration is invalid.
    pub fn new(config: &EngineConfig) -> Result<Self> {
        config.validate()?;
        let rclone = Rclone::new(config);
        Ok(Self {
            cleaner: PartialArtifactCleaner::new(Arc::new(rclone.clone())),
            rclone,
            config: config.transfer.clone(),
            state: OperationState::Idle,
        })
    }

    /// Use `fs` for partial artifact discovery and removal
    #[must_use]
    pub fn with_remote_fs(mut self, fs: Arc<dyn RemoteFs>) -> Self {
        self.cleaner = PartialArtifactCleaner::new(fs);
        self
    }

    /// Current lifecycle state
    #[must_use]
    pub fn state(&self) -> OperationState {
        self.state
    }

    /// Cleaner used for partial artifacts
    #[must_use]
    pub fn cleaner(&self) -> &PartialArtifactCleaner {
        &self.cleaner
    }

    /// Execute `request`, sending progress through `ctx`
    ///
    /// Cancellation and item failure are reported as an [`Outcome`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] if this coordinator already ran,
    /// [`Error::Launch`] if the tool could not be started and
    /// [`Error::Io`] if a process could not be polled. The queue is halted
    /// in every case.
    pub async fn run(
        &mut self,
        request: &TransferRequest,
        ctx: &OperationContext,
    ) -> Result<Outcome> {
        self.state.transition(OperationState::Running)?;
        let kind = request.kind();

        tracing::info!(
            operation = %kind,
            items = request.len(),
            destination = %request.destination_root(),
            "starting operation"
        );

        if kind.tracks_progress() {
            let logs_dir = self.rclone.logs_dir();
            let retention = self.config.log_retention;
            let removed = logs::cleanup_old_logs(logs_dir, retention).await;
            if removed > 0 {
                tracing::debug!(removed, "pruned old log files");
            }
        }

        for (index, item) in request.items().iter().enumerate() {
            if ctx.is_cancelled() {
                tracing::info!(completed = index, "operation cancelled between items");
                self.state.transition(OperationState::Cancelling)?;
                return Ok(Outcome::Cancelled {
                    item: None,
                    completed: index,
                    artifacts: Vec::new(),
                });
            }

            let result = if kind.tracks_progress() {
                self.transfer_item(kind, index, item, ctx).await
            } else {
                self.one_shot_item(kind, item, ctx).await
            };

            let result = match result {
                Ok(result) => result,
                Err(e) => {
                    tracing::error!(item = %item.name, error = %e, "operation aborted");
                    self.state.transition(OperationState::Failed)?;
                    return Err(e);
                }
            };

            match result {
                ItemResult::Done => {
                    tracing::info!(
                        item = %item.name,
                        index,
                        total = request.len(),
                        "{} item",
                        kind.past_tense().to_lowercase()
                    );
                }
                ItemResult::Failed(exit_code) => {
                    tracing::error!(item = %item.name, ?exit_code, "item failed, halting queue");
                    self.state.transition(OperationState::Failed)?;
                    let artifacts = self.scan(kind, item).await;
                    return Ok(Outcome::ItemFailed {
                        name: item.name.clone(),
                        exit_code,
                        completed: index,
                        artifacts,
                    });
                }
                ItemResult::Cancelled => {
                    tracing::info!(item = %item.name, "item cancelled, halting queue");
                    self.state.transition(OperationState::Cancelling)?;
                    let artifacts = self.scan(kind, item).await;
                    return Ok(Outcome::Cancelled {
                        item: Some(item.name.clone()),
                        completed: index,
                        artifacts,
                    });
                }
            }
        }

        self.state.transition(OperationState::Completed)?;
        tracing::info!(operation = %kind, count = request.len(), "operation completed");
        Ok(Outcome::Completed {
            count: request.len(),
        })
    }

    /// Run a copy or move of one item with a progress monitor
    async fn transfer_item(
        &self,
        kind: OperationKind,
        index: usize,
        item: &TransferItem,
        ctx: &OperationContext,
    ) -> Result<ItemResult> {
        let verb = kind.verb(item.is_dir);
        let source = item.source.to_string();
        let args = [source, item.tool_destination().to_string()];
        let process = self.rclone.spawn_with_progress(verb, &args).await?;
        tracing::debug!(
            item = %item.name,
            log = %process.log_path().display(),
            "transfer started"
        );
        let (mut child, log_path) = process.into_parts();

        let monitor = ProgressMonitor::spawn(
            log_path,
            index,
            ctx.progress.clone(),
            MonitorSettings::from(&self.config),
            ctx.token.child_token(),
        );

        let wait = self.wait_for_exit(&mut child, &ctx.token).await;
        if !matches!(wait, Ok(Wait::Exited(_))) {
            monitor.signal_stop();
            kill(&mut child, &item.name).await;
        }
        monitor.stop(self.config.monitor_stop_timeout).await;

        Ok(match wait? {
            Wait::Exited(status) if status.success() => ItemResult::Done,
            Wait::Exited(status) => ItemResult::Failed(status.code()),
            Wait::Cancelled => ItemResult::Cancelled,
        })
    }

    /// Run a delete or mkdir of one item
    async fn one_shot_item(
        &self,
        kind: OperationKind,
        item: &TransferItem,
        ctx: &OperationContext,
    ) -> Result<ItemResult> {
        let verb = kind.verb(item.is_dir);
        let mut child = self.rclone.spawn(verb, &[item.source.to_string()])?;

        let wait = self.wait_for_exit(&mut child, &ctx.token).await;
        if !matches!(wait, Ok(Wait::Exited(_))) {
            kill(&mut child, &item.name).await;
        }

        Ok(match wait? {
            Wait::Exited(status) if status.success() => ItemResult::Done,
            Wait::Exited(status) => ItemResult::Failed(status.code()),
            Wait::Cancelled => ItemResult::Cancelled,
        })
    }

    /// Poll `child` until it exits or `token` fires
    async fn wait_for_exit(&self, child: &mut Child, token: &CancellationToken) -> Result<Wait> {
        loop {
            if token.is_cancelled() {
                return Ok(Wait::Cancelled);
            }
            if let Some(status) = child.try_wait().map_err(Error::Io)? {
                return Ok(Wait::Exited(status));
            }
            tokio::select! {
                () = token.cancelled() => {}
                () = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }
    }

    /// Look for partial artifacts of a transfer item
    async fn scan(&self, kind: OperationKind, item: &TransferItem) -> Vec<PartialArtifact> {
        if kind.tracks_progress() {
            self.cleaner.find(item).await
        } else {
            Vec::new()
        }
    }
}

/// Kill a child and reap it
async fn kill(child: &mut Child, item: &str) {
    match child.kill().await {
        Ok(()) => tracing::info!(item, "terminated rclone process"),
        Err(e) => tracing::warn!(item, error = %e, "failed to terminate rclone process"),
    }
}
