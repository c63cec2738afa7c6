//! # Ferry Core
//!
//! Transfer execution and progress monitoring for rclone-driven file
//! operations.
//!
//! This crate provides:
//! - rclone process control with per-invocation log files
//! - Incremental log tailing and stats parsing
//! - A cancellable background progress monitor
//! - Sequential, cancellable execution of multi-item requests
//! - Discovery and removal of partial transfer artifacts
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                        Coordinator                            │
//! │   (one item at a time, polls for exit and cancellation)       │
//! ├──────────────────────────────┬────────────────────────────────┤
//! │           Rclone             │        ProgressMonitor         │
//! │   (child process + log file) │   (tail -> parse -> channel)   │
//! ├──────────────────────────────┴────────────────────────────────┤
//! │                  PartialArtifactCleaner                       │
//! │   (finds *.partial left by a killed or failed transfer)       │
//! └───────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cleanup;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod logs;
pub mod monitor;
pub mod progress;
pub mod rclone;
pub mod remote;
pub mod request;
pub mod state;
pub mod tail;

pub use cleanup::{CleanupReport, PartialArtifact, PartialArtifactCleaner};
pub use config::{EngineConfig, RcloneConfig, TransferConfig};
pub use coordinator::{Coordinator, OperationContext, Outcome};
pub use error::{Error, Result};
pub use monitor::{MonitorExit, MonitorSettings, ProgressEvent, ProgressMonitor};
pub use progress::{FileProgress, ProgressSnapshot, merge_log_content, parse_log_content};
pub use rclone::{Rclone, RunningProcess};
pub use remote::{FileEntry, RemoteFs, RemotePath, SizeInfo, format_size};
pub use request::{OperationKind, TransferItem, TransferRequest};
pub use state::OperationState;
pub use tail::LogCursor;
