//! rclone process control.
//!
//! [`Rclone`] builds every invocation of the external tool. Transfers are
//! started with [`Rclone::spawn_with_progress`], which points the tool at a
//! fresh log file and returns immediately, as do the one-shot delete, purge
//! and mkdir items started with [`Rclone::spawn`]. Listing, sizing and
//! single-file deletion are run to completion and their output is
//! interpreted here.

use crate::config::{EngineConfig, RcloneConfig};
use crate::error::{Error, Result};
use crate::logs;
use crate::remote::{FileEntry, RemoteFs, RemotePath, SizeInfo};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Output, Stdio};
use tokio::process::{Child, Command};

/// Characters of captured output included in debug logs
const OUTPUT_PREVIEW_CHARS: usize = 500;

/// A transfer process started with progress logging
#[derive(Debug)]
pub struct RunningProcess {
    child: Child,
    log_path: PathBuf,
}

impl RunningProcess {
    /// Log file the process writes its stats to
    #[must_use]
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Split into the process handle and log path
    #[must_use]
    pub fn into_parts(self) -> (Child, PathBuf) {
        (self.child, self.log_path)
    }
}

/// Wrapper around the rclone executable
#[derive(Debug, Clone)]
pub struct Rclone {
    config: RcloneConfig,
    logs_dir: PathBuf,
    stats_interval: String,
}

impl Rclone {
    /// Create a wrapper from engine configuration
    #[must_use]
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            config: config.rclone.clone(),
            logs_dir: config.transfer.logs_dir.clone(),
            stats_interval: config.transfer.stats_interval.clone(),
        }
    }

    /// Directory receiving transfer logs
    #[must_use]
    pub fn logs_dir(&self) -> &Path {
        &self.logs_dir
    }

    /// Program name used in messages
    fn program_name(&self) -> String {
        self.config.program.display().to_string()
    }

    /// Arguments shared by every invocation, before the verb
    fn common_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(config_path) = &self.config.config_path {
            args.push("--config".to_string());
            args.push(config_path.display().to_string());
        }
        args.extend(self.config.extra_args());
        args
    }

    /// Full argument list of a transfer logging to `log_path`
    fn progress_args(&self, verb: &str, args: &[String], log_path: &Path) -> Vec<String> {
        let mut full = self.common_args();
        full.extend([
            "--stats".to_string(),
            self.stats_interval.clone(),
            "--log-file".to_string(),
            log_path.display().to_string(),
            "--log-level".to_string(),
            "INFO".to_string(),
            "--no-update-modtime".to_string(),
            verb.to_string(),
        ]);
        full.extend(args.iter().cloned());
        full
    }

    /// Full argument list of a one-shot command
    fn plain_args(&self, verb: &str, args: &[String]) -> Vec<String> {
        let mut full = self.common_args();
        full.push(verb.to_string());
        full.extend(args.iter().cloned());
        full
    }

    fn command(&self, args: &[String]) -> Command {
        let mut cmd = Command::new(&self.config.program);
        cmd.args(args).stdin(Stdio::null()).kill_on_drop(true);
        cmd
    }

    /// Start a transfer with stats written to a new log file
    ///
    /// Does not wait for the process. Its standard output and error are
    /// discarded and it is killed if the returned handle is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the logs directory cannot be created and
    /// [`Error::Launch`] if the process cannot be started.
    pub async fn spawn_with_progress(&self, verb: &str, args: &[String]) -> Result<RunningProcess> {
        let log_path = logs::prepare_log_path(&self.logs_dir, verb).await?;
        let full = self.progress_args(verb, args, &log_path);

        tracing::info!(
            program = %self.program_name(),
            args = ?full,
            log = %log_path.display(),
            "starting rclone transfer"
        );

        let child = self
            .command(&full)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| Error::Launch {
                program: self.program_name(),
                source,
            })?;

        Ok(RunningProcess { child, log_path })
    }

    /// Start a one-shot command without waiting for it
    ///
    /// # Errors
    ///
    /// Returns [`Error::Launch`] if the process cannot be started.
    pub fn spawn(&self, verb: &str, args: &[String]) -> Result<Child> {
        let full = self.plain_args(verb, args);
        tracing::debug!(program = %self.program_name(), args = ?full, "starting rclone command");

        self.command(&full)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| Error::Launch {
                program: self.program_name(),
                source,
            })
    }

    /// Run a one-shot command to completion and capture its output
    async fn run(&self, verb: &str, args: &[String]) -> Result<Output> {
        let full = self.plain_args(verb, args);
        tracing::debug!(program = %self.program_name(), args = ?full, "running rclone command");

        let output = self
            .command(&full)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| Error::Launch {
                program: self.program_name(),
                source,
            })?;

        tracing::debug!(
            verb,
            code = ?output.status.code(),
            stdout = %preview(&output.stdout),
            stderr = %preview(&output.stderr),
            "rclone command finished"
        );
        Ok(output)
    }

    /// Run a command that only reports success or failure
    async fn run_checked(&self, verb: &str, args: &[String]) -> Result<()> {
        let output = self.run(verb, args).await?;
        check_status(verb, output.status, &output.stderr)
    }

    /// List the immediate children of `dir`
    ///
    /// Launch failures, non-zero exits and malformed JSON are logged and
    /// yield an empty listing.
    pub async fn list_directory(&self, dir: &RemotePath) -> Vec<FileEntry> {
        let args = [
            "--no-mimetype".to_string(),
            "--no-modtime".to_string(),
            dir.to_string(),
        ];
        let output = match self.run("lsjson", &args).await {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!(dir = %dir, error = %e, "listing failed");
                return Vec::new();
            }
        };
        if !output.status.success() {
            tracing::warn!(
                dir = %dir,
                code = ?output.status.code(),
                stderr = %preview(&output.stderr),
                "listing exited unsuccessfully"
            );
            return Vec::new();
        }
        parse_listing(&output.stdout)
    }

    /// Total file count and size below `path`
    ///
    /// Returns `None` on any failure, after logging it.
    pub async fn directory_size(&self, path: &RemotePath) -> Option<SizeInfo> {
        let args = ["--json".to_string(), path.to_string()];
        let output = match self.run("size", &args).await {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!(path = %path, error = %e, "size query failed");
                return None;
            }
        };
        if !output.status.success() {
            tracing::warn!(
                path = %path,
                code = ?output.status.code(),
                "size query exited unsuccessfully"
            );
            return None;
        }
        parse_size(&output.stdout)
    }
}

#[async_trait]
impl RemoteFs for Rclone {
    async fn list(&self, dir: &RemotePath) -> Vec<FileEntry> {
        self.list_directory(dir).await
    }

    async fn delete_file(&self, path: &RemotePath) -> Result<()> {
        self.run_checked("delete", &[path.to_string()]).await
    }
}

/// Map an exit status to `Ok` or [`Error::CommandFailed`]
pub(crate) fn check_status(verb: &str, status: ExitStatus, stderr: &[u8]) -> Result<()> {
    if status.success() {
        return Ok(());
    }
    Err(Error::CommandFailed {
        verb: verb.to_string(),
        code: status.code(),
        stderr: String::from_utf8_lossy(stderr).trim().to_string(),
    })
}

fn parse_listing(stdout: &[u8]) -> Vec<FileEntry> {
    serde_json::from_slice(stdout).unwrap_or_else(|e| {
        tracing::warn!(error = %e, output = %preview(stdout), "malformed listing output");
        Vec::new()
    })
}

fn parse_size(stdout: &[u8]) -> Option<SizeInfo> {
    match serde_json::from_slice(stdout) {
        Ok(info) => Some(info),
        Err(e) => {
            tracing::warn!(error = %e, output = %preview(stdout), "malformed size output");
            None
        }
    }
}

fn preview(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .chars()
        .take(OUTPUT_PREVIEW_CHARS)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rclone_with(config_path: Option<&str>, extra: &str) -> Rclone {
        let mut config = EngineConfig::default();
        config.rclone.config_path = config_path.map(PathBuf::from);
        config.rclone.extra_flags = extra.to_string();
        config.transfer.stats_interval = "2s".to_string();
        Rclone::new(&config)
    }

    #[test]
    fn test_progress_args_order() {
        let rclone = rclone_with(Some("/etc/rclone.conf"), "--transfers 2");
        let args = rclone.progress_args(
            "copy",
            &["src:a.txt".to_string(), "dst:out".to_string()],
            Path::new("logs/run.log"),
        );
        assert_eq!(
            args,
            [
                "--config",
                "/etc/rclone.conf",
                "--transfers",
                "2",
                "--stats",
                "2s",
                "--log-file",
                "logs/run.log",
                "--log-level",
                "INFO",
                "--no-update-modtime",
                "copy",
                "src:a.txt",
                "dst:out",
            ]
        );
    }

    #[test]
    fn test_plain_args_without_config() {
        let rclone = rclone_with(None, "");
        assert_eq!(
            rclone.plain_args("mkdir", &["r:new".to_string()]),
            ["mkdir", "r:new"]
        );
    }

    #[test]
    fn test_parse_listing() {
        let entries = parse_listing(br#"[{"Name":"a","Path":"a","Size":3,"IsDir":false}]"#);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].size, 3);

        assert!(parse_listing(b"not json").is_empty());
        assert!(parse_listing(b"").is_empty());
    }

    #[test]
    fn test_parse_size() {
        let info = parse_size(br#"{"count":2,"bytes":100}"#).unwrap();
        assert_eq!(info.count, 2);
        assert_eq!(info.bytes, 100);
        assert!(parse_size(b"{oops").is_none());
    }

    #[test]
    fn test_preview_truncates_by_chars() {
        let long = "é".repeat(600);
        let shown = preview(long.as_bytes()).chars().count();
        assert_eq!(shown, OUTPUT_PREVIEW_CHARS);
        assert_eq!(preview(b"short"), "short");
    }

    #[tokio::test]
    async fn test_missing_program_is_launch_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut config = EngineConfig::default();
        config.rclone.program = dir.path().join("no-such-rclone");
        config.transfer.logs_dir = dir.path().join("logs");
        let rclone = Rclone::new(&config);

        let err = rclone
            .spawn_with_progress("copy", &["a:".to_string(), "b:".to_string()])
            .await
            .unwrap_err();
        assert!(err.is_launch_failure());
        assert!(config.transfer.logs_dir.is_dir());

        let err = rclone.spawn("mkdir", &["a:x".to_string()]).unwrap_err();
        assert!(err.is_launch_failure());

        let root = RemotePath::root("a");
        assert!(rclone.list_directory(&root).await.is_empty());
        assert!(rclone.directory_size(&root).await.is_none());
        assert!(rclone.delete_file(&root).await.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_check_status() {
        use std::time::Duration;

        let status = tokio::process::Command::new("sh")
            .args(["-c", "exit 3"])
            .status()
            .await
            .unwrap();
        let stderr = b" not found \n";
        let err = check_status("delete", status, stderr).unwrap_err();
        assert_eq!(err.to_string(), "delete exited with status 3: not found");

        let status = tokio::time::timeout(
            Duration::from_secs(5),
            tokio::process::Command::new("true").status(),
        )
        .await
        .unwrap()
        .unwrap();
        assert!(check_status("mkdir", status, b"").is_ok());
    }
}
