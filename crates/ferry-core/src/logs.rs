//! Log file naming and retention.

use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Extension of the files managed here
const LOG_EXTENSION: &str = "log";

/// File name for one invocation: `rclone_<verb>_<YYYYMMDD_HHMMSS_micros>.log`
#[must_use]
pub fn log_file_name(verb: &str, at: DateTime<Local>) -> String {
    let stamp = at.format("%Y%m%d_%H%M%S_%6f");
    format!("rclone_{verb}_{stamp}.{LOG_EXTENSION}")
}

/// Create `logs_dir` if needed and return a fresh log path for `verb`
///
/// # Errors
///
/// Returns an I/O error if the directory cannot be created.
pub async fn prepare_log_path(logs_dir: &Path, verb: &str) -> std::io::Result<PathBuf> {
    tokio::fs::create_dir_all(logs_dir).await?;
    Ok(logs_dir.join(log_file_name(verb, Local::now())))
}

/// Keep only the `keep` most recently modified `*.log` files in `logs_dir`
///
/// Returns the number of files removed. A missing directory removes
/// nothing; every other failure is logged and skipped.
pub async fn cleanup_old_logs(logs_dir: &Path, keep: usize) -> usize {
    let mut logs = match collect_logs(logs_dir).await {
        Ok(logs) => logs,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return 0,
        Err(e) => {
            tracing::warn!(dir = %logs_dir.display(), error = %e, "failed to scan logs directory");
            return 0;
        }
    };

    // Newest first
    logs.sort_by_key(|(_, modified)| std::cmp::Reverse(*modified));

    let mut removed = 0;
    for (path, _) in logs.into_iter().skip(keep) {
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "removed old log file");
                removed += 1;
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to remove old log file");
            }
        }
    }
    removed
}

async fn collect_logs(logs_dir: &Path) -> std::io::Result<Vec<(PathBuf, SystemTime)>> {
    let mut entries = tokio::fs::read_dir(logs_dir).await?;
    let mut logs = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(LOG_EXTENSION) {
            continue;
        }
        let modified = match entry.metadata().await {
            Ok(meta) if meta.is_file() => meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            Ok(_) => continue,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to stat log file");
                continue;
            }
        };
        logs.push((path, modified));
    }
    Ok(logs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_log_file_name_format() {
        let second = Local.with_ymd_and_hms(2025, 3, 9, 14, 5, 7).unwrap();
        let at = second + chrono::Duration::microseconds(42);
        assert_eq!(
            log_file_name("copy", at),
            "rclone_copy_20250309_140507_000042.log"
        );
    }

    #[tokio::test]
    async fn test_prepare_creates_directory() {
        let dir = TempDir::new().unwrap();
        let logs_dir = dir.path().join("nested").join("logs");

        let path = prepare_log_path(&logs_dir, "move").await.unwrap();
        assert!(logs_dir.is_dir());
        assert_eq!(path.parent(), Some(logs_dir.as_path()));
        let name = path.file_name().unwrap().to_string_lossy();
        assert!(name.starts_with("rclone_move_"));
        assert!(name.ends_with(".log"));
    }

    #[tokio::test]
    async fn test_retention_keeps_newest() {
        let dir = TempDir::new().unwrap();
        let base = SystemTime::now() - Duration::from_secs(3600);

        for i in 0..8u64 {
            let path = dir.path().join(format!("run_{i}.log"));
            std::fs::write(&path, "log").unwrap();
            let file = std::fs::File::options().write(true).open(&path).unwrap();
            let modified = base + Duration::from_secs(i * 60);
            file.set_modified(modified).unwrap();
        }
        let notes = dir.path().join("notes.txt");
        std::fs::write(notes, "keep me").unwrap();

        let removed = cleanup_old_logs(dir.path(), 5).await;
        assert_eq!(removed, 3);

        let mut left: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        left.sort();

        let mut expected: Vec<String> = (3..8).map(|i| format!("run_{i}.log")).collect();
        expected.push("notes.txt".to_string());
        expected.sort();
        assert_eq!(left, expected);
    }

    #[tokio::test]
    async fn test_retention_missing_directory() {
        let dir = TempDir::new().unwrap();
        assert_eq!(cleanup_old_logs(&dir.path().join("missing"), 5).await, 0);
    }
}
