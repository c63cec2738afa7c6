//! Remote addressing and the remote file system seam.
//!
//! Every location the external tool works with is addressed as
//! `remote:path`, where an empty path means the root of the remote. The
//! [`RemoteFs`] trait is the narrow listing/deletion interface the cleanup
//! pass needs; [`crate::rclone::Rclone`] is the production implementation.

use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::Deserialize;

/// A `remote:path` location
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemotePath {
    /// Remote name as configured for the external tool
    pub remote: String,
    /// Path inside the remote, empty for the root
    pub path: String,
}

impl RemotePath {
    /// Create a new remote path
    pub fn new(remote: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            remote: remote.into(),
            path: path.into(),
        }
    }

    /// Root of a remote
    pub fn root(remote: impl Into<String>) -> Self {
        Self::new(remote, "")
    }

    /// Parse a `remote:path` string
    ///
    /// Only the first colon separates the remote name, so paths may contain
    /// colons themselves.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPath`] if there is no colon or the remote name
    /// is empty.
    pub fn parse(s: &str) -> Result<Self> {
        match s.split_once(':') {
            Some((remote, path)) if !remote.is_empty() => Ok(Self::new(remote, path)),
            _ => Err(Error::InvalidPath(s.to_string())),
        }
    }

    /// Append one name to the path
    #[must_use]
    pub fn join(&self, name: &str) -> Self {
        if name.is_empty() {
            return self.clone();
        }
        let path = if self.path.is_empty() {
            name.to_string()
        } else if self.path.ends_with('/') {
            format!("{}{name}", self.path)
        } else {
            format!("{}/{name}", self.path)
        };
        Self::new(self.remote.clone(), path)
    }

    /// Containing directory of this path
    #[must_use]
    pub fn parent(&self) -> Self {
        Self::new(self.remote.clone(), parent_dir(&self.path))
    }

    /// Last path segment, empty at the root
    #[must_use]
    pub fn file_name(&self) -> &str {
        let trimmed = self.path.trim_end_matches('/');
        trimmed.rsplit('/').next().unwrap_or("")
    }

    /// Check if this is the root of the remote
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.path.is_empty()
    }
}

impl std::fmt::Display for RemotePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.remote, self.path)
    }
}

impl std::str::FromStr for RemotePath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Directory part of a slash-separated path
fn parent_dir(path: &str) -> String {
    let trimmed = if path.len() > 1 {
        path.trim_end_matches('/')
    } else {
        path
    };
    match trimmed.rfind('/') {
        Some(0) => "/".to_string(),
        Some(idx) => trimmed[..idx].to_string(),
        None => String::new(),
    }
}

/// One entry of a directory listing (`lsjson` shape)
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct FileEntry {
    /// Entry name
    pub name: String,
    /// Path relative to the listed directory
    pub path: String,
    /// Size in bytes, `-1` when the backend does not know it
    pub size: i64,
    /// Modification time as reported by the backend
    pub mod_time: String,
    /// Whether the entry is a directory
    pub is_dir: bool,
    /// MIME type, empty when not requested
    pub mime_type: String,
}

/// Aggregate size of a directory tree (`size --json` shape)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SizeInfo {
    /// Number of files
    pub count: u64,
    /// Total size in bytes
    pub bytes: u64,
}

/// Listing and deletion on a remote
#[async_trait]
pub trait RemoteFs: Send + Sync {
    /// List the immediate children of `dir`
    ///
    /// Failures are reported as an empty listing.
    async fn list(&self, dir: &RemotePath) -> Vec<FileEntry>;

    /// Delete a single file
    async fn delete_file(&self, path: &RemotePath) -> Result<()>;
}

/// Format a byte count for display
///
/// Directories render as `<DIR>`; files use one decimal and binary steps.
///
/// # Example
///
/// ```
/// use ferry_core::remote::format_size;
///
/// assert_eq!(format_size(512, false), "512.0B");
/// assert_eq!(format_size(1536, false), "1.5KB");
/// assert_eq!(format_size(0, true), "<DIR>");
/// ```
#[must_use]
pub fn format_size(size: u64, is_dir: bool) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    if is_dir {
        return "<DIR>".to_string();
    }

    let mut size = size as f64;
    for unit in UNITS {
        if size < 1024.0 {
            return format!("{size:.1}{unit}");
        }
        size /= 1024.0;
    }
    format!("{size:.1}PB")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let path = RemotePath::parse("gdrive:photos/2024").unwrap();
        assert_eq!(path.remote, "gdrive");
        assert_eq!(path.path, "photos/2024");
        assert_eq!(path.to_string(), "gdrive:photos/2024");

        let root = RemotePath::parse("s3:").unwrap();
        assert!(root.is_root());
        assert_eq!(root.to_string(), "s3:");

        let colon = RemotePath::parse("local:/tmp/a:b").unwrap();
        assert_eq!(colon.path, "/tmp/a:b");
    }

    #[test]
    fn test_parse_rejects_missing_remote() {
        assert!(RemotePath::parse("no-colon").is_err());
        assert!(RemotePath::parse(":path").is_err());
    }

    #[test]
    fn test_join() {
        assert_eq!(RemotePath::root("r").join("a.txt").to_string(), "r:a.txt");
        let dir = RemotePath::new("r", "dir");
        assert_eq!(dir.join("a.txt").to_string(), "r:dir/a.txt");
        assert_eq!(RemotePath::new("r", "/").join("tmp").to_string(), "r:/tmp");
        assert_eq!(RemotePath::new("r", "dir").join("").to_string(), "r:dir");
    }

    #[test]
    fn test_parent_and_file_name() {
        let path = RemotePath::new("r", "a/b/c.txt");
        assert_eq!(path.parent().path, "a/b");
        assert_eq!(path.file_name(), "c.txt");

        assert_eq!(RemotePath::new("r", "c.txt").parent().path, "");
        assert_eq!(RemotePath::new("r", "/c.txt").parent().path, "/");
        assert_eq!(RemotePath::new("r", "a/b/").parent().path, "a");
        assert_eq!(RemotePath::root("r").file_name(), "");
    }

    #[test]
    fn test_file_entry_deserialize() {
        let json = r#"[
            {"Path":"docs","Name":"docs","Size":-1,"MimeType":"inode/directory","ModTime":"2024-01-01T00:00:00Z","IsDir":true},
            {"Path":"a.txt","Name":"a.txt","Size":12,"IsDir":false}
        ]"#;
        let entries: Vec<FileEntry> = serde_json::from_str(json).unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries[0].is_dir);
        assert_eq!(entries[0].size, -1);
        assert_eq!(entries[1].name, "a.txt");
        assert_eq!(entries[1].mod_time, "");
        assert_eq!(entries[1].mime_type, "");
    }

    #[test]
    fn test_size_info_deserialize() {
        let json = r#"{"count":3,"bytes":4096,"sizeless":0}"#;
        let info: SizeInfo = serde_json::from_str(json).unwrap();
        assert_eq!((info.count, info.bytes), (3, 4096));
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0, false), "0.0B");
        assert_eq!(format_size(1023, false), "1023.0B");
        assert_eq!(format_size(1024, false), "1.0KB");
        assert_eq!(format_size(1024 * 1024, false), "1.0MB");
        assert_eq!(format_size(1024_u64.pow(4), false), "1.0TB");
        assert_eq!(format_size(1024_u64.pow(5), false), "1.0PB");
        assert_eq!(format_size(42, true), "<DIR>");
    }
}
