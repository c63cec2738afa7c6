//! Local file system backend for cleanup tests

use async_trait::async_trait;
use ferry_core::{Error, FileEntry, RemoteFs, RemotePath, Result};
use std::path::PathBuf;

/// [`RemoteFs`] that treats the path of every `remote:path` as a local path
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFs;

impl LocalFs {
    fn local(path: &RemotePath) -> PathBuf {
        PathBuf::from(&path.path)
    }
}

#[async_trait]
impl RemoteFs for LocalFs {
    async fn list(&self, dir: &RemotePath) -> Vec<FileEntry> {
        let mut entries = match tokio::fs::read_dir(Self::local(dir)).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::debug!(dir = %dir, error = %e, "local listing failed");
                return Vec::new();
            }
        };

        let mut listing = Vec::new();
        while let Ok(Some(entry)) = entries.next_entry().await {
            let Ok(meta) = entry.metadata().await else {
                continue;
            };
            let name = entry.file_name().to_string_lossy().into_owned();
            listing.push(FileEntry {
                path: name.clone(),
                name,
                size: if meta.is_dir() {
                    -1
                } else {
                    i64::try_from(meta.len()).unwrap_or(i64::MAX)
                },
                is_dir: meta.is_dir(),
                ..Default::default()
            });
        }
        listing
    }

    async fn delete_file(&self, path: &RemotePath) -> Result<()> {
        tokio::fs::remove_file(Self::local(path))
            .await
            .map_err(Error::Io)
    }
}
