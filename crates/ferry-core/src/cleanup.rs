//! Discovery and removal of partial transfer artifacts.
//!
//! While a file is in flight rclone writes it as
//! `<originalName>.<token>.partial` and renames it on completion. A killed
//! or failed transfer leaves those files behind in the destination.

use crate::remote::{RemoteFs, RemotePath};
use crate::request::TransferItem;
use std::sync::Arc;

/// Suffix of in-flight files
pub const PARTIAL_SUFFIX: &str = ".partial";

/// A leftover partial file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialArtifact {
    /// Location of the file
    pub path: RemotePath,
    /// Size in bytes as listed, 0 when unknown
    pub size: u64,
}

/// Result of a removal pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Files removed
    pub deleted: usize,
    /// Files that could not be removed, with the reason
    pub failures: Vec<(RemotePath, String)>,
}

impl CleanupReport {
    /// Check whether every file was removed
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Finds and removes partial artifacts through a [`RemoteFs`]
#[derive(Clone)]
pub struct PartialArtifactCleaner {
    fs: Arc<dyn RemoteFs>,
}

impl std::fmt::Debug for PartialArtifactCleaner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartialArtifactCleaner")
            .finish_non_exhaustive()
    }
}

impl PartialArtifactCleaner {
    /// Create a cleaner over `fs`
    pub fn new(fs: Arc<dyn RemoteFs>) -> Self {
        Self { fs }
    }

    /// Find partial artifacts left by `item`
    ///
    /// For a file only the destination directory is searched, for names
    /// beginning with `<name>.`. For a directory the whole copied subtree
    /// is searched. Listing failures yield no entries.
    pub async fn find(&self, item: &TransferItem) -> Vec<PartialArtifact> {
        let artifacts = if item.is_dir {
            self.find_in_tree(item.landed_path()).await
        } else {
            self.find_for_file(&item.destination, &item.name).await
        };

        tracing::info!(
            item = %item.name,
            count = artifacts.len(),
            "partial artifact scan finished"
        );
        artifacts
    }

    async fn find_for_file(&self, dir: &RemotePath, name: &str) -> Vec<PartialArtifact> {
        let prefix = format!("{name}.");
        self.fs
            .list(dir)
            .await
            .into_iter()
            .filter(|e| {
                !e.is_dir && e.name.starts_with(&prefix) && e.name.ends_with(PARTIAL_SUFFIX)
            })
            .map(|e| PartialArtifact {
                path: dir.join(&e.name),
                size: u64::try_from(e.size).unwrap_or(0),
            })
            .collect()
    }

    async fn find_in_tree(&self, root: RemotePath) -> Vec<PartialArtifact> {
        let mut found = Vec::new();
        let mut pending = vec![root];

        while let Some(dir) = pending.pop() {
            for entry in self.fs.list(&dir).await {
                if entry.is_dir {
                    pending.push(dir.join(&entry.name));
                } else if entry.name.ends_with(PARTIAL_SUFFIX) {
                    found.push(PartialArtifact {
                        path: dir.join(&entry.name),
                        size: u64::try_from(entry.size).unwrap_or(0),
                    });
                }
            }
        }
        found
    }

    /// Delete the given artifacts
    ///
    /// Every file is attempted; failures are collected, not raised.
    pub async fn remove(&self, artifacts: &[PartialArtifact]) -> CleanupReport {
        let mut report = CleanupReport::default();
        for artifact in artifacts {
            match self.fs.delete_file(&artifact.path).await {
                Ok(()) => {
                    tracing::debug!(path = %artifact.path, "removed partial file");
                    report.deleted += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        path = %artifact.path,
                        error = %e,
                        "failed to remove partial file"
                    );
                    report.failures.push((artifact.path.clone(), e.to_string()));
                }
            }
        }
        report
    }
}
