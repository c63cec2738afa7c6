//! Transfer requests and their items.

use crate::error::{Error, Result};
use crate::remote::{FileEntry, RemotePath};

/// Kind of batch operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    /// Copy items to the destination
    Copy,
    /// Move items to the destination
    Move,
    /// Delete items in place
    Delete,
    /// Create directories
    Mkdir,
}

impl OperationKind {
    /// Tool verb used for one item of this operation
    #[must_use]
    pub fn verb(self, is_dir: bool) -> &'static str {
        match self {
            Self::Copy => "copy",
            Self::Move => "move",
            Self::Delete if is_dir => "purge",
            Self::Delete => "delete",
            Self::Mkdir => "mkdir",
        }
    }

    /// Whether the tool is run with progress logging for this operation
    #[must_use]
    pub fn tracks_progress(self) -> bool {
        matches!(self, Self::Copy | Self::Move)
    }

    /// Past-tense label for status messages
    #[must_use]
    pub fn past_tense(self) -> &'static str {
        match self {
            Self::Copy => "Copied",
            Self::Move => "Moved",
            Self::Delete => "Deleted",
            Self::Mkdir => "Created",
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Copy => write!(f, "copy"),
            Self::Move => write!(f, "move"),
            Self::Delete => write!(f, "delete"),
            Self::Mkdir => write!(f, "mkdir"),
        }
    }
}

/// One file or directory participating in a request
///
/// For copy and move, `source` is the item itself and `destination` is the
/// directory it lands in. Delete and mkdir act on `source` only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferItem {
    /// Display name (last path segment)
    pub name: String,
    /// Location of the item
    pub source: RemotePath,
    /// Directory the item is transferred into
    pub destination: RemotePath,
    /// Whether the item is a directory
    pub is_dir: bool,
    /// Size in bytes, 0 for directories or when unknown
    pub size: u64,
}

impl TransferItem {
    /// Create a new item
    pub fn new(
        name: impl Into<String>,
        source: RemotePath,
        destination: RemotePath,
        is_dir: bool,
        size: u64,
    ) -> Self {
        Self {
            name: name.into(),
            source,
            destination,
            is_dir,
            size,
        }
    }

    /// Build an item from a listing entry of `source_dir`
    #[must_use]
    pub fn from_entry(source_dir: &RemotePath, entry: &FileEntry, destination: RemotePath) -> Self {
        Self::new(
            entry.name.clone(),
            source_dir.join(&entry.name),
            destination,
            entry.is_dir,
            u64::try_from(entry.size).unwrap_or(0),
        )
    }

    /// Destination argument handed to the tool
    ///
    /// A directory is copied into a directory of its own name so the tree
    /// is recreated; a file is copied into the destination directory.
    #[must_use]
    pub fn tool_destination(&self) -> RemotePath {
        if self.is_dir {
            self.destination.join(&self.name)
        } else {
            self.destination.clone()
        }
    }

    /// Location where the item ends up once transferred
    #[must_use]
    pub fn landed_path(&self) -> RemotePath {
        self.destination.join(&self.name)
    }
}

/// A queued batch operation
#[derive(Debug, Clone)]
pub struct TransferRequest {
    kind: OperationKind,
    items: Vec<TransferItem>,
    destination_root: RemotePath,
}

impl TransferRequest {
    /// Create a new request
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] if `items` is empty.
    pub fn new(
        kind: OperationKind,
        items: Vec<TransferItem>,
        destination_root: RemotePath,
    ) -> Result<Self> {
        if items.is_empty() {
            return Err(Error::invalid_request("a request needs at least one item"));
        }
        Ok(Self {
            kind,
            items,
            destination_root,
        })
    }

    /// Operation kind shared by every item
    #[must_use]
    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    /// Items in execution order
    #[must_use]
    pub fn items(&self) -> &[TransferItem] {
        &self.items
    }

    /// Destination directory of the request
    #[must_use]
    pub fn destination_root(&self) -> &RemotePath {
        &self.destination_root
    }

    /// Number of queued items
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Always false; kept for API symmetry with `len`
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file_item(name: &str) -> TransferItem {
        TransferItem::new(
            name,
            RemotePath::new("src", format!("in/{name}")),
            RemotePath::new("dst", "out"),
            false,
            10,
        )
    }

    #[test]
    fn test_verbs() {
        assert_eq!(OperationKind::Copy.verb(true), "copy");
        assert_eq!(OperationKind::Move.verb(false), "move");
        assert_eq!(OperationKind::Delete.verb(false), "delete");
        assert_eq!(OperationKind::Delete.verb(true), "purge");
        assert_eq!(OperationKind::Mkdir.verb(true), "mkdir");
        assert!(OperationKind::Copy.tracks_progress());
        assert!(!OperationKind::Delete.tracks_progress());
    }

    #[test]
    fn test_tool_destination() {
        let file = file_item("a.txt");
        assert_eq!(file.tool_destination().to_string(), "dst:out");
        assert_eq!(file.landed_path().to_string(), "dst:out/a.txt");

        let dir = TransferItem::new(
            "photos",
            RemotePath::new("src", "photos"),
            RemotePath::root("dst"),
            true,
            0,
        );
        assert_eq!(dir.tool_destination().to_string(), "dst:photos");
    }

    #[test]
    fn test_from_entry() {
        let entry = FileEntry {
            name: "docs".to_string(),
            path: "docs".to_string(),
            size: -1,
            is_dir: true,
            ..Default::default()
        };
        let home = RemotePath::new("src", "home");
        let item = TransferItem::from_entry(&home, &entry, RemotePath::root("dst"));
        assert_eq!(item.source.to_string(), "src:home/docs");
        assert_eq!(item.size, 0);
        assert!(item.is_dir);
    }

    #[test]
    fn test_empty_request_rejected() {
        let result = TransferRequest::new(OperationKind::Copy, Vec::new(), RemotePath::root("dst"));
        assert!(matches!(result, Err(Error::InvalidRequest(_))));
    }

    #[test]
    fn test_request_accessors() {
        let request = TransferRequest::new(
            OperationKind::Move,
            vec![file_item("a"), file_item("b")],
            RemotePath::new("dst", "out"),
        )
        .unwrap();
        assert_eq!(request.kind(), OperationKind::Move);
        assert_eq!(request.len(), 2);
        assert!(!request.is_empty());
        assert_eq!(request.items()[1].name, "b");
        assert_eq!(request.destination_root().path, "out");
    }
}
