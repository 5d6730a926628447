//! The absolute-path handle used as the identity (`NodeKey`) of every node.
//!
//! Grounded on `filesentry::path::CannonicalPathBuf`: a cheap, comparable,
//! owned path type distinct from raw `PathBuf` ownership at every node. We
//! drop the byte-packed single-allocation representation filesentry uses (it
//! exists there to keep a whole-filesystem inode arena compact) in favor of
//! a plain `Arc<Path>`, since one tree view holds at most a few thousand
//! live nodes rather than filesentry's tree-wide crawl state.

use std::cmp::Ordering;
use std::ffi::OsStr;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use memchr::memrchr;

#[cfg(unix)]
const PATH_SEPARATOR: u8 = b'/';
#[cfg(windows)]
const PATH_SEPARATOR: u8 = b'\\';

/// An absolute path within some filesystem, or the empty path identifying
/// that filesystem's own root (`DirectoryEntry::FilesystemRoot`).
///
/// Cloning is an `Arc` bump, so a `NodePath` can be handed to a watch
/// callback, stashed in an event, and compared against a node's own key
/// without ever touching the filesystem.
#[derive(Clone, Eq)]
pub struct NodePath(Arc<Path>);

impl NodePath {
    /// The empty path identifying a filesystem's own root.
    pub fn root() -> Self {
        NodePath(Arc::from(Path::new("")))
    }

    pub fn is_root(&self) -> bool {
        self.0.as_os_str().is_empty()
    }

    /// Wraps an already-absolute path. Does not touch the filesystem.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        NodePath(Arc::from(path.into()))
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// Last path component, or the empty string for the root.
    pub fn name(&self) -> &str {
        if self.is_root() {
            return "";
        }
        self.0
            .file_name()
            .and_then(OsStr::to_str)
            .unwrap_or_default()
    }

    /// Same as [`name`](Self::name), but the empty string renders as `ε` so
    /// a host UI can still display a root or an empty-named entry.
    pub fn display_name(&self) -> String {
        let name = self.name();
        if name.is_empty() {
            "\u{03b5}".to_owned()
        } else {
            name.to_owned()
        }
    }

    pub fn parent(&self) -> Option<NodePath> {
        let bytes = self.0.as_os_str().as_encoded_bytes();
        let i = memrchr(PATH_SEPARATOR, bytes)?;
        if i == 0 {
            return Some(NodePath::root());
        }
        let parent = unsafe { OsStr::from_encoded_bytes_unchecked(&bytes[..i]) };
        Some(NodePath::new(PathBuf::from(parent)))
    }

    /// Appends a single path component (a file or directory name).
    pub fn join(&self, name: &str) -> NodePath {
        NodePath::new(self.0.join(name))
    }

}

impl PartialEq for NodePath {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl std::hash::Hash for NodePath {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl PartialOrd for NodePath {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for NodePath {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl fmt::Debug for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for NodePath {
    /// Renders the actual path text — the empty string for the root, never
    /// the `display_name()` sentinel. Anything keying a listing or a wire
    /// format by this string (directory-tree maps, `persist::encode`) needs
    /// the real path back; `display_name()` is the one place a host asks
    /// for something presentable instead.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

impl AsRef<Path> for NodePath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_has_empty_name_and_sentinel_display_name() {
        let root = NodePath::root();
        assert!(root.is_root());
        assert_eq!(root.name(), "");
        assert_eq!(root.display_name(), "\u{03b5}");
    }

    #[test]
    fn join_and_parent_roundtrip() {
        let root = NodePath::root();
        let a = root.join("a");
        let b = a.join("b");
        assert_eq!(b.name(), "b");
        assert_eq!(b.parent().as_ref(), Some(&a));
        assert_eq!(a.parent().as_ref(), Some(&root));
    }

    #[test]
    fn ordering_is_lexicographic_by_path() {
        let root = NodePath::root();
        let a = root.join("a");
        let b = root.join("b");
        assert!(a < b);
    }
}
