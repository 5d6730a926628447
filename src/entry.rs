//! `DirectoryEntry`: the tagged union of things that can occupy a slot in
//! a [`NodeChildren`](crate::node_children::NodeChildren) list.
//!
//! Grounded on `filesentry::tree::FsNode`, which stores a lazily-filled
//! back-reference (`children: DirId`) created during the same traversal
//! that discovers the node; here the back-reference is a type-erased
//! controller handle behind a `Mutex`, filled in on first expansion rather
//! than at discovery time.

use std::sync::{Arc, Mutex};

use crate::config::NodeConfig;
use crate::controller::{build_controller, NodeControllerHandle};
use crate::path::NodePath;

#[derive(Debug)]
struct EntryState {
    path: NodePath,
    name: String,
    controller: Mutex<Option<NodeControllerHandle>>,
}

/// A node identity: one of a filesystem root, a subdirectory, or a regular
/// file (which may or may not be mountable, per the active
/// [`NodePolicy`](crate::policy::NodePolicy)).
///
/// Cloning is cheap — every variant is an `Arc` over its state, including
/// the once-constructed controller handle, so the same entry can live in
/// both a `SortedDistinctList` and a closure captured by a watch callback.
#[derive(Debug, Clone)]
pub enum DirectoryEntry {
    /// One root reported by `FileSystem::list_roots`. `path()` is that
    /// root's real path (e.g. `/`, or `C:\` on a platform with drive
    /// letters); its `name()` follows the same empty-for-root convention
    /// as [`NodePath::name`], so a trivial single-root filesystem still
    /// renders via the same sentinel.
    FilesystemRoot(Arc<EntryState>),
    Subdirectory(Arc<EntryState>),
    /// A regular file; only ever produced when
    /// `NodePolicy::is_creating_node_for_file` accepted it.
    RegularFile(Arc<EntryState>),
}

impl DirectoryEntry {
    pub fn root_at(path: NodePath) -> Self {
        let name = path.name().to_string();
        DirectoryEntry::FilesystemRoot(Arc::new(EntryState {
            path,
            name,
            controller: Mutex::new(None),
        }))
    }

    pub fn subdirectory(path: NodePath) -> Self {
        let name = path.name().to_string();
        DirectoryEntry::Subdirectory(Arc::new(EntryState {
            path,
            name,
            controller: Mutex::new(None),
        }))
    }

    pub fn regular_file(path: NodePath) -> Self {
        let name = path.name().to_string();
        DirectoryEntry::RegularFile(Arc::new(EntryState {
            path,
            name,
            controller: Mutex::new(None),
        }))
    }

    fn state(&self) -> &EntryState {
        match self {
            DirectoryEntry::FilesystemRoot(state)
            | DirectoryEntry::Subdirectory(state)
            | DirectoryEntry::RegularFile(state) => state,
        }
    }

    pub fn path(&self) -> &NodePath {
        &self.state().path
    }

    /// Last path element, or the root's own name, or the empty string
    /// (rendered by [`display_name`](Self::display_name) as a sentinel).
    pub fn name(&self) -> &str {
        &self.state().name
    }

    pub fn display_name(&self) -> std::borrow::Cow<'_, str> {
        let name = self.name();
        if name.is_empty() {
            std::borrow::Cow::Borrowed("\u{03b5}")
        } else {
            std::borrow::Cow::Borrowed(name)
        }
    }

    /// Builds (once) and returns this entry's controller, or returns the
    /// already-built one, ignoring `view` in that case — an entry's
    /// controller and view identity are fixed at first construction.
    pub fn init_controller(
        &self,
        config: &Arc<NodeConfig>,
        view: Arc<dyn crate::view::NodeView>,
    ) -> NodeControllerHandle {
        let mut slot = self.state().controller.lock().unwrap();
        if let Some(existing) = slot.as_ref() {
            return existing.clone();
        }
        let controller = build_controller(self.clone(), config.clone(), view);
        *slot = Some(controller.clone());
        controller
    }

    pub fn current_controller(&self) -> Option<NodeControllerHandle> {
        self.state().controller.lock().unwrap().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_display_name_uses_sentinel_when_empty() {
        let entry = DirectoryEntry::root_at(NodePath::root());
        assert_eq!(entry.name(), "");
        assert_eq!(entry.display_name(), "\u{03b5}");
    }

    #[test]
    fn subdirectory_name_is_last_component() {
        let entry = DirectoryEntry::subdirectory(NodePath::new("/a/b/leaf"));
        assert_eq!(entry.name(), "leaf");
        assert_eq!(entry.display_name(), "leaf");
    }
}
