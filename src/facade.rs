//! `Facade`: the single entry point a host constructs and drives — the
//! owner of the shared [`NodeConfig`], the synthetic tree top, and the
//! current selection.
//!
//! Grounded on `filesentry::Watcher`: one long-lived handle a host keeps
//! around, backed by one `Arc<Config>` and one background thread, exposing
//! a small surface (`add_root`/`events`/`shutdown` there; `expand_path`/
//! `expanded_paths`/`close` here) rather than handing out the internal
//! tree machinery directly.

use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::config::{Config, NodeConfig};
use crate::controller::{
    expand_toward, expanded_paths_from, NodeController, NodeControllerHandle, PathSet, RootController,
};
use crate::error::FsTreeError;
use crate::filesystem::FileSystem;
use crate::path::NodePath;

/// The headless controller for one filesystem tree view: lazily expanded,
/// watch-synchronized, with at most one selected path at a time.
pub struct Facade {
    config: Arc<NodeConfig>,
    root: Arc<RootController>,
    selected: Mutex<Option<NodePath>>,
}

impl Facade {
    /// Builds a `Facade` from a finished [`Config`], constructing the
    /// synthetic root and (if the filesystem allows it) starting the
    /// background roots-poll thread.
    pub fn new(config: Config) -> Arc<Self> {
        Self::construct(NodeConfig::from_config(config))
    }

    fn construct(config: Arc<NodeConfig>) -> Arc<Self> {
        let view = (config.view_factory)(&NodePath::root());
        let root = RootController::construct(config.clone(), view);
        Arc::new(Self {
            config,
            root,
            selected: Mutex::new(None),
        })
    }

    fn root_handle(&self) -> NodeControllerHandle {
        self.root.clone() as NodeControllerHandle
    }

    /// Expands every plain-directory component of `path` in turn, from the
    /// tree's top down. A terminal file-mount component is only expanded
    /// (and its nested filesystem mounted) if `expand_last_element` is
    /// true; a file-mount named earlier in the path is always entered,
    /// since the traversal cannot continue past it otherwise.
    ///
    /// On success, returns the path actually reached — which is `path`
    /// itself if every component existed, or the deepest existing ancestor
    /// otherwise is reported as `Ok(None)` per the "fully resolved or not"
    /// contract. If `select` is true and the path fully resolved, it
    /// becomes the current selection.
    ///
    /// There is no null/`None` form of `path` here — a caller that wants
    /// "expand nothing, just drop the current selection" calls
    /// [`clear_selection`](Self::clear_selection) directly instead of
    /// passing a sentinel through this method.
    pub fn expand_path(
        &self,
        path: &Path,
        expand_last_element: bool,
        select: bool,
    ) -> Result<Option<NodePath>, FsTreeError> {
        if !path.is_absolute() {
            return Err(FsTreeError::NonAbsolutePath {
                path: path.display().to_string(),
            });
        }
        self.validate_domain(path)?;

        let target = NodePath::new(path.to_path_buf());
        let components = ancestor_components(&target);
        let (deepest, reached) = expand_toward(self.root_handle(), &components, expand_last_element);
        if !reached {
            return Ok(None);
        }
        let resolved = deepest.path().clone();
        if select {
            *self.selected.lock().unwrap() = Some(resolved.clone());
        }
        Ok(Some(resolved))
    }

    pub fn clear_selection(&self) {
        *self.selected.lock().unwrap() = None;
    }

    pub fn selected_path(&self) -> Option<NodePath> {
        self.selected.lock().unwrap().clone()
    }

    pub fn has_selection(&self) -> bool {
        self.selected.lock().unwrap().is_some()
    }

    /// A snapshot of every currently expanded path, deepest-first per
    /// branch, excluding the synthetic tree top itself.
    pub fn expanded_paths(&self) -> PathSet {
        expanded_paths_from(&self.root_handle())
    }

    /// Re-reads the whole expanded subtree from the live filesystem,
    /// independent of any watch event — a host-triggered refresh.
    pub fn update_tree(&self) {
        self.root.update_tree();
    }

    /// Collapses the entire tree, stops the roots-poll thread (if any),
    /// and shuts down the watch hub. A `Facade` is not usable afterwards.
    pub fn close(&self) {
        self.root.shutdown();
        self.config.watch_hub.close();
    }

    /// Test-only hook returning the live controller at `path`, expanding
    /// any unexpanded ancestor along the way. Lets the integration tests in
    /// `tests.rs` drive collapse on an arbitrary node — an operation real
    /// hosts perform through their own `NodeView` binding, which this
    /// headless core does not hand back through the public `Facade`
    /// surface (see `spec.md` §4.7's method list).
    #[cfg(test)]
    pub(crate) fn controller_at(&self, path: &Path) -> Option<NodeControllerHandle> {
        let target = NodePath::new(path.to_path_buf());
        let components = ancestor_components(&target);
        let (deepest, reached) = expand_toward(self.root_handle(), &components, true);
        reached.then_some(deepest)
    }

    fn validate_domain(&self, path: &Path) -> Result<(), FsTreeError> {
        match self.config.filesystem.list_roots() {
            Ok(roots) if !roots.is_empty() => {
                if roots.iter().any(|root| path.starts_with(root.as_path())) {
                    Ok(())
                } else {
                    Err(FsTreeError::DomainMismatch {
                        path: path.display().to_string(),
                    })
                }
            }
            Ok(_) => Ok(()),
            Err(err) => {
                log::warn!("failed to list roots while validating {path:?}: {err}");
                Ok(())
            }
        }
    }
}

/// Builds the root-to-leaf chain of component *names* `expand_toward`
/// descends through. Walking `NodePath::parent()` terminates at the
/// synthetic root sentinel regardless of whether the real OS root the
/// traversal passes through is `NodePath::root()` (a mounted filesystem's
/// trivial root) or an absolute one-segment path like `/` or `C:\` (a real
/// filesystem root reported by `FileSystem::list_roots`) — either way its
/// `name()` is the empty-string sentinel `find_child_by_name` matches a
/// root entry by, so the distinction is immaterial here.
fn ancestor_components(path: &NodePath) -> Vec<String> {
    let mut chain = Vec::new();
    let mut current = path.clone();
    loop {
        chain.push(current.name().to_string());
        match current.parent() {
            Some(parent) => current = parent,
            None => break,
        }
    }
    chain.reverse();
    chain
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigBuilder;
    use crate::filesystem::{DirListEntry, EntryKind, FileSystem, LinkOptions};
    use std::collections::HashMap;
    use std::io;

    struct FixtureFs {
        tree: HashMap<String, Vec<DirListEntry>>,
    }

    impl FileSystem for FixtureFs {
        fn list_roots(&self) -> io::Result<Vec<NodePath>> {
            Ok(vec![NodePath::new("/")])
        }
        fn probe(&self, _path: &NodePath, _link_options: LinkOptions) -> io::Result<EntryKind> {
            Ok(EntryKind::Directory)
        }
        fn read_dir(&self, path: &NodePath, _link_options: LinkOptions) -> io::Result<Vec<DirListEntry>> {
            Ok(self.tree.get(&path.to_string()).cloned().unwrap_or_default())
        }
    }

    fn dir_entry(name: &str, path: &str) -> DirListEntry {
        DirListEntry {
            name: name.to_owned(),
            path: NodePath::new(path),
            kind: EntryKind::Directory,
        }
    }

    fn fixture_facade() -> Arc<Facade> {
        let mut tree = HashMap::new();
        tree.insert("/".to_owned(), vec![dir_entry("a", "/a")]);
        tree.insert("/a".to_owned(), vec![dir_entry("b", "/a/b")]);
        tree.insert("/a/b".to_owned(), vec![dir_entry("c", "/a/b/c")]);
        let config = ConfigBuilder::default()
            .with_filesystem(Arc::new(FixtureFs { tree }))
            .with_watch_service(false)
            .build()
            .unwrap();
        Facade::new(config)
    }

    #[test]
    fn expand_path_rejects_relative_paths() {
        let facade = fixture_facade();
        let err = facade.expand_path(Path::new("a/b"), false, false).unwrap_err();
        assert!(matches!(err, FsTreeError::NonAbsolutePath { .. }));
    }

    #[test]
    fn expand_path_rejects_paths_outside_every_root() {
        let facade = fixture_facade();
        let err = facade
            .expand_path(Path::new("/other-root/x"), false, false)
            .unwrap_err();
        assert!(matches!(err, FsTreeError::DomainMismatch { .. }));
    }

    #[test]
    fn expand_path_expands_every_ancestor_and_selects_the_target() {
        let facade = fixture_facade();
        let resolved = facade
            .expand_path(Path::new("/a/b/c"), false, true)
            .unwrap()
            .expect("path fully resolved");
        assert_eq!(resolved, NodePath::new("/a/b/c"));
        assert_eq!(facade.selected_path(), Some(NodePath::new("/a/b/c")));
        assert_eq!(facade.expanded_paths().as_slice(), &[NodePath::new("/a/b/c")]);
    }

    #[test]
    fn expand_path_reports_unreached_target_as_none() {
        let facade = fixture_facade();
        let resolved = facade.expand_path(Path::new("/a/missing"), false, true).unwrap();
        assert!(resolved.is_none());
        assert!(!facade.has_selection());
    }

    #[test]
    fn clear_selection_drops_the_current_selection_without_collapsing() {
        let facade = fixture_facade();
        facade.expand_path(Path::new("/a/b/c"), false, true).unwrap();
        facade.clear_selection();
        assert!(!facade.has_selection());
        assert_eq!(facade.expanded_paths().as_slice(), &[NodePath::new("/a/b/c")]);
    }
}
