//! `NodeController`: the per-node runtime behind one position in the tree
//! — expand/collapse, watch-driven incremental updates, and (for a
//! mountable file) owning a nested filesystem.
//!
//! There is no single teacher analogue for the whole trait: it is grounded
//! on `filesentry::tree::FsNode`'s lazily-filled child state plus
//! `filesentry::worker::Worker`'s self-referential `Weak` (a watch callback
//! needs to reach back into the node that registered it without holding it
//! alive), generalized into three variants matching the three
//! [`DirectoryEntry`] kinds plus one facade-owned root that is never itself
//! a `DirectoryEntry`.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex, OnceLock, Weak};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::config::NodeConfig;
use crate::entry::DirectoryEntry;
use crate::filesystem::FileSystem;
use crate::node_children::NodeChildren;
use crate::path::NodePath;
use crate::policy::NodePolicy;
use crate::reader;
use crate::view::NodeView;
use crate::watch_hub::HubEvent;

/// How often the root controller re-reads the filesystem's own root list,
/// on a filesystem whose [`FileSystem::roots_can_change`] is true.
const ROOTS_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// A sorted, deduplicated snapshot of expanded paths, as returned by
/// [`crate::facade::Facade::expanded_paths`].
pub type PathSet = ecow::EcoVec<NodePath>;

/// One node's live behavior: expand/collapse, incremental watch-driven
/// updates, and the bookkeeping `expanded_paths`/`expand_path` need to walk
/// the tree without caring which of the three kinds a given node is.
pub trait NodeController: Send + Sync {
    fn view(&self) -> Arc<dyn NodeView>;
    fn path(&self) -> &NodePath;
    fn set_expanded(&self, flag: bool);
    fn is_expanded(&self) -> bool;
    fn update_tree(&self);
    fn find_child_by_name(&self, name: &str) -> Option<DirectoryEntry>;
    /// Builds (or returns the existing) controller for one of this node's
    /// own children, using whichever [`NodeConfig`] this node itself reads
    /// through (the outer one, or a mount's nested one).
    fn child_controller(&self, entry: &DirectoryEntry) -> NodeControllerHandle;
    fn children_snapshot(&self) -> Vec<DirectoryEntry>;
    /// Whether this node is a file-mount — used by [`expand_toward`] to
    /// decide whether `expand_last_element` gates its expansion.
    fn is_mount(&self) -> bool {
        false
    }
}

pub type NodeControllerHandle = Arc<dyn NodeController>;

/// Dispatches a freshly discovered [`DirectoryEntry`] to the matching
/// controller implementation.
pub fn build_controller(
    entry: DirectoryEntry,
    config: Arc<NodeConfig>,
    view: Arc<dyn NodeView>,
) -> NodeControllerHandle {
    match &entry {
        DirectoryEntry::FilesystemRoot(_) => {
            DirectoryLikeController::new_arc(entry.path().clone(), config, view, false)
        }
        DirectoryEntry::Subdirectory(_) => {
            DirectoryLikeController::new_arc(entry.path().clone(), config, view, true)
        }
        DirectoryEntry::RegularFile(_) => FileMountController::new_arc(entry.path().clone(), config, view),
    }
}

/// Descends `components`, one per iteration, starting at `root`. Every
/// plain-directory component along the way is always expanded (that is
/// simply what reaching a directory means); a file-mount is only expanded
/// if it is the final component and `expand_last` holds, or if more path
/// remains beyond it (a mount an earlier component names must be entered
/// to continue the traversal regardless of the flag).
///
/// Returns the deepest reached controller and whether the whole requested
/// path was resolved (`false` if some component along the way did not
/// exist, per policy or the live filesystem).
pub fn expand_toward(
    root: NodeControllerHandle,
    components: &[String],
    expand_last: bool,
) -> (NodeControllerHandle, bool) {
    let mut current = root;
    for (i, name) in components.iter().enumerate() {
        let is_final = i + 1 == components.len();
        let Some(entry) = current.find_child_by_name(name) else {
            return (current, false);
        };
        let child = current.child_controller(&entry);
        let gate = !(is_final && child.is_mount()) || expand_last;
        if gate {
            child.set_expanded(true);
        }
        current = child;
    }
    (current, true)
}

/// The deepest-expanded-paths snapshot described by the design docs: if a
/// node has at least one expanded child, the union of their snapshots;
/// otherwise this node's own path. Only ever called on a node already
/// known to be expanded.
fn expanded_paths_of(controller: &NodeControllerHandle) -> PathSet {
    let mut expanded_descendants = PathSet::new();
    for entry in controller.children_snapshot() {
        if let Some(child) = entry.current_controller() {
            if child.is_expanded() {
                expanded_descendants.extend(expanded_paths_of(&child));
            }
        }
    }
    if expanded_descendants.is_empty() {
        PathSet::from_iter([controller.path().clone()])
    } else {
        expanded_descendants
    }
}

/// Snapshot of every currently expanded path reachable from `root`,
/// excluding the synthetic empty path a facade-owned root controller
/// identifies itself with.
pub fn expanded_paths_from(root: &NodeControllerHandle) -> PathSet {
    let mut paths: Vec<NodePath> = expanded_paths_of(root)
        .into_iter()
        .filter(|path| !path.is_root())
        .collect();
    paths.sort();
    paths.dedup();
    PathSet::from_iter(paths)
}

/// Behavior shared by a filesystem root entry (e.g. `/`) and an ordinary
/// subdirectory: both read one directory at a time, watch it for
/// create/delete events, and recurse the same way on update/collapse. The
/// only difference is whether the node registers *itself* with the watch
/// hub — root entries never do (design docs: "watch-hub registration is
/// never attempted on the roots themselves"); their children, being
/// ordinary subdirectories, register normally.
struct DirectoryLikeController {
    path: NodePath,
    config: Arc<NodeConfig>,
    children: NodeChildren,
    register_self: bool,
    self_ref: OnceLock<Weak<DirectoryLikeController>>,
}

impl DirectoryLikeController {
    fn new_arc(
        path: NodePath,
        config: Arc<NodeConfig>,
        view: Arc<dyn NodeView>,
        register_self: bool,
    ) -> NodeControllerHandle {
        let children = NodeChildren::new(config.clone(), path.as_path(), view);
        let arc = Arc::new(Self {
            path,
            config,
            children,
            register_self,
            self_ref: OnceLock::new(),
        });
        let _ = arc.self_ref.set(Arc::downgrade(&arc));
        arc.register_update_notifier();
        arc
    }

    /// Hands the per-node policy a callback it can invoke to force this
    /// node to recheck `is_leaf_node` and, if it went from leaf back to
    /// non-leaf while still expanded, re-read its directory.
    fn register_update_notifier(self: &Arc<Self>) {
        if !self.children.policy.is_requesting_update_notifier() {
            return;
        }
        let Some(weak) = self.self_ref.get().cloned() else {
            return;
        };
        self.children.policy.set_update_notifier(Arc::new(move || {
            if let Some(this) = weak.upgrade() {
                this.handle_policy_update();
            }
        }));
    }

    /// Rechecks leaf-ness against the current policy. Becoming a leaf
    /// forces an expanded node's children empty without collapsing the
    /// node itself; becoming a leaf no longer applies re-reads the
    /// directory to repopulate them (design docs' policy-driven leaf-flip
    /// scenario).
    fn handle_policy_update(&self) {
        self.children.recompute_leaf(self.path.as_path(), |entry| {
            if let Some(child) = entry.current_controller() {
                child.set_expanded(false);
            }
        });
        if !self.children.is_leaf() {
            self.do_update();
        }
    }

    fn child_controller_entry(&self, entry: &DirectoryEntry) -> NodeControllerHandle {
        entry.init_controller(&self.config, (self.config.view_factory)(entry.path()))
    }

    fn do_expand(&self) {
        if !self.children.begin_expand() {
            return;
        }
        let outcome = reader::read_directory(&self.config, &self.path);
        let start_watch = outcome.start_watch;
        self.children
            .apply_read(outcome, |entry| self.child_controller_entry(entry));
        if start_watch && self.register_self && self.config.watch_hub.is_available() {
            if let Some(weak) = self.self_ref.get().cloned() {
                self.config.watch_hub.register(
                    &self.path,
                    Arc::new(move |event| {
                        if let Some(this) = weak.upgrade() {
                            this.handle_watch_event(event);
                        }
                    }),
                );
            }
        }
    }

    fn handle_watch_event(&self, event: HubEvent) {
        match event {
            HubEvent::Create { name } => {
                let child_path = self.path.join(&name);
                if let Some(entry) = reader::classify_entry(&self.config, &child_path) {
                    self.children.add_entry(entry, |entry| self.child_controller_entry(entry));
                }
            }
            HubEvent::Delete { name } => {
                self.children.remove_entry(&name);
            }
            HubEvent::Overflow => {
                let outcome = reader::read_directory(&self.config, &self.path);
                self.children
                    .synchronize_to(outcome.entries, |entry| self.child_controller_entry(entry));
            }
        }
    }

    fn do_collapse(&self) {
        self.children.collapse(|entry| {
            if let Some(child) = entry.current_controller() {
                child.set_expanded(false);
            }
        });
        if self.register_self && self.config.watch_hub.is_watched(&self.path) {
            self.config.watch_hub.unregister(&self.path);
        }
    }

    fn do_update(&self) {
        if !self.children.is_expanded() {
            return;
        }
        let outcome = reader::read_directory(&self.config, &self.path);
        self.children
            .synchronize_to(outcome.entries, |entry| self.child_controller_entry(entry));
        for entry in self.children.entries() {
            if let Some(child) = entry.current_controller() {
                if child.is_expanded() {
                    child.update_tree();
                }
            }
        }
    }
}

impl NodeController for DirectoryLikeController {
    fn view(&self) -> Arc<dyn NodeView> {
        self.children.view.clone()
    }

    fn path(&self) -> &NodePath {
        &self.path
    }

    fn set_expanded(&self, flag: bool) {
        if flag {
            self.do_expand();
        } else {
            self.do_collapse();
        }
    }

    fn is_expanded(&self) -> bool {
        self.children.is_expanded()
    }

    fn update_tree(&self) {
        self.do_update();
    }

    fn find_child_by_name(&self, name: &str) -> Option<DirectoryEntry> {
        self.children.find_child_by_name(name)
    }

    fn child_controller(&self, entry: &DirectoryEntry) -> NodeControllerHandle {
        self.child_controller_entry(entry)
    }

    fn children_snapshot(&self) -> Vec<DirectoryEntry> {
        self.children.entries()
    }
}

#[derive(Clone)]
struct MountState {
    nested_config: Arc<NodeConfig>,
    filesystem: Arc<dyn FileSystem>,
}

/// A regular file that may, per [`NodePolicy::create_filesystem_for`](
/// crate::policy::NodePolicy::create_filesystem_for), mount a nested
/// filesystem (an archive, a disk image, ...) on expansion. Mounted
/// filesystems are never watched (design Non-goal), and their single
/// trivial root is transparently skipped by [`reader::read_roots`], so an
/// archive whose entries all live under one root never shows a vestigial
/// extra level.
struct FileMountController {
    path: NodePath,
    outer_config: Arc<NodeConfig>,
    children: NodeChildren,
    mount: Mutex<Option<MountState>>,
}

impl FileMountController {
    fn new_arc(path: NodePath, outer_config: Arc<NodeConfig>, view: Arc<dyn NodeView>) -> NodeControllerHandle {
        let children = NodeChildren::new(outer_config.clone(), path.as_path(), view);
        Arc::new(Self {
            path,
            outer_config,
            children,
            mount: Mutex::new(None),
        })
    }

    fn do_expand(&self) {
        if !self.children.begin_expand() {
            return;
        }
        let Some(filesystem) = self.outer_config.node_policy.create_filesystem_for(self.path.as_path()) else {
            self.children.apply_read(
                reader::ReadOutcome {
                    entries: Vec::new(),
                    start_watch: false,
                },
                |_| unreachable!("no entries to build a controller for"),
            );
            return;
        };
        let nested_config = self.outer_config.for_mounted_filesystem(filesystem.clone());
        let outcome = reader::read_roots(&nested_config, true);
        self.children.apply_read(outcome, |entry| {
            entry.init_controller(&nested_config, (nested_config.view_factory)(entry.path()))
        });
        *self.mount.lock().unwrap() = Some(MountState {
            nested_config,
            filesystem,
        });
    }

    fn do_collapse(&self) {
        self.children.collapse(|entry| {
            if let Some(child) = entry.current_controller() {
                child.set_expanded(false);
            }
        });
        if let Some(mount) = self.mount.lock().unwrap().take() {
            if !self.outer_config.is_default_filesystem(&mount.filesystem) {
                if let Err(err) = mount.filesystem.close() {
                    log::warn!("failed to close mounted filesystem at {}: {err}", self.path);
                }
            }
            self.outer_config.node_policy.on_closing_filesystem(&mount.filesystem);
        }
    }

    fn do_update(&self) {
        if !self.children.is_expanded() {
            return;
        }
        let Some(mount) = self.mount.lock().unwrap().clone() else {
            return;
        };
        let outcome = reader::read_roots(&mount.nested_config, true);
        self.children.synchronize_to(outcome.entries, |entry| {
            entry.init_controller(&mount.nested_config, (mount.nested_config.view_factory)(entry.path()))
        });
        for entry in self.children.entries() {
            if let Some(child) = entry.current_controller() {
                if child.is_expanded() {
                    child.update_tree();
                }
            }
        }
    }
}

impl NodeController for FileMountController {
    fn view(&self) -> Arc<dyn NodeView> {
        self.children.view.clone()
    }

    fn path(&self) -> &NodePath {
        &self.path
    }

    fn set_expanded(&self, flag: bool) {
        if flag {
            self.do_expand();
        } else {
            self.do_collapse();
        }
    }

    fn is_expanded(&self) -> bool {
        self.children.is_expanded()
    }

    fn update_tree(&self) {
        self.do_update();
    }

    fn find_child_by_name(&self, name: &str) -> Option<DirectoryEntry> {
        self.children.find_child_by_name(name)
    }

    fn child_controller(&self, entry: &DirectoryEntry) -> NodeControllerHandle {
        let mount = self.mount.lock().unwrap();
        let mount = mount
            .as_ref()
            .expect("child_controller called on a file-mount with no live mount");
        entry.init_controller(&mount.nested_config, (mount.nested_config.view_factory)(entry.path()))
    }

    fn children_snapshot(&self) -> Vec<DirectoryEntry> {
        self.children.entries()
    }

    fn is_mount(&self) -> bool {
        true
    }
}

/// The facade-owned top of the tree: not itself a [`DirectoryEntry`],
/// permanently expanded (there is nothing to collapse it into — the roots
/// list is always shown), and, on a filesystem whose roots can change
/// without notice, backed by a periodic re-read rather than a watch
/// registration (design docs: "watch-hub registration is never attempted
/// on the roots themselves").
pub struct RootController {
    path: NodePath,
    config: Arc<NodeConfig>,
    children: NodeChildren,
    poll_shutdown: Arc<AtomicBool>,
    poll_thread: Mutex<Option<JoinHandle<()>>>,
}

impl RootController {
    pub fn construct(config: Arc<NodeConfig>, view: Arc<dyn NodeView>) -> Arc<Self> {
        let children = NodeChildren::new(config.clone(), Path::new(""), view);
        let this = Arc::new(Self {
            path: NodePath::root(),
            config,
            children,
            poll_shutdown: Arc::new(AtomicBool::new(false)),
            poll_thread: Mutex::new(None),
        });
        this.children.begin_expand();
        let outcome = reader::read_roots(&this.config, false);
        this.children
            .apply_read(outcome, |entry| this.child_controller_entry(entry));

        if this.config.filesystem.roots_can_change() {
            let shutdown = this.poll_shutdown.clone();
            let weak = Arc::downgrade(&this);
            let handle = std::thread::spawn(move || loop {
                std::thread::sleep(ROOTS_POLL_INTERVAL);
                if shutdown.load(AtomicOrdering::Relaxed) {
                    break;
                }
                match weak.upgrade() {
                    Some(this) => this.refresh_roots(),
                    None => break,
                }
            });
            *this.poll_thread.lock().unwrap() = Some(handle);
        }
        this
    }

    fn child_controller_entry(&self, entry: &DirectoryEntry) -> NodeControllerHandle {
        entry.init_controller(&self.config, (self.config.view_factory)(entry.path()))
    }

    fn refresh_roots(&self) {
        let outcome = reader::read_roots(&self.config, false);
        self.children
            .synchronize_to(outcome.entries, |entry| self.child_controller_entry(entry));
    }

    /// Forces the whole tree collapsed and stops the roots-poll thread, if
    /// any. Called once by [`crate::facade::Facade::close`].
    pub fn shutdown(&self) {
        self.poll_shutdown.store(true, AtomicOrdering::Relaxed);
        if let Some(handle) = self.poll_thread.lock().unwrap().take() {
            let _ = handle.join();
        }
        self.children.collapse(|entry| {
            if let Some(child) = entry.current_controller() {
                child.set_expanded(false);
            }
        });
    }
}

impl NodeController for RootController {
    fn view(&self) -> Arc<dyn NodeView> {
        self.children.view.clone()
    }

    fn path(&self) -> &NodePath {
        &self.path
    }

    /// Expanding is a no-op (the root is always expanded); collapsing tears
    /// the whole tree down. Only [`RootController::shutdown`] does the
    /// latter in practice — a host has no other way to reach this
    /// controller to call it directly.
    fn set_expanded(&self, flag: bool) {
        if !flag {
            self.children.collapse(|entry| {
                if let Some(child) = entry.current_controller() {
                    child.set_expanded(false);
                }
            });
        }
    }

    fn is_expanded(&self) -> bool {
        true
    }

    fn update_tree(&self) {
        self.refresh_roots();
        for entry in self.children.entries() {
            if let Some(child) = entry.current_controller() {
                if child.is_expanded() {
                    child.update_tree();
                }
            }
        }
    }

    fn find_child_by_name(&self, name: &str) -> Option<DirectoryEntry> {
        self.children.find_child_by_name(name)
    }

    fn child_controller(&self, entry: &DirectoryEntry) -> NodeControllerHandle {
        self.child_controller_entry(entry)
    }

    fn children_snapshot(&self) -> Vec<DirectoryEntry> {
        self.children.entries()
    }
}
