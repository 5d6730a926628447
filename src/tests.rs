//! Crate-root integration tests driving a full [`Facade`] end to end,
//! mirroring `filesentry::tests`: one root-level module exercising the
//! public entry point against whole directory fixtures (and, for the
//! watch-driven scenario, a real temporary directory) rather than any one
//! module in isolation.
//!
//! Per-module unit tests already cover the fine-grained state machine
//! (`controller.rs`), the diffing list (`sorted_list.rs`), and the watch
//! multiplexer (`watch_hub.rs`) directly against their own internals; this
//! module instead walks the scenarios in terms a host actually sees:
//! `Facade::expand_path`/`expanded_paths`/`update_tree` and the
//! [`NodeView`] calls they produce.

use std::collections::HashMap;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::config::{Config, ConfigBuilder};
use crate::controller::NodeController;
use crate::facade::Facade;
use crate::filesystem::{DirListEntry, EntryKind, FileSystem, LinkOptions, NotifyWatchPrimitive, WatchPrimitive};
use crate::path::NodePath;
use crate::policy::{NodePolicy, UpdateNotifier};
use crate::view::NodeView;

/// Blocks until `check` returns true, polling every 20ms, panicking if
/// `timeout` elapses first. The watch-driven scenarios are the only tests
/// here that need this — everything else settles synchronously within
/// one `expand_path`/`update_tree` call.
fn wait_until(timeout: Duration, mut check: impl FnMut() -> bool) {
    let start = Instant::now();
    loop {
        if check() {
            return;
        }
        if start.elapsed() > timeout {
            panic!("condition not met within {timeout:?}");
        }
        std::thread::sleep(Duration::from_millis(20));
    }
}

/// A [`NodeView`] recording only the structural shape a host's own tree
/// widget would show: how many children are currently attached, and
/// whether this node is expanded. Naming a specific child is deliberately
/// not tracked — the `NodeView` contract never hands a parent its child's
/// path, only an opaque handle, so a real adapter gets a child's display
/// name from its own model lookup, not from this trait.
#[derive(Default)]
struct CapturingView {
    children: Mutex<Vec<Arc<dyn NodeView>>>,
    expanded: Mutex<bool>,
    leaf: Mutex<bool>,
}

impl CapturingView {
    fn children_count(&self) -> usize {
        self.children.lock().unwrap().len()
    }

    fn is_expanded(&self) -> bool {
        *self.expanded.lock().unwrap()
    }
}

impl NodeView for CapturingView {
    fn insert_subnodes(&self, indexed_views: &[(usize, Arc<dyn NodeView>)]) {
        let mut children = self.children.lock().unwrap();
        for (index, view) in indexed_views {
            let index = (*index).min(children.len());
            children.insert(index, view.clone());
        }
    }

    fn add_all_subnodes(&self, views: Vec<Arc<dyn NodeView>>) {
        *self.children.lock().unwrap() = views;
    }

    fn remove_subnodes(&self, indices: &[usize]) {
        let mut children = self.children.lock().unwrap();
        for &index in indices {
            if index < children.len() {
                children.remove(index);
            }
        }
    }

    fn clear(&self) {
        self.children.lock().unwrap().clear();
    }

    fn set_expanded(&self, expanded: bool) {
        *self.expanded.lock().unwrap() = expanded;
    }

    fn set_leaf(&self, leaf: bool) {
        *self.leaf.lock().unwrap() = leaf;
    }
}

/// Mints a [`CapturingView`] per path and keeps every one of them
/// reachable afterwards, so a test can assert on a specific node's view
/// once the facade has built it.
#[derive(Default, Clone)]
struct ViewRegistry {
    views: Arc<Mutex<HashMap<NodePath, Arc<CapturingView>>>>,
}

impl ViewRegistry {
    fn factory(&self) -> crate::config::ViewFactory {
        let views = self.views.clone();
        Arc::new(move |path: &NodePath| {
            let view = Arc::new(CapturingView::default());
            views.lock().unwrap().insert(path.clone(), view.clone());
            view as Arc<dyn NodeView>
        })
    }

    fn get(&self, path: &NodePath) -> Arc<CapturingView> {
        self.views
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .unwrap_or_else(|| panic!("no view was ever minted for {path:?}"))
    }
}

/// An in-memory directory tree a test can mutate after construction (for
/// the explicit-`update_tree` scenario, where nothing notifies the core
/// of the change).
struct FixtureFs {
    roots: Vec<NodePath>,
    tree: Mutex<HashMap<String, Vec<DirListEntry>>>,
}

impl FixtureFs {
    fn new(roots: Vec<NodePath>, tree: HashMap<String, Vec<DirListEntry>>) -> Self {
        Self {
            roots,
            tree: Mutex::new(tree),
        }
    }

    fn insert(&self, dir: &str, entries: Vec<DirListEntry>) {
        self.tree.lock().unwrap().insert(dir.to_owned(), entries);
    }
}

impl FileSystem for FixtureFs {
    fn list_roots(&self) -> io::Result<Vec<NodePath>> {
        Ok(self.roots.clone())
    }

    fn probe(&self, _path: &NodePath, _link_options: LinkOptions) -> io::Result<EntryKind> {
        Ok(EntryKind::Directory)
    }

    fn read_dir(&self, path: &NodePath, _link_options: LinkOptions) -> io::Result<Vec<DirListEntry>> {
        Ok(self.tree.lock().unwrap().get(&path.to_string()).cloned().unwrap_or_default())
    }
}

fn dir(name: &str, path: &str) -> DirListEntry {
    DirListEntry {
        name: name.to_owned(),
        path: NodePath::new(path),
        kind: EntryKind::Directory,
    }
}

fn file(name: &str, path: &str) -> DirListEntry {
    DirListEntry {
        name: name.to_owned(),
        path: NodePath::new(path),
        kind: EntryKind::File,
    }
}

/// Scenario 1 (single unix-style root): expanding a deep path selects it
/// and collapses the snapshot down to its deepest expanded component;
/// collapsing one of the intermediate directories (not the root itself —
/// `Facade` hands out no path-addressed collapse, so the test reaches the
/// controller the same way a host's own view binding would) brings the
/// snapshot back up to the nearest still-expanded ancestor, and leaves
/// the selection untouched, since unselecting a path whose ancestor
/// collapsed is a host-level policy this core does not apply on its own.
#[test]
fn unix_root_expand_select_and_partial_collapse_preserves_ancestor_expansion() {
    let mut tree = HashMap::new();
    tree.insert("/".to_owned(), vec![dir("a", "/a")]);
    tree.insert("/a".to_owned(), vec![dir("b", "/a/b")]);
    tree.insert("/a/b".to_owned(), vec![dir("c", "/a/b/c")]);
    let fs = Arc::new(FixtureFs::new(vec![NodePath::new("/")], tree));
    let config = ConfigBuilder::default()
        .with_filesystem(fs)
        .with_watch_service(false)
        .build()
        .unwrap();
    let facade = Facade::new(config);

    let resolved = facade.expand_path(Path::new("/"), false, false).unwrap();
    assert_eq!(resolved, Some(NodePath::new("/")));
    assert_eq!(facade.expanded_paths().as_slice(), &[NodePath::new("/")]);

    let resolved = facade.expand_path(Path::new("/a/b/c"), false, true).unwrap();
    assert_eq!(resolved, Some(NodePath::new("/a/b/c")));
    assert_eq!(facade.selected_path(), Some(NodePath::new("/a/b/c")));
    assert_eq!(facade.expanded_paths().as_slice(), &[NodePath::new("/a/b/c")]);

    let a = facade.controller_at(Path::new("/a")).expect("/a is already expanded");
    a.set_expanded(false);
    assert_eq!(facade.expanded_paths().as_slice(), &[NodePath::new("/")]);
    assert_eq!(facade.selected_path(), Some(NodePath::new("/a/b/c")));
}

/// Scenario 2 (static multiple roots under one host, no watch service):
/// every root is independently reachable, and expanding under one leaves
/// the others untouched.
#[test]
fn multiple_static_roots_are_all_independently_reachable() {
    let mut tree = HashMap::new();
    tree.insert("/drive-c".to_owned(), vec![dir("Users", "/drive-c/Users")]);
    tree.insert("/drive-d".to_owned(), vec![dir("Data", "/drive-d/Data")]);
    let fs = Arc::new(FixtureFs::new(
        vec![NodePath::new("/drive-c"), NodePath::new("/drive-d")],
        tree,
    ));
    let config = ConfigBuilder::default()
        .with_filesystem(fs)
        .with_watch_service(false)
        .build()
        .unwrap();
    let facade = Facade::new(config);

    facade.expand_path(Path::new("/drive-c/Users"), false, false).unwrap();
    facade.expand_path(Path::new("/drive-d/Data"), false, false).unwrap();

    let mut expanded: Vec<_> = facade.expanded_paths().iter().cloned().collect();
    expanded.sort();
    assert_eq!(
        expanded,
        vec![NodePath::new("/drive-c/Users"), NodePath::new("/drive-d/Data")]
    );

    let err = facade
        .expand_path(Path::new("/drive-e/nope"), false, false)
        .unwrap_err();
    assert!(matches!(err, crate::error::FsTreeError::DomainMismatch { .. }));
}

/// Scenario 3 (mounted archive): the mounted filesystem's own trivial
/// root is never a visible extra level — its direct children resolve as
/// if they were children of the mount point itself.
#[test]
fn mounted_archive_trivial_root_is_skipped_and_nested_entries_resolve() {
    struct NestedFs {
        tree: HashMap<String, Vec<DirListEntry>>,
    }
    impl FileSystem for NestedFs {
        fn list_roots(&self) -> io::Result<Vec<NodePath>> {
            Ok(vec![NodePath::root()])
        }
        fn probe(&self, _path: &NodePath, _link_options: LinkOptions) -> io::Result<EntryKind> {
            Ok(EntryKind::Directory)
        }
        fn read_dir(&self, path: &NodePath, _link_options: LinkOptions) -> io::Result<Vec<DirListEntry>> {
            Ok(self.tree.get(&path.to_string()).cloned().unwrap_or_default())
        }
    }

    struct MountingPolicy;
    impl NodePolicy for MountingPolicy {
        fn is_creating_node_for_file(&self, _path: &Path) -> bool {
            true
        }
        fn create_filesystem_for(&self, _path: &Path) -> Option<Arc<dyn FileSystem>> {
            let mut tree = HashMap::new();
            tree.insert(String::new(), vec![dir("test1", "/test1")]);
            tree.insert("/test1".to_owned(), vec![dir("d", "/test1/d")]);
            tree.insert("/test1/d".to_owned(), vec![dir("e", "/test1/d/e")]);
            tree.insert("/test1/d/e".to_owned(), vec![dir("f", "/test1/d/e/f")]);
            Some(Arc::new(NestedFs { tree }))
        }
    }

    let mut tree = HashMap::new();
    tree.insert("/".to_owned(), vec![file("archive.zip", "/archive.zip")]);
    let fs = Arc::new(FixtureFs::new(vec![NodePath::new("/")], tree));
    let config = ConfigBuilder::default()
        .with_filesystem(fs)
        .with_watch_service(false)
        .with_node_policy(Arc::new(MountingPolicy))
        .build()
        .unwrap();
    let facade = Facade::new(config);

    let resolved = facade
        .expand_path(Path::new("/archive.zip/test1/d/e/f"), true, true)
        .unwrap();
    assert_eq!(resolved, Some(NodePath::new("/archive.zip/test1/d/e/f")));
    assert_eq!(
        facade.expanded_paths().as_slice(),
        &[NodePath::new("/archive.zip/test1/d/e/f")]
    );
}

/// Scenario 5 (policy-driven leaf flip), observed through the view layer
/// rather than the controller directly: a directory with live children
/// loses them all the moment the policy reports it a leaf, and gets them
/// back, freshly re-read, the moment the policy reports otherwise.
#[test]
fn policy_driven_leaf_flip_empties_and_restores_children_through_the_view() {
    struct FlippablePolicy {
        leaf: AtomicBool,
        notifier: Mutex<Option<UpdateNotifier>>,
    }
    impl NodePolicy for FlippablePolicy {
        fn is_leaf_node(&self, _path: &Path) -> bool {
            self.leaf.load(Ordering::SeqCst)
        }
        fn is_requesting_update_notifier(&self) -> bool {
            true
        }
        fn set_update_notifier(&self, notifier: UpdateNotifier) {
            *self.notifier.lock().unwrap() = Some(notifier);
        }
    }

    let mut tree = HashMap::new();
    tree.insert("/".to_owned(), vec![dir("a", "/a")]);
    tree.insert(
        "/a".to_owned(),
        vec![dir("x", "/a/x"), dir("y", "/a/y"), dir("z", "/a/z")],
    );
    let fs = Arc::new(FixtureFs::new(vec![NodePath::new("/")], tree));
    let policy = Arc::new(FlippablePolicy {
        leaf: AtomicBool::new(false),
        notifier: Mutex::new(None),
    });
    let registry = ViewRegistry::default();
    let config = ConfigBuilder::default()
        .with_filesystem(fs)
        .with_watch_service(false)
        .with_node_policy(policy.clone())
        .with_view_factory(registry.factory())
        .build()
        .unwrap();
    let facade = Facade::new(config);

    facade.expand_path(Path::new("/a"), false, false).unwrap();
    let a_view = registry.get(&NodePath::new("/a"));
    assert_eq!(a_view.children_count(), 3);
    assert!(a_view.is_expanded());

    policy.leaf.store(true, Ordering::SeqCst);
    (policy.notifier.lock().unwrap().as_ref().unwrap())();
    assert_eq!(a_view.children_count(), 0);

    policy.leaf.store(false, Ordering::SeqCst);
    (policy.notifier.lock().unwrap().as_ref().unwrap())();
    assert_eq!(a_view.children_count(), 3);
}

/// An explicit [`Facade::update_tree`] call picks up a change the
/// filesystem made with no matching watch event at all (the fixture here
/// never registers a watch primitive in the first place).
#[test]
fn explicit_update_tree_picks_up_out_of_band_filesystem_changes() {
    let mut tree = HashMap::new();
    tree.insert("/".to_owned(), vec![dir("a", "/a")]);
    tree.insert("/a".to_owned(), vec![dir("x", "/a/x")]);
    let fs = Arc::new(FixtureFs::new(vec![NodePath::new("/")], tree));
    let registry = ViewRegistry::default();
    let config = ConfigBuilder::default()
        .with_filesystem(fs.clone())
        .with_watch_service(false)
        .with_view_factory(registry.factory())
        .build()
        .unwrap();
    let facade = Facade::new(config);

    facade.expand_path(Path::new("/a"), false, false).unwrap();
    let a_view = registry.get(&NodePath::new("/a"));
    assert_eq!(a_view.children_count(), 1);

    fs.insert("/a", vec![dir("x", "/a/x"), dir("y", "/a/y")]);
    assert_eq!(a_view.children_count(), 1, "no event fired yet, so nothing changed");

    facade.update_tree();
    assert_eq!(a_view.children_count(), 2);
}

/// Scenario 4 (watch-service create/delete), driven against a real
/// directory with the default `StdFileSystem` and its `notify`-backed
/// watch primitive — mirroring `filesentry::tests`'s own
/// `tempfile::TempDir` + real `Watcher` integration style, but observed
/// through the view layer rather than a change-event channel, since this
/// core reports updates as tree mutations rather than as a flat event
/// stream.
#[test]
fn watch_driven_create_and_delete_are_reflected_through_the_view() {
    let temp = tempfile::Builder::new()
        .prefix("fstree-scenario4-")
        .tempdir()
        .expect("create temp dir");
    std::fs::create_dir(temp.path().join("existing")).expect("seed existing child");

    let registry = ViewRegistry::default();
    let config = Config::builder()
        .with_view_factory(registry.factory())
        .build()
        .expect("build config with the default filesystem");
    let facade = Facade::new(config);

    let resolved = facade
        .expand_path(temp.path(), true, false)
        .expect("expand_path succeeds")
        .expect("temp dir resolves under the default filesystem's root");
    let view = registry.get(&resolved);
    assert_eq!(view.children_count(), 1);

    std::fs::create_dir(temp.path().join("added")).expect("create second child");
    wait_until(Duration::from_secs(5), || view.children_count() == 2);

    std::fs::remove_dir(temp.path().join("existing")).expect("remove first child");
    wait_until(Duration::from_secs(5), || view.children_count() == 1);

    facade.close();
}

/// A watch primitive a test drives by hand, in the same spirit as
/// `watch_hub.rs`'s own `RecordingPrimitive`: useful when a scenario needs
/// deterministic control over exactly which raw events arrive and when,
/// without depending on OS watch latency.
struct ScriptedWatch {
    rx: Mutex<std::sync::mpsc::Receiver<crate::filesystem::RawWatchEvent>>,
    shutdown: AtomicBool,
}

impl ScriptedWatch {
    fn new() -> (Arc<Self>, std::sync::mpsc::Sender<crate::filesystem::RawWatchEvent>) {
        let (tx, rx) = std::sync::mpsc::channel();
        (
            Arc::new(Self {
                rx: Mutex::new(rx),
                shutdown: AtomicBool::new(false),
            }),
            tx,
        )
    }
}

impl WatchPrimitive for ScriptedWatch {
    fn watch(&self, _path: &NodePath) -> io::Result<()> {
        Ok(())
    }

    fn unwatch(&self, _path: &NodePath) -> io::Result<()> {
        Ok(())
    }

    fn next_event(&self) -> Option<crate::filesystem::RawWatchEvent> {
        loop {
            if self.shutdown.load(Ordering::Relaxed) {
                return None;
            }
            match self.rx.lock().unwrap().recv_timeout(Duration::from_millis(50)) {
                Ok(event) => return Some(event),
                Err(std::sync::mpsc::RecvTimeoutError::Timeout) => continue,
                Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => return None,
            }
        }
    }

    fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }
}

/// An `Overflow` event forces a full re-read of the affected directory
/// rather than a targeted insert/remove, recovering from however many
/// creates and deletes were actually lost.
#[test]
fn overflow_event_forces_a_full_resync_of_the_affected_directory() {
    let mut tree = HashMap::new();
    tree.insert("/".to_owned(), vec![dir("a", "/a")]);
    tree.insert("/a".to_owned(), vec![dir("x", "/a/x")]);
    let fs = Arc::new(FixtureFs::new(vec![NodePath::new("/")], tree));
    let (watch, tx) = ScriptedWatch::new();

    struct WatchedFs {
        inner: Arc<FixtureFs>,
        watch: Arc<ScriptedWatch>,
    }
    impl FileSystem for WatchedFs {
        fn list_roots(&self) -> io::Result<Vec<NodePath>> {
            self.inner.list_roots()
        }
        fn probe(&self, path: &NodePath, link_options: LinkOptions) -> io::Result<EntryKind> {
            self.inner.probe(path, link_options)
        }
        fn read_dir(&self, path: &NodePath, link_options: LinkOptions) -> io::Result<Vec<DirListEntry>> {
            self.inner.read_dir(path, link_options)
        }
        fn watch_primitive(&self) -> Option<Arc<dyn WatchPrimitive>> {
            Some(self.watch.clone() as Arc<dyn WatchPrimitive>)
        }
    }

    let registry = ViewRegistry::default();
    let config = ConfigBuilder::default()
        .with_filesystem(Arc::new(WatchedFs {
            inner: fs.clone(),
            watch: watch.clone(),
        }))
        .with_view_factory(registry.factory())
        .build()
        .unwrap();
    let facade = Facade::new(config);

    facade.expand_path(Path::new("/a"), false, false).unwrap();
    let a_view = registry.get(&NodePath::new("/a"));
    assert_eq!(a_view.children_count(), 1);

    fs.insert("/a", vec![dir("x", "/a/x"), dir("y", "/a/y"), dir("z", "/a/z")]);
    tx.send(crate::filesystem::RawWatchEvent::Overflow {
        dir: NodePath::new("/a"),
    })
    .unwrap();

    wait_until(Duration::from_secs(2), || a_view.children_count() == 3);
    facade.close();
}

/// `NotifyWatchPrimitive` is exercised directly here (rather than only
/// indirectly through `StdFileSystem`), confirming a raw watch/unwatch
/// round-trip against a real directory does not error.
#[test]
fn notify_watch_primitive_watches_and_unwatches_a_real_directory() {
    let temp = tempfile::Builder::new()
        .prefix("fstree-notify-")
        .tempdir()
        .expect("create temp dir");
    let primitive = NotifyWatchPrimitive::new().expect("construct notify primitive");
    let path = NodePath::new(temp.path().to_path_buf());
    primitive.watch(&path).expect("watch succeeds");
    primitive.unwatch(&path).expect("unwatch succeeds");
    primitive.shutdown();
}
