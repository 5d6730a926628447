//! `NodeChildren`: the per-node synchronized owner of the child list, the
//! expansion state machine, and the node's own view handle.
//!
//! The state machine table is carried verbatim from the design docs.
//! `ExpansionState` is a plain enum (not bitflags) because its five
//! members are mutually exclusive, even though the *idea* of small
//! per-node state tracking is grounded on `filesentry::tree::Flags`
//! (bitflags tracking per-node watch/recursion state).

use std::sync::{Arc, Mutex};

use crate::config::NodeConfig;
use crate::controller::NodeController;
use crate::entry::DirectoryEntry;
use crate::policy::NodePolicy;
use crate::reader::ReadOutcome;
use crate::sorted_list::{ListChange, SortedDistinctList};
use crate::view::NodeView;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpansionState {
    Collapsed,
    Expanding,
    /// Reserved for policy-driven deferred refreshes; behaves like
    /// `Expanding` for the purposes of the transition table.
    Waiting,
    Expanded,
}

struct Inner {
    list: SortedDistinctList<DirectoryEntry>,
    state: ExpansionState,
    is_leaf: bool,
}

/// Owns one node's children plus its expansion state. Every mutating or
/// inspecting operation takes the node's own lock; the lock ordering
/// elsewhere in this crate is always parent-before-child, and event
/// callbacks fired while holding this lock only ever construct or
/// collapse *children*, never call back up to a parent.
pub struct NodeChildren {
    pub(crate) config: Arc<NodeConfig>,
    pub(crate) policy: Arc<dyn crate::policy::NodePolicy>,
    pub(crate) view: Arc<dyn NodeView>,
    inner: Mutex<Inner>,
}

impl NodeChildren {
    pub fn new(config: Arc<NodeConfig>, path: &std::path::Path, view: Arc<dyn NodeView>) -> Self {
        let policy = config.node_policy.clone().policy_for(path);
        let is_leaf = policy.is_leaf_node(path);
        view.set_leaf(is_leaf);
        let comparator = config.comparator.clone();
        Self {
            config,
            policy,
            view,
            inner: Mutex::new(Inner {
                list: SortedDistinctList::new(Arc::new(move |a: &DirectoryEntry, b: &DirectoryEntry| {
                    comparator(a.name(), b.name())
                })),
                state: ExpansionState::Collapsed,
                is_leaf,
            }),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.inner.lock().unwrap().is_leaf
    }

    pub fn state(&self) -> ExpansionState {
        self.inner.lock().unwrap().state
    }

    pub fn is_expanded(&self) -> bool {
        self.state() == ExpansionState::Expanded
    }

    pub fn find_child_by_name(&self, name: &str) -> Option<DirectoryEntry> {
        let inner = self.inner.lock().unwrap();
        inner
            .list
            .binary_search_by_key(&name, |entry| entry.name())
            .cloned()
    }

    pub fn entries(&self) -> Vec<DirectoryEntry> {
        self.inner.lock().unwrap().list.as_slice().to_vec()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().list.len()
    }

    /// `Collapsed --set_expanded(true) on non-leaf--> Expanding`. Returns
    /// `true` if the caller should now launch a reader and call
    /// [`apply_read`](Self::apply_read) with its result; `false` if the
    /// call was a no-op (already expanded/expanding, or a leaf).
    pub fn begin_expand(&self) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if inner.is_leaf {
            return false;
        }
        match inner.state {
            ExpansionState::Collapsed => {
                inner.state = ExpansionState::Expanding;
                self.view.set_expanded(true);
                true
            }
            ExpansionState::Expanded | ExpansionState::Expanding | ExpansionState::Waiting => false,
        }
    }

    /// Applies a completed read. Per the recheck-then-apply rule, a read
    /// whose node has since been collapsed (state is no longer
    /// `Expanding`/`Waiting`) is silently discarded.
    ///
    /// `make_child` constructs (or looks up) a child's controller handle
    /// given its entry, minting that child's view along the way; it is
    /// invoked once per newly added entry, under this node's lock — it
    /// must not attempt to re-enter this node.
    pub fn apply_read(
        &self,
        outcome: ReadOutcome,
        make_child: impl Fn(&DirectoryEntry) -> crate::controller::NodeControllerHandle,
    ) {
        let mut inner = self.inner.lock().unwrap();
        if !matches!(inner.state, ExpansionState::Expanding | ExpansionState::Waiting) {
            return;
        }
        self.synchronize_locked(&mut inner, outcome.entries, &make_child);
        inner.state = ExpansionState::Expanded;
    }

    /// `Expanded --set_expanded(true)--> Expanded` is a no-op;
    /// `Expanding/Waiting --set_expanded(false)--> Collapsed` drops the
    /// in-flight reader's result on arrival (handled by `apply_read`'s
    /// recheck); `Expanded --set_expanded(false)--> Collapsed` tears down
    /// recursively. Returns `true` iff this call actually collapsed an
    /// expanded node (the caller should unregister any watch it holds).
    pub fn collapse(
        &self,
        collapse_child: impl Fn(&DirectoryEntry),
    ) -> bool {
        let mut inner = self.inner.lock().unwrap();
        let was_expanded = inner.state == ExpansionState::Expanded;
        if inner.state == ExpansionState::Collapsed {
            return false;
        }
        for entry in inner.list.as_slice() {
            collapse_child(entry);
        }
        inner.list.synchronize_to(Vec::new(), |event| self.dispatch_view(event));
        inner.state = ExpansionState::Collapsed;
        self.view.set_expanded(false);
        was_expanded
    }

    /// Recomputes leaf-ness against the current policy. If a formerly
    /// non-leaf, expanded node becomes a leaf, its children are forced
    /// empty.
    pub fn recompute_leaf(&self, path: &std::path::Path, collapse_child: impl Fn(&DirectoryEntry)) {
        let is_leaf = self.policy.is_leaf_node(path);
        let mut inner = self.inner.lock().unwrap();
        inner.is_leaf = is_leaf;
        self.view.set_leaf(is_leaf);
        if is_leaf && inner.state == ExpansionState::Expanded {
            for entry in inner.list.as_slice() {
                collapse_child(entry);
            }
            inner.list.synchronize_to(Vec::new(), |event| self.dispatch_view(event));
        }
    }

    /// Applies a fresh target set to the child list (used by `apply_read`
    /// and by watch-driven single-entry create/delete). Exposed so
    /// controllers can drive watch callbacks through the same
    /// synchronize-and-wire path as a full re-read.
    pub fn synchronize_to(
        &self,
        target: Vec<DirectoryEntry>,
        make_child: impl Fn(&DirectoryEntry) -> crate::controller::NodeControllerHandle,
    ) {
        let mut inner = self.inner.lock().unwrap();
        if !matches!(inner.state, ExpansionState::Expanded) {
            return;
        }
        self.synchronize_locked(&mut inner, target, &make_child);
    }

    /// Inserts a single freshly-discovered entry (a watch `Create` event).
    /// A no-op unless the node is currently `Expanded`.
    pub fn add_entry(
        &self,
        entry: DirectoryEntry,
        make_child: impl Fn(&DirectoryEntry) -> crate::controller::NodeControllerHandle,
    ) {
        let mut inner = self.inner.lock().unwrap();
        if !matches!(inner.state, ExpansionState::Expanded) {
            return;
        }
        let view = self.view.clone();
        inner.list.add(entry, move |event| dispatch(&view, event, &make_child));
    }

    /// Removes the entry named `name`, if present (a watch `Delete` event).
    /// A no-op unless the node is currently `Expanded` or no such child
    /// exists.
    pub fn remove_entry(&self, name: &str) {
        let mut inner = self.inner.lock().unwrap();
        if !matches!(inner.state, ExpansionState::Expanded) {
            return;
        }
        let Some(existing) = inner.list.binary_search_by_key(&name, |entry| entry.name()).cloned() else {
            return;
        };
        let view = self.view.clone();
        inner.list.remove_item(&existing, move |event| self.dispatch_view_owned(&view, event));
    }

    fn dispatch_view_owned(&self, view: &Arc<dyn NodeView>, event: ListChange<DirectoryEntry>) {
        match event {
            ListChange::Remove { index, item } => {
                collapse_departing(&item);
                view.remove_subnodes(&[index]);
            }
            ListChange::MultiRemove { indices, items } => {
                for item in &items {
                    collapse_departing(item);
                }
                view.remove_subnodes(&indices);
            }
            ListChange::BulkClear { items } => {
                for item in &items {
                    collapse_departing(item);
                }
                view.clear();
            }
            ListChange::Add { .. } | ListChange::MultiAdd { .. } | ListChange::BulkAdd { .. } => {
                unreachable!("remove_entry never adds")
            }
        }
    }

    fn synchronize_locked(
        &self,
        inner: &mut Inner,
        target: Vec<DirectoryEntry>,
        make_child: &impl Fn(&DirectoryEntry) -> crate::controller::NodeControllerHandle,
    ) {
        let view = self.view.clone();
        inner.list.synchronize_to(target, move |event| {
            dispatch(&view, event, make_child);
        });
    }

    fn dispatch_view(&self, event: ListChange<DirectoryEntry>) {
        match event {
            ListChange::Remove { index, .. } => self.view.remove_subnodes(&[index]),
            ListChange::MultiRemove { indices, .. } => self.view.remove_subnodes(&indices),
            ListChange::BulkClear { .. } => self.view.clear(),
            ListChange::Add { .. } | ListChange::MultiAdd { .. } | ListChange::BulkAdd { .. } => {
                unreachable!("dispatch_view is only used for collapse/leaf, which never adds")
            }
        }
    }
}

/// Wires a raw list-diff event to the view, constructing a controller (and
/// minting its view) for every newly added entry, and forcing every
/// removed entry's controller to `Collapsed` before telling the view to
/// drop it.
fn dispatch(
    view: &Arc<dyn NodeView>,
    event: ListChange<DirectoryEntry>,
    make_child: &impl Fn(&DirectoryEntry) -> crate::controller::NodeControllerHandle,
) {
    match event {
        ListChange::Add { index, item } => {
            let child_view = build_child(&item, make_child);
            view.insert_subnodes(&[(index, child_view)]);
        }
        ListChange::MultiAdd { indices, items } => {
            let indexed: Vec<(usize, Arc<dyn NodeView>)> = indices
                .into_iter()
                .zip(items.iter())
                .map(|(index, item)| (index, build_child(item, make_child)))
                .collect();
            view.insert_subnodes(&indexed);
        }
        ListChange::BulkAdd { items } => {
            let views = items
                .iter()
                .map(|item| build_child(item, make_child))
                .collect();
            view.add_all_subnodes(views);
        }
        ListChange::Remove { index, item } => {
            collapse_departing(&item);
            view.remove_subnodes(&[index]);
        }
        ListChange::MultiRemove { indices, items } => {
            for item in &items {
                collapse_departing(item);
            }
            view.remove_subnodes(&indices);
        }
        ListChange::BulkClear { items } => {
            for item in &items {
                collapse_departing(&item);
            }
            view.clear();
        }
    }
}

fn build_child(
    entry: &DirectoryEntry,
    make_child: &impl Fn(&DirectoryEntry) -> crate::controller::NodeControllerHandle,
) -> Arc<dyn NodeView> {
    make_child(entry).view()
}

fn collapse_departing(entry: &DirectoryEntry) {
    if let Some(controller) = entry.current_controller() {
        controller.set_expanded(false);
    }
}
