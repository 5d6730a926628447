//! The host-pluggable per-node policy: which paths become nodes, which are
//! leaves, which files mount a child filesystem, and how symlinks are
//! probed.
//!
//! Grounded on `filesentry::config::Filter` (a host-supplied
//! `ignore_path`/`ignore_path_rec` predicate, with a default `impl Filter
//! for ()` that ignores `.git`), generalized here into a richer
//! per-node policy contract covering node creation, leaf-ness, mounting,
//! and link-following.

use std::path::Path;
use std::sync::Arc;

use crate::filesystem::{FileSystem, LinkOptions};

/// Runnable a policy may invoke to request `update_tree()` on the node it
/// was handed to.
pub type UpdateNotifier = Arc<dyn Fn() + Send + Sync>;

/// Per-node behavior supplied by the host. Obtained from
/// [`NodePolicy::policy_for`] at node construction time; the default
/// implementation (`this`) makes every node share one stateless instance.
pub trait NodePolicy: Send + Sync {
    /// Whether to follow symlinks when probing a path's type.
    fn link_options(&self) -> LinkOptions {
        LinkOptions::default()
    }

    /// Whether the subdirectory at `path` should become a node.
    ///
    /// Default: true iff `path`'s last component does not start with `.`
    /// (the conventional "hidden" notion `filesentry`'s own default filter
    /// uses for `.git`).
    fn is_creating_node_for_directory(&self, path: &Path) -> bool {
        !is_hidden(path)
    }

    /// Whether the regular file at `path` should become a node (i.e. is
    /// mountable). Default: false.
    fn is_creating_node_for_file(&self, _path: &Path) -> bool {
        false
    }

    /// Returns a mounted filesystem for `path` (an archive, an image, ...),
    /// or `None`. Default: `None`.
    fn create_filesystem_for(&self, _path: &Path) -> Option<Arc<dyn FileSystem>> {
        None
    }

    /// Called exactly once per close of a mounted filesystem this policy
    /// created. Default: no-op.
    fn on_closing_filesystem(&self, _fs: &Arc<dyn FileSystem>) {}

    /// Whether `path` is a conceptual leaf regardless of its actual
    /// contents (e.g. `DCIM`, `.git`). Default: false.
    fn is_leaf_node(&self, _path: &Path) -> bool {
        false
    }

    /// Whether this node wants a callback it can invoke to force its own
    /// `update_tree()`. Default: false.
    fn is_requesting_update_notifier(&self) -> bool {
        false
    }

    /// Receives the runnable the policy may invoke to force `update_tree()`
    /// on the node it governs. Default: no-op (never called unless
    /// `is_requesting_update_notifier` is true).
    fn set_update_notifier(&self, _notifier: UpdateNotifier) {}

    /// Factory producing the policy instance for `path`: a shared
    /// singleton, a per-path instance, or a prototype carrying per-node
    /// state. Default: returns this same policy (shared singleton).
    fn policy_for(self: Arc<Self>, _path: &Path) -> Arc<dyn NodePolicy>
    where
        Self: 'static,
    {
        self
    }
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with('.'))
}

/// The default stateless policy: shows non-hidden directories, no files,
/// no mounts. Equivalent in spirit to `impl Filter for ()` in the teacher.
#[derive(Debug, Default, Clone, Copy)]
pub struct SimplePolicy;

impl NodePolicy for SimplePolicy {}
