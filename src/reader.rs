//! `DirectoryReader`: the one-shot synchronous task that enumerates either
//! a filesystem's roots or one directory's children, applying node
//! policy along the way.
//!
//! Grounded on `filesentry::config::Filter` (a host-supplied path
//! predicate consulted during every directory crawl), generalized from a
//! boolean ignore-test into the node/leaf/mount three-way policy this
//! crate needs, and on the directory-at-a-time iteration style of
//! `filesentry::tree::FileTree::crawl`.

use std::io;

use crate::config::NodeConfig;
use crate::entry::DirectoryEntry;
use crate::filesystem::{EntryKind, FileSystem};
use crate::path::NodePath;
use crate::policy::NodePolicy;

/// Result of one read: the accepted entries plus whether the caller
/// should register the directory with the `WatchHub`.
pub struct ReadOutcome {
    pub entries: Vec<DirectoryEntry>,
    pub start_watch: bool,
}

impl ReadOutcome {
    fn empty() -> Self {
        Self {
            entries: Vec::new(),
            start_watch: false,
        }
    }
}

/// Reads the filesystem's roots. If `skip_single_root` holds and exactly
/// one trivial root (empty name) was enumerated, transparently reads that
/// root's own directory instead, so a mounted single-root filesystem
/// never exposes a vestigial root node.
pub fn read_roots(config: &NodeConfig, skip_single_root: bool) -> ReadOutcome {
    let roots = match config.filesystem.list_roots() {
        Ok(roots) => roots,
        Err(err) => {
            log::warn!("failed to list filesystem roots: {err}");
            return ReadOutcome::empty();
        }
    };
    if skip_single_root && roots.len() == 1 && roots[0].name().is_empty() {
        return read_directory(config, &roots[0]);
    }
    ReadOutcome {
        entries: roots.into_iter().map(DirectoryEntry::root_at).collect(),
        start_watch: false,
    }
}

/// Reads one directory's immediate children, filtering through the active
/// [`NodePolicy`](crate::policy::NodePolicy).
pub fn read_directory(config: &NodeConfig, path: &NodePath) -> ReadOutcome {
    let link_options = config.node_policy.link_options();
    let listing = match config.filesystem.read_dir(path, link_options) {
        Ok(listing) => listing,
        Err(err) if err.kind() == io::ErrorKind::PermissionDenied => {
            log::info!("access denied reading {path}: {err}");
            return ReadOutcome::empty();
        }
        Err(err) => {
            log::warn!("failed to read {path}: {err}");
            return ReadOutcome::empty();
        }
    };

    let mut entries = Vec::with_capacity(listing.len());
    for child in listing {
        match child.kind {
            EntryKind::Directory => {
                if config
                    .node_policy
                    .is_creating_node_for_directory(child.path.as_path())
                {
                    entries.push(DirectoryEntry::subdirectory(child.path));
                }
            }
            EntryKind::File => {
                if config
                    .node_policy
                    .is_creating_node_for_file(child.path.as_path())
                {
                    entries.push(DirectoryEntry::regular_file(child.path));
                }
            }
            EntryKind::Other => {}
        }
    }
    ReadOutcome {
        entries,
        start_watch: true,
    }
}

/// Classifies and, if policy accepts it, builds the single entry at `path`
/// — used to turn a watch `Create` event into a [`DirectoryEntry`] without
/// re-reading the whole directory.
pub fn classify_entry(config: &NodeConfig, path: &NodePath) -> Option<DirectoryEntry> {
    let link_options = config.node_policy.link_options();
    let kind = match config.filesystem.probe(path, link_options) {
        Ok(kind) => kind,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return None,
        Err(err) => {
            log::info!("failed to probe {path} after a create event: {err}");
            return None;
        }
    };
    match kind {
        EntryKind::Directory if config.node_policy.is_creating_node_for_directory(path.as_path()) => {
            Some(DirectoryEntry::subdirectory(path.clone()))
        }
        EntryKind::File if config.node_policy.is_creating_node_for_file(path.as_path()) => {
            Some(DirectoryEntry::regular_file(path.clone()))
        }
        _ => None,
    }
}
