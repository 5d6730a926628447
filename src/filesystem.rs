//! The filesystem abstraction the core consumes through an interface rather
//! than owning any OS-specific implementation details itself — plus a
//! default, fully working implementation (`StdFileSystem`) backed by
//! `std::fs` for listing/metadata and `notify` for change events, so the
//! crate is usable without a host supplying anything.
//!
//! Grounded on `filesentry::metadata::Metadata::for_path` for the unix
//! `lstat` fast path (kept via `rustix`), with an added portable fallback
//! for non-unix targets.

use std::io;
use std::path::Path;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use bitflags::bitflags;
use notify::{RecommendedWatcher, RecursiveMode, Watcher as _};

use crate::path::NodePath;

bitflags! {
    /// Whether to follow symlinks when probing a path's type.
    ///
    /// Mirrors `filesentry::pending::Flags`'s use of `bitflags` for a small
    /// closed set of boolean knobs.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct LinkOptions: u32 {
        const FOLLOW_SYMLINKS = 1;
    }
}

impl Default for LinkOptions {
    fn default() -> Self {
        LinkOptions::FOLLOW_SYMLINKS
    }
}

/// What a path turned out to be, after applying [`LinkOptions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    File,
    /// Not a plain directory or regular file (device, socket, dangling
    /// symlink, ...); the reader skips these.
    Other,
}

/// One child discovered by [`FileSystem::read_dir`].
#[derive(Debug, Clone)]
pub struct DirListEntry {
    pub name: String,
    pub path: NodePath,
    pub kind: EntryKind,
}

/// The directory-listing / file-type-probing / watch-primitive contract
/// the core consumes as an external collaborator rather than implementing
/// itself.
///
/// A host may supply a purely in-memory fixture for tests, a filesystem
/// backed by a network share, or (via [`NodePolicy::create_filesystem_for`](
/// crate::policy::NodePolicy::create_filesystem_for)) a filesystem backed
/// by the contents of an archive.
pub trait FileSystem: Send + Sync {
    /// Enumerates this filesystem's roots (plural on platforms with drive
    /// letters or multiple mount points; exactly one `/`-rooted entry is
    /// conventional on unix-like systems, and mounted pseudo-filesystems
    /// conventionally expose exactly that trivial single root).
    fn list_roots(&self) -> io::Result<Vec<NodePath>>;

    /// Whether `list_roots` may return a different set on a later call
    /// without any event telling us so (e.g. removable drives on a
    /// platform that cannot watch the root list itself). When true and the
    /// host opts in, the root controller schedules a periodic re-read.
    fn roots_can_change(&self) -> bool {
        false
    }

    fn probe(&self, path: &NodePath, link_options: LinkOptions) -> io::Result<EntryKind>;

    /// Lists the immediate children of `path`. Implementations should not
    /// recurse; the core reads one directory at a time.
    fn read_dir(&self, path: &NodePath, link_options: LinkOptions) -> io::Result<Vec<DirListEntry>>;

    /// Returns the watch primitive backing this filesystem, or `None` if
    /// this filesystem does not support watching (reported once at
    /// `WatchHub` construction as `WatchUnavailable`).
    fn watch_primitive(&self) -> Option<Arc<dyn WatchPrimitive>> {
        None
    }

    /// Releases any resources this filesystem holds open (an archive
    /// handle, a loopback image, ...). Called at most once, when the
    /// file-mount node that created this filesystem collapses. The
    /// default filesystem is never closed. Default: no-op.
    fn close(&self) -> io::Result<()> {
        Ok(())
    }
}

/// A raw change observed by a [`WatchPrimitive`], scoped to one watched
/// directory.
#[derive(Debug, Clone)]
pub enum RawWatchEvent {
    Create { dir: NodePath, name: String },
    Delete { dir: NodePath, name: String },
    /// Events were lost; the affected directory must be fully re-read.
    Overflow { dir: NodePath },
}

/// The pluggable low-level watch mechanism a [`WatchHub`](crate::watch_hub::WatchHub)
/// multiplexes. `StdFileSystem`'s default implementation
/// (`NotifyWatchPrimitive`) is backed by the `notify` crate rather than a
/// raw OS syscall binding, so the one hub thread this crate spawns stays
/// portable; see DESIGN.md for why this is the one place the teacher's
/// stack (raw Linux inotify) was swapped out.
pub trait WatchPrimitive: Send + Sync {
    fn watch(&self, path: &NodePath) -> io::Result<()>;
    fn unwatch(&self, path: &NodePath) -> io::Result<()>;
    /// Blocks until the next raw event, or returns `None` once
    /// [`shutdown`](Self::shutdown) has been called.
    fn next_event(&self) -> Option<RawWatchEvent>;
    fn shutdown(&self);
}

/// The default, std-backed filesystem: lists directories with `std::fs`,
/// probes file types with a unix `lstat` fast path (falling back to
/// `std::fs::symlink_metadata` elsewhere), and watches with `notify`.
pub struct StdFileSystem {
    watch: Arc<NotifyWatchPrimitive>,
}

impl StdFileSystem {
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            watch: Arc::new(NotifyWatchPrimitive::new()?),
        })
    }
}

impl Default for StdFileSystem {
    fn default() -> Self {
        Self::new().expect("failed to initialize the default filesystem's watch primitive")
    }
}

impl FileSystem for StdFileSystem {
    fn list_roots(&self) -> io::Result<Vec<NodePath>> {
        #[cfg(unix)]
        {
            Ok(vec![NodePath::new("/")])
        }
        #[cfg(windows)]
        {
            let mut roots = Vec::new();
            for letter in b'A'..=b'Z' {
                let root = format!("{}:\\", letter as char);
                if Path::new(&root).exists() {
                    roots.push(NodePath::new(root));
                }
            }
            Ok(roots)
        }
    }

    #[cfg(windows)]
    fn roots_can_change(&self) -> bool {
        true
    }

    fn probe(&self, path: &NodePath, link_options: LinkOptions) -> io::Result<EntryKind> {
        metadata::probe(path.as_path(), link_options)
    }

    fn read_dir(&self, path: &NodePath, link_options: LinkOptions) -> io::Result<Vec<DirListEntry>> {
        let dir = if path.is_root() {
            Path::new(if cfg!(windows) { "." } else { "/" })
        } else {
            path.as_path()
        };
        let read_dir = std::fs::read_dir(dir)?;
        let mut out = Vec::new();
        for entry in read_dir {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    log::warn!("skipping unreadable entry in {path:?}: {err}");
                    continue;
                }
            };
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            let child_path = path.join(&name);
            let kind = match metadata::probe(&entry.path(), link_options) {
                Ok(kind) => kind,
                Err(err) => {
                    log::info!("skipping {child_path:?}: {err}");
                    continue;
                }
            };
            out.push(DirListEntry {
                name,
                path: child_path,
                kind,
            });
        }
        Ok(out)
    }

    fn watch_primitive(&self) -> Option<Arc<dyn WatchPrimitive>> {
        Some(self.watch.clone())
    }
}

#[cfg(unix)]
mod metadata {
    use std::io;
    use std::path::Path;

    use super::{EntryKind, LinkOptions};

    pub fn probe(path: &Path, link_options: LinkOptions) -> io::Result<EntryKind> {
        use rustix::fs::{stat, FileType};

        let follow = link_options.contains(LinkOptions::FOLLOW_SYMLINKS);
        let result = if follow {
            stat(path)
        } else {
            rustix::fs::lstat(path)
        };
        let st = result.map_err(io::Error::from)?;
        Ok(match FileType::from_raw_mode(st.st_mode) {
            FileType::Directory => EntryKind::Directory,
            FileType::RegularFile => EntryKind::File,
            _ => EntryKind::Other,
        })
    }
}

#[cfg(not(unix))]
mod metadata {
    use std::io;
    use std::path::Path;

    use super::{EntryKind, LinkOptions};

    pub fn probe(path: &Path, link_options: LinkOptions) -> io::Result<EntryKind> {
        let meta = if link_options.contains(LinkOptions::FOLLOW_SYMLINKS) {
            std::fs::metadata(path)?
        } else {
            std::fs::symlink_metadata(path)?
        };
        Ok(if meta.is_dir() {
            EntryKind::Directory
        } else if meta.is_file() {
            EntryKind::File
        } else {
            EntryKind::Other
        })
    }
}

/// `WatchPrimitive` backed by `notify::RecommendedWatcher`.
///
/// Grounded on `filesentry::inotify::InotifyWatcher`: a background-friendly
/// wrapper owning the OS watcher plus a shutdown flag, but here the actual
/// polling loop lives inside `notify`'s own worker thread, and we simply
/// drain its channel — `notify` is cross-platform where filesentry's own
/// `inotify.rs` is Linux-only (see DESIGN.md).
pub struct NotifyWatchPrimitive {
    watcher: std::sync::Mutex<RecommendedWatcher>,
    rx: mpsc::Receiver<notify::Result<notify::Event>>,
    shutdown: Arc<std::sync::atomic::AtomicBool>,
}

impl NotifyWatchPrimitive {
    pub fn new() -> io::Result<Self> {
        let (tx, rx) = mpsc::channel();
        let watcher = notify::recommended_watcher(tx)
            .map_err(|err| io::Error::other(err.to_string()))?;
        Ok(Self {
            watcher: std::sync::Mutex::new(watcher),
            rx,
            shutdown: Arc::new(std::sync::atomic::AtomicBool::new(false)),
        })
    }
}

impl WatchPrimitive for NotifyWatchPrimitive {
    fn watch(&self, path: &NodePath) -> io::Result<()> {
        self.watcher
            .lock()
            .unwrap()
            .watch(path.as_path(), RecursiveMode::NonRecursive)
            .map_err(|err| io::Error::other(err.to_string()))
    }

    fn unwatch(&self, path: &NodePath) -> io::Result<()> {
        self.watcher
            .lock()
            .unwrap()
            .unwatch(path.as_path())
            .map_err(|err| io::Error::other(err.to_string()))
    }

    fn next_event(&self) -> Option<RawWatchEvent> {
        loop {
            if self.shutdown.load(std::sync::atomic::Ordering::Relaxed) {
                return None;
            }
            match self.rx.recv_timeout(Duration::from_millis(250)) {
                Ok(Ok(event)) => {
                    if let Some(mapped) = map_event(event) {
                        return Some(mapped);
                    }
                }
                Ok(Err(err)) => {
                    log::warn!("watch error: {err}");
                }
                Err(mpsc::RecvTimeoutError::Timeout) => continue,
                Err(mpsc::RecvTimeoutError::Disconnected) => return None,
            }
        }
    }

    fn shutdown(&self) {
        self.shutdown
            .store(true, std::sync::atomic::Ordering::Relaxed);
    }
}

fn map_event(event: notify::Event) -> Option<RawWatchEvent> {
    use notify::EventKind;

    match event.kind {
        EventKind::Create(_) => {
            let path = event.paths.first()?;
            let dir = NodePath::new(path.parent()?.to_path_buf());
            let name = path.file_name()?.to_str()?.to_owned();
            Some(RawWatchEvent::Create { dir, name })
        }
        EventKind::Remove(_) => {
            let path = event.paths.first()?;
            let dir = NodePath::new(path.parent()?.to_path_buf());
            let name = path.file_name()?.to_str()?.to_owned();
            Some(RawWatchEvent::Delete { dir, name })
        }
        EventKind::Other => {
            let path = event.paths.first()?;
            Some(RawWatchEvent::Overflow {
                dir: NodePath::new(path.to_path_buf()),
            })
        }
        _ => None,
    }
}
