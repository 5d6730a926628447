//! `WatchHub`: the single background notifier thread multiplexing
//! per-directory watch registrations to per-directory callbacks.
//!
//! Directly grounded on `filesentry::inotify::InotifyWatcher` and
//! `filesentry::worker::Worker`: a background thread owns the platform
//! watch primitive, a `papaya::HashMap` holds the watch-key table (the
//! same concurrent map `filesentry::inotify` uses), and shutdown is a
//! dedicated atomic flag plus a wakeup, mirroring
//! `InotifyWatcher::shutdown`/`is_shutdown`.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crate::filesystem::{FileSystem, RawWatchEvent, WatchPrimitive};
use crate::path::NodePath;

/// An event dispatched to a registered node's callback.
#[derive(Debug, Clone)]
pub enum HubEvent {
    Create { name: String },
    Delete { name: String },
    /// Events were lost for this directory; the node must fully re-read.
    Overflow,
}

pub type Callback = Arc<dyn Fn(HubEvent) + Send + Sync>;

/// Owns the watch primitive for one filesystem and the directory →
/// callback table. Lives for the owning `Facade`'s lifetime.
pub struct WatchHub {
    primitive: Option<Arc<dyn WatchPrimitive>>,
    table: papaya::HashMap<NodePath, Callback>,
    closed: Arc<AtomicBool>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl WatchHub {
    /// `requested` is `Config::request_watch_service`; when false, or when
    /// the filesystem offers no watch primitive, the hub stays permanently
    /// in "off" mode (`WatchUnavailable`, logged once here) and every
    /// register/unregister call becomes a no-op.
    pub fn new(filesystem: Arc<dyn FileSystem>, requested: bool) -> Arc<Self> {
        let primitive = if requested {
            filesystem.watch_primitive()
        } else {
            None
        };
        if primitive.is_none() {
            log::info!("watch service unavailable for this filesystem; running without live updates");
        }
        let hub = Arc::new(Self {
            primitive,
            table: papaya::HashMap::new(),
            closed: Arc::new(AtomicBool::new(false)),
            thread: Mutex::new(None),
        });
        if let Some(primitive) = hub.primitive.clone() {
            let hub_for_thread = hub.clone();
            let handle = std::thread::spawn(move || hub_for_thread.run(primitive));
            *hub.thread.lock().unwrap() = Some(handle);
        }
        hub
    }

    pub fn is_available(&self) -> bool {
        self.primitive.is_some()
    }

    fn run(self: Arc<Self>, primitive: Arc<dyn WatchPrimitive>) {
        while let Some(event) = primitive.next_event() {
            if self.closed.load(AtomicOrdering::Relaxed) {
                break;
            }
            let (dir, hub_event) = match event {
                RawWatchEvent::Create { dir, name } => (dir, HubEvent::Create { name }),
                RawWatchEvent::Delete { dir, name } => (dir, HubEvent::Delete { name }),
                RawWatchEvent::Overflow { dir } => (dir, HubEvent::Overflow),
            };
            let callback = self.table.pin().get(&dir).cloned();
            if let Some(callback) = callback {
                callback(hub_event);
            }
        }
    }

    /// Registers for `Create`/`Delete` events on `path`. Replaces any
    /// previous registration for the same path.
    pub fn register(&self, path: &NodePath, callback: Callback) {
        let Some(primitive) = &self.primitive else {
            return;
        };
        match primitive.watch(path) {
            Ok(()) => {
                self.table.pin().insert(path.clone(), callback);
            }
            Err(err) if err.kind() == io::ErrorKind::PermissionDenied => {
                log::info!("access denied watching {path}: {err}");
            }
            Err(err) => {
                log::warn!("failed to watch {path}: {err}");
            }
        }
    }

    pub fn is_watched(&self, path: &NodePath) -> bool {
        self.table.pin().contains_key(path)
    }

    pub fn unregister(&self, path: &NodePath) {
        let Some(primitive) = &self.primitive else {
            return;
        };
        if let Err(err) = primitive.unwatch(path) {
            log::warn!("failed to unwatch {path}: {err}");
        }
        self.table.pin().remove(path);
    }

    /// Closes the underlying watch primitive; the background thread exits
    /// on its next wake-up.
    pub fn close(&self) {
        self.closed.store(true, AtomicOrdering::Relaxed);
        if let Some(primitive) = &self.primitive {
            primitive.shutdown();
        }
        if let Some(handle) = self.thread.lock().unwrap().take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex as StdMutex;

    struct NullFileSystem;

    impl FileSystem for NullFileSystem {
        fn list_roots(&self) -> io::Result<Vec<NodePath>> {
            Ok(vec![NodePath::root()])
        }

        fn probe(
            &self,
            _path: &NodePath,
            _link_options: crate::filesystem::LinkOptions,
        ) -> io::Result<crate::filesystem::EntryKind> {
            Ok(crate::filesystem::EntryKind::Directory)
        }

        fn read_dir(
            &self,
            _path: &NodePath,
            _link_options: crate::filesystem::LinkOptions,
        ) -> io::Result<Vec<crate::filesystem::DirListEntry>> {
            Ok(Vec::new())
        }
    }

    struct RecordingPrimitive {
        events: StdMutex<Vec<RawWatchEvent>>,
        shutdown: AtomicBool,
    }

    impl WatchPrimitive for RecordingPrimitive {
        fn watch(&self, _path: &NodePath) -> io::Result<()> {
            Ok(())
        }

        fn unwatch(&self, _path: &NodePath) -> io::Result<()> {
            Ok(())
        }

        fn next_event(&self) -> Option<RawWatchEvent> {
            if self.shutdown.load(AtomicOrdering::Relaxed) {
                return None;
            }
            self.events.lock().unwrap().pop()
        }

        fn shutdown(&self) {
            self.shutdown.store(true, AtomicOrdering::Relaxed);
        }
    }

    #[test]
    fn hub_without_watch_service_is_unavailable_and_register_is_a_no_op() {
        let hub = WatchHub::new(Arc::new(NullFileSystem), false);
        assert!(!hub.is_available());
        hub.register(&NodePath::new("/a"), Arc::new(|_| {}));
        assert!(!hub.is_watched(&NodePath::new("/a")));
        hub.close();
    }

    #[test]
    fn registered_callback_receives_dispatched_events() {
        struct FsWithWatch(Arc<RecordingPrimitive>);
        impl FileSystem for FsWithWatch {
            fn list_roots(&self) -> io::Result<Vec<NodePath>> {
                Ok(vec![NodePath::root()])
            }
            fn probe(
                &self,
                _path: &NodePath,
                _link_options: crate::filesystem::LinkOptions,
            ) -> io::Result<crate::filesystem::EntryKind> {
                Ok(crate::filesystem::EntryKind::Directory)
            }
            fn read_dir(
                &self,
                _path: &NodePath,
                _link_options: crate::filesystem::LinkOptions,
            ) -> io::Result<Vec<crate::filesystem::DirListEntry>> {
                Ok(Vec::new())
            }
            fn watch_primitive(&self) -> Option<Arc<dyn WatchPrimitive>> {
                Some(self.0.clone())
            }
        }

        let primitive = Arc::new(RecordingPrimitive {
            events: StdMutex::new(vec![RawWatchEvent::Create {
                dir: NodePath::new("/a"),
                name: "child".into(),
            }]),
            shutdown: AtomicBool::new(false),
        });
        let hub = WatchHub::new(Arc::new(FsWithWatch(primitive.clone())), true);
        assert!(hub.is_available());

        let seen = Arc::new(AtomicUsize::new(0));
        let seen_for_callback = seen.clone();
        hub.register(
            &NodePath::new("/a"),
            Arc::new(move |event| {
                if matches!(event, HubEvent::Create { .. }) {
                    seen_for_callback.fetch_add(1, AtomicOrdering::SeqCst);
                }
            }),
        );

        for _ in 0..100 {
            if seen.load(AtomicOrdering::SeqCst) > 0 {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        assert_eq!(seen.load(AtomicOrdering::SeqCst), 1);
        hub.close();
    }
}
