//! A headless, UI-agnostic filesystem tree controller: a lazily-expanded
//! directory tree kept synchronized against a live filesystem through a
//! single background watch thread, with support for mounting a pseudo
//! filesystem (an archive, a disk image, ...) on a regular file.
//!
//! The host drives everything through [`Facade`]: expand/collapse/select
//! paths and read back the expanded set, while a [`NodeView`] adapter (and,
//! optionally, a [`FileSystem`]/[`WatchPrimitive`]/[`NodePolicy`] triple)
//! supplies the host's own UI and policy. Nothing here renders anything —
//! see `demos/cli.rs` for a minimal terminal adapter.

mod config;
mod controller;
mod entry;
mod error;
mod facade;
mod filesystem;
mod node_children;
mod path;
mod persist;
mod policy;
mod reader;
mod sorted_list;
#[cfg(test)]
mod tests;
mod view;
mod watch_hub;

pub use config::{Config, ConfigBuilder, ViewFactory};
pub use controller::PathSet;
pub use error::FsTreeError;
pub use facade::Facade;
pub use filesystem::{
    DirListEntry, EntryKind, FileSystem, LinkOptions, NotifyWatchPrimitive, RawWatchEvent,
    StdFileSystem, WatchPrimitive,
};
pub use path::NodePath;
pub use persist::{decode_and_apply, encode};
pub use policy::{NodePolicy, SimplePolicy, UpdateNotifier};
pub use view::{NodeView, NullView};
