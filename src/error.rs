//! Errors surfaced across the [`Facade`](crate::facade::Facade) boundary.
//!
//! Only two conditions are ever returned to a caller: a path belonging to
//! a different filesystem, or a non-absolute path. Everything else (access
//! denied, I/O failure, watch unavailable, close failure) is recovered
//! locally and only logged, exactly as filesentry itself only logs
//! `io::Error`s from `metadata.rs`/`tree.rs`/`inotify.rs` rather than
//! propagating them.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FsTreeError {
    #[error("path {path} does not belong to this tree's filesystem")]
    DomainMismatch { path: String },
    #[error("path {path} is not absolute")]
    NonAbsolutePath { path: String },
}
