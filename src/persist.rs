//! Flat plain-text encode/decode of a [`Facade`]'s expanded-path set plus
//! its current selection, for a host to persist across restarts.
//!
//! One absolute path per line, in [`Facade::expanded_paths`] order,
//! terminated by a selection line: the 0-based index (into that same
//! list) of the selected path, or `-1` if none is selected. Grounded on
//! `filesentry::path::CannonicalPathBuf`'s plain `Display` round-trip —
//! there is no binary format anywhere in the teacher's own persistence
//! story, so this format stays equally simple rather than reaching for a
//! serialization crate for a handful of lines of text.

use std::path::Path;

use crate::facade::Facade;

/// Serializes `facade`'s expanded paths and current selection to a flat
/// text format a host can write to a file.
pub fn encode(facade: &Facade) -> String {
    let paths = facade.expanded_paths();
    let selected = facade.selected_path();
    let selection_index = selected
        .as_ref()
        .and_then(|selected| paths.iter().position(|path| path == selected));

    let mut out = String::new();
    for path in paths.iter() {
        out.push_str(&path.to_string());
        out.push('\n');
    }
    out.push_str(&selection_index.map(|index| index as i64).unwrap_or(-1).to_string());
    out.push('\n');
    out
}

/// Re-expands every path `encode` recorded — each with
/// `expand_last_element: true`, so a persisted file-mount is restored
/// mounted rather than merely as a collapsed node — and restores the
/// selection, if any survived re-resolution.
///
/// A line that no longer resolves against the live filesystem is dropped
/// rather than aborting the whole restore; a missing, unparseable, or
/// out-of-range selection line is treated as "no selection".
pub fn decode_and_apply(facade: &Facade, serialized: &str) {
    let mut lines: Vec<&str> = serialized.lines().collect();
    let selection_index = lines.pop().and_then(|line| line.trim().parse::<i64>().ok());

    let mut resolved_paths = Vec::new();
    for line in lines {
        match facade.expand_path(Path::new(line), true, false) {
            Ok(Some(resolved)) => resolved_paths.push(resolved),
            Ok(None) => log::info!("dropping persisted path no longer present: {line}"),
            Err(err) => log::info!("skipping unreadable persisted path {line}: {err}"),
        }
    }

    facade.clear_selection();
    if let Some(index) = selection_index.filter(|index| *index >= 0) {
        if let Some(path) = resolved_paths.get(index as usize) {
            let _ = facade.expand_path(path.as_path(), true, true);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigBuilder;
    use crate::filesystem::{DirListEntry, EntryKind, FileSystem, LinkOptions};
    use crate::path::NodePath;
    use std::collections::HashMap;
    use std::io;
    use std::sync::Arc;

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
        tree.insert("/".to_owned(), vec![dir_entry("a", "/a"), dir_entry("x", "/x")]);
        tree.insert("/a".to_owned(), vec![dir_entry("b", "/a/b")]);
        tree.insert("/x".to_owned(), vec![dir_entry("y", "/x/y")]);
        let config = ConfigBuilder::default()
            .with_filesystem(Arc::new(FixtureFs { tree }))
            .with_watch_service(false)
            .build()
            .unwrap();
        Facade::new(config)
    }

    #[test]
    fn encode_then_decode_restores_expansion_and_selection() {
        let facade = fixture_facade();
        facade.expand_path(Path::new("/a/b"), false, false).unwrap();
        facade.expand_path(Path::new("/x/y"), false, true).unwrap();
        let serialized = encode(&facade);

        let restored = fixture_facade();
        decode_and_apply(&restored, &serialized);

        let mut expanded: Vec<_> = restored.expanded_paths().iter().cloned().collect();
        expanded.sort();
        assert_eq!(expanded, vec![NodePath::new("/a/b"), NodePath::new("/x/y")]);
        assert_eq!(restored.selected_path(), Some(NodePath::new("/x/y")));
    }

    #[test]
    fn decode_drops_paths_no_longer_present_without_failing() {
        let facade = fixture_facade();
        let serialized = "/a/b\n/gone\n-1\n";
        decode_and_apply(&facade, serialized);
        assert_eq!(facade.expanded_paths().as_slice(), &[NodePath::new("/a/b")]);
        assert!(!facade.has_selection());
    }
}
