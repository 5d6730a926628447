//! A tiny interactive terminal walker exercising `Facade::expand_path`/
//! `expanded_paths`/`selected_path` against the default filesystem.
//!
//! Retargeted from `filesentry/examples/cli.rs` (arg parsing via `lexopt`,
//! `env_logger` init, a `Filter` wired from `.gitignore`/`.ignore` files)
//! away from printing raw change events and onto printing tree
//! expand/select actions as the user types path commands. Collapsing an
//! individual subtree is a UI-binding concern this headless core leaves to
//! the host's own `NodeView` implementation (see `view.rs`), so this demo
//! only drives the operations `Facade` itself exposes.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fstree::{Config, Facade, NodePolicy};
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use log::error;

const HELP: &str = r#"
Walk a directory tree lazily, expanding directories on demand, against
the live filesystem.

Usage: cli [OPTIONS] [dir]

Arguments:
  [dir]
      The directory to start at (default: the current directory).

Options:
  -H, --hidden      Show dotfile directories (default: hidden).
  -I, --no-ignore   Don't apply .gitignore/.ignore rules.

Commands (read from stdin once running):
  expand <path>     Expand every ancestor of <path>, then select it.
  tree              Print every currently expanded path.
  update            Re-read the whole expanded subtree from disk.
  quit              Close the tree and exit.
"#;

struct Ignore {
    hidden: bool,
    ignores: Vec<Gitignore>,
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .is_some_and(|it| it.as_encoded_bytes().first() == Some(&b'.'))
}

impl NodePolicy for Ignore {
    fn is_creating_node_for_directory(&self, path: &Path) -> bool {
        if !self.hidden && is_hidden(path) {
            return false;
        }
        for ignore in &self.ignores {
            match ignore.matched(path, true) {
                ignore::Match::None => continue,
                ignore::Match::Ignore(_) => return false,
                ignore::Match::Whitelist(_) => return true,
            }
        }
        true
    }
}

fn parse_args() -> Result<(PathBuf, Ignore), lexopt::Error> {
    use lexopt::prelude::*;

    let mut no_ignore = false;
    let mut hidden = false;
    let mut parser = lexopt::Parser::from_env();
    let mut root = None;
    while let Some(arg) = parser.next()? {
        match arg {
            Short('H') | Long("hidden") => hidden = true,
            Short('I') | Long("no-ignore") => no_ignore = true,
            Long("help") => {
                println!("{HELP}");
                std::process::exit(0);
            }
            Value(root_) if root.is_none() => root = Some(PathBuf::from(root_)),
            _ => return Err(arg.unexpected()),
        }
    }
    let root = root
        .map(Ok)
        .unwrap_or_else(std::env::current_dir)
        .map_err(|err| lexopt::Error::Custom(Box::new(err)))?;

    let mut ignores = Vec::new();
    if !no_ignore {
        let (global, errors) = Gitignore::global();
        if let Some(errs) = errors {
            error!("invalid global .gitignore: {errs}");
        }
        ignores.push(global);
        for parent in root.ancestors() {
            let mut builder = None;
            for name in [".ignore", ".gitignore"] {
                let path = parent.join(name);
                if path.exists() {
                    builder
                        .get_or_insert_with(|| GitignoreBuilder::new(parent))
                        .add(path);
                }
            }
            if let Some(builder) = builder.take() {
                match builder.build() {
                    Ok(ig) => ignores.push(ig),
                    Err(err) => error!("invalid ignores at {parent:?}: {err}"),
                }
            }
        }
    }
    Ok((root, Ignore { hidden, ignores }))
}

fn print_tree(facade: &Facade) {
    let paths = facade.expanded_paths();
    if paths.is_empty() {
        println!("(nothing expanded)");
        return;
    }
    for path in paths.iter() {
        println!("{path}");
    }
    if let Some(selected) = facade.selected_path() {
        println!("selected: {selected}");
    }
}

pub fn main() -> Result<(), lexopt::Error> {
    let (root, ignore) = parse_args()?;
    let _ = env_logger::builder().try_init();

    let config = Config::builder()
        .with_node_policy(Arc::new(ignore))
        .build()
        .map_err(|err| lexopt::Error::Custom(Box::new(err)))?;
    let facade = Facade::new(config);

    facade
        .expand_path(&root, false, true)
        .map_err(|err| lexopt::Error::Custom(Box::new(err)))?;
    println!("watching {}", root.display());
    print_tree(&facade);

    let stdin = io::stdin();
    print!("> ");
    io::stdout().flush().ok();
    for line in stdin.lock().lines() {
        let line = line.map_err(|err| lexopt::Error::Custom(Box::new(err)))?;
        let mut parts = line.trim().splitn(2, char::is_whitespace);
        match (parts.next(), parts.next()) {
            (Some("expand"), Some(path)) => match facade.expand_path(Path::new(path), false, true) {
                Ok(Some(resolved)) => println!("expanded {resolved}"),
                Ok(None) => println!("no such path under the live filesystem"),
                Err(err) => println!("error: {err}"),
            },
            (Some("tree"), _) => print_tree(&facade),
            (Some("update"), _) => facade.update_tree(),
            (Some("quit"), _) | (Some("exit"), _) => break,
            (Some(""), _) | (None, _) => {}
            (Some(other), _) => println!("unknown command: {other} (try --help)"),
        }
        print!("> ");
        io::stdout().flush().ok();
    }

    facade.close();
    Ok(())
}
