//! Construction-time configuration and the shared runtime handle every
//! node is built with.
//!
//! `ConfigBuilder` is grounded on `filesentry::Watcher::new`/`add_handler`/
//! `set_filter`/`set_settle_time` (a handful of setter-style configuration
//! calls against a shared `Mutex<Config>`), reshaped into an owned,
//! consuming `with_*` builder terminating in `.build()` — the more
//! conventional shape for configuration that is fixed once at
//! construction rather than mutated over the object's lifetime.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::filesystem::{FileSystem, StdFileSystem};
use crate::path::NodePath;
use crate::policy::{NodePolicy, SimplePolicy};
use crate::view::{NodeView, NullView};
use crate::watch_hub::WatchHub;

type Comparator = Arc<dyn Fn(&str, &str) -> Ordering + Send + Sync>;

/// Mints a fresh view handle for a newly discovered node, given that node's
/// own absolute path. Not part of the configuration table the design docs
/// carry over from the distilled spec — `NodeView` has no "create a child
/// of myself" method, so something has to mint the `Arc<dyn NodeView>` a
/// child is first handed, and a real UI adapter needs to know which path
/// it is rendering. Defaults to [`NullView`], so a host that never attaches
/// a UI still gets a fully functional (silent) tree.
pub type ViewFactory = Arc<dyn Fn(&NodePath) -> Arc<dyn NodeView> + Send + Sync>;

/// Immutable, validated configuration produced by [`ConfigBuilder::build`].
#[derive(Clone)]
pub struct Config {
    pub(crate) filesystem: Arc<dyn FileSystem>,
    pub(crate) request_watch_service: bool,
    pub(crate) comparator: Comparator,
    pub(crate) node_policy: Arc<dyn NodePolicy>,
    pub(crate) view_factory: ViewFactory,
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Consuming builder for [`Config`]. Every option has a default matching
/// the external-interfaces configuration table in the design docs.
pub struct ConfigBuilder {
    filesystem: Option<Arc<dyn FileSystem>>,
    request_watch_service: bool,
    comparator: Comparator,
    node_policy: Arc<dyn NodePolicy>,
    view_factory: ViewFactory,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self {
            filesystem: None,
            request_watch_service: true,
            comparator: Arc::new(|a, b| a.cmp(b)),
            node_policy: Arc::new(SimplePolicy),
            view_factory: Arc::new(|_path| Arc::new(NullView)),
        }
    }
}

impl ConfigBuilder {
    pub fn with_filesystem(mut self, filesystem: Arc<dyn FileSystem>) -> Self {
        self.filesystem = Some(filesystem);
        self
    }

    pub fn with_watch_service(mut self, enabled: bool) -> Self {
        self.request_watch_service = enabled;
        self
    }

    pub fn with_filename_comparator(
        mut self,
        comparator: impl Fn(&str, &str) -> Ordering + Send + Sync + 'static,
    ) -> Self {
        self.comparator = Arc::new(comparator);
        self
    }

    pub fn with_node_policy(mut self, policy: Arc<dyn NodePolicy>) -> Self {
        self.node_policy = policy;
        self
    }

    pub fn with_view_factory(mut self, factory: ViewFactory) -> Self {
        self.view_factory = factory;
        self
    }

    /// Finalizes the configuration, falling back to a [`StdFileSystem`] if
    /// none was supplied.
    pub fn build(self) -> std::io::Result<Config> {
        let filesystem = match self.filesystem {
            Some(fs) => fs,
            None => Arc::new(StdFileSystem::new()?),
        };
        Ok(Config {
            filesystem,
            request_watch_service: self.request_watch_service,
            comparator: self.comparator,
            node_policy: self.node_policy,
            view_factory: self.view_factory,
        })
    }
}

/// The shared, reference-counted runtime handed to every node at
/// construction: the filesystem it reads through, the watch hub it
/// registers with, the policy used to decide node/leaf/mount-ness, and
/// the comparator siblings are ordered by.
///
/// Exactly one `NodeConfig` exists per [`Facade`](crate::facade::Facade),
/// shared by `Arc` across the whole controller tree — there is no per-node
/// copy, mirroring how `filesentry::Watcher` shares one `Arc<Config>`
/// across every watched directory's worker state.
pub struct NodeConfig {
    pub filesystem: Arc<dyn FileSystem>,
    pub watch_hub: Arc<WatchHub>,
    pub comparator: Comparator,
    pub node_policy: Arc<dyn NodePolicy>,
    pub view_factory: ViewFactory,
}

impl NodeConfig {
    pub fn from_config(config: Config) -> Arc<Self> {
        let watch_hub = WatchHub::new(config.filesystem.clone(), config.request_watch_service);
        Arc::new(Self {
            filesystem: config.filesystem,
            watch_hub,
            comparator: config.comparator,
            node_policy: config.node_policy,
            view_factory: config.view_factory,
        })
    }

    /// Builds a `NodeConfig` over an already-open filesystem, sharing this
    /// config's comparator, policy, and view factory but not its watch hub
    /// (mounted filesystems get their own, since spec Non-goals exclude
    /// watch service inside mounted filesystems).
    pub fn for_mounted_filesystem(&self, filesystem: Arc<dyn FileSystem>) -> Arc<Self> {
        let watch_hub = WatchHub::new(filesystem.clone(), false);
        Arc::new(Self {
            filesystem,
            watch_hub,
            comparator: self.comparator.clone(),
            node_policy: self.node_policy.clone(),
            view_factory: self.view_factory.clone(),
        })
    }

    /// Whether `filesystem` is this config's own global default — used to
    /// decide whether a file-mount's filesystem should ever be closed.
    pub fn is_default_filesystem(&self, filesystem: &Arc<dyn FileSystem>) -> bool {
        Arc::ptr_eq(&self.filesystem, filesystem)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults_to_std_filesystem_and_simple_policy() {
        let config = ConfigBuilder::default().build().expect("build config");
        assert!(config.request_watch_service);
        assert_eq!((config.comparator)("a", "b"), Ordering::Less);
    }
}
