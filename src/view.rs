//! The host-implementable UI adapter. Opaque to the core: it may dispatch
//! onto a UI thread, and the core never blocks waiting on it.
//!
//! No teacher analogue — filesentry has no UI layer — this is modeled
//! directly from the insert/remove/clear/expand/leaf operations a lazily
//! populated tree widget needs.
//!
//! A child's view handle is shared, not moved: the owning controller keeps
//! its own `Arc<dyn NodeView>` for later `set_expanded`/`set_leaf` calls
//! at the same time the parent view holds a clone to address it within
//! its own children collection. Implementors therefore use interior
//! mutability (a `Mutex`, an `AtomicBool`, a channel to a UI thread) the
//! same way a GUI toolkit's retained-mode node handle would.

use std::sync::Arc;

/// One visible position in the host's tree widget, corresponding to one
/// [`NodeController`](crate::controller::NodeController).
pub trait NodeView: Send + Sync {
    /// Inserts child views at the given indices, in ascending order.
    fn insert_subnodes(&self, indexed_views: &[(usize, Arc<dyn NodeView>)]);

    /// Bulk-appends child views to what the host knows to be an empty view.
    fn add_all_subnodes(&self, views: Vec<Arc<dyn NodeView>>);

    /// Removes child views at the given indices, in the order given
    /// (descending order is used by `synchronize_to`-driven removals).
    fn remove_subnodes(&self, indices: &[usize]);

    /// Removes all child views.
    fn clear(&self);

    fn set_expanded(&self, expanded: bool);

    fn set_leaf(&self, leaf: bool);
}

/// A [`NodeView`] that discards every call; useful as the default view for
/// a host that has not yet attached a real UI, and in tests that only care
/// about the controller/model state.
#[derive(Debug, Default)]
pub struct NullView;

impl NodeView for NullView {
    fn insert_subnodes(&self, _indexed_views: &[(usize, Arc<dyn NodeView>)]) {}
    fn add_all_subnodes(&self, _views: Vec<Arc<dyn NodeView>>) {}
    fn remove_subnodes(&self, _indices: &[usize]) {}
    fn clear(&self) {}
    fn set_expanded(&self, _expanded: bool) {}
    fn set_leaf(&self, _leaf: bool) {}
}
