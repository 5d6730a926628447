//! An ordered, duplicate-free sequence with a diffing `synchronize_to`
//! primitive.
//!
//! No single teacher file implements this diff shape directly. The
//! "compute deletions first, then insertions" rule and the decision to
//! standardize on multi-index events were worked out directly against the
//! observed producer/consumer contract. The discipline of "never touch the
//! backing collection without going through the index" mirrors
//! `filesentry::events::EventDebouncer` (a hash-indexed collection that
//! consolidates changes before handing them to a consumer), applied here to
//! a sorted `Vec` instead of a hash table.

use std::cmp::Ordering;
use std::sync::Arc;

/// A diff event emitted by [`SortedDistinctList`]'s mutating operations.
///
/// This settles on the multi-index form rather than a per-item form: it is
/// strictly more general (a single index is just a multi-index of length
/// one) and strictly less chatty for bulk changes.
#[derive(Debug, Clone)]
pub enum ListChange<T> {
    /// A single item was inserted at `index` via [`SortedDistinctList::add`].
    Add { index: usize, item: T },
    /// A single item was removed at `index` via
    /// [`SortedDistinctList::remove_item`].
    Remove { index: usize, item: T },
    /// `synchronize_to` removed these items; `indices` are the pre-removal
    /// positions in descending order, parallel to `items`.
    MultiRemove { indices: Vec<usize>, items: Vec<T> },
    /// `synchronize_to` inserted these items; `indices` are the
    /// post-deletion positions in ascending order, parallel to `items`.
    MultiAdd { indices: Vec<usize>, items: Vec<T> },
    /// `synchronize_to` filled a previously empty list.
    BulkAdd { items: Vec<T> },
    /// `synchronize_to` emptied a previously non-empty list; `items` are
    /// the outgoing items, captured before the list was cleared.
    BulkClear { items: Vec<T> },
}

type Comparator<T> = Arc<dyn Fn(&T, &T) -> Ordering + Send + Sync>;

/// Ordered, deduplicated sequence under a caller-supplied strict total
/// order. Only the operations below may mutate it — there is no
/// `IndexMut`, `sort`, `insert`, or iterator-based removal; any other
/// mutation is simply not part of the API.
pub struct SortedDistinctList<T> {
    items: Vec<T>,
    cmp: Comparator<T>,
}

impl<T> SortedDistinctList<T> {
    pub fn new(cmp: Comparator<T>) -> Self {
        Self {
            items: Vec::new(),
            cmp,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    fn bsearch(&self, item: &T) -> Result<usize, usize> {
        self.items.binary_search_by(|probe| (self.cmp)(probe, item))
    }

    /// O(log n) membership/position query by binary search.
    pub fn position(&self, item: &T) -> Option<usize> {
        self.bsearch(item).ok()
    }

    pub fn contains(&self, item: &T) -> bool {
        self.bsearch(item).is_ok()
    }

    /// O(log n) lookup by a key projected from each element (used for
    /// `find_child_by_name`, which searches by name only).
    pub fn binary_search_by_key<K: Ord>(&self, key: &K, project: impl Fn(&T) -> K) -> Option<&T> {
        self.items
            .binary_search_by_key(key, project)
            .ok()
            .and_then(|i| self.items.get(i))
    }
}

impl<T: Clone> SortedDistinctList<T> {
    /// Inserts `item` if absent. Returns whether the list changed.
    pub fn add(&mut self, item: T, mut on_event: impl FnMut(ListChange<T>)) -> bool {
        match self.bsearch(&item) {
            Ok(_) => false,
            Err(index) => {
                self.items.insert(index, item.clone());
                on_event(ListChange::Add { index, item });
                true
            }
        }
    }

    /// Removes `item` if present. Returns whether the list changed.
    pub fn remove_item(&mut self, item: &T, mut on_event: impl FnMut(ListChange<T>)) -> bool {
        match self.bsearch(item) {
            Ok(index) => {
                let removed = self.items.remove(index);
                on_event(ListChange::Remove {
                    index,
                    item: removed,
                });
                true
            }
            Err(_) => false,
        }
    }

    /// Replaces the current content with `target`, emitting the minimal
    /// set of insert/remove events: a bulk add/clear when transitioning
    /// to/from empty, otherwise one multi-remove followed by one
    /// multi-add.
    pub fn synchronize_to(&mut self, target: Vec<T>, mut on_event: impl FnMut(ListChange<T>)) {
        let mut target = target;
        target.sort_by(|a, b| (self.cmp)(a, b));
        target.dedup_by(|a, b| (self.cmp)(a, b) == Ordering::Equal);

        if self.items.is_empty() && !target.is_empty() {
            self.items = target.clone();
            on_event(ListChange::BulkAdd { items: target });
            return;
        }

        if !self.items.is_empty() && target.is_empty() {
            let items = std::mem::take(&mut self.items);
            on_event(ListChange::BulkClear { items });
            return;
        }

        if self.items.is_empty() && target.is_empty() {
            return;
        }

        let mut del_indices = Vec::new();
        let mut del_items = Vec::new();
        for (index, item) in self.items.iter().enumerate() {
            if !target
                .iter()
                .any(|candidate| (self.cmp)(candidate, item) == Ordering::Equal)
            {
                del_indices.push(index);
                del_items.push(item.clone());
            }
        }
        for &index in del_indices.iter().rev() {
            self.items.remove(index);
        }
        if !del_indices.is_empty() {
            del_indices.reverse();
            del_items.reverse();
            on_event(ListChange::MultiRemove {
                indices: del_indices,
                items: del_items,
            });
        }

        let mut ins_indices = Vec::new();
        let mut ins_items = Vec::new();
        for item in &target {
            if self.bsearch(item).is_err() {
                let index = self.bsearch(item).unwrap_err();
                self.items.insert(index, item.clone());
                ins_indices.push(index);
                ins_items.push(item.clone());
            }
        }
        if !ins_indices.is_empty() {
            on_event(ListChange::MultiAdd {
                indices: ins_indices,
                items: ins_items,
            });
        }
    }
}
