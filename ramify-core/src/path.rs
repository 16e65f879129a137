use std::sync::OnceLock;

use crate::message::Message;
use crate::tree::TreeStore;

/// Memoized view of the active path, root first.
///
/// The path is computed lazily on first read and cached until the next
/// mutation calls [`PathCache::dirty`]. Mutators hold `&mut` access to the
/// repository, so readers never observe a half-updated cache.
#[derive(Debug)]
pub(crate) struct PathCache<M> {
    messages: OnceLock<Vec<M>>,
}

impl<M> Default for PathCache<M> {
    fn default() -> Self {
        PathCache {
            messages: OnceLock::new(),
        }
    }
}

impl<M: Message + Clone> PathCache<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached path to `head`, computing it if necessary.
    pub fn get_or_compute(&self, tree: &TreeStore<M>, head: Option<&str>) -> &[M] {
        self.messages.get_or_init(|| collect_path(tree, head))
    }

    /// Drops the cached value; the next read recomputes it.
    pub fn dirty(&mut self) {
        self.messages.take();
    }

    #[cfg(test)]
    pub fn is_cached(&self) -> bool {
        self.messages.get().is_some()
    }
}

/// Walks parent pointers up from `head` and returns the messages root first.
///
/// Each node lands at the index equal to its depth.
pub(crate) fn collect_path<M: Message + Clone>(tree: &TreeStore<M>, head: Option<&str>) -> Vec<M> {
    let Some(mut node) = head.and_then(|id| tree.get(id)) else {
        return Vec::new();
    };

    let mut path = Vec::with_capacity(node.depth + 1);
    loop {
        path.push(node.message.clone());
        match node.parent.as_deref().and_then(|id| tree.get(id)) {
            Some(parent) => node = parent,
            None => break,
        }
    }
    path.reverse();
    debug_assert!(
        path.iter()
            .enumerate()
            .all(|(depth, m)| tree.get(m.id()).is_some_and(|n| n.depth == depth)),
        "path index must equal node depth"
    );
    path
}
