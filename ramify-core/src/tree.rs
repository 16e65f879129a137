use std::collections::HashSet;

use indexmap::IndexMap;
use tracing::trace;

use crate::error::RepositoryError;
use crate::message::Message;

/// Ordered children plus the currently selected one.
///
/// Shared by the root sentinel and every node. `active` is always one of
/// `children`, or `None` when there are none.
#[derive(Debug, Clone, Default)]
pub(crate) struct Branches {
    pub children: Vec<String>,
    pub active: Option<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct Node<M> {
    pub message: M,
    /// Parent id, `None` for root-level messages.
    pub parent: Option<String>,
    pub branches: Branches,
    pub depth: usize,
}

/// Arena of nodes keyed by message id.
///
/// The map keeps insertion order, which export relies on. A node is inserted
/// after its parent, but a relink can later move it below a newer node.
/// A node is reachable from the root sentinel iff it is in the map.
#[derive(Debug, Clone)]
pub(crate) struct TreeStore<M> {
    nodes: IndexMap<String, Node<M>>,
    root: Branches,
}

impl<M> Default for TreeStore<M> {
    fn default() -> Self {
        TreeStore {
            nodes: IndexMap::new(),
            root: Branches::default(),
        }
    }
}

impl<M: Message> TreeStore<M> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&Node<M>> {
        self.nodes.get(id)
    }

    /// Nodes in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Node<M>> {
        self.nodes.values()
    }

    /// Branches below `parent`, or below the root sentinel for `None`.
    pub fn branches(&self, parent: Option<&str>) -> Option<&Branches> {
        match parent {
            None => Some(&self.root),
            Some(id) => self.nodes.get(id).map(|node| &node.branches),
        }
    }

    /// Children of `id`'s parent, `id` included. `None` if `id` is absent.
    pub fn siblings(&self, id: &str) -> Option<&[String]> {
        self.branches(self.nodes.get(id)?.parent.as_deref())
            .map(|branches| branches.children.as_slice())
    }

    fn branches_mut(&mut self, parent: Option<&str>) -> Option<&mut Branches> {
        match parent {
            None => Some(&mut self.root),
            Some(id) => self.nodes.get_mut(id).map(|node| &mut node.branches),
        }
    }

    /// Fails if `id` is `new_parent` or one of its ancestors.
    ///
    /// Pure check: linking `id` below `new_parent` would otherwise close a cycle.
    pub fn ensure_not_ancestor(
        &self,
        id: &str,
        new_parent: Option<&str>,
    ) -> Result<(), RepositoryError> {
        let mut current = new_parent;
        while let Some(ancestor) = current {
            if ancestor == id {
                return Err(RepositoryError::DuplicateAncestor(id.to_owned()));
            }
            current = self.nodes.get(ancestor).and_then(|node| node.parent.as_deref());
        }
        Ok(())
    }

    /// Follows `active` pointers from `from` (or the root) down to a leaf.
    ///
    /// Returns `None` only when starting at an empty root.
    pub fn active_leaf(&self, from: Option<&str>) -> Option<String> {
        let mut current = match from {
            Some(id) => self.nodes.get(id)?,
            None => self.nodes.get(self.root.active.as_deref()?)?,
        };
        while let Some(next) = current
            .branches
            .active
            .as_deref()
            .and_then(|id| self.nodes.get(id))
        {
            current = next;
        }
        Some(current.message.id().to_owned())
    }

    /// Inserts a new node and links it below `parent`.
    pub fn insert(
        &mut self,
        parent: Option<&str>,
        message: M,
        head: Option<&str>,
    ) -> Result<(), RepositoryError> {
        let depth = match parent {
            Some(parent_id) => {
                let parent = self
                    .nodes
                    .get(parent_id)
                    .ok_or_else(|| RepositoryError::ParentNotFound(parent_id.to_owned()))?;
                parent.depth + 1
            }
            None => 0,
        };

        let id = message.id().to_owned();
        self.nodes.insert(
            id.clone(),
            Node {
                message,
                parent: parent.map(str::to_owned),
                branches: Branches::default(),
                depth,
            },
        );
        self.attach(parent, &id, head)
    }

    pub fn replace_message(&mut self, id: &str, message: M) -> Result<(), RepositoryError> {
        let node = self
            .nodes
            .get_mut(id)
            .ok_or_else(|| RepositoryError::MessageNotFound(id.to_owned()))?;
        node.message = message;
        Ok(())
    }

    /// Moves `id` (with its whole subtree) below `new_parent`.
    ///
    /// A no-op when the parent does not change. All validation happens before
    /// the node is cut, so a failure leaves the tree untouched.
    pub fn relink(
        &mut self,
        new_parent: Option<&str>,
        id: &str,
        head: Option<&str>,
    ) -> Result<(), RepositoryError> {
        let node = self
            .nodes
            .get(id)
            .ok_or_else(|| RepositoryError::MessageNotFound(id.to_owned()))?;
        if node.parent.as_deref() == new_parent {
            return Ok(());
        }
        if let Some(parent_id) = new_parent {
            if !self.contains(parent_id) {
                return Err(RepositoryError::ParentNotFound(parent_id.to_owned()));
            }
        }
        self.ensure_not_ancestor(id, new_parent)?;

        self.detach(id)?;
        self.attach(new_parent, id, head)
    }

    /// Cuts `id` from its parent's children.
    ///
    /// If the parent had `id` selected, selection falls back to the last
    /// remaining sibling.
    pub fn detach(&mut self, id: &str) -> Result<(), RepositoryError> {
        let parent = self
            .nodes
            .get(id)
            .ok_or_else(|| RepositoryError::MessageNotFound(id.to_owned()))?
            .parent
            .clone();
        let parent_label = || parent.clone().unwrap_or_else(|| "<root>".to_owned());
        let branches = self
            .branches(parent.as_deref())
            .ok_or_else(|| RepositoryError::ParentNotFound(parent_label()))?;

        let fallback = if branches.active.as_deref() == Some(id) {
            let fallback = branches.children.iter().rev().find(|c| *c != id).cloned();
            if let Some(sibling) = &fallback {
                if !self.nodes.contains_key(sibling) {
                    return Err(RepositoryError::FallbackSiblingMissing {
                        parent: parent_label(),
                        sibling: sibling.clone(),
                    });
                }
            }
            Some(fallback)
        } else {
            None
        };

        let branches = self
            .branches_mut(parent.as_deref())
            .ok_or_else(|| RepositoryError::ParentNotFound(parent_label()))?;
        branches.children.retain(|c| c != id);
        if let Some(fallback) = fallback {
            branches.active = fallback;
        }
        Ok(())
    }

    /// Appends `id` to the children of `parent` and recomputes subtree depths.
    ///
    /// The parent selects `id` when it had no selection yet, or when the
    /// active leaf below `id` is the current head.
    fn attach(
        &mut self,
        parent: Option<&str>,
        id: &str,
        head: Option<&str>,
    ) -> Result<(), RepositoryError> {
        let leads_to_head = head.is_some() && self.active_leaf(Some(id)).as_deref() == head;

        let branches = self
            .branches_mut(parent)
            .ok_or_else(|| RepositoryError::ParentNotFound(parent.unwrap_or_default().to_owned()))?;
        branches.children.push(id.to_owned());
        if leads_to_head || branches.active.is_none() {
            branches.active = Some(id.to_owned());
        }

        let depth = parent
            .and_then(|parent_id| self.nodes.get(parent_id))
            .map_or(0, |parent| parent.depth + 1);
        if let Some(node) = self.nodes.get_mut(id) {
            node.parent = parent.map(str::to_owned);
        }
        self.propagate_depth(id, depth);
        Ok(())
    }

    fn propagate_depth(&mut self, id: &str, depth: usize) {
        let mut pending = vec![(id.to_owned(), depth)];
        let mut visited = 0usize;
        while let Some((id, depth)) = pending.pop() {
            if let Some(node) = self.nodes.get_mut(&id) {
                node.depth = depth;
                pending.extend(node.branches.children.iter().map(|c| (c.clone(), depth + 1)));
                visited += 1;
            }
        }
        trace!(visited, "recomputed subtree depths");
    }

    /// Selects `id` in its parent's branches. Touches no other level.
    pub fn select(&mut self, id: &str) -> Result<(), RepositoryError> {
        let parent = self
            .nodes
            .get(id)
            .ok_or_else(|| RepositoryError::BranchNotFound(id.to_owned()))?
            .parent
            .clone();
        let branches = self
            .branches_mut(parent.as_deref())
            .ok_or_else(|| RepositoryError::BranchNotFound(id.to_owned()))?;
        branches.active = Some(id.to_owned());
        Ok(())
    }

    /// Overwrites the selection at every level from the root down to `id`.
    pub fn select_path(&mut self, id: &str) {
        let mut current = id.to_owned();
        loop {
            let Some(parent) = self.nodes.get(&current).map(|node| node.parent.clone()) else {
                return;
            };
            if let Some(branches) = self.branches_mut(parent.as_deref()) {
                branches.active = Some(current);
            }
            match parent {
                Some(parent) => current = parent,
                None => return,
            }
        }
    }

    /// Deletes every descendant of `id` and clears its branches.
    ///
    /// Returns the number of removed nodes.
    pub fn prune_descendants(&mut self, id: &str) -> usize {
        let Some(node) = self.nodes.get_mut(id) else {
            return 0;
        };
        let mut pending = std::mem::take(&mut node.branches.children);
        node.branches.active = None;

        let mut doomed = HashSet::new();
        while let Some(child) = pending.pop() {
            if let Some(node) = self.nodes.get(&child) {
                pending.extend(node.branches.children.iter().cloned());
            }
            doomed.insert(child);
        }

        let before = self.nodes.len();
        self.nodes.retain(|id, _| !doomed.contains(id));
        before - self.nodes.len()
    }

    /// Removes a detached, childless node from the arena.
    pub fn remove(&mut self, id: &str) -> Option<Node<M>> {
        self.nodes.shift_remove(id)
    }
}
