use std::borrow::Cow;
use std::collections::HashSet;

use tracing::{debug, instrument};

use crate::config::RepositoryConfig;
use crate::error::{ConfigError, RepositoryError};
use crate::message::{Message, MessageStatus};
use crate::optimistic::{IdGenerator, OptimisticIdAllocator, RandomIdGenerator};
use crate::path::{PathCache, collect_path};
use crate::snapshot::{ExportedMessage, ExportedRepository};
use crate::tree::TreeStore;

/// A message looked up by id, with its position in the tree.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageEntry<'a, M> {
    pub message: &'a M,
    pub parent_id: Option<&'a str>,
    /// Distance from the root; root-level messages have depth 0.
    pub depth: usize,
}

/// Where the children of a deleted message are moved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Replacement<'a> {
    /// The deleted message's own parent.
    #[default]
    Parent,
    /// Root level.
    Root,
    /// A specific message.
    Message(&'a str),
}

/// Conversation history as a tree of messages.
///
/// Editing or regenerating a message adds a sibling instead of overwriting
/// it. Every node remembers which of its children is selected; following
/// those selections from the root yields the active path that ends at the
/// head.
///
/// All mutators take `&mut self`. Sharing a repository across threads is the
/// caller's business (a mutex or an owning task); snapshots taken with
/// [`export`](Self::export) are plain values that can cross that boundary.
///
/// # Example
///
/// ```
/// use ramify_core::{Message, MessageRepository};
///
/// #[derive(Debug, Clone, PartialEq, Message)]
/// struct Turn {
///     id: String,
/// }
///
/// let turn = |id: &str| Turn { id: id.to_string() };
/// let mut repo = MessageRepository::new();
/// repo.add_or_update_message(None, turn("a")).unwrap();
/// repo.add_or_update_message(Some("a"), turn("b")).unwrap();
/// // regenerate "b" as a sibling branch
/// repo.add_or_update_message(Some("a"), turn("b2")).unwrap();
///
/// assert_eq!(repo.get_branches("b").unwrap(), ["b", "b2"]);
/// repo.switch_to_branch("b2").unwrap();
/// assert_eq!(repo.get_messages(), [turn("a"), turn("b2")]);
/// ```
#[derive(Debug)]
pub struct MessageRepository<M> {
    tree: TreeStore<M>,
    head: Option<String>,
    path: PathCache<M>,
    allocator: OptimisticIdAllocator,
}

impl<M: Message + Clone> Default for MessageRepository<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Message + Clone> MessageRepository<M> {
    /// Creates an empty repository with the default configuration.
    pub fn new() -> Self {
        Self::from_validated(RepositoryConfig::default())
    }

    /// Creates an empty repository, rejecting configs that could not
    /// allocate optimistic ids.
    pub fn with_config(config: RepositoryConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::from_validated(config))
    }

    fn from_validated(config: RepositoryConfig) -> Self {
        MessageRepository {
            tree: TreeStore::new(),
            head: None,
            path: PathCache::new(),
            allocator: OptimisticIdAllocator::new(
                Box::new(RandomIdGenerator),
                config.optimistic_id_length,
                config.max_optimistic_attempts,
            ),
        }
    }

    /// Replaces the source of optimistic id suffixes.
    pub fn with_id_generator(mut self, generator: impl IdGenerator + Send + Sync + 'static) -> Self {
        self.allocator.set_generator(Box::new(generator));
        self
    }

    /// Id of the current head, or None if the repository is empty.
    pub fn head_id(&self) -> Option<&str> {
        self.head.as_deref()
    }

    /// Number of messages across all branches.
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.len() == 0
    }

    pub fn contains(&self, id: &str) -> bool {
        self.tree.contains(id)
    }

    /// Messages on the active path, root first, ending at the head.
    ///
    /// Computed on first read after a mutation and cached until the next.
    pub fn get_messages(&self) -> &[M] {
        self.path.get_or_compute(&self.tree, self.head.as_deref())
    }

    /// Messages from the root down to `head_id`.
    ///
    /// Borrows the cached path when `head_id` is the current head; any other
    /// head is walked fresh and leaves the cache alone.
    pub fn get_messages_from(&self, head_id: &str) -> Result<Cow<'_, [M]>, RepositoryError> {
        if self.head.as_deref() == Some(head_id) {
            return Ok(Cow::Borrowed(self.get_messages()));
        }
        if !self.tree.contains(head_id) {
            return Err(RepositoryError::MessageNotFound(head_id.to_owned()));
        }
        Ok(Cow::Owned(collect_path(&self.tree, Some(head_id))))
    }

    /// Adds a message below `parent_id`, or updates it if the id exists.
    ///
    /// An update replaces the payload and moves the message (with all its
    /// descendants) below `parent_id` if that differs from its current
    /// parent. A new message becomes the head when the repository was empty
    /// or when its parent was the head.
    pub fn add_or_update_message(
        &mut self,
        parent_id: Option<&str>,
        message: M,
    ) -> Result<(), RepositoryError> {
        if let Some(parent_id) = parent_id {
            if !self.tree.contains(parent_id) {
                return Err(RepositoryError::ParentNotFound(parent_id.to_owned()));
            }
        }

        let id = message.id().to_owned();
        if self.tree.contains(&id) {
            self.tree.relink(parent_id, &id, self.head.as_deref())?;
            self.tree.replace_message(&id, message)?;
            debug!(%id, parent = ?parent_id, "updated message");
        } else {
            self.tree.insert(parent_id, message, self.head.as_deref())?;
            if self.head.is_none() || self.head.as_deref() == parent_id {
                self.head = Some(id.clone());
            }
            debug!(%id, parent = ?parent_id, "added message");
        }

        self.path.dirty();
        Ok(())
    }

    /// Returns a message with its parent id and depth.
    pub fn get_message(&self, id: &str) -> Result<MessageEntry<'_, M>, RepositoryError> {
        let node = self
            .tree
            .get(id)
            .ok_or_else(|| RepositoryError::MessageNotFound(id.to_owned()))?;
        Ok(MessageEntry {
            message: &node.message,
            parent_id: node.parent.as_deref(),
            depth: node.depth,
        })
    }

    /// Inserts a placeholder for a message that has not been confirmed yet.
    ///
    /// Allocates an id carrying [`OPTIMISTIC_PREFIX`](crate::OPTIMISTIC_PREFIX)
    /// that no message in the repository uses, asks `build` for a message with
    /// that id in the [`MessageStatus::Running`] state, and inserts it below
    /// `parent_id`. Returns the allocated id so the placeholder can later be
    /// replaced. A message whose id differs from the allocated one is
    /// rejected with `FactoryIdMismatch` before anything is inserted.
    pub fn append_optimistic_message<F>(
        &mut self,
        parent_id: Option<&str>,
        build: F,
    ) -> Result<String, RepositoryError>
    where
        F: FnOnce(String, MessageStatus) -> M,
    {
        if let Some(parent_id) = parent_id {
            if !self.tree.contains(parent_id) {
                return Err(RepositoryError::ParentNotFound(parent_id.to_owned()));
            }
        }

        let tree = &self.tree;
        let id = self.allocator.allocate(|candidate| tree.contains(candidate))?;
        let message = build(id.clone(), MessageStatus::Running);
        if message.id() != id {
            return Err(RepositoryError::FactoryIdMismatch {
                allocated: id,
                returned: message.id().to_owned(),
            });
        }

        self.add_or_update_message(parent_id, message)?;
        Ok(id)
    }

    /// Deletes a message, moving its children below `replacement`.
    ///
    /// If the deleted message was the head, the head moves to the active leaf
    /// below the replacement (or the root).
    #[instrument(skip(self), level = "debug")]
    pub fn delete_message(
        &mut self,
        id: &str,
        replacement: Replacement<'_>,
    ) -> Result<(), RepositoryError> {
        let node = self
            .tree
            .get(id)
            .ok_or_else(|| RepositoryError::MessageNotFound(id.to_owned()))?;

        let replacement: Option<String> = match replacement {
            Replacement::Parent => node.parent.clone(),
            Replacement::Root => None,
            Replacement::Message(replacement_id) => {
                if replacement_id == id || !self.tree.contains(replacement_id) {
                    return Err(RepositoryError::ReplacementNotFound(replacement_id.to_owned()));
                }
                Some(replacement_id.to_owned())
            }
        };

        let children = node.branches.children.clone();
        for child in &children {
            self.tree.ensure_not_ancestor(child, replacement.as_deref())?;
        }

        for child in &children {
            self.tree.relink(replacement.as_deref(), child, self.head.as_deref())?;
        }
        self.tree.detach(id)?;
        self.tree.remove(id);

        if self.head.as_deref() == Some(id) {
            self.head = self.tree.active_leaf(replacement.as_deref());
        }
        debug!(moved = children.len(), head = ?self.head, "deleted message");

        self.path.dirty();
        Ok(())
    }

    /// Ids of `id` and its siblings, in the order they were linked.
    pub fn get_branches(&self, id: &str) -> Result<&[String], RepositoryError> {
        self.tree
            .siblings(id)
            .ok_or_else(|| RepositoryError::MessageNotFound(id.to_owned()))
    }

    /// Selects `id` among its siblings.
    ///
    /// Only the immediate parent's selection changes. The head moves to the
    /// leaf reached by following the selections already stored below `id`, so
    /// a branch visited before comes back exactly as it was left. Nothing is
    /// deleted.
    pub fn switch_to_branch(&mut self, id: &str) -> Result<(), RepositoryError> {
        self.tree.select(id)?;
        self.head = self.tree.active_leaf(Some(id));
        debug!(%id, head = ?self.head, "switched branch");

        self.path.dirty();
        Ok(())
    }

    /// Makes `id` the head, discarding everything below it.
    ///
    /// Unlike [`switch_to_branch`](Self::switch_to_branch) this is
    /// destructive: all descendants of `id` are permanently removed, and the
    /// selection at every level from the root down to `id` is overwritten to
    /// point at it. `None` clears the repository.
    #[instrument(skip(self), level = "debug")]
    pub fn reset_head(&mut self, id: Option<&str>) -> Result<(), RepositoryError> {
        let Some(id) = id else {
            self.clear();
            return Ok(());
        };
        if !self.tree.contains(id) {
            return Err(RepositoryError::BranchNotFound(id.to_owned()));
        }

        let pruned = self.tree.prune_descendants(id);
        self.head = Some(id.to_owned());
        self.tree.select_path(id);
        debug!(pruned, "reset head");

        self.path.dirty();
        Ok(())
    }

    /// Removes every message.
    pub fn clear(&mut self) {
        self.tree = TreeStore::new();
        self.head = None;
        self.path.dirty();
    }

    /// Snapshot of every message in insertion order, plus the head id.
    ///
    /// A message moved below one inserted after it is written right after
    /// its new ancestors, so every parent precedes its children and the
    /// snapshot always replays.
    #[instrument(skip(self), level = "debug", fields(messages = self.tree.len()))]
    pub fn export(&self) -> ExportedRepository<M> {
        let mut written: HashSet<&str> = HashSet::with_capacity(self.tree.len());
        let mut messages = Vec::with_capacity(self.tree.len());
        let mut pending = Vec::new();

        for node in self.tree.iter() {
            let mut current = Some(node);
            while let Some(n) = current {
                if written.contains(n.message.id()) {
                    break;
                }
                pending.push(n);
                current = n.parent.as_deref().and_then(|parent| self.tree.get(parent));
            }
            for n in pending.drain(..).rev() {
                written.insert(n.message.id());
                messages.push(ExportedMessage {
                    message: n.message.clone(),
                    parent_id: n.parent.clone(),
                });
            }
        }

        ExportedRepository {
            head_id: self.head.clone(),
            messages,
        }
    }

    /// Replays a snapshot, then resets the head to the snapshot's head.
    ///
    /// Without an explicit head the last entry becomes the head. Because
    /// resetting the head is destructive, entries below the restored head are
    /// dropped: the result is the state that was active at export time.
    ///
    /// On error the repository is restored to its state before the call.
    #[instrument(skip_all, level = "debug", fields(messages = snapshot.messages.len()))]
    pub fn import(&mut self, snapshot: ExportedRepository<M>) -> Result<(), RepositoryError> {
        let checkpoint = (self.tree.clone(), self.head.clone());

        if let Err(err) = self.replay(snapshot) {
            (self.tree, self.head) = checkpoint;
            self.path.dirty();
            return Err(err);
        }
        Ok(())
    }

    fn replay(&mut self, snapshot: ExportedRepository<M>) -> Result<(), RepositoryError> {
        let head_id = snapshot.effective_head_id().map(str::to_owned);
        for ExportedMessage { message, parent_id } in snapshot.messages {
            self.add_or_update_message(parent_id.as_deref(), message)?;
        }
        self.reset_head(head_id.as_deref())
    }
}
