//! Ramify stores a conversation as a tree of messages.
//!
//! Editing or regenerating a message creates a sibling branch instead of
//! overwriting history. The repository keeps every branch, remembers which
//! branch is selected at each level, and exposes the active path from the
//! root to the current head.
//!
//! Core concepts:
//! - **Message**: any value with a unique, stable id; content is opaque
//! - **Branches**: siblings sharing a parent, each an alternative continuation
//! - **Head**: the tip of the conversation currently shown
//! - **Active path**: the messages from the root down to the head
//! - **Snapshot**: an ordered, replayable export of the whole tree
//!
//! Two navigation operations differ in how much they change:
//! [`MessageRepository::switch_to_branch`] only changes the selection at one
//! level and never deletes anything, while [`MessageRepository::reset_head`]
//! prunes everything below the new head and rewrites the selection at every
//! level above it.
//!
//! # Example
//!
//! ```
//! use ramify_core::{Message, MessageRepository, Replacement};
//!
//! #[derive(Debug, Clone, PartialEq, Message)]
//! struct Turn {
//!     id: String,
//!     text: String,
//! }
//!
//! let turn = |id: &str, text: &str| Turn { id: id.into(), text: text.into() };
//!
//! let mut repo = MessageRepository::new();
//! repo.add_or_update_message(None, turn("q", "question")).unwrap();
//! repo.add_or_update_message(Some("q"), turn("a1", "first answer")).unwrap();
//! repo.add_or_update_message(Some("q"), turn("a2", "second answer")).unwrap();
//! assert_eq!(repo.get_branches("a1").unwrap(), ["a1", "a2"]);
//!
//! // the head was "a1"; deleting it falls back to the remaining sibling
//! repo.delete_message("a1", Replacement::Parent).unwrap();
//! assert_eq!(repo.head_id(), Some("a2"));
//!
//! let snapshot = repo.export();
//! let mut restored = MessageRepository::new();
//! restored.import(snapshot).unwrap();
//! assert_eq!(restored.get_messages(), repo.get_messages());
//! ```

extern crate self as ramify_core;

mod config;
mod error;
mod message;
mod optimistic;
mod path;
mod repository;
mod snapshot;
mod tree;

pub use config::RepositoryConfig;
pub use error::{ConfigError, RepositoryError, SnapshotError};
pub use message::{Message, MessageStatus};
pub use optimistic::{IdGenerator, OPTIMISTIC_PREFIX, RandomIdGenerator, is_optimistic_id};
pub use repository::{MessageEntry, MessageRepository, Replacement};
pub use snapshot::{ExportedMessage, ExportedRepository};

#[cfg(feature = "derive")]
pub use ramify_derive::{Message, message};
