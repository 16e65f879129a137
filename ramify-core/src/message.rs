use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// A value that can be stored in a [`MessageRepository`](crate::MessageRepository).
///
/// The repository only ever looks at the id. It must be unique across the
/// whole repository and stable for the lifetime of the message: updating a
/// message means inserting a new value with the same id.
///
/// Usually derived:
///
/// ```
/// use ramify_core::Message;
///
/// #[derive(Clone, Message)]
/// struct Turn {
///     id: String,
///     text: String,
/// }
///
/// let turn = Turn { id: "m1".into(), text: "hi".into() };
/// assert_eq!(turn.id(), "m1");
/// ```
pub trait Message {
    fn id(&self) -> &str;
}

impl<T: Message + ?Sized> Message for Box<T> {
    fn id(&self) -> &str {
        (**self).id()
    }
}

impl<T: Message + ?Sized> Message for Arc<T> {
    fn id(&self) -> &str {
        (**self).id()
    }
}

/// Lifecycle state handed to message factories.
///
/// Optimistic placeholders are always built with [`MessageStatus::Running`];
/// the other states exist so factories and callers share one vocabulary when
/// the placeholder is later confirmed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MessageStatus {
    #[default]
    Running,
    RequiresAction,
    Complete,
    Incomplete,
}

impl MessageStatus {
    /// Returns true once no further content is expected.
    pub fn is_settled(&self) -> bool {
        matches!(self, MessageStatus::Complete | MessageStatus::Incomplete)
    }
}
