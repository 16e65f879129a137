use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::SnapshotError;
use crate::message::Message;

/// One message together with the id of its parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedMessage<M> {
    pub message: M,
    /// Parent id, `None` for root-level messages.
    pub parent_id: Option<String>,
}

/// Replayable snapshot of a whole repository.
///
/// Messages are ordered so that every parent precedes its children, which is
/// what [`MessageRepository::import`](crate::MessageRepository::import)
/// relies on. Reordering entries makes the import fail with
/// `ParentNotFound`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedRepository<M> {
    pub head_id: Option<String>,
    pub messages: Vec<ExportedMessage<M>>,
}

impl<M> Default for ExportedRepository<M> {
    fn default() -> Self {
        ExportedRepository {
            head_id: None,
            messages: Vec::new(),
        }
    }
}

impl<M: Message> ExportedRepository<M> {
    /// Builds a snapshot of a single linear conversation.
    ///
    /// Each message becomes the child of the one before it; the head is left
    /// unset so an import ends on the last message.
    pub fn from_linear(messages: impl IntoIterator<Item = M>) -> Self {
        let mut previous: Option<String> = None;
        let messages = messages
            .into_iter()
            .map(|message| {
                let parent_id = previous.replace(message.id().to_owned());
                ExportedMessage { message, parent_id }
            })
            .collect();

        ExportedRepository {
            head_id: None,
            messages,
        }
    }

    /// The id an import will reset the head to.
    pub fn effective_head_id(&self) -> Option<&str> {
        self.head_id
            .as_deref()
            .or_else(|| self.messages.last().map(|entry| entry.message.id()))
    }
}

impl<M: Serialize> ExportedRepository<M> {
    /// Encodes the snapshot as CBOR.
    pub fn to_bytes(&self) -> Result<Vec<u8>, SnapshotError> {
        let mut bytes = Vec::new();
        ciborium::into_writer(self, &mut bytes)?;
        Ok(bytes)
    }
}

impl<M: DeserializeOwned> ExportedRepository<M> {
    /// Decodes a snapshot produced by [`ExportedRepository::to_bytes`].
    pub fn from_bytes(data: &[u8]) -> Result<Self, SnapshotError> {
        Ok(ciborium::from_reader(data)?)
    }
}
