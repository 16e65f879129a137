use thiserror::Error;

/// Error type for repository operations.
///
/// `ParentNotFound`, `MessageNotFound`, `BranchNotFound`,
/// `ReplacementNotFound`, `OptimisticIdExhausted` and `FactoryIdMismatch`
/// report a bad argument or a stale reference. `DuplicateAncestor` and
/// `FallbackSiblingMissing` mean an id was reused across unrelated branches
/// or the tree bookkeeping drifted.
///
/// Every check runs before the tree is touched, so an `Err` always leaves the
/// repository exactly as it was before the call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    #[error("parent message not found: {0}")]
    ParentNotFound(String),

    #[error("message not found: {0}")]
    MessageNotFound(String),

    #[error("branch not found: {0}")]
    BranchNotFound(String),

    #[error("replacement message not found: {0}")]
    ReplacementNotFound(String),

    #[error("message {0} already exists in the parent chain")]
    DuplicateAncestor(String),

    #[error("fallback sibling {sibling} for {parent} is missing from the repository")]
    FallbackSiblingMissing { parent: String, sibling: String },

    #[error("no free optimistic id after {0} attempts")]
    OptimisticIdExhausted(usize),

    #[error("placeholder factory returned id {returned}, expected {allocated}")]
    FactoryIdMismatch { allocated: String, returned: String },
}

/// Error type for snapshot encoding.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("failed to encode snapshot: {0}")]
    Encode(#[from] ciborium::ser::Error<std::io::Error>),

    #[error("failed to decode snapshot: {0}")]
    Decode(#[from] ciborium::de::Error<std::io::Error>),
}

/// Error type for loading a [`RepositoryConfig`](crate::RepositoryConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Invalid(&'static str),
}
