/// Typed failures of the artifact store. Callers match on these to drive
/// their own result variants; none of them should abort the process.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("repository unavailable: {0}")]
    RepositoryUnavailable(String),

    #[error("'{0}' not found in the repository")]
    NotFound(String),

    /// Optimistic-concurrency loss: the branch moved, or the staged tree
    /// touches paths beyond what the call was about to introduce. The
    /// caller must re-read the head and retry.
    #[error("too many changes to the repo")]
    ConcurrentModification,

    #[error("no changes made to the environment")]
    NoChanges,

    #[error("file already exists")]
    FileExists,

    #[error("nothing to commit")]
    NothingToCommit,

    #[error("push rejected: remote branch is not an ancestor of the local branch")]
    PushRejected,

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("corrupt object {oid}: {reason}")]
    CorruptObject { oid: String, reason: String },

    #[error("object {0} is not of the expected kind")]
    WrongKind(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("object encoding: {0}")]
    Encoding(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;
