//! Operation outcomes, one named variant per result the façade layer can
//! see. Errors are values; nothing here panics or aborts a request.

use grove_store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum EnvironmentError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("no environment '{name}' found in '{path}'")]
    NotFound { path: String, name: String },

    #[error("'{name}' already exists in '{path}'")]
    AlreadyExists { path: String, name: String },

    /// Builder unreachable or non-2xx. Local repository state is always
    /// left committed when this is returned.
    #[error("builder: {0}")]
    Builder(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("malformed environment file: {0}")]
    Malformed(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, EnvironmentError>;

/// Whether the build request reached the builder. Dispatch failure never
/// rolls back the local commit; the environment stays queued and can be
/// resent later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Sent,
    Failed(String),
}

impl DispatchOutcome {
    #[must_use]
    pub fn is_sent(&self) -> bool {
        matches!(self, Self::Sent)
    }
}

/// Successful creation: the suffixed name actually allocated plus the
/// dispatch outcome.
#[derive(Debug, Clone)]
pub struct CreateSuccess {
    /// Owner path, `users/<owner>` or `groups/<owner>`.
    pub path: String,
    /// Allocated folder name including the `-N` suffix.
    pub name: String,
    pub dispatch: DispatchOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagOutcome {
    Added,
    /// The tag was already on the environment; no commit was made.
    AlreadyPresent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HiddenOutcome {
    Changed,
    /// The flag already had the requested value; no commit was made.
    AlreadySet,
}

/// Tally of a pending-build resend sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResendSummary {
    pub successes: usize,
    pub failures: usize,
}
