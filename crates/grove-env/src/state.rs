//! Build lifecycle state, derived from marker files.

use serde::{Deserialize, Serialize};

/// Banner the package manager prints when dependency resolution fails.
/// Its presence in the builder output distinguishes a version conflict
/// from a generic build failure.
pub const CONCRETIZATION_BANNER: &str = "concretization failed for the following reasons:";

/// Lifecycle state of an environment. `Ready` and `Failed` are terminal;
/// transitions only happen when the builder uploads files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum State {
    /// Build requested, no output from the builder yet.
    Queued,
    /// Builder produced output without a loadable module.
    Failed,
    /// Builder uploaded the module file; supersedes `Failed`.
    Ready,
}

/// Why a build failed, recorded in the metadata file for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureReason {
    /// Dependency resolution could not find a consistent version set.
    Concretization,
    /// The packages resolved but compiling or installing them failed.
    Build,
}

/// Classify builder output into a failure reason.
#[must_use]
pub fn classify_failure(builder_out: &[u8]) -> FailureReason {
    if String::from_utf8_lossy(builder_out).contains(CONCRETIZATION_BANNER) {
        FailureReason::Concretization
    } else {
        FailureReason::Build
    }
}

/// Derive state from which marker files exist in the environment folder.
#[must_use]
pub fn derive(has_module: bool, builder_out: Option<&[u8]>) -> State {
    if has_module {
        return State::Ready;
    }
    match builder_out {
        Some(out) if !out.is_empty() => State::Failed,
        _ => State::Queued,
    }
}
