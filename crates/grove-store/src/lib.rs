//! Content-addressed artifact store for environment records.
//!
//! Objects (blobs, trees, commits) are immutable files keyed by the
//! sha256 of their canonical encoding; a single branch ref points at the
//! latest commit. Writers stage a new root tree copy-on-write and commit
//! it with a compare-and-swap on the branch head, so concurrent writers
//! fail loudly instead of clobbering each other.

mod error;
mod object;
mod store;

pub use error::{Result, StoreError};
pub use object::{Commit, EntryKind, Oid, Tree, TreeEntry};
pub use store::{ArtifactStore, ChildIter, FileWrite, Node, StagedWrite, StoreConfig};
