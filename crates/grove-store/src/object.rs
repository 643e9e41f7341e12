use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Result, StoreError};

/// Identifier of a stored object: lowercase sha256 hex over the canonical
/// encoding of its payload.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Oid(String);

impl Oid {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse a full hex oid, rejecting anything that is not 64 lowercase
    /// hex digits.
    #[must_use]
    pub fn parse(input: &str) -> Option<Self> {
        let trimmed = input.trim();
        if trimmed.len() == 64
            && trimmed
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
        {
            Some(Self(trimmed.to_string()))
        } else {
            None
        }
    }

    pub(crate) fn of_bytes(bytes: &[u8]) -> Self {
        Self(hex::encode(Sha256::digest(bytes)))
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Oid({})", &self.0[..12.min(self.0.len())])
    }
}

/// Kind of a tree entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Blob,
    Tree,
}

/// A named child of a tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    pub oid: Oid,
    pub kind: EntryKind,
}

/// A folder object: sorted name -> entry map. `BTreeMap` keeps the
/// canonical encoding deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tree {
    pub entries: BTreeMap<String, TreeEntry>,
}

/// A commit object. `parent` is `None` only for the repository's root
/// commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub tree: Oid,
    pub parent: Option<Oid>,
    pub author: String,
    pub email: String,
    pub message: String,
    pub timestamp: i64,
}

/// A store object. Blobs hold raw file bytes; trees and commits reference
/// other objects by oid, forming an immutable persistent structure with
/// structural sharing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Object {
    Blob(Vec<u8>),
    Tree(Tree),
    Commit(Commit),
}

/// Wire form of [`Object`]. Blob bytes are hex encoded so every object is
/// valid JSON; field order is fixed by the struct definitions, which makes
/// the encoding canonical.
#[derive(Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum WireObject {
    Blob {
        data: String,
    },
    Tree {
        entries: BTreeMap<String, TreeEntry>,
    },
    Commit {
        tree: Oid,
        parent: Option<Oid>,
        author: String,
        email: String,
        message: String,
        timestamp: i64,
    },
}

/// Canonical byte encoding of an object; the oid is the sha256 of this.
pub(crate) fn canonical_bytes(object: &Object) -> Result<Vec<u8>> {
    let wire = match object {
        Object::Blob(data) => WireObject::Blob {
            data: hex::encode(data),
        },
        Object::Tree(tree) => WireObject::Tree {
            entries: tree.entries.clone(),
        },
        Object::Commit(commit) => WireObject::Commit {
            tree: commit.tree.clone(),
            parent: commit.parent.clone(),
            author: commit.author.clone(),
            email: commit.email.clone(),
            message: commit.message.clone(),
            timestamp: commit.timestamp,
        },
    };
    Ok(serde_json::to_vec(&wire)?)
}

/// Decode an object read back from disk.
pub(crate) fn decode(oid: &Oid, bytes: &[u8]) -> Result<Object> {
    let wire: WireObject = serde_json::from_slice(bytes)?;
    match wire {
        WireObject::Blob { data } => {
            let data = hex::decode(data).map_err(|err| StoreError::CorruptObject {
                oid: oid.to_string(),
                reason: format!("blob payload is not valid hex: {err}"),
            })?;
            Ok(Object::Blob(data))
        }
        WireObject::Tree { entries } => Ok(Object::Tree(Tree { entries })),
        WireObject::Commit {
            tree,
            parent,
            author,
            email,
            message,
            timestamp,
        } => Ok(Object::Commit(Commit {
            tree,
            parent,
            author,
            email,
            message,
            timestamp,
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oid_parse_accepts_only_full_lowercase_hex() {
        let valid = "a".repeat(64);
        assert!(Oid::parse(&valid).is_some());
        assert!(Oid::parse(&valid[..63]).is_none());
        assert!(Oid::parse(&valid.to_uppercase()).is_none());
        assert!(Oid::parse("not hex").is_none());
    }

    #[test]
    fn canonical_encoding_is_stable_and_roundtrips() -> Result<()> {
        let mut tree = Tree::default();
        let blob = Object::Blob(b"hello".to_vec());
        let blob_oid = Oid::of_bytes(&canonical_bytes(&blob)?);
        tree.entries.insert(
            "hello.txt".to_string(),
            TreeEntry {
                oid: blob_oid.clone(),
                kind: EntryKind::Blob,
            },
        );
        let object = Object::Tree(tree);

        let first = canonical_bytes(&object)?;
        let second = canonical_bytes(&object)?;
        assert_eq!(first, second);

        let oid = Oid::of_bytes(&first);
        assert_eq!(decode(&oid, &first)?, object);

        let decoded_blob = decode(&blob_oid, &canonical_bytes(&blob)?)?;
        assert_eq!(decoded_blob, blob);
        Ok(())
    }

    #[test]
    fn distinct_objects_get_distinct_oids() -> Result<()> {
        let a = Oid::of_bytes(&canonical_bytes(&Object::Blob(b"a".to_vec()))?);
        let b = Oid::of_bytes(&canonical_bytes(&Object::Blob(b"b".to_vec()))?);
        assert_ne!(a, b);
        Ok(())
    }
}
