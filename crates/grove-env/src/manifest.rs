//! Manifest and metadata files stored inside an environment folder.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A requested package, `name` or `name@version` in the manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    pub name: String,
    pub version: Option<String>,
}

impl Package {
    /// Parse a manifest package string. Everything after the first `@` is
    /// the version; an empty version is treated as absent.
    #[must_use]
    pub fn parse(spec: &str) -> Self {
        match spec.split_once('@') {
            Some((name, version)) if !version.is_empty() => Self {
                name: name.to_string(),
                version: Some(version.to_string()),
            },
            Some((name, _)) => Self {
                name: name.to_string(),
                version: None,
            },
            None => Self {
                name: spec.to_string(),
                version: None,
            },
        }
    }
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{}@{version}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// The manifest file: a description and the requested package list.
/// Packages are serialized as plain `name@version` strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawManifest", into = "RawManifest")]
pub struct Manifest {
    pub description: String,
    pub packages: Vec<Package>,
}

#[derive(Serialize, Deserialize)]
struct RawManifest {
    description: String,
    packages: Vec<String>,
}

impl From<RawManifest> for Manifest {
    fn from(raw: RawManifest) -> Self {
        Self {
            description: raw.description,
            packages: raw.packages.iter().map(|s| Package::parse(s)).collect(),
        }
    }
}

impl From<Manifest> for RawManifest {
    fn from(manifest: Manifest) -> Self {
        Self {
            description: manifest.description,
            packages: manifest
                .packages
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }
}

impl Manifest {
    pub fn from_yaml(bytes: &[u8]) -> serde_yaml::Result<Self> {
        serde_yaml::from_slice(bytes)
    }

    pub fn to_yaml(&self) -> serde_yaml::Result<String> {
        serde_yaml::to_string(self)
    }
}

/// The metadata file. All fields are optional on disk so older
/// environments with partial metadata still load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// Sorted and unique.
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub force_hidden: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<crate::state::FailureReason>,
    /// Requesting user, kept until they have been notified of the build
    /// outcome.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl Metadata {
    pub fn from_yaml(bytes: &[u8]) -> serde_yaml::Result<Self> {
        serde_yaml::from_slice(bytes)
    }

    pub fn to_yaml(&self) -> serde_yaml::Result<String> {
        serde_yaml::to_string(self)
    }

    /// Insert a tag keeping the list sorted and unique. Returns false
    /// when the tag was already present.
    pub fn add_tag(&mut self, tag: &str) -> bool {
        match self.tags.binary_search_by(|t| t.as_str().cmp(tag)) {
            Ok(_) => false,
            Err(pos) => {
                self.tags.insert(pos, tag.to_string());
                true
            }
        }
    }

    /// Normalize tags read from disk: sort and drop duplicates.
    pub fn normalize_tags(&mut self) {
        self.tags.sort();
        self.tags.dedup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn package_strings_roundtrip() {
        let p = Package::parse("python@3.11.3");
        assert_eq!(p.name, "python");
        assert_eq!(p.version.as_deref(), Some("3.11.3"));
        assert_eq!(p.to_string(), "python@3.11.3");

        let bare = Package::parse("zlib");
        assert_eq!(bare.version, None);
        assert_eq!(bare.to_string(), "zlib");

        // trailing @ means no version
        assert_eq!(Package::parse("zlib@").version, None);
    }

    #[test]
    fn manifest_yaml_roundtrip() {
        let manifest = Manifest {
            description: "an environment".to_string(),
            packages: vec![Package::parse("python@3.11"), Package::parse("zlib")],
        };
        let yaml = manifest.to_yaml().unwrap();
        assert!(yaml.contains("- python@3.11"));
        let back = Manifest::from_yaml(yaml.as_bytes()).unwrap();
        assert_eq!(back, manifest);
    }

    #[test]
    fn metadata_defaults_for_missing_fields() {
        let meta = Metadata::from_yaml(b"tags:\n  - chemistry\n").unwrap();
        assert_eq!(meta.tags, vec!["chemistry"]);
        assert!(!meta.force_hidden);
        assert_eq!(meta.username, None);

        let empty = Metadata::from_yaml(b"{}").unwrap();
        assert!(empty.tags.is_empty());
    }

    #[test]
    fn add_tag_is_idempotent_and_sorted() {
        let mut meta = Metadata::default();
        assert!(meta.add_tag("zeta"));
        assert!(meta.add_tag("alpha"));
        assert!(!meta.add_tag("zeta"));
        assert_eq!(meta.tags, vec!["alpha", "zeta"]);
    }
}
