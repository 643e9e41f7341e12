//! Process configuration. A [`Settings`] value is loaded once at startup
//! and handed to constructors; nothing reads configuration globally.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;
use url::Url;

use crate::notify::EmailConfig;

fn default_branch() -> String {
    "main".to_string()
}

fn default_author() -> String {
    "grove".to_string()
}

fn default_author_email() -> String {
    "grove@localhost".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreSettings {
    /// Local store directory.
    pub path: PathBuf,
    /// Optional remote store to clone from and push to.
    #[serde(default)]
    pub remote: Option<PathBuf>,
    #[serde(default = "default_branch")]
    pub branch: String,
    #[serde(default = "default_author")]
    pub author: String,
    #[serde(default = "default_author_email")]
    pub email: String,
}

impl StoreSettings {
    #[must_use]
    pub fn to_store_config(&self) -> grove_store::StoreConfig {
        grove_store::StoreConfig {
            path: self.path.clone(),
            remote: self.remote.clone(),
            branch: self.branch.clone(),
            author: self.author.clone(),
            email: self.email.clone(),
        }
    }
}

fn default_builder_timeout() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize)]
pub struct BuilderSettings {
    /// Base URL of the builder service.
    pub url: Url,
    #[serde(default = "default_builder_timeout")]
    pub timeout_secs: u64,
}

fn default_group_pattern() -> String {
    ".*".to_string()
}

fn default_group_retries() -> u32 {
    3
}

fn default_group_backoff() -> u64 {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct GroupSettings {
    /// Only group names matching this pattern are reported.
    #[serde(default = "default_group_pattern")]
    pub pattern: String,
    #[serde(default = "default_group_retries")]
    pub retries: u32,
    #[serde(default = "default_group_backoff")]
    pub backoff_secs: u64,
}

impl Default for GroupSettings {
    fn default() -> Self {
        Self {
            pattern: default_group_pattern(),
            retries: default_group_retries(),
            backoff_secs: default_group_backoff(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub store: StoreSettings,
    /// Absent means builds are never dispatched (useful for read-only
    /// deployments and tests).
    #[serde(default)]
    pub builder: Option<BuilderSettings>,
    #[serde(default)]
    pub groups: GroupSettings,
    #[serde(default)]
    pub email: EmailConfig,
    #[serde(default)]
    pub catalog: grove_catalog::CatalogConfig,
}

impl Settings {
    pub fn from_yaml_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading settings from {}", path.display()))?;
        serde_yaml::from_str(&raw)
            .with_context(|| format!("parsing settings from {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn minimal_settings_fill_defaults() {
        let yaml = "store:\n  path: /var/lib/grove/store\n";
        let settings: Settings = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(settings.store.branch, "main");
        assert!(settings.builder.is_none());
        assert_eq!(settings.groups.retries, 3);
        assert!(settings.email.smtp.is_none());
    }

    #[test]
    fn full_settings_parse() {
        let yaml = "\
store:
  path: /srv/grove
  remote: /srv/grove-remote
  branch: prod
builder:
  url: http://builder.internal:7080/
  timeout_secs: 10
groups:
  pattern: '^team-'
email:
  smtp: smtp.internal
  from_addr: grove@internal
  to_addr: '{}@internal'
catalog:
  command: /opt/spack/bin/spack
";
        let settings: Settings = serde_yaml::from_str(yaml).unwrap();
        let builder = settings.builder.unwrap();
        assert_eq!(builder.url.as_str(), "http://builder.internal:7080/");
        assert_eq!(builder.timeout_secs, 10);
        assert_eq!(settings.groups.pattern, "^team-");
        assert_eq!(settings.catalog.command, "/opt/spack/bin/spack");
    }

    #[test]
    fn from_yaml_file_reports_the_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "store: [not a map]").unwrap();
        let err = Settings::from_yaml_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("parsing settings"));
    }
}
