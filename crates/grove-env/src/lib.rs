//! Environment lifecycle on top of the artifact store.
//!
//! An environment is a folder of files under `environments/users/<owner>/`
//! or `environments/groups/<owner>/`. Its build state is derived entirely
//! from which marker files the external builder has uploaded; nothing in
//! this crate advances state on its own.

pub mod builder;
pub mod config;
pub mod environment;
pub mod groups;
pub mod manifest;
pub mod notify;
pub mod response;
pub mod state;
pub mod validate;

/// Root folder of the record store.
pub const ENVIRONMENTS_ROOT: &str = "environments";
/// Subtree of per-user environments.
pub const USERS_DIR: &str = "users";
/// Subtree of per-group environments.
pub const GROUPS_DIR: &str = "groups";

/// Environment manifest: description and requested packages.
pub const MANIFEST_FILE: &str = "grove.yml";
/// Environment metadata: tags, visibility, failure reason, requester.
pub const META_FILE: &str = "meta.yml";
/// Marker written at creation; its presence means a build was requested.
pub const QUEUED_MARKER: &str = ".built_by_grove";
/// Builder output; non-empty content means the build failed.
pub const BUILDER_OUT_FILE: &str = "builder.out";
/// Module file uploaded by the builder on success; presence means ready.
pub const MODULE_FILE: &str = "module";
/// Concretized package lock uploaded by the builder.
pub const LOCK_FILE: &str = "spack.lock";
/// Generated usage instructions.
pub const README_FILE: &str = "README.md";
/// Records the module path an imported environment was generated from.
pub const MODULE_PROVENANCE_FILE: &str = ".generated_from_module";
/// Per-owner suffix counters, one YAML map per owner folder.
pub const SUFFIX_COUNTER_FILE: &str = ".suffixes";

pub use builder::{BuildRequest, BuildStatus, BuilderClient};
pub use config::{BuilderSettings, GroupSettings, Settings, StoreSettings};
pub use environment::{Environment, EnvironmentInput, Environments, Interpreters, UploadOutcome};
pub use groups::{FilteredGroups, GroupLookup};
pub use manifest::{Manifest, Metadata, Package};
pub use notify::{EmailConfig, LogNotifier, Notifier};
pub use response::{
    CreateSuccess, DispatchOutcome, EnvironmentError, HiddenOutcome, ResendSummary, TagOutcome,
};
pub use state::{FailureReason, State};
