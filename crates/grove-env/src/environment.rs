//! The environment aggregate: validated CRUD over the artifact store,
//! suffix allocation, state derivation and builder dispatch.

use std::collections::BTreeMap;
use std::sync::Arc;

use grove_store::{ArtifactStore, EntryKind, FileWrite, Node, StoreError};
use tracing::{info, warn};

use crate::builder::{BuildRequest, BuilderClient};
use crate::manifest::{Manifest, Metadata, Package};
use crate::notify::{build_outcome_message, EmailConfig, Notifier};
use crate::response::{
    CreateSuccess, DispatchOutcome, EnvironmentError, HiddenOutcome, ResendSummary, Result,
    TagOutcome,
};
use crate::state::{self, State};
use crate::{
    validate, BUILDER_OUT_FILE, ENVIRONMENTS_ROOT, GROUPS_DIR, LOCK_FILE, MANIFEST_FILE,
    META_FILE, MODULE_FILE, MODULE_PROVENANCE_FILE, QUEUED_MARKER, README_FILE,
    SUFFIX_COUNTER_FILE, USERS_DIR,
};

/// Commit attempts before giving up on an optimistic-concurrency loss.
const COMMIT_RETRIES: u32 = 3;

/// Interpreter versions extracted from the concretized lock file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Interpreters {
    pub python: Option<String>,
    pub r: Option<String>,
}

/// A fully loaded environment.
#[derive(Debug, Clone)]
pub struct Environment {
    /// Object id of the environment folder tree.
    pub id: String,
    /// Folder name including the `-N` suffix.
    pub name: String,
    /// Owner path, `users/<owner>` or `groups/<owner>`.
    pub path: String,
    pub description: String,
    pub packages: Vec<Package>,
    pub state: State,
    pub tags: Vec<String>,
    pub hidden: bool,
    pub username: Option<String>,
    pub failure_reason: Option<crate::state::FailureReason>,
    pub interpreters: Interpreters,
}

/// Request to create or update an environment.
#[derive(Debug, Clone)]
pub struct EnvironmentInput {
    /// Base name; the store assigns the `-N` suffix on creation.
    pub name: String,
    /// Owner path.
    pub path: String,
    pub description: String,
    pub packages: Vec<Package>,
    pub tags: Vec<String>,
    /// Requester to notify when the build finishes.
    pub username: Option<String>,
}

/// Result of applying a builder upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    pub state: State,
    /// Whether the requesting user was notified of a terminal state.
    pub notified: bool,
}

/// Environment operations over injected collaborators. The store owns
/// the repository; this type only supplies path/bytes/message triples.
pub struct Environments {
    store: Arc<ArtifactStore>,
    builder: Option<BuilderClient>,
    notifier: Box<dyn Notifier>,
    email: EmailConfig,
}

impl Environments {
    #[must_use]
    pub fn new(
        store: Arc<ArtifactStore>,
        builder: Option<BuilderClient>,
        notifier: Box<dyn Notifier>,
        email: EmailConfig,
    ) -> Self {
        Self {
            store,
            builder,
            notifier,
            email,
        }
    }

    /// Create an environment: allocate the next suffix, write manifest,
    /// metadata and the queued marker in one commit, push, then dispatch
    /// the build. Dispatch failure is reported in the outcome, never by
    /// failing the call; the environment stays queued.
    pub fn create(&self, input: &EnvironmentInput) -> Result<CreateSuccess> {
        validate_input(input)?;
        let owner_folder = owner_folder(&input.path);

        let manifest = Manifest {
            description: input.description.clone(),
            packages: input.packages.clone(),
        };
        let mut meta = Metadata {
            username: input.username.clone(),
            ..Metadata::default()
        };
        for tag in &input.tags {
            meta.add_tag(tag.trim());
        }
        let manifest_yaml = manifest.to_yaml()?;
        let meta_yaml = meta.to_yaml()?;

        let (full_name, suffix) = self.with_retry(|| {
            let suffix = self.next_suffix(&owner_folder, &input.name)?;
            let full_name = format!("{}-{suffix}", input.name);
            let folder = format!("{owner_folder}/{full_name}");
            if self.store.find(&folder)?.is_some() {
                return Err(EnvironmentError::AlreadyExists {
                    path: input.path.clone(),
                    name: full_name,
                });
            }

            let mut counters = self.read_suffix_counters(&owner_folder)?;
            counters.insert(input.name.clone(), suffix);
            let counters_yaml =
                serde_yaml::to_string(&counters).map_err(EnvironmentError::Malformed)?;

            let staged = self.store.stage_files(&[
                new_file(&folder, MANIFEST_FILE, manifest_yaml.as_bytes()),
                new_file(&folder, META_FILE, meta_yaml.as_bytes()),
                new_file(&folder, QUEUED_MARKER, b""),
                FileWrite {
                    folder: owner_folder.clone(),
                    name: SUFFIX_COUNTER_FILE.to_string(),
                    content: counters_yaml.into_bytes(),
                    expect_new_folder: false,
                    allow_overwrite: true,
                },
            ])?;
            self.store
                .commit(&staged, &format!("create environment {}/{full_name}", input.path))?;
            Ok((full_name, suffix))
        })?;
        self.push_after_commit();
        info!(path = %input.path, name = %full_name, "environment created");

        let dispatch = self.dispatch(&input.path, &full_name, suffix, &manifest);
        Ok(CreateSuccess {
            path: input.path.clone(),
            name: full_name,
            dispatch,
        })
    }

    /// Rewrite an existing environment's manifest and dispatch a rebuild.
    /// `current_name` is the full suffixed folder name; renames and moves
    /// are not supported.
    pub fn update(
        &self,
        input: &EnvironmentInput,
        current_path: &str,
        current_name: &str,
    ) -> Result<DispatchOutcome> {
        validate_input(input)?;
        if current_path.is_empty() || current_name.is_empty() {
            return Err(EnvironmentError::InvalidInput(
                "all fields must be filled in".to_string(),
            ));
        }
        if input.path != current_path || input.name != current_name {
            return Err(EnvironmentError::InvalidInput(
                "change of name or path not currently supported".to_string(),
            ));
        }
        if self.get(current_path, current_name)?.is_none() {
            return Err(EnvironmentError::NotFound {
                path: current_path.to_string(),
                name: current_name.to_string(),
            });
        }

        let manifest = Manifest {
            description: input.description.clone(),
            packages: input.packages.clone(),
        };
        let manifest_yaml = manifest.to_yaml()?;
        let folder = format!("{}/{current_name}", owner_folder(current_path));
        let committed = self.with_retry(|| {
            match self
                .store
                .create_file(&folder, MANIFEST_FILE, manifest_yaml.as_bytes(), false, true)
            {
                Ok(staged) => {
                    self.store
                        .commit(&staged, &format!("update environment {current_path}/{current_name}"))?;
                    Ok(true)
                }
                // identical manifest: nothing to commit, still rebuild
                Err(StoreError::NoChanges) => Ok(false),
                Err(err) => Err(err.into()),
            }
        })?;
        if committed {
            self.push_after_commit();
        }

        let suffix = name_suffix(current_name).unwrap_or(1);
        Ok(self.dispatch(current_path, current_name, suffix, &manifest))
    }

    /// Remove an environment folder. The suffix counter is deliberately
    /// left behind so the freed suffix is never reallocated.
    pub fn delete(&self, name: &str, path: &str) -> Result<()> {
        if self.get(path, name)?.is_none() {
            return Err(EnvironmentError::NotFound {
                path: path.to_string(),
                name: name.to_string(),
            });
        }
        self.with_retry(|| {
            let staged = self.store.delete_environment(name, &owner_folder(path))?;
            self.store
                .commit(&staged, &format!("delete environment {path}/{name}"))?;
            Ok(())
        })?;
        self.push_after_commit();
        info!(path, name, "environment deleted");
        Ok(())
    }

    /// Add a tag. Adding a tag that is already present is reported
    /// distinctly and performs no commit.
    pub fn add_tag(&self, name: &str, path: &str, tag: &str) -> Result<TagOutcome> {
        validate::tag(tag).map_err(EnvironmentError::InvalidInput)?;
        let tag = tag.trim();
        self.with_retry(|| {
            let mut meta = self.require_metadata(path, name)?;
            if !meta.add_tag(tag) {
                return Ok(TagOutcome::AlreadyPresent);
            }
            self.write_metadata(path, name, &meta, &format!("add tag {tag}"))?;
            Ok(TagOutcome::Added)
        })
    }

    /// Set or clear the hidden flag. A no-op change is reported
    /// distinctly and performs no commit.
    pub fn set_hidden(&self, name: &str, path: &str, hidden: bool) -> Result<HiddenOutcome> {
        self.with_retry(|| {
            let mut meta = self.require_metadata(path, name)?;
            if meta.force_hidden == hidden {
                return Ok(HiddenOutcome::AlreadySet);
            }
            meta.force_hidden = hidden;
            self.write_metadata(path, name, &meta, "set visibility")?;
            Ok(HiddenOutcome::Changed)
        })
    }

    /// Load one environment; `None` when the folder or its manifest is
    /// absent. Hidden environments are visible here, only `iter` filters
    /// them.
    pub fn get(&self, path: &str, name: &str) -> Result<Option<Environment>> {
        let folder = format!("{}/{name}", owner_folder(path));
        let Some(node) = self.store.find(&folder)? else {
            return Ok(None);
        };
        self.load(path, &node)
    }

    /// All visible environments, across every owner.
    pub fn iter(&self) -> Result<Vec<Environment>> {
        let mut all = self.iter_all()?;
        all.retain(|env| !env.hidden);
        Ok(all)
    }

    /// Environments visible to one user: their own plus their groups'.
    pub fn iter_visible_to(&self, username: &str, groups: &[String]) -> Result<Vec<Environment>> {
        let mut owned = Vec::new();
        let mut owners = vec![format!("{USERS_DIR}/{username}")];
        owners.extend(groups.iter().map(|g| format!("{GROUPS_DIR}/{g}")));
        for owner in owners {
            for env in self.iter_owner(&owner)? {
                if !env.hidden {
                    owned.push(env);
                }
            }
        }
        Ok(owned)
    }

    /// Every environment including hidden ones. Used by recovery sweeps.
    pub fn iter_all(&self) -> Result<Vec<Environment>> {
        let mut all = Vec::new();
        for kind in [USERS_DIR, GROUPS_DIR] {
            let root = format!("{ENVIRONMENTS_ROOT}/{kind}");
            for owner in self.store.iterate(&root)? {
                if owner.kind != EntryKind::Tree {
                    continue;
                }
                all.extend(self.iter_owner(&format!("{kind}/{}", owner.name))?);
            }
        }
        Ok(all)
    }

    /// Import an shpc-style module file as a ready environment. The
    /// translation result becomes the manifest; the module file itself is
    /// stored as the ready marker, together with a generated README and a
    /// provenance record of `module_path`.
    pub fn from_module(
        &self,
        module_file: &[u8],
        module_path: &str,
        environment_path: &str,
    ) -> Result<String> {
        let (path, base_name) = split_environment_path(environment_path)?;
        validate::name(&base_name).map_err(EnvironmentError::InvalidInput)?;
        validate::owner_path(&path).map_err(EnvironmentError::InvalidInput)?;

        let manifest_bytes = grove_module::module_to_manifest(&base_name, module_file);
        let readme = grove_module::generate_readme(module_path);
        let owner_folder = owner_folder(&path);

        let full_name = self.with_retry(|| {
            let suffix = self.next_suffix(&owner_folder, &base_name)?;
            let full_name = format!("{base_name}-{suffix}");
            let folder = format!("{owner_folder}/{full_name}");

            let mut counters = self.read_suffix_counters(&owner_folder)?;
            counters.insert(base_name.clone(), suffix);
            let counters_yaml =
                serde_yaml::to_string(&counters).map_err(EnvironmentError::Malformed)?;

            let staged = self.store.stage_files(&[
                new_file(&folder, MANIFEST_FILE, &manifest_bytes),
                new_file(&folder, META_FILE, Metadata::default().to_yaml()?.as_bytes()),
                new_file(&folder, MODULE_FILE, module_file),
                new_file(&folder, README_FILE, &readme),
                new_file(&folder, MODULE_PROVENANCE_FILE, module_path.as_bytes()),
                FileWrite {
                    folder: owner_folder.clone(),
                    name: SUFFIX_COUNTER_FILE.to_string(),
                    content: counters_yaml.into_bytes(),
                    expect_new_folder: false,
                    allow_overwrite: true,
                },
            ])?;
            self.store
                .commit(&staged, &format!("import module {module_path} as {path}/{full_name}"))?;
            Ok(full_name)
        })?;
        self.push_after_commit();
        info!(module_path, path = %path, name = %full_name, "module imported");
        Ok(full_name)
    }

    /// Re-import a module over an existing imported environment.
    /// `environment_path` names the suffixed folder.
    pub fn update_from_module(
        &self,
        module_file: &[u8],
        module_path: &str,
        environment_path: &str,
    ) -> Result<()> {
        let (path, name) = split_environment_path(environment_path)?;
        if self.get(&path, &name)?.is_none() {
            return Err(EnvironmentError::NotFound { path, name });
        }

        let base_name = match name_suffix(&name) {
            Some(_) => name
                .rsplit_once('-')
                .map_or_else(|| name.clone(), |(base, _)| base.to_string()),
            None => name.clone(),
        };
        let manifest_bytes = grove_module::module_to_manifest(&base_name, module_file);
        let readme = grove_module::generate_readme(module_path);
        let folder = format!("{}/{name}", owner_folder(&path));

        self.with_retry(|| {
            let writes = [
                overwrite_file(&folder, MANIFEST_FILE, &manifest_bytes),
                overwrite_file(&folder, MODULE_FILE, module_file),
                overwrite_file(&folder, README_FILE, &readme),
                overwrite_file(&folder, MODULE_PROVENANCE_FILE, module_path.as_bytes()),
            ];
            match self.store.stage_files(&writes) {
                Ok(staged) => {
                    self.store
                        .commit(&staged, &format!("update module import {path}/{name}"))?;
                    Ok(())
                }
                Err(StoreError::NoChanges) => Ok(()),
                Err(err) => Err(err.into()),
            }
        })?;
        self.push_after_commit();
        Ok(())
    }

    /// Apply a builder upload to an environment: classify the outcome,
    /// notify the requesting user on a terminal state, then write the
    /// uploaded files and any metadata changes in one commit.
    pub fn apply_build_results(
        &self,
        environment_path: &str,
        files: &[(String, Vec<u8>)],
    ) -> Result<UploadOutcome> {
        let (path, name) = split_environment_path(environment_path)?;
        let Some(env) = self.get(&path, &name)? else {
            return Err(EnvironmentError::NotFound { path, name });
        };

        let mut new_state = State::Queued;
        let mut failure_reason = None;
        for (file_name, content) in files {
            if file_name == BUILDER_OUT_FILE && !content.is_empty() {
                new_state = State::Failed;
                failure_reason = Some(state::classify_failure(content));
            }
            if file_name == MODULE_FILE {
                new_state = State::Ready;
                break;
            }
        }

        let mut notified = false;
        if new_state != State::Queued {
            if let Some(username) = env.username.as_deref().filter(|u| !u.is_empty()) {
                let (subject, message) =
                    build_outcome_message(username, environment_path, new_state, failure_reason);
                self.notifier.send(
                    &self.email,
                    &message,
                    &subject,
                    username,
                    new_state != State::Ready,
                );
                notified = true;
            }
        }

        let folder = format!("{}/{name}", owner_folder(&path));
        self.with_retry(|| {
            // metadata is re-read on every attempt; a retried commit must
            // not reapply a snapshot from before a concurrent writer
            let mut meta = self.require_metadata(&path, &name)?;
            let mut meta_changed = false;
            if let Some(reason) = failure_reason {
                if meta.failure_reason != Some(reason) {
                    meta.failure_reason = Some(reason);
                    meta_changed = true;
                }
            }
            if notified && meta.username.is_some() {
                meta.username = None;
                meta_changed = true;
            }
            let mut writes: Vec<FileWrite> = files
                .iter()
                .map(|(file_name, content)| overwrite_file(&folder, file_name, content))
                .collect();
            if meta_changed {
                writes.push(overwrite_file(&folder, META_FILE, meta.to_yaml()?.as_bytes()));
            }
            match self.store.stage_files(&writes) {
                Ok(staged) => {
                    self.store
                        .commit(&staged, &format!("build results for {path}/{name}"))?;
                    Ok(())
                }
                Err(StoreError::NoChanges) => Ok(()),
                Err(err) => Err(err.into()),
            }
        })?;
        self.push_after_commit();

        Ok(UploadOutcome {
            state: new_state,
            notified,
        })
    }

    /// Re-dispatch every environment still queued. Dispatch failures are
    /// tallied, not propagated, so one dead builder route cannot abort
    /// the sweep.
    pub fn resend_pending_builds(&self) -> Result<ResendSummary> {
        let mut summary = ResendSummary::default();
        for env in self.iter_all()? {
            if env.state != State::Queued {
                continue;
            }
            let suffix = name_suffix(&env.name).unwrap_or(1);
            let manifest = Manifest {
                description: env.description.clone(),
                packages: env.packages.clone(),
            };
            match self.dispatch(&env.path, &env.name, suffix, &manifest) {
                DispatchOutcome::Sent => summary.successes += 1,
                DispatchOutcome::Failed(reason) => {
                    warn!(path = %env.path, name = %env.name, reason, "resend failed");
                    summary.failures += 1;
                }
            }
        }
        Ok(summary)
    }

    // ---- internals ----

    fn dispatch(
        &self,
        path: &str,
        full_name: &str,
        suffix: u32,
        manifest: &Manifest,
    ) -> DispatchOutcome {
        let Some(builder) = &self.builder else {
            return DispatchOutcome::Failed("no builder configured".to_string());
        };
        let request = BuildRequest {
            name: format!("{path}/{full_name}"),
            version: suffix.to_string(),
            description: manifest.description.clone(),
            packages: manifest.packages.clone(),
        };
        match builder.dispatch(&request) {
            Ok(()) => DispatchOutcome::Sent,
            Err(err) => {
                warn!(name = %request.name, error = %err, "builder dispatch failed");
                DispatchOutcome::Failed(err.to_string())
            }
        }
    }

    /// Push after a successful local commit. The commit is already
    /// durable, so a push failure is logged and left for a later push to
    /// carry rather than failing the operation.
    fn push_after_commit(&self) {
        if let Err(err) = self.store.push() {
            warn!(error = %err, "push failed after local commit");
        }
    }

    fn with_retry<T>(&self, mut op: impl FnMut() -> Result<T>) -> Result<T> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op() {
                Err(EnvironmentError::Store(StoreError::ConcurrentModification))
                    if attempt < COMMIT_RETRIES =>
                {
                    warn!(attempt, "commit lost an optimistic-concurrency race; retrying");
                }
                other => return other,
            }
        }
    }

    fn iter_owner(&self, owner_path: &str) -> Result<Vec<Environment>> {
        let mut envs = Vec::new();
        for node in self.store.iterate(&owner_folder(owner_path))? {
            if node.kind != EntryKind::Tree {
                continue;
            }
            if let Some(env) = self.load(owner_path, &node)? {
                envs.push(env);
            }
        }
        Ok(envs)
    }

    /// Build an [`Environment`] from its folder node. A folder without a
    /// manifest is not an environment and loads as `None`.
    fn load(&self, owner_path: &str, node: &Node) -> Result<Option<Environment>> {
        let Some(manifest_node) = self.store.child(node, MANIFEST_FILE)? else {
            return Ok(None);
        };
        let manifest = Manifest::from_yaml(&self.store.blob_bytes(&manifest_node.oid)?)?;

        let mut meta = match self.store.child(node, META_FILE)? {
            Some(meta_node) => Metadata::from_yaml(&self.store.blob_bytes(&meta_node.oid)?)?,
            None => Metadata::default(),
        };
        meta.normalize_tags();

        let has_module = self.store.child(node, MODULE_FILE)?.is_some();
        let builder_out = match self.store.child(node, BUILDER_OUT_FILE)? {
            Some(out) => Some(self.store.blob_bytes(&out.oid)?),
            None => None,
        };
        let derived = state::derive(has_module, builder_out.as_deref());
        let failure_reason = match derived {
            State::Failed => meta.failure_reason.or_else(|| {
                builder_out.as_deref().map(state::classify_failure)
            }),
            _ => None,
        };

        let interpreters = match self.store.child(node, LOCK_FILE)? {
            Some(lock) => extract_interpreters(&self.store.blob_bytes(&lock.oid)?),
            None => Interpreters::default(),
        };

        Ok(Some(Environment {
            id: node.oid.to_string(),
            name: node.name.clone(),
            path: owner_path.to_string(),
            description: manifest.description,
            packages: manifest.packages,
            state: derived,
            tags: meta.tags,
            hidden: meta.force_hidden,
            username: meta.username,
            failure_reason,
            interpreters,
        }))
    }

    fn require_metadata(&self, path: &str, name: &str) -> Result<Metadata> {
        let folder = format!("{}/{name}", owner_folder(path));
        let node = match self.store.find(&folder)? {
            Some(node) if node.kind == EntryKind::Tree => node,
            _ => {
                return Err(EnvironmentError::NotFound {
                    path: path.to_string(),
                    name: name.to_string(),
                })
            }
        };
        let mut meta = match self.store.child(&node, META_FILE)? {
            Some(meta_node) => Metadata::from_yaml(&self.store.blob_bytes(&meta_node.oid)?)?,
            None => Metadata::default(),
        };
        meta.normalize_tags();
        Ok(meta)
    }

    fn write_metadata(&self, path: &str, name: &str, meta: &Metadata, what: &str) -> Result<()> {
        let folder = format!("{}/{name}", owner_folder(path));
        let staged =
            self.store
                .create_file(&folder, META_FILE, meta.to_yaml()?.as_bytes(), false, true)?;
        self.store
            .commit(&staged, &format!("{what} on {path}/{name}"))?;
        self.push_after_commit();
        Ok(())
    }

    /// Next free suffix for `(owner, base)`: one past the larger of the
    /// recorded counter and anything still live in the tree, so deleted
    /// suffixes are never reissued.
    fn next_suffix(&self, owner_folder: &str, base: &str) -> Result<u32> {
        let counters = self.read_suffix_counters(owner_folder)?;
        let mut max = counters.get(base).copied().unwrap_or(0);
        for node in self.store.iterate(owner_folder)? {
            if node.kind != EntryKind::Tree {
                continue;
            }
            if let Some(n) = folder_suffix(&node.name, base) {
                max = max.max(n);
            }
        }
        Ok(max + 1)
    }

    fn read_suffix_counters(&self, owner_folder: &str) -> Result<BTreeMap<String, u32>> {
        let path = format!("{owner_folder}/{SUFFIX_COUNTER_FILE}");
        match self.store.find(&path)? {
            Some(node) if node.kind == EntryKind::Blob => {
                let bytes = self.store.blob_bytes(&node.oid)?;
                Ok(serde_yaml::from_slice(&bytes)?)
            }
            _ => Ok(BTreeMap::new()),
        }
    }
}

fn validate_input(input: &EnvironmentInput) -> Result<()> {
    if input.name.is_empty()
        || input.path.is_empty()
        || input.description.is_empty()
        || input.packages.is_empty()
    {
        return Err(EnvironmentError::InvalidInput(
            "all fields must be filled in".to_string(),
        ));
    }
    validate::name(&input.name).map_err(EnvironmentError::InvalidInput)?;
    validate::owner_path(&input.path).map_err(EnvironmentError::InvalidInput)?;
    for tag in &input.tags {
        validate::tag(tag).map_err(EnvironmentError::InvalidInput)?;
    }
    Ok(())
}

fn owner_folder(owner_path: &str) -> String {
    format!("{ENVIRONMENTS_ROOT}/{owner_path}")
}

fn new_file(folder: &str, name: &str, content: &[u8]) -> FileWrite {
    FileWrite {
        folder: folder.to_string(),
        name: name.to_string(),
        content: content.to_vec(),
        expect_new_folder: true,
        allow_overwrite: false,
    }
}

fn overwrite_file(folder: &str, name: &str, content: &[u8]) -> FileWrite {
    FileWrite {
        folder: folder.to_string(),
        name: name.to_string(),
        content: content.to_vec(),
        expect_new_folder: false,
        allow_overwrite: true,
    }
}

/// `tools-3` with base `tools` is suffix 3. Only an exact `base-N` shape
/// counts; `tools-extra-1` does not collide with `tools`.
fn folder_suffix(folder: &str, base: &str) -> Option<u32> {
    folder
        .strip_prefix(base)?
        .strip_prefix('-')?
        .parse()
        .ok()
}

/// Trailing `-N` of a suffixed folder name.
fn name_suffix(name: &str) -> Option<u32> {
    name.rsplit_once('-')?.1.parse().ok()
}

/// Split `users/alice/tools-1` into (`users/alice`, `tools-1`).
fn split_environment_path(environment_path: &str) -> Result<(String, String)> {
    let trimmed = environment_path.trim_matches('/');
    let Some((path, name)) = trimmed.rsplit_once('/') else {
        return Err(EnvironmentError::InvalidInput(format!(
            "'{environment_path}' is not an environment path"
        )));
    };
    validate::owner_path(path).map_err(EnvironmentError::InvalidInput)?;
    if name.is_empty() {
        return Err(EnvironmentError::InvalidInput(format!(
            "'{environment_path}' is missing an environment name"
        )));
    }
    Ok((path.to_string(), name.to_string()))
}

/// Pull interpreter versions out of a concretized lock file. The lock's
/// `concrete_specs` map is keyed by opaque hash; only the first entry
/// seen per interpreter is kept.
fn extract_interpreters(lock: &[u8]) -> Interpreters {
    let mut interpreters = Interpreters::default();
    let Ok(value) = serde_json::from_slice::<serde_json::Value>(lock) else {
        return interpreters;
    };
    let Some(specs) = value.get("concrete_specs").and_then(|v| v.as_object()) else {
        return interpreters;
    };
    for spec in specs.values() {
        let (Some(name), Some(version)) = (
            spec.get("name").and_then(|v| v.as_str()),
            spec.get("version").and_then(|v| v.as_str()),
        ) else {
            continue;
        };
        match name {
            "python" if interpreters.python.is_none() => {
                interpreters.python = Some(version.to_string());
            }
            "r" if interpreters.r.is_none() => {
                interpreters.r = Some(version.to_string());
            }
            _ => {}
        }
    }
    interpreters
}
