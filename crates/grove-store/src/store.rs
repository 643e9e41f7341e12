use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{Result, StoreError};
use crate::object::{canonical_bytes, decode, Commit, EntryKind, Object, Oid, Tree, TreeEntry};

const OBJECTS_DIR: &str = "objects";
const REFS_DIR: &str = "refs/heads";

/// Where a store lives, which branch it tracks and who signs its commits.
/// Built by the caller and injected; the store holds no global state.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Local store directory.
    pub path: PathBuf,
    /// Optional remote store directory (a bare sibling store). `open`
    /// clones from it when the local copy is absent; `push` synchronizes
    /// to it.
    pub remote: Option<PathBuf>,
    pub branch: String,
    pub author: String,
    pub email: String,
}

/// A resolved tree or blob node.
#[derive(Debug, Clone)]
pub struct Node {
    /// Full path from the repository root, `/`-separated.
    pub path: String,
    /// Final path segment.
    pub name: String,
    pub oid: Oid,
    pub kind: EntryKind,
}

/// A single file to stage. `folder` is the full path of the containing
/// folder from the repository root.
#[derive(Debug, Clone)]
pub struct FileWrite {
    pub folder: String,
    pub name: String,
    pub content: Vec<u8>,
    /// The containing folder must not exist yet; missing parents are
    /// created along the way.
    pub expect_new_folder: bool,
    pub allow_overwrite: bool,
}

/// Result of staging: a new root tree built copy-on-write against a
/// snapshot head. `commit` refuses it if the branch has advanced past
/// that snapshot in the meantime.
#[derive(Debug, Clone)]
pub struct StagedWrite {
    parent: Oid,
    pub root_tree: Oid,
    /// File paths the staged tree changes relative to the snapshot.
    pub paths: Vec<String>,
}

impl StagedWrite {
    #[must_use]
    pub fn parent(&self) -> &Oid {
        &self.parent
    }
}

/// Content-addressed record store: immutable blob/tree/commit objects on
/// disk plus a single branch ref. All structural writes go through
/// [`ArtifactStore::stage_files`] (or its single-file wrapper) followed by
/// [`ArtifactStore::commit`]; reads need no locking because objects never
/// change once written.
#[derive(Debug)]
pub struct ArtifactStore {
    config: StoreConfig,
    write_lock: Mutex<()>,
    push_lock: Mutex<()>,
}

impl ArtifactStore {
    /// Open the local store, cloning from the configured remote when the
    /// local copy does not exist yet.
    ///
    /// # Errors
    ///
    /// `RepositoryUnavailable` when there is no local store and the
    /// remote is missing or unreadable.
    pub fn open(config: StoreConfig) -> Result<Self> {
        let store = Self {
            config,
            write_lock: Mutex::new(()),
            push_lock: Mutex::new(()),
        };
        if store.ref_path().is_file() {
            return Ok(store);
        }
        let Some(remote) = store.config.remote.clone() else {
            return Err(StoreError::RepositoryUnavailable(format!(
                "no store at {} and no remote configured",
                store.config.path.display()
            )));
        };
        store.clone_from(&remote)?;
        Ok(store)
    }

    /// Create an empty store with a root commit holding an empty tree.
    /// Used when bootstrapping a fresh record store and by tests.
    ///
    /// # Errors
    ///
    /// Fails if the store directory cannot be written.
    pub fn init(config: StoreConfig) -> Result<Self> {
        let store = Self {
            config,
            write_lock: Mutex::new(()),
            push_lock: Mutex::new(()),
        };
        if store.ref_path().is_file() {
            return Ok(store);
        }
        fs::create_dir_all(store.objects_dir())?;
        let tree = store.write_object(&Object::Tree(Tree::default()))?;
        let commit = Commit {
            tree,
            parent: None,
            author: store.config.author.clone(),
            email: store.config.email.clone(),
            message: "initialise repository".to_string(),
            timestamp: unix_now(),
        };
        let oid = store.write_object(&Object::Commit(commit))?;
        store.write_ref_at(&store.config.path, &oid)?;
        debug!(%oid, path = %store.config.path.display(), "initialised store");
        Ok(store)
    }

    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Oid of the current head commit of the tracked branch.
    pub fn head(&self) -> Result<Oid> {
        let path = self.ref_path();
        let raw = fs::read_to_string(&path).map_err(|err| {
            StoreError::RepositoryUnavailable(format!(
                "cannot read ref {}: {err}",
                path.display()
            ))
        })?;
        Oid::parse(&raw).ok_or_else(|| StoreError::CorruptObject {
            oid: raw.trim().to_string(),
            reason: "ref does not contain a valid oid".to_string(),
        })
    }

    /// Resolve `path` from the head tree, returning `None` when any
    /// segment is missing.
    pub fn find(&self, path: &str) -> Result<Option<Node>> {
        let head = self.head_commit()?;
        let segs = segments(path);
        let mut oid = head.tree;
        let mut kind = EntryKind::Tree;
        let mut name = String::new();
        for seg in &segs {
            if kind != EntryKind::Tree {
                return Ok(None);
            }
            let tree = self.tree_of(&oid)?;
            match tree.entries.get(*seg) {
                Some(entry) => {
                    oid = entry.oid.clone();
                    kind = entry.kind;
                    name = (*seg).to_string();
                }
                None => return Ok(None),
            }
        }
        Ok(Some(Node {
            path: segs.join("/"),
            name,
            oid,
            kind,
        }))
    }

    /// Like [`ArtifactStore::find`] but absence is a typed error.
    pub fn lookup(&self, path: &str) -> Result<Node> {
        self.find(path)?
            .ok_or_else(|| StoreError::NotFound(path.to_string()))
    }

    /// Iterate the direct children of `path`. A missing or non-tree path
    /// yields an empty iterator, not an error. Each call returns a fresh
    /// iterator over an immutable snapshot of the tree.
    pub fn iterate(&self, path: &str) -> Result<ChildIter> {
        let Some(node) = self.find(path)? else {
            return Ok(ChildIter::empty());
        };
        if node.kind != EntryKind::Tree {
            return Ok(ChildIter::empty());
        }
        let tree = self.tree_of(&node.oid)?;
        Ok(ChildIter {
            base: node.path,
            entries: tree.entries.into_iter().collect(),
            next: 0,
        })
    }

    /// Read the bytes of a blob node.
    pub fn blob_bytes(&self, oid: &Oid) -> Result<Vec<u8>> {
        match self.read_object(oid)? {
            Object::Blob(data) => Ok(data),
            _ => Err(StoreError::WrongKind(oid.to_string())),
        }
    }

    /// Resolve a named child of a tree node.
    pub fn child(&self, node: &Node, name: &str) -> Result<Option<Node>> {
        if node.kind != EntryKind::Tree {
            return Ok(None);
        }
        let tree = self.tree_of(&node.oid)?;
        Ok(tree.entries.get(name).map(|entry| Node {
            path: join_path(&node.path, name),
            name: name.to_string(),
            oid: entry.oid.clone(),
            kind: entry.kind,
        }))
    }

    /// Stage a single file. See [`ArtifactStore::stage_files`] for the
    /// concurrency guard; additionally:
    ///
    /// - `expect_new_folder` with an existing folder fails `NoChanges`;
    /// - an existing file without `allow_overwrite` fails `FileExists`.
    pub fn create_file(
        &self,
        folder: &str,
        name: &str,
        content: &[u8],
        expect_new_folder: bool,
        allow_overwrite: bool,
    ) -> Result<StagedWrite> {
        self.stage_files(&[FileWrite {
            folder: folder.to_string(),
            name: name.to_string(),
            content: content.to_vec(),
            expect_new_folder,
            allow_overwrite,
        }])
    }

    /// Build a new root tree containing `writes`, copy-on-write from the
    /// current head. Writes are applied in order and each one's
    /// preconditions are checked against the tree built so far, so a
    /// batch may create a folder and keep writing into it. Before
    /// returning, the diff between the staged tree and the currently
    /// committed head is computed; any change beyond the paths this call
    /// introduces means another writer got there first and the call
    /// fails `ConcurrentModification`.
    pub fn stage_files(&self, writes: &[FileWrite]) -> Result<StagedWrite> {
        if writes.is_empty() {
            return Err(StoreError::NoChanges);
        }
        let snapshot = self.head()?;
        let mut root = self.commit_of(&snapshot)?.tree;

        let mut expected = BTreeSet::new();
        let mut created_folders: BTreeSet<String> = BTreeSet::new();
        for write in writes {
            if write.name.is_empty() || write.name.contains('/') {
                return Err(StoreError::InvalidPath(write.name.clone()));
            }
            let folder_key = normalize(&write.folder);
            match self.resolve_from(&root, &write.folder)? {
                Some((folder_oid, EntryKind::Tree)) => {
                    if write.expect_new_folder && !created_folders.contains(&folder_key) {
                        return Err(StoreError::NoChanges);
                    }
                    if let Some(entry) = self.tree_of(&folder_oid)?.entries.get(&write.name) {
                        if entry.kind == EntryKind::Tree {
                            return Err(StoreError::InvalidPath(write.name.clone()));
                        }
                        if !write.allow_overwrite {
                            return Err(StoreError::FileExists);
                        }
                    }
                }
                Some((_, EntryKind::Blob)) => {
                    return Err(StoreError::InvalidPath(write.folder.clone()))
                }
                None => {
                    if !write.expect_new_folder {
                        return Err(StoreError::NotFound(write.folder.clone()));
                    }
                    created_folders.insert(folder_key.clone());
                }
            }

            let blob = self.write_object(&Object::Blob(write.content.clone()))?;
            let segs = segments(&write.folder);
            root = self.update_tree(Some(&root), &segs, write.expect_new_folder, &mut |tree| {
                tree.entries.insert(
                    write.name.clone(),
                    TreeEntry {
                        oid: blob.clone(),
                        kind: EntryKind::Blob,
                    },
                );
                Ok(())
            })?;
            expected.insert(join_path(&folder_key, &write.name));
        }

        self.guard_staged(root, |path| expected.contains(path))
    }

    /// Remove the environment folder `name` under `owner_path`.
    ///
    /// # Errors
    ///
    /// `InvalidPath` when `owner_path` is not a folder directly
    /// containing a folder called `name`.
    pub fn delete_environment(&self, name: &str, owner_path: &str) -> Result<StagedWrite> {
        let snapshot = self.head()?;
        let snapshot_tree = self.commit_of(&snapshot)?.tree;

        let owner = match self.resolve_from(&snapshot_tree, owner_path)? {
            Some((oid, EntryKind::Tree)) => oid,
            _ => return Err(StoreError::InvalidPath(owner_path.to_string())),
        };
        match self.tree_of(&owner)?.entries.get(name) {
            Some(entry) if entry.kind == EntryKind::Tree => {}
            _ => {
                return Err(StoreError::InvalidPath(format!(
                    "{owner_path}/{name} is not an environment folder"
                )))
            }
        }

        let segs = segments(owner_path);
        let root = self.update_tree(Some(&snapshot_tree), &segs, false, &mut |tree| {
            tree.entries.remove(name);
            Ok(())
        })?;

        let prefix = format!("{}/{name}/", normalize(owner_path));
        self.guard_staged(root, |path| path.starts_with(&prefix))
    }

    /// Commit a staged tree onto the branch. Fails `ConcurrentModification`
    /// when the branch advanced since the stage snapshot (the losing
    /// writer must re-read and retry) and `NothingToCommit` when the tree
    /// equals the head's.
    pub fn commit(&self, staged: &StagedWrite, message: &str) -> Result<Oid> {
        let _guard = lock(&self.write_lock);
        let head = self.head()?;
        if head != staged.parent {
            return Err(StoreError::ConcurrentModification);
        }
        if self.commit_of(&head)?.tree == staged.root_tree {
            return Err(StoreError::NothingToCommit);
        }
        let commit = Commit {
            tree: staged.root_tree.clone(),
            parent: Some(head),
            author: self.config.author.clone(),
            email: self.config.email.clone(),
            message: message.to_string(),
            timestamp: unix_now(),
        };
        let oid = self.write_object(&Object::Commit(commit))?;
        self.write_ref_at(&self.config.path, &oid)?;
        debug!(%oid, message, paths = staged.paths.len(), "committed");
        Ok(oid)
    }

    /// Synchronize the branch to the remote store. Fast-forward only:
    /// a diverged remote fails `PushRejected` and the caller retries from
    /// a fresh read. Overlapping pushes are serialized. Without a
    /// configured remote this is a logged no-op.
    pub fn push(&self) -> Result<()> {
        let Some(remote) = self.config.remote.clone() else {
            debug!("no remote configured; skipping push");
            return Ok(());
        };
        let _guard = lock(&self.push_lock);
        let local_head = self.head()?;

        let remote_ref = ref_path_at(&remote, &self.config.branch);
        let remote_head = match fs::read_to_string(&remote_ref) {
            Ok(raw) => Some(Oid::parse(&raw).ok_or_else(|| StoreError::CorruptObject {
                oid: raw.trim().to_string(),
                reason: "remote ref does not contain a valid oid".to_string(),
            })?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
            Err(err) => return Err(err.into()),
        };
        if let Some(remote_head) = &remote_head {
            if *remote_head == local_head {
                return Ok(());
            }
            if !self.is_ancestor(remote_head, &local_head)? {
                return Err(StoreError::PushRejected);
            }
        }

        let remote_objects = remote.join(OBJECTS_DIR);
        fs::create_dir_all(&remote_objects)?;
        let mut stack = vec![local_head.clone()];
        let mut copied = 0usize;
        while let Some(oid) = stack.pop() {
            let target = remote_objects.join(oid.as_str());
            if target.is_file() {
                continue;
            }
            let object = self.read_object(&oid)?;
            fs::copy(self.object_path(&oid), &target)?;
            copied += 1;
            match object {
                Object::Blob(_) => {}
                Object::Tree(tree) => {
                    stack.extend(tree.entries.into_values().map(|entry| entry.oid));
                }
                Object::Commit(commit) => {
                    stack.push(commit.tree);
                    if let Some(parent) = commit.parent {
                        stack.push(parent);
                    }
                }
            }
        }
        self.write_ref_at(&remote, &local_head)?;
        debug!(head = %local_head, copied, "pushed");
        Ok(())
    }

    // ---- internals ----

    fn clone_from(&self, remote: &Path) -> Result<()> {
        let remote_ref = ref_path_at(remote, &self.config.branch);
        let raw = fs::read_to_string(&remote_ref).map_err(|err| {
            StoreError::RepositoryUnavailable(format!(
                "cannot clone from {}: {err}",
                remote.display()
            ))
        })?;
        let head = Oid::parse(&raw).ok_or_else(|| StoreError::CorruptObject {
            oid: raw.trim().to_string(),
            reason: "remote ref does not contain a valid oid".to_string(),
        })?;

        fs::create_dir_all(self.objects_dir())?;
        let remote_objects = remote.join(OBJECTS_DIR);
        for entry in fs::read_dir(&remote_objects)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                fs::copy(entry.path(), self.objects_dir().join(entry.file_name()))?;
            }
        }
        self.write_ref_at(&self.config.path, &head)?;
        debug!(remote = %remote.display(), %head, "cloned store");
        Ok(())
    }

    fn guard_staged(&self, root: Oid, allowed: impl Fn(&str) -> bool) -> Result<StagedWrite> {
        let current = self.head()?;
        let current_tree = self.commit_of(&current)?.tree;
        let mut changed = Vec::new();
        self.diff_paths(Some(&current_tree), Some(&root), "", &mut changed)?;
        if changed.iter().any(|path| !allowed(path)) {
            return Err(StoreError::ConcurrentModification);
        }
        if changed.is_empty() {
            return Err(StoreError::NoChanges);
        }
        Ok(StagedWrite {
            parent: current,
            root_tree: root,
            paths: changed,
        })
    }

    /// Rebuild the chain of trees along `segs`, applying `apply` to the
    /// final folder. Nothing already stored is mutated; every touched
    /// tree is written as a new object.
    fn update_tree(
        &self,
        tree: Option<&Oid>,
        segs: &[&str],
        create_missing: bool,
        apply: &mut dyn FnMut(&mut Tree) -> Result<()>,
    ) -> Result<Oid> {
        let mut current = match tree {
            Some(oid) => self.tree_of(oid)?,
            None => Tree::default(),
        };
        if let Some((head, rest)) = segs.split_first() {
            let child = match current.entries.get(*head) {
                Some(entry) if entry.kind == EntryKind::Tree => Some(entry.oid.clone()),
                Some(_) => return Err(StoreError::InvalidPath((*head).to_string())),
                None if create_missing => None,
                None => return Err(StoreError::NotFound((*head).to_string())),
            };
            let rebuilt = self.update_tree(child.as_ref(), rest, create_missing, apply)?;
            current.entries.insert(
                (*head).to_string(),
                TreeEntry {
                    oid: rebuilt,
                    kind: EntryKind::Tree,
                },
            );
        } else {
            apply(&mut current)?;
        }
        self.write_object(&Object::Tree(current))
    }

    /// Collect the file paths that differ between two trees. Recursion is
    /// bounded by the actual tree depth.
    fn diff_paths(
        &self,
        a: Option<&Oid>,
        b: Option<&Oid>,
        prefix: &str,
        out: &mut Vec<String>,
    ) -> Result<()> {
        if a == b {
            return Ok(());
        }
        let a_tree = match a {
            Some(oid) => self.tree_of(oid)?,
            None => Tree::default(),
        };
        let b_tree = match b {
            Some(oid) => self.tree_of(oid)?,
            None => Tree::default(),
        };
        let names: BTreeSet<&String> = a_tree.entries.keys().chain(b_tree.entries.keys()).collect();
        for name in names {
            let ae = a_tree.entries.get(name.as_str());
            let be = b_tree.entries.get(name.as_str());
            if ae == be {
                continue;
            }
            let path = join_path(prefix, name);
            let a_blob = ae.filter(|entry| entry.kind == EntryKind::Blob);
            let b_blob = be.filter(|entry| entry.kind == EntryKind::Blob);
            if (a_blob.is_some() || b_blob.is_some())
                && a_blob.map(|entry| &entry.oid) != b_blob.map(|entry| &entry.oid)
            {
                out.push(path.clone());
            }
            let a_sub = ae
                .filter(|entry| entry.kind == EntryKind::Tree)
                .map(|entry| entry.oid.clone());
            let b_sub = be
                .filter(|entry| entry.kind == EntryKind::Tree)
                .map(|entry| entry.oid.clone());
            if a_sub.is_some() || b_sub.is_some() {
                self.diff_paths(a_sub.as_ref(), b_sub.as_ref(), &path, out)?;
            }
        }
        Ok(())
    }

    /// Walk `descendant`'s parent chain looking for `ancestor`.
    fn is_ancestor(&self, ancestor: &Oid, descendant: &Oid) -> Result<bool> {
        let mut cursor = Some(descendant.clone());
        while let Some(oid) = cursor {
            if oid == *ancestor {
                return Ok(true);
            }
            cursor = self.commit_of(&oid)?.parent;
        }
        Ok(false)
    }

    fn resolve_from(&self, root: &Oid, path: &str) -> Result<Option<(Oid, EntryKind)>> {
        let mut oid = root.clone();
        let mut kind = EntryKind::Tree;
        for seg in segments(path) {
            if kind != EntryKind::Tree {
                return Ok(None);
            }
            let tree = self.tree_of(&oid)?;
            match tree.entries.get(seg) {
                Some(entry) => {
                    oid = entry.oid.clone();
                    kind = entry.kind;
                }
                None => return Ok(None),
            }
        }
        Ok(Some((oid, kind)))
    }

    fn head_commit(&self) -> Result<Commit> {
        let head = self.head()?;
        self.commit_of(&head)
    }

    fn commit_of(&self, oid: &Oid) -> Result<Commit> {
        match self.read_object(oid)? {
            Object::Commit(commit) => Ok(commit),
            _ => Err(StoreError::WrongKind(oid.to_string())),
        }
    }

    fn tree_of(&self, oid: &Oid) -> Result<Tree> {
        match self.read_object(oid)? {
            Object::Tree(tree) => Ok(tree),
            _ => Err(StoreError::WrongKind(oid.to_string())),
        }
    }

    fn read_object(&self, oid: &Oid) -> Result<Object> {
        let path = self.object_path(oid);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(oid.to_string()))
            }
            Err(err) => return Err(err.into()),
        };
        if Oid::of_bytes(&bytes) != *oid {
            return Err(StoreError::CorruptObject {
                oid: oid.to_string(),
                reason: "content does not match its digest".to_string(),
            });
        }
        decode(oid, &bytes)
    }

    /// Write an object; a no-op when the oid already exists. The write is
    /// atomic (temp file + rename) so concurrent readers never observe a
    /// partial object.
    fn write_object(&self, object: &Object) -> Result<Oid> {
        let bytes = canonical_bytes(object)?;
        let oid = Oid::of_bytes(&bytes);
        let path = self.object_path(&oid);
        if path.is_file() {
            return Ok(oid);
        }
        fs::create_dir_all(self.objects_dir())?;
        let mut tmp = NamedTempFile::new_in(self.objects_dir())?;
        tmp.write_all(&bytes)?;
        tmp.persist(&path).map_err(|err| err.error)?;
        Ok(oid)
    }

    fn write_ref_at(&self, root: &Path, oid: &Oid) -> Result<()> {
        let path = ref_path_at(root, &self.config.branch);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let dir = path.parent().unwrap_or(root);
        let mut tmp = NamedTempFile::new_in(dir)?;
        writeln!(tmp, "{oid}")?;
        tmp.persist(&path).map_err(|err| err.error)?;
        Ok(())
    }

    fn objects_dir(&self) -> PathBuf {
        self.config.path.join(OBJECTS_DIR)
    }

    fn object_path(&self, oid: &Oid) -> PathBuf {
        self.objects_dir().join(oid.as_str())
    }

    fn ref_path(&self) -> PathBuf {
        ref_path_at(&self.config.path, &self.config.branch)
    }
}

/// Restartable iterator over the direct children of a tree node.
pub struct ChildIter {
    base: String,
    entries: Vec<(String, TreeEntry)>,
    next: usize,
}

impl ChildIter {
    fn empty() -> Self {
        Self {
            base: String::new(),
            entries: Vec::new(),
            next: 0,
        }
    }
}

impl Iterator for ChildIter {
    type Item = Node;

    fn next(&mut self) -> Option<Node> {
        let (name, entry) = self.entries.get(self.next)?;
        self.next += 1;
        Some(Node {
            path: join_path(&self.base, name),
            name: name.clone(),
            oid: entry.oid.clone(),
            kind: entry.kind,
        })
    }
}

fn ref_path_at(root: &Path, branch: &str) -> PathBuf {
    root.join(REFS_DIR).join(branch)
}

fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|seg| !seg.is_empty()).collect()
}

fn normalize(path: &str) -> String {
    segments(path).join("/")
}

fn join_path(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{base}/{name}")
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

fn lock(mutex: &Mutex<()>) -> std::sync::MutexGuard<'_, ()> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config(path: PathBuf, remote: Option<PathBuf>) -> StoreConfig {
        StoreConfig {
            path,
            remote,
            branch: "main".to_string(),
            author: "svc".to_string(),
            email: "svc@example.com".to_string(),
        }
    }

    fn new_store() -> (TempDir, ArtifactStore) {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::init(config(dir.path().join("local"), None)).unwrap();
        (dir, store)
    }

    fn stage_and_commit(store: &ArtifactStore, folder: &str, name: &str, content: &[u8]) {
        let staged = store.create_file(folder, name, content, true, false).unwrap();
        store.commit(&staged, "seed").unwrap();
    }

    #[test]
    fn init_creates_head_with_empty_root() {
        let (_dir, store) = new_store();
        let head = store.head().unwrap();
        assert!(store.find("").unwrap().is_some());
        assert!(store.find("anything").unwrap().is_none());
        // reopening an initialised store keeps the head
        let reopened = ArtifactStore::open(store.config().clone()).unwrap();
        assert_eq!(reopened.head().unwrap(), head);
    }

    #[test]
    fn open_without_local_or_remote_is_unavailable() {
        let dir = TempDir::new().unwrap();
        let err = ArtifactStore::open(config(dir.path().join("missing"), None)).unwrap_err();
        assert!(matches!(err, StoreError::RepositoryUnavailable(_)));
    }

    #[test]
    fn create_file_roundtrips_through_commit() {
        let (_dir, store) = new_store();
        let staged = store
            .create_file("environments/users/alice/env-1", "grove.yml", b"description: d\n", true, false)
            .unwrap();
        assert_eq!(
            staged.paths,
            vec!["environments/users/alice/env-1/grove.yml".to_string()]
        );
        store.commit(&staged, "create environment").unwrap();

        let node = store
            .lookup("environments/users/alice/env-1/grove.yml")
            .unwrap();
        assert_eq!(node.kind, EntryKind::Blob);
        assert_eq!(store.blob_bytes(&node.oid).unwrap(), b"description: d\n");
    }

    #[test]
    fn create_file_preconditions() {
        let (_dir, store) = new_store();
        stage_and_commit(&store, "environments/users/alice/env-1", "file.txt", b"one");

        // folder already exists
        let err = store
            .create_file("environments/users/alice/env-1", "other.txt", b"x", true, false)
            .unwrap_err();
        assert!(matches!(err, StoreError::NoChanges));

        // file already exists without overwrite
        let err = store
            .create_file("environments/users/alice/env-1", "file.txt", b"x", false, false)
            .unwrap_err();
        assert!(matches!(err, StoreError::FileExists));

        // missing folder without expect_new_folder
        let err = store
            .create_file("environments/users/bob/env-1", "file.txt", b"x", false, false)
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));

        // overwrite with identical content is not a change
        let err = store
            .create_file("environments/users/alice/env-1", "file.txt", b"one", false, true)
            .unwrap_err();
        assert!(matches!(err, StoreError::NoChanges));

        // overwrite with new content works
        let staged = store
            .create_file("environments/users/alice/env-1", "file.txt", b"two", false, true)
            .unwrap();
        store.commit(&staged, "overwrite").unwrap();
        let node = store
            .lookup("environments/users/alice/env-1/file.txt")
            .unwrap();
        assert_eq!(store.blob_bytes(&node.oid).unwrap(), b"two");
    }

    #[test]
    fn losing_writer_observes_concurrent_modification() {
        let (_dir, store) = new_store();
        stage_and_commit(&store, "environments/users/alice", "seed.txt", b"seed");

        let first = store
            .create_file("environments/users/alice/env-1", "a.txt", b"a", true, false)
            .unwrap();
        let second = store
            .create_file("environments/users/alice/env-2", "b.txt", b"b", true, false)
            .unwrap();

        store.commit(&second, "winner").unwrap();
        let err = store.commit(&first, "loser").unwrap_err();
        assert!(matches!(err, StoreError::ConcurrentModification));

        // repository is exactly as the winner left it
        assert!(store.find("environments/users/alice/env-2/b.txt").unwrap().is_some());
        assert!(store.find("environments/users/alice/env-1").unwrap().is_none());

        // the loser retries from a fresh read and succeeds
        let retried = store
            .create_file("environments/users/alice/env-1", "a.txt", b"a", true, false)
            .unwrap();
        store.commit(&retried, "retry").unwrap();
        assert!(store.find("environments/users/alice/env-1/a.txt").unwrap().is_some());
    }

    #[test]
    fn stage_files_writes_multiple_paths_in_one_tree() {
        let (_dir, store) = new_store();
        let writes = vec![
            FileWrite {
                folder: "environments/users/alice/env-1".to_string(),
                name: "grove.yml".to_string(),
                content: b"description: d\n".to_vec(),
                expect_new_folder: true,
                allow_overwrite: false,
            },
            FileWrite {
                folder: "environments/users/alice/env-1".to_string(),
                name: "meta.yml".to_string(),
                content: b"tags: []\n".to_vec(),
                expect_new_folder: true,
                allow_overwrite: false,
            },
            FileWrite {
                folder: "environments/users/alice".to_string(),
                name: ".suffixes".to_string(),
                content: b"env: 1\n".to_vec(),
                expect_new_folder: false,
                allow_overwrite: true,
            },
        ];
        let staged = store.stage_files(&writes).unwrap();
        assert_eq!(staged.paths.len(), 3);
        store.commit(&staged, "create environment").unwrap();
        assert!(store.find("environments/users/alice/.suffixes").unwrap().is_some());
        assert!(store.find("environments/users/alice/env-1/meta.yml").unwrap().is_some());
    }

    #[test]
    fn iterate_lists_children_and_is_restartable() {
        let (_dir, store) = new_store();
        stage_and_commit(&store, "environments/users/alice/env-1", "grove.yml", b"x");
        stage_and_commit(&store, "environments/users/alice/env-2", "grove.yml", b"x");

        let names: Vec<String> = store
            .iterate("environments/users/alice")
            .unwrap()
            .map(|node| node.name)
            .collect();
        assert_eq!(names, vec!["env-1".to_string(), "env-2".to_string()]);

        // a second call yields a fresh iterator
        assert_eq!(store.iterate("environments/users/alice").unwrap().count(), 2);
        // absent root is an empty sequence, not an error
        assert_eq!(store.iterate("environments/groups").unwrap().count(), 0);
    }

    #[test]
    fn delete_environment_removes_subtree() {
        let (_dir, store) = new_store();
        stage_and_commit(&store, "environments/users/alice/env-1", "grove.yml", b"x");

        let err = store
            .delete_environment("env-9", "environments/users/alice")
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidPath(_)));

        let staged = store
            .delete_environment("env-1", "environments/users/alice")
            .unwrap();
        store.commit(&staged, "delete environment").unwrap();
        assert!(store.find("environments/users/alice/env-1").unwrap().is_none());
    }

    #[test]
    fn commit_of_identical_tree_is_rejected() {
        let (_dir, store) = new_store();
        let staged = store
            .create_file("environments/users/alice", "file.txt", b"x", true, false)
            .unwrap();
        store.commit(&staged, "first").unwrap();
        let err = store.commit(&staged, "again").unwrap_err();
        // same staged write: parent no longer matches the head
        assert!(matches!(err, StoreError::ConcurrentModification));
    }

    #[test]
    fn push_and_clone_synchronize_with_a_remote() {
        let dir = TempDir::new().unwrap();
        let remote_path = dir.path().join("remote");
        ArtifactStore::init(config(remote_path.clone(), None)).unwrap();

        let local = ArtifactStore::open(config(
            dir.path().join("local"),
            Some(remote_path.clone()),
        ))
        .unwrap();
        stage_and_commit(&local, "environments/users/alice/env-1", "grove.yml", b"x");
        local.push().unwrap();

        // a second clone sees the pushed state
        let other = ArtifactStore::open(config(
            dir.path().join("other"),
            Some(remote_path.clone()),
        ))
        .unwrap();
        assert!(other
            .find("environments/users/alice/env-1/grove.yml")
            .unwrap()
            .is_some());

        // diverging from the remote is rejected, not force-pushed
        stage_and_commit(&other, "environments/users/bob/env-1", "grove.yml", b"y");
        other.push().unwrap();
        stage_and_commit(&local, "environments/users/carol/env-1", "grove.yml", b"z");
        let err = local.push().unwrap_err();
        assert!(matches!(err, StoreError::PushRejected));
    }
}
