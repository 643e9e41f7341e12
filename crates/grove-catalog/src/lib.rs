//! Cached catalog of installable packages.
//!
//! The catalog is produced by the package manager's listing command and
//! held in memory behind an atomically swapped handle, so readers never
//! block on a refresh. A raw copy of the last listing is kept on disk and
//! consulted only on a cold start, sparing the slow external call.

mod command;
mod parse;

use std::path::PathBuf;
use std::process::Command;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::thread;
use std::time::Duration;

use serde::Deserialize;
use tempfile::TempDir;
use tracing::{debug, warn};

pub use command::{run_with_timeout, CommandOutput};
pub use parse::parse_listing;

const LISTING_CACHE_FILE: &str = "listing.html";

/// One installable package as reported by the listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageInfo {
    pub name: String,
    /// Newest first, as the listing reports them.
    pub versions: Vec<String>,
    pub description: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to start {program}: {source}")]
    CommandStart {
        program: String,
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    CommandFailed {
        program: String,
        status: std::process::ExitStatus,
        stderr: String,
    },

    /// Deadline expiry. Retryable; the stale cache keeps serving reads.
    #[error("{program} did not finish within {timeout:?}")]
    Timeout { program: String, timeout: Duration },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CatalogError>;

fn default_command() -> String {
    "spack".to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogConfig {
    /// Package manager executable.
    #[serde(default = "default_command")]
    pub command: String,
    /// Optional git URL of a custom package repository, cloned shallowly
    /// for each load and handed to the listing command.
    #[serde(default)]
    pub custom_repo: Option<String>,
    /// Directory for the raw-listing disk cache. No directory, no disk
    /// cache.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
    #[serde(default = "default_timeout_secs")]
    pub command_timeout_secs: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            command: default_command(),
            custom_repo: None,
            cache_dir: None,
            command_timeout_secs: default_timeout_secs(),
        }
    }
}

impl CatalogConfig {
    fn timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

/// In-memory package catalog with on-demand and periodic refresh.
pub struct CatalogCache {
    config: CatalogConfig,
    cache: RwLock<Arc<Vec<PackageInfo>>>,
}

impl CatalogCache {
    #[must_use]
    pub fn new(config: CatalogConfig) -> Self {
        Self {
            config,
            cache: RwLock::new(Arc::new(Vec::new())),
        }
    }

    /// Current catalog. A cold cache first tries the raw listing saved on
    /// disk, then falls back to a synchronous load; a load failure leaves
    /// an empty catalog rather than an error, since callers treat the
    /// catalog as advisory.
    pub fn packages(&self) -> Arc<Vec<PackageInfo>> {
        {
            let cache = read(&self.cache);
            if !cache.is_empty() {
                return Arc::clone(&cache);
            }
        }
        if let Some(packages) = self.load_from_disk() {
            if !packages.is_empty() {
                let packages = Arc::new(packages);
                *write(&self.cache) = Arc::clone(&packages);
                return packages;
            }
        }
        if let Err(err) = self.load() {
            warn!(error = %err, "catalog load failed; serving empty catalog");
        }
        Arc::clone(&read(&self.cache))
    }

    /// Run the listing command, parse it and swap the cache atomically.
    /// The raw listing is also saved to the disk cache for the next cold
    /// start.
    pub fn load(&self) -> Result<usize> {
        let checkout = match &self.config.custom_repo {
            Some(repo) => Some(self.checkout_custom_repo(repo)?),
            None => None,
        };

        let mut cmd = Command::new(&self.config.command);
        if let Some(dir) = &checkout {
            cmd.arg("--config")
                .arg(format!("repos:[{}]", dir.path().display()));
        }
        cmd.args(["list", "--format", "html"]);
        let output = run_with_timeout(&mut cmd, self.config.timeout())?;

        let packages = parse_listing(&output.stdout);
        let count = packages.len();
        *write(&self.cache) = Arc::new(packages);
        debug!(count, "catalog refreshed");

        if let Err(err) = self.save_to_disk(&output.stdout) {
            warn!(error = %err, "failed to write catalog disk cache");
        }
        Ok(count)
    }

    /// Re-run [`CatalogCache::load`] every `interval` until the returned
    /// handle is stopped. Load errors are logged and swallowed; a stale
    /// catalog beats a dead refresh loop.
    #[must_use]
    pub fn keep_updated(self: &Arc<Self>, interval: Duration) -> RefreshHandle {
        let cache = Arc::clone(self);
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let thread = thread::spawn(move || loop {
            match stop_rx.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => {
                    if let Err(err) = cache.load() {
                        warn!(error = %err, "periodic catalog refresh failed");
                    }
                }
                Ok(()) | Err(RecvTimeoutError::Disconnected) => return,
            }
        });
        RefreshHandle {
            stop_tx,
            thread: Some(thread),
        }
    }

    fn checkout_custom_repo(&self, repo: &str) -> Result<TempDir> {
        let dir = TempDir::new()?;
        let mut cmd = Command::new("git");
        cmd.args(["clone", "--depth", "1", repo])
            .arg(dir.path());
        run_with_timeout(&mut cmd, self.config.timeout())?;
        Ok(dir)
    }

    fn load_from_disk(&self) -> Option<Vec<PackageInfo>> {
        let path = self.config.cache_dir.as_ref()?.join(LISTING_CACHE_FILE);
        let raw = std::fs::read_to_string(&path).ok()?;
        debug!(path = %path.display(), "catalog loaded from disk cache");
        Some(parse_listing(&raw))
    }

    fn save_to_disk(&self, raw: &str) -> Result<()> {
        use std::io::Write as _;

        let Some(dir) = &self.config.cache_dir else {
            return Ok(());
        };
        std::fs::create_dir_all(dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(raw.as_bytes())?;
        tmp.persist(dir.join(LISTING_CACHE_FILE))
            .map_err(|err| err.error)?;
        Ok(())
    }
}

/// Handle to the background refresh thread; dropping it without calling
/// [`RefreshHandle::stop`] still shuts the thread down via the closed
/// channel, but does not wait for it.
pub struct RefreshHandle {
    stop_tx: mpsc::Sender<()>,
    thread: Option<thread::JoinHandle<()>>,
}

impl RefreshHandle {
    /// Signal the refresh loop to exit and wait for it.
    pub fn stop(mut self) {
        let _ = self.stop_tx.send(());
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn read(lock: &RwLock<Arc<Vec<PackageInfo>>>) -> RwLockReadGuard<'_, Arc<Vec<PackageInfo>>> {
    lock.read().unwrap_or_else(std::sync::PoisonError::into_inner)
}

fn write(lock: &RwLock<Arc<Vec<PackageInfo>>>) -> RwLockWriteGuard<'_, Arc<Vec<PackageInfo>>> {
    lock.write().unwrap_or_else(std::sync::PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    const LISTING: &str = "<div class=\"section\" id=\"zlib\">\n\
                           <dt>Versions:</dt>\n<dd>1.2.13, 1.2.12</dd>\n\
                           <dt>Description:</dt>\n<dd>A compression library</dd>\n\
                           </div>\n";

    /// Fake listing executable that prints `LISTING` regardless of
    /// arguments.
    fn fake_lister(dir: &std::path::Path) -> String {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("fake-spack");
        std::fs::write(
            &path,
            format!("#!/bin/sh\ncat <<'HTML'\n{LISTING}\nHTML\n"),
        )
        .unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.display().to_string()
    }

    #[test]
    fn load_parses_listing_and_writes_disk_cache() {
        let dir = tempfile::TempDir::new().unwrap();
        let cache_dir = dir.path().join("cache");
        let catalog = CatalogCache::new(CatalogConfig {
            command: fake_lister(dir.path()),
            cache_dir: Some(cache_dir.clone()),
            ..CatalogConfig::default()
        });

        assert_eq!(catalog.load().unwrap(), 1);
        let packages = catalog.packages();
        assert_eq!(packages[0].name, "zlib");
        assert_eq!(packages[0].versions, vec!["1.2.13", "1.2.12"]);
        assert!(cache_dir.join(LISTING_CACHE_FILE).is_file());
    }

    #[test]
    fn cold_start_prefers_the_disk_cache() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path()).unwrap();
        std::fs::write(dir.path().join(LISTING_CACHE_FILE), LISTING).unwrap();

        // command does not exist, so only the disk cache can serve this
        let catalog = CatalogCache::new(CatalogConfig {
            command: "/nonexistent/grove-no-such-binary".to_string(),
            cache_dir: Some(dir.path().to_path_buf()),
            ..CatalogConfig::default()
        });
        let packages = catalog.packages();
        assert_eq!(packages.len(), 1);
        assert_eq!(packages[0].name, "zlib");
    }

    #[test]
    fn failed_load_serves_an_empty_catalog() {
        let catalog = CatalogCache::new(CatalogConfig {
            command: "/nonexistent/grove-no-such-binary".to_string(),
            command_timeout_secs: 1,
            ..CatalogConfig::default()
        });
        assert!(catalog.packages().is_empty());
        assert!(catalog.load().is_err());
    }

    #[test]
    fn refresh_thread_stops_and_does_not_leak() {
        let dir = tempfile::TempDir::new().unwrap();
        let catalog = Arc::new(CatalogCache::new(CatalogConfig {
            command: fake_lister(dir.path()),
            ..CatalogConfig::default()
        }));

        let handle = catalog.keep_updated(Duration::from_secs(3600));
        let start = Instant::now();
        handle.stop();
        // stop joins without waiting out the interval
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn refresh_interval_triggers_loads() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::TempDir::new().unwrap();
        let marker = dir.path().join("ran");
        let path = dir.path().join("fake-spack");
        std::fs::write(
            &path,
            format!(
                "#!/bin/sh\ntouch {}\ncat <<'HTML'\n{LISTING}\nHTML\n",
                marker.display()
            ),
        )
        .unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();

        let catalog = Arc::new(CatalogCache::new(CatalogConfig {
            command: path.display().to_string(),
            ..CatalogConfig::default()
        }));

        let handle = catalog.keep_updated(Duration::from_millis(50));
        let deadline = Instant::now() + Duration::from_secs(10);
        while !marker.is_file() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(20));
        }
        handle.stop();
        assert!(marker.is_file());
        assert!(!catalog.packages().is_empty());
    }
}
