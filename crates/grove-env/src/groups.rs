//! Directory-service group lookup contract.
//!
//! The actual directory client lives outside this crate; callers hand in
//! anything implementing [`GroupLookup`]. [`FilteredGroups`] wraps a
//! lookup with the retry, inclusion-pattern and ordering behavior the
//! rest of the system expects.

use std::thread;
use std::time::Duration;

use regex_lite::Regex;
use tracing::warn;

use crate::config::GroupSettings;

/// Raw group lookup. Implementations may fail transiently; retrying is
/// the wrapper's job, not theirs.
pub trait GroupLookup: Send + Sync {
    fn groups(&self, username: &str) -> anyhow::Result<Vec<String>>;
}

impl<F> GroupLookup for F
where
    F: Fn(&str) -> anyhow::Result<Vec<String>> + Send + Sync,
{
    fn groups(&self, username: &str) -> anyhow::Result<Vec<String>> {
        self(username)
    }
}

/// Retrying, filtering, sorting wrapper over a [`GroupLookup`].
pub struct FilteredGroups<L> {
    inner: L,
    pattern: Regex,
    retries: u32,
    backoff: Duration,
}

impl<L: GroupLookup> FilteredGroups<L> {
    pub fn new(inner: L, settings: &GroupSettings) -> anyhow::Result<Self> {
        Ok(Self {
            inner,
            pattern: Regex::new(&settings.pattern)?,
            retries: settings.retries.max(1),
            backoff: Duration::from_secs(settings.backoff_secs),
        })
    }

    /// Groups the user belongs to, filtered by the inclusion pattern and
    /// sorted. Transient lookup failures are retried with a fixed
    /// backoff; the final failure propagates.
    pub fn groups(&self, username: &str) -> anyhow::Result<Vec<String>> {
        let mut attempt = 0;
        let raw = loop {
            attempt += 1;
            match self.inner.groups(username) {
                Ok(groups) => break groups,
                Err(err) if attempt < self.retries => {
                    warn!(username, attempt, error = %err, "group lookup failed; retrying");
                    thread::sleep(self.backoff);
                }
                Err(err) => return Err(err),
            }
        };
        let mut groups: Vec<String> = raw
            .into_iter()
            .filter(|g| self.pattern.is_match(g))
            .collect();
        groups.sort();
        Ok(groups)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn settings(pattern: &str) -> GroupSettings {
        GroupSettings {
            pattern: pattern.to_string(),
            retries: 3,
            backoff_secs: 0,
        }
    }

    #[test]
    fn filters_and_sorts() {
        let lookup = |_: &str| {
            Ok(vec![
                "team-zebra".to_string(),
                "other".to_string(),
                "team-alpha".to_string(),
            ])
        };
        let groups = FilteredGroups::new(lookup, &settings("^team-")).unwrap();
        assert_eq!(
            groups.groups("alice").unwrap(),
            vec!["team-alpha", "team-zebra"]
        );
    }

    #[test]
    fn retries_transient_failures() {
        let calls = AtomicU32::new(0);
        let lookup = |_: &str| {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                anyhow::bail!("server down")
            }
            Ok(vec!["hgi".to_string()])
        };
        let groups = FilteredGroups::new(&lookup, &settings(".*")).unwrap();
        assert_eq!(groups.groups("alice").unwrap(), vec!["hgi"]);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn gives_up_after_the_last_retry() {
        let calls = AtomicU32::new(0);
        let lookup = |_: &str| -> anyhow::Result<Vec<String>> {
            calls.fetch_add(1, Ordering::SeqCst);
            anyhow::bail!("server down")
        };
        let groups = FilteredGroups::new(&lookup, &settings(".*")).unwrap();
        assert!(groups.groups("alice").is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
