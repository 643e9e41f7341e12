//! Input validation for names, owner paths and tags. Nothing here is
//! applied partially: every operation validates everything up front and
//! fails before touching the store.

use crate::{GROUPS_DIR, USERS_DIR};

/// An environment name: non-empty, alphanumeric first character, then
/// `[A-Za-z0-9_.-]`.
pub fn name(input: &str) -> Result<(), String> {
    let mut chars = input.chars();
    match chars.next() {
        None => return Err("environment name must not be empty".to_string()),
        Some(first) if !first.is_ascii_alphanumeric() => {
            return Err(format!(
                "environment name must start with a letter or digit, got '{input}'"
            ))
        }
        Some(_) => {}
    }
    if chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')) {
        Ok(())
    } else {
        Err(format!(
            "environment name may only contain letters, digits, '_', '.' and '-', got '{input}'"
        ))
    }
}

/// An owner path: exactly `users/<owner>` or `groups/<owner>`, where the
/// owner segment follows the same character rules as a name. `.` and
/// `..` are not owners.
pub fn owner_path(input: &str) -> Result<(), String> {
    let mut segs = input.split('/');
    let kind = segs.next().unwrap_or_default();
    let owner = segs.next().unwrap_or_default();
    if segs.next().is_some() || (kind != USERS_DIR && kind != GROUPS_DIR) {
        return Err(format!(
            "path must be {USERS_DIR}/<owner> or {GROUPS_DIR}/<owner>, got '{input}'"
        ));
    }
    name(owner).map_err(|_| format!("invalid owner segment in '{input}'"))
}

/// A tag: non-empty after trimming, no interior whitespace runs, no path
/// traversal.
pub fn tag(input: &str) -> Result<(), String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err("tag must not be empty".to_string());
    }
    if trimmed.contains("  ") || trimmed.contains('\t') || trimmed.contains('\n') {
        return Err(format!("tag must not contain runs of whitespace: '{input}'"));
    }
    if trimmed.contains('/') || trimmed.contains("..") {
        return Err(format!("tag must not contain path sequences: '{input}'"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names() {
        assert!(name("tidyverse").is_ok());
        assert!(name("env_2.1-rc").is_ok());
        assert!(name("7zip").is_ok());
        assert!(name("").is_err());
        assert!(name("-leading-dash").is_err());
        assert!(name("has space").is_err());
        assert!(name("has/slash").is_err());
    }

    #[test]
    fn owner_paths() {
        assert!(owner_path("users/alice").is_ok());
        assert!(owner_path("groups/hgi").is_ok());
        assert!(owner_path("users").is_err());
        assert!(owner_path("users/alice/extra").is_err());
        assert!(owner_path("teams/alice").is_err());
        assert!(owner_path("users/").is_err());
        assert!(owner_path("users/a b").is_err());
        // dot segments must not become tree-entry names
        assert!(owner_path("users/.").is_err());
        assert!(owner_path("users/..").is_err());
        assert!(owner_path("users/.hidden").is_err());
    }

    #[test]
    fn tags() {
        assert!(tag("chemistry").is_ok());
        assert!(tag("single cell").is_ok());
        assert!(tag("  padded  ").is_ok());
        assert!(tag("").is_err());
        assert!(tag("   ").is_err());
        assert!(tag("two  spaces").is_err());
        assert!(tag("a/b").is_err());
        assert!(tag("dot..dot").is_err());
    }
}
