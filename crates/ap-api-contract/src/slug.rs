// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Slug and ID helpers

use crate::error::ApiContractError;

pub const MAX_SLUG_LEN: usize = 50;

const RESOURCE_ID_PREFIX: &str = "res-";

/// Turn a display name into a slug: transliterated lowercase alphanumerics
/// separated by single underscores.
pub fn make_slug(name: &str) -> String {
    let mut slug = ::slug::slugify(name).replace('-', "_");
    slug.truncate(MAX_SLUG_LEN);
    slug.trim_end_matches('_').to_string()
}

/// Slug for `name` that `taken` does not reject, suffixing `_2`, `_3`, ... as needed.
pub fn unique_slug(name: &str, taken: impl Fn(&str) -> bool) -> String {
    let base = match make_slug(name) {
        s if s.is_empty() => "resource".to_string(),
        s => s,
    };
    if !taken(&base) {
        return base;
    }
    let mut n = 2usize;
    loop {
        let suffix = format!("_{n}");
        let mut stem = base.clone();
        stem.truncate(MAX_SLUG_LEN - suffix.len());
        let candidate = format!("{}{suffix}", stem.trim_end_matches('_'));
        if !taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// Lowercase ASCII alphanumerics and underscores, not starting or ending with `_`.
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug.len() <= MAX_SLUG_LEN
        && !slug.starts_with('_')
        && !slug.ends_with('_')
        && slug.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

/// Local resources derive their ID from the slug.
pub fn resource_id(slug: &str) -> String {
    format!("{RESOURCE_ID_PREFIX}{slug}")
}

pub fn slug_from_resource_id(id: &str) -> Result<String, ApiContractError> {
    match id.strip_prefix(RESOURCE_ID_PREFIX) {
        Some(slug) if !slug.is_empty() => Ok(slug.to_string()),
        _ => Err(ApiContractError::InvalidResourceId(id.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugifies_display_names() {
        assert_eq!(make_slug("My DB"), "my_db");
        assert_eq!(make_slug("  prod-db (read only) "), "prod_db_read_only");
        assert_eq!(make_slug("---"), "");
    }

    #[test]
    fn transliterates_non_ascii_names() {
        assert_eq!(make_slug("Café DB"), "cafe_db");
        assert!(is_valid_slug(&make_slug("Ünïcödé Résource")));
    }

    #[test]
    fn slug_is_capped() {
        let long = "a".repeat(80);
        assert_eq!(make_slug(&long).len(), MAX_SLUG_LEN);
    }

    #[test]
    fn unique_slug_appends_counter() {
        let taken = ["my_db", "my_db_2"];
        assert_eq!(unique_slug("My DB", |s| taken.contains(&s)), "my_db_3");
        assert_eq!(unique_slug("Other", |s| taken.contains(&s)), "other");
    }

    #[test]
    fn resource_ids_round_trip_through_slug() {
        assert_eq!(resource_id("my_db"), "res-my_db");
        assert_eq!(slug_from_resource_id("res-my_db").unwrap(), "my_db");
        assert!(slug_from_resource_id("res-").is_err());
        assert!(slug_from_resource_id("my_db").is_err());
    }

    #[test]
    fn validates_slug_format() {
        assert!(is_valid_slug("team_slack"));
        assert!(!is_valid_slug("Team Slack"));
        assert!(!is_valid_slug(""));
        assert!(!is_valid_slug("_db_"));
        assert!(!is_valid_slug("db_"));
        assert!(!is_valid_slug("my-db"));
    }
}
