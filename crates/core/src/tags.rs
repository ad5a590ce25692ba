//! Tag CSV parsing.
//!
//! Works carry their tags as a single comma-separated string on the write
//! path. This module turns that string into the ordered, de-duplicated list
//! of tag names that the repository layer then resolves to tag rows.

use std::collections::HashSet;

use crate::entity::{validate_name, EntityKind};
use crate::error::CoreError;

/// Split a comma-separated tag string into normalized tag names.
///
/// - Splits on `,`.
/// - Trims each segment and drops empty ones.
/// - De-duplicates by normalized value, keeping the first occurrence.
///
/// # Examples
///
/// ```
/// use doujinshelf_core::tags::parse_tag_csv;
///
/// assert_eq!(parse_tag_csv("comedy, drama, comedy"), vec!["comedy", "drama"]);
/// assert!(parse_tag_csv(" , ,").is_empty());
/// ```
pub fn parse_tag_csv(raw: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .filter(|t| seen.insert(*t))
        .map(str::to_string)
        .collect()
}

/// Parse and length-check the `tags` payload field.
///
/// An absent field behaves like an empty string: the work ends up with no tags.
pub fn validate_tag_csv(raw: Option<&str>) -> Result<Vec<String>, CoreError> {
    parse_tag_csv(raw.unwrap_or_default())
        .into_iter()
        .map(|name| {
            validate_name(EntityKind::Tag, "tags", Some(&name))
                .map(|n| n.unwrap_or(name))
        })
        .collect()
}
