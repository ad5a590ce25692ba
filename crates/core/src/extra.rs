//! Free-form extra attributes attached to a work.
//!
//! The write path receives the attributes as JSON text, either as an object
//! (`{"pages": "24"}`) or as the list of `{key, value}` rows the edit form
//! builds. Both are folded into one ordered map with last-write-wins
//! semantics for repeated keys.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::CoreError;

/// Extra attributes of a single work. Keys are unique; order is irrelevant
/// but kept sorted so renderings are deterministic.
pub type ExtraAttributes = BTreeMap<String, String>;

/// Payload field name used in validation errors.
const FIELD: &str = "extra";

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// JSON object whose entries are kept in document order, duplicates included.
struct OrderedEntries(Vec<(String, Value)>);

impl<'de> Deserialize<'de> for OrderedEntries {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct EntriesVisitor;

        impl<'de> Visitor<'de> for EntriesVisitor {
            type Value = OrderedEntries;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a JSON object of attribute values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((key, value)) = map.next_entry::<String, Value>()? {
                    entries.push((key, value));
                }
                Ok(OrderedEntries(entries))
            }
        }

        deserializer.deserialize_map(EntriesVisitor)
    }
}

#[derive(Deserialize)]
struct ExtraRow {
    key: String,
    #[serde(default)]
    value: Value,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ExtraInput {
    Object(OrderedEntries),
    Rows(Vec<ExtraRow>),
}

/// Parse the `extra` payload field into an attribute map.
///
/// - Absent or blank input yields an empty map.
/// - Keys are trimmed; blank keys are dropped.
/// - A key seen more than once keeps its last value.
/// - Numbers and booleans are stored as their JSON text; `null`, arrays and
///   objects are rejected.
pub fn parse_extra(raw: Option<&str>) -> Result<ExtraAttributes, CoreError> {
    let raw = raw.map(str::trim).unwrap_or_default();
    if raw.is_empty() {
        return Ok(ExtraAttributes::new());
    }

    let input: ExtraInput = serde_json::from_str(raw).map_err(|e| {
        CoreError::validation(
            FIELD,
            format!("extra must be a JSON object or a list of {{key, value}} rows: {e}"),
        )
    })?;

    let entries = match input {
        ExtraInput::Object(OrderedEntries(entries)) => entries,
        ExtraInput::Rows(rows) => rows.into_iter().map(|r| (r.key, r.value)).collect(),
    };

    let mut attributes = ExtraAttributes::new();
    for (key, value) in entries {
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        let value = scalar_to_string(key, value)?;
        attributes.insert(key.to_string(), value);
    }

    Ok(attributes)
}

fn scalar_to_string(key: &str, value: Value) -> Result<String, CoreError> {
    match value {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => Err(CoreError::validation(
            FIELD,
            format!("value for '{key}' must be a string, number, or boolean"),
        )),
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Flatten attributes into the text the `extra_text` filter matches against:
/// one `key: value` line per entry, sorted by key.
pub fn flatten_extra(attributes: &ExtraAttributes) -> String {
    attributes
        .iter()
        .map(|(k, v)| format!("{k}: {v}"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn blank_input_is_empty_map() {
        assert!(parse_extra(None).unwrap().is_empty());
        assert!(parse_extra(Some("  ")).unwrap().is_empty());
        assert!(parse_extra(Some("{}")).unwrap().is_empty());
    }

    #[test]
    fn object_form() {
        let extra = parse_extra(Some(r#"{"pages": "24", "size": "B5"}"#)).unwrap();
        assert_eq!(extra.get("pages").map(String::as_str), Some("24"));
        assert_eq!(extra.get("size").map(String::as_str), Some("B5"));
    }

    #[test]
    fn row_form_last_duplicate_wins() {
        let extra = parse_extra(Some(
            r#"[{"key": "shop", "value": "A"}, {"key": "shop", "value": "B"}]"#,
        ))
        .unwrap();
        assert_eq!(extra.len(), 1);
        assert_eq!(extra["shop"], "B");
    }

    #[test]
    fn object_form_duplicate_after_trim_keeps_last() {
        let extra = parse_extra(Some(r#"{"shop": "A", " shop ": "B"}"#)).unwrap();
        assert_eq!(extra.len(), 1);
        assert_eq!(extra["shop"], "B");
    }

    #[test]
    fn blank_keys_are_dropped() {
        let extra = parse_extra(Some(r#"[{"key": "  ", "value": "x"}, {"key": "a", "value": "1"}]"#))
            .unwrap();
        assert_eq!(extra.len(), 1);
        assert!(extra.contains_key("a"));
    }

    #[test]
    fn scalars_become_text() {
        let extra = parse_extra(Some(r#"{"pages": 24, "signed": true}"#)).unwrap();
        assert_eq!(extra["pages"], "24");
        assert_eq!(extra["signed"], "true");
    }

    #[test]
    fn nested_values_are_rejected() {
        assert_matches!(
            parse_extra(Some(r#"{"nested": {"a": 1}}"#)),
            Err(CoreError::Validation { field, .. }) if field == "extra"
        );
        assert_matches!(
            parse_extra(Some(r#"{"gone": null}"#)),
            Err(CoreError::Validation { .. })
        );
    }

    #[test]
    fn malformed_json_is_rejected() {
        assert_matches!(
            parse_extra(Some("{not json")),
            Err(CoreError::Validation { field, .. }) if field == "extra"
        );
        assert_matches!(parse_extra(Some("42")), Err(CoreError::Validation { .. }));
    }

    #[test]
    fn flatten_is_sorted_by_key() {
        let mut extra = ExtraAttributes::new();
        extra.insert("size".into(), "B5".into());
        extra.insert("pages".into(), "24".into());
        assert_eq!(flatten_extra(&extra), "pages: 24\nsize: B5");
        assert_eq!(flatten_extra(&ExtraAttributes::new()), "");
    }
}
