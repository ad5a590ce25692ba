//! Work payload validation.
//!
//! [`WorkInput`] is the raw, stringly-typed payload as it arrives from a form
//! submission. [`WorkInput::into_draft`] validates every field and produces a
//! [`WorkDraft`], the only shape the repository layer accepts for create and
//! update. Nothing is persisted before validation succeeds.

use chrono::NaiveDate;
use validator::Validate;

use crate::entity::{validate_name, EntityKind};
use crate::error::CoreError;
use crate::extra::{parse_extra, ExtraAttributes};
use crate::tags::validate_tag_csv;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Maximum length (in characters) of a work title.
pub const MAX_TITLE_LEN: u64 = 200;

/// Exclusive upper bound of the `NUMERIC(10,2)` price column.
pub const MAX_STORABLE_PRICE: f64 = 100_000_000.0;

/// Default exclusive upper bound on the price value.
pub const DEFAULT_MAX_PRICE: f64 = MAX_STORABLE_PRICE;

/// Purchase dates are ISO calendar dates.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// Raw create/update payload. Every field is optional text so that the
/// validator can report precisely which one is wrong.
#[derive(Debug, Clone, Default)]
pub struct WorkInput {
    pub title: Option<String>,
    pub author_name: Option<String>,
    pub circle_name: Option<String>,
    pub purchase_event_name: Option<String>,
    pub is_r18: Option<String>,
    pub summary: Option<String>,
    pub purchase_date: Option<String>,
    pub price: Option<String>,
    /// Comma-separated tag names.
    pub tags: Option<String>,
    /// JSON text, see [`crate::extra::parse_extra`].
    pub extra: Option<String>,
}

/// A fully validated work payload, ready to be resolved and persisted.
#[derive(Debug, Clone, PartialEq, Validate)]
pub struct WorkDraft {
    /// Trimmed, non-blank.
    #[validate(length(max = MAX_TITLE_LEN))]
    pub title: String,
    pub author_name: Option<String>,
    pub circle_name: Option<String>,
    pub purchase_event_name: Option<String>,
    pub is_r18: bool,
    pub summary: Option<String>,
    pub purchase_date: Option<NaiveDate>,
    pub price: Option<f64>,
    /// Normalized, de-duplicated tag names in first-seen order.
    pub tag_names: Vec<String>,
    pub extra: ExtraAttributes,
}

impl WorkInput {
    /// Validate the payload. `max_price` is the exclusive upper bound for
    /// `price` (see [`DEFAULT_MAX_PRICE`]).
    pub fn into_draft(self, max_price: f64) -> Result<WorkDraft, CoreError> {
        let title = self
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| CoreError::validation("title", "title is required"))?
            .to_string();

        let draft = WorkDraft {
            title,
            author_name: validate_name(
                EntityKind::Author,
                "author_name",
                self.author_name.as_deref(),
            )?,
            circle_name: validate_name(
                EntityKind::Circle,
                "circle_name",
                self.circle_name.as_deref(),
            )?,
            purchase_event_name: validate_name(
                EntityKind::Event,
                "purchase_event_name",
                self.purchase_event_name.as_deref(),
            )?,
            is_r18: parse_flag("is_r18", self.is_r18.as_deref())?.unwrap_or(false),
            summary: self.summary.filter(|s| !s.trim().is_empty()),
            purchase_date: parse_date("purchase_date", self.purchase_date.as_deref())?,
            price: parse_price("price", self.price.as_deref(), max_price)?,
            tag_names: validate_tag_csv(self.tags.as_deref())?,
            extra: parse_extra(self.extra.as_deref())?,
        };

        draft.validate().map_err(|errors| {
            let field = errors
                .field_errors()
                .keys()
                .min()
                .map(|k| k.to_string())
                .unwrap_or_else(|| "payload".to_string());
            CoreError::validation(field, format!("{errors}"))
        })?;
        Ok(draft)
    }
}

// ---------------------------------------------------------------------------
// Field parsers (shared with the filter boundary)
// ---------------------------------------------------------------------------

/// Parse a non-negative price, rounded to cents, that stays below
/// `max_price` after rounding. `max_price` never exceeds
/// [`MAX_STORABLE_PRICE`].
///
/// Blank input means "no price".
pub fn parse_price(field: &str, raw: Option<&str>, max_price: f64) -> Result<Option<f64>, CoreError> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };

    let value: f64 = raw
        .parse()
        .map_err(|_| CoreError::validation(field, format!("'{raw}' is not a valid number")))?;

    if !value.is_finite() {
        return Err(CoreError::validation(field, "price must be a finite number"));
    }
    if value < 0.0 {
        return Err(CoreError::validation(field, "price must not be negative"));
    }
    let max_price = max_price.min(MAX_STORABLE_PRICE);
    let cents = (value * 100.0).round() / 100.0;
    if cents >= max_price {
        return Err(CoreError::validation(
            field,
            format!("price must be less than {max_price}"),
        ));
    }

    Ok(Some(cents))
}

/// Parse an ISO `YYYY-MM-DD` date. Blank input means "no date".
pub fn parse_date(field: &str, raw: Option<&str>) -> Result<Option<NaiveDate>, CoreError> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };

    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map(Some)
        .map_err(|_| CoreError::validation(field, format!("'{raw}' is not a YYYY-MM-DD date")))
}

/// Parse an HTML-form style boolean. Blank input means "not given".
pub fn parse_flag(field: &str, raw: Option<&str>) -> Result<Option<bool>, CoreError> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };

    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "on" | "yes" => Ok(Some(true)),
        "false" | "0" | "off" | "no" => Ok(Some(false)),
        _ => Err(CoreError::validation(
            field,
            format!("'{raw}' is not a boolean"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn input(title: &str) -> WorkInput {
        WorkInput {
            title: Some(title.to_string()),
            ..Default::default()
        }
    }

    fn field_of(err: CoreError) -> String {
        match err {
            CoreError::Validation { field, .. } => field,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn minimal_payload() {
        let draft = input("Sample").into_draft(DEFAULT_MAX_PRICE).unwrap();
        assert_eq!(draft.title, "Sample");
        assert!(!draft.is_r18);
        assert_eq!(draft.price, None);
        assert!(draft.tag_names.is_empty());
        assert!(draft.extra.is_empty());
    }

    #[test]
    fn full_payload() {
        let draft = WorkInput {
            title: Some("  Sample ".into()),
            author_name: Some(" Taro ".into()),
            circle_name: Some("".into()),
            purchase_event_name: Some("C103".into()),
            is_r18: Some("true".into()),
            summary: Some("A short story".into()),
            purchase_date: Some("2023-12-30".into()),
            price: Some("1200".into()),
            tags: Some("comedy, drama, comedy".into()),
            extra: Some(r#"{"pages": "24"}"#.into()),
        }
        .into_draft(DEFAULT_MAX_PRICE)
        .unwrap();

        assert_eq!(draft.title, "Sample");
        assert_eq!(draft.author_name.as_deref(), Some("Taro"));
        assert_eq!(draft.circle_name, None);
        assert_eq!(draft.purchase_event_name.as_deref(), Some("C103"));
        assert!(draft.is_r18);
        assert_eq!(draft.purchase_date, NaiveDate::from_ymd_opt(2023, 12, 30));
        assert_eq!(draft.price, Some(1200.0));
        assert_eq!(draft.tag_names, vec!["comedy", "drama"]);
        assert_eq!(draft.extra["pages"], "24");
    }

    #[test]
    fn missing_or_blank_title_is_rejected() {
        assert_eq!(field_of(WorkInput::default().into_draft(DEFAULT_MAX_PRICE).unwrap_err()), "title");
        assert_eq!(field_of(input("   ").into_draft(DEFAULT_MAX_PRICE).unwrap_err()), "title");
    }

    #[test]
    fn overlong_title_is_rejected() {
        let err = input(&"t".repeat(201)).into_draft(DEFAULT_MAX_PRICE).unwrap_err();
        assert_eq!(field_of(err), "title");
    }

    #[test]
    fn title_length_is_checked_after_trimming() {
        let title = "t".repeat(MAX_TITLE_LEN as usize);
        let draft = input(&format!("  {title}\t")).into_draft(DEFAULT_MAX_PRICE).unwrap();
        assert_eq!(draft.title, title);
    }

    #[test]
    fn blank_summary_is_absent() {
        let mut payload = input("x");
        payload.summary = Some("  ".into());
        assert_eq!(payload.into_draft(DEFAULT_MAX_PRICE).unwrap().summary, None);
    }

    #[test]
    fn price_rules() {
        assert_eq!(parse_price("price", Some(""), DEFAULT_MAX_PRICE).unwrap(), None);
        assert_eq!(parse_price("price", Some("0"), DEFAULT_MAX_PRICE).unwrap(), Some(0.0));
        assert_eq!(parse_price("price", Some("12.346"), DEFAULT_MAX_PRICE).unwrap(), Some(12.35));
        assert_matches!(parse_price("price", Some("-1"), DEFAULT_MAX_PRICE), Err(CoreError::Validation { .. }));
        assert_matches!(parse_price("price", Some("abc"), DEFAULT_MAX_PRICE), Err(CoreError::Validation { .. }));
        assert_matches!(parse_price("price", Some("NaN"), DEFAULT_MAX_PRICE), Err(CoreError::Validation { .. }));
        assert_matches!(
            parse_price("price", Some("100000000"), DEFAULT_MAX_PRICE),
            Err(CoreError::Validation { .. })
        );
        assert_eq!(
            parse_price("price", Some("99999999.99"), DEFAULT_MAX_PRICE).unwrap(),
            Some(99_999_999.99)
        );
    }

    #[test]
    fn price_bound_applies_after_rounding() {
        assert_matches!(
            parse_price("price", Some("99999999.995"), DEFAULT_MAX_PRICE),
            Err(CoreError::Validation { .. })
        );
        assert_matches!(parse_price("price", Some("499.996"), 500.0), Err(CoreError::Validation { .. }));
        assert_eq!(parse_price("price", Some("499.994"), 500.0).unwrap(), Some(499.99));
    }

    #[test]
    fn price_bound_never_exceeds_column_width() {
        assert_matches!(
            parse_price("price", Some("100000000"), 1e12),
            Err(CoreError::Validation { .. })
        );
    }

    #[test]
    fn price_bound_is_configurable() {
        assert_matches!(parse_price("price", Some("500"), 500.0), Err(CoreError::Validation { .. }));
        assert_eq!(parse_price("price", Some("499"), 500.0).unwrap(), Some(499.0));
    }

    #[test]
    fn invalid_price_names_the_field() {
        let mut payload = input("x");
        payload.price = Some("cheap".into());
        assert_eq!(field_of(payload.into_draft(DEFAULT_MAX_PRICE).unwrap_err()), "price");
    }

    #[test]
    fn date_rules() {
        assert_eq!(parse_date("purchase_date", None).unwrap(), None);
        assert_eq!(
            parse_date("purchase_date", Some("2024-02-29")).unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 29)
        );
        assert_matches!(parse_date("purchase_date", Some("2023-02-29")), Err(CoreError::Validation { .. }));
        assert_matches!(parse_date("purchase_date", Some("30/12/2023")), Err(CoreError::Validation { .. }));
    }

    #[test]
    fn flag_rules() {
        assert_eq!(parse_flag("is_r18", None).unwrap(), None);
        assert_eq!(parse_flag("is_r18", Some("on")).unwrap(), Some(true));
        assert_eq!(parse_flag("is_r18", Some("FALSE")).unwrap(), Some(false));
        assert_matches!(parse_flag("is_r18", Some("maybe")), Err(CoreError::Validation { .. }));
    }
}
