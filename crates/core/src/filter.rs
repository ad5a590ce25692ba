//! Multi-criteria work filtering.
//!
//! A [`WorkFilter`] is a set of independent, optional criteria. A work is
//! kept when it satisfies every criterion that is set (logical AND); the
//! `tags` criterion alone matches when *any* of the work's tags matches.
//!
//! Missing values are asymmetric: a work without a price, date, author, etc.
//! fails any criterion set on that field instead of passing it.
//!
//! [`filter_works`] is the reference evaluation. The repository layer also
//! translates a `WorkFilter` into SQL; both must select the same works.

use chrono::NaiveDate;
use serde::Deserialize;

use crate::error::CoreError;
use crate::extra::{flatten_extra, ExtraAttributes};
use crate::work::{parse_date, parse_flag};

// ---------------------------------------------------------------------------
// Filterable
// ---------------------------------------------------------------------------

/// Read access to the fields of a work that criteria are evaluated against.
pub trait Filterable {
    fn title(&self) -> &str;
    fn author_name(&self) -> Option<&str>;
    fn circle_name(&self) -> Option<&str>;
    fn event_name(&self) -> Option<&str>;
    fn summary(&self) -> Option<&str>;
    fn tag_names(&self) -> &[String];
    fn extra(&self) -> &ExtraAttributes;
    fn price(&self) -> Option<f64>;
    fn purchase_date(&self) -> Option<NaiveDate>;
    fn is_r18(&self) -> bool;
}

impl<T: Filterable + ?Sized> Filterable for &T {
    fn title(&self) -> &str {
        (**self).title()
    }
    fn author_name(&self) -> Option<&str> {
        (**self).author_name()
    }
    fn circle_name(&self) -> Option<&str> {
        (**self).circle_name()
    }
    fn event_name(&self) -> Option<&str> {
        (**self).event_name()
    }
    fn summary(&self) -> Option<&str> {
        (**self).summary()
    }
    fn tag_names(&self) -> &[String] {
        (**self).tag_names()
    }
    fn extra(&self) -> &ExtraAttributes {
        (**self).extra()
    }
    fn price(&self) -> Option<f64> {
        (**self).price()
    }
    fn purchase_date(&self) -> Option<NaiveDate> {
        (**self).purchase_date()
    }
    fn is_r18(&self) -> bool {
        (**self).is_r18()
    }
}

// ---------------------------------------------------------------------------
// Criteria
// ---------------------------------------------------------------------------

/// Tri-state constraint on the `is_r18` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum R18Filter {
    #[default]
    Any,
    Only,
    Exclude,
}

impl R18Filter {
    /// Parse `any` (or blank) / a truthy value / a falsy value.
    pub fn parse(raw: Option<&str>) -> Result<Self, CoreError> {
        match raw.map(str::trim) {
            None | Some("") => Ok(Self::Any),
            Some(s) if s.eq_ignore_ascii_case("any") => Ok(Self::Any),
            Some(s) => Ok(match parse_flag("is_r18", Some(s))? {
                Some(true) => Self::Only,
                Some(false) => Self::Exclude,
                None => Self::Any,
            }),
        }
    }

    pub fn admits(self, is_r18: bool) -> bool {
        match self {
            Self::Any => true,
            Self::Only => is_r18,
            Self::Exclude => !is_r18,
        }
    }
}

/// Raw filter criteria as received on the query string.
///
/// Every field is optional text; blank values impose no constraint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkFilterParams {
    pub title: Option<String>,
    #[serde(alias = "authorName")]
    pub author_name: Option<String>,
    #[serde(alias = "circleName")]
    pub circle_name: Option<String>,
    pub summary: Option<String>,
    #[serde(alias = "eventName")]
    pub event_name: Option<String>,
    pub tags: Option<String>,
    #[serde(alias = "extraText")]
    pub extra_text: Option<String>,
    #[serde(alias = "priceMin")]
    pub price_min: Option<String>,
    #[serde(alias = "priceMax")]
    pub price_max: Option<String>,
    #[serde(alias = "dateFrom")]
    pub date_from: Option<String>,
    #[serde(alias = "dateTo")]
    pub date_to: Option<String>,
    #[serde(alias = "isR18")]
    pub is_r18: Option<String>,
}

/// Validated filter criteria. `None` means "no constraint".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkFilter {
    pub title: Option<String>,
    pub author_name: Option<String>,
    pub circle_name: Option<String>,
    pub summary: Option<String>,
    pub event_name: Option<String>,
    pub tags: Option<String>,
    pub extra_text: Option<String>,
    pub price_min: Option<f64>,
    pub price_max: Option<f64>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub r18: R18Filter,
}

impl WorkFilter {
    /// Validate raw query parameters. Malformed bounds are rejected here so
    /// that evaluation itself can never fail.
    pub fn from_params(params: WorkFilterParams) -> Result<Self, CoreError> {
        Ok(Self {
            title: non_blank(params.title),
            author_name: non_blank(params.author_name),
            circle_name: non_blank(params.circle_name),
            summary: non_blank(params.summary),
            event_name: non_blank(params.event_name),
            tags: non_blank(params.tags),
            extra_text: non_blank(params.extra_text),
            price_min: parse_bound("price_min", params.price_min.as_deref())?,
            price_max: parse_bound("price_max", params.price_max.as_deref())?,
            date_from: parse_date("date_from", params.date_from.as_deref())?,
            date_to: parse_date("date_to", params.date_to.as_deref())?,
            r18: R18Filter::parse(params.is_r18.as_deref())?,
        })
    }

    /// True when no criterion is set.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Evaluate every set criterion against one work.
    pub fn matches<W: Filterable>(&self, work: &W) -> bool {
        text_matches(self.title.as_deref(), Some(work.title()))
            && text_matches(self.author_name.as_deref(), work.author_name())
            && text_matches(self.circle_name.as_deref(), work.circle_name())
            && text_matches(self.summary.as_deref(), work.summary())
            && text_matches(self.event_name.as_deref(), work.event_name())
            && self.tags_match(work.tag_names())
            && self.extra_matches(work.extra())
            && lower_bound(self.price_min, work.price())
            && upper_bound(self.price_max, work.price())
            && lower_bound(self.date_from, work.purchase_date())
            && upper_bound(self.date_to, work.purchase_date())
            && self.r18.admits(work.is_r18())
    }

    fn tags_match(&self, tag_names: &[String]) -> bool {
        match self.tags.as_deref() {
            None => true,
            Some(needle) => tag_names.iter().any(|t| contains_ci(t, needle)),
        }
    }

    fn extra_matches(&self, extra: &ExtraAttributes) -> bool {
        match self.extra_text.as_deref() {
            None => true,
            Some(needle) => contains_ci(&flatten_extra(extra), needle),
        }
    }
}

/// Keep the works that satisfy every criterion, preserving input order.
pub fn filter_works<W, I>(works: I, filter: &WorkFilter) -> Vec<W>
where
    W: Filterable,
    I: IntoIterator<Item = W>,
{
    works.into_iter().filter(|w| filter.matches(w)).collect()
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn non_blank(raw: Option<String>) -> Option<String> {
    raw.filter(|s| !s.trim().is_empty())
}

fn parse_bound(field: &str, raw: Option<&str>) -> Result<Option<f64>, CoreError> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(Some(v)),
        _ => Err(CoreError::validation(
            field,
            format!("'{raw}' is not a valid number"),
        )),
    }
}

/// Case-insensitive substring test.
pub fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn text_matches(needle: Option<&str>, value: Option<&str>) -> bool {
    match (needle, value) {
        (None, _) => true,
        (Some(_), None) => false,
        (Some(n), Some(v)) => contains_ci(v, n),
    }
}

fn lower_bound<T: PartialOrd>(bound: Option<T>, value: Option<T>) -> bool {
    match (bound, value) {
        (None, _) => true,
        (Some(_), None) => false,
        (Some(b), Some(v)) => v >= b,
    }
}

fn upper_bound<T: PartialOrd>(bound: Option<T>, value: Option<T>) -> bool {
    match (bound, value) {
        (None, _) => true,
        (Some(_), None) => false,
        (Some(b), Some(v)) => v <= b,
    }
}
