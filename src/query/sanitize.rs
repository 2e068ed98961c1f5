//! Query normalization.
//!
//! # Data Flow
//! ```text
//! RawInput
//!     → one normalizer per field (pure, independent)
//!     → Normalized<T> per field (value, or degraded value + reason)
//!     → Query assembled, `limit=-1` removes the limit
//!     → permission filter merged last
//! ```
//!
//! # Design Decisions
//! - Never fails: bad input degrades to a raw pass-through, NaN, or unset
//! - The only side effect is a warning when `filter` is not valid JSON
//! - Downstream services own semantic validation

use serde_json::{Map, Value};
use thiserror::Error;

use crate::query::raw::{RawInput, RawValue};
use crate::query::types::{Meta, Numeric, Query, Sort, ALL_FIELDS};
use crate::security::permissions::Permissions;

/// Recognized parameter names.
pub mod params {
    pub const FIELDS: &str = "fields";
    pub const LIMIT: &str = "limit";
    pub const SORT: &str = "sort";
    pub const FILTER: &str = "filter";
    pub const OFFSET: &str = "offset";
    pub const PAGE: &str = "page";
    pub const SINGLE: &str = "single";
    pub const META: &str = "meta";
    pub const SEARCH: &str = "search";
}

/// Literal limit meaning "no limit".
const UNLIMITED: &str = "-1";

/// Why a field could not be normalized cleanly.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DegradeReason {
    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    #[error("not a number: {0:?}")]
    NotANumber(String),

    #[error("expected a string or a list, got an object")]
    UnexpectedObject,

    #[error("expected a string")]
    NotAString,
}

/// Outcome of normalizing one field.
#[derive(Debug, Clone, PartialEq)]
pub enum Normalized<T> {
    Ok(T),
    /// The field is still set to `value`, but it is a best-effort stand-in.
    Degraded { value: T, reason: DegradeReason },
}

impl<T> Normalized<T> {
    pub fn value(&self) -> &T {
        match self {
            Normalized::Ok(value) | Normalized::Degraded { value, .. } => value,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            Normalized::Ok(value) | Normalized::Degraded { value, .. } => value,
        }
    }

    pub fn reason(&self) -> Option<&DegradeReason> {
        match self {
            Normalized::Ok(_) => None,
            Normalized::Degraded { reason, .. } => Some(reason),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.reason().is_some()
    }

    fn map<U>(self, f: impl FnOnce(T) -> U) -> Normalized<U> {
        match self {
            Normalized::Ok(value) => Normalized::Ok(f(value)),
            Normalized::Degraded { value, reason } => Normalized::Degraded {
                value: f(value),
                reason,
            },
        }
    }
}

/// A degraded field, recorded for observability.
#[derive(Debug, Clone, PartialEq)]
pub struct Degradation {
    pub field: &'static str,
    pub reason: DegradeReason,
}

/// A normalized query plus the fields that degraded on the way.
#[derive(Debug, Clone, PartialEq)]
pub struct Sanitized {
    pub query: Query,
    pub degraded: Vec<Degradation>,
}

/// Normalize raw parameters into a [`Query`].
pub fn sanitize(raw: &RawInput, permissions: Option<&Permissions>) -> Query {
    sanitize_with_report(raw, permissions).query
}

/// Like [`sanitize`], also reporting degraded fields.
pub fn sanitize_with_report(raw: &RawInput, permissions: Option<&Permissions>) -> Sanitized {
    let mut report = Report::default();

    let mut query = Query {
        fields: report.take(params::FIELDS, sanitize_fields(raw.present(params::FIELDS))),
        ..Query::default()
    };

    if let Some(limit) = raw.present(params::LIMIT) {
        query.limit = Some(report.take(params::LIMIT, coerce_number(limit)));
    }

    if let Some(sort) = raw.present(params::SORT) {
        query.sort = Some(report.take(params::SORT, sanitize_sort(sort)));
    }

    if let Some(filter) = raw.present(params::FILTER) {
        let filter = sanitize_filter(filter);
        if let Some(reason) = filter.reason() {
            tracing::warn!(error = %reason, "Invalid value passed for filter query parameter.");
        }
        query.filter = Some(report.take(params::FILTER, filter));
    }

    if let Some(offset) = raw.present(params::OFFSET) {
        query.offset = Some(report.take(params::OFFSET, coerce_number(offset)));
    }

    if let Some(page) = raw.present(params::PAGE) {
        query.page = Some(report.take(params::PAGE, coerce_number(page)));
    }

    if raw.present(params::SINGLE).is_some() {
        query.single = Some(true);
    }

    if let Some(meta) = raw.present(params::META) {
        query.meta = report.take(params::META, sanitize_meta(meta));
    }

    if let Some(search) = raw.present(params::SEARCH) {
        query.search = report.take(params::SEARCH, sanitize_search(search));
    }

    if is_unlimited(raw.get(params::LIMIT)) {
        query.limit = None;
    }

    if let Some(permissions) = permissions {
        query.filter = Some(merge_permissions(query.filter.take(), permissions));
    }

    Sanitized {
        query,
        degraded: report.degraded,
    }
}

#[derive(Default)]
struct Report {
    degraded: Vec<Degradation>,
}

impl Report {
    fn take<T>(&mut self, field: &'static str, outcome: Normalized<T>) -> T {
        match outcome {
            Normalized::Ok(value) => value,
            Normalized::Degraded { value, reason } => {
                self.degraded.push(Degradation { field, reason });
                value
            }
        }
    }
}

/// `fields`: comma list or repeated parameter; defaults to `["*"]`.
pub fn sanitize_fields(raw: Option<&RawValue>) -> Normalized<Vec<String>> {
    match raw {
        None => Normalized::Ok(vec![ALL_FIELDS.to_string()]),
        Some(RawValue::Single(s)) => Normalized::Ok(split_list(s)),
        Some(RawValue::Many(fields)) => Normalized::Ok(fields.clone()),
        Some(RawValue::Object(_)) => Normalized::Degraded {
            value: vec![ALL_FIELDS.to_string()],
            reason: DegradeReason::UnexpectedObject,
        },
    }
}

/// `sort`: tokens in order, `-column` sorts descending.
pub fn sanitize_sort(raw: &RawValue) -> Normalized<Vec<Sort>> {
    let tokens = match raw {
        RawValue::Single(s) => Normalized::Ok(split_list(s)),
        RawValue::Many(tokens) => Normalized::Ok(tokens.clone()),
        RawValue::Object(_) => Normalized::Degraded {
            value: Vec::new(),
            reason: DegradeReason::UnexpectedObject,
        },
    };
    tokens.map(|tokens| tokens.iter().map(|t| Sort::from_token(t)).collect())
}

/// `filter`: JSON text is parsed; structured input passes through untouched.
///
/// Unparseable text is kept as a JSON string.
pub fn sanitize_filter(raw: &RawValue) -> Normalized<Value> {
    match raw {
        RawValue::Single(text) => match serde_json::from_str(text) {
            Ok(filter) => Normalized::Ok(filter),
            Err(e) => Normalized::Degraded {
                value: Value::String(text.clone()),
                reason: DegradeReason::InvalidJson(e.to_string()),
            },
        },
        RawValue::Many(items) => {
            Normalized::Ok(Value::Array(items.iter().cloned().map(Value::String).collect()))
        }
        RawValue::Object(map) => Normalized::Ok(Value::Object(map.clone())),
    }
}

/// `limit`, `offset`, `page`: lenient numeric coercion, NaN on junk.
pub fn coerce_number(raw: &RawValue) -> Normalized<Numeric> {
    let text = match raw {
        RawValue::Single(s) => s.as_str(),
        RawValue::Many(items) => match items.as_slice() {
            [] => "",
            [only] => only.as_str(),
            _ => return not_a_number(items.join(",")),
        },
        RawValue::Object(_) => return not_a_number("[object]".to_string()),
    };

    let number = Numeric::coerce(text);
    if number.is_nan() {
        not_a_number(text.to_string())
    } else {
        Normalized::Ok(number)
    }
}

fn not_a_number(text: String) -> Normalized<Numeric> {
    Normalized::Degraded {
        value: Numeric::new(f64::NAN),
        reason: DegradeReason::NotANumber(text),
    }
}

/// `meta`: `*` selects every option, otherwise a comma list or repeated
/// parameter. A lone token becomes a one-element list.
pub fn sanitize_meta(raw: &RawValue) -> Normalized<Option<Vec<String>>> {
    match raw {
        RawValue::Single(s) if s == "*" => Normalized::Ok(Some(Meta::all_names())),
        RawValue::Single(s) => Normalized::Ok(Some(split_list(s))),
        RawValue::Many(options) => Normalized::Ok(Some(options.clone())),
        RawValue::Object(_) => Normalized::Degraded {
            value: None,
            reason: DegradeReason::UnexpectedObject,
        },
    }
}

/// `search`: kept only when it is a plain string.
pub fn sanitize_search(raw: &RawValue) -> Normalized<Option<String>> {
    match raw.as_str() {
        Some(search) => Normalized::Ok(Some(search.to_string())),
        None => Normalized::Degraded {
            value: None,
            reason: DegradeReason::NotAString,
        },
    }
}

/// `limit=-1`, or a single repeated `-1`, means "no limit".
fn is_unlimited(raw: Option<&RawValue>) -> bool {
    match raw {
        Some(RawValue::Single(s)) => s == UNLIMITED,
        Some(RawValue::Many(items)) => matches!(items.as_slice(), [only] if only == UNLIMITED),
        _ => false,
    }
}

/// Shallow union of the user filter and the permission filter.
///
/// Permission keys win. A user filter that is not an object (for example an
/// unparsed string) is dropped; the permission filter still applies.
fn merge_permissions(filter: Option<Value>, permissions: &Permissions) -> Value {
    let mut merged = match filter {
        Some(Value::Object(map)) => map,
        Some(other) => {
            tracing::debug!(filter = %other, "Dropping non-object filter before permission merge");
            Map::new()
        }
        None => Map::new(),
    };

    if let Some(rules) = &permissions.permissions {
        for (key, rule) in rules {
            merged.insert(key.clone(), rule.clone());
        }
    }

    Value::Object(merged)
}

fn split_list(s: &str) -> Vec<String> {
    s.split(',').map(str::to_string).collect()
}
