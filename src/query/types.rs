//! Normalized query descriptor handed to downstream services.

use std::fmt;

use serde::{Serialize, Serializer};
use serde_json::Value;

/// Wildcard field selection used when no `fields` are requested.
pub const ALL_FIELDS: &str = "*";

/// Sort direction for one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

/// One `sort` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Sort {
    pub column: String,
    pub order: SortOrder,
}

impl Sort {
    /// Parse a sort token; a leading `-` means descending.
    pub fn from_token(token: &str) -> Self {
        match token.strip_prefix('-') {
            Some(column) => Self {
                column: column.to_string(),
                order: SortOrder::Desc,
            },
            None => Self {
                column: token.to_string(),
                order: SortOrder::Asc,
            },
        }
    }

    /// Inverse of [`Sort::from_token`].
    pub fn to_token(&self) -> String {
        match self.order {
            SortOrder::Asc => self.column.clone(),
            SortOrder::Desc => format!("-{}", self.column),
        }
    }
}

/// Extra response information a caller may ask for via `meta`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Meta {
    /// Number of rows in the collection.
    TotalCount,
    /// Number of rows matching the filter.
    FilterCount,
}

impl Meta {
    /// Every recognized option, in declaration order.
    pub const ALL: [Meta; 2] = [Meta::TotalCount, Meta::FilterCount];

    pub fn as_str(&self) -> &'static str {
        match self {
            Meta::TotalCount => "total_count",
            Meta::FilterCount => "filter_count",
        }
    }

    /// Identifiers of every recognized option.
    pub fn all_names() -> Vec<String> {
        Self::ALL.iter().map(|m| m.as_str().to_string()).collect()
    }
}

impl fmt::Display for Meta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A leniently coerced number.
///
/// Coercion never fails: input that is not a number becomes NaN and is
/// passed through for downstream services to reject.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Numeric(f64);

impl Numeric {
    pub fn new(value: f64) -> Self {
        Self(value)
    }

    /// Coerce text to a number.
    ///
    /// Surrounding whitespace is ignored, empty text is zero, decimal and
    /// exponent forms parse as floats, `0x`/`0o`/`0b` prefixes select a
    /// radix, and `Infinity` is accepted with an optional sign.
    pub fn coerce(raw: &str) -> Self {
        let text = raw.trim();
        if text.is_empty() {
            return Self(0.0);
        }

        let value = match text {
            "Infinity" | "+Infinity" => f64::INFINITY,
            "-Infinity" => f64::NEG_INFINITY,
            _ => match radix_prefix(text) {
                Some((radix, digits)) => parse_radix(digits, radix),
                None if is_decimal_literal(text) => text.parse().unwrap_or(f64::NAN),
                None => f64::NAN,
            },
        };
        Self(value)
    }

    pub fn value(self) -> f64 {
        self.0
    }

    pub fn is_nan(self) -> bool {
        self.0.is_nan()
    }

    /// The value as an integer, if it is a finite whole number.
    pub fn as_i64(self) -> Option<i64> {
        let v = self.0;
        (v.is_finite() && v.fract() == 0.0 && v.abs() <= MAX_SAFE_INTEGER).then_some(v as i64)
    }
}

const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

fn radix_prefix(text: &str) -> Option<(u32, &str)> {
    let radix = match text.get(..2)? {
        "0x" | "0X" => 16,
        "0o" | "0O" => 8,
        "0b" | "0B" => 2,
        _ => return None,
    };
    Some((radix, &text[2..]))
}

fn parse_radix(digits: &str, radix: u32) -> f64 {
    if digits.is_empty() {
        return f64::NAN;
    }
    digits
        .chars()
        .try_fold(0.0_f64, |acc, c| {
            c.to_digit(radix).map(|d| acc * f64::from(radix) + f64::from(d))
        })
        .unwrap_or(f64::NAN)
}

// `f64::from_str` also accepts "inf" and "nan"; those are not numbers here.
fn is_decimal_literal(text: &str) -> bool {
    text.bytes()
        .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'e' | b'E' | b'+' | b'-'))
}

impl Serialize for Numeric {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.as_i64() {
            Some(int) => serializer.serialize_i64(int),
            None if self.0.is_finite() => serializer.serialize_f64(self.0),
            None => serializer.serialize_none(),
        }
    }
}

impl From<i64> for Numeric {
    fn from(value: i64) -> Self {
        Self(value as f64)
    }
}

/// The normalized query.
///
/// `fields` is always populated; every other member is set only when the
/// matching parameter was supplied.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Query {
    pub fields: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<Numeric>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<Vec<Sort>>,

    /// Opaque predicate tree; not validated here.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<Numeric>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<Numeric>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub single: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
}

impl Default for Query {
    fn default() -> Self {
        Self {
            fields: vec![ALL_FIELDS.to_string()],
            limit: None,
            sort: None,
            filter: None,
            offset: None,
            page: None,
            single: None,
            meta: None,
            search: None,
        }
    }
}
