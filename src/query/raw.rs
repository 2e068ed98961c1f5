//! Raw query-string input.
//!
//! # Responsibilities
//! - Decode `application/x-www-form-urlencoded` query strings
//! - Collapse repeated keys into ordered lists
//! - Build nested objects from bracket notation (`filter[status][_eq]=x`)
//!
//! # Design Decisions
//! - Every field is one closed shape: single string, list, or object
//! - Absence is `Option::None`, never a fourth variant
//! - Conflicting shapes for one key keep the first shape and drop the rest

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use serde_json::{Map, Value};

/// Nesting depth honored for bracket keys; deeper segments stay literal.
const MAX_DEPTH: usize = 5;

/// One raw query parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    /// `key=value`
    Single(String),
    /// `key=a&key=b` or `key[]=a`
    Many(Vec<String>),
    /// `key[a][b]=value`
    Object(Map<String, Value>),
}

impl RawValue {
    /// Whether the value counts as supplied.
    ///
    /// An empty `key=` is treated like a missing key; lists and objects
    /// always count, even when empty.
    pub fn is_truthy(&self) -> bool {
        match self {
            RawValue::Single(s) => !s.is_empty(),
            RawValue::Many(_) | RawValue::Object(_) => true,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            RawValue::Single(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::Single(value.to_string())
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        RawValue::Single(value)
    }
}

impl From<Vec<String>> for RawValue {
    fn from(values: Vec<String>) -> Self {
        RawValue::Many(values)
    }
}

impl From<Vec<&str>> for RawValue {
    fn from(values: Vec<&str>) -> Self {
        RawValue::Many(values.into_iter().map(str::to_string).collect())
    }
}

impl From<Map<String, Value>> for RawValue {
    fn from(map: Map<String, Value>) -> Self {
        RawValue::Object(map)
    }
}

/// Untyped bag of query parameters for one request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawInput {
    values: HashMap<String, RawValue>,
}

impl RawInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a URL query string (with or without the leading `?`).
    pub fn from_query_str(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        let mut input = Self::new();
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            input.push(&key, value.into_owned());
        }
        input
    }

    /// Builder-style insert, replacing any existing value.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<RawValue>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Raw lookup, including empty values.
    pub fn get(&self, key: &str) -> Option<&RawValue> {
        self.values.get(key)
    }

    /// Lookup that treats empty values as absent.
    pub fn present(&self, key: &str) -> Option<&RawValue> {
        self.values.get(key).filter(|v| v.is_truthy())
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Add one decoded `key=value` pair, honoring bracket notation.
    pub fn push(&mut self, key: &str, value: String) {
        let (root, path) = split_key(key);
        match path.as_slice() {
            [] => self.append(root, value, false),
            [Segment::Push] => self.append(root, value, true),
            _ => self.insert_nested(root, &path, value),
        }
    }

    fn append(&mut self, root: String, value: String, as_list: bool) {
        match self.values.entry(root) {
            Entry::Vacant(slot) => {
                slot.insert(if as_list {
                    RawValue::Many(vec![value])
                } else {
                    RawValue::Single(value)
                });
            }
            Entry::Occupied(slot) => {
                let existing = slot.into_mut();
                match existing {
                    RawValue::Single(first) => {
                        let first = std::mem::take(first);
                        *existing = RawValue::Many(vec![first, value]);
                    }
                    RawValue::Many(values) => values.push(value),
                    RawValue::Object(_) => {
                        tracing::debug!("Ignoring flat value for object parameter");
                    }
                }
            }
        }
    }

    fn insert_nested(&mut self, root: String, path: &[Segment], value: String) {
        let entry = self
            .values
            .entry(root)
            .or_insert_with(|| RawValue::Object(Map::new()));
        match entry {
            RawValue::Object(map) => place(map, path, value),
            _ => tracing::debug!("Ignoring nested value for flat parameter"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Key(String),
    Push,
}

/// Split `a[b][c]` into `("a", [b, c])`.
fn split_key(key: &str) -> (String, Vec<Segment>) {
    let open = match key.find('[') {
        Some(open) if open > 0 => open,
        _ => return (key.to_string(), Vec::new()),
    };

    let mut segments = Vec::new();
    let mut rest = &key[open..];
    while let Some(inner) = rest.strip_prefix('[') {
        if segments.len() == MAX_DEPTH {
            break;
        }
        let Some(close) = inner.find(']') else { break };
        let name = &inner[..close];
        segments.push(if name.is_empty() {
            Segment::Push
        } else {
            Segment::Key(name.to_string())
        });
        rest = &inner[close + 1..];
    }

    if !rest.is_empty() {
        segments.push(Segment::Key(rest.to_string()));
    }

    // `[]` may only close a path; `a[][b]` and `a[b][][c]` stay literal.
    let push_inside = segments
        .iter()
        .rev()
        .skip(1)
        .any(|segment| *segment == Segment::Push);
    if segments.is_empty() || push_inside {
        return (key.to_string(), Vec::new());
    }
    (key[..open].to_string(), segments)
}

fn place(map: &mut Map<String, Value>, path: &[Segment], value: String) {
    match path {
        [Segment::Key(key)] => append_leaf(map, key, value, false),
        [Segment::Key(key), Segment::Push] => append_leaf(map, key, value, true),
        [Segment::Key(key), rest @ ..] => {
            let child = map
                .entry(key.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(child) = child {
                place(child, rest, value);
            }
        }
        _ => tracing::debug!("Ignoring unsupported bracket path"),
    }
}

fn append_leaf(map: &mut Map<String, Value>, key: &str, value: String, as_list: bool) {
    let value = Value::String(value);
    match map.get_mut(key) {
        None => {
            let leaf = if as_list { Value::Array(vec![value]) } else { value };
            map.insert(key.to_string(), leaf);
        }
        Some(Value::Array(items)) => items.push(value),
        Some(slot) if slot.is_string() => {
            let first = slot.take();
            *slot = Value::Array(vec![first, value]);
        }
        Some(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_single_and_repeated_keys() {
        let input = RawInput::from_query_str("fields=a,b&sort=name&sort=-age");
        assert_eq!(input.get("fields"), Some(&RawValue::from("a,b")));
        assert_eq!(input.get("sort"), Some(&RawValue::from(vec!["name", "-age"])));
        assert_eq!(input.get("limit"), None);
    }

    #[test]
    fn test_leading_question_mark_and_decoding() {
        let input = RawInput::from_query_str("?search=hello%20world&filter=%7B%22a%22%3A1%7D");
        assert_eq!(input.get("search"), Some(&RawValue::from("hello world")));
        assert_eq!(input.get("filter"), Some(&RawValue::from(r#"{"a":1}"#)));
    }

    #[test]
    fn test_push_brackets_build_list() {
        let input = RawInput::from_query_str("fields[]=title&fields[]=author.name");
        assert_eq!(
            input.get("fields"),
            Some(&RawValue::from(vec!["title", "author.name"]))
        );
    }

    #[test]
    fn test_nested_brackets_build_object() {
        let input = RawInput::from_query_str(
            "filter[status][_eq]=published&filter[id][_in][]=1&filter[id][_in][]=2",
        );
        let Some(RawValue::Object(map)) = input.get("filter") else {
            panic!("expected object filter");
        };
        assert_eq!(
            Value::Object(map.clone()),
            json!({"status": {"_eq": "published"}, "id": {"_in": ["1", "2"]}})
        );
    }

    #[test]
    fn test_unbalanced_brackets_stay_literal() {
        let input = RawInput::from_query_str("a[b=1&[x]=2");
        assert_eq!(input.get("a[b"), Some(&RawValue::from("1")));
        assert_eq!(input.get("[x]"), Some(&RawValue::from("2")));
    }

    #[test]
    fn test_inner_push_brackets_stay_literal() {
        let input = RawInput::from_query_str("filter[][a]=1&meta[x][][y]=2&fields[][x]=3");
        assert_eq!(input.get("filter"), None);
        assert_eq!(input.get("filter[][a]"), Some(&RawValue::from("1")));
        assert_eq!(input.get("meta"), None);
        assert_eq!(input.get("meta[x][][y]"), Some(&RawValue::from("2")));
        assert_eq!(input.get("fields"), None);

        let (root, path) = split_key("f[a][b][c][d][][x]");
        assert_eq!(root, "f[a][b][c][d][][x]");
        assert!(path.is_empty());
    }

    #[test]
    fn test_depth_limit_keeps_remainder() {
        let (root, path) = split_key("f[a][b][c][d][e][g][h]");
        assert_eq!(root, "f");
        assert_eq!(path.len(), MAX_DEPTH + 1);
        assert_eq!(path[MAX_DEPTH], Segment::Key("[g][h]".to_string()));
    }

    #[test]
    fn test_shape_conflict_keeps_first_shape() {
        let input = RawInput::from_query_str("filter[a]=1&filter=raw");
        assert!(matches!(input.get("filter"), Some(RawValue::Object(_))));

        let input = RawInput::from_query_str("filter=raw&filter[a]=1");
        assert_eq!(input.get("filter"), Some(&RawValue::from("raw")));
    }

    #[test]
    fn test_empty_value_is_not_present() {
        let input = RawInput::from_query_str("limit=&single=false");
        assert!(input.get("limit").is_some());
        assert!(input.present("limit").is_none());
        assert!(input.present("single").is_some());
    }
}
