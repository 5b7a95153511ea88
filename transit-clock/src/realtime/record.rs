//! Structured feed rows with order-independent identity.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, NaiveDateTime};
use regex::Regex;
use serde_json::Value;

use super::error::RecordError;

/// A feed row exactly as delivered: field name to JSON value.
pub type RawRecord = serde_json::Map<String, Value>;

/// Normalized form of a JSON value used for equality and hashing.
///
/// Object fields are kept sorted by name, so two objects with the same
/// fields compare equal whatever order they were inserted in. Arrays keep
/// their order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Canonical {
    Null,
    Bool(bool),
    Number(String),
    String(String),
    List(Vec<Canonical>),
    Map(BTreeMap<String, Canonical>),
}

impl Canonical {
    fn of(value: &Value) -> Self {
        match value {
            Value::Null => Canonical::Null,
            Value::Bool(b) => Canonical::Bool(*b),
            Value::Number(n) => Canonical::Number(n.to_string()),
            Value::String(s) => Canonical::String(s.clone()),
            Value::Array(items) => Canonical::List(items.iter().map(Canonical::of).collect()),
            Value::Object(map) => Canonical::of_map(map),
        }
    }

    fn of_map(map: &RawRecord) -> Self {
        Canonical::Map(
            map.iter()
                .map(|(k, v)| (k.clone(), Canonical::of(v)))
                .collect(),
        )
    }
}

/// One row of a realtime dataset.
///
/// Equality and hashing are structural over the canonical form, so a set of
/// records never holds the same row twice.
#[derive(Debug, Clone)]
pub struct RealtimeRecord {
    raw: RawRecord,
    key: Canonical,
}

impl RealtimeRecord {
    pub fn new(raw: RawRecord) -> Self {
        let key = Canonical::of_map(&raw);
        Self { raw, key }
    }

    /// The value of `field`, if present.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.raw.get(field)
    }

    pub fn raw(&self) -> &RawRecord {
        &self.raw
    }
}

impl PartialEq for RealtimeRecord {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for RealtimeRecord {}

impl Hash for RealtimeRecord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl From<RawRecord> for RealtimeRecord {
    fn from(raw: RawRecord) -> Self {
        Self::new(raw)
    }
}

/// How a field value is compared in [`find_by_field`] style lookups.
///
/// [`find_by_field`]: super::RemoteRecordCache::find_by_field
#[derive(Debug, Clone)]
pub enum FieldMatcher {
    /// The field's text must equal the string.
    Exact(String),
    /// The pattern must match somewhere in the field's text.
    Pattern(Regex),
}

impl FieldMatcher {
    pub fn exact(value: impl Into<String>) -> Self {
        FieldMatcher::Exact(value.into())
    }

    /// Compile `pattern` into a [`FieldMatcher::Pattern`].
    pub fn pattern(pattern: &str) -> Result<Self, regex::Error> {
        Ok(FieldMatcher::Pattern(Regex::new(pattern)?))
    }

    /// Whether `value` satisfies the matcher.
    ///
    /// ```
    /// use serde_json::json;
    /// use transit_clock::realtime::FieldMatcher;
    ///
    /// assert!(FieldMatcher::exact("C8").matches(&json!("C8")));
    /// assert!(FieldMatcher::exact("42").matches(&json!(42)));
    /// assert!(FieldMatcher::pattern("^C").unwrap().matches(&json!("C9")));
    /// assert!(!FieldMatcher::exact("null").matches(&json!(null)));
    /// ```
    pub fn matches(&self, value: &Value) -> bool {
        let Some(text) = field_text(value) else {
            return false;
        };
        match self {
            FieldMatcher::Exact(expected) => text == expected.as_str(),
            FieldMatcher::Pattern(re) => re.is_match(&text),
        }
    }
}

impl From<Regex> for FieldMatcher {
    fn from(re: Regex) -> Self {
        FieldMatcher::Pattern(re)
    }
}

/// Strict typed access to the fields of one record.
///
/// Every failure names the dataset and the field at fault.
pub(crate) struct Fields<'a> {
    record: &'a RealtimeRecord,
    dataset: &'static str,
}

impl<'a> Fields<'a> {
    pub(crate) fn new(record: &'a RealtimeRecord, dataset: &'static str) -> Self {
        Self { record, dataset }
    }

    pub(crate) fn error(&self, field: &'static str, reason: impl Into<String>) -> RecordError {
        RecordError {
            dataset: self.dataset,
            field,
            reason: reason.into(),
        }
    }

    /// The field's scalar text. Missing and null are `None`; nested values
    /// are an error.
    pub(crate) fn optional_text(&self, field: &'static str) -> Result<Option<String>, RecordError> {
        match self.record.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => field_text(value)
                .map(|t| Some(t.into_owned()))
                .ok_or_else(|| self.error(field, "expected a scalar value")),
        }
    }

    pub(crate) fn text(&self, field: &'static str) -> Result<String, RecordError> {
        self.optional_text(field)?
            .ok_or_else(|| self.error(field, "missing"))
    }

    /// An integer given either as a JSON number or as numeric text. Empty
    /// text counts as absent.
    pub(crate) fn optional_int(&self, field: &'static str) -> Result<Option<i64>, RecordError> {
        match self.record.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) => n
                .as_i64()
                .map(Some)
                .ok_or_else(|| self.error(field, format!("not an integer: {n}"))),
            Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
            Some(Value::String(s)) => s
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| self.error(field, format!("not an integer: {s:?}"))),
            Some(_) => Err(self.error(field, "expected an integer")),
        }
    }

    pub(crate) fn int(&self, field: &'static str) -> Result<i64, RecordError> {
        self.optional_int(field)?
            .ok_or_else(|| self.error(field, "missing"))
    }

    pub(crate) fn optional_timestamp(
        &self,
        field: &'static str,
    ) -> Result<Option<NaiveDateTime>, RecordError> {
        match self.optional_text(field)? {
            None => Ok(None),
            Some(s) if s.trim().is_empty() => Ok(None),
            Some(s) => parse_timestamp(&s)
                .map(Some)
                .ok_or_else(|| self.error(field, format!("not a timestamp: {s:?}"))),
        }
    }

    pub(crate) fn timestamp(&self, field: &'static str) -> Result<NaiveDateTime, RecordError> {
        self.optional_timestamp(field)?
            .ok_or_else(|| self.error(field, "missing"))
    }
}

/// Parse the timestamp spellings seen in the feeds.
///
/// Timestamps carrying an offset keep their local wall-clock reading.
pub(crate) fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local());
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
}

/// Text form of a scalar value. Null, arrays and objects have none.
fn field_text(value: &Value) -> Option<Cow<'_, str>> {
    match value {
        Value::String(s) => Some(Cow::Borrowed(s)),
        Value::Number(n) => Some(Cow::Owned(n.to_string())),
        Value::Bool(b) => Some(Cow::Owned(b.to_string())),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;

    fn record(value: Value) -> RealtimeRecord {
        match value {
            Value::Object(map) => RealtimeRecord::new(map),
            other => panic!("not an object: {other}"),
        }
    }

    #[test]
    fn insertion_order_does_not_matter() {
        let mut a = RawRecord::new();
        a.insert("ligne".into(), json!("C8"));
        a.insert("coursetheorique".into(), json!("T1"));
        a.insert("nested".into(), json!({"x": 1, "y": [1, 2]}));

        let mut b = RawRecord::new();
        b.insert("nested".into(), json!({"y": [1, 2], "x": 1}));
        b.insert("coursetheorique".into(), json!("T1"));
        b.insert("ligne".into(), json!("C8"));

        let set: HashSet<_> = [RealtimeRecord::new(a), RealtimeRecord::new(b)]
            .into_iter()
            .collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn array_order_matters() {
        let a = record(json!({"listeobjet": [1, 2]}));
        let b = record(json!({"listeobjet": [2, 1]}));
        assert_ne!(a, b);
    }

    #[test]
    fn distinct_values_are_distinct() {
        let a = record(json!({"id": 1}));
        let b = record(json!({"id": "1"}));
        let c = record(json!({"id": null}));
        assert_ne!(a, b);
        assert_ne!(b, c);
        assert_ne!(a, c);
    }

    #[test]
    fn exact_matcher() {
        let m = FieldMatcher::exact("C8");
        assert!(m.matches(&json!("C8")));
        assert!(!m.matches(&json!("C89")));
        assert!(!m.matches(&json!(["C8"])));
        assert!(FieldMatcher::exact("true").matches(&json!(true)));
    }

    #[test]
    fn pattern_matcher_searches() {
        let m = FieldMatcher::pattern("8").unwrap();
        assert!(m.matches(&json!("C8")));
        assert!(m.matches(&json!(18)));
        assert!(!m.matches(&json!("C9")));
        assert!(!m.matches(&json!(null)));
        assert!(!m.matches(&json!({"ligne": "C8"})));
    }

    #[test]
    fn invalid_pattern() {
        assert!(FieldMatcher::pattern("(").is_err());
    }

    #[test]
    fn timestamps() {
        let expected = chrono::NaiveDate::from_ymd_opt(2024, 3, 15)
            .unwrap()
            .and_hms_opt(8, 30, 0)
            .unwrap();
        assert_eq!(parse_timestamp("2024-03-15 08:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-15T08:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-15T08:30:00+01:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-15 08:30"), Some(expected));
        assert_eq!(parse_timestamp("08:30"), None);
    }

    #[test]
    fn strict_fields() {
        let r = record(json!({
            "id": "12",
            "n": 7,
            "empty": "",
            "nothing": null,
            "nested": {"a": 1},
            "when": "2024-03-15 08:30:00",
        }));
        let fields = Fields::new(&r, "test");

        assert_eq!(fields.int("id").unwrap(), 12);
        assert_eq!(fields.int("n").unwrap(), 7);
        assert_eq!(fields.text("n").unwrap(), "7");
        assert_eq!(fields.optional_int("empty").unwrap(), None);
        assert_eq!(fields.optional_text("nothing").unwrap(), None);
        assert!(fields.timestamp("when").is_ok());

        let err = fields.text("missing").unwrap_err();
        assert_eq!(err.field, "missing");
        assert_eq!(err.dataset, "test");
        assert!(fields.text("nested").is_err());
        assert!(fields.int("when").is_err());
        assert!(fields.timestamp("id").is_err());
    }
}
