// src/document/mod.rs

//! Document values and selectors.
//!
//! - [`DocValue`] is the recursive value type stored in documents, used for
//!   document ids, selector conditions and update payloads.
//! - [`Selector`] is the query predicate naming a migration's target
//!   documents. Real stores translate it into their own query language; the
//!   in-memory store evaluates it with [`matcher`].

pub mod matcher;

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::StoreResult;
use crate::types::Identifier;

/// Field name holding a document's identifier.
pub const ID_FIELD: &str = "_id";

/// A document: field name to value.
pub type Document = BTreeMap<String, DocValue>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DocValue {
    Null,
    Bool(bool),
    /// Exact integers; listed before `Number` so untagged decoding keeps
    /// 64-bit ids intact.
    Int(i64),
    Number(f64),
    String(String),
    Array(Vec<DocValue>),
    Map(BTreeMap<String, DocValue>),
}

impl DocValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            DocValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, DocValue>> {
        match self {
            DocValue::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Value equality where integers and floats compare numerically.
    pub fn same_as(&self, other: &DocValue) -> bool {
        match (self, other) {
            (DocValue::Int(_), DocValue::Number(_)) | (DocValue::Number(_), DocValue::Int(_)) => {
                self.compare(other) == Some(Ordering::Equal)
            }
            _ => self == other,
        }
    }

    /// Ordering between two scalars of the same kind (integers and floats
    /// count as one kind); `None` otherwise.
    pub fn compare(&self, other: &DocValue) -> Option<Ordering> {
        match (self, other) {
            (DocValue::Int(a), DocValue::Int(b)) => Some(a.cmp(b)),
            (DocValue::Int(a), DocValue::Number(b)) => (*a as f64).partial_cmp(b),
            (DocValue::Number(a), DocValue::Int(b)) => a.partial_cmp(&(*b as f64)),
            (DocValue::Number(a), DocValue::Number(b)) => a.partial_cmp(b),
            (DocValue::String(a), DocValue::String(b)) => Some(a.cmp(b)),
            (DocValue::Bool(a), DocValue::Bool(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl fmt::Display for DocValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocValue::Null => f.write_str("null"),
            DocValue::Bool(b) => write!(f, "{b}"),
            DocValue::Int(n) => write!(f, "{n}"),
            DocValue::Number(n) => write!(f, "{n}"),
            DocValue::String(s) => f.write_str(s),
            DocValue::Array(_) | DocValue::Map(_) => {
                let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
                f.write_str(&json)
            }
        }
    }
}

impl From<&str> for DocValue {
    fn from(s: &str) -> Self {
        DocValue::String(s.to_string())
    }
}

impl From<String> for DocValue {
    fn from(s: String) -> Self {
        DocValue::String(s)
    }
}

impl From<bool> for DocValue {
    fn from(b: bool) -> Self {
        DocValue::Bool(b)
    }
}

impl From<f64> for DocValue {
    fn from(n: f64) -> Self {
        DocValue::Number(n)
    }
}

impl From<i64> for DocValue {
    fn from(n: i64) -> Self {
        DocValue::Int(n)
    }
}

impl From<i32> for DocValue {
    fn from(n: i32) -> Self {
        DocValue::Int(i64::from(n))
    }
}

impl<T: Into<DocValue>> From<Vec<T>> for DocValue {
    fn from(items: Vec<T>) -> Self {
        DocValue::Array(items.into_iter().map(Into::into).collect())
    }
}

impl From<BTreeMap<String, DocValue>> for DocValue {
    fn from(map: BTreeMap<String, DocValue>) -> Self {
        DocValue::Map(map)
    }
}

/// Build a document (or a nested map) from `(field, value)` pairs.
pub fn document<I, K, V>(pairs: I) -> Document
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<DocValue>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Query predicate over documents.
///
/// Keys are field paths (dotted paths reach into nested maps) or the
/// top-level combinators `$and` / `$or`. Values are either literals (equality)
/// or maps of `$`-operators.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Selector(BTreeMap<String, DocValue>);

impl Selector {
    /// The empty selector; matches every document.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: impl Into<String>, condition: impl Into<DocValue>) -> Self {
        self.0.insert(field.into(), condition.into());
        self
    }

    /// `{_id: {$in: ids}}`, the batched "any of these" lookup.
    pub fn id_in(ids: &[Identifier]) -> Self {
        let list = DocValue::Array(ids.iter().map(|id| DocValue::from(id.as_str())).collect());
        Self::all().with(ID_FIELD, document([("$in", list)]))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn conditions(&self) -> &BTreeMap<String, DocValue> {
        &self.0
    }

    /// Evaluate against one document.
    ///
    /// Fails with `StoreError::Query` on unsupported operators or malformed
    /// operator arguments.
    pub fn matches(&self, doc: &Document) -> StoreResult<bool> {
        matcher::matches(&self.0, doc)
    }
}

impl From<BTreeMap<String, DocValue>> for Selector {
    fn from(map: BTreeMap<String, DocValue>) -> Self {
        Selector(map)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = serde_json::to_string(&self.0).map_err(|_| fmt::Error)?;
        f.write_str(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_ids_display_bare() {
        assert_eq!(DocValue::from("one").to_string(), "one");
        assert_eq!(DocValue::from(3).to_string(), "3");
        assert_eq!(DocValue::from(2.5).to_string(), "2.5");
        assert_eq!(DocValue::from(vec!["a", "b"]).to_string(), r#"["a","b"]"#);
    }

    #[test]
    fn deserializes_from_toml_tables() {
        let selector: Selector = toml::from_str(
            r#"
time = { "$exists" = true }
kind = "event"
count = 3
"#,
        )
        .unwrap();

        let conditions = selector.conditions();
        assert_eq!(conditions["kind"], DocValue::from("event"));
        assert_eq!(conditions["count"], DocValue::Int(3));
        assert_eq!(
            conditions["time"],
            DocValue::Map(document([("$exists", true)]))
        );
    }

    #[test]
    fn large_integers_stay_exact() {
        let a = DocValue::from(9_007_199_254_740_993_i64);
        let b = DocValue::from(9_007_199_254_740_992_i64);
        assert_ne!(a, b);
        assert_eq!(a.to_string(), "9007199254740993");

        let decoded: DocValue = serde_json::from_str("9007199254740993").unwrap();
        assert_eq!(decoded, a);
        let float: DocValue = serde_json::from_str("2.5").unwrap();
        assert_eq!(float, DocValue::Number(2.5));
    }

    #[test]
    fn integers_and_floats_compare_numerically() {
        assert!(DocValue::from(3).same_as(&DocValue::from(3.0)));
        assert!(!DocValue::from(3).same_as(&DocValue::from(3.5)));
        assert_eq!(
            DocValue::from(3).compare(&DocValue::from(2.5)),
            Some(Ordering::Greater)
        );
    }

    #[test]
    fn id_in_builds_batched_lookup() {
        let selector = Selector::id_in(&["a".to_string(), "b".to_string()]);
        assert_eq!(selector.to_string(), r#"{"_id":{"$in":["a","b"]}}"#);
    }
}
