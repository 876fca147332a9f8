// src/document/matcher.rs

//! Reference evaluation of selectors against in-memory documents.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use regex::Regex;

use crate::document::{DocValue, Document};
use crate::errors::{StoreError, StoreResult};

pub(crate) fn matches(selector: &BTreeMap<String, DocValue>, doc: &Document) -> StoreResult<bool> {
    for (key, condition) in selector {
        let ok = match key.as_str() {
            "$and" => {
                let mut all = true;
                for clause in clauses(key, condition)? {
                    if !matches(clause, doc)? {
                        all = false;
                        break;
                    }
                }
                all
            }
            "$or" => {
                let mut any = false;
                for clause in clauses(key, condition)? {
                    if matches(clause, doc)? {
                        any = true;
                        break;
                    }
                }
                any
            }
            op if op.starts_with('$') => return Err(unsupported(op)),
            path => field_matches(lookup(doc, path), condition)?,
        };

        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Resolve a dotted path inside a document.
pub fn lookup<'a>(doc: &'a Document, path: &str) -> Option<&'a DocValue> {
    let mut parts = path.split('.');
    let mut current = doc.get(parts.next()?)?;
    for part in parts {
        current = current.as_map()?.get(part)?;
    }
    Some(current)
}

fn clauses<'a>(
    op: &str,
    condition: &'a DocValue,
) -> StoreResult<Vec<&'a BTreeMap<String, DocValue>>> {
    let DocValue::Array(items) = condition else {
        return Err(StoreError::Query(format!("{op} expects an array of selectors")));
    };
    items
        .iter()
        .map(|item| {
            item.as_map()
                .ok_or_else(|| StoreError::Query(format!("{op} clauses must be selectors")))
        })
        .collect()
}

fn field_matches(value: Option<&DocValue>, condition: &DocValue) -> StoreResult<bool> {
    match condition {
        DocValue::Map(ops) if is_operator_map(ops) => {
            for (op, arg) in ops {
                if !apply_operator(value, op, arg)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        literal => Ok(equals(value, literal)),
    }
}

fn is_operator_map(map: &BTreeMap<String, DocValue>) -> bool {
    !map.is_empty() && map.keys().all(|k| k.starts_with('$'))
}

/// Equality with array fields matching when any element is equal.
fn equals(value: Option<&DocValue>, literal: &DocValue) -> bool {
    match value {
        None => matches!(literal, DocValue::Null),
        Some(v) if v.same_as(literal) => true,
        Some(DocValue::Array(items)) => items.iter().any(|item| item.same_as(literal)),
        Some(_) => false,
    }
}

fn apply_operator(value: Option<&DocValue>, op: &str, arg: &DocValue) -> StoreResult<bool> {
    let ok = match op {
        "$eq" => equals(value, arg),
        "$ne" => !equals(value, arg),
        "$gt" => compares(value, arg, |o| o == Ordering::Greater),
        "$gte" => compares(value, arg, |o| o != Ordering::Less),
        "$lt" => compares(value, arg, |o| o == Ordering::Less),
        "$lte" => compares(value, arg, |o| o != Ordering::Greater),
        "$in" => in_list(op, value, arg)?,
        "$nin" => !in_list(op, value, arg)?,
        "$exists" => value.is_some() == truthy(arg),
        "$regex" => regex_matches(value, arg)?,
        other => return Err(unsupported(other)),
    };
    Ok(ok)
}

fn compares(value: Option<&DocValue>, arg: &DocValue, pred: impl Fn(Ordering) -> bool) -> bool {
    match value {
        Some(DocValue::Array(items)) => items
            .iter()
            .any(|item| item.compare(arg).is_some_and(&pred)),
        Some(v) => v.compare(arg).is_some_and(pred),
        None => false,
    }
}

fn in_list(op: &str, value: Option<&DocValue>, arg: &DocValue) -> StoreResult<bool> {
    let DocValue::Array(candidates) = arg else {
        return Err(StoreError::Query(format!("{op} expects an array")));
    };
    Ok(candidates.iter().any(|c| equals(value, c)))
}

fn regex_matches(value: Option<&DocValue>, arg: &DocValue) -> StoreResult<bool> {
    let pattern = arg
        .as_str()
        .ok_or_else(|| StoreError::Query("$regex expects a string pattern".to_string()))?;
    let re = Regex::new(pattern)
        .map_err(|e| StoreError::Query(format!("invalid $regex pattern: {e}")))?;

    Ok(match value {
        Some(DocValue::String(s)) => re.is_match(s),
        Some(DocValue::Array(items)) => items
            .iter()
            .any(|item| item.as_str().is_some_and(|s| re.is_match(s))),
        _ => false,
    })
}

fn truthy(arg: &DocValue) -> bool {
    match arg {
        DocValue::Null => false,
        DocValue::Bool(b) => *b,
        DocValue::Int(n) => *n != 0,
        DocValue::Number(n) => *n != 0.0,
        _ => true,
    }
}

fn unsupported(op: &str) -> StoreError {
    StoreError::Query(format!("unsupported selector operator {op}"))
}

#[cfg(test)]
mod tests {
    use crate::document::{DocValue, Selector, document};
    use crate::errors::StoreError;

    fn event() -> crate::document::Document {
        document([
            ("_id", DocValue::from("e1")),
            ("kind", DocValue::from("build")),
            ("tags", DocValue::from(vec!["a", "b"])),
            ("size", DocValue::from(10)),
            (
                "meta",
                DocValue::Map(document([("owner", DocValue::from("ops"))])),
            ),
        ])
    }

    #[test]
    fn empty_selector_matches_everything() {
        assert!(Selector::all().matches(&event()).unwrap());
    }

    #[test]
    fn equality_and_array_membership() {
        let doc = event();
        assert!(Selector::all().with("kind", "build").matches(&doc).unwrap());
        assert!(Selector::all().with("tags", "b").matches(&doc).unwrap());
        assert!(!Selector::all().with("kind", "test").matches(&doc).unwrap());
        assert!(Selector::all().with("meta.owner", "ops").matches(&doc).unwrap());
    }

    #[test]
    fn comparison_and_existence_operators() {
        let doc = event();
        let gt = Selector::all().with("size", document([("$gt", 5)]));
        let lte = Selector::all().with("size", document([("$lte", 9)]));
        let missing = Selector::all().with("time", document([("$exists", false)]));
        let present = Selector::all().with("time", document([("$exists", true)]));

        assert!(gt.matches(&doc).unwrap());
        assert!(!lte.matches(&doc).unwrap());
        assert!(missing.matches(&doc).unwrap());
        assert!(!present.matches(&doc).unwrap());
    }

    #[test]
    fn in_or_and_regex() {
        let doc = event();
        let ids = Selector::id_in(&["x".to_string(), "e1".to_string()]);
        assert!(ids.matches(&doc).unwrap());

        let or = Selector::all().with(
            "$or",
            DocValue::Array(vec![
                DocValue::Map(document([("kind", "deploy")])),
                DocValue::Map(document([("size", 10)])),
            ]),
        );
        assert!(or.matches(&doc).unwrap());

        let re = Selector::all().with("kind", document([("$regex", "^bu")]));
        assert!(re.matches(&doc).unwrap());
    }

    #[test]
    fn integer_fields_match_float_conditions() {
        let doc = event();
        assert!(Selector::all().with("size", 10.0).matches(&doc).unwrap());
        let lt = Selector::all().with("size", document([("$lt", 10.5)]));
        assert!(lt.matches(&doc).unwrap());
    }

    #[test]
    fn unknown_operator_is_a_query_error() {
        let selector = Selector::all().with("kind", document([("$near", 1)]));
        assert!(matches!(
            selector.matches(&event()),
            Err(StoreError::Query(msg)) if msg.contains("$near")
        ));
    }
}
