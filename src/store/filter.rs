//! Query-filter evaluation for [`super::MemoryStore`].
//!
//! Covers the operators the aggregator issues: equality, `$ne`, `$gt`,
//! `$gte`, `$lt`, `$lte`, `$in`, `$nin`, `$exists`, `$or` and `$and`. Null
//! comparisons follow MongoDB: `{f: null}` matches a missing field.

use crate::error::{Error, Result};
use mongodb::bson::{Bson, Document};
use std::cmp::Ordering;

/// Does `doc` satisfy `filter`?
pub(crate) fn matches(doc: &Document, filter: &Document) -> Result<bool> {
    for (key, condition) in filter {
        let ok = match key.as_str() {
            "$or" => any_clause(doc, key, condition)?,
            "$and" => {
                let mut all = true;
                for clause in clauses(key, condition)? {
                    if !matches(doc, clause)? {
                        all = false;
                        break;
                    }
                }
                all
            }
            op if op.starts_with('$') => {
                return Err(Error::Other(format!("unsupported top-level operator {op}")));
            }
            field => field_matches(lookup(doc, field), condition)?,
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Resolve a dotted field path.
pub(crate) fn lookup<'a>(doc: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut parts = path.split('.');
    let mut current = doc.get(parts.next()?)?;
    for part in parts {
        current = match current {
            Bson::Document(inner) => inner.get(part)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Numeric view of a BSON value. Dates are not numbers here.
pub(crate) fn as_number(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(n) => Some(f64::from(*n)),
        Bson::Int64(n) => Some(*n as f64),
        Bson::Double(n) => Some(*n),
        _ => None,
    }
}

fn any_clause(doc: &Document, key: &str, condition: &Bson) -> Result<bool> {
    for clause in clauses(key, condition)? {
        if matches(doc, clause)? {
            return Ok(true);
        }
    }
    Ok(false)
}

fn clauses<'a>(key: &str, condition: &'a Bson) -> Result<Vec<&'a Document>> {
    let Bson::Array(items) = condition else {
        return Err(Error::Other(format!("{key} expects an array of filters")));
    };
    items
        .iter()
        .map(|item| match item {
            Bson::Document(clause) => Ok(clause),
            other => Err(Error::Other(format!("{key} clause is not a document: {other}"))),
        })
        .collect()
}

fn is_operator_doc(condition: &Bson) -> Option<&Document> {
    match condition {
        Bson::Document(d) if !d.is_empty() && d.keys().all(|k| k.starts_with('$')) => Some(d),
        _ => None,
    }
}

fn field_matches(value: Option<&Bson>, condition: &Bson) -> Result<bool> {
    let Some(ops) = is_operator_doc(condition) else {
        return Ok(equals(value, condition));
    };
    for (op, operand) in ops {
        let ok = match op.as_str() {
            "$eq" => equals(value, operand),
            "$ne" => !equals(value, operand),
            "$gt" => compare(value, operand).is_some_and(Ordering::is_gt),
            "$gte" => compare(value, operand).is_some_and(Ordering::is_ge),
            "$lt" => compare(value, operand).is_some_and(Ordering::is_lt),
            "$lte" => compare(value, operand).is_some_and(Ordering::is_le),
            "$in" => in_array(value, op, operand)?,
            "$nin" => !in_array(value, op, operand)?,
            "$exists" => {
                let wanted = matches!(operand, Bson::Boolean(true))
                    || as_number(operand).is_some_and(|n| n != 0.0);
                value.is_some() == wanted
            }
            other => return Err(Error::Other(format!("unsupported query operator {other}"))),
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

fn in_array(value: Option<&Bson>, op: &str, operand: &Bson) -> Result<bool> {
    let Bson::Array(candidates) = operand else {
        return Err(Error::Other(format!("{op} expects an array")));
    };
    Ok(candidates.iter().any(|c| equals(value, c)))
}

fn equals(value: Option<&Bson>, target: &Bson) -> bool {
    match (value, target) {
        (None | Some(Bson::Null), Bson::Null) => true,
        (None, _) => false,
        (Some(Bson::Array(items)), target) if !matches!(target, Bson::Array(_)) => {
            items.iter().any(|item| same(item, target))
        }
        (Some(v), target) => same(v, target),
    }
}

fn same(a: &Bson, b: &Bson) -> bool {
    match (as_number(a), as_number(b)) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

/// Ordering between comparable values. Mismatched types never compare.
fn compare(value: Option<&Bson>, target: &Bson) -> Option<Ordering> {
    match (value?, target) {
        (Bson::DateTime(a), Bson::DateTime(b)) => Some(a.cmp(b)),
        (Bson::String(a), Bson::String(b)) => Some(a.cmp(b)),
        (a, b) => as_number(a)?.partial_cmp(&as_number(b)?),
    }
}
