//! In-process [`DocumentStore`] backed by plain BSON documents.
//!
//! Evaluates the pipeline stages the aggregator uses (`$match`, `$group`,
//! `$project`, `$count`) with MongoDB semantics for missing fields: grouping
//! on a missing key yields a `null` group, `$sum`/`$avg` skip non-numeric
//! values, and a pipeline over an empty collection yields no rows.
//! Expressions are limited to field paths, `$subtract`, `$size` and `$ifNull`.

use super::filter::{as_number, lookup, matches};
use super::{Collection, DocumentStore};
use crate::error::{Error, Result};
use async_trait::async_trait;
use mongodb::bson::{Bson, Document};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// In-memory collections, keyed by [`Collection`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<Collection, Vec<Document>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, collection: Collection, doc: Document) {
        self.insert_many(collection, [doc]);
    }

    pub fn insert_many(&self, collection: Collection, docs: impl IntoIterator<Item = Document>) {
        let mut collections = self
            .collections
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        collections.entry(collection).or_default().extend(docs);
    }

    /// Drop every document in `collection`.
    pub fn clear(&self, collection: Collection) {
        let mut collections = self
            .collections
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        collections.remove(&collection);
    }

    fn rows(&self, collection: Collection) -> Vec<Document> {
        let collections = self
            .collections
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        collections.get(&collection).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn aggregate(
        &self,
        collection: Collection,
        pipeline: Vec<Document>,
    ) -> Result<Vec<Document>> {
        run_pipeline(self.rows(collection), &pipeline)
    }

    async fn count_documents(&self, collection: Collection, filter: Document) -> Result<u64> {
        let mut count = 0;
        for doc in self.rows(collection) {
            if matches(&doc, &filter)? {
                count += 1;
            }
        }
        Ok(count)
    }

    async fn find(&self, collection: Collection, filter: Document) -> Result<Vec<Document>> {
        let mut found = Vec::new();
        for doc in self.rows(collection) {
            if matches(&doc, &filter)? {
                found.push(doc);
            }
        }
        Ok(found)
    }
}

fn run_pipeline(mut rows: Vec<Document>, pipeline: &[Document]) -> Result<Vec<Document>> {
    for stage in pipeline {
        let (op, spec) = single_entry(stage, "pipeline stage")?;
        rows = match op {
            "$match" => {
                let filter = as_doc(op, spec)?;
                let mut kept = Vec::with_capacity(rows.len());
                for row in rows {
                    if matches(&row, filter)? {
                        kept.push(row);
                    }
                }
                kept
            }
            "$group" => group(&rows, as_doc(op, spec)?)?,
            "$project" => project(&rows, as_doc(op, spec)?)?,
            "$count" => {
                let Bson::String(field) = spec else {
                    return Err(Error::Other("$count expects a field name".to_string()));
                };
                if rows.is_empty() {
                    Vec::new()
                } else {
                    let mut out = Document::new();
                    out.insert(field.clone(), rows.len() as i64);
                    vec![out]
                }
            }
            other => return Err(Error::Other(format!("unsupported pipeline stage {other}"))),
        };
    }
    Ok(rows)
}

fn single_entry<'a>(doc: &'a Document, what: &str) -> Result<(&'a str, &'a Bson)> {
    let mut entries = doc.iter();
    match (entries.next(), entries.next()) {
        (Some((key, value)), None) => Ok((key.as_str(), value)),
        _ => Err(Error::Other(format!("{what} must have exactly one key"))),
    }
}

fn as_doc<'a>(op: &str, spec: &'a Bson) -> Result<&'a Document> {
    match spec {
        Bson::Document(d) => Ok(d),
        _ => Err(Error::Other(format!("{op} expects a document"))),
    }
}

fn group(rows: &[Document], spec: &Document) -> Result<Vec<Document>> {
    let id_expr = spec
        .get("_id")
        .ok_or_else(|| Error::Other("$group requires an _id".to_string()))?;

    // Groups in first-seen order.
    let mut groups: Vec<(Bson, Vec<&Document>)> = Vec::new();
    for row in rows {
        let key = eval(row, id_expr)?;
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, members)) => members.push(row),
            None => groups.push((key, vec![row])),
        }
    }

    let mut out = Vec::with_capacity(groups.len());
    for (key, members) in groups {
        let mut result = Document::new();
        result.insert("_id", key);
        for (field, accumulator) in spec.iter().filter(|(k, _)| k.as_str() != "_id") {
            let (op, operand) = single_entry(as_doc(field, accumulator)?, "accumulator")?;
            let mut values = Vec::with_capacity(members.len());
            for member in &members {
                values.push(eval(member, operand)?);
            }
            let value = match op {
                "$sum" => sum(&values),
                "$avg" => avg(&values),
                other => return Err(Error::Other(format!("unsupported accumulator {other}"))),
            };
            result.insert(field.clone(), value);
        }
        out.push(result);
    }
    Ok(out)
}

fn sum(values: &[Bson]) -> Bson {
    let integral = !values.iter().any(|v| matches!(v, Bson::Double(_)));
    let total: f64 = values.iter().filter_map(as_number).sum();
    if integral {
        Bson::Int64(total as i64)
    } else {
        Bson::Double(total)
    }
}

fn avg(values: &[Bson]) -> Bson {
    let numbers: Vec<f64> = values.iter().filter_map(as_number).collect();
    if numbers.is_empty() {
        Bson::Null
    } else {
        Bson::Double(numbers.iter().sum::<f64>() / numbers.len() as f64)
    }
}

fn project(rows: &[Document], spec: &Document) -> Result<Vec<Document>> {
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let mut projected = Document::new();
        let keep_id = !matches!(spec.get("_id"), Some(v) if is_falsy(v));
        if keep_id {
            if let Some(id) = row.get("_id") {
                projected.insert("_id", id.clone());
            }
        }
        for (field, expr) in spec.iter().filter(|(k, _)| k.as_str() != "_id") {
            if is_falsy(expr) {
                return Err(Error::Other(format!(
                    "field exclusion ({field}: 0) is not supported"
                )));
            }
            let value = if is_truthy_flag(expr) {
                match lookup(row, field) {
                    Some(v) => v.clone(),
                    None => continue,
                }
            } else {
                eval(row, expr)?
            };
            projected.insert(field.clone(), value);
        }
        out.push(projected);
    }
    Ok(out)
}

fn is_falsy(v: &Bson) -> bool {
    matches!(v, Bson::Boolean(false)) || as_number(v) == Some(0.0)
}

fn is_truthy_flag(v: &Bson) -> bool {
    matches!(v, Bson::Boolean(true)) || as_number(v) == Some(1.0)
}

/// Evaluate an aggregation expression against one row.
fn eval(row: &Document, expr: &Bson) -> Result<Bson> {
    match expr {
        Bson::String(path) if path.starts_with('$') => {
            Ok(lookup(row, &path[1..]).cloned().unwrap_or(Bson::Null))
        }
        Bson::Document(d) if d.keys().next().is_some_and(|k| k.starts_with('$')) => {
            let (op, args) = single_entry(d, "expression")?;
            match op {
                "$subtract" => subtract(row, args),
                "$ifNull" => {
                    let (value, fallback) = operands(op, args)?;
                    match eval(row, value)? {
                        Bson::Null | Bson::Undefined => eval(row, fallback),
                        present => Ok(present),
                    }
                }
                "$size" => match eval(row, args)? {
                    Bson::Array(items) => Ok(Bson::Int32(items.len() as i32)),
                    other => Err(Error::Other(format!(
                        "$size argument must be an array, found {other}"
                    ))),
                },
                other => Err(Error::Other(format!("unsupported expression {other}"))),
            }
        }
        literal => Ok(literal.clone()),
    }
}

fn operands<'a>(op: &str, args: &'a Bson) -> Result<(&'a Bson, &'a Bson)> {
    match args {
        Bson::Array(items) if items.len() == 2 => Ok((&items[0], &items[1])),
        _ => Err(Error::Other(format!("{op} expects two operands"))),
    }
}

fn subtract(row: &Document, args: &Bson) -> Result<Bson> {
    let (lhs, rhs) = operands("$subtract", args)?;
    let (lhs, rhs) = (eval(row, lhs)?, eval(row, rhs)?);
    Ok(match (&lhs, &rhs) {
        (Bson::Null, _) | (_, Bson::Null) => Bson::Null,
        (Bson::DateTime(a), Bson::DateTime(b)) => {
            Bson::Int64(a.timestamp_millis() - b.timestamp_millis())
        }
        _ => match (as_number(&lhs), as_number(&rhs)) {
            (Some(a), Some(b)) => Bson::Double(a - b),
            _ => {
                return Err(Error::Other(format!(
                    "cannot subtract {rhs} from {lhs}"
                )));
            }
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::{DateTime, doc};

    #[test]
    fn group_on_missing_key_yields_null_group() {
        let rows = vec![doc! { "type": "a" }, doc! {}, doc! { "type": "a" }];
        let out = run_pipeline(
            rows,
            &[doc! { "$group": { "_id": "$type", "count": { "$sum": 1 } } }],
        )
        .unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].get("_id"), Some(&Bson::String("a".into())));
        assert_eq!(out[0].get("count"), Some(&Bson::Int64(2)));
        assert_eq!(out[1].get("_id"), Some(&Bson::Null));
    }

    #[test]
    fn empty_input_yields_no_rows() {
        let out = run_pipeline(
            Vec::new(),
            &[doc! { "$group": { "_id": Bson::Null, "avg": { "$avg": "$n" } } }],
        )
        .unwrap();
        assert!(out.is_empty());

        let out = run_pipeline(Vec::new(), &[doc! { "$count": "n" }]).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn subtract_dates_gives_milliseconds() {
        let rows = vec![doc! {
            "createdAt": DateTime::from_millis(1_000),
            "expiration": DateTime::from_millis(61_000),
        }];
        let out = run_pipeline(
            rows,
            &[doc! { "$project": { "duration": { "$subtract": ["$expiration", "$createdAt"] } } }],
        )
        .unwrap();
        assert_eq!(out[0].get("duration"), Some(&Bson::Int64(60_000)));
    }

    #[test]
    fn unknown_stage_is_an_error() {
        assert!(run_pipeline(vec![doc! {}], &[doc! { "$lookup": {} }]).is_err());
    }
}
