//! An in-process store for tests and offline runs.
//!
//! Supports the subset of the query language the loader exercises:
//! equality and comparison filters, inclusion/exclusion projections,
//! sort, skip and limit, plus the matching aggregation stages.

use std::{cmp::Ordering, collections::HashMap, sync::Arc};

use bson::{Bson, Document};
use parking_lot::RwLock;

use super::{Collection, Connection, DocumentCursor, FindOptions};
use crate::error::StoreError;

type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Default)]
struct State {
    collections: HashMap<String, Vec<Document>>,
    queries: usize,
    last_batch_size: Option<u32>,
    fail_after: Option<usize>,
}

/// Shared in-memory collections. Clones see the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_many(
        &self,
        database: &str,
        collection: &str,
        docs: impl IntoIterator<Item = Document>,
    ) {
        self.state
            .write()
            .collections
            .entry(namespace(database, collection))
            .or_default()
            .extend(docs);
    }

    /// Number of finds and aggregations executed so far.
    pub fn queries(&self) -> usize {
        self.state.read().queries
    }

    /// Batch size requested by the most recent query.
    pub fn last_batch_size(&self) -> Option<u32> {
        self.state.read().last_batch_size
    }

    /// Makes every cursor opened from now on fail after yielding `n` documents.
    pub fn fail_cursors_after(&self, n: Option<usize>) {
        self.state.write().fail_after = n;
    }
}

impl Connection for MemoryStore {
    fn collection(&self, database: &str, name: &str) -> Box<dyn Collection> {
        Box::new(MemoryCollection {
            state: Arc::clone(&self.state),
            namespace: namespace(database, name),
        })
    }
}

fn namespace(database: &str, collection: &str) -> String {
    format!("{database}.{collection}")
}

struct MemoryCollection {
    state: Arc<RwLock<State>>,
    namespace: String,
}

impl MemoryCollection {
    /// Snapshot of the documents, recording the query.
    fn open(&self, batch_size: u32) -> (Vec<Document>, Option<usize>) {
        let mut state = self.state.write();
        state.queries += 1;
        state.last_batch_size = Some(batch_size);
        let docs = state
            .collections
            .get(&self.namespace)
            .cloned()
            .unwrap_or_default();
        (docs, state.fail_after)
    }
}

impl Collection for MemoryCollection {
    fn namespace(&self) -> String {
        self.namespace.clone()
    }

    fn find(&self, options: FindOptions) -> StoreResult<Box<dyn DocumentCursor>> {
        let (docs, fail_after) = self.open(options.batch_size);

        let mut docs = filter(docs, &options.filter)?;
        if let Some(sort) = &options.sort {
            sort_by(&mut docs, sort);
        }
        let docs = window(docs, options.skip.unwrap_or(0), options.limit.unwrap_or(0));
        let docs = match &options.projection {
            Some(projection) => docs.into_iter().map(|d| project(d, projection)).collect(),
            None => docs,
        };

        Ok(Box::new(MemoryCursor::new(docs, fail_after)))
    }

    fn aggregate(
        &self,
        pipeline: &[Document],
        batch_size: u32,
    ) -> StoreResult<Box<dyn DocumentCursor>> {
        let (mut docs, fail_after) = self.open(batch_size);

        for stage in pipeline {
            let mut ops = stage.iter();
            let (Some((name, arg)), None) = (ops.next(), ops.next()) else {
                return Err(StoreError::Query(
                    "a pipeline stage must have exactly one field".into(),
                ));
            };

            docs = match (name.as_str(), arg) {
                ("$match", Bson::Document(f)) => filter(docs, f)?,
                ("$project", Bson::Document(p)) => docs.into_iter().map(|d| project(d, p)).collect(),
                ("$sort", Bson::Document(s)) => {
                    sort_by(&mut docs, s);
                    docs
                }
                ("$skip", n) => window(docs, count(name, n)?, 0),
                ("$limit", n) => {
                    let n = i64::try_from(count(name, n)?).unwrap_or(i64::MAX);
                    window(docs, 0, n)
                }
                (name, _) => {
                    return Err(StoreError::Query(format!(
                        "unsupported pipeline stage {name}"
                    )))
                }
            };
        }

        Ok(Box::new(MemoryCursor::new(docs, fail_after)))
    }
}

fn count(stage: &str, arg: &Bson) -> StoreResult<u64> {
    number(arg)
        .filter(|n| *n >= 0.0 && n.fract() == 0.0)
        .map(|n| n as u64)
        .ok_or_else(|| StoreError::Query(format!("{stage} expects a non-negative integer")))
}

fn number(value: &Bson) -> Option<f64> {
    match value {
        Bson::Double(v) => Some(*v),
        Bson::Int32(v) => Some(f64::from(*v)),
        Bson::Int64(v) => Some(*v as f64),
        _ => None,
    }
}

fn compare(a: &Bson, b: &Bson) -> Option<Ordering> {
    match (number(a), number(b)) {
        (Some(x), Some(y)) => x.partial_cmp(&y),
        _ => match (a, b) {
            (Bson::String(x), Bson::String(y)) => Some(x.cmp(y)),
            (Bson::Boolean(x), Bson::Boolean(y)) => Some(x.cmp(y)),
            _ => (a == b).then_some(Ordering::Equal),
        },
    }
}

fn equals(value: Option<&Bson>, target: &Bson) -> bool {
    match value {
        Some(v) => compare(v, target) == Some(Ordering::Equal),
        None => matches!(target, Bson::Null),
    }
}

fn filter(docs: Vec<Document>, filter: &Document) -> StoreResult<Vec<Document>> {
    let mut out = Vec::with_capacity(docs.len());
    for doc in docs {
        if matches(&doc, filter)? {
            out.push(doc);
        }
    }
    Ok(out)
}

fn matches(doc: &Document, filter: &Document) -> StoreResult<bool> {
    for (key, cond) in filter {
        if key.starts_with('$') {
            return Err(StoreError::Query(format!("unsupported operator {key}")));
        }

        let value = doc.get(key);
        let ok = match cond {
            Bson::Document(ops) if ops.keys().any(|k| k.starts_with('$')) => {
                let mut ok = true;
                for (op, arg) in ops {
                    ok &= apply(op, value, arg)?;
                }
                ok
            }
            other => equals(value, other),
        };

        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

fn apply(op: &str, value: Option<&Bson>, arg: &Bson) -> StoreResult<bool> {
    let ord = || value.and_then(|v| compare(v, arg));
    Ok(match op {
        "$eq" => equals(value, arg),
        "$ne" => !equals(value, arg),
        "$gt" => ord() == Some(Ordering::Greater),
        "$gte" => matches!(ord(), Some(Ordering::Greater | Ordering::Equal)),
        "$lt" => ord() == Some(Ordering::Less),
        "$lte" => matches!(ord(), Some(Ordering::Less | Ordering::Equal)),
        "$exists" => value.is_some() == truthy(arg),
        "$in" => match arg {
            Bson::Array(items) => items.iter().any(|item| equals(value, item)),
            _ => return Err(StoreError::Query("$in expects an array".into())),
        },
        other => return Err(StoreError::Query(format!("unsupported operator {other}"))),
    })
}

fn truthy(value: &Bson) -> bool {
    match value {
        Bson::Boolean(b) => *b,
        other => number(other).is_some_and(|n| n != 0.0),
    }
}

fn project(doc: Document, projection: &Document) -> Document {
    let keep_id = projection.get("_id").map_or(true, truthy);
    let inclusive = projection
        .iter()
        .any(|(k, v)| k.as_str() != "_id" && truthy(v));

    doc.into_iter()
        .filter(|(key, _)| {
            if key.as_str() == "_id" {
                keep_id
            } else if inclusive {
                projection.get(key).is_some_and(truthy)
            } else {
                !projection.contains_key(key)
            }
        })
        .collect()
}

fn sort_by(docs: &mut [Document], order: &Document) {
    docs.sort_by(|a, b| {
        for (key, direction) in order {
            let ord = match (a.get(key), b.get(key)) {
                (Some(x), Some(y)) => compare(x, y).unwrap_or(Ordering::Equal),
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            };
            let ord = if number(direction).is_some_and(|d| d < 0.0) {
                ord.reverse()
            } else {
                ord
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
}

/// Applies skip then limit; a zero limit means none, a negative one counts as its magnitude.
fn window(docs: Vec<Document>, skip: u64, limit: i64) -> Vec<Document> {
    let skip = usize::try_from(skip).unwrap_or(usize::MAX);
    let iter = docs.into_iter().skip(skip);
    match usize::try_from(limit.unsigned_abs()) {
        Ok(0) | Err(_) => iter.collect(),
        Ok(n) => iter.take(n).collect(),
    }
}

struct MemoryCursor {
    docs: std::vec::IntoIter<Document>,
    yielded: usize,
    fail_after: Option<usize>,
    error: Option<StoreError>,
}

impl MemoryCursor {
    fn new(docs: Vec<Document>, fail_after: Option<usize>) -> Self {
        Self {
            docs: docs.into_iter(),
            yielded: 0,
            fail_after,
            error: None,
        }
    }
}

impl DocumentCursor for MemoryCursor {
    fn next_document(&mut self) -> Option<Document> {
        if self.error.is_some() {
            return None;
        }
        if self.fail_after == Some(self.yielded) {
            self.error = Some(StoreError::Query(format!(
                "cursor failed after {} documents",
                self.yielded
            )));
            return None;
        }

        let doc = self.docs.next()?;
        self.yielded += 1;
        Some(doc)
    }

    fn last_error(&self) -> Option<&StoreError> {
        self.error.as_ref()
    }
}
