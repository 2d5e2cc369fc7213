use super::matcher;
use crate::connection::{
    BackendError, BackendResult, BulkOp, BulkResult, FindOptions, Session, SessionFactory,
    SortKey, StoreConfig,
};
use crate::core::{Document, ID_FIELD, json_compare, lookup_path};
use crate::filter::Query;
use async_trait::async_trait;
use serde_json::Value as Json;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, RwLock as StdRwLock};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering as AtomicOrdering};
use tokio::sync::RwLock;

/// In-process document store.
///
/// Behaves like a single document server: collections are created on first
/// write, `_id` is always unique, additional unique indexes can be declared,
/// and bulk runs are ordered and stop at the first failing operation.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<StoreInner>,
}

#[derive(Default)]
struct StoreInner {
    /// Collections keyed by `database.collection`, each with its own lock
    collections: RwLock<HashMap<String, Arc<RwLock<Collection>>>>,
    /// Unique fields keyed by collection name
    unique_indexes: RwLock<HashMap<String, Vec<String>>>,
    /// Credentials the server accepts, `None` disables authentication
    credentials: Option<(String, String)>,
    unreachable: AtomicBool,
    /// Message every data operation fails with, when set
    failure: StdRwLock<Option<String>>,
    operations: AtomicUsize,
}

#[derive(Default)]
struct Collection {
    documents: Vec<Document>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that only accepts dials presenting these credentials.
    pub fn with_credentials(username: &str, password: &str) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                credentials: Some((username.to_string(), password.to_string())),
                ..Default::default()
            }),
        }
    }

    /// Makes every subsequent dial fail as if no server answered.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.inner.unreachable.store(unreachable, AtomicOrdering::SeqCst);
    }

    /// Makes every find, count and bulk run on open sessions fail with
    /// `message`, until reset with `None`.
    pub fn set_failure(&self, message: Option<&str>) {
        let mut failure = self
            .inner
            .failure
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *failure = message.map(str::to_string);
    }

    /// Declare a unique index on `field` for every database's `collection`.
    pub async fn ensure_unique_index(&self, collection: &str, field: &str) {
        let mut indexes = self.inner.unique_indexes.write().await;
        let fields = indexes.entry(collection.to_string()).or_default();
        if !fields.iter().any(|f| f == field) {
            fields.push(field.to_string());
        }
    }

    /// Number of data operations (find, count, bulk) served so far.
    pub fn operation_count(&self) -> usize {
        self.inner.operations.load(AtomicOrdering::SeqCst)
    }

    /// Raw documents of a collection, in insertion order.
    pub async fn documents(&self, database: &str, collection: &str) -> Vec<Document> {
        let handle = self.inner.collection(database, collection).await;
        match handle {
            Some(handle) => handle.read().await.documents.clone(),
            None => Vec::new(),
        }
    }
}

impl StoreInner {
    async fn collection(&self, database: &str, name: &str) -> Option<Arc<RwLock<Collection>>> {
        let collections = self.collections.read().await;
        collections.get(&full_name(database, name)).cloned()
    }

    async fn collection_or_create(&self, database: &str, name: &str) -> Arc<RwLock<Collection>> {
        if let Some(handle) = self.collection(database, name).await {
            return handle;
        }
        let mut collections = self.collections.write().await;
        collections
            .entry(full_name(database, name))
            .or_default()
            .clone()
    }

    fn record_operation(&self) {
        self.operations.fetch_add(1, AtomicOrdering::SeqCst);
    }
}

#[async_trait]
impl SessionFactory for MemoryStore {
    async fn dial(&self, config: &StoreConfig) -> BackendResult<Box<dyn Session>> {
        if self.inner.unreachable.load(AtomicOrdering::SeqCst) {
            return Err(BackendError::Dial(config.endpoints.join(",")));
        }

        if let Some((username, password)) = &self.inner.credentials {
            if &config.username != username || &config.password != password {
                return Err(BackendError::Dial(format!(
                    "server returned error on SASL authentication step: Authentication failed for {}:{}@{}",
                    config.username, config.password, config.auth_source
                )));
            }
        }

        Ok(Box::new(MemorySession {
            store: Arc::clone(&self.inner),
            database: config.database.clone(),
            closed: false,
        }))
    }
}

/// Session on a [`MemoryStore`] database.
pub struct MemorySession {
    store: Arc<StoreInner>,
    database: String,
    closed: bool,
}

impl MemorySession {
    fn ensure_open(&self) -> BackendResult<()> {
        if self.closed {
            return Err(BackendError::SessionClosed);
        }
        self.store.record_operation();

        let failure = self
            .store
            .failure
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match failure.as_ref() {
            Some(message) => Err(BackendError::Execution(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Session for MemorySession {
    fn copy(&self) -> Box<dyn Session> {
        Box::new(MemorySession {
            store: Arc::clone(&self.store),
            database: self.database.clone(),
            closed: false,
        })
    }

    async fn find(
        &self,
        collection: &str,
        query: &Query,
        options: &FindOptions,
    ) -> BackendResult<Vec<Document>> {
        self.ensure_open()?;

        let Some(handle) = self.store.collection(&self.database, collection).await else {
            return Ok(Vec::new());
        };
        let table = handle.read().await;

        let mut found = Vec::new();
        for doc in &table.documents {
            if matcher::matches(query, doc)? {
                found.push(doc.clone());
            }
        }

        if !options.sort.is_empty() {
            found.sort_by(|a, b| sort_documents(a, b, &options.sort));
        }

        let limit = options.limit.unwrap_or(usize::MAX);
        Ok(found.into_iter().skip(options.skip).take(limit).collect())
    }

    async fn find_one(&self, collection: &str, query: &Query) -> BackendResult<Document> {
        self.ensure_open()?;

        let handle = self
            .store
            .collection(&self.database, collection)
            .await
            .ok_or(BackendError::NotFound)?;
        let table = handle.read().await;

        for doc in &table.documents {
            if matcher::matches(query, doc)? {
                return Ok(doc.clone());
            }
        }
        Err(BackendError::NotFound)
    }

    async fn count(&self, collection: &str, query: &Query) -> BackendResult<usize> {
        self.ensure_open()?;

        let Some(handle) = self.store.collection(&self.database, collection).await else {
            return Ok(0);
        };
        let table = handle.read().await;

        let mut count = 0;
        for doc in &table.documents {
            if matcher::matches(query, doc)? {
                count += 1;
            }
        }
        Ok(count)
    }

    async fn run_bulk(&self, collection: &str, operations: &[BulkOp]) -> BackendResult<BulkResult> {
        self.ensure_open()?;

        let unique = {
            let indexes = self.store.unique_indexes.read().await;
            let mut fields = vec![ID_FIELD.to_string()];
            fields.extend(indexes.get(collection).cloned().unwrap_or_default());
            fields
        };

        let handle = self.store.collection_or_create(&self.database, collection).await;
        let mut table = handle.write().await;
        let namespace = full_name(&self.database, collection);
        let mut result = BulkResult::default();

        for operation in operations {
            match operation {
                BulkOp::Insert(doc) => {
                    check_unique(&namespace, &unique, &table.documents, doc, None)?;
                    table.documents.push(doc.clone());
                    result.inserted += 1;
                }
                BulkOp::Replace { selector, document } => {
                    let position = table.position(selector)?.ok_or(BackendError::NotFound)?;
                    let mut replacement = document.clone();
                    if let Some(id) = table.documents[position].get(ID_FIELD) {
                        replacement.insert(ID_FIELD.to_string(), id.clone());
                    }
                    check_unique(&namespace, &unique, &table.documents, &replacement, Some(position))?;
                    table.documents[position] = replacement;
                    result.matched += 1;
                    result.modified += 1;
                }
                BulkOp::Remove(selector) => {
                    let position = table.position(selector)?.ok_or(BackendError::NotFound)?;
                    table.documents.remove(position);
                    result.matched += 1;
                    result.removed += 1;
                }
                BulkOp::RemoveAll(selector) => {
                    let mut doomed = Vec::with_capacity(table.documents.len());
                    for doc in &table.documents {
                        doomed.push(matcher::matches(selector, doc)?);
                    }
                    let removed = doomed.iter().filter(|d| **d).count();
                    let mut doomed = doomed.into_iter();
                    table.documents.retain(|_| !doomed.next().unwrap_or(false));
                    result.matched += removed;
                    result.removed += removed;
                }
                BulkOp::IncrementAll {
                    selector,
                    field,
                    delta,
                } => {
                    for doc in table.documents.iter_mut() {
                        if !matcher::matches(selector, doc)? {
                            continue;
                        }
                        result.matched += 1;
                        let next = match doc.get(field) {
                            None | Some(Json::Null) => Json::from(*delta),
                            Some(Json::Number(n)) => match n.as_i64() {
                                Some(i) => Json::from(i.saturating_add(*delta)),
                                None => Json::from(n.as_f64().unwrap_or_default() + *delta as f64),
                            },
                            Some(_) => {
                                return Err(BackendError::Execution(format!(
                                    "Cannot apply $inc to a value of non-numeric type. {{_id: {}}} has the field '{}' of non-numeric type",
                                    doc.get(ID_FIELD).cloned().unwrap_or(Json::Null),
                                    field
                                )));
                            }
                        };
                        doc.insert(field.clone(), next);
                        result.modified += 1;
                    }
                }
            }
        }

        Ok(result)
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

impl Collection {
    fn position(&self, selector: &Query) -> BackendResult<Option<usize>> {
        for (i, doc) in self.documents.iter().enumerate() {
            if matcher::matches(selector, doc)? {
                return Ok(Some(i));
            }
        }
        Ok(None)
    }
}

fn full_name(database: &str, collection: &str) -> String {
    format!("{}.{}", database, collection)
}

fn check_unique(
    namespace: &str,
    unique: &[String],
    documents: &[Document],
    candidate: &Document,
    skip: Option<usize>,
) -> BackendResult<()> {
    for field in unique {
        let Some(value) = lookup_path(candidate, field) else {
            continue;
        };
        let clash = documents
            .iter()
            .enumerate()
            .filter(|(i, _)| Some(*i) != skip)
            .any(|(_, doc)| lookup_path(doc, field) == Some(value));
        if clash {
            return Err(BackendError::DuplicateKey {
                collection: namespace.to_string(),
                index: format!("{}_1", field),
                key: value.to_string(),
            });
        }
    }
    Ok(())
}

/// Orders documents like the server: missing and null first, then numbers,
/// strings, objects, arrays and booleans.
fn sort_documents(a: &Document, b: &Document, keys: &[SortKey]) -> Ordering {
    for key in keys {
        let left = lookup_path(a, &key.field);
        let right = lookup_path(b, &key.field);

        let mut ordering = type_rank(left)
            .cmp(&type_rank(right))
            .then_with(|| match (left, right) {
                (Some(l), Some(r)) => json_compare(l, r).unwrap_or(Ordering::Equal),
                _ => Ordering::Equal,
            });

        if key.descending {
            ordering = ordering.reverse();
        }
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

fn type_rank(value: Option<&Json>) -> u8 {
    match value {
        None | Some(Json::Null) => 0,
        Some(Json::Number(_)) => 1,
        Some(Json::String(_)) => 2,
        Some(Json::Object(_)) => 3,
        Some(Json::Array(_)) => 4,
        Some(Json::Bool(_)) => 5,
    }
}
