// src/store/memory.rs

//! In-memory implementation of both store capabilities.
//!
//! Selectors are evaluated with the reference matcher. Faults can be
//! injected per call kind so error paths can be exercised without a real
//! database, and query counters plus an open-cursor gauge make the access
//! pattern observable.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use tracing::trace;

use crate::document::{DocValue, Document, ID_FIELD, Selector};
use crate::errors::{StoreError, StoreResult};
use crate::store::{BoxCursor, BoxFuture, CompletionRecord, CompletionStore, Cursor, SelectorReader};
use crate::types::{Identifier, Namespace};

/// Failures to inject into subsequent calls.
#[derive(Debug, Clone, Default)]
pub struct Faults {
    /// Every call fails as if the store could not be reached.
    pub unreachable: Option<String>,
    pub count_error: Option<String>,
    pub find_error: Option<String>,
    /// `find_ids` cursors fail after yielding this many ids.
    pub find_cursor_fails_after: Option<usize>,
    pub record_query_error: Option<String>,
    /// `find_records` cursors fail after yielding this many records.
    pub record_cursor_fails_after: Option<usize>,
    pub upsert_error: Option<String>,
    /// Added before every query and every cursor step.
    pub latency: Option<Duration>,
}

#[derive(Debug, Default)]
struct Counters {
    count_queries: AtomicUsize,
    find_queries: AtomicUsize,
    record_queries: AtomicUsize,
    upserts: AtomicUsize,
}

#[derive(Debug, Default)]
struct Inner {
    collections: RwLock<HashMap<Namespace, Vec<Document>>>,
    records: RwLock<HashMap<Namespace, BTreeMap<Identifier, CompletionRecord>>>,
    faults: Mutex<Faults>,
    counters: Counters,
    open_cursors: Arc<AtomicUsize>,
}

/// Shared handle; clones see the same data.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<Inner>,
}

fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, ns: &Namespace, doc: Document) {
        write_lock(&self.inner.collections)
            .entry(ns.clone())
            .or_default()
            .push(doc);
    }

    pub fn insert_many(&self, ns: &Namespace, docs: impl IntoIterator<Item = Document>) {
        write_lock(&self.inner.collections)
            .entry(ns.clone())
            .or_default()
            .extend(docs);
    }

    pub fn documents(&self, ns: &Namespace) -> Vec<Document> {
        read_lock(&self.inner.collections)
            .get(ns)
            .cloned()
            .unwrap_or_default()
    }

    /// Apply `update` to every document in `ns` matching `selector`; returns
    /// how many were touched.
    pub fn update_where(
        &self,
        ns: &Namespace,
        selector: &Selector,
        mut update: impl FnMut(&mut Document),
    ) -> StoreResult<usize> {
        let mut collections = write_lock(&self.inner.collections);
        let Some(docs) = collections.get_mut(ns) else {
            return Ok(0);
        };

        let mut touched = 0;
        for doc in docs.iter_mut() {
            if selector.matches(doc)? {
                update(doc);
                touched += 1;
            }
        }
        Ok(touched)
    }

    /// Set `field` on the document whose `_id` equals `id`.
    pub fn set_field(&self, ns: &Namespace, id: &DocValue, field: &str, value: DocValue) -> bool {
        let mut collections = write_lock(&self.inner.collections);
        let Some(doc) = collections
            .get_mut(ns)
            .and_then(|docs| docs.iter_mut().find(|d| d.get(ID_FIELD) == Some(id)))
        else {
            return false;
        };
        doc.insert(field.to_string(), value);
        true
    }

    pub fn record(&self, ns: &Namespace, id: &str) -> Option<CompletionRecord> {
        read_lock(&self.inner.records)
            .get(ns)
            .and_then(|records| records.get(id))
            .cloned()
    }

    pub fn records(&self, ns: &Namespace) -> Vec<CompletionRecord> {
        read_lock(&self.inner.records)
            .get(ns)
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Seed a record directly, bypassing fault injection and counters.
    pub fn put_record(&self, ns: &Namespace, record: CompletionRecord) {
        write_lock(&self.inner.records)
            .entry(ns.clone())
            .or_default()
            .insert(record.id.clone(), record);
    }

    pub fn set_faults(&self, faults: Faults) {
        *self.faults_guard() = faults;
    }

    pub fn update_faults(&self, f: impl FnOnce(&mut Faults)) {
        f(&mut self.faults_guard());
    }

    pub fn clear_faults(&self) {
        self.set_faults(Faults::default());
    }

    pub fn count_queries(&self) -> usize {
        self.inner.counters.count_queries.load(Ordering::SeqCst)
    }

    pub fn find_queries(&self) -> usize {
        self.inner.counters.find_queries.load(Ordering::SeqCst)
    }

    pub fn record_queries(&self) -> usize {
        self.inner.counters.record_queries.load(Ordering::SeqCst)
    }

    pub fn upserts(&self) -> usize {
        self.inner.counters.upserts.load(Ordering::SeqCst)
    }

    /// Cursors handed out and not yet dropped.
    pub fn open_cursors(&self) -> usize {
        self.inner.open_cursors.load(Ordering::SeqCst)
    }

    fn faults_guard(&self) -> std::sync::MutexGuard<'_, Faults> {
        self.inner
            .faults
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn faults(&self) -> Faults {
        self.faults_guard().clone()
    }

    fn cursor<T: Send + 'static>(
        &self,
        items: Vec<T>,
        fail_after: Option<usize>,
        latency: Option<Duration>,
    ) -> BoxCursor<T> {
        Box::new(MemoryCursor::new(
            items,
            fail_after,
            latency,
            Arc::clone(&self.inner.open_cursors),
        ))
    }
}

async fn delay(latency: Option<Duration>) {
    if let Some(latency) = latency {
        tokio::time::sleep(latency).await;
    }
}

fn check_reachable(faults: &Faults) -> StoreResult<()> {
    match &faults.unreachable {
        Some(msg) => Err(StoreError::Unreachable(msg.clone())),
        None => Ok(()),
    }
}

impl SelectorReader for InMemoryStore {
    fn count<'a>(
        &'a self,
        ns: &'a Namespace,
        selector: &'a Selector,
    ) -> BoxFuture<'a, StoreResult<u64>> {
        Box::pin(async move {
            self.inner.counters.count_queries.fetch_add(1, Ordering::SeqCst);
            let faults = self.faults();
            delay(faults.latency).await;
            check_reachable(&faults)?;
            if let Some(msg) = faults.count_error {
                return Err(StoreError::Query(msg));
            }

            let collections = read_lock(&self.inner.collections);
            let mut n = 0u64;
            for doc in collections.get(ns).into_iter().flatten() {
                if selector.matches(doc)? {
                    n += 1;
                }
            }
            trace!(%ns, %selector, count = n, "count");
            Ok(n)
        })
    }

    fn find_ids<'a>(
        &'a self,
        ns: &'a Namespace,
        selector: &'a Selector,
        limit: Option<usize>,
    ) -> BoxFuture<'a, StoreResult<BoxCursor<DocValue>>> {
        Box::pin(async move {
            self.inner.counters.find_queries.fetch_add(1, Ordering::SeqCst);
            let faults = self.faults();
            delay(faults.latency).await;
            check_reachable(&faults)?;
            if let Some(msg) = faults.find_error {
                return Err(StoreError::Query(msg));
            }

            let ids = {
                let collections = read_lock(&self.inner.collections);
                let mut ids = Vec::new();
                for doc in collections.get(ns).into_iter().flatten() {
                    if limit.is_some_and(|limit| ids.len() >= limit) {
                        break;
                    }
                    if selector.matches(doc)? {
                        ids.push(doc.get(ID_FIELD).cloned().unwrap_or(DocValue::Null));
                    }
                }
                ids
            };
            trace!(%ns, %selector, found = ids.len(), "find ids");
            Ok(self.cursor(ids, faults.find_cursor_fails_after, faults.latency))
        })
    }
}

impl CompletionStore for InMemoryStore {
    fn find_records<'a>(
        &'a self,
        ns: &'a Namespace,
        ids: &'a [Identifier],
    ) -> BoxFuture<'a, StoreResult<BoxCursor<CompletionRecord>>> {
        Box::pin(async move {
            self.inner.counters.record_queries.fetch_add(1, Ordering::SeqCst);
            let faults = self.faults();
            delay(faults.latency).await;
            check_reachable(&faults)?;
            if let Some(msg) = faults.record_query_error {
                return Err(StoreError::Query(msg));
            }

            let selector = Selector::id_in(ids);
            let found = {
                let records = read_lock(&self.inner.records);
                let mut found = Vec::new();
                for record in records.get(ns).into_iter().flat_map(|r| r.values()) {
                    if selector.matches(&record.to_document())? {
                        found.push(record.clone());
                    }
                }
                found
            };
            trace!(%ns, requested = ids.len(), found = found.len(), "find completion records");
            Ok(self.cursor(found, faults.record_cursor_fails_after, faults.latency))
        })
    }

    fn upsert_record<'a>(
        &'a self,
        ns: &'a Namespace,
        record: CompletionRecord,
    ) -> BoxFuture<'a, StoreResult<()>> {
        Box::pin(async move {
            self.inner.counters.upserts.fetch_add(1, Ordering::SeqCst);
            let faults = self.faults();
            delay(faults.latency).await;
            check_reachable(&faults)?;
            if let Some(msg) = faults.upsert_error {
                return Err(StoreError::Write(msg));
            }

            self.put_record(ns, record);
            Ok(())
        })
    }
}

struct MemoryCursor<T> {
    items: VecDeque<T>,
    fail_after: Option<usize>,
    yielded: usize,
    latency: Option<Duration>,
    open: Arc<AtomicUsize>,
}

impl<T> MemoryCursor<T> {
    fn new(
        items: Vec<T>,
        fail_after: Option<usize>,
        latency: Option<Duration>,
        open: Arc<AtomicUsize>,
    ) -> Self {
        open.fetch_add(1, Ordering::SeqCst);
        Self {
            items: items.into(),
            fail_after,
            yielded: 0,
            latency,
            open,
        }
    }
}

impl<T> Drop for MemoryCursor<T> {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
    }
}

impl<T: Send> Cursor<T> for MemoryCursor<T> {
    fn next(&mut self) -> BoxFuture<'_, StoreResult<Option<T>>> {
        Box::pin(async move {
            delay(self.latency).await;
            if self.fail_after.is_some_and(|n| self.yielded >= n) {
                return Err(StoreError::Cursor(format!(
                    "cursor failed after {} items",
                    self.yielded
                )));
            }

            let item = self.items.pop_front();
            if item.is_some() {
                self.yielded += 1;
            }
            Ok(item)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::document;

    fn ns() -> Namespace {
        Namespace::new("db", "events")
    }

    fn seeded() -> InMemoryStore {
        let store = InMemoryStore::new();
        for (i, kind) in ["a", "b", "a", "a"].into_iter().enumerate() {
            store.insert(
                &ns(),
                document([("_id", DocValue::from(i as i64)), ("kind", DocValue::from(kind))]),
            );
        }
        store
    }

    async fn drain<T>(mut cursor: BoxCursor<T>) -> StoreResult<Vec<T>> {
        let mut out = Vec::new();
        while let Some(item) = cursor.next().await? {
            out.push(item);
        }
        Ok(out)
    }

    #[tokio::test]
    async fn count_and_find_respect_selector_and_limit() {
        let store = seeded();
        let selector = Selector::all().with("kind", "a");

        assert_eq!(store.count(&ns(), &selector).await, Ok(3));

        let cursor = store.find_ids(&ns(), &selector, Some(2)).await.unwrap();
        assert_eq!(store.open_cursors(), 1);
        let ids = drain(cursor).await.unwrap();
        assert_eq!(ids, vec![DocValue::from(0), DocValue::from(2)]);
        assert_eq!(store.open_cursors(), 0);
    }

    #[tokio::test]
    async fn injected_faults_surface_as_store_errors() {
        let store = seeded();
        store.update_faults(|f| f.count_error = Some("boom".into()));
        assert_eq!(
            store.count(&ns(), &Selector::all()).await,
            Err(StoreError::Query("boom".into()))
        );

        store.set_faults(Faults {
            find_cursor_fails_after: Some(1),
            ..Faults::default()
        });
        let cursor = store.find_ids(&ns(), &Selector::all(), None).await.unwrap();
        assert!(matches!(drain(cursor).await, Err(StoreError::Cursor(_))));
        assert_eq!(store.open_cursors(), 0);

        store.set_faults(Faults {
            unreachable: Some("down".into()),
            ..Faults::default()
        });
        assert!(matches!(
            store.upsert_record(&ns(), CompletionRecord::finished("x", "g", false)).await,
            Err(StoreError::Unreachable(_))
        ));
    }

    #[tokio::test]
    async fn records_are_upserted_and_found_in_one_query() {
        let store = InMemoryStore::new();
        let meta = Namespace::default_metadata();
        store
            .upsert_record(&meta, CompletionRecord::finished("a", "g", true))
            .await
            .unwrap();
        store
            .upsert_record(&meta, CompletionRecord::finished("a", "g", false))
            .await
            .unwrap();
        store.put_record(&meta, CompletionRecord::finished("b", "g", false));

        let ids = vec!["a".to_string(), "missing".to_string()];
        let found = drain(store.find_records(&meta, &ids).await.unwrap()).await.unwrap();
        assert_eq!(found, vec![CompletionRecord::finished("a", "g", false)]);
        assert_eq!(store.record_queries(), 1);
        assert_eq!(store.upserts(), 2);
    }

    #[test]
    fn update_where_rewrites_matching_documents() {
        let store = seeded();
        let touched = store
            .update_where(&ns(), &Selector::all().with("kind", "b"), |doc| {
                doc.insert("kind".into(), DocValue::from("c"));
            })
            .unwrap();
        assert_eq!(touched, 1);
        assert!(store.set_field(&ns(), &DocValue::from(0), "done", DocValue::from(true)));
        assert_eq!(store.documents(&ns())[0]["done"], DocValue::from(true));
    }
}
