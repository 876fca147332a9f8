// src/store/mod.rs

//! Narrow store capabilities the dependency core needs.
//!
//! The rest of the crate never talks to a database directly. It sees two
//! capability traits:
//! - [`SelectorReader`]: count documents matching a selector and stream the
//!   ids of those documents,
//! - [`CompletionStore`]: look up and upsert completion records.
//!
//! Cursors are owned values ([`BoxCursor`]) and release whatever they hold in
//! `Drop`, so a cursor goes away on every exit path of the code using it.
//!
//! [`memory::InMemoryStore`] implements both traits and is what tests (and
//! rehearsal runs) use.

pub mod memory;
pub mod record;

use std::future::Future;
use std::pin::Pin;

use crate::document::{DocValue, Selector};
use crate::errors::StoreResult;
use crate::types::{Identifier, Namespace};

pub use memory::{Faults, InMemoryStore};
pub use record::{CompletionRecord, finish_migration};

/// Boxed, sendable future returned by the capability traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Forward-only stream of query results.
pub trait Cursor<T>: Send {
    /// Next item, or `None` once exhausted.
    fn next(&mut self) -> BoxFuture<'_, StoreResult<Option<T>>>;
}

pub type BoxCursor<T> = Box<dyn Cursor<T>>;

/// Reads the documents a migration targets.
pub trait SelectorReader: Send + Sync {
    /// Number of documents in `ns` matching `selector`.
    ///
    /// Connection failures surface here as `StoreError::Unreachable`.
    fn count<'a>(
        &'a self,
        ns: &'a Namespace,
        selector: &'a Selector,
    ) -> BoxFuture<'a, StoreResult<u64>>;

    /// Stream the `_id` of each matching document, at most `limit` of them.
    fn find_ids<'a>(
        &'a self,
        ns: &'a Namespace,
        selector: &'a Selector,
        limit: Option<usize>,
    ) -> BoxFuture<'a, StoreResult<BoxCursor<DocValue>>>;
}

/// Persists proof that tasks finished.
pub trait CompletionStore: Send + Sync {
    /// All records in `ns` whose id is one of `ids`, in a single query.
    fn find_records<'a>(
        &'a self,
        ns: &'a Namespace,
        ids: &'a [Identifier],
    ) -> BoxFuture<'a, StoreResult<BoxCursor<CompletionRecord>>>;

    /// Insert or overwrite the record with `record.id`.
    fn upsert_record<'a>(
        &'a self,
        ns: &'a Namespace,
        record: CompletionRecord,
    ) -> BoxFuture<'a, StoreResult<()>>;
}
