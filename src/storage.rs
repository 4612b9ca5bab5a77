//! Storage gateway contract consumed by the command layer, plus an in-memory
//! implementation backed by flat keyed records.

use crate::document::{Document, Value};
use crate::errors::DbError;
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::future::{Future, ready};

/// Addressing pair `(database, collection)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace {
    pub db: String,
    pub collection: String,
}

impl Namespace {
    pub fn new(db: impl Into<String>, collection: impl Into<String>) -> Self {
        Self { db: db.into(), collection: collection.into() }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.db, self.collection)
    }
}

/// Asynchronous document storage. Implementations must be shareable across
/// connection tasks.
pub trait StorageGateway: Send + Sync {
    /// Creates the collection if needed; returns `true` when it was created.
    fn ensure_collection(&self, ns: &Namespace) -> impl Future<Output = Result<bool, DbError>> + Send;

    /// Every document of the collection, in storage order.
    fn fetch_all(&self, ns: &Namespace) -> impl Future<Output = Result<Vec<Document>, DbError>> + Send;

    fn insert(&self, ns: &Namespace, doc: &Document) -> impl Future<Output = Result<(), DbError>> + Send;

    /// Replaces the stored document with the same `_id`; returns rows affected.
    fn update_by_id(&self, ns: &Namespace, doc: &Document) -> impl Future<Output = Result<u64, DbError>> + Send;
}

type Records = IndexMap<Vec<u8>, Vec<u8>>;

/// In-memory gateway: per namespace, an insertion-ordered map from the
/// encoded `_id` to the encoded document.
#[derive(Debug, Default)]
pub struct MemoryGateway {
    collections: RwLock<HashMap<Namespace, Records>>,
}

fn id_key(doc: &Document) -> Result<Vec<u8>, DbError> {
    let id = doc.get("_id").ok_or_else(|| DbError::storage("document has no _id"))?;
    let key: Document = std::iter::once(("_id", id.clone())).collect();
    key.to_bytes()
}

impl MemoryGateway {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn collection_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.collections.read().keys().map(ToString::to_string).collect();
        names.sort();
        names
    }

    /// Number of stored documents, or `None` if the collection does not exist.
    #[must_use]
    pub fn count(&self, ns: &Namespace) -> Option<usize> {
        self.collections.read().get(ns).map(IndexMap::len)
    }

    /// Looks a document up by `_id` value.
    ///
    /// # Errors
    /// Returns an error when a stored record cannot be decoded.
    pub fn find_by_id(&self, ns: &Namespace, id: &Value) -> Result<Option<Document>, DbError> {
        let probe: Document = std::iter::once(("_id", id.clone())).collect();
        let key = id_key(&probe)?;
        let guard = self.collections.read();
        match guard.get(ns).and_then(|records| records.get(&key)) {
            Some(bytes) => Document::from_bytes(bytes).map(Some),
            None => Ok(None),
        }
    }

    fn create(&self, ns: &Namespace) -> bool {
        let mut guard = self.collections.write();
        if guard.contains_key(ns) {
            return false;
        }
        guard.insert(ns.clone(), Records::new());
        true
    }

    fn scan(&self, ns: &Namespace) -> Result<Vec<Document>, DbError> {
        let guard = self.collections.read();
        let records = guard.get(ns).ok_or_else(|| DbError::storage(format!("collection {ns} does not exist")))?;
        records.values().map(|bytes| Document::from_bytes(bytes)).collect()
    }

    fn put_new(&self, ns: &Namespace, doc: &Document) -> Result<(), DbError> {
        let key = id_key(doc)?;
        let bytes = doc.to_bytes()?;
        let mut guard = self.collections.write();
        let records =
            guard.get_mut(ns).ok_or_else(|| DbError::storage(format!("collection {ns} does not exist")))?;
        if records.contains_key(&key) {
            return Err(DbError::storage(format!(
                "duplicate key in {ns}: _id {}",
                doc.get("_id").map_or_else(String::new, ToString::to_string)
            )));
        }
        records.insert(key, bytes);
        Ok(())
    }

    fn replace(&self, ns: &Namespace, doc: &Document) -> Result<u64, DbError> {
        let key = id_key(doc)?;
        let bytes = doc.to_bytes()?;
        let mut guard = self.collections.write();
        match guard.get_mut(ns).and_then(|records| records.get_mut(&key)) {
            Some(slot) => {
                *slot = bytes;
                Ok(1)
            }
            None => Ok(0),
        }
    }
}

impl StorageGateway for MemoryGateway {
    fn ensure_collection(&self, ns: &Namespace) -> impl Future<Output = Result<bool, DbError>> + Send {
        ready(Ok(self.create(ns)))
    }

    fn fetch_all(&self, ns: &Namespace) -> impl Future<Output = Result<Vec<Document>, DbError>> + Send {
        ready(self.scan(ns))
    }

    fn insert(&self, ns: &Namespace, doc: &Document) -> impl Future<Output = Result<(), DbError>> + Send {
        ready(self.put_new(ns, doc))
    }

    fn update_by_id(&self, ns: &Namespace, doc: &Document) -> impl Future<Output = Result<u64, DbError>> + Send {
        ready(self.replace(ns, doc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: i32, a: i32) -> Document {
        vec![("_id", Value::Int32(id)), ("a", Value::Int32(a))].into_iter().collect()
    }

    #[tokio::test]
    async fn ensure_collection_reports_creation_once() {
        let g = MemoryGateway::new();
        let ns = Namespace::new("db", "c");
        assert!(g.ensure_collection(&ns).await.unwrap());
        assert!(!g.ensure_collection(&ns).await.unwrap());
        assert_eq!(g.collection_names(), vec!["db.c".to_owned()]);
    }

    #[tokio::test]
    async fn insert_fetch_update_in_storage_order() {
        let g = MemoryGateway::new();
        let ns = Namespace::new("db", "c");
        g.ensure_collection(&ns).await.unwrap();
        g.insert(&ns, &doc(2, 1)).await.unwrap();
        g.insert(&ns, &doc(1, 1)).await.unwrap();
        assert_eq!(g.update_by_id(&ns, &doc(1, 9)).await.unwrap(), 1);
        assert_eq!(g.update_by_id(&ns, &doc(3, 9)).await.unwrap(), 0);
        let all = g.fetch_all(&ns).await.unwrap();
        assert_eq!(all, vec![doc(2, 1), doc(1, 9)]);
        assert_eq!(g.find_by_id(&ns, &Value::Int32(1)).unwrap(), Some(doc(1, 9)));
    }

    #[tokio::test]
    async fn duplicate_and_missing_collection_are_storage_errors() {
        let g = MemoryGateway::new();
        let ns = Namespace::new("db", "c");
        assert!(matches!(g.fetch_all(&ns).await, Err(DbError::Storage(_))));
        g.ensure_collection(&ns).await.unwrap();
        g.insert(&ns, &doc(1, 1)).await.unwrap();
        assert!(matches!(g.insert(&ns, &doc(1, 2)).await, Err(DbError::Storage(_))));
        let no_id: Document = vec![("a", Value::Int32(1))].into_iter().collect();
        assert!(matches!(g.insert(&ns, &no_id).await, Err(DbError::Storage(_))));
    }
}
