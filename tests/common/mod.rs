#![allow(dead_code)]

use nexuswire::document::Document;
use nexuswire::errors::DbError;
use nexuswire::storage::{MemoryGateway, Namespace, StorageGateway};
use nexuswire::Handler;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

pub const DB: &str = "test";
pub const COLL: &str = "values";

pub fn to_doc(d: bson::Document) -> Document {
    Document::try_from(d).expect("convertible test document")
}

pub fn ns() -> Namespace {
    Namespace::new(DB, COLL)
}

/// Wraps a [`MemoryGateway`] and counts calls per operation.
#[derive(Debug, Default)]
pub struct CountingGateway {
    pub inner: MemoryGateway,
    pub ensures: AtomicUsize,
    pub fetches: AtomicUsize,
    pub inserts: AtomicUsize,
    pub updates: AtomicUsize,
}

impl CountingGateway {
    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn inserts(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
    }

    pub fn updates(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }
}

impl StorageGateway for CountingGateway {
    fn ensure_collection(&self, ns: &Namespace) -> impl Future<Output = Result<bool, DbError>> + Send {
        self.ensures.fetch_add(1, Ordering::SeqCst);
        self.inner.ensure_collection(ns)
    }

    fn fetch_all(&self, ns: &Namespace) -> impl Future<Output = Result<Vec<Document>, DbError>> + Send {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.inner.fetch_all(ns)
    }

    fn insert(&self, ns: &Namespace, doc: &Document) -> impl Future<Output = Result<(), DbError>> + Send {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        self.inner.insert(ns, doc)
    }

    fn update_by_id(&self, ns: &Namespace, doc: &Document) -> impl Future<Output = Result<u64, DbError>> + Send {
        self.updates.fetch_add(1, Ordering::SeqCst);
        self.inner.update_by_id(ns, doc)
    }
}

/// Wraps a [`MemoryGateway`] and injects storage faults.
///
/// Call numbers are 1-based and counted per operation.
#[derive(Debug, Default)]
pub struct FaultyGateway {
    pub inner: MemoryGateway,
    pub fail_fetch_at: Option<usize>,
    pub fail_update_at: Option<usize>,
    /// `update_by_id` reports zero rows and writes nothing, as if the
    /// document had been deleted after the scan.
    pub vanish: bool,
    pub(crate) fetches: AtomicUsize,
    pub(crate) updates: AtomicUsize,
}

impl FaultyGateway {
    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl StorageGateway for FaultyGateway {
    fn ensure_collection(&self, ns: &Namespace) -> impl Future<Output = Result<bool, DbError>> + Send {
        self.inner.ensure_collection(ns)
    }

    fn fetch_all(&self, ns: &Namespace) -> impl Future<Output = Result<Vec<Document>, DbError>> + Send {
        let call = self.fetches.fetch_add(1, Ordering::SeqCst) + 1;
        let fail = self.fail_fetch_at == Some(call);
        let scan = (!fail).then(|| self.inner.fetch_all(ns));
        async move {
            match scan {
                Some(scan) => scan.await,
                None => Err(DbError::storage(format!("fetch {call} failed"))),
            }
        }
    }

    fn insert(&self, ns: &Namespace, doc: &Document) -> impl Future<Output = Result<(), DbError>> + Send {
        self.inner.insert(ns, doc)
    }

    fn update_by_id(&self, ns: &Namespace, doc: &Document) -> impl Future<Output = Result<u64, DbError>> + Send {
        let call = self.updates.fetch_add(1, Ordering::SeqCst) + 1;
        let fail = self.fail_update_at == Some(call);
        let write = (!fail && !self.vanish).then(|| self.inner.update_by_id(ns, doc));
        async move {
            match write {
                Some(write) => write.await,
                None if fail => Err(DbError::storage(format!("update {call} failed"))),
                None => Ok(0),
            }
        }
    }
}

/// Creates the test collection in `gateway` and inserts `docs`.
pub async fn seed(gateway: &MemoryGateway, docs: Vec<bson::Document>) {
    gateway.ensure_collection(&ns()).await.expect("create collection");
    for d in docs {
        gateway.insert(&ns(), &to_doc(d)).await.expect("seed insert");
    }
}

/// A handler over a counting gateway whose test collection holds `docs`.
pub async fn seeded(docs: Vec<bson::Document>) -> Handler<CountingGateway> {
    let gateway = CountingGateway::default();
    seed(&gateway.inner, docs).await;
    Handler::new(Arc::new(gateway))
}

/// A handler over `gateway` whose test collection holds `docs`.
pub async fn seeded_faulty(gateway: FaultyGateway, docs: Vec<bson::Document>) -> Handler<FaultyGateway> {
    seed(&gateway.inner, docs).await;
    Handler::new(Arc::new(gateway))
}

pub async fn stored_in(gateway: &MemoryGateway) -> Vec<bson::Document> {
    gateway.fetch_all(&ns()).await.expect("fetch").into_iter().map(bson::Document::from).collect()
}

pub async fn stored(handler: &Handler<CountingGateway>) -> Vec<bson::Document> {
    stored_in(&handler.gateway().inner).await
}

pub fn update_cmd(updates: Vec<bson::Document>) -> Document {
    let updates: Vec<bson::Bson> = updates.into_iter().map(bson::Bson::Document).collect();
    to_doc(bson::doc! { "update": COLL, "updates": updates, "$db": DB })
}
