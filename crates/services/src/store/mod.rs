pub mod memory;
pub mod mongo;

use async_trait::async_trait;
use bson::{Bson, Document};
use std::future::Future;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::dao::base::DaoResult;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

/// Document-oriented persistence the DAOs are written against.
///
/// Documents are addressed by `(collection, id)`; the id is mirrored into the
/// document's `_id` field on every write. Watches emit an initial snapshot
/// and then a fresh snapshot after each change, until the [`Subscription`]
/// is dropped.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: &str, id: &str) -> DaoResult<Option<Document>>;

    /// Overwrites (or inserts) the whole document.
    async fn set(&self, collection: &str, id: &str, doc: Document) -> DaoResult<()>;

    /// Inserts only if no document with this id exists. Returns `false` on collision.
    async fn create(&self, collection: &str, id: &str, doc: Document) -> DaoResult<bool>;

    /// Merges top-level `fields` into an existing document. `NotFound` if absent.
    async fn update(&self, collection: &str, id: &str, fields: Document) -> DaoResult<()>;

    async fn delete(&self, collection: &str, id: &str) -> DaoResult<bool>;

    /// Documents whose `field` equals `value`, ordered by id.
    async fn find_eq(&self, collection: &str, field: &str, value: Bson)
        -> DaoResult<Vec<Document>>;

    async fn watch_document(
        &self,
        collection: &str,
        id: &str,
    ) -> DaoResult<Subscription<Option<Document>>>;

    async fn watch_query(
        &self,
        collection: &str,
        field: &str,
        value: Bson,
    ) -> DaoResult<Subscription<Vec<Document>>>;
}

/// A stream of snapshots fed by a background task. Dropping it cancels the task.
pub struct Subscription<T> {
    rx: mpsc::Receiver<T>,
    task: JoinHandle<()>,
}

impl<T: Send + 'static> Subscription<T> {
    /// Runs `producer` on a new task, handing it the sending half of a channel
    /// with room for `buffer` snapshots.
    pub fn spawn<F, Fut>(buffer: usize, producer: F) -> Self
    where
        F: FnOnce(mpsc::Sender<T>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let task = tokio::spawn(producer(tx));
        Self { rx, task }
    }

    /// Next snapshot, or `None` once the producer has stopped.
    pub async fn next(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Converts every snapshot with `f`, dropping those it maps to `None`.
    pub fn filter_map<U, F>(mut self, buffer: usize, mut f: F) -> Subscription<U>
    where
        U: Send + 'static,
        F: FnMut(T) -> Option<U> + Send + 'static,
    {
        Subscription::spawn(buffer, move |tx| async move {
            while let Some(item) = self.next().await {
                if let Some(mapped) = f(item) {
                    if tx.send(mapped).await.is_err() {
                        break;
                    }
                }
            }
        })
    }

    pub fn cancel(self) {}
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}
