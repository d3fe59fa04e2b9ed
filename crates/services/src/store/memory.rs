use async_trait::async_trait;
use bson::{Bson, Document};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::debug;

use super::{DocumentStore, Subscription};
use crate::dao::base::{DaoError, DaoResult};

#[derive(Debug, Clone)]
struct Change {
    collection: String,
    id: String,
}

struct Inner {
    docs: DashMap<(String, String), Document>,
    changes: broadcast::Sender<Change>,
}

impl Inner {
    fn get(&self, collection: &str, id: &str) -> Option<Document> {
        self.docs
            .get(&(collection.to_string(), id.to_string()))
            .map(|d| d.value().clone())
    }

    fn find_eq(&self, collection: &str, field: &str, value: &Bson) -> Vec<Document> {
        let mut matches: Vec<(String, Document)> = self
            .docs
            .iter()
            .filter(|entry| entry.key().0 == collection)
            .filter(|entry| entry.value().get(field) == Some(value))
            .map(|entry| (entry.key().1.clone(), entry.value().clone()))
            .collect();
        matches.sort_by(|a, b| a.0.cmp(&b.0));
        matches.into_iter().map(|(_, doc)| doc).collect()
    }

    fn notify(&self, collection: &str, id: &str) {
        // No receivers is fine: nobody is watching.
        let _ = self.changes.send(Change {
            collection: collection.to_string(),
            id: id.to_string(),
        });
    }
}

/// Process-local document store with change notifications.
///
/// Backs the test suite and `store.backend = "memory"` deployments.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
    watch_buffer: usize,
}

impl MemoryStore {
    pub fn new(watch_buffer: usize) -> Self {
        let (changes, _) = broadcast::channel(1024);
        Self {
            inner: Arc::new(Inner {
                docs: DashMap::new(),
                changes,
            }),
            watch_buffer,
        }
    }

    pub fn len(&self) -> usize {
        self.inner.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.docs.is_empty()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(64)
    }
}

fn with_id(mut doc: Document, id: &str) -> Document {
    doc.insert("_id", id);
    doc
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, id: &str) -> DaoResult<Option<Document>> {
        Ok(self.inner.get(collection, id))
    }

    async fn set(&self, collection: &str, id: &str, doc: Document) -> DaoResult<()> {
        self.inner
            .docs
            .insert((collection.to_string(), id.to_string()), with_id(doc, id));
        self.inner.notify(collection, id);
        Ok(())
    }

    async fn create(&self, collection: &str, id: &str, doc: Document) -> DaoResult<bool> {
        let created = match self
            .inner
            .docs
            .entry((collection.to_string(), id.to_string()))
        {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(with_id(doc, id));
                true
            }
        };

        if created {
            self.inner.notify(collection, id);
        }
        Ok(created)
    }

    async fn update(&self, collection: &str, id: &str, fields: Document) -> DaoResult<()> {
        {
            let mut existing = self
                .inner
                .docs
                .get_mut(&(collection.to_string(), id.to_string()))
                .ok_or(DaoError::NotFound)?;
            for (key, value) in fields {
                if key != "_id" {
                    existing.insert(key, value);
                }
            }
        }
        self.inner.notify(collection, id);
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> DaoResult<bool> {
        let removed = self
            .inner
            .docs
            .remove(&(collection.to_string(), id.to_string()))
            .is_some();
        if removed {
            self.inner.notify(collection, id);
        }
        Ok(removed)
    }

    async fn find_eq(
        &self,
        collection: &str,
        field: &str,
        value: Bson,
    ) -> DaoResult<Vec<Document>> {
        Ok(self.inner.find_eq(collection, field, &value))
    }

    async fn watch_document(
        &self,
        collection: &str,
        id: &str,
    ) -> DaoResult<Subscription<Option<Document>>> {
        let inner = self.inner.clone();
        let collection = collection.to_string();
        let id = id.to_string();
        // Subscribe before the first read so no change slips in between.
        let mut changes = inner.changes.subscribe();

        Ok(Subscription::spawn(self.watch_buffer, move |tx| async move {
            let mut last = inner.get(&collection, &id);
            if tx.send(last.clone()).await.is_err() {
                return;
            }

            loop {
                match changes.recv().await {
                    Ok(change) if change.collection == collection && change.id == id => {}
                    Ok(_) => continue,
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(%collection, %id, skipped, "Document watch lagged, resyncing");
                    }
                    Err(RecvError::Closed) => return,
                }

                let current = inner.get(&collection, &id);
                if current != last {
                    last = current;
                    if tx.send(last.clone()).await.is_err() {
                        return;
                    }
                }
            }
        }))
    }

    async fn watch_query(
        &self,
        collection: &str,
        field: &str,
        value: Bson,
    ) -> DaoResult<Subscription<Vec<Document>>> {
        let inner = self.inner.clone();
        let collection = collection.to_string();
        let field = field.to_string();
        let mut changes = inner.changes.subscribe();

        Ok(Subscription::spawn(self.watch_buffer, move |tx| async move {
            let mut last = inner.find_eq(&collection, &field, &value);
            if tx.send(last.clone()).await.is_err() {
                return;
            }

            loop {
                match changes.recv().await {
                    Ok(change) if change.collection == collection => {}
                    Ok(_) => continue,
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(%collection, %field, skipped, "Query watch lagged, resyncing");
                    }
                    Err(RecvError::Closed) => return,
                }

                let current = inner.find_eq(&collection, &field, &value);
                if current != last {
                    last = current;
                    if tx.send(last.clone()).await.is_err() {
                        return;
                    }
                }
            }
        }))
    }
}
