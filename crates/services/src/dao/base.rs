use bson::{Bson, Document};
use serde::{Serialize, de::DeserializeOwned};
use std::marker::PhantomData;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

use crate::store::{DocumentStore, Subscription};

#[derive(Debug, Error)]
pub enum DaoError {
    #[error("MongoDB error: {0}")]
    Mongo(#[from] mongodb::error::Error),
    #[error("BSON serialization error: {0}")]
    BsonSer(#[from] bson::ser::Error),
    #[error("BSON deserialization error: {0}")]
    BsonDe(#[from] bson::de::Error),
    #[error("Entity not found")]
    NotFound,
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Room is no longer active: {0}")]
    RoomInactive(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Validation: {0}")]
    Validation(String),
    #[error("No free room code after {0} attempts")]
    CodeSpaceExhausted(u32),
}

pub type DaoResult<T> = Result<T, DaoError>;

/// Typed access to one collection of a [`DocumentStore`].
pub struct BaseDao<T> {
    store: Arc<dyn DocumentStore>,
    collection: &'static str,
    watch_buffer: usize,
    _entity: PhantomData<fn() -> T>,
}

impl<T> Clone for BaseDao<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            collection: self.collection,
            watch_buffer: self.watch_buffer,
            _entity: PhantomData,
        }
    }
}

impl<T> BaseDao<T>
where
    T: Serialize + DeserializeOwned + Send + 'static,
{
    pub fn new(store: Arc<dyn DocumentStore>, collection: &'static str) -> Self {
        Self {
            store,
            collection,
            watch_buffer: 64,
            _entity: PhantomData,
        }
    }

    pub fn with_watch_buffer(mut self, watch_buffer: usize) -> Self {
        self.watch_buffer = watch_buffer;
        self
    }

    pub fn collection(&self) -> &'static str {
        self.collection
    }

    pub async fn find_by_id(&self, id: &str) -> DaoResult<T> {
        self.get(id).await?.ok_or(DaoError::NotFound)
    }

    pub async fn get(&self, id: &str) -> DaoResult<Option<T>> {
        match self.store.get(self.collection, id).await? {
            Some(doc) => Ok(Some(bson::from_document(doc)?)),
            None => Ok(None),
        }
    }

    pub async fn set(&self, id: &str, entity: &T) -> DaoResult<()> {
        let doc = bson::to_document(entity)?;
        self.store.set(self.collection, id, doc).await
    }

    /// Create-if-absent. `false` means another document already holds `id`.
    pub async fn create(&self, id: &str, entity: &T) -> DaoResult<bool> {
        let doc = bson::to_document(entity)?;
        self.store.create(self.collection, id, doc).await
    }

    pub async fn update_by_id(&self, id: &str, fields: Document) -> DaoResult<()> {
        self.store.update(self.collection, id, fields).await
    }

    pub async fn delete_by_id(&self, id: &str) -> DaoResult<bool> {
        self.store.delete(self.collection, id).await
    }

    pub async fn find_where(&self, field: &str, value: impl Into<Bson>) -> DaoResult<Vec<T>> {
        self.store
            .find_eq(self.collection, field, value.into())
            .await?
            .into_iter()
            .map(|doc| bson::from_document(doc).map_err(DaoError::from))
            .collect()
    }

    pub async fn watch_by_id(&self, id: &str) -> DaoResult<Subscription<Option<T>>> {
        let collection = self.collection;
        let sub = self.store.watch_document(collection, id).await?;
        Ok(sub.filter_map(self.watch_buffer, move |snapshot| match snapshot {
            None => Some(None),
            Some(doc) => match bson::from_document::<T>(doc) {
                Ok(entity) => Some(Some(entity)),
                Err(e) => {
                    warn!(collection, error = %e, "Skipping undecodable snapshot");
                    None
                }
            },
        }))
    }

    pub async fn watch_where(
        &self,
        field: &str,
        value: impl Into<Bson>,
    ) -> DaoResult<Subscription<Vec<T>>> {
        let collection = self.collection;
        let sub = self
            .store
            .watch_query(collection, field, value.into())
            .await?;
        Ok(sub.filter_map(self.watch_buffer, move |docs| {
            docs.into_iter()
                .map(bson::from_document::<T>)
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| warn!(collection, error = %e, "Skipping undecodable snapshot"))
                .ok()
        }))
    }
}
