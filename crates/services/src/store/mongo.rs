use async_trait::async_trait;
use bson::{Bson, Document, doc};
use futures::{StreamExt, TryStreamExt};
use mongodb::{Collection, Database};
use tracing::{debug, warn};

use super::{DocumentStore, Subscription};
use crate::dao::base::{DaoError, DaoResult};

/// [`DocumentStore`] over a MongoDB database.
///
/// Watches are built on change streams, so the deployment must be a replica
/// set (a single-node `rs0` is enough for development).
#[derive(Clone)]
pub struct MongoStore {
    db: Database,
    watch_buffer: usize,
}

impl MongoStore {
    pub fn new(db: Database, watch_buffer: usize) -> Self {
        Self { db, watch_buffer }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    fn collection(&self, name: &str) -> Collection<Document> {
        self.db.collection::<Document>(name)
    }
}

fn is_duplicate_key(e: &mongodb::error::Error) -> bool {
    matches!(
        *e.kind,
        mongodb::error::ErrorKind::Write(mongodb::error::WriteFailure::WriteError(ref write_error))
            if write_error.code == 11000
    )
}

async fn find_sorted(
    collection: &Collection<Document>,
    filter: Document,
) -> Result<Vec<Document>, mongodb::error::Error> {
    collection
        .find(filter)
        .sort(doc! { "_id": 1 })
        .await?
        .try_collect()
        .await
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn get(&self, collection: &str, id: &str) -> DaoResult<Option<Document>> {
        Ok(self.collection(collection).find_one(doc! { "_id": id }).await?)
    }

    async fn set(&self, collection: &str, id: &str, mut doc: Document) -> DaoResult<()> {
        doc.insert("_id", id);
        self.collection(collection)
            .replace_one(doc! { "_id": id }, doc)
            .upsert(true)
            .await?;
        Ok(())
    }

    async fn create(&self, collection: &str, id: &str, mut doc: Document) -> DaoResult<bool> {
        doc.insert("_id", id);
        match self.collection(collection).insert_one(doc).await {
            Ok(_) => {
                debug!(collection, id, "Inserted document");
                Ok(true)
            }
            Err(e) if is_duplicate_key(&e) => Ok(false),
            Err(e) => Err(DaoError::Mongo(e)),
        }
    }

    async fn update(&self, collection: &str, id: &str, mut fields: Document) -> DaoResult<()> {
        fields.remove("_id");
        if fields.is_empty() {
            return Ok(());
        }

        let result = self
            .collection(collection)
            .update_one(doc! { "_id": id }, doc! { "$set": fields })
            .await?;
        if result.matched_count == 0 {
            return Err(DaoError::NotFound);
        }
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> DaoResult<bool> {
        let result = self
            .collection(collection)
            .delete_one(doc! { "_id": id })
            .await?;
        Ok(result.deleted_count > 0)
    }

    async fn find_eq(
        &self,
        collection: &str,
        field: &str,
        value: Bson,
    ) -> DaoResult<Vec<Document>> {
        let mut filter = Document::new();
        filter.insert(field, value);
        Ok(find_sorted(&self.collection(collection), filter).await?)
    }

    async fn watch_document(
        &self,
        collection: &str,
        id: &str,
    ) -> DaoResult<Subscription<Option<Document>>> {
        let coll = self.collection(collection);
        // Open the stream before the first read so no change slips in between.
        let mut stream = coll
            .watch()
            .pipeline([doc! { "$match": { "documentKey._id": id } }])
            .await?;
        let initial = coll.find_one(doc! { "_id": id }).await?;
        let id = id.to_string();

        Ok(Subscription::spawn(self.watch_buffer, move |tx| async move {
            if tx.send(initial).await.is_err() {
                return;
            }

            while let Some(event) = stream.next().await {
                if let Err(e) = event {
                    warn!(error = %e, collection = %coll.name(), %id, "Change stream failed");
                    return;
                }
                match coll.find_one(doc! { "_id": id.as_str() }).await {
                    Ok(snapshot) => {
                        if tx.send(snapshot).await.is_err() {
                            return;
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, %id, "Failed to re-read watched document");
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
        let coll = self.collection(collection);
        let mut filter = Document::new();
        filter.insert(field, value);

        // Deletes carry no full document, so any change in the collection
        // triggers a re-query.
        let mut stream = coll.watch().await?;
        let initial = find_sorted(&coll, filter.clone()).await?;

        Ok(Subscription::spawn(self.watch_buffer, move |tx| async move {
            let mut last = initial;
            if tx.send(last.clone()).await.is_err() {
                return;
            }

            while let Some(event) = stream.next().await {
                if let Err(e) = event {
                    warn!(error = %e, collection = %coll.name(), "Change stream failed");
                    return;
                }
                match find_sorted(&coll, filter.clone()).await {
                    Ok(current) if current != last => {
                        last = current;
                        if tx.send(last.clone()).await.is_err() {
                            return;
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(error = %e, "Failed to re-run watched query");
                        return;
                    }
                }
            }
        }))
    }
}
