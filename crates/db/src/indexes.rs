use mongodb::{Database, IndexModel, options::IndexOptions};
use tracing::info;

use crate::models::{Room, RoomMember, User};

pub async fn ensure_indexes(db: &Database) -> Result<(), mongodb::error::Error> {
    // Users
    create_indexes(
        db,
        User::COLLECTION,
        vec![index_unique(bson::doc! { "email": 1 })],
    )
    .await?;

    // Rooms (the code is the _id, so uniqueness comes for free)
    create_indexes(
        db,
        Room::COLLECTION,
        vec![
            index(bson::doc! { "admin_id": 1 }),
            index(bson::doc! { "is_active": 1, "created_at": -1 }),
        ],
    )
    .await?;

    // Room members
    create_indexes(
        db,
        RoomMember::COLLECTION,
        vec![
            index(bson::doc! { "room_id": 1 }),
            index(bson::doc! { "user_id": 1, "is_active": 1 }),
        ],
    )
    .await?;

    info!("All indexes ensured");
    Ok(())
}

fn index(keys: bson::Document) -> IndexModel {
    IndexModel::builder().keys(keys).build()
}

fn index_unique(keys: bson::Document) -> IndexModel {
    IndexModel::builder()
        .keys(keys)
        .options(IndexOptions::builder().unique(true).build())
        .build()
}

async fn create_indexes(
    db: &Database,
    collection: &str,
    indexes: Vec<IndexModel>,
) -> Result<(), mongodb::error::Error> {
    db.collection::<bson::Document>(collection)
        .create_indexes(indexes)
        .await?;
    info!(collection, "Indexes created");
    Ok(())
}
