//! Shared counter store for multi-instance deployments.

use std::time::Duration;

use async_trait::async_trait;
use bson::{doc, Document};
use mongodb::{
    options::{FindOneAndUpdateOptions, IndexOptions, ReturnDocument, UpdateModifications},
    Collection, Database, IndexModel,
};
use tracing::warn;

use super::CounterStore;

const COLLECTION: &str = "rate_limit_counters";
const COUNTER_TTL: Duration = Duration::from_secs(3_600);

pub struct MongoCounterStore {
    counters: Collection<Document>,
}

impl MongoCounterStore {
    pub async fn new(db: &Database) -> Self {
        let store = Self {
            counters: db.collection(COLLECTION),
        };
        store.ensure_indexes().await;
        store
    }

    async fn ensure_indexes(&self) {
        let ttl = IndexModel::builder()
            .keys(doc! { "updatedAt": 1 })
            .options(IndexOptions::builder().expire_after(COUNTER_TTL).build())
            .build();
        if let Err(e) = self.counters.create_index(ttl, None).await {
            warn!(error = %e, "rate limit counter ttl index creation failed; continuing");
        }
    }
}

#[async_trait]
impl CounterStore for MongoCounterStore {
    async fn incr(&self, key: &str, window_start: u64) -> Result<u64, String> {
        // Single pipeline upsert so concurrent increments for one key
        // serialize on the server.
        let update = UpdateModifications::Pipeline(vec![doc! {
            "$set": {
                "count": {
                    "$cond": [
                        { "$eq": ["$windowStart", window_start as i64] },
                        { "$add": [{ "$ifNull": ["$count", 0] }, 1] },
                        1
                    ]
                },
                "windowStart": window_start as i64,
                "updatedAt": "$$NOW",
            }
        }]);
        let options = FindOneAndUpdateOptions::builder()
            .upsert(true)
            .return_document(ReturnDocument::After)
            .build();

        let updated = self
            .counters
            .find_one_and_update(doc! { "_id": key }, update, options)
            .await
            .map_err(|e| e.to_string())?
            .ok_or_else(|| "counter upsert returned no document".to_string())?;

        let count = updated
            .get_i64("count")
            .or_else(|_| updated.get_i32("count").map(i64::from))
            .map_err(|e| e.to_string())?;
        Ok(count.max(0) as u64)
    }
}
