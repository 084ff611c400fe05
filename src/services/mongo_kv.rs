use async_trait::async_trait;
use futures_util::StreamExt;
use mongodb::bson::{doc, Bson, Document};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{FindOneAndUpdateOptions, ReturnDocument, UpdateOptions};
use mongodb::{Collection, Database};

use super::kv::{KvStore, StoreError};

/// Mongo-backed implementation of the KV contract.
///
/// One `kv` collection, `_id` = key. Expiry is lazy: rows carry an
/// `expires_at` epoch-second (or null) and dead rows are dropped when a
/// read touches them. `set_if_absent` rides on the unique `_id` index, so
/// the dedup gate is a real insert race, not a check-then-set.
pub struct MongoKvStore {
    coll: Collection<Document>,
}

impl MongoKvStore {
    pub fn new(db: &Database) -> Self {
        Self {
            coll: db.collection::<Document>("kv"),
        }
    }

    fn now() -> i64 {
        chrono::Utc::now().timestamp()
    }

    fn expiry(ttl_secs: Option<i64>) -> Bson {
        match ttl_secs {
            Some(t) => Bson::Int64(Self::now() + t),
            None => Bson::Null,
        }
    }

    fn is_expired(d: &Document, now: i64) -> bool {
        matches!(d.get_i64("expires_at"), Ok(exp) if exp <= now)
    }

    fn backend(e: mongodb::error::Error) -> StoreError {
        StoreError::Backend(e.to_string())
    }

    fn is_duplicate_key(e: &mongodb::error::Error) -> bool {
        matches!(
            e.kind.as_ref(),
            ErrorKind::Write(WriteFailure::WriteError(we)) if we.code == 11000
        )
    }

    async fn find_live(&self, key: &str) -> Result<Option<Document>, StoreError> {
        let found = self
            .coll
            .find_one(doc! { "_id": key }, None)
            .await
            .map_err(Self::backend)?;

        let Some(d) = found else {
            return Ok(None);
        };

        if Self::is_expired(&d, Self::now()) {
            let _ = self.coll.delete_one(doc! { "_id": key }, None).await;
            return Ok(None);
        }
        Ok(Some(d))
    }
}

#[async_trait]
impl KvStore for MongoKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let doc = self.find_live(key).await?;
        Ok(doc.and_then(|d| d.get_str("value").ok().map(|s| s.to_string())))
    }

    async fn set(&self, key: &str, value: &str, ttl_secs: Option<i64>) -> Result<(), StoreError> {
        let update = doc! {
            "$set": { "value": value, "expires_at": Self::expiry(ttl_secs) }
        };
        let opts = UpdateOptions::builder().upsert(true).build();
        self.coll
            .update_one(doc! { "_id": key }, update, opts)
            .await
            .map_err(Self::backend)?;
        Ok(())
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl_secs: Option<i64>,
    ) -> Result<bool, StoreError> {
        // Clears an expired row first so the insert below can win.
        let _ = self.find_live(key).await?;

        let row = doc! {
            "_id": key,
            "value": value,
            "expires_at": Self::expiry(ttl_secs),
        };
        match self.coll.insert_one(row, None).await {
            Ok(_) => Ok(true),
            Err(e) if Self::is_duplicate_key(&e) => Ok(false),
            Err(e) => Err(Self::backend(e)),
        }
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let res = self
            .coll
            .delete_one(doc! { "_id": key }, None)
            .await
            .map_err(Self::backend)?;
        Ok(res.deleted_count > 0)
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.find_live(key).await?.is_some())
    }

    async fn increment_counter(
        &self,
        key: &str,
        ttl_secs: Option<i64>,
    ) -> Result<i64, StoreError> {
        let update = doc! {
            "$inc": { "counter": 1_i64 },
            "$set": { "expires_at": Self::expiry(ttl_secs) },
        };
        let opts = FindOneAndUpdateOptions::builder()
            .upsert(true)
            .return_document(ReturnDocument::After)
            .build();

        let updated = self
            .coll
            .find_one_and_update(doc! { "_id": key }, update, opts)
            .await
            .map_err(Self::backend)?;

        updated
            .and_then(|d| d.get_i64("counter").ok())
            .ok_or_else(|| StoreError::Backend("counter update returned no document".to_string()))
    }

    async fn list_by_prefix(&self, prefix: &str) -> Result<Vec<(String, String)>, StoreError> {
        let filter = doc! {
            "_id": { "$regex": format!("^{}", regex::escape(prefix)) }
        };
        let mut cursor = self
            .coll
            .find(filter, None)
            .await
            .map_err(Self::backend)?;

        let now = Self::now();
        let mut out: Vec<(String, String)> = Vec::new();
        while let Some(res) = cursor.next().await {
            let d = res.map_err(Self::backend)?;
            if Self::is_expired(&d, now) {
                continue;
            }
            let (Ok(key), Ok(value)) = (d.get_str("_id"), d.get_str("value")) else {
                continue;
            };
            out.push((key.to_string(), value.to_string()));
        }
        out.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(out)
    }
}
