use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::models::AlertEmitted;
use crate::services::kv::{KvStore, StoreError};

const EVENT_KEY_PREFIX: &str = "event:";
const EVENT_INDEX_KEY: &str = "events:index";
const DEDUP_KEY_PREFIX: &str = "dedup:";

const INDEX_RETENTION_SECS: i64 = 30 * 24 * 3600;
const DEDUP_TTL_SECS: i64 = 30 * 24 * 3600;
const DEFAULT_QUERY_WINDOW_SECS: i64 = 24 * 3600;

fn event_key(id: &str) -> String {
    format!("{EVENT_KEY_PREFIX}{id}")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct EventIndexEntry {
    event_id: String,
    occurred_at: i64,
    alert_id: String,
}

/// Append-only emitted-event log plus the per-(alert, stage, window)
/// dedup ledger that makes emission idempotent across redundant sweeps.
#[derive(Clone)]
pub struct EventStore {
    kv: Arc<dyn KvStore>,
}

impl EventStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    /// Stores the event and its index entry, trimming index entries older
    /// than the 30-day retention on every write.
    pub async fn append(&self, event: &AlertEmitted) -> Result<(), EngineError> {
        let raw = serde_json::to_string(event).map_err(StoreError::from)?;
        self.kv
            .set(&event_key(&event.event_id), &raw, Some(INDEX_RETENTION_SECS))
            .await?;

        let mut index = self.load_index().await?;
        let cutoff = event.occurred_at - INDEX_RETENTION_SECS;
        index.retain(|e| e.occurred_at > cutoff);
        index.push(EventIndexEntry {
            event_id: event.event_id.clone(),
            occurred_at: event.occurred_at,
            alert_id: event.alert_id.clone(),
        });
        self.write_index(&index).await
    }

    /// Events with `occurred_at > since` (default: the last 24 hours),
    /// ascending, capped at `limit`.
    pub async fn query(
        &self,
        since: Option<i64>,
        limit: usize,
        now: i64,
    ) -> Result<Vec<AlertEmitted>, EngineError> {
        let since = since.unwrap_or(now - DEFAULT_QUERY_WINDOW_SECS);

        let mut entries: Vec<EventIndexEntry> = self
            .load_index()
            .await?
            .into_iter()
            .filter(|e| e.occurred_at > since)
            .collect();
        entries.sort_by(|a, b| {
            a.occurred_at
                .cmp(&b.occurred_at)
                .then_with(|| a.event_id.cmp(&b.event_id))
        });
        entries.truncate(limit);

        let mut events = Vec::with_capacity(entries.len());
        for entry in entries {
            // index can outlive trimmed/expired documents
            if let Some(raw) = self.kv.get(&event_key(&entry.event_id)).await? {
                let event: AlertEmitted =
                    serde_json::from_str(&raw).map_err(StoreError::from)?;
                events.push(event);
            }
        }
        Ok(events)
    }

    /// Appends the event unless its `(alert, logical stage, window)` was
    /// already emitted. Returns whether the event was newly created; a
    /// false return suppresses only the notification, never the caller's
    /// state transition.
    pub async fn create_deduped(
        &self,
        event: &AlertEmitted,
        window_id: &str,
    ) -> Result<bool, EngineError> {
        let key = format!(
            "{DEDUP_KEY_PREFIX}{}:{}:{}",
            event.alert_id,
            event.logical_stage(),
            window_id
        );
        let won = self
            .kv
            .set_if_absent(&key, &event.occurred_at.to_string(), Some(DEDUP_TTL_SECS))
            .await?;

        if won {
            self.append(event).await?;
        }
        Ok(won)
    }

    async fn load_index(&self) -> Result<Vec<EventIndexEntry>, EngineError> {
        match self.kv.get(EVENT_INDEX_KEY).await? {
            None => Ok(Vec::new()),
            Some(raw) => Ok(serde_json::from_str(&raw).map_err(StoreError::from)?),
        }
    }

    async fn write_index(&self, index: &[EventIndexEntry]) -> Result<(), EngineError> {
        let raw = serde_json::to_string(index).map_err(StoreError::from)?;
        self.kv.set(EVENT_INDEX_KEY, &raw, None).await?;
        Ok(())
    }
}
