use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::services::alert_store::normalize_symbol;
use crate::services::kv::{KvStore, StoreError};

const JOURNAL_ENTRY_PREFIX: &str = "journal:entry:";
const JOURNAL_SEQ_KEY: &str = "journal:seq";

fn entry_key(id: &str) -> String {
    format!("{JOURNAL_ENTRY_PREFIX}{id}")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: String,
    pub symbol_or_address: Option<String>,
    pub text: String,
    pub tags: Vec<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// KV-backed notes attached (optionally) to a symbol. Ids come from the
/// store's counter so entries sort naturally in creation order.
#[derive(Clone)]
pub struct JournalStore {
    kv: Arc<dyn KvStore>,
}

impl JournalStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    pub async fn create(
        &self,
        text: &str,
        symbol_or_address: Option<&str>,
        tags: Vec<String>,
        now: i64,
    ) -> Result<JournalEntry, EngineError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(EngineError::InvalidRequest(
                "journal text must not be empty".to_string(),
            ));
        }

        let seq = self.kv.increment_counter(JOURNAL_SEQ_KEY, None).await?;
        let entry = JournalEntry {
            id: seq.to_string(),
            symbol_or_address: symbol_or_address.map(normalize_symbol),
            text: text.to_string(),
            tags,
            created_at: now,
            updated_at: now,
        };
        self.put(&entry).await?;
        Ok(entry)
    }

    pub async fn get(&self, id: &str) -> Result<Option<JournalEntry>, EngineError> {
        match self.kv.get(&entry_key(id)).await? {
            None => Ok(None),
            Some(raw) => Ok(Some(
                serde_json::from_str(&raw).map_err(StoreError::from)?,
            )),
        }
    }

    /// Entries (optionally filtered by symbol), newest first.
    pub async fn list(
        &self,
        symbol_or_address: Option<&str>,
    ) -> Result<Vec<JournalEntry>, EngineError> {
        let symbol = symbol_or_address.map(normalize_symbol);

        let mut entries: Vec<JournalEntry> = Vec::new();
        for (_, raw) in self.kv.list_by_prefix(JOURNAL_ENTRY_PREFIX).await? {
            let entry: JournalEntry = serde_json::from_str(&raw).map_err(StoreError::from)?;
            if matches!(&symbol, Some(sym) if entry.symbol_or_address.as_ref() != Some(sym)) {
                continue;
            }
            entries.push(entry);
        }

        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(entries)
    }

    pub async fn update(
        &self,
        id: &str,
        text: Option<&str>,
        tags: Option<Vec<String>>,
        now: i64,
    ) -> Result<Option<JournalEntry>, EngineError> {
        let Some(mut entry) = self.get(id).await? else {
            return Ok(None);
        };

        if let Some(text) = text {
            let text = text.trim();
            if text.is_empty() {
                return Err(EngineError::InvalidRequest(
                    "journal text must not be empty".to_string(),
                ));
            }
            entry.text = text.to_string();
        }
        if let Some(tags) = tags {
            entry.tags = tags;
        }
        entry.updated_at = now;

        self.put(&entry).await?;
        Ok(Some(entry))
    }

    pub async fn delete(&self, id: &str) -> Result<bool, EngineError> {
        Ok(self.kv.delete(&entry_key(id)).await?)
    }

    async fn put(&self, entry: &JournalEntry) -> Result<(), EngineError> {
        let raw = serde_json::to_string(entry).map_err(StoreError::from)?;
        self.kv.set(&entry_key(&entry.id), &raw, None).await?;
        Ok(())
    }
}
