use std::sync::{Arc, OnceLock};

use regex::Regex;

use crate::error::EngineError;
use crate::models::alert::{DEFAULT_EXPIRY_MINUTES, DEFAULT_TWO_STAGE_COOLDOWN_MINUTES};
use crate::models::{
    Alert, AlertCommon, AlertStage, AlertStatus, CreateAlertRequest, DormantAwakeningAlert,
    DormantParams, DormantStage, ThresholdAlert, ThresholdCondition, TwoStageAlert,
};
use crate::services::kv::{KvStore, StoreError};
use crate::services::runtime::IdGen;

const ALERT_KEY_PREFIX: &str = "alert:";
const ALERT_INDEX_KEY: &str = "alerts:index";

fn alert_key(id: &str) -> String {
    format!("{ALERT_KEY_PREFIX}{id}")
}

/// Canonical form used for storage and every lookup: ticker-like inputs
/// are upper-cased, address-like inputs (base58, 0x-hex) pass through.
pub fn normalize_symbol(input: &str) -> String {
    static ADDRESS: OnceLock<Regex> = OnceLock::new();
    let re = ADDRESS.get_or_init(|| {
        Regex::new(r"^(0x[0-9a-fA-F]{40}|[1-9A-HJ-NP-Za-km-z]{32,44})$").unwrap()
    });

    let s = input.trim();
    if re.is_match(s) {
        s.to_string()
    } else {
        s.to_uppercase()
    }
}

/// Partial update applied through [`AlertStore::update`].
#[derive(Debug, Default, Clone)]
pub struct AlertUpdate {
    pub condition: Option<ThresholdCondition>,
    pub target_price: Option<f64>,
    pub note: Option<String>,
    pub enabled: Option<bool>,
}

/// CRUD plus the active-id index over alert definitions. Every alert is
/// one complete KV document; `save` is a full overwrite, so the persisted
/// snapshot is always self-consistent.
#[derive(Clone)]
pub struct AlertStore {
    kv: Arc<dyn KvStore>,
    ids: Arc<dyn IdGen>,
}

impl AlertStore {
    pub fn new(kv: Arc<dyn KvStore>, ids: Arc<dyn IdGen>) -> Self {
        Self { kv, ids }
    }

    pub async fn create(&self, req: CreateAlertRequest, now: i64) -> Result<Alert, EngineError> {
        let alert = self.build(req, now)?;
        self.put(&alert).await?;
        self.index_add(alert.id()).await?;
        Ok(alert)
    }

    fn build(&self, req: CreateAlertRequest, now: i64) -> Result<Alert, EngineError> {
        match req {
            CreateAlertRequest::Threshold {
                symbol_or_address,
                timeframe,
                condition,
                target_price,
                note,
            } => {
                if !target_price.is_finite() || target_price <= 0.0 {
                    return Err(EngineError::InvalidRequest(
                        "target_price must be a positive number".to_string(),
                    ));
                }
                let common = self.new_common(&symbol_or_address, &timeframe, note, now)?;
                Ok(Alert::Threshold(ThresholdAlert {
                    common,
                    condition,
                    target_price,
                    triggered_at: None,
                }))
            }

            CreateAlertRequest::TwoStage {
                symbol_or_address,
                timeframe,
                template,
                expiry_minutes,
                cooldown_minutes,
                window_minutes,
                note,
            } => {
                let expiry_minutes = expiry_minutes.unwrap_or(DEFAULT_EXPIRY_MINUTES);
                if expiry_minutes <= 0 {
                    return Err(EngineError::InvalidRequest(
                        "expiry_minutes must be positive".to_string(),
                    ));
                }
                let cooldown_minutes =
                    cooldown_minutes.unwrap_or(DEFAULT_TWO_STAGE_COOLDOWN_MINUTES);
                if cooldown_minutes < 0 {
                    return Err(EngineError::InvalidRequest(
                        "cooldown_minutes must not be negative".to_string(),
                    ));
                }
                if matches!(window_minutes, Some(w) if w <= 0) {
                    return Err(EngineError::InvalidRequest(
                        "window_minutes must be positive".to_string(),
                    ));
                }

                let common = self.new_common(&symbol_or_address, &timeframe, note, now)?;
                Ok(Alert::TwoStage(TwoStageAlert {
                    indicators: template.initial_indicators(),
                    expires_at: Some(now + expiry_minutes * 60),
                    common,
                    template,
                    triggered_count: 0,
                    expiry_minutes,
                    cooldown_minutes,
                    window_minutes,
                }))
            }

            CreateAlertRequest::DormantAwakening {
                symbol_or_address,
                timeframe,
                params,
                note,
            } => {
                let params = params.unwrap_or_default();
                validate_dormant_params(&params)?;
                let common = self.new_common(&symbol_or_address, &timeframe, note, now)?;
                Ok(Alert::DormantAwakening(DormantAwakeningAlert {
                    common,
                    params,
                    dormant_stage: DormantStage::Initial,
                    session_start: None,
                    session_ends_at: None,
                    window_ends_at: None,
                    cooldown_ends_at: None,
                }))
            }
        }
    }

    fn new_common(
        &self,
        symbol_or_address: &str,
        timeframe: &str,
        note: Option<String>,
        now: i64,
    ) -> Result<AlertCommon, EngineError> {
        let symbol = normalize_symbol(symbol_or_address);
        if symbol.is_empty() {
            return Err(EngineError::InvalidRequest(
                "symbol_or_address must not be empty".to_string(),
            ));
        }
        let timeframe = timeframe.trim();
        if timeframe.is_empty() {
            return Err(EngineError::InvalidRequest(
                "timeframe must not be empty".to_string(),
            ));
        }

        Ok(AlertCommon {
            id: self.ids.new_id(),
            symbol_or_address: symbol,
            timeframe: timeframe.to_string(),
            enabled: true,
            status: AlertStatus::Active,
            stage: AlertStage::Watching,
            created_at: now,
            note,
            last_triggered_at: None,
            trigger_count: 0,
        })
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Option<Alert>, EngineError> {
        match self.kv.get(&alert_key(id)).await? {
            None => Ok(None),
            Some(raw) => serde_json::from_str::<Alert>(&raw)
                .map(Some)
                .map_err(|e| EngineError::InvalidAlert {
                    id: id.to_string(),
                    reason: e.to_string(),
                }),
        }
    }

    /// All alerts matching the filters, sorted `created_at` descending.
    /// Malformed records are flagged and skipped, never fatal.
    pub async fn list(
        &self,
        status: Option<AlertStatus>,
        symbol_or_address: Option<&str>,
    ) -> Result<Vec<Alert>, EngineError> {
        let symbol = symbol_or_address.map(normalize_symbol);
        let mut items: Vec<Alert> = Vec::new();

        for id in self.index().await? {
            match self.get_by_id(&id).await {
                Ok(Some(alert)) => {
                    if matches!(status, Some(s) if alert.common().status != s) {
                        continue;
                    }
                    if matches!(&symbol, Some(sym) if &alert.common().symbol_or_address != sym) {
                        continue;
                    }
                    items.push(alert);
                }
                // index can run ahead of deletes
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(alert_id = %id, error = %e, "skipping malformed alert record");
                }
            }
        }

        items.sort_by(|a, b| b.common().created_at.cmp(&a.common().created_at));
        Ok(items)
    }

    pub async fn update(&self, id: &str, update: AlertUpdate) -> Result<Option<Alert>, EngineError> {
        let Some(mut alert) = self.get_by_id(id).await? else {
            return Ok(None);
        };

        if update.condition.is_some() || update.target_price.is_some() {
            let Alert::Threshold(t) = &mut alert else {
                return Err(EngineError::InvalidRequest(
                    "condition/target_price only apply to threshold alerts".to_string(),
                ));
            };
            if let Some(condition) = update.condition {
                t.condition = condition;
            }
            if let Some(target_price) = update.target_price {
                if !target_price.is_finite() || target_price <= 0.0 {
                    return Err(EngineError::InvalidRequest(
                        "target_price must be a positive number".to_string(),
                    ));
                }
                t.target_price = target_price;
            }
        }

        if let Some(note) = update.note {
            alert.common_mut().note = Some(note);
        }

        if let Some(enabled) = update.enabled {
            let common = alert.common_mut();
            common.enabled = enabled;
            if !enabled {
                common.status = AlertStatus::Paused;
            } else if !common.stage.is_terminal() {
                common.status = AlertStatus::Active;
            }
            // re-enabling a terminal alert leaves its status alone
        }

        self.put(&alert).await?;
        Ok(Some(alert))
    }

    /// Forces CANCELLED and disables the alert.
    pub async fn cancel_watch(&self, id: &str) -> Result<Option<Alert>, EngineError> {
        let Some(mut alert) = self.get_by_id(id).await? else {
            return Ok(None);
        };

        let common = alert.common_mut();
        common.stage = AlertStage::Cancelled;
        common.status = AlertStatus::Paused;
        common.enabled = false;

        self.put(&alert).await?;
        Ok(Some(alert))
    }

    pub async fn delete(&self, id: &str) -> Result<bool, EngineError> {
        let removed = self.kv.delete(&alert_key(id)).await?;
        self.index_remove(id).await?;
        Ok(removed)
    }

    /// Idempotent full overwrite used by the state machines.
    pub async fn save(&self, alert: &Alert) -> Result<(), EngineError> {
        self.put(alert).await
    }

    async fn put(&self, alert: &Alert) -> Result<(), EngineError> {
        let raw = serde_json::to_string(alert).map_err(StoreError::from)?;
        self.kv.set(&alert_key(alert.id()), &raw, None).await?;
        Ok(())
    }

    async fn index(&self) -> Result<Vec<String>, EngineError> {
        match self.kv.get(ALERT_INDEX_KEY).await? {
            None => Ok(Vec::new()),
            Some(raw) => Ok(serde_json::from_str(&raw).map_err(StoreError::from)?),
        }
    }

    async fn write_index(&self, ids: &[String]) -> Result<(), EngineError> {
        let raw = serde_json::to_string(ids).map_err(StoreError::from)?;
        self.kv.set(ALERT_INDEX_KEY, &raw, None).await?;
        Ok(())
    }

    async fn index_add(&self, id: &str) -> Result<(), EngineError> {
        let mut ids = self.index().await?;
        if !ids.iter().any(|existing| existing == id) {
            ids.push(id.to_string());
            self.write_index(&ids).await?;
        }
        Ok(())
    }

    async fn index_remove(&self, id: &str) -> Result<(), EngineError> {
        let mut ids = self.index().await?;
        let before = ids.len();
        ids.retain(|existing| existing != id);
        if ids.len() != before {
            self.write_index(&ids).await?;
        }
        Ok(())
    }
}

fn validate_dormant_params(params: &DormantParams) -> Result<(), EngineError> {
    if params.dead_volume_ceiling < 0.0 || params.dead_trades_ceiling < 0.0 {
        return Err(EngineError::InvalidRequest(
            "dead ceilings must not be negative".to_string(),
        ));
    }
    if params.stage2_window_minutes <= 0
        || params.stage3_window_hours <= 0
        || params.cooldown_minutes <= 0
    {
        return Err(EngineError::InvalidRequest(
            "session windows and cooldown must be positive".to_string(),
        ));
    }
    Ok(())
}
