use serde::{Deserialize, Serialize};

use super::alert::{AlertCommon, AlertStage, AlertStatus, DormantStage, IndicatorState, ThresholdCondition};
use super::market::TokenMetrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertEventType {
    SimpleTriggered,
    TwoStageProgress,
    TwoStageConfirmed,
    TwoStageExpired,
    DormantStage,
}

impl AlertEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertEventType::SimpleTriggered => "SIMPLE_TRIGGERED",
            AlertEventType::TwoStageProgress => "TWO_STAGE_PROGRESS",
            AlertEventType::TwoStageConfirmed => "TWO_STAGE_CONFIRMED",
            AlertEventType::TwoStageExpired => "TWO_STAGE_EXPIRED",
            AlertEventType::DormantStage => "DORMANT_STAGE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionEndReason {
    Completed,
    WindowExpired,
    Timeout,
}

/// Variant payload mirroring the alert's domain.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventDetail {
    Threshold {
        condition: ThresholdCondition,
        last_price: f64,
    },
    TwoStage {
        triggered_count: u8,
        indicators: Vec<IndicatorState>,
    },
    Dormant {
        dormant_stage: DormantStage,
        metrics: Option<TokenMetrics>,
        reason: Option<SessionEndReason>,
    },
}

/// A notification appended to the event log when a state machine makes a
/// logical transition. `event_id` is fresh per construction attempt and
/// never reused across retries; deduplication keys on content, not id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertEmitted {
    pub event_id: String,
    pub event_type: AlertEventType,
    pub occurred_at: i64,
    pub alert_id: String,
    pub symbol_or_address: String,
    pub timeframe: String,
    pub stage: AlertStage,
    pub status: AlertStatus,
    pub detail: EventDetail,
}

impl AlertEmitted {
    pub fn for_alert(
        common: &AlertCommon,
        event_id: String,
        event_type: AlertEventType,
        occurred_at: i64,
        detail: EventDetail,
    ) -> Self {
        Self {
            event_id,
            event_type,
            occurred_at,
            alert_id: common.id.clone(),
            symbol_or_address: common.symbol_or_address.clone(),
            timeframe: common.timeframe.clone(),
            stage: common.stage,
            status: common.status,
            detail,
        }
    }

    /// The stage component of the dedup key: the dormant sub-stage for
    /// dormant events, otherwise the event's own type.
    pub fn logical_stage(&self) -> &'static str {
        match &self.detail {
            EventDetail::Dormant { dormant_stage, .. } => dormant_stage.as_str(),
            _ => self.event_type.as_str(),
        }
    }
}
