//! Threshold state machine: WATCHING -> CONFIRMED, one-shot.

use crate::error::EngineError;
use crate::models::{
    Alert, AlertEmitted, AlertEventType, AlertStage, AlertStatus, EventDetail, ThresholdCondition,
};
use crate::services::alert_store::AlertStore;
use crate::services::event_store::EventStore;
use crate::services::machine::MachineOutcome;
use crate::services::runtime::IdGen;

/// CROSS approximates "price crossed the target" as proximity within
/// 0.1% of the target; it does not track an actual sign change.
const CROSS_TOLERANCE: f64 = 0.001;

pub fn condition_met(condition: ThresholdCondition, target_price: f64, last_price: f64) -> bool {
    match condition {
        ThresholdCondition::Above => last_price >= target_price,
        ThresholdCondition::Below => last_price <= target_price,
        ThresholdCondition::Cross => {
            ((last_price - target_price).abs() / target_price) < CROSS_TOLERANCE
        }
    }
}

/// Advances a threshold alert given the latest price. On trigger the
/// alert is persisted first, then `SIMPLE_TRIGGERED` is emitted behind
/// the `(alert, type, created_at)` dedup window, which makes it one-shot
/// for the alert's entire lifetime no matter how many sweeps observe the
/// trigger condition.
pub async fn evaluate(
    alerts: &AlertStore,
    events: &EventStore,
    alert: &mut Alert,
    last_price: f64,
    now: i64,
    ids: &dyn IdGen,
) -> Result<MachineOutcome, EngineError> {
    let (condition, created_at) = {
        let Alert::Threshold(t) = &mut *alert else {
            return Err(EngineError::InvalidAlert {
                id: alert.id().to_string(),
                reason: "expected a threshold alert".to_string(),
            });
        };

        if !t.common.enabled || t.common.stage != AlertStage::Watching {
            return Ok(MachineOutcome::noop());
        }
        if !condition_met(t.condition, t.target_price, last_price) {
            return Ok(MachineOutcome::noop());
        }

        t.common.stage = AlertStage::Confirmed;
        t.common.status = AlertStatus::Triggered;
        t.common.last_triggered_at = Some(now);
        t.common.trigger_count += 1;
        t.triggered_at = Some(now);

        (t.condition, t.common.created_at)
    };

    alerts.save(alert).await?;

    let event = AlertEmitted::for_alert(
        alert.common(),
        ids.new_id(),
        AlertEventType::SimpleTriggered,
        now,
        EventDetail::Threshold {
            condition,
            last_price,
        },
    );

    let mut outcome = MachineOutcome {
        transitioned: true,
        events: Vec::new(),
    };
    if events.create_deduped(&event, &created_at.to_string()).await? {
        outcome.events.push(event);
    }
    Ok(outcome)
}
