//! Two-stage confirmation machine: WATCHING -> CONFIRMED or EXPIRED.
//!
//! Each alert watches the three indicators named by its template;
//! confirmation needs any two of them triggered in the same evaluation.

use std::collections::HashMap;

use crate::error::EngineError;
use crate::models::{
    Alert, AlertEmitted, AlertEventType, AlertStage, AlertStatus, EventDetail, IndicatorReading,
    TwoStageAlert,
};
use crate::services::alert_store::AlertStore;
use crate::services::event_store::EventStore;
use crate::services::machine::MachineOutcome;
use crate::services::runtime::IdGen;

pub const CONFIRMATION_THRESHOLD: u8 = 2;

/// True only while the alert is confirmed and inside its cooldown.
pub fn is_in_cooldown(alert: &TwoStageAlert, now: i64) -> bool {
    alert.common.stage == AlertStage::Confirmed
        && matches!(
            alert.common.last_triggered_at,
            Some(t) if now < t + alert.cooldown_minutes * 60
        )
}

enum Step {
    Noop,
    Expired,
    Confirmed,
    Progress,
}

/// Advances a two-stage alert from the supplied per-indicator readings.
/// Indicators absent from the map keep their prior state. Progress
/// events are rate-limited to one per minute bucket; the terminal
/// confirm/expire events are one-shot on the alert's `created_at`.
pub async fn evaluate(
    alerts: &AlertStore,
    events: &EventStore,
    alert: &mut Alert,
    readings: &HashMap<String, IndicatorReading>,
    now: i64,
    ids: &dyn IdGen,
) -> Result<MachineOutcome, EngineError> {
    let (step, created_at, triggered_count, indicators) = {
        let Alert::TwoStage(t) = &mut *alert else {
            return Err(EngineError::InvalidAlert {
                id: alert.id().to_string(),
                reason: "expected a two-stage alert".to_string(),
            });
        };

        if !t.common.enabled || t.common.stage != AlertStage::Watching {
            return Ok(MachineOutcome::noop());
        }
        let created_at = t.common.created_at;

        if matches!(t.expires_at, Some(exp) if now >= exp) {
            t.common.stage = AlertStage::Expired;
            t.common.status = AlertStatus::Paused;
            t.common.enabled = false;
            t.expires_at = None;
            (Step::Expired, created_at, t.triggered_count, t.indicators.clone())
        } else {
            for ind in &mut t.indicators {
                if let Some(r) = readings.get(&ind.id) {
                    ind.triggered = r.triggered;
                    ind.last_value = r.value.or(ind.last_value);
                }
            }

            let new_count = t.indicators.iter().filter(|i| i.triggered).count() as u8;
            let changed = new_count != t.triggered_count;
            t.triggered_count = new_count;

            if new_count >= CONFIRMATION_THRESHOLD {
                t.common.stage = AlertStage::Confirmed;
                t.common.status = AlertStatus::Triggered;
                t.common.trigger_count += 1;
                t.common.last_triggered_at = Some(now);
                t.expires_at = None;
                (Step::Confirmed, created_at, new_count, t.indicators.clone())
            } else if changed {
                (Step::Progress, created_at, new_count, t.indicators.clone())
            } else {
                (Step::Noop, created_at, new_count, Vec::new())
            }
        }
    };

    let (event_type, window_id, transitioned) = match step {
        Step::Noop => return Ok(MachineOutcome::noop()),
        Step::Expired => (AlertEventType::TwoStageExpired, created_at.to_string(), true),
        Step::Confirmed => (AlertEventType::TwoStageConfirmed, created_at.to_string(), true),
        // minute bucket, so progress is once per minute, not per sweep
        Step::Progress => (AlertEventType::TwoStageProgress, (now / 60).to_string(), false),
    };

    alerts.save(alert).await?;

    let event = AlertEmitted::for_alert(
        alert.common(),
        ids.new_id(),
        event_type,
        now,
        EventDetail::TwoStage {
            triggered_count,
            indicators,
        },
    );

    let mut outcome = MachineOutcome {
        transitioned,
        events: Vec::new(),
    };
    if events.create_deduped(&event, &window_id).await? {
        outcome.events.push(event);
    }
    Ok(outcome)
}
