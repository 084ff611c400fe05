//! Dormant-asset awakening machine: a five-stage session over token
//! activity metrics, bounded by a hard 12-hour session cap.
//!
//! INITIAL -> AWAKENING -> SUSTAINED -> SECOND_SURGE -> SESSION_ENDED,
//! with SESSION_ENDED resettable to INITIAL once the cooldown passes.

use crate::error::EngineError;
use crate::models::{
    Alert, AlertEmitted, AlertEventType, AlertStage, AlertStatus, DormantAwakeningAlert,
    DormantParams, DormantStage, EventDetail, SessionEndReason, TokenMetrics,
};
use crate::services::alert_store::AlertStore;
use crate::services::event_store::EventStore;
use crate::services::machine::MachineOutcome;
use crate::services::runtime::IdGen;

/// Hard cap on session length, enforced before any stage logic.
pub const SESSION_MAX_HOURS: i64 = 12;

/// The "dead" precondition: all three activity readings at or below
/// their ceilings.
pub fn is_token_dead(metrics: &TokenMetrics, params: &DormantParams) -> bool {
    metrics.volume <= params.dead_volume_ceiling
        && (metrics.trades as f64) <= params.dead_trades_ceiling
        && metrics.holder_delta_6h <= params.dead_holder_delta_6h
}

fn two_of_three(hits: [bool; 3]) -> bool {
    hits.iter().filter(|h| **h).count() >= 2
}

/// First awakening test: 2-of-3 over volume, trades, and the 30-minute
/// holder delta against the awake multipliers.
pub fn awakening_test(metrics: &TokenMetrics, params: &DormantParams) -> bool {
    two_of_three([
        metrics.volume >= params.dead_volume_ceiling * params.awake_volume_mult,
        (metrics.trades as f64) >= params.dead_trades_ceiling * params.awake_trades_mult,
        metrics.holder_delta_30m >= params.awake_holder_delta_30m,
    ])
}

/// Stricter second-surge test using the stage-3 multipliers.
pub fn second_surge_test(metrics: &TokenMetrics, params: &DormantParams) -> bool {
    two_of_three([
        metrics.volume >= params.dead_volume_ceiling * params.stage3_volume_mult,
        (metrics.trades as f64) >= params.dead_trades_ceiling * params.stage3_trades_mult,
        metrics.holder_delta_30m >= params.stage3_holder_delta_30m,
    ])
}

enum Step {
    Noop,
    StageAdvanced {
        new_stage: DormantStage,
        session_start: i64,
    },
    SessionEnded {
        reason: SessionEndReason,
        session_start: i64,
    },
    Reset,
}

/// Shared by timeout, window expiry, and completion.
fn end_session(d: &mut DormantAwakeningAlert, now: i64, reason: SessionEndReason) -> Step {
    let session_start = d.session_start.unwrap_or(d.common.created_at);
    let completed = reason == SessionEndReason::Completed;

    d.dormant_stage = DormantStage::SessionEnded;
    d.common.stage = if completed {
        AlertStage::Confirmed
    } else {
        AlertStage::Expired
    };
    d.common.status = if completed {
        AlertStatus::Triggered
    } else {
        AlertStatus::Paused
    };
    // a completed session stays enabled so a new cycle can start after
    // cooldown; an expired or timed-out one is disabled
    d.common.enabled = completed;
    d.cooldown_ends_at = Some(now + d.params.cooldown_minutes * 60);
    d.window_ends_at = None;

    Step::SessionEnded {
        reason,
        session_start,
    }
}

/// Advances a dormant-awakening alert from fresh token metrics. Stage
/// events are deduplicated on the session's start instant, so each
/// session emits each stage at most once across redundant sweeps.
pub async fn evaluate(
    alerts: &AlertStore,
    events: &EventStore,
    alert: &mut Alert,
    metrics: &TokenMetrics,
    now: i64,
    ids: &dyn IdGen,
) -> Result<MachineOutcome, EngineError> {
    let step = {
        let Alert::DormantAwakening(d) = &mut *alert else {
            return Err(EngineError::InvalidAlert {
                id: alert.id().to_string(),
                reason: "expected a dormant-awakening alert".to_string(),
            });
        };

        let session_live = matches!(
            d.dormant_stage,
            DormantStage::Awakening | DormantStage::Sustained | DormantStage::SecondSurge
        );
        let timed_out = session_live
            && matches!(d.session_start, Some(s) if now >= s + SESSION_MAX_HOURS * 3600);

        if timed_out {
            end_session(d, now, SessionEndReason::Timeout)
        } else {
            match d.dormant_stage {
                DormantStage::Initial => {
                    if is_token_dead(metrics, &d.params) && awakening_test(metrics, &d.params) {
                        d.session_start = Some(now);
                        d.session_ends_at = Some(now + SESSION_MAX_HOURS * 3600);
                        d.window_ends_at = Some(now + d.params.stage2_window_minutes * 60);
                        d.dormant_stage = DormantStage::Awakening;
                        Step::StageAdvanced {
                            new_stage: DormantStage::Awakening,
                            session_start: now,
                        }
                    } else {
                        Step::Noop
                    }
                }

                DormantStage::Awakening => {
                    if matches!(d.window_ends_at, Some(w) if now >= w) {
                        end_session(d, now, SessionEndReason::WindowExpired)
                    } else if awakening_test(metrics, &d.params) {
                        d.dormant_stage = DormantStage::Sustained;
                        d.window_ends_at = Some(now + d.params.stage3_window_hours * 3600);
                        Step::StageAdvanced {
                            new_stage: DormantStage::Sustained,
                            session_start: d.session_start.unwrap_or(now),
                        }
                    } else {
                        Step::Noop
                    }
                }

                DormantStage::Sustained => {
                    if matches!(d.window_ends_at, Some(w) if now >= w) {
                        end_session(d, now, SessionEndReason::WindowExpired)
                    } else if second_surge_test(metrics, &d.params) {
                        d.dormant_stage = DormantStage::SecondSurge;
                        d.common.stage = AlertStage::Confirmed;
                        d.common.status = AlertStatus::Triggered;
                        d.common.trigger_count += 1;
                        d.common.last_triggered_at = Some(now);
                        d.window_ends_at = None;
                        Step::StageAdvanced {
                            new_stage: DormantStage::SecondSurge,
                            session_start: d.session_start.unwrap_or(now),
                        }
                    } else {
                        Step::Noop
                    }
                }

                // transient: every evaluation that observes it forces the
                // terminal transition
                DormantStage::SecondSurge => end_session(d, now, SessionEndReason::Completed),

                DormantStage::SessionEnded => {
                    if matches!(d.cooldown_ends_at, Some(c) if now >= c) {
                        d.session_start = None;
                        d.session_ends_at = None;
                        d.window_ends_at = None;
                        d.cooldown_ends_at = None;
                        d.dormant_stage = DormantStage::Initial;
                        d.common.stage = AlertStage::Watching;
                        d.common.status = AlertStatus::Active;
                        d.common.enabled = true;
                        Step::Reset
                    } else {
                        Step::Noop
                    }
                }
            }
        }
    };

    let (dormant_stage, reason, session_start, transitioned) = match step {
        Step::Noop => return Ok(MachineOutcome::noop()),
        Step::Reset => {
            alerts.save(alert).await?;
            return Ok(MachineOutcome {
                transitioned: true,
                events: Vec::new(),
            });
        }
        Step::StageAdvanced {
            new_stage,
            session_start,
        } => (new_stage, None, session_start, true),
        Step::SessionEnded {
            reason,
            session_start,
        } => (DormantStage::SessionEnded, Some(reason), session_start, true),
    };

    alerts.save(alert).await?;

    let event = AlertEmitted::for_alert(
        alert.common(),
        ids.new_id(),
        AlertEventType::DormantStage,
        now,
        EventDetail::Dormant {
            dormant_stage,
            metrics: Some(*metrics),
            reason,
        },
    );

    let mut outcome = MachineOutcome {
        transitioned,
        events: Vec::new(),
    };
    if events
        .create_deduped(&event, &session_start.to_string())
        .await?
    {
        outcome.events.push(event);
    }
    Ok(outcome)
}
