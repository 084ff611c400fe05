use std::sync::Arc;

use rustalerts::models::{
    Alert, AlertEventType, AlertStage, AlertStatus, CreateAlertRequest, DormantParams,
    DormantStage, EventDetail, SessionEndReason, TokenMetrics,
};
use rustalerts::services::alert_store::AlertStore;
use rustalerts::services::dormant;
use rustalerts::services::evaluator::Evaluator;
use rustalerts::services::event_store::EventStore;
use rustalerts::services::kv::MemoryKvStore;
use rustalerts::services::providers::Providers;
use rustalerts::services::runtime::{IdGen, UuidGen};
use rustalerts::services::stubs::{StaticIndicators, StaticPriceFeed, StaticTokenMetrics};

const NOW: i64 = 1_700_000_000;
const MINT: &str = "So11111111111111111111111111111111111111112";

struct TestRig {
    alerts: AlertStore,
    events: EventStore,
    evaluator: Evaluator,
    metrics: Arc<StaticTokenMetrics>,
    ids: Arc<dyn IdGen>,
}

fn test_rig() -> TestRig {
    let kv = Arc::new(MemoryKvStore::new());
    let ids: Arc<dyn IdGen> = Arc::new(UuidGen);

    let alerts = AlertStore::new(kv.clone(), ids.clone());
    let events = EventStore::new(kv);

    let metrics = Arc::new(StaticTokenMetrics::new());
    let providers = Providers {
        price_feed: Arc::new(StaticPriceFeed::new()),
        token_metrics: metrics.clone(),
        indicators: Arc::new(StaticIndicators::new()),
    };

    let evaluator = Evaluator::new(alerts.clone(), events.clone(), providers, ids.clone(), 1_000, 4);
    TestRig {
        alerts,
        events,
        evaluator,
        metrics,
        ids,
    }
}

/// Multipliers below 1 keep the awakening tests reachable while the dead
/// ceilings still hold, which keeps these walks deterministic.
fn test_params() -> DormantParams {
    DormantParams {
        dead_volume_ceiling: 100.0,
        dead_trades_ceiling: 5.0,
        dead_holder_delta_6h: 0.0,
        awake_volume_mult: 0.5,
        awake_trades_mult: 0.6,
        awake_holder_delta_30m: 5.0,
        stage2_window_minutes: 30,
        stage3_volume_mult: 0.9,
        stage3_trades_mult: 0.9,
        stage3_holder_delta_30m: 10.0,
        stage3_window_hours: 4,
        cooldown_minutes: 120,
    }
}

fn request() -> CreateAlertRequest {
    CreateAlertRequest::DormantAwakening {
        symbol_or_address: MINT.to_string(),
        timeframe: "5m".to_string(),
        params: Some(test_params()),
        note: None,
    }
}

fn dead_metrics() -> TokenMetrics {
    TokenMetrics {
        volume: 20.0,
        trades: 1,
        holder_delta_6h: -1.0,
        holder_delta_30m: 0.0,
    }
}

/// Dead on all three ceilings, and 2-of-3 on the awakening legs
/// (volume 60 >= 50, trades 4 >= 3).
fn awakening_metrics() -> TokenMetrics {
    TokenMetrics {
        volume: 60.0,
        trades: 4,
        holder_delta_6h: -1.0,
        holder_delta_30m: 0.0,
    }
}

/// Passes the stricter stage-3 legs (volume 95 >= 90, trades 5 >= 4.5).
fn surge_metrics() -> TokenMetrics {
    TokenMetrics {
        volume: 95.0,
        trades: 5,
        holder_delta_6h: -1.0,
        holder_delta_30m: 0.0,
    }
}

fn dormant_view(alert: &Alert) -> &rustalerts::models::DormantAwakeningAlert {
    let Alert::DormantAwakening(d) = alert else {
        panic!("expected dormant-awakening variant");
    };
    d
}

#[test]
fn dead_precondition_matches_ceilings() {
    let params = DormantParams {
        dead_volume_ceiling: 100.0,
        dead_trades_ceiling: 5.0,
        dead_holder_delta_6h: 0.0,
        ..DormantParams::default()
    };

    let dead = TokenMetrics {
        volume: 50.0,
        trades: 3,
        holder_delta_6h: -2.0,
        holder_delta_30m: 0.0,
    };
    assert!(dormant::is_token_dead(&dead, &params));

    let busy = TokenMetrics { volume: 500.0, ..dead };
    assert!(!dormant::is_token_dead(&busy, &params));
}

#[test]
fn awakening_needs_two_of_three() {
    let params = test_params();

    // only the volume leg passes
    let one = TokenMetrics {
        volume: 60.0,
        trades: 1,
        holder_delta_6h: 0.0,
        holder_delta_30m: 0.0,
    };
    assert!(!dormant::awakening_test(&one, &params));

    // volume and holder-delta legs pass
    let two = TokenMetrics {
        volume: 60.0,
        trades: 1,
        holder_delta_6h: 0.0,
        holder_delta_30m: 7.0,
    };
    assert!(dormant::awakening_test(&two, &params));
}

#[tokio::test]
async fn full_session_walk_to_completion() {
    let rig = test_rig();
    let alert = rig.alerts.create(request(), NOW).await.unwrap();
    let id = alert.id().to_string();

    // INITIAL -> AWAKENING
    rig.metrics.set_metrics(MINT, awakening_metrics());
    let r1 = rig.evaluator.evaluate_all(NOW).await.unwrap();
    assert_eq!(r1.events.len(), 1);
    assert_eq!(r1.events[0].event_type, AlertEventType::DormantStage);

    let stored = rig.alerts.get_by_id(&id).await.unwrap().unwrap();
    let d = dormant_view(&stored);
    assert_eq!(d.dormant_stage, DormantStage::Awakening);
    assert_eq!(d.session_start, Some(NOW));
    assert_eq!(d.session_ends_at, Some(NOW + 12 * 3600));
    assert_eq!(d.window_ends_at, Some(NOW + 30 * 60));
    assert_eq!(d.common.stage, AlertStage::Watching);

    // AWAKENING -> SUSTAINED, inside the stage-2 window
    let r2 = rig.evaluator.evaluate_all(NOW + 300).await.unwrap();
    assert_eq!(r2.events.len(), 1);
    let stored = rig.alerts.get_by_id(&id).await.unwrap().unwrap();
    let d = dormant_view(&stored);
    assert_eq!(d.dormant_stage, DormantStage::Sustained);
    assert_eq!(d.window_ends_at, Some(NOW + 300 + 4 * 3600));

    // SUSTAINED -> SECOND_SURGE
    rig.metrics.set_metrics(MINT, surge_metrics());
    let r3 = rig.evaluator.evaluate_all(NOW + 600).await.unwrap();
    assert_eq!(r3.events.len(), 1);
    let stored = rig.alerts.get_by_id(&id).await.unwrap().unwrap();
    let d = dormant_view(&stored);
    assert_eq!(d.dormant_stage, DormantStage::SecondSurge);
    assert_eq!(d.common.stage, AlertStage::Confirmed);
    assert_eq!(d.common.status, AlertStatus::Triggered);
    assert_eq!(d.common.trigger_count, 1);
    assert_eq!(d.window_ends_at, None);

    // SECOND_SURGE is transient: the next observation ends the session
    let r4 = rig
        .evaluator
        .evaluate_by_ids(&[id.clone()], NOW + 660)
        .await
        .unwrap();
    assert_eq!(r4.events.len(), 1);
    let EventDetail::Dormant { reason, .. } = &r4.events[0].detail else {
        panic!("expected dormant detail");
    };
    assert_eq!(*reason, Some(SessionEndReason::Completed));

    let stored = rig.alerts.get_by_id(&id).await.unwrap().unwrap();
    let d = dormant_view(&stored);
    assert_eq!(d.dormant_stage, DormantStage::SessionEnded);
    assert_eq!(d.common.stage, AlertStage::Confirmed);
    assert_eq!(d.common.status, AlertStatus::Triggered);
    // completed sessions stay enabled for the next cycle
    assert!(d.common.enabled);
    assert_eq!(d.cooldown_ends_at, Some(NOW + 660 + 120 * 60));
    assert_eq!(d.window_ends_at, None);

    // cooldown still running: nothing moves
    let r5 = rig
        .evaluator
        .evaluate_by_ids(&[id.clone()], NOW + 660 + 600)
        .await
        .unwrap();
    assert!(r5.events.is_empty());
    let stored = rig.alerts.get_by_id(&id).await.unwrap().unwrap();
    assert_eq!(dormant_view(&stored).dormant_stage, DormantStage::SessionEnded);

    // cooldown passed: reset to INITIAL, watching again
    let r6 = rig
        .evaluator
        .evaluate_by_ids(&[id.clone()], NOW + 660 + 120 * 60)
        .await
        .unwrap();
    assert!(r6.events.is_empty());
    let stored = rig.alerts.get_by_id(&id).await.unwrap().unwrap();
    let d = dormant_view(&stored);
    assert_eq!(d.dormant_stage, DormantStage::Initial);
    assert_eq!(d.common.stage, AlertStage::Watching);
    assert_eq!(d.common.status, AlertStatus::Active);
    assert!(d.common.enabled);
    assert_eq!(d.session_start, None);
    assert_eq!(d.session_ends_at, None);
    assert_eq!(d.window_ends_at, None);
    assert_eq!(d.cooldown_ends_at, None);
}

#[tokio::test]
async fn stage2_window_expiry_ends_the_session() {
    let rig = test_rig();
    let alert = rig.alerts.create(request(), NOW).await.unwrap();
    let id = alert.id().to_string();

    rig.metrics.set_metrics(MINT, awakening_metrics());
    rig.evaluator.evaluate_all(NOW).await.unwrap();

    // stage-2 window is 30 minutes; show up late with dead metrics
    rig.metrics.set_metrics(MINT, dead_metrics());
    let result = rig.evaluator.evaluate_all(NOW + 31 * 60).await.unwrap();
    assert_eq!(result.events.len(), 1);
    let EventDetail::Dormant { reason, .. } = &result.events[0].detail else {
        panic!("expected dormant detail");
    };
    assert_eq!(*reason, Some(SessionEndReason::WindowExpired));

    let stored = rig.alerts.get_by_id(&id).await.unwrap().unwrap();
    let d = dormant_view(&stored);
    assert_eq!(d.dormant_stage, DormantStage::SessionEnded);
    assert_eq!(d.common.stage, AlertStage::Expired);
    assert_eq!(d.common.status, AlertStatus::Paused);
    assert!(!d.common.enabled);
}

#[tokio::test]
async fn session_cap_forces_timeout_before_stage_logic() {
    let rig = test_rig();
    let mut alert = rig.alerts.create(request(), NOW).await.unwrap();

    // a session that started 13 hours ago and should have ended an hour ago
    {
        let Alert::DormantAwakening(d) = &mut alert else {
            panic!("expected dormant-awakening variant");
        };
        d.dormant_stage = DormantStage::Awakening;
        d.session_start = Some(NOW - 13 * 3600);
        d.session_ends_at = Some(NOW - 3600);
        d.window_ends_at = Some(NOW + 600);
    }
    rig.alerts.save(&alert).await.unwrap();

    // metrics that would otherwise advance the stage are irrelevant
    let metrics = awakening_metrics();
    let outcome = dormant::evaluate(
        &rig.alerts,
        &rig.events,
        &mut alert,
        &metrics,
        NOW,
        rig.ids.as_ref(),
    )
    .await
    .unwrap();

    assert!(outcome.transitioned);
    assert_eq!(outcome.events.len(), 1);
    let EventDetail::Dormant { reason, .. } = &outcome.events[0].detail else {
        panic!("expected dormant detail");
    };
    assert_eq!(*reason, Some(SessionEndReason::Timeout));

    let d = dormant_view(&alert);
    assert_eq!(d.dormant_stage, DormantStage::SessionEnded);
    assert_eq!(d.common.stage, AlertStage::Expired);
    assert_eq!(d.common.status, AlertStatus::Paused);
    assert!(!d.common.enabled);
}

#[tokio::test]
async fn session_ended_does_not_transition_while_cooldown_runs() {
    let rig = test_rig();
    let mut alert = rig.alerts.create(request(), NOW).await.unwrap();

    {
        let Alert::DormantAwakening(d) = &mut alert else {
            panic!("expected dormant-awakening variant");
        };
        d.dormant_stage = DormantStage::SessionEnded;
        d.session_start = Some(NOW - 3600);
        d.cooldown_ends_at = Some(NOW + 600);
    }
    rig.alerts.save(&alert).await.unwrap();

    let metrics = dead_metrics();
    let outcome = dormant::evaluate(
        &rig.alerts,
        &rig.events,
        &mut alert,
        &metrics,
        NOW,
        rig.ids.as_ref(),
    )
    .await
    .unwrap();

    assert!(!outcome.transitioned);
    assert!(outcome.events.is_empty());
    assert_eq!(dormant_view(&alert).dormant_stage, DormantStage::SessionEnded);
}

#[tokio::test]
async fn stage_events_are_once_per_session() {
    let rig = test_rig();
    let alert = rig.alerts.create(request(), NOW).await.unwrap();

    // two racing sweeps observe the same INITIAL snapshot at the same
    // instant; both transition, one notification survives
    let mut first = alert.clone();
    let mut second = alert.clone();
    let metrics = awakening_metrics();

    let o1 = dormant::evaluate(
        &rig.alerts,
        &rig.events,
        &mut first,
        &metrics,
        NOW,
        rig.ids.as_ref(),
    )
    .await
    .unwrap();
    let o2 = dormant::evaluate(
        &rig.alerts,
        &rig.events,
        &mut second,
        &metrics,
        NOW,
        rig.ids.as_ref(),
    )
    .await
    .unwrap();

    assert!(o1.transitioned);
    assert!(o2.transitioned);
    assert_eq!(o1.events.len() + o2.events.len(), 1);

    let all = rig.events.query(Some(0), 100, NOW + 60).await.unwrap();
    assert_eq!(all.len(), 1);
}

#[tokio::test]
async fn token_with_activity_never_starts_a_session() {
    let rig = test_rig();
    let alert = rig.alerts.create(request(), NOW).await.unwrap();

    // volume far above the dead ceiling: the dead precondition fails even
    // though the awakening legs would pass
    rig.metrics.set_metrics(
        MINT,
        TokenMetrics {
            volume: 500.0,
            trades: 4,
            holder_delta_6h: -1.0,
            holder_delta_30m: 0.0,
        },
    );

    let result = rig.evaluator.evaluate_all(NOW).await.unwrap();
    assert!(result.events.is_empty());

    let stored = rig.alerts.get_by_id(alert.id()).await.unwrap().unwrap();
    assert_eq!(dormant_view(&stored).dormant_stage, DormantStage::Initial);
}
