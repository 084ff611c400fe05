use std::sync::Arc;

use rustalerts::models::{AlertStage, AlertStatus, CreateAlertRequest, ThresholdCondition};
use rustalerts::services::alert_store::{AlertStore, AlertUpdate};
use rustalerts::services::evaluator::Evaluator;
use rustalerts::services::event_store::EventStore;
use rustalerts::services::kv::MemoryKvStore;
use rustalerts::services::providers::Providers;
use rustalerts::services::runtime::{IdGen, UuidGen};
use rustalerts::services::stubs::{StaticIndicators, StaticPriceFeed, StaticTokenMetrics};

const NOW: i64 = 1_700_000_000;

struct TestRig {
    alerts: AlertStore,
    events: EventStore,
    evaluator: Evaluator,
    prices: Arc<StaticPriceFeed>,
}

fn test_rig() -> TestRig {
    let kv = Arc::new(MemoryKvStore::new());
    let ids: Arc<dyn IdGen> = Arc::new(UuidGen);

    let alerts = AlertStore::new(kv.clone(), ids.clone());
    let events = EventStore::new(kv);

    let prices = Arc::new(StaticPriceFeed::new());
    let providers = Providers {
        price_feed: prices.clone(),
        token_metrics: Arc::new(StaticTokenMetrics::new()),
        indicators: Arc::new(StaticIndicators::new()),
    };

    let evaluator = Evaluator::new(alerts.clone(), events.clone(), providers, ids, 1_000, 4);
    TestRig {
        alerts,
        events,
        evaluator,
        prices,
    }
}

fn threshold_request(symbol: &str, target_price: f64) -> CreateAlertRequest {
    CreateAlertRequest::Threshold {
        symbol_or_address: symbol.to_string(),
        timeframe: "1h".to_string(),
        condition: ThresholdCondition::Above,
        target_price,
        note: None,
    }
}

#[tokio::test]
async fn provider_failure_skips_one_alert_and_sweep_continues() {
    let rig = test_rig();
    let healthy = rig
        .alerts
        .create(threshold_request("btc", 100.0), NOW)
        .await
        .unwrap();
    let starving = rig
        .alerts
        .create(threshold_request("eth", 100.0), NOW)
        .await
        .unwrap();

    // only BTC has a price; the ETH feed call errors out
    rig.prices.set_price("BTC", 150.0);

    let result = rig.evaluator.evaluate_all(NOW + 30).await.unwrap();
    assert_eq!(result.evaluated_count, 2);
    assert_eq!(result.events.len(), 1);
    assert_eq!(result.events[0].alert_id, healthy.id());

    // the starved alert is untouched: no state change, no event
    let stored = rig.alerts.get_by_id(starving.id()).await.unwrap().unwrap();
    assert_eq!(stored.common().stage, AlertStage::Watching);
    assert_eq!(stored.common().status, AlertStatus::Active);
}

#[tokio::test]
async fn poll_recommendation_tracks_watching_alerts() {
    let rig = test_rig();
    rig.alerts
        .create(threshold_request("btc", 100.0), NOW)
        .await
        .unwrap();
    rig.prices.set_price("BTC", 50.0);

    // still watching: tight cadence
    let busy = rig.evaluator.evaluate_all(NOW + 30).await.unwrap();
    assert_eq!(busy.recommended_next_poll_secs, 30);

    // trigger it; nothing left watching afterwards
    rig.prices.set_price("BTC", 150.0);
    rig.evaluator.evaluate_all(NOW + 60).await.unwrap();

    let idle = rig.evaluator.evaluate_all(NOW + 90).await.unwrap();
    assert_eq!(idle.evaluated_count, 0);
    assert_eq!(idle.recommended_next_poll_secs, 60);
}

#[tokio::test]
async fn evaluate_by_ids_skips_missing_and_disabled() {
    let rig = test_rig();
    let active = rig
        .alerts
        .create(threshold_request("btc", 100.0), NOW)
        .await
        .unwrap();
    let disabled = rig
        .alerts
        .create(threshold_request("eth", 100.0), NOW)
        .await
        .unwrap();
    rig.alerts
        .update(
            disabled.id(),
            AlertUpdate {
                enabled: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    rig.prices.set_price("BTC", 150.0);
    rig.prices.set_price("ETH", 150.0);

    let result = rig
        .evaluator
        .evaluate_by_ids(
            &[
                active.id().to_string(),
                disabled.id().to_string(),
                "no-such-id".to_string(),
            ],
            NOW + 30,
        )
        .await
        .unwrap();

    assert_eq!(result.evaluated_count, 1);
    assert_eq!(result.events.len(), 1);
    assert_eq!(result.events[0].alert_id, active.id());
}

#[tokio::test]
async fn repeated_sweeps_emit_at_most_once() {
    let rig = test_rig();
    let alert = rig
        .alerts
        .create(threshold_request("btc", 100.0), NOW)
        .await
        .unwrap();
    rig.prices.set_price("BTC", 150.0);

    let first = rig.evaluator.evaluate_all(NOW + 30).await.unwrap();
    assert_eq!(first.events.len(), 1);

    // retried sweep plus a targeted re-check: no further notifications
    let second = rig.evaluator.evaluate_all(NOW + 30).await.unwrap();
    assert!(second.events.is_empty());
    let third = rig
        .evaluator
        .evaluate_by_ids(&[alert.id().to_string()], NOW + 60)
        .await
        .unwrap();
    assert!(third.events.is_empty());

    let all = rig.events.query(Some(0), 100, NOW + 120).await.unwrap();
    assert_eq!(all.len(), 1);
}

#[tokio::test]
async fn sweep_with_no_alerts_is_empty_and_idle() {
    let rig = test_rig();
    let result = rig.evaluator.evaluate_all(NOW).await.unwrap();
    assert_eq!(result.evaluated_count, 0);
    assert!(result.events.is_empty());
    assert_eq!(result.recommended_next_poll_secs, 60);
}
