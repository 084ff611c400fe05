use std::sync::Arc;

use rustalerts::models::{
    AlertEmitted, AlertEventType, AlertStage, AlertStatus, EventDetail, ThresholdCondition,
};
use rustalerts::services::journal::JournalStore;
use rustalerts::services::kv::MemoryKvStore;
use rustalerts::services::report::build_daily_report;

const NOW: i64 = 1_700_000_000;

fn test_journal() -> JournalStore {
    JournalStore::new(Arc::new(MemoryKvStore::new()))
}

#[tokio::test]
async fn create_assigns_sequential_ids_and_normalizes_symbol() {
    let journal = test_journal();

    let first = journal
        .create("watching the breakout", Some("btc"), vec![], NOW)
        .await
        .unwrap();
    let second = journal
        .create("volume drying up", Some("eth"), vec!["volume".to_string()], NOW + 10)
        .await
        .unwrap();

    assert_eq!(first.id, "1");
    assert_eq!(second.id, "2");
    assert_eq!(first.symbol_or_address.as_deref(), Some("BTC"));
    assert_eq!(second.symbol_or_address.as_deref(), Some("ETH"));
}

#[tokio::test]
async fn list_is_newest_first_and_filters_by_symbol() {
    let journal = test_journal();
    journal.create("one", Some("btc"), vec![], NOW).await.unwrap();
    journal.create("two", Some("eth"), vec![], NOW + 10).await.unwrap();
    journal.create("three", Some("btc"), vec![], NOW + 20).await.unwrap();

    let all = journal.list(None).await.unwrap();
    let texts: Vec<&str> = all.iter().map(|e| e.text.as_str()).collect();
    assert_eq!(texts, vec!["three", "two", "one"]);

    let btc = journal.list(Some("btc")).await.unwrap();
    assert_eq!(btc.len(), 2);
}

#[tokio::test]
async fn update_and_delete_round_trip() {
    let journal = test_journal();
    let entry = journal.create("draft", None, vec![], NOW).await.unwrap();

    let updated = journal
        .update(&entry.id, Some("final"), Some(vec!["note".to_string()]), NOW + 60)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.text, "final");
    assert_eq!(updated.tags, vec!["note".to_string()]);
    assert_eq!(updated.created_at, NOW);
    assert_eq!(updated.updated_at, NOW + 60);

    assert!(journal.delete(&entry.id).await.unwrap());
    assert!(journal.get(&entry.id).await.unwrap().is_none());
    assert!(!journal.delete(&entry.id).await.unwrap());
}

#[tokio::test]
async fn rejects_empty_text() {
    let journal = test_journal();
    assert!(journal.create("   ", None, vec![], NOW).await.is_err());

    let entry = journal.create("ok", None, vec![], NOW).await.unwrap();
    assert!(journal
        .update(&entry.id, Some(""), None, NOW + 1)
        .await
        .is_err());
}

fn sample_event(event_id: &str, occurred_at: i64) -> AlertEmitted {
    AlertEmitted {
        event_id: event_id.to_string(),
        event_type: AlertEventType::SimpleTriggered,
        occurred_at,
        alert_id: "a1".to_string(),
        symbol_or_address: "BTC".to_string(),
        timeframe: "1h".to_string(),
        stage: AlertStage::Confirmed,
        status: AlertStatus::Triggered,
        detail: EventDetail::Threshold {
            condition: ThresholdCondition::Above,
            last_price: 101.0,
        },
    }
}

#[tokio::test]
async fn report_is_deterministic_and_complete() {
    let journal = test_journal();
    let entry = journal
        .create("bought the dip", Some("btc"), vec![], NOW - 600)
        .await
        .unwrap();

    let events = vec![sample_event("e2", NOW - 60), sample_event("e1", NOW - 120)];
    let entries = vec![entry];

    let first = build_daily_report(NOW, &events, &entries);
    let second = build_daily_report(NOW, &events, &entries);
    assert_eq!(first, second);

    assert!(first.contains("Daily alert report for 2023-11-14"));
    assert!(first.contains("threshold triggered:  2"));
    assert!(first.contains("SIMPLE_TRIGGERED BTC"));
    assert!(first.contains("Journal: 1 entries"));
    assert!(first.contains("bought the dip"));

    // events are listed oldest first regardless of input order
    let older = first.find(&fmt_hms(NOW - 120)).expect("older event line");
    let newer = first.find(&fmt_hms(NOW - 60)).expect("newer event line");
    assert!(older < newer);
}

fn fmt_hms(ts: i64) -> String {
    use chrono::TimeZone;
    chrono::Utc
        .timestamp_opt(ts, 0)
        .single()
        .map(|d| d.format("%H:%M:%S").to_string())
        .unwrap_or_default()
}
