use std::sync::Arc;

use mongodb::Client;

use rustalerts::services::alert_monitor::spawn_alert_monitor;
use rustalerts::services::alert_store::AlertStore;
use rustalerts::services::evaluator::Evaluator;
use rustalerts::services::event_store::EventStore;
use rustalerts::services::journal::JournalStore;
use rustalerts::services::kv::KvStore;
use rustalerts::services::market_data::MarketDataClient;
use rustalerts::services::mongo_kv::MongoKvStore;
use rustalerts::services::providers::Providers;
use rustalerts::services::runtime::{Clock, IdGen, SystemClock, UuidGen};
use rustalerts::services::stubs::{StaticIndicators, StaticPriceFeed, StaticTokenMetrics};
use rustalerts::{config, AppState};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let settings = config::load();

    // Mongo connection
    let client = Client::with_uri_str(&settings.mongodb_uri)
        .await
        .expect("Failed to connect to MongoDB");
    let db = client.database(&settings.mongodb_db);
    let store: Arc<dyn KvStore> = Arc::new(MongoKvStore::new(&db));

    let ids: Arc<dyn IdGen> = Arc::new(UuidGen);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let providers = if settings.market_data_api_key.trim().is_empty() {
        tracing::warn!("MARKET_DATA_API_KEY is missing; using static provider stand-ins");
        Providers {
            price_feed: Arc::new(StaticPriceFeed::new()),
            token_metrics: Arc::new(StaticTokenMetrics::new()),
            indicators: Arc::new(StaticIndicators::new()),
        }
    } else {
        let market = MarketDataClient::new(
            settings.market_data_base_url.clone(),
            settings.market_data_api_key.clone(),
            settings.provider_timeout_ms,
        )
        .expect("Failed to build market data client");
        Providers {
            price_feed: Arc::new(market.clone()),
            token_metrics: Arc::new(market.clone()),
            indicators: Arc::new(market),
        }
    };

    let alerts = AlertStore::new(store.clone(), ids.clone());
    let events = EventStore::new(store.clone());
    let journal = JournalStore::new(store.clone());
    let evaluator = Arc::new(Evaluator::new(
        alerts.clone(),
        events.clone(),
        providers,
        ids,
        settings.provider_timeout_ms,
        settings.eval_concurrency,
    ));

    let (events_tx, _events_rx) = tokio::sync::broadcast::channel::<String>(16);

    let state = AppState {
        settings: settings.clone(),
        store,
        alerts,
        events,
        journal,
        evaluator,
        clock,
        events_tx,
    };

    let _monitor = spawn_alert_monitor(state);
    tracing::info!(
        "alert monitor running (poll every {}s)",
        settings.poll_interval_secs
    );

    tokio::signal::ctrl_c()
        .await
        .expect("failed to listen for ctrl-c");
    tracing::info!("shutting down");
}
