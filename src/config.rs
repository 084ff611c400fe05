use std::env;

#[derive(Debug, Clone)]
pub struct Settings {
    pub mongodb_uri: String,
    pub mongodb_db: String,

    pub market_data_base_url: String,
    pub market_data_api_key: String,

    pub poll_interval_secs: u64,
    pub provider_timeout_ms: u64,
    pub eval_concurrency: usize,
}

pub fn load() -> Settings {
    // Loads .env if present (no crash if missing)
    dotenvy::dotenv().ok();

    let mongodb_uri = env::var("MONGODB_URI")
        .unwrap_or_else(|_| "mongodb://localhost:27017".to_string());

    let mongodb_db = env::var("MONGODB_DB")
        .unwrap_or_else(|_| "rustalerts".to_string());

    let market_data_base_url = env::var("MARKET_DATA_BASE_URL")
        .unwrap_or_else(|_| "https://api.marketdata.example/v1".to_string());

    let market_data_api_key = env::var("MARKET_DATA_API_KEY").unwrap_or_default();

    let poll_interval_secs = env::var("POLL_INTERVAL_SECS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(30);

    let provider_timeout_ms = env::var("PROVIDER_TIMEOUT_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(5_000);

    let eval_concurrency = env::var("EVAL_CONCURRENCY")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(8);

    Settings {
        mongodb_uri,
        mongodb_db,
        market_data_base_url,
        market_data_api_key,
        poll_interval_secs,
        provider_timeout_ms,
        eval_concurrency,
    }
}
