//! Market-data provider interfaces, consumed by the evaluator.
//!
//! Live implementations sit in `market_data`; deterministic stand-ins
//! for tests and key-less runs sit in `stubs`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{IndicatorReading, TokenMetrics};

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider request failed: {0}")]
    Request(String),

    #[error("provider returned malformed data: {0}")]
    Malformed(String),

    #[error("provider call timed out after {0}ms")]
    Timeout(u64),

    #[error("MARKET_DATA_API_KEY is missing in .env")]
    MissingApiKey,
}

#[async_trait]
pub trait PriceFeed: Send + Sync {
    async fn last_price(&self, symbol_or_address: &str, timeframe: &str)
        -> Result<f64, ProviderError>;
}

#[async_trait]
pub trait TokenMetricsProvider: Send + Sync {
    async fn metrics(&self, symbol_or_address: &str) -> Result<TokenMetrics, ProviderError>;
}

#[async_trait]
pub trait IndicatorProvider: Send + Sync {
    /// Evaluates the requested indicators. Ids missing from the returned
    /// map are treated by callers as "no fresh reading, keep prior state".
    async fn evaluate_indicators(
        &self,
        symbol_or_address: &str,
        timeframe: &str,
        indicator_ids: &[String],
    ) -> Result<HashMap<String, IndicatorReading>, ProviderError>;
}

/// The provider bundle handed to the evaluator.
#[derive(Clone)]
pub struct Providers {
    pub price_feed: Arc<dyn PriceFeed>,
    pub token_metrics: Arc<dyn TokenMetricsProvider>,
    pub indicators: Arc<dyn IndicatorProvider>,
}
