//! Deterministic provider stand-ins.
//!
//! Used when no market-data key is configured, and by every integration
//! test. Readings are whatever the caller pins; nothing is random.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::models::{IndicatorReading, TokenMetrics};
use crate::services::providers::{
    IndicatorProvider, PriceFeed, ProviderError, TokenMetricsProvider,
};

#[derive(Default)]
pub struct StaticPriceFeed {
    prices: Mutex<HashMap<String, f64>>,
}

impl StaticPriceFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_price(&self, symbol_or_address: &str, price: f64) {
        self.prices
            .lock()
            .unwrap()
            .insert(symbol_or_address.to_string(), price);
    }
}

#[async_trait]
impl PriceFeed for StaticPriceFeed {
    async fn last_price(
        &self,
        symbol_or_address: &str,
        _timeframe: &str,
    ) -> Result<f64, ProviderError> {
        self.prices
            .lock()
            .unwrap()
            .get(symbol_or_address)
            .copied()
            .ok_or_else(|| {
                ProviderError::Request(format!("no static price for {symbol_or_address}"))
            })
    }
}

#[derive(Default)]
pub struct StaticTokenMetrics {
    metrics: Mutex<HashMap<String, TokenMetrics>>,
}

impl StaticTokenMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_metrics(&self, symbol_or_address: &str, metrics: TokenMetrics) {
        self.metrics
            .lock()
            .unwrap()
            .insert(symbol_or_address.to_string(), metrics);
    }
}

#[async_trait]
impl TokenMetricsProvider for StaticTokenMetrics {
    async fn metrics(&self, symbol_or_address: &str) -> Result<TokenMetrics, ProviderError> {
        self.metrics
            .lock()
            .unwrap()
            .get(symbol_or_address)
            .copied()
            .ok_or_else(|| {
                ProviderError::Request(format!("no static metrics for {symbol_or_address}"))
            })
    }
}

#[derive(Default)]
pub struct StaticIndicators {
    readings: Mutex<HashMap<String, HashMap<String, IndicatorReading>>>,
}

impl StaticIndicators {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_reading(
        &self,
        symbol_or_address: &str,
        indicator_id: &str,
        triggered: bool,
        value: Option<f64>,
    ) {
        self.readings
            .lock()
            .unwrap()
            .entry(symbol_or_address.to_string())
            .or_default()
            .insert(indicator_id.to_string(), IndicatorReading { triggered, value });
    }

    pub fn clear(&self, symbol_or_address: &str) {
        self.readings.lock().unwrap().remove(symbol_or_address);
    }
}

#[async_trait]
impl IndicatorProvider for StaticIndicators {
    async fn evaluate_indicators(
        &self,
        symbol_or_address: &str,
        _timeframe: &str,
        indicator_ids: &[String],
    ) -> Result<HashMap<String, IndicatorReading>, ProviderError> {
        let readings = self.readings.lock().unwrap();
        let Some(per_symbol) = readings.get(symbol_or_address) else {
            return Ok(HashMap::new());
        };

        // Only the requested ids come back; everything else keeps prior state.
        let mut out = HashMap::new();
        for id in indicator_ids {
            if let Some(r) = per_symbol.get(id) {
                out.insert(id.clone(), *r);
            }
        }
        Ok(out)
    }
}
