use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::models::{IndicatorReading, TokenMetrics};
use crate::services::providers::{
    IndicatorProvider, PriceFeed, ProviderError, TokenMetricsProvider,
};

/// REST client for the market-data API, implementing all three provider
/// interfaces. Every request carries an explicit timeout.
#[derive(Clone)]
pub struct MarketDataClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl MarketDataClient {
    pub fn new(base_url: String, api_key: String, timeout_ms: u64) -> Result<Self, ProviderError> {
        let http = Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .map_err(|e| ProviderError::Request(e.to_string()))?;

        Ok(Self {
            http,
            base_url,
            api_key,
        })
    }

    fn has_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ProviderError> {
        if !self.has_key() {
            return Err(ProviderError::MissingApiKey);
        }

        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), path);
        let res = self
            .http
            .get(&url)
            .query(query)
            .query(&[("token", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| ProviderError::Request(e.to_string()))?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(ProviderError::Request(format!(
                "market data request failed: {status} {body}"
            )));
        }

        res.json::<T>()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct QuoteResponse {
    // current
    pub c: f64,
    // timestamp
    pub t: i64,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct MetricsResponse {
    pub volume: f64,
    pub trades: u64,

    #[serde(rename = "holderDelta6h")]
    pub holder_delta_6h: f64,

    #[serde(rename = "holderDelta30m")]
    pub holder_delta_30m: f64,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct IndicatorResult {
    pub triggered: bool,
    pub value: Option<f64>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct IndicatorsResponse {
    pub results: HashMap<String, IndicatorResult>,
}

#[async_trait]
impl PriceFeed for MarketDataClient {
    async fn last_price(
        &self,
        symbol_or_address: &str,
        timeframe: &str,
    ) -> Result<f64, ProviderError> {
        let quote: QuoteResponse = self
            .get_json(
                "quote",
                &[("symbol", symbol_or_address), ("resolution", timeframe)],
            )
            .await?;

        if !quote.c.is_finite() || quote.c <= 0.0 {
            return Err(ProviderError::Malformed(format!(
                "unusable price {} for {symbol_or_address}",
                quote.c
            )));
        }
        Ok(quote.c)
    }
}

#[async_trait]
impl TokenMetricsProvider for MarketDataClient {
    async fn metrics(&self, symbol_or_address: &str) -> Result<TokenMetrics, ProviderError> {
        let m: MetricsResponse = self
            .get_json("token/metrics", &[("symbol", symbol_or_address)])
            .await?;

        Ok(TokenMetrics {
            volume: m.volume,
            trades: m.trades,
            holder_delta_6h: m.holder_delta_6h,
            holder_delta_30m: m.holder_delta_30m,
        })
    }
}

#[async_trait]
impl IndicatorProvider for MarketDataClient {
    async fn evaluate_indicators(
        &self,
        symbol_or_address: &str,
        timeframe: &str,
        indicator_ids: &[String],
    ) -> Result<HashMap<String, IndicatorReading>, ProviderError> {
        let ids = indicator_ids.join(",");
        let res: IndicatorsResponse = self
            .get_json(
                "indicators",
                &[
                    ("symbol", symbol_or_address),
                    ("resolution", timeframe),
                    ("ids", ids.as_str()),
                ],
            )
            .await?;

        Ok(res
            .results
            .into_iter()
            .map(|(id, r)| {
                (
                    id,
                    IndicatorReading {
                        triggered: r.triggered,
                        value: r.value,
                    },
                )
            })
            .collect())
    }
}
