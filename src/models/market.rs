use serde::{Deserialize, Serialize};

/// One reading of a token's activity, as returned by the metrics provider.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TokenMetrics {
    pub volume: f64,
    pub trades: u64,
    pub holder_delta_6h: f64,
    pub holder_delta_30m: f64,
}

/// One indicator evaluation, as returned by the indicator provider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndicatorReading {
    pub triggered: bool,
    pub value: Option<f64>,
}
