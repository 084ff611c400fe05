use serde::{Deserialize, Serialize};

/// Outer lifecycle position, shared by all alert kinds.
///
/// Advances forward only; the single exception is the dormant machine's
/// explicit reset back to WATCHING once its cooldown expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertStage {
    Initial,
    Watching,
    Confirmed,
    Expired,
    Cancelled,
}

impl AlertStage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AlertStage::Confirmed | AlertStage::Expired | AlertStage::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStage::Initial => "INITIAL",
            AlertStage::Watching => "WATCHING",
            AlertStage::Confirmed => "CONFIRMED",
            AlertStage::Expired => "EXPIRED",
            AlertStage::Cancelled => "CANCELLED",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    Active,
    Paused,
    Triggered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ThresholdCondition {
    Above,
    Below,
    Cross,
}

impl ThresholdCondition {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThresholdCondition::Above => "ABOVE",
            ThresholdCondition::Below => "BELOW",
            ThresholdCondition::Cross => "CROSS",
        }
    }
}

/// Fields shared by every alert variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertCommon {
    pub id: String,
    pub symbol_or_address: String,
    pub timeframe: String,
    pub enabled: bool,
    pub status: AlertStatus,
    pub stage: AlertStage,
    pub created_at: i64,
    pub note: Option<String>,
    pub last_triggered_at: Option<i64>,
    pub trigger_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdAlert {
    #[serde(flatten)]
    pub common: AlertCommon,

    pub condition: ThresholdCondition,
    pub target_price: f64,
    pub triggered_at: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorState {
    pub id: String,
    pub category: String,
    pub triggered: bool,
    pub last_value: Option<f64>,
}

/// A template names the fixed set of three indicators a two-stage alert
/// watches. The ids are what gets handed to the indicator provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TwoStageTemplate {
    BreakoutConfirm,
    TrendReversal,
    VolumeSqueeze,
}

impl TwoStageTemplate {
    pub fn indicator_specs(&self) -> [(&'static str, &'static str); 3] {
        match self {
            TwoStageTemplate::BreakoutConfirm => [
                ("rsi_breakout", "momentum"),
                ("macd_bullish_cross", "trend"),
                ("volume_spike", "volume"),
            ],
            TwoStageTemplate::TrendReversal => [
                ("rsi_oversold_reversal", "momentum"),
                ("ema_reclaim", "trend"),
                ("obv_uptick", "volume"),
            ],
            TwoStageTemplate::VolumeSqueeze => [
                ("bollinger_squeeze", "volatility"),
                ("volume_contraction", "volume"),
                ("range_breakout", "price"),
            ],
        }
    }

    pub fn initial_indicators(&self) -> Vec<IndicatorState> {
        self.indicator_specs()
            .into_iter()
            .map(|(id, category)| IndicatorState {
                id: id.to_string(),
                category: category.to_string(),
                triggered: false,
                last_value: None,
            })
            .collect()
    }
}

pub const DEFAULT_EXPIRY_MINUTES: i64 = 240;
pub const DEFAULT_TWO_STAGE_COOLDOWN_MINUTES: i64 = 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwoStageAlert {
    #[serde(flatten)]
    pub common: AlertCommon,

    pub template: TwoStageTemplate,
    pub indicators: Vec<IndicatorState>,
    pub triggered_count: u8,
    pub expiry_minutes: i64,
    pub cooldown_minutes: i64,
    pub expires_at: Option<i64>,
    pub window_minutes: Option<i64>,
}

/// Inner sub-lifecycle of a dormant-awakening session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DormantStage {
    Initial,
    Awakening,
    Sustained,
    SecondSurge,
    SessionEnded,
}

impl DormantStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            DormantStage::Initial => "INITIAL",
            DormantStage::Awakening => "AWAKENING",
            DormantStage::Sustained => "SUSTAINED",
            DormantStage::SecondSurge => "SECOND_SURGE",
            DormantStage::SessionEnded => "SESSION_ENDED",
        }
    }
}

/// Thresholds and multipliers driving the dormant-awakening machine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DormantParams {
    pub dead_volume_ceiling: f64,
    pub dead_trades_ceiling: f64,
    pub dead_holder_delta_6h: f64,

    pub awake_volume_mult: f64,
    pub awake_trades_mult: f64,
    pub awake_holder_delta_30m: f64,

    pub stage2_window_minutes: i64,

    pub stage3_volume_mult: f64,
    pub stage3_trades_mult: f64,
    pub stage3_holder_delta_30m: f64,
    pub stage3_window_hours: i64,

    pub cooldown_minutes: i64,
}

impl Default for DormantParams {
    fn default() -> Self {
        Self {
            dead_volume_ceiling: 100.0,
            dead_trades_ceiling: 5.0,
            dead_holder_delta_6h: 0.0,
            awake_volume_mult: 3.0,
            awake_trades_mult: 3.0,
            awake_holder_delta_30m: 5.0,
            stage2_window_minutes: 30,
            stage3_volume_mult: 5.0,
            stage3_trades_mult: 5.0,
            stage3_holder_delta_30m: 10.0,
            stage3_window_hours: 4,
            cooldown_minutes: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DormantAwakeningAlert {
    #[serde(flatten)]
    pub common: AlertCommon,

    pub params: DormantParams,
    pub dormant_stage: DormantStage,
    pub session_start: Option<i64>,
    pub session_ends_at: Option<i64>,
    pub window_ends_at: Option<i64>,
    pub cooldown_ends_at: Option<i64>,
}

/// The alert union. Discriminated on `type`; each variant carries the
/// common fields flattened into its document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Alert {
    Threshold(ThresholdAlert),
    TwoStage(TwoStageAlert),
    DormantAwakening(DormantAwakeningAlert),
}

impl Alert {
    pub fn common(&self) -> &AlertCommon {
        match self {
            Alert::Threshold(a) => &a.common,
            Alert::TwoStage(a) => &a.common,
            Alert::DormantAwakening(a) => &a.common,
        }
    }

    pub fn common_mut(&mut self) -> &mut AlertCommon {
        match self {
            Alert::Threshold(a) => &mut a.common,
            Alert::TwoStage(a) => &mut a.common,
            Alert::DormantAwakening(a) => &mut a.common,
        }
    }

    pub fn id(&self) -> &str {
        &self.common().id
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Alert::Threshold(_) => "threshold",
            Alert::TwoStage(_) => "two_stage",
            Alert::DormantAwakening(_) => "dormant_awakening",
        }
    }
}

/// Typed constructor requests, one per alert kind.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CreateAlertRequest {
    Threshold {
        symbol_or_address: String,
        timeframe: String,
        condition: ThresholdCondition,
        target_price: f64,
        note: Option<String>,
    },
    TwoStage {
        symbol_or_address: String,
        timeframe: String,
        template: TwoStageTemplate,
        expiry_minutes: Option<i64>,
        cooldown_minutes: Option<i64>,
        window_minutes: Option<i64>,
        note: Option<String>,
    },
    DormantAwakening {
        symbol_or_address: String,
        timeframe: String,
        params: Option<DormantParams>,
        note: Option<String>,
    },
}
