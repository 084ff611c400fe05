pub mod alert;
pub mod event;
pub mod market;

pub use alert::{
    Alert, AlertCommon, AlertStage, AlertStatus, CreateAlertRequest, DormantAwakeningAlert,
    DormantParams, DormantStage, IndicatorState, ThresholdAlert, ThresholdCondition,
    TwoStageAlert, TwoStageTemplate,
};
pub use event::{AlertEmitted, AlertEventType, EventDetail, SessionEndReason};
pub use market::{IndicatorReading, TokenMetrics};
