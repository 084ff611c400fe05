use crate::models::AlertEmitted;

/// Result of advancing one alert through its state machine.
///
/// `events` holds only notifications that won the dedup gate; a
/// transition whose notification was suppressed still reports
/// `transitioned = true`.
#[derive(Debug, Default)]
pub struct MachineOutcome {
    pub transitioned: bool,
    pub events: Vec<AlertEmitted>,
}

impl MachineOutcome {
    pub fn noop() -> Self {
        Self::default()
    }
}
