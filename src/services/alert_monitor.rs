use std::time::Duration;

use crate::AppState;

/// Spawns the background sweep loop. The cadence follows the evaluator's
/// recommendation between sweeps, falling back to the configured interval
/// after an error. Redundant or overlapping invocations are harmless: the
/// dedup ledger keeps notifications at-most-once per logical transition.
pub fn spawn_alert_monitor(state: AppState) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut delay_secs = state.settings.poll_interval_secs.max(1);

        loop {
            tokio::time::sleep(Duration::from_secs(delay_secs)).await;

            let now = state.clock.now();
            match state.evaluator.evaluate_all(now).await {
                Ok(result) => {
                    if !result.events.is_empty() {
                        tracing::info!(
                            evaluated = result.evaluated_count,
                            emitted = result.events.len(),
                            "alert sweep emitted events"
                        );
                        let _ = state.events_tx.send("alertsUpdated".to_string());
                    }
                    delay_secs = result.recommended_next_poll_secs.max(1);
                }
                Err(e) => {
                    tracing::error!(error = %e, "alert sweep failed");
                    delay_secs = state.settings.poll_interval_secs.max(1);
                }
            }
        }
    })
}
