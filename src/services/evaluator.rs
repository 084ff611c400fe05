//! The sweep orchestrator: loads active alerts, fetches fresh provider
//! inputs per alert, drives the matching state machine, and aggregates
//! results. Alerts are independent units of work and run on a bounded
//! pool; one failing alert never aborts the sweep.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{self, StreamExt};

use crate::error::EngineError;
use crate::models::{Alert, AlertEmitted, AlertStage, AlertStatus, IndicatorReading, TokenMetrics};
use crate::services::alert_store::AlertStore;
use crate::services::event_store::EventStore;
use crate::services::providers::{ProviderError, Providers};
use crate::services::runtime::IdGen;
use crate::services::{dormant, threshold, two_stage};

/// Poll hints handed back to the caller; coarse, not a schedule.
const POLL_SECS_WATCHING: u64 = 30;
const POLL_SECS_IDLE: u64 = 60;

#[derive(Debug)]
pub struct EvaluationResult {
    pub evaluated_count: usize,
    pub events: Vec<AlertEmitted>,
    pub recommended_next_poll_secs: u64,
}

struct AlertOutcome {
    events: Vec<AlertEmitted>,
    watching: bool,
}

enum Inputs {
    Price(f64),
    Readings(HashMap<String, IndicatorReading>),
    Metrics(TokenMetrics),
}

#[derive(Clone)]
pub struct Evaluator {
    alerts: AlertStore,
    events: EventStore,
    providers: Providers,
    ids: Arc<dyn IdGen>,
    provider_timeout: Duration,
    concurrency: usize,
}

impl Evaluator {
    pub fn new(
        alerts: AlertStore,
        events: EventStore,
        providers: Providers,
        ids: Arc<dyn IdGen>,
        provider_timeout_ms: u64,
        concurrency: usize,
    ) -> Self {
        Self {
            alerts,
            events,
            providers,
            ids,
            provider_timeout: Duration::from_millis(provider_timeout_ms),
            concurrency: concurrency.max(1),
        }
    }

    /// One full sweep over every alert with status `active`.
    pub async fn evaluate_all(&self, now: i64) -> Result<EvaluationResult, EngineError> {
        let targets = self.alerts.list(Some(AlertStatus::Active), None).await?;
        Ok(self.run_sweep(targets, now).await)
    }

    /// Targeted re-check of specific alerts; unknown and disabled ids are
    /// skipped.
    pub async fn evaluate_by_ids(
        &self,
        ids: &[String],
        now: i64,
    ) -> Result<EvaluationResult, EngineError> {
        let mut targets = Vec::new();
        for id in ids {
            match self.alerts.get_by_id(id).await {
                Ok(Some(alert)) if alert.common().enabled => targets.push(alert),
                Ok(Some(_)) => tracing::debug!(alert_id = %id, "skipping disabled alert"),
                Ok(None) => tracing::warn!(alert_id = %id, "skipping unknown alert id"),
                Err(e) => {
                    tracing::warn!(alert_id = %id, error = %e, "skipping unreadable alert record");
                }
            }
        }
        Ok(self.run_sweep(targets, now).await)
    }

    async fn run_sweep(&self, targets: Vec<Alert>, now: i64) -> EvaluationResult {
        let evaluated_count = targets.len();

        let outcomes: Vec<Option<AlertOutcome>> = stream::iter(targets)
            .map(|alert| async move {
                let alert_id = alert.id().to_string();
                let kind = alert.kind();
                match self.evaluate_one(alert, now).await {
                    Ok(outcome) => Some(outcome),
                    Err(e) => {
                        tracing::warn!(
                            alert_id = %alert_id,
                            kind,
                            error = %e,
                            "alert evaluation failed; skipping this cycle"
                        );
                        None
                    }
                }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut events = Vec::new();
        let mut any_watching = false;
        for outcome in outcomes.into_iter().flatten() {
            any_watching |= outcome.watching;
            events.extend(outcome.events);
        }
        events.sort_by(|a, b| {
            a.occurred_at
                .cmp(&b.occurred_at)
                .then_with(|| a.event_id.cmp(&b.event_id))
        });

        EvaluationResult {
            evaluated_count,
            events,
            recommended_next_poll_secs: if any_watching {
                POLL_SECS_WATCHING
            } else {
                POLL_SECS_IDLE
            },
        }
    }

    async fn evaluate_one(&self, mut alert: Alert, now: i64) -> Result<AlertOutcome, EngineError> {
        let symbol = alert.common().symbol_or_address.clone();
        let timeframe = alert.common().timeframe.clone();

        let inputs = match &alert {
            Alert::Threshold(_) => Inputs::Price(
                self.bounded(self.providers.price_feed.last_price(&symbol, &timeframe))
                    .await?,
            ),
            Alert::TwoStage(t) => {
                let indicator_ids: Vec<String> =
                    t.indicators.iter().map(|i| i.id.clone()).collect();
                Inputs::Readings(
                    self.bounded(self.providers.indicators.evaluate_indicators(
                        &symbol,
                        &timeframe,
                        &indicator_ids,
                    ))
                    .await?,
                )
            }
            Alert::DormantAwakening(_) => Inputs::Metrics(
                self.bounded(self.providers.token_metrics.metrics(&symbol))
                    .await?,
            ),
        };

        let outcome = match inputs {
            Inputs::Price(price) => {
                threshold::evaluate(
                    &self.alerts,
                    &self.events,
                    &mut alert,
                    price,
                    now,
                    self.ids.as_ref(),
                )
                .await?
            }
            Inputs::Readings(readings) => {
                two_stage::evaluate(
                    &self.alerts,
                    &self.events,
                    &mut alert,
                    &readings,
                    now,
                    self.ids.as_ref(),
                )
                .await?
            }
            Inputs::Metrics(metrics) => {
                dormant::evaluate(
                    &self.alerts,
                    &self.events,
                    &mut alert,
                    &metrics,
                    now,
                    self.ids.as_ref(),
                )
                .await?
            }
        };

        let common = alert.common();
        Ok(AlertOutcome {
            events: outcome.events,
            watching: common.enabled && common.stage == AlertStage::Watching,
        })
    }

    async fn bounded<T>(
        &self,
        fut: impl Future<Output = Result<T, ProviderError>>,
    ) -> Result<T, ProviderError> {
        match tokio::time::timeout(self.provider_timeout, fut).await {
            Ok(res) => res,
            Err(_) => Err(ProviderError::Timeout(
                self.provider_timeout.as_millis() as u64
            )),
        }
    }
}
