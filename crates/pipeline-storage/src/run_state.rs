//! In-process progress tracking for one model run.
//!
//! Unlike the GRIB cache, this is not durable: a crash simply restarts the
//! run's polling loop from scratch. The cache and publish directory are
//! themselves the durable record of what has actually been produced.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use pnw_common::{ForecastHour, RunTime};
use tokio::sync::RwLock;

/// Lifecycle stage of one `(model_id, run_time)` generation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Pending,
    Monitoring,
    Complete,
    Abandoned,
}

/// Progress record for one `(model_id, run_time)` generation run.
#[derive(Debug, Clone)]
pub struct RunState {
    pub phase: RunPhase,
    pub expected_forecast_hours: BTreeSet<ForecastHour>,
    pub completed: BTreeSet<ForecastHour>,
    pub in_flight: BTreeSet<ForecastHour>,
    pub first_seen_upstream: HashMap<ForecastHour, DateTime<Utc>>,
    pub last_progress_at: DateTime<Utc>,
}

impl RunState {
    pub fn new(expected_forecast_hours: BTreeSet<ForecastHour>, now: DateTime<Utc>) -> Self {
        Self {
            phase: RunPhase::Pending,
            expected_forecast_hours,
            completed: BTreeSet::new(),
            in_flight: BTreeSet::new(),
            first_seen_upstream: HashMap::new(),
            last_progress_at: now,
        }
    }

    pub fn is_done(&self) -> bool {
        self.expected_forecast_hours
            .iter()
            .all(|fh| self.completed.contains(fh))
    }
}

/// Shared table of `RunState` keyed by `(model_id, run_time)`, owned by the
/// scheduler and read by progress-reporting callers (e.g. the metrics
/// endpoint).
#[derive(Clone, Default)]
pub struct RunStateTable {
    inner: Arc<RwLock<HashMap<(String, RunTime), RunState>>>,
}

impl RunStateTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn begin(
        &self,
        model_id: impl Into<String>,
        run_time: RunTime,
        expected_forecast_hours: BTreeSet<ForecastHour>,
        now: DateTime<Utc>,
    ) {
        let mut table = self.inner.write().await;
        table.insert((model_id.into(), run_time), RunState::new(expected_forecast_hours, now));
    }

    pub async fn mark_in_flight(&self, model_id: &str, run_time: RunTime, fh: ForecastHour) {
        let mut table = self.inner.write().await;
        if let Some(state) = table.get_mut(&(model_id.to_string(), run_time)) {
            state.phase = RunPhase::Monitoring;
            state.in_flight.insert(fh);
        }
    }

    /// Record a completed publish. `completed` only ever grows for a given
    /// run: callers must not remove entries.
    pub async fn mark_completed(
        &self,
        model_id: &str,
        run_time: RunTime,
        fh: ForecastHour,
        now: DateTime<Utc>,
    ) {
        let mut table = self.inner.write().await;
        if let Some(state) = table.get_mut(&(model_id.to_string(), run_time)) {
            state.in_flight.remove(&fh);
            state.completed.insert(fh);
            state.last_progress_at = now;
            state
                .first_seen_upstream
                .entry(fh)
                .or_insert(now);
            if state.is_done() {
                state.phase = RunPhase::Complete;
            }
        }
    }

    pub async fn mark_pending_again(&self, model_id: &str, run_time: RunTime, fh: ForecastHour) {
        let mut table = self.inner.write().await;
        if let Some(state) = table.get_mut(&(model_id.to_string(), run_time)) {
            state.in_flight.remove(&fh);
        }
    }

    pub async fn abandon(&self, model_id: &str, run_time: RunTime) {
        let mut table = self.inner.write().await;
        if let Some(state) = table.get_mut(&(model_id.to_string(), run_time)) {
            state.phase = RunPhase::Abandoned;
        }
    }

    pub async fn snapshot(&self, model_id: &str, run_time: RunTime) -> Option<RunState> {
        let table = self.inner.read().await;
        table.get(&(model_id.to_string(), run_time)).cloned()
    }

    pub async fn active_runs(&self) -> Vec<(String, RunTime)> {
        let table = self.inner.read().await;
        table
            .iter()
            .filter(|(_, state)| matches!(state.phase, RunPhase::Pending | RunPhase::Monitoring))
            .map(|(key, _)| key.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn run() -> RunTime {
        RunTime::from_ymd_hour(2026, 2, 1, 6).unwrap()
    }

    #[tokio::test]
    async fn completed_grows_monotonically_and_marks_run_complete() {
        let table = RunStateTable::new();
        let expected: BTreeSet<ForecastHour> = [0, 6].into_iter().map(ForecastHour::new).collect();
        table.begin("global025", run(), expected, Utc::now()).await;

        table.mark_in_flight("global025", run(), ForecastHour::new(0)).await;
        table
            .mark_completed("global025", run(), ForecastHour::new(0), Utc::now())
            .await;
        let snap = table.snapshot("global025", run()).await.unwrap();
        assert!(snap.completed.contains(&ForecastHour::new(0)));
        assert_eq!(snap.phase, RunPhase::Monitoring);

        table
            .mark_completed("global025", run(), ForecastHour::new(6), Utc::now())
            .await;
        let snap = table.snapshot("global025", run()).await.unwrap();
        assert_eq!(snap.completed.len(), 2);
        assert_eq!(snap.phase, RunPhase::Complete);
    }

    #[tokio::test]
    async fn abandon_marks_phase_without_clearing_progress() {
        let table = RunStateTable::new();
        let expected: BTreeSet<ForecastHour> = [0].into_iter().map(ForecastHour::new).collect();
        table.begin("global025", run(), expected, Utc::now()).await;
        table.abandon("global025", run()).await;
        let snap = table.snapshot("global025", run()).await.unwrap();
        assert_eq!(snap.phase, RunPhase::Abandoned);
    }
}
