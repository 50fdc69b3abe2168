//! Job table and scheduler loop
//!
//! The job table maps each job to its trigger. One loop merges the firings
//! of every entry and spawns the job body, so a slow analysis cycle never
//! delays the price sync. The analysis job is guarded
//! by a [`SingleFlight`]: a firing that finds a cycle in flight is dropped.

use crate::analysis::AnalysisPipeline;
use crate::config::SchedulerConfig;
use crate::error::{Result, SchedulerError};
use crate::guard::{FlightPermit, SingleFlight};
use crate::jobs::{self, AnalysisReport, PriceSyncReport, SnapshotReport};
use crate::persistence::{Instrument, PersistenceGateway};
use chrono::{Local, NaiveDateTime, NaiveTime};
use futures::StreamExt;
use futures::stream::{self, BoxStream};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use trader_llm::AgentGateway;
use trader_market::{MarketDataGateway, to_exchange_symbol};

/// The recurring jobs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    PriceSync,
    Analysis,
    Snapshot,
}

impl JobKind {
    pub const ALL: [JobKind; 3] = [JobKind::PriceSync, JobKind::Analysis, JobKind::Snapshot];

    pub fn as_str(self) -> &'static str {
        match self {
            JobKind::PriceSync => "price-sync",
            JobKind::Analysis => "analysis",
            JobKind::Snapshot => "snapshot",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self> {
        JobKind::ALL
            .into_iter()
            .find(|job| job.as_str() == s)
            .ok_or_else(|| SchedulerError::UnknownJob(s.to_string()))
    }
}

/// When a job fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Every period, first firing one period after start
    Every(Duration),
    /// Once a day at a local wall-clock time
    DailyAt(NaiveTime),
}

/// What one job run produced
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "job", rename_all = "kebab-case")]
pub enum JobReport {
    PriceSync(PriceSyncReport),
    Analysis(AnalysisReport),
    Snapshot(SnapshotReport),
    /// The analysis firing found a cycle already in flight
    Skipped,
}

/// Owns the jobs and their shared state
pub struct AnalysisScheduler {
    market: Arc<dyn MarketDataGateway>,
    store: Arc<dyn PersistenceGateway>,
    pipeline: AnalysisPipeline,
    guard: SingleFlight,
    config: SchedulerConfig,
}

impl AnalysisScheduler {
    pub fn new(
        market: Arc<dyn MarketDataGateway>,
        agent: Arc<dyn AgentGateway>,
        store: Arc<dyn PersistenceGateway>,
        config: SchedulerConfig,
    ) -> Self {
        let pipeline = AnalysisPipeline::new(Arc::clone(&market), agent, &config);
        Self {
            market,
            store,
            pipeline,
            guard: SingleFlight::new(),
            config,
        }
    }

    /// The job table
    pub fn jobs(&self) -> [(JobKind, Trigger); 3] {
        [
            (
                JobKind::PriceSync,
                Trigger::Every(self.config.price_sync_interval),
            ),
            (
                JobKind::Analysis,
                Trigger::Every(self.config.analysis_interval),
            ),
            (
                JobKind::Snapshot,
                Trigger::DailyAt(self.config.snapshot_time),
            ),
        ]
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Whether an analysis cycle is in flight
    pub fn is_analysis_running(&self) -> bool {
        self.guard.is_running()
    }

    /// Run `job` once, in the calling task
    ///
    /// An analysis tick while a cycle is in flight returns
    /// [`JobReport::Skipped`] without touching any gateway.
    pub async fn tick(&self, job: JobKind) -> Result<JobReport> {
        match job {
            JobKind::PriceSync => self.sync_prices().await.map(JobReport::PriceSync),
            JobKind::Analysis => match self.acquire_analysis() {
                Some(permit) => self.run_analysis(permit).await.map(JobReport::Analysis),
                None => Ok(JobReport::Skipped),
            },
            JobKind::Snapshot => jobs::snapshot_balances(self.store.as_ref())
                .await
                .map(JobReport::Snapshot),
        }
    }

    /// Start tracking `symbol` at its current price
    ///
    /// The symbol is stored in exchange form, e.g. `btc` becomes `BTCUSDT`.
    pub async fn add_instrument(&self, symbol: &str) -> Result<Instrument> {
        let symbol = to_exchange_symbol(symbol);
        let price = self.market.get_price(&symbol).await?;
        let instrument = Instrument::new(symbol, price);
        self.store.add_instrument(instrument.clone()).await?;
        info!(symbol = %instrument.symbol, price, "Instrument added");
        Ok(instrument)
    }

    /// Drive the job table until `shutdown` flips to `true` or its sender
    /// is dropped
    ///
    /// Every entry of [`jobs`](Self::jobs) becomes one stream of firings;
    /// a single loop dispatches them. In-flight job runs are awaited before
    /// returning; they are never cancelled.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let mut firings = stream::select_all(
            self.jobs()
                .into_iter()
                .map(|(job, trigger)| trigger_stream(job, trigger)),
        );

        let mut running = JoinSet::new();
        info!(
            price_sync = ?self.config.price_sync_interval,
            analysis = ?self.config.analysis_interval,
            snapshot_at = %self.config.snapshot_time,
            "Scheduler started"
        );

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                Some(job) = firings.next() => self.dispatch(job, &mut running),
                Some(joined) = running.join_next(), if !running.is_empty() => {
                    if let Err(e) = joined {
                        error!(error = %e, "Job task aborted");
                    }
                }
            }
        }

        info!(in_flight = running.len(), "Scheduler stopping");
        while let Some(joined) = running.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "Job task aborted during shutdown");
            }
        }
        Ok(())
    }

    /// Spawn one firing of `job`
    ///
    /// An analysis firing that finds a cycle in flight is dropped here.
    fn dispatch(self: &Arc<Self>, job: JobKind, running: &mut JoinSet<()>) {
        let permit = match job {
            JobKind::Analysis => match self.acquire_analysis() {
                Some(permit) => Some(permit),
                None => return,
            },
            JobKind::PriceSync | JobKind::Snapshot => None,
        };

        let this = Arc::clone(self);
        running.spawn(async move {
            let outcome = match permit {
                Some(permit) => this.run_analysis(permit).await.map(JobReport::Analysis),
                None => this.tick(job).await,
            };
            if let Err(e) = outcome {
                error!(job = %job, error = %e, "Job run failed");
            }
        });
    }

    fn acquire_analysis(&self) -> Option<FlightPermit> {
        let permit = self.guard.try_acquire();
        if permit.is_none() {
            debug!(job = %JobKind::Analysis, "Already analyzing market, skipping");
        }
        permit
    }

    async fn run_analysis(&self, _permit: FlightPermit) -> Result<AnalysisReport> {
        jobs::analyze_all(&self.pipeline, self.store.as_ref()).await
    }

    async fn sync_prices(&self) -> Result<PriceSyncReport> {
        jobs::sync_prices(self.market.as_ref(), self.store.as_ref()).await
    }
}

/// Firings of one job table entry
fn trigger_stream(job: JobKind, trigger: Trigger) -> BoxStream<'static, JobKind> {
    match trigger {
        Trigger::Every(period) => {
            stream::unfold(interval_after(period), move |mut interval| async move {
                interval.tick().await;
                Some((job, interval))
            })
            .boxed()
        }
        Trigger::DailyAt(at) => stream::unfold((), move |()| async move {
            tokio::time::sleep(until_next(at, Local::now().naive_local())).await;
            Some((job, ()))
        })
        .boxed(),
    }
}

fn interval_after(period: Duration) -> tokio::time::Interval {
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}

/// Time from `now` until the next occurrence of `at`
///
/// An occurrence exactly at `now` counts as already passed.
pub fn until_next(at: NaiveTime, now: NaiveDateTime) -> Duration {
    let today = now.date().and_time(at);
    let next = if today > now {
        today
    } else {
        today + chrono::Duration::days(1)
    };
    (next - now).to_std().unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    #[test]
    fn test_job_kind_names() {
        for job in JobKind::ALL {
            assert_eq!(job.as_str().parse::<JobKind>().unwrap(), job);
        }
        assert!(matches!(
            "daily".parse::<JobKind>(),
            Err(SchedulerError::UnknownJob(_))
        ));
    }

    #[test]
    fn test_until_next_same_day() {
        let eleven_pm = NaiveTime::from_hms_opt(23, 0, 0).unwrap();
        assert_eq!(
            until_next(eleven_pm, at(22, 30)),
            Duration::from_secs(30 * 60)
        );
    }

    #[test]
    fn test_until_next_rolls_over() {
        let eleven_pm = NaiveTime::from_hms_opt(23, 0, 0).unwrap();
        assert_eq!(
            until_next(eleven_pm, at(23, 0)),
            Duration::from_secs(24 * 3600)
        );
        assert_eq!(
            until_next(eleven_pm, at(23, 30)),
            Duration::from_secs(23 * 3600 + 30 * 60)
        );
    }

    #[tokio::test]
    async fn test_interval_trigger_waits_one_period() {
        let period = Duration::from_millis(20);
        let started = Instant::now();
        let mut fired = trigger_stream(JobKind::PriceSync, Trigger::Every(period));

        assert_eq!(fired.next().await, Some(JobKind::PriceSync));
        assert_eq!(fired.next().await, Some(JobKind::PriceSync));
        assert!(started.elapsed() >= period * 2);
    }

    #[test]
    fn test_report_serialization() {
        let report = JobReport::PriceSync(PriceSyncReport { updated: 3 });
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["job"], "price-sync");
        assert_eq!(value["updated"], 3);

        let value = serde_json::to_value(JobReport::Skipped).unwrap();
        assert_eq!(value["job"], "skipped");
    }
}
