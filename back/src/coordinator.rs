//! Runs scrape cycles one at a time and publishes their outcome.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use serde::Serialize;
use tokio::sync::{Mutex, oneshot};
use url::Url;

use crate::alert::{Alert, AlertBook};
use crate::detector::SeenProducts;
use crate::error::{MonitorError, Result};
use crate::product::Snapshot;
use crate::source::SnapshotSource;
use crate::state::{ProcessState, RunStatus, StatePatch};

pub const TIMEOUT_REASON: &str = "Scrape timeout";
pub const CANCELLED_REASON: &str = "Cycle cancelled";

/// Everything a cycle reads and writes between runs.
#[derive(Debug, Clone)]
pub struct MonitorContext {
    seen: SeenProducts,
    alerts: AlertBook,
    first_run: bool,
}

impl Default for MonitorContext {
    fn default() -> Self {
        Self::new()
    }
}

impl MonitorContext {
    pub fn new() -> Self {
        Self {
            seen: SeenProducts::new(),
            alerts: AlertBook::new(),
            first_run: true,
        }
    }

    pub fn is_first_run(&self) -> bool {
        self.first_run
    }

    pub fn alerts(&self) -> &AlertBook {
        &self.alerts
    }

    pub fn seen(&self) -> &SeenProducts {
        &self.seen
    }

    /// Diffs `snapshot` against what was seen, records new alerts and prunes
    /// the monitored set. Returns the alerts recorded this time.
    pub fn process(&mut self, snapshot: &Snapshot, now: &DateTime<Local>) -> Vec<Alert> {
        let intents = self.seen.detect(snapshot, self.first_run);
        let recorded = self.alerts.record(intents, now);
        self.alerts.prune(snapshot);
        self.first_run = false;
        recorded
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CycleOutcome {
    /// Another cycle was already in flight.
    Skipped,
    Completed { alerts: Vec<Alert> },
    Failed { reason: String },
    TimedOut,
}

/// Holds the single-flight flag for one cycle. Dropping it before
/// [`RunGuard::settle`] means the cycle was cancelled, so an error status is
/// published in place of the one the cycle never reached.
struct RunGuard<'a> {
    running: &'a AtomicBool,
    state: &'a ProcessState,
    settled: bool,
}

impl<'a> RunGuard<'a> {
    fn acquire(running: &'a AtomicBool, state: &'a ProcessState) -> Option<Self> {
        running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self {
                running,
                state,
                settled: false,
            })
    }

    fn settle(&mut self) {
        self.settled = true;
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            tracing::warn!("cycle cancelled before completion");
            self.state.update(StatePatch {
                is_scraping: Some(false),
                status: Some(RunStatus::Error(CANCELLED_REASON.to_string())),
                ..Default::default()
            });
        }
        self.running.store(false, Ordering::Release);
    }
}

pub struct Coordinator {
    source: Arc<dyn SnapshotSource>,
    state: ProcessState,
    url: Url,
    timeout: Duration,
    running: AtomicBool,
    context: Mutex<MonitorContext>,
}

impl Coordinator {
    pub fn new(
        source: Arc<dyn SnapshotSource>,
        state: ProcessState,
        url: Url,
        timeout: Duration,
    ) -> Self {
        Self {
            source,
            state,
            url,
            timeout,
            running: AtomicBool::new(false),
            context: Mutex::new(MonitorContext::new()),
        }
    }

    pub fn state(&self) -> &ProcessState {
        &self.state
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Starts a cycle unless one is already running, in which case this is a
    /// no-op that publishes nothing.
    pub async fn trigger(&self) -> CycleOutcome {
        let Some(mut guard) = RunGuard::acquire(&self.running, &self.state) else {
            tracing::debug!("cycle already in flight, skipping trigger");
            return CycleOutcome::Skipped;
        };

        self.state.update(StatePatch {
            is_scraping: Some(true),
            last_updated: Some("Checking...".to_string()),
            status: Some(RunStatus::Checking),
            ..Default::default()
        });

        let started = Instant::now();
        tracing::info!(url = %self.url, "scraping listing");

        let result = tokio::time::timeout(self.timeout, self.run_cycle()).await;
        guard.settle();

        match result {
            Ok(Ok(alerts)) => {
                tracing::info!(
                    alerts = alerts.len(),
                    elapsed = ?started.elapsed(),
                    "cycle complete"
                );
                CycleOutcome::Completed { alerts }
            }
            Ok(Err(e)) => {
                tracing::error!(error = %e, "scrape failed");
                let reason = e.to_string();
                self.publish_error(reason.clone());
                CycleOutcome::Failed { reason }
            }
            Err(_) => {
                tracing::error!(timeout_secs = self.timeout.as_secs(), "scrape timed out");
                self.publish_error(TIMEOUT_REASON.to_string());
                CycleOutcome::TimedOut
            }
        }
    }

    async fn run_cycle(&self) -> Result<Vec<Alert>> {
        let snapshot = self.acquire().await?;

        let mut context = self.context.lock().await;
        let now = Local::now();
        let alerts = context.process(&snapshot, &now);

        self.state.update(StatePatch {
            current_products: Some(snapshot),
            alerts: Some(context.alerts().ledger().to_vec()),
            monitored_products: Some(context.alerts().monitored().to_vec()),
            last_updated: Some(now.format("%-m/%-d/%Y, %-I:%M:%S %p").to_string()),
            is_scraping: Some(false),
            status: Some(RunStatus::Idle),
        });

        Ok(alerts)
    }

    // The source runs on its own task so a timed-out cycle abandons it rather
    // than cancelling it. Once the receiver is gone its result is discarded.
    async fn acquire(&self) -> Result<Snapshot> {
        let (tx, rx) = oneshot::channel();
        let source = Arc::clone(&self.source);
        let url = self.url.clone();

        tokio::spawn(async move {
            let result = source.acquire(&url).await;
            if tx.send(result).is_err() {
                tracing::debug!(url = %url, "discarding snapshot from abandoned cycle");
            }
        });

        rx.await.map_err(|_| MonitorError::Abandoned)?
    }

    fn publish_error(&self, reason: String) {
        self.state.update(StatePatch {
            is_scraping: Some(false),
            status: Some(RunStatus::Error(reason)),
            ..Default::default()
        });
    }
}

/// Triggers a cycle every `every`, starting immediately. Never returns.
pub async fn run_schedule(coordinator: Arc<Coordinator>, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        coordinator.trigger().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::AlertKind;
    use crate::product::Product;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    fn url() -> Url {
        Url::parse("https://shop.example/listing").unwrap()
    }

    fn snapshot(items: &[(&str, bool)]) -> Snapshot {
        items
            .iter()
            .map(|(link, in_stock)| Product {
                name: link.to_string(),
                in_stock: *in_stock,
                link: link.to_string(),
                image: String::new(),
            })
            .collect()
    }

    enum Step {
        Ok(Snapshot),
        Fail,
        Hang,
    }

    struct ScriptedSource {
        steps: std::sync::Mutex<VecDeque<Step>>,
        calls: AtomicUsize,
    }

    impl ScriptedSource {
        fn new(steps: Vec<Step>) -> Arc<Self> {
            Arc::new(Self {
                steps: std::sync::Mutex::new(steps.into()),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl SnapshotSource for ScriptedSource {
        async fn acquire(&self, _url: &Url) -> Result<Snapshot> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let step = self.steps.lock().unwrap().pop_front();
            match step {
                Some(Step::Ok(snapshot)) => Ok(snapshot),
                Some(Step::Hang) => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(Snapshot::new())
                }
                Some(Step::Fail) | None => Err(MonitorError::Status { status: 503 }),
            }
        }
    }

    fn coordinator(source: Arc<dyn SnapshotSource>) -> Coordinator {
        Coordinator::new(source, ProcessState::new(), url(), Duration::from_secs(25))
    }

    #[tokio::test]
    async fn first_cycle_sets_baseline_then_restock_alerts() {
        let source = ScriptedSource::new(vec![
            Step::Ok(snapshot(&[("a", false), ("b", true)])),
            Step::Ok(snapshot(&[("a", true), ("b", true)])),
        ]);
        let coordinator = coordinator(source);

        assert_eq!(
            coordinator.trigger().await,
            CycleOutcome::Completed { alerts: Vec::new() }
        );

        let CycleOutcome::Completed { alerts } = coordinator.trigger().await else {
            panic!("second cycle should complete");
        };
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AlertKind::Stock);

        let view = coordinator.state().read();
        assert_eq!(view.status, RunStatus::Idle);
        assert!(!view.is_scraping);
        assert_eq!(view.alerts.len(), 1);
        assert_eq!(view.monitored_products.len(), 1);
        assert_eq!(view.in_stock_count(), 2);
        assert_ne!(view.last_updated, "Checking...");
    }

    #[tokio::test]
    async fn failure_publishes_error_and_keeps_first_run() {
        let source = ScriptedSource::new(vec![Step::Fail, Step::Ok(snapshot(&[("a", true)]))]);
        let coordinator = coordinator(source);

        assert!(matches!(
            coordinator.trigger().await,
            CycleOutcome::Failed { .. }
        ));
        let view = coordinator.state().read();
        assert!(matches!(view.status, RunStatus::Error(_)));
        assert!(!view.is_scraping);
        assert!(!coordinator.is_running());

        // Still the first successful cycle, so no alerts yet.
        assert_eq!(
            coordinator.trigger().await,
            CycleOutcome::Completed { alerts: Vec::new() }
        );
        assert!(!coordinator.context.lock().await.is_first_run());
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_releases_guard_for_next_cycle() {
        let source = ScriptedSource::new(vec![Step::Hang, Step::Ok(snapshot(&[("a", true)]))]);
        let coordinator = coordinator(source.clone());

        assert_eq!(coordinator.trigger().await, CycleOutcome::TimedOut);
        assert_eq!(
            coordinator.state().read().status,
            RunStatus::Error(TIMEOUT_REASON.to_string())
        );
        assert!(!coordinator.is_running());

        assert!(matches!(
            coordinator.trigger().await,
            CycleOutcome::Completed { .. }
        ));
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        assert_eq!(coordinator.state().read().status, RunStatus::Idle);
    }

    struct GatedSource {
        gate: Notify,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SnapshotSource for GatedSource {
        async fn acquire(&self, _url: &Url) -> Result<Snapshot> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.gate.notified().await;
            Ok(snapshot(&[("a", true)]))
        }
    }

    #[tokio::test]
    async fn trigger_while_running_is_a_silent_no_op() {
        let source = Arc::new(GatedSource {
            gate: Notify::new(),
            calls: AtomicUsize::new(0),
        });
        let coordinator = Arc::new(coordinator(source.clone()));
        let mut rx = coordinator.state().subscribe();

        let first = tokio::spawn({
            let coordinator = Arc::clone(&coordinator);
            async move { coordinator.trigger().await }
        });

        rx.wait_for(|view| view.status == RunStatus::Checking)
            .await
            .unwrap();
        let version = coordinator.state().read().version;

        assert_eq!(coordinator.trigger().await, CycleOutcome::Skipped);
        assert_eq!(coordinator.state().read().version, version);

        source.gate.notify_one();
        assert!(matches!(
            first.await.unwrap(),
            CycleOutcome::Completed { .. }
        ));
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    struct SlowSource {
        delay: Duration,
    }

    #[async_trait]
    impl SnapshotSource for SlowSource {
        async fn acquire(&self, _url: &Url) -> Result<Snapshot> {
            tokio::time::sleep(self.delay).await;
            Ok(snapshot(&[("a", true)]))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn late_snapshot_after_timeout_is_discarded() {
        let coordinator = coordinator(Arc::new(SlowSource {
            delay: Duration::from_secs(30),
        }));

        assert_eq!(coordinator.trigger().await, CycleOutcome::TimedOut);
        let version = coordinator.state().read().version;

        tokio::time::sleep(Duration::from_secs(10)).await;

        let view = coordinator.state().read();
        assert!(view.current_products.is_empty());
        assert_eq!(view.version, version);
        assert_eq!(view.status, RunStatus::Error(TIMEOUT_REASON.to_string()));

        let context = coordinator.context.lock().await;
        assert!(context.seen().is_empty());
        assert!(context.is_first_run());
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_trigger_publishes_cancellation() {
        let source = ScriptedSource::new(vec![Step::Hang, Step::Ok(snapshot(&[("a", true)]))]);
        let coordinator = coordinator(source);

        let abandoned = tokio::time::timeout(Duration::from_secs(1), coordinator.trigger()).await;
        assert!(abandoned.is_err());

        let view = coordinator.state().read();
        assert_eq!(view.status, RunStatus::Error(CANCELLED_REASON.to_string()));
        assert!(!view.is_scraping);
        assert!(!coordinator.is_running());

        assert!(matches!(
            coordinator.trigger().await,
            CycleOutcome::Completed { .. }
        ));
        assert_eq!(coordinator.state().read().status, RunStatus::Idle);
    }
}
