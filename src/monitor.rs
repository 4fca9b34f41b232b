//! Polling engine.
//!
//! `HealthMonitor` runs check cycles over the configured resources: once
//! immediately on start and then once per poll interval until its
//! cancellation token fires. Each successful check replaces the resource's
//! record in the `HealthStore` and is forwarded to the `MetricsSink`.

use chrono::Utc;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::health::HealthRecord;
use crate::metrics::MetricsSink;
use crate::provider::{ProviderClient, ProviderError};
use crate::resource::ResourceDescriptor;
use crate::store::HealthStore;

/// Interval used when none (or zero) is configured.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Longest accepted poll interval.
pub const MAX_POLL_INTERVAL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Upper bound for a single provider call.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Tunables of the polling engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorSettings {
    pub poll_interval: Option<Duration>,
    pub request_timeout: Duration,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            poll_interval: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl MonitorSettings {
    /// Configured interval, or [`DEFAULT_POLL_INTERVAL`] when unset or zero.
    /// Capped at [`MAX_POLL_INTERVAL`].
    pub fn effective_interval(&self) -> Duration {
        match self.poll_interval {
            Some(interval) if !interval.is_zero() => interval.min(MAX_POLL_INTERVAL),
            _ => DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Lifecycle of a `HealthMonitor`. `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Idle,
    Running,
    Stopped,
}

#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("health monitor is already running")]
    AlreadyRunning,

    #[error("health monitor has stopped and cannot be restarted")]
    Stopped,
}

/// Outcome of one check cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub checked: usize,
    pub failed: usize,
    /// Resources not visited because the cycle was cancelled.
    pub skipped: usize,
    pub duration: Duration,
}

pub struct HealthMonitor {
    resources: Vec<ResourceDescriptor>,
    provider: Arc<dyn ProviderClient>,
    sink: Arc<dyn MetricsSink>,
    store: HealthStore,
    settings: MonitorSettings,
    state: Mutex<MonitorState>,
}

impl HealthMonitor {
    pub fn new(
        resources: Vec<ResourceDescriptor>,
        provider: Arc<dyn ProviderClient>,
        sink: Arc<dyn MetricsSink>,
        settings: MonitorSettings,
    ) -> Self {
        Self {
            resources,
            provider,
            sink,
            store: HealthStore::new(),
            settings,
            state: Mutex::new(MonitorState::Idle),
        }
    }

    pub fn resources(&self) -> &[ResourceDescriptor] {
        &self.resources
    }

    pub fn settings(&self) -> &MonitorSettings {
        &self.settings
    }

    pub fn state(&self) -> MonitorState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: MonitorState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    fn begin(&self) -> Result<(), MonitorError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match *state {
            MonitorState::Idle => {
                *state = MonitorState::Running;
                Ok(())
            }
            MonitorState::Running => Err(MonitorError::AlreadyRunning),
            MonitorState::Stopped => Err(MonitorError::Stopped),
        }
    }

    /// Runs check cycles until `cancel` fires.
    ///
    /// The first cycle starts immediately; following cycles start one poll
    /// interval apart. Returns once cancellation has been observed.
    pub async fn start_monitoring(&self, cancel: CancellationToken) -> Result<(), MonitorError> {
        self.begin()?;

        let period = self.settings.effective_interval();
        info!(
            "Starting health monitoring of {} resources (interval: {}s)",
            self.resources.len(),
            period.as_secs_f64()
        );

        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        self.run_cycle(&cancel).await;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    self.run_cycle(&cancel).await;
                }
            }
        }

        self.set_state(MonitorState::Stopped);
        info!("Health monitoring stopped");
        Ok(())
    }

    /// Checks every resource once, in configuration order.
    ///
    /// A failing resource is logged and skipped; its previous record stays.
    /// Cancellation is observed between resources.
    pub async fn run_cycle(&self, cancel: &CancellationToken) -> CycleSummary {
        let start = Instant::now();
        let mut summary = CycleSummary::default();
        debug!("Checking resource health...");

        for (index, resource) in self.resources.iter().enumerate() {
            if cancel.is_cancelled() {
                summary.skipped = self.resources.len() - index;
                info!(
                    "Check cycle cancelled, {} resources not checked",
                    summary.skipped
                );
                break;
            }

            match self.check_resource(resource, cancel).await {
                Ok(record) => {
                    self.apply(record);
                    summary.checked += 1;
                }
                Err(e) => {
                    warn!(resource = %resource, "Error checking {}: {}", resource.name(), e);
                    self.sink.record_failure(resource);
                    summary.failed += 1;
                }
            }
        }

        summary.duration = start.elapsed();
        self.sink.record_cycle(&summary);
        info!(
            "Check cycle completed: {} checked, {} failed in {:.3}s",
            summary.checked,
            summary.failed,
            summary.duration.as_secs_f64()
        );
        summary
    }

    async fn check_resource(
        &self,
        resource: &ResourceDescriptor,
        cancel: &CancellationToken,
    ) -> Result<HealthRecord, ProviderError> {
        let id = resource.canonical_id();
        let timeout = self.settings.request_timeout;
        let call = self.provider.check_health(&id, cancel.child_token());

        let status = tokio::time::timeout(timeout, call)
            .await
            .map_err(|_| ProviderError::Timeout(timeout))??;

        Ok(HealthRecord::from_status(resource, status, Utc::now()))
    }

    /// Publishes a record to the metrics sink and the store in one step.
    fn apply(&self, record: HealthRecord) {
        debug!(
            "Updated: {} - {} ({})",
            record.name, record.availability_state, record.summary
        );
        self.sink.record(&record);
        self.store.upsert(record);
    }

    /// Current snapshot of all known records.
    ///
    /// The error is reserved for store failures; today this always succeeds.
    pub fn get_health_status(&self) -> Result<Vec<HealthRecord>, MonitorError> {
        Ok(self.store.snapshot())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::AvailabilityState;
    use crate::metrics::HealthMetrics;
    use crate::provider::RawAvailabilityStatus;
    use crate::resource::ResourceEntry;
    use ahash::AHashMap as HashMap;
    use async_trait::async_trait;
    use prometheus::Registry;
    use tokio::sync::mpsc;

    const VM_TYPE: &str = "Microsoft.Compute/virtualMachines";

    fn vm(name: &str) -> ResourceDescriptor {
        ResourceDescriptor::new("sub-123", &ResourceEntry::new("rg1", name, VM_TYPE))
    }

    /// Scripted provider: `None` in `states` makes the check fail.
    #[derive(Default)]
    struct FakeProvider {
        states: Mutex<HashMap<String, Option<&'static str>>>,
        calls: Mutex<Vec<String>>,
        cancel_on: Option<(String, CancellationToken)>,
        delay: Option<Duration>,
        call_times: Option<mpsc::UnboundedSender<Instant>>,
    }

    impl FakeProvider {
        fn with_states(states: &[(&str, Option<&'static str>)]) -> Self {
            let provider = Self::default();
            for (name, state) in states {
                provider.set(name, *state);
            }
            provider
        }

        fn set(&self, name: &str, state: Option<&'static str>) {
            self.states
                .lock()
                .unwrap()
                .insert(vm(name).canonical_id(), state);
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ProviderClient for FakeProvider {
        async fn check_health(
            &self,
            resource_id: &str,
            _cancel: CancellationToken,
        ) -> Result<RawAvailabilityStatus, ProviderError> {
            let name = resource_id.rsplit('/').next().unwrap().to_string();
            self.calls.lock().unwrap().push(name.clone());
            if let Some(tx) = &self.call_times {
                let _ = tx.send(Instant::now());
            }
            if let Some((target, token)) = &self.cancel_on {
                if *target == name {
                    token.cancel();
                }
            }
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            let state = self.states.lock().unwrap().get(resource_id).copied();
            match state {
                Some(Some(state)) => Ok(RawAvailabilityStatus {
                    availability_state: Some(state.to_string()),
                    summary: Some(format!("{name} is {state}")),
                    reason_type: None,
                }),
                Some(None) => Err(ProviderError::Status {
                    status: 429,
                    body: "throttled".into(),
                }),
                None => Err(ProviderError::NotFound(resource_id.to_string())),
            }
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        records: Mutex<Vec<HealthRecord>>,
        failures: Mutex<Vec<String>>,
        cycles: Mutex<Vec<CycleSummary>>,
    }

    impl MetricsSink for RecordingSink {
        fn record(&self, record: &HealthRecord) {
            self.records.lock().unwrap().push(record.clone());
        }

        fn record_failure(&self, resource: &ResourceDescriptor) {
            self.failures.lock().unwrap().push(resource.name().to_string());
        }

        fn record_cycle(&self, summary: &CycleSummary) {
            self.cycles.lock().unwrap().push(summary.clone());
        }
    }

    fn monitor(
        names: &[&str],
        provider: Arc<FakeProvider>,
        sink: Arc<dyn MetricsSink>,
        settings: MonitorSettings,
    ) -> HealthMonitor {
        HealthMonitor::new(names.iter().map(|n| vm(n)).collect(), provider, sink, settings)
    }

    #[test]
    fn test_effective_interval() {
        let mut settings = MonitorSettings::default();
        assert_eq!(settings.effective_interval(), DEFAULT_POLL_INTERVAL);

        settings.poll_interval = Some(Duration::ZERO);
        assert_eq!(settings.effective_interval(), Duration::from_secs(60));

        settings.poll_interval = Some(Duration::from_secs(15));
        assert_eq!(settings.effective_interval(), Duration::from_secs(15));

        settings.poll_interval = Some(Duration::from_secs(u64::MAX));
        assert_eq!(settings.effective_interval(), MAX_POLL_INTERVAL);
    }

    #[tokio::test]
    async fn test_huge_interval_starts_and_stops() {
        let monitor = monitor(
            &["vm1"],
            Arc::new(FakeProvider::with_states(&[("vm1", Some("Available"))])),
            Arc::new(RecordingSink::default()),
            MonitorSettings {
                poll_interval: Some(Duration::from_secs(i64::MAX as u64)),
                request_timeout: DEFAULT_REQUEST_TIMEOUT,
            },
        );
        let cancel = CancellationToken::new();
        cancel.cancel();

        monitor.start_monitoring(cancel).await.unwrap();
        assert_eq!(monitor.state(), MonitorState::Stopped);
    }

    #[tokio::test]
    async fn test_cycle_updates_store_and_gauges() {
        let registry = Registry::new();
        let metrics = Arc::new(HealthMetrics::new(&registry).unwrap());
        let provider = Arc::new(FakeProvider::with_states(&[
            ("vm1", Some("Available")),
            ("vm2", Some("Degraded")),
        ]));
        let monitor = monitor(
            &["vm1", "vm2"],
            provider,
            metrics.clone(),
            MonitorSettings::default(),
        );

        let summary = monitor.run_cycle(&CancellationToken::new()).await;
        assert_eq!((summary.checked, summary.failed, summary.skipped), (2, 0, 0));

        let records = monitor.get_health_status().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "vm1");
        assert!(records[0].healthy());
        assert_eq!(records[1].name, "vm2");
        assert!(!records[1].healthy());
        assert_eq!(records[1].availability_state, AvailabilityState::Degraded);

        let vm1_id = vm("vm1").canonical_id();
        let vm2_id = vm("vm2").canonical_id();
        let gauge = |id: &str, name: &str, state: &str| {
            metrics
                .health_status
                .with_label_values(&[id, "rg1", name, VM_TYPE, state])
                .get()
        };
        assert_eq!(gauge(&vm1_id, "vm1", "Available"), 1.0);
        assert_eq!(gauge(&vm2_id, "vm2", "Degraded"), 0.0);
    }

    #[tokio::test]
    async fn test_failing_resource_is_isolated() {
        let provider = Arc::new(FakeProvider::with_states(&[
            ("vm1", Some("Available")),
            ("vm2", None),
            ("vm3", Some("Unavailable")),
        ]));
        let sink = Arc::new(RecordingSink::default());
        let monitor = monitor(
            &["vm1", "vm2", "vm3"],
            provider.clone(),
            sink.clone(),
            MonitorSettings::default(),
        );
        let cancel = CancellationToken::new();

        // First cycle: the failing resource has no record.
        let summary = monitor.run_cycle(&cancel).await;
        assert_eq!((summary.checked, summary.failed), (2, 1));
        let names: Vec<_> = monitor
            .get_health_status()
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["vm1", "vm3"]);
        assert_eq!(*sink.failures.lock().unwrap(), vec!["vm2"]);

        // Later cycle: a failure leaves the previous record untouched.
        provider.set("vm2", Some("Available"));
        monitor.run_cycle(&cancel).await;
        let before = monitor.store.get(&vm("vm2").canonical_id()).unwrap();

        provider.set("vm2", None);
        provider.set("vm1", Some("Degraded"));
        monitor.run_cycle(&cancel).await;

        assert_eq!(monitor.store.get(&vm("vm2").canonical_id()), Some(before));
        assert_eq!(
            monitor
                .store
                .get(&vm("vm1").canonical_id())
                .unwrap()
                .availability_state,
            AvailabilityState::Degraded
        );
        assert_eq!(sink.cycles.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_store_and_sink_updated_together() {
        let provider = Arc::new(FakeProvider::with_states(&[
            ("vm1", Some("Available")),
            ("vm2", None),
        ]));
        let sink = Arc::new(RecordingSink::default());
        let monitor = monitor(
            &["vm1", "vm2"],
            provider,
            sink.clone(),
            MonitorSettings::default(),
        );

        monitor.run_cycle(&CancellationToken::new()).await;

        let published = sink.records.lock().unwrap().clone();
        assert_eq!(published, monitor.get_health_status().unwrap());
    }

    #[tokio::test]
    async fn test_cancel_between_resources_stops_monitoring() {
        let cancel = CancellationToken::new();
        let provider = Arc::new(FakeProvider {
            cancel_on: Some(("vm1".to_string(), cancel.clone())),
            ..FakeProvider::with_states(&[
                ("vm1", Some("Available")),
                ("vm2", Some("Available")),
                ("vm3", Some("Available")),
            ])
        });
        let sink = Arc::new(RecordingSink::default());
        let monitor = monitor(
            &["vm1", "vm2", "vm3"],
            provider.clone(),
            sink.clone(),
            MonitorSettings::default(),
        );

        monitor.start_monitoring(cancel).await.unwrap();

        assert_eq!(provider.calls(), vec!["vm1"]);
        assert_eq!(monitor.get_health_status().unwrap().len(), 1);
        assert_eq!(monitor.state(), MonitorState::Stopped);
        let cycles = sink.cycles.lock().unwrap();
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].skipped, 2);
    }

    #[tokio::test]
    async fn test_stopped_monitor_cannot_restart() {
        let provider = Arc::new(FakeProvider::default());
        let monitor = monitor(
            &[],
            provider,
            Arc::new(RecordingSink::default()),
            MonitorSettings::default(),
        );
        assert_eq!(monitor.state(), MonitorState::Idle);

        let cancel = CancellationToken::new();
        cancel.cancel();
        monitor.start_monitoring(cancel.clone()).await.unwrap();

        assert!(matches!(
            monitor.start_monitoring(cancel).await,
            Err(MonitorError::Stopped)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_start_while_running_is_rejected() {
        let provider = Arc::new(FakeProvider::default());
        let monitor = Arc::new(monitor(
            &["vm1"],
            provider,
            Arc::new(RecordingSink::default()),
            MonitorSettings::default(),
        ));
        let cancel = CancellationToken::new();

        let task = tokio::spawn({
            let monitor = monitor.clone();
            let cancel = cancel.clone();
            async move { monitor.start_monitoring(cancel).await }
        });
        while monitor.state() != MonitorState::Running {
            tokio::task::yield_now().await;
        }

        assert!(matches!(
            monitor.start_monitoring(CancellationToken::new()).await,
            Err(MonitorError::AlreadyRunning)
        ));

        cancel.cancel();
        task.await.unwrap().unwrap();
        assert_eq!(monitor.state(), MonitorState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_interval_between_cycles() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let provider = Arc::new(FakeProvider {
            call_times: Some(tx),
            ..FakeProvider::with_states(&[("vm1", Some("Available"))])
        });
        let monitor = Arc::new(monitor(
            &["vm1"],
            provider,
            Arc::new(RecordingSink::default()),
            MonitorSettings::default(),
        ));
        let cancel = CancellationToken::new();

        let task = tokio::spawn({
            let monitor = monitor.clone();
            let cancel = cancel.clone();
            async move { monitor.start_monitoring(cancel).await }
        });

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        let third = rx.recv().await.unwrap();
        assert_eq!(second - first, Duration::from_secs(60));
        assert_eq!(third - second, Duration::from_secs(60));

        cancel.cancel();
        task.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_provider_times_out() {
        let provider = Arc::new(FakeProvider {
            delay: Some(Duration::from_secs(120)),
            ..FakeProvider::with_states(&[("vm1", Some("Available"))])
        });
        let sink = Arc::new(RecordingSink::default());
        let monitor = monitor(
            &["vm1"],
            provider,
            sink.clone(),
            MonitorSettings {
                poll_interval: Some(Duration::from_secs(10)),
                request_timeout: Duration::from_secs(5),
            },
        );

        let summary = monitor.run_cycle(&CancellationToken::new()).await;

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.duration, Duration::from_secs(5));
        assert!(monitor.get_health_status().unwrap().is_empty());
        assert_eq!(*sink.failures.lock().unwrap(), vec!["vm1"]);
    }

    #[tokio::test]
    async fn test_no_resources_is_valid() {
        let monitor = monitor(
            &[],
            Arc::new(FakeProvider::default()),
            Arc::new(RecordingSink::default()),
            MonitorSettings::default(),
        );
        let summary = monitor.run_cycle(&CancellationToken::new()).await;
        assert_eq!((summary.checked, summary.failed, summary.skipped), (0, 0, 0));
        assert!(monitor.get_health_status().unwrap().is_empty());
    }
}
