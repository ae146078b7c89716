//! Health check loop, remediation, and outcome history.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::dedup::deduplicate;
use crate::registry::ToolRegistry;
use crate::tool::Tool;
use crate::validate::validate;

/// Default interval between recurring health checks.
pub const CHECK_INTERVAL_DEFAULT: Duration = Duration::from_millis(5000);

/// Default cap on retained health check results.
pub const HISTORY_MAX_DEFAULT: usize = 1000;

/// Anything that can report the current aggregate tool set.
///
/// The registry implements this; a composer can instead plug in discovery or
/// any other view of the aggregate.
#[async_trait]
pub trait AggregateSource: Send + Sync {
    /// The aggregate tool set to validate.
    async fn current_tools(&self) -> anyhow::Result<Vec<Tool>>;
}

#[async_trait]
impl AggregateSource for ToolRegistry {
    async fn current_tools(&self) -> anyhow::Result<Vec<Tool>> {
        Ok(self.tools())
    }
}

/// Outcome status of one health check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Aggregate validated clean.
    Healthy,

    /// Validation failed but auto-remediation restored validity.
    Warning,

    /// Validation failed and remediation did not help, or the check itself
    /// errored.
    Critical,
}

/// Result of one health check, appended to the bounded history.
#[derive(Debug, Clone, Serialize)]
pub struct HealthCheckResult {
    /// When the check ran.
    pub timestamp: DateTime<Utc>,

    /// Outcome status.
    pub status: HealthStatus,

    /// Number of tools in the checked aggregate.
    pub tool_count: usize,

    /// Number of duplicate names found.
    pub duplicate_count: usize,

    /// Error messages collected during the check.
    pub errors: Vec<String>,

    /// Whether auto-remediation ran.
    pub remediation_attempted: bool,

    /// Whether auto-remediation restored validity.
    pub remediation_successful: bool,
}

/// Aggregated history statistics.
#[derive(Debug, Clone, Serialize)]
pub struct MonitorStats {
    /// Checks recorded in history.
    pub total_checks: usize,

    /// Checks that came back healthy.
    pub healthy_checks: usize,

    /// Checks remediated to warning.
    pub warning_checks: usize,

    /// Checks that ended critical.
    pub critical_checks: usize,

    /// Mean duplicate count across checks.
    pub average_duplicates: f64,

    /// Successful remediations over attempted ones; 0.0 when none attempted.
    pub remediation_success_rate: f64,
}

struct MonitorState {
    history: VecDeque<HealthCheckResult>,
    history_max: usize,
    last_valid: Option<Vec<Tool>>,
}

struct Shared {
    provider: Arc<dyn AggregateSource>,
    state: Mutex<MonitorState>,
    in_flight: AtomicBool,
}

/// Periodically validates the aggregate tool set and self-heals duplicates.
///
/// [`start`](Self::start) is idempotent and runs one immediate check before
/// the recurring schedule; ticks never overlap — a tick that would run while
/// a check is still in flight is skipped, not queued. Failures of the
/// injected provider are contained and recorded as critical results.
pub struct HealthMonitor {
    shared: Arc<Shared>,
    check_interval: Duration,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl HealthMonitor {
    /// Create a monitor over the given aggregate provider with defaults.
    pub fn new(provider: Arc<dyn AggregateSource>) -> Self {
        Self {
            shared: Arc::new(Shared {
                provider,
                state: Mutex::new(MonitorState {
                    history: VecDeque::new(),
                    history_max: HISTORY_MAX_DEFAULT,
                    last_valid: None,
                }),
                in_flight: AtomicBool::new(false),
            }),
            check_interval: CHECK_INTERVAL_DEFAULT,
            task: Mutex::new(None),
        }
    }

    /// Set the recurring check interval.
    pub fn with_interval(mut self, check_interval: Duration) -> Self {
        self.check_interval = check_interval;
        self
    }

    /// Set the history retention cap.
    pub fn with_history_capacity(self, history_max: usize) -> Self {
        self.shared.state.lock().unwrap().history_max = history_max;
        self
    }

    /// Start recurring health checks.
    ///
    /// Warns and does nothing when already running. Performs one immediate
    /// check in addition to the recurring schedule. Must be called within a
    /// tokio runtime.
    pub fn start(&self) {
        let mut task = self.task.lock().unwrap();
        if task.is_some() {
            warn!("Health monitor already running");
            return;
        }

        info!(interval_ms = self.check_interval.as_millis() as u64, "Starting health checks");

        let shared = Arc::clone(&self.shared);
        let check_interval = self.check_interval;
        *task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(check_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if shared.in_flight.swap(true, Ordering::SeqCst) {
                    debug!("Skipping overlapping health check tick");
                    continue;
                }
                let _ = Self::check(&shared).await;
                shared.in_flight.store(false, Ordering::SeqCst);
            }
        }));
    }

    /// Stop the recurring checks. Safe to call when not running.
    pub fn stop(&self) {
        if let Some(task) = self.task.lock().unwrap().take() {
            task.abort();
            info!("Health monitoring stopped");
        }
    }

    /// Whether the recurring schedule is active.
    pub fn is_running(&self) -> bool {
        self.task.lock().unwrap().is_some()
    }

    /// Run one health check now and record its outcome.
    ///
    /// Always runs, even while the recurring schedule is mid-check; ticks
    /// that fire during it are skipped. Never propagates provider errors;
    /// they surface as a critical result.
    pub async fn perform_health_check(&self) -> HealthCheckResult {
        // Only release the flag if this call acquired it; a blind store
        // would let a tick overlap a check still in flight.
        let acquired = self
            .shared
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok();
        let result = Self::check(&self.shared).await;
        if acquired {
            self.shared.in_flight.store(false, Ordering::SeqCst);
        }
        result
    }

    async fn check(shared: &Shared) -> HealthCheckResult {
        let mut result = HealthCheckResult {
            timestamp: Utc::now(),
            status: HealthStatus::Healthy,
            tool_count: 0,
            duplicate_count: 0,
            errors: Vec::new(),
            remediation_attempted: false,
            remediation_successful: false,
        };

        match shared.provider.current_tools().await {
            Ok(tools) => {
                result.tool_count = tools.len();

                match validate(&tools) {
                    Ok(()) => {
                        shared.state.lock().unwrap().last_valid = Some(tools);
                    }
                    Err(err) => {
                        result.status = HealthStatus::Critical;
                        result.duplicate_count = err.duplicates().len();
                        result.errors.push(err.to_string());

                        result.remediation_attempted = true;
                        let remediated = deduplicate(&tools);
                        match validate(&remediated) {
                            Ok(()) => {
                                result.remediation_successful = true;
                                result.status = HealthStatus::Warning;
                                warn!(
                                    duplicates = result.duplicate_count,
                                    "Auto-remediated duplicate tools"
                                );
                                shared.state.lock().unwrap().last_valid = Some(remediated);
                            }
                            Err(err) => {
                                error!(error = %err, "Auto-remediation failed");
                            }
                        }
                    }
                }
            }
            Err(err) => {
                result.status = HealthStatus::Critical;
                result.errors.push(err.to_string());
                error!(error = %err, "Health check failed to fetch aggregate");
            }
        }

        if result.status == HealthStatus::Critical {
            error!(errors = ?result.errors, "Health check critical");
        }

        let mut state = shared.state.lock().unwrap();
        if state.history.len() >= state.history_max {
            state.history.pop_front();
        }
        state.history.push_back(result.clone());

        result
    }

    /// The most recent valid aggregate, retained across critical windows.
    ///
    /// During a critical window the composer should keep serving this set
    /// instead of the invalid one.
    pub fn last_valid_tools(&self) -> Option<Vec<Tool>> {
        self.shared.state.lock().unwrap().last_valid.clone()
    }

    /// Latest recorded check, if any.
    pub fn latest(&self) -> Option<HealthCheckResult> {
        self.shared.state.lock().unwrap().history.back().cloned()
    }

    /// Full retained history, oldest first.
    pub fn history(&self) -> Vec<HealthCheckResult> {
        self.shared.state.lock().unwrap().history.iter().cloned().collect()
    }

    /// Clear the retained history.
    pub fn clear_history(&self) {
        self.shared.state.lock().unwrap().history.clear();
    }

    /// Aggregate statistics over the retained history.
    pub fn stats(&self) -> MonitorStats {
        let state = self.shared.state.lock().unwrap();

        let mut stats = MonitorStats {
            total_checks: state.history.len(),
            healthy_checks: 0,
            warning_checks: 0,
            critical_checks: 0,
            average_duplicates: 0.0,
            remediation_success_rate: 0.0,
        };

        if stats.total_checks == 0 {
            return stats;
        }

        let mut total_duplicates = 0usize;
        let mut attempts = 0usize;
        let mut successes = 0usize;

        for check in &state.history {
            match check.status {
                HealthStatus::Healthy => stats.healthy_checks += 1,
                HealthStatus::Warning => stats.warning_checks += 1,
                HealthStatus::Critical => stats.critical_checks += 1,
            }
            total_duplicates += check.duplicate_count;
            if check.remediation_attempted {
                attempts += 1;
                if check.remediation_successful {
                    successes += 1;
                }
            }
        }

        stats.average_duplicates = total_duplicates as f64 / stats.total_checks as f64;
        if attempts > 0 {
            stats.remediation_success_rate = successes as f64 / attempts as f64;
        }

        stats
    }
}

impl Drop for HealthMonitor {
    fn drop(&mut self) {
        if let Some(task) = self.task.lock().unwrap().take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedProvider {
        tools: Mutex<Vec<Tool>>,
    }

    impl FixedProvider {
        fn new(tools: Vec<Tool>) -> Arc<Self> {
            Arc::new(Self {
                tools: Mutex::new(tools),
            })
        }

        fn set(&self, tools: Vec<Tool>) {
            *self.tools.lock().unwrap() = tools;
        }
    }

    #[async_trait]
    impl AggregateSource for FixedProvider {
        async fn current_tools(&self) -> anyhow::Result<Vec<Tool>> {
            Ok(self.tools.lock().unwrap().clone())
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl AggregateSource for FailingProvider {
        async fn current_tools(&self) -> anyhow::Result<Vec<Tool>> {
            anyhow::bail!("backend offline")
        }
    }

    #[tokio::test]
    async fn test_healthy_check() {
        let provider = FixedProvider::new(vec![Tool::new("a"), Tool::new("b")]);
        let monitor = HealthMonitor::new(provider);

        let result = monitor.perform_health_check().await;

        assert_eq!(result.status, HealthStatus::Healthy);
        assert_eq!(result.tool_count, 2);
        assert!(!result.remediation_attempted);
    }

    #[tokio::test]
    async fn test_duplicates_remediated_to_warning() {
        let provider = FixedProvider::new(vec![
            Tool::new("a"),
            Tool::new("a").with_description("better"),
            Tool::new("b"),
        ]);
        let monitor = HealthMonitor::new(provider);

        let result = monitor.perform_health_check().await;

        assert_eq!(result.status, HealthStatus::Warning);
        assert_eq!(result.duplicate_count, 1);
        assert!(result.remediation_attempted);
        assert!(result.remediation_successful);
    }

    #[tokio::test]
    async fn test_unfixable_set_stays_critical() {
        // Invalid characters survive deduplication.
        let provider = FixedProvider::new(vec![Tool::new("bad/name")]);
        let monitor = HealthMonitor::new(provider);

        let result = monitor.perform_health_check().await;

        assert_eq!(result.status, HealthStatus::Critical);
        assert!(result.remediation_attempted);
        assert!(!result.remediation_successful);
    }

    #[tokio::test]
    async fn test_provider_failure_is_contained() {
        let monitor = HealthMonitor::new(Arc::new(FailingProvider));

        let result = monitor.perform_health_check().await;

        assert_eq!(result.status, HealthStatus::Critical);
        assert!(result.errors[0].contains("backend offline"));
        assert!(!result.remediation_attempted);
    }

    #[tokio::test]
    async fn test_last_valid_survives_critical_window() {
        let provider = FixedProvider::new(vec![Tool::new("a")]);
        let monitor = HealthMonitor::new(Arc::clone(&provider) as Arc<dyn AggregateSource>);

        monitor.perform_health_check().await;
        provider.set(vec![Tool::new("bad/name")]);
        monitor.perform_health_check().await;

        assert_eq!(monitor.latest().unwrap().status, HealthStatus::Critical);
        assert_eq!(monitor.last_valid_tools(), Some(vec![Tool::new("a")]));
    }

    #[tokio::test]
    async fn test_remediated_set_becomes_last_valid() {
        let provider = FixedProvider::new(vec![Tool::new("a"), Tool::new("a")]);
        let monitor = HealthMonitor::new(provider);

        monitor.perform_health_check().await;

        assert_eq!(monitor.last_valid_tools(), Some(vec![Tool::new("a")]));
    }

    #[tokio::test]
    async fn test_history_bounded() {
        let provider = FixedProvider::new(vec![Tool::new("a")]);
        let monitor = HealthMonitor::new(provider).with_history_capacity(3);

        for _ in 0..5 {
            monitor.perform_health_check().await;
        }

        assert_eq!(monitor.history().len(), 3);
    }

    #[tokio::test]
    async fn test_stats() {
        let provider = FixedProvider::new(vec![Tool::new("a")]);
        let monitor = HealthMonitor::new(Arc::clone(&provider) as Arc<dyn AggregateSource>);

        monitor.perform_health_check().await;
        provider.set(vec![Tool::new("a"), Tool::new("a")]);
        monitor.perform_health_check().await;
        provider.set(vec![Tool::new("x/y")]);
        monitor.perform_health_check().await;

        let stats = monitor.stats();
        assert_eq!(stats.total_checks, 3);
        assert_eq!(stats.healthy_checks, 1);
        assert_eq!(stats.warning_checks, 1);
        assert_eq!(stats.critical_checks, 1);
        assert!((stats.remediation_success_rate - 0.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_stats_empty_history_has_zero_rate() {
        let monitor = HealthMonitor::new(FixedProvider::new(Vec::new()));
        let stats = monitor.stats();
        assert_eq!(stats.total_checks, 0);
        assert_eq!(stats.remediation_success_rate, 0.0);
    }

    struct SlowProvider {
        delay: Duration,
    }

    #[async_trait]
    impl AggregateSource for SlowProvider {
        async fn current_tools(&self) -> anyhow::Result<Vec<Tool>> {
            tokio::time::sleep(self.delay).await;
            Ok(vec![Tool::new("a")])
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_skipped_while_manual_check_in_flight() {
        let provider = Arc::new(SlowProvider {
            delay: Duration::from_millis(5000),
        });
        let monitor = Arc::new(
            HealthMonitor::new(provider).with_interval(Duration::from_millis(1000)),
        );

        let manual = tokio::spawn({
            let monitor = Arc::clone(&monitor);
            async move { monitor.perform_health_check().await }
        });
        // Let the manual check take the in-flight flag before the loop starts.
        tokio::task::yield_now().await;

        monitor.start();
        tokio::time::sleep(Duration::from_millis(3500)).await;
        monitor.stop();

        let result = manual.await.unwrap();
        assert_eq!(result.status, HealthStatus::Healthy);

        // Every recurring tick raced the in-flight manual check and was
        // skipped; only the manual check reached the history.
        assert_eq!(monitor.history().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recurring_checks_and_idempotent_start() {
        let provider = FixedProvider::new(vec![Tool::new("a")]);
        let monitor = HealthMonitor::new(provider).with_interval(Duration::from_millis(1000));

        monitor.start();
        monitor.start(); // no-op
        assert!(monitor.is_running());

        tokio::time::sleep(Duration::from_millis(3500)).await;
        monitor.stop();
        assert!(!monitor.is_running());

        // Immediate check plus the recurring ticks.
        assert!(monitor.history().len() >= 3);

        // Safe when already stopped.
        monitor.stop();
    }

    #[tokio::test]
    async fn test_registry_implements_aggregate_source() {
        let registry = ToolRegistry::new();
        registry.register(Tool::new("a"), "s", None);

        let monitor = HealthMonitor::new(Arc::new(registry));
        let result = monitor.perform_health_check().await;

        assert_eq!(result.status, HealthStatus::Healthy);
        assert_eq!(result.tool_count, 1);
    }
}
