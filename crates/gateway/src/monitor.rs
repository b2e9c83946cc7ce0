//! Periodic health monitor over the tenant manager.
//!
//! Each tick samples manager stats and process memory, evaluates the alert
//! thresholds, and forwards anything notable to the alert sink. A second
//! task follows the manager's event stream to log tenant lifecycle
//! transitions and elevate repeated sync failures.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use {
    serde::Serialize,
    tokio::{sync::Mutex, task::JoinHandle},
    tracing::{debug, error, info, warn},
};

use clawden_tenancy::{ManagerStats, TenantEvent, TenantManager};

/// Alert severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

/// A threshold or lifecycle alert produced by the monitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorAlert {
    pub severity: Severity,
    pub message: String,
}

/// Where alerts go. Defaults to the log when no sink is configured.
pub type AlertSink = Arc<dyn Fn(MonitorAlert) + Send + Sync>;

#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub interval: Duration,
    /// Alert when process RSS exceeds this many MB.
    pub heap_alert_mb: u64,
    /// Alert when cached instances exceed this percentage of known users.
    pub utilization_alert_pct: u64,
    /// Alert when the manager's sync-failure counter reaches this value.
    pub sync_failure_alert: u64,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            heap_alert_mb: 2048,
            utilization_alert_pct: 90,
            sync_failure_alert: 3,
        }
    }
}

/// Evaluate the thresholds against one sample. Pure; the tick loop feeds it.
fn evaluate_thresholds(
    stats: &ManagerStats,
    known_users: usize,
    process_rss_mb: Option<u64>,
    settings: &MonitorSettings,
) -> Vec<MonitorAlert> {
    let mut alerts = Vec::new();

    if let Some(rss_mb) = process_rss_mb {
        if rss_mb > settings.heap_alert_mb {
            let severity = if rss_mb > settings.heap_alert_mb * 2 {
                Severity::Critical
            } else {
                Severity::Warning
            };
            alerts.push(MonitorAlert {
                severity,
                message: format!(
                    "process memory {rss_mb} MB exceeds the {} MB threshold",
                    settings.heap_alert_mb
                ),
            });
        }
    }

    if known_users > 0 {
        let pct = stats.active_instances as u64 * 100 / known_users as u64;
        if pct > settings.utilization_alert_pct {
            alerts.push(MonitorAlert {
                severity: Severity::Warning,
                message: format!(
                    "{} of {} known tenants are resident ({pct}%)",
                    stats.active_instances, known_users
                ),
            });
        }
    }

    if settings.sync_failure_alert > 0 && stats.sync_failures >= settings.sync_failure_alert {
        alerts.push(MonitorAlert {
            severity: Severity::Error,
            message: format!("config sync has failed {} times in a row", stats.sync_failures),
        });
    }

    alerts
}

pub struct TenantMonitor {
    manager: Arc<TenantManager>,
    settings: MonitorSettings,
    sink: Option<AlertSink>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    running: AtomicBool,
}

impl TenantMonitor {
    pub fn new(
        manager: Arc<TenantManager>,
        settings: MonitorSettings,
        sink: Option<AlertSink>,
    ) -> Arc<Self> {
        Arc::new(Self {
            manager,
            settings,
            sink,
            handles: Mutex::new(Vec::new()),
            running: AtomicBool::new(false),
        })
    }

    /// Start the sampling tick and the event follower. Idempotent.
    pub async fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }

        let mut handles = self.handles.lock().await;

        let monitor = Arc::clone(self);
        handles.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval(monitor.settings.interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                if !monitor.running.load(Ordering::SeqCst) {
                    break;
                }
                monitor.sample().await;
            }
        }));

        let monitor = Arc::clone(self);
        let mut events = self.manager.subscribe();
        handles.push(tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => monitor.observe_event(&event),
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(missed, "monitor lagged behind manager events");
                    },
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        }));

        info!(
            interval_s = self.settings.interval.as_secs(),
            "tenant monitor started"
        );
    }

    pub async fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        for handle in self.handles.lock().await.drain(..) {
            handle.abort();
        }
        info!("tenant monitor stopped");
    }

    /// Take one sample and emit any threshold alerts.
    pub async fn sample(&self) {
        let stats = self.manager.stats().await;
        let known_users = self.manager.count_known_users();
        let rss_mb = process_rss_mb();
        debug!(
            active = stats.active_instances,
            known = known_users,
            rss_mb = rss_mb.unwrap_or(0),
            hits = stats.cache_hits,
            misses = stats.cache_misses,
            "monitor sample"
        );

        for alert in evaluate_thresholds(&stats, known_users, rss_mb, &self.settings) {
            self.emit(alert);
        }
    }

    fn observe_event(&self, event: &TenantEvent) {
        match event {
            TenantEvent::UserLoaded { user_id } => {
                info!(user_id = %user_id, "tenant loaded");
            },
            TenantEvent::UserEvicted { user_id, reason } => {
                info!(user_id = %user_id, reason = %reason, "tenant evicted");
            },
            TenantEvent::UserSuspended { user_id } => {
                warn!(user_id = %user_id, "suspended tenant attempted authentication");
            },
            TenantEvent::UserExpired { user_id } => {
                warn!(user_id = %user_id, "expired tenant attempted authentication");
            },
            TenantEvent::ConfigSynced { count, timestamp } => {
                debug!(count, timestamp = %timestamp, "config sync applied");
            },
            TenantEvent::SyncFailed {
                error,
                consecutive_failures,
            } => {
                if *consecutive_failures >= self.settings.sync_failure_alert {
                    self.emit(MonitorAlert {
                        severity: Severity::Error,
                        message: format!(
                            "config sync failing ({consecutive_failures} consecutive): {error}"
                        ),
                    });
                } else {
                    warn!(error = %error, consecutive_failures, "config sync failed");
                }
            },
        }
    }

    fn emit(&self, alert: MonitorAlert) {
        match alert.severity {
            Severity::Info => info!("{}", alert.message),
            Severity::Warning => warn!("{}", alert.message),
            Severity::Error | Severity::Critical => error!("{}", alert.message),
        }
        if let Some(ref sink) = self.sink {
            sink(alert);
        }
    }
}

/// Resident set size of this process in MB, when the platform reports it.
fn process_rss_mb() -> Option<u64> {
    let pid = sysinfo::get_current_pid().ok()?;
    let mut sys = sysinfo::System::new();
    sys.refresh_processes(sysinfo::ProcessesToUpdate::Some(&[pid]), true);
    sys.process(pid).map(|p| p.memory() / (1024 * 1024))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn stats(active: usize, sync_failures: u64) -> ManagerStats {
        ManagerStats {
            active_instances: active,
            max_cached_users: 100,
            tracked_tokens: active,
            pending_requests: 0,
            cache_hits: 0,
            cache_misses: 0,
            sync_failures,
            last_sync_at: None,
        }
    }

    #[test]
    fn quiet_system_raises_nothing() {
        let alerts = evaluate_thresholds(&stats(5, 0), 100, Some(100), &MonitorSettings::default());
        assert!(alerts.is_empty());
    }

    #[test]
    fn memory_threshold_escalates_to_critical() {
        let settings = MonitorSettings {
            heap_alert_mb: 1024,
            ..Default::default()
        };
        let warning = evaluate_thresholds(&stats(0, 0), 0, Some(1500), &settings);
        assert_eq!(warning.len(), 1);
        assert_eq!(warning[0].severity, Severity::Warning);

        let critical = evaluate_thresholds(&stats(0, 0), 0, Some(3000), &settings);
        assert_eq!(critical[0].severity, Severity::Critical);

        // No sample, no alert.
        assert!(evaluate_thresholds(&stats(0, 0), 0, None, &settings).is_empty());
    }

    #[test]
    fn utilization_threshold() {
        let settings = MonitorSettings {
            utilization_alert_pct: 90,
            ..Default::default()
        };
        assert!(evaluate_thresholds(&stats(90, 0), 100, None, &settings).is_empty());
        let alerts = evaluate_thresholds(&stats(95, 0), 100, None, &settings);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].severity, Severity::Warning);
        assert!(alerts[0].message.contains("95"));
    }

    #[test]
    fn sync_failures_alert_at_threshold() {
        let settings = MonitorSettings {
            sync_failure_alert: 3,
            ..Default::default()
        };
        assert!(evaluate_thresholds(&stats(0, 2), 10, None, &settings).is_empty());
        let alerts = evaluate_thresholds(&stats(0, 3), 10, None, &settings);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].severity, Severity::Error);
    }
}
