//! Background tenant config synchronizer.
//!
//! One page per step: fetch `GET /gateway/configs` with the incremental
//! `since` cursor, hand the records to the manager, then schedule the next
//! step — 100 ms away while more pages are pending, a full interval after a
//! complete pass, or an exponentially backed-off retry after a failure.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use {
    async_trait::async_trait,
    serde::Serialize,
    tokio::{sync::Mutex, task::JoinHandle},
    tracing::{debug, info, warn},
};

use clawden_tenancy::TenantManager;

use crate::{
    error::{Error, Result},
    types::ConfigPage,
};

/// Source of tenant config pages. The production impl is
/// [`crate::CloudClient`]; tests script their own.
#[async_trait]
pub trait ConfigFetcher: Send + Sync {
    async fn fetch_page(&self, since: Option<&str>, cursor: Option<&str>) -> Result<ConfigPage>;
}

/// Callback invoked when consecutive failures reach the alert threshold.
pub type AlertFn = Arc<dyn Fn(&str) + Send + Sync>;

/// Scheduling knobs for the synchronizer.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    /// Delay between complete sync passes.
    pub interval: Duration,
    /// First retry delay after a failure; doubles per consecutive failure.
    pub initial_retry_delay: Duration,
    /// Upper bound on the retry delay.
    pub max_retry_delay: Duration,
    /// Consecutive failures at which the alert callback fires.
    pub alert_threshold: u64,
    /// Delay before fetching the next page of a paginated pass.
    pub page_follow_delay: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5 * 60),
            initial_retry_delay: Duration::from_secs(1),
            max_retry_delay: Duration::from_secs(60),
            alert_threshold: 5,
            page_follow_delay: Duration::from_millis(100),
        }
    }
}

/// Result of a [`SyncService::sync_now`] invocation.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub success: bool,
    pub users_updated: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Read-only synchronizer state for stats and the CLI.
#[derive(Debug, Clone, Serialize)]
pub struct SyncStatus {
    pub running: bool,
    pub last_sync_timestamp: Option<String>,
    pub consecutive_failures: u64,
}

/// The k-th retry delay: `min(initial · 2^(k-1), max)`. A success resets
/// the sequence.
pub fn compute_retry_delay(
    initial: Duration,
    max: Duration,
    consecutive_failures: u64,
) -> Duration {
    let exp = consecutive_failures.saturating_sub(1).min(20) as u32;
    initial.checked_mul(1u32 << exp).map_or(max, |d| d.min(max))
}

#[derive(Default)]
struct SyncState {
    last_sync_timestamp: Option<String>,
    next_cursor: Option<String>,
    consecutive_failures: u64,
    in_flight: bool,
}

pub struct SyncService {
    manager: Arc<TenantManager>,
    fetcher: Arc<dyn ConfigFetcher>,
    settings: SyncSettings,
    on_alert: Option<AlertFn>,
    state: Mutex<SyncState>,
    timer_handle: Mutex<Option<JoinHandle<()>>>,
    running: AtomicBool,
}

impl SyncService {
    pub fn new(
        manager: Arc<TenantManager>,
        fetcher: Arc<dyn ConfigFetcher>,
        settings: SyncSettings,
    ) -> Arc<Self> {
        Self::with_alert(manager, fetcher, settings, None)
    }

    pub fn with_alert(
        manager: Arc<TenantManager>,
        fetcher: Arc<dyn ConfigFetcher>,
        settings: SyncSettings,
        on_alert: Option<AlertFn>,
    ) -> Arc<Self> {
        Arc::new(Self {
            manager,
            fetcher,
            settings,
            on_alert,
            state: Mutex::new(SyncState::default()),
            timer_handle: Mutex::new(None),
            running: AtomicBool::new(false),
        })
    }

    /// Start the periodic loop. The first pass runs immediately. Idempotent.
    pub async fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let svc = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut delay = Duration::ZERO;
            loop {
                if delay > Duration::ZERO {
                    tokio::time::sleep(delay).await;
                }
                if !svc.running.load(Ordering::SeqCst) {
                    break;
                }
                delay = svc.tick().await;
            }
        });
        *self.timer_handle.lock().await = Some(handle);
        info!(interval_s = self.settings.interval.as_secs(), "config sync started");
    }

    /// Cancel the periodic loop. In-flight work is not interrupted beyond
    /// its own I/O timeouts.
    pub async fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.timer_handle.lock().await.take() {
            handle.abort();
        }
        info!("config sync stopped");
    }

    /// Run a full pass (all pending pages) right now. Reentrant calls while
    /// another pass is in flight report `sync_in_progress` and change
    /// nothing.
    pub async fn sync_now(&self) -> SyncReport {
        let mut users_updated = 0;
        loop {
            match self.sync_page().await {
                Ok((applied, has_more)) => {
                    users_updated += applied;
                    if !has_more {
                        return SyncReport {
                            success: true,
                            users_updated,
                            error: None,
                        };
                    }
                },
                Err(Error::SyncInProgress) => {
                    return SyncReport {
                        success: false,
                        users_updated,
                        error: Some(Error::SyncInProgress.to_string()),
                    };
                },
                Err(e) => {
                    self.on_failure(&e).await;
                    return SyncReport {
                        success: false,
                        users_updated,
                        error: Some(e.to_string()),
                    };
                },
            }
        }
    }

    pub async fn status(&self) -> SyncStatus {
        let state = self.state.lock().await;
        SyncStatus {
            running: self.running.load(Ordering::SeqCst),
            last_sync_timestamp: state.last_sync_timestamp.clone(),
            consecutive_failures: state.consecutive_failures,
        }
    }

    // ── Internal ────────────────────────────────────────────────────────

    /// One scheduling step. Returns the delay until the next step.
    async fn tick(&self) -> Duration {
        match self.sync_page().await {
            Ok((_, true)) => self.settings.page_follow_delay,
            Ok((_, false)) => self.settings.interval,
            // Another caller (sync_now) holds the pass; check back later.
            Err(Error::SyncInProgress) => self.settings.interval,
            Err(e) => self.on_failure(&e).await,
        }
    }

    /// Fetch and apply a single page. Returns `(records_applied, has_more)`.
    async fn sync_page(&self) -> Result<(usize, bool)> {
        let (since, cursor) = {
            let mut state = self.state.lock().await;
            if state.in_flight {
                return Err(Error::SyncInProgress);
            }
            state.in_flight = true;
            (state.last_sync_timestamp.clone(), state.next_cursor.clone())
        };

        let result = self.fetcher.fetch_page(since.as_deref(), cursor.as_deref()).await;
        match result {
            Ok(page) => {
                let applied = self.manager.update_configs(&page.users).await;
                let mut state = self.state.lock().await;
                state.last_sync_timestamp = Some(page.sync_timestamp.clone());
                state.next_cursor = if page.has_more {
                    page.next_cursor.clone()
                } else {
                    None
                };
                state.consecutive_failures = 0;
                state.in_flight = false;
                debug!(applied, has_more = page.has_more, "applied sync page");
                Ok((applied, page.has_more))
            },
            Err(e) => {
                self.state.lock().await.in_flight = false;
                Err(e)
            },
        }
    }

    /// Record a failure, alert past the threshold, and return the retry
    /// delay for the next attempt.
    async fn on_failure(&self, error: &Error) -> Duration {
        let failures = {
            let mut state = self.state.lock().await;
            state.consecutive_failures += 1;
            state.consecutive_failures
        };
        self.manager.record_sync_failure(&error.to_string());

        let delay = compute_retry_delay(
            self.settings.initial_retry_delay,
            self.settings.max_retry_delay,
            failures,
        );
        warn!(
            error = %error,
            consecutive_failures = failures,
            retry_in_ms = delay.as_millis() as u64,
            "config sync failed"
        );

        if failures >= self.settings.alert_threshold {
            if let Some(ref alert) = self.on_alert {
                alert(&format!("config sync failed {failures} times: {error}"));
            }
        }
        delay
    }
}
