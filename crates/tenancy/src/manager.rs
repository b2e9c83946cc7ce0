//! The tenant manager: a bounded in-memory cache of tenant instances with a
//! token index, pending-request accounting, idle/LRU eviction, and a
//! lifecycle event stream.
//!
//! All maps live behind one `RwLock`; filesystem work done under the lock is
//! synchronous and small, and the remote verify call never holds it. The
//! instance map is a `BTreeMap` so eviction scans have a stable iteration
//! order.

use std::{
    collections::{BTreeMap, HashMap},
    path::PathBuf,
    sync::{
        Arc, Mutex as StdMutex,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::Duration,
};

use {
    serde::Serialize,
    tokio::{
        sync::{Mutex, RwLock, broadcast},
        task::JoinHandle,
    },
    tracing::{debug, info, warn},
};

use clawden_common::time::{iso_now, now_ms};

use crate::{
    error::Result,
    events::{EvictReason, TenantEvent},
    paths::TenantPaths,
    provision::provision_user,
    resolver::WorkspaceResolver,
    store::{read_user_config, write_user_config},
    types::{CloudTenantRecord, StoredTenantConfig, TenantInstance, TenantStatus, VerifiedToken},
    verify::TokenVerifier,
};

/// Cleanup tick period.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(1);

/// Event channel depth; slow subscribers lag rather than block the manager.
const EVENT_CAPACITY: usize = 256;

/// Static configuration for a manager.
#[derive(Debug, Clone)]
pub struct ManagerSettings {
    pub config_root: PathBuf,
    pub workspace_root: PathBuf,
    pub template_path: Option<PathBuf>,
    /// Base URL written into provisioned credential files so tenant agents
    /// call upstream through the gateway's proxy.
    pub llm_proxy_url: String,
    pub max_cached_users: usize,
    pub user_idle_timeout_ms: u64,
}

/// Outcome of a gateway-token authentication attempt.
///
/// Authorization decisions are terminal: the core never retries them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    Authenticated { user_id: String },
    Unauthenticated { reason: String },
}

impl AuthOutcome {
    pub fn user_id(&self) -> Option<&str> {
        match self {
            Self::Authenticated { user_id } => Some(user_id),
            Self::Unauthenticated { .. } => None,
        }
    }
}

/// What request execution receives for a materialized tenant: everything it
/// needs, nothing that reaches back into the manager.
#[derive(Debug, Clone)]
pub struct TenantHandle {
    pub user_id: String,
    pub status: TenantStatus,
    pub config: serde_json::Value,
    pub workspace_path: PathBuf,
    pub agent_dir: PathBuf,
    pub resolver: WorkspaceResolver,
}

/// Read-only projection of one cached instance, for stats and the CLI.
#[derive(Debug, Clone, Serialize)]
pub struct TenantInstanceInfo {
    pub user_id: String,
    pub status: TenantStatus,
    pub pending_requests: u32,
    pub last_activity_ms: u64,
}

/// Aggregate manager statistics.
#[derive(Debug, Clone, Serialize)]
pub struct ManagerStats {
    pub active_instances: usize,
    pub max_cached_users: usize,
    pub tracked_tokens: usize,
    pub pending_requests: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub sync_failures: u64,
    pub last_sync_at: Option<String>,
}

#[derive(Default)]
struct Inner {
    instances: BTreeMap<String, TenantInstance>,
    token_index: HashMap<String, String>,
    resolvers: BTreeMap<String, WorkspaceResolver>,
}

pub struct TenantManager {
    settings: ManagerSettings,
    verifier: Option<Arc<dyn TokenVerifier>>,
    inner: RwLock<Inner>,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    sync_failures: AtomicU64,
    last_sync_at: StdMutex<Option<String>>,
    events: broadcast::Sender<TenantEvent>,
    cleanup_handle: Mutex<Option<JoinHandle<()>>>,
    running: AtomicBool,
}

impl TenantManager {
    pub fn new(
        settings: ManagerSettings,
        verifier: Option<Arc<dyn TokenVerifier>>,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Arc::new(Self {
            settings,
            verifier,
            inner: RwLock::new(Inner::default()),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            sync_failures: AtomicU64::new(0),
            last_sync_at: StdMutex::new(None),
            events,
            cleanup_handle: Mutex::new(None),
            running: AtomicBool::new(false),
        })
    }

    /// Subscribe to lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<TenantEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: TenantEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    // ── Lifecycle ────────────────────────────────────────────────────────

    /// Start the periodic cleanup tick. Idempotent.
    pub async fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let manager = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                if !manager.running.load(Ordering::SeqCst) {
                    break;
                }
                manager.cleanup_inactive().await;
            }
        });
        *self.cleanup_handle.lock().await = Some(handle);
        info!(
            max_cached_users = self.settings.max_cached_users,
            idle_timeout_ms = self.settings.user_idle_timeout_ms,
            "tenant manager started"
        );
    }

    /// Cancel the cleanup tick. Cached instances stay resident for graceful
    /// drain.
    pub async fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.cleanup_handle.lock().await.take() {
            handle.abort();
        }
        info!("tenant manager stopped");
    }

    // ── Authentication ───────────────────────────────────────────────────

    /// Resolve a gateway token to a user.
    ///
    /// Indexed tokens are served from the cache (materializing from disk if
    /// the instance was evicted); unknown tokens go to the remote verifier.
    /// Malformed upstream data never panics — it logs and denies.
    pub async fn authenticate_token(&self, token: &str) -> AuthOutcome {
        {
            let mut inner = self.inner.write().await;
            if let Some(user_id) = inner.token_index.get(token).cloned() {
                if !inner.instances.contains_key(&user_id) {
                    if let Err(e) = self.load_instance_locked(&mut inner, &user_id) {
                        warn!(user_id = %user_id, error = %e, "failed to rematerialize tenant");
                    }
                }
                if let Some(instance) = inner.instances.get_mut(&user_id) {
                    self.cache_hits.fetch_add(1, Ordering::Relaxed);
                    let status = instance.status;
                    instance.last_activity_ms = now_ms();
                    drop(inner);
                    return self.outcome_for_status(&user_id, status);
                }
                // Index entry with nothing behind it; fall through to verify.
            }
        }

        self.cache_misses.fetch_add(1, Ordering::Relaxed);
        let Some(verifier) = self.verifier.as_ref() else {
            warn!("gateway token unknown and no verifier is configured");
            return AuthOutcome::Unauthenticated {
                reason: "verification unavailable".into(),
            };
        };
        match verifier.verify_token(token).await {
            Ok(Some(verified)) => self.admit_verified(token, verified).await,
            Ok(None) => AuthOutcome::Unauthenticated {
                reason: "gateway token rejected".into(),
            },
            Err(e) => {
                warn!(error = %e, "token verification failed");
                AuthOutcome::Unauthenticated {
                    reason: "verification unavailable".into(),
                }
            },
        }
    }

    fn outcome_for_status(&self, user_id: &str, status: TenantStatus) -> AuthOutcome {
        match status {
            TenantStatus::Active => AuthOutcome::Authenticated {
                user_id: user_id.to_string(),
            },
            TenantStatus::Suspended => {
                self.emit(TenantEvent::UserSuspended {
                    user_id: user_id.to_string(),
                });
                AuthOutcome::Unauthenticated {
                    reason: "user suspended".into(),
                }
            },
            TenantStatus::Expired => {
                self.emit(TenantEvent::UserExpired {
                    user_id: user_id.to_string(),
                });
                AuthOutcome::Unauthenticated {
                    reason: "user expired".into(),
                }
            },
        }
    }

    /// Persist, provision, and cache a tenant admitted by remote verification.
    async fn admit_verified(&self, token: &str, verified: VerifiedToken) -> AuthOutcome {
        let paths = match self.paths_for(&verified.user_id) {
            Ok(paths) => paths,
            Err(e) => {
                warn!(error = %e, "verify returned an unusable user id");
                return AuthOutcome::Unauthenticated {
                    reason: "invalid user id".into(),
                };
            },
        };

        let stored = StoredTenantConfig {
            user_id: paths.user_id.clone(),
            gateway_token: Some(token.to_string()),
            status: verified.status,
            config: verified.config,
            llm_api_key: None,
            updated_at: Some(iso_now()),
        };

        let mut inner = self.inner.write().await;
        // A concurrent authenticator may have admitted this token while we
        // were awaiting the verifier.
        if !inner.instances.contains_key(&paths.user_id) {
            if let Err(e) = write_user_config(&paths.config_path, &stored) {
                warn!(user_id = %paths.user_id, error = %e, "failed to persist tenant config");
                return AuthOutcome::Unauthenticated {
                    reason: "storage failure".into(),
                };
            }
            if let Err(e) = provision_user(&paths, None, &self.settings.llm_proxy_url) {
                warn!(user_id = %paths.user_id, error = %e, "failed to provision tenant workspace");
                return AuthOutcome::Unauthenticated {
                    reason: "storage failure".into(),
                };
            }
            self.insert_locked(&mut inner, &paths, &stored);
            drop(inner);
            self.emit(TenantEvent::UserLoaded {
                user_id: paths.user_id.clone(),
            });
            info!(user_id = %paths.user_id, "tenant loaded via token verification");
        } else {
            inner
                .token_index
                .insert(token.to_string(), paths.user_id.clone());
            drop(inner);
        }

        self.outcome_for_status(&paths.user_id, verified.status)
    }

    // ── Instance access ──────────────────────────────────────────────────

    /// Cache-or-load a tenant. `Ok(None)` when no on-disk config exists;
    /// an invalid id is an error at the call site.
    pub async fn get_instance(&self, user_id: &str) -> Result<Option<TenantHandle>> {
        let paths = self.paths_for(user_id)?;
        let mut loaded = false;

        let mut guard = self.inner.write().await;
        let inner = &mut *guard;
        if !inner.instances.contains_key(&paths.user_id) {
            if !self.load_instance_locked(inner, &paths.user_id)? {
                return Ok(None);
            }
            loaded = true;
        }
        let Some(instance) = inner.instances.get_mut(&paths.user_id) else {
            return Ok(None);
        };
        instance.last_activity_ms = now_ms();
        let handle = TenantHandle {
            user_id: paths.user_id.clone(),
            status: instance.status,
            config: instance.config.clone(),
            workspace_path: instance.workspace_path.clone(),
            agent_dir: paths.agent_dir.clone(),
            resolver: inner
                .resolvers
                .get(&paths.user_id)
                .cloned()
                .unwrap_or_else(|| self.resolver_for(&paths)),
        };
        drop(guard);

        if loaded {
            self.emit(TenantEvent::UserLoaded {
                user_id: paths.user_id,
            });
        }
        Ok(Some(handle))
    }

    /// Materialize an instance from its on-disk config. Caller holds the
    /// write lock. Returns `false` when nothing is on disk.
    fn load_instance_locked(&self, inner: &mut Inner, user_id: &str) -> Result<bool> {
        let paths = self.paths_for(user_id)?;
        let Some(stored) = read_user_config(&paths.config_path)? else {
            return Ok(false);
        };
        provision_user(
            &paths,
            stored.llm_api_key.as_deref(),
            &self.settings.llm_proxy_url,
        )?;
        self.insert_locked(inner, &paths, &stored);
        debug!(user_id = %paths.user_id, "tenant materialized from disk");
        Ok(true)
    }

    fn insert_locked(&self, inner: &mut Inner, paths: &TenantPaths, stored: &StoredTenantConfig) {
        if let Some(ref token) = stored.gateway_token {
            inner
                .token_index
                .insert(token.clone(), paths.user_id.clone());
        }
        inner.instances.insert(
            paths.user_id.clone(),
            TenantInstance {
                user_id: paths.user_id.clone(),
                status: stored.status,
                config: stored.config.clone(),
                llm_api_key: stored.llm_api_key.clone(),
                workspace_path: paths.workspace_path.clone(),
                config_path: paths.config_path.clone(),
                last_activity_ms: now_ms(),
                pending_requests: 0,
            },
        );
        inner
            .resolvers
            .insert(paths.user_id.clone(), self.resolver_for(paths));
    }

    fn resolver_for(&self, paths: &TenantPaths) -> WorkspaceResolver {
        WorkspaceResolver::new(
            paths.user_id.clone(),
            paths.workspace_path.clone(),
            self.settings.template_path.clone(),
        )
    }

    fn paths_for(&self, raw_user_id: &str) -> Result<TenantPaths> {
        TenantPaths::resolve(
            &self.settings.config_root,
            &self.settings.workspace_root,
            raw_user_id,
        )
    }

    // ── Sync application ─────────────────────────────────────────────────

    /// Apply a batch of upstream tenant records: refresh the token index,
    /// persist each config, and patch any cached instance in place. A
    /// failing record is logged and skipped; the batch proceeds.
    ///
    /// Returns the number of records applied.
    pub async fn update_configs(&self, records: &[CloudTenantRecord]) -> usize {
        let mut applied = 0;
        {
            let mut inner = self.inner.write().await;
            for record in records {
                let paths = match self.paths_for(&record.user_id) {
                    Ok(paths) => paths,
                    Err(e) => {
                        warn!(user_id = %record.user_id, error = %e, "skipping record with invalid user id");
                        continue;
                    },
                };

                // Token re-binding severs the prior (user, token) link.
                if let Some(prev) = inner
                    .token_index
                    .insert(record.gateway_token.clone(), paths.user_id.clone())
                {
                    if prev != paths.user_id {
                        debug!(from = %prev, to = %paths.user_id, "gateway token re-bound");
                    }
                }

                let stored = StoredTenantConfig {
                    user_id: paths.user_id.clone(),
                    gateway_token: Some(record.gateway_token.clone()),
                    status: record.status,
                    config: record.openclaw_config.clone(),
                    llm_api_key: record.llm_api_key.clone(),
                    updated_at: Some(record.updated_at.clone()),
                };
                if let Err(e) = write_user_config(&paths.config_path, &stored) {
                    warn!(user_id = %paths.user_id, error = %e, "failed to persist tenant config, skipping");
                    continue;
                }

                // Patch in place so concurrent requests never observe a torn
                // instance. Sync is not user activity; the idle clock keeps
                // running.
                if let Some(instance) = inner.instances.get_mut(&paths.user_id) {
                    instance.status = record.status;
                    instance.config = record.openclaw_config.clone();
                    instance.llm_api_key = record.llm_api_key.clone();
                    if record.llm_api_key.is_some() {
                        if let Err(e) = provision_user(
                            &paths,
                            record.llm_api_key.as_deref(),
                            &self.settings.llm_proxy_url,
                        ) {
                            warn!(user_id = %paths.user_id, error = %e, "failed to refresh credentials");
                        }
                    }
                }

                applied += 1;
            }
        }

        let timestamp = iso_now();
        {
            let mut last = self.last_sync_at.lock().unwrap_or_else(|e| e.into_inner());
            *last = Some(timestamp.clone());
        }
        self.sync_failures.store(0, Ordering::Relaxed);
        self.emit(TenantEvent::ConfigSynced {
            count: applied,
            timestamp,
        });
        debug!(count = applied, "applied tenant config batch");
        applied
    }

    /// Record a failed sync attempt. Returns the consecutive-failure count.
    pub fn record_sync_failure(&self, message: &str) -> u64 {
        let failures = self.sync_failures.fetch_add(1, Ordering::Relaxed) + 1;
        self.emit(TenantEvent::SyncFailed {
            error: message.to_string(),
            consecutive_failures: failures,
        });
        failures
    }

    // ── Pending-request accounting ───────────────────────────────────────

    /// Mark a request in flight for `user_id`. Returns `false` when the
    /// tenant is not cached.
    pub async fn increment_pending(&self, user_id: &str) -> bool {
        let mut inner = self.inner.write().await;
        let Some(instance) = inner.instances.get_mut(user_id) else {
            return false;
        };
        instance.pending_requests += 1;
        instance.last_activity_ms = now_ms();
        true
    }

    /// Mark a request finished. A decrement with no matching increment is a
    /// logged no-op.
    pub async fn decrement_pending(&self, user_id: &str) -> bool {
        let mut inner = self.inner.write().await;
        let Some(instance) = inner.instances.get_mut(user_id) else {
            return false;
        };
        if instance.pending_requests == 0 {
            debug!(user_id, "decrement on zero pending counter");
        } else {
            instance.pending_requests -= 1;
        }
        instance.last_activity_ms = now_ms();
        true
    }

    // ── Eviction ─────────────────────────────────────────────────────────

    /// Two-pass eviction under one lock acquisition: idle instances first,
    /// then LRU down to the cache cap. Instances with in-flight requests
    /// are never touched.
    pub async fn cleanup_inactive(&self) {
        let now = now_ms();
        let mut evicted: Vec<(String, EvictReason)> = Vec::new();
        {
            let mut inner = self.inner.write().await;

            let idle: Vec<String> = inner
                .instances
                .iter()
                .filter(|(_, i)| {
                    i.pending_requests == 0
                        && now.saturating_sub(i.last_activity_ms)
                            > self.settings.user_idle_timeout_ms
                })
                .map(|(id, _)| id.clone())
                .collect();
            for user_id in idle {
                Self::remove_locked(&mut inner, &user_id);
                evicted.push((user_id, EvictReason::Idle));
            }

            while inner.instances.len() > self.settings.max_cached_users {
                // min_by_key keeps the first of equal elements, so ties go to
                // the first in iteration order.
                let Some(oldest) = inner
                    .instances
                    .iter()
                    .filter(|(_, i)| i.pending_requests == 0)
                    .min_by_key(|(_, i)| i.last_activity_ms)
                    .map(|(id, _)| id.clone())
                else {
                    // Everything above the cap has pending work.
                    break;
                };
                Self::remove_locked(&mut inner, &oldest);
                evicted.push((oldest, EvictReason::Lru));
            }
        }

        for (user_id, reason) in evicted {
            info!(user_id = %user_id, reason = %reason, "evicted tenant");
            self.emit(TenantEvent::UserEvicted { user_id, reason });
        }
    }

    /// Explicit eviction. Refuses when the tenant has in-flight requests
    /// unless `override_pending` is set. Returns whether anything was
    /// removed.
    pub async fn force_evict(&self, user_id: &str, override_pending: bool) -> bool {
        {
            let mut inner = self.inner.write().await;
            let Some(instance) = inner.instances.get(user_id) else {
                return false;
            };
            if instance.pending_requests > 0 && !override_pending {
                warn!(
                    user_id,
                    pending = instance.pending_requests,
                    "refusing to evict tenant with in-flight requests"
                );
                return false;
            }
            Self::remove_locked(&mut inner, user_id);
        }
        info!(user_id, "tenant force-evicted");
        self.emit(TenantEvent::UserEvicted {
            user_id: user_id.to_string(),
            reason: EvictReason::Manual,
        });
        true
    }

    fn remove_locked(inner: &mut Inner, user_id: &str) {
        inner.instances.remove(user_id);
        inner.resolvers.remove(user_id);
        inner.token_index.retain(|_, uid| uid != user_id);
    }

    // ── Read-only projections ────────────────────────────────────────────

    pub async fn stats(&self) -> ManagerStats {
        let inner = self.inner.read().await;
        ManagerStats {
            active_instances: inner.instances.len(),
            max_cached_users: self.settings.max_cached_users,
            tracked_tokens: inner.token_index.len(),
            pending_requests: inner
                .instances
                .values()
                .map(|i| u64::from(i.pending_requests))
                .sum(),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            sync_failures: self.sync_failures.load(Ordering::Relaxed),
            last_sync_at: self
                .last_sync_at
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .clone(),
        }
    }

    pub async fn list_instances(&self) -> Vec<TenantInstanceInfo> {
        let inner = self.inner.read().await;
        inner
            .instances
            .values()
            .map(|i| TenantInstanceInfo {
                user_id: i.user_id.clone(),
                status: i.status,
                pending_requests: i.pending_requests,
                last_activity_ms: i.last_activity_ms,
            })
            .collect()
    }

    pub async fn has_token(&self, token: &str) -> bool {
        self.inner.read().await.token_index.contains_key(token)
    }

    pub async fn is_cached(&self, user_id: &str) -> bool {
        self.inner.read().await.instances.contains_key(user_id)
    }

    pub async fn cached_user_ids(&self) -> Vec<String> {
        self.inner.read().await.instances.keys().cloned().collect()
    }

    /// Count the tenants known on disk (provisioned config directories),
    /// independent of what is cached.
    pub fn count_known_users(&self) -> usize {
        let users_dir = self.settings.config_root.join("users");
        match std::fs::read_dir(&users_dir) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .filter(|e| e.path().is_dir())
                .count(),
            Err(_) => 0,
        }
    }
}
