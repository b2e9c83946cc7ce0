//! Manager lifecycle events, fanned out over a tokio broadcast channel so
//! listeners never run under the manager lock.

use serde::Serialize;

/// Why an instance left the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EvictReason {
    Idle,
    Lru,
    Manual,
}

impl std::fmt::Display for EvictReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Lru => "lru",
            Self::Manual => "manual",
        };
        f.write_str(s)
    }
}

/// Events emitted by the tenant manager.
#[derive(Debug, Clone, PartialEq)]
pub enum TenantEvent {
    UserLoaded {
        user_id: String,
    },
    UserEvicted {
        user_id: String,
        reason: EvictReason,
    },
    UserSuspended {
        user_id: String,
    },
    UserExpired {
        user_id: String,
    },
    ConfigSynced {
        count: usize,
        timestamp: String,
    },
    SyncFailed {
        error: String,
        consecutive_failures: u64,
    },
}
