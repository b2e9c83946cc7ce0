//! Multi-tenant core: tenant directory, workspace materialization, and the
//! bounded instance cache.
//!
//! One gateway process serves many end users. Each authenticated user gets a
//! cached [`TenantInstance`] backed by a provisioned on-disk workspace; the
//! [`TenantManager`] owns the cache, enforces the eviction rules (never while
//! requests are in flight), and emits lifecycle events. Upstream state
//! arrives through [`TenantManager::update_configs`] (driven by the
//! synchronizer in `clawden-cloud`) and through the [`TokenVerifier`] seam on
//! authentication cache misses.

pub mod bootstrap;
pub mod error;
pub mod events;
mod fsutil;
pub mod manager;
pub mod paths;
pub mod provision;
pub mod resolver;
pub mod store;
pub mod types;
pub mod verify;

pub use {
    error::{Error, Result},
    events::{EvictReason, TenantEvent},
    manager::{
        AuthOutcome, ManagerSettings, ManagerStats, TenantHandle, TenantInstanceInfo,
        TenantManager,
    },
    paths::{TenantPaths, sanitize_user_id},
    resolver::{Layer, WorkspaceResolver},
    types::{CloudTenantRecord, StoredTenantConfig, TenantInstance, TenantStatus, VerifiedToken},
    verify::TokenVerifier,
};
