//! Gateway-facing multi-tenant pieces.
//!
//! The connection layer (WebSocket framing, single-user auth) lives
//! elsewhere; this crate supplies what it needs to serve many tenants:
//! gateway-token extraction and the no-fallback authentication decision, and
//! the periodic monitor that watches the tenant manager.

pub mod auth;
pub mod monitor;

pub use {
    auth::{Decision, TokenAuthenticator, extract_gateway_token},
    monitor::{MonitorAlert, MonitorSettings, Severity, TenantMonitor},
};
