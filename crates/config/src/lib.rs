//! Global OpenClaw configuration: discovery, JSON5 parsing, multi-tenant block.
//!
//! Search order (first existing wins):
//! 1. `$OPENCLAW_GLOBAL_CONFIG`
//! 2. `/etc/openclaw/config.json`
//! 3. `~/.clawdbot/openclaw.json`
//! 4. `~/.openclaw/openclaw.json`
//!
//! Files are parsed permissively (JSON5: comments and trailing commas allowed).
//! The multi-tenant block is optional; when absent or `enabled=false` the
//! multi-tenant core is inert and [`MultiTenantConfig::resolve`] reports
//! unavailability.

pub mod error;
pub mod loader;
pub mod schema;

pub use {
    error::{Error, Result},
    loader::{find_global_config_file, load_global, load_global_from, reset_cache},
    schema::{GlobalConfig, MultiTenantConfig, ResolvedMultiTenant},
};
