//! Cloud-backend integration: the HTTP client for token verification and
//! tenant config fetches, and the background synchronizer that keeps the
//! tenant manager current.

pub mod client;
pub mod error;
pub mod sync;
pub mod types;

pub use {
    client::CloudClient,
    error::{Error, Result},
    sync::{AlertFn, ConfigFetcher, SyncReport, SyncService, SyncSettings, SyncStatus},
    types::ConfigPage,
};
