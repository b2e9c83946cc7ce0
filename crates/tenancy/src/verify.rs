//! Seam between the manager and the remote verification transport.

use async_trait::async_trait;

use crate::{error::Result, types::VerifiedToken};

/// Remote token verification, called by the manager on a cache miss.
///
/// `Ok(None)` means the backend rejected the token (401); `Err` is a
/// transport failure. Implementations must bound their own I/O (the cloud
/// client uses a ~5 s timeout) — the manager never holds its lock across
/// this call.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify_token(&self, token: &str) -> Result<Option<VerifiedToken>>;
}
