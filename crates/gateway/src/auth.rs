//! Gateway-token authentication for inbound connections.
//!
//! A connection can offer a gateway token three ways; the first present
//! wins: the `gatewayToken` field of the connect payload, the
//! `X-Gateway-Token` header, then an `Authorization: Bearer` header. When a
//! token is offered, multi-tenant authentication is the only path — a bad
//! token rejects the connection outright rather than falling back to the
//! single-user login.

use std::sync::Arc;

use tracing::{debug, info};

use clawden_tenancy::{AuthOutcome, TenantManager};

/// Rejection reason surfaced to the connection layer.
pub const GATEWAY_TOKEN_INVALID: &str = "gateway_token_invalid";

/// Outcome of connect-time gateway authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Token resolved to an active tenant.
    Tenant { user_id: String },
    /// Token offered but not accepted. No fallback.
    Rejected { reason: &'static str },
    /// No gateway token offered; the caller defers to single-user auth.
    NoGatewayToken,
}

/// Pick the gateway token out of the connect inputs, if any.
pub fn extract_gateway_token(
    connect_token: Option<&str>,
    gateway_token_header: Option<&str>,
    authorization_header: Option<&str>,
) -> Option<String> {
    if let Some(token) = non_empty(connect_token) {
        return Some(token);
    }
    if let Some(token) = non_empty(gateway_token_header) {
        return Some(token);
    }
    bearer_token(authorization_header?)
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

fn bearer_token(header: &str) -> Option<String> {
    let (scheme, rest) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    non_empty(Some(rest))
}

/// Thin connect-time façade over the tenant manager.
#[derive(Clone)]
pub struct TokenAuthenticator {
    manager: Arc<TenantManager>,
}

impl TokenAuthenticator {
    pub fn new(manager: Arc<TenantManager>) -> Self {
        Self { manager }
    }

    /// Authenticate a connection's gateway token, if it offered one.
    pub async fn authenticate(
        &self,
        connect_token: Option<&str>,
        gateway_token_header: Option<&str>,
        authorization_header: Option<&str>,
    ) -> Decision {
        let Some(token) =
            extract_gateway_token(connect_token, gateway_token_header, authorization_header)
        else {
            debug!("no gateway token offered, deferring to single-user auth");
            return Decision::NoGatewayToken;
        };

        match self.manager.authenticate_token(&token).await {
            AuthOutcome::Authenticated { user_id } => {
                info!(user_id = %user_id, "gateway token authenticated");
                Decision::Tenant { user_id }
            },
            AuthOutcome::Unauthenticated { reason } => {
                info!(reason = %reason, "gateway token rejected");
                Decision::Rejected {
                    reason: GATEWAY_TOKEN_INVALID,
                }
            },
        }
    }
}
