//! First-touch materialization of a tenant's directory tree and credential
//! files.
//!
//! Provisioning is idempotent for everything except the credential files,
//! which are rewritten every time so upstream key rotations reach the
//! workspace.

use std::path::Path;

use {serde_json::json, tracing::debug};

use crate::{
    bootstrap::{HEARTBEAT_FILE, USER_FILE, builtin_default},
    error::Result,
    fsutil::{create_dir_restricted, write_restricted},
    paths::TenantPaths,
};

/// Store format version for `auth-profiles.json`.
const AUTH_PROFILES_VERSION: u32 = 1;

/// Ensure the tenant's directory tree exists and its credential files are
/// current.
///
/// - `{workspace, agent, sessions, memory, custom}` are created `0700`.
/// - `agent/auth-profiles.json` and `agent/models.json` are rewritten
///   whenever an upstream key is present.
/// - `agent/openclaw.json`, `HEARTBEAT.md`, and `USER.md` are written only
///   when absent.
pub fn provision_user(
    paths: &TenantPaths,
    llm_api_key: Option<&str>,
    llm_proxy_url: &str,
) -> Result<()> {
    create_dir_restricted(&paths.workspace_path)?;
    create_dir_restricted(&paths.agent_dir)?;
    create_dir_restricted(&paths.sessions_dir)?;
    create_dir_restricted(&paths.memory_dir)?;
    create_dir_restricted(&paths.custom_dir())?;

    if let Some(key) = llm_api_key {
        write_auth_profiles(&paths.agent_dir, key, llm_proxy_url)?;
        write_models(&paths.agent_dir, llm_proxy_url)?;
    }

    write_if_absent(
        &paths.agent_dir.join("openclaw.json"),
        &user_config_stub(&paths.user_id)?,
    )?;
    write_if_absent(
        &paths.workspace_path.join(HEARTBEAT_FILE),
        builtin_default(HEARTBEAT_FILE).unwrap_or_default(),
    )?;
    write_if_absent(
        &paths.workspace_path.join(USER_FILE),
        builtin_default(USER_FILE).unwrap_or_default(),
    )?;

    debug!(user_id = %paths.user_id, "provisioned tenant workspace");
    Ok(())
}

/// `agent/auth-profiles.json`: versioned credential store with the
/// `anthropic:default` and `openai:default` profiles pointed at the
/// upstream proxy.
fn write_auth_profiles(agent_dir: &Path, key: &str, proxy_url: &str) -> Result<()> {
    let store = json!({
        "version": AUTH_PROFILES_VERSION,
        "profiles": {
            "anthropic:default": {
                "type": "api_key",
                "provider": "anthropic",
                "key": key,
                "baseURL": proxy_url,
            },
            "openai:default": {
                "type": "api_key",
                "provider": "openai",
                "key": key,
                "baseURL": proxy_url,
            },
        },
    });
    write_restricted(
        &agent_dir.join("auth-profiles.json"),
        &serde_json::to_string_pretty(&store)?,
    )
}

/// `agent/models.json`: provider → `{baseUrl}` map for the same providers.
fn write_models(agent_dir: &Path, proxy_url: &str) -> Result<()> {
    let models = json!({
        "anthropic": { "baseUrl": proxy_url },
        "openai": { "baseUrl": proxy_url },
    });
    write_restricted(
        &agent_dir.join("models.json"),
        &serde_json::to_string_pretty(&models)?,
    )
}

/// Minimal user-local config stub. Never overwritten once present.
fn user_config_stub(user_id: &str) -> Result<String> {
    let stub = json!({
        "gateway": { "managed": true, "userId": user_id },
    });
    Ok(serde_json::to_string_pretty(&stub)?)
}

fn write_if_absent(path: &Path, content: &str) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    write_restricted(path, content)
}
