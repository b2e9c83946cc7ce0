//! Read-only commands over the tenant manager and synchronizer.

use std::sync::Arc;

use anyhow::bail;

use {
    clawden_cloud::{CloudClient, SyncService, SyncSettings},
    clawden_config::ResolvedMultiTenant,
    clawden_tenancy::{ManagerSettings, TenantManager},
};

/// Resolve the multi-tenant block from the global config, or exit with a
/// clear message when the feature is off.
fn resolve_multi_tenant() -> anyhow::Result<ResolvedMultiTenant> {
    let config = clawden_config::load_global();
    let Some(block) = config.multi_tenant else {
        bail!("multi-tenant mode is not enabled (no multiTenant block in the global config)");
    };
    Ok(block.resolve()?)
}

fn build_stack(
    resolved: &ResolvedMultiTenant,
) -> (Arc<TenantManager>, Arc<SyncService>) {
    let client = Arc::new(CloudClient::new(
        resolved.cloud_backend_url.clone(),
        resolved.service_token.clone(),
    ));
    let manager = TenantManager::new(
        ManagerSettings {
            config_root: resolved.config_root.clone(),
            workspace_root: resolved.workspace_root.clone(),
            template_path: resolved.template_path.clone(),
            llm_proxy_url: resolved.cloud_backend_url.clone(),
            max_cached_users: resolved.max_cached_users,
            user_idle_timeout_ms: resolved.user_idle_timeout_ms,
        },
        Some(client.clone()),
    );
    let sync = SyncService::new(Arc::clone(&manager), client, SyncSettings::default());
    (manager, sync)
}

pub async fn status() -> anyhow::Result<()> {
    let resolved = resolve_multi_tenant()?;
    let (manager, sync) = build_stack(&resolved);

    let stats = manager.stats().await;
    let sync_status = sync.status().await;
    let known = manager.count_known_users();

    println!("cloud backend:     {}", resolved.cloud_backend_url);
    println!("config root:       {}", resolved.config_root.display());
    println!("workspace root:    {}", resolved.workspace_root.display());
    println!(
        "cached instances:  {} / {} (cap)",
        stats.active_instances, stats.max_cached_users
    );
    println!("known tenants:     {known}");
    println!("tracked tokens:    {}", stats.tracked_tokens);
    println!("pending requests:  {}", stats.pending_requests);
    println!(
        "cache hits/misses: {} / {}",
        stats.cache_hits, stats.cache_misses
    );
    println!("sync failures:     {}", stats.sync_failures);
    println!(
        "last sync:         {}",
        stats.last_sync_at.as_deref().unwrap_or("never")
    );
    println!(
        "sync cursor:       {}",
        sync_status.last_sync_timestamp.as_deref().unwrap_or("none")
    );
    Ok(())
}

pub async fn list() -> anyhow::Result<()> {
    let resolved = resolve_multi_tenant()?;
    let (manager, _sync) = build_stack(&resolved);

    let instances = manager.list_instances().await;
    if instances.is_empty() {
        println!("no tenants cached (a fresh process starts empty; see `clawden tenants status`)");
        return Ok(());
    }
    println!(
        "{:<32} {:<10} {:>8} {:>16}",
        "USER", "STATUS", "PENDING", "LAST ACTIVITY"
    );
    for info in instances {
        println!(
            "{:<32} {:<10} {:>8} {:>16}",
            info.user_id,
            info.status.to_string(),
            info.pending_requests,
            info.last_activity_ms
        );
    }
    Ok(())
}

pub async fn sync_now() -> anyhow::Result<()> {
    let resolved = resolve_multi_tenant()?;
    let (_manager, sync) = build_stack(&resolved);

    let report = sync.sync_now().await;
    println!("{}", serde_json::to_string_pretty(&report)?);
    if !report.success {
        bail!("sync failed");
    }
    Ok(())
}
