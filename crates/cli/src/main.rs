mod tenant_commands;

use {
    clap::{Parser, Subcommand},
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "clawden", about = "Clawden — multi-tenant OpenClaw gateway core")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect the tenant cache.
    Tenants {
        #[command(subcommand)]
        action: TenantAction,
    },
    /// Tenant config synchronization.
    Sync {
        #[command(subcommand)]
        action: SyncAction,
    },
}

#[derive(Subcommand)]
enum TenantAction {
    /// Manager statistics (cache, counters, last sync).
    Status,
    /// List cached tenant instances.
    List,
}

#[derive(Subcommand)]
enum SyncAction {
    /// Run one sync pass against the cloud backend and print the report.
    Now,
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);
    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_telemetry(&cli);

    match cli.command {
        Commands::Tenants { action } => match action {
            TenantAction::Status => tenant_commands::status().await,
            TenantAction::List => tenant_commands::list().await,
        },
        Commands::Sync { action } => match action {
            SyncAction::Now => tenant_commands::sync_now().await,
        },
    }
}
