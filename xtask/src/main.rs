use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use dietdash_core::{telemetry, ApiGateway, GatewayConfig, MemoryCredentialStore};
use std::sync::Arc;
use tokio::runtime::Runtime;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "xtask", version, about = "Automation helpers for Dietdash")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Drive the gateway in demo mode through login, dashboard and food listing.
    Smoke,
}

fn main() -> Result<()> {
    telemetry::init_tracing(Some(EnvFilter::new("info")))?;
    let cli = Cli::parse();

    match cli.command {
        Commands::Smoke => smoke_test(),
    }
}

fn smoke_test() -> Result<()> {
    let runtime = Runtime::new()?;
    let store = MemoryCredentialStore::new();
    let (gateway, _events) = ApiGateway::connect(GatewayConfig::demo(), Arc::new(store.clone()))?;

    runtime.block_on(async {
        let login = gateway.login_with_test_account().await?;
        if !login.is_success() || !gateway.session().is_authenticated() {
            bail!("demo login did not establish a session");
        }

        let dashboard = gateway.dashboard().await?;
        let calories = dashboard
            .data
            .as_ref()
            .and_then(|data| data["today_nutrition"]["total_calories"].as_i64());
        info!(?calories, "dashboard loaded");

        let foods = gateway.list_foods(1, 20, None).await?;
        info!(
            "pagination" = ?foods.pagination,
            "food list loaded"
        );
        Ok::<(), anyhow::Error>(())
    })?;

    info!(empty = store.is_empty(), "smoke test finished");
    Ok(())
}
