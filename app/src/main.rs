use clap::Parser;
use dietdash::{describe_error, dispatch, failure_summary, render, Cli};
use dietdash_core::config::{data_dir, Deployment, GatewayConfig};
use dietdash_core::{telemetry, ApiGateway, FileCredentialStore, SessionEvent};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::runtime::Runtime;
use tracing::{debug, error};

fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    if let Err(err) = telemetry::init_tracing(None) {
        eprintln!("failed to initialise logging: {err}");
    }

    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            error!(%err, "command failed");
            eprintln!("{}", describe_error(&err));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let deployment = if cli.co_hosted {
        Deployment::CoHosted
    } else {
        Deployment::Development
    };
    let mut config = GatewayConfig::load(cli.api_url.as_deref(), deployment)
        .map_err(|err| anyhow::anyhow!(err.user_message()))?;
    config.demo_mode |= cli.demo;

    let store = FileCredentialStore::open(&data_dir())?;
    debug!(path = %store.path().display(), "credential store opened");
    let (gateway, mut events) = ApiGateway::connect(config, Arc::new(store))?;

    let runtime = Runtime::new()?;
    let outcome = runtime.block_on(dispatch(&gateway, cli.command));

    while let Ok(event) = events.try_recv() {
        match event {
            SessionEvent::LoginRequired { .. } => {
                eprintln!("Session expired. Run `dietdash login` to sign in again.");
            }
            other => debug!(?other, "session event"),
        }
    }

    let envelope = outcome?;
    println!("{}", render(&envelope));
    Ok(match failure_summary(&envelope) {
        Some(summary) => {
            eprintln!("{summary}");
            ExitCode::FAILURE
        }
        None => ExitCode::SUCCESS,
    })
}
