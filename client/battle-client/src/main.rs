use std::io::BufRead;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::mpsc;

use battle_client::config::Config;
use battle_client::metrics::render_metrics;
use battle_client::presentation::{parse_command, TerminalNavigator, TerminalPresenter};
use battle_client::services::{BattleController, CredentialStore, HttpGameApi, UserAction};
use battle_client::telemetry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("Failed to load configuration")?;
    let provider = telemetry::init_tracing(&config.log, &config.telemetry)?;

    tracing::info!(
        "Starting battle client against {} (environment {})",
        config.api.base_url,
        std::env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string())
    );

    let credentials = Arc::new(
        CredentialStore::load(&config.auth).context("Failed to load stored credential")?,
    );
    if !credentials.is_present() {
        tracing::warn!("No credential configured, the backend will likely reject requests");
    }

    let api = HttpGameApi::new(&config.api, Arc::clone(&credentials))
        .context("Failed to build HTTP client")?;
    let presenter = Arc::new(TerminalPresenter::new());
    let round = presenter.round_handle();

    let mut controller = BattleController::new(
        Arc::new(api),
        presenter,
        Arc::new(TerminalNavigator),
        config.battle.clone(),
        config.presentation.timings(),
    );

    // Blocking stdin lives on its own thread so shutdown never waits on a read.
    let (actions_tx, actions_rx) = mpsc::channel::<UserAction>(16);
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            let action = parse_command(&line, round.load(Ordering::SeqCst));
            let leaving = action == UserAction::Leave;
            if actions_tx.blocking_send(action).is_err() || leaving {
                break;
            }
        }
    });

    if let Err(e) = controller.start().await {
        tracing::warn!("Battle did not start: {}", e);
    }

    let outcome = controller.run(actions_rx).await;
    match outcome {
        Some(outcome) => tracing::info!("Battle over: {}", outcome.as_str()),
        None => tracing::info!("Battle ended without a result ({:?})", controller.phase()),
    }

    if config.metrics_dump_on_exit {
        match render_metrics() {
            Ok(text) => eprintln!("{}", text),
            Err(e) => tracing::warn!("Failed to render metrics: {}", e),
        }
    }

    telemetry::shutdown_tracing(provider);
    Ok(())
}
