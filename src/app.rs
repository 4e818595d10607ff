//! CLI and runtime wiring: settings, store, API client, poll loop.
//!
//! Every report is reachable as a one-shot subcommand so external
//! schedulers can drive them; `run` is the long-lived polling daemon.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::time::MissedTickBehavior;

use crate::core::api::{HttpWarApi, WarApi};
use crate::core::config::{ConfigManager, Settings};
use crate::core::coordinator::PollCoordinator;
use crate::core::error::WatchError;
use crate::core::model::{Event, Order, PlanetSummary};
use crate::core::notify::{ConsoleNotifier, Notifier, WebhookNotifier};
use crate::core::progress::TaskEta;
use crate::core::reports;
use crate::core::store::{keys, StateStore};
use crate::core::world::{active_campaigns, total_players};

#[derive(Parser)]
#[command(
    name = "war-watcher",
    about = "Galactic war watcher: polls the war API and reports state transitions",
    version
)]
struct Cli {
    /// Directory holding settings.json
    #[arg(long, env = "WAR_WATCHER_CONFIG_DIR", default_value = "config")]
    config_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Poll on an interval and deliver events until stopped
    Run,
    /// Run a single poll cycle and print any events
    Poll,
    /// Overall situation report
    Status,
    /// Full major-order detail with progress and ETA
    Orders,
    /// Planets with active combat
    Planets,
    /// Top planets by player count
    Top,
    /// ETA projections for the active orders
    Eta,
    /// Daily summary text
    Summary,
    /// Dump the persisted diagnostics state as JSON
    Snapshot,
}

pub async fn run() -> Result<(), WatchError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let manager = ConfigManager::new(cli.config_dir);
    let settings = manager.load();
    // Write the (possibly default) settings back so there is a file to edit.
    if let Err(err) = manager.save(&settings) {
        log::warn!("could not write settings file: {}", err);
    }

    let store = Arc::new(StateStore::open(&settings.db_path)?);
    let api = Arc::new(HttpWarApi::new(&settings)?);
    let coordinator = PollCoordinator::new(api.clone(), store.clone());

    match cli.command {
        Command::Run => run_loop(&settings, &coordinator).await,
        Command::Poll => {
            for event in coordinator.poll().await {
                println!("[{}]\n{}\n", event.kind.as_str(), event.message);
            }
            Ok(())
        }
        Command::Status => {
            let orders = orders_with_eta(api.as_ref(), &coordinator).await?;
            let status = api.war_status().await?;
            let planets: Vec<PlanetSummary> =
                store.get_json(keys::LAST_PLANETS)?.unwrap_or_default();
            println!(
                "{}",
                reports::status_report(&orders, total_players(&status), &planets)
            );
            Ok(())
        }
        Command::Orders => {
            let orders = orders_with_eta(api.as_ref(), &coordinator).await?;
            println!("{}", reports::order_detail_report(&orders));
            Ok(())
        }
        Command::Planets => {
            let status = api.war_status().await?;
            let names = api.planet_names().await;
            println!("{}", reports::planets_report(&active_campaigns(&status, &names)));
            Ok(())
        }
        Command::Top => {
            let status = api.war_status().await?;
            let names = api.planet_names().await;
            println!(
                "{}",
                reports::top_report(&active_campaigns(&status, &names), total_players(&status))
            );
            Ok(())
        }
        Command::Eta => {
            let orders = orders_with_eta(api.as_ref(), &coordinator).await?;
            println!("{}", reports::eta_report(&orders));
            Ok(())
        }
        Command::Summary => {
            let orders = orders_with_eta(api.as_ref(), &coordinator).await?;
            let status = api.war_status().await?;
            let names = api.planet_names().await;
            println!(
                "{}",
                reports::daily_summary(
                    &orders,
                    total_players(&status),
                    &active_campaigns(&status, &names)
                )
            );
            Ok(())
        }
        Command::Snapshot => {
            let snapshot = coordinator.state_snapshot()?;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
            Ok(())
        }
    }
}

async fn run_loop(settings: &Settings, coordinator: &PollCoordinator) -> Result<(), WatchError> {
    let notifier: Box<dyn Notifier> = match &settings.webhook_url {
        Some(url) => Box::new(WebhookNotifier::new(url.clone())?),
        None => Box::new(ConsoleNotifier),
    };

    log::info!(
        "war watcher starting, polling every {}s",
        settings.poll_interval_secs
    );

    let mut interval = tokio::time::interval(Duration::from_secs(settings.poll_interval_secs.max(30)));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        // First tick fires immediately: the startup poll.
        interval.tick().await;
        let events = coordinator.poll().await;
        log::info!("poll cycle done, {} event(s)", events.len());
        deliver(&events, notifier.as_ref()).await;
    }
}

async fn deliver(events: &[Event], notifier: &dyn Notifier) {
    for event in events {
        log::info!("event detected: {}", event.kind.as_str());
        if let Err(err) = notifier.send(&event.message).await {
            log::error!("failed to deliver {} event: {}", event.kind.as_str(), err);
        }
    }
}

async fn orders_with_eta(
    api: &dyn WarApi,
    coordinator: &PollCoordinator,
) -> Result<Vec<(Order, Vec<TaskEta>)>, WatchError> {
    let orders = api.major_orders().await?;
    let mut out = Vec::with_capacity(orders.len());
    for order in orders {
        let etas = coordinator.compute_eta(&order)?;
        out.push((order, etas));
    }
    Ok(out)
}
