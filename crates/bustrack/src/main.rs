//! `bustrack` - CLI for live vehicle position tracking
//!
//! This binary runs the position publisher against an in-process store and
//! follows it with a live tracker, and inspects the route and configuration.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{ensure, Context};
use clap::Parser;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use bustrack::cli::{Cli, Command, ConfigCommand, ConsoleMap, ConsoleStatus, SimulateCommand};
use bustrack::{
    init_logging, ClientState, Config, MemoryStore, PositionRecord, PositionStore, Publisher,
    Subscription, TrackStatus, Tracker, TrackingSession,
};

/// How long to wait for the tracker and printer to see the final record.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    match cli.command {
        Command::Simulate(cmd) => {
            let config = load_config(cli.config)?;
            handle_simulate(&config, &cmd).await
        }
        Command::Route(cmd) => {
            let config = load_config(cli.config)?;
            handle_route(&config, cmd.json)
        }
        Command::Config(cmd) => handle_config(cli.config, cmd),
    }
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<Config> {
    Config::load_from(path).context("failed to load configuration")
}

async fn handle_simulate(config: &Config, cmd: &SimulateCommand) -> anyhow::Result<()> {
    let route = config.route();
    let mut publisher_config = config.publisher();
    if let Some(secs) = cmd.interval_secs {
        ensure!(secs > 0, "--interval-secs must be greater than 0");
        publisher_config.tick_interval = Duration::from_secs(secs);
    }

    let store = Arc::new(MemoryStore::with_capacity(config.store.broadcast_capacity));
    let map = Arc::new(ConsoleMap::new());

    let session = if cmd.no_tracker {
        None
    } else {
        let tracker = Tracker::new(route.clone(), Arc::new(ConsoleStatus), config.animation());
        let session = TrackingSession::open(store.as_ref(), tracker);
        session.attach_map(map.clone())?;
        Some(session)
    };
    let printer = cmd.json.then(|| spawn_record_printer(store.subscribe()));

    let publisher = Publisher::with_config(store.clone(), route.clone(), publisher_config);
    publisher.start();

    let completed = tokio::select! {
        finished = publisher.finished() => finished,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, stopping publisher");
            publisher.stop();
            false
        }
    };

    if let Some(session) = session {
        if completed {
            let mut state = session.watch_state();
            let reached = tokio::time::timeout(
                DRAIN_TIMEOUT,
                state.wait_for(|s| s.state == ClientState::Finished),
            )
            .await;
            if !matches!(reached, Ok(Ok(_))) {
                warn!("Tracker did not see the final record");
            }
        }
        let tracker = session.close().await?;
        info!(
            transitions = tracker.transitions(),
            frames = map.frames(),
            "Tracker closed"
        );
    }

    if let Some(mut printer) = printer {
        if !completed || tokio::time::timeout(DRAIN_TIMEOUT, &mut printer).await.is_err() {
            printer.abort();
        }
    }

    let record = store.read_once().await?;
    let stats = store.stats();
    println!();
    println!("Simulation {}", if completed { "finished" } else { "stopped" });
    println!("  Waypoints:   {}", route.len());
    println!("  Writes:      {}", stats.writes);
    println!("  Status:      {}", record.status);
    if let Some(location) = record.location {
        println!("  Location:    {location}");
    }
    Ok(())
}

fn spawn_record_printer(mut subscription: Subscription) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Some(record) = subscription.current() {
            print_record(record);
        }
        loop {
            match subscription.recv().await {
                Ok(record) => {
                    print_record(&record);
                    if record.status == TrackStatus::Finished {
                        break;
                    }
                }
                Err(e) if e.is_recoverable() => warn!(error = %e, "Record printer fell behind"),
                Err(_) => break,
            }
        }
        subscription.unsubscribe();
    })
}

fn print_record(record: &PositionRecord) {
    match serde_json::to_string(&record.to_document()) {
        Ok(line) => println!("{line}"),
        Err(e) => warn!(error = %e, "Failed to encode record"),
    }
}

fn handle_route(config: &Config, json: bool) -> anyhow::Result<()> {
    let route = config.route();
    if json {
        let value = serde_json::json!({
            "waypoints": route.waypoints(),
            "bounds": route.bounds(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("Route ({} waypoints)", route.len());
    println!("==================");
    for (index, waypoint) in route.waypoints().iter().enumerate() {
        println!("  {index:>3}  {waypoint}");
    }
    if let Some(bounds) = route.bounds() {
        println!();
        println!("  South-west:  {}", bounds.south_west);
        println!("  North-east:  {}", bounds.north_east);
        println!("  Center:      {}", bounds.center());
    }
    Ok(())
}

fn handle_config(path: Option<PathBuf>, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            let config = load_config(path)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Publisher]");
                println!("  Tick interval:      {:?}", config.tick_interval());
                println!();
                println!("[Store]");
                println!("  Broadcast capacity: {}", config.store.broadcast_capacity);
                println!();
                println!("[Animation]");
                println!("  Duration:           {} ms", config.animation.duration_ms);
                println!("  Frame interval:     {} ms", config.animation.frame_interval_ms);
                println!();
                println!("[Route]");
                println!("  Waypoints:          {}", config.route.waypoints.len());
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let target = file.or(path).unwrap_or_else(Config::default_config_path);
            println!("Validating: {}", target.display());
            match Config::load_from(Some(target)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => {
                    println!("Configuration is invalid: {e}");
                    std::process::exit(1);
                }
            }
        }
    }
    Ok(())
}
