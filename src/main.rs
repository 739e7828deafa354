// src/main.rs - Thermostat host running the control loop against the simulated room
use std::sync::Arc;
use std::time::Instant;

use chrono::Local;
use clap::Parser;
use tokio::sync::{RwLock, broadcast};

use smart_thermostat::config::Config;
use smart_thermostat::hardware::JsonGainsStore;
use smart_thermostat::runtime::ControllerRuntime;
use smart_thermostat::schedule::{parse_hms, seconds_until};
use smart_thermostat::sim::SimRoom;

#[derive(Parser, Debug)]
#[command(name = "thermostat", about = "Smart PID thermostat control loop")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "thermostat.toml")]
    config: String,

    /// Start a relay auto-tune experiment immediately
    #[arg(long)]
    autotune: bool,

    /// Simulated seconds advanced per real tick (speeds up the demo room)
    #[arg(long, default_value_t = 1.0)]
    time_scale: f64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args = Args::parse();

    tracing::info!("Starting smart-thermostat");
    tracing::info!("Loading configuration from: {}", args.config);

    let config = Config::load(&args.config).map_err(|e| {
        tracing::error!("Failed to load config from '{}': {}", args.config, e);
        Box::new(e) as Box<dyn std::error::Error + Send + Sync + 'static>
    })?;
    config.validate().map_err(|e| {
        tracing::error!("Configuration invalid, refusing to start: {}", e);
        Box::new(e) as Box<dyn std::error::Error + Send + Sync + 'static>
    })?;

    let c = &config.controller;
    tracing::info!("Controller: {} (mode {})", c.name, c.mode);
    tracing::info!("Target: {:.1} in [{:.1}, {:.1}], deadband {:.1}", c.target, c.min_temp, c.max_temp, c.deadband);
    tracing::info!("Tick interval: {}s", c.update_interval);

    let room = Arc::new(SimRoom::new(c.target - 3.0, 8.0, 0.05));
    let store = Arc::new(JsonGainsStore::new(config.store.gains_path.clone()));

    let tick_secs = c.update_interval;
    let setback_cfg = config.setback.clone();

    let runtime =
        ControllerRuntime::new(config, room.clone(), room.clone(), store).await?;
    let runtime = Arc::new(RwLock::new(runtime));

    if args.autotune {
        runtime.write().await.start_autotune();
    }

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    // Periodic control tick
    {
        let runtime = runtime.clone();
        let room = room.clone();
        let mut shutdown_rx = shutdown_tx.subscribe();
        let time_scale = args.time_scale;
        tokio::spawn(async move {
            let start = Instant::now();
            let mut interval =
                tokio::time::interval(tokio::time::Duration::from_secs(tick_secs));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        tracing::info!("Control loop shutting down");
                        break;
                    }
                    _ = interval.tick() => {
                        room.advance(tick_secs as f64 * time_scale);
                        let now = start.elapsed().as_secs_f64() * time_scale;
                        runtime.write().await.tick(now).await;
                    }
                }
            }
        });
    }

    // Daily setback and restore triggers
    if setback_cfg.enabled {
        let setback_at = parse_hms(&setback_cfg.setback_time)?;
        let restore_at = parse_hms(&setback_cfg.restore_time)?;

        {
            let runtime = runtime.clone();
            let mut shutdown_rx = shutdown_tx.subscribe();
            tokio::spawn(async move {
                loop {
                    let now = Local::now().naive_local();
                    let wait = seconds_until(now, setback_at);
                    tokio::select! {
                        _ = shutdown_rx.recv() => break,
                        _ = tokio::time::sleep(tokio::time::Duration::from_secs(wait.max(1))) => {
                            let fired_at = Local::now().naive_local();
                            runtime.write().await.on_setback(fired_at).await;
                        }
                    }
                }
            });
        }
        {
            let runtime = runtime.clone();
            let mut shutdown_rx = shutdown_tx.subscribe();
            tokio::spawn(async move {
                loop {
                    let now = Local::now().naive_local();
                    let wait = seconds_until(now, restore_at);
                    tokio::select! {
                        _ = shutdown_rx.recv() => break,
                        _ = tokio::time::sleep(tokio::time::Duration::from_secs(wait.max(1))) => {
                            let fired_at = Local::now().naive_local();
                            runtime.write().await.on_restore(fired_at).await;
                        }
                    }
                }
            });
        }
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown requested");
    let _ = shutdown_tx.send(());

    if runtime.read().await.is_autotuning() {
        match runtime.write().await.stop_autotune().await {
            Some(res) => tracing::info!(
                "Final auto-tune result: Ku={:.4}, Tu={:.1}s, kp={:.4}, ki={:.4}, kd={:.4}",
                res.ku, res.tu, res.kp, res.ki, res.kd
            ),
            None => tracing::info!("Auto-tune ended without enough data"),
        }
    }

    let status = runtime.read().await.status();
    tracing::info!(
        "Final state: setpoint={:.2}, ambient={:?}",
        status.last_setpoint,
        status.last_ambient
    );

    Ok(())
}
