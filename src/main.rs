mod config;
mod events;
mod net;
mod scheduler;
mod session;
mod util;
mod vehicle;

use std::sync::Arc;
use std::time::Instant;

use tokio::time::MissedTickBehavior;
use tracing::{info, Level};

use crate::config::SessionConfig;
use crate::events::{EventKind, SessionEvent};
use crate::net::transport::LoopbackNetwork;
use crate::scheduler::FixedStep;
use crate::session::spawn::SpawnAllocator;
use crate::session::{starting_grid, Session};
use crate::vehicle::input::AxisInput;

/// Loopback demo: a host and simulated peers share one in-process hub,
/// fill the lobby one join per second, race from the starting grid once
/// the cap is reached, and shut down on Ctrl+C.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_target(false)
        .init();

    info!("Slipstream Server v{}", env!("CARGO_PKG_VERSION"));

    let config = SessionConfig::load_or_default();
    config.validate().map_err(anyhow::Error::msg)?;
    info!(
        "Configuration loaded: max_players={}, tick_rate={} Hz",
        config.max_players, config.tick_rate
    );

    let hub = LoopbackNetwork::new();
    let grid = starting_grid(config.max_players as usize);
    let mut host = Session::new(
        Arc::new(hub.connect()),
        SpawnAllocator::new(grid.clone())?,
        &config,
    );

    // Lobby status lines straight off the host's event bus
    let listener = host.bus().subscriber();
    host.bus()
        .subscribe(listener, EventKind::PlayerJoined, |event| {
            if let SessionEvent::PlayerJoined { count } = event {
                info!("Lobby: {} player(s) connected", count);
            }
        });
    host.bus()
        .subscribe(listener, EventKind::SpawnAssigned, |event| {
            if let SessionEvent::SpawnAssigned {
                target,
                ordinal,
                transform,
            } = event
            {
                info!(
                    "{} takes grid slot {} at ({:.1}, {:.1})",
                    target, ordinal, transform.position.x, transform.position.y
                );
            }
        });
    host.bus().subscribe(listener, EventKind::GameStart, |_| {
        info!("All players in, race started");
    });

    let driver = host.input_sender();
    let host_id = host.local_id();
    let mut peers: Vec<Session> = Vec::new();

    let mut scheduler = FixedStep::from_rate(config.tick_rate);
    let mut ticker = tokio::time::interval(scheduler.interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut last = Instant::now();
    let mut tick: u64 = 0;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let now = Instant::now();
                let elapsed = now.duration_since(last).as_secs_f32();
                last = now;

                for _ in 0..scheduler.advance(elapsed) {
                    tick += 1;

                    // One simulated peer joins per second until the lobby is full
                    if tick % config.tick_rate as u64 == 0
                        && (peers.len() as u32) < config.max_players.saturating_sub(1)
                    {
                        peers.push(Session::new(
                            Arc::new(hub.connect()),
                            SpawnAllocator::new(grid.clone())?,
                            &config,
                        ));
                    }

                    // The host's driver: flat out with a gentle left
                    if host.replica().game_started {
                        driver.try_send(host_id, AxisInput::clamped(1.0, 0.25)).ok();
                    }

                    host.tick(scheduler.dt());
                    for peer in peers.iter_mut() {
                        peer.tick(scheduler.dt());
                    }

                    if host.replica().game_started && tick % (config.tick_rate as u64 * 2) == 0 {
                        let car = host.vehicle();
                        info!(
                            "Host car at ({:.1}, {:.1}), speed {:.1}",
                            car.position.x,
                            car.position.y,
                            car.speed()
                        );
                    }
                }
            }
            _ = &mut shutdown => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    info!("Session {} closed", host.id());
    Ok(())
}
