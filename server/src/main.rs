//! Realm game server
//!
//! Loads the configuration and map, creates the worlds and drives them at a
//! fixed rate from a single task.

mod network;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{error, info};
use rand::rngs::StdRng;
use rand::SeedableRng;

use realm_server::config::ServerConfig;
use realm_server::world::{GameWorld, Properties, WorldMap};

use crate::network::Server;

/// How often to log world population
const STATUS_INTERVAL_SECS: u64 = 60;

#[tokio::main]
async fn main() {
    let candidates: Vec<PathBuf> = std::env::args()
        .skip(1)
        .map(PathBuf::from)
        .chain(std::iter::once(PathBuf::from("config.json")))
        .collect();
    let config = ServerConfig::load_first(&candidates);

    let filter = config.as_ref().map(ServerConfig::log_filter).unwrap_or("info");
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return;
        }
    };

    info!("Starting realm server...");
    info!("Tick rate: {} Hz", config.ups);

    let map = match WorldMap::load(&config.map_filepath) {
        Ok(map) => Arc::new(map),
        Err(e) => {
            error!("Failed to load map {}: {}", config.map_filepath, e);
            return;
        }
    };
    let properties = Arc::new(Properties::standard());

    let mut worlds: Vec<GameWorld> = (1..=config.nb_worlds)
        .map(|n| {
            GameWorld::new(
                format!("world{}", n),
                config.nb_players_per_world,
                config.ups,
                Arc::clone(&map),
                Arc::clone(&properties),
                StdRng::from_entropy(),
            )
        })
        .collect();

    let mut server = match Server::new(config.port).await {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to start server: {}", e);
            return;
        }
    };

    let tick_duration = Duration::from_secs_f64(1.0 / config.ups as f64);
    let mut last_tick = Instant::now();
    let mut last_status = Instant::now();
    let status_interval = Duration::from_secs(STATUS_INTERVAL_SECS);

    info!("Server started successfully!");

    // Main game loop
    loop {
        let tick_start = Instant::now();

        server.process_incoming(&mut worlds);

        let delta = last_tick.elapsed();
        last_tick = Instant::now();
        for world in worlds.iter_mut() {
            world.update(delta);
        }

        server.prune_closed(&mut worlds);

        if last_status.elapsed() >= status_interval {
            for world in &worlds {
                info!("{}: {}/{} players", world.id(), world.player_count(), world.max_players());
            }
            info!("{} open connections", server.connection_count());
            last_status = Instant::now();
        }

        let elapsed = tick_start.elapsed();
        if elapsed < tick_duration {
            tokio::time::sleep(tick_duration - elapsed).await;
        }
    }
}
