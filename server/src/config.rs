//! Server configuration and startup errors.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use realm_shared::DEFAULT_PORT;

/// Fatal startup errors: unreadable or inconsistent configuration and map data
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("unknown entity kind '{0}' in map data")]
    UnknownKind(String),

    #[error("map dimensions {width}x{height} are invalid")]
    InvalidDimensions { width: i32, height: i32 },

    #[error("collision tile index {0} is outside the map")]
    CollisionOutOfBounds(usize),

    #[error("{area} area {id} contains no valid tile")]
    NoValidTile { area: &'static str, id: u32 },

    #[error("{area} area {id}: {reason}")]
    InvalidArea {
        area: &'static str,
        id: u32,
        reason: String,
    },

    #[error("map has no starting area checkpoint")]
    NoStartingArea,

    #[error("configuration value {name} is invalid: {reason}")]
    InvalidValue { name: &'static str, reason: String },
}

/// Top-level server configuration, read from JSON
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_nb_worlds")]
    pub nb_worlds: usize,
    #[serde(default = "default_nb_players_per_world")]
    pub nb_players_per_world: u32,
    #[serde(default = "default_map_filepath")]
    pub map_filepath: String,
    /// One of "error", "info" or "debug"
    #[serde(default = "default_debug_level")]
    pub debug_level: String,
    /// World updates per second
    #[serde(default = "default_ups")]
    pub ups: u32,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_nb_worlds() -> usize {
    1
}

fn default_nb_players_per_world() -> u32 {
    200
}

fn default_map_filepath() -> String {
    "./server/maps/world_server.json".into()
}

fn default_debug_level() -> String {
    "info".into()
}

fn default_ups() -> u32 {
    50
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            nb_worlds: default_nb_worlds(),
            nb_players_per_world: default_nb_players_per_world(),
            map_filepath: default_map_filepath(),
            debug_level: default_debug_level(),
            ups: default_ups(),
        }
    }
}

impl ServerConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::parse(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load the first readable file among `candidates`, e.g. a local override then the default
    pub fn load_first<P: AsRef<Path>>(candidates: &[P]) -> Result<Self, ConfigError> {
        let mut last_error = None;
        for candidate in candidates {
            match Self::load(candidate) {
                Ok(config) => return Ok(config),
                Err(ConfigError::Io { path, source }) => {
                    log::debug!("Config {} not usable: {}", path.display(), source);
                    last_error = Some(ConfigError::Io { path, source });
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_error.unwrap_or(ConfigError::InvalidValue {
            name: "config path",
            reason: "no configuration file given".into(),
        }))
    }

    pub fn parse(contents: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(contents)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.ups == 0 {
            return Err(ConfigError::InvalidValue {
                name: "ups",
                reason: "must be at least 1".into(),
            });
        }
        if self.nb_worlds == 0 {
            return Err(ConfigError::InvalidValue {
                name: "nb_worlds",
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }

    /// Default `env_logger` filter for the configured debug level
    pub fn log_filter(&self) -> &'static str {
        match self.debug_level.as_str() {
            "error" => "error",
            "debug" => "debug",
            _ => "info",
        }
    }
}
