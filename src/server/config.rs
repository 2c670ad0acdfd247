use serde::Deserialize;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse TOML from config file at {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to load config from environment: {0}")]
    Env(#[from] envy::Error),
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub database_url: String,
    pub listen_addr: SocketAddr,
    pub tick_interval_seconds: u64,
    pub max_concurrent_probes: usize,
    pub db_max_connections: u32,
    pub log_dir: String,
}

// Partial config for layering
#[derive(Deserialize, Default, Debug)]
struct PartialServerConfig {
    database_url: Option<String>,
    listen_addr: Option<String>,
    tick_interval_seconds: Option<u64>,
    max_concurrent_probes: Option<usize>,
    db_max_connections: Option<u32>,
    log_dir: Option<String>,
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_tick_interval_seconds() -> u64 {
    10
}

fn default_max_concurrent_probes() -> usize {
    16
}

fn default_db_max_connections() -> u32 {
    10
}

fn default_log_dir() -> String {
    "logs".to_string()
}

impl ServerConfig {
    /// File (if given and present), then environment; environment wins.
    pub fn load(config_path: Option<&str>) -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let file_config = match config_path.map(Path::new) {
            Some(path) if path.exists() => {
                let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;
                toml::from_str(&contents).map_err(|source| ConfigError::Parse {
                    path: path.to_path_buf(),
                    source,
                })?
            }
            _ => PartialServerConfig::default(),
        };

        let env_config: PartialServerConfig = envy::from_env()?;
        Self::merge(file_config, env_config)
    }

    fn merge(file: PartialServerConfig, env: PartialServerConfig) -> Result<Self, ConfigError> {
        let listen_addr = env
            .listen_addr
            .or(file.listen_addr)
            .unwrap_or_else(default_listen_addr);
        let listen_addr = listen_addr
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::Invalid {
                field: "LISTEN_ADDR",
                reason: format!("'{listen_addr}': {e}"),
            })?;

        let tick_interval_seconds = env
            .tick_interval_seconds
            .or(file.tick_interval_seconds)
            .unwrap_or_else(default_tick_interval_seconds);
        if tick_interval_seconds == 0 {
            return Err(ConfigError::Invalid {
                field: "TICK_INTERVAL_SECONDS",
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(ServerConfig {
            database_url: env
                .database_url
                .or(file.database_url)
                .ok_or(ConfigError::Missing("DATABASE_URL"))?,
            listen_addr,
            tick_interval_seconds,
            max_concurrent_probes: env
                .max_concurrent_probes
                .or(file.max_concurrent_probes)
                .unwrap_or_else(default_max_concurrent_probes)
                .max(1),
            db_max_connections: env
                .db_max_connections
                .or(file.db_max_connections)
                .unwrap_or_else(default_db_max_connections),
            log_dir: env
                .log_dir
                .or(file.log_dir)
                .unwrap_or_else(default_log_dir),
        })
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> Result<PartialServerConfig, envy::Error> {
        envy::from_iter(pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())))
    }

    #[test]
    fn defaults_fill_the_gaps() {
        let config = ServerConfig::merge(
            PartialServerConfig::default(),
            env(&[("DATABASE_URL", "postgres://localhost/pulse")]).unwrap(),
        )
        .unwrap();

        assert_eq!(config.database_url, "postgres://localhost/pulse");
        assert_eq!(config.listen_addr, "0.0.0.0:8080".parse::<SocketAddr>().unwrap());
        assert_eq!(config.tick_interval(), Duration::from_secs(10));
        assert_eq!(config.max_concurrent_probes, 16);
        assert_eq!(config.db_max_connections, 10);
        assert_eq!(config.log_dir, "logs");
    }

    #[test]
    fn environment_overrides_file() {
        let file: PartialServerConfig = toml::from_str(
            r#"
            database_url = "postgres://file/pulse"
            tick_interval_seconds = 30
            log_dir = "/var/log/pulse"
            "#,
        )
        .unwrap();
        let config = ServerConfig::merge(
            file,
            env(&[("TICK_INTERVAL_SECONDS", "5"), ("MAX_CONCURRENT_PROBES", "0")]).unwrap(),
        )
        .unwrap();

        assert_eq!(config.database_url, "postgres://file/pulse");
        assert_eq!(config.tick_interval_seconds, 5);
        assert_eq!(config.log_dir, "/var/log/pulse");
        assert_eq!(config.max_concurrent_probes, 1);
    }

    #[test]
    fn database_url_is_required() {
        let err = ServerConfig::merge(PartialServerConfig::default(), PartialServerConfig::default())
            .unwrap_err();
        assert!(matches!(err, ConfigError::Missing("DATABASE_URL")));
    }

    #[test]
    fn malformed_values_are_errors() {
        assert!(env(&[("TICK_INTERVAL_SECONDS", "soon")]).is_err());

        let err = ServerConfig::merge(
            PartialServerConfig::default(),
            env(&[("DATABASE_URL", "postgres://x"), ("LISTEN_ADDR", "nowhere")]).unwrap(),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "LISTEN_ADDR", .. }));
    }
}
