use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::StoreError;
use crate::repository::IdStrategy;
use crate::storage::{JsonFileStore, RecordStore, SqliteStore};

pub const DEFAULT_ADDR: &str = "127.0.0.1:3000";
pub const DEFAULT_SERVER_ID: &str = "local";
pub const DEFAULT_DATA_DIR: &str = "database";
pub const DEFAULT_SQLITE_PATH: &str = "database/tracker.db";
/// Submissions embed whole PDFs, so bodies get a generous cap
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Which persistence backend to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreKind {
    /// One `<collection>.json` file per collection
    #[default]
    Json,
    Sqlite,
}

impl FromStr for StoreKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(StoreKind::Json),
            "sqlite" => Ok(StoreKind::Sqlite),
            other => Err(format!("unknown store kind '{}'", other)),
        }
    }
}

/// Server settings, read from `TRACKER_*` environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub addr: SocketAddr,
    /// Routes are served under `/make-server-<server_id>/`
    pub server_id: String,
    pub store: StoreKind,
    pub data_dir: PathBuf,
    pub sqlite_path: PathBuf,
    pub id_strategy: IdStrategy,
    pub max_body_bytes: usize,
}

#[derive(Debug, thiserror::Error)]
#[error("invalid value for {key}: {reason}")]
pub struct ConfigError {
    pub key: &'static str,
    pub reason: String,
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T::Err: ToString,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw.trim().parse().map_err(|e: T::Err| ConfigError {
            key,
            reason: e.to_string(),
        }),
        _ => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key lookup. Missing or blank keys fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let default_addr: SocketAddr = DEFAULT_ADDR.parse().map_err(|_| ConfigError {
            key: "TRACKER_ADDR",
            reason: "bad built-in default".to_string(),
        })?;

        let server_id = lookup("TRACKER_SERVER_ID")
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| DEFAULT_SERVER_ID.to_string());
        if server_id.contains('/') {
            return Err(ConfigError {
                key: "TRACKER_SERVER_ID",
                reason: "must not contain '/'".to_string(),
            });
        }

        Ok(Config {
            addr: parse_or(&lookup, "TRACKER_ADDR", default_addr)?,
            server_id,
            store: parse_or(&lookup, "TRACKER_STORE", StoreKind::Json)?,
            data_dir: parse_or(&lookup, "TRACKER_DATA_DIR", PathBuf::from(DEFAULT_DATA_DIR))?,
            sqlite_path: parse_or(
                &lookup,
                "TRACKER_SQLITE_PATH",
                PathBuf::from(DEFAULT_SQLITE_PATH),
            )?,
            id_strategy: parse_or(&lookup, "TRACKER_ID_STRATEGY", IdStrategy::Sequential)?,
            max_body_bytes: parse_or(&lookup, "TRACKER_MAX_BODY_BYTES", DEFAULT_MAX_BODY_BYTES)?,
        })
    }

    /// Route prefix, e.g. `/make-server-local`.
    pub fn route_prefix(&self) -> String {
        format!("/make-server-{}", self.server_id)
    }

    /// Open the configured backend, creating its directory if needed.
    pub fn open_store(&self) -> Result<Arc<dyn RecordStore>, StoreError> {
        let store: Arc<dyn RecordStore> = match self.store {
            StoreKind::Json => Arc::new(JsonFileStore::open(&self.data_dir)?),
            StoreKind::Sqlite => Arc::new(SqliteStore::open(&self.sqlite_path)?),
        };
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(|_| None).unwrap();
        assert_eq!(config.addr.to_string(), DEFAULT_ADDR);
        assert_eq!(config.route_prefix(), "/make-server-local");
        assert_eq!(config.store, StoreKind::Json);
        assert_eq!(config.data_dir, PathBuf::from("database"));
        assert_eq!(config.id_strategy, IdStrategy::Sequential);
        assert_eq!(config.max_body_bytes, 10_485_760);
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("TRACKER_ADDR", "0.0.0.0:8080"),
            ("TRACKER_SERVER_ID", "a1b2"),
            ("TRACKER_STORE", "SQLite"),
            ("TRACKER_SQLITE_PATH", "/tmp/t.db"),
            ("TRACKER_ID_STRATEGY", "timestamp"),
            ("TRACKER_MAX_BODY_BYTES", "1024"),
        ]))
        .unwrap();
        assert_eq!(config.addr.port(), 8080);
        assert_eq!(config.route_prefix(), "/make-server-a1b2");
        assert_eq!(config.store, StoreKind::Sqlite);
        assert_eq!(config.sqlite_path, PathBuf::from("/tmp/t.db"));
        assert_eq!(config.id_strategy, IdStrategy::Timestamp);
        assert_eq!(config.max_body_bytes, 1024);
    }

    #[test]
    fn test_bad_values() {
        let err = Config::from_lookup(lookup(&[("TRACKER_STORE", "redis")])).unwrap_err();
        assert_eq!(err.key, "TRACKER_STORE");
        assert!(Config::from_lookup(lookup(&[("TRACKER_ADDR", "nowhere")])).is_err());
        assert!(Config::from_lookup(lookup(&[("TRACKER_SERVER_ID", "a/b")])).is_err());
    }

    #[test]
    fn test_open_store_creates_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("nested").join("data");
        let db = dir.path().join("db").join("tracker.db");
        let data_str = data.to_string_lossy().to_string();
        let db_str = db.to_string_lossy().to_string();

        let json = Config::from_lookup(lookup(&[("TRACKER_DATA_DIR", data_str.as_str())])).unwrap();
        json.open_store().unwrap();
        assert!(data.is_dir());

        let sqlite = Config::from_lookup(lookup(&[
            ("TRACKER_STORE", "sqlite"),
            ("TRACKER_SQLITE_PATH", db_str.as_str()),
        ]))
        .unwrap();
        sqlite.open_store().unwrap();
        assert!(db.exists());
    }
}
