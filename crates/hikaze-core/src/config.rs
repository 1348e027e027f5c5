//! Centralized configuration for the Hikaze catalog.
//!
//! Tunables live as associated constants grouped by concern. The only
//! persisted configuration is [`AppConfig`], stored as `config.json` in the
//! data root.

use crate::error::{HikazeError, Result};
use crate::paths::{absolutize, comparison_key};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Scanner and background job tunables.
pub struct ScanConfig;

impl ScanConfig {
    /// Read buffer for content hashing.
    pub const HASH_CHUNK_SIZE: usize = 8 * 1024 * 1024;
    /// The quick-tag worker publishes progress every N records.
    pub const QUICK_TAG_PROGRESS_EVERY: usize = 20;
    /// Finished jobs are evicted from the registry after this long.
    pub const FINISHED_JOB_TTL: Duration = Duration::from_secs(3600);
}

/// Catalog database settings.
pub struct StoreConfig;

impl StoreConfig {
    pub const DB_FILENAME: &'static str = "hikaze_mm.sqlite3";
    pub const SCHEMA_VERSION: i64 = 2;
    /// Lock waits are short so a contended database fails fast.
    pub const BUSY_TIMEOUT: Duration = Duration::from_millis(2000);
    pub const DEFAULT_LANGUAGE: &'static str = "zh-CN";
    pub const DEFAULT_PAGE_SIZE: u32 = 50;
    pub const MAX_PAGE_SIZE: u32 = 1000;
}

/// HTTP server defaults.
pub struct ServerConfig;

impl ServerConfig {
    pub const DEFAULT_HOST: &'static str = "127.0.0.1";
    pub const DEFAULT_PORT: u16 = 8789;
    /// Consecutive ports tried when the configured one is taken.
    pub const BIND_TRIES: u16 = 10;
}

/// Directory and file names under the data root.
pub struct PathsConfig;

impl PathsConfig {
    pub const CONFIG_FILENAME: &'static str = "config.json";
    pub const DATA_DIR_NAME: &'static str = "hikaze-mm";
    pub const MODELS_DIR_NAME: &'static str = "models";
    /// File that marks the host application's checkout.
    pub const HOST_MARKER_FILE: &'static str = "folder_paths.py";
    /// How many parent directories are searched for the host checkout.
    pub const HOST_SEARCH_DEPTH: usize = 6;
}

/// Persisted application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Absolute, de-duplicated, sorted model roots.
    #[serde(default)]
    pub model_roots: Vec<PathBuf>,
}

fn default_host() -> String {
    ServerConfig::DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    ServerConfig::DEFAULT_PORT
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            model_roots: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Default data root: `<platform data dir>/hikaze-mm`.
    pub fn default_data_root() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(PathsConfig::DATA_DIR_NAME)
    }

    pub fn config_path(data_root: &Path) -> PathBuf {
        data_root.join(PathsConfig::CONFIG_FILENAME)
    }

    /// Load `config.json` from the data root.
    ///
    /// A missing or unparsable file yields the defaults. When no roots are
    /// configured, the `models` directory of an enclosing host checkout is
    /// used if one can be found above the data root.
    pub fn load(data_root: &Path) -> Result<Self> {
        let path = Self::config_path(data_root);
        let mut config = match std::fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str::<AppConfig>(&text).unwrap_or_else(|e| {
                warn!("Ignoring unreadable config {}: {}", path.display(), e);
                AppConfig::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => AppConfig::default(),
            Err(e) => return Err(HikazeError::io_with_path(e, path)),
        };

        if config.model_roots.is_empty() {
            config.model_roots = discover_default_roots(data_root);
        }
        config.model_roots = normalize_roots(&config.model_roots);
        debug!("Loaded config with {} model roots", config.model_roots.len());
        Ok(config)
    }

    /// Write `config.json` via a temp file and rename.
    pub fn save(&self, data_root: &Path) -> Result<()> {
        std::fs::create_dir_all(data_root).map_err(|e| HikazeError::io_with_path(e, data_root))?;
        let path = Self::config_path(data_root);
        let temp_path = path.with_extension(format!("json.{}.tmp", std::process::id()));

        let serialized = serde_json::to_string_pretty(self)?;
        std::fs::write(&temp_path, serialized)
            .map_err(|e| HikazeError::io_with_path(e, &temp_path))?;
        std::fs::rename(&temp_path, &path).map_err(|e| HikazeError::io_with_path(e, &path))?;
        Ok(())
    }
}

/// Absolutize, de-duplicate and sort a list of roots.
///
/// Duplicates are detected on the comparison key, so `C:\Models` and
/// `c:/models` collapse on Windows.
pub fn normalize_roots(roots: &[PathBuf]) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    let mut out: Vec<PathBuf> = roots
        .iter()
        .filter(|r| !r.as_os_str().is_empty())
        .map(|r| absolutize(r))
        .filter(|r| seen.insert(comparison_key(r)))
        .collect();
    out.sort();
    out
}

/// Find `<host checkout>/models` by walking up from `start`.
fn discover_default_roots(start: &Path) -> Vec<PathBuf> {
    let mut current = absolutize(start);
    for _ in 0..PathsConfig::HOST_SEARCH_DEPTH {
        let models = current.join(PathsConfig::MODELS_DIR_NAME);
        if current.join(PathsConfig::HOST_MARKER_FILE).exists() && models.is_dir() {
            return vec![models];
        }
        if !current.pop() {
            break;
        }
    }
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_missing_config_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let config = AppConfig::load(temp.path()).unwrap();
        assert_eq!(config.host, ServerConfig::DEFAULT_HOST);
        assert_eq!(config.port, ServerConfig::DEFAULT_PORT);
        assert!(config.model_roots.is_empty());
    }

    #[test]
    fn test_save_and_reload() {
        let temp = TempDir::new().unwrap();
        let roots_dir = temp.path().join("models");
        std::fs::create_dir_all(&roots_dir).unwrap();

        let config = AppConfig {
            host: "0.0.0.0".into(),
            port: 9000,
            model_roots: vec![roots_dir.clone()],
        };
        config.save(temp.path()).unwrap();

        let loaded = AppConfig::load(temp.path()).unwrap();
        assert_eq!(loaded.port, 9000);
        assert_eq!(loaded.model_roots, normalize_roots(&[roots_dir]));
    }

    #[test]
    fn test_invalid_config_falls_back_to_defaults() {
        let temp = TempDir::new().unwrap();
        std::fs::write(AppConfig::config_path(temp.path()), "{not json").unwrap();
        let config = AppConfig::load(temp.path()).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_discovers_host_models_dir() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("folder_paths.py"), "").unwrap();
        std::fs::create_dir_all(temp.path().join("models")).unwrap();
        let data_root = temp.path().join("custom_nodes").join("hikaze").join("data");
        std::fs::create_dir_all(&data_root).unwrap();

        let config = AppConfig::load(&data_root).unwrap();
        assert_eq!(config.model_roots.len(), 1);
        assert!(config.model_roots[0].ends_with("models"));
    }

    #[test]
    fn test_normalize_roots_dedups_and_sorts() {
        let roots = vec![
            PathBuf::from("/b/models"),
            PathBuf::from("/a/models"),
            PathBuf::from("/b/models/"),
            PathBuf::from("/a/./models"),
        ];
        let normalized = normalize_roots(&roots);
        assert_eq!(normalized.len(), 2);
        assert!(normalized[0] < normalized[1]);
    }
}
