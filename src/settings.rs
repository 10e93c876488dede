use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{IngestError, Result};
use crate::kind::ProviderKind;
use crate::upsert::DEFAULT_BATCH_SIZE;

/// Persisted configuration. Empty path fields resolve against `data_dir`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub data_dir: String,
    #[serde(default)]
    pub database: String,
    #[serde(default)]
    pub input_dir: String,
    #[serde(default)]
    pub archive_root: String,
    #[serde(default)]
    pub error_dir: String,
    #[serde(default)]
    pub csv_dir: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_pool_size() -> usize {
    5
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir().to_string_lossy().to_string(),
            database: String::new(),
            input_dir: String::new(),
            archive_root: String::new(),
            error_dir: String::new(),
            csv_dir: String::new(),
            pool_size: default_pool_size(),
            batch_size: default_batch_size(),
        }
    }
}

impl Settings {
    fn resolve(&self, configured: &str, default: &str) -> PathBuf {
        if configured.is_empty() {
            PathBuf::from(&self.data_dir).join(default)
        } else {
            PathBuf::from(configured)
        }
    }

    pub fn database_path(&self) -> PathBuf {
        self.resolve(&self.database, "vasimport.db")
    }

    pub fn input_path(&self) -> PathBuf {
        self.resolve(&self.input_dir, "input")
    }

    pub fn archive_path(&self) -> PathBuf {
        self.resolve(&self.archive_root, "public")
    }

    pub fn error_path(&self) -> PathBuf {
        self.resolve(&self.error_dir, "errors")
    }

    pub fn csv_path(&self, kind: ProviderKind) -> PathBuf {
        self.resolve(&self.csv_dir, "data")
            .join(format!("{}_output.csv", kind.key()))
    }
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("vasimport")
}

fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Documents")
        .join("vasimport")
}

pub fn load_settings() -> Settings {
    let path = settings_path();
    if path.exists() {
        let content = std::fs::read_to_string(&path).unwrap_or_default();
        serde_json::from_str(&content).unwrap_or_else(|e| {
            tracing::warn!(path = %path.display(), error = %e, "unreadable settings, using defaults");
            Settings::default()
        })
    } else {
        Settings::default()
    }
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    let dir = config_dir();
    std::fs::create_dir_all(&dir)?;
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| IngestError::Settings(e.to_string()))?;
    std::fs::write(settings_path(), format!("{json}\n"))?;
    Ok(())
}

pub fn shellexpand_path(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| PathBuf::from(path))
        .to_string_lossy()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_resolve_under_data_dir() {
        let s = Settings {
            data_dir: "/tmp/vi".to_string(),
            ..Settings::default()
        };
        assert_eq!(s.database_path(), PathBuf::from("/tmp/vi/vasimport.db"));
        assert_eq!(s.input_path(), PathBuf::from("/tmp/vi/input"));
        assert_eq!(s.archive_path(), PathBuf::from("/tmp/vi/public"));
        assert_eq!(s.error_path(), PathBuf::from("/tmp/vi/errors"));
        assert_eq!(s.csv_path(ProviderKind::Vas), PathBuf::from("/tmp/vi/data/vas_output.csv"));
        assert_eq!(s.pool_size, 5);
        assert_eq!(s.batch_size, 50);
    }

    #[test]
    fn test_explicit_paths_win() {
        let s = Settings {
            data_dir: "/tmp/vi".to_string(),
            input_dir: "/mnt/drop".to_string(),
            ..Settings::default()
        };
        assert_eq!(s.input_path(), PathBuf::from("/mnt/drop"));
    }

    #[test]
    fn test_load_merges_with_defaults() {
        let json = r#"{"data_dir": "/tmp/test", "pool_size": 3}"#;
        let s: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(s.pool_size, 3);
        assert_eq!(s.batch_size, 50);
        assert!(s.input_dir.is_empty());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let settings = Settings {
            data_dir: "/tmp/test".to_string(),
            batch_size: 10,
            ..Settings::default()
        };
        std::fs::write(&path, serde_json::to_string_pretty(&settings).unwrap()).unwrap();
        let loaded: Settings = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded.data_dir, "/tmp/test");
        assert_eq!(loaded.batch_size, 10);
    }
}
