use anyhow::{anyhow, Context, Result};
use directories::ProjectDirs;
use log::warn;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::{Arc, RwLock},
};

use crate::{
    db::Database,
    remote::{FirebaseStore, MemoryStore, RemoteStore},
};

/// Overrides the config file location.
pub const CONFIG_ENV: &str = "RELATIVE_LOCATION_CONFIG";

const DB_FILE_NAME: &str = "measurements.sqlite3";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum BackendSettings {
    /// Local SQLite file; `None` means the platform data directory.
    #[serde(rename_all = "camelCase")]
    Sqlite { path: Option<PathBuf> },
    #[serde(rename_all = "camelCase")]
    Firebase {
        database_url: String,
        auth_token: Option<String>,
    },
    /// Process-local, forgotten on exit.
    Memory,
}

impl Default for BackendSettings {
    fn default() -> Self {
        BackendSettings::Sqlite { path: None }
    }
}

impl BackendSettings {
    /// Open the configured backend behind the remote store interface.
    pub fn open(&self) -> Result<Arc<dyn RemoteStore>> {
        match self {
            BackendSettings::Sqlite { path } => {
                let path = match path {
                    Some(path) => path.clone(),
                    None => default_db_path()
                        .ok_or_else(|| anyhow!("no data directory available for the database"))?,
                };
                Ok(Arc::new(Database::new(path)?))
            }
            BackendSettings::Firebase {
                database_url,
                auth_token,
            } => {
                let mut store = FirebaseStore::new(database_url.as_str())?;
                if let Some(token) = auth_token {
                    store = store.with_auth_token(token.as_str());
                }
                Ok(Arc::new(store))
            }
            BackendSettings::Memory => {
                warn!("Memory backend keeps nothing after this process exits");
                Ok(Arc::new(MemoryStore::new()))
            }
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    #[serde(default)]
    pub backend: BackendSettings,
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "example", "relativelocation")
}

/// `RELATIVE_LOCATION_CONFIG`, else `config.json` in the platform config dir.
pub fn default_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }
    project_dirs().map(|dirs| dirs.config_dir().join("config.json"))
}

pub fn default_db_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.data_local_dir().join(DB_FILE_NAME))
}

pub struct ConfigStore {
    path: PathBuf,
    data: RwLock<AppConfig>,
}

impl ConfigStore {
    /// Load `path`, falling back to defaults when it is missing or unparsable.
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!("Ignoring unreadable config {}: {err}", path.display());
                AppConfig::default()
            })
        } else {
            AppConfig::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> AppConfig {
        match self.data.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn update_backend(&self, backend: BackendSettings) -> Result<()> {
        let mut guard = match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.backend = backend;
        self.persist(&guard)
    }

    fn persist(&self, data: &AppConfig) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create config directory {}", parent.display())
                })?;
            }
        }

        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write config to {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let store = ConfigStore::new(dir.path().join("config.json")).unwrap();
        assert_eq!(store.config(), AppConfig::default());
        assert_eq!(store.config().backend, BackendSettings::Sqlite { path: None });
    }

    #[test]
    fn garbage_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();

        let store = ConfigStore::new(path).unwrap();
        assert_eq!(store.config(), AppConfig::default());
    }

    #[test]
    fn backend_update_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let store = ConfigStore::new(path.clone()).unwrap();
        let backend = BackendSettings::Firebase {
            database_url: "https://demo.firebaseio.com".into(),
            auth_token: Some("secret".into()),
        };
        store.update_backend(backend.clone()).unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"kind\": \"firebase\""));
        assert!(raw.contains("\"databaseUrl\""));

        let reloaded = ConfigStore::new(path).unwrap();
        assert_eq!(reloaded.config().backend, backend);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{}").unwrap();

        let config = ConfigStore::new(path).unwrap().config();
        assert_eq!(config.backend, BackendSettings::default());
    }

    #[test]
    fn sqlite_without_path_field_parses() {
        let config: AppConfig =
            serde_json::from_str(r#"{ "backend": { "kind": "sqlite" } }"#).unwrap();
        assert_eq!(config.backend, BackendSettings::Sqlite { path: None });
    }

    #[tokio::test]
    async fn opens_configured_sqlite_file() {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("m.sqlite3");
        let backend = BackendSettings::Sqlite {
            path: Some(db_path.clone()),
        };

        let remote = backend.open().unwrap();
        let path = crate::remote::KeyPath::root("measurements").unwrap();
        assert!(remote.read_children(&path).await.unwrap().is_empty());
        assert!(db_path.exists());
    }

    #[test]
    fn firebase_backend_validates_url() {
        let backend = BackendSettings::Firebase {
            database_url: "not-a-url".into(),
            auth_token: None,
        };
        assert!(backend.open().is_err());
    }
}
