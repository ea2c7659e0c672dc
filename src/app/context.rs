use std::path::PathBuf;
use std::sync::Arc;

use crate::api::{self, NewsApi};
use crate::app::error::{Result, TidingsError};
use crate::config::Config;
use crate::store::sqlite::SqliteStore;
use crate::sync::SyncPrefs;

/// Wires together the pieces a command needs: the local cache, the loaded
/// configuration, and an API client built on demand from stored credentials.
pub struct AppContext {
    pub store: Arc<SqliteStore>,
    pub config: Config,
    config_path: Option<PathBuf>,
}

impl AppContext {
    pub fn new(config_path: Option<PathBuf>, db_path: Option<PathBuf>) -> Result<Self> {
        let config = Config::load(config_path.as_deref())
            .map_err(|e| TidingsError::Config(e.to_string()))?;

        let db_path = match db_path {
            Some(p) => p,
            None => Self::default_db_path()?,
        };
        let store = Arc::new(SqliteStore::new(&db_path)?);

        Ok(Self {
            store,
            config,
            config_path,
        })
    }

    pub fn in_memory() -> Result<Self> {
        Ok(Self {
            store: Arc::new(SqliteStore::in_memory()?),
            config: Config::default(),
            config_path: None,
        })
    }

    /// Persist configuration changes (credentials, ETag, flags).
    pub fn save_config(&self) -> Result<()> {
        self.config
            .save(self.config_path.as_deref())
            .map_err(|e| TidingsError::Config(e.to_string()))
    }

    /// Build an API client for the level detected at login.
    pub fn api(&self) -> Result<Box<dyn NewsApi>> {
        api::client_from_config(&self.config)
    }

    pub fn sync_prefs(&self) -> SyncPrefs {
        SyncPrefs {
            etag: self.config.state.etag.clone(),
            max_items: self.config.sync.max_items,
        }
    }

    fn default_db_path() -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| TidingsError::Config("Could not find data directory".into()))?;
        let tidings_dir = data_dir.join("tidings");
        std::fs::create_dir_all(&tidings_dir)?;
        Ok(tidings_dir.join("tidings.db"))
    }
}
