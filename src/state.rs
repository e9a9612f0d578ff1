//! Shared application state: configuration, the open database, and the
//! optimistic mutation coordinator.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::db::GoalDb;
use crate::pending::MutationTracker;
use crate::types::Config;

/// State shared by the service layer and the hosting shell.
pub struct EngineState {
    pub config: Mutex<Option<Config>>,
    pub db: Mutex<Option<GoalDb>>,
    pub pending: Arc<MutationTracker>,
}

impl EngineState {
    pub fn new() -> Self {
        let config = load_config().ok();
        if let Some(ref c) = config {
            crate::db::set_dev_db_mode(c.dev_mode);
        }

        let db = match GoalDb::open() {
            Ok(db) => Some(db),
            Err(e) => {
                log::warn!("Failed to open goals database: {e}. Store features disabled.");
                None
            }
        };

        Self {
            config: Mutex::new(config),
            db: Mutex::new(db),
            pending: Arc::new(MutationTracker::new()),
        }
    }

    /// Run a closure against the open database, or fail with a message the
    /// UI can show directly.
    pub fn with_db<T>(&self, f: impl FnOnce(&GoalDb) -> Result<T, String>) -> Result<T, String> {
        let guard = self.db.lock();
        let db = guard.as_ref().ok_or("Database not initialized")?;
        f(db)
    }
}

impl Default for EngineState {
    fn default() -> Self {
        Self::new()
    }
}

/// Get the canonical config file path (~/.goaldeck/config.json)
pub fn config_path() -> Result<PathBuf, String> {
    let home = dirs::home_dir().ok_or("Could not find home directory")?;
    Ok(home.join(".goaldeck").join("config.json"))
}

/// Load configuration from ~/.goaldeck/config.json. A missing file yields
/// the defaults; a malformed file is an error worth surfacing.
pub fn load_config() -> Result<Config, String> {
    let path = config_path()?;
    if !path.exists() {
        return Ok(Config::default());
    }

    let content =
        fs::read_to_string(&path).map_err(|e| format!("Failed to read config: {}", e))?;
    serde_json::from_str(&content).map_err(|e| format!("Failed to parse config: {}", e))
}

/// Create or update config.json atomically.
///
/// Clones the in-memory config (or defaults on first run), applies the
/// mutator, ensures ~/.goaldeck/ exists, writes, and updates memory.
pub fn create_or_update_config(
    state: &EngineState,
    mutator: impl FnOnce(&mut Config),
) -> Result<Config, String> {
    let mut guard = state.config.lock();

    let mut config = guard.clone().unwrap_or_default();
    mutator(&mut config);

    let path = config_path()?;
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| format!("Failed to create config dir: {}", e))?;
        }
    }

    let content = serde_json::to_string_pretty(&config)
        .map_err(|e| format!("Failed to serialize config: {}", e))?;
    fs::write(&path, content).map_err(|e| format!("Failed to write config: {}", e))?;

    *guard = Some(config.clone());
    Ok(config)
}

/// Reload configuration from disk.
pub fn reload_config(state: &EngineState) -> Result<Config, String> {
    let config = load_config()?;
    let mut guard = state.config.lock();
    *guard = Some(config.clone());
    Ok(config)
}
