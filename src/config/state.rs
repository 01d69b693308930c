// Application state module
// Owns the configuration and the shared status cache

use std::path::PathBuf;
use std::sync::Arc;

use super::types::Config;
use crate::watch::StatusCache;

/// Application state shared by the refresher and every connection
pub struct AppState {
    pub config: Config,
    pub status: Arc<StatusCache>,
    /// Static asset root, resolved once at startup
    pub static_root: PathBuf,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        Self {
            config: config.clone(),
            status: Arc::new(StatusCache::new(&config.watch.path)),
            static_root: PathBuf::from(&config.http.static_dir),
        }
    }
}
