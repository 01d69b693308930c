//! Watched status file module
//!
//! Reads the single JSON status file, keyed on its modification time so an
//! unchanged file is never re-parsed, and keeps the last good document warm
//! for the request handlers.

pub mod refresh;

use chrono::{DateTime, Local};
use serde_json::Value;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncReadExt;
use tokio::sync::{Mutex, RwLock};

pub use refresh::spawn_refresher;

/// Failure to turn the watched file into a document
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid JSON in {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// One successfully parsed version of the watched file
#[derive(Debug)]
pub struct CacheEntry {
    pub document: Value,
    /// Modification time the document was read at
    pub modified: SystemTime,
    /// Wall-clock time of the read
    pub read_at: DateTime<Local>,
}

/// Outcome of a single load
#[derive(Debug, Clone)]
pub enum StatusSnapshot {
    /// The watched file does not exist
    Missing,
    Document(Arc<CacheEntry>),
    Failed(String),
}

impl StatusSnapshot {
    /// JSON body served by the status endpoint
    pub fn to_json(&self) -> Value {
        match self {
            Self::Missing => Value::Null,
            Self::Document(entry) => entry.document.clone(),
            Self::Failed(message) => serde_json::json!({ "error": message }),
        }
    }
}

/// Cached reader for the watched file, shared by the refresher and requests
pub struct StatusCache {
    path: PathBuf,
    entry: RwLock<Option<Arc<CacheEntry>>>,
    // Serialises reloads so one mtime change is parsed once
    reload: Mutex<()>,
    parses: AtomicU64,
}

impl StatusCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entry: RwLock::new(None),
            reload: Mutex::new(()),
            parses: AtomicU64::new(0),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of times the file has actually been parsed
    pub fn parse_count(&self) -> u64 {
        self.parses.load(Ordering::Relaxed)
    }

    /// When the cached document was read, if one has been loaded
    pub async fn last_read(&self) -> Option<DateTime<Local>> {
        self.entry.read().await.as_ref().map(|entry| entry.read_at)
    }

    /// Return the current contents of the watched file.
    ///
    /// A missing file is reported as [`StatusSnapshot::Missing`]. When the
    /// modification time matches the cached entry the cached document is
    /// returned without touching the file contents. Read and parse failures
    /// come back as [`StatusSnapshot::Failed`] and leave the cache untouched.
    pub async fn load(&self) -> StatusSnapshot {
        let modified = match self.modified().await {
            Ok(Some(modified)) => modified,
            Ok(None) => return StatusSnapshot::Missing,
            Err(e) => return StatusSnapshot::Failed(e.to_string()),
        };

        if let Some(entry) = self.cached_at(modified).await {
            return StatusSnapshot::Document(entry);
        }

        let _reload = self.reload.lock().await;
        // Another caller may have reloaded this version while we waited
        if let Some(entry) = self.cached_at(modified).await {
            return StatusSnapshot::Document(entry);
        }

        match self.read_document().await {
            Ok((document, modified)) => {
                let entry = Arc::new(CacheEntry {
                    document,
                    modified,
                    read_at: Local::now(),
                });
                *self.entry.write().await = Some(Arc::clone(&entry));
                StatusSnapshot::Document(entry)
            }
            Err(e) => StatusSnapshot::Failed(e.to_string()),
        }
    }

    async fn modified(&self) -> Result<Option<SystemTime>, ReadError> {
        let metadata = match fs::metadata(&self.path).await {
            Ok(m) => m,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(e)),
        };
        metadata.modified().map(Some).map_err(|e| self.io_error(e))
    }

    async fn cached_at(&self, modified: SystemTime) -> Option<Arc<CacheEntry>> {
        self.entry
            .read()
            .await
            .as_ref()
            .filter(|entry| entry.modified == modified)
            .map(Arc::clone)
    }

    /// Read and parse the file, taking the mtime from the opened handle so
    /// the document and its timestamp always describe the same version.
    async fn read_document(&self) -> Result<(Value, SystemTime), ReadError> {
        let mut file = fs::File::open(&self.path)
            .await
            .map_err(|e| self.io_error(e))?;
        let modified = file
            .metadata()
            .await
            .and_then(|m| m.modified())
            .map_err(|e| self.io_error(e))?;

        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)
            .await
            .map_err(|e| self.io_error(e))?;

        self.parses.fetch_add(1, Ordering::Relaxed);
        let document = serde_json::from_slice(&bytes).map_err(|source| ReadError::Parse {
            path: self.path.clone(),
            source,
        })?;
        Ok((document, modified))
    }

    fn io_error(&self, source: io::Error) -> ReadError {
        ReadError::Io {
            path: self.path.clone(),
            source,
        }
    }
}
