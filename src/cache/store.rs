// Two-tier store for repository detail documents.
// An in-memory map in front of one JSON file per repository; disk failures never surface.

use std::collections::HashMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use crate::error::{RepoBarError, Result};

use super::detail::{CacheKey, RepoDetailCache};
use super::paths::detail_cache_path;

/// Memory + disk cache of [`RepoDetailCache`] documents.
///
/// The memory tier is authoritative for the lifetime of the process; the disk tier
/// only lets documents survive restarts.
#[derive(Debug, Default)]
pub struct DetailCacheStore {
    base_dir: Option<PathBuf>,
    memory: Mutex<HashMap<CacheKey, RepoDetailCache>>,
}

impl DetailCacheStore {
    /// Store persisting documents under `base_dir`.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: Some(base_dir.into()),
            memory: Mutex::default(),
        }
    }

    /// Store without a disk tier.
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn base_dir(&self) -> Option<&Path> {
        self.base_dir.as_deref()
    }

    fn memory(&self) -> MutexGuard<'_, HashMap<CacheKey, RepoDetailCache>> {
        self.memory.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Load a document, promoting it from disk on a memory miss.
    ///
    /// Unknown repositories and unreadable files yield an empty document.
    pub fn load(&self, key: &CacheKey) -> RepoDetailCache {
        if let Some(document) = self.memory().get(key) {
            return document.clone();
        }
        let Some(base) = &self.base_dir else {
            return RepoDetailCache::default();
        };

        let path = detail_cache_path(base, key);
        match read_document(&path) {
            Ok(Some(document)) => {
                debug!(path = %path.display(), "loaded detail cache from disk");
                self.memory().insert(key.clone(), document.clone());
                document
            }
            Ok(None) => RepoDetailCache::default(),
            Err(RepoBarError::Json(e)) => {
                warn!(path = %path.display(), error = %e, "discarding corrupt detail cache");
                if let Err(e) = fs::remove_file(&path) {
                    warn!(path = %path.display(), error = %e, "failed to delete corrupt detail cache");
                }
                RepoDetailCache::default()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read detail cache");
                RepoDetailCache::default()
            }
        }
    }

    /// Save a document to memory, then best-effort to disk.
    pub fn save(&self, key: &CacheKey, document: &RepoDetailCache) {
        self.memory().insert(key.clone(), document.clone());

        if let Some(base) = &self.base_dir {
            let path = detail_cache_path(base, key);
            if let Err(e) = write_document(&path, document) {
                warn!(path = %path.display(), error = %e, "failed to persist detail cache");
            }
        }
    }

    /// Drop every document from memory and delete the base directory tree.
    pub fn clear(&self) {
        self.memory().clear();

        if let Some(base) = &self.base_dir {
            match fs::remove_dir_all(base) {
                Ok(()) => debug!(path = %base.display(), "cleared detail cache directory"),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(path = %base.display(), error = %e, "failed to clear detail cache directory")
                }
            }
        }
    }
}

/// Read a document from disk; a missing file is `Ok(None)`.
fn read_document(path: &Path) -> Result<Option<RepoDetailCache>> {
    let contents = match fs::read(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    Ok(Some(serde_json::from_slice(&contents)?))
}

/// Write a document atomically via a temp file.
fn write_document(path: &Path, document: &RepoDetailCache) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_vec_pretty(document)?;
    let temp_path = path.with_extension("json.tmp");
    let written = fs::File::create(&temp_path)
        .and_then(|mut file| {
            file.write_all(&json)?;
            file.sync_all()
        })
        .and_then(|()| fs::rename(&temp_path, path));

    if let Err(e) = written {
        // Only the final document may remain in the cache directory.
        let _ = fs::remove_file(&temp_path);
        return Err(e.into());
    }
    Ok(())
}
