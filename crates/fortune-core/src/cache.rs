//! Single-slot cache of the last known good device address
//!
//! The cache is an optimization: reads degrade to "absent" and writes are
//! best effort. There is no locking. Every writer has just confirmed the
//! address it writes, so whichever write lands last is still valid.

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::lookup::Lookup;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("refusing to cache an empty address")]
    EmptyAddress,
}

/// File-backed holder of one trimmed address
#[derive(Debug, Clone)]
pub struct HostCache {
    path: PathBuf,
}

impl HostCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the cached address, reporting why nothing came back
    pub fn load(&self) -> Lookup<String> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => {
                let address = content.trim();
                if address.is_empty() {
                    Lookup::Absent
                } else {
                    Lookup::Found(address.to_string())
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Lookup::Absent,
            Err(e) => Lookup::Failed(e.to_string()),
        }
    }

    /// Read the cached address; never fails
    pub fn read(&self) -> Option<String> {
        match self.load() {
            Lookup::Failed(reason) => {
                debug!(path = %self.path.display(), error = %reason, "Host cache unreadable");
                None
            }
            other => other.found(),
        }
    }

    /// Persist an address, replacing whatever was there
    pub fn store(&self, address: &str) -> Result<(), CacheError> {
        let address = address.trim();
        if address.is_empty() {
            return Err(CacheError::EmptyAddress);
        }
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, address)?;
        Ok(())
    }

    /// Persist an address, swallowing any error
    pub fn write(&self, address: &str) {
        match self.store(address) {
            Ok(()) => debug!(path = %self.path.display(), address = %address.trim(), "Cached host"),
            Err(e) => debug!(path = %self.path.display(), error = %e, "Failed to cache host"),
        }
    }
}
