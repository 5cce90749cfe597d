// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Credential persistence: load/save to a JSON file with atomic writes.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::credential::{CredentialPair, CredentialStore};

/// File name of the persisted session inside the state directory.
pub const SESSION_FILE: &str = "session.json";

/// On-disk layout. Versioned so a future format change can be detected.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistedSession {
    #[serde(default = "default_version")]
    version: u32,
    #[serde(flatten)]
    pair: CredentialPair,
}

fn default_version() -> u32 {
    1
}

/// Credential store backed by a JSON file, with an in-memory copy.
///
/// Reads come from memory. A write is cached only once it reached disk; a
/// failed write is logged and the store then reports no credential.
pub struct FileStore {
    path: PathBuf,
    cached: Mutex<Option<CredentialPair>>,
}

impl FileStore {
    /// Open the store at `path`, loading any previously persisted pair.
    ///
    /// A missing, unreadable or corrupt file yields an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let cached = match load(&path) {
            Ok(pair) => pair,
            Err(e) => {
                tracing::warn!(path = %path.display(), err = %e, "ignoring unreadable session file");
                None
            }
        };
        Self { path, cached: Mutex::new(cached) }
    }

    /// Open `session.json` inside `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Self::open(dir.join(SESSION_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for FileStore {
    fn get(&self) -> Option<CredentialPair> {
        self.cached.lock().clone()
    }

    fn set(&self, pair: CredentialPair) {
        let mut cached = self.cached.lock();
        match save(&self.path, &pair) {
            Ok(()) => *cached = Some(pair),
            Err(e) => {
                // An unusable medium reads as "no credential".
                tracing::warn!(path = %self.path.display(), err = %e, "failed to persist session");
                *cached = None;
            }
        }
    }

    fn clear(&self) {
        let mut cached = self.cached.lock();
        *cached = None;
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %self.path.display(), err = %e, "failed to remove session file");
            }
        }
    }
}

/// Load a persisted pair. `Ok(None)` when the file does not exist.
pub fn load(path: &Path) -> anyhow::Result<Option<CredentialPair>> {
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let session: PersistedSession = serde_json::from_str(&contents)?;
    if session.version != 1 {
        anyhow::bail!("unsupported session file version: {}", session.version);
    }
    Ok(Some(session.pair))
}

/// Save a pair atomically (write tmp + rename).
///
/// Uses a unique temp filename (PID + counter) so concurrent saves never
/// share a `.tmp` file.
pub fn save(path: &Path, pair: &CredentialPair) -> anyhow::Result<()> {
    use std::sync::atomic::{AtomicU32, Ordering};
    static COUNTER: AtomicU32 = AtomicU32::new(0);

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let session = PersistedSession { version: 1, pair: pair.clone() };
    let json = serde_json::to_string_pretty(&session)?;
    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    let tmp_name = format!(
        "{}.{}.{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy(),
        std::process::id(),
        seq,
    );
    let tmp_path = path.with_file_name(tmp_name);
    std::fs::write(&tmp_path, json)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

#[cfg(test)]
#[path = "persist_tests.rs"]
mod tests;
