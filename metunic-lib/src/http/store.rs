//! Persistence backends for session cookie jars.
//!
//! A session survives process restarts by writing its jar through a
//! [`SessionStore`]. The store is injected into the client, so tests and
//! embedders can keep sessions in memory or in an external cache instead
//! of on disk.

use super::cookies::CookieJar;
use crate::error::MetunicError;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Load/save/clear cookie jars by session key.
pub trait SessionStore: Send + Sync + fmt::Debug {
    /// The stored jar, or `None` when nothing was saved for `key`.
    fn load(&self, key: &str) -> Result<Option<CookieJar>, MetunicError>;

    fn save(&self, key: &str, jar: &CookieJar) -> Result<(), MetunicError>;

    /// Remove the stored jar. Clearing a missing entry is not an error.
    fn clear(&self, key: &str) -> Result<(), MetunicError>;
}

/// One JSON file per session key inside a directory.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File holding the jar for `key`.
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("metunic_session_{}.json", key))
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self, key: &str) -> Result<Option<CookieJar>, MetunicError> {
        let path = self.path_for(key);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(MetunicError::file_error(
                    path.to_string_lossy(),
                    format!("Failed to read session file: {}", e),
                ))
            }
        };

        let mut jar: CookieJar = serde_json::from_str(&content).map_err(|e| {
            MetunicError::file_error(
                path.to_string_lossy(),
                format!("Corrupt session file: {}", e),
            )
        })?;
        jar.purge_expired();
        Ok(Some(jar))
    }

    fn save(&self, key: &str, jar: &CookieJar) -> Result<(), MetunicError> {
        let path = self.path_for(key);
        fs::create_dir_all(&self.dir).map_err(|e| {
            MetunicError::file_error(
                self.dir.to_string_lossy(),
                format!("Failed to create session directory: {}", e),
            )
        })?;
        let content = serde_json::to_string(jar)?;

        // Write-then-rename so a concurrent reader never sees half a file.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, content)
            .and_then(|_| restrict_permissions(&tmp))
            .and_then(|_| fs::rename(&tmp, &path))
            .map_err(|e| {
                MetunicError::file_error(
                    path.to_string_lossy(),
                    format!("Failed to write session file: {}", e),
                )
            })
    }

    fn clear(&self, key: &str) -> Result<(), MetunicError> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(MetunicError::file_error(
                path.to_string_lossy(),
                format!("Failed to remove session file: {}", e),
            )),
        }
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

/// Process-local store, mostly for tests and short-lived tools.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    jars: Mutex<HashMap<String, CookieJar>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate a jar, e.g. to simulate a session left by an earlier run.
    pub fn with_jar<K: Into<String>>(self, key: K, jar: CookieJar) -> Self {
        self.jars
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), jar);
        self
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self, key: &str) -> Result<Option<CookieJar>, MetunicError> {
        Ok(self
            .jars
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned())
    }

    fn save(&self, key: &str, jar: &CookieJar) -> Result<(), MetunicError> {
        self.jars
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), jar.clone());
        Ok(())
    }

    fn clear(&self, key: &str) -> Result<(), MetunicError> {
        self.jars
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }
}
