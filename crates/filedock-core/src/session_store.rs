//! Scoped key-value storage for the session token.
//!
//! The controller only ever touches [`TOKEN_KEY`], but the stores accept any
//! key so that other per-user values can live next to it.

use anyhow::{anyhow, Context, Result};
use keyring::Entry;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

use crate::config::{ClientConfig, SessionStoreKind};

pub const TOKEN_KEY: &str = "authToken";

const SERVICE_NAME: &str = "filedock";
const SESSION_FILE: &str = "session.json";

pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    /// Removing a key that is not present succeeds.
    fn remove(&self, key: &str) -> Result<()>;
}

impl<S: SessionStore + ?Sized> SessionStore for Arc<S> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<()> {
        (**self).remove(key)
    }
}

impl<S: SessionStore + ?Sized> SessionStore for Box<S> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<()> {
        (**self).remove(key)
    }
}

pub fn open_store(config: &ClientConfig) -> Result<Box<dyn SessionStore>> {
    Ok(match config.session_store {
        SessionStoreKind::Keyring => Box::new(KeyringStore::new(config.api_base_url.clone())),
        SessionStoreKind::File => Box::new(FileStore::new(config.resolved_data_dir()?)),
        SessionStoreKind::Memory => Box::new(MemoryStore::default()),
    })
}

// ── OS credential store ──────────────────────────────────────────────────────

/// Entries are named `<scope>:<key>` under the `filedock` service, so two
/// servers never share a token.
pub struct KeyringStore {
    scope: String,
}

impl KeyringStore {
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
        }
    }

    fn entry(&self, key: &str) -> Result<Entry> {
        Entry::new(SERVICE_NAME, &format!("{}:{}", self.scope, key))
            .map_err(|e| anyhow!("keyring init: {e}"))
    }
}

impl SessionStore for KeyringStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(anyhow!("load {key}: {e}")),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entry(key)?
            .set_password(value)
            .map_err(|e| anyhow!("store {key}: {e}"))
    }

    fn remove(&self, key: &str) -> Result<()> {
        match self.entry(key)?.delete_password() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(anyhow!("delete {key}: {e}")),
        }
    }
}

// ── JSON file ────────────────────────────────────────────────────────────────

pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self::at(data_dir.as_ref().join(SESSION_FILE))
    }

    pub fn at(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> Result<BTreeMap<String, String>> {
        match std::fs::read(&self.path) {
            Ok(data) if data.is_empty() => Ok(BTreeMap::new()),
            Ok(data) => serde_json::from_slice(&data)
                .with_context(|| format!("parse {}", self.path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e).with_context(|| format!("read {}", self.path.display())),
        }
    }

    fn write_map(&self, map: &BTreeMap<String, String>) -> Result<()> {
        let dir = self
            .path
            .parent()
            .ok_or_else(|| anyhow!("session file has no parent directory"))?;
        std::fs::create_dir_all(dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&serde_json::to_vec_pretty(map)?)?;
        tmp.flush()?;
        tmp.persist(&self.path)
            .map_err(|e| anyhow!("write {}: {}", self.path.display(), e.error))?;
        Ok(())
    }
}

impl SessionStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let _guard = self.lock.lock();
        Ok(self.read_map()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.lock.lock();
        let mut map = self.read_map()?;
        map.insert(key.to_string(), value.to_string());
        self.write_map(&map)
    }

    /// A session file that no longer parses is replaced with an empty one.
    fn remove(&self, key: &str) -> Result<()> {
        let _guard = self.lock.lock();
        match self.read_map() {
            Ok(mut map) => {
                if map.remove(key).is_some() {
                    self.write_map(&map)?;
                }
                Ok(())
            }
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "resetting unreadable session file");
                self.write_map(&BTreeMap::new())
            }
        }
    }
}

// ── In-process ───────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl SessionStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.lock().remove(key);
        Ok(())
    }
}
