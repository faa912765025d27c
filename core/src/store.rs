use anyhow::{Context, Result};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Keys the client persists between runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CredentialKey {
    AccessToken,
    RefreshToken,
    DemoMode,
}

impl CredentialKey {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AccessToken => "access_token",
            Self::RefreshToken => "refresh_token",
            Self::DemoMode => "demo_mode",
        }
    }
}

/// Durable key/value storage for session credentials.
pub trait CredentialStore: Send + Sync {
    fn get(&self, key: CredentialKey) -> Option<String>;
    fn set(&self, key: CredentialKey, value: &str) -> Result<()>;
    fn remove(&self, key: CredentialKey) -> Result<()>;
    /// Drop every stored value.
    fn clear(&self) -> Result<()>;
}

#[derive(Clone, Default)]
pub struct MemoryCredentialStore {
    values: Arc<RwLock<BTreeMap<&'static str, String>>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tokens(access_token: &str, refresh_token: &str) -> Self {
        let store = Self::new();
        {
            let mut values = store.values.write();
            values.insert(CredentialKey::AccessToken.as_str(), access_token.to_owned());
            values.insert(CredentialKey::RefreshToken.as_str(), refresh_token.to_owned());
        }
        store
    }

    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self, key: CredentialKey) -> Option<String> {
        self.values.read().get(key.as_str()).cloned()
    }

    fn set(&self, key: CredentialKey, value: &str) -> Result<()> {
        self.values.write().insert(key.as_str(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: CredentialKey) -> Result<()> {
        self.values.write().remove(key.as_str());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.values.write().clear();
        Ok(())
    }
}

/// Credentials kept in a JSON file, cached in memory after the first read.
#[derive(Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
    cache: Arc<RwLock<BTreeMap<String, String>>>,
}

impl FileCredentialStore {
    pub fn open(root: &Path) -> Result<Self> {
        fs::create_dir_all(root)
            .with_context(|| format!("failed to create {}", root.display()))?;
        let path = root.join("credentials.json");
        let cache = match fs::read_to_string(&path) {
            Ok(contents) if contents.trim().is_empty() => BTreeMap::new(),
            Ok(contents) => serde_json::from_str(&contents)
                .with_context(|| format!("invalid credentials file {}", path.display()))?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => {
                return Err(err).with_context(|| format!("failed to read {}", path.display()))
            }
        };
        Ok(Self {
            path,
            cache: Arc::new(RwLock::new(cache)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, values: &BTreeMap<String, String>) -> Result<()> {
        if values.is_empty() {
            match fs::remove_file(&self.path) {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
                Err(err) => {
                    return Err(err)
                        .with_context(|| format!("failed to remove {}", self.path.display()))
                }
            }
        }
        let serialized = serde_json::to_vec_pretty(values)?;
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, serialized)
            .with_context(|| format!("failed to write {}", staging.display()))?;
        fs::rename(&staging, &self.path)
            .with_context(|| format!("failed to replace {}", self.path.display()))?;
        Ok(())
    }
}

impl CredentialStore for FileCredentialStore {
    fn get(&self, key: CredentialKey) -> Option<String> {
        self.cache.read().get(key.as_str()).cloned()
    }

    fn set(&self, key: CredentialKey, value: &str) -> Result<()> {
        let mut cache = self.cache.write();
        let mut next = cache.clone();
        next.insert(key.as_str().to_owned(), value.to_owned());
        self.flush(&next)?;
        *cache = next;
        Ok(())
    }

    fn remove(&self, key: CredentialKey) -> Result<()> {
        let mut cache = self.cache.write();
        if !cache.contains_key(key.as_str()) {
            return Ok(());
        }
        let mut next = cache.clone();
        next.remove(key.as_str());
        self.flush(&next)?;
        *cache = next;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut cache = self.cache.write();
        self.flush(&BTreeMap::new())?;
        cache.clear();
        Ok(())
    }
}
