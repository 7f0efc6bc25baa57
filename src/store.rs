//! # Durable Key-Value Storage
//!
//! The session persists its token and rotating session key, and the vault
//! persists the password-sealed service endpoint. Both only need string keys
//! and string values, so [`Store`] is deliberately that small.
//!
//! [`MemoryStore`] backs tests and short-lived tools; [`FileStore`] keeps a
//! single JSON object on disk and rewrites it on every change.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use hashbrown::HashMap;

use crate::config::STORE_SERVICE_PATH;
use crate::envelope;
use crate::error::{Error, Result};
use crate::secret::Password;

/// Durable string-to-string persistence.
pub trait Store: Send + Sync + 'static {
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>>> + Send;

    fn set(&self, key: &str, value: &str) -> impl Future<Output = Result<()>> + Send;

    fn remove(&self, key: &str) -> impl Future<Output = Result<()>> + Send;
}

/// In-process store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Store for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries().insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries().remove(key);
        Ok(())
    }
}

/// A JSON object file. Writes go to a sibling temporary file which then
/// replaces the original, so a crash never leaves a half-written store.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: tokio::sync::Mutex<HashMap<String, String>>,
}

impl FileStore {
    /// Opens the store at `path`; a missing file is an empty store.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let entries = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => HashMap::new(),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| Error::Storage(format!("{} is not a store file: {e}", path.display())))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };

        tracing::debug!(path = %path.display(), entries = entries.len(), "opened file store");
        Ok(Self { path, entries: tokio::sync::Mutex::new(entries) })
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, entries: &HashMap<String, String>) -> Result<()> {
        let json = serde_json::to_vec_pretty(entries).map_err(|e| Error::Storage(format!("store serialization failed: {e}")))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        Ok(())
    }
}

impl Store for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock().await;
        entries.insert(key.to_owned(), value.to_owned());
        self.persist(&entries).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock().await;
        if entries.remove(key).is_some() {
            self.persist(&entries).await?;
        }

        Ok(())
    }
}

/// Outcome of pinning an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pinned {
    /// An endpoint was already stored and equals the candidate.
    Matched,
    /// Nothing was stored; the candidate is now the trusted endpoint.
    Stored,
}

/// The service endpoint, sealed under the user's password in a [`Store`].
pub struct EndpointVault<'a, S: Store> {
    store: &'a S,
}

impl<'a, S: Store> EndpointVault<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Returns true if an endpoint is stored, without decrypting it.
    pub async fn is_provisioned(&self) -> Result<bool> {
        Ok(self.store.get(STORE_SERVICE_PATH).await?.is_some_and(|token| !token.is_empty()))
    }

    /// Decrypts the stored endpoint, if any.
    pub async fn load(&self, password: &Password) -> Result<Option<String>> {
        match self.store.get(STORE_SERVICE_PATH).await? {
            Some(token) if !token.is_empty() => envelope::open_blocking(token, password.clone()).await.map(Some),
            _ => Ok(None),
        }
    }

    /// Seals `url` under `password` and stores it, replacing any previous endpoint.
    pub async fn store(&self, url: &str, password: &Password) -> Result<()> {
        let token = envelope::seal_blocking(url.to_owned(), password.clone()).await?;
        self.store.set(STORE_SERVICE_PATH, &token).await
    }

    /// Compares `url` with the stored endpoint, storing it if none exists.
    pub async fn pin(&self, url: &str, password: &Password) -> Result<Pinned> {
        match self.load(password).await? {
            Some(stored) if stored == url => Ok(Pinned::Matched),
            Some(_) => {
                tracing::warn!("endpoint does not match the stored endpoint");
                Err(Error::EndpointMismatch)
            }
            None => {
                self.store(url, password).await?;
                tracing::info!("pinned new service endpoint");
                Ok(Pinned::Stored)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryStore::new();
        assert_eq!(store.get("k").await.unwrap(), None);

        store.set("k", "v").await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));

        store.remove("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_file_store_persists_across_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.json");

        let store = FileStore::open(&path).await.unwrap();
        store.set("user_token", "tok").await.unwrap();
        store.set("session_key", "key").await.unwrap();
        store.remove("session_key").await.unwrap();
        drop(store);

        let reopened = FileStore::open(&path).await.unwrap();
        assert_eq!(reopened.get("user_token").await.unwrap().as_deref(), Some("tok"));
        assert_eq!(reopened.get("session_key").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_file_store_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        tokio::fs::write(&path, b"[1, 2, 3]").await.unwrap();

        assert!(matches!(FileStore::open(&path).await, Err(Error::Storage(_))));
    }

    #[tokio::test]
    async fn test_vault_pins_first_endpoint() {
        let store = MemoryStore::new();
        let vault = EndpointVault::new(&store);
        let password = Password::new("pw");

        assert!(!vault.is_provisioned().await.unwrap());
        assert_eq!(vault.pin("https://a.example/ep", &password).await.unwrap(), Pinned::Stored);
        assert!(vault.is_provisioned().await.unwrap());

        // Stored sealed, never in the clear.
        let raw = store.get(STORE_SERVICE_PATH).await.unwrap().unwrap();
        assert!(!raw.contains("a.example"));
        assert_eq!(vault.load(&password).await.unwrap().as_deref(), Some("https://a.example/ep"));
    }

    #[tokio::test]
    async fn test_vault_matches_and_mismatches() {
        let store = MemoryStore::new();
        let vault = EndpointVault::new(&store);
        let password = Password::new("pw");
        vault.store("https://a.example/ep", &password).await.unwrap();

        assert_eq!(vault.pin("https://a.example/ep", &password).await.unwrap(), Pinned::Matched);
        assert!(matches!(vault.pin("https://b.example/ep", &password).await, Err(Error::EndpointMismatch)));
        assert_eq!(vault.load(&password).await.unwrap().as_deref(), Some("https://a.example/ep"));
    }

    #[tokio::test]
    async fn test_vault_wrong_password() {
        let store = MemoryStore::new();
        let vault = EndpointVault::new(&store);
        vault.store("https://a.example/ep", &Password::new("right")).await.unwrap();

        assert!(matches!(vault.load(&Password::new("wrong")).await, Err(Error::DecryptionFailed)));
    }
}
