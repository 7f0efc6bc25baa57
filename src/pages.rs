//! # Page Notebook
//!
//! A titled set of text pages stored on the service. The page list lives
//! under one remote key as a JSON array of `{key, title}`; each page body
//! lives under its own key (`page1`, `page2`, ...). Bodies are cached after
//! the first read.
//!
//! Every call goes through the [`Session`], so notebook operations queue
//! behind each other and behind any other session traffic.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::config::{PAGE_INDEX_KEY, PAGE_KEY_PREFIX};
use crate::error::{Error, Result};
use crate::session::{Session, Transport};
use crate::store::Store;

/// One entry of the page list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageEntry {
    pub key: String,
    pub title: String,
}

pub struct Notebook<'a, T, S> {
    session: &'a Session<T, S>,
    pages: Vec<PageEntry>,
    cache: HashMap<String, String>,
}

impl<'a, T: Transport, S: Store> Notebook<'a, T, S> {
    /// An empty notebook; call [`Notebook::load_index`] before reading pages.
    pub fn new(session: &'a Session<T, S>) -> Self {
        Self { session, pages: Vec::new(), cache: HashMap::new() }
    }

    #[inline]
    pub fn pages(&self) -> &[PageEntry] {
        &self.pages
    }

    pub fn find(&self, key: &str) -> Option<&PageEntry> {
        self.pages.iter().find(|page| page.key == key)
    }

    /// Fetches the page list. An unparseable list reads as empty.
    pub async fn load_index(&mut self) -> Result<&[PageEntry]> {
        let response = self.session.get(PAGE_INDEX_KEY, "[]").await?;
        let raw = response.value(PAGE_INDEX_KEY).filter(|raw| !raw.is_empty()).unwrap_or("[]");

        self.pages = serde_json::from_str(raw).unwrap_or_else(|e| {
            tracing::warn!("page list is not valid json, treating it as empty: {e}");
            Vec::new()
        });
        tracing::debug!(count = self.pages.len(), "page list loaded");

        Ok(&self.pages)
    }

    /// Returns a page body, from the cache unless `refresh` is set.
    pub async fn read(&mut self, key: &str, refresh: bool) -> Result<String> {
        if !refresh {
            if let Some(body) = self.cache.get(key) {
                return Ok(body.clone());
            }
        }

        let response = self.session.get(key, "").await?;
        let body = response.value(key).unwrap_or_default().to_owned();
        self.cache.insert(key.to_owned(), body.clone());

        Ok(body)
    }

    /// Adds a page and returns its key. The index is written before the body.
    pub async fn create(&mut self, title: &str, content: &str) -> Result<String> {
        let title = title.trim();
        if title.is_empty() {
            return Err(Error::InvalidInput("page title is required".into()));
        }

        let key = self.next_key();
        self.pages.push(PageEntry { key: key.clone(), title: title.to_owned() });
        if let Err(e) = self.save_index().await {
            self.pages.pop();
            return Err(e);
        }

        self.write(&key, content).await?;
        tracing::info!(key = %key, "page created");

        Ok(key)
    }

    /// Replaces the body of an existing page.
    pub async fn update(&mut self, key: &str, content: &str) -> Result<()> {
        self.require(key)?;
        self.write(key, content).await
    }

    /// Changes a page title; blank titles are ignored.
    pub async fn rename(&mut self, key: &str, title: &str) -> Result<()> {
        let title = title.trim();
        let index = self.require(key)?;
        if title.is_empty() || self.pages[index].title == title {
            return Ok(());
        }

        let previous = std::mem::replace(&mut self.pages[index].title, title.to_owned());
        if let Err(e) = self.save_index().await {
            self.pages[index].title = previous;
            return Err(e);
        }

        Ok(())
    }

    /// Removes a page from the list. The body stays on the server.
    pub async fn delete(&mut self, key: &str) -> Result<()> {
        let index = self.require(key)?;
        let removed = self.pages.remove(index);
        if let Err(e) = self.save_index().await {
            self.pages.insert(index, removed);
            return Err(e);
        }

        self.cache.remove(key);
        tracing::info!(key, "page deleted");

        Ok(())
    }

    async fn write(&mut self, key: &str, content: &str) -> Result<()> {
        self.session.set(key, content).await?;
        self.cache.insert(key.to_owned(), content.to_owned());
        Ok(())
    }

    async fn save_index(&self) -> Result<()> {
        let json = serde_json::to_string(&self.pages).map_err(|e| Error::Storage(format!("page list serialization failed: {e}")))?;
        self.session.set(PAGE_INDEX_KEY, &json).await?;
        Ok(())
    }

    fn require(&self, key: &str) -> Result<usize> {
        self.pages.iter().position(|page| page.key == key).ok_or_else(|| Error::UnknownPage(key.to_owned()))
    }

    /// `page{n}` for the smallest free n starting after the current count, so
    /// a deleted page's key is never handed to a new page while the old one is
    /// still listed.
    fn next_key(&self) -> String {
        (self.pages.len() + 1..)
            .map(|n| format!("{PAGE_KEY_PREFIX}{n}"))
            .find(|candidate| self.find(candidate).is_none())
            .unwrap_or_else(|| format!("{PAGE_KEY_PREFIX}{}", self.pages.len() + 1))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use serde_json::{Map, Value, json};

    use super::*;
    use crate::session::{Command, Response, SessionState};
    use crate::store::MemoryStore;

    /// A key-value service that answers `get` and `set` from a map.
    #[derive(Default)]
    struct FakeService {
        values: Mutex<Map<String, Value>>,
        fail_sets: Mutex<bool>,
    }

    impl Transport for Arc<FakeService> {
        async fn send(&self, _endpoint: &str, command: &Command) -> Result<Response> {
            let mut values = self.values.lock().unwrap();
            match command {
                Command::Get { key, default, .. } => {
                    let value = values.get(key).cloned().unwrap_or_else(|| json!(default));
                    let mut fields = Map::new();
                    fields.insert(key.clone(), value);
                    Ok(Response::new(fields))
                }
                Command::Set { .. } if *self.fail_sets.lock().unwrap() => Err(Error::Transport("offline".into())),
                Command::Set { key, value, .. } => {
                    values.insert(key.clone(), json!(value));
                    Response::from_value(json!({ "result": "ok" }))
                }
                _ => Response::from_value(json!({})),
            }
        }
    }

    fn session(service: &Arc<FakeService>) -> Session<Arc<FakeService>, MemoryStore> {
        let state = SessionState::restored(Some("t".into()), Some("k".into()));
        Session::with_state("https://a.example/ep", service.clone(), MemoryStore::new(), state)
    }

    #[tokio::test]
    async fn test_empty_notebook() {
        let service = Arc::new(FakeService::default());
        let session = session(&service);
        let mut notebook = Notebook::new(&session);

        assert!(notebook.load_index().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_read_update() {
        let service = Arc::new(FakeService::default());
        let session = session(&service);
        let mut notebook = Notebook::new(&session);
        notebook.load_index().await.unwrap();

        let key = notebook.create("  Groceries ", "milk").await.unwrap();
        assert_eq!(key, "page1");
        assert_eq!(notebook.find("page1").unwrap().title, "Groceries");

        notebook.update("page1", "milk, eggs").await.unwrap();
        assert_eq!(notebook.read("page1", true).await.unwrap(), "milk, eggs");

        let index: Vec<PageEntry> = serde_json::from_str(service.values.lock().unwrap()[PAGE_INDEX_KEY].as_str().unwrap()).unwrap();
        assert_eq!(index, vec![PageEntry { key: "page1".into(), title: "Groceries".into() }]);
    }

    #[tokio::test]
    async fn test_read_uses_cache() {
        let service = Arc::new(FakeService::default());
        service.values.lock().unwrap().insert("page1".into(), json!("first"));
        let session = session(&service);
        let mut notebook = Notebook::new(&session);

        assert_eq!(notebook.read("page1", false).await.unwrap(), "first");
        service.values.lock().unwrap().insert("page1".into(), json!("second"));
        assert_eq!(notebook.read("page1", false).await.unwrap(), "first");
        assert_eq!(notebook.read("page1", true).await.unwrap(), "second");
    }

    #[tokio::test]
    async fn test_create_rejects_blank_title() {
        let service = Arc::new(FakeService::default());
        let session = session(&service);
        let mut notebook = Notebook::new(&session);

        assert!(matches!(notebook.create("   ", "body").await, Err(Error::InvalidInput(_))));
        assert!(notebook.pages().is_empty());
    }

    #[tokio::test]
    async fn test_keys_never_collide_after_delete() {
        let service = Arc::new(FakeService::default());
        let session = session(&service);
        let mut notebook = Notebook::new(&session);

        notebook.create("one", "1").await.unwrap();
        notebook.create("two", "2").await.unwrap();
        notebook.delete("page1").await.unwrap();

        let key = notebook.create("three", "3").await.unwrap();
        assert_eq!(key, "page3");
        assert_eq!(notebook.read("page2", false).await.unwrap(), "2");
    }

    #[tokio::test]
    async fn test_rename_and_delete_persist_index() {
        let service = Arc::new(FakeService::default());
        let session = session(&service);
        let mut notebook = Notebook::new(&session);
        notebook.create("draft", "x").await.unwrap();
        notebook.rename("page1", "final").await.unwrap();

        let mut reloaded = Notebook::new(&session);
        assert_eq!(reloaded.load_index().await.unwrap()[0].title, "final");

        reloaded.delete("page1").await.unwrap();
        assert!(matches!(reloaded.delete("page1").await, Err(Error::UnknownPage(_))));
        assert!(Notebook::new(&session).load_index().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_index_write_rolls_back() {
        let service = Arc::new(FakeService::default());
        let session = session(&service);
        let mut notebook = Notebook::new(&session);
        notebook.create("kept", "x").await.unwrap();

        *service.fail_sets.lock().unwrap() = true;
        assert!(notebook.create("lost", "y").await.is_err());
        assert!(notebook.delete("page1").await.is_err());
        assert_eq!(notebook.pages().len(), 1);
        assert_eq!(notebook.pages()[0].title, "kept");
    }

    #[tokio::test]
    async fn test_garbage_index_reads_as_empty() {
        let service = Arc::new(FakeService::default());
        service.values.lock().unwrap().insert(PAGE_INDEX_KEY.into(), json!("{oops"));
        let session = session(&service);

        assert!(Notebook::new(&session).load_index().await.unwrap().is_empty());
    }
}
