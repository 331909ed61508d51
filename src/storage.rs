use std::{
    collections::{BTreeMap, HashMap},
    fs,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    error::{ConsoleError, ConsoleResult},
    models::Tab,
    session::{SessionSlot, TokenState},
};

// 1. KeyValueStore Contract
/// KeyValueStore
///
/// Persistent, user-scoped string storage (the console's local storage).
/// Calls are synchronous; the tab manager writes on every mutation.
pub trait KeyValueStore: Send + Sync {
    fn get_item(&self, key: &str) -> ConsoleResult<Option<String>>;
    fn set_item(&self, key: &str, value: &str) -> ConsoleResult<()>;
    fn remove_item(&self, key: &str) -> ConsoleResult<()>;
}

pub type KeyValueState = Arc<dyn KeyValueStore>;

// 2. The File-backed Implementation
/// FileKeyValueStore
///
/// Keeps every key in a single JSON object on disk. Each write rewrites the
/// whole file; the parent directory is created on first write.
pub struct FileKeyValueStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileKeyValueStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> ConsoleResult<BTreeMap<String, String>> {
        match fs::read_to_string(&self.path) {
            Ok(raw) if raw.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_all(&self, items: &BTreeMap<String, String>) -> ConsoleResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(items)?)?;
        Ok(())
    }

    fn update<F>(&self, f: F) -> ConsoleResult<()>
    where
        F: FnOnce(&mut BTreeMap<String, String>),
    {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| ConsoleError::Storage("storage lock poisoned".into()))?;
        let mut items = self.read_all()?;
        f(&mut items);
        self.write_all(&items)
    }
}

impl KeyValueStore for FileKeyValueStore {
    fn get_item(&self, key: &str) -> ConsoleResult<Option<String>> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| ConsoleError::Storage("storage lock poisoned".into()))?;
        Ok(self.read_all()?.remove(key))
    }

    fn set_item(&self, key: &str, value: &str) -> ConsoleResult<()> {
        self.update(|items| {
            items.insert(key.to_string(), value.to_string());
        })
    }

    fn remove_item(&self, key: &str) -> ConsoleResult<()> {
        self.update(|items| {
            items.remove(key);
        })
    }
}

// 3. The In-memory Implementation (For Tests)
/// MemoryKeyValueStore
///
/// Map-backed store. `new_failing` rejects every write, for exercising the
/// paths where persistence breaks underneath a tab operation.
#[derive(Default)]
pub struct MemoryKeyValueStore {
    items: Mutex<HashMap<String, String>>,
    writes: Mutex<usize>,
    should_fail: bool,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    /// Number of successful `set_item` calls.
    pub fn write_count(&self) -> usize {
        self.writes.lock().map(|w| *w).unwrap_or_default()
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get_item(&self, key: &str) -> ConsoleResult<Option<String>> {
        let items = self
            .items
            .lock()
            .map_err(|_| ConsoleError::Storage("storage lock poisoned".into()))?;
        Ok(items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> ConsoleResult<()> {
        if self.should_fail {
            return Err(ConsoleError::Storage("Mock storage error: simulation requested".into()));
        }
        let mut items = self
            .items
            .lock()
            .map_err(|_| ConsoleError::Storage("storage lock poisoned".into()))?;
        items.insert(key.to_string(), value.to_string());
        if let Ok(mut writes) = self.writes.lock() {
            *writes += 1;
        }
        Ok(())
    }

    fn remove_item(&self, key: &str) -> ConsoleResult<()> {
        if self.should_fail {
            return Err(ConsoleError::Storage("Mock storage error: simulation requested".into()));
        }
        let mut items = self
            .items
            .lock()
            .map_err(|_| ConsoleError::Storage("storage lock poisoned".into()))?;
        items.remove(key);
        Ok(())
    }
}

// 4. Tab cache
/// One user's persisted tab sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedTabs {
    pub tabs: Vec<Tab>,
    pub saved_at: DateTime<Utc>,
}

/// TabCache
///
/// Persists the open tab sequence keyed by user identity. Every operation is
/// a silent no-op when there is no token or no loaded user.
///
/// Stored shape: one key holding `{ "<userId>": { tabs, savedAt } }`. A write
/// replaces the whole object with the current user's entry.
#[derive(Clone)]
pub struct TabCache {
    store: KeyValueState,
    tokens: TokenState,
    session: Arc<SessionSlot>,
    key: String,
}

impl TabCache {
    pub fn new(
        store: KeyValueState,
        tokens: TokenState,
        session: Arc<SessionSlot>,
        key: impl Into<String>,
    ) -> Self {
        Self {
            store,
            tokens,
            session,
            key: key.into(),
        }
    }

    /// Cache identity, present only with both a token and a loaded user.
    pub fn identity(&self) -> Option<String> {
        self.tokens.get_token()?;
        self.session.user_id()
    }

    /// Writes `tabs` for the current user. Failures are logged, not returned.
    pub fn save(&self, tabs: &[Tab]) {
        let Some(user_id) = self.identity() else {
            tracing::debug!("no identity, tab cache write skipped");
            return;
        };

        let entry = CachedTabs {
            tabs: tabs.to_vec(),
            saved_at: Utc::now(),
        };
        let data = HashMap::from([(user_id, entry)]);
        let result = serde_json::to_string(&data)
            .map_err(ConsoleError::from)
            .and_then(|json| self.store.set_item(&self.key, &json));

        if let Err(e) = result {
            tracing::warn!(error = %e, "failed to persist tabs");
        }
    }

    /// Reads the current user's tabs. `None` when there is no identity, no
    /// entry for this user, or the stored value cannot be parsed.
    pub fn load(&self) -> Option<Vec<Tab>> {
        let user_id = self.identity()?;
        let raw = match self.store.get_item(&self.key) {
            Ok(raw) => raw?,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read tab cache");
                return None;
            }
        };

        match serde_json::from_str::<HashMap<String, CachedTabs>>(&raw) {
            Ok(mut data) => data.remove(&user_id).map(|entry| entry.tabs),
            Err(e) => {
                tracing::warn!(error = %e, "tab cache unreadable, ignoring");
                None
            }
        }
    }

    /// Drops the cache for every user.
    pub fn clear(&self) {
        if let Err(e) = self.store.remove_item(&self.key) {
            tracing::warn!(error = %e, "failed to clear tab cache");
        }
    }
}
