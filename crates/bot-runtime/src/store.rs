use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use bot_core::BotScriptError;
use serde::{Deserialize, Serialize};

/// Key/hash-map contract the engine persists sessions through. Only per-key
/// atomicity is assumed.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Missing keys read as `""`.
    async fn get(&self, key: &str) -> Result<String, BotScriptError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), BotScriptError>;
    async fn delete(&self, key: &str) -> Result<(), BotScriptError>;
    async fn hash_set(&self, key: &str, field: &str, value: &str) -> Result<(), BotScriptError>;
    /// Missing hashes or fields read as `""`.
    async fn hash_get(&self, key: &str, field: &str) -> Result<String, BotScriptError>;
    async fn hash_get_all(&self, key: &str) -> Result<BTreeMap<String, String>, BotScriptError>;
    async fn hash_delete_all(&self, key: &str) -> Result<(), BotScriptError>;
}

#[derive(Debug, Clone)]
pub struct SessionKeys {
    script_id: String,
}

impl SessionKeys {
    pub fn new(script_id: impl Into<String>) -> Self {
        Self {
            script_id: script_id.into(),
        }
    }

    pub fn pointer(&self, sessid: &str) -> String {
        format!("{}:session:{}:current", self.script_id, sessid)
    }

    pub fn answers(&self, sessid: &str) -> String {
        format!("{}:session:{}:answer", self.script_id, sessid)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub values: BTreeMap<String, String>,
    pub hashes: BTreeMap<String, BTreeMap<String, String>>,
}

impl StoreSnapshot {
    fn get(&self, key: &str) -> String {
        self.values.get(key).cloned().unwrap_or_default()
    }

    fn set(&mut self, key: &str, value: &str) {
        self.values.insert(key.to_string(), value.to_string());
    }

    fn delete(&mut self, key: &str) {
        self.values.remove(key);
    }

    fn hash_set(&mut self, key: &str, field: &str, value: &str) {
        self.hashes
            .entry(key.to_string())
            .or_default()
            .insert(field.to_string(), value.to_string());
    }

    fn hash_get(&self, key: &str, field: &str) -> String {
        self.hashes
            .get(key)
            .and_then(|hash| hash.get(field))
            .cloned()
            .unwrap_or_default()
    }

    fn hash_get_all(&self, key: &str) -> BTreeMap<String, String> {
        self.hashes.get(key).cloned().unwrap_or_default()
    }

    fn hash_delete_all(&mut self, key: &str) {
        self.hashes.remove(key);
    }
}

fn lock_snapshot(
    state: &Mutex<StoreSnapshot>,
) -> Result<MutexGuard<'_, StoreSnapshot>, BotScriptError> {
    state
        .lock()
        .map_err(|_| BotScriptError::new("STORE_POISONED", "Session store lock is poisoned."))
}

/// In-process store; sessions vanish with the process.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    state: Mutex<StoreSnapshot>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Result<StoreSnapshot, BotScriptError> {
        Ok(lock_snapshot(&self.state)?.clone())
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, key: &str) -> Result<String, BotScriptError> {
        Ok(lock_snapshot(&self.state)?.get(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), BotScriptError> {
        lock_snapshot(&self.state)?.set(key, value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), BotScriptError> {
        lock_snapshot(&self.state)?.delete(key);
        Ok(())
    }

    async fn hash_set(&self, key: &str, field: &str, value: &str) -> Result<(), BotScriptError> {
        lock_snapshot(&self.state)?.hash_set(key, field, value);
        Ok(())
    }

    async fn hash_get(&self, key: &str, field: &str) -> Result<String, BotScriptError> {
        Ok(lock_snapshot(&self.state)?.hash_get(key, field))
    }

    async fn hash_get_all(&self, key: &str) -> Result<BTreeMap<String, String>, BotScriptError> {
        Ok(lock_snapshot(&self.state)?.hash_get_all(key))
    }

    async fn hash_delete_all(&self, key: &str) -> Result<(), BotScriptError> {
        lock_snapshot(&self.state)?.hash_delete_all(key);
        Ok(())
    }
}

/// Write-through store backed by a JSON file, so sessions outlive a single
/// CLI invocation. A change becomes visible only once it is on disk.
#[derive(Debug)]
pub struct JsonFileSessionStore {
    path: PathBuf,
    state: tokio::sync::Mutex<StoreSnapshot>,
}

impl JsonFileSessionStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, BotScriptError> {
        let path = path.into();
        let state = if path.exists() {
            let raw = fs::read_to_string(&path).map_err(|error| {
                BotScriptError::new("STORE_READ", format!("{}: {}", path.display(), error))
            })?;
            serde_json::from_str(&raw).map_err(|error| {
                BotScriptError::new("STORE_INVALID", format!("{}: {}", path.display(), error))
            })?
        } else {
            StoreSnapshot::default()
        };
        Ok(Self {
            path,
            state: tokio::sync::Mutex::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn mutate(
        &self,
        change: impl FnOnce(&mut StoreSnapshot) + Send,
    ) -> Result<(), BotScriptError> {
        let mut state = self.state.lock().await;
        let mut next = state.clone();
        change(&mut next);
        persist(&self.path, &next).await?;
        *state = next;
        Ok(())
    }
}

async fn persist(path: &Path, state: &StoreSnapshot) -> Result<(), BotScriptError> {
    let map_write = |error: std::io::Error| {
        BotScriptError::new("STORE_WRITE", format!("{}: {}", path.display(), error))
    };
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    tokio::fs::create_dir_all(parent).await.map_err(map_write)?;
    let payload = serde_json::to_string_pretty(state)
        .map_err(|error| BotScriptError::new("STORE_WRITE", error.to_string()))?;
    tokio::fs::write(path, payload).await.map_err(map_write)
}

#[async_trait]
impl SessionStore for JsonFileSessionStore {
    async fn get(&self, key: &str) -> Result<String, BotScriptError> {
        Ok(self.state.lock().await.get(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), BotScriptError> {
        self.mutate(|state| state.set(key, value)).await
    }

    async fn delete(&self, key: &str) -> Result<(), BotScriptError> {
        self.mutate(|state| state.delete(key)).await
    }

    async fn hash_set(&self, key: &str, field: &str, value: &str) -> Result<(), BotScriptError> {
        self.mutate(|state| state.hash_set(key, field, value)).await
    }

    async fn hash_get(&self, key: &str, field: &str) -> Result<String, BotScriptError> {
        Ok(self.state.lock().await.hash_get(key, field))
    }

    async fn hash_get_all(&self, key: &str) -> Result<BTreeMap<String, String>, BotScriptError> {
        Ok(self.state.lock().await.hash_get_all(key))
    }

    async fn hash_delete_all(&self, key: &str) -> Result<(), BotScriptError> {
        self.mutate(|state| state.hash_delete_all(key)).await
    }
}

#[cfg(test)]
mod store_tests {
    use super::*;
    use crate::test_support::temp_path;

    #[test]
    fn session_keys_are_namespaced_by_script_and_session() {
        let keys = SessionKeys::new("demo");
        assert_eq!(keys.pointer("42"), "demo:session:42:current");
        assert_eq!(keys.answers("42"), "demo:session:42:answer");
    }

    #[tokio::test]
    async fn memory_store_reads_missing_keys_as_empty() {
        let store = MemorySessionStore::new();
        assert_eq!(store.get("nope").await.expect("get"), "");
        assert_eq!(store.hash_get("nope", "f").await.expect("hash get"), "");
        assert!(store.hash_get_all("nope").await.expect("hash all").is_empty());
    }

    #[tokio::test]
    async fn memory_store_round_trips_values_and_hashes() {
        let store = MemorySessionStore::new();
        store.set("k", "v").await.expect("set");
        store.hash_set("h", "a", "1").await.expect("hash set");
        store.hash_set("h", "b", "2").await.expect("hash set");
        assert_eq!(store.get("k").await.expect("get"), "v");
        assert_eq!(store.hash_get("h", "b").await.expect("hash get"), "2");
        assert_eq!(store.hash_get_all("h").await.expect("hash all").len(), 2);

        store.delete("k").await.expect("delete");
        store.hash_delete_all("h").await.expect("hash delete");
        let snapshot = store.snapshot().expect("snapshot");
        assert!(snapshot.values.is_empty());
        assert!(snapshot.hashes.is_empty());
    }

    #[tokio::test]
    async fn json_file_store_survives_reopen() {
        let path = temp_path("json-store.json");
        {
            let store = JsonFileSessionStore::open(&path).expect("open");
            store.set("bot:session:1:current", "f/a").await.expect("set");
            store.hash_set("bot:session:1:answer", "f/a", "x").await.expect("hash set");
        }

        let reopened = JsonFileSessionStore::open(&path).expect("reopen");
        assert_eq!(reopened.path(), path.as_path());
        assert_eq!(
            reopened.get("bot:session:1:current").await.expect("get"),
            "f/a"
        );
        assert_eq!(
            reopened
                .hash_get("bot:session:1:answer", "f/a")
                .await
                .expect("hash get"),
            "x"
        );
    }

    #[test]
    fn json_file_store_rejects_invalid_payload() {
        let path = temp_path("json-store-invalid.json");
        fs::write(&path, "{").expect("write");
        let error = JsonFileSessionStore::open(&path).expect_err("invalid json");
        assert_eq!(error.code, "STORE_INVALID");
    }

    #[tokio::test]
    async fn json_file_store_keeps_previous_state_when_write_fails() {
        let blocker = temp_path("json-store-blocker");
        fs::write(&blocker, "not a directory").expect("write");
        let store = JsonFileSessionStore::open(blocker.join("state.json")).expect("open");

        let error = store
            .set("bot:session:1:current", "f/a")
            .await
            .expect_err("parent is a file");
        assert_eq!(error.code, "STORE_WRITE");
        assert_eq!(store.get("bot:session:1:current").await.expect("get"), "");

        store
            .hash_set("bot:session:1:answer", "f/a", "x")
            .await
            .expect_err("parent is a file");
        assert!(store
            .hash_get_all("bot:session:1:answer")
            .await
            .expect("hash all")
            .is_empty());
    }

    #[tokio::test]
    async fn json_file_store_writes_keys_in_sorted_order() {
        let path = temp_path("json-store-sorted.json");
        let store = JsonFileSessionStore::open(&path).expect("open");
        store.set("b", "2").await.expect("set");
        store.set("a", "1").await.expect("set");
        store.hash_set("z", "f", "1").await.expect("hash set");
        store.hash_set("y", "f", "1").await.expect("hash set");

        let raw = fs::read_to_string(&path).expect("state file");
        let position = |needle: &str| raw.find(needle).expect("key present");
        assert!(position("\"a\"") < position("\"b\""));
        assert!(position("\"y\"") < position("\"z\""));
    }
}
