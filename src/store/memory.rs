use crate::hooks::{HookContext, HookResult, Keeper, Remover};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct StoredEntry<Value> {
    pub value: Value,
    pub expiration: Duration,
}

/// In-process backend that records what the workers applied to it.
///
/// Clones share the same map, so one clone can be handed to the writer as keeper, another as
/// remover, and a third kept by the caller for inspection. Expiration is recorded but never
/// enforced; nothing is evicted.
pub struct MemoryStore<Value> {
    data: Arc<Mutex<HashMap<String, StoredEntry<Value>>>>,
}

impl<Value> MemoryStore<Value> {
    pub fn new() -> Self {
        MemoryStore {
            data: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn entry(&self, key: &str) -> Option<StoredEntry<Value>>
    where
        Value: Clone,
    {
        self.data.lock().get(key).cloned()
    }

    pub fn get(&self, key: &str) -> Option<Value>
    where
        Value: Clone,
    {
        self.entry(key).map(|entry| entry.value)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.data.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.data.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.lock().is_empty()
    }

    pub fn flush(&self) {
        self.data.lock().clear();
    }
}

impl<Value> Clone for MemoryStore<Value> {
    fn clone(&self) -> Self {
        MemoryStore {
            data: Arc::clone(&self.data),
        }
    }
}

impl<Value> Default for MemoryStore<Value> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Key, Value> Keeper<Key, Value> for MemoryStore<Value>
where
    Key: AsRef<str>,
    Value: Send,
{
    fn keep(
        &mut self,
        _ctx: &HookContext,
        key: Key,
        value: Value,
        expiration: Duration,
    ) -> HookResult {
        self.data
            .lock()
            .insert(key.as_ref().to_owned(), StoredEntry { value, expiration });
        Ok(())
    }
}

impl<Key, Value> Remover<Key> for MemoryStore<Value>
where
    Key: AsRef<str>,
    Value: Send,
{
    // Removing an absent key is not an error; the discard already holds.
    fn remove(&mut self, _ctx: &HookContext, key: Key) -> HookResult {
        self.data.lock().remove(key.as_ref());
        Ok(())
    }
}
