use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tokio::sync::watch;

use super::{SharedStore, Subscription};
use crate::{StoreError, StorePath};

/// One applied mutation; `value` is `None` for deletes.
#[derive(Clone, Debug, PartialEq)]
pub struct WriteRecord {
    pub path: StorePath,
    pub value: Option<Value>,
    pub at: DateTime<Utc>,
}

struct Watcher {
    id: u64,
    path: StorePath,
    tx: watch::Sender<Option<Value>>,
}

#[derive(Default)]
struct Inner {
    tree: Value,
    watchers: Vec<Watcher>,
    next_id: u64,
    offline: bool,
    log: Vec<WriteRecord>,
}

impl Inner {
    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline {
            return Err(StoreError::Unavailable("memory store is offline".to_string()));
        }
        Ok(())
    }

    fn apply(&mut self, path: &StorePath, value: Option<Value>) {
        match &value {
            Some(v) if !v.is_null() => insert_at(&mut self.tree, path.segments(), v.clone()),
            _ => remove_at(&mut self.tree, path.segments()),
        }
        self.log.push(WriteRecord {
            path: path.clone(),
            value: value.filter(|v| !v.is_null()),
            at: Utc::now(),
        });
        self.notify(path, false);
    }

    fn notify(&self, changed: &StorePath, force: bool) {
        for watcher in self.watchers.iter().filter(|w| w.path.overlaps(changed)) {
            let next = lookup(&self.tree, watcher.path.segments()).cloned();
            watcher.tx.send_if_modified(|current| {
                if force || *current != next {
                    *current = next;
                    true
                } else {
                    false
                }
            });
        }
    }
}

/// In-process shared store with the hosted store's semantics: a JSON tree,
/// last write wins, empty parents disappear, and listeners on a path hear
/// about changes to its ancestors and descendants.
///
/// Clones share the same tree, so two clients holding clones see each
/// other's writes.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// While offline every operation fails with `StoreError::Unavailable`.
    pub fn set_offline(&self, offline: bool) {
        tracing::info!(offline, "memory store connectivity changed");
        self.lock().offline = offline;
    }

    pub fn is_offline(&self) -> bool {
        self.lock().offline
    }

    /// Re-sends the current value to every listener overlapping `path`,
    /// even though nothing changed.
    pub fn redeliver(&self, path: &StorePath) {
        self.lock().notify(path, true);
    }

    pub fn value_at(&self, path: &StorePath) -> Option<Value> {
        lookup(&self.lock().tree, path.segments()).cloned()
    }

    pub fn writes(&self) -> Vec<WriteRecord> {
        self.lock().log.clone()
    }

    /// Number of non-delete writes that targeted exactly `path`.
    pub fn writes_to(&self, path: &StorePath) -> usize {
        self.lock()
            .log
            .iter()
            .filter(|r| &r.path == path && r.value.is_some())
            .count()
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().watchers.len()
    }
}

#[async_trait]
impl SharedStore for MemoryStore {
    async fn write(&self, path: &StorePath, value: Value) -> Result<(), StoreError> {
        path.validate()?;
        let mut inner = self.lock();
        inner.check_online()?;
        tracing::trace!(%path, "write");
        inner.apply(path, Some(value));
        Ok(())
    }

    async fn read(&self, path: &StorePath) -> Result<Option<Value>, StoreError> {
        path.validate()?;
        let inner = self.lock();
        inner.check_online()?;
        Ok(lookup(&inner.tree, path.segments()).cloned())
    }

    async fn delete(&self, path: &StorePath) -> Result<(), StoreError> {
        path.validate()?;
        let mut inner = self.lock();
        inner.check_online()?;
        tracing::trace!(%path, "delete");
        inner.apply(path, None);
        Ok(())
    }

    async fn subscribe(&self, path: &StorePath) -> Result<Subscription, StoreError> {
        path.validate()?;
        let mut inner = self.lock();
        inner.check_online()?;
        let id = inner.next_id;
        inner.next_id += 1;
        let (tx, rx) = watch::channel(lookup(&inner.tree, path.segments()).cloned());
        inner.watchers.push(Watcher {
            id,
            path: path.clone(),
            tx,
        });
        tracing::debug!(id, %path, "subscribed");

        let registry: Weak<Mutex<Inner>> = Arc::downgrade(&self.inner);
        Ok(Subscription::new(id, path.clone(), rx, move || {
            if let Some(inner) = registry.upgrade() {
                inner
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .watchers
                    .retain(|w| w.id != id);
            }
        }))
    }
}

fn lookup<'a>(tree: &'a Value, segments: &[String]) -> Option<&'a Value> {
    let mut node = tree;
    for segment in segments {
        node = node.as_object()?.get(segment)?;
    }
    if node.is_null() {
        None
    } else {
        Some(node)
    }
}

fn insert_at(node: &mut Value, segments: &[String], value: Value) {
    let Some((first, rest)) = segments.split_first() else {
        *node = value;
        return;
    };
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    if let Some(map) = node.as_object_mut() {
        let child = map
            .entry(first.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        insert_at(child, rest, value);
    }
}

/// Removes the node and prunes parents left empty.
fn remove_at(node: &mut Value, segments: &[String]) {
    let Some((first, rest)) = segments.split_first() else {
        *node = Value::Null;
        return;
    };
    let Some(map) = node.as_object_mut() else {
        return;
    };
    if rest.is_empty() {
        map.remove(first);
        return;
    }
    if let Some(child) = map.get_mut(first) {
        remove_at(child, rest);
        if child.as_object().is_some_and(|m| m.is_empty()) || child.is_null() {
            map.remove(first);
        }
    }
}
