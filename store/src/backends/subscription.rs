use std::fmt::Debug;

use serde_json::Value;
use tokio::sync::watch;

use crate::StorePath;

/// Live view of one store path.
///
/// The current value is delivered first, then the latest value after every
/// change at or below the path. Values are snapshots: several changes made
/// between two reads surface as one. Dropping the handle unsubscribes.
pub struct Subscription {
    id: u64,
    path: StorePath,
    updates: watch::Receiver<Option<Value>>,
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub fn new(
        id: u64,
        path: StorePath,
        mut updates: watch::Receiver<Option<Value>>,
        cancel: impl FnOnce() + Send + Sync + 'static,
    ) -> Self {
        updates.mark_changed();
        Self {
            id,
            path,
            updates,
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn path(&self) -> &StorePath {
        &self.path
    }

    pub fn is_active(&self) -> bool {
        self.cancel.is_some()
    }

    /// The latest value if it changed since the last call, without waiting.
    pub fn try_next(&mut self) -> Option<Option<Value>> {
        if !self.is_active() {
            return None;
        }
        match self.updates.has_changed() {
            Ok(true) => Some(self.updates.borrow_and_update().clone()),
            _ => None,
        }
    }

    /// Waits for the next value. `None` once unsubscribed or the store is gone.
    pub async fn next(&mut self) -> Option<Option<Value>> {
        if !self.is_active() {
            return None;
        }
        self.updates.changed().await.ok()?;
        Some(self.updates.borrow_and_update().clone())
    }

    /// Stops future deliveries. Safe to call any number of times.
    pub fn unsubscribe(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
            tracing::debug!(id = self.id, path = %self.path, "unsubscribed");
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("active", &self.is_active())
            .finish()
    }
}
