use super::subscription::Subscription;
use crate::{StoreError, StorePath};
use async_trait::async_trait;
use serde_json::Value;

/// Hierarchical last-write-wins key-value store shared by both devices.
///
/// No transactions and no cross-key ordering. Writing `Value::Null` is the
/// same as deleting.
#[async_trait]
pub trait SharedStore: Send + Sync {
    async fn write(&self, path: &StorePath, value: Value) -> Result<(), StoreError>;
    async fn read(&self, path: &StorePath) -> Result<Option<Value>, StoreError>;
    /// Removes the path and everything under it. Deleting nothing succeeds.
    async fn delete(&self, path: &StorePath) -> Result<(), StoreError>;
    async fn subscribe(&self, path: &StorePath) -> Result<Subscription, StoreError>;
}
