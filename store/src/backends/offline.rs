use async_trait::async_trait;
use serde_json::Value;

use super::{SharedStore, Subscription};
use crate::{StoreError, StorePath};

/// Backend that is never reachable. Every call fails with
/// `StoreError::Unavailable`.
#[derive(Clone, Copy, Debug, Default)]
pub struct OfflineStore;

#[async_trait]
impl SharedStore for OfflineStore {
    async fn write(&self, path: &StorePath, _value: Value) -> Result<(), StoreError> {
        Err(StoreError::Unavailable(format!("write {path}")))
    }

    async fn read(&self, path: &StorePath) -> Result<Option<Value>, StoreError> {
        Err(StoreError::Unavailable(format!("read {path}")))
    }

    async fn delete(&self, path: &StorePath) -> Result<(), StoreError> {
        Err(StoreError::Unavailable(format!("delete {path}")))
    }

    async fn subscribe(&self, path: &StorePath) -> Result<Subscription, StoreError> {
        Err(StoreError::Unavailable(format!("subscribe {path}")))
    }
}
