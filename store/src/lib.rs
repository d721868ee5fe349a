pub mod backends;
pub mod config;
pub mod error;
pub mod path;
pub mod retry;

pub use backends::{MemoryStore, OfflineStore, SharedStore, Subscription, WriteRecord};
pub use config::StoreConfig;
pub use error::StoreError;
pub use path::StorePath;
pub use retry::retry_with_backoff;
