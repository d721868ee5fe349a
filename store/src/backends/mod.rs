pub mod memory;
pub mod offline;
pub mod subscription;
pub mod traits;

pub use memory::{MemoryStore, WriteRecord};
pub use offline::OfflineStore;
pub use subscription::Subscription;
pub use traits::SharedStore;
