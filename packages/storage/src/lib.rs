// ABOUTME: Session-scoped and durable key-value storage for the security layer
// ABOUTME: Isolates untrusted stored JSON behind typed slots with tamper detection

pub mod error;
pub mod file;
pub mod memory;
pub mod store;
pub mod tamper;
pub mod typed;

pub use error::{StorageError, StorageResult};
pub use file::FileStore;
pub use memory::MemoryStore;
pub use store::{KeyValueStore, SharedStore, StorageBackends, StorageScope};
pub use tamper::{detect_storage_tampering, StoredType};
pub use typed::TypedSlot;
