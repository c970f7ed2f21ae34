pub mod persistence;
pub mod store;
pub mod targets;

pub use persistence::{FileKeyValueStore, KeyValueStore, MemoryKeyValueStore, PersistenceError};
pub use store::{AppState, MacroStore, BACKUP_KEY_PREFIX, STORAGE_KEY};
pub use targets::{percent_of, MacroProgress, Targets, TargetsPatch};
