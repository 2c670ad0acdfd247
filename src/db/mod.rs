pub mod entities;
pub mod enums;
pub mod memory_store;
pub mod models;
pub mod services;
pub mod store;

pub use memory_store::MemoryStore;
pub use services::DatabaseStore;
pub use store::{AlertStore, GroupStore, HealthRecordStore, StoreError, TargetStore};
