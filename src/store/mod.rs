//! Persistence layer: portable paths, record shape, JSON store.

mod file;
pub mod paths;
mod record;

pub use file::{ConfigStore, StoreSnapshot};
pub use record::StoredRecord;
