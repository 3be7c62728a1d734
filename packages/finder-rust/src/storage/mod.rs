//! [`ViewStore`](crate::traits::ViewStore) implementations.

pub mod collate;
pub mod couch;
pub mod memory;
mod view_source;

pub use couch::CouchClient;
pub use memory::MemoryStore;
