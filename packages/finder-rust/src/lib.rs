//! viewfind: attribute-based finders for view-indexed document stores.
//!
//! Compiles field conditions into view queries, creates the views they need
//! on first use, and runs them through a [`ViewStore`].

pub mod cli;
pub mod compiler;
pub mod config;
pub mod finder;
pub mod logging;
pub mod storage;
pub mod traits;

pub use compiler::ViewQueryCompiler;
pub use config::{LogConfig, StoreConfig};
pub use finder::Finder;
pub use storage::{CouchClient, MemoryStore};
pub use traits::ViewStore;

pub use viewfind_core::{
    ConditionValue, Conditions, Entity, EntityType, QueryError, StoreError, ViewOptions,
};
