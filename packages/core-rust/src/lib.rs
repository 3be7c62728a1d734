//! viewfind core: condition model, view identity, key encoding, and
//! map/reduce generation for view-indexed document stores.
//!
//! Everything here is pure and synchronous. The runtime crate (`viewfind`)
//! executes compiled queries against a store.

pub mod design;
pub mod error;
pub mod key;
pub mod query;
pub mod result;
pub mod traits;
pub mod types;

pub use design::{DesignDocument, ViewDefinition, COUNT_REDUCE_FUNCTION, TYPE_FIELD};
pub use error::{QueryError, StoreError};
pub use key::{canonical_key_fields, ViewPath, COUNT_POSTFIX};
pub use query::{compile, KeyFilter, ViewQuery, MAX_KEY_SENTINEL};
pub use result::{ViewResult, ViewRow};
pub use traits::{Entity, EntityType};
pub use types::{ConditionValue, Conditions, ViewOptions};
