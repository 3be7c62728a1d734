//! Error taxonomy shared by the compiler, the finder and store adapters.

/// Failure reported by a store adapter.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The named view, design document or document does not exist.
    #[error("not found: {resource}")]
    NotFound { resource: String },
    /// The write carried a stale or missing revision.
    #[error("revision conflict on document {id}")]
    Conflict { id: String },
    /// Connectivity, authentication or malformed-response failure.
    #[error("transport error: {0}")]
    Transport(#[from] anyhow::Error),
}

impl StoreError {
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    pub fn conflict(id: impl Into<String>) -> Self {
        Self::Conflict { id: id.into() }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Failure of a find or count call.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// Store failure, passed through as reported.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The conditions cannot be encoded into a single view key scan.
    #[error("unsupported query shape: {reason}")]
    UnsupportedQueryShape { reason: String },
    /// A row value could not be turned into the requested entity type.
    #[error("cannot build {type_name} from view row: {source}")]
    Decode {
        type_name: String,
        #[source]
        source: serde_json::Error,
    },
}

impl QueryError {
    /// The underlying store error, if this is one.
    #[must_use]
    pub fn as_store(&self) -> Option<&StoreError> {
        match self {
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}
