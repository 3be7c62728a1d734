//! View query execution with lazy index creation.
//!
//! [`ViewQueryCompiler`] compiles conditions into a [`ViewQuery`], runs it,
//! and when the store reports the view missing, writes the view definition
//! and runs the query once more. A second miss is returned to the caller.

use std::sync::Arc;
use std::time::Instant;

use tracing::{info_span, Instrument};
use viewfind_core::{
    compile, Conditions, DesignDocument, QueryError, StoreError, ViewDefinition, ViewOptions,
    ViewPath, ViewQuery, ViewResult,
};

use crate::traits::ViewStore;

/// Query runs per call: the initial one plus one retry after index creation.
const QUERY_ATTEMPTS: u32 = 2;

/// Result of a single query run.
#[derive(Debug)]
enum ViewOutcome {
    Found(ViewResult),
    IndexMissing(StoreError),
    Failed(StoreError),
}

impl From<Result<ViewResult, StoreError>> for ViewOutcome {
    fn from(result: Result<ViewResult, StoreError>) -> Self {
        match result {
            Ok(rows) => Self::Found(rows),
            Err(err @ StoreError::NotFound { .. }) => Self::IndexMissing(err),
            Err(err) => Self::Failed(err),
        }
    }
}

/// One compiled view query bound to a store.
///
/// Holds no state between calls to [`execute`](Self::execute).
pub struct ViewQueryCompiler {
    store: Arc<dyn ViewStore>,
    path: ViewPath,
    definition: ViewDefinition,
    query: ViewQuery,
}

impl ViewQueryCompiler {
    /// Compiles `conditions`/`options` for the view at `path`, defined by
    /// `map_function` and an optional `reduce_function`.
    ///
    /// # Errors
    ///
    /// [`QueryError::UnsupportedQueryShape`] when the conditions cannot be
    /// encoded as one key scan.
    pub fn new(
        store: Arc<dyn ViewStore>,
        path: ViewPath,
        map_function: String,
        reduce_function: Option<String>,
        conditions: &Conditions,
        options: &ViewOptions,
    ) -> Result<Self, QueryError> {
        let query = compile(conditions, options)?;
        Ok(Self {
            store,
            path,
            definition: ViewDefinition::new(map_function, reduce_function),
            query,
        })
    }

    #[must_use]
    pub fn path(&self) -> &ViewPath {
        &self.path
    }

    #[must_use]
    pub fn query(&self) -> &ViewQuery {
        &self.query
    }

    /// Runs the query, creating the view and retrying once if it is missing.
    ///
    /// # Errors
    ///
    /// Any store error other than a first "not found", any error while
    /// creating the view, and a "not found" on the retry.
    pub async fn execute(&self) -> Result<ViewResult, QueryError> {
        let span = info_span!(
            "view_query",
            view = %self.path,
            shape = self.query.filter.shape(),
            duration_ms = tracing::field::Empty,
            outcome = tracing::field::Empty,
        );

        async move {
            let start = Instant::now();
            let result = self.execute_with_retry().await;

            #[allow(clippy::cast_possible_truncation)]
            let duration_ms = start.elapsed().as_millis() as u64;
            let outcome = match &result {
                Ok(_) => "ok",
                Err(_) => "error",
            };
            tracing::Span::current().record("duration_ms", duration_ms);
            tracing::Span::current().record("outcome", outcome);

            result
        }
        .instrument(span)
        .await
    }

    async fn execute_with_retry(&self) -> Result<ViewResult, QueryError> {
        let mut last_miss = None;
        for attempt in 1..=QUERY_ATTEMPTS {
            match self.run().await {
                ViewOutcome::Found(result) => return Ok(result),
                ViewOutcome::IndexMissing(_) if attempt < QUERY_ATTEMPTS => {
                    self.create_index().await?;
                }
                ViewOutcome::IndexMissing(err) => {
                    tracing::warn!(
                        view = %self.path,
                        error = %err,
                        "view still missing after creating it"
                    );
                    last_miss = Some(err);
                }
                ViewOutcome::Failed(err) => return Err(err.into()),
            }
        }
        // The store's own error is returned as reported.
        Err(last_miss
            .unwrap_or_else(|| StoreError::not_found(self.path.to_string()))
            .into())
    }

    async fn run(&self) -> ViewOutcome {
        tracing::debug!(
            view = %self.path,
            params = %serde_json::Value::Object(self.query.to_params()),
            "sending view query"
        );
        self.store.query_view(&self.path, &self.query).await.into()
    }

    /// Writes the view definition into its design document, carrying the
    /// stored revision and sibling views forward.
    async fn create_index(&self) -> Result<(), StoreError> {
        let design_id = self.path.design_id();
        let existing = match self.store.get_document(&design_id).await {
            Ok(document) => Some(document),
            Err(StoreError::NotFound { .. }) => None,
            Err(err) => return Err(err),
        };

        let document = DesignDocument::upsert_view(
            &design_id,
            existing,
            &self.path.view,
            self.definition.clone(),
        )
        .map_err(|err| {
            StoreError::Transport(
                anyhow::Error::new(err).context(format!("malformed design document {design_id}")),
            )
        })?;
        let body = document
            .to_value()
            .map_err(|err| StoreError::Transport(err.into()))?;

        let rev = self.store.save_document(&body).await?;
        tracing::info!(
            view = %self.path,
            previous_rev = document.rev.as_deref().unwrap_or("none"),
            rev = %rev,
            "created view"
        );
        Ok(())
    }
}
