//! Attribute-based finders over generated views.
//!
//! Each call derives the canonical key field list from the conditions and
//! order, names the view after it, and hands a [`ViewQueryCompiler`] the
//! generated map (and, for counts, reduce) function.

use std::sync::Arc;

use serde_json::Value;
use viewfind_core::design::map_function;
use viewfind_core::{
    canonical_key_fields, Conditions, Entity, EntityType, QueryError, ViewOptions, ViewPath,
    COUNT_POSTFIX, COUNT_REDUCE_FUNCTION,
};

use crate::compiler::ViewQueryCompiler;
use crate::traits::ViewStore;

/// Finds and counts entities of one store.
///
/// Every call creates the view it needs if the store does not have it yet,
/// so each distinct combination of condition fields and order costs one
/// index in the store.
#[derive(Clone)]
pub struct Finder {
    store: Arc<dyn ViewStore>,
}

impl Finder {
    #[must_use]
    pub fn new(store: Arc<dyn ViewStore>) -> Self {
        Self { store }
    }

    /// All entities of `E` matching `conditions`, in view order.
    ///
    /// Uses `E::default_order()` when `options` has no order.
    ///
    /// # Errors
    ///
    /// Store failures, unsupported condition shapes, and rows that do not
    /// deserialize into `E`.
    pub async fn find<E: Entity>(
        &self,
        conditions: &Conditions,
        options: ViewOptions,
    ) -> Result<Vec<E>, QueryError> {
        let documents = self
            .find_documents(&EntityType::of::<E>(), conditions, options)
            .await?;
        documents
            .into_iter()
            .map(|document| {
                E::from_document(document).map_err(|source| QueryError::Decode {
                    type_name: E::type_name().to_string(),
                    source,
                })
            })
            .collect()
    }

    /// Alias of [`find`](Self::find).
    ///
    /// # Errors
    ///
    /// See [`find`](Self::find).
    pub async fn all<E: Entity>(
        &self,
        conditions: &Conditions,
        options: ViewOptions,
    ) -> Result<Vec<E>, QueryError> {
        self.find(conditions, options).await
    }

    /// First match in view order.
    ///
    /// # Errors
    ///
    /// See [`find`](Self::find).
    pub async fn first<E: Entity>(
        &self,
        conditions: &Conditions,
        options: ViewOptions,
    ) -> Result<Option<E>, QueryError> {
        let found = self.find(conditions, single(options)).await?;
        Ok(found.into_iter().next())
    }

    /// Last match in view order, read as the first row of a descending scan.
    ///
    /// # Errors
    ///
    /// See [`find`](Self::find).
    pub async fn last<E: Entity>(
        &self,
        conditions: &Conditions,
        options: ViewOptions,
    ) -> Result<Option<E>, QueryError> {
        let found = self
            .find(conditions, single(options.descending(true)))
            .await?;
        Ok(found.into_iter().next())
    }

    /// Number of entities of `E` matching `conditions`.
    ///
    /// # Errors
    ///
    /// Store failures and unsupported condition shapes. An empty result is
    /// a count of 0, not an error.
    pub async fn count<E: Entity>(&self, conditions: &Conditions) -> Result<u64, QueryError> {
        self.count_documents(&EntityType::of::<E>(), conditions)
            .await
    }

    /// Raw documents of `kind` matching `conditions`.
    ///
    /// # Errors
    ///
    /// Store failures and unsupported condition shapes.
    pub async fn find_documents(
        &self,
        kind: &EntityType,
        conditions: &Conditions,
        mut options: ViewOptions,
    ) -> Result<Vec<Value>, QueryError> {
        if options.order.is_none() && !kind.default_order.is_empty() {
            options.order = Some(kind.default_order.clone());
        }
        let result = self
            .compiler(kind, conditions, &options, "", None)?
            .execute()
            .await?;
        Ok(result.into_values().collect())
    }

    /// Number of documents of `kind` matching `conditions`.
    ///
    /// # Errors
    ///
    /// Store failures and unsupported condition shapes.
    pub async fn count_documents(
        &self,
        kind: &EntityType,
        conditions: &Conditions,
    ) -> Result<u64, QueryError> {
        // Multi-key reduce queries must be grouped; the groups are summed.
        let mut options = ViewOptions::new();
        if conditions.iter().any(|(_, value)| value.is_any_of()) {
            options = options.group(true);
        }
        let result = self
            .compiler(
                kind,
                conditions,
                &options,
                COUNT_POSTFIX,
                Some(COUNT_REDUCE_FUNCTION),
            )?
            .execute()
            .await?;
        Ok(result.reduced_count())
    }

    fn compiler(
        &self,
        kind: &EntityType,
        conditions: &Conditions,
        options: &ViewOptions,
        postfix: &str,
        reduce_function: Option<&str>,
    ) -> Result<ViewQueryCompiler, QueryError> {
        let key_fields = canonical_key_fields(conditions, options.order_fields());
        ViewQueryCompiler::new(
            self.store.clone(),
            ViewPath::for_type(&kind.name, &key_fields, postfix),
            map_function(&kind.name, &key_fields),
            reduce_function.map(str::to_string),
            conditions,
            options,
        )
    }
}

/// Caps the scan at one row unless the caller chose a limit.
fn single(options: ViewOptions) -> ViewOptions {
    if options.has_param("limit") {
        options
    } else {
        options.limit(1)
    }
}
