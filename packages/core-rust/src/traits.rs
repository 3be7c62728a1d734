//! Entity contract for types stored as documents.

use serde::de::DeserializeOwned;
use serde_json::Value;

/// Contract a domain type fulfils to be found through views.
///
/// Stored documents carry the type name in their
/// [`TYPE_FIELD`](crate::design::TYPE_FIELD) member; generated views only
/// index documents whose discriminator equals [`Entity::type_name`].
pub trait Entity: DeserializeOwned {
    /// Discriminator value and source of the design-document name.
    fn type_name() -> &'static str;

    /// Fields used as the order when the caller gives none.
    fn default_order() -> &'static [&'static str] {
        &[]
    }

    /// Rebuilds an entity from a stored document.
    ///
    /// # Errors
    ///
    /// Returns the deserialization error when the document does not fit.
    fn from_document(document: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(document)
    }
}

/// Runtime description of an entity type, for callers that only know the
/// type by name (the CLI, generic tooling).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityType {
    pub name: String,
    /// Empty means no default order.
    pub default_order: Vec<String>,
}

impl EntityType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default_order: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_default_order<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.default_order = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Description of a static entity type.
    #[must_use]
    pub fn of<E: Entity>() -> Self {
        Self::new(E::type_name()).with_default_order(E::default_order().iter().copied())
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Deserialize)]
    struct Comment {
        title: String,
    }

    impl Entity for Comment {
        fn type_name() -> &'static str {
            "Comment"
        }

        fn default_order() -> &'static [&'static str] {
            &["title"]
        }
    }

    #[test]
    fn entity_type_of_static_type() {
        let kind = EntityType::of::<Comment>();
        assert_eq!(kind.name, "Comment");
        assert_eq!(kind.default_order, vec!["title".to_string()]);
    }

    #[test]
    fn default_from_document_uses_serde() {
        let comment =
            Comment::from_document(serde_json::json!({ "title": "abc", "type": "Comment" }))
                .unwrap();
        assert_eq!(comment.title, "abc");
    }
}
