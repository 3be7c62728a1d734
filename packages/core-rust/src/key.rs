//! Canonical key field list and view identity.
//!
//! The canonical key field list decides both the tuple a generated map
//! function emits and the tuple a query sends. Both sides must call
//! [`canonical_key_fields`] with the same inputs or the view silently returns
//! wrong rows.

use std::fmt;

use convert_case::{Case, Casing};

use crate::types::Conditions;

/// Prefix shared by every generated view name.
pub const VIEW_PREFIX: &str = "by_";

/// Separator between key fields inside a view name.
pub const FIELD_SEPARATOR: &str = "_and_";

/// View-name suffix for count views.
pub const COUNT_POSTFIX: &str = "_count";

/// Order fields first (as given, duplicates dropped), then the remaining
/// condition fields in ascending order.
///
/// # Examples
///
/// ```
/// use viewfind_core::key::canonical_key_fields;
/// use viewfind_core::Conditions;
///
/// let conditions = Conditions::new().with("name", "xyz").with("title", "abc");
/// assert_eq!(canonical_key_fields(&conditions, None), vec!["name", "title"]);
///
/// let order = vec!["title".to_string()];
/// assert_eq!(canonical_key_fields(&conditions, Some(&order)), vec!["title", "name"]);
/// ```
#[must_use]
pub fn canonical_key_fields(conditions: &Conditions, order: Option<&[String]>) -> Vec<String> {
    let mut fields: Vec<String> = Vec::with_capacity(conditions.len());
    for field in order.unwrap_or_default() {
        if !fields.contains(field) {
            fields.push(field.clone());
        }
    }
    for field in conditions.fields() {
        if !fields.iter().any(|f| f == field) {
            fields.push(field.to_string());
        }
    }
    fields
}

/// Design-document namespace for an entity type: `BlogPost` becomes
/// `blog_post`, and a `::` path separator becomes `/`.
#[must_use]
pub fn design_name(type_name: &str) -> String {
    type_name
        .split("::")
        .map(|segment| segment.to_case(Case::Snake))
        .collect::<Vec<_>>()
        .join("/")
}

/// `by_<f1>_and_<f2>...<postfix>`.
#[must_use]
pub fn view_name(key_fields: &[String], postfix: &str) -> String {
    format!("{VIEW_PREFIX}{}{postfix}", key_fields.join(FIELD_SEPARATOR))
}

/// Fully qualified view identity inside the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ViewPath {
    /// Design-document name (without the `_design/` prefix).
    pub design: String,
    /// View name inside the design document.
    pub view: String,
}

impl ViewPath {
    #[must_use]
    pub fn new(design: impl Into<String>, view: impl Into<String>) -> Self {
        Self {
            design: design.into(),
            view: view.into(),
        }
    }

    /// Derives the view identity for an entity type and key field list.
    #[must_use]
    pub fn for_type(type_name: &str, key_fields: &[String], postfix: &str) -> Self {
        Self::new(design_name(type_name), view_name(key_fields, postfix))
    }

    /// Document id of the design document holding this view.
    #[must_use]
    pub fn design_id(&self) -> String {
        format!("_design/{}", self.design)
    }
}

impl fmt::Display for ViewPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.design, self.view)
    }
}
