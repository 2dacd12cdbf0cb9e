//! Discovered relation schemas.
//!
//! A [`Catalog`] holds the schemas of the relations a single statement
//! references, produced by a [`RelationResolver`] at compile time rather
//! than declared statically. Catalogs are immutable and cheap to clone.

mod resolver;

pub use resolver::{RelationResolver, ResolveError, ResolveResult, StaticResolver};

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Field data types exposed by the document store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Keyword,
    Text,
    Long,
    Double,
    Boolean,
    Date,
    Object,
    /// Array-of-objects structure; sub-fields need nested query/sort scoping.
    Nested,
}

impl FieldType {
    pub fn is_nested(&self) -> bool {
        matches!(self, FieldType::Nested)
    }
}

/// A single field of a relation schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    pub field_type: FieldType,
    /// Whether the store keeps columnar doc values for this field.
    pub doc_values: bool,
}

/// Resolution of a column reference to a concrete catalog field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldBinding {
    /// Full dotted field name in the store.
    pub field: String,
    pub field_type: FieldType,
    pub doc_values: bool,
    /// Owning nested path, when the field lives inside a nested structure.
    pub nested_path: Option<String>,
}

/// Schema of a single relation (index). Dotted field names denote
/// sub-fields of object or nested parents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationSchema {
    name: String,
    fields: BTreeMap<String, FieldDef>,
}

impl RelationSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(
        mut self,
        name: impl Into<String>,
        field_type: FieldType,
        doc_values: bool,
    ) -> Self {
        self.fields.insert(
            name.into(),
            FieldDef {
                field_type,
                doc_values,
            },
        );
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.get(name)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldDef)> {
        self.fields.iter().map(|(name, def)| (name.as_str(), def))
    }

    /// Nested path owning `field`: the longest dotted prefix typed `Nested`.
    pub fn nested_path_of(&self, field: &str) -> Option<&str> {
        for (idx, _) in field.rmatch_indices('.') {
            if let Some((key, def)) = self.fields.get_key_value(&field[..idx]) {
                if def.field_type.is_nested() {
                    return Some(key.as_str());
                }
            }
        }
        None
    }

    /// Resolve a column reference against this schema.
    ///
    /// Accepts the bare field name or a reference qualified with the
    /// relation name (`relation.field`).
    pub fn resolve_field(&self, reference: &str) -> Option<FieldBinding> {
        let field = if self.fields.contains_key(reference) {
            reference
        } else {
            match reference.split_once('.') {
                Some((qualifier, rest)) if qualifier == self.name && self.fields.contains_key(rest) => rest,
                _ => return None,
            }
        };
        let def = self.fields[field];
        Some(FieldBinding {
            field: field.to_string(),
            field_type: def.field_type,
            doc_values: def.doc_values,
            nested_path: self.nested_path_of(field).map(str::to_string),
        })
    }
}

/// Resolved schema information for the relations a statement references.
///
/// `Catalog::empty()` is the canonical value for statements that reference
/// no relation; parsing also runs against it, since parsing only reads the
/// configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    relations: Arc<BTreeMap<String, RelationSchema>>,
}

impl Catalog {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_schemas(schemas: impl IntoIterator<Item = RelationSchema>) -> Self {
        Self {
            relations: Arc::new(
                schemas
                    .into_iter()
                    .map(|schema| (schema.name.clone(), schema))
                    .collect(),
            ),
        }
    }

    pub fn relation(&self, name: &str) -> Option<&RelationSchema> {
        self.relations.get(name)
    }

    /// The schema of the statement's single relation, when there is one.
    pub fn single_relation(&self) -> Option<&RelationSchema> {
        if self.relations.len() == 1 {
            self.relations.values().next()
        } else {
            None
        }
    }

    pub fn is_empty(&self) -> bool {
        self.relations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.relations.len()
    }
}
