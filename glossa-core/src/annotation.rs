//! Annotations and relations: typed, positioned markup on a document.

use crate::attribute::AttributeBag;
use crate::span::Span;
use crate::types::{AnnotationType, RelationType};
use serde::{Deserialize, Serialize};

/// Identifier of an annotation, monotonic within its owning document.
pub type AnnotationId = u64;

/// A typed directed edge from one annotation to another.
///
/// Relations carry the target annotation's id, never a reference: they are
/// resolved lazily through the owning document, so a relation is a
/// back-reference and not an ownership edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    /// Type of the relation (e.g. a dependency label)
    pub relation_type: RelationType,
    /// Id of the target annotation within the same document
    pub target: AnnotationId,
    /// Optional relation value (e.g. the surface label of a dependency arc)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Whether a reciprocal edge exists on the target
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub reciprocal: bool,
}

impl Relation {
    /// Create a relation of the given type pointing at `target`.
    #[must_use]
    pub fn new(relation_type: RelationType, target: AnnotationId) -> Self {
        Self {
            relation_type,
            target,
            value: None,
            reciprocal: false,
        }
    }

    /// Attach a relation value.
    #[must_use]
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Mark the relation as reciprocal.
    #[must_use]
    pub fn reciprocal(mut self) -> Self {
        self.reciprocal = true;
        self
    }
}

/// A span of text with a type, a unique per-document id, attributes, and
/// outgoing relations.
///
/// Annotations are created only through their owning
/// [`Document`](crate::document::Document) and live exactly as long as it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    /// Unique id within the owning document
    pub id: AnnotationId,
    /// The annotation's type
    pub annotation_type: AnnotationType,
    /// Position in the document text
    pub span: Span,
    /// Attribute values attached to this annotation
    #[serde(default, skip_serializing_if = "AttributeBag::is_empty")]
    pub attributes: AttributeBag,
    /// Outgoing typed relations, by target id
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relations: Vec<Relation>,
}

impl Annotation {
    pub(crate) fn new(id: AnnotationId, annotation_type: AnnotationType, span: Span) -> Self {
        Self {
            id,
            annotation_type,
            span,
            attributes: AttributeBag::new(),
            relations: Vec::new(),
        }
    }

    /// Whether this annotation's type is an instance of the given type.
    #[must_use]
    pub fn is_instance(&self, annotation_type: AnnotationType) -> bool {
        self.annotation_type.is_instance(annotation_type)
    }

    /// Add an outgoing relation.
    pub fn add_relation(&mut self, relation: Relation) {
        self.relations.push(relation);
    }

    /// Outgoing relations of the given type.
    pub fn relations_of(&self, relation_type: RelationType) -> impl Iterator<Item = &Relation> {
        self.relations
            .iter()
            .filter(move |r| r.relation_type == relation_type)
    }
}
