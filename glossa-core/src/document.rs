//! Documents: text plus progressively enriched annotation state.
//!
//! A `Document` owns its raw text, its language, the table of completed
//! annotatable types (with the identity of the annotator that completed
//! each), and the span index over its annotations. Annotations are created
//! only through the document factory and live exactly as long as it.
//!
//! Type filters on span queries resolve through
//! [`AnnotationType::is_instance`], so filtering by
//! [`AnnotationType::root`] matches every annotation.

use crate::annotation::{Annotation, AnnotationId, Relation};
use crate::error::{Error, Result};
use crate::lang::Language;
use crate::span::Span;
use crate::tree::SpanIndex;
use crate::types::{AnnotatableType, AnnotationType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A text document with typed, positional markup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "DocumentRepr", into = "DocumentRepr")]
pub struct Document {
    id: String,
    text: String,
    language: Language,
    annotations: BTreeMap<AnnotationId, Annotation>,
    completed: BTreeMap<AnnotatableType, String>,
    next_id: AnnotationId,
    char_len: usize,
    type_checking_disabled: bool,
    index: SpanIndex,
}

impl Document {
    /// Create a document with the default language (English).
    #[must_use]
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        let char_len = text.chars().count();
        Self {
            id: id.into(),
            text,
            language: Language::default(),
            annotations: BTreeMap::new(),
            completed: BTreeMap::new(),
            next_id: 0,
            char_len,
            type_checking_disabled: false,
            index: SpanIndex::new(),
        }
    }

    /// Create a document with an explicit language.
    #[must_use]
    pub fn with_language(id: impl Into<String>, text: impl Into<String>, language: Language) -> Self {
        let mut doc = Self::new(id, text);
        doc.language = language;
        doc
    }

    /// Document id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Raw text of the document.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Length of the document in characters.
    #[must_use]
    pub fn char_len(&self) -> usize {
        self.char_len
    }

    /// The covered text of a character span, or `None` if the span exceeds
    /// the document.
    #[must_use]
    pub fn text_of(&self, span: Span) -> Option<&str> {
        if span.end > self.char_len {
            return None;
        }
        let mut indices = self
            .text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(self.text.len()));
        let start = indices.nth(span.start)?;
        let end = if span.len() == 0 {
            start
        } else {
            indices.nth(span.len() - 1)?
        };
        self.text.get(start..end)
    }

    /// Document language.
    #[must_use]
    pub fn language(&self) -> Language {
        self.language
    }

    /// Set the document language.
    pub fn set_language(&mut self, language: Language) {
        self.language = language;
    }

    /// Disable attribute type-checking for annotations created after this
    /// call.
    pub fn disable_type_checking(&mut self) {
        self.type_checking_disabled = true;
    }

    // -------------------------------------------------------------------------
    // Annotation factory and lookup
    // -------------------------------------------------------------------------

    /// Create an annotation of the given type at the given span, returning
    /// its id. Fails if the span exceeds the document text.
    pub fn create_annotation(
        &mut self,
        annotation_type: AnnotationType,
        span: Span,
    ) -> Result<AnnotationId> {
        if span.end > self.char_len {
            return Err(Error::annotation(format!(
                "span {span} exceeds document '{}' of length {}",
                self.id, self.char_len
            )));
        }
        let id = self.next_id;
        self.next_id += 1;
        let mut annotation = Annotation::new(id, annotation_type, span);
        if self.type_checking_disabled {
            annotation.attributes.disable_type_checking();
        }
        self.annotations.insert(id, annotation);
        self.index.insert(span, id);
        Ok(id)
    }

    /// Remove an annotation, re-indexing the span index.
    pub fn remove_annotation(&mut self, id: AnnotationId) -> Option<Annotation> {
        let annotation = self.annotations.remove(&id)?;
        self.index.remove(annotation.span, id);
        Some(annotation)
    }

    /// Look up an annotation by id.
    #[must_use]
    pub fn annotation(&self, id: AnnotationId) -> Option<&Annotation> {
        self.annotations.get(&id)
    }

    /// Look up an annotation mutably by id.
    pub fn annotation_mut(&mut self, id: AnnotationId) -> Option<&mut Annotation> {
        self.annotations.get_mut(&id)
    }

    /// Add an outgoing relation to an annotation. Fails if either endpoint
    /// is unknown.
    pub fn add_relation(&mut self, source: AnnotationId, relation: Relation) -> Result<()> {
        if !self.annotations.contains_key(&relation.target) {
            return Err(Error::annotation(format!(
                "relation target {} does not exist in document '{}'",
                relation.target, self.id
            )));
        }
        let Some(annotation) = self.annotations.get_mut(&source) else {
            return Err(Error::annotation(format!(
                "relation source {source} does not exist in document '{}'",
                self.id
            )));
        };
        annotation.add_relation(relation);
        Ok(())
    }

    /// Number of annotations on the document.
    #[must_use]
    pub fn annotation_count(&self) -> usize {
        self.annotations.len()
    }

    /// All annotations in document order (start ascending, then end
    /// ascending).
    #[must_use]
    pub fn annotations(&self) -> Vec<&Annotation> {
        self.resolve(self.index.iter_ordered())
    }

    /// Annotations whose type is an instance of `of_type`, in document
    /// order.
    #[must_use]
    pub fn annotations_of(&self, of_type: AnnotationType) -> Vec<&Annotation> {
        self.annotations()
            .into_iter()
            .filter(|a| a.is_instance(of_type))
            .collect()
    }

    // -------------------------------------------------------------------------
    // Span queries
    // -------------------------------------------------------------------------

    fn resolve(&self, ids: Vec<AnnotationId>) -> Vec<&Annotation> {
        ids.iter().filter_map(|id| self.annotations.get(id)).collect()
    }

    fn filtered(&self, ids: Vec<AnnotationId>, of_type: AnnotationType) -> Vec<&Annotation> {
        self.resolve(ids)
            .into_iter()
            .filter(|a| a.is_instance(of_type))
            .collect()
    }

    /// Annotations overlapping the reference span, filtered by type, in
    /// document order.
    #[must_use]
    pub fn overlapping(&self, span: Span, of_type: AnnotationType) -> Vec<&Annotation> {
        self.filtered(self.index.overlapping(span), of_type)
    }

    /// Annotations contained within the reference span, filtered by type,
    /// in document order.
    #[must_use]
    pub fn enclosed_by(&self, span: Span, of_type: AnnotationType) -> Vec<&Annotation> {
        self.filtered(self.index.enclosed_by(span), of_type)
    }

    /// Annotations that contain the reference span, filtered by type, in
    /// document order.
    #[must_use]
    pub fn enclosing(&self, span: Span, of_type: AnnotationType) -> Vec<&Annotation> {
        self.filtered(self.index.enclosing(span), of_type)
    }

    /// Annotations sharing the reference span's start offset, filtered by
    /// type, in document order.
    #[must_use]
    pub fn starting_at(&self, span: Span, of_type: AnnotationType) -> Vec<&Annotation> {
        self.filtered(self.index.starting_at(span), of_type)
    }

    /// Whether any annotation exists at exactly the given span. O(log n).
    #[must_use]
    pub fn contains_annotation_at(&self, span: Span) -> bool {
        self.index.contains(span)
    }

    /// First annotation of the given type in document order.
    #[must_use]
    pub fn first(&self, of_type: AnnotationType) -> Option<&Annotation> {
        self.annotations_of(of_type).into_iter().next()
    }

    /// Last annotation of the given type in document order.
    #[must_use]
    pub fn last(&self, of_type: AnnotationType) -> Option<&Annotation> {
        self.annotations_of(of_type).into_iter().last()
    }

    // -------------------------------------------------------------------------
    // Completion tracking
    // -------------------------------------------------------------------------

    /// Whether the given annotatable type has been completed on this
    /// document.
    #[must_use]
    pub fn is_completed(&self, annotatable: impl Into<AnnotatableType>) -> bool {
        self.completed.contains_key(&annotatable.into())
    }

    /// Mark an annotatable type completed, recording the identity
    /// (`name::version`) of the annotator that produced it.
    pub fn mark_completed(
        &mut self,
        annotatable: impl Into<AnnotatableType>,
        annotated_by: impl Into<String>,
    ) {
        self.completed.insert(annotatable.into(), annotated_by.into());
    }

    /// Un-mark a completed type (used when a cached result goes stale).
    pub fn clear_completed(&mut self, annotatable: impl Into<AnnotatableType>) {
        self.completed.remove(&annotatable.into());
    }

    /// Identity of the annotator that completed the given type, if any.
    #[must_use]
    pub fn completed_by(&self, annotatable: impl Into<AnnotatableType>) -> Option<&str> {
        self.completed.get(&annotatable.into()).map(String::as_str)
    }

    /// Snapshot of all completed types.
    #[must_use]
    pub fn completed_types(&self) -> Vec<AnnotatableType> {
        self.completed.keys().copied().collect()
    }
}

/// Wire representation: annotations as a flat list, completion keyed by
/// qualified type name. The span index is rebuilt on read.
#[derive(Serialize, Deserialize)]
struct DocumentRepr {
    id: String,
    text: String,
    #[serde(default)]
    language: Language,
    #[serde(default)]
    completed: BTreeMap<String, String>,
    #[serde(default)]
    annotations: Vec<Annotation>,
}

impl From<DocumentRepr> for Document {
    fn from(repr: DocumentRepr) -> Self {
        let mut doc = Document::with_language(repr.id, repr.text, repr.language);
        for (name, by) in repr.completed {
            if let Ok(t) = AnnotatableType::from_qualified_name(&name) {
                doc.completed.insert(t, by);
            } else {
                log::warn!("dropping unparseable completed-type entry '{name}'");
            }
        }
        for annotation in repr.annotations {
            doc.next_id = doc.next_id.max(annotation.id + 1);
            doc.index.insert(annotation.span, annotation.id);
            doc.annotations.insert(annotation.id, annotation);
        }
        doc
    }
}

impl From<Document> for DocumentRepr {
    fn from(doc: Document) -> Self {
        DocumentRepr {
            id: doc.id,
            text: doc.text,
            language: doc.language,
            completed: doc
                .completed
                .into_iter()
                .map(|(t, by)| (t.qualified_name(), by))
                .collect(),
            annotations: doc.annotations.into_values().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AttributeType;
    use serde_json::json;

    fn token_type() -> AnnotationType {
        AnnotationType::create("DOC_T_TOKEN").unwrap()
    }

    #[test]
    fn factory_assigns_monotonic_ids() {
        let mut doc = Document::new("d1", "one two three");
        let a = doc.create_annotation(token_type(), Span::new(0, 3)).unwrap();
        let b = doc.create_annotation(token_type(), Span::new(4, 7)).unwrap();
        assert!(b > a);
        assert_eq!(doc.annotation_count(), 2);
        assert!(doc.create_annotation(token_type(), Span::new(0, 999)).is_err());
    }

    #[test]
    fn queries_filter_by_is_instance() {
        let parent = AnnotationType::create("DOC_T_ENTITY").unwrap();
        let child = AnnotationType::create_with_parent("DOC_T_PERSON", parent).unwrap();
        let mut doc = Document::new("d2", "Alice met Bob");
        doc.create_annotation(child, Span::new(0, 5)).unwrap();
        doc.create_annotation(token_type(), Span::new(0, 5)).unwrap();

        let hits = doc.overlapping(Span::new(0, 5), parent);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].annotation_type, child);
        // ROOT matches everything.
        assert_eq!(doc.overlapping(Span::new(0, 5), AnnotationType::root()).len(), 2);
    }

    #[test]
    fn text_of_uses_char_offsets() {
        let doc = Document::new("d3", "héllo wörld");
        assert_eq!(doc.text_of(Span::new(0, 5)), Some("héllo"));
        assert_eq!(doc.text_of(Span::new(6, 11)), Some("wörld"));
        assert_eq!(doc.text_of(Span::new(3, 3)), Some(""));
        assert_eq!(doc.text_of(Span::new(0, 100)), None);
    }

    #[test]
    fn completion_table_round_trips() {
        let t = token_type();
        let mut doc = Document::new("d4", "abc");
        assert!(!doc.is_completed(t));
        doc.mark_completed(t, "tokenizer::1.0");
        assert!(doc.is_completed(t));
        assert_eq!(doc.completed_by(t), Some("tokenizer::1.0"));
        doc.clear_completed(t);
        assert!(!doc.is_completed(t));
    }

    #[test]
    fn serde_round_trip_is_lossless() {
        let t = token_type();
        let attr = AttributeType::create("DOC_T_LEMMA").unwrap();
        let mut doc = Document::with_language("d5", "Dogs bark", Language::English);
        let a = doc.create_annotation(t, Span::new(0, 4)).unwrap();
        doc.annotation_mut(a)
            .unwrap()
            .attributes
            .set(attr, json!("dog"))
            .unwrap();
        doc.mark_completed(t, "tokenizer::1.0");

        let text = serde_json::to_string(&doc).unwrap();
        let back: Document = serde_json::from_str(&text).unwrap();
        assert_eq!(back.id(), "d5");
        assert_eq!(back.completed_types(), doc.completed_types());
        assert_eq!(
            back.annotation(a).unwrap().attributes.get_str(attr).as_deref(),
            Some("dog")
        );
        // New annotations continue after the highest restored id.
        let mut back = back;
        let next = back.create_annotation(t, Span::new(5, 9)).unwrap();
        assert!(next > a);
    }

    #[test]
    fn remove_annotation_reindexes() {
        let mut doc = Document::new("d6", "a b c");
        let a = doc.create_annotation(token_type(), Span::new(0, 1)).unwrap();
        assert!(doc.contains_annotation_at(Span::new(0, 1)));
        doc.remove_annotation(a).unwrap();
        assert!(!doc.contains_annotation_at(Span::new(0, 1)));
        assert!(doc.annotations().is_empty());
    }
}
