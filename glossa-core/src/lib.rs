//! # glossa-core
//!
//! Core types for the glossa annotation framework: the shared data model
//! every other crate builds on.
//!
//! This crate provides:
//! - **The type registry**: [`AnnotationType`], [`AttributeType`],
//!   [`RelationType`]: dynamically created, interned, hierarchical type
//!   families with gold-standard duality
//! - **The document model**: [`Document`], [`Annotation`], [`Relation`],
//!   [`Span`], [`AttributeBag`]
//! - **The span index**: [`SpanIndex`], an augmented interval tree
//!   answering overlap/containment queries in document order
//! - **The relation graph**: [`RelationGraph`] with shortest-path and
//!   subtree queries

pub mod annotation;
pub mod attribute;
pub mod document;
pub mod error;
pub mod graph;
pub mod lang;
pub mod span;
pub mod tree;
pub mod types;

// Re-exports for convenience
pub use annotation::{Annotation, AnnotationId, Relation};
pub use attribute::{register_codec, AttributeBag, AttributeCodec};
pub use document::Document;
pub use error::{Error, Result};
pub use graph::{RelationEdge, RelationGraph, DEFAULT_NON_DESCENDING};
pub use lang::{detect_language, Language};
pub use span::Span;
pub use tree::SpanIndex;
pub use types::{AnnotatableType, AnnotationType, AttributeType, RelationType, ValueKind};
