//! # glossa
//!
//! Annotation engine for document corpora: annotator resolution, caching,
//! and concurrent pipeline execution.
//!
//! - **Annotators**: the [`Annotator`] trait plus a per-language provider
//!   registry and a process-wide instance cache
//! - **Resolution**: [`Resolver`] walks annotator requirements depth-first
//!   and runs each annotator at most once per document
//! - **Pipelines**: [`Pipeline`] drives a resolver over a corpus with a
//!   bounded-queue worker pool, optionally spilling results to partition
//!   files
//!
//! Core types (Document, Span, AnnotationType, etc.) are in `glossa-core`
//! and re-exported here.

#![warn(missing_docs)]

// Module declarations (core types are in glossa-core, not declared here)
pub mod annotator;
pub mod cache;
pub mod corpus;
pub mod format;
pub mod pipeline;
pub mod resolver;

pub use annotator::{Annotator, AnnotatorRegistry};
pub use cache::AnnotatorCache;
pub use corpus::{
    annotate, Corpus, CorpusKind, DistributedCorpus, InMemoryCorpus, OffHeapCorpus,
};
pub use format::{DocumentFormat, JsonFormat};
pub use pipeline::{Pipeline, PipelineBuilder};
pub use resolver::Resolver;

// Re-export glossa-core types so most callers need a single dependency
pub use glossa_core::{
    detect_language, register_codec, AnnotatableType, Annotation, AnnotationId, AnnotationType,
    AttributeBag, AttributeCodec, AttributeType, Document, Error, Language, Relation,
    RelationEdge, RelationGraph, RelationType, Result, Span, SpanIndex, ValueKind,
    DEFAULT_NON_DESCENDING,
};
