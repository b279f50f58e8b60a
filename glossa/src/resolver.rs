//! On-demand dependency resolution: the scheduler at the heart of the
//! engine.
//!
//! Given a document and a set of requested annotatable types, the resolver
//! walks the required-type DAG depth-first, running the annotator for every
//! type that is not yet completed on the document and marking everything
//! each annotator satisfies. Re-requesting a completed type is a no-op, so
//! resolution is idempotent and satisfied work is never re-run.
//!
//! A cyclic requires/satisfies configuration would otherwise recurse
//! without bound; an in-progress set turns that into an immediate
//! configuration error instead of a stack overflow.

use crate::cache::AnnotatorCache;
use glossa_core::{AnnotatableType, Document, Error, Result};
use std::collections::HashSet;
use std::sync::Arc;

/// Resolves and runs the annotators needed to complete requested types on a
/// document.
#[derive(Clone)]
pub struct Resolver {
    cache: Arc<AnnotatorCache>,
}

impl Resolver {
    /// Create a resolver backed by the given annotator cache.
    #[must_use]
    pub fn new(cache: Arc<AnnotatorCache>) -> Self {
        Self { cache }
    }

    /// The annotator cache backing this resolver.
    #[must_use]
    pub fn cache(&self) -> &Arc<AnnotatorCache> {
        &self.cache
    }

    /// Ensure every requested type is completed on the document, running
    /// missing annotators in dependency order. Types are visited in
    /// caller-given order; prerequisites resolve depth-first.
    pub fn process(&self, document: &mut Document, types: &[AnnotatableType]) -> Result<()> {
        let mut in_progress = HashSet::new();
        for &annotatable in types {
            self.process_one(document, annotatable, &mut in_progress)?;
        }
        Ok(())
    }

    fn process_one(
        &self,
        document: &mut Document,
        annotatable: AnnotatableType,
        in_progress: &mut HashSet<AnnotatableType>,
    ) -> Result<()> {
        if document.is_completed(annotatable) {
            return Ok(());
        }
        if !in_progress.insert(annotatable) {
            return Err(Error::config(format!(
                "cyclic annotator requirements while resolving {annotatable}"
            )));
        }

        log::debug!("resolving {annotatable} on document '{}'", document.id());
        let annotator = self.cache.get(annotatable, document.language())?;

        for prerequisite in annotator.requires() {
            self.process_one(document, prerequisite, in_progress)?;
        }

        annotator.annotate(document)?;
        let identity = annotator.identity();
        for satisfied in annotator.satisfies() {
            document.mark_completed(satisfied, identity.clone());
        }

        in_progress.remove(&annotatable);
        Ok(())
    }
}
