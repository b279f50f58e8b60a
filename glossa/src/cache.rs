//! The annotator cache: at most one live annotator per (type, language).
//!
//! Construction goes through the provider registry on a miss, under
//! double-checked locking so concurrent first-use builds the annotator only
//! once. A fetched annotator must declare it satisfies the requested type;
//! anything else is a wiring bug surfaced as a fatal resolution error.

use crate::annotator::{Annotator, AnnotatorRegistry};
use glossa_core::{AnnotatableType, Error, Language, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Cache of constructed annotators keyed by (type, language).
pub struct AnnotatorCache {
    registry: Arc<AnnotatorRegistry>,
    cache: Mutex<HashMap<(AnnotatableType, Language), Arc<dyn Annotator>>>,
}

impl AnnotatorCache {
    /// Create a cache backed by the given provider registry.
    #[must_use]
    pub fn new(registry: Arc<AnnotatorRegistry>) -> Self {
        Self {
            registry,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// The provider registry backing this cache.
    #[must_use]
    pub fn registry(&self) -> &Arc<AnnotatorRegistry> {
        &self.registry
    }

    /// Get the annotator for a (type, language) pair, constructing and
    /// caching it on first use. Fails when no annotator is configured, or
    /// when the configured annotator does not satisfy the requested type.
    pub fn get(
        &self,
        annotatable: AnnotatableType,
        language: Language,
    ) -> Result<Arc<dyn Annotator>> {
        let key = (annotatable, language);
        if let Some(annotator) = self.cache.lock().get(&key) {
            return Ok(Arc::clone(annotator));
        }

        // Construct outside the cache lock: providers may be slow.
        let annotator = self.registry.resolve(annotatable, language)?;
        if !annotator.satisfies().contains(&annotatable) {
            return Err(Error::resolution(format!(
                "annotator '{}' does not satisfy {annotatable}",
                annotator.name()
            )));
        }

        let mut cache = self.cache.lock();
        // Another thread may have cached a winner in the meantime; keep it.
        let entry = cache.entry(key).or_insert(annotator);
        Ok(Arc::clone(entry))
    }

    /// Evict a single (type, language) entry.
    pub fn invalidate(&self, annotatable: AnnotatableType, language: Language) {
        self.cache.lock().remove(&(annotatable, language));
    }

    /// Evict everything.
    pub fn clear(&self) {
        self.cache.lock().clear();
    }

    /// Number of live cached annotators.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.lock().len()
    }

    /// Returns true if no annotator is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cache.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glossa_core::{AnnotationType, Document};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct Counting {
        satisfies: AnnotatableType,
    }

    impl Annotator for Counting {
        fn name(&self) -> &str {
            "counting"
        }
        fn satisfies(&self) -> Vec<AnnotatableType> {
            vec![self.satisfies]
        }
        fn annotate(&self, _document: &mut Document) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn constructs_once_and_caches() {
        let t: AnnotatableType = AnnotationType::create("CACHE_T_ONCE").unwrap().into();
        let registry = Arc::new(AnnotatorRegistry::new());
        let constructions = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&constructions);
        registry.register_default(t, move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(Counting { satisfies: t }) as Arc<dyn Annotator>)
        });

        let cache = AnnotatorCache::new(registry);
        let a = cache.get(t, Language::English).unwrap();
        let b = cache.get(t, Language::English).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(constructions.load(Ordering::SeqCst), 1);

        // Different language constructs separately.
        cache.get(t, Language::German).unwrap();
        assert_eq!(constructions.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn wrong_type_claim_is_resolution_error() {
        let wanted: AnnotatableType = AnnotationType::create("CACHE_T_WANT").unwrap().into();
        let other: AnnotatableType = AnnotationType::create("CACHE_T_OTHER").unwrap().into();
        let registry = Arc::new(AnnotatorRegistry::new());
        registry.register_default(wanted, move || {
            Ok(Arc::new(Counting { satisfies: other }) as Arc<dyn Annotator>)
        });

        let cache = AnnotatorCache::new(registry);
        let err = cache.get(wanted, Language::English).unwrap_err();
        assert!(matches!(err, Error::Resolution(_)));
    }

    #[test]
    fn invalidate_forces_reconstruction() {
        let t: AnnotatableType = AnnotationType::create("CACHE_T_INV").unwrap().into();
        let registry = Arc::new(AnnotatorRegistry::new());
        let constructions = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&constructions);
        registry.register_default(t, move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(Counting { satisfies: t }) as Arc<dyn Annotator>)
        });

        let cache = AnnotatorCache::new(registry);
        cache.get(t, Language::English).unwrap();
        cache.invalidate(t, Language::English);
        cache.get(t, Language::English).unwrap();
        assert_eq!(constructions.load(Ordering::SeqCst), 2);

        cache.clear();
        assert!(cache.is_empty());
    }
}
