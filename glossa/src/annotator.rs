//! The annotator contract and provider registry.
//!
//! Annotators are opaque external collaborators: the engine only consumes
//! their declared prerequisites (`requires`), outputs (`satisfies`), and the
//! mutating `annotate` call. Which annotator serves a given (type, language)
//! pair is explicit registration: a provider table populated at
//! construction time, never runtime class loading.

use glossa_core::{AnnotatableType, Document, Error, Language, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// A component that reads and writes annotations on a document.
///
/// `satisfies` is a set: an annotator producing several types marks all of
/// them completed after a single invocation. `requires` lists the types that
/// must be completed before `annotate` runs; the resolver guarantees them.
pub trait Annotator: Send + Sync + std::fmt::Debug {
    /// Short name identifying the annotator implementation.
    fn name(&self) -> &str;

    /// Version string, combined with the name into the completion identity
    /// recorded on documents (`name::version`). Bump it to invalidate
    /// previously cached results.
    fn version(&self) -> &str {
        "1.0"
    }

    /// The annotatable types this annotator produces.
    fn satisfies(&self) -> Vec<AnnotatableType>;

    /// The annotatable types that must be completed before this annotator
    /// runs.
    fn requires(&self) -> Vec<AnnotatableType> {
        Vec::new()
    }

    /// Annotate the document. Prerequisites are guaranteed completed.
    fn annotate(&self, document: &mut Document) -> Result<()>;

    /// Identity recorded on documents for completed types.
    fn identity(&self) -> String {
        format!("{}::{}", self.name(), self.version())
    }
}

type Provider = Arc<dyn Fn() -> Result<Arc<dyn Annotator>> + Send + Sync>;

/// Explicit (type, language) → annotator wiring.
///
/// Providers registered for a specific language take precedence; a default
/// (language-independent) provider serves as fallback. Lookup failure is a
/// configuration error distinguishable from the "annotator exists but does
/// not satisfy the type" resolution error raised later by the cache.
#[derive(Default)]
pub struct AnnotatorRegistry {
    providers: RwLock<HashMap<(AnnotatableType, Option<Language>), Provider>>,
}

impl AnnotatorRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider for a (type, language) pair.
    pub fn register(
        &self,
        annotatable: impl Into<AnnotatableType>,
        language: Language,
        provider: impl Fn() -> Result<Arc<dyn Annotator>> + Send + Sync + 'static,
    ) {
        self.providers
            .write()
            .insert((annotatable.into(), Some(language)), Arc::new(provider));
    }

    /// Register a language-independent fallback provider for a type.
    pub fn register_default(
        &self,
        annotatable: impl Into<AnnotatableType>,
        provider: impl Fn() -> Result<Arc<dyn Annotator>> + Send + Sync + 'static,
    ) {
        self.providers
            .write()
            .insert((annotatable.into(), None), Arc::new(provider));
    }

    /// Register an already-constructed annotator for every type it
    /// satisfies, for all languages.
    pub fn register_instance(&self, annotator: Arc<dyn Annotator>) {
        for annotatable in annotator.satisfies() {
            let instance = Arc::clone(&annotator);
            self.register_default(annotatable, move || Ok(Arc::clone(&instance)));
        }
    }

    /// Resolve the annotator configured for a (type, language) pair. Fails
    /// with a configuration error when nothing is registered.
    pub fn resolve(
        &self,
        annotatable: AnnotatableType,
        language: Language,
    ) -> Result<Arc<dyn Annotator>> {
        let provider = {
            let providers = self.providers.read();
            providers
                .get(&(annotatable, Some(language)))
                .or_else(|| providers.get(&(annotatable, None)))
                .cloned()
        };
        match provider {
            Some(provider) => provider(),
            None => Err(Error::config(format!(
                "no annotator configured for {annotatable} and {language}"
            ))),
        }
    }

    /// Remove the provider for a (type, language) pair, and the default for
    /// the type. Used when configuration changes.
    pub fn unregister(&self, annotatable: impl Into<AnnotatableType>, language: Language) {
        let annotatable = annotatable.into();
        let mut providers = self.providers.write();
        providers.remove(&(annotatable, Some(language)));
        providers.remove(&(annotatable, None));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glossa_core::AnnotationType;

    #[derive(Debug)]
    struct Noop(AnnotatableType);

    impl Annotator for Noop {
        fn name(&self) -> &str {
            "noop"
        }
        fn satisfies(&self) -> Vec<AnnotatableType> {
            vec![self.0]
        }
        fn annotate(&self, _document: &mut Document) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn default_provider_serves_any_language() {
        let t: AnnotatableType = AnnotationType::create("ANN_REG_T").unwrap().into();
        let registry = AnnotatorRegistry::new();
        registry.register_default(t, move || Ok(Arc::new(Noop(t)) as Arc<dyn Annotator>));
        let resolved = registry.resolve(t, Language::German).unwrap();
        assert_eq!(resolved.name(), "noop");
    }

    #[test]
    fn missing_registration_is_config_error() {
        let t: AnnotatableType = AnnotationType::create("ANN_REG_MISSING").unwrap().into();
        let registry = AnnotatorRegistry::new();
        let err = registry.resolve(t, Language::English).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("no annotator configured"));
    }

    #[test]
    fn identity_combines_name_and_version() {
        let t: AnnotatableType = AnnotationType::create("ANN_REG_ID").unwrap().into();
        assert_eq!(Noop(t).identity(), "noop::1.0");
    }
}
