//! Concurrency tests for the corpus pipeline.
//!
//! These tests verify that:
//! - Every document is annotated exactly once regardless of worker count
//! - Worker failures abort the run without deadlocking the producer
//! - Off-heap runs spill to partitions and reopen as a corpus
//! - The completion callback fires once per document

use glossa::{
    AnnotatableType, Annotation, AnnotationType, Annotator, AnnotatorCache, AnnotatorRegistry,
    Corpus, CorpusKind, Document, InMemoryCorpus, JsonFormat, OffHeapCorpus, Pipeline, Resolver,
    Result, Span,
};
use glossa::format::DocumentFormat;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// =============================================================================
// Helpers
// =============================================================================

/// Annotator that counts invocations and stamps one annotation per call.
#[derive(Debug)]
struct Counting {
    target: AnnotationType,
    calls: Arc<AtomicUsize>,
}

impl Annotator for Counting {
    fn name(&self) -> &str {
        "counting"
    }
    fn satisfies(&self) -> Vec<AnnotatableType> {
        vec![self.target.into()]
    }
    fn annotate(&self, document: &mut Document) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        document.create_annotation(self.target, Span::new(0, 1))?;
        Ok(())
    }
}

/// Annotator that fails on a single document id.
#[derive(Debug)]
struct Tripwire {
    target: AnnotationType,
    poison: String,
}

impl Annotator for Tripwire {
    fn name(&self) -> &str {
        "tripwire"
    }
    fn satisfies(&self) -> Vec<AnnotatableType> {
        vec![self.target.into()]
    }
    fn annotate(&self, document: &mut Document) -> Result<()> {
        if document.id() == self.poison {
            return Err(glossa::Error::annotation(format!(
                "refusing document '{}'",
                document.id()
            )));
        }
        document.create_annotation(self.target, Span::new(0, 1))?;
        Ok(())
    }
}

fn resolver_with(annotator: Arc<dyn Annotator>) -> Resolver {
    let registry = Arc::new(AnnotatorRegistry::new());
    registry.register_instance(annotator);
    Resolver::new(Arc::new(AnnotatorCache::new(registry)))
}

fn corpus_of(prefix: &str, n: usize) -> Box<dyn Corpus> {
    Box::new(InMemoryCorpus::from_documents(
        (0..n)
            .map(|i| Document::new(format!("{prefix}-{i}"), "the quick brown fox"))
            .collect(),
    ))
}

// =============================================================================
// Exactly-once processing
// =============================================================================

#[test]
fn every_document_annotated_exactly_once() {
    let target = AnnotationType::create("PCON_TOKEN_ONCE").unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let resolver = resolver_with(Arc::new(Counting {
        target,
        calls: Arc::clone(&calls),
    }));

    let pipeline = Pipeline::builder()
        .workers(8)
        .queue_size(16)
        .annotate(target)
        .return_corpus(true)
        .build(resolver);

    let result = pipeline.process(corpus_of("once", 200)).unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 200);
    assert_eq!(pipeline.documents_processed(), 200);
    let documents: Vec<Document> = result.iter().map(Result::unwrap).collect();
    assert_eq!(documents.len(), 200);
    for doc in &documents {
        assert!(doc.is_completed(target));
        assert_eq!(doc.annotations_of(target).len(), 1);
    }
}

#[test]
fn single_worker_matches_many_workers() {
    let target = AnnotationType::create("PCON_TOKEN_SEQ").unwrap();
    for workers in [1, 4] {
        let calls = Arc::new(AtomicUsize::new(0));
        let resolver = resolver_with(Arc::new(Counting {
            target,
            calls: Arc::clone(&calls),
        }));
        let pipeline = Pipeline::builder()
            .workers(workers)
            .annotate(target)
            .return_corpus(true)
            .build(resolver);
        pipeline.process(corpus_of("seq", 50)).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 50, "workers={workers}");
    }
}

#[test]
fn on_complete_fires_once_per_document() {
    let target = AnnotationType::create("PCON_TOKEN_CB").unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::new(AtomicUsize::new(0));
    let resolver = resolver_with(Arc::new(Counting {
        target,
        calls: Arc::clone(&calls),
    }));
    let seen_in_cb = Arc::clone(&seen);

    let pipeline = Pipeline::builder()
        .workers(4)
        .annotate(target)
        .on_complete(move |doc| {
            assert!(doc.is_completed(target));
            seen_in_cb.fetch_add(1, Ordering::SeqCst);
        })
        .return_corpus(false)
        .build(resolver);

    // Callbacks-only configuration: the input corpus comes back untouched.
    let result = pipeline.process(corpus_of("cb", 64)).unwrap();
    assert_eq!(seen.load(Ordering::SeqCst), 64);
    assert_eq!(result.kind(), CorpusKind::InMemory);
}

mod properties {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        // Exactly-once holds for any worker count and queue capacity,
        // including queues much smaller than the corpus.
        #[test]
        fn exactly_once_for_any_topology(
            n in 0usize..60,
            workers in 1usize..6,
            queue in 1usize..8,
        ) {
            let target = AnnotationType::create("PCON_TOKEN_PROP").unwrap();
            let calls = Arc::new(AtomicUsize::new(0));
            let resolver = resolver_with(Arc::new(Counting {
                target,
                calls: Arc::clone(&calls),
            }));
            let pipeline = Pipeline::builder()
                .workers(workers)
                .queue_size(queue)
                .annotate(target)
                .return_corpus(true)
                .build(resolver);

            let result = pipeline.process(corpus_of("prop", n)).unwrap();
            prop_assert_eq!(calls.load(Ordering::SeqCst), n);
            prop_assert_eq!(result.iter().count(), n);
        }
    }
}

// =============================================================================
// Failure propagation
// =============================================================================

#[test]
fn worker_failure_aborts_without_deadlock() {
    let target = AnnotationType::create("PCON_TOKEN_FAIL").unwrap();
    let resolver = resolver_with(Arc::new(Tripwire {
        target,
        poison: "fail-37".to_string(),
    }));

    // Queue far smaller than the corpus so the producer would block forever
    // if workers died without draining it.
    let pipeline = Pipeline::builder()
        .workers(2)
        .queue_size(2)
        .annotate(target)
        .return_corpus(true)
        .build(resolver);

    let err = pipeline.process(corpus_of("fail", 500)).unwrap_err();
    assert!(err.to_string().contains("fail-37"), "unexpected error: {err}");
}

// =============================================================================
// Off-heap spill
// =============================================================================

#[test]
fn off_heap_corpus_spills_and_reopens() {
    let target = AnnotationType::create("PCON_TOKEN_SPILL").unwrap();

    // Seed an off-heap corpus on disk.
    let temp = tempfile::tempdir().unwrap();
    let format = JsonFormat;
    {
        let path = temp.path().join("part-000.jsonl");
        let mut file = std::fs::File::create(path).unwrap();
        for i in 0..40 {
            let doc = Document::new(format!("spill-{i}"), "some text");
            let line = format.write_document(&doc).unwrap();
            writeln!(file, "{line}").unwrap();
        }
    }
    let corpus = OffHeapCorpus::open(temp.path()).unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let resolver = resolver_with(Arc::new(Counting {
        target,
        calls: Arc::clone(&calls),
    }));
    let pipeline = Pipeline::builder()
        .workers(3)
        .annotate(target)
        .return_corpus(true)
        .build(resolver);

    let result = pipeline.process(Box::new(corpus)).unwrap();
    assert_eq!(result.kind(), CorpusKind::OffHeap);
    assert_eq!(calls.load(Ordering::SeqCst), 40);

    let documents: Vec<Document> = result.iter().map(Result::unwrap).collect();
    assert_eq!(documents.len(), 40);
    let mut ids: Vec<&str> = documents.iter().map(Document::id).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 40, "spilled documents must be unique");
    for doc in &documents {
        assert!(doc.is_completed(target));
        let anns: Vec<&Annotation> = doc.annotations_of(target);
        assert_eq!(anns.len(), 1);
    }
}
