//! The concurrent corpus pipeline: bounded-queue producer/consumer
//! execution of the resolver over a document stream.
//!
//! A single producer (the corpus iterator) feeds a bounded
//! crossbeam channel; N worker threads drain it, run the resolver against
//! each document, and invoke the completion callback. The bounded queue is
//! the sole flow-control mechanism: a full queue blocks the producer, an
//! empty one blocks workers, and shutdown happens when the producer drops
//! the sender after end-of-input.
//!
//! When the corpus strategy is off-heap and a result corpus is requested,
//! each worker serializes its completed documents into its own `part-NNN`
//! file, so total memory stays bounded regardless of corpus size; the
//! result corpus reopens those partitions. Completion order across workers
//! is not guaranteed; within a single document, annotator order is
//! deterministic.
//!
//! An error while annotating any document aborts the whole run; there is
//! no per-document failure isolation, and no retry. Callers wanting
//! retries wrap the pipeline.

use crate::corpus::{Corpus, CorpusKind, InMemoryCorpus, OffHeapCorpus, PartitionWriter};
use crate::resolver::Resolver;
use crossbeam_channel::{bounded, Receiver, SendTimeoutError};
use glossa_core::{AnnotatableType, Document, Error, Result};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

type OnComplete = Arc<dyn Fn(&Document) + Send + Sync>;

const SEND_POLL: Duration = Duration::from_millis(50);

/// Builder for [`Pipeline`].
pub struct PipelineBuilder {
    workers: usize,
    queue_size: usize,
    types: Vec<AnnotatableType>,
    on_complete: OnComplete,
    return_corpus: bool,
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self {
            workers: std::thread::available_parallelism().map_or(4, usize::from),
            queue_size: 10_000,
            types: Vec::new(),
            on_complete: Arc::new(|_| {}),
            return_corpus: true,
        }
    }
}

impl PipelineBuilder {
    /// Number of worker threads (values below 1 are clamped to 1).
    #[must_use]
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Bounded queue capacity (values below 1 are clamped to 1).
    #[must_use]
    pub fn queue_size(mut self, queue_size: usize) -> Self {
        self.queue_size = queue_size.max(1);
        self
    }

    /// Add an annotatable type to ensure on every document.
    #[must_use]
    pub fn annotate(mut self, annotatable: impl Into<AnnotatableType>) -> Self {
        self.types.push(annotatable.into());
        self
    }

    /// Add several annotatable types.
    #[must_use]
    pub fn annotate_all(mut self, types: impl IntoIterator<Item = AnnotatableType>) -> Self {
        self.types.extend(types);
        self
    }

    /// Callback invoked for each completed document (from worker threads).
    #[must_use]
    pub fn on_complete(mut self, callback: impl Fn(&Document) + Send + Sync + 'static) -> Self {
        self.on_complete = Arc::new(callback);
        self
    }

    /// Whether `process` materializes a result corpus (in-memory or
    /// partition-backed) instead of passing the input corpus through.
    /// Defaults to `true`; disable it for callbacks-only runs where the
    /// annotated documents are not needed afterwards.
    #[must_use]
    pub fn return_corpus(mut self, return_corpus: bool) -> Self {
        self.return_corpus = return_corpus;
        self
    }

    /// Build the pipeline over the given resolver.
    #[must_use]
    pub fn build(self, resolver: Resolver) -> Pipeline {
        Pipeline {
            resolver,
            workers: self.workers,
            queue_size: self.queue_size,
            types: self.types,
            on_complete: self.on_complete,
            return_corpus: self.return_corpus,
            processing_nanos: AtomicU64::new(0),
            documents_processed: AtomicU64::new(0),
        }
    }
}

/// Orchestrates dependency resolution across a stream of documents with a
/// bounded-queue worker pool.
pub struct Pipeline {
    resolver: Resolver,
    workers: usize,
    queue_size: usize,
    types: Vec<AnnotatableType>,
    on_complete: OnComplete,
    return_corpus: bool,
    /// Cumulative per-document processing time across workers, in
    /// nanoseconds. Excludes time the producer spends blocked on the
    /// queue. Reset by each top-level `process` call.
    processing_nanos: AtomicU64,
    documents_processed: AtomicU64,
}

impl Pipeline {
    /// Start building a pipeline.
    #[must_use]
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    /// The target types ensured on every document.
    #[must_use]
    pub fn types(&self) -> &[AnnotatableType] {
        &self.types
    }

    /// Annotate a single document in the calling thread.
    pub fn process_document(&self, document: &mut Document) -> Result<()> {
        let started = Instant::now();
        self.resolver.process(document, &self.types)?;
        self.processing_nanos
            .fetch_add(elapsed_nanos(started), Ordering::Relaxed);
        (self.on_complete)(document);
        self.documents_processed.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Annotate every document of the corpus.
    ///
    /// Returns, depending on configuration: the original corpus
    /// (pass-through), a newly constructed in-memory corpus, or an off-heap
    /// corpus backed by just-written partition files.
    pub fn process(&self, corpus: Box<dyn Corpus>) -> Result<Box<dyn Corpus>> {
        self.processing_nanos.store(0, Ordering::Relaxed);
        self.documents_processed.store(0, Ordering::Relaxed);

        let spill = self.return_corpus && corpus.kind() == CorpusKind::OffHeap;
        let keep = self.return_corpus && !spill;
        let temp = if spill { Some(tempfile::tempdir()?) } else { None };

        let (tx, rx) = bounded::<Document>(self.queue_size);
        let abort = AtomicBool::new(false);
        let mut producer_error: Option<Error> = None;

        // Create all partition writers before spawning anything: failing
        // here with live workers would leave them blocked on the queue.
        let mut writers: Vec<Option<PartitionWriter>> = Vec::with_capacity(self.workers);
        for worker in 0..self.workers {
            writers.push(match &temp {
                Some(dir) => Some(PartitionWriter::create(dir.path(), worker)?),
                None => None,
            });
        }

        let collected: Vec<Document> = std::thread::scope(|scope| -> Result<Vec<Document>> {
            let mut handles = Vec::with_capacity(self.workers);
            for writer in writers.drain(..) {
                let rx = rx.clone();
                let abort = &abort;
                handles.push(
                    scope.spawn(move || self.worker_loop(&rx, writer, keep, abort)),
                );
            }
            drop(rx);

            // Producer: the corpus iterator feeding the bounded queue.
            'produce: for item in corpus.iter() {
                let mut pending = match item {
                    Ok(doc) => doc,
                    Err(e) => {
                        abort.store(true, Ordering::SeqCst);
                        producer_error = Some(e);
                        break 'produce;
                    }
                };
                loop {
                    if abort.load(Ordering::SeqCst) {
                        break 'produce;
                    }
                    match tx.send_timeout(pending, SEND_POLL) {
                        Ok(()) => break,
                        Err(SendTimeoutError::Timeout(doc)) => pending = doc,
                        Err(SendTimeoutError::Disconnected(_)) => break 'produce,
                    }
                }
            }
            drop(tx);

            let mut collected = Vec::new();
            let mut first_error = None;
            for handle in handles {
                match handle.join() {
                    Ok(Ok(documents)) => collected.extend(documents),
                    Ok(Err(e)) => first_error = first_error.or(Some(e)),
                    Err(panic) => {
                        first_error = first_error.or_else(|| {
                            Some(Error::annotation(format!("worker panicked: {panic:?}")))
                        });
                    }
                }
            }
            if let Some(e) = first_error {
                return Err(e);
            }
            Ok(collected)
        })?;

        if let Some(e) = producer_error {
            return Err(e);
        }

        log::debug!(
            "pipeline processed {} documents at {:.1} docs/sec",
            self.documents_processed(),
            self.documents_per_second()
        );

        // `temp` is populated exactly when spilling to partitions.
        if let Some(dir) = temp {
            return Ok(Box::new(OffHeapCorpus::from_temp(dir)?));
        }
        if keep {
            return Ok(Box::new(InMemoryCorpus::from_documents(collected)));
        }
        Ok(corpus)
    }

    fn worker_loop(
        &self,
        rx: &Receiver<Document>,
        mut writer: Option<PartitionWriter>,
        keep: bool,
        abort: &AtomicBool,
    ) -> Result<Vec<Document>> {
        let mut kept = Vec::new();
        while let Ok(mut document) = rx.recv() {
            let started = Instant::now();
            if let Err(e) = self.resolver.process(&mut document, &self.types) {
                abort.store(true, Ordering::SeqCst);
                return Err(e);
            }
            self.processing_nanos
                .fetch_add(elapsed_nanos(started), Ordering::Relaxed);
            (self.on_complete)(&document);
            self.documents_processed.fetch_add(1, Ordering::Relaxed);

            if let Some(w) = writer.as_mut() {
                if let Err(e) = w.write(&document) {
                    abort.store(true, Ordering::SeqCst);
                    return Err(e);
                }
            } else if keep {
                kept.push(document);
            }
        }
        if let Some(w) = writer.take() {
            w.finish()?;
        }
        Ok(kept)
    }

    // -------------------------------------------------------------------------
    // Metrics
    // -------------------------------------------------------------------------

    /// Documents processed by the last (or current) top-level run.
    #[must_use]
    pub fn documents_processed(&self) -> u64 {
        self.documents_processed.load(Ordering::Relaxed)
    }

    /// Cumulative processing time of the last (or current) top-level run.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.processing_nanos.load(Ordering::Relaxed))
    }

    /// Processing rate of the last (or current) top-level run.
    #[must_use]
    pub fn documents_per_second(&self) -> f64 {
        let secs = self.elapsed().as_secs_f64();
        if secs <= 0.0 {
            return 0.0;
        }
        self.documents_processed() as f64 / secs
    }
}

fn elapsed_nanos(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_nanos()).unwrap_or(u64::MAX)
}
