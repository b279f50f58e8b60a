//! Corpus strategies: how a stream of documents is stored and traversed.
//!
//! A corpus abstracts storage and execution strategy away from the
//! pipeline. Three strategies exist:
//!
//! - [`InMemoryCorpus`]: documents held in a `Vec`; simplest, bounded by
//!   RAM.
//! - [`OffHeapCorpus`]: documents spilled to a fixed number of
//!   JSON-per-line partition files; total memory stays bounded regardless
//!   of corpus size, at the cost of re-parsing on iteration.
//! - [`DistributedCorpus`]: data-parallel map over the document set (a
//!   local stand-in for an external data-parallel streaming collaborator;
//!   no consensus semantics).

use crate::format::{DocumentFormat, JsonFormat};
use crate::resolver::Resolver;
use glossa_core::{AnnotatableType, Document, Error, Result};
use rayon::prelude::*;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Storage/execution strategy of a corpus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorpusKind {
    /// Documents held in memory
    InMemory,
    /// Documents spilled to partition files
    OffHeap,
    /// Documents processed by data-parallel map
    Distributed,
}

/// An iterable collection of documents.
pub trait Corpus: Send + std::fmt::Debug {
    /// Stream the documents. Off-heap corpora parse lazily, so items are
    /// fallible.
    fn iter(&self) -> Box<dyn Iterator<Item = Result<Document>> + Send + '_>;

    /// The corpus storage/execution strategy.
    fn kind(&self) -> CorpusKind;

    /// Number of documents, when cheaply known.
    fn len_hint(&self) -> Option<usize> {
        None
    }

    /// Annotate every document with the given types, honoring the corpus
    /// strategy, and return the annotated corpus.
    fn annotate(
        self: Box<Self>,
        resolver: Resolver,
        types: &[AnnotatableType],
    ) -> Result<Box<dyn Corpus>>;
}

/// Annotate every document of a boxed corpus with the given types through a
/// default pipeline, honoring the corpus strategy. Backs
/// [`Corpus::annotate`] and works directly on an already-boxed corpus.
pub fn annotate(
    corpus: Box<dyn Corpus>,
    resolver: Resolver,
    types: &[AnnotatableType],
) -> Result<Box<dyn Corpus>> {
    if corpus.kind() == CorpusKind::Distributed {
        // Data-parallel strategy: map the resolver over the documents with
        // rayon rather than the bounded-queue topology.
        let documents: Vec<Document> = corpus.iter().collect::<Result<_>>()?;
        let processed: Vec<Document> = documents
            .into_par_iter()
            .map(|mut doc| {
                resolver.process(&mut doc, types)?;
                Ok(doc)
            })
            .collect::<Result<_>>()?;
        return Ok(Box::new(DistributedCorpus::from_documents(processed)));
    }
    crate::pipeline::Pipeline::builder()
        .annotate_all(types.iter().copied())
        .return_corpus(true)
        .build(resolver)
        .process(corpus)
}

// =============================================================================
// In-memory
// =============================================================================

/// A corpus backed by a `Vec` of documents.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCorpus {
    documents: Vec<Document>,
}

impl InMemoryCorpus {
    /// Create an empty corpus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a corpus from documents.
    #[must_use]
    pub fn from_documents(documents: Vec<Document>) -> Self {
        Self { documents }
    }

    /// Append a document.
    pub fn push(&mut self, document: Document) {
        self.documents.push(document);
    }

    /// Number of documents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Returns true if the corpus holds no documents.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Borrow the documents.
    #[must_use]
    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    /// Consume the corpus, yielding its documents.
    #[must_use]
    pub fn into_documents(self) -> Vec<Document> {
        self.documents
    }
}

impl Corpus for InMemoryCorpus {
    fn iter(&self) -> Box<dyn Iterator<Item = Result<Document>> + Send + '_> {
        Box::new(self.documents.iter().cloned().map(Ok))
    }

    fn kind(&self) -> CorpusKind {
        CorpusKind::InMemory
    }

    fn len_hint(&self) -> Option<usize> {
        Some(self.documents.len())
    }

    fn annotate(
        self: Box<Self>,
        resolver: Resolver,
        types: &[AnnotatableType],
    ) -> Result<Box<dyn Corpus>> {
        annotate(self, resolver, types)
    }
}

// =============================================================================
// Distributed (data-parallel)
// =============================================================================

/// A corpus whose `annotate` runs as a data-parallel map instead of the
/// bounded-queue pipeline.
#[derive(Debug, Clone, Default)]
pub struct DistributedCorpus {
    documents: Vec<Document>,
}

impl DistributedCorpus {
    /// Create a corpus from documents.
    #[must_use]
    pub fn from_documents(documents: Vec<Document>) -> Self {
        Self { documents }
    }

    /// Consume the corpus, yielding its documents.
    #[must_use]
    pub fn into_documents(self) -> Vec<Document> {
        self.documents
    }
}

impl Corpus for DistributedCorpus {
    fn iter(&self) -> Box<dyn Iterator<Item = Result<Document>> + Send + '_> {
        Box::new(self.documents.iter().cloned().map(Ok))
    }

    fn kind(&self) -> CorpusKind {
        CorpusKind::Distributed
    }

    fn len_hint(&self) -> Option<usize> {
        Some(self.documents.len())
    }

    fn annotate(
        self: Box<Self>,
        resolver: Resolver,
        types: &[AnnotatableType],
    ) -> Result<Box<dyn Corpus>> {
        annotate(self, resolver, types)
    }
}

// =============================================================================
// Off-heap
// =============================================================================

/// A corpus backed by a directory of `part-NNN` JSON-per-line files.
///
/// When constructed over a temporary directory the partition files live as
/// long as the corpus value does.
pub struct OffHeapCorpus {
    dir: PathBuf,
    partitions: Vec<PathBuf>,
    // Keeps a pipeline-written spill directory alive for the corpus
    // lifetime.
    _temp: Option<TempDir>,
}

impl std::fmt::Debug for OffHeapCorpus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OffHeapCorpus")
            .field("dir", &self.dir)
            .field("partitions", &self.partitions.len())
            .finish()
    }
}

impl OffHeapCorpus {
    /// Open a directory of partition files written earlier.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        Ok(Self {
            partitions: Self::scan(&dir)?,
            dir,
            _temp: None,
        })
    }

    pub(crate) fn from_temp(temp: TempDir) -> Result<Self> {
        let dir = temp.path().to_path_buf();
        Ok(Self {
            partitions: Self::scan(&dir)?,
            dir,
            _temp: Some(temp),
        })
    }

    fn scan(dir: &Path) -> Result<Vec<PathBuf>> {
        let mut partitions = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
            if path.is_file() && name.starts_with("part-") {
                partitions.push(path);
            }
        }
        partitions.sort();
        if partitions.is_empty() {
            return Err(Error::config(format!(
                "no partition files under {}",
                dir.display()
            )));
        }
        Ok(partitions)
    }

    /// Directory holding the partition files.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Number of partition files.
    #[must_use]
    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }
}

impl Corpus for OffHeapCorpus {
    fn iter(&self) -> Box<dyn Iterator<Item = Result<Document>> + Send + '_> {
        let paths = self.partitions.clone();
        Box::new(paths.into_iter().flat_map(|path| PartitionReader::new(path)))
    }

    fn kind(&self) -> CorpusKind {
        CorpusKind::OffHeap
    }

    fn annotate(
        self: Box<Self>,
        resolver: Resolver,
        types: &[AnnotatableType],
    ) -> Result<Box<dyn Corpus>> {
        annotate(self, resolver, types)
    }
}

/// Streaming reader over one partition file.
struct PartitionReader {
    lines: Option<std::io::Lines<BufReader<File>>>,
    error: Option<Error>,
}

impl PartitionReader {
    fn new(path: PathBuf) -> Self {
        match File::open(&path) {
            Ok(file) => Self {
                lines: Some(BufReader::new(file).lines()),
                error: None,
            },
            Err(e) => Self {
                lines: None,
                error: Some(e.into()),
            },
        }
    }
}

impl Iterator for PartitionReader {
    type Item = Result<Document>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(error) = self.error.take() {
            return Some(Err(error));
        }
        let line = match self.lines.as_mut()?.next()? {
            Ok(line) => line,
            Err(e) => return Some(Err(e.into())),
        };
        if line.trim().is_empty() {
            return self.next();
        }
        Some(JsonFormat.read_document(&line))
    }
}

/// Writer targeting one `part-NNN` file; the pipeline gives each worker its
/// own partition. The file handle is released on all exit paths (drop), but
/// call [`finish`](Self::finish) to surface flush errors.
pub struct PartitionWriter {
    writer: BufWriter<File>,
    path: PathBuf,
    format: Box<dyn DocumentFormat>,
}

impl PartitionWriter {
    /// Create the partition file `part-NNN` under `dir`.
    pub fn create(dir: &Path, partition: usize) -> Result<Self> {
        let path = dir.join(format!("part-{partition:03}.jsonl"));
        let file = File::create(&path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            path,
            format: Box::new(JsonFormat),
        })
    }

    /// Append one document as a line.
    pub fn write(&mut self, document: &Document) -> Result<()> {
        let line = self.format.write_document(document)?;
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    /// Flush and close, surfacing any buffered I/O error.
    pub fn finish(mut self) -> Result<PathBuf> {
        self.writer.flush()?;
        Ok(std::mem::take(&mut self.path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glossa_core::{AnnotationType, Span};

    fn doc(id: &str) -> Document {
        let t = AnnotationType::create("CORPUS_T").unwrap();
        let mut d = Document::new(id, "some text here");
        d.create_annotation(t, Span::new(0, 4)).unwrap();
        d
    }

    #[test]
    fn in_memory_iterates_in_order() {
        let corpus = InMemoryCorpus::from_documents(vec![doc("a"), doc("b")]);
        let ids: Vec<String> = corpus
            .iter()
            .map(|d| d.unwrap().id().to_string())
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(corpus.len_hint(), Some(2));
        assert_eq!(corpus.kind(), CorpusKind::InMemory);
    }

    #[test]
    fn off_heap_round_trips_partitions() {
        let temp = tempfile::tempdir().unwrap();
        let mut w0 = PartitionWriter::create(temp.path(), 0).unwrap();
        let mut w1 = PartitionWriter::create(temp.path(), 1).unwrap();
        w0.write(&doc("p0-a")).unwrap();
        w1.write(&doc("p1-a")).unwrap();
        w0.write(&doc("p0-b")).unwrap();
        w0.finish().unwrap();
        w1.finish().unwrap();

        let corpus = OffHeapCorpus::open(temp.path()).unwrap();
        assert_eq!(corpus.partition_count(), 2);
        let mut ids: Vec<String> = corpus
            .iter()
            .map(|d| d.unwrap().id().to_string())
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["p0-a", "p0-b", "p1-a"]);
        // Annotations survive the spill.
        let first = corpus.iter().next().unwrap().unwrap();
        assert_eq!(first.annotation_count(), 1);
    }

    #[test]
    fn off_heap_open_fails_without_partitions() {
        let temp = tempfile::tempdir().unwrap();
        assert!(OffHeapCorpus::open(temp.path()).is_err());
    }
}
