//! Document serialization capability used by the off-heap corpus strategy.
//!
//! Only the capability boundary lives here: turn one document into a string
//! and back. Concrete on-disk corpus formats beyond JSON-per-line are out
//! of scope.

use glossa_core::{Document, Result};

/// Serialize one document to a string and back, one document per line.
pub trait DocumentFormat: Send + Sync {
    /// Serialize a document to a single line.
    fn write_document(&self, document: &Document) -> Result<String>;

    /// Deserialize a document from a single line.
    fn read_document(&self, line: &str) -> Result<Document>;

    /// File extension used for partition files.
    fn extension(&self) -> &str {
        "jsonl"
    }
}

/// JSON-per-line format; the serde representation is lossless for spans,
/// attributes, relations, and the completed-type table.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFormat;

impl DocumentFormat for JsonFormat {
    fn write_document(&self, document: &Document) -> Result<String> {
        Ok(serde_json::to_string(document)?)
    }

    fn read_document(&self, line: &str) -> Result<Document> {
        Ok(serde_json::from_str(line)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glossa_core::{AnnotationType, Span};

    #[test]
    fn json_lines_round_trip() {
        let t = AnnotationType::create("FMT_TOKEN").unwrap();
        let mut doc = Document::new("f1", "ab cd");
        doc.create_annotation(t, Span::new(0, 2)).unwrap();
        doc.mark_completed(t, "tok::1.0");

        let line = JsonFormat.write_document(&doc).unwrap();
        assert!(!line.contains('\n'));
        let back = JsonFormat.read_document(&line).unwrap();
        assert_eq!(back.id(), "f1");
        assert!(back.is_completed(t));
        assert_eq!(back.annotation_count(), 1);
    }
}
