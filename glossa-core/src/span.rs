//! Half-open character spans, the base unit of position.
//!
//! Every annotation is anchored at a `Span` over the owning document's text.
//! All relationship predicates (`overlaps`, `contains`, `during`,
//! `starts_with`) follow the same half-open convention, and the `Ord`
//! implementation gives document order: start offset ascending, then end
//! offset ascending. Downstream consumers (featurizers, extractors) rely on
//! that order for left-to-right token iteration.

use serde::{Deserialize, Serialize};

/// A half-open character interval `[start, end)` over a document's text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Span {
    /// Start character offset (inclusive)
    pub start: usize,
    /// End character offset (exclusive)
    pub end: usize,
}

impl Span {
    /// Create a new span. `start > end` is normalized to an empty span at
    /// `start`.
    #[must_use]
    pub fn new(start: usize, end: usize) -> Self {
        Self {
            start,
            end: end.max(start),
        }
    }

    /// Length of the span in characters.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.end - self.start
    }

    /// Returns true if the span covers no characters.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Two spans overlap iff `start < other.end && other.start < end`.
    #[must_use]
    pub const fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Returns true if `other` lies fully inside this span.
    #[must_use]
    pub const fn contains(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Returns true if this span lies fully inside `other` (inverse of
    /// [`contains`](Self::contains)).
    #[must_use]
    pub const fn during(&self, other: &Span) -> bool {
        other.contains(self)
    }

    /// Returns true if both spans share the same start offset, regardless of
    /// end.
    #[must_use]
    pub const fn starts_with(&self, other: &Span) -> bool {
        self.start == other.start
    }

    /// Returns true if the given offset falls inside the span.
    #[must_use]
    pub const fn contains_offset(&self, offset: usize) -> bool {
        self.start <= offset && offset < self.end
    }
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

impl From<std::ops::Range<usize>> for Span {
    fn from(r: std::ops::Range<usize>) -> Self {
        Span::new(r.start, r.end)
    }
}
