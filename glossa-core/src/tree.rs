//! The span index: an augmented interval tree over a document's
//! annotations.
//!
//! An AVL tree keyed by `(start, end)` with per-node max-end tracking makes
//! the four span-relationship queries (`overlapping`, `enclosed_by`,
//! `enclosing`, `starting_at`) run in O(log n + k) instead of scanning the
//! whole document. Every query returns ids in document order: start offset
//! ascending, then end offset ascending, which `first()`/`last()` and
//! left-to-right consumers rely on.
//!
//! Multiple annotations may share one span; a node holds a bucket of ids in
//! insertion order (ids are monotonic per document, so bucket order is
//! document order too). The tree is not safe for concurrent mutation, but
//! concurrent reads of a completed index are.

use crate::annotation::AnnotationId;
use crate::span::Span;

#[derive(Debug, Clone)]
struct Node {
    span: Span,
    ids: Vec<AnnotationId>,
    /// Maximum end offset over this subtree.
    max_end: usize,
    height: i32,
    left: Option<Box<Node>>,
    right: Option<Box<Node>>,
}

impl Node {
    fn leaf(span: Span, id: AnnotationId) -> Box<Node> {
        Box::new(Node {
            span,
            ids: vec![id],
            max_end: span.end,
            height: 1,
            left: None,
            right: None,
        })
    }

    fn update(&mut self) {
        self.height = 1 + height(&self.left).max(height(&self.right));
        self.max_end = self.span.end;
        if let Some(l) = &self.left {
            self.max_end = self.max_end.max(l.max_end);
        }
        if let Some(r) = &self.right {
            self.max_end = self.max_end.max(r.max_end);
        }
    }

    fn balance_factor(&self) -> i32 {
        height(&self.left) - height(&self.right)
    }
}

fn height(node: &Option<Box<Node>>) -> i32 {
    node.as_ref().map_or(0, |n| n.height)
}

fn rotate_left(mut node: Box<Node>) -> Box<Node> {
    let mut right = node.right.take().expect("rotate_left requires right child");
    node.right = right.left.take();
    node.update();
    right.left = Some(node);
    right.update();
    right
}

fn rotate_right(mut node: Box<Node>) -> Box<Node> {
    let mut left = node.left.take().expect("rotate_right requires left child");
    node.left = left.right.take();
    node.update();
    left.right = Some(node);
    left.update();
    left
}

fn rebalance(mut node: Box<Node>) -> Box<Node> {
    node.update();
    let bf = node.balance_factor();
    if bf > 1 {
        if node.left.as_ref().is_some_and(|l| l.balance_factor() < 0) {
            node.left = node.left.take().map(rotate_left);
        }
        return rotate_right(node);
    }
    if bf < -1 {
        if node.right.as_ref().is_some_and(|r| r.balance_factor() > 0) {
            node.right = node.right.take().map(rotate_right);
        }
        return rotate_left(node);
    }
    node
}

fn insert(node: Option<Box<Node>>, span: Span, id: AnnotationId) -> Box<Node> {
    let Some(mut n) = node else {
        return Node::leaf(span, id);
    };
    match (span.start, span.end).cmp(&(n.span.start, n.span.end)) {
        std::cmp::Ordering::Equal => {
            n.ids.push(id);
            n
        }
        std::cmp::Ordering::Less => {
            n.left = Some(insert(n.left.take(), span, id));
            rebalance(n)
        }
        std::cmp::Ordering::Greater => {
            n.right = Some(insert(n.right.take(), span, id));
            rebalance(n)
        }
    }
}

/// Detach the minimum node of a subtree, returning (rest, min).
fn take_min(mut node: Box<Node>) -> (Option<Box<Node>>, Box<Node>) {
    match node.left.take() {
        None => {
            let rest = node.right.take();
            (rest, node)
        }
        Some(left) => {
            let (rest, min) = take_min(left);
            node.left = rest;
            (Some(rebalance(node)), min)
        }
    }
}

fn remove(node: Option<Box<Node>>, span: Span, id: AnnotationId, removed: &mut bool) -> Option<Box<Node>> {
    let mut n = node?;
    match (span.start, span.end).cmp(&(n.span.start, n.span.end)) {
        std::cmp::Ordering::Less => {
            n.left = remove(n.left.take(), span, id, removed);
            Some(rebalance(n))
        }
        std::cmp::Ordering::Greater => {
            n.right = remove(n.right.take(), span, id, removed);
            Some(rebalance(n))
        }
        std::cmp::Ordering::Equal => {
            if let Some(pos) = n.ids.iter().position(|&i| i == id) {
                n.ids.remove(pos);
                *removed = true;
            }
            if !n.ids.is_empty() {
                return Some(n);
            }
            // Empty bucket: delete the node itself.
            match (n.left.take(), n.right.take()) {
                (None, None) => None,
                (Some(l), None) => Some(l),
                (None, Some(r)) => Some(r),
                (Some(l), Some(r)) => {
                    let (rest, mut min) = take_min(r);
                    min.left = Some(l);
                    min.right = rest;
                    Some(rebalance(min))
                }
            }
        }
    }
}

/// Interval-indexed store of annotation ids keyed by span.
#[derive(Debug, Clone, Default)]
pub struct SpanIndex {
    root: Option<Box<Node>>,
    len: usize,
}

impl SpanIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of annotations in the index.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the index holds no annotations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Insert an annotation id at the given span.
    pub fn insert(&mut self, span: Span, id: AnnotationId) {
        self.root = Some(insert(self.root.take(), span, id));
        self.len += 1;
    }

    /// Remove an annotation id at the given span, rebalancing as needed.
    /// Returns true if the id was present.
    pub fn remove(&mut self, span: Span, id: AnnotationId) -> bool {
        let mut removed = false;
        self.root = remove(self.root.take(), span, id, &mut removed);
        if removed {
            self.len -= 1;
        }
        removed
    }

    /// Whether any annotation is indexed at exactly the given span.
    /// O(log n).
    #[must_use]
    pub fn contains(&self, span: Span) -> bool {
        let mut cursor = &self.root;
        while let Some(n) = cursor {
            match (span.start, span.end).cmp(&(n.span.start, n.span.end)) {
                std::cmp::Ordering::Equal => return !n.ids.is_empty(),
                std::cmp::Ordering::Less => cursor = &n.left,
                std::cmp::Ordering::Greater => cursor = &n.right,
            }
        }
        false
    }

    /// Ids of annotations whose spans overlap the reference span, in
    /// document order.
    #[must_use]
    pub fn overlapping(&self, span: Span) -> Vec<AnnotationId> {
        let mut out = Vec::new();
        Self::collect(&self.root, &mut out, &|s| s.overlaps(&span), &|_, l| {
            // No span in the left subtree ends past the reference start.
            l.max_end > span.start
        }, &|n| {
            // Keys to the right start at or after this node's start.
            n.span.start < span.end
        });
        out
    }

    /// Ids of annotations fully contained within the reference span, in
    /// document order. A span identical to the reference is not its own
    /// containee and is excluded.
    #[must_use]
    pub fn enclosed_by(&self, span: Span) -> Vec<AnnotationId> {
        let mut out = Vec::new();
        Self::collect(
            &self.root,
            &mut out,
            &|s| span.contains(s) && *s != span,
            // Left-subtree keys start at or before the parent's start, and
            // a contained span cannot end before the reference start.
            &|p, l| p.span.start >= span.start && l.max_end >= span.start,
            &|n| n.span.start < span.end,
        );
        out
    }

    /// Ids of annotations whose spans fully contain the reference span, in
    /// document order. A span identical to the reference is excluded.
    #[must_use]
    pub fn enclosing(&self, span: Span) -> Vec<AnnotationId> {
        let mut out = Vec::new();
        Self::collect(
            &self.root,
            &mut out,
            &|s| s.contains(&span) && *s != span,
            &|_, l| l.max_end >= span.end,
            &|n| n.span.start <= span.start,
        );
        out
    }

    /// Ids of annotations sharing the reference span's start offset,
    /// regardless of end, in document order.
    #[must_use]
    pub fn starting_at(&self, span: Span) -> Vec<AnnotationId> {
        let mut out = Vec::new();
        Self::collect(
            &self.root,
            &mut out,
            &|s| s.start == span.start,
            // Left-subtree keys start at or before the parent's start.
            &|p, _| p.span.start >= span.start,
            &|n| n.span.start <= span.start,
        );
        out
    }

    /// In-order traversal with subtree pruning. `matches` accepts a span,
    /// `descend_left` gates the left subtree (given the current node and its
    /// left child), `descend_right` gates the right subtree.
    fn collect(
        node: &Option<Box<Node>>,
        out: &mut Vec<AnnotationId>,
        matches: &dyn Fn(&Span) -> bool,
        descend_left: &dyn Fn(&Node, &Node) -> bool,
        descend_right: &dyn Fn(&Node) -> bool,
    ) {
        let Some(n) = node else { return };
        if let Some(l) = &n.left {
            if descend_left(n, l) {
                Self::collect(&n.left, out, matches, descend_left, descend_right);
            }
        }
        if matches(&n.span) {
            out.extend_from_slice(&n.ids);
        }
        if descend_right(n) {
            Self::collect(&n.right, out, matches, descend_left, descend_right);
        }
    }

    /// All ids in document order.
    #[must_use]
    pub fn iter_ordered(&self) -> Vec<AnnotationId> {
        let mut out = Vec::with_capacity(self.len);
        Self::collect(&self.root, &mut out, &|_| true, &|_, _| true, &|_| true);
        out
    }

    /// First id in document order.
    #[must_use]
    pub fn first(&self) -> Option<AnnotationId> {
        let mut cursor = self.root.as_ref()?;
        while let Some(l) = cursor.left.as_ref() {
            cursor = l;
        }
        cursor.ids.first().copied()
    }

    /// Last id in document order.
    #[must_use]
    pub fn last(&self) -> Option<AnnotationId> {
        let mut cursor = self.root.as_ref()?;
        while let Some(r) = cursor.right.as_ref() {
            cursor = r;
        }
        cursor.ids.last().copied()
    }
}
