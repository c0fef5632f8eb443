//! Byte-bounded batching of documents for bulk upload.
//!
//! A batch closes when the next document would push its estimated wire size
//! strictly past `max_bytes`. A document larger than the limit on its own is
//! still accepted as the only member of its batch.

use std::mem;

use serde::Serialize;

/// Ordered documents sent together in one upload call.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch<T> {
    documents: Vec<T>,
    estimated_bytes: usize,
}

impl<T> Batch<T> {
    /// Documents in push order.
    #[must_use]
    pub fn documents(&self) -> &[T] {
        &self.documents
    }

    /// Consume the batch and return its documents.
    #[must_use]
    pub fn into_documents(self) -> Vec<T> {
        self.documents
    }

    /// Sum of the members' estimated wire sizes.
    #[must_use]
    pub const fn estimated_bytes(&self) -> usize {
        self.estimated_bytes
    }

    /// Number of documents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Whether the batch is empty. Closed batches never are.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// Accumulates documents into batches bounded by `max_bytes`.
///
/// # Examples
/// ```
/// use osmload_core::DocumentChunker;
/// use serde_json::json;
///
/// let mut chunker = DocumentChunker::new(10);
/// assert!(chunker.push(json!({"a": 1}), None).is_none());
/// let closed = chunker.push(json!({"a": 2}), None).expect("limit exceeded");
/// assert_eq!(closed.documents(), [json!({"a": 1})]);
/// let rest = chunker.flush().expect("one document left");
/// assert_eq!(rest.documents(), [json!({"a": 2})]);
/// assert!(chunker.flush().is_none());
/// ```
#[derive(Debug)]
pub struct DocumentChunker<T> {
    max_bytes: usize,
    open: Vec<T>,
    open_bytes: usize,
}

impl<T: Serialize> DocumentChunker<T> {
    /// Create a chunker with the given byte budget per batch.
    #[must_use]
    pub const fn new(max_bytes: usize) -> Self {
        Self {
            max_bytes,
            open: Vec::new(),
            open_bytes: 0,
        }
    }

    /// Byte budget per batch.
    #[must_use]
    pub const fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Number of documents in the open batch.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.open.len()
    }

    /// Add a document, returning the previously open batch if it had to close.
    ///
    /// `estimated_bytes` overrides the computed [`estimate_wire_size`].
    pub fn push(&mut self, document: T, estimated_bytes: Option<usize>) -> Option<Batch<T>> {
        let size = estimated_bytes.unwrap_or_else(|| estimate_wire_size(&document));
        let overflows = self.open_bytes.saturating_add(size) > self.max_bytes;
        let closed = if !self.open.is_empty() && overflows {
            self.take()
        } else {
            None
        };
        self.open_bytes = self.open_bytes.saturating_add(size);
        self.open.push(document);
        closed
    }

    /// Close and return whatever is open.
    pub fn flush(&mut self) -> Option<Batch<T>> {
        self.take()
    }

    fn take(&mut self) -> Option<Batch<T>> {
        if self.open.is_empty() {
            return None;
        }
        Some(Batch {
            documents: mem::take(&mut self.open),
            estimated_bytes: mem::replace(&mut self.open_bytes, 0),
        })
    }
}

/// Serialised JSON length plus one byte for the record separator.
///
/// A value that fails to serialise counts as the separator alone; the
/// transport will surface the real error when it encodes the batch.
#[must_use]
pub fn estimate_wire_size<T: Serialize>(document: &T) -> usize {
    serde_json::to_vec(document).map_or(0, |bytes| bytes.len()) + 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;
    use serde_json::{Value, json};

    fn drain(chunker: &mut DocumentChunker<Value>, docs: &[Value]) -> Vec<Batch<Value>> {
        let mut batches: Vec<Batch<Value>> = docs
            .iter()
            .filter_map(|doc| chunker.push(doc.clone(), None))
            .collect();
        batches.extend(chunker.flush());
        batches
    }

    #[rstest]
    fn reaching_the_limit_exactly_does_not_flush() {
        let mut chunker = DocumentChunker::new(16);
        // {"a":1} is 7 bytes plus the separator.
        assert!(chunker.push(json!({"a": 1}), None).is_none());
        assert!(chunker.push(json!({"a": 2}), None).is_none());
        assert_eq!(chunker.pending(), 2);
        assert!(chunker.push(json!({"a": 3}), None).is_some());
    }

    #[rstest]
    fn oversized_document_becomes_a_single_batch() {
        let mut chunker = DocumentChunker::new(4);
        assert!(chunker.push(json!({"big": "xxxxxxxx"}), None).is_none());
        let closed = chunker
            .push(json!({"a": 1}), None)
            .expect("open batch closes");
        assert_eq!(closed.len(), 1);
        assert!(closed.estimated_bytes() > 4);
    }

    #[rstest]
    fn explicit_estimates_drive_boundaries() {
        let mut chunker = DocumentChunker::new(100);
        assert!(chunker.push(json!(1), Some(60)).is_none());
        let closed = chunker.push(json!(2), Some(41)).expect("exceeds budget");
        assert_eq!(closed.estimated_bytes(), 60);
    }

    #[rstest]
    fn flush_on_empty_chunker_returns_nothing() {
        let mut chunker: DocumentChunker<Value> = DocumentChunker::new(10);
        assert!(chunker.flush().is_none());
    }

    fn small_docs() -> impl Strategy<Value = Vec<Value>> {
        prop::collection::vec("[a-z]{0,12}".prop_map(|s| json!({ "v": s })), 0..40)
    }

    proptest! {
        #[test]
        fn batches_respect_budget(docs in small_docs(), max in 20usize..200) {
            let mut chunker = DocumentChunker::new(max);
            for batch in drain(&mut chunker, &docs) {
                prop_assert!(!batch.is_empty());
                if batch.len() > 1 {
                    prop_assert!(batch.estimated_bytes() <= max);
                }
            }
        }

        #[test]
        fn batches_partition_input_in_order(docs in small_docs(), max in 1usize..200) {
            let mut chunker = DocumentChunker::new(max);
            let flattened: Vec<Value> = drain(&mut chunker, &docs)
                .into_iter()
                .flat_map(Batch::into_documents)
                .collect();
            prop_assert_eq!(flattened, docs);
        }

        #[test]
        fn explicit_matching_estimate_keeps_boundaries(docs in small_docs(), max in 1usize..200) {
            let mut implicit = DocumentChunker::new(max);
            let mut explicit = DocumentChunker::new(max);
            for doc in &docs {
                let a = implicit.push(doc.clone(), None).map(Batch::into_documents);
                let b = explicit
                    .push(doc.clone(), Some(estimate_wire_size(doc)))
                    .map(Batch::into_documents);
                prop_assert_eq!(a, b);
            }
            prop_assert_eq!(
                implicit.flush().map(Batch::into_documents),
                explicit.flush().map(Batch::into_documents)
            );
        }
    }
}
