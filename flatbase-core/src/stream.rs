// src/stream.rs
//! Lazy document streams threaded through pipeline stages
//!
//! A pipeline starts `Unseeded`. The first stage that needs documents seeds
//! the stream, either from an index hit or from a whole-collection read, and
//! every later stage wraps the iterator it receives. Nothing is pulled until
//! the caller collects.
//!
//! ```text
//! Unseeded --seed--> Stored --FILTER/SORT/SKIP/LIMIT--> Stored
//!                      |
//!                      +--MAP/JOIN/GROUP_BY/DISTINCT/COUNT--> Derived
//! ```
//!
//! Index key sets describe stored rows, so they may only be trusted while
//! the stream is still `Stored`.

use crate::document::Document;

pub type DocumentIter<'a> = Box<dyn Iterator<Item = Document> + 'a>;

pub enum DocumentStream<'a> {
    Unseeded,
    /// Documents exactly as the store holds them
    Stored(DocumentIter<'a>),
    /// Documents reshaped by an earlier stage
    Derived(DocumentIter<'a>),
}

impl<'a> DocumentStream<'a> {
    pub fn stored<I>(iter: I) -> Self
    where
        I: Iterator<Item = Document> + 'a,
    {
        DocumentStream::Stored(Box::new(iter))
    }

    pub fn derived<I>(iter: I) -> Self
    where
        I: Iterator<Item = Document> + 'a,
    {
        DocumentStream::Derived(Box::new(iter))
    }

    pub fn is_seeded(&self) -> bool {
        !matches!(self, DocumentStream::Unseeded)
    }

    /// True while every document still matches its stored row
    pub fn is_stored(&self) -> bool {
        matches!(self, DocumentStream::Stored(_))
    }

    /// Underlying iterator, if the stream has been seeded
    pub fn into_upstream(self) -> Option<DocumentIter<'a>> {
        match self {
            DocumentStream::Unseeded => None,
            DocumentStream::Stored(iter) | DocumentStream::Derived(iter) => Some(iter),
        }
    }

    /// Wrap the seeded iterator, keeping whether it still yields stored rows
    pub fn reshape<F>(self, f: F) -> Self
    where
        F: FnOnce(DocumentIter<'a>) -> DocumentIter<'a>,
    {
        match self {
            DocumentStream::Unseeded => DocumentStream::Unseeded,
            DocumentStream::Stored(iter) => DocumentStream::Stored(f(iter)),
            DocumentStream::Derived(iter) => DocumentStream::Derived(f(iter)),
        }
    }

    /// Drain the stream; an unseeded stream yields nothing
    pub fn into_documents(self) -> Vec<Document> {
        self.into_upstream().map(Iterator::collect).unwrap_or_default()
    }
}

impl std::fmt::Debug for DocumentStream<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentStream::Unseeded => f.write_str("Unseeded"),
            DocumentStream::Stored(_) => f.write_str("Stored(..)"),
            DocumentStream::Derived(_) => f.write_str("Derived(..)"),
        }
    }
}

/// Postpone a blocking stage (sort, count, set algebra over upstream keys)
/// until the first document is pulled
pub fn deferred<'a, F>(produce: F) -> DocumentIter<'a>
where
    F: FnOnce() -> Vec<Document> + 'a,
{
    Box::new(std::iter::once_with(produce).flatten())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_unseeded_collects_empty() {
        assert!(DocumentStream::Unseeded.into_documents().is_empty());
        assert!(!DocumentStream::Unseeded.is_seeded());
    }

    #[test]
    fn test_deferred_runs_only_when_pulled() {
        let runs = Cell::new(0);
        let iter = deferred(|| {
            runs.set(runs.get() + 1);
            vec![Document::new(), Document::new()]
        });
        let stream = DocumentStream::Derived(iter);
        assert!(!stream.is_stored());
        assert_eq!(runs.get(), 0);
        assert_eq!(stream.into_documents().len(), 2);
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn test_reshape_keeps_provenance() {
        let docs = || vec![Document::new().with("n", 1), Document::new().with("n", 2)].into_iter();

        let stored = DocumentStream::stored(docs()).reshape(|iter| Box::new(iter.skip(1)));
        assert!(stored.is_stored());
        assert_eq!(stored.into_documents().len(), 1);

        let derived = DocumentStream::derived(docs()).reshape(|iter| Box::new(iter.take(1)));
        assert!(derived.is_seeded());
        assert!(!derived.is_stored());

        assert!(!DocumentStream::Unseeded.reshape(|iter| iter).is_seeded());
    }
}
