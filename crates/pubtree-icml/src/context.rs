//! Reference resolution context
//!
//! One [`ResolutionContext`] lives for exactly one top-level conversion. It
//! owns the queues filled during descent (hyperlinks, bookmarks, endnotes),
//! the footnote ordinals, the diagnostics, and read-only views of the
//! auxiliary documents searched when a reference is not local.

use std::path::Path;

use sha2::{Digest, Sha256};

use crate::archive::IdmlArchive;
use crate::diagnostic::Diagnostics;
use crate::error::Result;
use crate::tree::{Content, Element, IcmlDocument};

/// An interchange tree available for cross-document lookups
#[derive(Debug, Clone, PartialEq)]
pub struct SourceDocument {
    /// File name or stem the tree was read from
    pub name: String,
    pub root: Element,
}

impl SourceDocument {
    pub fn new(name: impl Into<String>, root: Element) -> Self {
        Self {
            name: name.into(),
            root,
        }
    }

    /// Read an `.icml` file or an `.idml` package
    pub fn open(path: &Path) -> Result<Self> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let is_idml = path
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case("idml"));
        if is_idml {
            let archive = IdmlArchive::open(path)?;
            return archive.to_source_document(&name);
        }
        let xml = std::fs::read_to_string(path)?;
        let doc = IcmlDocument::parse(&xml)?;
        Ok(Self::new(name, doc.root))
    }

    /// Canonical file name this tree converts to (`chapter01.xml`)
    pub fn filename(&self) -> String {
        canonical_filename(&self.name)
    }
}

/// `<stem>.xml` for a document name or path
pub fn canonical_filename(name: &str) -> String {
    let stem = Path::new(name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string());
    format!("{}.xml", stem)
}

/// A lookup hit and the name of the document it lives in
#[derive(Debug, Clone, Copy)]
pub struct Found<'r> {
    pub element: &'r Element,
    pub document: &'r str,
}

impl Found<'_> {
    /// Canonical file name of the containing document
    pub fn filename(&self) -> String {
        canonical_filename(self.document)
    }
}

/// First element at or below `root` matching a predicate
pub fn find_in<'r>(root: &'r Element, pred: &dyn Fn(&Element) -> bool) -> Option<&'r Element> {
    if pred(root) {
        return Some(root);
    }
    root.find_descendant(pred)
}

/// Mutable state for one traversal
#[derive(Debug)]
pub struct ResolutionContext<'a> {
    /// Name of the document being converted
    pub document_name: String,
    documents: &'a [SourceDocument],
    sources: &'a [SourceDocument],
    /// Pending `Hyperlink` elements
    pub hyperlinks: Vec<Element>,
    /// Pending `Bookmark` elements
    pub bookmarks: Vec<Element>,
    /// Endnote content not yet placed
    pub endnotes: Vec<Content>,
    footnotes: Vec<String>,
    pub diagnostics: Diagnostics,
    counter: u64,
}

impl<'a> ResolutionContext<'a> {
    pub fn new(document_name: impl Into<String>) -> Self {
        let document_name = document_name.into();
        Self {
            document_name,
            documents: &[],
            sources: &[],
            hyperlinks: Vec::new(),
            bookmarks: Vec::new(),
            endnotes: Vec::new(),
            footnotes: Vec::new(),
            diagnostics: Diagnostics::new(),
            counter: 0,
        }
    }

    /// Auxiliary documents, searched before sources
    pub fn with_documents(mut self, documents: &'a [SourceDocument]) -> Self {
        self.documents = documents;
        self
    }

    /// Sibling files of a multi-file publication
    pub fn with_sources(mut self, sources: &'a [SourceDocument]) -> Self {
        self.sources = sources;
        self
    }

    /// Canonical file name of the current document
    pub fn filename(&self) -> String {
        canonical_filename(&self.document_name)
    }

    /// Find an element: current document, then documents, then sources
    pub fn find<'r>(&'r self, current: &'r Element, pred: &dyn Fn(&Element) -> bool) -> Option<Found<'r>> {
        if let Some(element) = find_in(current, pred) {
            return Some(Found {
                element,
                document: &self.document_name,
            });
        }
        self.find_auxiliary(pred)
    }

    /// Find an element in the auxiliary documents and sources only
    pub fn find_auxiliary(&self, pred: &dyn Fn(&Element) -> bool) -> Option<Found<'a>> {
        self.documents
            .iter()
            .chain(self.sources.iter())
            .find_map(|doc| {
                find_in(&doc.root, pred).map(|element| Found {
                    element,
                    document: doc.name.as_str(),
                })
            })
    }

    /// Ordinal (1-based) of a footnote, assigned in first-occurrence order
    pub fn footnote_number(&mut self, key: &str) -> usize {
        match self.footnotes.iter().position(|k| k == key) {
            Some(i) => i + 1,
            None => {
                self.footnotes.push(key.to_string());
                self.footnotes.len()
            }
        }
    }

    /// Deterministic id: a digest of the document name and a running counter
    pub fn next_id(&mut self, prefix: &str) -> String {
        self.counter += 1;
        let mut hasher = Sha256::new();
        hasher.update(self.document_name.as_bytes());
        hasher.update(b":");
        hasher.update(self.counter.to_string().as_bytes());
        let digest = hasher.finalize();
        let hex: String = digest.iter().take(4).map(|b| format!("{:02x}", b)).collect();
        format!("{}{}", prefix, hex)
    }

    /// Drain the endnote queue
    pub fn take_endnotes(&mut self) -> Vec<Content> {
        std::mem::take(&mut self.endnotes)
    }
}
