//! Top-level conversion entry points
//!
//! Each call builds its own [`ResolutionContext`] over a read-only
//! [`SourceSet`], so independent documents can be converted concurrently.

use std::path::{Path, PathBuf};

use pubtree_ast::Document;

use crate::config::ConvertOptions;
use crate::context::{ResolutionContext, SourceDocument};
use crate::diagnostic::Diagnostics;
use crate::error::Result;
use crate::export::{ExportOutput, Exporter};
use crate::import::Importer;
use crate::styles::StyleRegistry;
use crate::tree::IcmlDocument;

/// A conversion result with everything recoverable that went wrong
#[derive(Debug, Clone)]
pub struct Conversion<T> {
    pub output: T,
    pub diagnostics: Diagnostics,
}

/// Auxiliary trees for cross-document resolution
///
/// `documents` are searched before `sources`.
#[derive(Debug, Clone, Default)]
pub struct SourceSet {
    pub documents: Vec<SourceDocument>,
    pub sources: Vec<SourceDocument>,
}

impl SourceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the files named in `options.documents` and `options.sources`
    pub fn load(options: &ConvertOptions) -> Result<Self> {
        Ok(Self {
            documents: open_all(&options.documents)?,
            sources: open_all(&options.sources)?,
        })
    }

    fn context(&self, document_name: &str) -> ResolutionContext<'_> {
        ResolutionContext::new(document_name)
            .with_documents(&self.documents)
            .with_sources(&self.sources)
    }

    /// Style definitions from every auxiliary tree, documents first
    fn styles(&self, diags: &mut Diagnostics) -> StyleRegistry {
        let mut registry = StyleRegistry::new();
        let mut ignored = Diagnostics::new();
        for doc in self.documents.iter().chain(self.sources.iter()) {
            for def in StyleRegistry::from_root(&doc.root, diags).iter() {
                registry.insert(def.clone(), &mut ignored);
            }
        }
        registry
    }
}

fn open_all(paths: &[PathBuf]) -> Result<Vec<SourceDocument>> {
    paths.iter().map(|p| SourceDocument::open(p)).collect()
}

/// Conversion between an interchange type and the canonical document
pub trait Convert {
    /// The type this converts to
    type Output;

    fn convert(&self, sources: &SourceSet, options: &ConvertOptions) -> Conversion<Self::Output>;
}

impl Convert for IcmlDocument {
    type Output = Document;

    fn convert(&self, sources: &SourceSet, options: &ConvertOptions) -> Conversion<Document> {
        let mut diagnostics = Diagnostics::new();
        let styles = StyleRegistry::from_root(&self.root, &mut diagnostics);
        let ctx = sources.context(&options.document_name);
        let (output, more) = Importer::new(&self.root, &styles, options, ctx).import();
        diagnostics.extend(more);
        tracing::debug!(
            document = %options.document_name,
            diagnostics = diagnostics.len(),
            "import finished"
        );
        Conversion { output, diagnostics }
    }
}

impl Convert for Document {
    type Output = ExportOutput;

    fn convert(&self, sources: &SourceSet, options: &ConvertOptions) -> Conversion<ExportOutput> {
        let mut diagnostics = Diagnostics::new();
        let styles = sources.styles(&mut diagnostics);
        let ctx = sources.context(&options.document_name);
        let (output, more) = Exporter::new(self, &styles, options, ctx).export();
        diagnostics.extend(more);
        tracing::debug!(
            document = %options.document_name,
            diagnostics = diagnostics.len(),
            "export finished"
        );
        Conversion { output, diagnostics }
    }
}

/// Interchange to canonical
pub fn import(source: &IcmlDocument, sources: &SourceSet, options: &ConvertOptions) -> Conversion<Document> {
    source.convert(sources, options)
}

/// Canonical to interchange
pub fn export(doc: &Document, sources: &SourceSet, options: &ConvertOptions) -> Conversion<ExportOutput> {
    doc.convert(sources, options)
}

/// Where leftover endnotes are written: `<stem>_Endnotes.icml` beside `output`
pub fn endnotes_path(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    output.with_file_name(format!("{}_Endnotes.icml", stem))
}
