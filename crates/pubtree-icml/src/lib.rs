//! # pubtree-icml
//!
//! ICML/IDML interchange codec for the pubtree canonical document.
//!
//! This crate provides functionality to:
//! - Read ICML files and IDML packages into an interchange tree
//! - Import interchange stories into the canonical document
//! - Export a canonical document back to ICML, with deferred hyperlinks,
//!   bookmarks and endnotes
//! - Resolve style inheritance and render a CSS stylesheet
//!
//! ## Example: Importing a Story
//!
//! ```
//! use pubtree_icml::{import, ConvertOptions, IcmlDocument, SourceSet};
//!
//! let icml = IcmlDocument::parse(
//!     r#"<Document><Story Self="u1"><ParagraphStyleRange><CharacterStyleRange><Content>Hi</Content></CharacterStyleRange></ParagraphStyleRange></Story></Document>"#,
//! )?;
//! let options = ConvertOptions::default().with_document_name("ch01");
//! let result = import(&icml, &SourceSet::new(), &options);
//! assert!(result.output.to_xml().contains("Hi"));
//! # Ok::<(), pubtree_icml::IcmlError>(())
//! ```

pub mod archive;
pub mod config;
pub mod context;
pub mod conversion;
pub mod css;
pub mod diagnostic;
pub mod error;
pub mod export;
pub mod import;
pub mod normalize;
pub mod numbering;
pub mod resolve;
pub mod rules;
pub mod styles;
pub mod tree;

pub use archive::IdmlArchive;
pub use config::ConvertOptions;
pub use context::{ResolutionContext, SourceDocument};
pub use conversion::{endnotes_path, export, import, Convert, Conversion, SourceSet};
pub use css::Stylesheet;
pub use diagnostic::{Diagnostic, DiagnosticKind, Diagnostics, Severity};
pub use error::{IcmlError, Result};
pub use export::{ExportOutput, Exporter};
pub use import::Importer;
pub use styles::{StyleDef, StyleKind, StyleRegistry};
pub use tree::{Content, Element, IcmlDocument};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
