//! pubtree-ast - canonical document tree
//!
//! The canonical document is the format-neutral tree every converter
//! targets: `document > body > section > {p, table, footnote, ...}`.
//! It is stored as an arena of [`Node`]s addressed by [`NodeId`], with
//! lxml-style `text`/`tail` slots instead of dedicated text nodes.
//!
//! # Example
//!
//! ```
//! use pubtree_ast::{Document, Tag};
//!
//! let doc = Document::parse("<document><body><section><p>Hi</p></section></body></document>")?;
//! let paras = doc.select(|n| n.tag == Tag::P);
//! assert_eq!(doc.text_content(paras[0]), "Hi");
//! # Ok::<(), pubtree_ast::AstError>(())
//! ```

pub mod document;
pub mod error;
pub mod tag;
pub mod xml;

pub use document::{Document, Node, NodeId};
pub use error::{AstError, Result};
pub use tag::Tag;
pub use xml::escape_xml;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
