//! Error types for the canonical document tree

use thiserror::Error;

/// Errors raised while reading canonical XML
#[derive(Error, Debug)]
pub enum AstError {
    /// The XML could not be tokenized
    #[error("XML parsing error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Element or attribute text was not valid escaped XML
    #[error("XML escape error: {0}")]
    Escape(#[from] quick_xml::escape::EscapeError),

    /// The XML was well-formed but could not form a tree
    #[error("Invalid document structure: {0}")]
    InvalidStructure(String),
}

/// Result type for canonical tree operations
pub type Result<T> = std::result::Result<T, AstError>;
