//! Error types for interchange operations

use thiserror::Error;

/// Errors that abort a conversion
///
/// Only structurally unreadable input ends up here. Recoverable problems
/// inside a readable document are reported as
/// [`Diagnostic`](crate::diagnostic::Diagnostic)s instead.
#[derive(Error, Debug)]
pub enum IcmlError {
    /// Error reading the IDML package
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// Error reading or writing files
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Error parsing XML content
    #[error("XML parsing error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Malformed escape sequence in XML text
    #[error("XML escape error: {0}")]
    Escape(#[from] quick_xml::escape::EscapeError),

    /// Canonical document could not be read
    #[error("Canonical document error: {0}")]
    Canonical(#[from] pubtree_ast::AstError),

    /// Required file not found in package
    #[error("Required file not found: {0}")]
    MissingFile(String),

    /// Invalid document structure
    #[error("Invalid document structure: {0}")]
    InvalidStructure(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Conversion options could not be read
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),
}

/// Result type for interchange operations
pub type Result<T> = std::result::Result<T, IcmlError>;
