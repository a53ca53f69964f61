//! Conversion options
//!
//! Options can be built in code or loaded from a TOML file:
//!
//! ```toml
//! pts_per_em = 12
//! table_width = 324
//! document_name = "chapter01"
//! sources = ["book/Book.idml"]
//! documents = ["chapter02.icml"]
//! convert_lists = true
//! ```
//!
//! Unrecognized keys are collected into `extra` and logged, never rejected.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::css::DEFAULT_PTS_PER_EM;
use crate::error::Result;

/// Total table width in points (4.5 inches)
pub const DEFAULT_TABLE_WIDTH: f64 = 324.0;

/// Options shared by import and export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertOptions {
    /// Points per em for font-size and margin conversion
    pub pts_per_em: f64,
    /// Total table width in points on export
    pub table_width: f64,
    /// Stem used for filenames and generated ids
    pub document_name: String,
    /// Explicit output path
    pub output: Option<PathBuf>,
    /// Sibling publication files searched for references
    pub sources: Vec<PathBuf>,
    /// Auxiliary documents searched for references before sources
    pub documents: Vec<PathBuf>,
    /// Keep paragraphs that are empty after normalization
    pub preserve_paragraphs: bool,
    /// Turn bulleted and numbered paragraphs into lists
    pub convert_lists: bool,
    /// Preview mode: unwrap endnote carriers instead of keeping them
    pub strip_notes: bool,
    /// Unrecognized keys
    #[serde(flatten)]
    pub extra: BTreeMap<String, toml::Value>,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            pts_per_em: DEFAULT_PTS_PER_EM,
            table_width: DEFAULT_TABLE_WIDTH,
            document_name: "document".to_string(),
            output: None,
            sources: Vec::new(),
            documents: Vec::new(),
            preserve_paragraphs: false,
            convert_lists: false,
            strip_notes: false,
            extra: BTreeMap::new(),
        }
    }
}

impl ConvertOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse options from TOML
    pub fn from_toml_str(toml_str: &str) -> Result<Self> {
        let options: Self = toml::from_str(toml_str)?;
        for key in options.extra.keys() {
            tracing::debug!(key = %key, "ignoring unrecognized option");
        }
        Ok(options)
    }

    /// Use the file stem of `path` as the document name
    pub fn with_document_path(mut self, path: &Path) -> Self {
        if let Some(stem) = path.file_stem() {
            self.document_name = stem.to_string_lossy().into_owned();
        }
        self
    }

    pub fn with_document_name(mut self, name: impl Into<String>) -> Self {
        self.document_name = name.into();
        self
    }

    /// Points per em, falling back to the default for non-positive values
    pub fn em_baseline(&self) -> f64 {
        if self.pts_per_em > 0.0 {
            self.pts_per_em
        } else {
            DEFAULT_PTS_PER_EM
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = ConvertOptions::default();
        assert_eq!(options.pts_per_em, 12.0);
        assert_eq!(options.table_width, 324.0);
        assert!(!options.convert_lists);
        assert!(options.extra.is_empty());
    }

    #[test]
    fn test_from_toml_partial() {
        let options = ConvertOptions::from_toml_str(
            r#"
pts_per_em = 10
convert_lists = true
documents = ["a.icml", "b.icml"]
"#,
        )
        .unwrap();
        assert_eq!(options.pts_per_em, 10.0);
        assert!(options.convert_lists);
        assert_eq!(options.documents.len(), 2);
        assert_eq!(options.table_width, DEFAULT_TABLE_WIDTH);
    }

    #[test]
    fn test_unknown_keys_are_kept() {
        let options = ConvertOptions::from_toml_str("mutable = true\n").unwrap();
        assert_eq!(options.extra.get("mutable"), Some(&toml::Value::Boolean(true)));
    }

    #[test]
    fn test_document_name_from_path() {
        let options = ConvertOptions::new().with_document_path(Path::new("book/ch01.icml"));
        assert_eq!(options.document_name, "ch01");
    }

    #[test]
    fn test_em_baseline_guards_zero() {
        let options = ConvertOptions {
            pts_per_em: 0.0,
            ..Default::default()
        };
        assert_eq!(options.em_baseline(), DEFAULT_PTS_PER_EM);
    }
}
