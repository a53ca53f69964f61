//! pubtree CLI - Command-line interface library
//!
//! This library provides the CLI functionality for pubtree:
//! - Import: Convert ICML or IDML to canonical XML
//! - Export: Convert canonical XML to ICML
//! - Stylesheet: Render the styles of an ICML or IDML file as CSS
//!
//! # Binary Usage
//!
//! ```bash
//! # Import a story, resolving links against its siblings
//! pubtree import ch01.icml -o ch01.xml --source ch02.icml --source ch03.icml
//!
//! # Export back to ICML (leftover endnotes go to ch01_Endnotes.icml)
//! pubtree export ch01.xml -o ch01.icml
//!
//! # Generate CSS from a package's styles
//! pubtree stylesheet book.idml -o book.css
//! ```

pub mod app;

pub use app::{export_command, import_command, stylesheet_command};
pub use app::{run_cli, OutputFormat};
