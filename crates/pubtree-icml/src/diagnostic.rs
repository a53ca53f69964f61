//! Non-fatal conversion diagnostics
//!
//! A whole-book conversion never aborts on a single malformed element.
//! Each recoverable problem is logged through `tracing` and recorded here so
//! callers can report it after the run.

use serde::{Deserialize, Serialize};

/// Severity level of a diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
}

/// What went wrong
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// Style reference with no definition; the no-style sentinel was used
    UnresolvedStyle,
    /// Hyperlink or cross-reference target not found; a placeholder was used
    UnresolvedReference,
    /// Start marker without a matching end; closed at end of siblings
    UnclosedMarker,
    /// Identifier defined twice; the first definition was kept
    DuplicateId,
    /// Row/column counts inconsistent with the cell list
    TableGeometry,
    /// Attribute value outside the known vocabulary
    UnknownValue,
    /// Raw markup that could not be read
    MalformedMarkup,
}

/// A single recorded problem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: DiagnosticKind,
    pub message: String,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let level = match self.severity {
            Severity::Info => "info",
            Severity::Warning => "warning",
        };
        write!(f, "{}: {}", level, self.message)
    }
}

/// Collector for one conversion run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record and log a warning
    pub fn warn(&mut self, kind: DiagnosticKind, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(?kind, "{}", message);
        self.items.push(Diagnostic {
            severity: Severity::Warning,
            kind,
            message,
        });
    }

    /// Record and log an informational note
    pub fn info(&mut self, kind: DiagnosticKind, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!(?kind, "{}", message);
        self.items.push(Diagnostic {
            severity: Severity::Info,
            kind,
            message,
        });
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Whether any diagnostic of the given kind was recorded
    pub fn has(&self, kind: DiagnosticKind) -> bool {
        self.items.iter().any(|d| d.kind == kind)
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.items.extend(other.items);
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collects_in_order() {
        let mut diags = Diagnostics::new();
        diags.warn(DiagnosticKind::DuplicateId, "style defined twice");
        diags.info(DiagnosticKind::UnclosedMarker, "closed at end");
        assert_eq!(diags.len(), 2);
        assert!(diags.has(DiagnosticKind::DuplicateId));
        assert!(!diags.has(DiagnosticKind::TableGeometry));
        let first = diags.iter().next().unwrap();
        assert_eq!(first.to_string(), "warning: style defined twice");
    }

    #[test]
    fn test_serializes_kind_snake_case() {
        let mut diags = Diagnostics::new();
        diags.warn(DiagnosticKind::UnresolvedReference, "missing");
        let json = serde_json::to_string(&diags.into_vec()).unwrap();
        assert!(json.contains("\"unresolved_reference\""));
        assert!(json.contains("\"warning\""));
    }
}
