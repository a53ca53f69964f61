//! Element kinds of the canonical document
//!
//! Every node in a [`Document`](crate::Document) carries a [`Tag`]. Names
//! that are not part of the canonical vocabulary survive as [`Tag::Other`]
//! so that markup coming through escape hatches is never lost.

use serde::{Deserialize, Serialize};

/// Kind of a canonical node
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tag {
    Document,
    Body,
    Section,
    /// Paragraph
    P,
    /// Heading level 1-6
    Heading(u8),
    Span,
    Anchor,
    AnchorEnd,
    Hyperlink,
    /// Cross-reference placeholder (page number known only to the layout tool)
    Cref,
    Pageref,
    Textref,
    Footnote,
    FootnoteRef,
    FootnoteStart,
    Endnote,
    EndnoteRef,
    EndnoteStart,
    InsertEndnotes,
    Table,
    Tr,
    Td,
    Img,
    Tab,
    /// Soft line break
    Br,
    PageBreak,
    /// Paragraph-break marker, only present between import and normalization
    PBreak,
    /// Section-start marker, only present between import and normalization
    SectionStart,
    Include,
    TextVariable,
    Modified,
    Timestamp,
    Div,
    /// Index entry
    Xe,
    Index,
    /// Conditional content for print output
    Print,
    /// Conditional content for digital output
    Digital,
    Ul,
    Ol,
    Li,
    Other(String),
}

impl Tag {
    /// Element name used in canonical XML
    pub fn name(&self) -> &str {
        match self {
            Tag::Document => "document",
            Tag::Body => "body",
            Tag::Section => "section",
            Tag::P => "p",
            Tag::Heading(1) => "h1",
            Tag::Heading(2) => "h2",
            Tag::Heading(3) => "h3",
            Tag::Heading(4) => "h4",
            Tag::Heading(5) => "h5",
            Tag::Heading(_) => "h6",
            Tag::Span => "span",
            Tag::Anchor => "anchor",
            Tag::AnchorEnd => "anchor_end",
            Tag::Hyperlink => "hyperlink",
            Tag::Cref => "cref",
            Tag::Pageref => "pageref",
            Tag::Textref => "textref",
            Tag::Footnote => "footnote",
            Tag::FootnoteRef => "footnote_ref",
            Tag::FootnoteStart => "footnote_start",
            Tag::Endnote => "endnote",
            Tag::EndnoteRef => "endnote_ref",
            Tag::EndnoteStart => "endnote_start",
            Tag::InsertEndnotes => "insert_endnotes",
            Tag::Table => "table",
            Tag::Tr => "tr",
            Tag::Td => "td",
            Tag::Img => "img",
            Tag::Tab => "tab",
            Tag::Br => "br",
            Tag::PageBreak => "page_break",
            Tag::PBreak => "p_break",
            Tag::SectionStart => "section_start",
            Tag::Include => "include",
            Tag::TextVariable => "textvariable",
            Tag::Modified => "modified",
            Tag::Timestamp => "timestamp",
            Tag::Div => "div",
            Tag::Xe => "xe",
            Tag::Index => "index",
            Tag::Print => "print",
            Tag::Digital => "digital",
            Tag::Ul => "ul",
            Tag::Ol => "ol",
            Tag::Li => "li",
            Tag::Other(name) => name,
        }
    }

    /// Map an element name onto its tag
    pub fn from_name(name: &str) -> Tag {
        match name {
            "document" => Tag::Document,
            "body" => Tag::Body,
            "section" => Tag::Section,
            "p" => Tag::P,
            "h1" => Tag::Heading(1),
            "h2" => Tag::Heading(2),
            "h3" => Tag::Heading(3),
            "h4" => Tag::Heading(4),
            "h5" => Tag::Heading(5),
            "h6" => Tag::Heading(6),
            "span" => Tag::Span,
            "anchor" => Tag::Anchor,
            "anchor_end" => Tag::AnchorEnd,
            "hyperlink" => Tag::Hyperlink,
            "cref" => Tag::Cref,
            "pageref" => Tag::Pageref,
            "textref" => Tag::Textref,
            "footnote" => Tag::Footnote,
            "footnote_ref" => Tag::FootnoteRef,
            "footnote_start" => Tag::FootnoteStart,
            "endnote" => Tag::Endnote,
            "endnote_ref" => Tag::EndnoteRef,
            "endnote_start" => Tag::EndnoteStart,
            "insert_endnotes" => Tag::InsertEndnotes,
            "table" => Tag::Table,
            "tr" => Tag::Tr,
            "td" => Tag::Td,
            "img" => Tag::Img,
            "tab" => Tag::Tab,
            "br" => Tag::Br,
            "page_break" => Tag::PageBreak,
            "p_break" => Tag::PBreak,
            "section_start" => Tag::SectionStart,
            "include" => Tag::Include,
            "textvariable" => Tag::TextVariable,
            "modified" => Tag::Modified,
            "timestamp" => Tag::Timestamp,
            "div" => Tag::Div,
            "xe" => Tag::Xe,
            "index" => Tag::Index,
            "print" => Tag::Print,
            "digital" => Tag::Digital,
            "ul" => Tag::Ul,
            "ol" => Tag::Ol,
            "li" => Tag::Li,
            other => Tag::Other(other.to_string()),
        }
    }

    /// Paragraph or heading
    pub fn is_paragraph(&self) -> bool {
        matches!(self, Tag::P | Tag::Heading(_))
    }

    /// Block-level content that occupies its own paragraph range on export
    pub fn is_block(&self) -> bool {
        matches!(
            self,
            Tag::P
                | Tag::Heading(_)
                | Tag::Section
                | Tag::Table
                | Tag::PageBreak
                | Tag::Div
                | Tag::Ul
                | Tag::Ol
                | Tag::Li
        )
    }
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_round_trip() {
        for name in ["p", "h3", "anchor_end", "page_break", "textvariable", "li"] {
            assert_eq!(Tag::from_name(name).name(), name);
        }
    }

    #[test]
    fn test_unknown_name_is_kept() {
        let tag = Tag::from_name("aside");
        assert_eq!(tag, Tag::Other("aside".to_string()));
        assert_eq!(tag.to_string(), "aside");
    }

    #[test]
    fn test_block_kinds() {
        assert!(Tag::Table.is_block());
        assert!(Tag::Heading(2).is_paragraph());
        assert!(!Tag::Span.is_block());
        assert!(!Tag::Footnote.is_block());
    }
}
