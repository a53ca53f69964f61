//! Endnote markers
//!
//! Markers are a pure function of the endnote's ordinal position within its
//! scope, the section's start offset and its format.

use pubtree_ast::{Document, NodeId, Tag};

const LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const CHICAGO: [char; 4] = ['*', '\u{2020}', '\u{2021}', '\u{00a7}'];

/// Marker format, from a section's `endnote_fmt` attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EndnoteFormat {
    Decimal,
    #[default]
    LowerLetter,
    UpperLetter,
    LowerRoman,
    UpperRoman,
    /// `*`, `†`, `‡`, `§`, then doubled, tripled, ...
    Chicago,
}

impl EndnoteFormat {
    /// Parse an `endnote_fmt` value; unknown values use the default
    pub fn from_attr(value: Option<&str>) -> Self {
        match value {
            Some("decimal") => Self::Decimal,
            Some("lowerLetter") => Self::LowerLetter,
            Some("upperLetter") => Self::UpperLetter,
            Some("lowerRoman") => Self::LowerRoman,
            Some("upperRoman") => Self::UpperRoman,
            Some("chicago") => Self::Chicago,
            _ => Self::default(),
        }
    }
}

/// Numbering scope, from a section's `endnote_renum` attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EndnoteScope {
    #[default]
    Document,
    Section,
}

impl EndnoteScope {
    pub fn from_attr(value: Option<&str>) -> Self {
        match value {
            Some("eachSect") => Self::Section,
            _ => Self::Document,
        }
    }
}

/// Marker for the `index`-th endnote (0-based, offset already applied)
pub fn endnote_marker(index: usize, format: EndnoteFormat) -> String {
    match format {
        EndnoteFormat::Decimal => (index + 1).to_string(),
        EndnoteFormat::LowerLetter | EndnoteFormat::UpperLetter => {
            let letter = LETTERS[index % LETTERS.len()] as char;
            let marker = letter.to_string().repeat(index / LETTERS.len() + 1);
            if format == EndnoteFormat::UpperLetter {
                marker.to_uppercase()
            } else {
                marker
            }
        }
        EndnoteFormat::LowerRoman => to_roman(index + 1).to_lowercase(),
        EndnoteFormat::UpperRoman => to_roman(index + 1),
        EndnoteFormat::Chicago => CHICAGO[index % CHICAGO.len()]
            .to_string()
            .repeat(index / CHICAGO.len() + 1),
    }
}

/// Upper-case roman numeral
pub fn to_roman(mut n: usize) -> String {
    const TABLE: [(usize, &str); 13] = [
        (1000, "M"),
        (900, "CM"),
        (500, "D"),
        (400, "CD"),
        (100, "C"),
        (90, "XC"),
        (50, "L"),
        (40, "XL"),
        (10, "X"),
        (9, "IX"),
        (5, "V"),
        (4, "IV"),
        (1, "I"),
    ];
    let mut out = String::new();
    for (value, numeral) in TABLE {
        while n >= value {
            out.push_str(numeral);
            n -= value;
        }
    }
    out
}

/// Marker for an `endnote` node, from its enclosing section's settings
///
/// Without an enclosing section the document defaults apply.
pub fn marker_for(doc: &Document, endnote: NodeId) -> String {
    let section = doc.find_ancestor(endnote, |n| n.tag == Tag::Section);
    let attr = |name: &str| section.and_then(|s| doc.attr(s, name));

    let format = EndnoteFormat::from_attr(attr("endnote_fmt"));
    let base = attr("endnote_start")
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(1)
        .saturating_sub(1);

    let scope_root = match (EndnoteScope::from_attr(attr("endnote_renum")), section) {
        (EndnoteScope::Section, Some(s)) => s,
        _ => doc.root(),
    };
    let index = doc
        .descendants(scope_root)
        .into_iter()
        .filter(|&n| doc.tag(n) == &Tag::Endnote)
        .position(|n| n == endnote)
        .unwrap_or(0);
    endnote_marker(index + base, format)
}
