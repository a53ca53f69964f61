//! Style definitions and inheritance
//!
//! Interchange styles are flat top-level definitions referenced by their
//! `Self` id, each with an optional `BasedOn` parent. [`StyleRegistry`]
//! collects them and resolves a style to its effective property set by
//! walking the parent chain.
//!
//! # Class Names
//!
//! [`classname`] turns a style name into the class used on canonical
//! elements, and [`camelify`] turns a class back into a style name for
//! export:
//!
//! ```
//! use pubtree_icml::styles::{camelify, classname};
//!
//! assert_eq!(classname("ParagraphStyle/BodyText"), "Body-Text");
//! assert_eq!(camelify("Body-Text"), "BodyText");
//! ```

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::diagnostic::{DiagnosticKind, Diagnostics};
use crate::tree::Element;

/// Resolved style properties, keyed by interchange attribute name
pub type PropertyBag = BTreeMap<String, String>;

/// Class used for paragraphs without a paragraph style
pub const NO_PARAGRAPH_STYLE: &str = "No-paragraph-style";
/// Class used for spans without a character style
pub const NO_CHARACTER_STYLE: &str = "No-character-style";
/// Applied-style reference for paragraphs without a style
pub const PARAGRAPH_STYLE_NONE: &str = "ParagraphStyle/$ID/[No paragraph style]";
/// Applied-style reference for ranges without a character style
pub const CHARACTER_STYLE_NONE: &str = "CharacterStyle/$ID/[No character style]";

/// Kind of style definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StyleKind {
    Paragraph,
    Character,
    Cell,
    Table,
    Object,
}

impl StyleKind {
    /// Map an interchange element name to its style kind
    pub fn from_element_name(name: &str) -> Option<Self> {
        match name {
            "ParagraphStyle" => Some(StyleKind::Paragraph),
            "CharacterStyle" => Some(StyleKind::Character),
            "CellStyle" => Some(StyleKind::Cell),
            "TableStyle" => Some(StyleKind::Table),
            "ObjectStyle" => Some(StyleKind::Object),
            _ => None,
        }
    }
}

/// One style definition
#[derive(Debug, Clone, PartialEq)]
pub struct StyleDef {
    /// `Self` id, e.g. `ParagraphStyle/Body`
    pub id: String,
    /// Display name
    pub name: String,
    pub kind: StyleKind,
    /// Parent style id
    pub based_on: Option<String>,
    /// Locally defined properties
    pub properties: PropertyBag,
    /// Definition as read, for re-emission on export
    pub element: Element,
}

impl StyleDef {
    /// Read a style definition element
    pub fn from_element(el: &Element) -> Option<Self> {
        let kind = StyleKind::from_element_name(&el.name)?;
        let id = el.attr("Self")?.to_string();
        let name = el
            .attr("Name")
            .map(str::to_string)
            .unwrap_or_else(|| id.rsplit('/').next().unwrap_or(&id).to_string());

        let mut properties: PropertyBag = el
            .attrs
            .iter()
            .filter(|(k, _)| k != "Self" && k != "Name" && k != "BasedOn")
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let mut based_on = el.attr("BasedOn").map(str::to_string);
        if let Some(props) = el.child("Properties") {
            if let Some(b) = props.child("BasedOn") {
                let text = b.text().trim().to_string();
                if !text.is_empty() {
                    based_on = Some(text);
                }
            }
            if let Some(font) = props.child("AppliedFont") {
                properties.insert("AppliedFont".to_string(), font.text().trim().to_string());
            }
        }
        // "$ID/[No paragraph style]" is the root of every chain, not a parent
        based_on = based_on.filter(|b| !b.contains("$ID/[No"));

        Some(Self {
            id,
            name,
            kind,
            based_on,
            properties,
            element: el.clone(),
        })
    }

    /// Canonical class name for this style
    pub fn classname(&self) -> String {
        classname(&self.name)
    }
}

/// Style definitions of one interchange document
#[derive(Debug, Clone, Default)]
pub struct StyleRegistry {
    styles: HashMap<String, StyleDef>,
    order: Vec<String>,
}

impl StyleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect every style definition under `root`
    pub fn from_root(root: &Element, diags: &mut Diagnostics) -> Self {
        let mut registry = Self::new();
        let mut found = Vec::new();
        root.walk(&mut |el| {
            if let Some(def) = StyleDef::from_element(el) {
                found.push(def);
            }
        });
        for def in found {
            registry.insert(def, diags);
        }
        registry
    }

    /// Add a definition; a duplicate id keeps the first definition
    pub fn insert(&mut self, def: StyleDef, diags: &mut Diagnostics) -> bool {
        if self.styles.contains_key(&def.id) {
            diags.warn(
                DiagnosticKind::DuplicateId,
                format!("duplicate style definition {:?}, keeping the first", def.id),
            );
            return false;
        }
        self.order.push(def.id.clone());
        self.styles.insert(def.id.clone(), def);
        true
    }

    pub fn get(&self, id: &str) -> Option<&StyleDef> {
        self.styles.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.styles.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.styles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }

    /// Definitions in document order
    pub fn iter(&self) -> impl Iterator<Item = &StyleDef> {
        self.order.iter().filter_map(|id| self.styles.get(id))
    }

    /// Definitions of one kind, in document order
    pub fn of_kind(&self, kind: StyleKind) -> impl Iterator<Item = &StyleDef> {
        self.iter().filter(move |d| d.kind == kind)
    }

    /// Effective properties of a style, parents merged first
    ///
    /// A cycle in the `BasedOn` chain stops the walk and keeps whatever was
    /// collected before the repeat.
    pub fn resolve(&self, id: &str, diags: &mut Diagnostics) -> PropertyBag {
        let mut chain: Vec<&StyleDef> = Vec::new();
        let mut visited: HashSet<&str> = HashSet::new();
        let mut current = self.styles.get(id);

        while let Some(def) = current {
            if !visited.insert(def.id.as_str()) {
                diags.warn(
                    DiagnosticKind::UnknownValue,
                    format!("cycle in BasedOn chain at {:?}", def.id),
                );
                break;
            }
            chain.push(def);
            current = def.based_on.as_deref().and_then(|b| self.styles.get(b));
        }

        let mut bag = PropertyBag::new();
        for def in chain.iter().rev() {
            for (k, v) in &def.properties {
                bag.insert(k.clone(), v.clone());
            }
        }
        bag
    }
}

// ============================================================================
// Name conversion
// ============================================================================

/// Convert an interchange style name into a canonical class name
///
/// Strips path prefixes, `$ID/` and bracket markers, keeps the part after
/// the last namespace separator, splits camel-case runs, and joins words
/// with single hyphens. A leading digit gets a `_` prefix.
pub fn classname(style_name: &str) -> String {
    let name = style_name
        .replace("%3a", ":")
        .replace("%3A", ":")
        .replace("%20", " ")
        .replace(": ", ":")
        .replace("$ID/", "");
    let name = name.rsplit('/').next().unwrap_or(&name);
    let name = name.replace(['[', ']'], "");
    let last = name.rsplit(':').next().unwrap_or(&name);
    let split = camelsplit(last);

    let mut out = String::new();
    let mut pending_dash = false;
    for c in split.trim().chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(c);
        } else {
            pending_dash = true;
        }
    }

    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

/// Insert spaces at camel-case boundaries (`HTMLBodyText` -> `HTML Body Text`)
pub fn camelsplit(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if i > 0 && c.is_uppercase() {
            let prev = chars[i - 1];
            let next_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_lower)
            {
                out.push(' ');
            }
        }
        out.push(c);
    }
    out
}

/// Convert a canonical class name into an interchange style name
pub fn camelify(class: &str) -> String {
    class
        .trim_matches('_')
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

/// Whether a class is one of the no-style sentinels
pub fn is_sentinel_class(class: &str) -> bool {
    class.is_empty()
        || class == NO_PARAGRAPH_STYLE
        || class == NO_CHARACTER_STYLE
        || class == "Default-Paragraph-Font"
}
