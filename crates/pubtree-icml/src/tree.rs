//! Interchange tree (ICML / IDML story XML)
//!
//! An owned mixed-content tree: elements, text, and processing
//! instructions. ICML uses processing instructions inside `Content` as
//! control characters (`<?ACE 4?>` for a footnote reference, for example),
//! so they are kept as first-class children.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{IcmlError, Result};

/// A child of an interchange element
#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    Element(Element),
    Text(String),
    /// Processing instruction body, e.g. `ACE 4`
    Instruction(String),
}

/// An interchange element
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Element {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Content>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Builder-style attribute setter
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    /// Builder-style child append
    pub fn with_child(mut self, child: impl Into<Content>) -> Self {
        self.children.push(child.into());
        self
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Set an attribute, replacing any existing value
    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attrs.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.attrs.push((name, value)),
        }
    }

    pub fn push(&mut self, child: impl Into<Content>) {
        self.children.push(child.into());
    }

    /// Child elements, skipping text and instructions
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|c| match c {
            Content::Element(e) => Some(e),
            _ => None,
        })
    }

    /// First child element with the given name
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.elements().find(|e| e.name == name)
    }

    /// Follow a `/`-separated path of child element names
    pub fn find_path(&self, path: &str) -> Option<&Element> {
        path.split('/')
            .try_fold(self, |el, step| el.child(step))
    }

    /// First descendant (preorder, excluding self) matching a predicate
    pub fn find_descendant(&self, pred: &dyn Fn(&Element) -> bool) -> Option<&Element> {
        for child in self.elements() {
            if pred(child) {
                return Some(child);
            }
            if let Some(found) = child.find_descendant(pred) {
                return Some(found);
            }
        }
        None
    }

    /// Visit every descendant element in preorder
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a Element)) {
        for child in self.elements() {
            visit(child);
            child.walk(visit);
        }
    }

    /// Visit every descendant element mutably in preorder
    pub fn walk_mut(&mut self, visit: &mut dyn FnMut(&mut Element)) {
        for child in &mut self.children {
            if let Content::Element(e) = child {
                visit(e);
                e.walk_mut(visit);
            }
        }
    }

    /// Concatenated text of all descendant text nodes
    pub fn text(&self) -> String {
        let mut out = String::new();
        for child in &self.children {
            match child {
                Content::Text(t) => out.push_str(t),
                Content::Element(e) => out.push_str(&e.text()),
                Content::Instruction(_) => {}
            }
        }
        out
    }

    /// Serialize this element and its subtree
    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        self.write(&mut out);
        out
    }

    fn write(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        for (k, v) in &self.attrs {
            out.push(' ');
            out.push_str(k);
            out.push_str("=\"");
            out.push_str(&escape_xml(v));
            out.push('"');
        }
        if self.children.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        for child in &self.children {
            match child {
                Content::Element(e) => e.write(out),
                Content::Text(t) => out.push_str(&escape_xml(t)),
                Content::Instruction(pi) => {
                    out.push_str("<?");
                    out.push_str(pi);
                    out.push_str("?>");
                }
            }
        }
        out.push_str("</");
        out.push_str(&self.name);
        out.push('>');
    }
}

impl From<Element> for Content {
    fn from(e: Element) -> Self {
        Content::Element(e)
    }
}

impl From<&str> for Content {
    fn from(t: &str) -> Self {
        Content::Text(t.to_string())
    }
}

impl From<String> for Content {
    fn from(t: String) -> Self {
        Content::Text(t)
    }
}

/// Processing instructions written ahead of every ICML root
pub const ICML_PROLOG: [&str; 2] = [
    r#"aid style="50" type="snippet" readerVersion="6.0" featureSet="257" product="9.2(103)" "#,
    r#"aid SnippetType="InCopyInterchange""#,
];

/// A parsed interchange document
#[derive(Debug, Clone, PartialEq)]
pub struct IcmlDocument {
    /// Processing instructions before the root element
    pub prolog: Vec<String>,
    pub root: Element,
}

impl IcmlDocument {
    /// Wrap a root element with the standard ICML prolog
    pub fn new(root: Element) -> Self {
        Self {
            prolog: ICML_PROLOG.iter().map(|s| s.to_string()).collect(),
            root,
        }
    }

    /// Parse interchange XML
    pub fn parse(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(false);

        let mut prolog = Vec::new();
        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            match reader.read_event()? {
                Event::Start(ref e) => stack.push(element_from(e)?),
                Event::Empty(ref e) => {
                    let el = element_from(e)?;
                    attach(&mut stack, &mut root, el)?;
                }
                Event::End(_) => {
                    let el = stack.pop().ok_or_else(|| {
                        IcmlError::InvalidStructure("unexpected end tag".to_string())
                    })?;
                    attach(&mut stack, &mut root, el)?;
                }
                Event::Text(ref t) => {
                    if let Some(parent) = stack.last_mut() {
                        let text = t.unescape()?.into_owned();
                        match parent.children.last_mut() {
                            Some(Content::Text(prev)) => prev.push_str(&text),
                            _ => parent.children.push(Content::Text(text)),
                        }
                    }
                }
                Event::CData(ref t) => {
                    if let Some(parent) = stack.last_mut() {
                        let text = String::from_utf8_lossy(t).into_owned();
                        parent.children.push(Content::Text(text));
                    }
                }
                Event::PI(ref pi) => {
                    let body = String::from_utf8_lossy(pi).trim().to_string();
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(Content::Instruction(body)),
                        None if root.is_none() => prolog.push(body),
                        None => {}
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if let Some(open) = stack.last() {
            return Err(IcmlError::InvalidStructure(format!(
                "unclosed element <{}>",
                open.name
            )));
        }
        let root =
            root.ok_or_else(|| IcmlError::InvalidStructure("no root element".to_string()))?;
        Ok(Self { prolog, root })
    }

    /// Serialize with XML declaration and prolog
    pub fn to_xml(&self) -> String {
        let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n");
        for pi in &self.prolog {
            out.push_str("<?");
            out.push_str(pi);
            out.push_str("?>\n");
        }
        out.push_str(&self.root.to_xml());
        out.push('\n');
        out
    }
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, el: Element) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(Content::Element(el)),
        None if root.is_none() => *root = Some(el),
        None => {
            return Err(IcmlError::InvalidStructure(
                "more than one root element".to_string(),
            ))
        }
    }
    Ok(())
}

fn element_from(e: &BytesStart) -> Result<Element> {
    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let mut el = Element::new(name);
    for attr in e.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        el.attrs.push((key, value));
    }
    Ok(el)
}

/// Escape text for use in XML content or attribute values
pub fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<?aid style="50" type="snippet" readerVersion="6.0" featureSet="257" product="9.2(103)" ?>
<?aid SnippetType="InCopyInterchange"?>
<Document DOMVersion="8.0" Self="d">
  <Story Self="u1">
    <ParagraphStyleRange AppliedParagraphStyle="ParagraphStyle/Body">
      <CharacterStyleRange AppliedCharacterStyle="CharacterStyle/$ID/[No character style]">
        <Content>Note<?ACE 4?> here &amp; there</Content>
      </CharacterStyleRange>
    </ParagraphStyleRange>
  </Story>
</Document>"#;

    #[test]
    fn test_parse_prolog_and_instructions() {
        let doc = IcmlDocument::parse(SAMPLE).unwrap();
        assert_eq!(doc.prolog.len(), 2);
        assert!(doc.prolog[1].contains("InCopyInterchange"));
        let content = doc.root.find_path("Story/ParagraphStyleRange/CharacterStyleRange/Content").unwrap();
        assert_eq!(content.children.len(), 3);
        assert_eq!(content.children[1], Content::Instruction("ACE 4".to_string()));
        assert_eq!(content.text(), "Note here & there");
    }

    #[test]
    fn test_serialize_round_trip() {
        let doc = IcmlDocument::parse(SAMPLE).unwrap();
        let again = IcmlDocument::parse(&doc.to_xml()).unwrap();
        assert_eq!(doc, again);
    }

    #[test]
    fn test_set_attr_replaces() {
        let mut el = Element::new("Cell").with_attr("Name", "0:0");
        el.set_attr("Name", "1:0");
        assert_eq!(el.attrs.len(), 1);
        assert_eq!(el.attr("Name"), Some("1:0"));
    }

    #[test]
    fn test_find_descendant() {
        let doc = IcmlDocument::parse(SAMPLE).unwrap();
        let found = doc
            .root
            .find_descendant(&|e| e.name == "Content")
            .map(|e| e.text());
        assert_eq!(found.as_deref(), Some("Note here & there"));
    }

    #[test]
    fn test_unclosed_is_error() {
        assert!(IcmlDocument::parse("<Document><Story>").is_err());
    }
}
