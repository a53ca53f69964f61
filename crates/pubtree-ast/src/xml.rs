//! Canonical XML reading and writing
//!
//! The canonical serialization is deterministic: attributes are written in
//! name order and text slots are written back exactly as stored.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::document::{Document, NodeId};
use crate::error::{AstError, Result};
use crate::tag::Tag;

impl Document {
    /// Parse canonical XML into a new document
    pub fn parse(xml: &str) -> Result<Self> {
        let mut doc = Document::with_root(Tag::Document);
        let root = doc.root();
        let mut parsed_root = false;
        let top = doc.read_into(xml, |doc, tag, attrs| {
            if parsed_root {
                doc.create_with(tag, attrs)
            } else {
                parsed_root = true;
                doc.node_mut(root).tag = tag;
                doc.node_mut(root).attrs = attrs.into_iter().collect();
                root
            }
        })?;
        if top.len() != 1 {
            return Err(AstError::InvalidStructure(format!(
                "expected one root element, found {}",
                top.len()
            )));
        }
        Ok(doc)
    }

    /// Parse a markup fragment into detached nodes of this document
    ///
    /// Returns the top-level nodes in order; text outside any element is
    /// discarded.
    pub fn parse_fragment(&mut self, xml: &str) -> Result<Vec<NodeId>> {
        self.read_into(xml, |doc, tag, attrs| doc.create_with(tag, attrs))
    }

    fn read_into(
        &mut self,
        xml: &str,
        mut make: impl FnMut(&mut Document, Tag, Vec<(String, String)>) -> NodeId,
    ) -> Result<Vec<NodeId>> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(false);

        let mut stack: Vec<NodeId> = Vec::new();
        let mut top: Vec<NodeId> = Vec::new();

        loop {
            match reader.read_event()? {
                Event::Start(ref e) => {
                    let (tag, attrs) = element_parts(e)?;
                    let id = make(self, tag, attrs);
                    match stack.last() {
                        Some(&parent) => self.append(parent, id),
                        None => top.push(id),
                    }
                    stack.push(id);
                }
                Event::Empty(ref e) => {
                    let (tag, attrs) = element_parts(e)?;
                    let id = make(self, tag, attrs);
                    match stack.last() {
                        Some(&parent) => self.append(parent, id),
                        None => top.push(id),
                    }
                }
                Event::End(_) => {
                    stack.pop();
                }
                Event::Text(ref t) => {
                    if let Some(&parent) = stack.last() {
                        let text = t.unescape()?;
                        self.append_text(parent, &text);
                    }
                }
                Event::CData(ref t) => {
                    if let Some(&parent) = stack.last() {
                        let text = String::from_utf8_lossy(t).into_owned();
                        self.append_text(parent, &text);
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !stack.is_empty() {
            return Err(AstError::InvalidStructure(format!(
                "unclosed element <{}>",
                self.tag(stack[stack.len() - 1])
            )));
        }
        Ok(top)
    }

    /// Serialize the whole document with an XML declaration
    pub fn to_xml(&self) -> String {
        let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        self.write_node(self.root(), &mut out);
        out.push('\n');
        out
    }

    /// Serialize one node and its subtree, without its tail
    pub fn node_to_xml(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_node(id, &mut out);
        out
    }

    fn write_node(&self, id: NodeId, out: &mut String) {
        let node = self.node(id);
        let name = node.tag.name();
        out.push('<');
        out.push_str(name);
        for (k, v) in &node.attrs {
            out.push(' ');
            out.push_str(k);
            out.push_str("=\"");
            out.push_str(&escape_xml(v));
            out.push('"');
        }
        if node.text.is_empty() && node.children().is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        out.push_str(&escape_xml(&node.text));
        for &child in node.children() {
            self.write_node(child, out);
            out.push_str(&escape_xml(&self.node(child).tail));
        }
        out.push_str("</");
        out.push_str(name);
        out.push('>');
    }
}

fn element_parts(e: &BytesStart) -> Result<(Tag, Vec<(String, String)>)> {
    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let mut attrs = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        if key == "xmlns" || key.starts_with("xmlns:") {
            continue;
        }
        let value = attr.unescape_value()?.into_owned();
        attrs.push((key, value));
    }
    Ok((Tag::from_name(local_name(&name)), attrs))
}

/// Strip a namespace prefix (`pub:anchor` -> `anchor`)
fn local_name(name: &str) -> &str {
    name.rsplit(':').next().unwrap_or(name)
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

    #[test]
    fn test_parse_text_and_tail() {
        let doc = Document::parse(
            "<document><body><section id=\"s1\"><p class=\"Body\">one <span>two</span> three</p></section></body></document>",
        )
        .unwrap();
        let p = doc.select(|n| n.tag == Tag::P)[0];
        assert_eq!(doc.attr(p, "class"), Some("Body"));
        assert_eq!(doc.node(p).text, "one ");
        let span = doc.children(p)[0];
        assert_eq!(doc.node(span).tail, " three");
    }

    #[test]
    fn test_serialize_is_stable() {
        let src = "<document><body><p b=\"2\" a=\"1\">x &amp; y<br/>z</p></body></document>";
        let doc = Document::parse(src).unwrap();
        let first = doc.to_xml();
        let again = Document::parse(&first).unwrap().to_xml();
        assert_eq!(first, again);
        assert!(first.contains("<p a=\"1\" b=\"2\">x &amp; y<br/>z</p>"));
    }

    #[test]
    fn test_namespace_prefix_is_dropped() {
        let doc = Document::parse(
            "<pub:document xmlns:pub=\"http://publishingxml.org/ns\"><body><pub:anchor id=\"a\"/></body></pub:document>",
        )
        .unwrap();
        assert_eq!(doc.tag(doc.root()), &Tag::Document);
        assert_eq!(doc.select(|n| n.tag == Tag::Anchor).len(), 1);
    }

    #[test]
    fn test_unclosed_is_error() {
        assert!(Document::parse("<document><body>").is_err());
    }

    #[test]
    fn test_parse_fragment() {
        let mut doc = Document::new();
        let nodes = doc
            .parse_fragment("<img src=\"a.png\"/><include idref=\"u12\"/>")
            .unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(doc.attr(nodes[0], "src"), Some("a.png"));
        assert!(!doc.is_attached(nodes[1]));
    }
}
