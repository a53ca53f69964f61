//! Canonical document to interchange tree
//!
//! Top-level sections become stories; paragraphs become paragraph ranges
//! terminated by a forced break; inline content becomes character ranges.
//! Hyperlinks, bookmarks and endnotes are collected in the
//! [`ResolutionContext`] during descent and emitted once the stories are
//! complete. Endnotes that no `insert_endnotes` marker claims are returned
//! as a separate document.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use pubtree_ast::{Document, Node, NodeId, Tag};

use crate::config::ConvertOptions;
use crate::context::ResolutionContext;
use crate::css::{applied_language, range_attributes};
use crate::diagnostic::{DiagnosticKind, Diagnostics};
use crate::numbering::marker_for;
use crate::resolve::{identifier, percent_encode};
use crate::rules::RuleSet;
use crate::styles::{
    camelify, is_sentinel_class, StyleKind, StyleRegistry, CHARACTER_STYLE_NONE, PARAGRAPH_STYLE_NONE,
};
use crate::tree::{Content, Element, IcmlDocument};

/// Placeholder text for cross-references the layout tool fills in
pub const UPDATE_CROSS_REFERENCE: &str = "**UPDATE CROSS-REFERENCE**";

const PAGE_NUMBER_FORMAT: &str = "CrossReferenceFormat/PageNumber";
const PARAGRAPH_NUMBER_FORMAT: &str = "CrossReferenceFormat/ParagraphNumber";
const PARAGRAPH_TEXT_FORMAT: &str = "CrossReferenceFormat/ParagraphText";
const TIMESTAMP_VARIABLE: &str = "TextVariable/Timestamp";
const TIMESTAMP_FORMAT: &str = "yyyy-MM-dd hh:mm a";

/// Result of one export
#[derive(Debug, Clone, PartialEq)]
pub struct ExportOutput {
    pub document: IcmlDocument,
    /// Endnotes not placed by an `insert_endnotes` marker
    pub endnotes: Option<IcmlDocument>,
}

/// Character formatting in effect at the current point
#[derive(Debug, Clone, Default, PartialEq)]
struct CharState {
    style: Option<String>,
    attrs: Vec<(String, String)>,
    /// Emit content without a character range wrapper (inside link sources)
    bare: bool,
}

impl CharState {
    fn range(&self) -> Element {
        let mut el = Element::new("CharacterStyleRange").with_attr(
            "AppliedCharacterStyle",
            self.style.as_deref().unwrap_or(CHARACTER_STYLE_NONE),
        );
        for (k, v) in &self.attrs {
            el.set_attr(k.clone(), v.clone());
        }
        el
    }

    fn set(&mut self, name: &str, value: String) {
        match self.attrs.iter_mut().find(|(k, _)| k == name) {
            Some(slot) => slot.1 = value,
            None => self.attrs.push((name.to_string(), value)),
        }
    }
}

type ExportRules<'a> = RuleSet<Exporter<'a>, NodeId, Vec<Content>>;

/// One export traversal
pub struct Exporter<'a> {
    doc: &'a Document,
    ctx: ResolutionContext<'a>,
    options: &'a ConvertOptions,
    styles: &'a StyleRegistry,
    rules: ExportRules<'a>,
    chars: CharState,
    block: bool,
    story: String,
    list_type: Option<&'static str>,
    /// Inline elements placed at the start of the next paragraph
    pending: Vec<Element>,
    drain_endnotes: bool,
    endnote: Option<String>,
    endnote_destination: bool,
    endnote_count: usize,
    last_outline: Option<NodeId>,
    paragraph_styles: BTreeSet<String>,
    character_styles: BTreeSet<String>,
    url_destinations: BTreeMap<String, Element>,
}

impl<'a> Exporter<'a> {
    pub fn new(
        doc: &'a Document,
        styles: &'a StyleRegistry,
        options: &'a ConvertOptions,
        ctx: ResolutionContext<'a>,
    ) -> Self {
        Self {
            doc,
            ctx,
            options,
            styles,
            rules: export_rules(),
            chars: CharState::default(),
            block: true,
            story: String::new(),
            list_type: None,
            pending: Vec::new(),
            drain_endnotes: false,
            endnote: None,
            endnote_destination: false,
            endnote_count: 0,
            last_outline: None,
            paragraph_styles: BTreeSet::new(),
            character_styles: BTreeSet::new(),
            url_destinations: BTreeMap::new(),
        }
    }

    /// Export the whole document
    pub fn export(mut self) -> (ExportOutput, Diagnostics) {
        let doc = self.doc;
        let mut stories = Vec::new();
        if let Some(body) = doc.body() {
            let mut loose = Vec::new();
            for &child in doc.children(body) {
                if doc.tag(child) == &Tag::Section {
                    if !loose.is_empty() {
                        stories.push(self.story(None, &std::mem::take(&mut loose)));
                    }
                    stories.push(self.story(Some(child), &[]));
                } else {
                    loose.push(child);
                }
            }
            if !loose.is_empty() {
                stories.push(self.story(None, &loose));
            }
        }

        let endnotes = self.ctx.take_endnotes();
        let endnotes = if endnotes.is_empty() {
            None
        } else {
            tracing::debug!(count = endnotes.len(), "endnotes left for a separate document");
            let story = Element::new("Story")
                .with_attr("Self", self.ctx.next_id("u"))
                .with_attr("StoryTitle", format!("{} Endnotes", self.ctx.document_name));
            let mut root = self.document_element();
            root.children.push(Content::Element(Element {
                children: endnotes,
                ..story
            }));
            Some(IcmlDocument::new(root))
        };

        let mut root = self.document_element();
        root.children.extend(stories.into_iter().map(Content::Element));
        root.children
            .extend(std::mem::take(&mut self.url_destinations).into_values().map(Content::Element));
        root.children
            .extend(std::mem::take(&mut self.ctx.hyperlinks).into_iter().map(Content::Element));
        root.children
            .extend(std::mem::take(&mut self.ctx.bookmarks).into_iter().map(Content::Element));

        let output = ExportOutput {
            document: IcmlDocument::new(root),
            endnotes,
        };
        (output, self.ctx.diagnostics)
    }

    fn dispatch(&mut self, id: NodeId, out: &mut Vec<Content>) {
        let (rule, handler) = self.rules.select(self, &id);
        tracing::trace!(rule, tag = %self.doc.tag(id), "export");
        handler(self, &id, out);
    }

    fn story(&mut self, section: Option<NodeId>, blocks: &[NodeId]) -> Element {
        let doc = self.doc;
        let id = section
            .and_then(|s| doc.attr(s, "id"))
            .map(str::to_string)
            .unwrap_or_else(|| self.ctx.next_id("u"));
        let title = section.and_then(|s| doc.attr(s, "title")).unwrap_or("$ID/");
        self.story = id.clone();

        let mut story = Element::new("Story")
            .with_attr("Self", id)
            .with_attr("AppliedTOCStyle", "n")
            .with_attr("TrackChanges", "false")
            .with_attr("StoryTitle", title)
            .with_attr("AppliedNamedGrid", "n");

        let mut out = Vec::new();
        match section {
            Some(section) => self.block_children(section, &mut out),
            None => {
                let saved = std::mem::replace(&mut self.block, true);
                for &block in blocks {
                    self.block_node(block, &mut out);
                }
                self.block = saved;
            }
        }
        if !self.pending.is_empty() {
            let psr = self.paragraph_range(PARAGRAPH_STYLE_NONE.to_string(), Vec::new(), |_, _| {});
            out.push(psr.into());
        }
        story.children = out;
        story
    }

    // ========================================================================
    // Block and inline traversal
    // ========================================================================

    /// Children in block position; loose inline content gets its own
    /// paragraph
    fn block_children(&mut self, id: NodeId, out: &mut Vec<Content>) {
        let doc = self.doc;
        let has_blocks = doc.children(id).iter().any(|&c| doc.tag(c).is_block());
        if !has_blocks {
            if !doc.is_empty(id, true) {
                let psr = self.paragraph_range(PARAGRAPH_STYLE_NONE.to_string(), Vec::new(), |exp, runs| {
                    exp.inline_children(id, runs)
                });
                out.push(psr.into());
            }
            return;
        }

        let saved = std::mem::replace(&mut self.block, true);
        self.stray_text(&doc.node(id).text, out);
        for &child in doc.children(id) {
            self.block_node(child, out);
            self.stray_text(&doc.node(child).tail, out);
        }
        self.block = saved;
    }

    fn block_node(&mut self, id: NodeId, out: &mut Vec<Content>) {
        if self.doc.tag(id).is_block() {
            self.dispatch(id, out);
        } else {
            let psr = self.paragraph_range(PARAGRAPH_STYLE_NONE.to_string(), Vec::new(), |exp, runs| {
                exp.dispatch(id, runs)
            });
            out.push(psr.into());
        }
    }

    fn stray_text(&mut self, text: &str, out: &mut Vec<Content>) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        let psr = self.paragraph_range(PARAGRAPH_STYLE_NONE.to_string(), Vec::new(), |exp, runs| {
            exp.text_run(text, runs)
        });
        out.push(psr.into());
    }

    /// Text and children of `id` as character ranges
    fn inline_children(&mut self, id: NodeId, runs: &mut Vec<Content>) {
        let doc = self.doc;
        let saved = std::mem::replace(&mut self.block, false);
        self.text_run(&doc.node(id).text, runs);
        for &child in doc.children(id) {
            self.dispatch(child, runs);
            self.text_run(&doc.node(child).tail, runs);
        }
        self.block = saved;
    }

    /// A paragraph range with fresh character state, ended by a forced break
    fn paragraph_range(
        &mut self,
        style: String,
        extra: Vec<(&'static str, String)>,
        build: impl FnOnce(&mut Self, &mut Vec<Content>),
    ) -> Element {
        let saved_block = std::mem::replace(&mut self.block, false);
        let saved_chars = std::mem::take(&mut self.chars);

        let mut runs = Vec::new();
        for el in std::mem::take(&mut self.pending) {
            self.leaf(el, &mut runs);
        }
        build(self, &mut runs);
        self.leaf(Element::new("Br"), &mut runs);

        self.chars = saved_chars;
        self.block = saved_block;

        let mut psr = Element::new("ParagraphStyleRange").with_attr("AppliedParagraphStyle", style.clone());
        for (k, v) in extra {
            psr.set_attr(k, v);
        }
        psr.children = merge_ranges(runs);
        if style != PARAGRAPH_STYLE_NONE {
            self.paragraph_styles.insert(style);
        }
        psr
    }

    fn text_run(&mut self, text: &str, runs: &mut Vec<Content>) {
        if !text.is_empty() {
            self.leaf(Element::new("Content").with_child(text), runs);
        }
    }

    /// Emit an inline element inside the current character range
    fn leaf(&mut self, el: Element, runs: &mut Vec<Content>) {
        if self.chars.bare {
            runs.push(el.into());
        } else {
            runs.push(self.chars.range().with_child(el).into());
        }
    }

    // ========================================================================
    // Names and destinations
    // ========================================================================

    fn style_id(&self, kind: StyleKind, prefix: &str, class: &str) -> String {
        self.styles
            .of_kind(kind)
            .find(|s| s.classname() == class)
            .map(|s| s.id.clone())
            .unwrap_or_else(|| format!("{}{}", prefix, camelify(class)))
    }

    fn paragraph_style(&self, node: &Node) -> String {
        match node.attr("class").filter(|c| !is_sentinel_class(c)) {
            Some(class) => self.style_id(StyleKind::Paragraph, "ParagraphStyle/", class),
            None => match node.tag {
                Tag::Heading(n) => format!("ParagraphStyle/Heading{}", n),
                _ => PARAGRAPH_STYLE_NONE.to_string(),
            },
        }
    }

    fn bookmark(&mut self, title: &str, destination: &str) {
        let bookmark = Element::new("Bookmark")
            .with_attr("Self", self.ctx.next_id("b"))
            .with_attr("Name", title)
            .with_attr("Destination", destination)
            .with_attr("Indent", "0")
            .with_attr("UserCreated", "true");
        self.ctx.bookmarks.push(bookmark);
    }

    /// Destination reference (and unique key) for a link target
    fn link_destination(&mut self, node: &Node) -> Option<(String, Option<String>)> {
        let href = match (node.attr("href"), node.attr("anchor")) {
            (Some(href), _) => href.to_string(),
            (None, Some(anchor)) => format!("{}#{}", node.attr("filename").unwrap_or_default(), anchor),
            (None, None) => return None,
        };

        if href.contains("://") || href.starts_with("mailto:") {
            return Some((self.url_destination(&href), None));
        }
        let (file, anchor) = href.split_once('#').unwrap_or((href.as_str(), ""));
        let stem = file.rsplit_once('.').map(|(s, _)| s).unwrap_or(file);
        if file.is_empty() || stem == self.ctx.document_name {
            return Some((format!("HyperlinkTextDestination/{}", anchor), None));
        }
        if file.ends_with(".indd") {
            let found = self
                .ctx
                .find_auxiliary(&|e| e.name == "HyperlinkTextDestination" && e.attr("Name") == Some(anchor))
                .map(|f| {
                    (
                        f.element.attr("Self").unwrap_or_default().to_string(),
                        f.element.attr("DestinationUniqueKey").map(str::to_string),
                    )
                });
            return match found {
                Some(found) => Some(found),
                None => {
                    self.ctx.diagnostics.warn(
                        DiagnosticKind::UnresolvedReference,
                        format!("no destination {:?} in the supplied sources", href),
                    );
                    Some((format!("HyperlinkTextDestination/{}", anchor), None))
                }
            };
        }
        Some((self.url_destination(&href), None))
    }

    fn url_destination(&mut self, url: &str) -> String {
        let self_ref = format!("HyperlinkURLDestination/{}", percent_encode(url));
        self.url_destinations.entry(self_ref.clone()).or_insert_with(|| {
            Element::new("HyperlinkURLDestination")
                .with_attr("Self", self_ref.clone())
                .with_attr("Name", url)
                .with_attr("DestinationURL", url)
                .with_attr("Hidden", "false")
        });
        self_ref
    }

    /// Queue a `Hyperlink` tying `source` to the node's target
    fn queue_hyperlink(&mut self, source: &str, node: &Node, name: &str) -> bool {
        let Some((destination, key)) = self.link_destination(node) else {
            return false;
        };
        let mut hyperlink = Element::new("Hyperlink")
            .with_attr("Self", self.ctx.next_id("h"))
            .with_attr("Name", name)
            .with_attr("Source", source)
            .with_attr("Visible", "false");
        if let Some(key) = key {
            hyperlink.set_attr("DestinationUniqueKey", key);
        }
        hyperlink.push(
            Element::new("Properties")
                .with_child(Element::new("Destination").with_attr("type", "object").with_child(destination)),
        );
        self.ctx.hyperlinks.push(hyperlink);
        true
    }

    // ========================================================================
    // Document header
    // ========================================================================

    fn style_definition(&self, element: &str, id: &str) -> Element {
        match self.styles.get(id) {
            Some(def) => def.element.clone(),
            None => Element::new(element)
                .with_attr("Self", id)
                .with_attr("Name", id.split_once('/').map(|(_, n)| n).unwrap_or(id)),
        }
    }

    fn document_element(&self) -> Element {
        let mut root = Element::new("Document").with_attr("DOMVersion", "8.0").with_attr("Self", "d");

        let mut characters = Element::new("RootCharacterStyleGroup").with_attr("Self", "pubtree_character_styles");
        characters.push(
            Element::new("CharacterStyle")
                .with_attr("Self", CHARACTER_STYLE_NONE)
                .with_attr("Name", "$ID/[No character style]"),
        );
        for id in &self.character_styles {
            characters.push(self.style_definition("CharacterStyle", id));
        }
        root.push(characters);

        let mut paragraphs = Element::new("RootParagraphStyleGroup").with_attr("Self", "pubtree_paragraph_styles");
        paragraphs.push(
            Element::new("ParagraphStyle")
                .with_attr("Self", PARAGRAPH_STYLE_NONE)
                .with_attr("Name", "$ID/[No paragraph style]"),
        );
        for id in &self.paragraph_styles {
            paragraphs.push(self.style_definition("ParagraphStyle", id));
        }
        root.push(paragraphs);

        for (format, name, block) in [
            (PAGE_NUMBER_FORMAT, "Page Number", "PageNumberBuildingBlock"),
            (PARAGRAPH_NUMBER_FORMAT, "Paragraph Number", "ParagraphNumberBuildingBlock"),
            (PARAGRAPH_TEXT_FORMAT, "Paragraph Text", "ParagraphTextBuildingBlock"),
        ] {
            root.push(
                Element::new("CrossReferenceFormat")
                    .with_attr("Self", format)
                    .with_attr("Name", name)
                    .with_attr("AppliedCharacterStyle", CHARACTER_STYLE_NONE)
                    .with_child(
                        Element::new("BuildingBlock")
                            .with_attr("Self", format!("{}Block", format))
                            .with_attr("BlockType", block)
                            .with_attr("AppliedCharacterStyle", CHARACTER_STYLE_NONE),
                    ),
            );
        }

        for (name, color) in [("Print", "GridGreen"), ("Digital", "GridBlue")] {
            root.push(
                Element::new("Condition")
                    .with_attr("Self", format!("Condition/{}", name))
                    .with_attr("Name", name)
                    .with_attr("IndicatorMethod", "UseHighlight")
                    .with_attr("Visible", "true")
                    .with_child(
                        Element::new("Properties").with_child(
                            Element::new("IndicatorColor").with_attr("type", "enumeration").with_child(color),
                        ),
                    ),
            );
        }

        root.push(
            Element::new("TextVariable")
                .with_attr("Self", TIMESTAMP_VARIABLE)
                .with_attr("Name", "Timestamp")
                .with_attr("VariableType", "ModificationDateType")
                .with_child(
                    Element::new("DateVariablePreference")
                        .with_attr("TextBefore", "")
                        .with_attr("Format", TIMESTAMP_FORMAT)
                        .with_attr("TextAfter", ""),
                ),
        );
        root
    }
}

fn export_rules<'a>() -> ExportRules<'a> {
    RuleSet::new(other)
        .rule("paragraph", |exp, id| exp.doc.tag(*id).is_paragraph(), paragraph)
        .rule("section", |exp, id| exp.doc.tag(*id) == &Tag::Section, section)
        .rule("page_break", |exp, id| exp.doc.tag(*id) == &Tag::PageBreak, page_break)
        .rule("table", |exp, id| exp.doc.tag(*id) == &Tag::Table, table)
        .rule(
            "list",
            |exp, id| matches!(exp.doc.tag(*id), Tag::Ul | Tag::Ol | Tag::Li | Tag::Div),
            container,
        )
        .rule("span", |exp, id| exp.doc.tag(*id) == &Tag::Span, span)
        .rule(
            "condition",
            |exp, id| matches!(exp.doc.tag(*id), Tag::Print | Tag::Digital),
            condition,
        )
        .rule("hyperlink", |exp, id| exp.doc.tag(*id) == &Tag::Hyperlink, hyperlink)
        .rule(
            "cross_reference",
            |exp, id| matches!(exp.doc.tag(*id), Tag::Cref | Tag::Pageref | Tag::Textref),
            cross_reference,
        )
        .rule(
            "anchor",
            |exp, id| matches!(exp.doc.tag(*id), Tag::Anchor | Tag::AnchorEnd),
            anchor,
        )
        .rule("footnote", |exp, id| exp.doc.tag(*id) == &Tag::Footnote, footnote)
        .rule("footnote_ref", |exp, id| exp.doc.tag(*id) == &Tag::FootnoteRef, footnote_ref)
        .rule("endnote", |exp, id| exp.doc.tag(*id) == &Tag::Endnote, endnote)
        .rule("endnote_ref", |exp, id| exp.doc.tag(*id) == &Tag::EndnoteRef, endnote_ref)
        .rule(
            "insert_endnotes",
            |exp, id| exp.doc.tag(*id) == &Tag::InsertEndnotes,
            insert_endnotes,
        )
        .rule("tab", |exp, id| exp.doc.tag(*id) == &Tag::Tab, tab)
        .rule("br", |exp, id| exp.doc.tag(*id) == &Tag::Br, line_break)
        .rule(
            "index_entry",
            |exp, id| matches!(exp.doc.tag(*id), Tag::Xe | Tag::Index),
            index_entry,
        )
        .rule(
            "text_variable",
            |exp, id| matches!(exp.doc.tag(*id), Tag::Timestamp | Tag::Modified | Tag::TextVariable),
            text_variable,
        )
}

// ============================================================================
// Blocks
// ============================================================================

fn paragraph(exp: &mut Exporter, id: &NodeId, out: &mut Vec<Content>) {
    let doc = exp.doc;
    let id = *id;
    let node = doc.node(id);
    if only_endnotes_marker(doc, id) {
        out.extend(exp.ctx.take_endnotes());
        return;
    }
    let style = exp.paragraph_style(node);

    if node.attr("outline") == Some("1") {
        let title = doc.text_content(id).split_whitespace().collect::<Vec<_>>().join(" ");
        let continues = exp.last_outline.is_some() && doc.prev_sibling(id) == exp.last_outline;
        let mut merged = false;
        if continues {
            if let Some(bookmark) = exp.ctx.bookmarks.last_mut() {
                let name = format!("{} {}", bookmark.attr("Name").unwrap_or_default(), title);
                bookmark.set_attr("Name", name.trim());
                merged = true;
            }
        }
        if !merged {
            let anchor = node
                .attr("id")
                .map(str::to_string)
                .unwrap_or_else(|| exp.ctx.next_id("outline_"));
            let destination = text_destination(&anchor);
            let self_ref = destination.attr("Self").unwrap_or_default().to_string();
            exp.pending.push(destination);
            exp.bookmark(&title, &self_ref);
        }
        exp.last_outline = Some(id);
    } else if let Some(anchor) = node.attr("id") {
        exp.pending.push(text_destination(anchor));
    }

    let mut extra = Vec::new();
    if let Some(list_type) = exp.list_type {
        extra.push(("BulletsAndNumberingListType", list_type.to_string()));
    }
    let psr = exp.paragraph_range(style, extra, |exp, runs| exp.inline_children(id, runs));
    out.push(psr.into());

    if exp.drain_endnotes {
        exp.drain_endnotes = false;
        out.extend(exp.ctx.take_endnotes());
    }
}

/// A paragraph holding nothing but `insert_endnotes` stands in for the notes
fn only_endnotes_marker(doc: &Document, id: NodeId) -> bool {
    let node = doc.node(id);
    match doc.children(id) {
        [marker] => {
            node.attr("id").is_none()
                && node.text.trim().is_empty()
                && doc.tag(*marker) == &Tag::InsertEndnotes
                && doc.node(*marker).tail.trim().is_empty()
        }
        _ => false,
    }
}

/// A nested section opens with a destination and a bookmark
fn section(exp: &mut Exporter, id: &NodeId, out: &mut Vec<Content>) {
    let doc = exp.doc;
    let anchor = doc
        .attr(*id, "id")
        .map(str::to_string)
        .unwrap_or_else(|| exp.ctx.next_id("section_"));
    let destination = text_destination(&anchor);
    let self_ref = destination.attr("Self").unwrap_or_default().to_string();
    let title = doc.attr(*id, "title").unwrap_or(&anchor).to_string();
    exp.pending.push(destination);
    exp.bookmark(&title, &self_ref);
    exp.block_children(*id, out);
}

fn page_break(exp: &mut Exporter, id: &NodeId, out: &mut Vec<Content>) {
    let style = match exp.doc.attr(*id, "break_type") {
        Some("oddPage") => "ParagraphStyle/ForceOddPage",
        Some("evenPage") => "ParagraphStyle/ForceEvenPage",
        _ => "ParagraphStyle/ForceNextPage",
    };
    let psr = exp.paragraph_range(style.to_string(), Vec::new(), |_, _| {});
    out.push(psr.into());
}

fn container(exp: &mut Exporter, id: &NodeId, out: &mut Vec<Content>) {
    let saved = exp.list_type;
    match exp.doc.tag(*id) {
        Tag::Ul => exp.list_type = Some("BulletList"),
        Tag::Ol => exp.list_type = Some("NumberedList"),
        _ => {}
    }
    exp.block_children(*id, out);
    exp.list_type = saved;
}

fn table(exp: &mut Exporter, id: &NodeId, out: &mut Vec<Content>) {
    let table = table_element(exp, *id);
    if exp.block {
        let psr = exp.paragraph_range(PARAGRAPH_STYLE_NONE.to_string(), Vec::new(), |exp, runs| {
            exp.leaf(table, runs)
        });
        out.push(psr.into());
    } else {
        exp.leaf(table, out);
    }
}

fn span_of(doc: &Document, id: NodeId, name: &str) -> usize {
    doc.attr(id, name)
        .and_then(|v| v.trim().parse::<usize>().ok())
        .filter(|&n| n > 0)
        .unwrap_or(1)
}

/// Rows, columns sized from the table width, and a flat cell list keyed
/// by `column:row`
fn table_element(exp: &mut Exporter, id: NodeId) -> Element {
    let doc = exp.doc;
    let rows: Vec<NodeId> = doc.children(id).iter().copied().filter(|&c| doc.tag(c) == &Tag::Tr).collect();
    let cells_of = |row: NodeId| -> Vec<NodeId> {
        doc.children(row).iter().copied().filter(|&c| doc.tag(c) == &Tag::Td).collect()
    };
    let widest = rows
        .iter()
        .map(|&r| cells_of(r).into_iter().map(|c| span_of(doc, c, "colspan")).sum::<usize>())
        .max()
        .unwrap_or(0);
    let cols = doc
        .attr(id, "data-cols")
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(widest)
        .max(1);

    let table_id = exp.ctx.next_id("t");
    let style = match doc.attr(id, "class").filter(|c| !c.is_empty()) {
        Some(class) => exp.style_id(StyleKind::Table, "TableStyle/", class),
        None => "TableStyle/$ID/[Basic Table]".to_string(),
    };
    let mut table = Element::new("Table")
        .with_attr("Self", table_id.clone())
        .with_attr("HeaderRowCount", "0")
        .with_attr("FooterRowCount", "0")
        .with_attr("BodyRowCount", rows.len().to_string())
        .with_attr("ColumnCount", cols.to_string())
        .with_attr("AppliedTableStyle", style)
        .with_attr("TableDirection", "LeftToRightDirection");

    for i in 0..rows.len() {
        table.push(
            Element::new("Row")
                .with_attr("Self", format!("{}Row{}", table_id, i))
                .with_attr("Name", i.to_string()),
        );
    }
    let width = exp.options.table_width / cols as f64;
    for j in 0..cols {
        table.push(
            Element::new("Column")
                .with_attr("Self", format!("{}Column{}", table_id, j))
                .with_attr("Name", j.to_string())
                .with_attr("SingleColumnWidth", format!("{}", width)),
        );
    }

    let mut occupied: HashSet<(usize, usize)> = HashSet::new();
    for (r, &row) in rows.iter().enumerate() {
        let mut c = 0;
        for td in cells_of(row) {
            while occupied.contains(&(c, r)) {
                c += 1;
            }
            let (colspan, rowspan) = (span_of(doc, td, "colspan"), span_of(doc, td, "rowspan"));
            for dc in 0..colspan {
                for dr in 0..rowspan {
                    occupied.insert((c + dc, r + dr));
                }
            }
            let cell_style = match doc.attr(td, "class").filter(|c| !c.is_empty()) {
                Some(class) => exp.style_id(StyleKind::Cell, "CellStyle/", class),
                None => "CellStyle/$ID/[None]".to_string(),
            };

            let saved = std::mem::take(&mut exp.chars);
            let mut body = Vec::new();
            exp.block_children(td, &mut body);
            exp.chars = saved;
            strip_trailing_break(&mut body);

            let mut cell = Element::new("Cell")
                .with_attr("Self", format!("{}i{}", table_id, table.children.len()))
                .with_attr("Name", format!("{}:{}", c, r))
                .with_attr("RowSpan", rowspan.to_string())
                .with_attr("ColumnSpan", colspan.to_string())
                .with_attr("AppliedCellStyle", cell_style);
            cell.children = body;
            table.push(cell);
            c += colspan;
        }
    }
    table
}

// ============================================================================
// Inline content
// ============================================================================

fn span(exp: &mut Exporter, id: &NodeId, out: &mut Vec<Content>) {
    let doc = exp.doc;
    let node = doc.node(*id);
    let mut chars = exp.chars.clone();

    if let Some(class) = node.attr("class") {
        chars.style = if is_sentinel_class(class) {
            None
        } else {
            let style = exp.style_id(StyleKind::Character, "CharacterStyle/", class);
            exp.character_styles.insert(style.clone());
            Some(style)
        };
    }
    if let Some(style) = node.attr("style") {
        for (k, v) in range_attributes(style, exp.options.em_baseline()) {
            chars.set(&k, v);
        }
    }
    if let Some(language) = node.attr("lang").and_then(applied_language) {
        chars.set("AppliedLanguage", language);
    }
    if let Some(cond) = node.attr("cond") {
        let applied: Vec<String> = cond
            .split_whitespace()
            .map(|c| format!("Condition/{}", c.replace('_', "%20")))
            .collect();
        chars.set("AppliedConditions", applied.join(" "));
    }

    let saved = std::mem::replace(&mut exp.chars, chars);
    exp.inline_children(*id, out);
    exp.chars = saved;
}

fn condition(exp: &mut Exporter, id: &NodeId, out: &mut Vec<Content>) {
    let name = match exp.doc.tag(*id) {
        Tag::Print => "Condition/Print",
        _ => "Condition/Digital",
    };
    let mut chars = exp.chars.clone();
    chars.set("AppliedConditions", name.to_string());
    let saved = std::mem::replace(&mut exp.chars, chars);
    exp.inline_children(*id, out);
    exp.chars = saved;
}

fn hyperlink(exp: &mut Exporter, id: &NodeId, out: &mut Vec<Content>) {
    let doc = exp.doc;
    let node = doc.node(*id);
    let source_id = exp.ctx.next_id("hs");
    let text = doc.text_content(*id);
    let name = match text.trim() {
        "" => source_id.clone(),
        t => t.to_string(),
    };

    let mut inner = Vec::new();
    let saved = std::mem::replace(&mut exp.chars.bare, true);
    exp.inline_children(*id, &mut inner);
    exp.chars.bare = saved;

    let mut source = Element::new("HyperlinkTextSource")
        .with_attr("Self", source_id.clone())
        .with_attr("Name", name.clone())
        .with_attr("Hidden", "false");
    for child in inner {
        push_content(&mut source.children, child);
    }

    if !exp.queue_hyperlink(&source_id, node, &name) {
        exp.ctx.diagnostics.warn(
            DiagnosticKind::UnresolvedReference,
            format!("hyperlink {:?} has no href or anchor", name),
        );
    }
    exp.leaf(source, out);
}

fn cross_reference(exp: &mut Exporter, id: &NodeId, out: &mut Vec<Content>) {
    let doc = exp.doc;
    let node = doc.node(*id);
    let (format, text) = match node.tag {
        Tag::Textref => (PARAGRAPH_TEXT_FORMAT, UPDATE_CROSS_REFERENCE.to_string()),
        Tag::Cref if !doc.text_content(*id).trim().is_empty() => (PAGE_NUMBER_FORMAT, doc.text_content(*id)),
        _ => (PAGE_NUMBER_FORMAT, UPDATE_CROSS_REFERENCE.to_string()),
    };
    let source_id = exp.ctx.next_id("x");
    let source = Element::new("CrossReferenceSource")
        .with_attr("Self", source_id.clone())
        .with_attr("Name", source_id.clone())
        .with_attr("AppliedFormat", format)
        .with_child(Element::new("Content").with_child(text));
    exp.queue_hyperlink(&source_id, node, &source_id);
    exp.leaf(source, out);
}

fn text_destination(name: &str) -> Element {
    Element::new("HyperlinkTextDestination")
        .with_attr("Self", format!("HyperlinkTextDestination/{}", name))
        .with_attr("Name", name)
        .with_attr("Hidden", "false")
}

fn anchor(exp: &mut Exporter, id: &NodeId, out: &mut Vec<Content>) {
    let doc = exp.doc;
    let node = doc.node(*id);
    let base = node
        .attr("id")
        .map(str::to_string)
        .unwrap_or_else(|| exp.ctx.next_id("a"));
    let name = match node.tag {
        Tag::AnchorEnd => format!("{}_end", base),
        _ => base,
    };
    let destination = text_destination(&name);
    if let Some(title) = node.attr("bkmk") {
        let title = if title.trim().is_empty() { name.as_str() } else { title };
        let self_ref = destination.attr("Self").unwrap_or_default().to_string();
        exp.bookmark(title, &self_ref);
    }
    exp.leaf(destination, out);
}

fn footnote(exp: &mut Exporter, id: &NodeId, out: &mut Vec<Content>) {
    let saved = std::mem::take(&mut exp.chars);
    let mut body = Vec::new();
    exp.block_children(*id, &mut body);
    exp.chars = saved;

    strip_trailing_break(&mut body);
    for note in hoist_index_notes(&mut body) {
        exp.leaf(note, out);
    }
    let mut footnote = Element::new("Footnote");
    footnote.children = body;
    exp.leaf(footnote, out);
}

fn footnote_ref(exp: &mut Exporter, _id: &NodeId, out: &mut Vec<Content>) {
    let content = Element::new("Content").with_child(Content::Instruction("ACE 4".to_string()));
    exp.leaf(content, out);
}

/// Endnote bodies go to the endnote queue; a numbered cross-reference
/// takes their place
fn endnote(exp: &mut Exporter, id: &NodeId, out: &mut Vec<Content>) {
    let doc = exp.doc;
    exp.endnote_count += 1;
    let key = doc
        .attr(*id, "id")
        .map(identifier)
        .unwrap_or_else(|| exp.endnote_count.to_string());
    let endnote_id = format!("endnote_{}_{}", key.trim_start_matches('_'), exp.story);
    let ref_name = format!("endnote_ref_{}_{}", key.trim_start_matches('_'), exp.story);
    let marker = marker_for(doc, *id);

    let saved_chars = std::mem::take(&mut exp.chars);
    let saved_endnote = exp.endnote.replace(endnote_id.clone());
    let saved_destination = std::mem::replace(&mut exp.endnote_destination, false);
    let mut body = Vec::new();
    exp.block_children(*id, &mut body);
    if !exp.endnote_destination {
        let destination = paragraph_destination(&endnote_id);
        let range = CharState::default().range().with_child(destination);
        match body.iter_mut().find_map(|c| match c {
            Content::Element(e) if e.name == "ParagraphStyleRange" => Some(e),
            _ => None,
        }) {
            Some(psr) => psr.children.insert(0, range.into()),
            None => body.push(
                Element::new("ParagraphStyleRange")
                    .with_attr("AppliedParagraphStyle", PARAGRAPH_STYLE_NONE)
                    .with_child(range)
                    .into(),
            ),
        }
    }
    exp.chars = saved_chars;
    exp.endnote = saved_endnote;
    exp.endnote_destination = saved_destination;
    exp.ctx.endnotes.extend(body);

    let hyperlink = Element::new("Hyperlink")
        .with_attr("Self", exp.ctx.next_id("h"))
        .with_attr("Name", ref_name.clone())
        .with_attr("Source", ref_name.clone())
        .with_attr("Visible", "false")
        .with_child(Element::new("Properties").with_child(
            Element::new("Destination")
                .with_attr("type", "object")
                .with_child(format!("ParagraphDestination/{}", endnote_id)),
        ));
    exp.ctx.hyperlinks.push(hyperlink);

    let source = Element::new("CrossReferenceSource")
        .with_attr("Self", ref_name.clone())
        .with_attr("Name", ref_name)
        .with_attr("AppliedFormat", PARAGRAPH_NUMBER_FORMAT)
        .with_child(Element::new("Content").with_child(marker));
    exp.leaf(source, out);
}

fn paragraph_destination(name: &str) -> Element {
    Element::new("ParagraphDestination")
        .with_attr("Self", format!("ParagraphDestination/{}", name))
        .with_attr("Name", name)
        .with_attr("Hidden", "false")
}

fn endnote_ref(exp: &mut Exporter, _id: &NodeId, out: &mut Vec<Content>) {
    match exp.endnote.clone() {
        Some(endnote_id) => {
            exp.endnote_destination = true;
            exp.leaf(paragraph_destination(&endnote_id), out);
        }
        None => tracing::debug!("endnote_ref outside an endnote"),
    }
}

fn insert_endnotes(exp: &mut Exporter, _id: &NodeId, out: &mut Vec<Content>) {
    if exp.block {
        out.extend(exp.ctx.take_endnotes());
    } else {
        exp.drain_endnotes = true;
    }
}

fn tab(exp: &mut Exporter, id: &NodeId, out: &mut Vec<Content>) {
    let content = match exp.doc.attr(*id, "align") {
        Some("right") => Element::new("Content").with_child(Content::Instruction("ACE 8".to_string())),
        _ => Element::new("Content").with_child("\t"),
    };
    exp.leaf(content, out);
}

fn line_break(exp: &mut Exporter, _id: &NodeId, out: &mut Vec<Content>) {
    exp.leaf(Element::new("Content").with_child("\u{2028}"), out);
}

/// `Note` carrying text in a single unstyled paragraph
fn note_element(text: String) -> Element {
    Element::new("Note").with_child(
        Element::new("ParagraphStyleRange")
            .with_attr("AppliedParagraphStyle", PARAGRAPH_STYLE_NONE)
            .with_child(
                Element::new("CharacterStyleRange")
                    .with_attr("AppliedCharacterStyle", CHARACTER_STYLE_NONE)
                    .with_child(Element::new("Content").with_child(text)),
            ),
    )
}

fn is_index_note(el: &Element) -> bool {
    el.name == "Note" && {
        let text = el.text();
        let text = text.trim_start();
        text.starts_with("{{xe}}") || text.starts_with("{{index}}")
    }
}

fn index_entry(exp: &mut Exporter, id: &NodeId, out: &mut Vec<Content>) {
    let node = exp.doc.node(*id);
    let name = node.tag.name();
    let json = serde_json::to_string(&node.attrs).unwrap_or_else(|_| "{}".to_string());
    let text = format!("{{{{{}}}}}{}{{{{/{}}}}}", name, json, name);
    exp.leaf(note_element(text), out);
}

fn text_variable(exp: &mut Exporter, id: &NodeId, out: &mut Vec<Content>) {
    let doc = exp.doc;
    let node = doc.node(*id);
    let mut instance = Element::new("TextVariableInstance");
    if node.tag == Tag::TextVariable {
        for (k, v) in &node.attrs {
            instance.set_attr(k.clone(), v.clone());
        }
    } else {
        instance.set_attr("Name", "<Timestamp>");
        instance.set_attr("AssociatedTextVariable", TIMESTAMP_VARIABLE);
    }
    if instance.attr("Self").is_none() {
        instance.set_attr("Self", exp.ctx.next_id("tv"));
    }
    instance.set_attr("ResultText", doc.text_content(*id));
    exp.leaf(instance, out);
}

/// Everything else: leaf markup travels in a `Note`, wrappers are
/// transparent
fn other(exp: &mut Exporter, id: &NodeId, out: &mut Vec<Content>) {
    let doc = exp.doc;
    let leaf = doc.children(*id).is_empty() || matches!(doc.tag(*id), Tag::Img | Tag::Include);
    if leaf {
        let markup = doc.node_to_xml(*id);
        exp.leaf(note_element(markup), out);
    } else if exp.block {
        exp.block_children(*id, out);
    } else {
        exp.inline_children(*id, out);
    }
}

// ============================================================================
// Range assembly
// ============================================================================

/// Merge adjacent character ranges with identical attributes
fn merge_ranges(runs: Vec<Content>) -> Vec<Content> {
    let mut merged: Vec<Content> = Vec::with_capacity(runs.len());
    for item in runs {
        if let Content::Element(next) = &item {
            if let Some(Content::Element(prev)) = merged.last_mut() {
                if next.name == "CharacterStyleRange" && prev.name == next.name && prev.attrs == next.attrs {
                    for child in next.children.iter().cloned() {
                        push_content(&mut prev.children, child);
                    }
                    continue;
                }
            }
        }
        merged.push(item);
    }
    merged
}

/// Append a child, joining consecutive `Content` elements
fn push_content(children: &mut Vec<Content>, child: Content) {
    if let Content::Element(next) = &child {
        if next.name == "Content" {
            if let Some(Content::Element(prev)) = children.last_mut() {
                if prev.name == "Content" {
                    for c in next.children.iter().cloned() {
                        push_text(&mut prev.children, c);
                    }
                    return;
                }
            }
        }
    }
    children.push(child);
}

fn push_text(children: &mut Vec<Content>, child: Content) {
    if let Content::Text(more) = &child {
        if let Some(Content::Text(text)) = children.last_mut() {
            text.push_str(more);
            return;
        }
    }
    children.push(child);
}

/// Drop the forced break that ends the last paragraph range
fn strip_trailing_break(body: &mut [Content]) {
    let last = body.iter_mut().rev().find_map(|c| match c {
        Content::Element(e) if e.name == "ParagraphStyleRange" => Some(e),
        _ => None,
    });
    let Some(psr) = last else {
        return;
    };
    let Some(Content::Element(range)) = psr.children.last_mut() else {
        return;
    };
    if matches!(range.children.last(), Some(Content::Element(e)) if e.name == "Br") {
        range.children.pop();
    }
    let empty = range.children.is_empty();
    if empty {
        psr.children.pop();
    }
}

/// Remove index-entry notes from a footnote body so they can sit beside it
fn hoist_index_notes(body: &mut [Content]) -> Vec<Element> {
    let mut hoisted = Vec::new();
    for psr in body.iter_mut() {
        let Content::Element(psr) = psr else {
            continue;
        };
        for range in psr.children.iter_mut() {
            let Content::Element(range) = range else {
                continue;
            };
            range.children.retain(|c| match c {
                Content::Element(e) if is_index_note(e) => {
                    hoisted.push(e.clone());
                    false
                }
                _ => true,
            });
        }
    }
    hoisted
}

/// Export with default options and no auxiliary documents
pub fn export_document(doc: &Document, document_name: &str) -> (ExportOutput, Diagnostics) {
    let styles = StyleRegistry::new();
    let options = ConvertOptions::default().with_document_name(document_name);
    let ctx = ResolutionContext::new(document_name);
    Exporter::new(doc, &styles, &options, ctx).export()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn export(xml: &str) -> (ExportOutput, Diagnostics) {
        let doc = Document::parse(xml).unwrap();
        export_document(&doc, "ch01")
    }

    fn all<'e>(root: &'e Element, name: &str) -> Vec<&'e Element> {
        let mut found = Vec::new();
        root.walk(&mut |e| {
            if e.name == name {
                found.push(e);
            }
        });
        found
    }

    fn count_br(el: &Element) -> usize {
        all(el, "Br").len()
    }

    #[test]
    fn test_paragraphs_end_with_forced_break() {
        let (out, _) = export(r#"<document><body><section id="s1" title="One"><p class="Body-Text">Hello <span class="Emphasis">world</span></p></section></body></document>"#);
        let root = &out.document.root;
        let story = all(root, "Story")[0];
        assert_eq!(story.attr("Self"), Some("s1"));
        let psr = all(root, "ParagraphStyleRange")[0];
        assert_eq!(psr.attr("AppliedParagraphStyle"), Some("ParagraphStyle/BodyText"));
        assert_eq!(count_br(psr), 1);
        let ranges = all(psr, "CharacterStyleRange");
        assert!(ranges.iter().any(|r| r.attr("AppliedCharacterStyle") == Some("CharacterStyle/Emphasis")));
        assert!(all(root, "CharacterStyle").iter().any(|s| s.attr("Self") == Some("CharacterStyle/Emphasis")));
        assert!(all(root, "ParagraphStyle").iter().any(|s| s.attr("Self") == Some("ParagraphStyle/BodyText")));
    }

    #[test]
    fn test_footnote_trailing_break_removed() {
        let (out, _) = export(
            r#"<document><body><section id="s"><p>Text<footnote id="fn1"><p>first</p><p>second</p></footnote> more</p></section></body></document>"#,
        );
        let footnote = all(&out.document.root, "Footnote")[0];
        let paras = all(footnote, "ParagraphStyleRange");
        assert_eq!(paras.len(), 2);
        assert_eq!(count_br(paras[0]), 1);
        assert_eq!(count_br(paras[1]), 0);
        assert_eq!(paras[1].text(), "second");
    }

    #[test]
    fn test_inline_markers() {
        let (out, _) = export(r#"<document><body><p>a<tab/>b<tab align="right"/>c<br/>d<footnote_ref/></p></body></document>"#);
        let contents = all(&out.document.root, "Content");
        let content = contents.iter().find(|c| c.text().starts_with('a')).unwrap();
        assert_eq!(content.text(), "a\tbc\u{2028}d");
        assert!(content.children.contains(&Content::Instruction("ACE 8".to_string())));
        assert!(content.children.contains(&Content::Instruction("ACE 4".to_string())));
    }

    #[test]
    fn test_page_break_style() {
        let (out, _) = export(r#"<document><body><p>a</p><page_break break_type="oddPage"/><p>b</p></body></document>"#);
        let styles: Vec<&str> = all(&out.document.root, "ParagraphStyleRange")
            .iter()
            .filter_map(|p| p.attr("AppliedParagraphStyle"))
            .collect();
        assert_eq!(styles[1], "ParagraphStyle/ForceOddPage");
    }

    #[test]
    fn test_table_cells_keyed_by_column_and_row() {
        let (out, _) = export(
            r#"<document><body><table data-cols="2"><tr><td colspan="2"><p>wide</p></td></tr><tr><td><p>a</p></td><td><p>b</p></td></tr></table></body></document>"#,
        );
        let table = all(&out.document.root, "Table")[0];
        assert_eq!(table.attr("BodyRowCount"), Some("2"));
        assert_eq!(table.attr("ColumnCount"), Some("2"));
        let columns = all(table, "Column");
        assert_eq!(columns[0].attr("SingleColumnWidth"), Some("162"));
        let names: Vec<&str> = all(table, "Cell").iter().filter_map(|c| c.attr("Name")).collect();
        assert_eq!(names, vec!["0:0", "0:1", "1:1"]);
        assert_eq!(all(table, "Cell")[0].attr("ColumnSpan"), Some("2"));
        assert_eq!(count_br(table), 0);
    }

    #[test]
    fn test_hyperlinks_emitted_after_stories() {
        let (out, _) = export(
            r#"<document><body><section id="s"><p><anchor id="ch01_top"/>Top <hyperlink href="ch01.xml#ch01_top">back</hyperlink> <hyperlink href="http://example.com/x y">web</hyperlink></p></section></body></document>"#,
        );
        let root = &out.document.root;
        let names: Vec<&str> = root.elements().map(|e| e.name.as_str()).collect();
        let story_at = names.iter().position(|n| *n == "Story").unwrap();
        let link_at = names.iter().position(|n| *n == "Hyperlink").unwrap();
        assert!(link_at > story_at);

        let destinations: Vec<String> = all(root, "Destination").iter().map(|d| d.text()).collect();
        assert!(destinations.contains(&"HyperlinkTextDestination/ch01_top".to_string()));
        assert!(destinations.contains(&"HyperlinkURLDestination/http%3A//example.com/x%20y".to_string()));
        let url = all(root, "HyperlinkURLDestination")[0];
        assert_eq!(url.attr("DestinationURL"), Some("http://example.com/x y"));
        assert_eq!(all(root, "HyperlinkTextSource").len(), 2);
    }

    #[test]
    fn test_endnotes_queued_to_separate_document() {
        let (out, _) = export(
            r#"<document><body><section id="s"><p>One<endnote id="1"><p>first note</p></endnote> two<endnote id="2"><p>second</p></endnote></p></section></body></document>"#,
        );
        let root = &out.document.root;
        let refs = all(root, "CrossReferenceSource");
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].text(), "a");
        assert_eq!(refs[1].text(), "b");
        assert_eq!(refs[0].attr("Self"), Some("endnote_ref_1_s"));
        assert!(all(root, "Destination").iter().any(|d| d.text() == "ParagraphDestination/endnote_1_s"));

        let endnotes = out.endnotes.expect("endnotes document");
        let destinations = all(&endnotes.root, "ParagraphDestination");
        assert_eq!(destinations.len(), 2);
        assert!(endnotes.root.text().contains("first note"));
        assert!(!root.text().contains("first note"));
    }

    #[test]
    fn test_insert_endnotes_drains_queue() {
        let (out, _) = export(
            r#"<document><body><section id="s"><p>One<endnote id="1"><p>note</p></endnote></p><p><insert_endnotes/></p></section></body></document>"#,
        );
        assert!(out.endnotes.is_none());
        assert!(out.document.root.text().contains("note"));
    }

    #[test]
    fn test_endnotes_marker_paragraph_emits_only_notes() {
        let (out, _) = export(
            r#"<document><body><section id="s"><p>One<endnote id="1"><p>note</p></endnote></p><p><insert_endnotes/></p></section></body></document>"#,
        );
        let ranges = all(&out.document.root, "ParagraphStyleRange");
        assert_eq!(ranges.len(), 2);
        assert!(ranges.iter().all(|psr| !psr.text().trim().is_empty()));
    }

    #[test]
    fn test_index_entries_hoisted_out_of_footnotes() {
        let (out, _) = export(
            r#"<document><body><p>t<footnote><p>n<xe term="codec"/></p></footnote></p></body></document>"#,
        );
        let footnote = all(&out.document.root, "Footnote")[0];
        assert!(all(footnote, "Note").is_empty());
        let note = all(&out.document.root, "Note")[0];
        assert_eq!(note.text(), r#"{{xe}}{"term":"codec"}{{/xe}}"#);
    }

    #[test]
    fn test_export_is_deterministic() {
        let xml = r#"<document><body><p>x <hyperlink href="a.xml#b">y</hyperlink></p><table><tr><td>z</td></tr></table></body></document>"#;
        let (a, _) = export(xml);
        let (b, _) = export(xml);
        assert_eq!(a.document.to_xml(), b.document.to_xml());
    }

    #[test]
    fn test_outline_paragraphs_share_bookmark() {
        let (out, _) = export(r#"<document><body><p outline="1">Part</p><p outline="1">One</p><p>body</p></body></document>"#);
        let bookmarks = all(&out.document.root, "Bookmark");
        assert_eq!(bookmarks.len(), 1);
        assert_eq!(bookmarks[0].attr("Name"), Some("Part One"));
    }
}
