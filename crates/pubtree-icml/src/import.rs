//! Interchange tree to canonical document
//!
//! The importer walks the interchange tree once, dispatching each element
//! through an ordered [`RuleSet`], and builds canonical nodes directly into
//! a [`Document`] arena. The raw result is then handed to the
//! [`normalize`](crate::normalize) passes.
//!
//! Only text inside `Content` elements is significant; whitespace between
//! interchange elements is layout and is dropped.

use std::collections::HashSet;

use pubtree_ast::{Document, NodeId, Tag};

use crate::config::ConvertOptions;
use crate::context::ResolutionContext;
use crate::css::{declarations, inline_style, lang_code};
use crate::diagnostic::{DiagnosticKind, Diagnostics};
use crate::normalize;
use crate::resolve::{bookmark_title, hyperlink_href, make_element_id, percent_decode};
use crate::rules::RuleSet;
use crate::styles::{classname, is_sentinel_class, PropertyBag, StyleRegistry, NO_PARAGRAPH_STYLE};
use crate::tree::{Content, Element};

/// Presentation-only elements that produce nothing
pub const OMITTED: &[&str] = &[
    "AnchoredObjectSetting",
    "Bookmark",
    "Cell",
    "Color",
    "ColorGroup",
    "Column",
    "CompositeFont",
    "Condition",
    "CrossReferenceFormat",
    "DocumentUser",
    "FontFamily",
    "FrameFittingOption",
    "Group",
    "Hyperlink",
    "HyperlinkURLDestination",
    "InCopyExportOption",
    "Ink",
    "KinsokuTable",
    "MetadataPacketPreference",
    "MojikumiTable",
    "NumberingList",
    "ObjectExportOption",
    "Oval",
    "Polygon",
    "Properties",
    "RootCellStyleGroup",
    "RootCharacterStyleGroup",
    "RootObjectStyleGroup",
    "RootParagraphStyleGroup",
    "RootTableStyleGroup",
    "StandaloneDocumentPreference",
    "StoryPreference",
    "StrokeStyle",
    "Swatch",
    "TextVariable",
    "TextWrapPreference",
    "TinDocumentDataObject",
    "TransparencyDefaultContainerObject",
    "XMLAttribute",
];

const GRAPHICS: &[&str] = &["Image", "PDF", "EPS", "PICT", "WMF", "ImportedPage", "Graphic"];

type ImportRules<'a> = RuleSet<Importer<'a>, Element, NodeId>;

/// One import traversal
pub struct Importer<'a> {
    doc: Document,
    ctx: ResolutionContext<'a>,
    source: &'a Element,
    styles: &'a StyleRegistry,
    options: &'a ConvertOptions,
    object_style: Option<String>,
    rules: ImportRules<'a>,
}

impl<'a> Importer<'a> {
    pub fn new(
        source: &'a Element,
        styles: &'a StyleRegistry,
        options: &'a ConvertOptions,
        ctx: ResolutionContext<'a>,
    ) -> Self {
        Self {
            doc: Document::new(),
            ctx,
            source,
            styles,
            options,
            object_style: None,
            rules: import_rules(),
        }
    }

    /// Dispatch the whole tree, then run the normalization passes
    pub fn import(mut self) -> (Document, Diagnostics) {
        self.raise();
        let mut diagnostics = self.ctx.diagnostics;
        normalize::normalize(&mut self.doc, self.options, &mut diagnostics);
        (self.doc, diagnostics)
    }

    /// Dispatch pass only; the result is not normalized
    pub fn raise(&mut self) -> &Document {
        let Some(body) = self.doc.body() else {
            return &self.doc;
        };
        self.doc.node_mut(body).text = "\n".to_string();
        let source = self.source;
        if source.name == "Document" || source.name.ends_with(":Story") {
            self.convert_children(source, body);
        } else {
            self.convert(source, body);
        }
        &self.doc
    }

    fn convert(&mut self, el: &Element, parent: NodeId) {
        let (rule, handler) = self.rules.select(self, el);
        tracing::trace!(rule, element = %el.name, "import");
        let mut target = parent;
        handler(self, el, &mut target);
    }

    /// Convert child elements, ignoring inter-element whitespace
    fn convert_children(&mut self, el: &Element, parent: NodeId) {
        for child in el.elements() {
            self.convert(child, parent);
        }
    }

    fn append_new(&mut self, parent: NodeId, tag: Tag, attrs: Vec<(String, String)>) -> NodeId {
        let id = self.doc.create_with(tag, attrs);
        self.doc.append(parent, id);
        id
    }

    fn filename(&self) -> String {
        self.ctx.filename()
    }

    fn element_id(&self, el: &Element) -> String {
        make_element_id(el, Some(&self.ctx.document_name))
    }

    fn warn(&mut self, kind: DiagnosticKind, message: String) {
        self.ctx.diagnostics.warn(kind, message);
    }

    /// Class for an applied style reference, or `None` when it is missing
    fn style_class(&mut self, applied: Option<&str>, prefix: &str) -> Option<String> {
        let applied = applied?;
        if !self.styles.is_empty() && !applied.contains("$ID/[") && !self.styles.contains(applied) {
            self.warn(
                DiagnosticKind::UnresolvedStyle,
                format!("style {:?} is not defined", applied),
            );
            return None;
        }
        let name = applied.strip_prefix(prefix).unwrap_or(applied);
        Some(classname(name))
    }

    /// Append text, expanding tab characters into `tab` elements
    fn append_content_text(&mut self, parent: NodeId, text: &str) {
        let mut parts = text.split('\t');
        if let Some(first) = parts.next() {
            self.doc.append_text(parent, first);
        }
        for part in parts {
            let tab = self.append_new(parent, Tag::Tab, Vec::new());
            self.doc.node_mut(tab).tail = part.to_string();
        }
    }
}

fn import_rules<'a>() -> ImportRules<'a> {
    RuleSet::new(copy_element)
        .rule("story", |_, e| e.name == "Story", story)
        .rule("forced_page", |_, e| forced_page_type(e).is_some(), forced_page)
        .rule("paragraph", |_, e| e.name == "ParagraphStyleRange", paragraph)
        .rule("character", |_, e| e.name == "CharacterStyleRange", character)
        .rule("content", |_, e| e.name == "Content", content)
        .rule("br", |_, e| e.name == "Br", paragraph_break)
        .rule("footnote", |_, e| e.name == "Footnote", footnote)
        .rule("table", |_, e| e.name == "Table", table)
        .rule("text_destination", |_, e| e.name == "HyperlinkTextDestination", text_destination)
        .rule("paragraph_destination", |_, e| e.name == "ParagraphDestination", paragraph_destination)
        .rule(
            "hyperlink_source",
            |_, e| e.name == "HyperlinkTextSource" || e.name == "CrossReferenceSource",
            hyperlink_source,
        )
        .rule("text_variable", |_, e| e.name == "TextVariableInstance", text_variable)
        .rule("note", |_, e| e.name == "Note", note)
        .rule("hidden_text", |_, e| e.name == "HiddenText", pass_through)
        .rule("rectangle", |_, e| e.name == "Rectangle", rectangle)
        .rule("graphic", |_, e| GRAPHICS.contains(&e.name.as_str()), graphic)
        .rule("xml_element", |_, e| e.name == "XMLElement", xml_element)
        .rule("text_frame", |_, e| e.name == "TextFrame", text_frame)
        .rule("change", |_, e| e.name == "Change", change)
        .rule("omitted", |_, e| OMITTED.contains(&e.name.as_str()), omit)
}

// ============================================================================
// Stories and paragraphs
// ============================================================================

fn story(imp: &mut Importer, el: &Element, parent: &mut NodeId) {
    let id = imp.element_id(el);
    let section = imp.append_new(
        *parent,
        Tag::Section,
        vec![("class".to_string(), "Story".to_string()), ("id".to_string(), id)],
    );
    imp.doc.node_mut(section).text = "\n".to_string();
    imp.convert_children(el, section);

    let title_para = imp.doc.descendants(section).into_iter().find(|&n| {
        imp.doc.tag(n) == &Tag::P && imp.doc.attr(n, "class").is_some_and(|c| c.contains("Title"))
    });
    if let Some(p) = title_para {
        let text = imp.doc.text_content(p);
        let title = text.split_whitespace().collect::<Vec<_>>().join(" ");
        tracing::debug!(%title, "story title");
        imp.doc.set_attr(section, "title", title);
    }
}

/// `ParagraphStyle/ForceNextPage` and friends mark forced page breaks
fn forced_page_type(el: &Element) -> Option<&'static str> {
    if el.name != "ParagraphStyleRange" {
        return None;
    }
    match el.attr("AppliedParagraphStyle")? {
        "ParagraphStyle/ForceNextPage" => Some("nextPage"),
        "ParagraphStyle/ForceOddPage" => Some("oddPage"),
        "ParagraphStyle/ForceEvenPage" => Some("evenPage"),
        _ => None,
    }
}

fn forced_page(imp: &mut Importer, el: &Element, parent: &mut NodeId) {
    let break_type = forced_page_type(el).unwrap_or("nextPage");
    imp.append_new(
        *parent,
        Tag::PageBreak,
        vec![("break_type".to_string(), break_type.to_string())],
    );
}

fn paragraph(imp: &mut Importer, el: &Element, parent: &mut NodeId) {
    let applied = el.attr("AppliedParagraphStyle");
    let class = imp
        .style_class(applied, "ParagraphStyle/")
        .unwrap_or_else(|| NO_PARAGRAPH_STYLE.to_string());
    let mut attrs = vec![("class".to_string(), class)];

    let list_type = el.attr("BulletsAndNumberingListType").map(str::to_string).or_else(|| {
        applied
            .and_then(|a| imp.styles.get(a))
            .and_then(|s| s.properties.get("BulletsAndNumberingListType").cloned())
    });
    if let Some(list_type) = list_type.filter(|t| t != "NoList") {
        attrs.push(("data-list-type".to_string(), list_type));
    }

    let p = imp.append_new(*parent, Tag::P, attrs);
    imp.convert_children(el, p);

    // a section marker inside the paragraph starts the section before it
    let marker = imp
        .doc
        .descendants(p)
        .into_iter()
        .find(|&n| imp.doc.tag(n) == &Tag::SectionStart);
    if let Some(marker) = marker {
        imp.doc.remove(marker, true);
        imp.doc.insert_before(p, marker);
    }
}

fn character(imp: &mut Importer, el: &Element, parent: &mut NodeId) {
    if el.child("Table").is_some() {
        imp.convert_children(el, *parent);
        return;
    }

    let mut attrs = Vec::new();
    if let Some(class) = imp.style_class(el.attr("AppliedCharacterStyle"), "CharacterStyle/") {
        if !is_sentinel_class(&class) {
            attrs.push(("class".to_string(), class));
        }
    }

    let local: PropertyBag = el
        .attrs
        .iter()
        .filter(|(k, _)| !k.starts_with("Applied"))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    let css = declarations(&local, imp.options.em_baseline(), &mut imp.ctx.diagnostics);
    if !css.is_empty() {
        attrs.push(("style".to_string(), inline_style(&css)));
    }
    if let Some(language) = el.attr("AppliedLanguage") {
        if let Some(code) = lang_code(language, &mut imp.ctx.diagnostics) {
            attrs.push(("lang".to_string(), code.to_string()));
        }
    }
    if let Some(conditions) = el.attr("AppliedConditions") {
        let cond: Vec<String> = conditions
            .split_whitespace()
            .map(|c| c.trim_start_matches("Condition/").replace("%20", "_"))
            .collect();
        if !cond.is_empty() {
            attrs.push(("cond".to_string(), cond.join(" ")));
        }
    }

    let span = imp.append_new(*parent, Tag::Span, attrs);
    imp.convert_children(el, span);
}

fn content(imp: &mut Importer, el: &Element, parent: &mut NodeId) {
    for child in &el.children {
        match child {
            Content::Text(text) => imp.append_content_text(*parent, text),
            Content::Instruction(pi) => match pi.trim() {
                "ACE 4" => {
                    imp.append_new(*parent, Tag::FootnoteRef, Vec::new());
                }
                "ACE 8" => {
                    imp.append_new(
                        *parent,
                        Tag::Tab,
                        vec![("align".to_string(), "right".to_string())],
                    );
                }
                _ => {}
            },
            Content::Element(e) => imp.convert(e, *parent),
        }
    }
}

fn paragraph_break(imp: &mut Importer, _el: &Element, parent: &mut NodeId) {
    imp.append_new(*parent, Tag::PBreak, Vec::new());
}

fn footnote(imp: &mut Importer, el: &Element, parent: &mut NodeId) {
    let key = el
        .attr("Self")
        .map(str::to_string)
        .unwrap_or_else(|| make_element_id(el, None));
    let number = imp.ctx.footnote_number(&key);
    let node = imp.append_new(
        *parent,
        Tag::Footnote,
        vec![("id".to_string(), format!("fn{}", number))],
    );
    imp.convert_children(el, node);
}

// ============================================================================
// Tables
// ============================================================================

/// Parse a cell name `"column:row"`
fn cell_position(cell: &Element) -> Option<(usize, usize)> {
    let (col, row) = cell.attr("Name")?.split_once(':')?;
    Some((col.trim().parse().ok()?, row.trim().parse().ok()?))
}

fn span_attr(cell: &Element, name: &str) -> usize {
    cell.attr(name)
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|&n| n > 0)
        .unwrap_or(1)
}

fn table(imp: &mut Importer, el: &Element, parent: &mut NodeId) {
    let cells: Vec<&Element> = el.elements().filter(|e| e.name == "Cell").collect();
    let column_count = el.elements().filter(|e| e.name == "Column").count();
    let row_count = el.elements().filter(|e| e.name == "Row").count();
    let cols = el
        .attr("ColumnCount")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(column_count)
        .max(1);

    let row_bound = cells.len().max(row_count);
    let named: Option<Vec<(usize, usize)>> = cells.iter().map(|c| cell_position(c)).collect();
    let positions = named.as_ref().filter(|positions| {
        let mut seen = HashSet::new();
        positions
            .iter()
            .all(|&(col, row)| col < cols && row < row_bound && seen.insert((col, row)))
    });
    let grid: Vec<Vec<&Element>> = match positions {
        Some(positions) => {
            let rows = positions
                .iter()
                .filter_map(|&(_, r)| r.checked_add(1))
                .max()
                .unwrap_or(0)
                .max(row_count);
            let mut grid: Vec<Vec<(usize, &Element)>> = vec![Vec::new(); rows];
            for (&(col, row), cell) in positions.iter().zip(&cells) {
                if let Some(slot) = grid.get_mut(row) {
                    slot.push((col, *cell));
                }
            }
            grid.into_iter()
                .map(|mut row| {
                    row.sort_by_key(|&(col, _)| col);
                    row.into_iter().map(|(_, cell)| cell).collect()
                })
                .collect()
        }
        None => {
            let reason = if named.is_some() {
                "out-of-range or duplicate cell names"
            } else {
                "unnamed cells"
            };
            imp.warn(
                DiagnosticKind::TableGeometry,
                format!(
                    "table {:?} has {}; packing by column count",
                    el.attr("Self").unwrap_or_default(),
                    reason
                ),
            );
            let mut grid: Vec<Vec<&Element>> = Vec::new();
            let mut width = cols;
            for cell in &cells {
                if width >= cols {
                    grid.push(Vec::new());
                    width = 0;
                }
                width += span_attr(cell, "ColumnSpan");
                if let Some(row) = grid.last_mut() {
                    row.push(*cell);
                }
            }
            grid
        }
    };

    let covered: usize = cells
        .iter()
        .map(|c| span_attr(c, "ColumnSpan") * span_attr(c, "RowSpan"))
        .sum();
    if covered % cols != 0 {
        imp.warn(
            DiagnosticKind::TableGeometry,
            format!("table cells cover {} slots, not a multiple of {} columns", covered, cols),
        );
    }

    let mut attrs = vec![
        ("data-cols".to_string(), cols.to_string()),
        ("data-rows".to_string(), grid.len().to_string()),
    ];
    if let Some(style) = el.attr("AppliedTableStyle").filter(|s| !s.contains("$ID/[")) {
        attrs.push(("class".to_string(), classname(style)));
    }
    let table = imp.append_new(*parent, Tag::Table, attrs);

    for row in grid {
        let tr = imp.append_new(table, Tag::Tr, Vec::new());
        for cell in row {
            let mut attrs = Vec::new();
            if let Some(style) = cell.attr("AppliedCellStyle").filter(|s| !s.contains("$ID/[")) {
                attrs.push(("class".to_string(), classname(style)));
            }
            for (source, target) in [("ColumnSpan", "colspan"), ("RowSpan", "rowspan")] {
                let n = span_attr(cell, source);
                if n > 1 {
                    attrs.push((target.to_string(), n.to_string()));
                }
            }
            let td = imp.append_new(tr, Tag::Td, attrs);
            imp.convert_children(cell, td);
        }
    }
}

// ============================================================================
// Destinations, hyperlinks and cross-references
// ============================================================================

fn text_destination(imp: &mut Importer, el: &Element, parent: &mut NodeId) {
    let id = imp.element_id(el);
    let self_ref = el.attr("Self").unwrap_or_default();
    let by_name = el
        .attr("Name")
        .map(|n| format!("HyperlinkTextDestination/{}", n))
        .unwrap_or_default();
    let title = imp
        .ctx
        .find(imp.source, &|e| {
            e.name == "Bookmark"
                && e.attr("Destination")
                    .is_some_and(|d| d == by_name || (!self_ref.is_empty() && d == self_ref))
        })
        .map(|found| bookmark_title(found.element));

    let mut attrs = vec![("id".to_string(), id)];
    let tag = match title {
        Some(title) => {
            attrs.push(("title".to_string(), title));
            Tag::SectionStart
        }
        None => Tag::Anchor,
    };
    imp.append_new(*parent, tag, attrs);
}

fn paragraph_destination(imp: &mut Importer, el: &Element, parent: &mut NodeId) {
    let id = imp.element_id(el);
    imp.append_new(*parent, Tag::Anchor, vec![("id".to_string(), id)]);
}

fn hyperlink_source(imp: &mut Importer, el: &Element, parent: &mut NodeId) {
    let id = imp.element_id(el);
    let link = imp.append_new(*parent, Tag::Hyperlink, vec![("id".to_string(), id.clone())]);
    imp.convert_children(el, link);

    // a single cross-reference placeholder absorbs the link attributes
    let children = imp.doc.children(link).to_vec();
    if children.len() == 1
        && imp.doc.tag(children[0]) == &Tag::Cref
        && imp.doc.node(link).text.trim().is_empty()
    {
        let cref = children[0];
        imp.doc.set_attr(cref, "id", id);
        imp.doc.node_mut(link).text.clear();
        imp.doc.replace_with_contents(link);
        return;
    }

    let self_id = el.attr("Self").unwrap_or_default();
    let source = imp.source;
    let found = imp
        .ctx
        .find(source, &|e| e.name == "Hyperlink" && e.attr("Source") == Some(self_id))
        .map(|f| f.element.clone());
    match found {
        Some(hyperlink) => {
            let href = hyperlink_href(&mut imp.ctx, source, &hyperlink).unwrap_or_else(|| format!("#{}", id));
            imp.doc.set_attr(link, "href", href);
        }
        None => {
            imp.warn(
                DiagnosticKind::UnresolvedReference,
                format!("no Hyperlink for {} {:?}", el.name, self_id),
            );
            imp.doc.replace_with_contents(link);
        }
    }
}

fn text_variable(imp: &mut Importer, el: &Element, parent: &mut NodeId) {
    let associated = el.attr("AssociatedTextVariable").unwrap_or_default();
    let variable = imp
        .ctx
        .find(imp.source, &|e| e.name == "TextVariable" && e.attr("Self") == Some(associated))
        .map(|f| {
            let format = f
                .element
                .child("DateVariablePreference")
                .and_then(|d| d.attr("Format"))
                .map(str::to_string);
            (f.element.attr("VariableType").map(str::to_string), format)
        });
    let result = el.attr("ResultText").unwrap_or_default().to_string();

    let node = match variable {
        Some((Some(kind), _)) if kind == "XrefPageNumberType" => imp.append_new(*parent, Tag::Cref, Vec::new()),
        Some((Some(kind), format)) if kind == "ModificationDateType" => {
            let attrs = format.map(|f| vec![("idformat".to_string(), f)]).unwrap_or_default();
            imp.append_new(*parent, Tag::Modified, attrs)
        }
        _ => imp.append_new(*parent, Tag::TextVariable, el.attrs.clone()),
    };
    imp.doc.node_mut(node).text = result;
}

// ============================================================================
// Escape hatches and embedded objects
// ============================================================================

/// Index carrier payload: `{{xe}}{...}{{/xe}}` or `{{index}}{...}{{/index}}`
fn index_carrier(text: &str) -> Option<(Tag, &str)> {
    for (name, tag) in [("xe", Tag::Xe), ("index", Tag::Index)] {
        let open = format!("{{{{{}}}}}", name);
        let close = format!("{{{{/{}}}}}", name);
        if let Some(body) = text.strip_prefix(open.as_str()).and_then(|t| t.strip_suffix(close.as_str())) {
            return Some((tag, body));
        }
    }
    None
}

fn note(imp: &mut Importer, el: &Element, parent: &mut NodeId) {
    let mut text = String::new();
    el.walk(&mut |e| {
        if e.name == "Content" {
            text.push_str(&e.text());
        }
    });
    let text = text.trim();

    if text.starts_with('<') && text.ends_with('>') {
        match imp.doc.parse_fragment(text) {
            Ok(nodes) => {
                for node in nodes {
                    imp.doc.append(*parent, node);
                }
            }
            Err(e) => imp.warn(
                DiagnosticKind::MalformedMarkup,
                format!("note markup could not be read: {}", e),
            ),
        }
        return;
    }

    if let Some((tag, body)) = index_carrier(text) {
        match serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(body) {
            Ok(map) => {
                let attrs = map
                    .into_iter()
                    .map(|(k, v)| match v {
                        serde_json::Value::String(s) => (k, s),
                        other => (k, other.to_string()),
                    })
                    .collect();
                imp.append_new(*parent, tag, attrs);
            }
            Err(e) => imp.warn(
                DiagnosticKind::MalformedMarkup,
                format!("index entry is not a JSON object: {}", e),
            ),
        }
    }
}

fn pass_through(imp: &mut Importer, el: &Element, parent: &mut NodeId) {
    imp.convert_children(el, *parent);
}

fn rectangle(imp: &mut Importer, el: &Element, parent: &mut NodeId) {
    let previous = imp.object_style.take();
    imp.object_style = el
        .attr("AppliedObjectStyle")
        .map(|s| s.rsplit('/').next().unwrap_or(s).to_string())
        .or_else(|| previous.clone());
    imp.convert_children(el, *parent);
    imp.object_style = previous;
}

/// Image source from the link resource URI
fn graphic_src(el: &Element) -> Option<String> {
    let uri = el.child("Link")?.attr("LinkResourceURI")?;
    let src = match uri.strip_prefix("file:") {
        Some(path) => percent_decode(path.trim_start_matches("//")),
        None => uri.to_string(),
    };
    Some(src)
}

/// Display width in points from the graphic bounds and transform or PPI
fn graphic_width(el: &Element) -> Option<f64> {
    let bounds = el.find_path("Properties/GraphicBounds")?;
    let coord = |name: &str| bounds.attr(name).and_then(|v| v.parse::<f64>().ok());
    let size_x = coord("Right")? - coord("Left")?;

    let transform: Vec<f64> = el
        .attr("ItemTransform")
        .unwrap_or_default()
        .split_whitespace()
        .filter_map(|v| v.parse().ok())
        .collect();
    if transform.len() == 6 && transform[1] == 0.0 && transform[2] == 0.0 {
        return Some(size_x * transform[0]);
    }

    let ppi = |name: &str| -> Option<f64> { el.attr(name)?.split_whitespace().next()?.parse().ok() };
    let (actual, effective) = (ppi("ActualPpi")?, ppi("EffectivePpi")?);
    (effective != 0.0).then(|| size_x * actual / effective)
}

fn graphic(imp: &mut Importer, el: &Element, parent: &mut NodeId) {
    let mut attrs = Vec::new();
    if let Some(src) = graphic_src(el) {
        attrs.push(("src".to_string(), src));
    }
    if let Some(class) = imp.object_style.clone() {
        attrs.push(("class".to_string(), class));
    }
    if let Some(width) = graphic_width(el) {
        attrs.push(("style".to_string(), format!("width:{:.2}pt;", width)));
    }
    tracing::debug!(?attrs, "img");
    imp.append_new(*parent, Tag::Img, attrs);
}

fn xml_element(imp: &mut Importer, el: &Element, parent: &mut NodeId) {
    let markup = el.attr("MarkupTag").unwrap_or("XMLTag/div");
    let tag = percent_decode(markup.rsplit('/').next().unwrap_or(markup));
    let local = tag.rsplit(':').next().unwrap_or(&tag);

    let attrs: Vec<(String, String)> = el
        .elements()
        .filter(|e| e.name == "XMLAttribute")
        .filter_map(|a| {
            let name = percent_decode(a.attr("Name")?);
            if name.starts_with("xmlns") {
                return None;
            }
            let name = name.rsplit(':').next().unwrap_or(&name).to_string();
            Some((name, a.attr("Value").unwrap_or_default().to_string()))
        })
        .collect();
    let node = imp.append_new(*parent, Tag::from_name(local), attrs);
    imp.convert_children(el, node);
}

fn text_frame(imp: &mut Importer, el: &Element, parent: &mut NodeId) {
    let class = el
        .attr("AppliedObjectStyle")
        .map(|s| s.rsplit('/').next().unwrap_or(s).to_string())
        .unwrap_or_default();
    let div = imp.append_new(*parent, Tag::Div, vec![("class".to_string(), class)]);
    let story = el.attr("ParentStory").unwrap_or_default().to_string();
    imp.append_new(div, Tag::Include, vec![("idref".to_string(), story)]);
}

fn change(imp: &mut Importer, el: &Element, parent: &mut NodeId) {
    match el.attr("ChangeType") {
        Some("InsertedText") | Some("MovedText") => imp.convert_children(el, *parent),
        Some("DeletedText") => {}
        other => imp.warn(
            DiagnosticKind::UnknownValue,
            format!("invalid ChangeType {:?}", other),
        ),
    }
}

fn omit(_imp: &mut Importer, _el: &Element, _parent: &mut NodeId) {}

/// Catch-all: copy the element with its attributes and text
fn copy_element(imp: &mut Importer, el: &Element, parent: &mut NodeId) {
    let node = imp.append_new(*parent, Tag::from_name(&el.name), el.attrs.clone());
    for child in &el.children {
        match child {
            Content::Element(e) => imp.convert(e, node),
            Content::Text(t) => imp.doc.append_text(node, t),
            Content::Instruction(_) => {}
        }
    }
}

/// Import an interchange root with default options and no auxiliary documents
pub fn import_element(root: &Element, document_name: &str) -> (Document, Diagnostics) {
    let mut diags = Diagnostics::new();
    let styles = StyleRegistry::from_root(root, &mut diags);
    let options = ConvertOptions::default().with_document_name(document_name);
    let ctx = ResolutionContext::new(document_name);
    let (doc, more) = Importer::new(root, &styles, &options, ctx).import();
    diags.extend(more);
    (doc, diags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::IcmlDocument;

    fn story(body: &str) -> Element {
        let xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Document DOMVersion="8.0" Self="d"><Story Self="u1">{}</Story></Document>"#,
            body
        );
        IcmlDocument::parse(&xml).unwrap().root
    }

    fn tags(doc: &Document, tag: Tag) -> Vec<NodeId> {
        doc.select(|n| n.tag == tag)
    }

    #[test]
    fn test_forced_break_splits_paragraph() {
        let root = story(
            r#"<ParagraphStyleRange AppliedParagraphStyle="ParagraphStyle/Body">
<CharacterStyleRange AppliedCharacterStyle="CharacterStyle/$ID/[No character style]"><Content>First</Content><Br/><Content>Second</Content></CharacterStyleRange>
</ParagraphStyleRange>"#,
        );
        let (doc, _) = import_element(&root, "ch01");
        let paras = tags(&doc, Tag::P);
        assert_eq!(paras.len(), 2);
        assert_eq!(doc.text_content(paras[0]), "First");
        assert_eq!(doc.text_content(paras[1]), "Second");
        assert!(tags(&doc, Tag::PBreak).is_empty());
        assert_eq!(doc.attr(paras[1], "class"), Some("Body"));
    }

    #[test]
    fn test_story_section_and_title() {
        let root = story(
            r#"<ParagraphStyleRange AppliedParagraphStyle="ParagraphStyle/ChapterTitle"><CharacterStyleRange AppliedCharacterStyle="CharacterStyle/$ID/[No character style]"><Content>The   Start</Content><Br/></CharacterStyleRange></ParagraphStyleRange>"#,
        );
        let (doc, _) = import_element(&root, "ch01");
        let section = tags(&doc, Tag::Section)[0];
        assert_eq!(doc.attr(section, "id"), Some("ch01_u1"));
        assert_eq!(doc.attr(section, "title"), Some("The Start"));
        assert_eq!(doc.attr(section, "class"), Some("Story"));
    }

    #[test]
    fn test_character_range_attributes() {
        let root = story(
            r#"<ParagraphStyleRange AppliedParagraphStyle="ParagraphStyle/Body"><CharacterStyleRange AppliedCharacterStyle="CharacterStyle/Emphasis" FontStyle="Italic" AppliedLanguage="$ID/French" AppliedConditions="Condition/Print"><Content>mot</Content></CharacterStyleRange></ParagraphStyleRange>"#,
        );
        let (doc, _) = import_element(&root, "ch01");
        let span = tags(&doc, Tag::Span)[0];
        assert_eq!(doc.attr(span, "class"), Some("Emphasis"));
        assert_eq!(doc.attr(span, "lang"), Some("fr"));
        assert_eq!(doc.attr(span, "cond"), Some("Print"));
        assert!(doc.attr(span, "style").unwrap().contains("font-style: italic"));
    }

    #[test]
    fn test_tabs_and_instructions() {
        let root = story(
            r#"<ParagraphStyleRange AppliedParagraphStyle="ParagraphStyle/Body"><CharacterStyleRange AppliedCharacterStyle="CharacterStyle/$ID/[No character style]"><Content>a	b<?ACE 8?>c<?ACE 7?>d</Content></CharacterStyleRange></ParagraphStyleRange>"#,
        );
        let (doc, _) = import_element(&root, "ch01");
        let tabs = tags(&doc, Tag::Tab);
        assert_eq!(tabs.len(), 2);
        assert_eq!(doc.attr(tabs[1], "align"), Some("right"));
        assert_eq!(doc.text_content(tags(&doc, Tag::P)[0]), "abcd");
    }

    #[test]
    fn test_footnotes_numbered_by_first_occurrence() {
        let root = story(
            r#"<ParagraphStyleRange AppliedParagraphStyle="ParagraphStyle/Body"><CharacterStyleRange AppliedCharacterStyle="CharacterStyle/$ID/[No character style]"><Content>x</Content>
<Footnote Self="u900"><ParagraphStyleRange AppliedParagraphStyle="ParagraphStyle/Note"><CharacterStyleRange AppliedCharacterStyle="CharacterStyle/$ID/[No character style]"><Content><?ACE 4?> one</Content></CharacterStyleRange></ParagraphStyleRange></Footnote>
<Content>y</Content>
<Footnote Self="u100"><ParagraphStyleRange AppliedParagraphStyle="ParagraphStyle/Note"><CharacterStyleRange AppliedCharacterStyle="CharacterStyle/$ID/[No character style]"><Content>two</Content></CharacterStyleRange></ParagraphStyleRange></Footnote>
</CharacterStyleRange></ParagraphStyleRange>"#,
        );
        let (doc, _) = import_element(&root, "ch01");
        let notes = tags(&doc, Tag::Footnote);
        assert_eq!(doc.attr(notes[0], "id"), Some("fn1"));
        assert_eq!(doc.attr(notes[1], "id"), Some("fn2"));
        assert_eq!(tags(&doc, Tag::FootnoteRef).len(), 1);
    }

    #[test]
    fn test_missing_style_uses_sentinel() {
        let root = IcmlDocument::parse(
            r#"<Document><RootParagraphStyleGroup><ParagraphStyle Self="ParagraphStyle/Body" Name="Body"/></RootParagraphStyleGroup>
<Story Self="u1"><ParagraphStyleRange AppliedParagraphStyle="ParagraphStyle/Ghost"><CharacterStyleRange AppliedCharacterStyle="CharacterStyle/$ID/[No character style]"><Content>boo</Content></CharacterStyleRange></ParagraphStyleRange></Story></Document>"#,
        )
        .unwrap()
        .root;
        let (doc, diags) = import_element(&root, "ch01");
        assert_eq!(doc.attr(tags(&doc, Tag::P)[0], "class"), Some(NO_PARAGRAPH_STYLE));
        assert!(diags.has(DiagnosticKind::UnresolvedStyle));
    }

    #[test]
    fn test_table_reading_order() {
        let root = story(
            r#"<ParagraphStyleRange AppliedParagraphStyle="ParagraphStyle/$ID/[No paragraph style]"><CharacterStyleRange AppliedCharacterStyle="CharacterStyle/$ID/[No character style]">
<Table Self="t1" BodyRowCount="2" ColumnCount="2"><Row Name="0"/><Row Name="1"/><Column Name="0"/><Column Name="1"/>
<Cell Name="0:0"><Content>A</Content></Cell><Cell Name="0:1"><Content>C</Content></Cell>
<Cell Name="1:0"><Content>B</Content></Cell><Cell Name="1:1"><Content>D</Content></Cell>
</Table></CharacterStyleRange></ParagraphStyleRange>"#,
        );
        let (doc, diags) = import_element(&root, "ch01");
        let table = tags(&doc, Tag::Table)[0];
        assert_eq!(doc.attr(table, "data-cols"), Some("2"));
        assert_eq!(doc.attr(table, "data-rows"), Some("2"));
        let cells: Vec<String> = tags(&doc, Tag::Td).into_iter().map(|td| doc.text_content(td)).collect();
        assert_eq!(cells, vec!["A", "B", "C", "D"]);
        assert!(!diags.has(DiagnosticKind::TableGeometry));
        assert!(doc.find_ancestor(table, |n| n.tag == Tag::P).is_none());
    }

    #[test]
    fn test_table_with_bad_cell_names_is_packed() {
        for names in [
            ["0:18446744073709551615", "1:0"],
            ["0:4000000000", "1:0"],
            ["5:0", "1:0"],
            ["0:0", "0:0"],
        ] {
            let root = story(&format!(
                r#"<ParagraphStyleRange AppliedParagraphStyle="ParagraphStyle/$ID/[No paragraph style]"><CharacterStyleRange AppliedCharacterStyle="CharacterStyle/$ID/[No character style]">
<Table Self="t1" ColumnCount="2"><Cell Name="{}"><Content>A</Content></Cell><Cell Name="{}"><Content>B</Content></Cell></Table>
</CharacterStyleRange></ParagraphStyleRange>"#,
                names[0], names[1]
            ));
            let (doc, diags) = import_element(&root, "ch01");
            let table = tags(&doc, Tag::Table)[0];
            assert_eq!(doc.attr(table, "data-rows"), Some("1"), "{:?}", names);
            let cells: Vec<String> = tags(&doc, Tag::Td).into_iter().map(|td| doc.text_content(td)).collect();
            assert_eq!(cells, vec!["A", "B"]);
            assert!(diags.has(DiagnosticKind::TableGeometry));
        }
    }

    #[test]
    fn test_hyperlink_resolved_and_missing() {
        let root = IcmlDocument::parse(
            r#"<Document><Story Self="u1"><ParagraphStyleRange AppliedParagraphStyle="ParagraphStyle/Body"><CharacterStyleRange AppliedCharacterStyle="CharacterStyle/$ID/[No character style]">
<HyperlinkTextDestination Self="HyperlinkTextDestination/top" Name="top"/><Content>Start </Content>
<HyperlinkTextSource Self="src1"><Content>go up</Content></HyperlinkTextSource>
<HyperlinkTextSource Self="src2"><Content>orphan</Content></HyperlinkTextSource>
</CharacterStyleRange></ParagraphStyleRange></Story>
<Hyperlink Self="h1" Source="src1"><Properties><Destination type="object">HyperlinkTextDestination/top</Destination></Properties></Hyperlink>
</Document>"#,
        )
        .unwrap()
        .root;
        let (doc, diags) = import_element(&root, "ch01");
        let links = tags(&doc, Tag::Hyperlink);
        assert_eq!(links.len(), 1);
        assert_eq!(doc.attr(links[0], "href"), Some("ch01.xml#ch01_top"));
        assert!(diags.has(DiagnosticKind::UnresolvedReference));
        assert!(doc.text_content(doc.root()).contains("orphan"));
        let anchor = tags(&doc, Tag::Anchor)[0];
        assert_eq!(doc.attr(anchor, "id"), Some("ch01_top"));
    }

    #[test]
    fn test_note_escape_hatches() {
        let root = story(
            r#"<ParagraphStyleRange AppliedParagraphStyle="ParagraphStyle/Body"><CharacterStyleRange AppliedCharacterStyle="CharacterStyle/$ID/[No character style]"><Content>see</Content>
<Note><ParagraphStyleRange><CharacterStyleRange><Content>{{xe}}{"term": "codec", "level": 1}{{/xe}}</Content></CharacterStyleRange></ParagraphStyleRange></Note>
<Note><ParagraphStyleRange><CharacterStyleRange><Content>&lt;img src="fig.png"/&gt;</Content></CharacterStyleRange></ParagraphStyleRange></Note>
<Note><ParagraphStyleRange><CharacterStyleRange><Content>&lt;broken</Content></CharacterStyleRange></ParagraphStyleRange></Note>
</CharacterStyleRange></ParagraphStyleRange>"#,
        );
        let (doc, _) = import_element(&root, "ch01");
        let xe = tags(&doc, Tag::Xe)[0];
        assert_eq!(doc.attr(xe, "term"), Some("codec"));
        assert_eq!(doc.attr(xe, "level"), Some("1"));
        assert_eq!(doc.attr(tags(&doc, Tag::Img)[0], "src"), Some("fig.png"));
    }

    #[test]
    fn test_text_frame_becomes_include() {
        let root = story(
            r#"<ParagraphStyleRange AppliedParagraphStyle="ParagraphStyle/Body"><CharacterStyleRange AppliedCharacterStyle="CharacterStyle/$ID/[No character style]"><TextFrame Self="tf" ParentStory="u77" AppliedObjectStyle="ObjectStyle/Sidebar"/></CharacterStyleRange></ParagraphStyleRange>"#,
        );
        let (doc, _) = import_element(&root, "ch01");
        let include = tags(&doc, Tag::Include)[0];
        assert_eq!(doc.attr(include, "idref"), Some("u77"));
        assert!(doc.find_ancestor(include, |n| n.tag == Tag::P).is_none());
    }

    #[test]
    fn test_change_tracking() {
        let root = story(
            r#"<ParagraphStyleRange AppliedParagraphStyle="ParagraphStyle/Body"><CharacterStyleRange AppliedCharacterStyle="CharacterStyle/$ID/[No character style]"><Change ChangeType="InsertedText"><Content>kept </Content></Change><Change ChangeType="DeletedText"><Content>gone</Content></Change></CharacterStyleRange></ParagraphStyleRange>"#,
        );
        let (doc, _) = import_element(&root, "ch01");
        assert_eq!(doc.text_content(tags(&doc, Tag::P)[0]), "kept ");
    }
}
