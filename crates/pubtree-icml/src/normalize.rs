//! Post-import normalization
//!
//! The raw import mirrors the interchange nesting, which is not valid
//! canonical structure: paragraph-break and section-start markers are still
//! in place, hyperlinks straddle paragraphs, anchors sit inside links. The
//! passes below run in a fixed order; each one assumes the invariants
//! established by the ones before it, and re-running the whole list on its
//! own output changes nothing.

use std::collections::HashMap;

use pubtree_ast::{Document, NodeId, Tag};

use crate::config::ConvertOptions;
use crate::diagnostic::{DiagnosticKind, Diagnostics};

/// A normalization pass
pub type Pass = fn(&mut Document, &ConvertOptions, &mut Diagnostics);

/// Normalization passes in execution order
pub const PASSES: &[(&str, Pass)] = &[
    ("paragraph_breaks", paragraph_breaks),
    ("hyperlinks_out_of_spans", hyperlinks_out_of_spans),
    ("split_sections", split_sections),
    ("line_breaks", line_breaks),
    ("notes", notes),
    ("hyperlinks_into_paragraphs", hyperlinks_into_paragraphs),
    ("nested_paragraphs", nested_paragraphs),
    ("shift_anchors", shift_anchors),
    ("anchors_out_of_hyperlinks", anchors_out_of_hyperlinks),
    ("anchors_into_paragraphs", anchors_into_paragraphs),
    ("endnote_references", endnote_references),
    ("finalize", finalize),
];

/// Run every pass in order
pub fn normalize(doc: &mut Document, options: &ConvertOptions, diags: &mut Diagnostics) {
    for (name, pass) in PASSES {
        tracing::trace!(pass = name, "normalize");
        pass(doc, options, diags);
    }
}

fn tagged(doc: &Document, tag: Tag) -> Vec<NodeId> {
    doc.select(|n| n.tag == tag)
}

fn is_p(tag: &Tag) -> bool {
    tag == &Tag::P
}

// ============================================================================
// Structure
// ============================================================================

/// Split paragraphs at each paragraph-break marker
pub fn paragraph_breaks(doc: &mut Document, _options: &ConvertOptions, _diags: &mut Diagnostics) {
    for brk in tagged(doc, Tag::PBreak) {
        if let Some(p) = doc.find_ancestor(brk, |n| n.tag == Tag::P) {
            while doc.parent(brk) != Some(p) {
                if !doc.unnest(brk) {
                    break;
                }
            }
            doc.unnest(brk);
        }
        doc.remove(brk, true);
    }
}

/// Lift hyperlinks out of character spans, splitting the span around them
///
/// Innermost spans go first, so a link lifted out of a nested span is
/// lifted again by its enclosing span.
pub fn hyperlinks_out_of_spans(doc: &mut Document, _options: &ConvertOptions, _diags: &mut Diagnostics) {
    for span in tagged(doc, Tag::Span).into_iter().rev() {
        if doc.parent(span).is_none() {
            continue;
        }
        if doc.children(span).iter().any(|&c| doc.tag(c) == &Tag::Hyperlink) {
            doc.fragment_nesting(span, |t| t == &Tag::Hyperlink);
        }
    }
}

/// Turn each section-start marker into a section holding the siblings that
/// follow it, up to the next marker
pub fn split_sections(doc: &mut Document, _options: &ConvertOptions, _diags: &mut Diagnostics) {
    for marker in tagged(doc, Tag::SectionStart) {
        doc.node_mut(marker).tag = Tag::Section;
        let tail = std::mem::take(&mut doc.node_mut(marker).tail);
        doc.node_mut(marker).text = if tail.trim().is_empty() { "\n".to_string() } else { tail };
        while let Some(next) = doc.next_sibling(marker) {
            if doc.tag(next) == &Tag::SectionStart {
                break;
            }
            doc.detach(next);
            doc.append(marker, next);
        }
    }
}

/// Soft line breaks become `br`, zero-width spaces are dropped, and spans
/// without attributes or content are unwrapped
pub fn line_breaks(doc: &mut Document, _options: &ConvertOptions, _diags: &mut Diagnostics) {
    for id in doc.preorder() {
        if doc.node(id).text.contains('\u{200b}') {
            let text = doc.node(id).text.replace('\u{200b}', "");
            doc.node_mut(id).text = text;
        }
        if doc.node(id).tail.contains('\u{200b}') {
            let tail = doc.node(id).tail.replace('\u{200b}', "");
            doc.node_mut(id).tail = tail;
        }

        if doc.node(id).text.contains('\u{2028}') {
            let text = std::mem::take(&mut doc.node_mut(id).text);
            let mut parts = text.split('\u{2028}');
            doc.node_mut(id).text = parts.next().unwrap_or_default().to_string();
            for (i, part) in parts.enumerate() {
                let br = doc.create(Tag::Br);
                doc.node_mut(br).tail = part.to_string();
                doc.insert(id, i, br);
            }
        }
        if doc.node(id).tail.contains('\u{2028}') {
            let tail = std::mem::take(&mut doc.node_mut(id).tail);
            let mut parts = tail.split('\u{2028}');
            doc.node_mut(id).tail = parts.next().unwrap_or_default().to_string();
            let mut after = id;
            for part in parts {
                let br = doc.create(Tag::Br);
                doc.node_mut(br).tail = part.to_string();
                doc.insert_after(after, br);
                after = br;
            }
        }
    }
    unwrap_empty_spans(doc);
}

fn unwrap_empty_spans(doc: &mut Document) {
    for span in tagged(doc, Tag::Span) {
        if doc.node(span).attrs.is_empty() || doc.is_empty(span, true) {
            doc.replace_with_contents(span);
        }
    }
}

/// Consume the siblings after a start marker into a note element
fn close_markers(doc: &mut Document, start: Tag, note: Tag, diags: &mut Diagnostics) {
    for marker in tagged(doc, start.clone()) {
        doc.node_mut(marker).tag = note.clone();
        let tail = std::mem::take(&mut doc.node_mut(marker).tail);
        doc.append_text(marker, &tail);
        let mut closed = false;
        while let Some(next) = doc.next_sibling(marker) {
            if doc.tag(next) == &start {
                closed = true;
                break;
            }
            doc.detach(next);
            doc.append(marker, next);
        }
        if !closed {
            diags.info(
                DiagnosticKind::UnclosedMarker,
                format!("{} closed at the end of its container", start.name()),
            );
        }
    }
}

/// Note start markers become notes; preview output strips endnotes
pub fn notes(doc: &mut Document, options: &ConvertOptions, diags: &mut Diagnostics) {
    close_markers(doc, Tag::FootnoteStart, Tag::Footnote, diags);
    close_markers(doc, Tag::EndnoteStart, Tag::Endnote, diags);
    if options.strip_notes {
        for id in doc.select(|n| matches!(n.tag, Tag::Endnote | Tag::InsertEndnotes)) {
            doc.replace_with_contents(id);
        }
    }
}

/// Hyperlinks that span paragraphs are pushed inside each paragraph
pub fn hyperlinks_into_paragraphs(doc: &mut Document, _options: &ConvertOptions, _diags: &mut Diagnostics) {
    let mut pending = tagged(doc, Tag::Hyperlink);
    while let Some(link) = pending.pop() {
        if doc.parent(link).is_none() {
            continue;
        }
        let targets: Vec<NodeId> = doc
            .children(link)
            .iter()
            .copied()
            .filter(|&c| is_p(doc.tag(c)))
            .collect();
        if targets.is_empty() {
            continue;
        }
        doc.interior_nesting(link, is_p);
        // each paragraph now ends with its own copy of the link
        for target in targets {
            if let Some(&copy) = doc.children(target).last() {
                if doc.tag(copy) == &Tag::Hyperlink {
                    pending.push(copy);
                }
            }
        }
    }
}

/// Paragraphs directly inside paragraphs are lifted out
pub fn nested_paragraphs(doc: &mut Document, _options: &ConvertOptions, _diags: &mut Diagnostics) {
    for p in tagged(doc, Tag::P) {
        while doc.parent(p).is_some_and(|parent| is_p(doc.tag(parent))) {
            if !doc.unnest(p) {
                break;
            }
        }
    }
}

// ============================================================================
// Anchors
// ============================================================================

fn is_bare_paragraph(doc: &Document, p: NodeId) -> bool {
    doc.children(p).is_empty() && doc.node(p).text.is_empty()
}

/// Anchors at paragraph edges move to the paragraph they belong with:
/// leading end-anchors to the end of the previous paragraph, trailing
/// anchors to the start of the next one
pub fn shift_anchors(doc: &mut Document, _options: &ConvertOptions, _diags: &mut Diagnostics) {
    // paragraphs are no longer nested here, and moving anchors between them
    // leaves their order intact
    let paras = tagged(doc, Tag::P);
    for (i, &p) in paras.iter().enumerate() {
        while doc.node(p).text.is_empty() {
            let Some(&first) = doc.children(p).first() else {
                break;
            };
            if !matches!(doc.tag(first), Tag::Anchor | Tag::AnchorEnd) {
                break;
            }
            let mut cursor = Some(first);
            while let Some(a) = cursor {
                if doc.tag(a) == &Tag::Anchor && doc.node(a).tail.is_empty() {
                    cursor = doc.next_sibling(a);
                } else {
                    break;
                }
            }
            let Some(end) = cursor.filter(|&a| doc.tag(a) == &Tag::AnchorEnd) else {
                break;
            };
            let Some(mut j) = i.checked_sub(1) else {
                break;
            };
            while j > 0 && is_bare_paragraph(doc, paras[j]) {
                j -= 1;
            }
            let prev = paras[j];
            doc.remove(end, true);
            doc.append(prev, end);
        }

        loop {
            let Some(&last) = doc.children(p).last() else {
                break;
            };
            if doc.tag(last) != &Tag::Anchor || !doc.node(last).tail.is_empty() {
                break;
            }
            let Some(&next) = paras.get(i + 1) else {
                break;
            };
            doc.remove(last, true);
            doc.insert(next, 0, last);
            let text = std::mem::take(&mut doc.node_mut(next).text);
            doc.node_mut(last).tail = text;
        }
    }
}

/// No anchor may sit inside a hyperlink: start anchors go before the
/// outermost link, end anchors right after it
pub fn anchors_out_of_hyperlinks(doc: &mut Document, _options: &ConvertOptions, _diags: &mut Diagnostics) {
    for anchor in doc.select(|n| matches!(n.tag, Tag::Anchor | Tag::AnchorEnd)) {
        let Some(link) = doc.find_outermost_ancestor(anchor, |n| n.tag == Tag::Hyperlink) else {
            continue;
        };
        doc.remove(anchor, true);
        if doc.tag(anchor) == &Tag::AnchorEnd {
            let tail = std::mem::take(&mut doc.node_mut(link).tail);
            doc.insert_after(link, anchor);
            doc.node_mut(anchor).tail = tail;
        } else {
            doc.insert_before(link, anchor);
        }
    }
}

/// Anchors outside any paragraph join the nearest paragraph
pub fn anchors_into_paragraphs(doc: &mut Document, _options: &ConvertOptions, _diags: &mut Diagnostics) {
    let order = doc.preorder();
    let position: HashMap<NodeId, usize> = order.iter().enumerate().map(|(i, &n)| (n, i)).collect();
    let paras: Vec<usize> = (0..order.len()).filter(|&i| is_p(doc.tag(order[i]))).collect();
    let anchors: Vec<NodeId> = order
        .iter()
        .copied()
        .filter(|&n| matches!(doc.tag(n), Tag::Anchor | Tag::AnchorEnd))
        .collect();

    for anchor in anchors {
        if doc.has_ancestor(anchor, |n| n.tag == Tag::P) {
            continue;
        }
        let Some(&at) = position.get(&anchor) else {
            continue;
        };
        let split = paras.partition_point(|&i| i < at);
        if doc.tag(anchor) == &Tag::AnchorEnd {
            if let Some(&i) = split.checked_sub(1).and_then(|k| paras.get(k)) {
                let prev = order[i];
                doc.remove(anchor, true);
                doc.append(prev, anchor);
            }
        } else if let Some(next) = paras.get(split).map(|&i| order[i]) {
            doc.remove(anchor, true);
            doc.insert(next, 0, anchor);
            let text = std::mem::take(&mut doc.node_mut(next).text);
            doc.node_mut(anchor).tail = text;
        }
    }
}

/// Endnote reference links get the reference character style
pub fn endnote_references(doc: &mut Document, _options: &ConvertOptions, _diags: &mut Diagnostics) {
    for link in tagged(doc, Tag::Hyperlink) {
        let is_ref = ["anchor", "href", "id"]
            .iter()
            .any(|a| doc.attr(link, a).is_some_and(|v| v.contains("endnote_ref_")));
        if !is_ref
            || doc.is_empty(link, true)
            || doc.has_ancestor(link, |n| n.tag == Tag::Span)
            || doc.children(link).iter().any(|&c| doc.tag(c) == &Tag::Span)
        {
            continue;
        }
        let span = doc.create_with(Tag::Span, [("class", "Endnote-Reference")]);
        doc.node_mut(span).text = std::mem::take(&mut doc.node_mut(link).text);
        for child in doc.children(link).to_vec() {
            doc.append(span, child);
        }
        doc.insert(link, 0, span);
    }
}

// ============================================================================
// Finalize
// ============================================================================

/// Clean-up: empty paragraphs, lists, container sections, blocks nested in
/// paragraphs, and block tails
pub fn finalize(doc: &mut Document, options: &ConvertOptions, _diags: &mut Diagnostics) {
    unwrap_empty_spans(doc);

    if !options.preserve_paragraphs {
        for p in tagged(doc, Tag::P) {
            if doc.children(p).is_empty() && doc.node(p).text.trim().is_empty() {
                doc.remove(p, false);
            }
        }
    }

    if options.convert_lists {
        convert_lists(doc);
    } else {
        for p in doc.select(|n| n.attrs.contains_key("data-list-type")) {
            doc.remove_attr(p, "data-list-type");
        }
    }

    remove_container_sections(doc);

    for div in tagged(doc, Tag::Div) {
        while doc.has_ancestor(div, |n| n.tag == Tag::P) {
            if !doc.unnest(div) {
                break;
            }
        }
    }

    for table in tagged(doc, Tag::Table) {
        while doc.parent(table).is_some_and(|p| is_p(doc.tag(p))) {
            if !doc.unnest(table) {
                break;
            }
        }
    }

    for section in tagged(doc, Tag::Section) {
        let children = doc.children(section);
        if children.len() == 1 && doc.tag(children[0]) == &Tag::Include {
            doc.replace_with_contents(section);
        }
    }

    for include in tagged(doc, Tag::Include) {
        while doc.has_ancestor(include, |n| n.tag == Tag::P) {
            if !doc.unnest(include) {
                break;
            }
        }
    }

    if !options.preserve_paragraphs {
        for p in doc.select(|n| n.tag.is_paragraph()) {
            if !doc.has_ancestor(p, |n| n.tag == Tag::Table) && doc.is_empty(p, true) {
                doc.remove(p, true);
            }
        }
    }

    for id in doc.select(|n| n.tag.is_paragraph() || matches!(n.tag, Tag::Table | Tag::Div | Tag::Section)) {
        doc.node_mut(id).tail = "\n".to_string();
    }
}

/// Top-level sections holding only sections are dissolved, repeatedly
fn remove_container_sections(doc: &mut Document) {
    let Some(body) = doc.body() else {
        return;
    };
    loop {
        let container = doc.children(body).iter().rev().copied().find(|&s| {
            doc.tag(s) == &Tag::Section
                && doc.node(s).text.trim().is_empty()
                && doc.children(s).iter().all(|&c| doc.tag(c) == &Tag::Section)
        });
        let Some(section) = container else {
            break;
        };
        doc.node_mut(section).text.clear();
        doc.replace_with_contents(section);
    }
}

/// Runs of paragraphs with a list type become `ul`/`ol` with `li` items
fn convert_lists(doc: &mut Document) {
    for p in doc.select(|n| n.tag == Tag::P && n.attrs.contains_key("data-list-type")) {
        let Some(list_type) = doc.remove_attr(p, "data-list-type") else {
            continue;
        };
        let list_tag = if list_type.contains("Numbered") { Tag::Ol } else { Tag::Ul };

        let prev = doc.prev_sibling(p).filter(|&s| doc.tag(s) == &list_tag);
        let list = match prev {
            Some(list) => list,
            None => {
                let list = doc.create(list_tag);
                doc.insert_before(p, list);
                list
            }
        };
        let tail = std::mem::take(&mut doc.node_mut(p).tail);
        let li = doc.create(Tag::Li);
        doc.detach(p);
        doc.append(li, p);
        doc.append(list, li);
        doc.node_mut(list).tail = tail;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(xml: &str) -> Document {
        let mut doc = Document::parse(xml).unwrap();
        let mut diags = Diagnostics::new();
        normalize(&mut doc, &ConvertOptions::default(), &mut diags);
        doc
    }

    fn single(doc: &Document, tag: Tag) -> NodeId {
        let found = doc.select(|n| n.tag == tag);
        assert_eq!(found.len(), 1, "expected one {:?}", tag);
        found[0]
    }

    #[test]
    fn test_paragraph_break_inside_span() {
        let doc = run(r#"<document><body><p class="Body"><span class="Em">a<p_break/>b</span></p></body></document>"#);
        let paras = doc.select(|n| n.tag == Tag::P);
        assert_eq!(paras.len(), 2);
        assert_eq!(doc.text_content(paras[0]), "a");
        assert_eq!(doc.text_content(paras[1]), "b");
        assert_eq!(doc.select(|n| n.tag == Tag::Span).len(), 2);
    }

    #[test]
    fn test_sections_split_at_markers() {
        let doc = run(
            r#"<document><body><section class="Story"><p>intro</p><section_start id="a" title="A"/><p>one</p><section_start id="b" title="B"/><p>two</p></section></body></document>"#,
        );
        let sections = doc.select(|n| n.tag == Tag::Section);
        assert_eq!(sections.len(), 3);
        let a = sections[1];
        assert_eq!(doc.attr(a, "id"), Some("a"));
        assert_eq!(doc.text_content(a).trim(), "one");
    }

    #[test]
    fn test_container_sections_removed() {
        let doc = run(r#"<document><body><section class="Story"><section id="a"><p>x</p></section></section></body></document>"#);
        let section = single(&doc, Tag::Section);
        assert_eq!(doc.attr(section, "id"), Some("a"));
        assert_eq!(doc.parent(section), doc.body());
    }

    #[test]
    fn test_line_separator_becomes_br() {
        let doc = run("<document><body><p>one\u{2028}two\u{200b}</p></body></document>");
        let br = single(&doc, Tag::Br);
        assert_eq!(doc.node(br).tail, "two");
    }

    #[test]
    fn test_hyperlink_across_paragraphs() {
        let doc = run(r#"<document><body><p><hyperlink href="x.xml#a"><p>one</p><p>two</p></hyperlink></p></body></document>"#);
        let links = doc.select(|n| n.tag == Tag::Hyperlink);
        assert_eq!(links.len(), 2);
        for link in links {
            let p = doc.parent(link).unwrap();
            assert_eq!(doc.tag(p), &Tag::P);
            assert!(!doc.has_ancestor(p, |n| n.tag == Tag::P));
        }
    }

    #[test]
    fn test_anchor_leaves_hyperlink() {
        let doc = run(
            r#"<document><body><p>see <hyperlink href="a.xml#b"><anchor id="x"/>link<anchor_end id="x"/></hyperlink> now</p></body></document>"#,
        );
        for anchor in doc.select(|n| matches!(n.tag, Tag::Anchor | Tag::AnchorEnd)) {
            assert!(!doc.has_ancestor(anchor, |n| n.tag == Tag::Hyperlink));
        }
        let end = single(&doc, Tag::AnchorEnd);
        assert_eq!(doc.node(end).tail, " now");
        assert_eq!(doc.text_content(single(&doc, Tag::P)), "see link now");
    }

    #[test]
    fn test_anchor_outside_paragraph_moves_in() {
        let doc = run(r#"<document><body><section><anchor id="top"/><p>first</p></section></body></document>"#);
        let anchor = single(&doc, Tag::Anchor);
        let p = doc.parent(anchor).unwrap();
        assert_eq!(doc.tag(p), &Tag::P);
        assert_eq!(doc.node(anchor).tail, "first");
        assert_eq!(doc.node(p).text, "");
    }

    #[test]
    fn test_trailing_anchor_shifts_to_next_paragraph() {
        let doc = run(r#"<document><body><p>one<anchor id="n"/></p><p>two</p></body></document>"#);
        let anchor = single(&doc, Tag::Anchor);
        let p = doc.parent(anchor).unwrap();
        assert_eq!(doc.text_content(p), "two");
    }

    #[test]
    fn test_hyperlink_lifted_out_of_nested_spans() {
        let doc = run(
            r#"<document><body><p><span class="A"><span class="B">x<hyperlink href="h">y</hyperlink>z</span></span></p></body></document>"#,
        );
        let link = single(&doc, Tag::Hyperlink);
        assert_eq!(doc.tag(doc.parent(link).unwrap()), &Tag::P);
        assert_eq!(doc.text_content(doc.parent(link).unwrap()), "xyz");
    }

    #[test]
    fn test_hyperlink_over_nested_paragraphs() {
        let doc = run(r#"<document><body><p><hyperlink href="a"><p>one<p>two</p></p></hyperlink></p></body></document>"#);
        let paras = doc.select(|n| n.tag == Tag::P);
        assert_eq!(paras.len(), 2);
        for p in paras {
            assert!(!doc.has_ancestor(p, |n| n.tag == Tag::P));
            assert!(!doc.has_ancestor(p, |n| n.tag == Tag::Hyperlink));
        }
        for link in doc.select(|n| n.tag == Tag::Hyperlink) {
            assert_eq!(doc.tag(doc.parent(link).unwrap()), &Tag::P);
        }
    }

    #[test]
    fn test_leading_end_anchor_skips_bare_paragraphs() {
        let doc = run(r#"<document><body><p>one</p><p/><p><anchor_end id="x"/>two</p></body></document>"#);
        let end = single(&doc, Tag::AnchorEnd);
        assert_eq!(doc.text_content(doc.parent(end).unwrap()), "one");
    }

    #[test]
    fn test_long_document_anchors_shift() {
        let mut xml = String::from("<document><body>");
        for i in 0..2000 {
            xml.push_str(&format!(r#"<p>para {i}<anchor id="a{i}"/></p>"#));
        }
        xml.push_str("<p>last</p></body></document>");
        let doc = run(&xml);
        let anchors = doc.select(|n| n.tag == Tag::Anchor);
        assert_eq!(anchors.len(), 2000);
        let first = doc.parent(anchors[0]).unwrap();
        assert_eq!(doc.text_content(first), "para 1");
        let last = doc.parent(anchors[1999]).unwrap();
        assert_eq!(doc.text_content(last), "last");
    }

    #[test]
    fn test_footnote_marker_consumes_siblings() {
        let mut doc = Document::parse(r#"<document><body><p>x<footnote_start/>note text<span class="Em">e</span></p></body></document>"#).unwrap();
        let mut diags = Diagnostics::new();
        normalize(&mut doc, &ConvertOptions::default(), &mut diags);
        let note = single(&doc, Tag::Footnote);
        assert_eq!(doc.text_content(note), "note texte");
        assert!(diags.has(DiagnosticKind::UnclosedMarker));
    }

    #[test]
    fn test_endnote_reference_wrapped() {
        let doc = run(r#"<document><body><p>t<hyperlink id="ch01_endnote_ref_1">a</hyperlink></p></body></document>"#);
        let span = single(&doc, Tag::Span);
        assert_eq!(doc.attr(span, "class"), Some("Endnote-Reference"));
        assert_eq!(doc.tag(doc.parent(span).unwrap()), &Tag::Hyperlink);
    }

    #[test]
    fn test_lists_converted_on_request() {
        let mut doc = Document::parse(
            r#"<document><body><p data-list-type="BulletList">a</p><p data-list-type="BulletList">b</p><p data-list-type="NumberedList">c</p></body></document>"#,
        )
        .unwrap();
        let options = ConvertOptions {
            convert_lists: true,
            ..ConvertOptions::default()
        };
        normalize(&mut doc, &options, &mut Diagnostics::new());
        let ul = single(&doc, Tag::Ul);
        assert_eq!(doc.children(ul).len(), 2);
        single(&doc, Tag::Ol);
        assert_eq!(doc.select(|n| n.tag == Tag::Li).len(), 3);
    }

    #[test]
    fn test_empty_paragraphs_removed_unless_preserved() {
        let xml = r#"<document><body><p>a</p><p> </p><p/></body></document>"#;
        assert_eq!(run(xml).select(|n| n.tag == Tag::P).len(), 1);

        let mut doc = Document::parse(xml).unwrap();
        let options = ConvertOptions {
            preserve_paragraphs: true,
            ..ConvertOptions::default()
        };
        normalize(&mut doc, &options, &mut Diagnostics::new());
        assert_eq!(doc.select(|n| n.tag == Tag::P).len(), 3);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let mut doc = run(
            r#"<document><body><section class="Story" id="s"><p class="Body"><span>a<p_break/>b</span><hyperlink href="x"><anchor id="k"/>c<p>d</p></hyperlink></p><section_start id="t" title="T"/><p>e<table><tr><td><p>f</p></td></tr></table>g</p></section></body></document>"#,
        );
        let once = doc.to_xml();
        normalize(&mut doc, &ConvertOptions::default(), &mut Diagnostics::new());
        assert_eq!(doc.to_xml(), once);
    }
}
