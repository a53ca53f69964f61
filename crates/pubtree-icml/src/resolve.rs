//! Element ids and hyperlink targets
//!
//! Hyperlink sources, destinations and bookmarks are flat top-level
//! elements tied together by `Self` ids and `DestinationUniqueKey`s.
//! [`hyperlink_href`] follows those references (locally first, then through
//! the auxiliary documents) and produces a canonical `file.xml#id` target.

use std::path::Path;

use sha2::{Digest, Sha256};

use crate::context::ResolutionContext;
use crate::diagnostic::DiagnosticKind;
use crate::tree::Element;

/// Replace each run of non-word characters with `_`; prefix `_` before a digit
pub fn identifier(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut pending = false;
    for c in s.chars() {
        if c.is_alphanumeric() || c == '_' {
            if pending {
                out.push('_');
                pending = false;
            }
            out.push(c);
        } else {
            pending = true;
        }
    }
    if pending {
        out.push('_');
    }
    if out.starts_with(|c: char| c.is_ascii_digit()) || out.is_empty() {
        out.insert(0, '_');
    }
    out
}

/// Identifier for the stem of a file name (`ch 01.icml` -> `ch_01`)
pub fn file_identifier(filename: &str) -> String {
    let stem = Path::new(filename)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| filename.to_string());
    identifier(&stem)
}

fn collapse_underscores(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if c == '_' && out.ends_with('_') {
            continue;
        }
        out.push(c);
    }
    out
}

/// Canonical id for an interchange element
///
/// Uses the destination key, then the last segment of `Self` or `Name`,
/// then a digest of the element. With a file name the id is prefixed with
/// that file's identifier, unless it already carries it.
pub fn make_element_id(elem: &Element, filename: Option<&str>) -> String {
    let local = if let Some(key) = elem.attr("DestinationUniqueKey") {
        format!("dest_{}", key)
    } else if let Some(name) = elem.attr("Self").or_else(|| elem.attr("Name")) {
        let last = name.rsplit('/').next().unwrap_or(name);
        collapse_underscores(&identifier(last))
    } else {
        let digest = Sha256::digest(elem.to_xml().trim().as_bytes());
        let hex: String = digest.iter().take(16).map(|b| format!("{:02x}", b)).collect();
        format!("_{}", hex)
    };

    match filename {
        Some(f) => {
            let prefix = format!("{}_", file_identifier(f));
            if local.starts_with(&prefix) {
                local
            } else {
                format!("{}{}", prefix, local)
            }
        }
        None => local,
    }
}

/// Bookmark title: the `Label` key-value, else the name with `_` as spaces
pub fn bookmark_title(bookmark: &Element) -> String {
    let label = bookmark
        .find_path("Properties/Label")
        .and_then(|l| l.elements().find(|kv| kv.name == "KeyValuePair" && kv.attr("Key") == Some("Label")))
        .and_then(|kv| kv.attr("Value"));
    match label {
        Some(v) => v.trim().to_string(),
        None => bookmark
            .attr("Name")
            .unwrap_or_default()
            .replace('_', " ")
            .trim()
            .to_string(),
    }
}

/// Decode `%xx` escapes; malformed escapes are kept as written
pub fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(b) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(b);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Percent-encode characters that cannot appear in a destination path
pub fn percent_encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'/' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{:02X}", b)),
        }
    }
    out
}

/// Resolve a `Hyperlink` element to a canonical `href`
///
/// A destination unique key that resolves (current document, then
/// documents, then sources) is final. `Properties/Destination` is only
/// consulted when there is no key, or when the key matches nothing in any
/// collection. Returns `None` and records a warning when nothing resolves.
pub fn hyperlink_href(ctx: &mut ResolutionContext, current: &Element, hyperlink: &Element) -> Option<String> {
    if let Some(key) = hyperlink.attr("DestinationUniqueKey") {
        let found = ctx
            .find(current, &|e| {
                e.name.contains("Destination") && e.attr("DestinationUniqueKey") == Some(key)
            })
            .map(|f| (make_element_id(f.element, Some(f.document)), f.filename()));
        if let Some((id, file)) = found {
            return Some(format!("{}#{}", file, id));
        }
        tracing::debug!(key = %key, "destination key not found; falling back to Properties/Destination");
    }

    let mut idref: Option<String> = None;
    let mut filename: Option<String> = None;

    if let Some(dest) = hyperlink.find_path("Properties/Destination") {
        let target = dest.text();
        let target = target.trim();
        let kind = target.split('/').next().unwrap_or_default();
        match kind {
            "HyperlinkTextDestination" | "ParagraphDestination" => {
                let found = ctx
                    .find(current, &|e| e.name == kind && e.attr("Self") == Some(target))
                    .map(|f| (make_element_id(f.element, Some(f.document)), f.filename()));
                if let Some((id, file)) = found {
                    idref = Some(id);
                    filename = Some(file);
                }
            }
            "HyperlinkURLDestination" => {
                let url = ctx
                    .find(current, &|e| e.name == kind && e.attr("Self") == Some(target))
                    .and_then(|f| f.element.attr("DestinationURL").map(str::to_string))
                    .unwrap_or_else(|| percent_decode(target.get(kind.len() + 1..).unwrap_or_default()));
                return Some(url);
            }
            _ if dest.attr("type") == Some("list") => {
                if let Some(item) = dest.child("ListItem") {
                    let file = crate::context::canonical_filename(item.text().trim());
                    let prefix = file_identifier(&file);
                    idref = hyperlink
                        .attr("DestinationUniqueKey")
                        .map(|key| format!("{}_dest_{}", prefix, key));
                    filename = Some(file);
                }
            }
            _ => {}
        }
    }

    if idref.is_none() && filename.is_none() {
        ctx.diagnostics.warn(
            DiagnosticKind::UnresolvedReference,
            format!(
                "hyperlink {:?} has no resolvable destination",
                hyperlink.attr("Self").unwrap_or_default()
            ),
        );
        return None;
    }
    let href = format!(
        "{}#{}",
        filename.unwrap_or_default(),
        idref.unwrap_or_default()
    );
    Some(href.trim_end_matches('#').to_string())
}
