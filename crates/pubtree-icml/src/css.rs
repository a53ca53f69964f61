//! Style properties as CSS declarations
//!
//! Interchange style attributes are translated into CSS-like declarations
//! with explicit numeric semantics. Point sizes become `em` by dividing by a
//! points-per-em baseline; margins and indents are divided again by the
//! current em size, so a nested override composes with the font size it is
//! applied to.

use std::sync::OnceLock;

use regex::Regex;

use crate::diagnostic::{DiagnosticKind, Diagnostics};
use crate::styles::{classname, PropertyBag, StyleKind, StyleRegistry, NO_CHARACTER_STYLE, NO_PARAGRAPH_STYLE};

/// Points per em used when no baseline is configured
pub const DEFAULT_PTS_PER_EM: f64 = 12.0;

/// Ordered CSS declarations
pub type Declarations = Vec<(String, String)>;

/// Translate style properties into CSS declarations
pub fn declarations(props: &PropertyBag, pts_per_em: f64, diags: &mut Diagnostics) -> Declarations {
    let mut css = Declarations::new();
    let get = |k: &str| props.get(k).map(String::as_str);

    match get("Capitalization") {
        Some("SmallCaps") | Some("CapToSmallCap") => push(&mut css, "font-variant", "small-caps"),
        Some("AllCaps") => push(&mut css, "text-transform", "uppercase"),
        Some("Normal") => {
            push(&mut css, "text-transform", "none");
            push(&mut css, "font-variant", "normal");
        }
        Some(other) => unknown(diags, "Capitalization", other),
        None => {}
    }

    if let Some(fill) = get("FillColor") {
        let color = color_value(fill, diags);
        push(&mut css, "color", &color);
    }

    match get("CharacterDirection") {
        Some("LeftToRightDirection") => push(&mut css, "direction", "ltr"),
        Some("RightToLeftDirection") => push(&mut css, "direction", "rtl"),
        Some("DefaultDirection") | None => {}
        Some(other) => unknown(diags, "CharacterDirection", other),
    }

    if let Some(font) = get("AppliedFont") {
        push(&mut css, "font-family", &format!("\"{}\"", font));
    }

    let font_size = get("PointSize").and_then(|v| v.parse::<f64>().ok());
    if let Some(pt) = font_size {
        push(&mut css, "font-size", &format!("{:.2}em", pt / pts_per_em));
    }
    let current_em = font_size.map(|pt| pt / pts_per_em).filter(|em| *em > 0.0).unwrap_or(1.0);

    if let Some(fs) = get("FontStyle") {
        font_style(&mut css, fs, diags);
    }

    if get("Hyphenation") == Some("false") {
        push(&mut css, "hyphens", "none");
    }

    if let Some(n) = get("DesiredLetterSpacing").and_then(|v| v.parse::<f64>().ok()) {
        if n != 0.0 {
            push(&mut css, "letter-spacing", &format!("{}%", n as i64));
        }
    }

    for (attr, property) in [
        ("LeftIndent", "margin-left"),
        ("RightIndent", "margin-right"),
        ("SpaceBefore", "margin-top"),
        ("SpaceAfter", "margin-bottom"),
        ("FirstLineIndent", "text-indent"),
    ] {
        if let Some(pt) = get(attr).and_then(|v| v.parse::<f64>().ok()) {
            push(&mut css, property, &format!("{:.2}em", pt / pts_per_em / current_em));
        }
    }

    match get("StartParagraph") {
        Some("NextColumn") | Some("NextFrame") | Some("NextPage") => {
            push(&mut css, "page-break-before", "always")
        }
        Some("NextOddPage") => push(&mut css, "page-break-before", "right"),
        Some("NextEvenPage") => push(&mut css, "page-break-before", "left"),
        _ => {
            if matches!(get("KeepWithPrevious"), Some(v) if v != "false") {
                push(&mut css, "page-break-before", "avoid");
            }
        }
    }
    if matches!(get("KeepWithNext"), Some(v) if v != "false" && v != "0") {
        push(&mut css, "page-break-after", "avoid");
    }

    match get("Justification") {
        Some("LeftAlign") | Some("ToBindingSide") => push(&mut css, "text-align", "left"),
        Some("CenterAlign") => push(&mut css, "text-align", "center"),
        Some("RightAlign") | Some("AwayFromBindingSide") => push(&mut css, "text-align", "right"),
        Some("LeftJustified") | Some("RightJustified") | Some("CenterJustified")
        | Some("FullyJustified") => push(&mut css, "text-align", "justify"),
        _ => {}
    }

    let mut decoration = Vec::new();
    if get("StrikeThru") == Some("true") {
        decoration.push("line-through");
    }
    if get("Underline") == Some("true") {
        decoration.push("underline");
    }
    if !decoration.is_empty() {
        push(&mut css, "text-decoration", &decoration.join(" "));
    }

    let position = get("Position");
    let alignment = get("CharacterAlignment");
    match (position, alignment) {
        (Some("Superscript") | Some("OTSuperscript"), _) => push(&mut css, "vertical-align", "super"),
        (Some("Subscript") | Some("OTSubscript"), _) => push(&mut css, "vertical-align", "sub"),
        (Some("Normal"), _) => push(&mut css, "vertical-align", "baseline"),
        (_, Some("AlignBaseline") | Some("AlignEmBottom") | Some("AlignICFBottom")) => {
            push(&mut css, "vertical-align", "text-bottom")
        }
        (_, Some("AlignEmCenter")) => push(&mut css, "vertical-align", "middle"),
        (_, Some("AlignEmTop") | Some("AlignICFTop")) => push(&mut css, "vertical-align", "text-top"),
        (None, None) => {}
        (p, a) => unknown(diags, "Position", &format!("{:?}/{:?}", p, a)),
    }

    if let Some(n) = get("DesiredWordSpacing").and_then(|v| v.parse::<f64>().ok()) {
        let delta = n as i64 - 100;
        if delta != 0 {
            push(&mut css, "word-spacing", &format!("{}%", delta));
        }
    }

    css
}

fn push(css: &mut Declarations, property: &str, value: &str) {
    css.retain(|(k, _)| k != property);
    css.push((property.to_string(), value.to_string()));
}

fn unknown(diags: &mut Diagnostics, attr: &str, value: &str) {
    diags.warn(DiagnosticKind::UnknownValue, format!("{}={:?} has no CSS equivalent", attr, value));
}

fn font_style(css: &mut Declarations, fs: &str, diags: &mut Diagnostics) {
    if fs.contains("Italic") || fs.contains("Oblique") {
        push(css, "font-style", "italic");
    }
    let weight = if fs.to_lowercase().contains("semibold") {
        Some("600")
    } else if fs.contains("Bold") {
        Some("bold")
    } else if fs.contains("Heavy") {
        Some("800")
    } else if fs.contains("Black") {
        Some("900")
    } else if fs.contains("Medium") || fs.contains("Regular") || fs == "Italic" || fs == "Oblique" {
        Some("normal")
    } else if fs.contains("Extralight") || fs.contains("Thin") {
        Some("100")
    } else if fs.contains("Light") {
        Some("200")
    } else if !fs.is_empty() && fs.chars().all(|c| c.is_ascii_digit()) {
        Some(fs)
    } else {
        None
    };
    match weight {
        Some(w) => push(css, "font-weight", w),
        None => unknown(diags, "FontStyle", fs),
    }
}

// ============================================================================
// Colors
// ============================================================================

fn cmyk_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^C=(\d+(?:\.\d+)?) M=(\d+(?:\.\d+)?) Y=(\d+(?:\.\d+)?) K=(\d+(?:\.\d+)?)$")
            .expect("valid regex")
    })
}

fn rgb_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^R=(\d+) G=(\d+) B=(\d+)$").expect("valid regex"))
}

/// Named swatches known to every interchange document
const NAMED_COLORS: &[(&str, &str)] = &[
    ("Black", "rgb(0,0,0)"),
    ("Registration", "rgb(0,0,0)"),
    ("Paper", "rgb(255,255,255)"),
    ("White", "rgb(255,255,255)"),
    ("None", "transparent"),
    ("Red", "rgb(255,0,0)"),
    ("Green", "rgb(0,255,0)"),
    ("Blue", "rgb(0,0,255)"),
    ("Cyan", "rgb(0,255,255)"),
    ("Magenta", "rgb(255,0,255)"),
    ("Yellow", "rgb(255,255,0)"),
];

/// CSS value for a `FillColor` reference
///
/// Accepts named swatches, `R=.. G=.. B=..` and `C=.. M=.. Y=.. K=..`
/// (converted to RGB). Anything else becomes `inherit` with a warning.
pub fn color_value(fill: &str, diags: &mut Diagnostics) -> String {
    let color = fill.rsplit('/').next().unwrap_or(fill).replace("%20", " ");
    let color = color.trim_start_matches("$ID/");

    if let Some(caps) = rgb_pattern().captures(color) {
        let channel = |i: usize| caps[i].parse::<u32>().unwrap_or(0).min(255);
        return format!("rgb({},{},{})", channel(1), channel(2), channel(3));
    }
    if let Some(caps) = cmyk_pattern().captures(color) {
        let pct = |i: usize| caps[i].parse::<f64>().unwrap_or(0.0).clamp(0.0, 100.0) / 100.0;
        let (c, m, y, k) = (pct(1), pct(2), pct(3), pct(4));
        let channel = |v: f64| (255.0 * (1.0 - v) * (1.0 - k)).round() as u32;
        return format!("rgb({},{},{})", channel(c), channel(m), channel(y));
    }
    if let Some((_, css)) = NAMED_COLORS.iter().find(|(name, _)| *name == color) {
        return css.to_string();
    }
    diags.warn(DiagnosticKind::UnknownValue, format!("unknown color {:?}, using inherit", color));
    "inherit".to_string()
}

// ============================================================================
// Inline style attribute
// ============================================================================

/// Render declarations as an inline `style` attribute value
pub fn inline_style(css: &Declarations) -> String {
    css.iter()
        .map(|(k, v)| format!("{}: {}", k, v))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Parse an inline `style` attribute value
pub fn parse_inline_style(style: &str) -> Declarations {
    style
        .split(';')
        .filter_map(|decl| {
            let (k, v) = decl.split_once(':')?;
            let (k, v) = (k.trim(), v.trim());
            (!k.is_empty() && !v.is_empty()).then(|| (k.to_string(), v.to_string()))
        })
        .collect()
}

/// Character-range attributes for an inline `style` value (export side)
pub fn range_attributes(style: &str, pts_per_em: f64) -> Vec<(String, String)> {
    let css = parse_inline_style(style);
    let get = |k: &str| css.iter().find(|(p, _)| p == k).map(|(_, v)| v.as_str());
    let mut attrs = Vec::new();

    let italic = matches!(get("font-style"), Some("italic") | Some("oblique"));
    let weight = match get("font-weight") {
        Some("bold") | Some("700") => Some("Bold"),
        Some("600") => Some("Semibold"),
        Some("800") => Some("Heavy"),
        Some("900") => Some("Black"),
        Some("200") => Some("Light"),
        Some("100") => Some("Thin"),
        _ => None,
    };
    let font_style = match (weight, italic) {
        (Some(w), true) => Some(format!("{} Italic", w)),
        (Some(w), false) => Some(w.to_string()),
        (None, true) => Some("Italic".to_string()),
        (None, false) => None,
    };
    if let Some(fs) = font_style {
        attrs.push(("FontStyle".to_string(), fs));
    }

    match get("vertical-align") {
        Some("super") => attrs.push(("Position".to_string(), "Superscript".to_string())),
        Some("sub") => attrs.push(("Position".to_string(), "Subscript".to_string())),
        _ => {}
    }
    if let Some(dec) = get("text-decoration") {
        if dec.contains("underline") {
            attrs.push(("Underline".to_string(), "true".to_string()));
        }
        if dec.contains("line-through") {
            attrs.push(("StrikeThru".to_string(), "true".to_string()));
        }
    }
    if get("font-variant") == Some("small-caps") {
        attrs.push(("Capitalization".to_string(), "SmallCaps".to_string()));
    } else if get("text-transform") == Some("uppercase") {
        attrs.push(("Capitalization".to_string(), "AllCaps".to_string()));
    }
    if let Some(em) = get("font-size")
        .and_then(|v| v.strip_suffix("em"))
        .and_then(|v| v.parse::<f64>().ok())
    {
        attrs.push(("PointSize".to_string(), format_points(em * pts_per_em)));
    }
    attrs
}

fn format_points(pt: f64) -> String {
    let rounded = (pt * 100.0).round() / 100.0;
    if rounded.fract() == 0.0 {
        format!("{}", rounded as i64)
    } else {
        format!("{}", rounded)
    }
}

// ============================================================================
// Languages
// ============================================================================

const LANGUAGES: &[(&str, &str, &str)] = &[
    ("English", "en", "English: USA"),
    ("French", "fr", "French"),
    ("German", "de", "German: 2006 Reform"),
    ("Spanish", "es", "Spanish"),
    ("Italian", "it", "Italian"),
    ("Portuguese", "pt", "Portuguese"),
    ("Dutch", "nl", "Dutch: 2005 Reform"),
    ("Swedish", "sv", "Swedish"),
    ("Danish", "da", "Danish"),
    ("Norwegian", "nb", "Norwegian: Bokmal"),
    ("Finnish", "fi", "Finnish"),
    ("Polish", "pl", "Polish"),
    ("Czech", "cs", "Czech"),
    ("Hungarian", "hu", "Hungarian"),
    ("Russian", "ru", "Russian"),
    ("Greek", "el", "Greek"),
    ("Turkish", "tr", "Turkish"),
    ("Hebrew", "he", "Hebrew"),
    ("Arabic", "ar", "Arabic"),
    ("Japanese", "ja", "Japanese"),
    ("Chinese", "zh", "Chinese"),
    ("Korean", "ko", "Korean"),
];

/// Two-letter code for an `AppliedLanguage` value (`$ID/English: USA` -> `en`)
pub fn lang_code(applied: &str, diags: &mut Diagnostics) -> Option<&'static str> {
    let name = applied.rsplit('/').next().unwrap_or(applied);
    let name = name.split(':').next().unwrap_or(name).trim();
    if name.is_empty() || name.starts_with('[') || name == "Neutral" {
        return None;
    }
    let found = LANGUAGES
        .iter()
        .find(|(lang, _, _)| name.starts_with(lang))
        .map(|(_, code, _)| *code);
    if found.is_none() {
        diags.warn(DiagnosticKind::UnknownValue, format!("AppliedLanguage={:?}", applied));
    }
    found
}

/// `AppliedLanguage` value for a two-letter code
pub fn applied_language(code: &str) -> Option<String> {
    let primary = code.split(['-', '_']).next().unwrap_or(code).to_lowercase();
    LANGUAGES
        .iter()
        .find(|(_, c, _)| *c == primary)
        .map(|(_, _, applied)| format!("$ID/{}", applied))
}

// ============================================================================
// Stylesheet
// ============================================================================

/// CSS stylesheet generated from style definitions
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Stylesheet {
    pub rules: Vec<(String, Declarations)>,
}

impl Stylesheet {
    /// One rule per paragraph and character style, inheritance resolved
    pub fn from_registry(registry: &StyleRegistry, pts_per_em: f64, diags: &mut Diagnostics) -> Self {
        let mut rules = Vec::new();
        for def in registry.iter() {
            let class = classname(&def.name);
            let selector = match def.kind {
                StyleKind::Paragraph if class == NO_PARAGRAPH_STYLE => "p".to_string(),
                StyleKind::Paragraph => format!("p.{}", class),
                StyleKind::Character if class == NO_CHARACTER_STYLE => "span, a".to_string(),
                StyleKind::Character => format!("span.{}, a.{}", class, class),
                _ => continue,
            };
            let bag = registry.resolve(&def.id, diags);
            rules.push((selector, declarations(&bag, pts_per_em, diags)));
        }
        Self { rules }
    }

    /// Render as CSS text
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (selector, decls) in &self.rules {
            out.push_str(selector);
            out.push_str(" {\n");
            for (k, v) in decls {
                out.push_str(&format!("\t{}: {};\n", k, v));
            }
            out.push_str("}\n");
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bag(pairs: &[(&str, &str)]) -> PropertyBag {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn value<'a>(css: &'a Declarations, property: &str) -> Option<&'a str> {
        css.iter().find(|(k, _)| k == property).map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_font_size_in_em() {
        let mut diags = Diagnostics::new();
        let css = declarations(&bag(&[("PointSize", "18")]), DEFAULT_PTS_PER_EM, &mut diags);
        assert_eq!(value(&css, "font-size"), Some("1.50em"));
        let css = declarations(&bag(&[("PointSize", "18")]), 9.0, &mut diags);
        assert_eq!(value(&css, "font-size"), Some("2.00em"));
    }

    #[test]
    fn test_margins_divide_by_current_em() {
        let mut diags = Diagnostics::new();
        let css = declarations(&bag(&[("LeftIndent", "12")]), 12.0, &mut diags);
        assert_eq!(value(&css, "margin-left"), Some("1.00em"));
        let css = declarations(&bag(&[("LeftIndent", "12"), ("PointSize", "24")]), 12.0, &mut diags);
        assert_eq!(value(&css, "margin-left"), Some("0.50em"));
    }

    #[test]
    fn test_colors() {
        let mut diags = Diagnostics::new();
        assert_eq!(color_value("Color/Black", &mut diags), "rgb(0,0,0)");
        assert_eq!(color_value("Color/R=10 G=20 B=30", &mut diags), "rgb(10,20,30)");
        assert_eq!(color_value("Color/C=0 M=100 Y=100 K=0", &mut diags), "rgb(255,0,0)");
        assert_eq!(color_value("Color/C=0 M=0 Y=0 K=100", &mut diags), "rgb(0,0,0)");
        assert!(diags.is_empty());
        assert_eq!(color_value("Color/Pantone 123", &mut diags), "inherit");
        assert!(diags.has(DiagnosticKind::UnknownValue));
    }

    #[test]
    fn test_font_style_and_decoration() {
        let mut diags = Diagnostics::new();
        let css = declarations(
            &bag(&[("FontStyle", "Bold Italic"), ("Underline", "true"), ("Position", "Superscript")]),
            12.0,
            &mut diags,
        );
        assert_eq!(value(&css, "font-style"), Some("italic"));
        assert_eq!(value(&css, "font-weight"), Some("bold"));
        assert_eq!(value(&css, "text-decoration"), Some("underline"));
        assert_eq!(value(&css, "vertical-align"), Some("super"));
    }

    #[test]
    fn test_range_attributes_reverse() {
        let attrs = range_attributes("font-style: italic; font-weight: bold; font-size: 0.75em", 12.0);
        assert!(attrs.contains(&("FontStyle".to_string(), "Bold Italic".to_string())));
        assert!(attrs.contains(&("PointSize".to_string(), "9".to_string())));
    }

    #[test]
    fn test_inline_style_round_trip() {
        let css = vec![("font-style".to_string(), "italic".to_string()), ("color".to_string(), "rgb(0,0,0)".to_string())];
        assert_eq!(parse_inline_style(&inline_style(&css)), css);
    }

    #[test]
    fn test_languages() {
        let mut diags = Diagnostics::new();
        assert_eq!(lang_code("$ID/English: USA", &mut diags), Some("en"));
        assert_eq!(lang_code("$ID/[No Language]", &mut diags), None);
        assert!(diags.is_empty());
        assert_eq!(lang_code("$ID/Klingon", &mut diags), None);
        assert!(!diags.is_empty());
        assert_eq!(applied_language("fr-CA").as_deref(), Some("$ID/French"));
        assert_eq!(applied_language("xx"), None);
    }

    #[test]
    fn test_stylesheet_render() {
        use crate::tree::Element;
        let root = Element::new("Document").with_child(
            Element::new("RootParagraphStyleGroup")
                .with_child(Element::new("ParagraphStyle").with_attr("Self", "ParagraphStyle/$ID/[No paragraph style]").with_attr("Name", "$ID/[No paragraph style]"))
                .with_child(Element::new("ParagraphStyle").with_attr("Self", "ParagraphStyle/BodyText").with_attr("Name", "BodyText").with_attr("PointSize", "12")),
        );
        let mut diags = Diagnostics::new();
        let reg = StyleRegistry::from_root(&root, &mut diags);
        let css = Stylesheet::from_registry(&reg, 12.0, &mut diags).render();
        assert!(css.starts_with("p {\n}\n"));
        assert!(css.contains("p.Body-Text {\n\tfont-size: 1.00em;\n}\n"));
    }
}
