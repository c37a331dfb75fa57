//! CSS synthesis for one style root.
//!
//! Pure functions: given a tuple and the kind of root, produce the ruleset text
//! the injector places in that root's `<style>` element.

use crate::page::dom::{Document, NodeId};
use crate::types::settings::StyleTuple;

/// Id prefix of every style element the injector owns.
pub const STYLE_ID_PREFIX: &str = "typeset-style-";

/// Id of the document-level style element.
pub const DOCUMENT_STYLE_ID: &str = "typeset-style-document";

/// Elements that keep their own typography.
const EXCLUDED: &[&str] = &[
    "pre",
    "code",
    "samp",
    "kbd",
    "pre *",
    "code *",
    "[class*=\"icon\"]",
    "[class*=\"fa-\"]",
    ".material-icons",
    ".material-symbols-outlined",
    ".glyphicon",
];

/// `input` types that render as buttons or toggles rather than text fields.
const BUTTON_LIKE_INPUTS: &[&str] = &[
    "button", "submit", "reset", "checkbox", "radio", "image", "color", "range", "file",
];

/// Block and text-bearing elements that get a forced `text-align`.
const ALIGNED_TAGS: &[&str] = &[
    "p", "h1", "h2", "h3", "h4", "h5", "h6", "li", "dd", "dt", "blockquote", "figcaption", "td",
    "th", "label", "article", "section", "div",
];

/// Markers of an element that is deliberately centered.
const CENTERED: &[&str] = &[
    "[style*=\"text-align: center\"]",
    "[style*=\"text-align:center\"]",
    "[align=\"center\"]",
    ".text-center",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleScope {
    Document,
    ShadowRoot,
}

/// Formats a number for CSS: `18`, `1.5`, `-0.25`.
pub fn css_number(value: f64) -> String {
    format!("{}", value)
}

fn quote_family(font: &str) -> String {
    let escaped = font.trim().replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{}\"", escaped)
}

fn not_list(selectors: &[&str]) -> String {
    selectors.iter().map(|s| format!(":not({})", s)).collect()
}

fn rule(selector: &str, declarations: &[String]) -> String {
    let body: String = declarations
        .iter()
        .map(|d| format!("  {} !important;\n", d))
        .collect();
    format!("{} {{\n{}}}\n", selector, body)
}

fn font_declarations(tuple: &StyleTuple) -> Vec<String> {
    let mut decls = Vec::new();
    if !tuple.font.trim().is_empty() {
        decls.push(format!("font-family: {}", quote_family(&tuple.font)));
    }
    if !tuple.font_weight.trim().is_empty() {
        decls.push(format!("font-weight: {}", tuple.font_weight.trim()));
    }
    if let Some(size) = tuple.font_size {
        decls.push(format!("font-size: {}px", css_number(size)));
    }
    if let Some(height) = tuple.line_height {
        decls.push(format!("line-height: {}", css_number(height)));
    }
    if let Some(spacing) = tuple.letter_spacing {
        decls.push(format!("letter-spacing: {}px", css_number(spacing)));
    }
    if let Some(spacing) = tuple.word_spacing {
        decls.push(format!("word-spacing: {}px", css_number(spacing)));
    }
    decls
}

fn form_control_declarations(tuple: &StyleTuple) -> Vec<String> {
    let mut decls = Vec::new();
    if !tuple.font.trim().is_empty() {
        decls.push(format!("font-family: {}", quote_family(&tuple.font)));
    }
    if !tuple.font_weight.trim().is_empty() {
        decls.push(format!("font-weight: {}", tuple.font_weight.trim()));
    }
    decls
}

fn form_control_selector() -> String {
    let inputs: Vec<String> = BUTTON_LIKE_INPUTS
        .iter()
        .map(|t| format!("[type=\"{}\"]", t))
        .collect();
    let refs: Vec<&str> = inputs.iter().map(String::as_str).collect();
    format!("input{}, textarea, select", not_list(&refs))
}

/// Builds the ruleset for one root. Empty when the tuple overrides nothing.
pub fn build_ruleset(tuple: &StyleTuple, scope: RuleScope) -> String {
    let mut css = String::new();

    let font_decls = font_declarations(tuple);
    if !font_decls.is_empty() {
        let universal = format!("*{}", not_list(EXCLUDED));
        let selector = match scope {
            RuleScope::Document => universal,
            RuleScope::ShadowRoot => format!(":host, {}", universal),
        };
        css.push_str(&rule(&selector, &font_decls));
    }

    let form_decls = form_control_declarations(tuple);
    if !form_decls.is_empty() {
        css.push_str(&rule(&form_control_selector(), &form_decls));
    }

    if let Some(align) = tuple.direction.text_align() {
        let direction = vec![format!("direction: {}", tuple.direction.as_str())];
        let selector = match scope {
            RuleScope::Document => "*".to_string(),
            RuleScope::ShadowRoot => ":host, *".to_string(),
        };
        css.push_str(&rule(&selector, &direction));
        let aligned = format!(":is({}){}", ALIGNED_TAGS.join(", "), not_list(CENTERED));
        css.push_str(&rule(&aligned, &[format!("text-align: {}", align)]));
    }

    css
}

/// Replaces anything outside `[A-Za-z0-9_-]` with `-`.
pub fn sanitize_id(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '-' })
        .collect()
}

/// Stable id of the style element for `root`: derived from the shadow host's
/// id, falling back to its tag name.
pub fn style_element_id(doc: &Document, root: NodeId) -> String {
    if !doc.is_shadow_root(root) {
        return DOCUMENT_STYLE_ID.to_string();
    }
    let label = doc
        .host_of(root)
        .map(|host| {
            doc.get_attribute(host, "id")
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(|| doc.tag(host))
                .to_string()
        })
        .unwrap_or_else(|| "shadow".to_string());
    format!("{}{}", STYLE_ID_PREFIX, sanitize_id(&label))
}
