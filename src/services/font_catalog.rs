//! Font catalog: which fonts are local, and how to request remote ones.

use url::form_urlencoded::byte_serialize;

/// Base of the web-font stylesheet service.
pub const FONT_CSS_ENDPOINT: &str = "https://fonts.googleapis.com/css2";

/// Fonts assumed present on the system; they never trigger a remote load.
const SYSTEM_FONTS: &[&str] = &[
    "arial",
    "tahoma",
    "verdana",
    "georgia",
    "times new roman",
    "courier new",
    "segoe ui",
    "helvetica",
    "system-ui",
    "sans-serif",
    "serif",
    "monospace",
];

/// Variable-weight ranges of catalog fonts, as `wght` axis values.
const WEIGHT_RANGES: &[(&str, &str)] = &[
    ("vazirmatn", "100..900"),
    ("noto sans arabic", "100..900"),
    ("noto naskh arabic", "400..700"),
    ("noto kufi arabic", "100..900"),
    ("noto sans hebrew", "100..900"),
    ("rubik", "300..900"),
    ("cairo", "200..1000"),
    ("tajawal", "200;300;400;500;700;800;900"),
    ("almarai", "300;400;700;800"),
    ("estedad", "100..900"),
    ("roboto", "100..900"),
    ("open sans", "300..800"),
    ("inter", "100..900"),
];

/// Returns true for empty names and fonts on the system allowlist.
pub fn is_system_font(font: &str) -> bool {
    let name = font.trim().trim_matches(|c| c == '"' || c == '\'').to_ascii_lowercase();
    name.is_empty() || SYSTEM_FONTS.contains(&name.as_str())
}

/// The catalog's weight axis for `font`, if known.
pub fn known_weight_range(font: &str) -> Option<&'static str> {
    let name = font.trim().to_ascii_lowercase();
    WEIGHT_RANGES
        .iter()
        .find(|(family, _)| *family == name)
        .map(|(_, range)| *range)
}

/// Builds the stylesheet URL for a remote font.
///
/// The weight parameter is the catalog range when known, otherwise the
/// requested weight when it is numeric, otherwise omitted.
pub fn font_stylesheet_url(font: &str, weight: &str) -> String {
    let family: String = byte_serialize(font.trim().as_bytes()).collect();
    let weight = weight.trim();
    let axis = match known_weight_range(font) {
        Some(range) => Some(range.to_string()),
        None if !weight.is_empty() && weight.chars().all(|c| c.is_ascii_digit()) => {
            Some(weight.to_string())
        }
        None => None,
    };
    match axis {
        Some(axis) => format!("{}?family={}:wght@{}&display=swap", FONT_CSS_ENDPOINT, family, axis),
        None => format!("{}?family={}&display=swap", FONT_CSS_ENDPOINT, family),
    }
}
