//! Plain-text rendering of the HTML fragments Canvas returns in descriptions
//! and page bodies.

use regex::Regex;
use std::sync::LazyLock;

static SCRIPT_STYLE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(script|style)\b[^>]*>.*?</(script|style)\s*>")
        .expect("Invalid script/style regex")
});

static TAG_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("Invalid tag regex"));

static ENTITY_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(#[0-9]+|#[xX][0-9a-fA-F]+|[a-zA-Z]+);").expect("Invalid entity regex")
});

/// Strip tags, decode common entities and collapse whitespace.
///
/// Returns an empty string for `None` or empty input.
pub fn html_to_text(html: Option<&str>) -> String {
    let html = match html {
        Some(h) if !h.trim().is_empty() => h,
        _ => return String::new(),
    };

    let without_scripts = SCRIPT_STYLE_REGEX.replace_all(html, " ");
    // Tags become separators so adjacent blocks don't run together.
    let without_tags = TAG_REGEX.replace_all(&without_scripts, " ");
    let decoded = ENTITY_REGEX.replace_all(&without_tags, |caps: &regex::Captures| {
        decode_entity(&caps[1]).unwrap_or_else(|| caps[0].to_string())
    });

    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn decode_entity(name: &str) -> Option<String> {
    if let Some(num) = name.strip_prefix('#') {
        let code = match num.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse::<u32>().ok()?,
        };
        return char::from_u32(code).map(|c| c.to_string());
    }

    let decoded = match name {
        "amp" => "&",
        "lt" => "<",
        "gt" => ">",
        "quot" => "\"",
        "apos" => "'",
        "nbsp" => " ",
        "ndash" => "\u{2013}",
        "mdash" => "\u{2014}",
        "hellip" => "\u{2026}",
        _ => return None,
    };
    Some(decoded.to_string())
}
