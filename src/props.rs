//! Compiles `chisel-` prefixed frontmatter into CSS custom properties.
//!
//! `chisel-accent: "#ff0000"` becomes `--accent: #ff0000 !important;` inside
//! a single `html body` rule. The four font roles additionally pull their
//! families from Google Fonts.

use std::sync::OnceLock;

use regex::Regex;

use crate::metadata::Frontmatter;

pub const PROPERTY_PREFIX: &str = "chisel-";

const FONT_ROLES: &[&str] = &["font-text", "font-header", "font-monospace", "font-interface"];

/// CSS generic families; these never resolve to a web font.
const GENERIC_FAMILIES: &[&str] = &[
    "serif",
    "sans-serif",
    "monospace",
    "cursive",
    "fantasy",
    "system-ui",
    "ui-serif",
    "ui-sans-serif",
    "ui-monospace",
    "ui-rounded",
    "emoji",
    "math",
    "fangsong",
    "inherit",
    "initial",
    "unset",
];

/// Builds the stylesheet text for `frontmatter`. Keys in `reserved` are
/// control flags and never become properties. Returns an empty string when
/// there is nothing to declare.
pub fn compile(frontmatter: &Frontmatter, reserved: &[&str]) -> String {
    let mut declarations = Vec::new();
    let mut fonts: Vec<String> = Vec::new();

    for (key, value) in frontmatter.iter() {
        if reserved.contains(&key) {
            continue;
        }
        let Some(name) = key.strip_prefix(PROPERTY_PREFIX).filter(|n| !n.is_empty()) else {
            continue;
        };
        let Some(value) = value.css_value() else {
            continue;
        };
        if FONT_ROLES.contains(&name) {
            for family in font_families(&value) {
                if !fonts.contains(&family) {
                    fonts.push(family);
                }
            }
        }
        declarations.push(format!("  --{name}: {} !important;", quote(&value)));
    }

    if declarations.is_empty() {
        return String::new();
    }

    let imports = fonts
        .iter()
        .map(|family| font_import(family))
        .collect::<Vec<_>>()
        .join("\n");
    let block = format!("html body {{\n{}\n}}", declarations.join("\n"));
    [imports, block]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Family names of a font stack with quotes stripped, generic families dropped.
fn font_families(stack: &str) -> Vec<String> {
    static RE_QUOTES: OnceLock<Regex> = OnceLock::new();
    let re_quotes = RE_QUOTES.get_or_init(|| Regex::new(r#"['"]"#).unwrap());

    stack
        .split(',')
        .map(|family| {
            let unquoted = re_quotes.replace_all(family, "");
            unquoted.split_whitespace().collect::<Vec<_>>().join(" ")
        })
        .filter(|family| !family.is_empty())
        .filter(|family| !GENERIC_FAMILIES.contains(&family.to_ascii_lowercase().as_str()))
        .collect()
}

fn font_import(family: &str) -> String {
    let family = family.replace(' ', "+");
    format!("@import url('https://fonts.googleapis.com/css2?family={family}&display=swap');")
}

/// Values with whitespace are wrapped as a single-quoted CSS string.
fn quote(value: &str) -> String {
    if value.chars().any(char::is_whitespace) {
        format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
    } else {
        value.to_string()
    }
}
