//! Cleanup for text scraped out of markup, CSV cells and embedded JSON.

use regex::{Captures, Regex};
use std::sync::LazyLock;

static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("tag regex must compile"));

static ENTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(amp|lt|gt|quot|#39);").expect("entity regex must compile")
});

static UNICODE_ESCAPES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\\u[0-9A-Fa-f]{4})+").expect("unicode escape regex must compile")
});

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace regex must compile"));

// A pass only shortens the text or rewrites whitespace, so real input settles
// within two or three passes.
const MAX_PASSES: usize = 16;

/// Strips tags, decodes the supported entities and `\uXXXX` escapes, collapses
/// whitespace runs to one space and trims.
///
/// Passes repeat until the text stops changing, which makes the function
/// idempotent: `clean(&clean(s)) == clean(s)`.
pub fn clean(input: &str) -> String {
    let mut current = clean_once(input);
    for _ in 0..MAX_PASSES {
        let next = clean_once(&current);
        if next == current {
            break;
        }
        current = next;
    }
    current
}

fn clean_once(input: &str) -> String {
    let stripped = TAG.replace_all(input, "");
    let decoded = decode_entities(&stripped);
    let unescaped = decode_unicode_escapes(&decoded);
    WHITESPACE.replace_all(&unescaped, " ").trim().to_string()
}

pub fn decode_entities(input: &str) -> String {
    ENTITY
        .replace_all(input, |caps: &Captures<'_>| match &caps[1] {
            "amp" => "&",
            "lt" => "<",
            "gt" => ">",
            "quot" => "\"",
            _ => "'",
        })
        .into_owned()
}

/// Decodes runs of `\uXXXX` as UTF-16, so surrogate pairs become one char.
/// Unpaired surrogates are left as written.
pub fn decode_unicode_escapes(input: &str) -> String {
    UNICODE_ESCAPES
        .replace_all(input, |caps: &Captures<'_>| {
            let hexes: Vec<&str> = caps[0].split("\\u").filter(|hex| !hex.is_empty()).collect();
            let units: Vec<u16> = hexes
                .iter()
                .filter_map(|hex| u16::from_str_radix(hex, 16).ok())
                .collect();

            let mut out = String::new();
            let mut idx = 0;
            while idx < units.len() {
                let unit = units[idx];
                let next = units.get(idx + 1).copied();
                match (unit, next) {
                    (0xD800..=0xDBFF, Some(low @ 0xDC00..=0xDFFF)) => {
                        let code =
                            0x10000 + ((u32::from(unit) - 0xD800) << 10) + (u32::from(low) - 0xDC00);
                        out.extend(char::from_u32(code));
                        idx += 2;
                    }
                    _ => {
                        match char::from_u32(u32::from(unit)) {
                            Some(ch) => out.push(ch),
                            None => {
                                out.push_str("\\u");
                                out.push_str(hexes[idx]);
                            }
                        }
                        idx += 1;
                    }
                }
            }
            out
        })
        .into_owned()
}
