//! Pulls a chart out of a server-rendered page.
//!
//! Pages embed their initial state as JSON, either in a script tag with a known
//! id or assigned to a known `window` global. Each embedded document is searched
//! for the first array whose elements all look like tracks. When no document
//! yields anything, [`scan_title_subtitle_pairs`] runs over the raw markup.

use crate::model::{ChartItem, MAX_CHART_ITEMS};
use crate::normalize::clean;
use regex::Regex;
use scraper::{Html, Selector};
use serde_json::{Map, Value};
use std::sync::LazyLock;
use tracing::{debug, warn};

const MAX_DEPTH: usize = 64;
const MAX_VISITED: usize = 250_000;

static TITLE_SUBTITLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""title"\s*:\s*"([^"]+)"\s*,\s*"subtitle"\s*:\s*"([^"]+)""#)
        .expect("title/subtitle regex must compile")
});

/// Hydration markers recognized in a page.
#[derive(Debug, Clone)]
pub struct EmbeddedMarkers {
    pub script_ids: Vec<String>,
    pub globals: Vec<String>,
}

impl Default for EmbeddedMarkers {
    fn default() -> Self {
        Self {
            script_ids: vec!["__NEXT_DATA__".to_string()],
            globals: vec!["__INITIAL_STATE__".to_string(), "__DATA__".to_string()],
        }
    }
}

/// Extracts up to [`MAX_CHART_ITEMS`] ranked items from a page.
pub fn extract_chart_items(html: &str, markers: &EmbeddedMarkers) -> Vec<ChartItem> {
    for document in embedded_documents(html, markers) {
        let Some(tracks) = find_track_array(&document) else {
            continue;
        };
        let items = items_from_track_array(tracks);
        if !items.is_empty() {
            debug!(items = items.len(), "embedded document matched");
            return items;
        }
    }

    scan_title_subtitle_pairs(html)
}

/// Parses every recognized hydration payload, script tags first, then globals.
/// Payloads that are missing or not valid JSON are skipped.
pub fn embedded_documents(html: &str, markers: &EmbeddedMarkers) -> Vec<Value> {
    let mut documents = Vec::new();

    if !markers.script_ids.is_empty() {
        let parsed = Html::parse_document(html);
        for id in &markers.script_ids {
            if let Some(document) = script_document(&parsed, id) {
                documents.push(document);
            }
        }
    }

    for name in &markers.globals {
        if let Some(document) = global_document(html, name) {
            documents.push(document);
        }
    }

    documents
}

fn script_document(parsed: &Html, id: &str) -> Option<Value> {
    let selector = match Selector::parse(&format!("script[id=\"{id}\"]")) {
        Ok(selector) => selector,
        Err(err) => {
            warn!(id, error = ?err, "invalid script id marker; skipping");
            return None;
        }
    };

    let script = parsed.select(&selector).next()?;
    let text = script.text().collect::<String>();
    match serde_json::from_str::<Value>(text.trim()) {
        Ok(value) => Some(value),
        Err(err) => {
            debug!(id, error = %err, "script payload is not valid json");
            None
        }
    }
}

fn global_document(html: &str, name: &str) -> Option<Value> {
    let assignment = Regex::new(&format!(r"window\.{}\s*=\s*", regex::escape(name))).ok()?;
    let found = assignment.find(html)?;
    let rest = &html[found.end()..];
    if !rest.starts_with('{') {
        return None;
    }

    // Reads exactly one value, so whatever follows the object is ignored.
    let mut stream = serde_json::Deserializer::from_str(rest).into_iter::<Value>();
    match stream.next() {
        Some(Ok(value)) if value.is_object() => Some(value),
        Some(Err(err)) => {
            debug!(global = name, error = %err, "window global is not valid json");
            None
        }
        _ => None,
    }
}

/// Depth-first search for the first non-empty array whose elements are all
/// track-like. An array is tested before its contents; object fields are
/// visited in document order.
pub fn find_track_array(root: &Value) -> Option<&[Value]> {
    let mut stack: Vec<(&Value, usize)> = vec![(root, 0)];
    let mut visited = 0usize;

    while let Some((value, depth)) = stack.pop() {
        visited += 1;
        if visited > MAX_VISITED {
            warn!(visited, "track search budget exhausted");
            return None;
        }

        let children: Vec<&Value> = match value {
            Value::Array(items) => {
                if is_track_array(items) {
                    return Some(items);
                }
                items.iter().collect()
            }
            Value::Object(map) => map.values().collect(),
            _ => continue,
        };

        if depth >= MAX_DEPTH {
            continue;
        }
        for child in children.into_iter().rev() {
            if child.is_array() || child.is_object() {
                stack.push((child, depth + 1));
            }
        }
    }

    None
}

fn is_track_array(items: &[Value]) -> bool {
    !items.is_empty() && items.iter().all(is_track_like)
}

/// A track-like record is an object with a `title` or `name`, or a nested
/// `track` object carrying one.
pub fn is_track_like(value: &Value) -> bool {
    let Some(obj) = value.as_object() else {
        return false;
    };
    if text_field(obj, "title").is_some() || text_field(obj, "name").is_some() {
        return true;
    }
    obj.get("track")
        .and_then(Value::as_object)
        .is_some_and(|track| text_field(track, "title").is_some() || text_field(track, "name").is_some())
}

/// Converts matched track records into ranked items. Records whose title is
/// empty after cleanup are skipped; positions follow output order.
pub fn items_from_track_array(tracks: &[Value]) -> Vec<ChartItem> {
    let mut items = Vec::new();
    for record in tracks {
        if items.len() >= MAX_CHART_ITEMS {
            break;
        }
        let Some(obj) = record.as_object() else {
            continue;
        };

        let title = clean(&record_title(obj).unwrap_or_default());
        if title.is_empty() {
            continue;
        }
        let subtitle = clean(&record_subtitle(obj).unwrap_or_default());
        items.push(ChartItem::ranked(items.len() + 1, title, subtitle));
    }
    items
}

fn record_title(obj: &Map<String, Value>) -> Option<String> {
    let track = obj.get("track").and_then(Value::as_object);
    text_field(obj, "title")
        .or_else(|| track.and_then(|t| text_field(t, "title")))
        .or_else(|| text_field(obj, "name"))
        .or_else(|| track.and_then(|t| text_field(t, "name")))
}

fn record_subtitle(obj: &Map<String, Value>) -> Option<String> {
    if let Some(subtitle) = text_field(obj, "subtitle") {
        return Some(subtitle);
    }
    if let Some(name) = obj
        .get("artist")
        .and_then(Value::as_object)
        .and_then(|artist| text_field(artist, "name"))
    {
        return Some(name);
    }
    if let Some(joined) = obj.get("artists").and_then(join_artist_names) {
        return Some(joined);
    }
    obj.get("track")
        .and_then(|track| track.get("artists"))
        .and_then(join_artist_names)
}

fn join_artist_names(value: &Value) -> Option<String> {
    let artists = value.as_array()?;
    let names: Vec<String> = artists
        .iter()
        .filter_map(|artist| match artist {
            Value::String(name) => Some(name.clone()),
            Value::Object(obj) => text_field(obj, "name"),
            _ => None,
        })
        .filter(|name| !name.trim().is_empty())
        .collect();

    if names.is_empty() {
        None
    } else {
        Some(names.join(", "))
    }
}

fn text_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    match obj.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Last-resort scan of raw markup for adjacent `"title":"…","subtitle":"…"`
/// pairs, in order of appearance.
///
/// Fragile: it depends on key order and quoting in the upstream payload and
/// exists only for pages whose hydration script is truncated or not JSON.
pub fn scan_title_subtitle_pairs(html: &str) -> Vec<ChartItem> {
    let mut items = Vec::new();
    for caps in TITLE_SUBTITLE.captures_iter(html) {
        if items.len() >= MAX_CHART_ITEMS {
            break;
        }
        let title = clean(&caps[1]);
        if title.is_empty() {
            continue;
        }
        let artist = clean(&caps[2]);
        items.push(ChartItem::ranked(items.len() + 1, title, artist));
    }
    items
}
