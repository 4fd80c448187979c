use crate::model::ChartItem;
use crate::normalize::clean;
use regex::Regex;

const HTML_MARKERS: [&str; 5] = ["<html", "<!doctype", "<div", "<script", "<meta"];
const HTML_SNIFF_CHARS: usize = 1000;

/// Parses a chart export into rows, in input order.
///
/// Data starts on the line after the first line whose trimmed text begins with
/// `Position` (any case). Without such a line, every line is treated as data.
/// Lines with fewer than three fields, and rows whose track is empty after
/// cleanup, are skipped. With `normalize` off, cells are only trimmed.
pub fn parse_chart_csv(text: &str, normalize: bool) -> Vec<ChartItem> {
    let lines: Vec<&str> = text.lines().filter(|line| !line.is_empty()).collect();
    let start = lines
        .iter()
        .position(|line| is_header_line(line))
        .map(|idx| idx + 1)
        .unwrap_or(0);

    let tidy = |cell: &str| {
        if normalize {
            clean(cell)
        } else {
            cell.trim().to_string()
        }
    };

    let mut rows = Vec::new();
    for line in &lines[start..] {
        let fields = split_csv_line(line);
        if fields.len() < 3 {
            continue;
        }

        let track = tidy(&fields[1]);
        if track.is_empty() {
            continue;
        }

        rows.push(ChartItem {
            position: tidy(&fields[0]),
            track,
            artist: tidy(&fields[2]),
            popularity: None,
        });
    }
    rows
}

/// Splits on commas outside double quotes. Quote characters toggle quoting and
/// are dropped.
pub fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for ch in line.chars() {
        match ch {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            other => current.push(other),
        }
    }
    fields.push(current);
    fields
}

/// Looks for HTML markers in the first characters of a body that should be CSV.
pub fn looks_like_html(body: &str) -> bool {
    let head = body
        .chars()
        .take(HTML_SNIFF_CHARS)
        .collect::<String>()
        .to_ascii_lowercase();
    HTML_MARKERS.iter().any(|marker| head.contains(marker))
}

pub fn has_expected_header(body: &str, header: &Regex) -> bool {
    header.is_match(body)
}

fn is_header_line(line: &str) -> bool {
    line.trim()
        .get(..8)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("position"))
}
