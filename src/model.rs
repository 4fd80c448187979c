use serde::{Deserialize, Serialize};
use std::fmt;

/// Upper bound on the number of entries any chart response carries.
pub const MAX_CHART_ITEMS: usize = 10;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum SourceKind {
    #[serde(rename = "scrape")]
    Scrape,
    #[serde(rename = "csv")]
    Csv,
    #[serde(rename = "api")]
    CatalogApi,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Scrape => "scrape",
            SourceKind::Csv => "csv",
            SourceKind::CatalogApi => "api",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "scrape" => Some(SourceKind::Scrape),
            "csv" => Some(SourceKind::Csv),
            "api" | "catalog" | "catalog_api" => Some(SourceKind::CatalogApi),
            _ => None,
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChartItem {
    pub position: String,
    pub track: String,
    pub artist: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub popularity: Option<u32>,
}

impl ChartItem {
    pub fn ranked(rank: usize, track: String, artist: String) -> Self {
        Self {
            position: rank.to_string(),
            track,
            artist,
            popularity: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChartResult {
    pub source: SourceKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    pub items: Vec<ChartItem>,
}

impl ChartResult {
    /// Builds a result, dropping anything past [`MAX_CHART_ITEMS`].
    pub fn new(source: SourceKind, mut items: Vec<ChartItem>) -> Self {
        items.truncate(MAX_CHART_ITEMS);
        Self {
            source,
            artist: None,
            items,
        }
    }

    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = Some(artist.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// One concrete endpoint a strategy tries, already expanded for the request's region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceCandidate {
    pub url: String,
}

impl SourceCandidate {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

/// Region a chart is requested for: short code plus the slug page-style sources use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub code: String,
    pub name: String,
}
