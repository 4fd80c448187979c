use crate::catalog::CatalogClient;
use crate::config::{CatalogConfig, Credentials, CsvConfig, ScrapeConfig};
use crate::csv::{has_expected_header, looks_like_html, parse_chart_csv};
use crate::extract::{EmbeddedMarkers, extract_chart_items};
use crate::fetch::{HttpRequest, Transport, fetch};
use crate::model::{ChartResult, SourceCandidate, SourceKind};
use anyhow::{Context, Error, Result, anyhow};
use regex::Regex;
use std::time::Duration;
use tracing::{info, warn};

/// Outcome of running one strategy over all of its candidates.
#[derive(Debug)]
pub enum Attempt {
    Found(ChartResult),
    /// At least one candidate answered, but nothing usable came back.
    Empty,
    /// No candidate could be used; carries the last failure.
    Failed(Error),
}

pub trait SourceStrategy: Send + Sync {
    fn kind(&self) -> SourceKind;
    fn attempt(&self, transport: &dyn Transport) -> Attempt;
}

/// What a single candidate produced.
enum CandidateOutcome {
    Items(ChartResult),
    Nothing,
    Rejected(Error),
}

/// Tries candidates in declared order, one attempt each, stopping at the first
/// that produces items. Failures are logged and only skip their candidate.
fn run_candidates<F>(kind: SourceKind, candidates: &[SourceCandidate], mut try_one: F) -> Attempt
where
    F: FnMut(&SourceCandidate) -> CandidateOutcome,
{
    let mut answered = false;
    let mut last_error = None;

    for candidate in candidates {
        match try_one(candidate) {
            CandidateOutcome::Items(result) => {
                info!(phase = %kind, url = %candidate.url, items = result.items.len(), "candidate produced chart");
                return Attempt::Found(result);
            }
            CandidateOutcome::Nothing => {
                info!(phase = %kind, url = %candidate.url, "candidate yielded no items");
                answered = true;
            }
            CandidateOutcome::Rejected(err) => {
                let detail = format!("{err:#}");
                warn!(phase = %kind, url = %candidate.url, error = %detail, "candidate skipped");
                last_error = Some(err);
            }
        }
    }

    match (answered, last_error) {
        (false, Some(err)) => Attempt::Failed(err),
        _ => Attempt::Empty,
    }
}

pub struct ScrapeStrategy {
    candidates: Vec<SourceCandidate>,
    markers: EmbeddedMarkers,
    user_agent: String,
    timeout: Duration,
}

impl ScrapeStrategy {
    pub fn new(config: &ScrapeConfig, candidates: Vec<SourceCandidate>) -> Self {
        Self {
            candidates,
            markers: EmbeddedMarkers {
                script_ids: config.script_ids.clone(),
                globals: config.globals.clone(),
            },
            user_agent: config.user_agent.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

impl SourceStrategy for ScrapeStrategy {
    fn kind(&self) -> SourceKind {
        SourceKind::Scrape
    }

    fn attempt(&self, transport: &dyn Transport) -> Attempt {
        run_candidates(self.kind(), &self.candidates, |candidate| {
            let request = HttpRequest::get(&candidate.url, self.timeout)
                .header("User-Agent", &self.user_agent)
                .header("Accept", "text/html,application/xhtml+xml");
            let doc = match fetch(transport, &request) {
                Ok(doc) => doc,
                Err(err) => return CandidateOutcome::Rejected(err),
            };

            let items = extract_chart_items(&doc.text(), &self.markers);
            if items.is_empty() {
                CandidateOutcome::Nothing
            } else {
                CandidateOutcome::Items(ChartResult::new(SourceKind::Scrape, items))
            }
        })
    }
}

pub struct CsvStrategy {
    candidates: Vec<SourceCandidate>,
    header: Regex,
    normalize: bool,
    timeout: Duration,
}

impl CsvStrategy {
    pub fn new(config: &CsvConfig, candidates: Vec<SourceCandidate>) -> Result<Self> {
        let header = Regex::new(&config.header_pattern)
            .with_context(|| format!("invalid csv header pattern {}", config.header_pattern))?;
        Ok(Self {
            candidates,
            header,
            normalize: config.normalize,
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }
}

impl SourceStrategy for CsvStrategy {
    fn kind(&self) -> SourceKind {
        SourceKind::Csv
    }

    fn attempt(&self, transport: &dyn Transport) -> Attempt {
        run_candidates(self.kind(), &self.candidates, |candidate| {
            let request = HttpRequest::get(&candidate.url, self.timeout);
            let body = match fetch(transport, &request) {
                Ok(doc) => doc.text(),
                Err(err) => return CandidateOutcome::Rejected(err),
            };

            if looks_like_html(&body) {
                return CandidateOutcome::Rejected(anyhow!("response is html, not csv"));
            }
            if !has_expected_header(&body, &self.header) {
                return CandidateOutcome::Rejected(anyhow!("csv body missing expected header"));
            }

            let result = ChartResult::new(SourceKind::Csv, parse_chart_csv(&body, self.normalize));
            if result.is_empty() {
                CandidateOutcome::Nothing
            } else {
                CandidateOutcome::Items(result)
            }
        })
    }
}

pub struct CatalogStrategy {
    config: CatalogConfig,
    credentials: Credentials,
}

impl CatalogStrategy {
    pub fn new(config: &CatalogConfig, credentials: Credentials) -> Self {
        Self {
            config: config.clone(),
            credentials,
        }
    }
}

impl SourceStrategy for CatalogStrategy {
    fn kind(&self) -> SourceKind {
        SourceKind::CatalogApi
    }

    /// Any failure before tracks are collected (including the token exchange)
    /// aborts the whole phase; there is only one "candidate".
    fn attempt(&self, transport: &dyn Transport) -> Attempt {
        let client = CatalogClient::new(transport, &self.config);
        match client.artist_chart(&self.credentials) {
            Ok(result) if result.is_empty() => Attempt::Empty,
            Ok(result) => {
                info!(phase = %self.kind(), items = result.items.len(), "catalog produced chart");
                Attempt::Found(result)
            }
            Err(err) => {
                let detail = format!("{err:#}");
                warn!(phase = %self.kind(), error = %detail, "catalog phase failed");
                Attempt::Failed(err)
            }
        }
    }
}
