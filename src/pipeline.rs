use crate::config::{ChartsConfig, Credentials, expand_candidates};
use crate::fetch::Transport;
use crate::model::{ChartResult, Region, SourceKind};
use crate::strategy::{Attempt, CatalogStrategy, CsvStrategy, ScrapeStrategy, SourceStrategy};
use anyhow::Result;
use serde::Serialize;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseOutcome {
    Empty,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct PhaseReport {
    pub source: SourceKind,
    pub outcome: PhaseOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("no chart source available")]
    NoSourceAvailable { phases: Vec<PhaseReport> },
}

impl ResolveError {
    pub fn phases(&self) -> &[PhaseReport] {
        match self {
            ResolveError::NoSourceAvailable { phases } => phases,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    /// Restrict resolution to a single phase.
    pub only: Option<SourceKind>,
}

/// Runs strategies in order; the first that finds a chart wins.
pub struct ChartResolver {
    strategies: Vec<Box<dyn SourceStrategy>>,
}

impl ChartResolver {
    pub fn new(strategies: Vec<Box<dyn SourceStrategy>>) -> Self {
        Self { strategies }
    }

    /// Builds the scrape, CSV and catalog phases for one region. The catalog
    /// phase is only present when credentials are configured.
    pub fn for_region(
        config: &ChartsConfig,
        credentials: Option<&Credentials>,
        region: &Region,
        options: &ResolveOptions,
    ) -> Result<Self> {
        let wanted = |kind: SourceKind| options.only.is_none_or(|only| only == kind);
        let mut strategies: Vec<Box<dyn SourceStrategy>> = Vec::new();

        if config.scrape.enabled && wanted(SourceKind::Scrape) {
            strategies.push(Box::new(ScrapeStrategy::new(
                &config.scrape,
                expand_candidates(&config.scrape.candidates, region),
            )));
        }

        if config.csv.enabled && wanted(SourceKind::Csv) {
            strategies.push(Box::new(CsvStrategy::new(
                &config.csv,
                expand_candidates(&config.csv.candidates, region),
            )?));
        }

        if config.catalog.enabled && wanted(SourceKind::CatalogApi) {
            match credentials {
                Some(credentials) => strategies.push(Box::new(CatalogStrategy::new(
                    &config.catalog,
                    credentials.clone(),
                ))),
                None => info!("catalog phase disabled; no credentials configured"),
            }
        }

        Ok(Self::new(strategies))
    }

    pub fn phases(&self) -> Vec<SourceKind> {
        self.strategies.iter().map(|s| s.kind()).collect()
    }

    pub fn resolve(&self, transport: &dyn Transport) -> Result<ChartResult, ResolveError> {
        let mut phases = Vec::new();

        for strategy in &self.strategies {
            let kind = strategy.kind();
            info!(phase = %kind, "phase start");

            match strategy.attempt(transport) {
                Attempt::Found(result) => {
                    info!(phase = %kind, items = result.items.len(), "chart resolved");
                    return Ok(result);
                }
                Attempt::Empty => {
                    info!(phase = %kind, "phase exhausted without items");
                    phases.push(PhaseReport {
                        source: kind,
                        outcome: PhaseOutcome::Empty,
                        error: None,
                    });
                }
                Attempt::Failed(err) => {
                    info!(phase = %kind, "phase failed");
                    phases.push(PhaseReport {
                        source: kind,
                        outcome: PhaseOutcome::Failed,
                        error: Some(format!("{err:#}")),
                    });
                }
            }
        }

        info!(phases = phases.len(), "every phase exhausted");
        Err(ResolveError::NoSourceAvailable { phases })
    }
}
