use crate::model::{Region, SourceCandidate};
use anyhow::{Context, Result, bail};
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::net::SocketAddr;
use std::path::Path;
use url::Url;

#[derive(Debug, Clone, Deserialize)]
pub struct ChartsConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default = "default_regions")]
    pub regions: BTreeMap<String, RegionConfig>,
    #[serde(default)]
    pub scrape: ScrapeConfig,
    #[serde(default)]
    pub csv: CsvConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
}

impl Default for ChartsConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            regions: default_regions(),
            scrape: ScrapeConfig::default(),
            csv: CsvConfig::default(),
            catalog: CatalogConfig::default(),
        }
    }
}

impl ChartsConfig {
    pub fn validate(&self) -> Result<()> {
        self.server
            .bind
            .parse::<SocketAddr>()
            .with_context(|| format!("server.bind is not a socket address: {}", self.server.bind))?;

        for (code, region) in &self.regions {
            if !is_valid_region_token(code) {
                bail!("regions.{code}: region code must be 1-32 ascii alphanumerics or '-'");
            }
            if region.name.trim().is_empty() {
                bail!("regions.{code}.name must not be empty");
            }
        }

        if self.scrape.timeout_secs == 0 {
            bail!("scrape.timeout_secs must be greater than zero");
        }
        if self.csv.timeout_secs == 0 {
            bail!("csv.timeout_secs must be greater than zero");
        }
        if self.catalog.timeout_secs == 0 {
            bail!("catalog.timeout_secs must be greater than zero");
        }

        validate_candidates("scrape.candidates", &self.scrape.candidates)?;
        validate_candidates("csv.candidates", &self.csv.candidates)?;

        Regex::new(&self.csv.header_pattern)
            .with_context(|| format!("invalid csv.header_pattern {}", self.csv.header_pattern))?;

        if self.catalog.enabled {
            if self.catalog.artist.trim().is_empty() {
                bail!("catalog.artist must not be empty");
            }
            if self.catalog.album_limit == 0 {
                bail!("catalog.album_limit must be greater than zero");
            }
            Url::parse(&self.catalog.token_url)
                .with_context(|| format!("invalid catalog.token_url {}", self.catalog.token_url))?;
            Url::parse(&self.catalog.api_base)
                .with_context(|| format!("invalid catalog.api_base {}", self.catalog.api_base))?;
        }

        Ok(())
    }

    /// Maps an inbound region token to a [`Region`]. The token may be a configured
    /// code or a configured name; unknown well-formed tokens are used verbatim.
    pub fn region(&self, token: &str) -> Option<Region> {
        let token = token.trim().to_ascii_lowercase();
        if !is_valid_region_token(&token) {
            return None;
        }

        if let Some(region) = self.regions.get(&token) {
            return Some(Region {
                code: token,
                name: region.name.clone(),
            });
        }

        let by_name = self
            .regions
            .iter()
            .find(|(_, region)| region.name.eq_ignore_ascii_case(&token));
        if let Some((code, region)) = by_name {
            return Some(Region {
                code: code.clone(),
                name: region.name.clone(),
            });
        }

        Some(Region {
            code: token.clone(),
            name: token,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegionConfig {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScrapeConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_page_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_browser_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_scrape_candidates")]
    pub candidates: Vec<String>,
    #[serde(default = "default_script_ids")]
    pub script_ids: Vec<String>,
    #[serde(default = "default_globals")]
    pub globals: Vec<String>,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_secs: default_page_timeout_secs(),
            user_agent: default_browser_user_agent(),
            candidates: default_scrape_candidates(),
            script_ids: default_script_ids(),
            globals: default_globals(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CsvConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_page_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_csv_candidates")]
    pub candidates: Vec<String>,
    #[serde(default = "default_header_pattern")]
    pub header_pattern: String,
    #[serde(default = "default_true")]
    pub normalize: bool,
}

impl Default for CsvConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_secs: default_page_timeout_secs(),
            candidates: default_csv_candidates(),
            header_pattern: default_header_pattern(),
            normalize: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TrackCollection {
    TopTracks,
    #[default]
    Albums,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_token_url")]
    pub token_url: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_artist")]
    pub artist: String,
    #[serde(default)]
    pub tracks: TrackCollection,
    #[serde(default = "default_album_limit")]
    pub album_limit: usize,
    #[serde(default = "default_market")]
    pub market: String,
    #[serde(default = "default_api_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            token_url: default_token_url(),
            api_base: default_api_base(),
            artist: default_artist(),
            tracks: TrackCollection::Albums,
            album_limit: default_album_limit(),
            market: default_market(),
            timeout_secs: default_api_timeout_secs(),
        }
    }
}

/// Client credentials for the catalog API. Read once at startup.
#[derive(Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
}

impl Credentials {
    /// Returns `None` unless both values are present and non-blank.
    pub fn from_parts(client_id: Option<String>, client_secret: Option<String>) -> Option<Self> {
        let client_id = client_id.filter(|v| !v.trim().is_empty())?;
        let client_secret = client_secret.filter(|v| !v.trim().is_empty())?;
        Some(Self {
            client_id: client_id.trim().to_string(),
            client_secret: client_secret.trim().to_string(),
        })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &"<redacted>")
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

pub fn load_config_file(config_path: &Path) -> Result<ChartsConfig> {
    let text = std::fs::read_to_string(config_path)
        .with_context(|| format!("failed to read config: {}", config_path.display()))?;
    let config: ChartsConfig = toml::from_str(&text)
        .with_context(|| format!("failed to parse toml in {}", config_path.display()))?;
    config
        .validate()
        .with_context(|| format!("invalid config {}", config_path.display()))?;
    Ok(config)
}

pub fn load_config(config_path: Option<&Path>) -> Result<ChartsConfig> {
    match config_path {
        Some(path) => load_config_file(path),
        None => {
            let config = ChartsConfig::default();
            config.validate().context("invalid built-in config")?;
            Ok(config)
        }
    }
}

/// Expands `{{region}}` and `{{region_name}}` in every template.
pub fn expand_candidates(templates: &[String], region: &Region) -> Vec<SourceCandidate> {
    templates
        .iter()
        .map(|template| SourceCandidate::new(expand_template(template, region)))
        .collect()
}

pub fn expand_template(template: &str, region: &Region) -> String {
    template
        .replace("{{region_name}}", &region.name)
        .replace("{{region}}", &region.code)
}

pub fn is_valid_region_token(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= 32
        && value.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

fn validate_candidates(field: &str, templates: &[String]) -> Result<()> {
    let probe = Region {
        code: "xx".to_string(),
        name: "probe".to_string(),
    };
    for (index, template) in templates.iter().enumerate() {
        if template.trim().is_empty() {
            bail!("{field}[{index}] must not be empty");
        }
        let expanded = expand_template(template, &probe);
        Url::parse(&expanded).with_context(|| format!("{field}[{index}] is not a url: {template}"))?;
    }
    Ok(())
}

fn default_true() -> bool {
    true
}

fn default_bind() -> String {
    "127.0.0.1:5175".to_string()
}

fn default_page_timeout_secs() -> u64 {
    8
}

fn default_api_timeout_secs() -> u64 {
    10
}

fn default_browser_user_agent() -> String {
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36"
        .to_string()
}

fn default_scrape_candidates() -> Vec<String> {
    vec![
        "https://www.shazam.com/charts/top-200/{{region_name}}".to_string(),
        "https://www.shazam.com/{{region}}/charts/top-200/{{region_name}}".to_string(),
        "https://www.shazam.com/region/{{region_name}}/top-200".to_string(),
    ]
}

fn default_csv_candidates() -> Vec<String> {
    vec![
        "https://charts.spotify.com/regional/{{region}}/daily/latest/download".to_string(),
        "https://spotifycharts.com/regional/{{region}}/daily/latest/download".to_string(),
        "https://charts.spotify.com/regional/{{region}}/daily/latest/download?format=csv"
            .to_string(),
    ]
}

fn default_script_ids() -> Vec<String> {
    vec!["__NEXT_DATA__".to_string()]
}

fn default_globals() -> Vec<String> {
    vec!["__INITIAL_STATE__".to_string(), "__DATA__".to_string()]
}

fn default_header_pattern() -> String {
    r"(?i)position\s*,\s*track(?:\s*name)?\s*,\s*artist".to_string()
}

fn default_token_url() -> String {
    "https://accounts.spotify.com/api/token".to_string()
}

fn default_api_base() -> String {
    "https://api.spotify.com/v1".to_string()
}

fn default_artist() -> String {
    "Dani Martín".to_string()
}

fn default_album_limit() -> usize {
    5
}

fn default_market() -> String {
    "ES".to_string()
}

fn default_regions() -> BTreeMap<String, RegionConfig> {
    [
        ("es", "spain"),
        ("us", "united-states"),
        ("gb", "united-kingdom"),
        ("mx", "mexico"),
        ("fr", "france"),
        ("de", "germany"),
    ]
    .into_iter()
    .map(|(code, name)| {
        (
            code.to_string(),
            RegionConfig {
                name: name.to_string(),
            },
        )
    })
    .collect()
}
