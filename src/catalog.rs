use crate::config::{CatalogConfig, Credentials, TrackCollection};
use crate::fetch::{HttpRequest, Transport, fetch};
use crate::model::{ChartItem, ChartResult, MAX_CHART_ITEMS, SourceKind};
use anyhow::{Context, Result, anyhow, bail};
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct Paging<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    artists: Option<Paging<CatalogArtist>>,
}

#[derive(Debug, Deserialize)]
struct TopTracksResponse {
    #[serde(default)]
    tracks: Vec<CatalogTrack>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct CatalogArtist {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct CatalogAlbum {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub release_date: Option<String>,
}

impl CatalogAlbum {
    /// Release date at whatever precision the catalog gives (day, month or year).
    pub fn released_on(&self) -> Option<NaiveDate> {
        let raw = self.release_date.as_deref()?.trim();
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .or_else(|| NaiveDate::parse_from_str(&format!("{raw}-01"), "%Y-%m-%d").ok())
            .or_else(|| NaiveDate::parse_from_str(&format!("{raw}-01-01"), "%Y-%m-%d").ok())
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct CatalogTrack {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub popularity: Option<u32>,
}

pub struct CatalogClient<'a> {
    transport: &'a dyn Transport,
    config: &'a CatalogConfig,
}

impl<'a> CatalogClient<'a> {
    pub fn new(transport: &'a dyn Transport, config: &'a CatalogConfig) -> Self {
        Self { transport, config }
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_secs)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.api_base.trim_end_matches('/'), path)
    }

    /// Client-credentials grant.
    pub fn access_token(&self, credentials: &Credentials) -> Result<String> {
        let request = HttpRequest::post_form(
            &self.config.token_url,
            vec![("grant_type".to_string(), "client_credentials".to_string())],
            self.timeout(),
        )
        .basic_auth(&credentials.client_id, &credentials.client_secret);

        let token: TokenResponse = fetch(self.transport, &request)
            .context("token exchange failed")?
            .json()?;
        if token.access_token.trim().is_empty() {
            bail!("token endpoint returned no access_token");
        }
        Ok(token.access_token)
    }

    pub fn search_artist(&self, token: &str, name: &str) -> Result<Option<CatalogArtist>> {
        let mut url = Url::parse(&self.endpoint("search"))
            .with_context(|| format!("invalid catalog api base {}", self.config.api_base))?;
        url.query_pairs_mut()
            .append_pair("q", name)
            .append_pair("type", "artist")
            .append_pair("limit", "1");

        let request = HttpRequest::get(url.to_string(), self.timeout()).bearer(token);
        let response: SearchResponse = fetch(self.transport, &request)?.json()?;
        Ok(response
            .artists
            .and_then(|paging| paging.items.into_iter().next()))
    }

    pub fn top_tracks(&self, token: &str, artist_id: &str) -> Result<Vec<CatalogTrack>> {
        let mut url = Url::parse(&self.endpoint(&format!("artists/{artist_id}/top-tracks")))
            .with_context(|| format!("invalid catalog api base {}", self.config.api_base))?;
        if !self.config.market.trim().is_empty() {
            url.query_pairs_mut().append_pair("market", self.config.market.trim());
        }

        let request = HttpRequest::get(url.to_string(), self.timeout()).bearer(token);
        let response: TopTracksResponse = fetch(self.transport, &request)?.json()?;
        Ok(response.tracks)
    }

    pub fn artist_albums(&self, token: &str, artist_id: &str) -> Result<Vec<CatalogAlbum>> {
        let request =
            HttpRequest::get(self.endpoint(&format!("artists/{artist_id}/albums")), self.timeout())
                .bearer(token);
        let response: Paging<CatalogAlbum> = fetch(self.transport, &request)?.json()?;
        Ok(response.items)
    }

    pub fn album_tracks(&self, token: &str, album_id: &str) -> Result<Vec<CatalogTrack>> {
        let request =
            HttpRequest::get(self.endpoint(&format!("albums/{album_id}/tracks")), self.timeout())
                .bearer(token);
        let response: Paging<CatalogTrack> = fetch(self.transport, &request)?.json()?;
        Ok(response.items)
    }

    /// Tracks from the newest `album_limit` albums, de-duplicated by id in
    /// discovery order. An album whose listing fails is skipped.
    pub fn collect_album_tracks(&self, token: &str, artist_id: &str) -> Result<Vec<CatalogTrack>> {
        let mut albums = self.artist_albums(token, artist_id)?;
        sort_albums_newest_first(&mut albums);

        let mut seen = HashSet::new();
        let mut collected = Vec::new();
        for album in albums.iter().take(self.config.album_limit) {
            let tracks = match self.album_tracks(token, &album.id) {
                Ok(tracks) => tracks,
                Err(err) => {
                    warn!(album = %album.name, error = %err, "album tracks fetch failed; skipping");
                    continue;
                }
            };
            for track in tracks {
                let fresh = match &track.id {
                    Some(id) => seen.insert(id.clone()),
                    None => true,
                };
                if fresh {
                    collected.push(track);
                }
            }
        }
        Ok(collected)
    }

    /// Full catalog path: token, artist lookup, track collection, ranking.
    pub fn artist_chart(&self, credentials: &Credentials) -> Result<ChartResult> {
        let token = self.access_token(credentials)?;

        let artist = self
            .search_artist(&token, &self.config.artist)?
            .ok_or_else(|| anyhow!("artist not found: {}", self.config.artist))?;
        info!(artist = %artist.name, id = %artist.id, "catalog artist resolved");

        let tracks = match self.config.tracks {
            TrackCollection::TopTracks => self.top_tracks(&token, &artist.id)?,
            TrackCollection::Albums => self.collect_album_tracks(&token, &artist.id)?,
        };

        let items = rank_tracks(tracks)
            .into_iter()
            .take(MAX_CHART_ITEMS)
            .enumerate()
            .map(|(idx, track)| ChartItem {
                position: (idx + 1).to_string(),
                track: track.name,
                artist: artist.name.clone(),
                popularity: track.popularity,
            })
            .collect();

        Ok(ChartResult::new(SourceKind::CatalogApi, items).with_artist(artist.name))
    }
}

/// Newest first; albums without a readable release date go last. Stable.
pub fn sort_albums_newest_first(albums: &mut [CatalogAlbum]) {
    albums.sort_by_key(|album| std::cmp::Reverse(album.released_on()));
}

/// Popularity descending, missing popularity counted as 0, ties in discovery
/// order. Tracks with a blank name are dropped.
pub fn rank_tracks(mut tracks: Vec<CatalogTrack>) -> Vec<CatalogTrack> {
    tracks.retain(|track| !track.name.trim().is_empty());
    tracks.sort_by_key(|track| std::cmp::Reverse(track.popularity.unwrap_or(0)));
    tracks
}
