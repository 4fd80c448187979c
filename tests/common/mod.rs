#![allow(dead_code)]

use anyhow::{Result, bail};
use std::collections::HashMap;
use std::sync::Mutex;
use topcharts::fetch::{FetchedDocument, HttpMethod, HttpRequest, Transport};
use url::Url;

/// Canned upstream responses keyed by URL without its query string.
#[derive(Default)]
pub struct FixtureTransport {
    routes: HashMap<String, Route>,
    requests: Mutex<Vec<HttpRequest>>,
}

enum Route {
    Respond { status: u16, body: String },
    Fail(String),
}

impl FixtureTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, url: &str, status: u16, body: impl Into<String>) -> Self {
        self.routes.insert(
            route_key(url),
            Route::Respond {
                status,
                body: body.into(),
            },
        );
        self
    }

    pub fn ok(self, url: &str, body: impl Into<String>) -> Self {
        self.respond(url, 200, body)
    }

    pub fn fail(mut self, url: &str, message: &str) -> Self {
        self.routes
            .insert(route_key(url), Route::Fail(message.to_string()));
        self
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().expect("request log poisoned").clone()
    }

    pub fn requested_urls(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.url).collect()
    }

    pub fn was_requested(&self, url: &str) -> bool {
        let key = route_key(url);
        self.requests().iter().any(|r| route_key(&r.url) == key)
    }

    pub fn posts(&self) -> Vec<HttpRequest> {
        self.requests()
            .into_iter()
            .filter(|r| matches!(r.method, HttpMethod::PostForm(_)))
            .collect()
    }
}

impl Transport for FixtureTransport {
    fn execute(&self, request: &HttpRequest) -> Result<FetchedDocument> {
        self.requests
            .lock()
            .expect("request log poisoned")
            .push(request.clone());

        match self.routes.get(&route_key(&request.url)) {
            Some(Route::Respond { status, body }) => Ok(FetchedDocument {
                source_url: request.url.clone(),
                status: *status,
                body: body.clone().into_bytes(),
            }),
            Some(Route::Fail(message)) => bail!("{message}"),
            None => bail!("connection refused: {}", request.url),
        }
    }
}

fn route_key(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed) => {
            parsed.set_query(None);
            parsed.to_string()
        }
        Err(_) => url.to_string(),
    }
}

pub fn chart_csv(rows: usize) -> String {
    let mut out = String::from("Position,Track Name,Artist,Streams,URL\n");
    for n in 1..=rows {
        out.push_str(&format!(
            "{n},\"Song {n}\",\"Artist {n}\",{},https://example.test/track/{n}\n",
            1000 - n
        ));
    }
    out
}

pub fn next_data_page(tracks: &[(&str, &str)]) -> String {
    let items = tracks
        .iter()
        .map(|(title, subtitle)| format!(r#"{{"title":"{title}","subtitle":"{subtitle}"}}"#))
        .collect::<Vec<_>>()
        .join(",");
    format!(
        r#"<!doctype html><html><head><script id="__NEXT_DATA__" type="application/json">{{"props":{{"pageProps":{{"chart":{{"tracks":[{items}]}}}}}}}}</script></head><body></body></html>"#
    )
}
