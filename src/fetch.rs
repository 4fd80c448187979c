use anyhow::{Context, Result, bail};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::time::Duration;
use tracing::debug;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    /// Form-encoded POST body.
    PostForm(Vec<(String, String)>),
}

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub basic_auth: Option<(String, String)>,
    pub timeout: Duration,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.into(),
            headers: Vec::new(),
            basic_auth: None,
            timeout,
        }
    }

    pub fn post_form(url: impl Into<String>, form: Vec<(String, String)>, timeout: Duration) -> Self {
        Self {
            method: HttpMethod::PostForm(form),
            url: url.into(),
            headers: Vec::new(),
            basic_auth: None,
            timeout,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn bearer(self, token: &str) -> Self {
        self.header("Authorization", format!("Bearer {token}"))
    }

    pub fn basic_auth(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.basic_auth = Some((user.into(), password.into()));
        self
    }
}

#[derive(Debug, Clone)]
pub struct FetchedDocument {
    pub source_url: String,
    pub status: u16,
    pub body: Vec<u8>,
}

impl FetchedDocument {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Treats non-2xx statuses as transport failures.
    pub fn ensure_success(self) -> Result<Self> {
        if !self.is_success() {
            bail!("request to {} failed with status {}", self.source_url, self.status);
        }
        Ok(self)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }

    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body)
            .with_context(|| format!("failed to parse json from {}", self.source_url))
    }
}

/// Outbound seam for every upstream call the strategies make.
///
/// Implementations return `Err` only for transport failures (connect, timeout,
/// unreadable body); HTTP statuses are reported through [`FetchedDocument::status`].
pub trait Transport: Send + Sync {
    fn execute(&self, request: &HttpRequest) -> Result<FetchedDocument>;
}

/// Executes a request and rejects non-2xx responses.
pub fn fetch(transport: &dyn Transport, request: &HttpRequest) -> Result<FetchedDocument> {
    transport.execute(request)?.ensure_success()
}

/// Blocking reqwest transport. Also serves `file://` URLs from disk so candidate
/// lists can point at local fixtures.
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .build()
            .context("failed to build reqwest client")?;
        Ok(Self { client })
    }
}

impl Transport for ReqwestTransport {
    fn execute(&self, request: &HttpRequest) -> Result<FetchedDocument> {
        if request.url.starts_with("file://") {
            return read_file_document(&request.url);
        }

        let mut headers = HeaderMap::new();
        for (k, v) in &request.headers {
            let name = HeaderName::from_bytes(k.as_bytes())
                .with_context(|| format!("invalid header name {k}"))?;
            let value =
                HeaderValue::from_str(v).with_context(|| format!("invalid header value for {k}"))?;
            headers.insert(name, value);
        }

        let builder = match &request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::PostForm(form) => self.client.post(&request.url).form(form),
        };
        let mut builder = builder.headers(headers).timeout(request.timeout);
        if let Some((user, password)) = &request.basic_auth {
            builder = builder.basic_auth(user, Some(password));
        }

        let resp = builder
            .send()
            .with_context(|| format!("request to {} failed", request.url))?;
        let status = resp.status().as_u16();
        let body = resp
            .bytes()
            .with_context(|| format!("failed to read body from {}", request.url))?
            .to_vec();

        debug!(url = %request.url, status, bytes = body.len(), "fetched");

        Ok(FetchedDocument {
            source_url: request.url.clone(),
            status,
            body,
        })
    }
}

fn read_file_document(url: &str) -> Result<FetchedDocument> {
    let parsed = Url::parse(url).with_context(|| format!("invalid file url {url}"))?;
    let path = parsed
        .to_file_path()
        .map_err(|_| anyhow::anyhow!("file url has no local path: {url}"))?;
    let body = std::fs::read(&path)
        .with_context(|| format!("failed to read file source {}", path.display()))?;

    debug!(file = %path.display(), bytes = body.len(), "loaded file source");

    Ok(FetchedDocument {
        source_url: url.to_string(),
        status: 200,
        body,
    })
}
